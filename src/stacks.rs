//! Templates shipped with the crate
//!
//! - [vpc::vpc]: VPC with two public and two private subnets in different AZs
//! - [openshift::openshift]: single OpenShift master and node

pub mod openshift;
pub mod vpc;

pub use openshift::openshift;
pub use vpc::vpc;
