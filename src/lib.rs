//! Assemble CloudFormation templates from declarations
//!
//! Declarations come either from the [template::TemplateBuilder] or from a
//! description file ([config::parse]). [assembler::assemble] checks names,
//! references and intrinsic arguments, orders the resources and produces a
//! [document::Document] that serializes to the template JSON.
//!
//! ```rust
//! use cfn_assembler::template::{Resource, TemplateBuilder};
//! use cfn_assembler::value::Value;
//!
//! let document = TemplateBuilder::new()
//!     .resource(
//!         Resource::new("Subnet", "AWS::EC2::Subnet")
//!             .property("VpcId", Value::reference("VPC")),
//!     )
//!     .resource(Resource::new("VPC", "AWS::EC2::VPC"))
//!     .build()
//!     .assemble()
//!     .unwrap();
//!
//! assert_eq!(document.order(), ["VPC", "Subnet"]);
//! ```

pub mod assembler;
pub mod config;
pub mod deploy;
pub mod document;
pub mod interpolate;
pub mod stacks;
pub mod template;
pub mod value;
pub mod writer;

pub use assembler::{assemble, AssemblyError};
pub use document::Document;
pub use template::{Output, Parameter, ParameterType, Resource, Template, TemplateBuilder};
pub use value::Value;
