use std::fmt;

use crate::assembler::AssemblyError;
use crate::document::Document;
use crate::template::Template;

#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum DeployError {
    #[error("Service error ocurred: {0}.")]
    ServiceError(String),

    #[error("Unknown error ocurred: {0}.")]
    UnknownError(String),
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum SubmitError {
    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error(transparent)]
    Deploy(#[from] DeployError),
}

/// Identifier CloudFormation assigns to a created stack
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackId(pub String);

impl fmt::Display for StackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whatever creates a stack out of a finished document
///
/// Called once per document, retries and polling are up to the implementation.
pub trait Deployer {
    fn deploy(&self, document: &Document) -> Result<StackId, DeployError>;
}

/// Assemble the template and hand it to the deployer
///
/// Nothing reaches the deployer unless assembly succeeds, deployer failures
/// are returned as they are.
pub fn submit<D: Deployer + ?Sized>(
    template: &Template,
    deployer: &D,
) -> Result<StackId, SubmitError> {
    let document = template.assemble()?;
    log::debug!("Submitting template with {} resources", document.order().len());

    let stack_id = deployer.deploy(&document)?;
    log::debug!("Stack created: {stack_id}");

    Ok(stack_id)
}
