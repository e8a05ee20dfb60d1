use std::fmt;

use validator::{Validate, ValidationError};

use crate::assembler::{self, AssemblyError};
use crate::document::Document;
use crate::value::Value;

pub const FORMAT_VERSION: &str = "2010-09-09";

#[derive(Clone, Debug, PartialEq)]
pub enum ParameterType {
    String,
    Number,

    /// AWS-specific type such as `AWS::EC2::KeyPair::KeyName`, opaque here
    Aws(String),
}

impl ParameterType {
    pub fn as_str(&self) -> &str {
        match self {
            ParameterType::String => "String",
            ParameterType::Number => "Number",
            ParameterType::Aws(tag) => tag,
        }
    }
}

impl From<&str> for ParameterType {
    fn from(tag: &str) -> Self {
        match tag {
            "String" => ParameterType::String,
            "Number" => ParameterType::Number,
            other => ParameterType::Aws(other.to_string()),
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Validate)]
#[validate(schema(function = "validate_parameter_constraints"))]
pub struct Parameter {
    #[validate(custom = "validate_logical_name")]
    pub name: String,

    pub kind: ParameterType,

    #[validate(length(max = 4000))]
    pub description: Option<String>,

    pub default: Option<String>,

    pub allowed_values: Vec<String>,
}

impl Parameter {
    pub fn new(name: &str, kind: impl Into<ParameterType>) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.into(),
            description: None,
            default: None,
            allowed_values: vec![],
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn default(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        self
    }

    pub fn allowed_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_values = values.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Clone, Debug, PartialEq, Validate)]
pub struct Resource {
    #[validate(custom = "validate_logical_name")]
    pub name: String,

    /// Resource type tag, e.g. `AWS::EC2::VPC`
    #[validate(custom = "validate_resource_type")]
    pub kind: String,

    /// Properties in declaration order
    pub properties: Vec<(String, Value)>,

    /// Resources that must be realized before this one
    pub depends_on: Vec<String>,
}

impl Resource {
    pub fn new(name: &str, kind: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            properties: vec![],
            depends_on: vec![],
        }
    }

    /// Set a property, replacing an earlier value under the same key in place
    pub fn property(mut self, key: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        match self.properties.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value,
            None => self.properties.push((key.to_string(), value)),
        }
        self
    }

    pub fn depends_on(mut self, resource: &str) -> Self {
        self.depends_on.push(resource.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value)
    }
}

#[derive(Clone, Debug, PartialEq, Validate)]
pub struct Output {
    #[validate(custom = "validate_logical_name")]
    pub name: String,

    #[validate(length(max = 1024))]
    pub description: Option<String>,

    pub value: Value,
}

impl Output {
    pub fn new(name: &str, value: impl Into<Value>) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            value: value.into(),
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

/// Declarations of a whole template
#[derive(Clone, Debug, PartialEq)]
pub struct Template {
    pub format_version: String,
    pub description: Option<String>,
    pub parameters: Vec<Parameter>,
    pub resources: Vec<Resource>,
    pub outputs: Vec<Output>,
}

impl Template {
    pub fn assemble(&self) -> Result<Document, AssemblyError> {
        assembler::assemble(self)
    }
}

/// Collects declarations in order, nothing is checked until assembly
#[derive(Clone, Debug)]
pub struct TemplateBuilder {
    template: Template,
}

impl Default for TemplateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateBuilder {
    pub fn new() -> Self {
        Self {
            template: Template {
                format_version: FORMAT_VERSION.to_string(),
                description: None,
                parameters: vec![],
                resources: vec![],
                outputs: vec![],
            },
        }
    }

    pub fn format_version(mut self, version: &str) -> Self {
        self.template.format_version = version.to_string();
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.template.description = Some(description.to_string());
        self
    }

    pub fn parameter(mut self, parameter: Parameter) -> Self {
        self.template.parameters.push(parameter);
        self
    }

    pub fn resource(mut self, resource: Resource) -> Self {
        self.template.resources.push(resource);
        self
    }

    pub fn output(mut self, output: Output) -> Self {
        self.template.outputs.push(output);
        self
    }

    pub fn build(self) -> Template {
        self.template
    }
}

fn validate_logical_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::new("Logical name can not be empty"));
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::new(
            "Logical name has to be alphanumeric (A-Za-z0-9)",
        ));
    }

    Ok(())
}

/// `AWS::Service::Kind` or `Custom::Name`
fn validate_resource_type(kind: &str) -> Result<(), ValidationError> {
    let segments: Vec<&str> = kind.split("::").collect();
    let well_formed = segments.len() >= 2
        && segments
            .iter()
            .all(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));

    if !well_formed {
        return Err(ValidationError::new(
            "Resource type has to look like `Vendor::Service::Kind`",
        ));
    }

    Ok(())
}

fn validate_parameter_constraints(parameter: &Parameter) -> Result<(), ValidationError> {
    if parameter.kind == ParameterType::Number {
        let all_numeric = parameter
            .default
            .iter()
            .chain(parameter.allowed_values.iter())
            .all(|v| v.trim().parse::<f64>().map_or(false, f64::is_finite));

        if !all_numeric {
            return Err(ValidationError::new(
                "Number parameter has a non-numeric default or allowed value",
            ));
        }
    }

    if let Some(default) = &parameter.default {
        if !parameter.allowed_values.is_empty() && !parameter.allowed_values.contains(default) {
            return Err(ValidationError::new(
                "The default value is not one of the allowed values",
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Parameter, ParameterType, Resource, TemplateBuilder, FORMAT_VERSION};
    use crate::value::Value;
    use validator::Validate;

    #[test]
    fn parameter_type_tags() {
        assert_eq!(ParameterType::from("String"), ParameterType::String);
        assert_eq!(ParameterType::from("Number"), ParameterType::Number);
        assert_eq!(
            ParameterType::from("AWS::EC2::VPC::Id"),
            ParameterType::Aws("AWS::EC2::VPC::Id".to_string())
        );
        assert_eq!(ParameterType::from("AWS::EC2::VPC::Id").as_str(), "AWS::EC2::VPC::Id");
    }

    #[test]
    fn rejects_non_alphanumeric_names() {
        assert!(Parameter::new("Vpc-Name", "String").validate().is_err());
        assert!(Parameter::new("", "String").validate().is_err());
        assert!(Parameter::new("VPCName", "String").validate().is_ok());
    }

    #[test]
    fn rejects_default_outside_allowed_values() {
        let parameter = Parameter::new("Size", "String")
            .allowed_values(["small", "large"])
            .default("medium");
        assert!(parameter.validate().is_err());

        let parameter = parameter.default("large");
        assert!(parameter.validate().is_ok());
    }

    #[test]
    fn rejects_non_numeric_number_default() {
        assert!(Parameter::new("Count", "Number").default("many").validate().is_err());
        assert!(Parameter::new("Count", "Number").default("3").validate().is_ok());
        assert!(Parameter::new("Count", "Number").default("-2.5").validate().is_ok());
    }

    #[test]
    fn rejects_non_finite_number_values() {
        for value in ["NaN", "inf", "-infinity"] {
            assert!(Parameter::new("Count", "Number").default(value).validate().is_err());
        }
        assert!(Parameter::new("Count", "Number")
            .allowed_values(["1", "NaN"])
            .validate()
            .is_err());
    }

    #[test]
    fn validates_resource_type() {
        assert!(Resource::new("VPC", "AWS::EC2::VPC").validate().is_ok());
        assert!(Resource::new("Thing", "Custom::Thing").validate().is_ok());
        assert!(Resource::new("VPC", "VPC").validate().is_err());
        assert!(Resource::new("VPC", "AWS::::VPC").validate().is_err());
    }

    #[test]
    fn property_replaces_in_place() {
        let resource = Resource::new("VPC", "AWS::EC2::VPC")
            .property("CidrBlock", "10.0.0.0/16")
            .property("Tags", Value::list([Value::tag("Network", "Public")]))
            .property("CidrBlock", "10.1.0.0/16");

        let keys: Vec<&str> = resource.properties.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["CidrBlock", "Tags"]);
        assert_eq!(resource.get("CidrBlock"), Some(&Value::from("10.1.0.0/16")));
    }

    #[test]
    fn builder_keeps_declaration_order() {
        let template = TemplateBuilder::new()
            .description("Two resources")
            .resource(Resource::new("B", "AWS::EC2::VPC"))
            .resource(Resource::new("A", "AWS::EC2::VPC"))
            .build();

        assert_eq!(template.format_version, FORMAT_VERSION);
        assert_eq!(template.resources[0].name, "B");
        assert_eq!(template.resources[1].name, "A");
    }
}
