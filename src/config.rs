use serde::Deserialize;
use serde_yaml::{Mapping, Value as Yaml};
use std::{fs, io, path::Path};
use validator::{Validate, ValidationError};

use crate::interpolate::interpolate;
use crate::template::{Output, Parameter, Resource, Template, TemplateBuilder, FORMAT_VERSION};
use crate::value::Value;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("File {0} not found")]
    FileNotFound(String),

    #[error("Parsing error: {0}")]
    ParsingError(String),

    #[error("Validation errors: {0}")]
    ValidationError(String),

    #[error("Unknown error occurred: {0}")]
    Unknown(String),
}

/// Template description file, CloudFormation shaped
///
/// Sections and keys without a counterpart in [Template] are rejected, not dropped.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
struct Description {
    #[serde(rename = "AWSTemplateFormatVersion")]
    #[validate(custom = "validate_format_version")]
    format_version: Option<String>,

    #[serde(rename = "Description")]
    #[validate(length(max = 1024))]
    description: Option<String>,

    #[serde(rename = "Parameters", default)]
    parameters: Mapping,

    #[serde(rename = "Resources", default)]
    #[validate(custom = "validate_resources_present")]
    resources: Mapping,

    #[serde(rename = "Outputs", default)]
    outputs: Mapping,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct ParameterEntry {
    #[serde(rename = "Type")]
    kind: String,

    description: Option<String>,

    default: Option<Yaml>,

    #[serde(default)]
    allowed_values: Vec<Yaml>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DependsOn {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct ResourceEntry {
    #[serde(rename = "Type")]
    kind: String,

    #[serde(default)]
    properties: Mapping,

    depends_on: Option<DependsOn>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct OutputEntry {
    description: Option<String>,
    value: Yaml,
}

/// Load a template description (YAML or JSON) into declarations
///
/// `Fn::Interpolate` files are resolved relative to the description.
pub fn parse(path: &Path) -> Result<Template, Error> {
    let contents = read(path)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));

    parse_str(&contents, base)
}

/// Same as [parse] for an in-memory description
pub fn parse_str(contents: &str, base: &Path) -> Result<Template, Error> {
    let description: Description = match serde_yaml::from_str(contents) {
        Ok(data) => Ok(data),
        Err(error) => Err(Error::ParsingError(error.to_string())),
    }?;

    match description.validate() {
        Ok(_) => (),
        Err(error) => return Err(Error::ValidationError(error.to_string())),
    }

    let loader = Loader { base };
    let mut builder = TemplateBuilder::new();

    if let Some(version) = &description.format_version {
        builder = builder.format_version(version);
    }

    if let Some(text) = &description.description {
        builder = builder.description(text);
    }

    for (name, entry) in &description.parameters {
        let name = key(name)?;
        let entry: ParameterEntry = entry_of(name, entry)?;

        let mut parameter = Parameter::new(name, entry.kind.as_str())
            .allowed_values(
                entry
                    .allowed_values
                    .iter()
                    .map(scalar)
                    .collect::<Result<Vec<String>, Error>>()?,
            );

        if let Some(text) = &entry.description {
            parameter = parameter.description(text);
        }

        if let Some(default) = &entry.default {
            parameter = parameter.default(&scalar(default)?);
        }

        builder = builder.parameter(parameter);
    }

    for (name, entry) in &description.resources {
        let name = key(name)?;
        let entry: ResourceEntry = entry_of(name, entry)?;

        let mut resource = Resource::new(name, &entry.kind);
        for (property, value) in entry.properties {
            resource = resource.property(key(&property)?, loader.value(value)?);
        }

        let depends_on = match entry.depends_on {
            None => vec![],
            Some(DependsOn::One(target)) => vec![target],
            Some(DependsOn::Many(targets)) => targets,
        };
        for target in &depends_on {
            resource = resource.depends_on(target);
        }

        builder = builder.resource(resource);
    }

    for (name, entry) in &description.outputs {
        let name = key(name)?;
        let entry: OutputEntry = entry_of(name, entry)?;

        let mut output = Output::new(name, loader.value(entry.value)?);
        if let Some(text) = &entry.description {
            output = output.description(text);
        }

        builder = builder.output(output);
    }

    let template = builder.build();
    log::debug!(
        "Loaded description with {} parameters, {} resources, {} outputs",
        template.parameters.len(),
        template.resources.len(),
        template.outputs.len()
    );

    Ok(template)
}

fn read(path: &Path) -> Result<String, Error> {
    match fs::read_to_string(path) {
        Ok(raw_contents) => Ok(raw_contents),
        Err(error) => match error.kind() {
            io::ErrorKind::NotFound => Err(Error::FileNotFound(path.display().to_string())),
            _ => Err(Error::Unknown(error.to_string())),
        },
    }
}

fn key(key: &Yaml) -> Result<&str, Error> {
    match key {
        Yaml::String(key) => Ok(key),
        other => Err(Error::ParsingError(format!(
            "Keys have to be strings, got {other:?}"
        ))),
    }
}

fn entry_of<T: serde::de::DeserializeOwned>(name: &str, entry: &Yaml) -> Result<T, Error> {
    match serde_yaml::from_value(entry.clone()) {
        Ok(data) => Ok(data),
        Err(error) => Err(Error::ParsingError(format!("{name}: {error}"))),
    }
}

/// Parameter defaults and allowed values are strings in the document
fn scalar(value: &Yaml) -> Result<String, Error> {
    match value {
        Yaml::String(string) => Ok(string.clone()),
        Yaml::Number(number) => Ok(number.to_string()),
        Yaml::Bool(boolean) => Ok(boolean.to_string()),
        other => Err(Error::ParsingError(format!(
            "Expected a scalar value, got {other:?}"
        ))),
    }
}

/// Converts YAML property values, resolving interpolated files on the way
struct Loader<'a> {
    base: &'a Path,
}

impl Loader<'_> {
    fn value(&self, value: Yaml) -> Result<Value, Error> {
        match value {
            Yaml::Null => Err(Error::ParsingError(
                "Property values can not be null".to_string(),
            )),
            Yaml::Bool(boolean) => Ok(Value::Bool(boolean)),
            Yaml::Number(number) => self.number(&number),
            Yaml::String(string) => Ok(Value::String(string)),
            Yaml::Sequence(values) => Ok(Value::List(
                values
                    .into_iter()
                    .map(|value| self.value(value))
                    .collect::<Result<_, _>>()?,
            )),
            Yaml::Mapping(mapping) => {
                // Single `Ref` / `Fn::*` key is the long form of an intrinsic
                let intrinsic = match mapping.iter().next() {
                    Some((Yaml::String(name), _))
                        if mapping.len() == 1 && (name == "Ref" || name.starts_with("Fn::")) =>
                    {
                        Some(name.clone())
                    }
                    _ => None,
                };

                if let Some(name) = intrinsic {
                    let argument = mapping
                        .into_iter()
                        .next()
                        .map(|(_, argument)| argument)
                        .unwrap_or(Yaml::Null);
                    return self.intrinsic(&name, argument);
                }

                let mut entries = Vec::with_capacity(mapping.len());
                for (key_value, value) in mapping {
                    entries.push((key(&key_value)?.to_string(), self.value(value)?));
                }
                Ok(Value::Map(entries))
            }
            Yaml::Tagged(tagged) => {
                let tag = tagged.tag.to_string();
                let tag = tag.trim_start_matches('!');
                let name = match tag {
                    "Ref" => "Ref".to_string(),
                    other => format!("Fn::{other}"),
                };
                self.intrinsic(&name, tagged.value)
            }
        }
    }

    fn number(&self, number: &serde_yaml::Number) -> Result<Value, Error> {
        let converted = if let Some(unsigned) = number.as_u64() {
            Some(serde_json::Number::from(unsigned))
        } else if let Some(signed) = number.as_i64() {
            Some(serde_json::Number::from(signed))
        } else {
            number.as_f64().and_then(serde_json::Number::from_f64)
        };

        match converted {
            Some(number) => Ok(Value::Number(number)),
            None => Err(Error::ParsingError(format!(
                "Number {number} can not be represented in JSON"
            ))),
        }
    }

    fn intrinsic(&self, name: &str, argument: Yaml) -> Result<Value, Error> {
        let malformed = |expected: &str| Error::ParsingError(format!("{name} expects {expected}"));

        match name {
            "Ref" => match argument {
                Yaml::String(target) => Ok(Value::Ref(target)),
                _ => Err(malformed("a logical name")),
            },

            "Fn::Join" => match argument {
                Yaml::Sequence(arguments) => match <[Yaml; 2]>::try_from(arguments) {
                    Ok([Yaml::String(delimiter), Yaml::Sequence(values)]) => {
                        let values = values
                            .into_iter()
                            .map(|value| self.value(value))
                            .collect::<Result<Vec<Value>, Error>>()?;
                        Ok(Value::join(&delimiter, values))
                    }
                    _ => Err(malformed("[delimiter, [values]]")),
                },
                _ => Err(malformed("[delimiter, [values]]")),
            },

            "Fn::Select" => match argument {
                Yaml::Sequence(arguments) => match <[Yaml; 2]>::try_from(arguments) {
                    Ok([index, list]) => Ok(Value::select(self.value(index)?, self.value(list)?)),
                    Err(_) => Err(malformed("[index, list]")),
                },
                _ => Err(malformed("[index, list]")),
            },

            "Fn::Base64" => Ok(Value::base64(self.value(argument)?)),

            "Fn::GetAZs" => match argument {
                // `!GetAZs ""` and `!GetAZs` both mean the current region
                Yaml::Null => Ok(Value::get_azs("")),
                other => Ok(Value::get_azs(self.value(other)?)),
            },

            "Fn::GetAtt" => match argument {
                Yaml::String(dotted) => match dotted.split_once('.') {
                    Some((resource, attribute)) => Ok(Value::get_att(resource, attribute)),
                    None => Err(malformed("`Resource.Attribute`")),
                },
                Yaml::Sequence(arguments) => match <[Yaml; 2]>::try_from(arguments) {
                    Ok([Yaml::String(resource), Yaml::String(attribute)]) => {
                        Ok(Value::get_att(resource, attribute))
                    }
                    _ => Err(malformed("[resource, attribute]")),
                },
                _ => Err(malformed("[resource, attribute]")),
            },

            "Fn::Interpolate" => {
                let text = match argument {
                    Yaml::String(text) => text,
                    Yaml::Mapping(mapping) => match mapping.get("File") {
                        Some(Yaml::String(file)) => {
                            let path = self.base.join(file);
                            log::debug!("Interpolating {}", path.display());
                            read(&path)?
                        }
                        _ => return Err(malformed("text or {File: path}")),
                    },
                    _ => return Err(malformed("text or {File: path}")),
                };

                interpolate(&text).map_err(|error| Error::ParsingError(error.to_string()))
            }

            other => Err(Error::ParsingError(format!(
                "Unsupported intrinsic function `{other}`"
            ))),
        }
    }
}

fn validate_format_version(version: &str) -> Result<(), ValidationError> {
    if version != FORMAT_VERSION {
        return Err(ValidationError::new(
            "AWSTemplateFormatVersion has to be `2010-09-09`",
        ));
    }

    Ok(())
}

fn validate_resources_present(resources: &Mapping) -> Result<(), ValidationError> {
    if resources.is_empty() {
        return Err(ValidationError::new(
            "A template has to declare at least one resource",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::io::Write;
    use std::path::Path;

    use super::parse;
    use super::parse_str;
    use super::Error;
    use crate::assembler::AssemblyError;
    use crate::template::ParameterType;
    use crate::value::Value;
    use tempfile::tempdir;

    const NETWORK: &str = r#"
AWSTemplateFormatVersion: '2010-09-09'
Description: Two subnets
Parameters:
  VPCName:
    Description: Name of the VPC
    Type: String
  Size:
    Type: Number
    Default: 100
    AllowedValues: [50, 100]
Resources:
  VPC:
    Type: AWS::EC2::VPC
    Properties:
      CidrBlock: 10.0.0.0/16
      Tags:
        - Key: Name
          Value: !Ref VPCName
  PublicSubnet1:
    Type: AWS::EC2::Subnet
    Properties:
      VpcId: {Ref: VPC}
      AvailabilityZone: {"Fn::Select": ["0", {"Fn::GetAZs": {Ref: "AWS::Region"}}]}
  PublicRoute:
    Type: AWS::EC2::Route
    DependsOn: PublicSubnet1
    Properties:
      DestinationCidrBlock: 0.0.0.0/0
Outputs:
  AZ:
    Description: Availability zone
    Value: !GetAtt PublicSubnet1.AvailabilityZone
"#;

    #[test]
    fn file_does_not_exist() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("template.yaml");

        let result = parse(&file_path);
        assert_eq!(true, result.is_err());
        match result.err().unwrap() {
            Error::FileNotFound(_) => {}
            _ => panic!("Expected `FileNotFound` error"),
        }
    }

    #[test]
    fn file_wrong_format() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("template.yaml");

        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "Not yaml").unwrap();

        let result = parse(&file_path);
        assert_eq!(true, result.is_err());
        match result.err().unwrap() {
            Error::ParsingError(_) => {}
            _ => panic!("Expected `ParsingError` error"),
        }
    }

    #[test]
    fn wrong_format_version() {
        let result = parse_str(
            "AWSTemplateFormatVersion: '2011-01-01'\nResources:\n  Q:\n    Type: AWS::SQS::Queue\n",
            Path::new("."),
        );
        match result.err().unwrap() {
            Error::ValidationError(_) => {}
            _ => panic!("Expected `ValidationError` error"),
        }
    }

    #[test]
    fn missing_resources() {
        let result = parse_str("Description: nothing\n", Path::new("."));
        match result.err().unwrap() {
            Error::ValidationError(_) => {}
            _ => panic!("Expected `ValidationError` error"),
        }
    }

    #[test]
    fn parses_the_description() {
        let template = parse_str(NETWORK, Path::new(".")).unwrap();

        assert_eq!(template.description.as_deref(), Some("Two subnets"));
        assert_eq!(template.parameters[1].kind, ParameterType::Number);
        assert_eq!(template.parameters[1].default.as_deref(), Some("100"));
        assert_eq!(template.parameters[1].allowed_values, vec!["50", "100"]);

        let names: Vec<&str> = template.resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["VPC", "PublicSubnet1", "PublicRoute"]);
        assert_eq!(template.resources[2].depends_on, vec!["PublicSubnet1"]);
        assert_eq!(
            template.resources[1].get("AvailabilityZone"),
            Some(&Value::select("0", Value::get_azs(Value::region())))
        );
        assert_eq!(
            template.outputs[0].value,
            Value::get_att("PublicSubnet1", "AvailabilityZone")
        );

        let document = template.assemble().unwrap();
        assert_eq!(document.order(), ["VPC", "PublicSubnet1", "PublicRoute"]);
    }

    #[test]
    fn unresolved_reference_surfaces_at_assembly() {
        let description = r#"
Resources:
  Subnet:
    Type: AWS::EC2::Subnet
    Properties:
      VpcId: !Ref VPC
"#;
        let template = parse_str(description, Path::new(".")).unwrap();

        assert!(matches!(
            template.assemble(),
            Err(AssemblyError::UnresolvedReference { reference, .. }) if reference == "VPC"
        ));
    }

    #[test]
    fn unsupported_intrinsic() {
        let description = r#"
Resources:
  Q:
    Type: AWS::SQS::Queue
    Properties:
      Name: {"Fn::Sub": "${AWS::StackName}"}
"#;
        let result = parse_str(description, Path::new("."));
        match result.err().unwrap() {
            Error::ParsingError(message) => assert!(message.contains("Fn::Sub")),
            _ => panic!("Expected `ParsingError` error"),
        }
    }

    #[test]
    fn unsupported_resource_keys() {
        let description = r#"
Resources:
  Bucket:
    Type: AWS::S3::Bucket
    DeletionPolicy: Retain
"#;
        let result = parse_str(description, Path::new("."));
        match result.err().unwrap() {
            Error::ParsingError(message) => {
                assert!(message.starts_with("Bucket: "));
                assert!(message.contains("DeletionPolicy"));
            }
            _ => panic!("Expected `ParsingError` error"),
        }
    }

    #[test]
    fn unsupported_parameter_keys() {
        let description = r#"
Parameters:
  Secret:
    Type: String
    NoEcho: true
Resources:
  Bucket:
    Type: AWS::S3::Bucket
"#;
        match parse_str(description, Path::new(".")).err().unwrap() {
            Error::ParsingError(message) => assert!(message.contains("NoEcho")),
            _ => panic!("Expected `ParsingError` error"),
        }
    }

    #[test]
    fn unsupported_sections() {
        let description = r#"
Conditions:
  Prod: !Equals [a, b]
Resources:
  Bucket:
    Type: AWS::S3::Bucket
"#;
        match parse_str(description, Path::new(".")).err().unwrap() {
            Error::ParsingError(message) => assert!(message.contains("Conditions")),
            _ => panic!("Expected `ParsingError` error"),
        }
    }

    #[test]
    fn interpolates_files() {
        let dir = tempdir().unwrap();

        let mut script = File::create(dir.path().join("userdata.sh")).unwrap();
        write!(script, "#!/bin/bash\nbucket={{{{ ref('Bucket') }}}}\n").unwrap();

        let file_path = dir.path().join("template.yaml");
        let mut file = File::create(&file_path).unwrap();
        let description = r#"
Parameters:
  Bucket:
    Type: String
Resources:
  Host:
    Type: AWS::EC2::Instance
    Properties:
      UserData: !Base64
        Fn::Interpolate:
          File: userdata.sh
"#;
        write!(file, "{description}").unwrap();

        let template = parse(&file_path).unwrap();
        assert_eq!(
            template.resources[0].get("UserData"),
            Some(&Value::base64(Value::join(
                "",
                [
                    Value::from("#!/bin/bash\nbucket="),
                    Value::reference("Bucket"),
                    Value::from("\n"),
                ]
            )))
        );
    }

    #[test]
    fn missing_interpolated_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("template.yaml");
        let mut file = File::create(&file_path).unwrap();
        let description = r#"
Resources:
  Host:
    Type: AWS::EC2::Instance
    Properties:
      UserData: !Interpolate {File: missing.sh}
"#;
        write!(file, "{description}").unwrap();

        match parse(&file_path).err().unwrap() {
            Error::FileNotFound(path) => assert!(path.ends_with("missing.sh")),
            _ => panic!("Expected `FileNotFound` error"),
        }
    }
}
