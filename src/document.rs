use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::template::{Output, Parameter, Resource};

/// A validated template ready to be handed to CloudFormation
///
/// Sections and entries serialize in declaration order, so the same
/// declarations always give byte-identical JSON.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub(crate) format_version: String,
    pub(crate) description: Option<String>,
    pub(crate) parameters: Vec<Parameter>,
    pub(crate) resources: Vec<Resource>,
    pub(crate) outputs: Vec<Output>,

    /// Logical names of resources, dependencies first
    pub(crate) order: Vec<String>,
}

impl Document {
    /// Order in which the resources can be realized
    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn to_json(&self, pretty: bool) -> Result<String, serde_json::Error> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}

struct ParameterBody<'a>(&'a Parameter);

impl Serialize for ParameterBody<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let parameter = self.0;
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("Type", parameter.kind.as_str())?;

        if let Some(description) = &parameter.description {
            map.serialize_entry("Description", description)?;
        }

        if let Some(default) = &parameter.default {
            map.serialize_entry("Default", default)?;
        }

        if !parameter.allowed_values.is_empty() {
            map.serialize_entry("AllowedValues", &parameter.allowed_values)?;
        }

        map.end()
    }
}

struct Properties<'a>(&'a [(String, crate::value::Value)]);

impl Serialize for Properties<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

struct ResourceBody<'a>(&'a Resource);

impl Serialize for ResourceBody<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let resource = self.0;
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("Type", &resource.kind)?;

        if !resource.properties.is_empty() {
            map.serialize_entry("Properties", &Properties(&resource.properties))?;
        }

        // A single dependency is written as a plain string
        match resource.depends_on.as_slice() {
            [] => (),
            [single] => map.serialize_entry("DependsOn", single)?,
            many => map.serialize_entry("DependsOn", many)?,
        }

        map.end()
    }
}

struct OutputBody<'a>(&'a Output);

impl Serialize for OutputBody<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let output = self.0;
        let mut map = serializer.serialize_map(None)?;

        if let Some(description) = &output.description {
            map.serialize_entry("Description", description)?;
        }

        map.serialize_entry("Value", &output.value)?;
        map.end()
    }
}

/// Serializes `name -> body` entries of one section
struct Section<'a, T, B> {
    entries: &'a [T],
    name: fn(&T) -> &str,
    body: fn(&'a T) -> B,
}

impl<'a, T, B: Serialize> Serialize for Section<'a, T, B> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in self.entries {
            map.serialize_entry((self.name)(entry), &(self.body)(entry))?;
        }
        map.end()
    }
}

fn parameter_name(parameter: &Parameter) -> &str {
    &parameter.name
}

fn resource_name(resource: &Resource) -> &str {
    &resource.name
}

fn output_name(output: &Output) -> &str {
    &output.name
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("AWSTemplateFormatVersion", &self.format_version)?;

        if let Some(description) = &self.description {
            map.serialize_entry("Description", description)?;
        }

        if !self.parameters.is_empty() {
            map.serialize_entry(
                "Parameters",
                &Section {
                    entries: self.parameters.as_slice(),
                    name: parameter_name,
                    body: ParameterBody,
                },
            )?;
        }

        map.serialize_entry(
            "Resources",
            &Section {
                entries: self.resources.as_slice(),
                name: resource_name,
                body: ResourceBody,
            },
        )?;

        if !self.outputs.is_empty() {
            map.serialize_entry(
                "Outputs",
                &Section {
                    entries: self.outputs.as_slice(),
                    name: output_name,
                    body: OutputBody,
                },
            )?;
        }

        map.end()
    }
}
