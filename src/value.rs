use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// Names resolved by CloudFormation itself, usable in `Ref` without a declaration
pub const PSEUDO_PARAMETERS: [&str; 8] = [
    "AWS::AccountId",
    "AWS::NotificationARNs",
    "AWS::NoValue",
    "AWS::Partition",
    "AWS::Region",
    "AWS::StackId",
    "AWS::StackName",
    "AWS::URLSuffix",
];

pub fn is_pseudo_parameter(name: &str) -> bool {
    PSEUDO_PARAMETERS.contains(&name)
}

/// A property value of a resource or an output
///
/// Intrinsic functions are kept as a tree and are never evaluated locally,
/// they are only rendered into their `Fn::*` form on serialization.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    String(String),
    Number(serde_json::Number),
    Bool(bool),
    List(Vec<Value>),

    /// Property bag, entries keep insertion order
    Map(Vec<(String, Value)>),

    /// `{"Ref": name}` to a parameter, a resource or a pseudo parameter
    Ref(String),

    Call(Intrinsic),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Intrinsic {
    Join {
        delimiter: String,
        values: Vec<Value>,
    },
    Select {
        index: Box<Value>,
        list: Box<Value>,
    },
    Base64(Box<Value>),
    GetAtt {
        resource: String,
        attribute: String,
    },
    GetAZs(Box<Value>),
}

impl Intrinsic {
    /// Function name as it appears in the document
    pub fn name(&self) -> &'static str {
        match self {
            Intrinsic::Join { .. } => "Fn::Join",
            Intrinsic::Select { .. } => "Fn::Select",
            Intrinsic::Base64(_) => "Fn::Base64",
            Intrinsic::GetAtt { .. } => "Fn::GetAtt",
            Intrinsic::GetAZs(_) => "Fn::GetAZs",
        }
    }
}

impl Value {
    pub fn reference(name: impl Into<String>) -> Self {
        Value::Ref(name.into())
    }

    pub fn join<I, V>(delimiter: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::Call(Intrinsic::Join {
            delimiter: delimiter.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        })
    }

    pub fn select(index: impl Into<Value>, list: impl Into<Value>) -> Self {
        Value::Call(Intrinsic::Select {
            index: Box::new(index.into()),
            list: Box::new(list.into()),
        })
    }

    pub fn base64(value: impl Into<Value>) -> Self {
        Value::Call(Intrinsic::Base64(Box::new(value.into())))
    }

    pub fn get_att(resource: impl Into<String>, attribute: impl Into<String>) -> Self {
        Value::Call(Intrinsic::GetAtt {
            resource: resource.into(),
            attribute: attribute.into(),
        })
    }

    pub fn get_azs(region: impl Into<Value>) -> Self {
        Value::Call(Intrinsic::GetAZs(Box::new(region.into())))
    }

    pub fn region() -> Self {
        Value::reference("AWS::Region")
    }

    pub fn stack_id() -> Self {
        Value::reference("AWS::StackId")
    }

    pub fn stack_name() -> Self {
        Value::reference("AWS::StackName")
    }

    /// Build a property bag from ordered entries
    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    pub fn list<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::List(values.into_iter().map(Into::into).collect())
    }

    /// `{Key, Value}` entry of a `Tags` list
    pub fn tag(key: &str, value: impl Into<Value>) -> Self {
        Value::Map(vec![
            ("Key".to_string(), Value::from(key)),
            ("Value".to_string(), value.into()),
        ])
    }

    /// Whether the value can end up as a plain string once deployed
    pub fn is_string_like(&self) -> bool {
        match self {
            Value::String(_) | Value::Number(_) | Value::Ref(_) => true,
            Value::Call(Intrinsic::GetAZs(_)) => false,
            Value::Call(_) => true,
            Value::Bool(_) | Value::List(_) | Value::Map(_) => false,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value.into())
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Number(value.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Value::List(values)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::String(string) => serializer.serialize_str(string),
            Value::Number(number) => number.serialize(serializer),
            Value::Bool(boolean) => serializer.serialize_bool(*boolean),
            Value::List(values) => {
                let mut seq = serializer.serialize_seq(Some(values.len()))?;
                for value in values {
                    seq.serialize_element(value)?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Value::Ref(name) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Ref", name)?;
                map.end()
            }
            Value::Call(intrinsic) => intrinsic.serialize(serializer),
        }
    }
}

/// Two-element argument list, e.g. `[delimiter, [values]]`
struct Pair<'a, A: Serialize, B: Serialize>(&'a A, &'a B);

impl<A: Serialize, B: Serialize> Serialize for Pair<'_, A, B> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(2))?;
        seq.serialize_element(self.0)?;
        seq.serialize_element(self.1)?;
        seq.end()
    }
}

impl Serialize for Intrinsic {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;

        match self {
            Intrinsic::Join { delimiter, values } => {
                map.serialize_entry(self.name(), &Pair(delimiter, values))?
            }
            Intrinsic::Select { index, list } => {
                map.serialize_entry(self.name(), &Pair(index.as_ref(), list.as_ref()))?
            }
            Intrinsic::Base64(value) | Intrinsic::GetAZs(value) => {
                map.serialize_entry(self.name(), value.as_ref())?
            }
            Intrinsic::GetAtt {
                resource,
                attribute,
            } => map.serialize_entry(self.name(), &Pair(resource, attribute))?,
        }

        map.end()
    }
}
