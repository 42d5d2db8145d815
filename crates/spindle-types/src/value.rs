//! Opaque application values.
//!
//! The engine never inspects these: they are whatever the host application
//! placed into a data map, a define, a call argument or an expression leaf.
//! `Custom` carries application types by tag so that a decoder can refuse
//! types it does not know about.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Variable map used for task data, spec data, defines and instance data.
pub type DataMap = BTreeMap<String, Value>;

/// An engine-opaque application value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    /// Non-finite floats are written as `"inf"`, `"-inf"` or `"nan"`.
    Float(#[serde(with = "float_text")] f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// An application-defined type, identified by `type_tag`.
    Custom { type_tag: String, fields: Box<Value> },
}

impl Value {
    /// Wrap any serde-serializable application type as a tagged custom value.
    pub fn custom<T: Serialize>(type_tag: impl Into<String>, value: &T) -> Result<Self, serde_json::Error> {
        let fields = serde_json::to_value(value)?;
        Ok(Self::Custom {
            type_tag: type_tag.into(),
            fields: Box::new(Self::from(fields)),
        })
    }

    /// Rebuild an application type from a custom value carrying `type_tag`.
    ///
    /// Returns `None` when the value is not `Custom` or the tag differs.
    pub fn to_custom<T: DeserializeOwned>(&self, type_tag: &str) -> Option<Result<T, serde_json::Error>> {
        match self {
            Self::Custom { type_tag: tag, fields } if tag == type_tag => {
                Some(serde_json::from_value(fields.to_json()))
            }
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Every custom type tag referenced by this value, including nested ones.
    pub fn custom_tags(&self) -> Vec<&str> {
        let mut tags = Vec::new();
        let mut stack = vec![self];
        while let Some(value) = stack.pop() {
            match value {
                Self::List(items) => stack.extend(items.iter()),
                Self::Map(map) => stack.extend(map.values()),
                Self::Custom { type_tag, fields } => {
                    tags.push(type_tag.as_str());
                    stack.push(fields);
                }
                _ => {}
            }
        }
        tags
    }

    /// Plain JSON view of the value. Custom values become
    /// `{"type_tag": .., "fields": ..}` objects and bytes become arrays.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Self::Null => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Int(n) => Json::from(*n),
            Self::Float(f) => serde_json::Number::from_f64(*f).map_or(Json::Null, Json::Number),
            Self::Str(s) => Json::String(s.clone()),
            Self::Bytes(bytes) => Json::Array(bytes.iter().map(|b| Json::from(*b)).collect()),
            Self::List(items) => Json::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(map) => Json::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Self::Custom { type_tag, fields } => serde_json::json!({
                "type_tag": type_tag,
                "fields": fields.to_json(),
            }),
        }
    }
}

/// Finite floats as numbers, the rest as strings, since JSON numbers have
/// no infinity or NaN.
mod float_text {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("nan")
        } else if value.is_sign_positive() {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(value),
            Repr::Text(text) => match text.as_str() {
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                "nan" => Ok(f64::NAN),
                other => Err(D::Error::custom(format!("'{other}' is not a float"))),
            },
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or_default()),
            },
            Json::String(s) => Self::Str(s),
            Json::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Json::Object(map) => Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<DataMap> for Value {
    fn from(map: DataMap) -> Self {
        Self::Map(map)
    }
}
