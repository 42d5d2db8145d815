//! Value capsules: text-safe encoding of opaque application values.
//!
//! Two stages: serde_json captures the full value shape (including the
//! type tag of `Value::Custom`), then standard base64 makes the result
//! safe to embed in any structured text format.
//!
//! Decoding checks custom type tags against a `TypeRegistry`, so a record
//! written by an application with types this process does not know about
//! fails loudly instead of producing half-understood values.

use std::collections::{BTreeMap, HashSet};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde::de::DeserializeOwned;
use spindle_types::spec::Assign;
use spindle_types::value::{DataMap, Value};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors from encoding or decoding a capsule.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("capsule is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("capsule payload is malformed: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("value references unavailable type '{0}'")]
    UnknownType(String),
}

// ---------------------------------------------------------------------------
// TypeRegistry
// ---------------------------------------------------------------------------

/// Custom value type tags this process can reconstruct.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    tags: HashSet<String>,
    permissive: bool,
}

impl TypeRegistry {
    /// A registry that accepts only the tags registered on it.
    pub fn strict() -> Self {
        Self::default()
    }

    /// A registry that accepts every tag.
    pub fn permissive() -> Self {
        Self {
            tags: HashSet::new(),
            permissive: true,
        }
    }

    pub fn with_type(mut self, tag: impl Into<String>) -> Self {
        self.register(tag);
        self
    }

    pub fn register(&mut self, tag: impl Into<String>) {
        self.tags.insert(tag.into());
    }

    pub fn knows(&self, tag: &str) -> bool {
        self.permissive || self.tags.contains(tag)
    }

    /// Fail on the first custom tag in `value` that is not known.
    pub fn check(&self, value: &Value) -> Result<(), CodecError> {
        if self.permissive {
            return Ok(());
        }
        match value.custom_tags().into_iter().find(|tag| !self.knows(tag)) {
            Some(tag) => Err(CodecError::UnknownType(tag.to_string())),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// ValueCodec
// ---------------------------------------------------------------------------

/// Encoder/decoder for value capsules.
#[derive(Debug, Clone)]
pub struct ValueCodec {
    registry: TypeRegistry,
}

impl Default for ValueCodec {
    fn default() -> Self {
        Self::new(TypeRegistry::permissive())
    }
}

impl ValueCodec {
    pub fn new(registry: TypeRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Encode any serializable value into a capsule.
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, CodecError> {
        let bytes = serde_json::to_vec(value)?;
        Ok(STANDARD.encode(bytes))
    }

    /// Decode a capsule into `T` without a type-registry check.
    pub fn decode<T: DeserializeOwned>(&self, capsule: &str) -> Result<T, CodecError> {
        let bytes = STANDARD.decode(capsule)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn encode_value(&self, value: &Value) -> Result<String, CodecError> {
        self.encode(value)
    }

    /// Decode a capsule into a `Value`, rejecting unknown custom types.
    pub fn decode_value(&self, capsule: &str) -> Result<Value, CodecError> {
        let value: Value = self.decode(capsule)?;
        self.registry.check(&value)?;
        Ok(value)
    }

    /// Encode every value of a map, keeping the keys as plain text.
    pub fn encode_map(&self, map: &DataMap) -> Result<BTreeMap<String, String>, CodecError> {
        map.iter()
            .map(|(key, value)| Ok((key.clone(), self.encode_value(value)?)))
            .collect()
    }

    pub fn decode_map(&self, map: &BTreeMap<String, String>) -> Result<DataMap, CodecError> {
        map.iter()
            .map(|(key, capsule)| Ok((key.clone(), self.decode_value(capsule)?)))
            .collect()
    }

    pub fn encode_list(&self, values: &[Value]) -> Result<Vec<String>, CodecError> {
        values.iter().map(|v| self.encode_value(v)).collect()
    }

    pub fn decode_list(&self, capsules: &[String]) -> Result<Vec<Value>, CodecError> {
        capsules.iter().map(|c| self.decode_value(c)).collect()
    }

    pub fn encode_assigns(&self, assigns: &[Assign]) -> Result<Vec<String>, CodecError> {
        assigns.iter().map(|a| self.encode(a)).collect()
    }

    pub fn decode_assigns(&self, capsules: &[String]) -> Result<Vec<Assign>, CodecError> {
        capsules
            .iter()
            .map(|capsule| {
                let assign: Assign = self.decode(capsule)?;
                if let Some(right) = &assign.right {
                    self.registry.check(right)?;
                }
                Ok(assign)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Invoice {
        number: u64,
        lines: Vec<(String, f64)>,
    }

    fn sample_tree() -> Value {
        let mut inner = DataMap::new();
        inner.insert("flag".to_string(), Value::Bool(true));
        inner.insert("blob".to_string(), Value::Bytes(vec![0, 255, 7]));
        Value::List(vec![
            Value::Null,
            Value::Int(-42),
            Value::Float(2.5),
            Value::Str("naïve \"quoted\"".to_string()),
            Value::Map(inner),
        ])
    }

    // -----------------------------------------------------------------------
    // Round trips
    // -----------------------------------------------------------------------

    #[test]
    fn test_nested_value_round_trips() {
        let codec = ValueCodec::default();
        let value = sample_tree();
        let capsule = codec.encode_value(&value).unwrap();
        assert_eq!(codec.decode_value(&capsule).unwrap(), value);
    }

    #[test]
    fn test_non_finite_floats_round_trip() {
        let codec = ValueCodec::default();
        for value in [f64::INFINITY, f64::NEG_INFINITY] {
            let capsule = codec.encode_value(&Value::Float(value)).unwrap();
            assert_eq!(codec.decode_value(&capsule).unwrap(), Value::Float(value));
        }

        let mut map = DataMap::new();
        map.insert("ratio".to_string(), Value::Float(f64::NAN));
        let decoded = codec.decode_map(&codec.encode_map(&map).unwrap()).unwrap();
        assert!(matches!(decoded["ratio"], Value::Float(f) if f.is_nan()));
    }

    #[test]
    fn test_capsule_is_text_safe() {
        let codec = ValueCodec::default();
        let capsule = codec.encode_value(&sample_tree()).unwrap();
        assert!(capsule
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=')));
    }

    #[test]
    fn test_custom_type_round_trips() {
        let codec = ValueCodec::new(TypeRegistry::strict().with_type("billing.Invoice"));
        let invoice = Invoice {
            number: 17,
            lines: vec![("widget".to_string(), 9.5)],
        };
        let value = Value::custom("billing.Invoice", &invoice).unwrap();
        let decoded = codec.decode_value(&codec.encode_value(&value).unwrap()).unwrap();
        let back: Invoice = decoded.to_custom("billing.Invoice").unwrap().unwrap();
        assert_eq!(back, invoice);
    }

    #[test]
    fn test_map_and_list_helpers() {
        let codec = ValueCodec::default();
        let mut map = DataMap::new();
        map.insert("a".to_string(), Value::Int(1));
        map.insert("b".to_string(), sample_tree());
        let encoded = codec.encode_map(&map).unwrap();
        assert_eq!(encoded.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(codec.decode_map(&encoded).unwrap(), map);

        let list = vec![Value::Str("x".to_string()), Value::Int(2)];
        assert_eq!(codec.decode_list(&codec.encode_list(&list).unwrap()).unwrap(), list);
    }

    #[test]
    fn test_assign_round_trips() {
        let codec = ValueCodec::default();
        let assigns = vec![Assign::from_attribute("out", "in"), Assign::literal("n", 3)];
        let encoded = codec.encode_assigns(&assigns).unwrap();
        assert_eq!(codec.decode_assigns(&encoded).unwrap(), assigns);
    }

    // -----------------------------------------------------------------------
    // Failures
    // -----------------------------------------------------------------------

    #[test]
    fn test_decode_rejects_invalid_base64() {
        let codec = ValueCodec::default();
        let err = codec.decode_value("not base64!!").unwrap_err();
        assert!(matches!(err, CodecError::Base64(_)));
    }

    #[test]
    fn test_decode_rejects_malformed_payload() {
        let codec = ValueCodec::default();
        let capsule = STANDARD.encode(b"{\"nope\": 1}");
        let err = codec.decode_value(&capsule).unwrap_err();
        assert!(matches!(err, CodecError::Payload(_)));
    }

    #[test]
    fn test_decode_rejects_unknown_custom_type() {
        let writer = ValueCodec::default();
        let reader = ValueCodec::new(TypeRegistry::strict().with_type("billing.Invoice"));
        let value = Value::List(vec![Value::Custom {
            type_tag: "billing.Refund".to_string(),
            fields: Box::new(Value::Null),
        }]);
        let capsule = writer.encode_value(&value).unwrap();
        let err = reader.decode_value(&capsule).unwrap_err();
        assert!(matches!(err, CodecError::UnknownType(tag) if tag == "billing.Refund"));
    }
}
