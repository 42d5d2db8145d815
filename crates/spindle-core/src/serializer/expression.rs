//! Operand expressions to and from `[tag, payload]` pairs.
//!
//! Tags: `Attrib`, `PathAttrib`, `value`, or an operator kind name. An
//! operator's payload is the list of its serialized operands. Literal
//! values are written in their plain serde form; they are not capsuled
//! here.

use serde_json::Value as Json;
use spindle_types::operator::{Operand, Operator, OperatorKind};
use spindle_types::value::Value;

use super::SerializerError;
use super::record::ExprRecord;
use crate::codec::TypeRegistry;

pub const TAG_ATTRIB: &str = "Attrib";
pub const TAG_PATH_ATTRIB: &str = "PathAttrib";
pub const TAG_VALUE: &str = "value";

/// Serialize an operand and everything nested under it.
pub fn serialize_operand(operand: &Operand) -> Result<ExprRecord, SerializerError> {
    let record = match operand {
        Operand::Attrib(name) => ExprRecord(TAG_ATTRIB.to_string(), Json::String(name.clone())),
        Operand::PathAttrib(path) => {
            ExprRecord(TAG_PATH_ATTRIB.to_string(), Json::String(path.clone()))
        }
        Operand::Value(value) => ExprRecord(TAG_VALUE.to_string(), serde_json::to_value(value)?),
        Operand::Operator(op) => {
            let args = op
                .args
                .iter()
                .map(serialize_operand)
                .collect::<Result<Vec<_>, _>>()?;
            ExprRecord(op.kind.as_str().to_string(), serde_json::to_value(args)?)
        }
    };
    Ok(record)
}

/// Rebuild an operand. Unknown tags fail with `UnsupportedExpression`.
pub fn deserialize_operand(
    record: &ExprRecord,
    registry: &TypeRegistry,
) -> Result<Operand, SerializerError> {
    let ExprRecord(tag, payload) = record;
    match tag.as_str() {
        TAG_ATTRIB => Ok(Operand::Attrib(payload_str(tag, payload)?)),
        TAG_PATH_ATTRIB => Ok(Operand::PathAttrib(payload_str(tag, payload)?)),
        TAG_VALUE => {
            let value: Value = serde_json::from_value(payload.clone()).map_err(|e| {
                SerializerError::MalformedExpression {
                    tag: tag.clone(),
                    reason: e.to_string(),
                }
            })?;
            registry
                .check(&value)
                .map_err(SerializerError::corrupt("expression literal"))?;
            Ok(Operand::Value(value))
        }
        other => {
            let kind = OperatorKind::from_tag(other)
                .ok_or_else(|| SerializerError::UnsupportedExpression(other.to_string()))?;
            let nested: Vec<ExprRecord> = serde_json::from_value(payload.clone()).map_err(|e| {
                SerializerError::MalformedExpression {
                    tag: tag.clone(),
                    reason: e.to_string(),
                }
            })?;
            let args = nested
                .iter()
                .map(|arg| deserialize_operand(arg, registry))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Operand::Operator(Operator { kind, args }))
        }
    }
}

fn payload_str(tag: &str, payload: &Json) -> Result<String, SerializerError> {
    payload
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| SerializerError::MalformedExpression {
            tag: tag.to_string(),
            reason: format!("expected a string, got {payload}"),
        })
}
