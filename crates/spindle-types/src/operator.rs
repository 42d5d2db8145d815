//! Operand expressions used by conditions, thresholds and cardinalities.
//!
//! Expressions are pure descriptions. Evaluating them is the execution
//! engine's job; this crate only models their shape so they can be persisted.

use std::fmt;

use crate::value::Value;

/// Comparison and match operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    Equal,
    NotEqual,
    GreaterThan,
    LessThan,
    Match,
}

impl OperatorKind {
    pub const ALL: [OperatorKind; 5] = [
        Self::Equal,
        Self::NotEqual,
        Self::GreaterThan,
        Self::LessThan,
        Self::Match,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equal => "Equal",
            Self::NotEqual => "NotEqual",
            Self::GreaterThan => "GreaterThan",
            Self::LessThan => "LessThan",
            Self::Match => "Match",
        }
    }

    /// Resolve a kind tag. Dotted tags such as `operators.Equal` resolve by
    /// their last segment.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let short = tag.rsplit('.').next().unwrap_or(tag);
        Self::ALL.into_iter().find(|kind| kind.as_str() == short)
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operator applied to an ordered list of operands.
#[derive(Debug, Clone, PartialEq)]
pub struct Operator {
    pub kind: OperatorKind,
    pub args: Vec<Operand>,
}

/// A node in an operand expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Reference to a task variable by name.
    Attrib(String),
    /// Reference to a task variable by slash-separated path.
    PathAttrib(String),
    /// A literal opaque value.
    Value(Value),
    Operator(Operator),
}

impl Operand {
    pub fn attrib(name: impl Into<String>) -> Self {
        Self::Attrib(name.into())
    }

    pub fn path(path: impl Into<String>) -> Self {
        Self::PathAttrib(path.into())
    }

    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    pub fn op(kind: OperatorKind, args: Vec<Operand>) -> Self {
        Self::Operator(Operator { kind, args })
    }

    pub fn equal(left: Operand, right: Operand) -> Self {
        Self::op(OperatorKind::Equal, vec![left, right])
    }

    /// Names and paths of every variable the expression reads.
    pub fn attributes(&self) -> Vec<&str> {
        match self {
            Self::Attrib(name) | Self::PathAttrib(name) => vec![name.as_str()],
            Self::Value(_) => Vec::new(),
            Self::Operator(op) => op.args.iter().flat_map(Operand::attributes).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tag_plain_and_dotted() {
        assert_eq!(OperatorKind::from_tag("Equal"), Some(OperatorKind::Equal));
        assert_eq!(
            OperatorKind::from_tag("workflow.operators.GreaterThan"),
            Some(OperatorKind::GreaterThan)
        );
        assert_eq!(OperatorKind::from_tag("Between"), None);
    }

    #[test]
    fn test_attributes_collects_nested_references() {
        let expr = Operand::op(
            OperatorKind::Match,
            vec![
                Operand::attrib("status"),
                Operand::equal(Operand::path("order/total"), Operand::value(10)),
            ],
        );
        assert_eq!(expr.attributes(), vec!["status", "order/total"]);
    }
}
