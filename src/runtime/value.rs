use std::{fmt, sync::Arc};

use crate::pure_values::{Float, Integer};

use super::error::{ExchangeError, Result};

mod record;
mod reference;
mod sequence;

pub use record::Record;
pub use reference::{ForeignObject, NativeFunction, Reference, SharedRecord};
pub use sequence::Sequence;

/// The language-neutral representation of an exchanged datum.
///
/// Everything but [`Value::Reference`] is an immutable snapshot, so cloning
/// a value is cheap and never aliases mutable state.
#[derive(Clone, Debug)]
pub enum Value {
    Integer(Integer),
    Float(Float),
    Text(Arc<str>),
    Sequence(Sequence),
    Record(Record),
    Reference(Reference),
}

impl Value {
    pub fn new_text(s: impl Into<Arc<str>>) -> Self {
        Value::Text(s.into())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Sequence(_) => "sequence",
            Value::Record(_) => "record",
            Value::Reference(_) => "reference",
        }
    }

    pub fn as_integer(&self) -> Result<&Integer> {
        match self {
            Value::Integer(i) => Ok(i),
            other => Err(ExchangeError::type_mismatch("integer", other.type_name())),
        }
    }

    pub fn as_float(&self) -> Result<Float> {
        match self {
            Value::Float(f) => Ok(*f),
            other => Err(ExchangeError::type_mismatch("float", other.type_name())),
        }
    }

    pub fn as_text(&self) -> Result<&str> {
        match self {
            Value::Text(s) => Ok(s),
            other => Err(ExchangeError::type_mismatch("text", other.type_name())),
        }
    }

    pub fn as_sequence(&self) -> Result<&Sequence> {
        match self {
            Value::Sequence(s) => Ok(s),
            other => Err(ExchangeError::type_mismatch("sequence", other.type_name())),
        }
    }

    pub fn as_record(&self) -> Result<&Record> {
        match self {
            Value::Record(r) => Ok(r),
            other => Err(ExchangeError::type_mismatch("record", other.type_name())),
        }
    }

    pub fn as_reference(&self) -> Result<&Reference> {
        match self {
            Value::Reference(r) => Ok(r),
            other => Err(ExchangeError::type_mismatch("reference", other.type_name())),
        }
    }

    /// Looks up a field by name, forwarding to the origin object for
    /// references.
    pub fn field(&self, name: &str) -> Result<Value> {
        match self {
            Value::Record(r) => r.field(name).cloned(),
            Value::Reference(r) => r.get_field(name),
            other => Err(ExchangeError::type_mismatch("record", other.type_name())),
        }
    }

    pub fn index(&self, index: usize) -> Result<Value> {
        match self {
            Value::Sequence(s) => s.at(index).cloned(),
            Value::Reference(r) => r.get_index(index),
            other => Err(ExchangeError::type_mismatch("sequence", other.type_name())),
        }
    }

    /// Returns true if the two values are structurally equal, or are the
    /// same reference.
    pub fn ref_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(i1), Value::Integer(i2)) => i1 == i2,
            (Value::Float(f1), Value::Float(f2)) => f1 == f2,
            (Value::Text(s1), Value::Text(s2)) => s1 == s2,
            (Value::Sequence(s1), Value::Sequence(s2)) => s1 == s2,
            (Value::Record(r1), Value::Record(r2)) => r1 == r2,
            (Value::Reference(r1), Value::Reference(r2)) => Reference::ref_eq(r1, r2),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.ref_eq(other)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(Integer::from(i))
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(Integer::from(i))
    }
}

impl From<Integer> for Value {
    fn from(i: Integer) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(Float::new(f))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::new_text(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::new_text(s)
    }
}

impl From<Sequence> for Value {
    fn from(s: Sequence) -> Self {
        Value::Sequence(s)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(r)
    }
}

impl From<Reference> for Value {
    fn from(r: Reference) -> Self {
        Value::Reference(r)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Sequence(s) => {
                f.write_str("[")?;
                for (i, item) in s.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Record(r) => {
                f.write_str("{")?;
                for (i, (name, item)) in r.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {item}")?;
                }
                f.write_str("}")
            }
            Value::Reference(r) => write!(f, "<{} from {}>", r.type_name(), r.origin()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::context::ContextId;

    #[test]
    fn display_nests_aggregates() {
        let record = Record::from_iter([
            ("tet", Value::from(15)),
            ("aass", Value::from("qf")),
        ]);
        let value = Value::from(Sequence::from_iter([
            Value::from(12),
            Value::from("tser"),
            Value::from(record),
        ]));
        assert_eq!(value.to_string(), r#"[12, "tser", {tet: 15, aass: "qf"}]"#);
    }

    #[test]
    fn accessors_report_the_found_type() {
        let err = Value::from("test").as_integer().unwrap_err();
        assert_eq!(err.to_string(), "expected integer, found text");
    }

    #[test]
    fn field_on_record_misses_with_no_such_field() {
        let value = Value::from(Record::from_iter([("age", Value::from(15))]));
        assert_eq!(value.field("age").unwrap(), Value::from(15));
        assert!(matches!(
            value.field("aass"),
            Err(ExchangeError::NoSuchField { field, .. }) if field == "aass"
        ));
    }

    #[test]
    fn references_compare_by_identity() {
        let a = Reference::new(ContextId::HOST, SharedRecord::new());
        let b = Reference::new(ContextId::HOST, SharedRecord::new());
        assert_eq!(Value::from(a.clone()), Value::from(a.clone()));
        assert_ne!(Value::from(a), Value::from(b));
    }

    #[test]
    fn integers_and_floats_never_compare_equal() {
        assert_ne!(Value::from(1), Value::from(1.0));
    }
}
