use std::fmt;

use crate::{
    pure_values::{Float, Integer},
    runtime::{
        value::{Record, Reference, Sequence},
        ExchangeError, Marshal, Result, Value,
    },
};

/// A lisp value as held in a session's local bindings.
#[derive(Clone, Debug)]
pub enum Datum {
    Nil,
    Bool(bool),
    Integer(Integer),
    Float(f64),
    Str(String),
    List(Vec<Datum>),
    /// Fields in the order they were written.
    Record(Vec<(String, Datum)>),
    /// An object living in some context, reached by reference.
    Foreign(Reference),
}

impl Datum {
    pub fn type_name(&self) -> &'static str {
        match self {
            Datum::Nil => "nil",
            Datum::Bool(_) => "bool",
            Datum::Integer(_) => "integer",
            Datum::Float(_) => "float",
            Datum::Str(_) => "string",
            Datum::List(_) => "list",
            Datum::Record(_) => "record",
            Datum::Foreign(_) => "foreign object",
        }
    }

    pub fn field(&self, name: &str) -> Result<Datum> {
        match self {
            Datum::Record(fields) => fields
                .iter()
                .find(|(field, _)| field == name)
                .map(|(_, datum)| datum.clone())
                .ok_or_else(|| ExchangeError::NoSuchField {
                    field: name.to_string(),
                    target: "record".to_string(),
                }),
            Datum::Foreign(reference) => Datum::from_value(reference.get_field(name)?),
            other => Err(ExchangeError::type_mismatch("record", other.type_name())),
        }
    }

    pub fn nth(&self, index: usize) -> Result<Datum> {
        match self {
            Datum::List(items) => items
                .get(index)
                .cloned()
                .ok_or(ExchangeError::IndexOutOfBounds {
                    index,
                    len: items.len(),
                }),
            Datum::Foreign(reference) => Datum::from_value(reference.get_index(index)?),
            other => Err(ExchangeError::type_mismatch("list", other.type_name())),
        }
    }

    pub fn length(&self) -> Result<usize> {
        match self {
            Datum::List(items) => Ok(items.len()),
            Datum::Record(fields) => Ok(fields.len()),
            Datum::Str(s) => Ok(s.chars().count()),
            Datum::Foreign(reference) => reference
                .len()
                .ok_or_else(|| ExchangeError::type_mismatch("list", reference.type_name())),
            other => Err(ExchangeError::type_mismatch("list", other.type_name())),
        }
    }

    /// Renders the datum the way `print` shows it: strings unquoted at the
    /// top level.
    pub fn to_display_string(&self) -> String {
        match self {
            Datum::Str(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl Marshal for Datum {
    fn to_value(&self) -> Result<Value> {
        match self {
            Datum::Nil => Err(ExchangeError::unrepresentable(
                "exchange values",
                "nil has no counterpart",
            )),
            Datum::Bool(b) => Err(ExchangeError::unrepresentable(
                "exchange values",
                format!("boolean {b} has no counterpart"),
            )),
            Datum::Integer(i) => Ok(Value::Integer(i.clone())),
            Datum::Float(f) => Ok(Value::Float(Float::new(*f))),
            Datum::Str(s) => Ok(Value::new_text(s.as_str())),
            Datum::List(items) => Ok(Value::Sequence(
                items.iter().map(Marshal::to_value).collect::<Result<Sequence>>()?,
            )),
            Datum::Record(fields) => {
                let fields = fields
                    .iter()
                    .map(|(name, datum)| Ok((name.as_str(), datum.to_value()?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Record(Record::from_iter(fields)))
            }
            Datum::Foreign(reference) => Ok(Value::Reference(reference.clone())),
        }
    }

    fn from_value(value: Value) -> Result<Self> {
        Ok(match value {
            Value::Integer(i) => Datum::Integer(i),
            Value::Float(f) => Datum::Float(f.value()),
            Value::Text(s) => Datum::Str(s.to_string()),
            Value::Sequence(items) => Datum::List(
                items
                    .iter()
                    .map(|item| Datum::from_value(item.clone()))
                    .collect::<Result<_>>()?,
            ),
            Value::Record(record) => Datum::Record(
                record
                    .iter()
                    .map(|(name, item)| Ok((name.to_string(), Datum::from_value(item.clone())?)))
                    .collect::<Result<_>>()?,
            ),
            Value::Reference(reference) => Datum::Foreign(reference),
        })
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Nil => f.write_str("nil"),
            Datum::Bool(true) => f.write_str("#t"),
            Datum::Bool(false) => f.write_str("#f"),
            Datum::Integer(i) => write!(f, "{i}"),
            Datum::Float(x) => write!(f, "{}", Float::new(*x)),
            Datum::Str(s) => write!(f, "{s:?}"),
            Datum::List(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
            Datum::Record(fields) => {
                f.write_str("#record(")?;
                for (i, (name, item)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "({name} {item})")?;
                }
                f.write_str(")")
            }
            Datum::Foreign(reference) => {
                write!(f, "#<{} from {}>", reference.type_name(), reference.origin())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_lisp_syntax() {
        let datum = Datum::List(vec![
            Datum::Integer(Integer::from(12)),
            Datum::Str("tser".to_string()),
            Datum::Record(vec![("tet".to_string(), Datum::Integer(Integer::from(15)))]),
            Datum::Float(2.0),
        ]);
        assert_eq!(datum.to_string(), r#"(12 "tser" #record((tet 15)) 2.0)"#);
    }

    #[test]
    fn booleans_and_nil_cannot_be_exported() {
        assert!(matches!(
            Datum::Bool(true).to_value(),
            Err(ExchangeError::Unrepresentable { .. })
        ));
        assert!(matches!(
            Datum::List(vec![Datum::Nil]).to_value(),
            Err(ExchangeError::Unrepresentable { .. })
        ));
    }

    #[test]
    fn big_integers_survive_conversion() -> anyhow::Result<()> {
        let big: Integer = "123456789012345678901234567890".parse()?;
        let value = Datum::Integer(big.clone()).to_value()?;
        let Datum::Integer(back) = Datum::from_value(value)? else {
            anyhow::bail!("not an integer");
        };
        assert_eq!(back, big);
        Ok(())
    }

    #[test]
    fn record_fields_keep_their_order() -> anyhow::Result<()> {
        let value = Value::Record(Record::from_iter([
            ("tet", Value::from(15)),
            ("aass", Value::from("qf")),
        ]));
        let datum = Datum::from_value(value)?;
        assert_eq!(datum.to_string(), r#"#record((tet 15) (aass "qf"))"#);
        assert!(matches!(
            datum.field("missing"),
            Err(ExchangeError::NoSuchField { .. })
        ));
        Ok(())
    }
}
