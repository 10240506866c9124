use std::{collections::BTreeMap, fmt};

use serde_json::Number;

use crate::{
    pure_values::{Float, Integer},
    runtime::{
        value::{Record, Reference, Sequence},
        ExchangeError, Marshal, Result, Value,
    },
};

const LANGUAGE: &str = "jsonscript";

/// A jsonscript value: the JSON data model, plus references to objects
/// owned by some context. A reference may sit anywhere inside an array or
/// object.
#[derive(Clone, Debug)]
pub enum Item {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Item>),
    /// Keys are kept sorted, as JSON objects are.
    Object(BTreeMap<String, Item>),
    Foreign(Reference),
}

impl Item {
    pub fn type_name(&self) -> &'static str {
        match self {
            Item::Null => "null",
            Item::Bool(_) => "boolean",
            Item::Number(_) => "number",
            Item::String(_) => "string",
            Item::Array(_) => "array",
            Item::Object(_) => "object",
            Item::Foreign(_) => "foreign object",
        }
    }

    pub fn field(&self, name: &str) -> Result<Item> {
        match self {
            Item::Object(map) => map
                .get(name)
                .cloned()
                .ok_or_else(|| ExchangeError::NoSuchField {
                    field: name.to_string(),
                    target: "object".to_string(),
                }),
            Item::Foreign(reference) => Item::from_value(reference.get_field(name)?),
            other => Err(ExchangeError::type_mismatch("object", other.type_name())),
        }
    }

    pub fn index(&self, index: usize) -> Result<Item> {
        match self {
            Item::Array(items) => items
                .get(index)
                .cloned()
                .ok_or(ExchangeError::IndexOutOfBounds {
                    index,
                    len: items.len(),
                }),
            Item::Foreign(reference) => Item::from_value(reference.get_index(index)?),
            other => Err(ExchangeError::type_mismatch("array", other.type_name())),
        }
    }

    /// How `print` renders the item: strings are written without quotes.
    pub fn to_display_string(&self) -> String {
        match self {
            Item::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Value> for Item {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Item::Null,
            serde_json::Value::Bool(b) => Item::Bool(b),
            serde_json::Value::Number(n) => Item::Number(n),
            serde_json::Value::String(s) => Item::String(s),
            serde_json::Value::Array(items) => {
                Item::Array(items.into_iter().map(Item::from).collect())
            }
            serde_json::Value::Object(map) => Item::Object(
                map.into_iter()
                    .map(|(name, item)| (name, Item::from(item)))
                    .collect(),
            ),
        }
    }
}

fn number_to_value(n: &Number) -> Result<Value> {
    if let Some(i) = n.as_i64() {
        Ok(Value::from(i))
    } else if let Some(u) = n.as_u64() {
        Ok(Value::Integer(Integer::from(u)))
    } else {
        n.as_f64()
            .map(Value::from)
            .ok_or_else(|| ExchangeError::unrepresentable("exchange values", n.to_string()))
    }
}

fn integer_to_number(i: &Integer) -> Result<Number> {
    if let Some(n) = i.to_compact_integer() {
        Ok(Number::from(n))
    } else if let Some(n) = i.to_u64() {
        Ok(Number::from(n))
    } else {
        Err(ExchangeError::unrepresentable(
            LANGUAGE,
            format!("integer {i} is outside the JSON number range"),
        ))
    }
}

fn float_to_number(f: Float) -> Result<Number> {
    Number::from_f64(f.value())
        .ok_or_else(|| ExchangeError::unrepresentable(LANGUAGE, format!("float {f} is not finite")))
}

impl Marshal for Item {
    fn to_value(&self) -> Result<Value> {
        match self {
            Item::Null => Err(ExchangeError::unrepresentable(
                "exchange values",
                "null has no counterpart",
            )),
            Item::Bool(b) => Err(ExchangeError::unrepresentable(
                "exchange values",
                format!("boolean {b} has no counterpart"),
            )),
            Item::Number(n) => number_to_value(n),
            Item::String(s) => Ok(Value::new_text(s.as_str())),
            Item::Array(items) => Ok(Value::Sequence(
                items.iter().map(Item::to_value).collect::<Result<Sequence>>()?,
            )),
            Item::Object(map) => {
                let fields = map
                    .iter()
                    .map(|(name, item)| Ok((name.as_str(), item.to_value()?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Record(Record::from_iter(fields)))
            }
            Item::Foreign(reference) => Ok(Value::Reference(reference.clone())),
        }
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Integer(i) => Ok(Item::Number(integer_to_number(&i)?)),
            Value::Float(f) => Ok(Item::Number(float_to_number(f)?)),
            Value::Text(s) => Ok(Item::String(s.to_string())),
            Value::Sequence(items) => Ok(Item::Array(
                items
                    .iter()
                    .map(|item| Item::from_value(item.clone()))
                    .collect::<Result<_>>()?,
            )),
            Value::Record(record) => Ok(Item::Object(
                record
                    .iter()
                    .map(|(name, item)| Ok((name.to_string(), Item::from_value(item.clone())?)))
                    .collect::<Result<_>>()?,
            )),
            Value::Reference(reference) => Ok(Item::Foreign(reference)),
        }
    }
}

/// Compact JSON, with references written as `<type from ctx#N>`.
impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Item::Null => f.write_str("null"),
            Item::Bool(b) => write!(f, "{b}"),
            Item::Number(n) => write!(f, "{n}"),
            Item::String(s) => write!(f, "{}", serde_json::Value::from(s.as_str())),
            Item::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Item::Object(map) => {
                f.write_str("{")?;
                for (i, (name, item)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}:{item}", serde_json::Value::from(name.as_str()))?;
                }
                f.write_str("}")
            }
            Item::Foreign(reference) => {
                write!(f, "<{} from {}>", reference.type_name(), reference.origin())
            }
        }
    }
}
