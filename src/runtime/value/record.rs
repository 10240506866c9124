use std::sync::Arc;

use crate::runtime::{
    error::{ExchangeError, Result},
    value::Value,
};

/// An immutable record of uniquely named fields, kept in insertion order.
///
/// Equality ignores field order: two records are equal when they hold the
/// same names bound to equal values.
#[derive(Clone, Debug)]
pub struct Record {
    fields: Arc<[(Arc<str>, Value)]>,
}

impl Record {
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| &**field == name)
            .map(|(_, value)| value)
    }

    pub fn field(&self, name: &str) -> Result<&Value> {
        self.get(name).ok_or_else(|| ExchangeError::NoSuchField {
            field: name.to_string(),
            target: "record".to_string(),
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| &**name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (&**name, value))
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(name, value)| other.get(name) == Some(value))
    }
}

/// A repeated field keeps its first position and its last value.
impl<K> FromIterator<(K, Value)> for Record
where
    K: Into<Arc<str>>,
{
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
    {
        let mut fields: Vec<(Arc<str>, Value)> = Vec::new();
        for (name, value) in iter {
            let name = name.into();
            match fields.iter_mut().find(|(existing, _)| *existing == name) {
                Some(slot) => slot.1 = value,
                None => fields.push((name, value)),
            }
        }
        Record {
            fields: fields.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_field_keeps_position_and_last_value() {
        let record = Record::from_iter([
            ("a", Value::from(1)),
            ("b", Value::from(2)),
            ("a", Value::from(3)),
        ]);
        assert_eq!(record.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(record.get("a"), Some(&Value::from(3)));
    }

    #[test]
    fn field_order_does_not_matter_for_equality() {
        let ab = Record::from_iter([("a", Value::from(1)), ("b", Value::from(2))]);
        let ba = Record::from_iter([("b", Value::from(2)), ("a", Value::from(1))]);
        assert_eq!(ab, ba);
        assert_eq!(ab.names().collect::<Vec<_>>(), vec!["a", "b"]);

        let other = Record::from_iter([("a", Value::from(1)), ("c", Value::from(2))]);
        assert_ne!(ab, other);
        let shorter = Record::from_iter([("a", Value::from(1))]);
        assert_ne!(ab, shorter);
    }
}
