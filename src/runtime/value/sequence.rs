use std::sync::Arc;

use crate::runtime::{
    error::{ExchangeError, Result},
    value::Value,
};

/// An immutable ordered list of values.
#[derive(Clone, Debug, PartialEq)]
pub struct Sequence {
    items: Arc<[Value]>,
}

impl Sequence {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    pub fn at(&self, index: usize) -> Result<&Value> {
        self.items.get(index).ok_or(ExchangeError::IndexOutOfBounds {
            index,
            len: self.items.len(),
        })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.items
    }
}

impl FromIterator<Value> for Sequence {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        Sequence {
            items: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<Value>> for Sequence {
    fn from(items: Vec<Value>) -> Self {
        Sequence {
            items: items.into(),
        }
    }
}

impl<'a> IntoIterator for &'a Sequence {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_order_and_length() {
        let seq = Sequence::from_iter([12, 257, 23].map(Value::from));
        assert_eq!(seq.len(), 3);
        let items: Vec<_> = seq
            .iter()
            .map(|v| v.as_integer().unwrap().to_compact_integer())
            .collect();
        assert_eq!(items, vec![Some(12), Some(257), Some(23)]);
    }

    #[test]
    fn out_of_bounds_reports_length() {
        let seq = Sequence::from(vec![Value::from(1)]);
        assert!(matches!(
            seq.at(4),
            Err(ExchangeError::IndexOutOfBounds { index: 4, len: 1 })
        ));
    }
}
