//! Conversion between a context's own representation and [`Value`].

use std::collections::BTreeMap;

use num_bigint::BigInt;

use crate::pure_values::{Float, Integer};

use super::{
    error::{ExchangeError, Result},
    value::{Record, Reference, Sequence, Value},
};

/// A native type that can cross the exchange boundary.
///
/// `to_value` captures a snapshot at the time of the call; `from_value`
/// builds a fresh native value. Conversions never truncate: a value that
/// has no exact native counterpart fails with
/// [`ExchangeError::Unrepresentable`].
pub trait Marshal: Sized {
    fn to_value(&self) -> Result<Value>;

    fn from_value(value: Value) -> Result<Self>;
}

impl Marshal for Value {
    fn to_value(&self) -> Result<Value> {
        Ok(self.clone())
    }

    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl Marshal for Integer {
    fn to_value(&self) -> Result<Value> {
        Ok(Value::Integer(self.clone()))
    }

    fn from_value(value: Value) -> Result<Self> {
        value.as_integer().cloned()
    }
}

impl Marshal for i64 {
    fn to_value(&self) -> Result<Value> {
        Ok(Value::from(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        let integer = value.as_integer()?;
        integer
            .to_compact_integer()
            .ok_or_else(|| ExchangeError::unrepresentable("i64", format!("{integer} is out of range")))
    }
}

impl Marshal for BigInt {
    fn to_value(&self) -> Result<Value> {
        Ok(Value::Integer(Integer::from(self.clone())))
    }

    fn from_value(value: Value) -> Result<Self> {
        Ok(value.as_integer()?.to_bigint())
    }
}

impl Marshal for f64 {
    fn to_value(&self) -> Result<Value> {
        Ok(Value::Float(Float::new(*self)))
    }

    fn from_value(value: Value) -> Result<Self> {
        Ok(value.as_float()?.value())
    }
}

impl Marshal for String {
    fn to_value(&self) -> Result<Value> {
        Ok(Value::new_text(self.as_str()))
    }

    fn from_value(value: Value) -> Result<Self> {
        Ok(value.as_text()?.to_string())
    }
}

impl Marshal for Reference {
    fn to_value(&self) -> Result<Value> {
        Ok(Value::Reference(self.clone()))
    }

    fn from_value(value: Value) -> Result<Self> {
        value.as_reference().cloned()
    }
}

impl<T> Marshal for Vec<T>
where
    T: Marshal,
{
    fn to_value(&self) -> Result<Value> {
        let items = self
            .iter()
            .map(Marshal::to_value)
            .collect::<Result<Sequence>>()?;
        Ok(Value::Sequence(items))
    }

    fn from_value(value: Value) -> Result<Self> {
        value
            .as_sequence()?
            .iter()
            .map(|item| T::from_value(item.clone()))
            .collect()
    }
}

impl<T> Marshal for BTreeMap<String, T>
where
    T: Marshal,
{
    fn to_value(&self) -> Result<Value> {
        let fields = self
            .iter()
            .map(|(name, item)| Ok((name.as_str(), item.to_value()?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Value::Record(Record::from_iter(fields)))
    }

    fn from_value(value: Value) -> Result<Self> {
        value
            .as_record()?
            .iter()
            .map(|(name, item)| Ok((name.to_string(), T::from_value(item.clone())?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vectors_round_trip_in_order() -> anyhow::Result<()> {
        let native: Vec<i64> = vec![12, 257, 23];
        let value = native.to_value()?;
        assert_eq!(Vec::<i64>::from_value(value)?, native);
        Ok(())
    }

    #[test]
    fn large_integers_do_not_truncate_into_i64() {
        let big: BigInt = BigInt::from(u64::MAX) * 4u32;
        let value = big.to_value().unwrap();
        assert!(matches!(
            i64::from_value(value.clone()),
            Err(ExchangeError::Unrepresentable { .. })
        ));
        assert_eq!(BigInt::from_value(value).unwrap(), big);
    }

    #[test]
    fn maps_become_records() -> anyhow::Result<()> {
        let mut native = BTreeMap::new();
        native.insert("age".to_string(), "15".to_string());
        let value = native.to_value()?;
        assert_eq!(value.field("age")?, Value::from("15"));
        assert_eq!(BTreeMap::<String, String>::from_value(value)?, native);
        Ok(())
    }

    #[test]
    fn element_type_mismatch_fails() {
        let value = Value::from(Sequence::from_iter([Value::from(1), Value::from("x")]));
        assert!(matches!(
            Vec::<i64>::from_value(value),
            Err(ExchangeError::TypeMismatch { expected: "integer", .. })
        ));
    }
}
