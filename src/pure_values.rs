//! Scalar values that cross context boundaries unchanged.

use std::{fmt, str::FromStr, sync::Arc};

use num_bigint::BigInt;
use num_traits::ToPrimitive;

#[derive(Clone, Debug)]
enum IntegerInner {
    Compact(i64),
    Big(Arc<BigInt>),
}

/// An arbitrary precision integer.
///
/// Values that fit in an `i64` are always stored compactly, so two equal
/// integers always have the same representation.
#[derive(Clone, Debug)]
pub struct Integer(IntegerInner);

impl Integer {
    pub fn to_compact_integer(&self) -> Option<i64> {
        match &self.0 {
            IntegerInner::Compact(i) => Some(*i),
            IntegerInner::Big(i) => i.to_i64(),
        }
    }

    pub fn to_u64(&self) -> Option<u64> {
        match &self.0 {
            IntegerInner::Compact(i) => u64::try_from(*i).ok(),
            IntegerInner::Big(i) => i.to_u64(),
        }
    }

    pub fn to_bigint(&self) -> BigInt {
        match &self.0 {
            IntegerInner::Compact(i) => BigInt::from(*i),
            IntegerInner::Big(i) => (**i).clone(),
        }
    }

    pub fn add_owned(self, other: Self) -> Self {
        if let (IntegerInner::Compact(a), IntegerInner::Compact(b)) = (&self.0, &other.0) {
            if let Some(sum) = a.checked_add(*b) {
                return Integer::from(sum);
            }
        }
        Integer::from(self.to_bigint() + other.to_bigint())
    }
}

impl PartialEq for Integer {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (IntegerInner::Compact(i1), IntegerInner::Compact(i2)) => i1 == i2,
            (IntegerInner::Big(i1), IntegerInner::Big(i2)) => i1 == i2,
            _ => false,
        }
    }
}

impl Eq for Integer {}

impl From<i64> for Integer {
    fn from(i: i64) -> Self {
        Integer(IntegerInner::Compact(i))
    }
}

impl From<i32> for Integer {
    fn from(i: i32) -> Self {
        Integer::from(i64::from(i))
    }
}

impl From<u64> for Integer {
    fn from(i: u64) -> Self {
        match i64::try_from(i) {
            Ok(i) => Integer::from(i),
            Err(_) => Integer(IntegerInner::Big(Arc::new(BigInt::from(i)))),
        }
    }
}

impl From<BigInt> for Integer {
    fn from(i: BigInt) -> Self {
        Integer(if let Some(i) = i.to_i64() {
            IntegerInner::Compact(i)
        } else {
            IntegerInner::Big(Arc::new(i))
        })
    }
}

impl FromStr for Integer {
    type Err = num_bigint::ParseBigIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Integer::from(s.parse::<BigInt>()?))
    }
}

impl fmt::Display for Integer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            IntegerInner::Compact(i) => fmt::Display::fmt(i, f),
            IntegerInner::Big(i) => fmt::Display::fmt(i, f),
        }
    }
}

/// A 64-bit float compared by its bit pattern, so a NaN equals itself and
/// `0.0` differs from `-0.0`.
#[derive(Clone, Copy, Debug)]
pub struct Float(f64);

impl Float {
    pub fn new(value: f64) -> Self {
        Float(value)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl PartialEq for Float {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Float {}

impl PartialOrd for Float {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Float {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl From<f64> for Float {
    fn from(value: f64) -> Self {
        Float(value)
    }
}

impl fmt::Display for Float {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}
