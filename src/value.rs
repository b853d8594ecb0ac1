//! Dynamically-typed field values and key tuples.
//!
//! A [`Value`] is what a row field holds: an integer, a float, a boolean, a string, a
//! timestamp or a short list of values (for example a `[lon, lat]` coordinate pair).
//!
//! Values carry a **total order** so they can be sorted, grouped and merge-joined:
//! - integers and floats compare numerically with each other (`Int(1) == Float(1.0)`),
//!   floats use the total order of [`OrderedFloat`] (`NaN` sorts last)
//! - values of different kinds order by kind: bool < number < string < timestamp < list
//! - lists compare lexicographically
//!
//! [`KeyTuple`] is the ordered tuple of values extracted from a row for a list of key
//! fields; its derived lexicographic order is the order used by sort, group-by and join.

use crate::error::{Error, Result};
use chrono::NaiveDateTime;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// ISO-8601 layout used to render timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Timestamp(NaiveDateTime),
    List(Vec<Value>),
}

impl Value {
    fn kind_rank(&self) -> u8 {
        match self {
            Value::Bool(_) => 0,
            Value::Int(_) | Value::Float(_) => 1,
            Value::Str(_) => 2,
            Value::Timestamp(_) => 3,
            Value::List(_) => 4,
        }
    }

    /// Short name of the value's kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Timestamp(_) => "timestamp",
            Value::List(_) => "list",
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(Error::Type(format!("expected string, got {}", other.kind()))),
        }
    }

    pub fn as_i64(&self) -> Result<i64> {
        match self {
            Value::Int(i) => Ok(*i),
            other => Err(Error::Type(format!("expected int, got {}", other.kind()))),
        }
    }

    /// Numeric view of the value; integers widen to `f64`.
    pub fn as_f64(&self) -> Result<f64> {
        match self {
            Value::Int(i) => Ok(*i as f64),
            Value::Float(f) => Ok(*f),
            other => Err(Error::Type(format!("expected number, got {}", other.kind()))),
        }
    }

    pub fn as_list(&self) -> Result<&[Value]> {
        match self {
            Value::List(items) => Ok(items),
            other => Err(Error::Type(format!("expected list, got {}", other.kind()))),
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Numeric addition. Two integers stay integral; anything involving a float is a float.
    ///
    /// # Errors
    /// [`Error::Type`] if either side is not a number or integer addition overflows.
    pub fn checked_add(&self, other: &Value) -> Result<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a
                .checked_add(*b)
                .map(Value::Int)
                .ok_or_else(|| Error::Type(format!("integer overflow adding {a} and {b}"))),
            (a, b) => Ok(Value::Float(a.as_f64()? + b.as_f64()?)),
        }
    }

    /// Numeric multiplication with the same integer/float rules as [`Value::checked_add`].
    ///
    /// # Errors
    /// [`Error::Type`] if either side is not a number or integer multiplication overflows.
    pub fn checked_mul(&self, other: &Value) -> Result<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a
                .checked_mul(*b)
                .map(Value::Int)
                .ok_or_else(|| Error::Type(format!("integer overflow multiplying {a} and {b}"))),
            (a, b) => Ok(Value::Float(a.as_f64()? * b.as_f64()?)),
        }
    }

    /// Convert a parsed JSON value into a `Value`.
    ///
    /// Integral JSON numbers become [`Value::Int`], other numbers [`Value::Float`].
    /// Objects and `null` have no `Value` counterpart.
    ///
    /// # Errors
    /// [`Error::Type`] for `null` or nested objects.
    pub fn from_json(json: serde_json::Value) -> Result<Value> {
        match json {
            serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Value::Int(i)),
                None => n
                    .as_f64()
                    .map(Value::Float)
                    .ok_or_else(|| Error::Type(format!("unrepresentable number {n}"))),
            },
            serde_json::Value::String(s) => Ok(Value::Str(s)),
            serde_json::Value::Array(items) => items
                .into_iter()
                .map(Value::from_json)
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            serde_json::Value::Null => Err(Error::Type("null values are not supported".into())),
            serde_json::Value::Object(_) => {
                Err(Error::Type("nested objects are not supported".into()))
            }
        }
    }

    /// Render as JSON; timestamps become ISO-8601 strings and non-finite floats `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Timestamp(ts) => {
                serde_json::Value::String(ts.format(TIMESTAMP_FORMAT).to_string())
            }
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
        }
    }
}

/// 2^63 as a float: the first float above every `i64`.
const I64_END: f64 = 9_223_372_036_854_775_808.0;

/// Exact integer-to-float comparison; `NaN` is above every integer.
fn cmp_int_float(i: i64, f: f64) -> Ordering {
    if f.is_nan() || f >= I64_END {
        return Ordering::Less;
    }
    if f < -I64_END {
        return Ordering::Greater;
    }
    let whole = f.trunc();
    // in range, so the cast is exact
    match i.cmp(&(whole as i64)) {
        Ordering::Equal => OrderedFloat(0.0).cmp(&OrderedFloat(f - whole)),
        unequal => unequal,
    }
}

/// The `i64` equal to `f`, if there is one.
fn float_as_exact_int(f: f64) -> Option<i64> {
    (f.fract() == 0.0 && (-I64_END..I64_END).contains(&f)).then(|| f as i64)
}

fn cmp_numbers(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Int(x), Value::Float(y)) => cmp_int_float(*x, *y),
        (Value::Float(x), Value::Int(y)) => cmp_int_float(*y, *x).reverse(),
        (Value::Float(x), Value::Float(y)) => OrderedFloat(*x).cmp(&OrderedFloat(*y)),
        _ => unreachable!("cmp_numbers called on non-numeric values"),
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (a, b) if a.is_number() && b.is_number() => cmp_numbers(a, b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => a.cmp(b),
            (a, b) => a.kind_rank().cmp(&b.kind_rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

// Must agree with `Eq`: integral floats hash as the integer they equal.
impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind_rank().hash(state);
        match self {
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => match float_as_exact_int(*f) {
                Some(i) => i.hash(state),
                None => OrderedFloat(*f).hash(state),
            },
            Value::Str(s) => s.hash(state),
            Value::Timestamp(ts) => ts.hash(state),
            Value::List(items) => items.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        i64::try_from(v).map_or(Value::Float(v as f64), Value::Int)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

/// Values of a row's key fields, in key order.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KeyTuple(pub Vec<Value>);

impl KeyTuple {
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for KeyTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(v: &Value) -> u64 {
        let mut h = DefaultHasher::new();
        v.hash(&mut h);
        h.finish()
    }

    #[test]
    fn ints_and_floats_compare_numerically() {
        assert_eq!(Value::Int(2), Value::Float(2.0));
        assert!(Value::Int(2) < Value::Float(2.5));
        assert!(Value::Float(-1.0) < Value::Int(0));
        assert_eq!(hash_of(&Value::Int(2)), hash_of(&Value::Float(2.0)));
    }

    #[test]
    fn large_ints_compare_exactly_with_floats() {
        let two_53 = 1_i64 << 53;
        let float = Value::Float(two_53 as f64);
        assert_eq!(Value::Int(two_53), float);
        assert!(Value::Int(two_53 + 1) > float);
        assert!(Value::Int(two_53 - 1) < float);
        assert_eq!(hash_of(&Value::Int(two_53)), hash_of(&float));

        assert!(Value::Int(i64::MAX) < Value::Float(I64_END));
        assert!(Value::Int(i64::MIN) == Value::Float(-I64_END));
        assert!(Value::Int(i64::MIN) > Value::Float(f64::NEG_INFINITY));
        assert!(Value::Int(i64::MAX) < Value::Float(f64::NAN));
        assert!(Value::Int(-3) > Value::Float(-3.5));
        assert!(Value::Int(-3) < Value::Float(-2.5));
        assert_eq!(Value::Int(0), Value::Float(-0.0));
        assert_eq!(hash_of(&Value::Int(0)), hash_of(&Value::Float(-0.0)));
    }

    #[test]
    fn kinds_order_by_rank() {
        assert!(Value::Bool(true) < Value::Int(-100));
        assert!(Value::Int(1_000) < Value::from("a"));
        assert!(Value::from("z") < Value::List(vec![]));
    }

    #[test]
    fn key_tuples_order_lexicographically() {
        let a = KeyTuple(vec![Value::Int(1), Value::from("b")]);
        let b = KeyTuple(vec![Value::Int(1), Value::from("c")]);
        let c = KeyTuple(vec![Value::Int(2), Value::from("a")]);
        assert!(a < b && b < c);
        assert_eq!(a.to_string(), "(1, \"b\")");
    }

    #[test]
    fn json_numbers_keep_integrality() -> Result<()> {
        let v = Value::from_json(serde_json::json!([1, 2.5, "x", true]))?;
        assert_eq!(
            v.as_list()?,
            &[Value::Int(1), Value::Float(2.5), Value::from("x"), Value::Bool(true)]
        );
        assert!(Value::from_json(serde_json::Value::Null).is_err());
        Ok(())
    }

    #[test]
    fn checked_add_promotes_to_float() -> Result<()> {
        assert_eq!(Value::Int(2).checked_add(&Value::Int(3))?, Value::Int(5));
        assert!(matches!(
            Value::Int(2).checked_add(&Value::Float(0.5))?,
            Value::Float(f) if f == 2.5
        ));
        assert!(Value::Int(i64::MAX).checked_add(&Value::Int(1)).is_err());
        assert!(Value::from("a").checked_add(&Value::Int(1)).is_err());
        Ok(())
    }
}
