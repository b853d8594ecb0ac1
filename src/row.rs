//! Rows: ordered, string-keyed records of [`Value`]s.
//!
//! A [`Row`] keeps its fields in insertion order (backed by [`IndexMap`]), which is the
//! order they are rendered in. Equality ignores field order.
//!
//! Field access is explicit about absence: [`Row::get`] returns
//! [`Error::MissingField`] instead of a default, so a misspelled column fails at the
//! first row that lacks it.

use crate::error::{Error, Result};
use crate::value::{KeyTuple, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row(IndexMap<String, Value>);

impl Row {
    #[must_use]
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    #[must_use]
    pub fn with_capacity(n: usize) -> Self {
        Self(IndexMap::with_capacity(n))
    }

    /// Borrow a field's value.
    ///
    /// # Errors
    /// [`Error::MissingField`] if the row has no such field.
    pub fn get(&self, field: &str) -> Result<&Value> {
        self.0
            .get(field)
            .ok_or_else(|| Error::MissingField(field.to_string()))
    }

    /// Borrow a field's value mutably.
    ///
    /// # Errors
    /// [`Error::MissingField`] if the row has no such field.
    pub fn get_mut(&mut self, field: &str) -> Result<&mut Value> {
        self.0
            .get_mut(field)
            .ok_or_else(|| Error::MissingField(field.to_string()))
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Set a field, returning the previous value. An existing field keeps its position.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    /// Remove a field, keeping the order of the remaining ones.
    ///
    /// # Errors
    /// [`Error::MissingField`] if the row has no such field.
    pub fn remove(&mut self, field: &str) -> Result<Value> {
        self.0
            .shift_remove(field)
            .ok_or_else(|| Error::MissingField(field.to_string()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Extract the key tuple for `keys`, in key order.
    ///
    /// # Errors
    /// [`Error::MissingField`] for the first key field the row lacks.
    pub fn key(&self, keys: &[String]) -> Result<KeyTuple> {
        keys.iter()
            .map(|k| self.get(k).cloned())
            .collect::<Result<Vec<_>>>()
            .map(KeyTuple)
    }

    /// A new row holding only `fields`, in the order given.
    ///
    /// # Errors
    /// [`Error::MissingField`] for the first field the row lacks.
    pub fn project(&self, fields: &[String]) -> Result<Row> {
        let mut out = Row::with_capacity(fields.len());
        for f in fields {
            out.insert(f.clone(), self.get(f)?.clone());
        }
        Ok(out)
    }

    /// Parse a JSON object into a row.
    ///
    /// # Errors
    /// [`Error::Type`] if the text is not a JSON object or holds unsupported values.
    pub fn from_json_str(text: &str) -> Result<Row> {
        let json: serde_json::Value =
            serde_json::from_str(text).map_err(|e| Error::Type(format!("invalid JSON: {e}")))?;
        match json {
            serde_json::Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| Value::from_json(v).map(|v| (k, v)))
                .collect(),
            other => Err(Error::Type(format!("expected a JSON object, got {other}"))),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Build a [`Row`] from `field => value` pairs.
///
/// ```
/// use compgraph::row;
///
/// let r = row! { "text" => "anime", "count" => 2 };
/// assert_eq!(r.get("count").unwrap().as_i64().unwrap(), 2);
/// ```
#[macro_export]
macro_rules! row {
    () => { $crate::Row::new() };
    ($($field:expr => $value:expr),+ $(,)?) => {{
        let mut r = $crate::Row::new();
        $( r.insert($field, $value); )+
        r
    }};
}
