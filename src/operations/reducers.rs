//! Stock reducers.
//!
//! Every reducer receives one non-empty group of equal-key rows. Aggregating reducers
//! ([`Count`], [`Sum`], [`Mean`], [`TermFrequency`]) emit fresh rows holding the key fields
//! plus their result column; selecting reducers ([`FirstReducer`], [`TopN`]) emit input rows
//! unchanged.

use super::{Group, Reducer};
use crate::error::Result;
use crate::row::Row;
use crate::value::{KeyTuple, Value};
use indexmap::IndexMap;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// A row holding just the key fields of a group.
fn key_row(keys: &[String], key: &KeyTuple, extra: usize) -> Row {
    let mut row = Row::with_capacity(keys.len() + extra);
    for (field, value) in keys.iter().zip(key.values()) {
        row.insert(field.clone(), value.clone());
    }
    row
}

/* ===================== FirstReducer ===================== */

/// First row of each group, unchanged (dedup by key).
#[derive(Clone, Copy, Debug, Default)]
pub struct FirstReducer;

impl Reducer for FirstReducer {
    fn reduce(&self, _keys: &[String], group: Group) -> Result<Vec<Row>> {
        Ok(group.rows.into_iter().take(1).collect())
    }
}

/* ===================== Count ===================== */

/// Key fields plus `column` = number of rows in the group.
#[derive(Clone, Debug)]
pub struct Count {
    pub column: String,
}

impl Count {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Reducer for Count {
    fn reduce(&self, keys: &[String], group: Group) -> Result<Vec<Row>> {
        let mut row = key_row(keys, &group.key, 1);
        row.insert(self.column.clone(), group.rows.len());
        Ok(vec![row])
    }
}

/* ===================== Sum ===================== */

/// Key fields plus `column` = sum of `column` over the group.
///
/// Integer columns sum to an integer; a float anywhere makes the sum a float.
#[derive(Clone, Debug)]
pub struct Sum {
    pub column: String,
}

impl Sum {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Reducer for Sum {
    fn reduce(&self, keys: &[String], group: Group) -> Result<Vec<Row>> {
        let mut total = Value::Int(0);
        for row in &group.rows {
            total = total.checked_add(row.get(&self.column)?)?;
        }
        let mut row = key_row(keys, &group.key, 1);
        row.insert(self.column.clone(), total);
        Ok(vec![row])
    }
}

/* ===================== Mean ===================== */

/// Key fields plus `column` = arithmetic mean of `column` over the group, as a float.
#[derive(Clone, Debug)]
pub struct Mean {
    pub column: String,
}

impl Mean {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Reducer for Mean {
    fn reduce(&self, keys: &[String], group: Group) -> Result<Vec<Row>> {
        let mut total = 0.0;
        for row in &group.rows {
            total += row.get(&self.column)?.as_f64()?;
        }
        let mut row = key_row(keys, &group.key, 1);
        row.insert(self.column.clone(), total / group.rows.len() as f64);
        Ok(vec![row])
    }
}

/* ===================== TermFrequency ===================== */

/// One row per distinct value of `value_column` in the group: key fields, the value, and
/// `result_column` = occurrences / group size. Rows come out in first-seen value order.
#[derive(Clone, Debug)]
pub struct TermFrequency {
    pub value_column: String,
    pub result_column: String,
}

impl TermFrequency {
    /// Result column defaults to `"tf"`.
    pub fn new(value_column: impl Into<String>) -> Self {
        Self::with_result(value_column, "tf")
    }

    pub fn with_result(value_column: impl Into<String>, result_column: impl Into<String>) -> Self {
        Self {
            value_column: value_column.into(),
            result_column: result_column.into(),
        }
    }
}

impl Reducer for TermFrequency {
    fn reduce(&self, keys: &[String], group: Group) -> Result<Vec<Row>> {
        let total = group.rows.len() as f64;
        let mut counts: IndexMap<Value, usize> = IndexMap::new();
        for row in &group.rows {
            *counts.entry(row.get(&self.value_column)?.clone()).or_insert(0) += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(value, n)| {
                let mut row = key_row(keys, &group.key, 2);
                row.insert(self.value_column.clone(), value);
                row.insert(self.result_column.clone(), n as f64 / total);
                row
            })
            .collect())
    }
}

/* ===================== TopN ===================== */

/// Rows with the `n` largest values of `column` in each group.
///
/// Retention is by value bucket: rows sharing a value are kept or evicted together, so
/// when several rows tie at the boundary value all of them are emitted and the output can
/// hold more than `n` rows. Output is in descending value order, arrival order within a
/// value. `n == 0` emits nothing.
#[derive(Clone, Debug)]
pub struct TopN {
    pub column: String,
    pub n: usize,
}

impl TopN {
    pub fn new(column: impl Into<String>, n: usize) -> Self {
        Self {
            column: column.into(),
            n,
        }
    }
}

/// Bounded retained set: a min-heap of distinct values plus the rows holding each value.
struct Retained {
    n: usize,
    heap: BinaryHeap<Reverse<Value>>,
    buckets: HashMap<Value, Vec<Row>>,
    size: usize,
}

impl Retained {
    fn new(n: usize) -> Self {
        Self {
            n,
            heap: BinaryHeap::new(),
            buckets: HashMap::new(),
            size: 0,
        }
    }

    fn offer(&mut self, value: Value, row: Row) {
        if let Some(bucket) = self.buckets.get_mut(&value) {
            bucket.push(row);
        } else if self.size < self.n || self.heap.peek().is_some_and(|Reverse(min)| value > *min) {
            self.heap.push(Reverse(value.clone()));
            self.buckets.insert(value, vec![row]);
        } else {
            return;
        }
        self.size += 1;
        self.evict();
    }

    /// Drop whole minimum buckets while the rest still hold at least `n` rows.
    fn evict(&mut self) {
        while let Some(Reverse(min)) = self.heap.peek() {
            let min_len = self.buckets.get(min).map_or(0, Vec::len);
            if self.size - min_len < self.n {
                break;
            }
            if let Some(Reverse(min)) = self.heap.pop() {
                self.buckets.remove(&min);
                self.size -= min_len;
            }
        }
    }

    fn into_rows(mut self) -> Vec<Row> {
        let mut out = Vec::with_capacity(self.size);
        // ascending `Reverse` order is descending value order
        for Reverse(v) in self.heap.into_sorted_vec() {
            if let Some(rows) = self.buckets.remove(&v) {
                out.extend(rows);
            }
        }
        out
    }
}

impl Reducer for TopN {
    fn reduce(&self, _keys: &[String], group: Group) -> Result<Vec<Row>> {
        if self.n == 0 {
            return Ok(Vec::new());
        }
        let mut retained = Retained::new(self.n);
        for row in group.rows {
            let value = row.get(&self.column)?.clone();
            retained.offer(value, row);
        }
        Ok(retained.into_rows())
    }
}
