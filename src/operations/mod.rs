//! The operation protocol and its four kinds: [`Map`], [`Reduce`], [`Sort`] and [`Join`].
//!
//! An [`Operation`] turns one or two input [`RowStream`]s into one output stream. Operations
//! are built once, stored in an immutable graph node and applied on every execution, so
//! they hold nothing but their own parameters.
//!
//! Per-row and per-group behavior is plugged in through three traits:
//! - [`Mapper`]: one row to zero or more rows ([`mappers`])
//! - [`Reducer`]: one group of equal-key rows to zero or more rows ([`reducers`])
//! - [`Joiner`]: which of the matched / left-only / right-only group combinations a
//!   merge-join emits, and how matched rows merge ([`joiners`])
//!
//! Closures work as mappers and reducers:
//!
//! ```
//! use compgraph::{row, Graph, Row, Sources};
//!
//! let doubled = Graph::from_source("nums").map(|mut r: Row| -> compgraph::Result<Vec<Row>> {
//!     let x = r.get("x")?.as_i64()?;
//!     r.insert("x", x * 2);
//!     Ok(vec![r])
//! });
//! let sources = Sources::new().bind_rows("nums", vec![row! { "x" => 21 }]);
//! let out = doubled.run(&sources)?.collect::<compgraph::Result<Vec<_>>>()?;
//! assert_eq!(out, vec![row! { "x" => 42 }]);
//! # Ok::<(), compgraph::Error>(())
//! ```

pub mod expr;
pub mod groupby;
pub mod joiners;
pub mod mappers;
pub mod reducers;
pub mod sort;
#[cfg(feature = "spilling")]
mod spill;

use crate::error::Result;
use crate::row::Row;
use crate::stream::RowStream;
use std::cmp::Ordering;
use tracing::trace;

pub use groupby::{Group, SortedGroups};
pub use sort::{Sort, SortConfig};

/// A node's transformation from its input streams to its output stream.
pub trait Operation: Send + Sync {
    /// Short human-readable description, used by [`Graph::explain`](crate::Graph::explain).
    fn describe(&self) -> String;

    /// Number of input streams `apply` expects.
    fn arity(&self) -> usize {
        1
    }

    /// Build the (lazy) output stream. `inputs.len() == self.arity()`.
    fn apply<'a>(&'a self, inputs: Vec<RowStream<'a>>) -> RowStream<'a>;
}

/// Per-row transform: 1 row to 0..n rows.
pub trait Mapper: Send + Sync {
    /// # Errors
    /// Any failure for this row (missing field, wrong type, ...); it ends the stream.
    fn map(&self, row: Row) -> Result<Vec<Row>>;
}

impl<F> Mapper for F
where
    F: Fn(Row) -> Result<Vec<Row>> + Send + Sync,
{
    fn map(&self, row: Row) -> Result<Vec<Row>> {
        self(row)
    }
}

/// Per-group transform: one maximal run of equal-key rows to 0..n rows.
pub trait Reducer: Send + Sync {
    /// `keys` are the grouping field names, `group.key` their values for this group.
    ///
    /// # Errors
    /// Any failure for this group; it ends the stream.
    fn reduce(&self, keys: &[String], group: Group) -> Result<Vec<Row>>;
}

impl<F> Reducer for F
where
    F: Fn(&[String], Group) -> Result<Vec<Row>> + Send + Sync,
{
    fn reduce(&self, keys: &[String], group: Group) -> Result<Vec<Row>> {
        self(keys, group)
    }
}

/// Rows a [`Joiner`] handler emits for one step of the merge, pulled on demand.
pub type JoinRows<'a> = Box<dyn Iterator<Item = Row> + 'a>;

/// Join policy: the handlers a merge-join calls for each pair of key groups.
///
/// Only `matched` is required; the `-only` handlers default to emitting nothing, which
/// gives inner-join behavior.
pub trait Joiner: Send + Sync {
    /// Equal keys on both sides: merge the cross product of the two groups.
    fn matched<'a>(&'a self, keys: &'a [String], left: Vec<Row>, right: Vec<Row>) -> JoinRows<'a>;

    /// A left group with no right counterpart.
    fn left_only<'a>(&'a self, _keys: &'a [String], _left: Vec<Row>) -> JoinRows<'a> {
        Box::new(std::iter::empty())
    }

    /// A right group with no left counterpart.
    fn right_only<'a>(&'a self, _keys: &'a [String], _right: Vec<Row>) -> JoinRows<'a> {
        Box::new(std::iter::empty())
    }

    fn name(&self) -> &'static str;
}

/// Concatenates, in order, the rows `f` produces for each item of `inner`.
/// Ends after the first error.
pub(crate) struct FlatMapRows<I, F, J: IntoIterator<Item = Row>> {
    inner: I,
    f: F,
    buf: Option<J::IntoIter>,
    done: bool,
}

impl<I, F, J: IntoIterator<Item = Row>> FlatMapRows<I, F, J> {
    pub(crate) fn new<T>(inner: I, f: F) -> Self
    where
        I: Iterator<Item = Result<T>>,
        F: FnMut(T) -> Result<J>,
    {
        Self {
            inner,
            f,
            buf: None,
            done: false,
        }
    }
}

impl<T, I, F, J> Iterator for FlatMapRows<I, F, J>
where
    I: Iterator<Item = Result<T>>,
    F: FnMut(T) -> Result<J>,
    J: IntoIterator<Item = Row>,
{
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Result<Row>> {
        loop {
            if let Some(row) = self.buf.as_mut().and_then(|rows| rows.next()) {
                return Some(Ok(row));
            }
            self.buf = None;
            if self.done {
                return None;
            }
            let produced = match self.inner.next() {
                None => {
                    self.done = true;
                    return None;
                }
                Some(item) => item.and_then(&mut self.f),
            };
            match produced {
                Ok(rows) => self.buf = Some(rows.into_iter()),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

pub(crate) fn to_keys<K, S>(keys: K) -> Vec<String>
where
    K: IntoIterator<Item = S>,
    S: Into<String>,
{
    keys.into_iter().map(Into::into).collect()
}

/* ===================== Map ===================== */

pub struct Map {
    mapper: Box<dyn Mapper>,
}

impl Map {
    pub fn new(mapper: impl Mapper + 'static) -> Self {
        Self {
            mapper: Box::new(mapper),
        }
    }
}

impl Operation for Map {
    fn describe(&self) -> String {
        "Map".to_string()
    }

    fn apply<'a>(&'a self, mut inputs: Vec<RowStream<'a>>) -> RowStream<'a> {
        let input = inputs.remove(0);
        Box::new(FlatMapRows::new(input, move |row: Row| self.mapper.map(row)))
    }
}

/* ===================== Reduce ===================== */

pub struct Reduce {
    reducer: Box<dyn Reducer>,
    keys: Vec<String>,
}

impl Reduce {
    pub fn new<K, S>(reducer: impl Reducer + 'static, keys: K) -> Self
    where
        K: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            reducer: Box::new(reducer),
            keys: to_keys(keys),
        }
    }
}

impl Operation for Reduce {
    fn describe(&self) -> String {
        format!("Reduce(keys={:?})", self.keys)
    }

    fn apply<'a>(&'a self, mut inputs: Vec<RowStream<'a>>) -> RowStream<'a> {
        let groups = SortedGroups::new(inputs.remove(0), self.keys.clone());
        Box::new(FlatMapRows::new(groups, move |group: Group| {
            trace!(key = %group.key, rows = group.rows.len(), "reducing group");
            self.reducer.reduce(&self.keys, group)
        }))
    }
}

/* ===================== Join ===================== */

/// One step of the merge: which handler a pair of cursors calls.
enum JoinStep {
    LeftOnly(Group),
    RightOnly(Group),
    Matched(Group, Group),
}

/// Lock-step cursor over the key groups of two sorted inputs.
///
/// Each side is pulled lazily: the next group is read only once the current one has been
/// handed to a handler.
struct MergeGroups<'a> {
    left: SortedGroups<'a>,
    right: SortedGroups<'a>,
    left_cur: Option<Group>,
    right_cur: Option<Group>,
    left_pull: bool,
    right_pull: bool,
}

impl<'a> MergeGroups<'a> {
    fn new(left: SortedGroups<'a>, right: SortedGroups<'a>) -> Self {
        Self {
            left,
            right,
            left_cur: None,
            right_cur: None,
            left_pull: true,
            right_pull: true,
        }
    }

    fn step(&mut self) -> Result<Option<JoinStep>> {
        if self.left_pull {
            self.left_cur = self.left.next().transpose()?;
            self.left_pull = false;
        }
        if self.right_pull {
            self.right_cur = self.right.next().transpose()?;
            self.right_pull = false;
        }
        let step = match (self.left_cur.take(), self.right_cur.take()) {
            (None, None) => return Ok(None),
            (Some(l), None) => {
                self.left_pull = true;
                JoinStep::LeftOnly(l)
            }
            (None, Some(r)) => {
                self.right_pull = true;
                JoinStep::RightOnly(r)
            }
            (Some(l), Some(r)) => match l.key.cmp(&r.key) {
                Ordering::Less => {
                    self.right_cur = Some(r);
                    self.left_pull = true;
                    JoinStep::LeftOnly(l)
                }
                Ordering::Greater => {
                    self.left_cur = Some(l);
                    self.right_pull = true;
                    JoinStep::RightOnly(r)
                }
                Ordering::Equal => {
                    self.left_pull = true;
                    self.right_pull = true;
                    JoinStep::Matched(l, r)
                }
            },
        };
        Ok(Some(step))
    }
}

impl Iterator for MergeGroups<'_> {
    type Item = Result<JoinStep>;

    fn next(&mut self) -> Option<Result<JoinStep>> {
        self.step().transpose()
    }
}

/// Sorted merge-join of the graph's own stream (left) with another (right).
pub struct Join {
    joiner: Box<dyn Joiner>,
    keys: Vec<String>,
}

impl Join {
    pub fn new<K, S>(joiner: impl Joiner + 'static, keys: K) -> Self
    where
        K: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            joiner: Box::new(joiner),
            keys: to_keys(keys),
        }
    }
}

impl Operation for Join {
    fn describe(&self) -> String {
        format!("Join({}, keys={:?})", self.joiner.name(), self.keys)
    }

    fn arity(&self) -> usize {
        2
    }

    fn apply<'a>(&'a self, mut inputs: Vec<RowStream<'a>>) -> RowStream<'a> {
        let right = SortedGroups::new(inputs.remove(1), self.keys.clone());
        let left = SortedGroups::new(inputs.remove(0), self.keys.clone());
        let keys: &[String] = &self.keys;
        let joiner = &self.joiner;
        Box::new(FlatMapRows::new(
            MergeGroups::new(left, right),
            move |step: JoinStep| -> Result<JoinRows<'a>> {
                Ok(match step {
                    JoinStep::LeftOnly(l) => {
                        trace!(key = %l.key, "left-only group");
                        joiner.left_only(keys, l.rows)
                    }
                    JoinStep::RightOnly(r) => {
                        trace!(key = %r.key, "right-only group");
                        joiner.right_only(keys, r.rows)
                    }
                    JoinStep::Matched(l, r) => {
                        trace!(key = %l.key, left = l.rows.len(), right = r.rows.len(), "matched groups");
                        joiner.matched(keys, l.rows, r.rows)
                    }
                })
            },
        ))
    }
}
