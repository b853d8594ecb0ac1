//! Sort: total, stable reordering of a stream by a key tuple.
//!
//! Sorting cannot emit anything before it has seen its whole input, so the operation buffers
//! every row on the first pull. Rows with equal keys keep their arrival order in both
//! directions.
//!
//! With the `spilling` feature and [`SortConfig::spill_threshold`] set, the buffer is cut
//! into sorted runs of at most that many rows; each run is written to an anonymous temp
//! file and the runs are merged lazily. The output is identical either way.

use super::{Operation, to_keys};
use crate::error::Result;
use crate::row::Row;
use crate::stream::RowStream;
use crate::value::KeyTuple;
use std::cmp::Ordering;
use std::path::PathBuf;
use tracing::debug;

/// Memory policy for sorting.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SortConfig {
    /// Rows held in memory before a sorted run is spilled to disk. `None` never spills.
    /// Only honored with the `spilling` feature.
    pub spill_threshold: Option<usize>,
    /// Directory for spill files; the system temp dir when `None`.
    pub spill_dir: Option<PathBuf>,
}

impl SortConfig {
    #[must_use]
    pub fn with_spill_threshold(mut self, rows: usize) -> Self {
        self.spill_threshold = Some(rows.max(1));
        self
    }

    #[must_use]
    pub fn with_spill_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spill_dir = Some(dir.into());
        self
    }
}

#[derive(Clone, Debug)]
pub struct Sort {
    keys: Vec<String>,
    descending: bool,
    config: SortConfig,
}

impl Sort {
    /// Ascending sort by `keys`.
    pub fn new<K, S>(keys: K) -> Self
    where
        K: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: to_keys(keys),
            descending: false,
            config: SortConfig::default(),
        }
    }

    #[must_use]
    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: SortConfig) -> Self {
        self.config = config;
        self
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn is_descending(&self) -> bool {
        self.descending
    }

    pub(crate) fn compare(&self, a: &KeyTuple, b: &KeyTuple) -> Ordering {
        if self.descending { b.cmp(a) } else { a.cmp(b) }
    }

    /// Drain `input` and return its rows in order.
    fn sorted<'a>(&'a self, input: RowStream<'a>) -> Result<RowStream<'a>> {
        #[cfg(feature = "spilling")]
        if let Some(threshold) = self.config.spill_threshold {
            let dir = self.config.spill_dir.as_deref();
            return super::spill::external_sort(self, input, threshold, dir);
        }

        let mut keyed = Vec::new();
        for row in input {
            let row = row?;
            keyed.push((row.key(&self.keys)?, row));
        }
        debug!(rows = keyed.len(), keys = ?self.keys, "sorting in memory");
        // `sort_by` is stable
        keyed.sort_by(|(a, _), (b, _)| self.compare(a, b));
        Ok(Box::new(keyed.into_iter().map(|(_, row)| Ok(row))))
    }
}

/// Output of [`Sort::apply`]: pulls nothing until first asked.
enum SortStream<'a> {
    Pending(&'a Sort, RowStream<'a>),
    Sorted(RowStream<'a>),
    Done,
}

impl Iterator for SortStream<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Result<Row>> {
        loop {
            match std::mem::replace(self, SortStream::Done) {
                SortStream::Pending(sort, input) => match sort.sorted(input) {
                    Ok(out) => *self = SortStream::Sorted(out),
                    Err(e) => return Some(Err(e)),
                },
                SortStream::Sorted(mut out) => {
                    let item = out.next();
                    match item {
                        Some(Ok(_)) => *self = SortStream::Sorted(out),
                        // errors end the stream, exhaustion too
                        Some(Err(_)) | None => {}
                    }
                    return item;
                }
                SortStream::Done => return None,
            }
        }
    }
}

impl Operation for Sort {
    fn describe(&self) -> String {
        let dir = if self.descending { "desc" } else { "asc" };
        format!("Sort(keys={:?}, {dir})", self.keys)
    }

    fn apply<'a>(&'a self, mut inputs: Vec<RowStream<'a>>) -> RowStream<'a> {
        Box::new(SortStream::Pending(self, inputs.remove(0)))
    }
}
