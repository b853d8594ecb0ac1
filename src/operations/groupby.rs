//! Sorted group-by: split a key-sorted stream into maximal runs of equal keys.
//!
//! The input must already be sorted ascending by the key fields. The primitive does not
//! sort; it checks. As soon as a key arrives that is smaller than the key before it, the
//! stream yields [`Error::StreamNotSorted`] and ends. The group that was being collected
//! at that moment is never yielded.
//!
//! With an empty key list every row has the same (empty) key, so the whole stream is a
//! single group. An empty stream yields no groups.

use crate::error::{Error, Result};
use crate::row::Row;
use crate::stream::RowStream;
use crate::value::KeyTuple;
use std::cmp::Ordering;

/// One maximal run of consecutive rows with equal key tuples, in arrival order.
#[derive(Clone, Debug, PartialEq)]
pub struct Group {
    pub key: KeyTuple,
    pub rows: Vec<Row>,
}

impl Group {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Iterator of [`Group`]s over a key-sorted stream.
pub struct SortedGroups<'a> {
    input: RowStream<'a>,
    keys: Vec<String>,
    /// First row of the next group, already pulled from `input`.
    pending: Option<(KeyTuple, Row)>,
    done: bool,
}

impl<'a> SortedGroups<'a> {
    pub fn new(input: RowStream<'a>, keys: Vec<String>) -> Self {
        Self {
            input,
            keys,
            pending: None,
            done: false,
        }
    }

    fn pull(&mut self) -> Result<Option<(KeyTuple, Row)>> {
        match self.input.next() {
            None => Ok(None),
            Some(row) => {
                let row = row?;
                Ok(Some((row.key(&self.keys)?, row)))
            }
        }
    }

    fn next_group(&mut self) -> Result<Option<Group>> {
        let (key, first) = match self.pending.take() {
            Some(p) => p,
            None => match self.pull()? {
                Some(p) => p,
                None => return Ok(None),
            },
        };
        let mut rows = vec![first];
        while let Some((k, row)) = self.pull()? {
            match k.cmp(&key) {
                Ordering::Equal => rows.push(row),
                Ordering::Greater => {
                    self.pending = Some((k, row));
                    break;
                }
                Ordering::Less => {
                    return Err(Error::StreamNotSorted {
                        keys: self.keys.clone(),
                        previous: key,
                        current: k,
                    });
                }
            }
        }
        Ok(Some(Group { key, rows }))
    }
}

impl Iterator for SortedGroups<'_> {
    type Item = Result<Group>;

    fn next(&mut self) -> Option<Result<Group>> {
        if self.done {
            return None;
        }
        match self.next_group() {
            Ok(Some(g)) => Some(Ok(g)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
