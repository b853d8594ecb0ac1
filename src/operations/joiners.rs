//! The four join policies and the matched-row merge rule.
//!
//! | Joiner          | matched | left-only | right-only |
//! |-----------------|---------|-----------|------------|
//! | [`InnerJoiner`] | yes     | no        | no         |
//! | [`LeftJoiner`]  | yes     | yes       | no         |
//! | [`RightJoiner`] | yes     | no        | yes        |
//! | [`OuterJoiner`] | yes     | yes       | yes        |
//!
//! Unmatched rows pass through unchanged: merging with a missing side adds no suffixed
//! fields. For a matched pair, join keys keep a single value, fields present in only one
//! row are copied as is, and fields present in both rows get the side's suffix.

use super::{JoinRows, Joiner};
use crate::row::Row;

/// Suffixes appended to colliding non-key fields of a matched pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinSuffixes {
    pub left: String,
    pub right: String,
}

impl Default for JoinSuffixes {
    fn default() -> Self {
        Self {
            left: "_1".to_string(),
            right: "_2".to_string(),
        }
    }
}

impl JoinSuffixes {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }

    /// Merge one left row with one right row.
    pub fn merge(&self, keys: &[String], left: &Row, right: &Row) -> Row {
        let mut out = Row::with_capacity(left.len() + right.len());
        for (suffix, row, other) in [(&self.left, left, right), (&self.right, right, left)] {
            for (field, value) in row.iter() {
                if other.contains(field) && !keys.iter().any(|k| k == field) {
                    out.insert(format!("{field}{suffix}"), value.clone());
                } else {
                    out.insert(field, value.clone());
                }
            }
        }
        out
    }

    /// Cross product of two matched groups, left-major. Pairs are merged as they are pulled.
    pub fn cross<'a>(&'a self, keys: &'a [String], left: Vec<Row>, right: Vec<Row>) -> Cross<'a> {
        Cross {
            suffixes: self,
            keys,
            left,
            right,
            i: 0,
            j: 0,
        }
    }
}

/// Iterator returned by [`JoinSuffixes::cross`].
pub struct Cross<'a> {
    suffixes: &'a JoinSuffixes,
    keys: &'a [String],
    left: Vec<Row>,
    right: Vec<Row>,
    i: usize,
    j: usize,
}

impl Iterator for Cross<'_> {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        let l = self.left.get(self.i)?;
        let r = self.right.get(self.j)?;
        let row = self.suffixes.merge(self.keys, l, r);
        self.j += 1;
        if self.j == self.right.len() {
            self.j = 0;
            self.i += 1;
        }
        Some(row)
    }
}

macro_rules! joiner {
    ($(#[$doc:meta])* $name:ident, left_only: $lo:literal, right_only: $ro:literal) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Default)]
        pub struct $name {
            pub suffixes: JoinSuffixes,
        }

        impl $name {
            pub fn new() -> Self {
                Self::default()
            }

            pub fn with_suffixes(left: impl Into<String>, right: impl Into<String>) -> Self {
                Self {
                    suffixes: JoinSuffixes::new(left, right),
                }
            }
        }

        impl Joiner for $name {
            fn matched<'a>(&'a self, keys: &'a [String], left: Vec<Row>, right: Vec<Row>) -> JoinRows<'a> {
                Box::new(self.suffixes.cross(keys, left, right))
            }

            fn left_only<'a>(&'a self, _keys: &'a [String], left: Vec<Row>) -> JoinRows<'a> {
                Box::new(if $lo { left } else { Vec::new() }.into_iter())
            }

            fn right_only<'a>(&'a self, _keys: &'a [String], right: Vec<Row>) -> JoinRows<'a> {
                Box::new(if $ro { right } else { Vec::new() }.into_iter())
            }

            fn name(&self) -> &'static str {
                stringify!($name)
            }
        }
    };
}

joiner!(
    /// Matched key groups only.
    InnerJoiner, left_only: false, right_only: false
);
joiner!(
    /// Matched groups plus every unmatched left row.
    LeftJoiner, left_only: true, right_only: false
);
joiner!(
    /// Matched groups plus every unmatched right row.
    RightJoiner, left_only: false, right_only: true
);
joiner!(
    /// Matched groups plus every unmatched row from either side.
    OuterJoiner, left_only: true, right_only: true
);
