//! Row streams and run-time source bindings.
//!
//! A [`RowStream`] is a lazy, single-pass iterator of `Result<Row>`. Graph leaves named with
//! [`Graph::from_source`](crate::Graph::from_source) are resolved at run time through a
//! [`Sources`] table, which maps each name to a zero-argument factory returning a *fresh*
//! stream on every call. That is what makes named sources restartable: each execution of a
//! graph calls the factory again.
//!
//! ```
//! use compgraph::{row, Graph, Sources};
//!
//! let sources = Sources::new().bind_rows("data", vec![row! { "x" => 1 }, row! { "x" => 2 }]);
//! let graph = Graph::from_source("data");
//!
//! for _ in 0..2 {
//!     let rows = graph.run(&sources)?.collect::<compgraph::Result<Vec<_>>>()?;
//!     assert_eq!(rows.len(), 2);
//! }
//! # Ok::<(), compgraph::Error>(())
//! ```

use crate::error::{Error, Result};
use crate::row::Row;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub type RowStream<'a> = Box<dyn Iterator<Item = Result<Row>> + 'a>;

/// Zero-argument factory producing a fresh stream per call.
pub type SourceFn = Box<dyn Fn() -> RowStream<'static>>;

/// Binding table from source name to stream factory.
#[derive(Default)]
pub struct Sources {
    bindings: HashMap<String, SourceFn>,
}

impl Sources {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to a factory of fallible rows.
    #[must_use]
    pub fn bind<F, I>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> I + 'static,
        I: IntoIterator<Item = Result<Row>>,
        I::IntoIter: 'static,
    {
        self.bindings.insert(
            name.into(),
            Box::new(move || Box::new(factory().into_iter()) as RowStream<'static>),
        );
        self
    }

    /// Bind `name` to a factory of plain rows.
    #[must_use]
    pub fn bind_iter<F, I>(self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> I + 'static,
        I: IntoIterator<Item = Row>,
        I::IntoIter: 'static,
    {
        self.bind(name, move || factory().into_iter().map(Ok))
    }

    /// Bind `name` to an in-memory table; every execution replays all of it.
    #[must_use]
    pub fn bind_rows(self, name: impl Into<String>, rows: Vec<Row>) -> Self {
        let rows = Arc::new(rows);
        self.bind_iter(name, move || {
            let rows = Arc::clone(&rows);
            (0..rows.len()).map(move |i| rows[i].clone())
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Invoke the factory bound to `name`.
    ///
    /// # Errors
    /// [`Error::MissingSource`] if nothing is bound to `name`.
    pub fn open(&self, name: &str) -> Result<RowStream<'static>> {
        let factory = self
            .bindings
            .get(name)
            .ok_or_else(|| Error::MissingSource(name.to_string()))?;
        Ok(factory())
    }
}

impl fmt::Debug for Sources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.bindings.keys().collect();
        names.sort();
        f.debug_struct("Sources").field("bindings", &names).finish()
    }
}

/// Wrap an in-memory vector as a stream.
pub fn from_rows<'a>(rows: Vec<Row>) -> RowStream<'a> {
    Box::new(rows.into_iter().map(Ok))
}

/// Drain a stream, stopping at the first error.
///
/// # Errors
/// The first error the stream yields.
pub fn collect_rows(stream: RowStream<'_>) -> Result<Vec<Row>> {
    stream.collect()
}
