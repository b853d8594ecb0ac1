//! The graph builder and executor.
//!
//! A [`Graph`] is an immutable handle to a node: either a leaf source or an operation
//! applied to one or two predecessor graphs. Builder methods never mutate; they return a
//! new node that shares its predecessors, so one sub-pipeline can feed several consumers.
//!
//! Nothing runs at build time. [`Graph::run`] walks the node tree depth-first, opens every
//! leaf afresh and wires the operations into one lazy [`RowStream`]. Each call is an
//! independent traversal: no rows are cached between runs or between two consumers of a
//! shared node.
//!
//! ```
//! use compgraph::{row, Graph, Sources};
//! use compgraph::operations::{mappers::Split, reducers::Count};
//!
//! let words = Graph::from_source("docs")
//!     .map(Split::new("text"))
//!     .sort(["text"])
//!     .reduce(Count::new("count"), ["text"]);
//!
//! let sources = Sources::new().bind_rows("docs", vec![row! { "text" => "b a b" }]);
//! let rows = words.run(&sources)?.collect::<compgraph::Result<Vec<_>>>()?;
//! assert_eq!(rows, vec![
//!     row! { "text" => "a", "count" => 1 },
//!     row! { "text" => "b", "count" => 2 },
//! ]);
//! # Ok::<(), compgraph::Error>(())
//! ```

use crate::error::{Error, Result};
use crate::io::{LineParser, ParsedLines, expand_glob};
use crate::operations::{Join, Joiner, Map, Mapper, Operation, Reduce, Reducer, Sort};
use crate::row::Row;
use crate::stream::{RowStream, Sources};
use std::fmt::{self, Write as _};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Empty key list for whole-stream reduces and joins.
pub const NO_KEYS: [&str; 0] = [];

enum Source {
    Named(String),
    Files { paths: Vec<PathBuf>, parser: LineParser },
    Glob { pattern: String, parser: LineParser },
}

impl Source {
    fn describe(&self) -> String {
        match self {
            Source::Named(name) => format!("Source({name})"),
            Source::Files { paths, .. } => {
                let shown: Vec<_> = paths.iter().map(|p| p.display().to_string()).collect();
                format!("File({})", shown.join(", "))
            }
            Source::Glob { pattern, .. } => format!("Glob({pattern})"),
        }
    }

    fn open(&self, sources: &Sources) -> Result<RowStream<'static>> {
        match self {
            Source::Named(name) => sources.open(name),
            Source::Files { paths, parser } => {
                Ok(Box::new(ParsedLines::new(paths.clone(), Arc::clone(parser))))
            }
            Source::Glob { pattern, parser } => {
                let paths = expand_glob(pattern)?;
                debug!(pattern = %pattern, files = paths.len(), "expanded glob source");
                Ok(Box::new(ParsedLines::new(paths, Arc::clone(parser))))
            }
        }
    }
}

enum Node {
    /// A graph with no source and no operation; running it is an error.
    Empty,
    Source(Source),
    Op {
        op: Box<dyn Operation>,
        inputs: Vec<Graph>,
    },
}

/// Immutable, cheaply clonable handle to a dataflow node.
#[derive(Clone)]
pub struct Graph {
    node: Arc<Node>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// A bare graph with nothing attached. Running it fails with [`Error::InvalidGraph`].
    pub fn new() -> Self {
        Self {
            node: Arc::new(Node::Empty),
        }
    }

    fn leaf(source: Source) -> Self {
        Self {
            node: Arc::new(Node::Source(source)),
        }
    }

    fn push(&self, op: impl Operation + 'static, others: &[&Graph]) -> Self {
        let mut inputs = Vec::with_capacity(1 + others.len());
        inputs.push(self.clone());
        inputs.extend(others.iter().map(|g| (*g).clone()));
        debug_assert_eq!(inputs.len(), op.arity());
        Self {
            node: Arc::new(Node::Op {
                op: Box::new(op),
                inputs,
            }),
        }
    }

    /// Leaf resolved by name against the [`Sources`] passed to [`Graph::run`].
    pub fn from_source(name: impl Into<String>) -> Self {
        Self::leaf(Source::Named(name.into()))
    }

    /// Leaf reading `path` line by line through `parser`. The file is reopened on every run.
    pub fn from_file<P>(path: impl Into<PathBuf>, parser: P) -> Self
    where
        P: Fn(&str) -> Result<Row> + Send + Sync + 'static,
    {
        Self::from_files(vec![path.into()], parser)
    }

    /// Leaf reading several files back to back, in the order given.
    pub fn from_files<P>(paths: Vec<PathBuf>, parser: P) -> Self
    where
        P: Fn(&str) -> Result<Row> + Send + Sync + 'static,
    {
        Self::leaf(Source::Files {
            paths,
            parser: Arc::new(parser),
        })
    }

    /// Leaf reading every file matching `pattern`, in path order. The pattern is expanded
    /// on every run.
    pub fn from_glob<P>(pattern: impl Into<String>, parser: P) -> Self
    where
        P: Fn(&str) -> Result<Row> + Send + Sync + 'static,
    {
        Self::leaf(Source::Glob {
            pattern: pattern.into(),
            parser: Arc::new(parser),
        })
    }

    pub fn map(&self, mapper: impl Mapper + 'static) -> Self {
        self.push(Map::new(mapper), &[])
    }

    /// Group this (key-sorted) stream by `keys` and reduce each group.
    pub fn reduce<K, S>(&self, reducer: impl Reducer + 'static, keys: K) -> Self
    where
        K: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(Reduce::new(reducer, keys), &[])
    }

    /// Stable ascending sort by `keys`.
    pub fn sort<K, S>(&self, keys: K) -> Self
    where
        K: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(Sort::new(keys), &[])
    }

    /// Stable descending sort by `keys`.
    pub fn sort_desc<K, S>(&self, keys: K) -> Self
    where
        K: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(Sort::new(keys).descending(), &[])
    }

    /// Sort with an explicit [`Sort`] (direction, spill settings).
    pub fn sort_by(&self, sort: Sort) -> Self {
        self.push(sort, &[])
    }

    /// Merge-join this stream (left) with `other` (right) on `keys`.
    /// Both sides must be sorted ascending by `keys`.
    pub fn join<K, S>(&self, joiner: impl Joiner + 'static, other: &Graph, keys: K) -> Self
    where
        K: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(Join::new(joiner, keys), &[other])
    }

    /// Execute the graph against `sources`.
    ///
    /// Leaves are opened now; rows flow only as the returned stream is pulled.
    ///
    /// # Errors
    /// [`Error::MissingSource`] for an unbound leaf name, [`Error::InvalidGraph`] for a bare
    /// node, [`Error::Pattern`]/[`Error::Io`] if a glob leaf cannot be expanded. Row-level
    /// failures surface later, as items of the stream.
    pub fn run<'g>(&'g self, sources: &Sources) -> Result<RowStream<'g>> {
        debug!(sources = ?sources, "running graph");
        self.open(sources)
    }

    fn open<'g>(&'g self, sources: &Sources) -> Result<RowStream<'g>> {
        match &*self.node {
            Node::Empty => Err(Error::InvalidGraph),
            Node::Source(source) => Ok(source.open(sources)?),
            Node::Op { op, inputs } => {
                let streams = inputs
                    .iter()
                    .map(|g| g.open(sources))
                    .collect::<Result<Vec<_>>>()?;
                Ok(op.apply(streams))
            }
        }
    }

    /// Indented tree of the node and its predecessors, outermost operation first.
    pub fn explain(&self) -> String {
        let mut out = String::new();
        self.explain_into(&mut out, 0);
        out
    }

    fn explain_into(&self, out: &mut String, depth: usize) {
        let label = match &*self.node {
            Node::Empty => "Empty".to_string(),
            Node::Source(source) => source.describe(),
            Node::Op { op, .. } => op.describe(),
        };
        let _ = writeln!(out, "{:indent$}{label}", "", indent = depth * 2);
        if let Node::Op { inputs, .. } = &*self.node {
            for g in inputs {
                g.explain_into(out, depth + 1);
            }
        }
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.explain())
    }
}
