//! # compgraph
//!
//! A single-process, in-memory **batch dataflow engine**. Callers compose a directed
//! acyclic graph of row-stream transforms and execute it lazily against named or
//! file-backed sources.
//!
//! ## Key Features
//!
//! - **Immutable graph builder** - `map`, `reduce`, `sort`, `join` return new nodes; shared
//!   sub-pipelines are re-executed per consumer, never cached
//! - **Pull-based execution** - no row is computed until the consumer asks for it
//! - **Sorted group-by with a fail-fast contract** - unsorted input to `reduce`/`join`
//!   surfaces as [`Error::StreamNotSorted`] instead of being silently re-sorted
//! - **Four-way merge-join** - inner, left, right and outer, with suffixes for colliding
//!   fields
//! - **Stock mappers and reducers** - tokenising, arithmetic formulas, geo distance,
//!   timestamps; `Count`, `Sum`, `Mean`, `TermFrequency`, `TopN`, `FirstReducer`
//! - **External sort** - optional spill-to-disk runs merged with a heap (`spilling` feature)
//! - **File sources** - JSON Lines and custom line parsers, globs, transparent gzip/zstd
//!
//! ## Quick Start
//!
//! ```
//! use compgraph::operations::joiners::LeftJoiner;
//! use compgraph::operations::reducers::Count;
//! use compgraph::{row, Graph, Sources};
//!
//! # fn main() -> compgraph::Result<()> {
//! let users = Graph::from_source("users").sort(["id"]);
//! let visits = Graph::from_source("visits")
//!     .sort(["id"])
//!     .reduce(Count::new("visits"), ["id"]);
//! let report = users.join(LeftJoiner::new(), &visits, ["id"]);
//!
//! let sources = Sources::new()
//!     .bind_rows("users", vec![row! { "id" => 2, "name" => "b" }, row! { "id" => 1, "name" => "a" }])
//!     .bind_rows("visits", vec![row! { "id" => 1 }, row! { "id" => 1 }]);
//!
//! let rows = report.run(&sources)?.collect::<compgraph::Result<Vec<_>>>()?;
//! assert_eq!(rows, vec![
//!     row! { "id" => 1, "name" => "a", "visits" => 2 },
//!     row! { "id" => 2, "name" => "b" },
//! ]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Rows and values
//!
//! A [`Row`] is an insertion-ordered map from field name to [`Value`]. Values are totally
//! ordered, which gives [`KeyTuple`]s the lexicographic order used by sorting, grouping and
//! joining.
//!
//! ### Graphs
//!
//! A [`Graph`] is an immutable node. Leaves are named sources ([`Graph::from_source`],
//! bound at run time through [`Sources`]) or files ([`Graph::from_file`],
//! [`Graph::from_glob`]). [`Graph::run`] returns a lazy [`RowStream`].
//!
//! ### Operations
//!
//! [`operations`] defines the [`Operation`](operations::Operation) protocol, the
//! [`Mapper`](operations::Mapper), [`Reducer`](operations::Reducer) and
//! [`Joiner`](operations::Joiner) plug-in traits and the stock implementations.
//!
//! ### Errors
//!
//! Every failure is an [`Error`] delivered to whoever pulls the failing row; the stream
//! ends there. Rows already received stay valid.
//!
//! ## Feature Flags
//!
//! - `spilling` *(default)* - external sort through postcard-encoded temp files
//! - `compression-gzip` *(default)* - read/write `.gz` sources and outputs
//! - `compression-zstd` *(default)* - read/write `.zst` sources and outputs

pub mod algorithms;
pub mod error;
pub mod graph;
pub mod io;
pub mod operations;
pub mod row;
pub mod stream;
pub mod testing;
pub mod value;

pub use error::{Error, Result};
pub use graph::{Graph, NO_KEYS};
pub use row::Row;
pub use stream::{RowStream, Sources, collect_rows, from_rows};
pub use value::{KeyTuple, Value};
