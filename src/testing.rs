//! Testing utilities for compgraph pipelines.
//!
//! - **Assertions** over row vectors: ordered and unordered equality, sortedness, float
//!   columns within a tolerance
//! - **Fixtures**: small documents, travel-time and edge-length tables shaped like the
//!   inputs of [`algorithms`](crate::algorithms)
//! - [`run_collect`]: execute a graph and gather its rows
//! - [`assert_approx_eq!`](crate::assert_approx_eq): float comparison with an epsilon
//!
//! ```
//! use compgraph::testing::*;
//! use compgraph::{row, Graph, Sources};
//!
//! # fn main() -> compgraph::Result<()> {
//! let sources = Sources::new().bind_rows("in", vec![row! { "k" => 2 }, row! { "k" => 1 }]);
//! let out = run_collect(&Graph::from_source("in").sort(["k"]), &sources)?;
//! assert_sorted_by(&out, &["k"], false);
//! assert_rows_unordered_equal(&out, &[row! { "k" => 2 }, row! { "k" => 1 }]);
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod fixtures;

pub use assertions::*;
pub use fixtures::*;

use crate::error::Result;
use crate::graph::Graph;
use crate::row::Row;
use crate::stream::Sources;

/// Run `graph` against `sources` and collect every row, stopping at the first error.
///
/// # Errors
/// Whatever [`Graph::run`] or the stream itself reports.
pub fn run_collect(graph: &Graph, sources: &Sources) -> Result<Vec<Row>> {
    graph.run(sources)?.collect()
}

/// Check that a float is within an epsilon of the expected value (default `1e-10`).
///
/// ```
/// use compgraph::assert_approx_eq;
///
/// assert_approx_eq!(0.1 + 0.2, 0.3);
/// assert_approx_eq!(1.0_f64, 1.001, 1e-2);
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($actual:expr, $expected:expr) => {
        $crate::assert_approx_eq!($actual, $expected, 1e-10)
    };
    ($actual:expr, $expected:expr, $epsilon:expr) => {{
        let actual: f64 = $actual;
        let expected: f64 = $expected;
        let epsilon: f64 = $epsilon;
        let diff = (actual - expected).abs();
        assert!(
            diff <= epsilon,
            "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}`,\n   eps: `{:?}`",
            actual,
            expected,
            diff,
            epsilon
        );
    }};
}
