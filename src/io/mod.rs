//! File-backed row I/O: line parsing, JSON Lines, glob expansion and compression.

pub mod compression;
pub mod glob;
pub mod jsonl;
pub mod lines;

use crate::error::Result;
use crate::row::Row;
use std::sync::Arc;

/// Turns one text line into a row; shared by every execution of a file-backed leaf.
pub type LineParser = Arc<dyn Fn(&str) -> Result<Row> + Send + Sync>;

pub use glob::expand_glob;
pub use jsonl::{parse_json_row, write_jsonl};
pub use lines::ParsedLines;
