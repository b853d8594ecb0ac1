//! JSON Lines row I/O.
//!
//! - [`parse_json_row`] is the stock line parser for file sources: one JSON object per line.
//! - [`write_jsonl`] drains a row stream into a file, one JSON object per line.
//!
//! Output paths ending in `.gz`/`.zst` are compressed when the matching feature is on.

use super::compression::auto_detect_writer;
use crate::error::{Error, Result};
use crate::row::Row;
use std::fs::{File, create_dir_all};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Parse one line holding a JSON object into a [`Row`].
///
/// # Errors
/// [`Error::Type`] if the line is not a JSON object of supported values.
pub fn parse_json_row(line: &str) -> Result<Row> {
    Row::from_json_str(line)
}

/// Write every row of `rows` to `path` as JSON Lines, creating parent directories.
///
/// Rows are written as they are pulled; on an upstream error the rows written so far
/// stay in the file and the error is returned.
///
/// # Returns
/// The number of rows written.
///
/// # Errors
/// The first upstream error, or [`Error::Io`] if the file cannot be created or written.
pub fn write_jsonl<I>(path: impl AsRef<Path>, rows: I) -> Result<usize>
where
    I: IntoIterator<Item = Result<Row>>,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let f = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut w = auto_detect_writer(BufWriter::new(f), path).map_err(|e| Error::io(path, e))?;
    let mut written = 0usize;
    for row in rows {
        let row = row?;
        writeln!(w, "{row}").map_err(|e| Error::io(path, e))?;
        written += 1;
    }
    w.flush().map_err(|e| Error::io(path, e))?;
    Ok(written)
}
