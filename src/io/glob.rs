//! Glob expansion for multi-file sources.

use crate::error::{Error, Result};
use std::path::PathBuf;

/// Expand a glob pattern into the matching files, sorted lexicographically.
///
/// Directories are skipped. No match is an empty vector, not an error.
///
/// ```no_run
/// use compgraph::io::expand_glob;
///
/// let files = expand_glob("logs/*.jsonl")?;
/// # Ok::<(), compgraph::Error>(())
/// ```
///
/// # Errors
/// [`Error::Pattern`] for an invalid pattern, [`Error::Io`] if a directory cannot be read.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths = glob::glob(pattern).map_err(|e| Error::Pattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;

    let mut result = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| Error::io(e.path().to_path_buf(), e.into_error()))?;
        if path.is_file() {
            result.push(path);
        }
    }
    result.sort();
    Ok(result)
}
