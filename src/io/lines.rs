//! Lazily parsed line files, the stream behind file-backed graph leaves.

use super::LineParser;
use super::compression::auto_detect_reader;
use crate::error::{Error, Result};
use crate::row::Row;
use std::fs::File;
use std::io::{BufRead, Lines};
use std::path::PathBuf;
use tracing::{debug, trace};

struct OpenFile {
    path: PathBuf,
    lines: Lines<Box<dyn BufRead>>,
    line_no: usize,
}

/// Rows parsed line by line from one or more files, in path order.
///
/// Nothing is opened until the first pull; each file is closed as soon as it is exhausted
/// or the stream is dropped. Blank lines are skipped. The stream ends after its first error.
pub struct ParsedLines {
    paths: std::vec::IntoIter<PathBuf>,
    current: Option<OpenFile>,
    parser: LineParser,
    failed: bool,
}

impl ParsedLines {
    pub fn new(paths: Vec<PathBuf>, parser: LineParser) -> Self {
        Self {
            paths: paths.into_iter(),
            current: None,
            parser,
            failed: false,
        }
    }

    fn open_next(&mut self) -> Option<Result<()>> {
        let path = self.paths.next()?;
        debug!(path = %path.display(), "opening file source");
        let opened = File::open(&path)
            .and_then(|f| auto_detect_reader(f, &path))
            .map_err(|e| Error::io(&path, e));
        Some(opened.map(|reader| {
            self.current = Some(OpenFile {
                path,
                lines: reader.lines(),
                line_no: 0,
            });
        }))
    }

    fn fail(&mut self, e: Error) -> Option<Result<Row>> {
        self.failed = true;
        self.current = None;
        Some(Err(e))
    }
}

impl Iterator for ParsedLines {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Result<Row>> {
        loop {
            if self.failed {
                return None;
            }
            if self.current.is_none() {
                if let Err(e) = self.open_next()? {
                    return self.fail(e);
                }
            }
            let file = self.current.as_mut()?;
            match file.lines.next() {
                None => self.current = None,
                Some(Err(e)) => {
                    let e = Error::io(&file.path, e);
                    return self.fail(e);
                }
                Some(Ok(line)) => {
                    file.line_no += 1;
                    if line.trim().is_empty() {
                        trace!(line = file.line_no, "skipping blank line");
                        continue;
                    }
                    let parsed = (self.parser)(&line).map_err(|e| Error::Parse {
                        path: file.path.clone(),
                        line: file.line_no,
                        message: e.to_string(),
                    });
                    return match parsed {
                        Ok(row) => Some(Ok(row)),
                        Err(e) => self.fail(e),
                    };
                }
            }
        }
    }
}
