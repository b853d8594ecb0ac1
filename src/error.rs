//! Error taxonomy for graph construction, execution and row I/O.
//!
//! Every failure surfaces synchronously to whoever pulls the failing row. Nothing is
//! retried and no default value is substituted for a missing field. Rows already handed
//! to the caller before the error stay valid.

use crate::value::KeyTuple;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// `run()` was called without a binding for a named source leaf.
    #[error("no source bound for name `{0}`")]
    MissingSource(String),

    /// A graph node without an attached operation was executed.
    #[error("graph node has no operation to perform")]
    InvalidGraph,

    /// The grouping primitive saw a key smaller than the one before it.
    #[error("stream is not sorted by {keys:?}: {current} follows {previous}")]
    StreamNotSorted {
        keys: Vec<String>,
        previous: KeyTuple,
        current: KeyTuple,
    },

    /// A mapper, reducer, joiner or sort referenced a field the row does not have.
    #[error("row has no field `{0}`")]
    MissingField(String),

    /// A formula could not be parsed or uses an unsupported operator.
    #[error("expression error in `{formula}`: {message}")]
    Expression { formula: String, message: String },

    /// A value had the wrong type for the operation applied to it.
    #[error("type error: {0}")]
    Type(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A source line could not be turned into a row.
    #[error("parse error at {path}:{line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// A glob or regex pattern did not compile.
    #[error("invalid pattern `{pattern}`: {message}")]
    Pattern { pattern: String, message: String },

    /// Encoding or decoding a sort spill run failed.
    #[error("spill error: {0}")]
    Spill(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn expression(formula: &str, message: impl Into<String>) -> Self {
        Self::Expression {
            formula: formula.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
