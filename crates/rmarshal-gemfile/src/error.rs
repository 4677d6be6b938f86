//! Error types produced while tokenizing or evaluating a Gemfile.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GemfileError {
    #[error("{file}:{line}:{column}: {message}")]
    Syntax { file: String, line: usize, column: usize, message: String },

    #[error("I/O error reading {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },

    #[error("{0}")]
    Other(String),
}

pub type Result<T, E = GemfileError> = std::result::Result<T, E>;
