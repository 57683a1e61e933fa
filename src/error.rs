//! Error types for lexmerge.
//!
//! All fallible operations return [`Result`], whose error type is
//! [`LexMergeError`]. Errors raised by leaf cursors (the data sources) are
//! passed through the mergers untouched, so callers see exactly what the
//! underlying reader reported.
//!
//! Protocol misuse, such as advancing an exhausted cursor or skipping
//! backwards, is a programming error and panics instead of producing a
//! value of this type.
//!
//! # Examples
//!
//! ```
//! use lexmerge::error::{LexMergeError, Result};
//!
//! fn read_block() -> Result<()> {
//!     Err(LexMergeError::data_source("truncated posting block"))
//! }
//!
//! match read_block() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for lexmerge operations.
#[derive(Error, Debug)]
pub enum LexMergeError {
    /// I/O errors raised while a leaf cursor reads its data.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A leaf cursor could not produce its next key (corruption, bad ordering).
    #[error("Data source error: {0}")]
    DataSource(String),

    /// Rejected configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failures collected while closing several cursors.
    #[error("{} error(s) while closing cursors: {}", .0.len(), join_messages(.0))]
    Close(Vec<LexMergeError>),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Opaque error handed back by a collaborator.
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with LexMergeError.
pub type Result<T> = std::result::Result<T, LexMergeError>;

fn join_messages(errors: &[LexMergeError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl LexMergeError {
    /// Create a new data source error.
    pub fn data_source<S: Into<String>>(msg: S) -> Self {
        LexMergeError::DataSource(msg.into())
    }

    /// Create a new invalid config error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        LexMergeError::InvalidConfig(msg.into())
    }

    /// Fold a list of close failures into a single result.
    ///
    /// An empty list means every close succeeded. A single failure is
    /// returned as-is.
    pub fn from_close_errors(errors: Vec<LexMergeError>) -> Result<()> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Self::close_failure(errors))
        }
    }

    /// Wrap collected close failures, unwrapping a lone error.
    pub(crate) fn close_failure(mut errors: Vec<LexMergeError>) -> Self {
        if errors.len() == 1 {
            errors.remove(0)
        } else {
            LexMergeError::Close(errors)
        }
    }
}
