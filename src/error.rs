/*!
    Errors raised by the task store and the file formats around it.
!*/
use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Task text must not be empty.")]
    EmptyText,

    #[error("Invalid sort key `{0}`, expected one of: text, category, priority, due_date.")]
    InvalidSortKey(String),

    #[error("Invalid priority `{0}`, expected one of: Low, Medium, High.")]
    InvalidPriority(String),

    #[error("No task selected.")]
    NoSelection,

    #[error("Task {index} does not exist, the list has {len} task(s).")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Malformed CSV header: {0}")]
    CsvHeader(String),

    #[error("Malformed CSV row {row}: {reason}")]
    CsvRecord { row: usize, reason: String },

    #[error("Invalid task record {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("Invalid timestamp `{0}`.")]
    InvalidTimestamp(String),

    #[error("Can't parse task JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Editor failed: {0}")]
    Editor(String),
}

/// Coarse classification the shells use to decide how to present a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Index,
    Format,
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::EmptyText | Error::InvalidSortKey(_) | Error::InvalidPriority(_) => {
                ErrorKind::Validation
            }
            Error::NoSelection | Error::IndexOutOfRange { .. } => ErrorKind::Index,
            Error::CsvHeader(_)
            | Error::CsvRecord { .. }
            | Error::InvalidRecord { .. }
            | Error::InvalidTimestamp(_)
            | Error::Json(_) => ErrorKind::Format,
            Error::Io(_) | Error::Config(_) | Error::Editor(_) => ErrorKind::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
