//! Error types for the tag store and its surfaces

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TmsuError {
    /// A named tag or file does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Attempt to create a duplicate tag, tagging or database.
    #[error("{0}")]
    AlreadyExists(String),

    /// A tag name violates the naming rules.
    #[error("{0}")]
    InvalidName(String),

    /// A query expression failed to parse.
    #[error("could not parse query '{0}'")]
    InvalidQuery(String),

    /// Underlying filesystem error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error, including integrity violations.
    #[error("database error: {0}")]
    Store(#[from] rusqlite::Error),

    /// The database was created by an incompatible version of the tool.
    #[error("database revision {found} is not supported (expected {expected}); re-create the database or use a matching version of the tool")]
    IncompatibleSchema { found: u32, expected: u32 },

    /// An ambiguity the user must resolve, e.g. a repair move with
    /// several candidate rows.
    #[error("{0}")]
    Conflict(String),

    /// A command invocation with missing or malformed arguments.
    #[error("{0}")]
    Usage(String),

    /// Unrecoverable invariant violation.
    #[error("fatal: {0}")]
    Fatal(String),
}

pub type Result<T> = std::result::Result<T, TmsuError>;
