//! Error types for tracker-store.

use std::path::PathBuf;

use crate::ingest::ValidationError;

/// Result type for tracker-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tracker-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The database exists but has no tracker schema.
    #[error("Database {0} has not been initialized")]
    SchemaMissing(PathBuf),

    /// Schema initialization was run against an initialized database.
    #[error("Database is already initialized")]
    AlreadyInitialized,

    /// The raw report body could not be decoded.
    #[error("Ingestion rejected: {0}")]
    Decode(#[from] tracker_types::ParseError),

    /// The decoded report is missing required data.
    #[error("Ingestion rejected: {0}")]
    Rejected(#[from] ValidationError),

    /// A query boundary could not be parsed.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// GPX serialization error.
    #[error("GPX error: {0}")]
    Gpx(#[from] gpx::errors::GpxError),

    /// Failed to write the exported track.
    #[error("Failed to write {path}: {source}")]
    Export {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Error {
    /// Whether the error is a problem with the submitted report rather than
    /// with the store.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Error::Decode(_) | Error::Rejected(_))
    }
}
