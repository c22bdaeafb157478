//! Error types for report parsing in tracker-types.

use thiserror::Error;

/// Errors that can occur when decoding an uplink report.
///
/// This enum is marked `#[non_exhaustive]` so new decode failures can be
/// added without breaking downstream matches.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The body was not valid JSON, or a field had the wrong type.
    #[error("Malformed report JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A network identifier was not a valid hex string.
    #[error("Invalid {kind} '{value}': {reason}")]
    InvalidIdentifier {
        kind: &'static str,
        value: String,
        reason: &'static str,
    },

    /// The relay sent an event that is not an uplink (join, ack, ...).
    #[error("Unsupported report type: {0}")]
    UnsupportedType(String),
}

/// Result type alias using tracker-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
