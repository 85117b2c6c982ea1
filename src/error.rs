//! Error types for graph building, enrichment and projection

use thiserror::Error;

use crate::types::PersonId;

/// Crate-level error
#[derive(Debug, Error)]
pub enum Error {
    /// The snapshot is missing a nested field the graph build relies on
    #[error("Malformed snapshot: {0}")]
    MalformedSnapshot(String),

    /// Projection requested for an id that is not in the graph or has no card
    #[error("Unknown person: {0}")]
    UnknownPerson(PersonId),

    /// Fetching a person's card failed at the transport level
    #[error("Fetch failed for {id}: {source}")]
    Fetch {
        id: PersonId,
        #[source]
        source: FetchError,
    },

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading or writing a file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be parsed
    #[error("Config error: {0}")]
    Config(String),
}

/// Error from the member directory.
///
/// Cloneable because one fetch result is broadcast to every caller waiting
/// on the same key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(String),

    /// Server returned an error
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid response from server
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The task performing the fetch went away without reporting a result
    #[error("Fetch abandoned before completion")]
    Abandoned,
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Http(e.to_string())
    }
}

/// Result type for crate operations
pub type Result<T> = std::result::Result<T, Error>;
