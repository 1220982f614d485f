// ⚠️ Error taxonomy
// Whole-operation failures surface once as a typed error; per-row problems never do.

use thiserror::Error;

/// Failure of one whole ingestion call (fetch or parse of the payload itself).
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to fetch sheet: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("sheet request returned HTTP status {0}")]
    Status(u16),

    #[error("failed to read sheet export {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse sheet payload: {0}")]
    Parse(#[from] csv::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(#[from] rusqlite::Error),

    #[error("stored value under '{key}' is not valid JSON: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode value for '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("storage lock poisoned")]
    Poisoned,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Username or email already exists")]
    DuplicateAccount,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("student not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Validation(#[from] crate::validation::ValidationError),

    #[error("invalid payment amount: {0}")]
    InvalidPayment(f64),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}
