//! Common error types for Calma

use thiserror::Error;

/// Common result type for Calma operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across Calma services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error. Fatal, never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Text model returned content that does not conform to the required
    /// schema. Fatal for the job; raw model output is kept for diagnosis.
    #[error("Generation validation error: {message}")]
    Validation {
        message: String,
        /// Raw model output, if available
        raw_text: Option<String>,
        /// Underlying parse/deserialize cause
        cause: Option<String>,
    },

    /// Transient I/O failure (storage propagation, HEAD checks, subprocess
    /// blips). Eligible for retry with backoff.
    #[error("Transient error: {0}")]
    Transient(String),

    /// Non-2xx HTTP response from an upstream service
    #[error("HTTP error {status}: {body}")]
    Http { status: u16, body: String },

    /// Media subprocess failure, stderr captured
    #[error("Media processing error: {message}")]
    Media { message: String, stderr: String },

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error is a transient condition worth retrying.
    ///
    /// Configuration and validation errors are never retryable; HTTP 404
    /// and 403 from storage are treated as propagation delay.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Transient(_) => true,
            Error::Http { status, .. } => matches!(status, 403 | 404 | 429 | 500 | 502 | 503),
            Error::Database(db_err) => db_err.to_string().contains("database is locked"),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            Error::Transient(err.to_string())
        } else {
            Error::Internal(err.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Internal(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(Error::Transient("blip".into()).is_transient());
        assert!(Error::Http {
            status: 404,
            body: String::new()
        }
        .is_transient());
        assert!(Error::Http {
            status: 403,
            body: String::new()
        }
        .is_transient());
        assert!(!Error::Http {
            status: 401,
            body: String::new()
        }
        .is_transient());
        assert!(!Error::Config("bad duration".into()).is_transient());
        assert!(!Error::Validation {
            message: "schema".into(),
            raw_text: None,
            cause: None
        }
        .is_transient());
    }
}
