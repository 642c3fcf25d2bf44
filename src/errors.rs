/*!
 * Error types for the chapterwise library.
 *
 * This module contains custom error types for the different layers of the
 * translation pipeline, using the thiserror crate for ergonomic error definitions.
 */

use thiserror::Error;

/// Errors that can occur during a single provider call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// The request did not complete within the wall-clock budget
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    /// The provider answered with a non-2xx status
    #[error("API responded with error: {status_code} - {message}")]
    Http {
        /// HTTP status code
        status_code: u16,
        /// Error body returned by the API
        message: String,
    },

    /// The provider answered without any usable text
    #[error("Empty response from provider: {0}")]
    EmptyResponse(String),

    /// The recovered array does not match the number of submitted texts
    #[error("Response length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Number of texts sent
        expected: usize,
        /// Number of texts received
        actual: usize,
    },

    /// The reply could not be turned into a JSON array
    #[error("Failed to parse API response: {0}")]
    Parse(String),

    /// Transport-level failure (connection refused, TLS, body decoding)
    #[error("API request failed: {0}")]
    Request(String),

    /// The run's cancellation token fired while the call was in flight
    #[error("Translation cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Whether another attempt against the same or a fallback provider makes sense
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }

    /// Whether this error is the cancellation signal
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => Self::Http {
                status_code: status.as_u16(),
                message: error.to_string(),
            },
            None => Self::Request(error.to_string()),
        }
    }
}

/// Errors that can occur while translating documents
#[derive(Error, Debug, Clone)]
pub enum TranslationError {
    /// Error from a provider call that was not retried
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Every provider and retry was exhausted for one batch
    #[error("Batch {batch} failed: {source}")]
    BatchFailed {
        /// One-based batch number
        batch: usize,
        /// Last error seen for the batch
        source: ProviderError,
    },

    /// The run was cancelled
    #[error("Translation cancelled")]
    Cancelled,

    /// Invalid or incomplete run configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A document could not be loaded from its source
    #[error("Document error: {0}")]
    Document(String),
}

impl TranslationError {
    /// Whether this error is the cancellation signal, at any depth
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Provider(e) => e.is_cancelled(),
            Self::BatchFailed { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error in the configuration file
    #[error("Config error: {0}")]
    Config(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from translation
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
