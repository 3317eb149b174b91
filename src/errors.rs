/*!
 * Error types for the locflow engine.
 *
 * This module contains custom error types for the different boundaries of the
 * engine, using the thiserror crate for ergonomic error definitions.
 */

use thiserror::Error;

/// Errors that can occur when calling a machine-translation provider
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The provider did not answer within the configured timeout
    #[error("Provider timed out after {0} seconds")]
    Timeout(u64),

    /// The provider is switched off in the configuration
    #[error("Machine translation is disabled")]
    Disabled,
}

/// Errors raised by the translator directory
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DirectoryError {
    /// No translator with this id
    #[error("Unknown translator: {0}")]
    UnknownTranslator(String),

    /// Reserving one more task would exceed the translator's capacity
    #[error("Translator {id} is at capacity ({max_workload} tasks)")]
    AtCapacity {
        /// Translator id
        id: String,
        /// Configured maximum workload
        max_workload: u32,
    },
}

/// Workflow error taxonomy surfaced by the engine's public operations
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Unknown request, translator or entry
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What was looked up ("translation request", "translator", ...)
        kind: &'static str,
        /// The identifier that was not found
        id: String,
    },

    /// Transition missing from the legal transition table
    #[error("Invalid transition for request {request_id}: {from} -> {to}")]
    InvalidTransition {
        /// Request identifier
        request_id: String,
        /// Current status
        from: String,
        /// Requested status
        to: String,
    },

    /// No translator satisfies the language and workload constraints
    #[error("No eligible translator for request {request_id}")]
    NoEligibleTranslator {
        /// Request identifier
        request_id: String,
    },

    /// Machine translation failed and no fallback was usable
    #[error("Translation unavailable: {0}")]
    ProviderUnavailable(#[from] ProviderError),

    /// Malformed input to a public operation
    #[error("Validation failed: {0}")]
    ValidationFailure(String),

    /// The persisted record changed underneath the caller
    #[error("Request {0} was modified concurrently")]
    ConcurrentModification(String),

    /// The translator directory refused an operation
    #[error("Translator directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// The localization publisher failed
    #[error("Publication failed: {0}")]
    Publisher(String),

    /// Opaque persistence failure
    #[error("Storage error: {0}")]
    Storage(String),
}

impl WorkflowError {
    /// Shorthand for a `NotFound` on a translation request
    pub fn request_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "translation request",
            id: id.into(),
        }
    }

    /// Shorthand for a `NotFound` on a translator
    pub fn translator_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "translator",
            id: id.into(),
        }
    }
}

impl From<anyhow::Error> for WorkflowError {
    fn from(error: anyhow::Error) -> Self {
        Self::Storage(format!("{:#}", error))
    }
}

/// Result alias used across the workflow engine
pub type WorkflowResult<T> = Result<T, WorkflowError>;
