//! Error types for the MySQL Backup Operator

use thiserror::Error;

use crate::store::StoreError;

/// Result type alias using the operator's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Operator error types
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Classified object store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Optimistic-concurrency retries exhausted
    #[error("Update conflicts exhausted after {attempts} attempts")]
    ConflictExhausted { attempts: u32 },

    /// Reconcile pass exceeded the caller-imposed deadline
    #[error("Reconcile deadline exceeded")]
    DeadlineExceeded,

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }
}
