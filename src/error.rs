//! Error types for the batch adapters
//!
//! This module provides structured error types using thiserror. Configuration
//! problems surface at construction time as [`ConfigError`]; everything that goes
//! wrong while a job runs is a [`BatchError`] carrying the original cause.

use crate::storage::StorageError;
use crate::transaction::TransactionError;
use thiserror::Error;

/// Setup-time validation failures. Never raised once a component is built.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// One message per missing collaborator, in declaration order
    #[error("{}", .missing.join(" "))]
    MissingCollaborators { missing: Vec<&'static str> },

    #[error("Page size must be greater than zero")]
    InvalidPageSize,

    #[error("Commit interval must be greater than zero")]
    InvalidCommitInterval,
}

impl ConfigError {
    /// Messages of the missing collaborators, empty for other variants
    pub fn missing(&self) -> &[&'static str] {
        match self {
            Self::MissingCollaborators { missing } => missing,
            _ => &[],
        }
    }
}

/// Main error type for reading, writing and running chunk steps
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Failure reported by the search client, passed through unchanged
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// A hit could not be converted into the reader's target type
    #[error("Failed to convert document '{id}' into {target_type}: {source}")]
    Conversion {
        id: String,
        target_type: String,
        source: serde_json::Error,
    },

    /// Lifecycle misuse or a corrupt execution context
    #[error("Item stream error: {reason}")]
    ItemStream { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BatchError {
    /// Get a stable status code for this error type.
    pub fn status_code(&self) -> String {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Transaction(_) => "TRANSACTION_ERROR",
            Self::Conversion { .. } => "CONVERSION_ERROR",
            Self::ItemStream { .. } => "ITEM_STREAM_ERROR",
            Self::Io(_) => "IO_ERROR",
        }
        .to_string()
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Config(_) => vec![
                "Supply every required collaborator before building the component",
                "Check page_size and commit_interval in .search-batch/settings.toml",
            ],
            Self::Storage(StorageError::QueryParser(_)) => {
                vec!["Check the query string syntax, quoting phrases where needed"]
            }
            Self::Storage(_) => vec![
                "Check disk space and permissions in the index directory",
                "Writes applied before the failure are not rolled back",
            ],
            Self::Conversion { .. } => vec![
                "Make sure the target type matches the stored documents",
                "Optional fields should be declared with #[serde(default)]",
            ],
            Self::Transaction(TransactionError::AlreadyCompleted { .. }) => {
                vec!["Begin a new transaction for every chunk"]
            }
            _ => vec![],
        }
    }
}

pub type BatchResult<T> = Result<T, BatchError>;
