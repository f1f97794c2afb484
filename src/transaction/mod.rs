//! Explicit transaction handles for chunk processing
//!
//! Writers never look up an ambient transaction. The caller passes the
//! [`Transaction`] it is running in, and the writer asks that handle whether
//! synchronization is possible, whether a real transaction is open and whether it
//! is read-only. Work that must only happen on a successful commit is registered
//! as a [`TransactionSynchronization`].

mod manager;

pub use manager::TransactionManager;

use crate::error::BatchResult;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Transaction synchronization is not active for '{name}'")]
    SynchronizationInactive { name: String },

    #[error("Transaction '{name}' is already completed; do not call commit or rollback more than once")]
    AlreadyCompleted { name: String },
}

/// How a transaction scope relates to an actual transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Propagation {
    /// Open an actual transaction
    #[default]
    Required,
    /// Run without an actual transaction; only synchronization may be active
    Supports,
}

/// When transactions activate synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SynchronizationMode {
    /// Also for empty scopes opened with [`Propagation::Supports`]
    #[default]
    Always,
    /// Only when an actual transaction is open
    OnActualTransaction,
    /// Never; every write happens immediately
    Never,
}

/// Attributes used to begin a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransactionDefinition {
    pub name: Option<String>,
    pub read_only: bool,
    pub propagation: Propagation,
}

impl TransactionDefinition {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn propagation(mut self, propagation: Propagation) -> Self {
        self.propagation = propagation;
        self
    }
}

/// Outcome reported to [`TransactionSynchronization::after_completion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    Committed,
    RolledBack,
}

/// Callback tied to the lifecycle of one transaction.
pub trait TransactionSynchronization: Send {
    /// Runs right before the transaction commits, and only then. An error aborts
    /// the commit and rolls the transaction back.
    fn before_commit(&mut self, _read_only: bool) -> BatchResult<()> {
        Ok(())
    }

    /// Runs once the transaction is finished, whichever way it ended.
    fn after_completion(&mut self, _status: CompletionStatus) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

/// Handle to one transaction scope, handed explicitly to writers.
pub struct Transaction {
    name: String,
    read_only: bool,
    actual: bool,
    synchronization_active: bool,
    rollback_only: bool,
    state: TransactionState,
    synchronizations: Vec<Box<dyn TransactionSynchronization>>,
}

impl Transaction {
    pub(crate) fn new(
        name: String,
        read_only: bool,
        actual: bool,
        synchronization_active: bool,
    ) -> Self {
        Self {
            name,
            read_only,
            actual,
            synchronization_active,
            rollback_only: false,
            state: TransactionState::Active,
            synchronizations: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether callbacks can be registered on this scope
    pub fn is_synchronization_active(&self) -> bool {
        self.synchronization_active && self.state == TransactionState::Active
    }

    /// Whether a real transaction is open, as opposed to an empty scope
    pub fn is_actual_transaction_active(&self) -> bool {
        self.actual && self.state == TransactionState::Active
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Mark the transaction so that commit turns into a rollback
    pub fn set_rollback_only(&mut self) {
        self.rollback_only = true;
    }

    pub fn is_rollback_only(&self) -> bool {
        self.rollback_only
    }

    pub fn is_completed(&self) -> bool {
        self.state != TransactionState::Active
    }

    /// Number of callbacks waiting for completion
    pub fn synchronization_count(&self) -> usize {
        self.synchronizations.len()
    }

    /// Register a callback; callbacks fire in registration order.
    pub fn register_synchronization(
        &mut self,
        synchronization: Box<dyn TransactionSynchronization>,
    ) -> Result<(), TransactionError> {
        if !self.is_synchronization_active() {
            return Err(TransactionError::SynchronizationInactive {
                name: self.name.clone(),
            });
        }
        self.synchronizations.push(synchronization);
        Ok(())
    }

    pub(crate) fn ensure_active(&self) -> Result<(), TransactionError> {
        if self.is_completed() {
            return Err(TransactionError::AlreadyCompleted {
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Run every before-commit callback in order, stopping at the first error.
    pub(crate) fn trigger_before_commit(&mut self) -> BatchResult<()> {
        let read_only = self.read_only;
        for synchronization in self.synchronizations.iter_mut() {
            synchronization.before_commit(read_only)?;
        }
        Ok(())
    }

    /// Finish the transaction and notify every callback exactly once.
    pub(crate) fn complete(&mut self, status: CompletionStatus) {
        self.state = match status {
            CompletionStatus::Committed => TransactionState::Committed,
            CompletionStatus::RolledBack => TransactionState::RolledBack,
        };
        for mut synchronization in self.synchronizations.drain(..) {
            synchronization.after_completion(status);
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("name", &self.name)
            .field("read_only", &self.read_only)
            .field("actual", &self.actual)
            .field("synchronization_active", &self.synchronization_active)
            .field("rollback_only", &self.rollback_only)
            .field("state", &self.state)
            .field("synchronizations", &self.synchronizations.len())
            .finish()
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.state == TransactionState::Active {
            warn!(
                "Transaction '{}' dropped without explicit commit or rollback, discarding {} pending callback(s)",
                self.name,
                self.synchronizations.len()
            );
            self.complete(CompletionStatus::RolledBack);
        }
    }
}
