use super::{
    CompletionStatus, Propagation, SynchronizationMode, Transaction, TransactionDefinition,
};
use crate::error::BatchResult;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error};

/// Resource-less transaction manager.
///
/// It owns no connection; a transaction is nothing more than a scope that
/// collects synchronization callbacks and fires them on commit or rollback.
#[derive(Debug, Default)]
pub struct TransactionManager {
    synchronization: SynchronizationMode,
    counter: AtomicU64,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_synchronization(synchronization: SynchronizationMode) -> Self {
        Self {
            synchronization,
            counter: AtomicU64::new(0),
        }
    }

    pub fn synchronization(&self) -> SynchronizationMode {
        self.synchronization
    }

    pub fn begin(&self, definition: &TransactionDefinition) -> Transaction {
        let id = self.counter.fetch_add(1, Ordering::Relaxed);
        let name = definition
            .name
            .clone()
            .unwrap_or_else(|| format!("tx-{id}"));
        let actual = definition.propagation == Propagation::Required;
        let synchronization_active = match self.synchronization {
            SynchronizationMode::Always => true,
            SynchronizationMode::OnActualTransaction => actual,
            SynchronizationMode::Never => false,
        };

        debug!(
            "Beginning transaction '{name}' (actual={actual}, read_only={}, synchronization={synchronization_active})",
            definition.read_only
        );
        Transaction::new(name, definition.read_only, actual, synchronization_active)
    }

    /// Commit `transaction`, running before-commit callbacks first.
    ///
    /// A failing callback rolls the transaction back and its error is returned.
    /// A rollback-only transaction is rolled back without error.
    pub fn commit(&self, transaction: &mut Transaction) -> BatchResult<()> {
        transaction.ensure_active()?;

        if transaction.is_rollback_only() {
            debug!(
                "Transaction '{}' is marked rollback-only, rolling back",
                transaction.name()
            );
            transaction.complete(CompletionStatus::RolledBack);
            return Ok(());
        }

        if let Err(e) = transaction.trigger_before_commit() {
            error!(
                "Before-commit callback failed for transaction '{}', rolling back: {e}",
                transaction.name()
            );
            transaction.complete(CompletionStatus::RolledBack);
            return Err(e);
        }

        transaction.complete(CompletionStatus::Committed);
        debug!("Committed transaction '{}'", transaction.name());
        Ok(())
    }

    /// Roll `transaction` back. Before-commit callbacks never run.
    pub fn rollback(&self, transaction: &mut Transaction) -> BatchResult<()> {
        transaction.ensure_active()?;
        transaction.complete(CompletionStatus::RolledBack);
        debug!("Rolled back transaction '{}'", transaction.name());
        Ok(())
    }

    /// Run `work` inside a new transaction: commit when it succeeds, roll back
    /// and return its error when it fails.
    pub fn execute<R>(
        &self,
        definition: &TransactionDefinition,
        work: impl FnOnce(&mut Transaction) -> BatchResult<R>,
    ) -> BatchResult<R> {
        let mut transaction = self.begin(definition);
        match work(&mut transaction) {
            Ok(value) => {
                self.commit(&mut transaction)?;
                Ok(value)
            }
            Err(e) => {
                self.rollback(&mut transaction)?;
                Err(e)
            }
        }
    }
}
