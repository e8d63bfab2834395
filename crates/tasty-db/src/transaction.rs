//! Transaction context: one begin and exactly one of commit or rollback per
//! unit of work.
//!
//! The unit of work is an async closure receiving the open transaction
//! handle. Its result is folded into a [`WorkOutcome`], which covers success,
//! a returned error, and a panic. One exhaustive match then decides between
//! commit, rollback-and-return and rollback-and-resume-unwind.
//!
//! # Examples
//!
//! ```rust,ignore
//! let ctx = TransactionContext::new(backend);
//! let id = ctx
//!     .run("insert", |tx| Box::pin(async move {
//!         tx.insert_recipe(&scalars).await
//!     }))
//!     .await?;
//! ```

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tracing::{debug, error, warn};

use tasty_core::{logging, Error, Result};

use crate::backend::Backend;

/// Result of running a unit of work.
pub enum WorkOutcome<T> {
    /// The work returned `Ok`.
    Success(T),
    /// The work returned `Err`.
    Failure(Error),
    /// The work panicked. Carries the original payload.
    Fault(Box<dyn Any + Send + 'static>),
}

impl<T> From<std::thread::Result<Result<T>>> for WorkOutcome<T> {
    fn from(caught: std::thread::Result<Result<T>>) -> Self {
        match caught {
            Ok(Ok(value)) => WorkOutcome::Success(value),
            Ok(Err(err)) => WorkOutcome::Failure(err),
            Err(payload) => WorkOutcome::Fault(payload),
        }
    }
}

/// What to do with a transaction whose work succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Completion {
    Commit,
    /// Read-only work: the transaction only provides a consistent snapshot.
    Discard,
}

/// Runs units of work inside storage transactions.
pub struct TransactionContext<B: Backend> {
    backend: Arc<B>,
}

impl<B: Backend> Clone for TransactionContext<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: Backend> TransactionContext<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Liveness probe against the backend.
    pub async fn ping(&self) -> Result<()> {
        self.backend.ping().await
    }

    /// Run `work` and commit if it succeeds.
    ///
    /// A commit failure is returned even though the work itself succeeded.
    /// On error or panic the transaction is rolled back; a rollback failure is
    /// logged and the original error or panic is propagated unchanged.
    pub async fn run<F, T>(&self, op: &'static str, work: F) -> Result<T>
    where
        F: for<'a> FnOnce(&'a mut B::Tx) -> Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>
            + Send,
        T: Send,
    {
        self.execute(op, Completion::Commit, work).await
    }

    /// Run read-only `work` against a consistent snapshot.
    ///
    /// The transaction is always rolled back. If that rollback fails after
    /// the work succeeded, the failure is returned as [`Error::Rollback`].
    pub async fn read<F, T>(&self, op: &'static str, work: F) -> Result<T>
    where
        F: for<'a> FnOnce(&'a mut B::Tx) -> Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>
            + Send,
        T: Send,
    {
        self.execute(op, Completion::Discard, work).await
    }

    async fn execute<F, T>(&self, op: &'static str, completion: Completion, work: F) -> Result<T>
    where
        F: for<'a> FnOnce(&'a mut B::Tx) -> Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>
            + Send,
        T: Send,
    {
        let start = Instant::now();

        let mut tx = self.backend.begin().await.map_err(|e| {
            error!(
                subsystem = logging::DATABASE,
                component = logging::TRANSACTION,
                op,
                error = %e,
                "Failed to begin transaction"
            );
            Error::Begin(e)
        })?;
        debug!(
            subsystem = logging::DATABASE,
            component = logging::TRANSACTION,
            op,
            "Transaction started"
        );

        // The closure call itself sits inside the guarded future so a panic
        // raised before its first await is caught too.
        let outcome: WorkOutcome<T> = AssertUnwindSafe(async { work(&mut tx).await })
            .catch_unwind()
            .await
            .into();

        match (outcome, completion) {
            (WorkOutcome::Success(value), Completion::Commit) => {
                self.backend.commit(tx).await.map_err(|e| {
                    error!(
                        subsystem = logging::DATABASE,
                        component = logging::TRANSACTION,
                        op,
                        error = %e,
                        "Failed to commit transaction"
                    );
                    Error::Commit(e)
                })?;
                debug!(
                    subsystem = logging::DATABASE,
                    component = logging::TRANSACTION,
                    op,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Transaction committed"
                );
                Ok(value)
            }
            (WorkOutcome::Success(value), Completion::Discard) => {
                self.backend.rollback(tx).await.map_err(|e| {
                    error!(
                        subsystem = logging::DATABASE,
                        component = logging::TRANSACTION,
                        op,
                        error = %e,
                        "Failed to release read transaction"
                    );
                    Error::Rollback(e)
                })?;
                debug!(
                    subsystem = logging::DATABASE,
                    component = logging::TRANSACTION,
                    op,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Read transaction released"
                );
                Ok(value)
            }
            (WorkOutcome::Failure(err), _) => {
                match self.backend.rollback(tx).await {
                    Ok(()) => warn!(
                        subsystem = logging::DATABASE,
                        component = logging::TRANSACTION,
                        op,
                        error = %err,
                        "Transaction rolled back"
                    ),
                    Err(rollback_err) => error!(
                        subsystem = logging::DATABASE,
                        component = logging::TRANSACTION,
                        op,
                        error = %err,
                        rollback_error = %rollback_err,
                        "Rollback failed after unit of work error"
                    ),
                }
                Err(err)
            }
            (WorkOutcome::Fault(payload), _) => {
                match self.backend.rollback(tx).await {
                    Ok(()) => error!(
                        subsystem = logging::DATABASE,
                        component = logging::TRANSACTION,
                        op,
                        "Transaction rolled back after panic"
                    ),
                    Err(rollback_err) => error!(
                        subsystem = logging::DATABASE,
                        component = logging::TRANSACTION,
                        op,
                        rollback_error = %rollback_err,
                        "Rollback failed after panic"
                    ),
                }
                std::panic::resume_unwind(payload)
            }
        }
    }
}
