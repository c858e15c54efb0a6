//! Scoped ownership of the connection's database transaction.

use std::time::Duration;

use gateway::TransactionGateway;

use crate::timeout::bounded;

/// An open database transaction on a gateway.
///
/// `acquire` remembers the connection's auto-commit flag and disables it;
/// `release` puts the remembered flag back. Commit and rollback go through
/// the scope so it knows whether the transaction was cleanly ended. If the
/// last rollback failed, `release` retries it once before restoring
/// auto-commit, since re-enabling auto-commit commits pending work.
pub struct AutoCommitScope<'g, G: TransactionGateway + ?Sized> {
    gateway: &'g G,
    previous: bool,
    call_timeout: Duration,
    rollback_failed: bool,
    released: bool,
}

impl<'g, G: TransactionGateway + ?Sized> AutoCommitScope<'g, G> {
    /// Disables auto-commit, opening a database transaction.
    ///
    /// If the call fails after the gateway already reports auto-commit off,
    /// for instance when it timed out once `BEGIN` was sent, the transaction
    /// is rolled back and the flag restored before the error is returned.
    pub async fn acquire(gateway: &'g G, call_timeout: Duration) -> gateway::Result<Self> {
        let previous = gateway.auto_commit();
        let mut scope = Self {
            gateway,
            previous,
            call_timeout,
            rollback_failed: false,
            released: false,
        };

        let result = bounded(
            "set_auto_commit",
            call_timeout,
            gateway.set_auto_commit(false),
        )
        .await;

        if let Err(error) = result {
            if gateway.auto_commit() != previous {
                tracing::warn!(%error, "auto-commit changed by a failed call, undoing");
                if let Err(rollback_error) = scope.rollback().await {
                    tracing::error!(
                        error = %rollback_error,
                        "rollback after failed acquire failed"
                    );
                }
                if let Err(restore_error) = scope.release().await {
                    tracing::error!(error = %restore_error, "failed to restore auto-commit");
                }
            } else {
                scope.released = true;
            }
            return Err(error);
        }

        tracing::debug!(previous, "auto-commit disabled");
        Ok(scope)
    }

    /// Returns the auto-commit flag that `release` restores.
    pub fn previous(&self) -> bool {
        self.previous
    }

    pub async fn commit(&mut self) -> gateway::Result<()> {
        bounded("commit", self.call_timeout, self.gateway.commit()).await
    }

    pub async fn rollback(&mut self) -> gateway::Result<()> {
        let result = bounded("rollback", self.call_timeout, self.gateway.rollback()).await;
        self.rollback_failed = result.is_err();
        result
    }

    /// Restores the remembered auto-commit flag.
    pub async fn release(mut self) -> gateway::Result<()> {
        self.released = true;

        if self.rollback_failed {
            if let Err(error) = self.rollback().await {
                tracing::error!(%error, "rollback retry failed before restoring auto-commit");
            }
        }

        bounded(
            "set_auto_commit",
            self.call_timeout,
            self.gateway.set_auto_commit(self.previous),
        )
        .await?;
        tracing::debug!(restored = self.previous, "auto-commit restored");
        Ok(())
    }
}

impl<G: TransactionGateway + ?Sized> Drop for AutoCommitScope<'_, G> {
    fn drop(&mut self) {
        if !self.released {
            tracing::warn!(
                previous = self.previous,
                "auto-commit scope dropped without release"
            );
        }
    }
}

impl<G: TransactionGateway + ?Sized> std::fmt::Debug for AutoCommitScope<'_, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoCommitScope")
            .field("previous", &self.previous)
            .field("call_timeout", &self.call_timeout)
            .field("rollback_failed", &self.rollback_failed)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}
