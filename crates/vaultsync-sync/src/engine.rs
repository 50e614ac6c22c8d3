//! Sync engine facade
//!
//! The [`SyncEngine`] is the entry point front ends call. Each trigger runs
//! exactly one of the pull, push or reset engines against the shared
//! [`SyncContext`].
//!
//! ## Run Flow
//!
//! 1. **Lock**: take the exclusive syncing flag; a second trigger fails
//!    with [`SyncError::AlreadySyncing`] and has no side effects
//! 2. **State**: lock the state document for the whole run and reload it,
//!    so changes saved by other processes are not lost
//! 3. **Connectivity**: probe the remote store before anything is mutated
//! 4. **Cursor**: fetch a change feed start token if none is stored yet
//! 5. **Engine**: run the requested reconciliation, saving the state after
//!    every phase so an interrupted run resumes where it stopped
//! 6. **Bookkeeping**: clear progress, persist the state document and
//!    surface the outcome as a notification
//!
//! A rejected credential is cleared from the state before persisting, so
//! the user is asked for a new one instead of failing on every run.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use vaultsync_core::ports::{IPushConfirmer, Notification, StateLock};

use crate::context::SyncContext;
use crate::{pull, push, reset, Phase, PhaseExt, SyncError, SyncResult};

// ============================================================================
// SyncReport
// ============================================================================

/// Summary of a completed run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Files fetched from the remote store that did not exist locally
    pub downloaded: u32,
    /// Files created in the remote store
    pub uploaded: u32,
    /// Files whose content was replaced, on either side
    pub updated: u32,
    pub deleted_local: u32,
    pub deleted_remote: u32,
    pub folders_created: u32,
    /// Remote files left alone because the local copy was current or pending
    pub skipped: u32,
    /// Pending operations undone by a reset or a discarded push entry
    pub reverted: u32,
    /// The push was cancelled at the confirmation step
    pub cancelled: bool,
    /// Wall-clock duration of the run in milliseconds
    pub duration_ms: u64,
}

impl SyncReport {
    /// Returns true when the run changed nothing on either side
    pub fn is_empty(&self) -> bool {
        self.downloaded == 0
            && self.uploaded == 0
            && self.updated == 0
            && self.deleted_local == 0
            && self.deleted_remote == 0
            && self.folders_created == 0
            && self.reverted == 0
    }
}

// ============================================================================
// SyncEngine
// ============================================================================

#[derive(Clone, Copy)]
enum Run<'a> {
    Pull { quiet: bool },
    Push(&'a dyn IPushConfirmer),
    Reset,
}

impl Run<'_> {
    fn name(&self) -> &'static str {
        match self {
            Run::Pull { .. } => "pull",
            Run::Push(_) => "push",
            Run::Reset => "reset",
        }
    }
}

/// Runs the reconciliation engines one at a time
///
/// Cheap to clone; clones share the same context and syncing flag.
#[derive(Clone)]
pub struct SyncEngine {
    ctx: Arc<SyncContext>,
}

impl SyncEngine {
    pub fn new(ctx: Arc<SyncContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<SyncContext> {
        &self.ctx
    }

    /// Brings remote changes into the local tree
    ///
    /// # Errors
    /// Returns a [`SyncError`] if the run could not start or a phase failed
    #[tracing::instrument(skip(self))]
    pub async fn pull(&self) -> SyncResult<SyncReport> {
        self.run(Run::Pull { quiet: false }).await
    }

    /// Sends the pending operation log to the remote store
    ///
    /// `confirmer` sees the pending operations first and may cancel or
    /// narrow them; entries it leaves out are reverted.
    ///
    /// # Errors
    /// Returns a [`SyncError`] if the run could not start or a phase failed
    #[tracing::instrument(skip(self, confirmer))]
    pub async fn push(&self, confirmer: &dyn IPushConfirmer) -> SyncResult<SyncReport> {
        self.run(Run::Push(confirmer)).await
    }

    /// Discards every pending local operation in favour of the remote copy
    ///
    /// # Errors
    /// Returns a [`SyncError`] if the run could not start or a phase failed
    #[tracing::instrument(skip(self))]
    pub async fn reset(&self) -> SyncResult<SyncReport> {
        self.run(Run::Reset).await
    }

    /// Pulls without success notifications when the remote store is reachable
    ///
    /// Returns `Ok(None)` when offline.
    #[tracing::instrument(skip(self))]
    pub async fn startup_pull(&self) -> SyncResult<Option<SyncReport>> {
        if !self.is_online().await {
            info!("Remote store unreachable, skipping startup pull");
            return Ok(None);
        }
        self.run(Run::Pull { quiet: true }).await.map(Some)
    }

    async fn is_online(&self) -> bool {
        let limit = self.ctx.settings().remote_timeout;
        match tokio::time::timeout(limit, self.ctx.remote().check_connection()).await {
            Ok(online) => online,
            Err(_) => {
                warn!(timeout = ?limit, "Connectivity check timed out");
                false
            }
        }
    }

    async fn run(&self, run: Run<'_>) -> SyncResult<SyncReport> {
        let Some(_guard) = self.ctx.try_begin() else {
            warn!(run = run.name(), "Sync already in progress");
            return Err(SyncError::AlreadySyncing);
        };
        let _state_lock = match self.claim_state().await {
            Ok(lock) => lock,
            Err(err) => {
                error!(run = run.name(), error = %err, "Failed to load sync state");
                self.ctx
                    .notify(Notification::error("VaultSync", err.to_string()))
                    .await;
                return Err(err);
            }
        };

        if matches!(run, Run::Push(_))
            && self.ctx.with_state(|s| s.operations.is_empty()).await
        {
            self.ctx
                .notify(Notification::sync("VaultSync", "No changes to push."))
                .await;
            return Ok(SyncReport::default());
        }

        if !self.is_online().await {
            self.ctx
                .notify(Notification::error(
                    "VaultSync",
                    "No connection to the remote store.",
                ))
                .await;
            return Err(SyncError::Connectivity);
        }

        let start = Instant::now();
        info!(run = run.name(), "Starting sync run");

        let mut report = SyncReport::default();
        let outcome = self.execute(run, &mut report).await;
        report.duration_ms = start.elapsed().as_millis() as u64;

        self.ctx.clear_progress().await;
        let outcome = match outcome {
            Err(err) if err.is_auth_error() => {
                self.ctx.with_state(|s| s.credential = None).await;
                Err(err)
            }
            other => other,
        };
        let persisted = self.ctx.persist().await;

        match outcome {
            Ok(()) => {
                persisted?;
                info!(run = run.name(), report = ?report, "Sync run finished");
                self.notify_success(run, &report).await;
                Ok(report)
            }
            Err(err) => {
                error!(run = run.name(), error = %err, "Sync run failed");
                if let Err(e) = &persisted {
                    error!(error = %e, "Failed to persist state after a failed run");
                }
                let notification = if err.is_auth_error() {
                    Notification::auth(
                        "VaultSync",
                        "The stored credential was rejected. Please sign in again.",
                    )
                } else {
                    Notification::error("VaultSync", err.to_string())
                };
                self.ctx.notify(notification).await;
                Err(err)
            }
        }
    }

    /// Locks the state document and starts from its stored contents
    async fn claim_state(&self) -> SyncResult<StateLock> {
        let lock = self.ctx.lock_state().await?;
        self.ctx.reload().await?;
        Ok(lock)
    }

    async fn execute(&self, run: Run<'_>, report: &mut SyncReport) -> SyncResult<()> {
        self.ensure_cursor().await?;
        match run {
            Run::Pull { .. } => pull::pull(&self.ctx, report).await,
            Run::Push(confirmer) => push::push(&self.ctx, confirmer, report).await.map(|_| ()),
            Run::Reset => reset::reset(&self.ctx, report).await,
        }
    }

    /// Gives the first run a deletion baseline
    async fn ensure_cursor(&self) -> SyncResult<()> {
        if self.ctx.with_state(|s| s.change_cursor.is_some()).await {
            return Ok(());
        }
        let cursor = self
            .ctx
            .call(self.ctx.remote().change_start_cursor())
            .await
            .in_phase(Phase::Cursor)?;
        info!(cursor = %cursor, "Fetched change feed start cursor");
        self.ctx.with_state(|s| s.change_cursor = Some(cursor)).await;
        Ok(())
    }

    async fn notify_success(&self, run: Run<'_>, report: &SyncReport) {
        let body = match run {
            Run::Pull { quiet: true } => return,
            Run::Pull { quiet: false } if report.is_empty() => "You're up to date!",
            Run::Pull { quiet: false } => "Files have been synced from the remote store!",
            Run::Push(_) if report.cancelled => return,
            Run::Push(_) => "Sync complete!",
            Run::Reset => "Reset complete.",
        };
        self.ctx.notify(Notification::sync("VaultSync", body)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_report_default_is_empty() {
        let report = SyncReport::default();
        assert!(report.is_empty());
        assert!(!report.cancelled);
    }

    #[test]
    fn test_sync_report_with_transfers_is_not_empty() {
        let report = SyncReport {
            downloaded: 1,
            ..SyncReport::default()
        };
        assert!(!report.is_empty());
    }

    #[test]
    fn test_skipped_only_counts_as_empty() {
        let report = SyncReport {
            skipped: 4,
            ..SyncReport::default()
        };
        assert!(report.is_empty());
    }
}
