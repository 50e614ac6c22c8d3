//! Pull engine: reconcile remote-side changes into the local tree
//!
//! ```text
//! Idle -> FetchRemoteDeltas -> ApplyDeletions -> ApplyUpsertsAndFolders -> AdvanceCursor -> Idle
//! ```
//!
//! Additions and modifications come from a modified-time query; removals
//! come from the change feed. A pending local Create or Modify on a path
//! beats the incoming remote change. The state is saved after each phase.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use vaultsync_core::{
    domain::{ChangeCursor, OperationKind, RemoteId, RemoteObject, SyncState, VaultPath},
    ports::{ChangeFeed, LocalNode, NodeKind, ObjectQuery},
};

use crate::batch::{depth_batches, try_run_bounded};
use crate::context::{clear_subtree_ops, forget_subtree_ids, SyncContext};
use crate::engine::SyncReport;
use crate::planner::{delete_minimum_operations, DeletionPlan};
use crate::{Phase, PhaseExt, SyncResult};

/// What a pull hands back to the run that started it
#[derive(Debug, Clone)]
pub(crate) struct PullOutcome {
    /// Instant the remote query was issued; becomes the next `lastSyncedAt`
    pub started_at: DateTime<Utc>,
    pub next_cursor: Option<ChangeCursor>,
}

enum FileOutcome {
    Downloaded,
    Updated,
    Skipped,
}

/// Runs a standalone pull and advances the cursor
pub(crate) async fn pull(ctx: &SyncContext, report: &mut SyncReport) -> SyncResult<()> {
    let outcome = run(ctx, report).await?;
    ctx.with_state(|s| s.advance(outcome.started_at, outcome.next_cursor))
        .await;
    Ok(())
}

/// Applies every remote change since the last completed run
///
/// Does not advance `lastSyncedAt` or the cursor; the caller does once its
/// own work has finished.
#[instrument(skip_all)]
pub(crate) async fn run(ctx: &SyncContext, report: &mut SyncReport) -> SyncResult<PullOutcome> {
    let (since, cursor) = ctx
        .with_state(|s| (s.last_synced_at, s.change_cursor.clone()))
        .await;
    let started_at = Utc::now();

    let modified = ctx
        .call(ctx.remote().search(&ObjectQuery::modified_after(since)))
        .await
        .in_phase(Phase::FetchRemote)?;
    let feed = match &cursor {
        Some(cursor) => ctx
            .call(ctx.remote().changes_since(cursor))
            .await
            .in_phase(Phase::FetchRemote)?,
        None => ChangeFeed::default(),
    };
    info!(
        since = %since,
        modified = modified.len(),
        removed = feed.removed().count(),
        "Fetched remote changes"
    );

    let removed = ctx
        .with_state(|s| {
            let removed: BTreeSet<VaultPath> = feed
                .removed()
                .filter_map(|id| s.identity_index.remove_id(id))
                .collect();
            for object in &modified {
                match object.path() {
                    Some(path) => s.identity_index.insert(object.id.clone(), path),
                    None => debug!(id = %object.id, "object without a path property"),
                }
            }
            removed
        })
        .await;

    apply_deletions(ctx, removed, report).await?;
    ctx.persist().await?;
    ctx.progress(0, 33, 1, 1).await;

    apply_folders(ctx, &modified, report).await?;
    ctx.persist().await?;
    apply_files(ctx, &modified, report).await?;
    ctx.persist().await?;

    Ok(PullOutcome {
        started_at,
        next_cursor: feed.next_cursor,
    })
}

/// Decides what a remotely removed path means locally
///
/// Returns the node to delete, or `None` when the path is kept.
fn classify_removal(
    state: &mut SyncState,
    path: VaultPath,
    local: Option<NodeKind>,
) -> Option<LocalNode> {
    if state.identity_index.contains_path(&path) {
        // Another remote object claims the path now.
        return None;
    }
    let op = state.operations.get(&path);

    match local {
        None => {
            if op == Some(OperationKind::Delete) {
                state.operations.clear(&path);
            }
            None
        }
        Some(NodeKind::File) => match op {
            Some(OperationKind::Modify) => {
                state.operations.set(path, OperationKind::Create);
                None
            }
            Some(OperationKind::Create) => None,
            _ => Some(LocalNode::file(path)),
        },
        Some(NodeKind::Folder) => {
            let pending: Vec<(VaultPath, OperationKind)> = state
                .operations
                .iter()
                .filter(|(p, k)| {
                    p.is_descendant_of(&path)
                        && matches!(k, OperationKind::Create | OperationKind::Modify)
                })
                .map(|(p, k)| (p.clone(), *k))
                .collect();

            if pending.is_empty() && op != Some(OperationKind::Create) {
                return Some(LocalNode::folder(path));
            }
            for (descendant, kind) in pending {
                if kind == OperationKind::Modify {
                    state.operations.set(descendant, OperationKind::Create);
                }
            }
            state.operations.set(path, OperationKind::Create);
            None
        }
    }
}

async fn apply_deletions(
    ctx: &SyncContext,
    removed: BTreeSet<VaultPath>,
    report: &mut SyncReport,
) -> SyncResult<()> {
    if removed.is_empty() {
        return Ok(());
    }

    let mut candidates = Vec::new();
    for path in removed {
        let local = ctx.local().kind(&path).await.in_phase(Phase::Deletions)?;
        let node = ctx
            .with_state(|s| classify_removal(s, path, local))
            .await;
        candidates.extend(node);
    }

    let plan = DeletionPlan::new(candidates);
    if plan.is_empty() {
        return Ok(());
    }
    info!(calls = plan.call_count(), "Deleting remotely removed paths");

    let deleted = delete_minimum_operations(&plan, ctx.settings().batch_size, |path| async move {
        ctx.delete_local(&path).await?;
        ctx.with_state(|s| {
            clear_subtree_ops(s, &path);
            forget_subtree_ids(s, &path);
        })
        .await;
        Ok::<(), anyhow::Error>(())
    })
    .await
    .in_phase(Phase::Deletions)?;

    report.deleted_local += deleted.len() as u32;
    Ok(())
}

async fn apply_folders(
    ctx: &SyncContext,
    modified: &[RemoteObject],
    report: &mut SyncReport,
) -> SyncResult<()> {
    let folders = modified
        .iter()
        .filter(|o| o.is_folder())
        .filter_map(RemoteObject::path);

    for batch in depth_batches(folders) {
        let ops = batch
            .into_iter()
            .map(|path| move || pull_folder(ctx, path));
        let created: Vec<bool> = try_run_bounded(ops, ctx.settings().batch_size)
            .await
            .in_phase(Phase::Folders)?;
        report.folders_created += created.into_iter().filter(|c| *c).count() as u32;
    }
    Ok(())
}

/// Creates a remotely known folder locally; returns whether it was missing
async fn pull_folder(ctx: &SyncContext, path: VaultPath) -> anyhow::Result<bool> {
    ctx.with_state(|s| s.operations.clear(&path)).await;
    match ctx.local().kind(&path).await? {
        Some(NodeKind::Folder) => Ok(false),
        Some(NodeKind::File) => {
            warn!(path = %path, "remote folder collides with a local file");
            Ok(false)
        }
        None => {
            ctx.create_local_folder(&path).await?;
            Ok(true)
        }
    }
}

async fn apply_files(
    ctx: &SyncContext,
    modified: &[RemoteObject],
    report: &mut SyncReport,
) -> SyncResult<()> {
    let files: Vec<(RemoteId, VaultPath, DateTime<Utc>)> = modified
        .iter()
        .filter(|o| !o.is_folder())
        .filter_map(|o| o.path().map(|p| (o.id.clone(), p, o.modified_time)))
        .collect();
    let total = files.len();
    let completed = AtomicUsize::new(0);

    let ops = files.into_iter().map(|(id, path, modified_time)| {
        let completed = &completed;
        move || async move {
            let outcome = pull_file(ctx, &id, &path, modified_time).await;
            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            ctx.progress(33, 100, done, total).await;
            outcome
        }
    });

    for outcome in try_run_bounded(ops, ctx.settings().batch_size)
        .await
        .in_phase(Phase::Files)?
    {
        match outcome {
            FileOutcome::Downloaded => report.downloaded += 1,
            FileOutcome::Updated => report.updated += 1,
            FileOutcome::Skipped => report.skipped += 1,
        }
    }
    Ok(())
}

async fn pull_file(
    ctx: &SyncContext,
    id: &RemoteId,
    path: &VaultPath,
    modified_time: DateTime<Utc>,
) -> anyhow::Result<FileOutcome> {
    let local = ctx.local().kind(path).await?;
    let op = ctx.with_state(|s| s.operations.get(path)).await;

    match (local, op) {
        (Some(NodeKind::Folder), _) => {
            warn!(path = %path, "remote file collides with a local folder");
            return Ok(FileOutcome::Skipped);
        }
        (Some(_), Some(OperationKind::Modify)) => return Ok(FileOutcome::Skipped),
        (Some(_), Some(OperationKind::Create)) => {
            // The object exists remotely now, so the next push updates it.
            ctx.with_state(|s| s.operations.set(path.clone(), OperationKind::Modify))
                .await;
            return Ok(FileOutcome::Skipped);
        }
        (Some(_), None) => {
            let local_time = ctx.local().modified_time(path).await?;
            if local_time.timestamp_millis() == modified_time.timestamp_millis() {
                return Ok(FileOutcome::Skipped);
            }
        }
        _ => {}
    }

    let content = ctx.call(ctx.remote().download_file(id)).await?;
    ctx.write_local(path, &content, modified_time).await?;
    ctx.with_state(|s| s.operations.clear(path)).await;
    debug!(path = %path, bytes = content.len(), "pulled file");

    Ok(if local.is_some() {
        FileOutcome::Updated
    } else {
        FileOutcome::Downloaded
    })
}
