//! Reset engine: discard pending local operations
//!
//! After a pull, every pending operation is undone against the remote's
//! canonical copy: local creates are deleted, local modifications are
//! overwritten and local deletions are restored. The same mechanics revert
//! the entries a user discards when confirming a push.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, info, instrument};

use vaultsync_core::{
    domain::{Operation, OperationKind, RemoteObject, VaultPath},
    ports::{LocalNode, NodeKind},
};

use crate::batch::{depth_batches, try_run_bounded};
use crate::context::{clear_subtree_ops, SyncContext};
use crate::engine::SyncReport;
use crate::planner::{delete_minimum_operations, DeletionPlan};
use crate::pull;
use crate::{Phase, PhaseExt, SyncResult};

/// Pulls, reverts every pending operation and advances the cursor
#[instrument(skip_all)]
pub(crate) async fn reset(ctx: &SyncContext, report: &mut SyncReport) -> SyncResult<()> {
    let outcome = pull::run(ctx, report).await?;

    let pending = ctx.with_state(|s| s.operations.snapshot()).await;
    info!(count = pending.len(), "Reverting pending operations");
    revert_operations(ctx, &pending, report).await?;

    ctx.with_state(|s| s.advance(outcome.started_at, outcome.next_cursor))
        .await;
    Ok(())
}

/// Restores the remote version of each path in `operations`
///
/// Kinds are re-read from the log, since a pull may have changed them;
/// paths whose entry is gone are skipped. Each entry is cleared as soon as
/// its path is restored.
pub(crate) async fn revert_operations(
    ctx: &SyncContext,
    operations: &[Operation],
    report: &mut SyncReport,
) -> SyncResult<()> {
    let current: Vec<Operation> = ctx
        .with_state(|s| {
            operations
                .iter()
                .filter_map(|op| {
                    s.operations
                        .get(&op.path)
                        .map(|kind| Operation::new(op.path.clone(), kind))
                })
                .collect()
        })
        .await;

    let of_kind = |kind: OperationKind| -> Vec<VaultPath> {
        current
            .iter()
            .filter(|op| op.kind == kind)
            .map(|op| op.path.clone())
            .collect()
    };

    revert_creates(ctx, of_kind(OperationKind::Create), report).await?;
    ctx.progress(0, 33, 1, 1).await;
    revert_modifies(ctx, of_kind(OperationKind::Modify), report).await?;
    revert_deletes(ctx, of_kind(OperationKind::Delete), report).await?;
    Ok(())
}

/// Deletes local nodes that never reached the remote store
async fn revert_creates(
    ctx: &SyncContext,
    paths: Vec<VaultPath>,
    report: &mut SyncReport,
) -> SyncResult<()> {
    if paths.is_empty() {
        return Ok(());
    }

    let mut nodes = Vec::new();
    for path in paths {
        match ctx.local().kind(&path).await.in_phase(Phase::Revert)? {
            Some(NodeKind::Folder) => nodes.push(LocalNode::folder(path)),
            Some(NodeKind::File) => nodes.push(LocalNode::file(path)),
            None => {
                ctx.with_state(|s| s.operations.clear(&path)).await;
            }
        }
    }

    let plan = DeletionPlan::new(nodes);
    let deleted = delete_minimum_operations(&plan, ctx.settings().batch_size, |path| async move {
        ctx.delete_local(&path).await?;
        ctx.with_state(|s| clear_subtree_ops(s, &path)).await;
        Ok::<(), anyhow::Error>(())
    })
    .await
    .in_phase(Phase::Revert)?;

    report.deleted_local += deleted.len() as u32;
    report.reverted += deleted.len() as u32;
    Ok(())
}

/// Overwrites locally modified files with the remote content
async fn revert_modifies(
    ctx: &SyncContext,
    paths: Vec<VaultPath>,
    report: &mut SyncReport,
) -> SyncResult<()> {
    if paths.is_empty() {
        return Ok(());
    }

    let mut files = Vec::new();
    for path in paths {
        match ctx.local().kind(&path).await.in_phase(Phase::Revert)? {
            Some(NodeKind::File) => files.push(path),
            _ => {
                ctx.with_state(|s| s.operations.clear(&path)).await;
            }
        }
    }

    let remote = lookup(ctx, &files).await?;
    let total = files.len();
    let completed = AtomicUsize::new(0);

    let ops = files.into_iter().map(|path| {
        let object = remote.get(&path).cloned();
        let completed = &completed;
        move || async move {
            match object {
                Some(object) => restore_file(ctx, &path, &object).await?,
                None => {
                    // Nothing remote to return to.
                    ctx.delete_local(&path).await?;
                    ctx.with_state(|s| s.operations.clear(&path)).await;
                }
            }
            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            ctx.progress(33, 66, done, total).await;
            Ok::<(), anyhow::Error>(())
        }
    });
    let restored = try_run_bounded(ops, ctx.settings().batch_size)
        .await
        .in_phase(Phase::Revert)?;

    report.reverted += restored.len() as u32;
    Ok(())
}

/// Re-creates locally deleted folders and files from the remote copy
async fn revert_deletes(
    ctx: &SyncContext,
    paths: Vec<VaultPath>,
    report: &mut SyncReport,
) -> SyncResult<()> {
    if paths.is_empty() {
        return Ok(());
    }

    // A deleted folder took its children with it; restore the known ones too.
    let mut wanted: BTreeSet<VaultPath> = paths.iter().cloned().collect();
    let known: Vec<VaultPath> = ctx
        .with_state(|s| {
            s.identity_index
                .iter()
                .map(|(_, p)| p)
                .filter(|p| paths.iter().any(|d| p.is_descendant_of(d)))
                .cloned()
                .collect()
        })
        .await;
    for path in known {
        if !ctx.local().exists(&path).await.in_phase(Phase::Revert)? {
            wanted.insert(path);
        }
    }

    let wanted: Vec<VaultPath> = wanted.into_iter().collect();
    let remote = lookup(ctx, &wanted).await?;

    let (folders, files): (Vec<&RemoteObject>, Vec<&RemoteObject>) =
        remote.values().partition(|o| o.is_folder());

    let folder_paths = folders.iter().filter_map(|o| o.path());
    for batch in depth_batches(folder_paths) {
        let count = batch.len() as u32;
        let ops = batch.into_iter().map(|path| {
            move || async move {
                ctx.create_local_folder(&path).await?;
                ctx.with_state(|s| s.operations.clear(&path)).await;
                Ok::<(), anyhow::Error>(())
            }
        });
        try_run_bounded(ops, ctx.settings().batch_size)
            .await
            .in_phase(Phase::Revert)?;
        report.folders_created += count;
    }

    let total = files.len();
    let completed = AtomicUsize::new(0);
    let ops = files.into_iter().filter_map(|object| {
        let path = object.path()?;
        let completed = &completed;
        Some(move || async move {
            restore_file(ctx, &path, object).await?;
            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            ctx.progress(66, 99, done, total).await;
            Ok::<(), anyhow::Error>(())
        })
    });
    let restored = try_run_bounded(ops, ctx.settings().batch_size)
        .await
        .in_phase(Phase::Revert)?;
    report.downloaded += restored.len() as u32;

    // Paths with no remote object have nothing to restore.
    ctx.with_state(|s| {
        for path in &paths {
            if !remote.contains_key(path) {
                s.operations.clear(path);
            }
        }
    })
    .await;

    report.reverted += paths.len() as u32;
    Ok(())
}

/// Resolves the remote objects stored for `paths`, keyed by path
async fn lookup(
    ctx: &SyncContext,
    paths: &[VaultPath],
) -> SyncResult<HashMap<VaultPath, RemoteObject>> {
    if paths.is_empty() {
        return Ok(HashMap::new());
    }
    let found = ctx
        .call(ctx.remote().find_by_paths(paths))
        .await
        .in_phase(Phase::Revert)?;

    let by_path: HashMap<VaultPath, RemoteObject> = found
        .into_iter()
        .filter_map(|o| o.path().map(|p| (p, o)))
        .collect();

    ctx.with_state(|s| {
        for (path, object) in &by_path {
            s.identity_index.insert(object.id.clone(), path.clone());
        }
    })
    .await;
    debug!(requested = paths.len(), found = by_path.len(), "resolved remote objects");
    Ok(by_path)
}

async fn restore_file(
    ctx: &SyncContext,
    path: &VaultPath,
    object: &RemoteObject,
) -> anyhow::Result<()> {
    let content = ctx.call(ctx.remote().download_file(&object.id)).await?;
    ctx.write_local(path, &content, object.modified_time).await?;
    ctx.with_state(|s| s.operations.clear(path)).await;
    Ok(())
}
