//! Push engine: reconcile the local operation log into the remote store
//!
//! ```text
//! Idle -> Confirm -> PullMerge -> Delete -> CreateFoldersThenFiles -> Modify -> SyncConfig -> AdvanceCursor -> Idle
//! ```
//!
//! The run works on the snapshot taken before confirmation. Every entry is
//! cleared the moment its remote call succeeds and the state is saved after
//! every chunk of calls, so a failed or killed push resumes with exactly the
//! unfinished entries.
//!
//! Uploads are stamped with the time of the upload, not the local file's
//! modification time: other replicas find changes by comparing remote
//! modification times against their last sync, and an older local time
//! would hide the upload from them. The local file gets the same stamp so
//! the next pull recognises it as current.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use vaultsync_core::{
    domain::{Operation, OperationKind, VaultPath},
    ports::{IPushConfirmer, NewObject, NodeKind},
};

use crate::batch::{depth_batches, try_run_bounded};
use crate::context::{clear_subtree_ops, forget_subtree_ids, SyncContext};
use crate::engine::SyncReport;
use crate::planner::prune_descendants;
use crate::{pull, reset, Phase, PhaseExt, SyncError, SyncResult};

enum UploadOutcome {
    Uploaded,
    Updated,
}

/// Confirms, pulls, then applies the accepted operations remotely
///
/// Returns `false` when there was nothing to push or the user cancelled.
#[instrument(skip_all)]
pub(crate) async fn push(
    ctx: &SyncContext,
    confirmer: &dyn IPushConfirmer,
    report: &mut SyncReport,
) -> SyncResult<bool> {
    let snapshot = ctx.with_state(|s| s.operations.snapshot()).await;
    if snapshot.is_empty() {
        info!("No changes to push");
        return Ok(false);
    }

    let Some(accepted) = confirmer
        .confirm(&snapshot)
        .await
        .map_err(|e| SyncError::LocalIo(format!("{e:#}")))?
    else {
        info!("Push cancelled");
        report.cancelled = true;
        return Ok(false);
    };

    let discarded = discarded_entries(&snapshot, &accepted);

    let baseline = ctx.with_state(|s| s.last_synced_at).await;
    let outcome = pull::run(ctx, report).await?;

    if !discarded.is_empty() {
        info!(count = discarded.len(), "Reverting discarded operations");
        reset::revert_operations(ctx, &discarded, report).await?;
    }

    // Kinds as they stand after the pull merged remote changes.
    let work: Vec<Operation> = ctx
        .with_state(|s| {
            accepted
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
        work.iter()
            .filter(|op| op.kind == kind)
            .map(|op| op.path.clone())
            .collect()
    };

    ctx.persist().await?;

    push_deletes(ctx, of_kind(OperationKind::Delete), report).await?;
    ctx.persist().await?;
    ctx.progress(0, 33, 1, 1).await;
    push_creates(ctx, of_kind(OperationKind::Create), report).await?;
    ctx.persist().await?;
    push_modifies(ctx, of_kind(OperationKind::Modify), report).await?;
    ctx.persist().await?;
    push_config_files(ctx, baseline, report).await?;

    ctx.with_state(|s| s.advance(outcome.started_at, outcome.next_cursor))
        .await;
    Ok(true)
}

/// Entries of `snapshot` the confirmer left out of `accepted`
fn discarded_entries(snapshot: &[Operation], accepted: &[Operation]) -> Vec<Operation> {
    let accepted_paths: HashSet<&VaultPath> = accepted.iter().map(|op| &op.path).collect();
    snapshot
        .iter()
        .filter(|op| !accepted_paths.contains(&op.path))
        .cloned()
        .collect()
}

/// Deletes remote objects in one batch call
async fn push_deletes(
    ctx: &SyncContext,
    paths: Vec<VaultPath>,
    report: &mut SyncReport,
) -> SyncResult<()> {
    if paths.is_empty() {
        return Ok(());
    }

    let roots = prune_descendants(paths.iter().cloned());
    let (mut ids, unresolved) = ctx
        .with_state(|s| {
            let mut ids = Vec::new();
            let mut unresolved = Vec::new();
            for root in &roots {
                match s.identity_index.id_of(root) {
                    Some(id) => ids.push(id.clone()),
                    None => unresolved.push(root.clone()),
                }
            }
            (ids, unresolved)
        })
        .await;

    if !unresolved.is_empty() {
        let found = ctx
            .call(ctx.remote().find_by_paths(&unresolved))
            .await
            .in_phase(Phase::Deletions)?;
        ids.extend(found.into_iter().map(|o| o.id));
    }

    if !ids.is_empty() {
        ctx.call(ctx.remote().batch_delete(&ids))
            .await
            .in_phase(Phase::Deletions)?;
        info!(count = ids.len(), "Deleted remote objects");
    }

    ctx.with_state(|s| {
        for root in &roots {
            forget_subtree_ids(s, root);
        }
        for path in &paths {
            if s.operations.get(path) == Some(OperationKind::Delete) {
                s.operations.clear(path);
            }
        }
    })
    .await;

    report.deleted_remote += ids.len() as u32;
    Ok(())
}

/// Creates folders parent-first, then uploads files
async fn push_creates(
    ctx: &SyncContext,
    paths: Vec<VaultPath>,
    report: &mut SyncReport,
) -> SyncResult<()> {
    if paths.is_empty() {
        return Ok(());
    }

    let mut folders = Vec::new();
    let mut files = Vec::new();
    for path in paths {
        match ctx.local().kind(&path).await.in_phase(Phase::Folders)? {
            Some(NodeKind::Folder) => folders.push(path),
            Some(NodeKind::File) => files.push(path),
            None => {
                // Created and removed again before this push.
                ctx.with_state(|s| clear_subtree_ops(s, &path)).await;
            }
        }
    }

    let parents = files.iter().filter_map(VaultPath::parent);
    let created = ensure_remote_folders(
        ctx,
        folders.iter().cloned().chain(parents),
        Phase::Folders,
    )
    .await?;
    report.folders_created += created;

    ctx.with_state(|s| {
        for folder in &folders {
            s.operations.clear(folder);
        }
    })
    .await;
    ctx.persist().await?;

    // A run killed after an upload but before saving left the Create behind.
    resolve_ids(ctx, &files, Phase::Files).await?;
    upload_files(ctx, files, (33, 66), Phase::Files, report).await
}

/// Replaces remote content of locally modified files
async fn push_modifies(
    ctx: &SyncContext,
    paths: Vec<VaultPath>,
    report: &mut SyncReport,
) -> SyncResult<()> {
    if paths.is_empty() {
        return Ok(());
    }

    let mut files = Vec::new();
    for path in paths {
        match ctx.local().kind(&path).await.in_phase(Phase::Modifies)? {
            Some(NodeKind::File) => files.push(path),
            _ => {
                ctx.with_state(|s| s.operations.clear(&path)).await;
            }
        }
    }

    resolve_ids(ctx, &files, Phase::Modifies).await?;
    let parents = files.iter().filter_map(VaultPath::parent);
    report.folders_created += ensure_remote_folders(ctx, parents, Phase::Modifies).await?;

    upload_files(ctx, files, (66, 99), Phase::Modifies, report).await
}

/// Uploads configuration files changed since `baseline`
async fn push_config_files(
    ctx: &SyncContext,
    baseline: DateTime<Utc>,
    report: &mut SyncReport,
) -> SyncResult<()> {
    let config = &ctx.settings().config_files;
    let directory = VaultPath::new(config.directory.as_str())?;

    let nodes = ctx
        .local()
        .walk(Some(&directory))
        .await
        .in_phase(Phase::ConfigFiles)?;

    let mut candidates = Vec::new();
    for node in nodes {
        if node.is_folder() || !config.is_synced(&node.path) {
            continue;
        }
        let modified = ctx
            .local()
            .modified_time(&node.path)
            .await
            .in_phase(Phase::ConfigFiles)?;
        if modified > baseline {
            candidates.push((node.path, modified));
        }
    }
    if candidates.is_empty() {
        return Ok(());
    }

    let paths: Vec<VaultPath> = candidates.iter().map(|(path, _)| path.clone()).collect();
    let found = ctx
        .call(ctx.remote().find_by_paths(&paths))
        .await
        .in_phase(Phase::ConfigFiles)?;
    let remote_times: HashMap<VaultPath, DateTime<Utc>> = ctx
        .with_state(|s| {
            found
                .into_iter()
                .filter_map(|object| {
                    let path = object.path()?;
                    s.identity_index.insert(object.id, path.clone());
                    Some((path, object.modified_time))
                })
                .collect()
        })
        .await;

    // A file carrying its remote copy's time was last written by a sync.
    let changed: Vec<VaultPath> = candidates
        .into_iter()
        .filter(|(path, local)| {
            remote_times
                .get(path)
                .map_or(true, |remote| !same_instant(remote, local))
        })
        .map(|(path, _)| path)
        .collect();
    if changed.is_empty() {
        return Ok(());
    }
    info!(count = changed.len(), "Syncing configuration files");

    let parents = changed.iter().filter_map(VaultPath::parent);
    report.folders_created += ensure_remote_folders(ctx, parents, Phase::ConfigFiles).await?;

    upload_files(ctx, changed, (99, 99), Phase::ConfigFiles, report).await
}

/// Modification times as the remote store keeps them, to the millisecond
pub(crate) fn same_instant(a: &DateTime<Utc>, b: &DateTime<Utc>) -> bool {
    a.timestamp_millis() == b.timestamp_millis()
}

/// Looks up remote ids for paths missing from the identity index
async fn resolve_ids(ctx: &SyncContext, paths: &[VaultPath], phase: Phase) -> SyncResult<()> {
    let missing: Vec<VaultPath> = ctx
        .with_state(|s| {
            paths
                .iter()
                .filter(|p| !s.identity_index.contains_path(p))
                .cloned()
                .collect()
        })
        .await;
    if missing.is_empty() {
        return Ok(());
    }

    let found = ctx
        .call(ctx.remote().find_by_paths(&missing))
        .await
        .in_phase(phase)?;
    ctx.with_state(|s| {
        for object in found {
            if let Some(path) = object.path() {
                s.identity_index.insert(object.id, path);
            }
        }
    })
    .await;
    Ok(())
}

/// Makes sure every folder in `wanted`, and every ancestor of one, exists remotely
///
/// Folders already in the identity index are taken as present; the rest are
/// looked up first and only created when the remote store has no object for
/// them. Creation runs one depth batch at a time, parent before child.
/// Returns the number of folders created.
pub(crate) async fn ensure_remote_folders(
    ctx: &SyncContext,
    wanted: impl IntoIterator<Item = VaultPath>,
    phase: Phase,
) -> SyncResult<u32> {
    let mut all = BTreeSet::new();
    for folder in wanted {
        all.extend(folder.ancestors());
        all.insert(folder);
    }
    let all: Vec<VaultPath> = all.into_iter().collect();

    resolve_ids(ctx, &all, phase).await?;
    let missing: Vec<VaultPath> = ctx
        .with_state(|s| {
            all.into_iter()
                .filter(|p| !s.identity_index.contains_path(p))
                .collect()
        })
        .await;

    let mut created = 0;
    for batch in depth_batches(missing) {
        if batch.is_empty() {
            continue;
        }
        let ops = batch.into_iter().map(|path| move || create_folder(ctx, path));
        let outcome = try_run_bounded(ops, ctx.settings().batch_size).await;
        ctx.persist().await?;
        created += outcome.in_phase(phase)?.len() as u32;
    }
    Ok(created)
}

async fn create_folder(ctx: &SyncContext, path: VaultPath) -> anyhow::Result<()> {
    let parent = parent_id(ctx, &path).await?;
    let modified = Utc::now();
    let id = ctx
        .call(
            ctx.remote()
                .create_folder(&NewObject::new(path.clone(), parent, modified)),
        )
        .await?;
    debug!(path = %path, id = %id, "created remote folder");
    ctx.with_state(|s| {
        s.identity_index.insert(id, path.clone());
        s.operations.clear(&path);
    })
    .await;
    Ok(())
}

/// The remote id of `path`'s parent; `None` for top-level paths
async fn parent_id(
    ctx: &SyncContext,
    path: &VaultPath,
) -> anyhow::Result<Option<vaultsync_core::domain::RemoteId>> {
    let Some(parent) = path.parent() else {
        return Ok(None);
    };
    ctx.with_state(|s| s.identity_index.id_of(&parent).cloned())
        .await
        .map(Some)
        .ok_or_else(|| anyhow::anyhow!("Parent folder of {path} has no remote object"))
}

/// Uploads or updates each file through the bounded executor
async fn upload_files(
    ctx: &SyncContext,
    files: Vec<VaultPath>,
    (min, max): (u32, u32),
    phase: Phase,
    report: &mut SyncReport,
) -> SyncResult<()> {
    let total = files.len();
    let completed = AtomicUsize::new(0);
    let limit = ctx.settings().batch_size.max(1);

    for chunk in files.chunks(limit) {
        let ops = chunk.iter().map(|path| {
            let completed = &completed;
            move || async move {
                let outcome = upload_file(ctx, path).await;
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                ctx.progress(min, max, done, total).await;
                outcome
            }
        });

        let outcomes = try_run_bounded(ops, limit).await;
        ctx.persist().await?;
        for outcome in outcomes.in_phase(phase)? {
            match outcome {
                UploadOutcome::Uploaded => report.uploaded += 1,
                UploadOutcome::Updated => report.updated += 1,
            }
        }
    }
    Ok(())
}

async fn upload_file(ctx: &SyncContext, path: &VaultPath) -> anyhow::Result<UploadOutcome> {
    let content = ctx.local().read(path).await?;
    let existing = ctx
        .with_state(|s| s.identity_index.id_of(path).cloned())
        .await;
    let stamped = Utc::now();

    let outcome = match existing {
        Some(id) => {
            ctx.call(ctx.remote().update_file(&id, content, stamped))
                .await?;
            UploadOutcome::Updated
        }
        None => {
            let parent = parent_id(ctx, path).await?;
            let object = NewObject::new(path.clone(), parent, stamped);
            let id = ctx.call(ctx.remote().upload_file(&object, content)).await?;
            ctx.with_state(|s| s.identity_index.insert(id, path.clone()))
                .await;
            UploadOutcome::Uploaded
        }
    };

    ctx.with_state(|s| s.operations.clear(path)).await;
    ctx.stamp_local(path, stamped).await?;
    if matches!(outcome, UploadOutcome::Updated) {
        debug!(path = %path, "updated remote file");
    } else {
        debug!(path = %path, "uploaded new file");
    }
    Ok(outcome)
}
