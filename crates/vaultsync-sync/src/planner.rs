//! Minimum-operations deletion planner
//!
//! Deleting a folder removes everything below it, both locally and in the
//! remote store. The planner walks the deletion set from the shallowest
//! depth down, targets each folder it meets and drops that folder's
//! descendants from the working set, so exactly one delete is issued per
//! independent subtree root.

use std::collections::BTreeSet;
use std::future::Future;

use tracing::debug;
use vaultsync_core::{domain::VaultPath, ports::LocalNode};

use crate::batch::try_run_bounded;

/// The delete calls needed for a set of nodes, in execution order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionPlan {
    /// Folders to delete, one round per depth that still had folders
    pub folder_rounds: Vec<Vec<VaultPath>>,
    /// Files not covered by any targeted folder
    pub files: Vec<VaultPath>,
}

impl DeletionPlan {
    pub fn new(nodes: impl IntoIterator<Item = LocalNode>) -> Self {
        let mut folders = BTreeSet::new();
        let mut files = BTreeSet::new();
        for node in nodes {
            if node.is_folder() {
                folders.insert(node.path);
            } else {
                files.insert(node.path);
            }
        }
        // A path listed as both keeps its folder role.
        files.retain(|p| !folders.contains(p));

        let max_depth = folders.iter().map(VaultPath::depth).max().unwrap_or(0);
        let mut folder_rounds = Vec::new();

        for depth in 1..=max_depth {
            let round: Vec<VaultPath> = folders
                .iter()
                .filter(|p| p.depth() == depth)
                .cloned()
                .collect();
            if round.is_empty() {
                continue;
            }
            let covered = |p: &VaultPath| round.iter().any(|r| p == r || p.is_descendant_of(r));
            folders.retain(|p| !covered(p));
            files.retain(|p| !covered(p));
            folder_rounds.push(round);
        }

        Self {
            folder_rounds,
            files: files.into_iter().collect(),
        }
    }

    /// Number of delete calls the plan issues
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.folder_rounds.iter().map(Vec::len).sum::<usize>() + self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.call_count() == 0
    }

    /// Every targeted path, folders first
    pub fn targets(&self) -> impl Iterator<Item = &VaultPath> {
        self.folder_rounds.iter().flatten().chain(self.files.iter())
    }
}

/// Executes `plan`, running each folder round and then the files concurrently
///
/// Returns the targeted paths. Stops at the first failing round; targets of
/// earlier rounds stay deleted.
pub async fn delete_minimum_operations<F, Fut>(
    plan: &DeletionPlan,
    limit: usize,
    deleter: F,
) -> anyhow::Result<Vec<VaultPath>>
where
    F: Fn(VaultPath) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let mut deleted = Vec::with_capacity(plan.call_count());

    for round in plan.folder_rounds.iter().chain(std::iter::once(&plan.files)) {
        if round.is_empty() {
            continue;
        }
        debug!(count = round.len(), "deleting round");
        let ops = round.iter().map(|path| {
            let path = path.clone();
            let deleter = &deleter;
            move || deleter(path)
        });
        try_run_bounded(ops, limit).await?;
        deleted.extend(round.iter().cloned());
    }

    Ok(deleted)
}

/// Drops every path that has an ancestor in the same set
pub fn prune_descendants(paths: impl IntoIterator<Item = VaultPath>) -> Vec<VaultPath> {
    let set: BTreeSet<VaultPath> = paths.into_iter().collect();
    set.iter()
        .filter(|p| !p.ancestors().iter().any(|a| set.contains(a)))
        .cloned()
        .collect()
}
