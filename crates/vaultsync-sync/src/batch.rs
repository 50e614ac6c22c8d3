//! Depth batching and bounded concurrent execution
//!
//! Hierarchical creates must run parent before child, so paths are grouped
//! by segment count and the groups are processed in ascending order. Calls
//! inside a group are independent and go through [`run_bounded`], which
//! never has more than `limit` of them in flight.

use std::future::Future;

use futures_util::future::join_all;
use vaultsync_core::domain::VaultPath;

/// Default ceiling for concurrent remote calls
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Groups `items` by depth, one group per depth from 1 to the maximum
///
/// Group `k - 1` holds exactly the items of depth `k`. Depths with no items
/// yield an empty group so the index always matches the depth. Items keep
/// their input order within a group.
pub fn depth_batches_by<T, F>(items: impl IntoIterator<Item = T>, depth_of: F) -> Vec<Vec<T>>
where
    F: Fn(&T) -> usize,
{
    let mut batches: Vec<Vec<T>> = Vec::new();
    for item in items {
        let depth = depth_of(&item).max(1);
        if batches.len() < depth {
            batches.resize_with(depth, Vec::new);
        }
        batches[depth - 1].push(item);
    }
    batches
}

/// Groups vault paths by depth
pub fn depth_batches(paths: impl IntoIterator<Item = VaultPath>) -> Vec<Vec<VaultPath>> {
    depth_batches_by(paths, VaultPath::depth)
}

/// Runs `operations` in chunks of `limit`, waiting for each chunk to settle
///
/// Results come back in input order. Every operation runs, whatever the
/// outcome of the others.
pub async fn run_bounded<I, F, Fut, T>(operations: I, limit: usize) -> Vec<T>
where
    I: IntoIterator<Item = F>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let limit = limit.max(1);
    let mut pending = operations.into_iter().peekable();
    let mut results = Vec::new();

    while pending.peek().is_some() {
        let chunk: Vec<Fut> = pending.by_ref().take(limit).map(|op| op()).collect();
        results.extend(join_all(chunk).await);
    }
    results
}

/// Like [`run_bounded`], but stops after the first chunk containing a failure
///
/// Operations in the failing chunk all settle before the first error (in
/// input order) is returned; later chunks never start.
pub async fn try_run_bounded<I, F, Fut, T, E>(operations: I, limit: usize) -> Result<Vec<T>, E>
where
    I: IntoIterator<Item = F>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let limit = limit.max(1);
    let mut pending = operations.into_iter().peekable();
    let mut results = Vec::new();

    while pending.peek().is_some() {
        let chunk: Vec<Fut> = pending.by_ref().take(limit).map(|op| op()).collect();
        for outcome in join_all(chunk).await {
            results.push(outcome?);
        }
    }
    Ok(results)
}

/// Progress text for `completed` of `total` steps mapped into `min..max` percent
pub fn progress_message(min: u32, max: u32, completed: usize, total: usize) -> String {
    format!("Syncing ({}%)", progress_percent(min, max, completed, total))
}

pub(crate) fn progress_percent(min: u32, max: u32, completed: usize, total: usize) -> u32 {
    if total == 0 {
        return max;
    }
    let span = u64::from(max.saturating_sub(min));
    let done = completed.min(total) as u64;
    min + (span * done / total as u64) as u32
}
