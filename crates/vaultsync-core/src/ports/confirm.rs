//! Push confirmation port
//!
//! Before a push applies anything, the pending operations are handed to an
//! [`IPushConfirmer`]. Whatever it leaves out of the returned subset is
//! discarded: the local tree is reverted to the remote version of that path.

use crate::domain::Operation;

/// Decides which pending operations a push may apply
#[async_trait::async_trait]
pub trait IPushConfirmer: Send + Sync {
    /// Returns the accepted subset of `operations`, or `None` to cancel
    ///
    /// Cancelling leaves the log and the local tree untouched.
    async fn confirm(&self, operations: &[Operation]) -> anyhow::Result<Option<Vec<Operation>>>;
}

/// Confirmer that accepts every operation
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

#[async_trait::async_trait]
impl IPushConfirmer for AcceptAll {
    async fn confirm(&self, operations: &[Operation]) -> anyhow::Result<Option<Vec<Operation>>> {
        Ok(Some(operations.to_vec()))
    }
}
