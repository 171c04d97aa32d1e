//! Error types for the mutation engine.

use crate::mutation::MutationId;
use brio_state::PatchError;
use thiserror::Error;

/// Opaque error value a remote action rejected with.
///
/// The engine never inspects it; it is forwarded unaltered through
/// [`MutationError::Remote`] to the error callback.
pub type RemoteError = Box<dyn std::error::Error + Send + Sync>;

/// Transaction misuse, raised synchronously from transaction methods.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// A staged write was attempted after `commit`.
    #[error("transaction is already committed")]
    Closed,

    /// `set` was called on a transaction with no default store bound.
    #[error("transaction has no default store bound")]
    NoDefaultStore,

    /// `commit` was called with no effective staged writes.
    #[error("transaction has no staged writes")]
    Empty,

    /// `commit` was called without a remote action bound.
    #[error("transaction has no remote action bound")]
    NoRemote,

    /// A recipe or a deferred-stage flush hit a structural mismatch.
    #[error(transparent)]
    Patch(#[from] PatchError),
}

/// Why a mutation was rolled back. Delivered only through the
/// `on_mutation_error` callback, never raised to callers.
#[derive(Debug, Error)]
pub enum MutationError {
    /// The remote action rejected; the value is passed through unaltered.
    #[error("{0}")]
    Remote(RemoteError),

    /// The mutation survived someone else's failure but its forward patches
    /// no longer applied during the rebase.
    #[error("dependent mutation rolled back: rebase failed after mutation {failed_id} was undone")]
    DependentRollback {
        /// The mutation whose failure triggered the rollback.
        failed_id: MutationId,
        /// The structural mismatch hit while re-applying forward patches.
        #[source]
        source: PatchError,
    },

    /// A structural mismatch outside a rebase.
    #[error(transparent)]
    Patch(#[from] PatchError),
}
