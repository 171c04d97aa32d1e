//! Engine facade: options, callbacks, transaction factories.

use crate::error::MutationError;
use crate::mutation::MutationSnapshot;
use crate::queue::{MutationQueue, QueueCallbacks};
use crate::store::Store;
use crate::transaction::Transaction;
use std::sync::Arc;

/// Engine configuration.
///
/// # Examples
///
/// ```
/// use brio_engine::{Engine, EngineOptions};
///
/// let engine = Engine::new(
///     EngineOptions::new()
///         .max_retries(2)
///         .on_queue_change(|snapshots| {
///             let _ = snapshots.len();
///         }),
/// );
/// assert!(!engine.queue().has_pending());
/// ```
#[derive(Default)]
pub struct EngineOptions {
    max_retries: u32,
    callbacks: QueueCallbacks,
}

impl EngineOptions {
    /// Create options with defaults: no retries, no callbacks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Redispatch budget per mutation (default 0).
    ///
    /// Retries re-invoke the same remote action without backoff; combining
    /// a nonzero budget with a non-idempotent remote is the caller's risk.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Observer for every queue state change. Receives the live snapshots
    /// in enqueue order followed by retired history newest-first.
    pub fn on_queue_change(
        mut self,
        f: impl Fn(&[MutationSnapshot]) + Send + Sync + 'static,
    ) -> Self {
        self.callbacks.on_queue_change = Some(Arc::new(f));
        self
    }

    /// Callback invoked once per mutation that retires as `Success`.
    pub fn on_mutation_success(
        mut self,
        f: impl Fn(&MutationSnapshot) + Send + Sync + 'static,
    ) -> Self {
        self.callbacks.on_mutation_success = Some(Arc::new(f));
        self
    }

    /// Callback invoked once per mutation that retires as `RolledBack`,
    /// with the remote rejection or the dependent-rollback reason.
    pub fn on_mutation_error(
        mut self,
        f: impl Fn(&MutationSnapshot, &MutationError) + Send + Sync + 'static,
    ) -> Self {
        self.callbacks.on_mutation_error = Some(Arc::new(f));
        self
    }
}

/// The optimistic mutation engine.
///
/// Opens transactions, owns the mutation queue, and drives remote dispatch
/// on the surrounding tokio runtime. Stores are created independently and
/// bound per transaction; a store must not be shared between engines.
pub struct Engine {
    queue: Arc<MutationQueue>,
    max_retries: u32,
}

impl Engine {
    /// Create an engine with the given options.
    pub fn new(options: EngineOptions) -> Self {
        Self {
            queue: MutationQueue::new(options.callbacks),
            max_retries: options.max_retries,
        }
    }

    /// Open a transaction with no default store; writes go through
    /// [`Transaction::set_in`] / [`Transaction::stage_in`].
    pub fn transaction(&self, label: impl Into<String>) -> Transaction {
        Transaction::new(self.queue.clone(), label.into(), None, self.max_retries)
    }

    /// Open a transaction with a bound default store for
    /// [`Transaction::set`].
    pub fn transaction_on(&self, label: impl Into<String>, store: &Store) -> Transaction {
        Transaction::new(
            self.queue.clone(),
            label.into(),
            Some(store.clone()),
            self.max_retries,
        )
    }

    /// The mutation queue.
    pub fn queue(&self) -> &MutationQueue {
        &self.queue
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineOptions::new())
    }
}
