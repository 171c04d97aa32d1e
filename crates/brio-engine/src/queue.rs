//! The mutation queue: the timeline of live mutations, concurrent remote
//! dispatch, and the rollback / full-rebase path.
//!
//! Every state transition runs to completion under one lock hold; only the
//! remote futures suspend, outside the lock. Observers are invoked during
//! the transition and must not call back into the engine.

use crate::error::{MutationError, RemoteError};
use crate::mutation::{Mutation, MutationId, MutationSnapshot, MutationStatus, StoreDelta};
use crate::store::{Store, StoreId};
use brio_state::{apply_patch, PatchError};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, Weak};

/// Maximum number of retired snapshots kept in history.
const HISTORY_CAP: usize = 20;

type QueueObserver = Arc<dyn Fn(&[MutationSnapshot]) + Send + Sync>;
type SuccessObserver = Arc<dyn Fn(&MutationSnapshot) + Send + Sync>;
type ErrorObserver = Arc<dyn Fn(&MutationSnapshot, &MutationError) + Send + Sync>;

/// Observer callbacks wired in from the engine options.
#[derive(Clone, Default)]
pub(crate) struct QueueCallbacks {
    pub(crate) on_queue_change: Option<QueueObserver>,
    pub(crate) on_mutation_success: Option<SuccessObserver>,
    pub(crate) on_mutation_error: Option<ErrorObserver>,
}

#[derive(Default)]
struct QueueInner {
    /// Live mutations in enqueue order.
    live: Vec<Mutation>,
    /// Retired snapshots, newest first, capped at [`HISTORY_CAP`].
    history: VecDeque<MutationSnapshot>,
    /// Ids with a remote call currently on the wire.
    in_flight: HashSet<MutationId>,
}

/// Owns the timeline of pending and in-flight mutations.
///
/// Obtained through [`Engine::queue`](crate::Engine::queue). Dispatch and
/// settlement run on the surrounding tokio runtime.
pub struct MutationQueue {
    inner: Mutex<QueueInner>,
    callbacks: QueueCallbacks,
    self_ref: Weak<MutationQueue>,
}

impl MutationQueue {
    pub(crate) fn new(callbacks: QueueCallbacks) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            inner: Mutex::new(QueueInner::default()),
            callbacks,
            self_ref: weak.clone(),
        })
    }

    /// True while any mutation is live (pending or in flight).
    pub fn has_pending(&self) -> bool {
        !self.inner.lock().unwrap().live.is_empty()
    }

    /// The current observable list: live snapshots in enqueue order, then
    /// retired history newest-first. Same shape as an `on_queue_change`
    /// notification.
    pub fn snapshots(&self) -> Vec<MutationSnapshot> {
        Self::snapshot_list(&self.inner.lock().unwrap())
    }

    /// Drop every live mutation and all history.
    ///
    /// Remote calls already on the wire keep running; their eventual
    /// resolution is ignored because their mutation is no longer live.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.live.clear();
        inner.history.clear();
        inner.in_flight.clear();
        self.notify(&inner);
    }

    /// Append a freshly committed mutation and start anything dispatchable.
    pub(crate) fn enqueue(&self, mutation: Mutation) {
        let mut inner = self.inner.lock().unwrap();
        tracing::debug!(id = %mutation.id, label = ?mutation.label, "mutation enqueued");
        inner.live.push(mutation);
        self.notify(&inner);
        self.dispatch_pending(&mut inner);
    }

    /// Start every pending live mutation that is not already on the wire.
    ///
    /// Mutations execute concurrently; there is no path-conflict
    /// serialization at dispatch time. Enqueue order, not completion order,
    /// is the guarantee the queue preserves.
    fn dispatch_pending(&self, inner: &mut QueueInner) {
        let Some(queue) = self.self_ref.upgrade() else {
            return;
        };
        for idx in 0..inner.live.len() {
            let (id, remote) = {
                let mutation = &inner.live[idx];
                if mutation.status != MutationStatus::Pending
                    || inner.in_flight.contains(&mutation.id)
                {
                    continue;
                }
                (mutation.id, mutation.remote.clone())
            };

            inner.live[idx].status = MutationStatus::InFlight;
            inner.in_flight.insert(id);
            tracing::debug!(id = %id, "dispatching remote action");
            self.notify(inner);

            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                let result = remote.run().await;
                queue.settle(id, result);
            });
        }
    }

    /// Handle a remote call resolving.
    ///
    /// A resolution for a mutation that is no longer live (cleared, or
    /// swept by a rollback cascade) is dropped.
    fn settle(&self, id: MutationId, result: Result<(), RemoteError>) {
        let mut inner = self.inner.lock().unwrap();
        let Some(idx) = inner.live.iter().position(|m| m.id == id) else {
            inner.in_flight.remove(&id);
            tracing::debug!(id = %id, "ignoring late remote resolution");
            return;
        };

        match result {
            Ok(()) => {
                inner.in_flight.remove(&id);
                let mut mutation = inner.live.remove(idx);
                mutation.status = MutationStatus::Success;
                let snapshot = mutation.snapshot();
                tracing::debug!(id = %id, "mutation succeeded");
                Self::push_history(&mut inner, snapshot.clone());
                if let Some(on_success) = &self.callbacks.on_mutation_success {
                    on_success(&snapshot);
                }
                self.notify(&inner);
                self.dispatch_pending(&mut inner);
            }
            Err(error) => {
                if inner.live[idx].retry_count < inner.live[idx].max_retries {
                    inner.in_flight.remove(&id);
                    let mutation = &mut inner.live[idx];
                    mutation.retry_count += 1;
                    mutation.status = MutationStatus::Pending;
                    tracing::debug!(
                        id = %id,
                        retry = mutation.retry_count,
                        error = %error,
                        "remote action failed; retrying"
                    );
                    self.notify(&inner);
                    self.dispatch_pending(&mut inner);
                } else {
                    inner.live[idx].status = MutationStatus::Failed;
                    self.roll_back(&mut inner, id, error);
                    self.notify(&inner);
                    self.dispatch_pending(&mut inner);
                }
            }
        }
    }

    /// Undo a terminally failed mutation and rebase every survivor on the
    /// restored state.
    ///
    /// Per store: undo survivors newest-first, undo the failed mutation,
    /// then redo survivors oldest-first reusing their original forward
    /// patches. A survivor whose forward patches no longer apply is itself
    /// rolled back and swept. Runs as one uninterrupted turn; new
    /// dispatches are only considered after the live set is repaired.
    fn roll_back(&self, inner: &mut QueueInner, failed_id: MutationId, error: RemoteError) {
        tracing::warn!(id = %failed_id, error = %error, "remote action failed; rolling back");

        // Deltas are immutable once enqueued; working from clones keeps the
        // live list free for status updates.
        let survivors: Vec<(MutationId, BTreeMap<StoreId, (Store, StoreDelta)>)> = inner
            .live
            .iter()
            .rev()
            .filter(|m| m.id != failed_id && m.status != MutationStatus::Failed)
            .map(|m| (m.id, m.deltas.clone()))
            .collect();
        let failed_deltas = inner
            .live
            .iter()
            .find(|m| m.id == failed_id)
            .map(|m| m.deltas.clone())
            .unwrap_or_default();

        // Union of touched stores, in store-creation order.
        let mut stores: BTreeMap<StoreId, Store> = BTreeMap::new();
        for (store_id, (store, _)) in &failed_deltas {
            stores.insert(*store_id, store.clone());
        }
        for (_, deltas) in &survivors {
            for (store_id, (store, _)) in deltas {
                stores.entry(*store_id).or_insert_with(|| store.clone());
            }
        }

        let mut swept: Vec<MutationId> = Vec::new();

        for (store_id, store) in &stores {
            let mut value = store.read();

            // Undo later mutations first to keep patch paths valid.
            for (_, deltas) in &survivors {
                if let Some((_, delta)) = deltas.get(store_id) {
                    value = apply_patch(&value, &delta.inverse).expect(
                        "inverse patches of a live mutation apply to the store reflecting it",
                    );
                }
            }
            if let Some((_, delta)) = failed_deltas.get(store_id) {
                value = apply_patch(&value, &delta.inverse).expect(
                    "inverse patches of a live mutation apply to the store reflecting it",
                );
            }

            // Redo survivors oldest-first, reusing their original forward
            // patches; drift surfaces as a patch error and retires the
            // survivor as a dependent rollback.
            for (survivor_id, deltas) in survivors.iter().rev() {
                if swept.contains(survivor_id) {
                    continue;
                }
                let Some((_, delta)) = deltas.get(store_id) else {
                    continue;
                };
                match apply_patch(&value, &delta.patches) {
                    Ok(next) => value = next,
                    Err(patch_error) => {
                        swept.push(*survivor_id);
                        self.retire_dependent(inner, *survivor_id, failed_id, patch_error);
                    }
                }
            }

            store.write(value);
        }

        inner.live.retain(|m| !swept.contains(&m.id));
        inner.in_flight.remove(&failed_id);
        if let Some(idx) = inner.live.iter().position(|m| m.id == failed_id) {
            let mut mutation = inner.live.remove(idx);
            mutation.status = MutationStatus::RolledBack;
            let snapshot = mutation.snapshot();
            Self::push_history(inner, snapshot.clone());
            if let Some(on_error) = &self.callbacks.on_mutation_error {
                on_error(&snapshot, &MutationError::Remote(error));
            }
        }
    }

    /// Retire a survivor whose forward patches failed to re-apply.
    fn retire_dependent(
        &self,
        inner: &mut QueueInner,
        id: MutationId,
        failed_id: MutationId,
        source: PatchError,
    ) {
        let Some(mutation) = inner.live.iter_mut().find(|m| m.id == id) else {
            return;
        };
        mutation.status = MutationStatus::Failed;
        let snapshot = mutation.snapshot_with_status(MutationStatus::RolledBack);
        inner.in_flight.remove(&id);
        tracing::warn!(id = %id, failed = %failed_id, "dependent mutation rolled back during rebase");
        Self::push_history(inner, snapshot.clone());
        if let Some(on_error) = &self.callbacks.on_mutation_error {
            on_error(&snapshot, &MutationError::DependentRollback { failed_id, source });
        }
    }

    fn notify(&self, inner: &QueueInner) {
        if let Some(on_change) = &self.callbacks.on_queue_change {
            on_change(&Self::snapshot_list(inner));
        }
    }

    fn snapshot_list(inner: &QueueInner) -> Vec<MutationSnapshot> {
        inner
            .live
            .iter()
            .map(|m| m.snapshot())
            .chain(inner.history.iter().cloned())
            .collect()
    }

    fn push_history(inner: &mut QueueInner, snapshot: MutationSnapshot) {
        inner.history.push_front(snapshot);
        inner.history.truncate(HISTORY_CAP);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::FnRemote;
    use brio_state::{path, Patch, PatchOp};
    use serde_json::json;
    use std::collections::BTreeSet;

    fn stub_mutation(label: &str) -> Mutation {
        let store = Store::new(json!({"n": 0}));
        let delta = StoreDelta {
            patches: Patch::new().with_op(PatchOp::replace(path!("n"), json!(1))),
            inverse: Patch::new().with_op(PatchOp::replace(path!("n"), json!(0))),
        };
        let mut deltas = BTreeMap::new();
        deltas.insert(store.id(), (store, delta));
        Mutation::new(
            Some(label.to_string()),
            deltas,
            BTreeSet::from(["n".to_string()]),
            Arc::new(FnRemote::new(|| async { Ok(()) })),
            0,
        )
    }

    #[test]
    fn history_is_bounded() {
        let mut inner = QueueInner::default();
        for i in 0..30 {
            let snapshot = stub_mutation(&format!("m{i}")).snapshot();
            MutationQueue::push_history(&mut inner, snapshot);
        }
        assert_eq!(inner.history.len(), HISTORY_CAP);
        // Newest first.
        assert_eq!(inner.history[0].label.as_deref(), Some("m29"));
    }

    #[test]
    fn snapshot_list_orders_live_then_history() {
        let mut inner = QueueInner::default();
        inner.live.push(stub_mutation("live-1"));
        inner.live.push(stub_mutation("live-2"));
        MutationQueue::push_history(&mut inner, stub_mutation("old").snapshot());
        MutationQueue::push_history(&mut inner, stub_mutation("recent").snapshot());

        let list = MutationQueue::snapshot_list(&inner);
        let labels: Vec<_> = list.iter().filter_map(|s| s.label.as_deref()).collect();
        assert_eq!(labels, ["live-1", "live-2", "recent", "old"]);
    }
}
