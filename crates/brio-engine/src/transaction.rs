//! Transaction builder: staged writes plus one remote side-effect,
//! committed as a single mutation.

use crate::error::{RemoteError, TransactionError};
use crate::mutation::{Mutation, StoreDelta};
use crate::queue::MutationQueue;
use crate::remote::{FnRemote, RemoteAction};
use crate::store::Store;
use brio_state::{apply_patch, produce, touched_paths, Draft, Patch, PatchResult, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;

/// Per-store working state accumulated across stages.
struct StoreStage {
    store: Store,
    /// Latest produced value; the base for the next recipe on this store.
    working: Value,
    /// Effective forward ops not yet written through to the store.
    pending: Patch,
    /// All effective forward ops, in stage order.
    forward: Patch,
    /// Per-stage inverse patches, in stage order.
    inverses: Vec<Patch>,
}

/// Builder that collects staged edits and a remote action, then commits
/// them as one mutation.
///
/// Created by [`Engine::transaction`](crate::Engine::transaction). Staged
/// writes are applied to their stores immediately unless deferred with
/// [`stage_in`](Transaction::stage_in); deferred stages flush at commit.
pub struct Transaction {
    queue: Arc<MutationQueue>,
    label: String,
    default_store: Option<Store>,
    max_retries: u32,
    stages: Vec<StoreStage>,
    remote: Option<Arc<dyn RemoteAction>>,
    closed: bool,
}

impl Transaction {
    pub(crate) fn new(
        queue: Arc<MutationQueue>,
        label: String,
        default_store: Option<Store>,
        max_retries: u32,
    ) -> Self {
        Self {
            queue,
            label,
            default_store,
            max_retries,
            stages: Vec::new(),
            remote: None,
            closed: false,
        }
    }

    /// Apply a recipe to the transaction's default store and write the
    /// result through.
    ///
    /// Fails with [`TransactionError::NoDefaultStore`] when the transaction
    /// was created without one.
    pub fn set<F>(&mut self, recipe: F) -> Result<(), TransactionError>
    where
        F: FnOnce(&mut Draft) -> PatchResult<()>,
    {
        let store = self
            .default_store
            .clone()
            .ok_or(TransactionError::NoDefaultStore)?;
        self.apply_stage(store, recipe, true)
    }

    /// Apply a recipe to the given store and write the result through.
    pub fn set_in<F>(&mut self, store: &Store, recipe: F) -> Result<(), TransactionError>
    where
        F: FnOnce(&mut Draft) -> PatchResult<()>,
    {
        self.apply_stage(store.clone(), recipe, true)
    }

    /// Apply a recipe to the given store without writing through yet.
    ///
    /// The staged value becomes the base for the next recipe on the same
    /// store, so several recipes can be composed before any observer sees
    /// an intermediate state. All deferred stages flush at commit.
    pub fn stage_in<F>(&mut self, store: &Store, recipe: F) -> Result<(), TransactionError>
    where
        F: FnOnce(&mut Draft) -> PatchResult<()>,
    {
        self.apply_stage(store.clone(), recipe, false)
    }

    fn apply_stage<F>(
        &mut self,
        store: Store,
        recipe: F,
        flush: bool,
    ) -> Result<(), TransactionError>
    where
        F: FnOnce(&mut Draft) -> PatchResult<()>,
    {
        if self.closed {
            return Err(TransactionError::Closed);
        }

        let idx = match self.stages.iter().position(|s| s.store.id() == store.id()) {
            Some(idx) => idx,
            None => {
                let working = store.read();
                self.stages.push(StoreStage {
                    store,
                    working,
                    pending: Patch::new(),
                    forward: Patch::new(),
                    inverses: Vec::new(),
                });
                self.stages.len() - 1
            }
        };

        let stage = &mut self.stages[idx];
        let (next, forward, inverse) = produce(&stage.working, recipe)?;
        if forward.is_empty() {
            // Ineffective recipe: nothing recorded.
            return Ok(());
        }

        stage.working = next;
        stage.pending.extend(forward.clone());
        stage.forward.extend(forward);
        stage.inverses.push(inverse);

        if flush {
            flush_stage(stage)?;
        }
        Ok(())
    }

    /// Bind the remote side-effect from an async closure.
    ///
    /// Retries re-invoke the closure; it must be safe to call more than
    /// once when a retry budget is configured.
    pub fn remote<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), RemoteError>> + Send + 'static,
    {
        self.remote = Some(Arc::new(FnRemote::new(f)));
        self
    }

    /// Bind the remote side-effect from a trait object.
    pub fn remote_action(&mut self, action: Arc<dyn RemoteAction>) -> &mut Self {
        self.remote = Some(action);
        self
    }

    /// Finalize the transaction.
    ///
    /// Flushes deferred stages via patch application against the store's
    /// current value, merges per-store patch sequences in stage order,
    /// builds the mutation and hands it to the queue. The transaction is
    /// closed afterwards; a second commit is a logged no-op.
    pub fn commit(&mut self) -> Result<(), TransactionError> {
        if self.closed {
            tracing::warn!(label = %self.label, "commit called on a closed transaction; ignoring");
            return Ok(());
        }
        if self.stages.iter().all(|s| s.forward.is_empty()) {
            return Err(TransactionError::Empty);
        }
        let remote = self.remote.clone().ok_or(TransactionError::NoRemote)?;

        for stage in &mut self.stages {
            flush_stage(stage)?;
        }
        self.closed = true;

        let mut deltas = BTreeMap::new();
        let mut affected = BTreeSet::new();
        for stage in self.stages.drain(..) {
            if stage.forward.is_empty() {
                continue;
            }
            affected.extend(touched_paths(&stage.forward));
            let mut inverse = Patch::new();
            for stage_inverse in stage.inverses.into_iter().rev() {
                inverse.extend(stage_inverse);
            }
            deltas.insert(
                stage.store.id(),
                (
                    stage.store,
                    StoreDelta {
                        patches: stage.forward,
                        inverse,
                    },
                ),
            );
        }

        self.queue.enqueue(Mutation::new(
            Some(self.label.clone()),
            deltas,
            affected,
            remote,
            self.max_retries,
        ));
        Ok(())
    }
}

/// Write a stage's pending patches through to its store.
///
/// Applies the pending patches to the store's current value rather than
/// writing the working value wholesale, preserving unrelated writes that
/// happened since the stage was opened.
fn flush_stage(stage: &mut StoreStage) -> Result<(), TransactionError> {
    if stage.pending.is_empty() {
        return Ok(());
    }
    let pending = std::mem::take(&mut stage.pending);
    let current = stage.store.read();
    stage.store.write(apply_patch(&current, &pending)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Engine, EngineOptions};
    use brio_state::path;
    use serde_json::json;

    fn engine() -> Engine {
        Engine::new(EngineOptions::new())
    }

    #[test]
    fn set_without_default_store_fails() {
        let engine = engine();
        let mut tx = engine.transaction("no-default");
        let err = tx.set(|d| d.set(path!("x"), json!(1))).unwrap_err();
        assert!(matches!(err, TransactionError::NoDefaultStore));
    }

    #[test]
    fn commit_without_writes_fails() {
        let engine = engine();
        let mut tx = engine.transaction("empty");
        tx.remote(|| async { Ok(()) });
        assert!(matches!(tx.commit(), Err(TransactionError::Empty)));
    }

    #[test]
    fn all_empty_recipes_still_fail_commit() {
        let engine = engine();
        let store = Store::new(json!({"x": 1}));
        let mut tx = engine.transaction_on("noop", &store);
        // Writes back the value already present: dropped.
        tx.set(|d| d.set(path!("x"), json!(1))).unwrap();
        tx.remote(|| async { Ok(()) });
        assert!(matches!(tx.commit(), Err(TransactionError::Empty)));
        assert_eq!(store.read(), json!({"x": 1}));
    }

    #[test]
    fn commit_without_remote_fails() {
        let engine = engine();
        let store = Store::new(json!({"x": 1}));
        let mut tx = engine.transaction_on("no-remote", &store);
        tx.set(|d| d.set(path!("x"), json!(2))).unwrap();
        assert!(matches!(tx.commit(), Err(TransactionError::NoRemote)));
    }

    #[tokio::test]
    async fn set_after_commit_fails_and_recommit_is_noop() {
        let engine = engine();
        let store = Store::new(json!({"x": 1}));
        let mut tx = engine.transaction_on("closed", &store);
        tx.set(|d| d.set(path!("x"), json!(2))).unwrap();
        tx.remote(|| async { Ok(()) });
        tx.commit().unwrap();

        let err = tx.set(|d| d.set(path!("x"), json!(3))).unwrap_err();
        assert!(matches!(err, TransactionError::Closed));
        assert!(tx.commit().is_ok());
    }

    #[test]
    fn set_writes_through_immediately() {
        let engine = engine();
        let store = Store::new(json!({"x": 1}));
        let mut tx = engine.transaction_on("write-through", &store);
        tx.set(|d| d.set(path!("x"), json!(2))).unwrap();
        assert_eq!(store.read()["x"], 2);
    }

    #[test]
    fn deferred_stages_compose_without_visible_intermediates() {
        let engine = engine();
        let store = Store::new(json!({"x": 1, "y": 1}));
        let mut tx = engine.transaction("deferred");

        tx.stage_in(&store, |d| d.set(path!("x"), json!(2))).unwrap();
        // Second recipe sees the staged value as its base.
        tx.stage_in(&store, |d| {
            let x = d.get(&path!("x")).and_then(|v| v.as_i64()).unwrap_or(0);
            d.set(path!("y"), json!(x * 10))
        })
        .unwrap();

        // Nothing written through yet.
        assert_eq!(store.read(), json!({"x": 1, "y": 1}));
    }
}
