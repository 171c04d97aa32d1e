//! Mutation records and their observer-facing snapshots.

use crate::remote::RemoteAction;
use crate::store::{Store, StoreId};
use brio_state::Patch;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Process-unique, monotonically increasing mutation identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct MutationId(u64);

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

fn next_mutation_id() -> MutationId {
    static NEXT_ID: AtomicU64 = AtomicU64::new(1);
    MutationId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

/// Creation timestamp in epoch milliseconds, monotone within the process.
fn monotonic_now_ms() -> u64 {
    static LAST: AtomicU64 = AtomicU64::new(0);
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    let prev = LAST.fetch_max(now, Ordering::Relaxed);
    prev.max(now)
}

/// Lifecycle status of a mutation.
///
/// `Failed` is an internal pre-rollback marker; history only ever holds the
/// terminal `Success` and `RolledBack` statuses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MutationStatus {
    /// Enqueued, remote call not yet started.
    Pending,
    /// Remote call on the wire.
    InFlight,
    /// Remote call resolved; mutation retired.
    Success,
    /// Remote call terminally rejected; rollback not yet finished.
    Failed,
    /// Undone and retired.
    RolledBack,
}

/// Forward and inverse patch pair for one store.
#[derive(Clone, Debug)]
pub struct StoreDelta {
    /// The patches applied to the store when the mutation was committed.
    pub patches: Patch,
    /// The patches that undo them.
    pub inverse: Patch,
}

/// One committed transaction tracked through the queue lifecycle.
///
/// Immutable once enqueued except for `status` and `retry_count`.
pub(crate) struct Mutation {
    pub(crate) id: MutationId,
    pub(crate) timestamp_ms: u64,
    pub(crate) status: MutationStatus,
    pub(crate) label: Option<String>,
    /// Per-store deltas, ordered by store creation. Non-empty; every entry
    /// has at least one patch.
    pub(crate) deltas: BTreeMap<StoreId, (Store, StoreDelta)>,
    pub(crate) affected: BTreeSet<String>,
    pub(crate) remote: Arc<dyn RemoteAction>,
    pub(crate) retry_count: u32,
    pub(crate) max_retries: u32,
}

impl Mutation {
    pub(crate) fn new(
        label: Option<String>,
        deltas: BTreeMap<StoreId, (Store, StoreDelta)>,
        affected: BTreeSet<String>,
        remote: Arc<dyn RemoteAction>,
        max_retries: u32,
    ) -> Self {
        Self {
            id: next_mutation_id(),
            timestamp_ms: monotonic_now_ms(),
            status: MutationStatus::Pending,
            label,
            deltas,
            affected,
            remote,
            retry_count: 0,
            max_retries,
        }
    }

    /// Fresh read-only projection with the mutation's current status.
    pub(crate) fn snapshot(&self) -> MutationSnapshot {
        self.snapshot_with_status(self.status)
    }

    /// Fresh read-only projection with an explicit status.
    pub(crate) fn snapshot_with_status(&self, status: MutationStatus) -> MutationSnapshot {
        MutationSnapshot {
            id: self.id,
            timestamp_ms: self.timestamp_ms,
            status,
            label: self.label.clone(),
            patch_count: self.deltas.values().map(|(_, d)| d.patches.len()).sum(),
            affected_paths: self.affected.clone(),
            retry_count: self.retry_count,
            max_retries: self.max_retries,
        }
    }
}

/// Read-only projection of a mutation handed to observers.
///
/// Snapshots never share mutable state with the queue; every notification
/// carries freshly built ones.
#[derive(Clone, Debug, Serialize)]
pub struct MutationSnapshot {
    /// Mutation identity.
    pub id: MutationId,
    /// Creation timestamp (epoch milliseconds, monotone in-process).
    pub timestamp_ms: u64,
    /// Status at snapshot time.
    pub status: MutationStatus,
    /// Human-readable action label.
    pub label: Option<String>,
    /// Total forward patch ops across all touched stores.
    pub patch_count: usize,
    /// Coarse entity paths this mutation touches.
    pub affected_paths: BTreeSet<String>,
    /// Redispatches consumed so far.
    pub retry_count: u32,
    /// Redispatch budget.
    pub max_retries: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::FnRemote;
    use brio_state::{path, PatchOp};
    use serde_json::json;

    fn sample_mutation() -> Mutation {
        let store = Store::new(json!({"tasks": {"t1": {"title": "A"}}}));
        let delta = StoreDelta {
            patches: Patch::new().with_op(PatchOp::replace(path!("tasks", "t1", "title"), json!("B"))),
            inverse: Patch::new().with_op(PatchOp::replace(path!("tasks", "t1", "title"), json!("A"))),
        };
        let mut deltas = BTreeMap::new();
        deltas.insert(store.id(), (store, delta));
        Mutation::new(
            Some("rename".into()),
            deltas,
            ["tasks.t1".to_string()].into_iter().collect(),
            Arc::new(FnRemote::new(|| async { Ok(()) })),
            0,
        )
    }

    #[test]
    fn ids_and_timestamps_are_monotone() {
        let a = sample_mutation();
        let b = sample_mutation();
        assert!(b.id > a.id);
        assert!(b.timestamp_ms >= a.timestamp_ms);
    }

    #[test]
    fn snapshot_projects_fields() {
        let m = sample_mutation();
        let snap = m.snapshot();
        assert_eq!(snap.id, m.id);
        assert_eq!(snap.status, MutationStatus::Pending);
        assert_eq!(snap.label.as_deref(), Some("rename"));
        assert_eq!(snap.patch_count, 1);
        assert!(snap.affected_paths.contains("tasks.t1"));
        assert_eq!(snap.retry_count, 0);
    }

    #[test]
    fn status_serializes_in_kebab_case() {
        let encoded = serde_json::to_string(&MutationStatus::RolledBack).unwrap();
        assert_eq!(encoded, "\"rolled-back\"");
        let encoded = serde_json::to_string(&MutationStatus::InFlight).unwrap();
        assert_eq!(encoded, "\"in-flight\"");
    }
}
