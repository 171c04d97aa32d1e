//! Store adapter: a named handle over one mutable state tree.
//!
//! The queue keys per-store deltas by identity, so every `Store` carries a
//! process-unique id minted at creation. Clones share the id and the cell.

use brio_state::{produce, Draft, Patch, PatchResult, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Backing container for a store's value.
///
/// The default is [`MemoryCell`]; reactive containers can be wrapped by
/// implementing this trait. Whether a cell notifies its own subscribers on
/// `store` is the adapter's concern.
pub trait StoreCell: Send + Sync {
    /// Read the current value.
    fn load(&self) -> Value;

    /// Overwrite the whole value.
    fn store(&self, value: Value);
}

/// In-process cell backed by a mutex.
pub struct MemoryCell(Mutex<Value>);

impl MemoryCell {
    /// Create a cell with the given initial value.
    pub fn new(initial: Value) -> Self {
        Self(Mutex::new(initial))
    }
}

impl StoreCell for MemoryCell {
    fn load(&self) -> Value {
        self.0.lock().unwrap().clone()
    }

    fn store(&self, value: Value) {
        *self.0.lock().unwrap() = value;
    }
}

/// Process-unique store identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreId(u64);

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store-{}", self.0)
    }
}

/// A cloneable handle over one mutable state tree.
///
/// Two handles compare equal iff they were cloned from the same `Store`.
/// A store must be driven by a single engine; two engines sharing a store
/// would rebase each other's deltas.
#[derive(Clone)]
pub struct Store {
    id: StoreId,
    cell: Arc<dyn StoreCell>,
}

impl Store {
    /// Create a store over an in-process [`MemoryCell`].
    pub fn new(initial: Value) -> Self {
        Self::from_cell(Arc::new(MemoryCell::new(initial)))
    }

    /// Create a store over a caller-provided cell.
    pub fn from_cell(cell: Arc<dyn StoreCell>) -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self {
            id: StoreId(NEXT_ID.fetch_add(1, Ordering::Relaxed)),
            cell,
        }
    }

    /// This store's identity.
    #[inline]
    pub fn id(&self) -> StoreId {
        self.id
    }

    /// Read the current value.
    pub fn read(&self) -> Value {
        self.cell.load()
    }

    /// Overwrite the whole value.
    pub fn write(&self, value: Value) {
        self.cell.store(value);
    }

    /// Run a recipe against the current value and capture
    /// `(next_value, patches, inverse_patches)`. Does not write back.
    pub fn produce<F>(&self, recipe: F) -> PatchResult<(Value, Patch, Patch)>
    where
        F: FnOnce(&mut Draft) -> PatchResult<()>,
    {
        produce(&self.read(), recipe)
    }
}

impl PartialEq for Store {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Store {}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store").field("id", &self.id).finish()
    }
}
