//! Optimistic mutation engine over reversible JSON patches.
//!
//! `brio-engine` sits between an in-memory state model and an unreliable
//! remote service. Transactions apply local changes instantly, the bound
//! remote actions dispatch concurrently in the background, and when one
//! terminally fails the engine undoes that change and rebases every
//! still-pending change on top of the restored state, so the visible model
//! stays a consistent linearization of surviving mutations.
//!
//! # Core Concepts
//!
//! - **Store**: identity-keyed handle over one mutable state tree
//! - **Transaction**: staged recipes across one or more stores plus one
//!   remote action, committed as a single mutation
//! - **MutationQueue**: timeline of live mutations, concurrent dispatch,
//!   retry, and the rollback / full-rebase path
//! - **MutationSnapshot**: read-only projection streamed to observers
//!
//! # Quick Start
//!
//! ```
//! use brio_engine::{path, Engine, EngineOptions, Store};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let engine = Engine::new(EngineOptions::new());
//! let tasks = Store::new(json!({"tasks": {"t1": {"title": "A"}}}));
//!
//! let mut tx = engine.transaction_on("rename", &tasks);
//! tx.set(|d| d.set(path!("tasks", "t1", "title"), json!("B"))).unwrap();
//! tx.remote(|| async { Ok(()) });
//! tx.commit().unwrap();
//!
//! // The local edit is already visible while the remote call races.
//! assert_eq!(tasks.read()["tasks"]["t1"]["title"], "B");
//! # }
//! ```
//!
//! Dispatch runs on the surrounding tokio runtime; commit must happen
//! inside one.

mod engine;
mod error;
mod mutation;
mod queue;
mod remote;
mod store;
mod transaction;

pub use engine::{Engine, EngineOptions};
pub use error::{MutationError, RemoteError, TransactionError};
pub use mutation::{MutationId, MutationSnapshot, MutationStatus, StoreDelta};
pub use queue::MutationQueue;
pub use remote::RemoteAction;
pub use store::{MemoryCell, Store, StoreCell, StoreId};
pub use transaction::Transaction;

// Re-export the patch model the engine is built on.
pub use brio_state::{
    apply_patch, apply_patches, paths_conflict, produce, touched_paths, Draft, Patch, PatchError,
    PatchOp, PatchResult, Path, Seg, Value,
};
pub use brio_state::path;
