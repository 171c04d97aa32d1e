//! Reversible JSON patch model for optimistic state engines.
//!
//! `brio-state` models state changes as structural patches over
//! `serde_json::Value` trees and can derive a forward patch together with
//! its inverse from a recipe, so every change can later be undone and
//! replayed.
//!
//! # Core Concepts
//!
//! - **Path / Seg**: location of an edit in a JSON tree
//! - **PatchOp / Patch**: a structural edit (`add` / `replace` / `remove`)
//!   and an ordered sequence of them
//! - **produce**: run a recipe against a [`Draft`] and capture
//!   `(next_value, patches, inverse_patches)`
//! - **apply_patch**: pure application of a patch to a value
//! - **touched_paths / paths_conflict**: coarse entity-level conflict
//!   reasoning over patch paths
//!
//! # Reversibility
//!
//! ```text
//! next = apply_patch(base, patches)
//! base = apply_patch(next, inverse_patches)
//! ```
//!
//! # Quick Start
//!
//! ```
//! use brio_state::{apply_patch, path, produce};
//! use serde_json::json;
//!
//! let base = json!({"tasks": {"t1": {"title": "A", "status": "todo"}}});
//!
//! let (next, patches, inverse) =
//!     produce(&base, |d| d.set(path!("tasks", "t1", "title"), json!("B"))).unwrap();
//!
//! assert_eq!(next["tasks"]["t1"]["title"], "B");
//! assert_eq!(apply_patch(&next, &inverse).unwrap(), base);
//! assert_eq!(base["tasks"]["t1"]["title"], "A"); // base untouched
//! ```

mod apply;
mod draft;
mod error;
mod op;
mod patch;
mod path;
mod touched;

pub use apply::{apply_patch, apply_patches, get_at_path};
pub use draft::{produce, Draft};
pub use error::{value_type_name, PatchError, PatchResult};
pub use op::PatchOp;
pub use patch::Patch;
pub use path::{Path, Seg};
pub use touched::{paths_conflict, touched_paths};

// Re-export serde_json::Value for convenience
pub use serde_json::Value;
