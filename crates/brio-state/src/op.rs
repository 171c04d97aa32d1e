//! Patch operations: the atomic, reversible edits that make up a patch.

use crate::Path;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single structural edit on a JSON tree.
///
/// Each operation targets a specific path. `Add` and `Remove` are inverses
/// of each other; `Replace` is its own inverse with the prior value as
/// payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PatchOp {
    /// Insert a member or array element that did not exist.
    ///
    /// For objects the key is inserted; for arrays the element is inserted
    /// at the index, shifting later elements right. The parent container
    /// must already exist.
    Add {
        /// Target path.
        path: Path,
        /// Value to insert.
        value: Value,
    },

    /// Overwrite an existing value.
    ///
    /// Fails on application if the target does not exist.
    Replace {
        /// Target path.
        path: Path,
        /// Value to write.
        value: Value,
    },

    /// Delete an existing value.
    ///
    /// For arrays the element is removed, shifting later elements left.
    /// Fails on application if the target does not exist.
    Remove {
        /// Target path.
        path: Path,
    },
}

impl PatchOp {
    /// Create an `Add` operation.
    #[inline]
    pub fn add(path: Path, value: impl Into<Value>) -> Self {
        PatchOp::Add {
            path,
            value: value.into(),
        }
    }

    /// Create a `Replace` operation.
    #[inline]
    pub fn replace(path: Path, value: impl Into<Value>) -> Self {
        PatchOp::Replace {
            path,
            value: value.into(),
        }
    }

    /// Create a `Remove` operation.
    #[inline]
    pub fn remove(path: Path) -> Self {
        PatchOp::Remove { path }
    }

    /// Get the path this operation targets.
    #[inline]
    pub fn path(&self) -> &Path {
        match self {
            PatchOp::Add { path, .. } => path,
            PatchOp::Replace { path, .. } => path,
            PatchOp::Remove { path } => path,
        }
    }

    /// Get the operation name.
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            PatchOp::Add { .. } => "add",
            PatchOp::Replace { .. } => "replace",
            PatchOp::Remove { .. } => "remove",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;
    use serde_json::json;

    #[test]
    fn constructors() {
        let add = PatchOp::add(path!("a"), json!(1));
        assert_eq!(add.name(), "add");
        assert_eq!(add.path(), &path!("a"));

        let rep = PatchOp::replace(path!("b"), json!("x"));
        assert_eq!(rep.name(), "replace");

        let rem = PatchOp::remove(path!("c"));
        assert_eq!(rem.name(), "remove");
    }

    #[test]
    fn serde_round_trip() {
        let op = PatchOp::replace(path!("tasks", "t1", "title"), json!("B"));
        let encoded = serde_json::to_string(&op).unwrap();
        let parsed: PatchOp = serde_json::from_str(&encoded).unwrap();
        assert_eq!(op, parsed);
        assert!(encoded.contains("\"op\":\"replace\""));
    }
}
