//! Coarse entity-path extraction and conflict detection.
//!
//! Patch paths are coarsened to at most two segments before conflict
//! reasoning. Edits inside different fields of the same entity must still
//! collide: under last-writer-wins remote semantics their relative rebase
//! is ambiguous, so the entity is the unit of conflict.

use crate::{Patch, Seg};
use std::collections::BTreeSet;

/// Number of leading path segments that identify an entity.
const ENTITY_DEPTH: usize = 2;

/// Compute the set of coarse entity paths a patch touches.
///
/// Each op contributes the first `min(len, 2)` segments of its path, joined
/// with `.`. A patch op at `tasks.t3.title` contributes `tasks.t3`.
///
/// # Examples
///
/// ```
/// use brio_state::{path, touched_paths, Patch, PatchOp};
/// use serde_json::json;
///
/// let patch = Patch::new()
///     .with_op(PatchOp::replace(path!("tasks", "t3", "title"), json!("x")));
/// assert!(touched_paths(&patch).contains("tasks.t3"));
/// ```
pub fn touched_paths(patch: &Patch) -> BTreeSet<String> {
    let mut touched = BTreeSet::new();
    for op in patch.iter() {
        let mut joined = String::new();
        for seg in op.path().segments().iter().take(ENTITY_DEPTH) {
            if !joined.is_empty() {
                joined.push('.');
            }
            match seg {
                Seg::Key(k) => joined.push_str(k),
                Seg::Index(i) => joined.push_str(&i.to_string()),
            }
        }
        touched.insert(joined);
    }
    touched
}

/// Check whether two touched-path sets conflict.
///
/// Symmetric; reflexive on any nonempty set. Two sets conflict iff any path
/// in one is equal to, a prefix of, or prefixed by any path in the other,
/// with the prefix boundary on `.`.
pub fn paths_conflict(a: &BTreeSet<String>, b: &BTreeSet<String>) -> bool {
    a.iter()
        .any(|pa| b.iter().any(|pb| entity_paths_overlap(pa, pb)))
}

fn entity_paths_overlap(a: &str, b: &str) -> bool {
    // The root path (from a patch at the document root) overlaps everything.
    if a.is_empty() || b.is_empty() {
        return true;
    }
    a == b || is_dot_prefix(a, b) || is_dot_prefix(b, a)
}

fn is_dot_prefix(prefix: &str, path: &str) -> bool {
    path.len() > prefix.len()
        && path.starts_with(prefix)
        && path.as_bytes()[prefix.len()] == b'.'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{path, Patch, PatchOp, Path};
    use serde_json::json;

    fn set_of(paths: &[&str]) -> BTreeSet<String> {
        paths.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn depth_is_capped_at_two() {
        let patch = Patch::new()
            .with_op(PatchOp::replace(path!("tasks", "t3", "title"), json!("x")))
            .with_op(PatchOp::remove(path!("columns")));

        let touched = touched_paths(&patch);
        assert_eq!(touched, set_of(&["tasks.t3", "columns"]));
    }

    #[test]
    fn index_segments_render_as_integers() {
        let patch = Patch::new().with_op(PatchOp::replace(path!("items", 0, "name"), json!("x")));
        assert_eq!(touched_paths(&patch), set_of(&["items.0"]));
    }

    #[test]
    fn root_patch_touches_empty_path() {
        let patch = Patch::new().with_op(PatchOp::replace(Path::root(), json!({})));
        let touched = touched_paths(&patch);
        assert!(touched.contains(""));
        assert!(paths_conflict(&touched, &set_of(&["tasks.t1"])));
    }

    #[test]
    fn conflict_on_equal_paths() {
        let a = set_of(&["tasks.t1"]);
        assert!(paths_conflict(&a, &a));
    }

    #[test]
    fn conflict_on_dot_prefix() {
        let a = set_of(&["tasks"]);
        let b = set_of(&["tasks.t1"]);
        assert!(paths_conflict(&a, &b));
        assert!(paths_conflict(&b, &a));
    }

    #[test]
    fn no_conflict_on_string_prefix_without_boundary() {
        let a = set_of(&["tasks"]);
        let b = set_of(&["tasksette.t1"]);
        assert!(!paths_conflict(&a, &b));
    }

    #[test]
    fn disjoint_entities_do_not_conflict() {
        let a = set_of(&["tasks.t1"]);
        let b = set_of(&["tasks.t2"]);
        assert!(!paths_conflict(&a, &b));
    }
}
