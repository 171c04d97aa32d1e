//! Patch container: an ordered sequence of operations.

use crate::PatchOp;
use serde::{Deserialize, Serialize};

/// An ordered collection of operations applied as a unit.
///
/// Operations are applied in order. An inverse patch holds the undo
/// operations in reverse order of the forward edits, so that applying it to
/// the post-state restores the pre-state.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    ops: Vec<PatchOp>,
}

impl Patch {
    /// Create an empty patch.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a patch with the given operations.
    #[inline]
    pub fn with_ops(ops: Vec<PatchOp>) -> Self {
        Self { ops }
    }

    /// Add an operation (builder pattern).
    #[inline]
    pub fn with_op(mut self, op: PatchOp) -> Self {
        self.ops.push(op);
        self
    }

    /// Push an operation onto this patch.
    #[inline]
    pub fn push(&mut self, op: PatchOp) {
        self.ops.push(op);
    }

    /// Get the operations in this patch.
    #[inline]
    pub fn ops(&self) -> &[PatchOp] {
        &self.ops
    }

    /// Consume this patch and return the operations.
    #[inline]
    pub fn into_ops(self) -> Vec<PatchOp> {
        self.ops
    }

    /// Check if this patch is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Get the number of operations in this patch.
    #[inline]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Append the operations of another patch.
    #[inline]
    pub fn extend(&mut self, other: Patch) {
        self.ops.extend(other.ops);
    }

    /// Iterate over the operations.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &PatchOp> {
        self.ops.iter()
    }
}

impl FromIterator<PatchOp> for Patch {
    fn from_iter<I: IntoIterator<Item = PatchOp>>(iter: I) -> Self {
        Self {
            ops: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Patch {
    type Item = PatchOp;
    type IntoIter = std::vec::IntoIter<PatchOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

impl<'a> IntoIterator for &'a Patch {
    type Item = &'a PatchOp;
    type IntoIter = std::slice::Iter<'a, PatchOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;
    use serde_json::json;

    #[test]
    fn builder_and_extend() {
        let mut p = Patch::new()
            .with_op(PatchOp::replace(path!("a"), json!(1)))
            .with_op(PatchOp::remove(path!("b")));
        assert_eq!(p.len(), 2);

        p.extend(Patch::new().with_op(PatchOp::add(path!("c"), json!(3))));
        assert_eq!(p.len(), 3);
        assert!(!p.is_empty());
    }

    #[test]
    fn serde_round_trip() {
        let patch = Patch::new()
            .with_op(PatchOp::add(path!("tasks", "t9"), json!({"title": "new"})))
            .with_op(PatchOp::remove(path!("tasks", "t1")));

        let encoded = serde_json::to_string(&patch).unwrap();
        let parsed: Patch = serde_json::from_str(&encoded).unwrap();
        assert_eq!(patch, parsed);
    }
}
