//! Recipe-based patch capture.
//!
//! [`produce`] runs a recipe against a [`Draft`]: a working copy of the
//! base value that records every effective edit as a forward operation plus
//! its inverse. Edits that write back the value already present record
//! nothing, so an ineffective recipe yields empty patch sequences.

use crate::{
    apply::{apply_op, get_at_path},
    error::{value_type_name, PatchError, PatchResult},
    Patch, PatchOp, Path, Seg,
};
use serde_json::Value;

/// Derive `(next_value, patches, inverse_patches)` from a base value and a
/// recipe.
///
/// The base value is never mutated. The returned inverse patch, applied to
/// the next value, restores the base.
///
/// # Examples
///
/// ```
/// use brio_state::{apply_patch, path, produce};
/// use serde_json::json;
///
/// let base = json!({"tasks": {"t1": {"title": "A"}}});
/// let (next, patches, inverse) =
///     produce(&base, |d| d.set(path!("tasks", "t1", "title"), json!("B"))).unwrap();
///
/// assert_eq!(next["tasks"]["t1"]["title"], "B");
/// assert_eq!(patches.len(), 1);
/// assert_eq!(apply_patch(&next, &inverse).unwrap(), base);
/// ```
pub fn produce<F>(base: &Value, recipe: F) -> PatchResult<(Value, Patch, Patch)>
where
    F: FnOnce(&mut Draft) -> PatchResult<()>,
{
    let mut draft = Draft::new(base.clone());
    recipe(&mut draft)?;
    Ok(draft.finish())
}

/// Where a write at a path would land in the working value.
enum Slot<'a> {
    /// The target exists.
    Occupied(&'a Value),
    /// The target is absent but the parent can accept an insertion.
    Vacant,
}

/// Mutable working copy of a value that records forward and inverse
/// operations for every effective edit.
///
/// Recipes receive `&mut Draft`. Writes are visible to subsequent reads
/// within the same recipe.
#[derive(Debug)]
pub struct Draft {
    value: Value,
    forward: Vec<PatchOp>,
    inverse: Vec<PatchOp>,
}

impl Draft {
    fn new(value: Value) -> Self {
        Self {
            value,
            forward: Vec::new(),
            inverse: Vec::new(),
        }
    }

    /// Read the current working value at a path.
    pub fn get(&self, path: &Path) -> Option<&Value> {
        get_at_path(&self.value, path)
    }

    /// Write a value at a path.
    ///
    /// Records a `Replace` when the target exists, an `Add` when it is
    /// absent (object member, or array tail at `index == len`). Writing the
    /// value already present records nothing. Intermediate containers are
    /// not created implicitly.
    pub fn set(&mut self, path: Path, value: impl Into<Value>) -> PatchResult<()> {
        let value = value.into();
        let prior = match self.slot(&path)? {
            Slot::Occupied(current) if *current == value => return Ok(()),
            Slot::Occupied(current) => Some(current.clone()),
            Slot::Vacant => None,
        };
        match prior {
            Some(prior) => self.record(
                PatchOp::replace(path.clone(), value),
                PatchOp::replace(path, prior),
            ),
            None => self.record(
                PatchOp::add(path.clone(), value),
                PatchOp::remove(path),
            ),
        }
    }

    /// Delete the value at a path.
    ///
    /// Removing an absent value is a no-op. Removing the root replaces the
    /// document with `null`.
    pub fn remove(&mut self, path: Path) -> PatchResult<()> {
        if path.is_empty() {
            return self.set(path, Value::Null);
        }
        let prior = match self.slot(&path) {
            Ok(Slot::Occupied(current)) => current.clone(),
            _ => return Ok(()),
        };
        self.record(
            PatchOp::remove(path.clone()),
            PatchOp::add(path, prior),
        )
    }

    /// Insert a value into an array, shifting later elements right.
    ///
    /// The path must end in an index no greater than the array's length.
    pub fn insert(&mut self, path: Path, value: impl Into<Value>) -> PatchResult<()> {
        let Some((parent_segs, Seg::Index(idx))) = path.split_last() else {
            return Err(PatchError::type_mismatch(path.clone(), "array", "object"));
        };
        let parent = get_at_path(&self.value, &Path::from_segments(parent_segs.to_vec()))
            .ok_or_else(|| PatchError::path_not_found(path.clone()))?;
        let arr = parent
            .as_array()
            .ok_or_else(|| PatchError::type_mismatch(path.clone(), "array", value_type_name(parent)))?;
        if *idx > arr.len() {
            return Err(PatchError::index_out_of_bounds(path.clone(), *idx, arr.len()));
        }
        self.record(
            PatchOp::add(path.clone(), value.into()),
            PatchOp::remove(path),
        )
    }

    /// Append a value to the array at a path.
    pub fn push(&mut self, path: Path, value: impl Into<Value>) -> PatchResult<()> {
        let target = get_at_path(&self.value, &path)
            .ok_or_else(|| PatchError::path_not_found(path.clone()))?;
        let len = target
            .as_array()
            .ok_or_else(|| PatchError::type_mismatch(path.clone(), "array", value_type_name(target)))?
            .len();
        self.insert(path.index(len), value)
    }

    /// Apply a recorded op to the working value and remember its inverse.
    fn record(&mut self, forward: PatchOp, inverse: PatchOp) -> PatchResult<()> {
        apply_op(&mut self.value, &forward)?;
        self.forward.push(forward);
        self.inverse.push(inverse);
        Ok(())
    }

    /// Classify what a write at `path` would hit in the working value.
    fn slot(&self, path: &Path) -> PatchResult<Slot<'_>> {
        let Some((parent_segs, last)) = path.split_last() else {
            return Ok(Slot::Occupied(&self.value));
        };

        let mut parent = &self.value;
        for seg in parent_segs {
            parent = match (parent, seg) {
                (Value::Object(obj), Seg::Key(key)) => obj
                    .get(key)
                    .ok_or_else(|| PatchError::path_not_found(path.clone()))?,
                (Value::Array(arr), Seg::Index(idx)) => arr.get(*idx).ok_or_else(|| {
                    PatchError::index_out_of_bounds(path.clone(), *idx, arr.len())
                })?,
                (other, Seg::Key(_)) => {
                    return Err(PatchError::type_mismatch(
                        path.clone(),
                        "object",
                        value_type_name(other),
                    ));
                }
                (other, Seg::Index(_)) => {
                    return Err(PatchError::type_mismatch(
                        path.clone(),
                        "array",
                        value_type_name(other),
                    ));
                }
            };
        }

        match (parent, last) {
            (Value::Object(obj), Seg::Key(key)) => Ok(obj
                .get(key)
                .map(Slot::Occupied)
                .unwrap_or(Slot::Vacant)),
            (Value::Array(arr), Seg::Index(idx)) => {
                if *idx < arr.len() {
                    Ok(Slot::Occupied(&arr[*idx]))
                } else if *idx == arr.len() {
                    Ok(Slot::Vacant)
                } else {
                    Err(PatchError::index_out_of_bounds(path.clone(), *idx, arr.len()))
                }
            }
            (other, Seg::Key(_)) => Err(PatchError::type_mismatch(
                path.clone(),
                "object",
                value_type_name(other),
            )),
            (other, Seg::Index(_)) => Err(PatchError::type_mismatch(
                path.clone(),
                "array",
                value_type_name(other),
            )),
        }
    }

    /// Finish the draft: `(next_value, forward_patch, inverse_patch)`.
    ///
    /// Inverse ops are emitted in reverse edit order so that applying the
    /// inverse patch to the next value restores the base.
    fn finish(self) -> (Value, Patch, Patch) {
        let inverse = self.inverse.into_iter().rev().collect();
        (self.value, Patch::with_ops(self.forward), inverse)
    }
}
