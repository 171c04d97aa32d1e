//! Pure patch application.
//!
//! `apply_patch` never mutates its input; it returns a new document or a
//! [`PatchError`] when an operation targets a path that no longer exists or
//! whose shape differs from what the operation expects. Strictness is the
//! point: a rebase relies on these errors to detect dependent edits.

use crate::{
    error::{value_type_name, PatchError, PatchResult},
    Patch, PatchOp, Path, Seg,
};
use serde_json::Value;

/// Apply a patch to a document (pure function).
///
/// # Examples
///
/// ```
/// use brio_state::{apply_patch, path, Patch, PatchOp};
/// use serde_json::json;
///
/// let doc = json!({"count": 0});
/// let patch = Patch::new().with_op(PatchOp::replace(path!("count"), json!(10)));
///
/// let next = apply_patch(&doc, &patch).unwrap();
/// assert_eq!(next["count"], 10);
/// assert_eq!(doc["count"], 0); // original untouched
/// ```
pub fn apply_patch(doc: &Value, patch: &Patch) -> PatchResult<Value> {
    let mut result = doc.clone();
    for op in patch.ops() {
        apply_op(&mut result, op)?;
    }
    Ok(result)
}

/// Apply multiple patches in sequence (pure function).
///
/// Stops at the first failing patch and returns its error.
pub fn apply_patches<'a>(
    doc: &Value,
    patches: impl IntoIterator<Item = &'a Patch>,
) -> PatchResult<Value> {
    patches
        .into_iter()
        .try_fold(doc.clone(), |acc, patch| apply_patch(&acc, patch))
}

/// Apply a single operation in place.
pub(crate) fn apply_op(doc: &mut Value, op: &PatchOp) -> PatchResult<()> {
    match op {
        PatchOp::Add { path, value } => apply_add(doc, path, value.clone()),
        PatchOp::Replace { path, value } => apply_replace(doc, path, value.clone()),
        PatchOp::Remove { path } => apply_remove(doc, path),
    }
}

fn apply_add(doc: &mut Value, path: &Path, value: Value) -> PatchResult<()> {
    let Some((parent_segs, last)) = path.split_last() else {
        *doc = value;
        return Ok(());
    };

    let parent = resolve_mut(doc, parent_segs, path)?;
    match (parent, last) {
        (Value::Object(obj), Seg::Key(key)) => {
            obj.insert(key.clone(), value);
            Ok(())
        }
        (Value::Array(arr), Seg::Index(idx)) => {
            if *idx > arr.len() {
                return Err(PatchError::index_out_of_bounds(path.clone(), *idx, arr.len()));
            }
            arr.insert(*idx, value);
            Ok(())
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

fn apply_replace(doc: &mut Value, path: &Path, value: Value) -> PatchResult<()> {
    let target = resolve_mut(doc, path.segments(), path)?;
    *target = value;
    Ok(())
}

fn apply_remove(doc: &mut Value, path: &Path) -> PatchResult<()> {
    let Some((parent_segs, last)) = path.split_last() else {
        *doc = Value::Null;
        return Ok(());
    };

    let parent = resolve_mut(doc, parent_segs, path)?;
    match (parent, last) {
        (Value::Object(obj), Seg::Key(key)) => {
            if obj.remove(key).is_none() {
                return Err(PatchError::path_not_found(path.clone()));
            }
            Ok(())
        }
        (Value::Array(arr), Seg::Index(idx)) => {
            if *idx >= arr.len() {
                return Err(PatchError::index_out_of_bounds(path.clone(), *idx, arr.len()));
            }
            arr.remove(*idx);
            Ok(())
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

/// Navigate to a mutable reference at `segments`, erroring on missing or
/// mis-shaped intermediates. `full_path` is used for error reporting.
fn resolve_mut<'a>(
    doc: &'a mut Value,
    segments: &[Seg],
    full_path: &Path,
) -> PatchResult<&'a mut Value> {
    match segments {
        [] => Ok(doc),
        [Seg::Key(key), rest @ ..] => match doc {
            Value::Object(obj) => {
                let child = obj
                    .get_mut(key)
                    .ok_or_else(|| PatchError::path_not_found(full_path.clone()))?;
                resolve_mut(child, rest, full_path)
            }
            other => Err(PatchError::type_mismatch(
                full_path.clone(),
                "object",
                value_type_name(other),
            )),
        },
        [Seg::Index(idx), rest @ ..] => match doc {
            Value::Array(arr) => {
                let len = arr.len();
                let child = arr.get_mut(*idx).ok_or_else(|| {
                    PatchError::index_out_of_bounds(full_path.clone(), *idx, len)
                })?;
                resolve_mut(child, rest, full_path)
            }
            other => Err(PatchError::type_mismatch(
                full_path.clone(),
                "array",
                value_type_name(other),
            )),
        },
    }
}

/// Get a reference to the value at a path, if it exists.
pub fn get_at_path<'a>(doc: &'a Value, path: &Path) -> Option<&'a Value> {
    let mut current = doc;
    for seg in path.segments() {
        match seg {
            Seg::Key(key) => current = current.get(key)?,
            Seg::Index(idx) => current = current.get(idx)?,
        }
    }
    Some(current)
}
