//! Error types for patch application and capture.

use crate::Path;
use thiserror::Error;

/// Result type alias for patch operations.
pub type PatchResult<T> = Result<T, PatchError>;

/// Structural mismatch while applying or capturing a patch.
#[derive(Debug, Error)]
pub enum PatchError {
    /// The targeted path (or one of its ancestors) does not exist.
    #[error("path not found: {path}")]
    PathNotFound {
        /// The path that was not found.
        path: Path,
    },

    /// Array index is out of bounds.
    #[error("index {index} out of bounds (len: {len}) at path {path}")]
    IndexOutOfBounds {
        /// The path to the array.
        path: Path,
        /// The index that was accessed.
        index: usize,
        /// The actual length of the array.
        len: usize,
    },

    /// The value at a path has a different shape than the patch expects.
    #[error("type mismatch at {path}: expected {expected}, found {found}")]
    TypeMismatch {
        /// The path where the mismatch occurred.
        path: Path,
        /// The expected shape.
        expected: &'static str,
        /// The shape found.
        found: &'static str,
    },
}

impl PatchError {
    /// Create a path not found error.
    #[inline]
    pub fn path_not_found(path: Path) -> Self {
        PatchError::PathNotFound { path }
    }

    /// Create an index out of bounds error.
    #[inline]
    pub fn index_out_of_bounds(path: Path, index: usize, len: usize) -> Self {
        PatchError::IndexOutOfBounds { path, index, len }
    }

    /// Create a type mismatch error.
    #[inline]
    pub fn type_mismatch(path: Path, expected: &'static str, found: &'static str) -> Self {
        PatchError::TypeMismatch {
            path,
            expected,
            found,
        }
    }
}

/// Get the type name of a JSON value.
#[inline]
pub fn value_type_name(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;
    use serde_json::json;

    #[test]
    fn display_includes_path() {
        let err = PatchError::path_not_found(path!("tasks", "t3", "title"));
        assert!(err.to_string().contains("$.tasks.t3.title"));
    }

    #[test]
    fn type_names() {
        assert_eq!(value_type_name(&json!(null)), "null");
        assert_eq!(value_type_name(&json!([1])), "array");
        assert_eq!(value_type_name(&json!({"a": 1})), "object");
    }
}
