use serde_json::Value;
use thiserror::Error;

/// Failure while applying a patch.
///
/// Carries the index of the failing operation and the path it addressed.
/// The input state is never modified when this error is returned.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("patch operation {index} at '{path}' failed: {kind}")]
pub struct PatchApplicationError {
    pub index: usize,
    pub path: String,
    pub kind: PatchErrorKind,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PatchErrorKind {
    #[error("invalid pointer: {0}")]
    InvalidPointer(String),

    #[error("path not found")]
    PathNotFound,

    #[error("type mismatch: cannot address a child of {found}")]
    TypeMismatch { found: &'static str },

    #[error("invalid array index '{0}'")]
    InvalidIndex(String),

    #[error("array index {index} out of bounds (len {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("test failed: expected {expected}, found {actual}")]
    TestFailed { expected: Value, actual: Value },

    #[error("cannot move a value into one of its own children")]
    MoveIntoChild,

    #[error("the document root cannot be removed")]
    RemoveRoot,
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
