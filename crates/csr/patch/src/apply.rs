use serde_json::Value;

use crate::error::{type_name, PatchApplicationError, PatchErrorKind};
use crate::op::{Patch, PatchOp};
use crate::pointer::Pointer;

/// Apply `patch` to `state` and return the resulting state.
///
/// Operations run in order against a private copy of `state`. The first
/// failure aborts the whole application, so callers either get the fully
/// patched state or an error with `state` untouched.
pub fn apply(patch: &Patch, state: &Value) -> Result<Value, PatchApplicationError> {
    let mut working = state.clone();
    for (index, op) in patch.iter().enumerate() {
        apply_op(&mut working, op).map_err(|(path, kind)| {
            tracing::debug!(index, op = op.name(), %path, error = %kind, "patch aborted");
            PatchApplicationError { index, path, kind }
        })?;
    }
    Ok(working)
}

type OpResult<T> = Result<T, (String, PatchErrorKind)>;

fn parse(path: &str) -> OpResult<Pointer> {
    Pointer::parse(path).map_err(|e| (path.to_string(), PatchErrorKind::InvalidPointer(e.to_string())))
}

fn apply_op(doc: &mut Value, op: &PatchOp) -> OpResult<()> {
    match op {
        PatchOp::Add { path, value } => {
            let ptr = parse(path)?;
            add(doc, &ptr, value.clone()).map_err(|kind| (path.clone(), kind))
        }
        PatchOp::Remove { path } => {
            let ptr = parse(path)?;
            remove(doc, &ptr)
                .map(|_| ())
                .map_err(|kind| (path.clone(), kind))
        }
        PatchOp::Replace { path, value } => {
            let ptr = parse(path)?;
            let target = lookup_mut(doc, ptr.tokens()).map_err(|kind| (path.clone(), kind))?;
            *target = value.clone();
            Ok(())
        }
        PatchOp::Move { from, path } => {
            let src = parse(from)?;
            let dst = parse(path)?;
            if src == dst {
                return lookup(doc, src.tokens())
                    .map(|_| ())
                    .map_err(|kind| (from.clone(), kind));
            }
            if src.is_ancestor_of(&dst) {
                return Err((path.clone(), PatchErrorKind::MoveIntoChild));
            }
            let moved = remove(doc, &src).map_err(|kind| (from.clone(), kind))?;
            add(doc, &dst, moved).map_err(|kind| (path.clone(), kind))
        }
        PatchOp::Copy { from, path } => {
            let src = parse(from)?;
            let dst = parse(path)?;
            let copied = lookup(doc, src.tokens())
                .map_err(|kind| (from.clone(), kind))?
                .clone();
            add(doc, &dst, copied).map_err(|kind| (path.clone(), kind))
        }
        PatchOp::Test { path, value } => {
            let ptr = parse(path)?;
            let actual = lookup(doc, ptr.tokens()).map_err(|kind| (path.clone(), kind))?;
            if actual != value {
                return Err((
                    path.clone(),
                    PatchErrorKind::TestFailed {
                        expected: value.clone(),
                        actual: actual.clone(),
                    },
                ));
            }
            Ok(())
        }
    }
}

fn array_index(token: &str, len: usize) -> Result<usize, PatchErrorKind> {
    let valid = !token.is_empty()
        && token.bytes().all(|b| b.is_ascii_digit())
        && (token == "0" || !token.starts_with('0'));
    if !valid {
        return Err(PatchErrorKind::InvalidIndex(token.to_string()));
    }
    let index: usize = token
        .parse()
        .map_err(|_| PatchErrorKind::InvalidIndex(token.to_string()))?;
    if index >= len {
        return Err(PatchErrorKind::IndexOutOfBounds { index, len });
    }
    Ok(index)
}

fn lookup<'a>(doc: &'a Value, tokens: &[String]) -> Result<&'a Value, PatchErrorKind> {
    let mut current = doc;
    for token in tokens {
        current = match current {
            Value::Object(map) => map.get(token).ok_or(PatchErrorKind::PathNotFound)?,
            Value::Array(items) => &items[array_index(token, items.len())?],
            other => {
                return Err(PatchErrorKind::TypeMismatch {
                    found: type_name(other),
                })
            }
        };
    }
    Ok(current)
}

fn lookup_mut<'a>(doc: &'a mut Value, tokens: &[String]) -> Result<&'a mut Value, PatchErrorKind> {
    let mut current = doc;
    for token in tokens {
        current = match current {
            Value::Object(map) => map.get_mut(token).ok_or(PatchErrorKind::PathNotFound)?,
            Value::Array(items) => {
                let index = array_index(token, items.len())?;
                &mut items[index]
            }
            other => {
                return Err(PatchErrorKind::TypeMismatch {
                    found: type_name(other),
                })
            }
        };
    }
    Ok(current)
}

fn add(doc: &mut Value, ptr: &Pointer, value: Value) -> Result<(), PatchErrorKind> {
    let Some((parent, last)) = ptr.split_last() else {
        *doc = value;
        return Ok(());
    };
    match lookup_mut(doc, parent)? {
        Value::Object(map) => {
            map.insert(last.to_string(), value);
            Ok(())
        }
        Value::Array(items) => {
            if last == "-" {
                items.push(value);
                return Ok(());
            }
            // Inserting at `len` appends.
            let index = array_index(last, items.len() + 1)?;
            items.insert(index, value);
            Ok(())
        }
        other => Err(PatchErrorKind::TypeMismatch {
            found: type_name(other),
        }),
    }
}

fn remove(doc: &mut Value, ptr: &Pointer) -> Result<Value, PatchErrorKind> {
    let (parent, last) = ptr.split_last().ok_or(PatchErrorKind::RemoveRoot)?;
    match lookup_mut(doc, parent)? {
        Value::Object(map) => map.remove(last).ok_or(PatchErrorKind::PathNotFound),
        Value::Array(items) => {
            let index = array_index(last, items.len())?;
            Ok(items.remove(index))
        }
        other => Err(PatchErrorKind::TypeMismatch {
            found: type_name(other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patch(ops: Value) -> Patch {
        serde_json::from_value(ops).unwrap()
    }

    #[test]
    fn replace_top_level_field() {
        let state = json!({"mode": "LOCKED_DOWN"});
        let p = patch(json!([{"op": "replace", "path": "/mode", "value": "EVOLUTIONARY_AUTONOMY"}]));
        assert_eq!(
            apply(&p, &state).unwrap(),
            json!({"mode": "EVOLUTIONARY_AUTONOMY"})
        );
    }

    #[test]
    fn add_remove_on_objects_and_arrays() {
        let state = json!({"signers": ["a", "c"], "limits": {}});
        let p = patch(json!([
            {"op": "add", "path": "/signers/1", "value": "b"},
            {"op": "add", "path": "/signers/-", "value": "d"},
            {"op": "add", "path": "/limits/cpu", "value": 4},
            {"op": "remove", "path": "/signers/0"}
        ]));
        assert_eq!(
            apply(&p, &state).unwrap(),
            json!({"signers": ["b", "c", "d"], "limits": {"cpu": 4}})
        );
    }

    #[test]
    fn move_and_copy() {
        let state = json!({"a": {"x": 1}, "b": {}});
        let p = patch(json!([
            {"op": "copy", "from": "/a/x", "path": "/b/y"},
            {"op": "move", "from": "/a", "path": "/c"}
        ]));
        assert_eq!(
            apply(&p, &state).unwrap(),
            json!({"b": {"y": 1}, "c": {"x": 1}})
        );
    }

    #[test]
    fn move_into_own_child_is_rejected() {
        let state = json!({"a": {"b": {}}});
        let p = patch(json!([{"op": "move", "from": "/a", "path": "/a/b/c"}]));
        let err = apply(&p, &state).unwrap_err();
        assert_eq!(err.kind, PatchErrorKind::MoveIntoChild);
    }

    #[test]
    fn failed_test_aborts_everything() {
        let state = json!({"mode": "LOCKED_DOWN", "n": 1});
        let p = patch(json!([
            {"op": "replace", "path": "/n", "value": 2},
            {"op": "test", "path": "/mode", "value": "OPEN"},
            {"op": "replace", "path": "/mode", "value": "X"}
        ]));
        let err = apply(&p, &state).unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(err.path, "/mode");
        assert!(matches!(err.kind, PatchErrorKind::TestFailed { .. }));
        assert_eq!(state, json!({"mode": "LOCKED_DOWN", "n": 1}));
    }

    #[test]
    fn missing_path_reports_index_and_path() {
        let state = json!({"a": 1});
        let p = patch(json!([
            {"op": "add", "path": "/b", "value": 2},
            {"op": "remove", "path": "/nope"}
        ]));
        let err = apply(&p, &state).unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(err.path, "/nope");
        assert_eq!(err.kind, PatchErrorKind::PathNotFound);
    }

    #[test]
    fn type_mismatch_at_target() {
        let state = json!({"mode": "LOCKED_DOWN"});
        let p = patch(json!([{"op": "add", "path": "/mode/inner", "value": 1}]));
        let err = apply(&p, &state).unwrap_err();
        assert_eq!(err.kind, PatchErrorKind::TypeMismatch { found: "string" });
    }

    #[test]
    fn array_index_rules() {
        let state = json!({"xs": [1, 2]});
        let leading_zero = patch(json!([{"op": "remove", "path": "/xs/01"}]));
        assert!(matches!(
            apply(&leading_zero, &state).unwrap_err().kind,
            PatchErrorKind::InvalidIndex(_)
        ));
        let past_end = patch(json!([{"op": "add", "path": "/xs/3", "value": 0}]));
        assert_eq!(
            apply(&past_end, &state).unwrap_err().kind,
            PatchErrorKind::IndexOutOfBounds { index: 3, len: 3 }
        );
        let at_end = patch(json!([{"op": "add", "path": "/xs/2", "value": 3}]));
        assert_eq!(apply(&at_end, &state).unwrap(), json!({"xs": [1, 2, 3]}));
    }

    #[test]
    fn root_replace_and_remove() {
        let state = json!({"a": 1});
        let replace = patch(json!([{"op": "replace", "path": "", "value": [1]}]));
        assert_eq!(apply(&replace, &state).unwrap(), json!([1]));
        let remove = patch(json!([{"op": "remove", "path": ""}]));
        assert_eq!(
            apply(&remove, &state).unwrap_err().kind,
            PatchErrorKind::RemoveRoot
        );
    }

    #[test]
    fn malformed_pointer() {
        let p = patch(json!([{"op": "replace", "path": "mode", "value": 1}]));
        let err = apply(&p, &json!({"mode": 0})).unwrap_err();
        assert!(matches!(err.kind, PatchErrorKind::InvalidPointer(_)));
    }

    #[test]
    fn empty_patch_is_identity() {
        let state = json!({"a": [1, {"b": null}]});
        assert_eq!(apply(&Patch::default(), &state).unwrap(), state);
    }
}
