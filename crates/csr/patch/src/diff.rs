use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::op::{Patch, PatchOp};
use crate::pointer::Pointer;

/// Forward and inverse patches produced by one [`diff`] call.
///
/// `forward` turns the old state into the new one; `inverse` turns the new
/// state back into the old one and embeds every value it needs to restore.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffPair {
    pub forward: Patch,
    pub inverse: Patch,
}

impl DiffPair {
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

/// Structural diff between two states.
pub fn diff(old: &Value, new: &Value) -> DiffPair {
    let mut walker = Walker::default();
    walker.walk(&Pointer::root(), old, new);
    let Walker { forward, mut inverse } = walker;
    // Undo runs last-change-first.
    inverse.reverse();
    DiffPair {
        forward: Patch::new(forward),
        inverse: Patch::new(inverse),
    }
}

#[derive(Default)]
struct Walker {
    forward: Vec<PatchOp>,
    inverse: Vec<PatchOp>,
}

impl Walker {
    fn walk(&mut self, at: &Pointer, old: &Value, new: &Value) {
        if old == new {
            return;
        }
        match (old, new) {
            (Value::Object(before), Value::Object(after)) => {
                for (key, old_value) in before {
                    let child = at.child(key.as_str());
                    match after.get(key) {
                        Some(new_value) => self.walk(&child, old_value, new_value),
                        None => self.removed(&child, old_value),
                    }
                }
                for (key, new_value) in after {
                    if !before.contains_key(key) {
                        self.added(&at.child(key.as_str()), new_value);
                    }
                }
            }
            (Value::Array(before), Value::Array(after)) => {
                let shared = before.len().min(after.len());
                for i in 0..shared {
                    self.walk(&at.index(i), &before[i], &after[i]);
                }
                for (i, new_value) in after.iter().enumerate().skip(shared) {
                    self.added(&at.index(i), new_value);
                }
                for i in (shared..before.len()).rev() {
                    self.removed(&at.index(i), &before[i]);
                }
            }
            _ => {
                let path = at.to_string();
                self.forward.push(PatchOp::Replace {
                    path: path.clone(),
                    value: new.clone(),
                });
                self.inverse.push(PatchOp::Replace {
                    path,
                    value: old.clone(),
                });
            }
        }
    }

    fn added(&mut self, at: &Pointer, value: &Value) {
        let path = at.to_string();
        self.forward.push(PatchOp::Add {
            path: path.clone(),
            value: value.clone(),
        });
        self.inverse.push(PatchOp::Remove { path });
    }

    fn removed(&mut self, at: &Pointer, value: &Value) {
        let path = at.to_string();
        self.forward.push(PatchOp::Remove { path: path.clone() });
        self.inverse.push(PatchOp::Add {
            path,
            value: value.clone(),
        });
    }
}
