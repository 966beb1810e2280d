use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;

/// Dot-separated path to a field inside a payload (`system_metadata.timestamp_staged`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn parse(text: &str) -> Option<Self> {
        let segments: Vec<String> = text.split('.').map(str::to_string).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return None;
        }
        Some(Self(segments))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl TryFrom<String> for FieldPath {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        FieldPath::parse(&value).ok_or_else(|| format!("invalid field path '{}'", value))
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.to_string()
    }
}

/// Fields removed from a payload before it is canonically hashed.
///
/// Used for transient values (staging timestamps, reviewer ids, runtime
/// metrics) that would otherwise make identical configurations hash apart.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashPolicy {
    #[serde(default)]
    pub excluded_fields: Vec<FieldPath>,
}

impl HashPolicy {
    pub fn new(excluded_fields: Vec<FieldPath>) -> Self {
        Self { excluded_fields }
    }

    pub fn is_empty(&self) -> bool {
        self.excluded_fields.is_empty()
    }

    /// Return `value` with every excluded field removed. Borrows when nothing is excluded.
    pub fn strip<'a>(&self, value: &'a Value) -> Cow<'a, Value> {
        if self.excluded_fields.is_empty() {
            return Cow::Borrowed(value);
        }
        let mut owned = value.clone();
        for path in &self.excluded_fields {
            remove_path(&mut owned, path.segments());
        }
        Cow::Owned(owned)
    }
}

fn remove_path(value: &mut Value, segments: &[String]) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    let Value::Object(map) = value else {
        return;
    };
    if rest.is_empty() {
        map.remove(head);
    } else if let Some(child) = map.get_mut(head) {
        remove_path(child, rest);
    }
}
