use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON kind of a stored value, recorded in the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl ValueType {
    #[must_use]
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRecord {
    /// Value file path relative to the storage root.
    pub location: String,
    pub stored_at: String,
    pub value_type: ValueType,
}

pub(crate) type Manifest = BTreeMap<String, ManifestRecord>;

/// On-disk shape of one value file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueFile {
    pub key: String,
    pub value: Value,
    pub stored_at: String,
    pub location: String,
}

/// Manifest record for a key plus whether its value file is currently present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub key: String,
    pub location: String,
    pub stored_at: String,
    pub value_type: ValueType,
    pub exists: bool,
}
