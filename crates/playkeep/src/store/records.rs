use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::codec::{self, FieldKind, FieldValue};
use crate::host::DurableHandle;
use crate::transform::{TransformField, TransformState};

/// A record kind that can live in a [`super::DiffStore`].
pub trait DiffRecord: Clone + fmt::Debug + Serialize + DeserializeOwned {
    type Key: fmt::Debug + fmt::Display;

    /// Name written into the store file and used in logs.
    const STORE_NAME: &'static str;

    fn matches(&self, key: &Self::Key) -> bool;
    fn key(&self) -> Self::Key;

    /// False when the record contradicts itself; such a record is never replayed.
    fn is_consistent(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransformRecordKey {
    pub scene_path: String,
    pub object_path: String,
}

impl fmt::Display for TransformRecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.scene_path, self.object_path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentRecordKey {
    pub scene_path: String,
    pub object_path: String,
    pub component_type: String,
    pub component_ordinal: usize,
}

impl fmt::Display for ComponentRecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}[{}]",
            self.scene_path, self.object_path, self.component_type, self.component_ordinal
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformDiffRecord {
    pub scene_path: String,
    pub object_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<DurableHandle>,
    pub is_layout_element: bool,
    pub current_values: TransformState,
    /// Fields replay writes back. Empty means all of them.
    pub modified_field_names: Vec<TransformField>,
    /// Values before the first accepted override. Written once per record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_values: Option<TransformState>,
}

impl TransformDiffRecord {
    pub fn has_original(&self) -> bool {
        self.original_values.is_some()
    }

    pub fn replay_fields(&self) -> Vec<TransformField> {
        if self.modified_field_names.is_empty() {
            self.current_values.field_set()
        } else {
            self.modified_field_names.clone()
        }
    }
}

impl DiffRecord for TransformDiffRecord {
    type Key = TransformRecordKey;

    const STORE_NAME: &'static str = "transform_diffs";

    fn matches(&self, key: &Self::Key) -> bool {
        self.scene_path == key.scene_path && self.object_path == key.object_path
    }

    fn key(&self) -> Self::Key {
        TransformRecordKey {
            scene_path: self.scene_path.clone(),
            object_path: self.object_path.clone(),
        }
    }

    /// The layout flag must agree with the stored values, and layout fields may only be listed
    /// for layout elements.
    fn is_consistent(&self) -> bool {
        self.is_layout_element == self.current_values.is_layout_element()
            && (self.is_layout_element
                || !self
                    .modified_field_names
                    .iter()
                    .any(|field| field.is_layout()))
    }
}

/// Parallel lists of field paths, canonical value strings and value kinds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedFields {
    pub field_paths: Vec<String>,
    pub values: Vec<String>,
    pub value_kinds: Vec<FieldKind>,
}

impl SerializedFields {
    pub fn from_values<'a>(entries: impl IntoIterator<Item = (&'a str, &'a FieldValue)>) -> Self {
        let mut fields = Self::default();
        for (path, value) in entries {
            fields.push(path, value);
        }
        fields
    }

    pub fn push(&mut self, path: &str, value: &FieldValue) {
        self.field_paths.push(path.to_string());
        self.values.push(codec::serialize(value));
        self.value_kinds.push(value.kind());
    }

    pub fn len(&self) -> usize {
        self.field_paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.field_paths.is_empty()
    }

    pub fn is_parallel(&self) -> bool {
        self.values.len() == self.field_paths.len()
            && self.value_kinds.len() == self.field_paths.len()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.field_paths.iter().any(|field_path| field_path == path)
    }

    /// `(path, decoded value)` pairs; stops at the shortest list if they disagree.
    pub fn decoded(&self) -> impl Iterator<Item = (&str, FieldValue)> + '_ {
        self.field_paths
            .iter()
            .zip(&self.values)
            .zip(&self.value_kinds)
            .map(|((path, raw), kind)| (path.as_str(), codec::deserialize(raw, *kind)))
    }

    pub fn decode(&self, path: &str) -> Option<FieldValue> {
        self.decoded()
            .find(|(field_path, _)| *field_path == path)
            .map(|(_, value)| value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDiffRecord {
    pub scene_path: String,
    pub object_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<DurableHandle>,
    pub component_type: String,
    pub component_ordinal: usize,
    /// Accepted values; these are what replay writes back.
    pub current: SerializedFields,
    /// Every captured field as it was before the first accepted override. Written once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original: Option<SerializedFields>,
}

impl ComponentDiffRecord {
    pub fn has_original(&self) -> bool {
        self.original.is_some()
    }
}

impl DiffRecord for ComponentDiffRecord {
    type Key = ComponentRecordKey;

    const STORE_NAME: &'static str = "component_diffs";

    fn matches(&self, key: &Self::Key) -> bool {
        self.scene_path == key.scene_path
            && self.object_path == key.object_path
            && self.component_type == key.component_type
            && self.component_ordinal == key.component_ordinal
    }

    fn key(&self) -> Self::Key {
        ComponentRecordKey {
            scene_path: self.scene_path.clone(),
            object_path: self.object_path.clone(),
            component_type: self.component_type.clone(),
            component_ordinal: self.component_ordinal,
        }
    }

    fn is_consistent(&self) -> bool {
        self.current.is_parallel()
            && self
                .original
                .as_ref()
                .map_or(true, SerializedFields::is_parallel)
    }
}
