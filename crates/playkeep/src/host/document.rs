use serde::{Deserialize, Serialize};

use crate::codec::FieldKind;
use crate::transform::TransformState;

/// Serialized form of one persistent scene, as loaded into and saved from a [`super::MemoryHost`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDocument {
    pub path: String,
    #[serde(default)]
    pub objects: Vec<ObjectDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDocument {
    pub name: String,
    /// Scene-local file id. Objects without one have no durable handle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_id: Option<u64>,
    #[serde(default)]
    pub transform: TransformState,
    #[serde(default)]
    pub components: Vec<ComponentDocument>,
    #[serde(default)]
    pub children: Vec<ObjectDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDocument {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub fields: Vec<FieldDocument>,
}

/// A field value in canonical codec form. A missing `kind` marks a field the engine cannot handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDocument {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FieldKind>,
    pub value: String,
}

impl ObjectDocument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            local_id: None,
            transform: TransformState::default(),
            components: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_local_id(mut self, local_id: u64) -> Self {
        self.local_id = Some(local_id);
        self
    }

    pub fn with_transform(mut self, transform: TransformState) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_component(mut self, component: ComponentDocument) -> Self {
        self.components.push(component);
        self
    }

    pub fn with_child(mut self, child: ObjectDocument) -> Self {
        self.children.push(child);
        self
    }
}

impl ComponentDocument {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(
        mut self,
        path: impl Into<String>,
        kind: FieldKind,
        value: impl Into<String>,
    ) -> Self {
        self.fields.push(FieldDocument {
            path: path.into(),
            kind: Some(kind),
            value: value.into(),
        });
        self
    }

    pub fn with_unsupported_field(mut self, path: impl Into<String>, raw: impl Into<String>) -> Self {
        self.fields.push(FieldDocument {
            path: path.into(),
            kind: None,
            value: raw.into(),
        });
        self
    }
}
