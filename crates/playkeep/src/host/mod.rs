//! Capabilities the engine consumes from the scene-authoring host.
//!
//! Object and component ids are only valid for one incarnation of the scene graph. Anything
//! that must survive a teardown/rebuild goes through [`crate::identity`] instead.

mod document;
mod memory;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::{FieldKind, FieldValue};
use crate::transform::TransformState;

pub use document::{ComponentDocument, FieldDocument, ObjectDocument, SceneDocument};
pub use memory::{MemoryHost, TYPE_REFERENCE_FIELD};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub u64);

/// Reload-surviving object handle with a string round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DurableHandle(pub String);

impl DurableHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub path: String,
    /// `None` when the host field has a kind outside the supported set.
    pub kind: Option<FieldKind>,
    /// The internal field naming the component's script/type; never diffed.
    pub type_reference: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldAccessError {
    #[error("component no longer exists")]
    MissingTarget,
    #[error("no field at path {path}")]
    UnknownField { path: String },
    #[error("field {path} has an unsupported kind")]
    Unsupported { path: String },
    #[error("field {path} holds {expected:?}, got {actual:?}")]
    KindMismatch {
        path: String,
        expected: FieldKind,
        actual: FieldKind,
    },
}

pub trait FieldAccess {
    /// Visible serialized fields of `component`, in the host's property-path order.
    fn fields(&self, component: ComponentId) -> Vec<FieldDescriptor>;
    fn read_field(&self, component: ComponentId, path: &str)
        -> Result<FieldValue, FieldAccessError>;
    fn write_field(
        &mut self,
        component: ComponentId,
        path: &str,
        value: &FieldValue,
    ) -> Result<(), FieldAccessError>;
}

pub trait SceneHost: FieldAccess {
    fn loaded_scenes(&self) -> Vec<String>;
    fn active_scene(&self) -> Option<String>;
    fn root_objects(&self, scene_path: &str) -> Vec<ObjectId>;
    fn children(&self, object: ObjectId) -> Vec<ObjectId>;
    fn parent(&self, object: ObjectId) -> Option<ObjectId>;
    fn object_name(&self, object: ObjectId) -> Option<&str>;
    fn object_scene(&self, object: ObjectId) -> Option<&str>;
    fn durable_handle(&self, object: ObjectId) -> Option<DurableHandle>;
    fn resolve_handle(&self, handle: &DurableHandle) -> Option<ObjectId>;
    fn transform(&self, object: ObjectId) -> Option<TransformState>;
    fn set_transform(&mut self, object: ObjectId, transform: &TransformState) -> bool;
    /// Non-transform components in attachment order.
    fn components(&self, object: ObjectId) -> Vec<ComponentId>;
    fn component_type(&self, component: ComponentId) -> Option<&str>;
    fn component_owner(&self, component: ComponentId) -> Option<ObjectId>;
    fn mark_scene_dirty(&mut self, scene_path: &str);
    /// True while the simulation (live session) is running.
    fn is_live(&self) -> bool;
    /// True while the host is reloading or recompiling; ids are not trustworthy then.
    fn is_reloading(&self) -> bool;
}
