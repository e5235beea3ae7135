use std::collections::{BTreeSet, HashMap};

use crate::codec::{self, FieldKind, FieldValue};
use crate::identity;
use crate::transform::TransformState;

use super::document::{ComponentDocument, FieldDocument, ObjectDocument, SceneDocument};
use super::{
    ComponentId, DurableHandle, FieldAccess, FieldAccessError, FieldDescriptor, ObjectId,
    SceneHost,
};

/// Field path the memory host reports as the component's type reference.
pub const TYPE_REFERENCE_FIELD: &str = "m_Script";

#[derive(Debug, Default)]
struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    fn allocate(&mut self) -> u64 {
        self.next = self.next.saturating_add(1);
        self.next
    }
}

#[derive(Debug)]
struct MemoryObject {
    name: String,
    scene: String,
    local_id: Option<u64>,
    parent: Option<ObjectId>,
    children: Vec<ObjectId>,
    transform: TransformState,
    components: Vec<ComponentId>,
}

#[derive(Debug)]
struct MemoryField {
    path: String,
    kind: Option<FieldKind>,
    value: Option<FieldValue>,
    raw: String,
}

#[derive(Debug)]
struct MemoryComponent {
    owner: ObjectId,
    type_name: String,
    fields: Vec<MemoryField>,
}

#[derive(Debug)]
struct MemoryScene {
    path: String,
    roots: Vec<ObjectId>,
}

/// In-process scene host. Every rebuild of the graph (entering or leaving the live session, a
/// reload) hands out fresh object and component ids, so stale ids stop resolving the way they
/// do in a real editor. Durable handles are derived from the scene path and local file id and
/// survive rebuilds.
#[derive(Debug, Default)]
pub struct MemoryHost {
    allocator: IdAllocator,
    scenes: Vec<MemoryScene>,
    objects: HashMap<ObjectId, MemoryObject>,
    components: HashMap<ComponentId, MemoryComponent>,
    active_scene: Option<String>,
    live: bool,
    reload_ticks_remaining: u32,
    persistent: Option<Vec<SceneDocument>>,
    dirty_scenes: BTreeSet<String>,
}

impl MemoryHost {
    pub fn from_documents(documents: Vec<SceneDocument>) -> Self {
        let mut host = Self {
            active_scene: documents.first().map(|scene| scene.path.clone()),
            ..Self::default()
        };
        host.rebuild(&documents);
        host
    }

    pub fn to_documents(&self) -> Vec<SceneDocument> {
        self.scenes
            .iter()
            .map(|scene| SceneDocument {
                path: scene.path.clone(),
                objects: scene
                    .roots
                    .iter()
                    .filter_map(|root| self.object_document(*root))
                    .collect(),
            })
            .collect()
    }

    /// Starts the live session on a copy of the persistent scenes.
    pub fn enter_live(&mut self) {
        if self.live {
            return;
        }
        let documents = self.to_documents();
        self.rebuild(&documents);
        self.persistent = Some(documents);
        self.live = true;
    }

    /// Discards every live mutation and rebuilds the persistent scenes.
    pub fn exit_live(&mut self) {
        if !self.live {
            return;
        }
        let documents = self.persistent.take().unwrap_or_default();
        self.rebuild(&documents);
        self.live = false;
    }

    /// Tears the graph down and rebuilds it from its own documents, invalidating all ids.
    pub fn reload(&mut self) {
        let documents = self.to_documents();
        self.rebuild(&documents);
    }

    /// Rebuilds now and reports [`SceneHost::is_reloading`] for the next `ticks` calls to
    /// [`MemoryHost::advance_tick`].
    pub fn begin_reload(&mut self, ticks: u32) {
        self.reload();
        self.reload_ticks_remaining = ticks;
    }

    pub fn advance_tick(&mut self) {
        self.reload_ticks_remaining = self.reload_ticks_remaining.saturating_sub(1);
    }

    pub fn set_active_scene(&mut self, scene_path: &str) {
        self.active_scene = Some(scene_path.to_string());
    }

    pub fn is_scene_dirty(&self, scene_path: &str) -> bool {
        self.dirty_scenes.contains(scene_path)
    }

    pub fn clear_dirty(&mut self) {
        self.dirty_scenes.clear();
    }

    pub fn object_at(&self, scene_path: &str, hierarchy_path: &str) -> Option<ObjectId> {
        identity::resolve_path(self, scene_path, hierarchy_path)
    }

    pub fn component_of_type(&self, object: ObjectId, type_name: &str) -> Option<ComponentId> {
        self.components(object)
            .into_iter()
            .find(|component| self.component_type(*component) == Some(type_name))
    }

    pub fn transform_mut(&mut self, object: ObjectId) -> Option<&mut TransformState> {
        self.objects
            .get_mut(&object)
            .map(|object| &mut object.transform)
    }

    pub fn rename_object(&mut self, object: ObjectId, name: &str) -> bool {
        match self.objects.get_mut(&object) {
            Some(object) => {
                object.name = name.to_string();
                true
            }
            None => false,
        }
    }

    /// Removes `object` and its whole subtree.
    pub fn remove_object(&mut self, object: ObjectId) -> bool {
        let Some(removed) = self.objects.remove(&object) else {
            return false;
        };
        match removed.parent {
            Some(parent) => {
                if let Some(parent) = self.objects.get_mut(&parent) {
                    parent.children.retain(|child| *child != object);
                }
            }
            None => {
                for scene in &mut self.scenes {
                    scene.roots.retain(|root| *root != object);
                }
            }
        }
        for component in removed.components {
            self.components.remove(&component);
        }
        for child in removed.children {
            self.remove_object(child);
        }
        true
    }

    pub fn add_component(
        &mut self,
        object: ObjectId,
        document: &ComponentDocument,
    ) -> Option<ComponentId> {
        if !self.objects.contains_key(&object) {
            return None;
        }
        let id = self.build_component(object, document);
        if let Some(object) = self.objects.get_mut(&object) {
            object.components.push(id);
        }
        Some(id)
    }

    fn rebuild(&mut self, documents: &[SceneDocument]) {
        self.scenes.clear();
        self.objects.clear();
        self.components.clear();
        for document in documents {
            let roots = document
                .objects
                .iter()
                .map(|object| self.build_object(&document.path, None, object))
                .collect();
            self.scenes.push(MemoryScene {
                path: document.path.clone(),
                roots,
            });
        }
    }

    fn build_object(
        &mut self,
        scene_path: &str,
        parent: Option<ObjectId>,
        document: &ObjectDocument,
    ) -> ObjectId {
        let id = ObjectId(self.allocator.allocate());
        self.objects.insert(
            id,
            MemoryObject {
                name: document.name.clone(),
                scene: scene_path.to_string(),
                local_id: document.local_id,
                parent,
                children: Vec::new(),
                transform: document.transform,
                components: Vec::new(),
            },
        );
        let components = document
            .components
            .iter()
            .map(|component| self.build_component(id, component))
            .collect();
        let children = document
            .children
            .iter()
            .map(|child| self.build_object(scene_path, Some(id), child))
            .collect();
        if let Some(object) = self.objects.get_mut(&id) {
            object.components = components;
            object.children = children;
        }
        id
    }

    fn build_component(&mut self, owner: ObjectId, document: &ComponentDocument) -> ComponentId {
        let id = ComponentId(self.allocator.allocate());
        let fields = document
            .fields
            .iter()
            .map(|field| MemoryField {
                path: field.path.clone(),
                kind: field.kind,
                value: field.kind.map(|kind| codec::deserialize(&field.value, kind)),
                raw: field.value.clone(),
            })
            .collect();
        self.components.insert(
            id,
            MemoryComponent {
                owner,
                type_name: document.type_name.clone(),
                fields,
            },
        );
        id
    }

    fn object_document(&self, id: ObjectId) -> Option<ObjectDocument> {
        let object = self.objects.get(&id)?;
        Some(ObjectDocument {
            name: object.name.clone(),
            local_id: object.local_id,
            transform: object.transform,
            components: object
                .components
                .iter()
                .filter_map(|component| self.component_document(*component))
                .collect(),
            children: object
                .children
                .iter()
                .filter_map(|child| self.object_document(*child))
                .collect(),
        })
    }

    fn component_document(&self, id: ComponentId) -> Option<ComponentDocument> {
        let component = self.components.get(&id)?;
        Some(ComponentDocument {
            type_name: component.type_name.clone(),
            fields: component
                .fields
                .iter()
                .map(|field| FieldDocument {
                    path: field.path.clone(),
                    kind: field.kind,
                    value: field
                        .value
                        .as_ref()
                        .map(codec::serialize)
                        .unwrap_or_else(|| field.raw.clone()),
                })
                .collect(),
        })
    }

    fn field(&self, component: ComponentId, path: &str) -> Result<&MemoryField, FieldAccessError> {
        let component = self
            .components
            .get(&component)
            .ok_or(FieldAccessError::MissingTarget)?;
        component
            .fields
            .iter()
            .find(|field| field.path == path)
            .ok_or_else(|| FieldAccessError::UnknownField {
                path: path.to_string(),
            })
    }
}

impl FieldAccess for MemoryHost {
    fn fields(&self, component: ComponentId) -> Vec<FieldDescriptor> {
        let Some(component) = self.components.get(&component) else {
            return Vec::new();
        };
        component
            .fields
            .iter()
            .map(|field| FieldDescriptor {
                path: field.path.clone(),
                kind: field.kind,
                type_reference: field.path == TYPE_REFERENCE_FIELD,
            })
            .collect()
    }

    fn read_field(&self, component: ComponentId, path: &str) -> Result<FieldValue, FieldAccessError> {
        let field = self.field(component, path)?;
        field
            .value
            .clone()
            .ok_or_else(|| FieldAccessError::Unsupported {
                path: path.to_string(),
            })
    }

    fn write_field(
        &mut self,
        component: ComponentId,
        path: &str,
        value: &FieldValue,
    ) -> Result<(), FieldAccessError> {
        let component = self
            .components
            .get_mut(&component)
            .ok_or(FieldAccessError::MissingTarget)?;
        let field = component
            .fields
            .iter_mut()
            .find(|field| field.path == path)
            .ok_or_else(|| FieldAccessError::UnknownField {
                path: path.to_string(),
            })?;
        let Some(expected) = field.kind else {
            return Err(FieldAccessError::Unsupported {
                path: path.to_string(),
            });
        };
        if value.kind() != expected {
            return Err(FieldAccessError::KindMismatch {
                path: path.to_string(),
                expected,
                actual: value.kind(),
            });
        }
        field.raw = codec::serialize(value);
        field.value = Some(value.clone());
        Ok(())
    }
}

impl SceneHost for MemoryHost {
    fn loaded_scenes(&self) -> Vec<String> {
        self.scenes.iter().map(|scene| scene.path.clone()).collect()
    }

    fn active_scene(&self) -> Option<String> {
        self.active_scene.clone()
    }

    fn root_objects(&self, scene_path: &str) -> Vec<ObjectId> {
        self.scenes
            .iter()
            .find(|scene| scene.path == scene_path)
            .map(|scene| scene.roots.clone())
            .unwrap_or_default()
    }

    fn children(&self, object: ObjectId) -> Vec<ObjectId> {
        self.objects
            .get(&object)
            .map(|object| object.children.clone())
            .unwrap_or_default()
    }

    fn parent(&self, object: ObjectId) -> Option<ObjectId> {
        self.objects.get(&object)?.parent
    }

    fn object_name(&self, object: ObjectId) -> Option<&str> {
        self.objects.get(&object).map(|object| object.name.as_str())
    }

    fn object_scene(&self, object: ObjectId) -> Option<&str> {
        self.objects.get(&object).map(|object| object.scene.as_str())
    }

    fn durable_handle(&self, object: ObjectId) -> Option<DurableHandle> {
        let object = self.objects.get(&object)?;
        let local_id = object.local_id?;
        Some(DurableHandle(format!("{}#{local_id}", object.scene)))
    }

    fn resolve_handle(&self, handle: &DurableHandle) -> Option<ObjectId> {
        let (scene, local_id) = handle.as_str().rsplit_once('#')?;
        let local_id = local_id.parse::<u64>().ok()?;
        self.objects
            .iter()
            .filter(|(_, object)| object.scene == scene && object.local_id == Some(local_id))
            .map(|(id, _)| *id)
            .min()
    }

    fn transform(&self, object: ObjectId) -> Option<TransformState> {
        self.objects.get(&object).map(|object| object.transform)
    }

    fn set_transform(&mut self, object: ObjectId, transform: &TransformState) -> bool {
        match self.objects.get_mut(&object) {
            Some(object) => {
                object.transform = *transform;
                true
            }
            None => false,
        }
    }

    fn components(&self, object: ObjectId) -> Vec<ComponentId> {
        self.objects
            .get(&object)
            .map(|object| object.components.clone())
            .unwrap_or_default()
    }

    fn component_type(&self, component: ComponentId) -> Option<&str> {
        self.components
            .get(&component)
            .map(|component| component.type_name.as_str())
    }

    fn component_owner(&self, component: ComponentId) -> Option<ObjectId> {
        self.components.get(&component).map(|component| component.owner)
    }

    fn mark_scene_dirty(&mut self, scene_path: &str) {
        self.dirty_scenes.insert(scene_path.to_string());
    }

    fn is_live(&self) -> bool {
        self.live
    }

    fn is_reloading(&self) -> bool {
        self.reload_ticks_remaining > 0
    }
}
