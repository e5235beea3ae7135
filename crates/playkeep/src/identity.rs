use std::fmt;

use crate::host::{ComponentId, DurableHandle, ObjectId, SceneHost};

/// Stable key of a scene object across captures, queries and scene rebuilds.
///
/// The path form breaks when an object or one of its ancestors is renamed, and it cannot tell
/// apart siblings that share a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObjectKey {
    Durable(DurableHandle),
    Path {
        scene_path: String,
        hierarchy_path: String,
    },
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKey::Durable(handle) => f.write_str(handle.as_str()),
            ObjectKey::Path {
                scene_path,
                hierarchy_path,
            } => write!(f, "{scene_path}|{hierarchy_path}"),
        }
    }
}

/// A component's type name and its index among same-type components on the same object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentKey {
    pub type_name: String,
    pub ordinal: usize,
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.type_name, self.ordinal)
    }
}

/// Something that can show up as changed, be accepted, or be reverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiffTarget {
    Transform(ObjectId),
    Component(ComponentId),
}

/// Where an object lives, in the form the diff stores key their records by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub scene_path: String,
    pub object_path: String,
    pub handle: Option<DurableHandle>,
}

/// `Root/.../Leaf` by object name.
pub fn hierarchy_path<H: SceneHost + ?Sized>(host: &H, object: ObjectId) -> Option<String> {
    let mut names = vec![host.object_name(object)?.to_string()];
    let mut current = object;
    while let Some(parent) = host.parent(current) {
        names.push(host.object_name(parent)?.to_string());
        current = parent;
    }
    names.reverse();
    Some(names.join("/"))
}

pub fn locate<H: SceneHost + ?Sized>(host: &H, object: ObjectId) -> Option<ObjectLocation> {
    Some(ObjectLocation {
        scene_path: host.object_scene(object)?.to_string(),
        object_path: hierarchy_path(host, object)?,
        handle: host.durable_handle(object),
    })
}

pub fn object_key<H: SceneHost + ?Sized>(host: &H, object: ObjectId) -> Option<ObjectKey> {
    if let Some(handle) = host.durable_handle(object) {
        return Some(ObjectKey::Durable(handle));
    }
    Some(ObjectKey::Path {
        scene_path: host.object_scene(object)?.to_string(),
        hierarchy_path: hierarchy_path(host, object)?,
    })
}

pub fn component_key<H: SceneHost + ?Sized>(
    host: &H,
    component: ComponentId,
) -> Option<ComponentKey> {
    let owner = host.component_owner(component)?;
    let type_name = host.component_type(component)?;
    let ordinal = host
        .components(owner)
        .into_iter()
        .filter(|sibling| host.component_type(*sibling) == Some(type_name))
        .position(|sibling| sibling == component)?;
    Some(ComponentKey {
        type_name: type_name.to_string(),
        ordinal,
    })
}

pub fn resolve_key<H: SceneHost + ?Sized>(host: &H, key: &ObjectKey) -> Option<ObjectId> {
    match key {
        ObjectKey::Durable(handle) => host.resolve_handle(handle),
        ObjectKey::Path {
            scene_path,
            hierarchy_path,
        } => resolve_path(host, scene_path, hierarchy_path),
    }
}

/// Walks `hierarchy_path` segment by segment from the scene roots. Names match exactly and the
/// first match at each level wins.
pub fn resolve_path<H: SceneHost + ?Sized>(
    host: &H,
    scene_path: &str,
    hierarchy_path: &str,
) -> Option<ObjectId> {
    let mut segments = hierarchy_path.split('/');
    let root_name = segments.next()?;
    let mut current = host
        .root_objects(scene_path)
        .into_iter()
        .find(|root| host.object_name(*root) == Some(root_name))?;
    for segment in segments {
        current = host
            .children(current)
            .into_iter()
            .find(|child| host.object_name(*child) == Some(segment))?;
    }
    Some(current)
}

/// Durable handle first, then the scene/hierarchy path.
pub fn resolve_object<H: SceneHost + ?Sized>(
    host: &H,
    handle: Option<&DurableHandle>,
    scene_path: &str,
    hierarchy_path: &str,
) -> Option<ObjectId> {
    handle
        .and_then(|handle| host.resolve_handle(handle))
        .or_else(|| resolve_path(host, scene_path, hierarchy_path))
}

pub fn resolve_component<H: SceneHost + ?Sized>(
    host: &H,
    object: ObjectId,
    key: &ComponentKey,
) -> Option<ComponentId> {
    host.components(object)
        .into_iter()
        .filter(|component| host.component_type(*component) == Some(key.type_name.as_str()))
        .nth(key.ordinal)
}
