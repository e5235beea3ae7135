use std::collections::HashMap;

use tracing::{debug, info};

use crate::codec;
use crate::host::{ComponentId, ObjectId, SceneHost};
use crate::identity::{self, ComponentKey, DiffTarget, ObjectKey};
use crate::snapshot::{ComponentSnapshot, TransformSnapshot};

/// Baseline snapshots for one live session, keyed by stable identity.
#[derive(Debug, Default)]
pub struct SnapshotRegistry {
    transforms: HashMap<ObjectKey, TransformSnapshot>,
    components: HashMap<(ObjectKey, ComponentKey), ComponentSnapshot>,
}

impl SnapshotRegistry {
    pub fn capture_all<H: SceneHost + ?Sized>(host: &H) -> Self {
        let mut registry = Self::default();
        registry.recapture(host);
        registry
    }

    /// Drops every baseline and captures every object of every loaded scene again.
    pub fn recapture<H: SceneHost + ?Sized>(&mut self, host: &H) {
        self.transforms.clear();
        self.components.clear();
        let scenes = host.loaded_scenes();
        for scene in &scenes {
            let mut pending = host.root_objects(scene);
            while let Some(object) = pending.pop() {
                self.capture_object(host, object);
                pending.extend(host.children(object));
            }
        }
        info!(
            scene_count = scenes.len(),
            transform_count = self.transforms.len(),
            component_count = self.components.len(),
            "baseline_captured"
        );
    }

    fn capture_object<H: SceneHost + ?Sized>(&mut self, host: &H, object: ObjectId) {
        let Some(key) = identity::object_key(host, object) else {
            return;
        };
        if let Some(snapshot) = TransformSnapshot::capture(host, object) {
            self.transforms.insert(key.clone(), snapshot);
        }
        for component in host.components(object) {
            let Some(component_key) = identity::component_key(host, component) else {
                continue;
            };
            if let Some(snapshot) = ComponentSnapshot::capture(host, component) {
                self.components
                    .insert((key.clone(), component_key), snapshot);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty() && self.components.is_empty()
    }

    pub fn transform_count(&self) -> usize {
        self.transforms.len()
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn transform_snapshot(&self, key: &ObjectKey) -> Option<&TransformSnapshot> {
        self.transforms.get(key)
    }

    pub fn component_snapshot(
        &self,
        key: &ObjectKey,
        component_key: &ComponentKey,
    ) -> Option<&ComponentSnapshot> {
        self.components.get(&(key.clone(), component_key.clone()))
    }

    /// Replaces the baseline, returning the previous one.
    pub fn set_transform_baseline(
        &mut self,
        key: ObjectKey,
        snapshot: TransformSnapshot,
    ) -> Option<TransformSnapshot> {
        self.transforms.insert(key, snapshot)
    }

    pub fn set_component_baseline(
        &mut self,
        key: ObjectKey,
        component_key: ComponentKey,
        snapshot: ComponentSnapshot,
    ) -> Option<ComponentSnapshot> {
        self.components.insert((key, component_key), snapshot)
    }

    /// Transform first, then components in attachment order. Targets without a baseline never
    /// count as changed.
    pub fn changed_components<H: SceneHost + ?Sized>(
        &self,
        host: &H,
        object: ObjectId,
    ) -> Vec<DiffTarget> {
        let Some(key) = identity::object_key(host, object) else {
            return Vec::new();
        };
        let mut changed = Vec::new();

        if let (Some(baseline), Some(live)) = (self.transforms.get(&key), host.transform(object)) {
            if !baseline.approx_eq(&live) {
                changed.push(DiffTarget::Transform(object));
            }
        }

        for component in host.components(object) {
            if self.component_changed(host, &key, component) {
                changed.push(DiffTarget::Component(component));
            }
        }
        changed
    }

    fn component_changed<H: SceneHost + ?Sized>(
        &self,
        host: &H,
        key: &ObjectKey,
        component: ComponentId,
    ) -> bool {
        let Some(component_key) = identity::component_key(host, component) else {
            return false;
        };
        let Some(baseline) = self.component_snapshot(key, &component_key) else {
            return false;
        };
        baseline.fields().iter().any(|(path, before)| {
            match host.read_field(component, path) {
                Ok(live) => !codec::values_equal(before, &live),
                Err(_) => false,
            }
        })
    }

    /// Re-captures the object's transform as its baseline. Returns `false` if the object is gone.
    pub fn reset_transform_baseline<H: SceneHost + ?Sized>(
        &mut self,
        host: &H,
        object: ObjectId,
    ) -> bool {
        let (Some(key), Some(snapshot)) = (
            identity::object_key(host, object),
            TransformSnapshot::capture(host, object),
        ) else {
            return false;
        };
        debug!(object = %key, "transform_baseline_reset");
        self.transforms.insert(key, snapshot);
        true
    }

    pub fn reset_component_baseline<H: SceneHost + ?Sized>(
        &mut self,
        host: &H,
        component: ComponentId,
    ) -> bool {
        let Some(owner) = host.component_owner(component) else {
            return false;
        };
        let (Some(key), Some(component_key), Some(snapshot)) = (
            identity::object_key(host, owner),
            identity::component_key(host, component),
            ComponentSnapshot::capture(host, component),
        ) else {
            return false;
        };
        debug!(object = %key, component = %component_key, "component_baseline_reset");
        self.components.insert((key, component_key), snapshot);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{FieldKind, FieldValue, Vec3};
    use crate::host::{ComponentDocument, FieldAccess, MemoryHost, ObjectDocument, SceneDocument};

    const SCENE: &str = "Assets/Scenes/Test.unity";

    fn host() -> MemoryHost {
        MemoryHost::from_documents(vec![SceneDocument {
            path: SCENE.to_string(),
            objects: vec![ObjectDocument::new("Root").with_child(
                ObjectDocument::new("Child")
                    .with_component(
                        ComponentDocument::new("Mover")
                            .with_field("speed", FieldKind::Float, "1")
                            .with_field("mode", FieldKind::Enum, "2"),
                    )
                    .with_component(
                        ComponentDocument::new("Tag").with_field("label", FieldKind::String, "a"),
                    ),
            )],
        }])
    }

    #[test]
    fn capture_walks_every_descendant() {
        let host = host();
        let registry = SnapshotRegistry::capture_all(&host);
        assert_eq!(registry.transform_count(), 2);
        assert_eq!(registry.component_count(), 2);
    }

    #[test]
    fn capturing_twice_reports_no_changes() {
        let host = host();
        let mut registry = SnapshotRegistry::capture_all(&host);
        registry.recapture(&host);
        for path in ["Root", "Root/Child"] {
            let object = host.object_at(SCENE, path).expect("object");
            assert!(registry.changed_components(&host, object).is_empty());
        }
    }

    #[test]
    fn transform_is_listed_before_components() {
        let mut host = host();
        let registry = SnapshotRegistry::capture_all(&host);
        let child = host.object_at(SCENE, "Root/Child").expect("child");
        let tag = host.component_of_type(child, "Tag").expect("tag");
        let mover = host.component_of_type(child, "Mover").expect("mover");

        host.write_field(tag, "label", &FieldValue::String("b".to_string()))
            .expect("write");
        host.transform_mut(child).expect("transform").position = Vec3::new(1.0, 0.0, 0.0);
        host.write_field(mover, "mode", &FieldValue::Enum(3))
            .expect("write");

        assert_eq!(
            registry.changed_components(&host, child),
            vec![
                DiffTarget::Transform(child),
                DiffTarget::Component(mover),
                DiffTarget::Component(tag)
            ]
        );
    }

    #[test]
    fn epsilon_boundary_on_component_floats() {
        let mut host = host();
        let registry = SnapshotRegistry::capture_all(&host);
        let child = host.object_at(SCENE, "Root/Child").expect("child");
        let mover = host.component_of_type(child, "Mover").expect("mover");

        host.write_field(mover, "speed", &FieldValue::Float(1.00005))
            .expect("write");
        assert!(registry.changed_components(&host, child).is_empty());

        host.write_field(mover, "speed", &FieldValue::Float(1.0002))
            .expect("write");
        assert_eq!(
            registry.changed_components(&host, child),
            vec![DiffTarget::Component(mover)]
        );
    }

    #[test]
    fn components_added_after_capture_are_skipped() {
        let mut host = host();
        let registry = SnapshotRegistry::capture_all(&host);
        let child = host.object_at(SCENE, "Root/Child").expect("child");
        host.add_component(
            child,
            &ComponentDocument::new("Extra").with_field("on", FieldKind::Boolean, "true"),
        )
        .expect("added");

        assert!(registry.changed_components(&host, child).is_empty());
    }

    #[test]
    fn reset_baseline_clears_the_change() {
        let mut host = host();
        let mut registry = SnapshotRegistry::capture_all(&host);
        let child = host.object_at(SCENE, "Root/Child").expect("child");
        let mover = host.component_of_type(child, "Mover").expect("mover");
        host.transform_mut(child).expect("transform").scale = Vec3::new(2.0, 2.0, 2.0);
        host.write_field(mover, "speed", &FieldValue::Float(5.0))
            .expect("write");

        assert!(registry.reset_transform_baseline(&host, child));
        assert!(registry.reset_component_baseline(&host, mover));

        assert!(registry.changed_components(&host, child).is_empty());
    }
}
