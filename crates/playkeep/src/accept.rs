//! Accepting live values as overrides, and undoing them.

use thiserror::Error;
use tracing::{debug, info};

use crate::codec;
use crate::host::{ComponentId, ObjectId, SceneHost};
use crate::identity::{self, DiffTarget, ObjectLocation};
use crate::registry::SnapshotRegistry;
use crate::snapshot::{changed_properties, ComponentSnapshot, TransformSnapshot};
use crate::store::{
    ComponentDiffRecord, ComponentRecordKey, DiffStore, DiffStores, SerializedFields, StoreError,
    TransformDiffRecord, TransformRecordKey,
};
use crate::transform::merge_fields;

#[derive(Debug, Error)]
pub enum AcceptError {
    #[error("{0:?} does not resolve to a live object or component")]
    TargetNotFound(DiffTarget),
    #[error("no diff record stored for {0}")]
    NoRecord(String),
    #[error("diff record for {0} holds no original values")]
    NoOriginal(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn transform_record_key(location: &ObjectLocation) -> TransformRecordKey {
    TransformRecordKey {
        scene_path: location.scene_path.clone(),
        object_path: location.object_path.clone(),
    }
}

struct ComponentTarget {
    object: ObjectId,
    location: ObjectLocation,
    record_key: ComponentRecordKey,
}

fn component_target<H: SceneHost + ?Sized>(
    host: &H,
    component: ComponentId,
) -> Result<ComponentTarget, AcceptError> {
    let not_found = || AcceptError::TargetNotFound(DiffTarget::Component(component));
    let object = host.component_owner(component).ok_or_else(not_found)?;
    let location = identity::locate(host, object).ok_or_else(not_found)?;
    let component_key = identity::component_key(host, component).ok_or_else(not_found)?;
    let record_key = ComponentRecordKey {
        scene_path: location.scene_path.clone(),
        object_path: location.object_path.clone(),
        component_type: component_key.type_name,
        component_ordinal: component_key.ordinal,
    };
    Ok(ComponentTarget {
        object,
        location,
        record_key,
    })
}

/// Stores the object's live transform as an accepted override and advances its baseline.
///
/// The original values are taken from the baseline the first time a baseline is available and
/// are kept untouched by every later accept of the same object. The baseline only moves once the
/// record is persisted, so a failed write leaves the object showing as changed.
pub fn accept_transform<H: SceneHost + ?Sized>(
    host: &H,
    registry: Option<&mut SnapshotRegistry>,
    store: &mut DiffStore<TransformDiffRecord>,
    object: ObjectId,
) -> Result<TransformDiffRecord, AcceptError> {
    let not_found = || AcceptError::TargetNotFound(DiffTarget::Transform(object));
    let location = identity::locate(host, object).ok_or_else(not_found)?;
    let key = identity::object_key(host, object).ok_or_else(not_found)?;
    let fresh = TransformSnapshot::capture(host, object).ok_or_else(not_found)?;

    let baseline = registry
        .as_deref()
        .and_then(|registry| registry.transform_snapshot(&key))
        .cloned();

    let modified = match &baseline {
        Some(baseline) => changed_properties(baseline, &fresh),
        None => fresh.state().field_set(),
    };

    let record_key = transform_record_key(&location);
    let existing = store.find(&record_key);
    let modified_field_names = match existing {
        Some(existing) => merge_fields(&existing.modified_field_names, &modified),
        None => merge_fields(&[], &modified),
    };
    let original_values = existing
        .and_then(|existing| existing.original_values)
        .or_else(|| baseline.as_ref().map(|baseline| *baseline.state()));

    let record = TransformDiffRecord {
        scene_path: location.scene_path,
        object_path: location.object_path,
        object_id: location.handle,
        is_layout_element: fresh.is_layout_element(),
        current_values: *fresh.state(),
        modified_field_names,
        original_values,
    };
    store.upsert(record.clone())?;
    if let Some(registry) = registry {
        registry.set_transform_baseline(key, fresh);
    }
    info!(
        record = %record_key,
        modified = ?record.modified_field_names,
        has_original = record.has_original(),
        "transform_changes_accepted"
    );
    Ok(record)
}

/// Component counterpart of [`accept_transform`]: `current` accumulates every accepted field,
/// `original` keeps the whole pre-override field set.
pub fn accept_component<H: SceneHost + ?Sized>(
    host: &H,
    registry: Option<&mut SnapshotRegistry>,
    store: &mut DiffStore<ComponentDiffRecord>,
    component: ComponentId,
) -> Result<ComponentDiffRecord, AcceptError> {
    let target = component_target(host, component)?;
    let fresh = ComponentSnapshot::capture(host, component)
        .ok_or(AcceptError::TargetNotFound(DiffTarget::Component(component)))?;
    let object_key = identity::object_key(host, target.object)
        .ok_or(AcceptError::TargetNotFound(DiffTarget::Component(component)))?;
    let component_key = identity::ComponentKey {
        type_name: target.record_key.component_type.clone(),
        ordinal: target.record_key.component_ordinal,
    };

    let baseline = registry
        .as_deref()
        .and_then(|registry| registry.component_snapshot(&object_key, &component_key))
        .cloned();

    let modified = match &baseline {
        Some(baseline) => baseline.changed_paths(&fresh),
        None => fresh.paths(),
    };

    let existing = store.find(&target.record_key);
    let mut paths = existing
        .map(|existing| existing.current.field_paths.clone())
        .unwrap_or_default();
    for path in modified {
        if !paths.contains(&path) {
            paths.push(path);
        }
    }

    let mut current = SerializedFields::default();
    for path in &paths {
        let value = fresh
            .get(path)
            .cloned()
            .or_else(|| existing.and_then(|existing| existing.current.decode(path)));
        if let Some(value) = value {
            current.push(path, &value);
        }
    }

    let original = existing
        .and_then(|existing| existing.original.clone())
        .or_else(|| {
            baseline.as_ref().map(|baseline| {
                SerializedFields::from_values(
                    baseline
                        .fields()
                        .iter()
                        .map(|(path, value)| (path.as_str(), value)),
                )
            })
        });

    let record = ComponentDiffRecord {
        scene_path: target.location.scene_path,
        object_path: target.location.object_path,
        object_id: target.location.handle,
        component_type: target.record_key.component_type.clone(),
        component_ordinal: target.record_key.component_ordinal,
        current,
        original,
    };
    store.upsert(record.clone())?;
    if let Some(registry) = registry {
        registry.set_component_baseline(object_key, component_key, fresh);
    }
    info!(
        record = %target.record_key,
        field_count = record.current.len(),
        has_original = record.has_original(),
        "component_changes_accepted"
    );
    Ok(record)
}

/// Writes the stored originals back onto the live target and deletes the record. The registry,
/// when given, is re-baselined so the target stops showing as changed.
pub fn revert_to_original<H: SceneHost + ?Sized>(
    host: &mut H,
    registry: Option<&mut SnapshotRegistry>,
    stores: &mut DiffStores,
    target: DiffTarget,
) -> Result<(), AcceptError> {
    match target {
        DiffTarget::Transform(object) => {
            let location =
                identity::locate(&*host, object).ok_or(AcceptError::TargetNotFound(target))?;
            let record_key = transform_record_key(&location);
            let record = stores
                .transforms
                .find(&record_key)
                .ok_or_else(|| AcceptError::NoRecord(record_key.to_string()))?;
            let original = record
                .original_values
                .ok_or_else(|| AcceptError::NoOriginal(record_key.to_string()))?;
            host.set_transform(object, &original);
            mark_persistent_edit(host, &location.scene_path);
            stores.transforms.remove(&record_key)?;
            if let Some(registry) = registry {
                registry.reset_transform_baseline(&*host, object);
            }
            info!(record = %record_key, "transform_reverted_to_original");
        }
        DiffTarget::Component(component) => {
            let resolved = component_target(&*host, component)?;
            let record = stores
                .components
                .find(&resolved.record_key)
                .ok_or_else(|| AcceptError::NoRecord(resolved.record_key.to_string()))?;
            let original = record
                .original
                .clone()
                .ok_or_else(|| AcceptError::NoOriginal(resolved.record_key.to_string()))?;
            write_fields(host, component, &original);
            mark_persistent_edit(host, &resolved.location.scene_path);
            stores.components.remove(&resolved.record_key)?;
            if let Some(registry) = registry {
                registry.reset_component_baseline(&*host, component);
            }
            info!(record = %resolved.record_key, "component_reverted_to_original");
        }
    }
    Ok(())
}

/// Writes the last accepted values back onto the live target. The record is left as it is.
pub fn revert_to_saved<H: SceneHost + ?Sized>(
    host: &mut H,
    stores: &DiffStores,
    target: DiffTarget,
) -> Result<(), AcceptError> {
    match target {
        DiffTarget::Transform(object) => {
            let location =
                identity::locate(&*host, object).ok_or(AcceptError::TargetNotFound(target))?;
            let record_key = transform_record_key(&location);
            let record = stores
                .transforms
                .find(&record_key)
                .ok_or_else(|| AcceptError::NoRecord(record_key.to_string()))?;
            host.set_transform(object, &record.current_values);
            mark_persistent_edit(host, &location.scene_path);
            info!(record = %record_key, "transform_reverted_to_saved");
        }
        DiffTarget::Component(component) => {
            let resolved = component_target(&*host, component)?;
            let record = stores
                .components
                .find(&resolved.record_key)
                .ok_or_else(|| AcceptError::NoRecord(resolved.record_key.to_string()))?;
            let current = record.current.clone();
            write_fields(host, component, &current);
            mark_persistent_edit(host, &resolved.location.scene_path);
            info!(record = %resolved.record_key, "component_reverted_to_saved");
        }
    }
    Ok(())
}

/// True when nothing is stored for the target yet, or the live values drifted from the stored
/// ones.
pub fn has_unsaved_changes<H: SceneHost + ?Sized>(
    host: &H,
    stores: &DiffStores,
    target: DiffTarget,
) -> bool {
    match target {
        DiffTarget::Transform(object) => {
            let (Some(location), Some(live)) = (identity::locate(host, object), host.transform(object))
            else {
                return false;
            };
            match stores.transforms.find(&transform_record_key(&location)) {
                Some(record) => !TransformSnapshot::new(record.current_values).approx_eq(&live),
                None => true,
            }
        }
        DiffTarget::Component(component) => {
            let Ok(resolved) = component_target(host, component) else {
                return false;
            };
            let Some(record) = stores.components.find(&resolved.record_key) else {
                return true;
            };
            record
                .current
                .decoded()
                .any(|(path, stored)| match host.read_field(component, path) {
                    Ok(live) => !codec::values_equal(&stored, &live),
                    Err(_) => false,
                })
        }
    }
}

/// Outside the live session a revert edits the persistent scene, which then needs saving.
fn mark_persistent_edit<H: SceneHost + ?Sized>(host: &mut H, scene_path: &str) {
    if !host.is_live() {
        host.mark_scene_dirty(scene_path);
    }
}

/// Applies each stored field; individual failures are unsupported fields and are skipped.
/// Returns how many fields were written.
pub(crate) fn write_fields<H: SceneHost + ?Sized>(
    host: &mut H,
    component: ComponentId,
    fields: &SerializedFields,
) -> usize {
    let mut written = 0;
    for (path, value) in fields.decoded() {
        match host.write_field(component, path, &value) {
            Ok(()) => written += 1,
            Err(error) => debug!(field = path, error = %error, "field_write_skipped"),
        }
    }
    written
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::codec::{Color, FieldKind, FieldValue, Vec3};
    use crate::host::{
        ComponentDocument, FieldAccess, MemoryHost, ObjectDocument, SceneDocument,
    };
    use crate::transform::TransformField;

    const SCENE: &str = "Assets/Scenes/Test.unity";

    struct Fixture {
        host: MemoryHost,
        registry: SnapshotRegistry,
        stores: DiffStores,
        child: ObjectId,
        mover: ComponentId,
    }

    fn fixture() -> Fixture {
        let mut host = MemoryHost::from_documents(vec![SceneDocument {
            path: SCENE.to_string(),
            objects: vec![ObjectDocument::new("Root").with_child(
                ObjectDocument::new("Child").with_component(
                    ComponentDocument::new("Mover")
                        .with_field("speed", FieldKind::Float, "1")
                        .with_field("label", FieldKind::String, "start")
                        .with_field("tint", FieldKind::Color, "#FFFFFFFF"),
                ),
            )],
        }]);
        host.enter_live();
        let registry = SnapshotRegistry::capture_all(&host);
        let child = host.object_at(SCENE, "Root/Child").expect("child");
        let mover = host.component_of_type(child, "Mover").expect("mover");
        Fixture {
            host,
            registry,
            stores: DiffStores::in_memory(),
            child,
            mover,
        }
    }

    fn move_to(fixture: &mut Fixture, x: f32) {
        fixture
            .host
            .transform_mut(fixture.child)
            .expect("transform")
            .position = Vec3::new(x, 0.0, 0.0);
    }

    fn accept(fixture: &mut Fixture) -> TransformDiffRecord {
        accept_transform(
            &fixture.host,
            Some(&mut fixture.registry),
            &mut fixture.stores.transforms,
            fixture.child,
        )
        .expect("accept")
    }

    #[test]
    fn first_accept_records_original_and_modified_fields() {
        let mut fx = fixture();
        move_to(&mut fx, 1.0);

        let record = accept(&mut fx);

        assert_eq!(record.scene_path, SCENE);
        assert_eq!(record.object_path, "Root/Child");
        assert_eq!(record.current_values.position, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(record.modified_field_names, vec![TransformField::Position]);
        assert!(record.has_original());
        assert_eq!(record.original_values.expect("original").position, Vec3::ZERO);
        assert!(fx.registry.changed_components(&fx.host, fx.child).is_empty());
    }

    #[test]
    fn original_is_written_only_once() {
        let mut fx = fixture();
        move_to(&mut fx, 1.0);
        accept(&mut fx);
        move_to(&mut fx, 2.0);
        fx.host.transform_mut(fx.child).expect("transform").scale = Vec3::new(3.0, 3.0, 3.0);

        let record = accept(&mut fx);

        assert_eq!(record.current_values.position, Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(record.original_values.expect("original").position, Vec3::ZERO);
        assert_eq!(
            record.modified_field_names,
            vec![TransformField::Position, TransformField::Scale]
        );
        assert_eq!(fx.stores.transforms.len(), 1);
    }

    #[test]
    fn accept_without_baseline_uses_default_field_set() {
        let mut fx = fixture();
        let record = accept_transform(&fx.host, None, &mut fx.stores.transforms, fx.child)
            .expect("accept");
        assert_eq!(record.modified_field_names, TransformField::CORE.to_vec());
        assert!(!record.has_original());
    }

    #[test]
    fn revert_to_original_restores_and_deletes() {
        let mut fx = fixture();
        move_to(&mut fx, 1.0);
        accept(&mut fx);

        revert_to_original(
            &mut fx.host,
            Some(&mut fx.registry),
            &mut fx.stores,
            DiffTarget::Transform(fx.child),
        )
        .expect("revert");

        assert_eq!(fx.host.transform(fx.child).expect("transform").position, Vec3::ZERO);
        assert!(fx.stores.transforms.is_empty());
        assert!(fx.registry.changed_components(&fx.host, fx.child).is_empty());
    }

    #[test]
    fn revert_to_original_requires_an_original() {
        let mut fx = fixture();
        accept_transform(&fx.host, None, &mut fx.stores.transforms, fx.child).expect("accept");

        let error = revert_to_original(
            &mut fx.host,
            Some(&mut fx.registry),
            &mut fx.stores,
            DiffTarget::Transform(fx.child),
        )
        .expect_err("no original");
        assert!(matches!(error, AcceptError::NoOriginal(_)));
        assert_eq!(fx.stores.transforms.len(), 1);
    }

    #[test]
    fn revert_to_saved_restores_accepted_values_and_keeps_record() {
        let mut fx = fixture();
        move_to(&mut fx, 1.0);
        let accepted = accept(&mut fx);
        move_to(&mut fx, 2.0);
        assert!(has_unsaved_changes(&fx.host, &fx.stores, DiffTarget::Transform(fx.child)));

        revert_to_saved(&mut fx.host, &fx.stores, DiffTarget::Transform(fx.child))
            .expect("revert");

        assert_eq!(
            fx.host.transform(fx.child).expect("transform").position,
            Vec3::new(1.0, 0.0, 0.0)
        );
        assert_eq!(fx.stores.transforms.records(), &[accepted]);
        assert!(!has_unsaved_changes(&fx.host, &fx.stores, DiffTarget::Transform(fx.child)));
    }

    #[test]
    fn unsaved_when_nothing_is_stored() {
        let fx = fixture();
        assert!(has_unsaved_changes(&fx.host, &fx.stores, DiffTarget::Transform(fx.child)));
        assert!(has_unsaved_changes(&fx.host, &fx.stores, DiffTarget::Component(fx.mover)));
    }

    #[test]
    fn component_accept_accumulates_fields_and_keeps_first_original() {
        let mut fx = fixture();
        fx.host
            .write_field(fx.mover, "speed", &FieldValue::Float(2.0))
            .expect("write");
        let first = accept_component(
            &fx.host,
            Some(&mut fx.registry),
            &mut fx.stores.components,
            fx.mover,
        )
        .expect("accept");
        assert_eq!(first.current.field_paths, vec!["speed"]);

        fx.host
            .write_field(fx.mover, "label", &FieldValue::String("later".to_string()))
            .expect("write");
        let second = accept_component(
            &fx.host,
            Some(&mut fx.registry),
            &mut fx.stores.components,
            fx.mover,
        )
        .expect("accept");

        assert_eq!(second.current.field_paths, vec!["speed", "label"]);
        assert_eq!(second.current.decode("speed"), Some(FieldValue::Float(2.0)));
        let original = second.original.expect("original");
        assert_eq!(original.decode("speed"), Some(FieldValue::Float(1.0)));
        assert_eq!(
            original.decode("label"),
            Some(FieldValue::String("start".to_string()))
        );
    }

    #[test]
    fn component_revert_to_original_round_trip() {
        let mut fx = fixture();
        fx.host
            .write_field(fx.mover, "speed", &FieldValue::Float(9.0))
            .expect("write");
        accept_component(
            &fx.host,
            Some(&mut fx.registry),
            &mut fx.stores.components,
            fx.mover,
        )
        .expect("accept");

        revert_to_original(
            &mut fx.host,
            Some(&mut fx.registry),
            &mut fx.stores,
            DiffTarget::Component(fx.mover),
        )
        .expect("revert");

        assert_eq!(
            fx.host.read_field(fx.mover, "speed").expect("read"),
            FieldValue::Float(1.0)
        );
        assert!(fx.stores.components.is_empty());
        assert!(fx.registry.changed_components(&fx.host, fx.child).is_empty());
    }

    #[test]
    fn component_revert_to_saved_leaves_original_alone() {
        let mut fx = fixture();
        fx.host
            .write_field(fx.mover, "speed", &FieldValue::Float(2.0))
            .expect("write");
        let accepted = accept_component(
            &fx.host,
            Some(&mut fx.registry),
            &mut fx.stores.components,
            fx.mover,
        )
        .expect("accept");
        fx.host
            .write_field(fx.mover, "speed", &FieldValue::Float(3.0))
            .expect("write");
        assert!(has_unsaved_changes(&fx.host, &fx.stores, DiffTarget::Component(fx.mover)));

        revert_to_saved(&mut fx.host, &fx.stores, DiffTarget::Component(fx.mover))
            .expect("revert");

        assert_eq!(
            fx.host.read_field(fx.mover, "speed").expect("read"),
            FieldValue::Float(2.0)
        );
        assert_eq!(fx.stores.components.records(), &[accepted]);
        assert!(!has_unsaved_changes(&fx.host, &fx.stores, DiffTarget::Component(fx.mover)));
    }

    #[test]
    fn accepted_color_off_the_hex_grid_is_not_unsaved() {
        let mut fx = fixture();
        fx.host
            .write_field(fx.mover, "tint", &FieldValue::Color(Color::new(0.3, 0.6, 0.9, 1.0)))
            .expect("write");
        accept_component(
            &fx.host,
            Some(&mut fx.registry),
            &mut fx.stores.components,
            fx.mover,
        )
        .expect("accept");

        assert!(!has_unsaved_changes(&fx.host, &fx.stores, DiffTarget::Component(fx.mover)));
        assert!(fx.registry.changed_components(&fx.host, fx.child).is_empty());
    }

    #[test]
    fn failed_persist_keeps_the_target_changed() {
        let temp = TempDir::new().expect("temp");
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, "not a directory").expect("blocker");
        let mut fx = fixture();
        fx.stores = DiffStores::open(
            &blocker.join("transform_diffs.json"),
            &blocker.join("component_diffs.json"),
        )
        .expect("open");
        move_to(&mut fx, 1.0);
        fx.host
            .write_field(fx.mover, "speed", &FieldValue::Float(4.0))
            .expect("write");

        let error = accept_transform(
            &fx.host,
            Some(&mut fx.registry),
            &mut fx.stores.transforms,
            fx.child,
        )
        .expect_err("store cannot be written");
        assert!(matches!(error, AcceptError::Store(_)));
        let error = accept_component(
            &fx.host,
            Some(&mut fx.registry),
            &mut fx.stores.components,
            fx.mover,
        )
        .expect_err("store cannot be written");
        assert!(matches!(error, AcceptError::Store(_)));

        assert!(fx.stores.is_empty());
        assert_eq!(
            fx.registry.changed_components(&fx.host, fx.child),
            vec![DiffTarget::Transform(fx.child), DiffTarget::Component(fx.mover)]
        );
    }
}
