//! Writes accepted overrides back onto the persistent scenes once the live session is over.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::accept::write_fields;
use crate::host::SceneHost;
use crate::identity::{self, ComponentKey};
use crate::store::{DiffRecord, DiffStores};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub transforms_applied: usize,
    pub transforms_skipped: usize,
    pub components_applied: usize,
    pub components_skipped: usize,
    /// Individual component fields the host refused to write.
    pub fields_failed: usize,
}

impl ReplayReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Applies every stored record to the host. Records whose target no longer resolves are
/// skipped; nothing here fails as a whole.
pub fn replay<H: SceneHost + ?Sized>(host: &mut H, stores: &DiffStores) -> ReplayReport {
    let mut report = ReplayReport::default();

    for record in stores.transforms.records() {
        if !record.is_consistent() {
            warn!(record = %record.key(), "replay_transform_record_inconsistent");
            report.transforms_skipped += 1;
            continue;
        }
        let Some(object) = identity::resolve_object(
            &*host,
            record.object_id.as_ref(),
            &record.scene_path,
            &record.object_path,
        ) else {
            warn!(record = %record.key(), "replay_transform_target_missing");
            report.transforms_skipped += 1;
            continue;
        };
        let Some(mut live) = host.transform(object) else {
            report.transforms_skipped += 1;
            continue;
        };
        let fields = record.replay_fields();
        let written = live.apply_fields(&record.current_values, &fields);
        host.set_transform(object, &live);
        host.mark_scene_dirty(&record.scene_path);
        debug!(record = %record.key(), field_count = written, "replay_transform_applied");
        report.transforms_applied += 1;
    }

    for record in stores.components.records() {
        if !record.is_consistent() {
            warn!(record = %record.key(), "replay_component_record_inconsistent");
            report.components_skipped += 1;
            continue;
        }
        let key = ComponentKey {
            type_name: record.component_type.clone(),
            ordinal: record.component_ordinal,
        };
        let component = identity::resolve_object(
            &*host,
            record.object_id.as_ref(),
            &record.scene_path,
            &record.object_path,
        )
        .and_then(|object| identity::resolve_component(&*host, object, &key));
        let Some(component) = component else {
            warn!(record = %record.key(), "replay_component_target_missing");
            report.components_skipped += 1;
            continue;
        };
        let written = write_fields(host, component, &record.current);
        report.fields_failed += record.current.len() - written;
        host.mark_scene_dirty(&record.scene_path);
        debug!(record = %record.key(), field_count = written, "replay_component_applied");
        report.components_applied += 1;
    }

    info!(
        transforms_applied = report.transforms_applied,
        transforms_skipped = report.transforms_skipped,
        components_applied = report.components_applied,
        components_skipped = report.components_skipped,
        fields_failed = report.fields_failed,
        "replay_finished"
    );
    report
}
