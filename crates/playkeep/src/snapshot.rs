use tracing::trace;

use crate::codec::{self, FieldValue};
use crate::host::{ComponentId, ObjectId, SceneHost};
use crate::transform::{TransformField, TransformState};

/// Transform values read from the host at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformSnapshot {
    state: TransformState,
}

impl TransformSnapshot {
    pub fn new(state: TransformState) -> Self {
        Self { state }
    }

    pub fn capture<H: SceneHost + ?Sized>(host: &H, object: ObjectId) -> Option<Self> {
        host.transform(object).map(Self::new)
    }

    pub fn state(&self) -> &TransformState {
        &self.state
    }

    pub fn is_layout_element(&self) -> bool {
        self.state.is_layout_element()
    }

    /// Epsilon comparison over every field either side carries.
    pub fn approx_eq(&self, other: &TransformState) -> bool {
        if self.state.is_layout_element() != other.is_layout_element() {
            return false;
        }
        self.state.field_set().into_iter().all(|field| {
            match (self.state.field(field), other.field(field)) {
                (Some(a), Some(b)) => codec::values_equal(&a, &b),
                (None, None) => true,
                _ => false,
            }
        })
    }
}

/// Field values of one component, in the host's field order.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentSnapshot {
    type_name: String,
    fields: Vec<(String, FieldValue)>,
}

impl ComponentSnapshot {
    pub fn new(type_name: impl Into<String>, fields: Vec<(String, FieldValue)>) -> Self {
        Self {
            type_name: type_name.into(),
            fields,
        }
    }

    /// Skips the type-reference field, fields of unsupported kinds and fields whose read fails.
    pub fn capture<H: SceneHost + ?Sized>(host: &H, component: ComponentId) -> Option<Self> {
        let type_name = host.component_type(component)?;
        let mut fields = Vec::new();
        for descriptor in host.fields(component) {
            if descriptor.type_reference || descriptor.kind.is_none() {
                continue;
            }
            match host.read_field(component, &descriptor.path) {
                Ok(value) => fields.push((descriptor.path, value)),
                Err(error) => {
                    trace!(field = %descriptor.path, error = %error, "snapshot_field_skipped");
                }
            }
        }
        Some(Self::new(type_name, fields))
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    pub fn get(&self, path: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field_path, _)| field_path == path)
            .map(|(_, value)| value)
    }

    pub fn paths(&self) -> Vec<String> {
        self.fields.iter().map(|(path, _)| path.clone()).collect()
    }

    /// Paths present in both snapshots whose values differ beyond epsilon. Fields that only one
    /// side has are ignored.
    pub fn changed_paths(&self, current: &ComponentSnapshot) -> Vec<String> {
        self.fields
            .iter()
            .filter_map(|(path, before)| {
                let after = current.get(path)?;
                (!codec::values_equal(before, after)).then(|| path.clone())
            })
            .collect()
    }
}

/// Transform fields whose values differ at all between the two snapshots.
///
/// Unlike component diffing this is an exact comparison.
pub fn changed_properties(
    original: &TransformSnapshot,
    current: &TransformSnapshot,
) -> Vec<TransformField> {
    let mut fields = original.state().field_set();
    for field in current.state().field_set() {
        if !fields.contains(&field) {
            fields.push(field);
        }
    }
    fields
        .into_iter()
        .filter(|field| original.state().field(*field) != current.state().field(*field))
        .collect()
}
