use serde::{Deserialize, Serialize};

use crate::codec::{FieldValue, Quat, Vec2, Vec3};

/// Extra spatial fields carried by objects that take part in the 2D anchor layout system.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutRect {
    pub anchored_position: Vec2,
    #[serde(rename = "anchoredPosition3D")]
    pub anchored_position_3d: Vec3,
    pub anchor_min: Vec2,
    pub anchor_max: Vec2,
    pub pivot: Vec2,
    pub size_delta: Vec2,
    pub offset_min: Vec2,
    pub offset_max: Vec2,
}

/// Local-space transform of a scene object as the host exposes it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformState {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<LayoutRect>,
}

impl Default for TransformState {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            layout: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransformField {
    #[serde(rename = "position")]
    Position,
    #[serde(rename = "rotation")]
    Rotation,
    #[serde(rename = "scale")]
    Scale,
    #[serde(rename = "anchoredPosition")]
    AnchoredPosition,
    #[serde(rename = "anchoredPosition3D")]
    AnchoredPosition3D,
    #[serde(rename = "anchorMin")]
    AnchorMin,
    #[serde(rename = "anchorMax")]
    AnchorMax,
    #[serde(rename = "pivot")]
    Pivot,
    #[serde(rename = "sizeDelta")]
    SizeDelta,
    #[serde(rename = "offsetMin")]
    OffsetMin,
    #[serde(rename = "offsetMax")]
    OffsetMax,
}

impl TransformField {
    pub const CORE: [TransformField; 3] = [
        TransformField::Position,
        TransformField::Rotation,
        TransformField::Scale,
    ];
    pub const LAYOUT: [TransformField; 8] = [
        TransformField::AnchoredPosition,
        TransformField::AnchoredPosition3D,
        TransformField::AnchorMin,
        TransformField::AnchorMax,
        TransformField::Pivot,
        TransformField::SizeDelta,
        TransformField::OffsetMin,
        TransformField::OffsetMax,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TransformField::Position => "position",
            TransformField::Rotation => "rotation",
            TransformField::Scale => "scale",
            TransformField::AnchoredPosition => "anchoredPosition",
            TransformField::AnchoredPosition3D => "anchoredPosition3D",
            TransformField::AnchorMin => "anchorMin",
            TransformField::AnchorMax => "anchorMax",
            TransformField::Pivot => "pivot",
            TransformField::SizeDelta => "sizeDelta",
            TransformField::OffsetMin => "offsetMin",
            TransformField::OffsetMax => "offsetMax",
        }
    }

    pub fn is_layout(self) -> bool {
        !Self::CORE.contains(&self)
    }

    fn canonical_index(self) -> usize {
        Self::CORE
            .iter()
            .chain(Self::LAYOUT.iter())
            .position(|field| *field == self)
            .unwrap_or(usize::MAX)
    }
}

impl TransformState {
    pub fn is_layout_element(&self) -> bool {
        self.layout.is_some()
    }

    /// Every field that applies to this transform, in canonical order.
    pub fn field_set(&self) -> Vec<TransformField> {
        let mut fields = TransformField::CORE.to_vec();
        if self.is_layout_element() {
            fields.extend_from_slice(&TransformField::LAYOUT);
        }
        fields
    }

    /// `None` for layout fields on a transform that is not a layout element.
    pub fn field(&self, field: TransformField) -> Option<FieldValue> {
        let value = match field {
            TransformField::Position => FieldValue::Vector3(self.position),
            TransformField::Rotation => FieldValue::Rotation(self.rotation),
            TransformField::Scale => FieldValue::Vector3(self.scale),
            layout_field => {
                let layout = self.layout.as_ref()?;
                match layout_field {
                    TransformField::AnchoredPosition => FieldValue::Vector2(layout.anchored_position),
                    TransformField::AnchoredPosition3D => {
                        FieldValue::Vector3(layout.anchored_position_3d)
                    }
                    TransformField::AnchorMin => FieldValue::Vector2(layout.anchor_min),
                    TransformField::AnchorMax => FieldValue::Vector2(layout.anchor_max),
                    TransformField::Pivot => FieldValue::Vector2(layout.pivot),
                    TransformField::SizeDelta => FieldValue::Vector2(layout.size_delta),
                    TransformField::OffsetMin => FieldValue::Vector2(layout.offset_min),
                    TransformField::OffsetMax => FieldValue::Vector2(layout.offset_max),
                    TransformField::Position | TransformField::Rotation | TransformField::Scale => {
                        return None
                    }
                }
            }
        };
        Some(value)
    }

    /// Returns `false` when the field does not apply or the value kind does not fit it.
    pub fn set_field(&mut self, field: TransformField, value: &FieldValue) -> bool {
        match (field, value) {
            (TransformField::Position, FieldValue::Vector3(v)) => self.position = *v,
            (TransformField::Rotation, FieldValue::Rotation(q)) => self.rotation = *q,
            (TransformField::Scale, FieldValue::Vector3(v)) => self.scale = *v,
            (layout_field, value) => {
                let Some(layout) = self.layout.as_mut() else {
                    return false;
                };
                match (layout_field, value) {
                    (TransformField::AnchoredPosition, FieldValue::Vector2(v)) => {
                        layout.anchored_position = *v
                    }
                    (TransformField::AnchoredPosition3D, FieldValue::Vector3(v)) => {
                        layout.anchored_position_3d = *v
                    }
                    (TransformField::AnchorMin, FieldValue::Vector2(v)) => layout.anchor_min = *v,
                    (TransformField::AnchorMax, FieldValue::Vector2(v)) => layout.anchor_max = *v,
                    (TransformField::Pivot, FieldValue::Vector2(v)) => layout.pivot = *v,
                    (TransformField::SizeDelta, FieldValue::Vector2(v)) => layout.size_delta = *v,
                    (TransformField::OffsetMin, FieldValue::Vector2(v)) => layout.offset_min = *v,
                    (TransformField::OffsetMax, FieldValue::Vector2(v)) => layout.offset_max = *v,
                    _ => return false,
                }
            }
        }
        true
    }

    /// Copies `fields` from `source`; returns how many were written.
    pub fn apply_fields(&mut self, source: &TransformState, fields: &[TransformField]) -> usize {
        let mut written = 0;
        for field in fields {
            let Some(value) = source.field(*field) else {
                continue;
            };
            if self.set_field(*field, &value) {
                written += 1;
            }
        }
        written
    }
}

/// Union of `existing` and `added`, deduplicated and sorted into canonical field order.
pub fn merge_fields(existing: &[TransformField], added: &[TransformField]) -> Vec<TransformField> {
    let mut merged = existing.to_vec();
    for field in added {
        if !merged.contains(field) {
            merged.push(*field);
        }
    }
    merged.sort_by_key(|field| field.canonical_index());
    merged
}
