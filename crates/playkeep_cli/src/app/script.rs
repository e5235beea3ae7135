use std::fs;
use std::path::Path;

use playkeep::{FieldKind, Quat, SceneDocument, Vec3};
use serde::de::DeserializeOwned;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ScriptDocument {
    pub(crate) steps: Vec<Step>,
}

/// An object addressed by scene and hierarchy path, optionally narrowed to one component.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TargetRef {
    pub(crate) scene: String,
    pub(crate) object: String,
    #[serde(default)]
    pub(crate) component: Option<String>,
    #[serde(default)]
    pub(crate) ordinal: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub(crate) enum Step {
    EnterPlay,
    ExitPlay {
        /// Ticks the host spends reloading before edit mode settles.
        #[serde(default)]
        reload_ticks: u32,
    },
    Tick {
        #[serde(default = "default_tick_count")]
        count: u32,
    },
    SetTransform {
        target: TargetRef,
        #[serde(default)]
        position: Option<Vec3>,
        #[serde(default)]
        rotation: Option<Quat>,
        #[serde(default)]
        scale: Option<Vec3>,
    },
    SetField {
        target: TargetRef,
        field: String,
        kind: FieldKind,
        value: String,
    },
    AcceptTransform {
        target: TargetRef,
    },
    AcceptComponent {
        target: TargetRef,
    },
    RevertToOriginal {
        target: TargetRef,
    },
    RevertToSaved {
        target: TargetRef,
    },
    Report,
}

impl Step {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Step::EnterPlay => "enter_play",
            Step::ExitPlay { .. } => "exit_play",
            Step::Tick { .. } => "tick",
            Step::SetTransform { .. } => "set_transform",
            Step::SetField { .. } => "set_field",
            Step::AcceptTransform { .. } => "accept_transform",
            Step::AcceptComponent { .. } => "accept_component",
            Step::RevertToOriginal { .. } => "revert_to_original",
            Step::RevertToSaved { .. } => "revert_to_saved",
            Step::Report => "report",
        }
    }
}

fn default_tick_count() -> u32 {
    1
}

pub(crate) fn load_scenes(path: &Path) -> Result<Vec<SceneDocument>, String> {
    load_json(path, "scene")
}

pub(crate) fn load_script(path: &Path) -> Result<ScriptDocument, String> {
    load_json(path, "script")
}

fn load_json<T: DeserializeOwned>(path: &Path, label: &str) -> Result<T, String> {
    let raw = fs::read_to_string(path)
        .map_err(|error| format!("read {label} {}: {error}", path.display()))?;
    parse_json(&raw, label)
}

pub(crate) fn parse_json<T: DeserializeOwned>(raw: &str, label: &str) -> Result<T, String> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    match serde_path_to_error::deserialize::<_, T>(&mut deserializer) {
        Ok(value) => Ok(value),
        Err(error) => {
            let path = error.path().to_string();
            let source = error.into_inner();
            if path.is_empty() || path == "." {
                Err(format!("parse {label} json: {source}"))
            } else {
                Err(format!("parse {label} json at {path}: {source}"))
            }
        }
    }
}
