use std::fs;
use std::path::Path;
use std::process::ExitCode;

use playkeep::{
    codec, AcceptError, ComponentId, DiffTarget, FieldAccess, MemoryHost, ObjectId,
    ReplayReport, SceneHost, SessionController, SessionPhase, TickOutcome,
};
use serde::Serialize;
use tracing::{error, info, warn};

use super::bootstrap::AppWiring;
use super::script::{self, Step, TargetRef};

pub(crate) fn run(app: AppWiring) -> ExitCode {
    match run_script(&app) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "run_failed");
            ExitCode::FAILURE
        }
    }
}

fn run_script(app: &AppWiring) -> Result<(), String> {
    let scenes = script::load_scenes(&app.scene_path)?;
    let script = script::load_script(&app.script_path)?;
    app.config.ensure_store_dir().map_err(|err| err.to_string())?;
    let controller = SessionController::open(app.config.clone()).map_err(|err| err.to_string())?;
    info!(
        scene_count = scenes.len(),
        step_count = script.steps.len(),
        store_dir = %app.config.store_dir.display(),
        "script_loaded"
    );

    let mut driver = ScriptDriver::new(MemoryHost::from_documents(scenes), controller);
    for (index, step) in script.steps.iter().enumerate() {
        match driver.execute(step) {
            Ok(()) => {}
            Err(StepFailure::Rejected(reason)) => {
                warn!(step = index, op = step.name(), reason = %reason, "step_rejected");
            }
            Err(StepFailure::Fatal(reason)) => {
                return Err(format!("step {index} ({}): {reason}", step.name()));
            }
        }
    }

    let out_path = app.out_path.as_deref().unwrap_or(&app.scene_path);
    driver.save(out_path)
}

/// Non-fatal failures are logged and the script continues.
#[derive(Debug)]
enum StepFailure {
    Rejected(String),
    Fatal(String),
}

impl From<AcceptError> for StepFailure {
    fn from(err: AcceptError) -> Self {
        match err {
            AcceptError::Store(_) => StepFailure::Fatal(err.to_string()),
            other => StepFailure::Rejected(other.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct StepReport {
    live: bool,
    state: String,
    transform_records: usize,
    component_records: usize,
    review: Vec<String>,
    last_replay: Option<ReplayReport>,
}

struct ScriptDriver {
    host: MemoryHost,
    controller: SessionController,
    last_replay: Option<ReplayReport>,
}

impl ScriptDriver {
    fn new(host: MemoryHost, controller: SessionController) -> Self {
        Self {
            host,
            controller,
            last_replay: None,
        }
    }

    fn execute(&mut self, step: &Step) -> Result<(), StepFailure> {
        match step {
            Step::EnterPlay => {
                self.phase(SessionPhase::ExitingEditMode)?;
                self.host.enter_live();
                self.phase(SessionPhase::EnteredPlayMode)
            }
            Step::ExitPlay { reload_ticks } => {
                self.phase(SessionPhase::ExitingPlayMode)?;
                self.host.exit_live();
                if *reload_ticks > 0 {
                    self.host.begin_reload(*reload_ticks);
                }
                self.phase(SessionPhase::EnteredEditMode)
            }
            Step::Tick { count } => {
                for _ in 0..*count {
                    self.host.advance_tick();
                    let outcome = self
                        .controller
                        .tick(&mut self.host)
                        .map_err(|err| StepFailure::Fatal(err.to_string()))?;
                    if let TickOutcome::Replayed(report) = outcome {
                        self.last_replay = Some(report);
                    }
                }
                Ok(())
            }
            Step::SetTransform {
                target,
                position,
                rotation,
                scale,
            } => {
                let object = self.object(target)?;
                let transform = self
                    .host
                    .transform_mut(object)
                    .ok_or_else(|| StepFailure::Rejected("object has no transform".to_string()))?;
                if let Some(position) = position {
                    transform.position = *position;
                }
                if let Some(rotation) = rotation {
                    transform.rotation = *rotation;
                }
                if let Some(scale) = scale {
                    transform.scale = *scale;
                }
                Ok(())
            }
            Step::SetField {
                target,
                field,
                kind,
                value,
            } => {
                let component = self.component(target)?;
                let value = codec::deserialize(value, *kind);
                self.host
                    .write_field(component, field, &value)
                    .map_err(|err| StepFailure::Rejected(err.to_string()))
            }
            Step::AcceptTransform { target } => {
                let object = self.object(target)?;
                self.controller
                    .accept_transform_changes(&self.host, object)?;
                Ok(())
            }
            Step::AcceptComponent { target } => {
                let component = self.component(target)?;
                self.controller
                    .accept_component_changes(&self.host, component)?;
                Ok(())
            }
            Step::RevertToOriginal { target } => {
                let target = self.diff_target(target)?;
                self.controller
                    .revert_to_original(&mut self.host, target)?;
                Ok(())
            }
            Step::RevertToSaved { target } => {
                let target = self.diff_target(target)?;
                self.controller.revert_to_saved(&mut self.host, target)?;
                Ok(())
            }
            Step::Report => {
                let report = self.report();
                let text = serde_json::to_string(&report)
                    .map_err(|err| StepFailure::Fatal(err.to_string()))?;
                println!("{text}");
                Ok(())
            }
        }
    }

    fn phase(&mut self, phase: SessionPhase) -> Result<(), StepFailure> {
        self.controller
            .handle_phase(&self.host, phase)
            .map_err(|err| StepFailure::Fatal(err.to_string()))
    }

    fn object(&self, target: &TargetRef) -> Result<ObjectId, StepFailure> {
        self.host
            .object_at(&target.scene, &target.object)
            .ok_or_else(|| {
                StepFailure::Rejected(format!("no object {}|{}", target.scene, target.object))
            })
    }

    fn component(&self, target: &TargetRef) -> Result<ComponentId, StepFailure> {
        let object = self.object(target)?;
        let type_name = target
            .component
            .as_deref()
            .ok_or_else(|| StepFailure::Rejected("step needs a component type".to_string()))?;
        self.host
            .components(object)
            .into_iter()
            .filter(|component| self.host.component_type(*component) == Some(type_name))
            .nth(target.ordinal)
            .ok_or_else(|| {
                StepFailure::Rejected(format!(
                    "no component {type_name}[{}] on {}",
                    target.ordinal, target.object
                ))
            })
    }

    fn diff_target(&self, target: &TargetRef) -> Result<DiffTarget, StepFailure> {
        if target.component.is_some() {
            Ok(DiffTarget::Component(self.component(target)?))
        } else {
            Ok(DiffTarget::Transform(self.object(target)?))
        }
    }

    fn report(&self) -> StepReport {
        let stores = self.controller.stores();
        StepReport {
            live: self.host.is_live(),
            state: format!("{:?}", self.controller.state()),
            transform_records: stores.transforms.len(),
            component_records: stores.components.len(),
            review: self
                .controller
                .review_targets(&self.host)
                .into_iter()
                .map(|entry| entry.label)
                .collect(),
            last_replay: self.last_replay,
        }
    }

    /// Writes the persistent scenes. A script that ends inside the live session loses its
    /// unaccepted edits the same way stopping the session would.
    fn save(mut self, path: &Path) -> Result<(), String> {
        if self.host.is_live() {
            warn!("script_ended_live_discarding_session");
            self.host.exit_live();
        }
        let documents = self.host.to_documents();
        let text = serde_json::to_string_pretty(&documents)
            .map_err(|err| format!("encode scenes: {err}"))?;
        fs::write(path, text).map_err(|err| format!("write {}: {err}", path.display()))?;
        info!(path = %path.display(), scene_count = documents.len(), "scenes_written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use playkeep::{
        ComponentDocument, FieldKind, FieldValue, KeeperConfig, ObjectDocument, SceneDocument,
        Vec3,
    };
    use tempfile::TempDir;

    use super::*;

    const SCENE: &str = "Assets/Scenes/Test.unity";

    fn driver() -> ScriptDriver {
        let host = MemoryHost::from_documents(vec![SceneDocument {
            path: SCENE.to_string(),
            objects: vec![ObjectDocument::new("Root").with_child(
                ObjectDocument::new("Child").with_component(
                    ComponentDocument::new("Mover").with_field("speed", FieldKind::Float, "1"),
                ),
            )],
        }]);
        ScriptDriver::new(host, SessionController::in_memory(KeeperConfig::default()))
    }

    fn run_steps(driver: &mut ScriptDriver, raw: &str) {
        let script: script::ScriptDocument = script::parse_json(raw, "script").expect("script");
        for step in &script.steps {
            driver.execute(step).expect("step");
        }
    }

    #[test]
    fn scripted_session_replays_accepted_changes() {
        let mut driver = driver();
        run_steps(
            &mut driver,
            r#"{ "steps": [
                { "op": "enter_play" },
                { "op": "tick" },
                { "op": "set_transform", "target": { "scene": "Assets/Scenes/Test.unity", "object": "Root/Child" },
                  "position": { "x": 1, "y": 0, "z": 0 } },
                { "op": "set_field", "target": { "scene": "Assets/Scenes/Test.unity", "object": "Root/Child", "component": "Mover" },
                  "field": "speed", "kind": "float", "value": "3" },
                { "op": "accept_transform", "target": { "scene": "Assets/Scenes/Test.unity", "object": "Root/Child" } },
                { "op": "exit_play", "reload_ticks": 1 },
                { "op": "tick", "count": 2 }
            ] }"#,
        );

        let replay = driver.last_replay.expect("replayed");
        assert_eq!(replay.transforms_applied, 1);
        let child = driver
            .host
            .object_at(SCENE, "Root/Child")
            .expect("child");
        let mover = driver
            .host
            .component_of_type(child, "Mover")
            .expect("mover");
        assert_eq!(
            driver.host.transform(child).expect("transform").position,
            Vec3::new(1.0, 0.0, 0.0)
        );
        assert_eq!(
            driver.host.read_field(mover, "speed").expect("speed"),
            FieldValue::Float(1.0)
        );
    }

    #[test]
    fn missing_targets_are_rejected_not_fatal() {
        let mut driver = driver();
        let failure = driver
            .execute(&Step::AcceptTransform {
                target: TargetRef {
                    scene: SCENE.to_string(),
                    object: "Root/Missing".to_string(),
                    component: None,
                    ordinal: 0,
                },
            })
            .expect_err("missing");
        assert!(matches!(failure, StepFailure::Rejected(_)));

        let failure = driver
            .execute(&Step::RevertToOriginal {
                target: TargetRef {
                    scene: SCENE.to_string(),
                    object: "Root/Child".to_string(),
                    component: None,
                    ordinal: 0,
                },
            })
            .expect_err("no record");
        assert!(matches!(failure, StepFailure::Rejected(_)));
    }

    #[test]
    fn save_writes_the_persistent_scenes() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("out.json");
        let mut driver = driver();
        driver.execute(&Step::EnterPlay).expect("enter");

        driver.save(&path).expect("save");

        let scenes = script::load_scenes(&path).expect("reload");
        assert_eq!(scenes.len(), 1);
        assert_eq!(scenes[0].objects[0].name, "Root");
    }
}
