//! Drives capture and replay across live-session transitions.
//!
//! The host reports phase changes through [`SessionController::handle_phase`] and polls
//! [`SessionController::tick`] once per update. Work that has to wait (the baseline capture
//! until the live objects exist, the replay until a reload settles) sits in [`SessionState`]
//! and re-checks its preconditions on every tick. Pending work is mirrored into a small state
//! file so it survives the host tearing the process state down in between.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::accept::{self, AcceptError};
use crate::host::{ComponentId, ObjectId, SceneHost};
use crate::identity::{self, ComponentKey, DiffTarget};
use crate::registry::SnapshotRegistry;
use crate::replay::{replay, ReplayReport};
use crate::snapshot::{ComponentSnapshot, TransformSnapshot};
use crate::store::{
    write_text_atomic, ComponentDiffRecord, DiffRecord, DiffStores, StoreError,
    TransformDiffRecord,
};
use crate::KeeperConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    ExitingEditMode,
    EnteredPlayMode,
    ExitingPlayMode,
    EnteredEditMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// The live session started; the baseline is taken on the first tick that finds it ready.
    CapturePending,
    Captured,
    /// The live session ended; replay runs once the host settles, if the active scene still
    /// matches `scene_guard`.
    ReplayPending { scene_guard: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    Waiting,
    Captured {
        transform_count: usize,
        component_count: usize,
    },
    Replayed(ReplayReport),
    ReplaySkipped {
        expected: Option<String>,
        active: Option<String>,
    },
    /// A pending capture found the live session already gone.
    Cancelled,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to encode session state: {0}")]
    EncodeState(#[source] serde_json::Error),
    #[error("failed to write session state {path}: {source}")]
    WriteState {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read session state {path}: {source}")]
    ReadState {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct PersistedSession {
    capture_pending: bool,
    replay_pending: bool,
    session_scene: Option<String>,
}

/// A stored override whose target resolves in the current scene graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewEntry {
    pub target: DiffTarget,
    pub label: String,
    pub has_original: bool,
}

#[derive(Debug)]
pub struct SessionController {
    config: KeeperConfig,
    state: SessionState,
    session_scene: Option<String>,
    registry: Option<SnapshotRegistry>,
    stores: DiffStores,
    state_path: Option<PathBuf>,
}

impl SessionController {
    /// Opens the stores under the configured directory and restores any pending capture or
    /// replay left behind by a previous process.
    pub fn open(config: KeeperConfig) -> Result<Self, SessionError> {
        let stores = DiffStores::open(
            &config.transform_store_path(),
            &config.component_store_path(),
        )?;
        let state_path = config.session_state_path();
        let persisted = read_session_state(&state_path)?;
        let state = if persisted.capture_pending {
            SessionState::CapturePending
        } else if persisted.replay_pending {
            SessionState::ReplayPending {
                scene_guard: persisted.session_scene.clone(),
            }
        } else {
            SessionState::Idle
        };
        info!(
            store_dir = %config.store_dir.display(),
            state = ?state,
            transform_records = stores.transforms.len(),
            component_records = stores.components.len(),
            "session_opened"
        );
        Ok(Self {
            config,
            state,
            session_scene: persisted.session_scene,
            registry: None,
            stores,
            state_path: Some(state_path),
        })
    }

    /// A controller whose stores and state never touch disk.
    pub fn in_memory(config: KeeperConfig) -> Self {
        Self {
            config,
            state: SessionState::Idle,
            session_scene: None,
            registry: None,
            stores: DiffStores::in_memory(),
            state_path: None,
        }
    }

    pub fn config(&self) -> &KeeperConfig {
        &self.config
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn session_scene(&self) -> Option<&str> {
        self.session_scene.as_deref()
    }

    pub fn registry(&self) -> Option<&SnapshotRegistry> {
        self.registry.as_ref()
    }

    pub fn stores(&self) -> &DiffStores {
        &self.stores
    }

    pub fn handle_phase<H: SceneHost + ?Sized>(
        &mut self,
        host: &H,
        phase: SessionPhase,
    ) -> Result<(), SessionError> {
        debug!(phase = ?phase, state = ?self.state, "session_phase");
        match phase {
            SessionPhase::ExitingEditMode => {
                self.session_scene = host.active_scene();
                self.registry = None;
                self.stores.clear_all()?;
                self.set_state(SessionState::Idle)?;
            }
            SessionPhase::EnteredPlayMode => {
                if self.session_scene.is_none() {
                    self.session_scene = host.active_scene();
                }
                self.set_state(SessionState::CapturePending)?;
            }
            SessionPhase::ExitingPlayMode => {
                self.registry = None;
                let scene_guard = self.session_scene.clone();
                self.set_state(SessionState::ReplayPending { scene_guard })?;
            }
            SessionPhase::EnteredEditMode => {
                if self.state == SessionState::CapturePending {
                    self.set_state(SessionState::Idle)?;
                }
            }
        }
        Ok(())
    }

    /// Advances whatever work is pending. Safe to call every update.
    pub fn tick<H: SceneHost + ?Sized>(&mut self, host: &mut H) -> Result<TickOutcome, SessionError> {
        match self.state.clone() {
            SessionState::Idle | SessionState::Captured => Ok(TickOutcome::Idle),
            SessionState::CapturePending => {
                if host.is_reloading() {
                    return Ok(TickOutcome::Waiting);
                }
                if !host.is_live() {
                    info!("baseline_capture_cancelled");
                    self.set_state(SessionState::Idle)?;
                    return Ok(TickOutcome::Cancelled);
                }
                let registry = SnapshotRegistry::capture_all(&*host);
                let outcome = TickOutcome::Captured {
                    transform_count: registry.transform_count(),
                    component_count: registry.component_count(),
                };
                self.registry = Some(registry);
                self.set_state(SessionState::Captured)?;
                Ok(outcome)
            }
            SessionState::ReplayPending { scene_guard } => {
                if host.is_reloading() || host.is_live() {
                    return Ok(TickOutcome::Waiting);
                }
                let active = host.active_scene();
                if active != scene_guard {
                    warn!(
                        expected = ?scene_guard,
                        active = ?active,
                        "replay_skipped_scene_changed"
                    );
                    self.set_state(SessionState::Idle)?;
                    return Ok(TickOutcome::ReplaySkipped {
                        expected: scene_guard,
                        active,
                    });
                }
                let report = replay(host, &self.stores);
                if self.config.clear_after_replay {
                    self.stores.clear_all()?;
                }
                self.set_state(SessionState::Idle)?;
                Ok(TickOutcome::Replayed(report))
            }
        }
    }

    pub fn changed_components<H: SceneHost + ?Sized>(
        &self,
        host: &H,
        object: ObjectId,
    ) -> Vec<DiffTarget> {
        self.registry
            .as_ref()
            .map(|registry| registry.changed_components(host, object))
            .unwrap_or_default()
    }

    pub fn transform_snapshot<H: SceneHost + ?Sized>(
        &self,
        host: &H,
        object: ObjectId,
    ) -> Option<&TransformSnapshot> {
        let key = identity::object_key(host, object)?;
        self.registry.as_ref()?.transform_snapshot(&key)
    }

    pub fn component_snapshot<H: SceneHost + ?Sized>(
        &self,
        host: &H,
        component: ComponentId,
    ) -> Option<&ComponentSnapshot> {
        let owner = host.component_owner(component)?;
        let key = identity::object_key(host, owner)?;
        let component_key: ComponentKey = identity::component_key(host, component)?;
        self.registry.as_ref()?.component_snapshot(&key, &component_key)
    }

    pub fn accept_transform_changes<H: SceneHost + ?Sized>(
        &mut self,
        host: &H,
        object: ObjectId,
    ) -> Result<TransformDiffRecord, AcceptError> {
        accept::accept_transform(
            host,
            self.registry.as_mut(),
            &mut self.stores.transforms,
            object,
        )
    }

    pub fn accept_component_changes<H: SceneHost + ?Sized>(
        &mut self,
        host: &H,
        component: ComponentId,
    ) -> Result<ComponentDiffRecord, AcceptError> {
        accept::accept_component(
            host,
            self.registry.as_mut(),
            &mut self.stores.components,
            component,
        )
    }

    pub fn reset_transform_baseline<H: SceneHost + ?Sized>(
        &mut self,
        host: &H,
        object: ObjectId,
    ) -> bool {
        self.registry
            .as_mut()
            .is_some_and(|registry| registry.reset_transform_baseline(host, object))
    }

    pub fn reset_component_baseline<H: SceneHost + ?Sized>(
        &mut self,
        host: &H,
        component: ComponentId,
    ) -> bool {
        self.registry
            .as_mut()
            .is_some_and(|registry| registry.reset_component_baseline(host, component))
    }

    pub fn revert_to_original<H: SceneHost + ?Sized>(
        &mut self,
        host: &mut H,
        target: DiffTarget,
    ) -> Result<(), AcceptError> {
        let registry = if host.is_live() {
            self.registry.as_mut()
        } else {
            None
        };
        accept::revert_to_original(host, registry, &mut self.stores, target)
    }

    pub fn revert_to_saved<H: SceneHost + ?Sized>(
        &self,
        host: &mut H,
        target: DiffTarget,
    ) -> Result<(), AcceptError> {
        accept::revert_to_saved(host, &self.stores, target)
    }

    pub fn has_unsaved_changes<H: SceneHost + ?Sized>(&self, host: &H, target: DiffTarget) -> bool {
        accept::has_unsaved_changes(host, &self.stores, target)
    }

    /// Stored overrides that resolve in the host's active scene, transforms first. Empty when
    /// the active scene is not the one the session started in.
    pub fn review_targets<H: SceneHost + ?Sized>(&self, host: &H) -> Vec<ReviewEntry> {
        let Some(active) = host.active_scene() else {
            return Vec::new();
        };
        if self
            .session_scene
            .as_deref()
            .is_some_and(|session_scene| session_scene != active)
        {
            debug!(
                expected = ?self.session_scene,
                active = %active,
                "review_skipped_scene_changed"
            );
            return Vec::new();
        }

        let mut entries = Vec::new();
        for record in self.stores.transforms.records() {
            if record.scene_path != active {
                continue;
            }
            if let Some(object) = identity::resolve_object(
                host,
                record.object_id.as_ref(),
                &record.scene_path,
                &record.object_path,
            ) {
                entries.push(ReviewEntry {
                    target: DiffTarget::Transform(object),
                    label: record.key().to_string(),
                    has_original: record.has_original(),
                });
            }
        }
        for record in self.stores.components.records() {
            if record.scene_path != active {
                continue;
            }
            let key = ComponentKey {
                type_name: record.component_type.clone(),
                ordinal: record.component_ordinal,
            };
            let component = identity::resolve_object(
                host,
                record.object_id.as_ref(),
                &record.scene_path,
                &record.object_path,
            )
            .and_then(|object| identity::resolve_component(host, object, &key));
            if let Some(component) = component {
                entries.push(ReviewEntry {
                    target: DiffTarget::Component(component),
                    label: record.key().to_string(),
                    has_original: record.has_original(),
                });
            }
        }
        entries
    }

    fn set_state(&mut self, state: SessionState) -> Result<(), SessionError> {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "session_state_changed");
        }
        self.state = state;
        self.persist_state()
    }

    fn persist_state(&self) -> Result<(), SessionError> {
        let Some(path) = &self.state_path else {
            return Ok(());
        };
        let persisted = PersistedSession {
            capture_pending: self.state == SessionState::CapturePending,
            replay_pending: matches!(self.state, SessionState::ReplayPending { .. }),
            session_scene: self.session_scene.clone(),
        };
        let text = serde_json::to_string_pretty(&persisted).map_err(SessionError::EncodeState)?;
        write_text_atomic(path, &text).map_err(|source| SessionError::WriteState {
            path: path.clone(),
            source,
        })
    }
}

fn read_session_state(path: &Path) -> Result<PersistedSession, SessionError> {
    if !path.exists() {
        return Ok(PersistedSession::default());
    }
    let raw = fs::read_to_string(path).map_err(|source| SessionError::ReadState {
        path: path.to_path_buf(),
        source,
    })?;
    match serde_json::from_str(&raw) {
        Ok(persisted) => Ok(persisted),
        Err(error) => {
            warn!(
                path = %path.display(),
                error = %error,
                "session_state_unreadable_starting_idle"
            );
            Ok(PersistedSession::default())
        }
    }
}
