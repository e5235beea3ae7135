use std::env;
use std::fs;
use std::path::PathBuf;

use thiserror::Error;
use tracing::warn;

pub mod accept;
pub mod codec;
pub mod host;
pub mod identity;
pub mod registry;
pub mod replay;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod transform;


pub use accept::AcceptError;
pub use codec::{Color, FieldKind, FieldValue, Quat, Vec2, Vec3, Vec4, EPSILON};
pub use host::{
    ComponentDocument, ComponentId, DurableHandle, FieldAccess, FieldAccessError,
    FieldDescriptor, FieldDocument, MemoryHost, ObjectDocument, ObjectId, SceneDocument,
    SceneHost,
};
pub use identity::{ComponentKey, DiffTarget, ObjectKey};
pub use registry::SnapshotRegistry;
pub use replay::{replay, ReplayReport};
pub use session::{
    ReviewEntry, SessionController, SessionError, SessionPhase, SessionState, TickOutcome,
};
pub use snapshot::{changed_properties, ComponentSnapshot, TransformSnapshot};
pub use store::{
    ComponentDiffRecord, DiffStore, DiffStores, SerializedFields, StoreError,
    TransformDiffRecord,
};
pub use transform::{LayoutRect, TransformField, TransformState};

pub const STORE_DIR_ENV_VAR: &str = "PLAYKEEP_STORE_DIR";
pub const CLEAR_AFTER_REPLAY_ENV_VAR: &str = "PLAYKEEP_CLEAR_AFTER_REPLAY";

const DEFAULT_STORE_DIR: &str = ".playkeep";
const TRANSFORM_STORE_FILE: &str = "transform_diffs.json";
const COMPONENT_STORE_FILE: &str = "component_diffs.json";
const SESSION_STATE_FILE: &str = "session_state.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeeperConfig {
    /// Directory holding the diff stores and the session state file.
    pub store_dir: PathBuf,
    /// Empty the stores once a replay has been applied instead of keeping them for review.
    pub clear_after_replay: bool,
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from(DEFAULT_STORE_DIR),
            clear_after_replay: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to create store directory at {path}: {source}")]
    CreateStoreDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl KeeperConfig {
    /// Defaults overridden by `PLAYKEEP_STORE_DIR` and `PLAYKEEP_CLEAR_AFTER_REPLAY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        match env::var(STORE_DIR_ENV_VAR) {
            Ok(value) if !value.trim().is_empty() => config.store_dir = PathBuf::from(value),
            Ok(_) | Err(env::VarError::NotPresent) => {}
            Err(source) => {
                return Err(ConfigError::EnvVar {
                    var: STORE_DIR_ENV_VAR,
                    source,
                })
            }
        }
        match env::var(CLEAR_AFTER_REPLAY_ENV_VAR) {
            Ok(value) => config.clear_after_replay = parse_enabled_flag(&value),
            Err(env::VarError::NotPresent) => {}
            Err(err) => {
                warn!(
                    env_var = CLEAR_AFTER_REPLAY_ENV_VAR,
                    error = %err,
                    "unable to read clear-after-replay env var; keeping default"
                );
            }
        }
        Ok(config)
    }

    pub fn ensure_store_dir(&self) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.store_dir).map_err(|source| ConfigError::CreateStoreDir {
            path: self.store_dir.clone(),
            source,
        })
    }

    pub fn transform_store_path(&self) -> PathBuf {
        self.store_dir.join(TRANSFORM_STORE_FILE)
    }

    pub fn component_store_path(&self) -> PathBuf {
        self.store_dir.join(COMPONENT_STORE_FILE)
    }

    pub fn session_state_path(&self) -> PathBuf {
        self.store_dir.join(SESSION_STATE_FILE)
    }
}

fn parse_enabled_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enabled_flag_accepts_common_spellings() {
        for raw in ["1", "true", "YES", " True "] {
            assert!(parse_enabled_flag(raw), "{raw}");
        }
        for raw in ["0", "false", "", "on"] {
            assert!(!parse_enabled_flag(raw), "{raw}");
        }
    }

    #[test]
    fn store_files_live_under_the_store_dir() {
        let config = KeeperConfig {
            store_dir: PathBuf::from("keep"),
            clear_after_replay: false,
        };
        assert_eq!(
            config.transform_store_path(),
            PathBuf::from("keep").join("transform_diffs.json")
        );
        assert_eq!(
            config.session_state_path(),
            PathBuf::from("keep").join("session_state.json")
        );
    }

    #[test]
    fn ensure_store_dir_creates_nested_directories() {
        let temp = tempfile::TempDir::new().expect("temp");
        let config = KeeperConfig {
            store_dir: temp.path().join("a").join("b"),
            clear_after_replay: false,
        };
        config.ensure_store_dir().expect("create");
        assert!(config.store_dir.is_dir());
    }
}
