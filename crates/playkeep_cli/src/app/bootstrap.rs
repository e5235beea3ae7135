use std::path::PathBuf;

use playkeep::KeeperConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub(crate) struct AppWiring {
    pub(crate) config: KeeperConfig,
    pub(crate) scene_path: PathBuf,
    pub(crate) script_path: PathBuf,
    /// Where the persistent scenes are written once the script finishes. Defaults to
    /// `scene_path`.
    pub(crate) out_path: Option<PathBuf>,
}

pub(crate) fn usage_text() -> String {
    "usage: playkeep_cli <scene.json> <script.json> [out.json]\n\
\n\
environment:\n\
  PLAYKEEP_STORE_DIR           directory for diff stores (default ./.playkeep)\n\
  PLAYKEEP_CLEAR_AFTER_REPLAY  1/true/yes to empty the stores after a replay\n\
  RUST_LOG                     tracing filter (default info)"
        .to_string()
}

/// `Ok(None)` when help was requested.
pub(crate) fn build_app(args: &[String]) -> Result<Option<AppWiring>, String> {
    let Some(paths) = parse_args(args)? else {
        return Ok(None);
    };
    init_tracing();
    info!("=== PlayKeep Startup ===");

    let config = KeeperConfig::from_env().map_err(|err| err.to_string())?;
    Ok(Some(AppWiring {
        config,
        scene_path: paths.scene_path,
        script_path: paths.script_path,
        out_path: paths.out_path,
    }))
}

#[derive(Debug, PartialEq, Eq)]
struct CliPaths {
    scene_path: PathBuf,
    script_path: PathBuf,
    out_path: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<Option<CliPaths>, String> {
    if args.iter().any(|arg| arg == "-h" || arg == "--help") {
        return Ok(None);
    }
    match args {
        [scene, script] => Ok(Some(CliPaths {
            scene_path: PathBuf::from(scene),
            script_path: PathBuf::from(script),
            out_path: None,
        })),
        [scene, script, out] => Ok(Some(CliPaths {
            scene_path: PathBuf::from(scene),
            script_path: PathBuf::from(script),
            out_path: Some(PathBuf::from(out)),
        })),
        _ => Err(usage_text()),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
