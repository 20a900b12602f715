use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hollow_engine::sync::SyncConfig;
use hollow_engine::world::WorldConfig;
use hollow_engine::{app_paths_for_root, resolve_app_paths, AppPaths, LoopConfig, StartupError};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::settings::{load_settings, Settings};

pub(crate) const SEED_ENV_VAR: &str = "HOLLOW_SEED";
pub(crate) const STORE_DIR_ENV_VAR: &str = "HOLLOW_STORE_DIR";
pub(crate) const RUN_SECONDS_ENV_VAR: &str = "HOLLOW_RUN_SECONDS";

/// Contents of `hollowreach.json`. Every section is optional.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct GameConfig {
    pub(crate) world: WorldConfig,
    pub(crate) sync: SyncConfig,
    pub(crate) sync_enabled: bool,
    pub(crate) target_tps: u32,
    pub(crate) run_seconds: Option<u64>,
    pub(crate) summary_every_frames: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            world: WorldConfig::default(),
            sync: SyncConfig::default(),
            sync_enabled: true,
            target_tps: LoopConfig::default().target_tps,
            run_seconds: None,
            summary_every_frames: 300,
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum BootError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("failed to read config {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path}: {message}")]
    ParseConfig { path: PathBuf, message: String },
    #[error("invalid value {value:?} for {var}")]
    EnvOverride { var: &'static str, value: String },
}

pub(crate) struct AppWiring {
    pub(crate) loop_config: LoopConfig,
    pub(crate) game: GameConfig,
    pub(crate) paths: AppPaths,
    pub(crate) settings: Settings,
}

pub(crate) fn build_app() -> Result<AppWiring, BootError> {
    init_tracing();
    info!("=== Hollowreach Startup ===");

    let paths = resolve_app_paths()?;
    let mut game = load_game_config(&paths.config_path)?;
    let overrides = apply_env_overrides(&mut game, |var| std::env::var(var).ok())?;
    let paths = match overrides.store_dir {
        Some(store_dir) => app_paths_for_root(paths.root, Some(store_dir))?,
        None => paths,
    };
    let settings = load_settings(&paths.settings_path);

    let loop_config = LoopConfig {
        target_tps: game.target_tps,
        run_for: game.run_seconds.map(Duration::from_secs),
        ..LoopConfig::default()
    };

    info!(
        root = %paths.root.display(),
        store_dir = %paths.store_dir.display(),
        world_seed = game.world.world_seed,
        sync_enabled = game.sync_enabled,
        control_mode = ?settings.control_mode,
        "startup_config"
    );

    Ok(AppWiring {
        loop_config,
        game,
        paths,
        settings,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

/// A missing config file means defaults.
pub(crate) fn load_game_config(path: &Path) -> Result<GameConfig, BootError> {
    match fs::read_to_string(path) {
        Ok(raw) => parse_game_config(&raw, path),
        Err(source) if source.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "config_missing_using_defaults");
            Ok(GameConfig::default())
        }
        Err(source) => Err(BootError::ReadConfig {
            path: path.to_path_buf(),
            source,
        }),
    }
}

pub(crate) fn parse_game_config(raw: &str, path: &Path) -> Result<GameConfig, BootError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, GameConfig>(&mut deserializer).map_err(|error| {
        let at = error.path().to_string();
        let source = error.into_inner();
        let message = if at.is_empty() || at == "." {
            source.to_string()
        } else {
            format!("at {at}: {source}")
        };
        BootError::ParseConfig {
            path: path.to_path_buf(),
            message,
        }
    })
}

#[derive(Debug, Default, PartialEq)]
pub(crate) struct EnvOverrides {
    pub(crate) store_dir: Option<PathBuf>,
}

pub(crate) fn apply_env_overrides(
    game: &mut GameConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<EnvOverrides, BootError> {
    if let Some(raw) = non_empty(lookup(SEED_ENV_VAR)) {
        game.world.world_seed = parse_env(SEED_ENV_VAR, &raw)?;
    }
    if let Some(raw) = non_empty(lookup(RUN_SECONDS_ENV_VAR)) {
        game.run_seconds = Some(parse_env(RUN_SECONDS_ENV_VAR, &raw)?);
    }
    Ok(EnvOverrides {
        store_dir: non_empty(lookup(STORE_DIR_ENV_VAR)).map(PathBuf::from),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

fn parse_env(var: &'static str, raw: &str) -> Result<u64, BootError> {
    raw.parse::<u64>().map_err(|_| BootError::EnvOverride {
        var,
        value: raw.to_string(),
    })
}
