use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;
pub mod sync;
pub mod world;

pub use app::{
    run_app, run_app_with_stats, AppError, Host, InputAction, InputSnapshot, InputSource,
    LoopConfig, SessionStats, SessionStatsHandle,
};
pub use sync::{
    FileStore, MemoryStore, PeerSyncChannel, SharedStore, StoreError, SyncConfig, SyncHandle,
    SystemClock,
};
pub use world::{ConfigError, Notice, Notify, Severity, WorldConfig, WorldSnapshot, WorldState};

pub const ROOT_ENV_VAR: &str = "HOLLOW_ROOT";
pub const CONFIG_FILE_NAME: &str = "hollowreach.json";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const STORE_DIR_NAME: &str = "gossip";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub settings_path: PathBuf,
    pub store_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error("failed to create store directory at {path}: {source}")]
    CreateStoreDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "HOLLOW_ROOT is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and either crates/ or {config_file}."
    )]
    InvalidEnvRoot {
        path: PathBuf,
        config_file: &'static str,
    },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and either crates/ or hollowreach.json.\n\
Set {env_var} explicitly, for example:\n\
Bash/zsh: export {env_var}=\"/path/to/hollowreach\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = resolve_root()?;
    app_paths_for_root(root, None)
}

/// Lays out the standard paths under `root`. `store_dir` overrides the
/// default `<root>/gossip` location; either way the directory is created.
pub fn app_paths_for_root(
    root: PathBuf,
    store_dir: Option<PathBuf>,
) -> Result<AppPaths, StartupError> {
    let config_path = root.join(CONFIG_FILE_NAME);
    let settings_path = root.join(SETTINGS_FILE_NAME);
    let store_dir = store_dir.unwrap_or_else(|| root.join(STORE_DIR_NAME));

    fs::create_dir_all(&store_dir).map_err(|source| StartupError::CreateStoreDir {
        path: store_dir.clone(),
        source,
    })?;

    Ok(AppPaths {
        root,
        config_path,
        settings_path,
        store_dir,
    })
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let raw = PathBuf::from(value);
            let normalized = normalize_path(&raw);
            if is_repo_marker(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot {
                    path: normalized,
                    config_file: CONFIG_FILE_NAME,
                })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            for candidate in exe_dir.ancestors() {
                if is_repo_marker(candidate) {
                    return Ok(normalize_path(candidate));
                }
            }

            Err(StartupError::RootNotFound {
                start_dir: normalize_path(&exe_dir),
                env_var: ROOT_ENV_VAR,
            })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn is_repo_marker(path: &Path) -> bool {
    let cargo_toml = path.join("Cargo.toml").is_file();
    let has_crates = path.join("crates").is_dir();
    let has_config = path.join(CONFIG_FILE_NAME).is_file();

    cargo_toml && (has_crates || has_config)
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
