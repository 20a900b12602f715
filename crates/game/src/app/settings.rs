use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use hollow_engine::sync::write_text_atomic;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Which key layout drives the player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ControlMode {
    /// Arrow keys to move, space to attack.
    #[default]
    Laptop,
    /// WASD to move, space to attack.
    Desktop,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct Settings {
    pub(crate) control_mode: ControlMode,
}

#[derive(Debug, Error)]
pub(crate) enum SettingsError {
    #[error("failed to encode settings: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to write settings to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Missing or unreadable settings fall back to defaults.
pub(crate) fn load_settings(path: &Path) -> Settings {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "settings_missing_using_defaults");
            return Settings::default();
        }
        Err(error) => {
            warn!(path = %path.display(), error = %error, "settings_unreadable_using_defaults");
            return Settings::default();
        }
    };

    match serde_json::from_str::<Settings>(&raw) {
        Ok(settings) => settings,
        Err(error) => {
            warn!(path = %path.display(), error = %error, "settings_malformed_using_defaults");
            Settings::default()
        }
    }
}

pub(crate) fn save_settings(path: &Path, settings: &Settings) -> Result<(), SettingsError> {
    let text = serde_json::to_string_pretty(settings).map_err(SettingsError::Encode)?;
    write_text_atomic(path, &text).map_err(|source| SettingsError::Write {
        path: path.to_path_buf(),
        source,
    })
}
