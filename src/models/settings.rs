use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConnectionConfig;
use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct CommandSettings {
    /// Root command the sub-commands are grouped under
    pub root: String,
    /// Reply that must be sent verbatim to confirm a removal
    pub confirm_token: String,
    pub confirm_timeout_secs: u64,
}

impl CommandSettings {
    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs)
    }
}

impl Default for CommandSettings {
    fn default() -> Self {
        CommandSettings {
            root: "database".to_string(),
            confirm_token: "confirm".to_string(),
            confirm_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum DatabaseSettings {
    Sqlite {
        path: PathBuf,
    },
    #[serde(rename_all = "camelCase")]
    Postgres {
        connection: ConnectionConfig,
        #[serde(default = "default_pg_schema")]
        schema: String,
    },
}

fn default_pg_schema() -> String {
    "public".to_string()
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings::Sqlite {
            path: PathBuf::from("database-operate.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum RenderSettings {
    #[serde(rename_all = "camelCase")]
    Html { output_dir: PathBuf },
    #[serde(rename_all = "camelCase")]
    Chrome {
        #[serde(default = "default_chrome")]
        executable: PathBuf,
        output_dir: PathBuf,
        #[serde(default = "default_window_width")]
        window_width: u32,
        #[serde(default = "default_window_height")]
        window_height: u32,
        #[serde(default = "default_render_timeout")]
        timeout_secs: u64,
    },
}

fn default_chrome() -> PathBuf {
    PathBuf::from("chromium")
}

fn default_window_width() -> u32 {
    1280
}

fn default_window_height() -> u32 {
    720
}

fn default_render_timeout() -> u64 {
    30
}

impl RenderSettings {
    pub fn set_output_dir(&mut self, dir: PathBuf) {
        match self {
            RenderSettings::Html { output_dir } => *output_dir = dir,
            RenderSettings::Chrome { output_dir, .. } => *output_dir = dir,
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        RenderSettings::Html {
            output_dir: PathBuf::from("renders"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub command: CommandSettings,
    pub database: DatabaseSettings,
    pub render: RenderSettings,
}

impl Settings {
    /// Load settings from a JSON file, returns defaults if the file does not exist
    pub fn load(path: &Path) -> Result<Settings, ConfigError> {
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config at {}, using defaults", path.display());
                return Ok(Settings::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
