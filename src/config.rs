use std::fs;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use tracing::info;

use crate::error::Result;
use crate::task::Priority;

#[derive(Debug, Deserialize)]
pub struct Tidy {
    pub data_file: Option<PathBuf>,
    pub editor: String,
    pub default_priority: Priority,
}

#[derive(Debug, Deserialize)]
pub struct Configuration {
    pub tidy: Tidy,
}

const DEFAULT_CONFIG: &str = r#"
[tidy]
# JSON file holding the task list. Defaults to the platform data directory.
# data_file = "/home/me/tasks.json"
# Command used to compose and edit tasks.
editor = "vi"
# Priority given to tasks added without one: Low, Medium or High.
default_priority = "Medium"

"#;

impl Configuration {
    /// Loads `~/.config/tidy/tidy.toml` (or the platform equivalent),
    /// writing the defaults there first if it doesn't exist.
    pub fn load() -> Result<Self> {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        let config_path = config_dir.join("tidy").join("tidy.toml");

        if !config_path.exists() {
            if let Some(parent) = config_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&config_path, DEFAULT_CONFIG.trim())?;
            info!(path = %config_path.display(), "wrote default configuration");
        }
        Self::from_file(&config_path)
    }

    /// Layers the defaults, the file at `path` and `TIDY_*` environment
    /// variables, in that order.
    pub fn from_file(path: &Path) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::from(path).required(true))
            .add_source(
                Environment::with_prefix("TIDY")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        Ok(settings.try_deserialize::<Configuration>()?)
    }

    /// Where the task list lives unless the command line says otherwise.
    pub fn data_file(&self) -> PathBuf {
        self.tidy.data_file.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("tidy")
                .join("tasks.json")
        })
    }
}
