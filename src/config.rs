use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_SETTINGS_PATH: &str = "settings.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database_url: String,
    pub credentials_path: PathBuf,
    /// Folder label that ingestion reads from and `move_to_label` removes.
    pub inbox_label: String,
    pub max_results: u32,
    pub rules_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite:emails.db?mode=rwc".to_string(),
            credentials_path: PathBuf::from("credentials.json"),
            inbox_label: "INBOX".to_string(),
            max_results: 100,
            rules_path: PathBuf::from("rules.json"),
        }
    }
}

impl Settings {
    /// Loads settings from `path`, or from `settings.toml` when no path is given.
    /// A missing default file yields defaults; an explicit missing file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        use std::fs;

        let (path, explicit) = match path {
            Some(p) => (p, true),
            None => (Path::new(DEFAULT_SETTINGS_PATH), false),
        };

        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content)
                .with_context(|| format!("Failed to parse {}", path.display())),
            Err(e) if !explicit && e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
