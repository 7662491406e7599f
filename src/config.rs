use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::passages::Difficulty;

/// Preferences that survive between runs: who is typing, at what tier, and
/// how long a leaderboard to show.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub username: Option<String>,
    pub difficulty: Difficulty,
    pub leaderboard_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username: None,
            difficulty: Difficulty::Easy,
            leaderboard_size: 10,
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

/// JSON file under the platform config directory. Anything unreadable or
/// unparsable falls back to defaults; preferences are never worth failing
/// startup over.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        let path = match ProjectDirs::from("", "", "typemaster") {
            Some(pd) => pd.config_dir().join("config.json"),
            None => PathBuf::from("typemaster_config.json"),
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, text)
    }
}
