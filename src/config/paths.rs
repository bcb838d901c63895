use crate::utils::error::{Result, ServerSmithError};
use std::path::PathBuf;

pub const HOME_ENV: &str = "SERVERSMITH_HOME";

/// Where ServerSmith keeps its own state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl AppPaths {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            cache_dir: data_dir.join("cache"),
            data_dir,
        }
    }

    /// `$SERVERSMITH_HOME`, falling back to `$HOME/.serversmith`.
    pub fn from_env() -> Result<Self> {
        if let Some(dir) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::new(PathBuf::from(dir)));
        }

        let home = user_home().ok_or_else(|| ServerSmithError::MissingConfigError {
            field: format!("{} or HOME", HOME_ENV),
        })?;
        Ok(Self::new(home.join(".serversmith")))
    }

    pub fn with_cache_dir(mut self, cache_dir: Option<PathBuf>) -> Self {
        if let Some(dir) = cache_dir {
            self.cache_dir = dir;
        }
        self
    }

    pub fn registry_file(&self) -> PathBuf {
        self.data_dir.join("config.json")
    }

    pub fn settings_file(&self) -> PathBuf {
        self.data_dir.join("settings.toml")
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.data_dir.join("backups")
    }
}

pub fn user_home() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}
