use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_MIN_MEMORY_MB: u32 = 1024;
pub const DEFAULT_MAX_MEMORY_MB: u32 = 2048;

/// Directory inside each instance that holds ServerSmith's own files.
pub const METADATA_DIR: &str = ".serversmith";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServerType {
    Vanilla,
    Paper,
    NeoForge,
    Custom,
}

impl ServerType {
    pub const ALL: [ServerType; 4] = [
        ServerType::Vanilla,
        ServerType::Paper,
        ServerType::NeoForge,
        ServerType::Custom,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            ServerType::Vanilla => "Vanilla",
            ServerType::Paper => "Paper",
            ServerType::NeoForge => "NeoForge",
            ServerType::Custom => "Custom",
        }
    }
}

impl fmt::Display for ServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.display_name())
    }
}

impl FromStr for ServerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServerType::ALL
            .into_iter()
            .find(|t| t.display_name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "unknown server type '{}' (expected one of: vanilla, paper, neoforge, custom)",
                    s
                )
            })
    }
}

fn default_min_memory() -> u32 {
    DEFAULT_MIN_MEMORY_MB
}

fn default_max_memory() -> u32 {
    DEFAULT_MAX_MEMORY_MB
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInstance {
    pub name: String,
    #[serde(rename = "type")]
    pub server_type: ServerType,
    pub version: String,
    pub created: NaiveDateTime,
    pub last_opened: NaiveDateTime,
    #[serde(default = "default_min_memory")]
    pub min_memory: u32,
    #[serde(default = "default_max_memory")]
    pub max_memory: u32,

    /// Set from the directory the metadata was loaded from.
    #[serde(skip)]
    pub location: PathBuf,
}

impl ServerInstance {
    pub fn new(
        name: impl Into<String>,
        server_type: ServerType,
        version: impl Into<String>,
        location: impl Into<PathBuf>,
    ) -> Self {
        let now = Local::now().naive_local();
        Self {
            name: name.into(),
            server_type,
            version: version.into(),
            created: now,
            last_opened: now,
            min_memory: DEFAULT_MIN_MEMORY_MB,
            max_memory: DEFAULT_MAX_MEMORY_MB,
            location: location.into(),
        }
    }

    pub fn touch(&mut self) {
        self.last_opened = Local::now().naive_local();
    }

    pub fn metadata_path(&self) -> PathBuf {
        metadata_path(&self.location)
    }

    pub fn pid_file(&self) -> PathBuf {
        self.location.join(METADATA_DIR).join("server.pid")
    }

    pub fn properties_path(&self) -> PathBuf {
        self.location.join("server.properties")
    }
}

pub fn metadata_path(instance_dir: &Path) -> PathBuf {
    instance_dir.join(METADATA_DIR).join("instance.json")
}

/// Contents of `config.json`: the instance directories ServerSmith knows about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registry {
    #[serde(default)]
    pub default_base_directory: Option<String>,
    #[serde(default)]
    pub known_instances: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProvisionEvent {
    Status(String),
    Log(String),
    Progress(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_type_parsing() {
        assert_eq!("paper".parse::<ServerType>().unwrap(), ServerType::Paper);
        assert_eq!("NeoForge".parse::<ServerType>().unwrap(), ServerType::NeoForge);
        assert_eq!("NEOFORGE".parse::<ServerType>().unwrap(), ServerType::NeoForge);
        assert!("bukkit".parse::<ServerType>().is_err());
    }

    #[test]
    fn test_instance_json_shape() {
        let instance = ServerInstance::new("Lobby", ServerType::NeoForge, "20.4.80-beta", "/srv/lobby");
        let json = serde_json::to_value(&instance).unwrap();

        assert_eq!(json["type"], "NEOFORGE");
        assert_eq!(json["minMemory"], 1024);
        assert_eq!(json["maxMemory"], 2048);
        assert!(json.get("lastOpened").is_some());
        assert!(json.get("location").is_none());
    }

    #[test]
    fn test_instance_defaults_missing_memory() {
        let json = r#"{
            "name": "Old",
            "type": "VANILLA",
            "version": "1.20.4",
            "created": "2024-01-02T10:00:00",
            "lastOpened": "2024-01-03T11:30:00"
        }"#;

        let instance: ServerInstance = serde_json::from_str(json).unwrap();
        assert_eq!(instance.server_type, ServerType::Vanilla);
        assert_eq!(instance.min_memory, DEFAULT_MIN_MEMORY_MB);
        assert_eq!(instance.max_memory, DEFAULT_MAX_MEMORY_MB);
        assert_eq!(instance.location, PathBuf::new());
    }

    #[test]
    fn test_registry_accepts_empty_object() {
        let registry: Registry = serde_json::from_str("{}").unwrap();
        assert!(registry.default_base_directory.is_none());
        assert!(registry.known_instances.is_empty());
    }
}
