use crate::domain::model::{DEFAULT_MAX_MEMORY_MB, DEFAULT_MIN_MEMORY_MB};
use crate::utils::error::{Result, ServerSmithError};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_VANILLA_MANIFEST_URL: &str =
    "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json";
pub const DEFAULT_PAPER_API_URL: &str = "https://api.papermc.io/v2";
pub const DEFAULT_NEOFORGE_MAVEN_URL: &str = "https://maven.neoforged.net";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub java: JavaConfig,
    pub sources: SourcesConfig,
    pub http: HttpConfig,
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JavaConfig {
    pub binary: String,
    pub min_memory_mb: u32,
    pub max_memory_mb: u32,
}

impl Default for JavaConfig {
    fn default() -> Self {
        Self {
            binary: "java".to_string(),
            min_memory_mb: DEFAULT_MIN_MEMORY_MB,
            max_memory_mb: DEFAULT_MAX_MEMORY_MB,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub vanilla_manifest_url: String,
    pub paper_api_url: String,
    pub neoforge_maven_url: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            vanilla_manifest_url: DEFAULT_VANILLA_MANIFEST_URL.to_string(),
            paper_api_url: DEFAULT_PAPER_API_URL.to_string(),
            neoforge_maven_url: DEFAULT_NEOFORGE_MAVEN_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 60,
            user_agent: format!("serversmith/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub cache_dir: Option<String>,
}

impl Settings {
    /// Reads the settings file, falling back to defaults when it is missing.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::from_file(path)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ServerSmithError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ServerSmithError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` placeholders with environment variables.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| {
            ServerSmithError::ConfigValidationError {
                field: "env_substitution".to_string(),
                message: e.to_string(),
            }
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_seconds)
    }

    pub fn cache_dir_override(&self) -> Option<PathBuf> {
        self.paths.cache_dir.as_ref().map(PathBuf::from)
    }

    /// The timeout bounds connecting and each read, not the whole transfer,
    /// so a slow but steady jar download is never cut off.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        let client = reqwest::Client::builder()
            .connect_timeout(self.request_timeout())
            .read_timeout(self.request_timeout())
            .user_agent(self.http.user_agent.clone())
            .build()?;
        Ok(client)
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("java.binary", &self.java.binary)?;
        validation::validate_memory(self.java.min_memory_mb, self.java.max_memory_mb)?;

        validation::validate_url("sources.vanilla_manifest_url", &self.sources.vanilla_manifest_url)?;
        validation::validate_url("sources.paper_api_url", &self.sources.paper_api_url)?;
        validation::validate_url("sources.neoforge_maven_url", &self.sources.neoforge_maven_url)?;

        validation::validate_range("http.timeout_seconds", self.http.timeout_seconds, 1, 3600)?;

        if let Some(cache_dir) = &self.paths.cache_dir {
            validation::validate_path("paths.cache_dir", cache_dir)?;
        }

        Ok(())
    }
}
