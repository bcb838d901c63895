use crate::config::settings::SourcesConfig;
use crate::core::Distribution;
use crate::domain::model::ServerType;
use crate::utils::error::{Result, ServerSmithError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

/// Versions offered when the NeoForge maven cannot be reached.
pub const NEOFORGE_FALLBACK_VERSIONS: [&str; 2] = ["20.4.80-beta", "20.2.86"];

async fn get_json(client: &Client, url: &str) -> Result<Value> {
    tracing::debug!("GET {}", url);
    let response = client.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(ServerSmithError::distribution(format!(
            "{} returned HTTP {}",
            url, status
        )));
    }

    Ok(response.json().await?)
}

fn string_array(root: &Value, field: &str) -> Vec<String> {
    root.get(field)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn trim_base(url: &str) -> &str {
    url.trim_end_matches('/')
}

pub struct VanillaDistribution {
    client: Client,
    manifest_url: String,
}

impl VanillaDistribution {
    pub fn new(client: Client, manifest_url: impl Into<String>) -> Self {
        Self {
            client,
            manifest_url: manifest_url.into(),
        }
    }
}

#[async_trait]
impl Distribution for VanillaDistribution {
    fn server_type(&self) -> ServerType {
        ServerType::Vanilla
    }

    async fn fetch_versions(&self) -> Result<Vec<String>> {
        let root = get_json(&self.client, &self.manifest_url).await?;

        let versions = root
            .get("versions")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.get("type").and_then(Value::as_str) == Some("release"))
                    .filter_map(|e| e.get("id").and_then(Value::as_str).map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Ok(versions)
    }

    async fn download_url(&self, version: &str) -> Result<String> {
        let root = get_json(&self.client, &self.manifest_url).await?;

        let version_url = root
            .get("versions")
            .and_then(Value::as_array)
            .and_then(|entries| {
                entries
                    .iter()
                    .find(|e| e.get("id").and_then(Value::as_str) == Some(version))
            })
            .and_then(|e| e.get("url").and_then(Value::as_str))
            .ok_or_else(|| ServerSmithError::VersionNotFound {
                server_type: ServerType::Vanilla.to_string(),
                version: version.to_string(),
            })?;

        let meta = get_json(&self.client, version_url).await?;
        meta.pointer("/downloads/server/url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                ServerSmithError::distribution(format!(
                    "Vanilla {} has no server download",
                    version
                ))
            })
    }
}

pub struct PaperDistribution {
    client: Client,
    api_url: String,
}

impl PaperDistribution {
    pub fn new(client: Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
        }
    }

    fn project_url(&self) -> String {
        format!("{}/projects/paper", trim_base(&self.api_url))
    }
}

#[async_trait]
impl Distribution for PaperDistribution {
    fn server_type(&self) -> ServerType {
        ServerType::Paper
    }

    async fn fetch_versions(&self) -> Result<Vec<String>> {
        let root = get_json(&self.client, &self.project_url()).await?;

        // The API lists oldest first.
        let mut versions = string_array(&root, "versions");
        versions.reverse();
        Ok(versions)
    }

    async fn download_url(&self, version: &str) -> Result<String> {
        let version_url = format!("{}/versions/{}", self.project_url(), version);
        let root = get_json(&self.client, &format!("{}/builds", version_url)).await?;

        let latest = root
            .get("builds")
            .and_then(Value::as_array)
            .and_then(|builds| builds.last())
            .ok_or_else(|| ServerSmithError::VersionNotFound {
                server_type: ServerType::Paper.to_string(),
                version: version.to_string(),
            })?;

        let build = latest
            .get("build")
            .and_then(Value::as_i64)
            .ok_or_else(|| ServerSmithError::distribution("Paper build entry has no build number"))?;
        let file_name = latest
            .pointer("/downloads/application/name")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ServerSmithError::distribution(format!(
                    "Paper build {} has no application download",
                    build
                ))
            })?;

        Ok(format!(
            "{}/builds/{}/downloads/{}",
            version_url, build, file_name
        ))
    }
}

pub struct NeoForgeDistribution {
    client: Client,
    maven_url: String,
}

impl NeoForgeDistribution {
    pub fn new(client: Client, maven_url: impl Into<String>) -> Self {
        Self {
            client,
            maven_url: maven_url.into(),
        }
    }

    async fn fetch_remote_versions(&self) -> Result<Vec<String>> {
        let url = format!(
            "{}/api/maven/versions/releases/net/neoforged/neoforge",
            trim_base(&self.maven_url)
        );
        let root = get_json(&self.client, &url).await?;

        let mut versions = string_array(&root, "versions");
        versions.reverse();
        Ok(versions)
    }
}

#[async_trait]
impl Distribution for NeoForgeDistribution {
    fn server_type(&self) -> ServerType {
        ServerType::NeoForge
    }

    async fn fetch_versions(&self) -> Result<Vec<String>> {
        match self.fetch_remote_versions().await {
            Ok(versions) => Ok(versions),
            Err(e) => {
                tracing::error!("Failed to fetch NeoForge versions: {}", e);
                tracing::warn!("Falling back to the built-in NeoForge version list");
                Ok(NEOFORGE_FALLBACK_VERSIONS
                    .iter()
                    .map(|v| v.to_string())
                    .collect())
            }
        }
    }

    async fn download_url(&self, version: &str) -> Result<String> {
        Ok(format!(
            "{}/releases/net/neoforged/neoforge/{v}/neoforge-{v}-installer.jar",
            trim_base(&self.maven_url),
            v = version
        ))
    }

    fn is_installer(&self) -> bool {
        true
    }
}

/// Custom servers bring their own jar and have no catalog.
pub fn distribution_for(
    server_type: ServerType,
    sources: &SourcesConfig,
    client: Client,
) -> Option<Box<dyn Distribution>> {
    match server_type {
        ServerType::Vanilla => Some(Box::new(VanillaDistribution::new(
            client,
            sources.vanilla_manifest_url.clone(),
        ))),
        ServerType::Paper => Some(Box::new(PaperDistribution::new(
            client,
            sources.paper_api_url.clone(),
        ))),
        ServerType::NeoForge => Some(Box::new(NeoForgeDistribution::new(
            client,
            sources.neoforge_maven_url.clone(),
        ))),
        ServerType::Custom => None,
    }
}
