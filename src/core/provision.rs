use crate::config::settings::SourcesConfig;
use crate::core::catalog::distribution_for;
use crate::core::download::Downloader;
use crate::core::registry::InstanceManager;
use crate::core::Storage;
use crate::domain::model::{ProvisionEvent, ServerInstance, ServerType};
use crate::utils::error::{Result, ServerSmithError};
use crate::utils::validation::{self, Validate};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct CreateRequest {
    pub name: String,
    pub server_type: ServerType,
    pub version: String,
    pub base_dir: PathBuf,
    pub eula_accepted: bool,
    pub custom_jar: Option<PathBuf>,
    pub min_memory: u32,
    pub max_memory: u32,
}

impl CreateRequest {
    pub fn instance_dir(&self) -> PathBuf {
        self.base_dir.join(&self.name)
    }
}

impl Validate for CreateRequest {
    fn validate(&self) -> Result<()> {
        validation::validate_instance_name(&self.name)?;
        if !self.eula_accepted {
            return Err(ServerSmithError::EulaNotAccepted);
        }
        validation::validate_memory(self.min_memory, self.max_memory)?;

        match (&self.server_type, &self.custom_jar) {
            (ServerType::Custom, None) => Err(ServerSmithError::MissingConfigError {
                field: "jar".to_string(),
            }),
            (ServerType::Custom, Some(jar)) if !jar.is_file() => {
                Err(ServerSmithError::InvalidConfigValueError {
                    field: "jar".to_string(),
                    value: jar.display().to_string(),
                    reason: "File does not exist".to_string(),
                })
            }
            (ServerType::Custom, Some(_)) => Ok(()),
            (server_type, Some(jar)) => Err(ServerSmithError::InvalidConfigValueError {
                field: "jar".to_string(),
                value: jar.display().to_string(),
                reason: format!("A local jar can only be used for Custom servers, not {}", server_type),
            }),
            (_, None) => validation::validate_non_empty_string("version", &self.version),
        }
    }
}

/// Creates instances: directory, EULA, server jar, installer run, registration.
pub struct Provisioner {
    client: Client,
    downloader: Downloader,
    sources: SourcesConfig,
    java_binary: String,
}

impl Provisioner {
    pub fn new(
        client: Client,
        downloader: Downloader,
        sources: SourcesConfig,
        java_binary: impl Into<String>,
    ) -> Self {
        Self {
            client,
            downloader,
            sources,
            java_binary: java_binary.into(),
        }
    }

    pub async fn create<S, F>(
        &self,
        manager: &mut InstanceManager<S>,
        request: &CreateRequest,
        on_event: F,
    ) -> Result<ServerInstance>
    where
        S: Storage,
        F: Fn(ProvisionEvent) + Send + Sync,
    {
        request.validate()?;

        let instance_dir = std::path::absolute(request.instance_dir())?;
        if instance_dir.exists() {
            on_event(ProvisionEvent::Status("Error: Directory already exists!".to_string()));
            return Err(ServerSmithError::DirectoryExists(instance_dir));
        }

        on_event(ProvisionEvent::Log(format!(
            "Creating directory: {}",
            instance_dir.display()
        )));
        tokio::fs::create_dir_all(&instance_dir).await?;

        let result = match self.install(&instance_dir, request, &on_event).await {
            Ok(()) => register(manager, request, &instance_dir).await,
            Err(e) => Err(e),
        };

        let instance = match result {
            Ok(instance) => instance,
            Err(e) => {
                on_event(ProvisionEvent::Status("Error!".to_string()));
                on_event(ProvisionEvent::Log(format!("FAILED: {}", e)));
                discard(manager, &instance_dir).await;
                return Err(e);
            }
        };

        on_event(ProvisionEvent::Progress(1.0));
        on_event(ProvisionEvent::Status("Success!".to_string()));
        tracing::info!(
            "Created {} {} instance {} at {}",
            instance.server_type,
            instance.version,
            instance.name,
            instance_dir.display()
        );
        Ok(instance)
    }

    async fn install<F>(&self, instance_dir: &Path, request: &CreateRequest, on_event: &F) -> Result<()>
    where
        F: Fn(ProvisionEvent) + Send + Sync,
    {
        tokio::fs::write(instance_dir.join("eula.txt"), "eula=true\n").await?;
        on_event(ProvisionEvent::Log("Accepted EULA.".to_string()));

        if let Some(jar) = &request.custom_jar {
            on_event(ProvisionEvent::Log(format!("Copying {}", jar.display())));
            tokio::fs::copy(jar, instance_dir.join("server.jar")).await?;
            return Ok(());
        }

        let distribution = distribution_for(request.server_type, &self.sources, self.client.clone())
            .ok_or_else(|| ServerSmithError::distribution("Could not find download URL."))?;

        on_event(ProvisionEvent::Log(format!(
            "Fetching download URL for {} {}...",
            request.server_type, request.version
        )));
        let url = distribution.download_url(&request.version).await?;

        on_event(ProvisionEvent::Status("Downloading...".to_string()));
        on_event(ProvisionEvent::Log(format!("Downloading jar from {}", url)));

        let is_installer = distribution.is_installer();
        let target = instance_dir.join(if is_installer { "installer.jar" } else { "server.jar" });
        self.downloader
            .download(&url, &target, |p| on_event(ProvisionEvent::Progress(p)))
            .await?;
        on_event(ProvisionEvent::Log("Download complete.".to_string()));

        if is_installer {
            on_event(ProvisionEvent::Status(
                "Running Installer... (This may take a while)".to_string(),
            ));
            on_event(ProvisionEvent::Log(format!(
                "Launching {} installer...",
                request.server_type
            )));
            run_installer(&self.java_binary, instance_dir).await?;
            on_event(ProvisionEvent::Log("Installer finished successfully.".to_string()));
        }

        Ok(())
    }
}

/// Removes a half-created instance from disk and, if it got that far, from
/// the registry.
async fn discard<S: Storage>(manager: &mut InstanceManager<S>, instance_dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(instance_dir).await {
        tracing::warn!(
            "Could not remove partial instance {}: {}",
            instance_dir.display(),
            e
        );
    }

    let registered = manager
        .registry()
        .known_instances
        .contains(instance_dir.to_string_lossy().as_ref());
    if registered {
        if let Err(e) = manager.remove_instance(instance_dir).await {
            tracing::warn!(
                "Could not unregister partial instance {}: {}",
                instance_dir.display(),
                e
            );
        }
    }
}

async fn register<S: Storage>(
    manager: &mut InstanceManager<S>,
    request: &CreateRequest,
    instance_dir: &Path,
) -> Result<ServerInstance> {
    let version = if request.version.trim().is_empty() {
        "custom".to_string()
    } else {
        request.version.clone()
    };
    let mut instance =
        ServerInstance::new(&request.name, request.server_type, version, instance_dir);
    instance.min_memory = request.min_memory;
    instance.max_memory = request.max_memory;
    manager.add_instance(instance.clone()).await?;
    Ok(instance)
}

/// Runs `<java> -jar installer.jar --installServer` in the instance directory.
pub async fn run_installer(java_binary: &str, instance_dir: &Path) -> Result<()> {
    let mut child = Command::new(java_binary)
        .args(["-jar", "installer.jar", "--installServer"])
        .current_dir(instance_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ServerSmithError::process(format!("Failed to launch {}: {}", java_binary, e)))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let (_, _, status) = tokio::join!(drain_output(stdout), drain_output(stderr), child.wait());

    let status = status?;
    if !status.success() {
        return Err(ServerSmithError::InstallerFailed(status.code().unwrap_or(-1)));
    }
    Ok(())
}

async fn drain_output<R: AsyncRead + Unpin>(stream: Option<R>) {
    let Some(stream) = stream else {
        return;
    };
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!("[Installer] {}", line);
    }
}
