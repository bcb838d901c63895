use crate::config::paths::user_home;
use crate::core::Storage;
use crate::domain::model::{metadata_path, Registry, ServerInstance};
use crate::utils::error::{Result, ServerSmithError};
use std::path::{Path, PathBuf};

/// Keeps `config.json` and the per-instance metadata files in sync with the
/// in-memory list of instances.
pub struct InstanceManager<S: Storage> {
    storage: S,
    registry_file: PathBuf,
    registry: Registry,
    instances: Vec<ServerInstance>,
}

impl<S: Storage> InstanceManager<S> {
    pub async fn load(storage: S, registry_file: impl Into<PathBuf>) -> Self {
        let registry_file = registry_file.into();
        let registry = Self::load_registry(&storage, &registry_file).await;

        let mut manager = Self {
            storage,
            registry_file,
            registry,
            instances: Vec::new(),
        };
        manager.scan_instances().await;
        manager
    }

    async fn load_registry(storage: &S, path: &Path) -> Registry {
        if !storage.exists(path).await {
            return Registry::default();
        }

        let parsed = match storage.read_file(path).await {
            Ok(bytes) => serde_json::from_slice::<Registry>(&bytes).map_err(ServerSmithError::from),
            Err(e) => Err(e),
        };

        parsed.unwrap_or_else(|e| {
            tracing::error!("Failed to load config {}: {}", path.display(), e);
            Registry::default()
        })
    }

    pub async fn save_registry(&self) -> Result<()> {
        let data = serde_json::to_vec_pretty(&self.registry)?;
        self.storage.write_file(&self.registry_file, &data).await
    }

    async fn scan_instances(&mut self) {
        self.instances.clear();

        let known: Vec<PathBuf> = self
            .registry
            .known_instances
            .iter()
            .map(PathBuf::from)
            .collect();

        for path in known {
            if !self.storage.exists(&path).await {
                // Possibly an unplugged drive; keep it registered.
                tracing::debug!("Skipping missing instance directory {}", path.display());
                continue;
            }

            let meta_path = metadata_path(&path);
            if !self.storage.exists(&meta_path).await {
                continue;
            }

            match self.read_metadata(&path).await {
                Ok(instance) => self.instances.push(instance),
                Err(e) => {
                    tracing::error!("Failed to load instance metadata from {}: {}", path.display(), e)
                }
            }
        }
    }

    async fn read_metadata(&self, dir: &Path) -> Result<ServerInstance> {
        let bytes = self.storage.read_file(&metadata_path(dir)).await?;
        let mut instance: ServerInstance = serde_json::from_slice(&bytes)?;
        instance.location = dir.to_path_buf();
        Ok(instance)
    }

    pub async fn add_instance(&mut self, instance: ServerInstance) -> Result<()> {
        let key = absolute_key(&instance.location);
        if self.registry.known_instances.insert(key) {
            self.save_registry().await?;
        }

        self.save_instance_metadata(&instance).await?;
        if !self.instances.iter().any(|i| i.location == instance.location) {
            self.instances.push(instance);
        }
        Ok(())
    }

    /// Registers a directory that already carries ServerSmith metadata.
    pub async fn import_instance(&mut self, dir: &Path) -> Result<ServerInstance> {
        let dir = std::path::absolute(dir)?;
        if !self.storage.exists(&metadata_path(&dir)).await {
            return Err(ServerSmithError::InstanceNotFound(dir.display().to_string()));
        }

        let instance = self.read_metadata(&dir).await?;
        self.add_instance(instance.clone()).await?;
        tracing::info!("Imported instance {} from {}", instance.name, dir.display());
        Ok(instance)
    }

    pub async fn remove_instance(&mut self, location: &Path) -> Result<()> {
        self.registry.known_instances.remove(&absolute_key(location));
        self.instances.retain(|i| i.location.as_path() != location);
        self.save_registry().await
    }

    pub async fn delete_instance(&mut self, location: &Path) -> Result<()> {
        self.remove_instance(location).await?;
        self.storage.remove_dir_all(location).await.map_err(|e| {
            tracing::error!("Failed to delete instance directory {}: {}", location.display(), e);
            e
        })
    }

    pub async fn save_instance_metadata(&mut self, instance: &ServerInstance) -> Result<()> {
        let data = serde_json::to_vec_pretty(instance)?;
        self.storage
            .write_file(&instance.metadata_path(), &data)
            .await?;

        if let Some(existing) = self
            .instances
            .iter_mut()
            .find(|i| i.location == instance.location)
        {
            *existing = instance.clone();
        }
        Ok(())
    }

    pub fn instances(&self) -> &[ServerInstance] {
        &self.instances
    }

    /// Looks up by exact name first, then by directory.
    pub fn find(&self, name_or_path: &str) -> Option<&ServerInstance> {
        self.instances
            .iter()
            .find(|i| i.name == name_or_path)
            .or_else(|| {
                let wanted = std::path::absolute(name_or_path).ok()?;
                self.instances.iter().find(|i| i.location == wanted)
            })
    }

    pub fn filter(&self, query: &str) -> Vec<&ServerInstance> {
        let query = query.to_lowercase();
        self.instances
            .iter()
            .filter(|i| query.is_empty() || i.name.to_lowercase().contains(&query))
            .collect()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn default_base_directory(&self) -> PathBuf {
        self.registry
            .default_base_directory
            .as_ref()
            .map(PathBuf::from)
            .or_else(user_home)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub async fn set_default_base_directory(&mut self, dir: &Path) -> Result<()> {
        self.registry.default_base_directory = Some(absolute_key(dir));
        self.save_registry().await
    }
}

fn absolute_key(path: &Path) -> String {
    std::path::absolute(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}
