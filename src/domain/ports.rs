use crate::domain::model::ServerType;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::Path;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &Path) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;

    /// Creates missing parent directories and replaces the file atomically.
    fn write_file(
        &self,
        path: &Path,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    fn exists(&self, path: &Path) -> impl std::future::Future<Output = bool> + Send;

    fn remove_dir_all(&self, path: &Path) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// A server flavour that can list its versions and locate its download.
#[async_trait]
pub trait Distribution: Send + Sync {
    fn server_type(&self) -> ServerType;

    /// Newest first.
    async fn fetch_versions(&self) -> Result<Vec<String>>;

    async fn download_url(&self, version: &str) -> Result<String>;

    /// True when the download is an installer that must run before the
    /// server can start.
    fn is_installer(&self) -> bool {
        false
    }
}
