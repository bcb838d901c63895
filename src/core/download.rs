use crate::utils::error::{Result, ServerSmithError};
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use url::Url;

/// Downloads server jars through a shared on-disk cache.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    cache_dir: PathBuf,
}

impl Downloader {
    pub fn new(client: Client, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            cache_dir: cache_dir.into(),
        }
    }

    /// Cache key for a URL: its path segments joined with `_`, so jars that
    /// share a file name under different directories stay apart.
    pub fn cache_file_name(url: &str) -> String {
        let from_url = Url::parse(url).ok().and_then(|u| {
            u.path_segments().map(|segments| {
                segments
                    .filter(|segment| !segment.is_empty())
                    .collect::<Vec<_>>()
                    .join("_")
            })
        });

        from_url
            .or_else(|| url.rsplit('/').next().map(str::to_string))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "download.jar".to_string())
    }

    pub fn cached_path(&self, url: &str) -> PathBuf {
        self.cache_dir.join(Self::cache_file_name(url))
    }

    pub async fn download<F>(&self, url: &str, destination: &Path, on_progress: F) -> Result<()>
    where
        F: Fn(f64) + Send + Sync,
    {
        let cached_file = self.cached_path(url);

        if fs::try_exists(&cached_file).await.unwrap_or(false) {
            tracing::info!("Using cached file: {}", cached_file.display());
            copy_to(&cached_file, destination).await?;
            on_progress(1.0);
            return Ok(());
        }

        fs::create_dir_all(&self.cache_dir).await?;

        let mut part_name = cached_file.file_name().unwrap_or_default().to_os_string();
        part_name.push(".part");
        let part_file = cached_file.with_file_name(part_name);

        if let Err(e) = self.fetch_into(url, &part_file, &on_progress).await {
            tracing::error!("Download failed: {}: {}", url, e);
            let _ = fs::remove_file(&part_file).await;
            return Err(e);
        }

        fs::rename(&part_file, &cached_file).await?;
        copy_to(&cached_file, destination).await?;
        tracing::debug!("Downloaded {} to {}", url, destination.display());
        Ok(())
    }

    async fn fetch_into<F>(&self, url: &str, target: &Path, on_progress: &F) -> Result<()>
    where
        F: Fn(f64) + Send + Sync,
    {
        let mut response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServerSmithError::distribution(format!(
                "{} returned HTTP {}",
                url, status
            )));
        }

        let total_bytes = response.content_length().unwrap_or(0);
        let mut read_bytes: u64 = 0;
        let mut out = fs::File::create(target).await?;

        while let Some(chunk) = response.chunk().await? {
            out.write_all(&chunk).await?;
            read_bytes += chunk.len() as u64;
            if total_bytes > 0 {
                on_progress(read_bytes as f64 / total_bytes as f64);
            }
        }

        out.flush().await?;
        Ok(())
    }
}

async fn copy_to(source: &Path, destination: &Path) -> Result<()> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::copy(source, destination).await?;
    Ok(())
}
