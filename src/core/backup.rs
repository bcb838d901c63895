use crate::core::process;
use crate::domain::model::ServerInstance;
use crate::utils::error::{Result, ServerSmithError};
use chrono::Local;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Zips the whole instance directory into `backups_dir`.
///
/// Refused while the server is running, since world files change underneath.
pub async fn backup_instance(instance: &ServerInstance, backups_dir: &Path) -> Result<PathBuf> {
    if process::is_recorded_running(instance) {
        return Err(ServerSmithError::AlreadyRunning(instance.location.clone()));
    }

    let file_name = format!(
        "{}-{}.zip",
        instance.name.replace(' ', "_"),
        Local::now().format("%Y%m%d-%H%M%S")
    );
    let archive_path = backups_dir.join(file_name);
    tokio::fs::create_dir_all(backups_dir).await?;

    let source = instance.location.clone();
    let target = archive_path.clone();
    let pid_file = instance.pid_file();
    let written =
        tokio::task::spawn_blocking(move || write_archive(&source, &target, &pid_file))
            .await
            .map_err(|e| ServerSmithError::process(format!("Backup task failed: {}", e)))
            .and_then(|result| result);
    let file_count = match written {
        Ok(count) => count,
        Err(e) => {
            if let Err(remove_err) = tokio::fs::remove_file(&archive_path).await {
                tracing::debug!("No partial backup to remove: {}", remove_err);
            }
            return Err(e);
        }
    };

    tracing::info!(
        "Backed up {} files of {} to {}",
        file_count,
        instance.name,
        archive_path.display()
    );
    Ok(archive_path)
}

fn write_archive(source: &Path, target: &Path, pid_file: &Path) -> Result<usize> {
    let mut zip = ZipWriter::new(File::create(target)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut file_count = 0;

    for entry in WalkDir::new(source).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        if entry.path() == pid_file {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| ServerSmithError::process(e.to_string()))?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            zip.add_directory(name, options)?;
        } else {
            zip.start_file(name, options)?;
            let mut file = File::open(entry.path())?;
            io::copy(&mut file, &mut zip)?;
            file_count += 1;
        }
    }

    zip.finish()?;
    Ok(file_count)
}
