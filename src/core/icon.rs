use crate::utils::error::{Result, ServerSmithError};
use image::imageops::FilterType;
use image::ImageFormat;
use std::path::{Path, PathBuf};

/// Edge length of the icon shown in the multiplayer server list.
pub const ICON_SIZE: u32 = 64;
pub const ICON_FILE: &str = "server-icon.png";

/// Scales `source` to a 64x64 PNG and writes it as the instance's
/// `server-icon.png`, replacing any previous icon.
pub async fn save_server_icon(source: &Path, instance_dir: &Path) -> Result<PathBuf> {
    let target = instance_dir.join(ICON_FILE);

    let source_path = source.to_path_buf();
    let target_path = target.clone();
    tokio::task::spawn_blocking(move || write_icon(&source_path, &target_path))
        .await
        .map_err(|e| ServerSmithError::process(format!("Icon task failed: {}", e)))??;

    tracing::info!("Saved server icon from {} to {}", source.display(), target.display());
    Ok(target)
}

fn write_icon(source: &Path, target: &Path) -> Result<()> {
    let original = image::open(source)?;
    let resized = original.resize_exact(ICON_SIZE, ICON_SIZE, FilterType::Triangle);
    resized.to_rgba8().save_with_format(target, ImageFormat::Png)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgba, RgbaImage};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_icon_is_scaled_to_64_png() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("logo.png");
        RgbaImage::from_pixel(200, 120, Rgba([200, 40, 40, 255]))
            .save(&source)
            .unwrap();

        let icon = save_server_icon(&source, dir.path()).await.unwrap();

        assert_eq!(icon, dir.path().join("server-icon.png"));
        let saved = image::open(&icon).unwrap();
        assert_eq!(saved.dimensions(), (64, 64));
        let center = saved.to_rgba8().get_pixel(32, 32).0;
        for (actual, expected) in center.iter().zip([200u8, 40, 40, 255]) {
            assert!(actual.abs_diff(expected) <= 1, "pixel {:?}", center);
        }
        assert_eq!(image::guess_format(&std::fs::read(&icon).unwrap()).unwrap(), ImageFormat::Png);
    }

    #[tokio::test]
    async fn test_unreadable_image_is_an_error() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("notes.png");
        std::fs::write(&source, "not an image").unwrap();

        let err = save_server_icon(&source, dir.path()).await.unwrap_err();
        assert!(matches!(err, ServerSmithError::ImageError(_)));
        assert!(!dir.path().join("server-icon.png").exists());
    }
}
