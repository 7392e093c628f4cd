//! Cover art preparation.

use image::{imageops::FilterType, DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Edge length of the square cover, in pixels.
pub const COVER_SIZE: u32 = 500;

/// Suffix of the temporary resized cover written next to the audio file.
pub const RESIZED_COVER_SUFFIX: &str = "cover500.jpg";

/// Album folder cover written when the folder has none.
pub const FOLDER_COVER_NAME: &str = "cover.jpg";

/// Folder images used when the extractor produced no thumbnail, in preference order.
pub const FOLDER_COVER_FALLBACKS: &[&str] = &["folder.jpg", "cover.jpg", "front.jpg", "album.jpg"];

#[derive(Debug, Error)]
pub enum ArtworkError {
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Artwork task failed: {0}")]
    Task(String),
}

/// Pick the image to use as cover: the thumbnail if present, otherwise a
/// well-known image in the track's folder.
pub fn find_cover_source(audio_path: &Path, thumbnail: Option<&Path>) -> Option<PathBuf> {
    if let Some(thumb) = thumbnail.filter(|p| p.is_file()) {
        return Some(thumb.to_path_buf());
    }

    let folder = audio_path.parent()?;
    FOLDER_COVER_FALLBACKS
        .iter()
        .map(|name| folder.join(name))
        .find(|p| p.is_file())
}

/// Path of the temporary resized cover for an audio file.
pub fn resized_cover_path(audio_path: &Path) -> PathBuf {
    audio_path.with_extension(RESIZED_COVER_SUFFIX)
}

/// Center-crop and scale to a `COVER_SIZE` square JPEG.
pub fn render_cover(image: &DynamicImage) -> Result<Vec<u8>, ArtworkError> {
    let resized = image.resize_to_fill(COVER_SIZE, COVER_SIZE, FilterType::Lanczos3);

    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());
    let mut buffer = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Jpeg)?;
    Ok(buffer)
}

/// Load `source`, render the square cover and write it to `dest`.
pub fn render_cover_file(source: &Path, dest: &Path) -> Result<Vec<u8>, ArtworkError> {
    let image = image::open(source)?;
    let jpeg = render_cover(&image)?;
    std::fs::write(dest, &jpeg)?;
    Ok(jpeg)
}

/// Async wrapper running the resize on the blocking pool.
pub async fn prepare_cover(source: PathBuf, dest: PathBuf) -> Result<Vec<u8>, ArtworkError> {
    tokio::task::spawn_blocking(move || render_cover_file(&source, &dest))
        .await
        .map_err(|e| ArtworkError::Task(e.to_string()))?
}

/// Write `jpeg` as the folder cover unless one already exists.
///
/// Returns true when a file was written.
pub fn ensure_folder_cover(folder: &Path, jpeg: &[u8]) -> Result<bool, ArtworkError> {
    let path = folder.join(FOLDER_COVER_NAME);
    if path.exists() {
        return Ok(false);
    }
    std::fs::write(&path, jpeg)?;
    Ok(true)
}
