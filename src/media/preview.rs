//! Decoding thumbnails for display.
//!
//! Pixels are decoded on a blocking worker and scaled to the tile width,
//! falling back to the placeholder image when the generated file is absent.

use image::imageops::FilterType;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::thumbnail::THUMBNAIL_WIDTH;
use crate::error::{Result, ShelfError};
use crate::state::data::{Thumbnail, ThumbnailState};

/// Load the thumbnail for a record off the calling task.
///
/// Never fails: decode errors are logged and reported as
/// [`ThumbnailState::Failed`].
pub async fn load_thumbnail(thumbnail_path: Option<PathBuf>, placeholder: PathBuf) -> ThumbnailState {
    let outcome = tokio::task::spawn_blocking(move || {
        load_thumbnail_blocking(thumbnail_path.as_deref(), &placeholder)
    })
    .await
    .map_err(|e| ShelfError::Task(e.to_string()));

    match outcome {
        Ok(Ok(state)) => state,
        Ok(Err(e)) | Err(e) => {
            log::error!("thumbnail load failed: {}", e);
            ThumbnailState::Failed
        }
    }
}

/// Blocking version of thumbnail loading
fn load_thumbnail_blocking(thumbnail_path: Option<&Path>, placeholder: &Path) -> Result<ThumbnailState> {
    match thumbnail_path.filter(|p| p.exists()) {
        Some(path) => {
            let thumbnail = decode_scaled(path)?;
            log::info!("thumbnail loaded: {}", path.display());
            Ok(ThumbnailState::Loaded(thumbnail))
        }
        None => {
            let thumbnail = decode_scaled(placeholder)?;
            log::info!("placeholder loaded: {}", placeholder.display());
            Ok(ThumbnailState::PlaceholderLoaded(thumbnail))
        }
    }
}

/// Decode an image and scale it to the thumbnail width, keeping aspect ratio
fn decode_scaled(path: &Path) -> Result<Thumbnail> {
    let img = image::open(path)?;
    let img = if img.width() == THUMBNAIL_WIDTH {
        img
    } else {
        img.resize(THUMBNAIL_WIDTH, u32::MAX, FilterType::Triangle)
    };

    Ok(Thumbnail {
        source: path.to_path_buf(),
        image: Arc::new(img.to_rgba8()),
    })
}
