//! Shared data structures for the shelf.
//!
//! These structs represent the data model that flows between the
//! directory service and whatever renders it.

use chrono::{DateTime, Local};
use image::RgbaImage;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// Display format for modification times
const LAST_MODIFIED_FORMAT: &str = "%Y/%m/%d %H:%M";

/// A decoded, display-sized thumbnail
#[derive(Debug, Clone, PartialEq)]
pub struct Thumbnail {
    /// File the pixels were decoded from (generated image or placeholder)
    pub source: PathBuf,
    pub image: Arc<RgbaImage>,
}

impl Thumbnail {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Where a record's thumbnail is in its lifecycle.
///
/// `Unloaded -> Loading -> {Loaded, PlaceholderLoaded, Failed}`.
/// Independent of whether the record is in the collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ThumbnailState {
    #[default]
    Unloaded,
    Loading,
    /// The generated thumbnail was decoded
    Loaded(Thumbnail),
    /// The generated thumbnail was absent, the placeholder was decoded instead
    PlaceholderLoaded(Thumbnail),
    /// Neither could be decoded; nothing is shown
    Failed,
}

impl ThumbnailState {
    /// The decoded image, if any
    pub fn image(&self) -> Option<&Thumbnail> {
        match self {
            Self::Loaded(t) | Self::PlaceholderLoaded(t) => Some(t),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Unloaded => "unloaded",
            Self::Loading => "loading",
            Self::Loaded(_) => "loaded",
            Self::PlaceholderLoaded(_) => "placeholder",
            Self::Failed => "failed",
        }
    }
}

/// Represents a single project on the shelf
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectRecord {
    /// File name only (e.g., "episode01.ymmp")
    pub name: String,
    /// Full path to the project file; compared case-insensitively
    pub path: PathBuf,
    /// Generated thumbnail image (None until the extractor has run)
    pub thumbnail_path: Option<PathBuf>,
    /// File modification time at load/add; drives the sort order
    pub last_modified: Option<DateTime<Local>>,
    pub thumbnail: ThumbnailState,
}

impl ProjectRecord {
    pub fn new(
        path: PathBuf,
        thumbnail_path: Option<PathBuf>,
        modified: Option<SystemTime>,
    ) -> Self {
        let name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        Self {
            name,
            path,
            thumbnail_path,
            last_modified: modified.map(DateTime::<Local>::from),
            thumbnail: ThumbnailState::Unloaded,
        }
    }

    /// Modification time as shown to the user; empty when unknown
    pub fn last_modified_display(&self) -> String {
        self.last_modified
            .map(|t| t.format(LAST_MODIFIED_FORMAT).to_string())
            .unwrap_or_default()
    }

    pub fn matches_path(&self, other: &Path) -> bool {
        same_path(&self.path, other)
    }

    /// Serializable snapshot for `list --json`
    pub fn summary(&self) -> ProjectSummary {
        ProjectSummary {
            name: self.name.clone(),
            path: self.path.clone(),
            thumbnail_path: self.thumbnail_path.clone(),
            last_modified: self.last_modified_display(),
            thumbnail: self.thumbnail.label(),
            thumbnail_size: self.thumbnail.image().map(|t| (t.width(), t.height())),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectSummary {
    pub name: String,
    pub path: PathBuf,
    pub thumbnail_path: Option<PathBuf>,
    pub last_modified: String,
    pub thumbnail: &'static str,
    pub thumbnail_size: Option<(u32, u32)>,
}

/// Case-insensitive path equality, the shelf's notion of "same project"
pub fn same_path(a: &Path, b: &Path) -> bool {
    a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
}
