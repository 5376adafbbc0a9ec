//! Error type shared by the shelf, the store and the thumbnail extractor.

use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong while maintaining the shelf.
///
/// None of these are fatal to the process: callers log them and degrade
/// the single project, thumbnail or save they belong to.
#[derive(Error, Debug)]
pub enum ShelfError {
    /// The ffmpeg binary is not where the config says it is
    #[error("ffmpeg not found: {0}")]
    DecoderMissing(PathBuf),

    /// A project file referenced by the shelf is gone
    #[error("project file does not exist: {0}")]
    ProjectMissing(PathBuf),

    /// A project file could not be parsed as JSON
    #[error("failed to parse project file {path}: {source}")]
    ProjectParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// projects.json could not be read or written as JSON
    #[error("project list is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A child process (ffmpeg, the OS opener) could not be started
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A thumbnail image could not be decoded
    #[error("image decode failed: {0}")]
    Image(#[from] image::ImageError),

    /// A blocking worker panicked or was cancelled
    #[error("background task failed: {0}")]
    Task(String),
}

impl ShelfError {
    /// True for the "precondition not met" family: the caller should carry
    /// on with a placeholder instead of giving up on the project.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::DecoderMissing(_) | Self::ProjectMissing(_))
    }
}

pub type Result<T> = std::result::Result<T, ShelfError>;
