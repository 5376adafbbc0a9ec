//! Media handling for project thumbnails.
//!
//! This module handles:
//! - Reading the first clip's source out of a project file
//! - Extracting a single frame with ffmpeg into the image cache
//! - Decoding generated thumbnails (or the placeholder) for display

pub mod preview;
pub mod project_file;
pub mod thumbnail;

#[cfg(all(test, unix))]
pub mod testing;
