//! Runtime configuration.
//!
//! Every location the shelf touches is derived from one data directory,
//! plus the path of the ffmpeg binary used for thumbnails.

use std::path::{Path, PathBuf};

/// Name of the persisted project list inside the data directory
pub const PROJECT_LIST_FILE: &str = "projects.json";

/// Image cache directory inside the data directory
pub const IMAGE_DIR: &str = "Images";

/// Fallback image shown while a thumbnail is missing
pub const PLACEHOLDER_FILE: &str = "placeholder.png";

/// Append-only diagnostics log inside the data directory
pub const LOG_FILE: &str = "ymmp-shelf.log";

const APP_DIR: &str = "ymmp-shelf";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Where projects.json, Images/ and the log live
    pub data_dir: PathBuf,
    /// ffmpeg binary; may not exist, in which case thumbnails degrade
    pub decoder_path: PathBuf,
}

impl Config {
    pub fn new(data_dir: impl Into<PathBuf>, decoder_path: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            decoder_path: decoder_path.into(),
        }
    }

    /// Resolve the configuration from optional command-line values.
    ///
    /// Missing values fall back to the platform data directory and to
    /// ffmpeg discovery (see [`find_ffmpeg`]).
    pub fn resolve(
        data_dir: Option<PathBuf>,
        ffmpeg: Option<PathBuf>,
        host_dir: Option<PathBuf>,
    ) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        let decoder_path = ffmpeg.unwrap_or_else(|| find_ffmpeg(host_dir.as_deref()));
        Self::new(data_dir, decoder_path)
    }

    pub fn project_list_path(&self) -> PathBuf {
        self.data_dir.join(PROJECT_LIST_FILE)
    }

    pub fn image_dir(&self) -> PathBuf {
        self.data_dir.join(IMAGE_DIR)
    }

    pub fn placeholder_path(&self) -> PathBuf {
        self.image_dir().join(PLACEHOLDER_FILE)
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(LOG_FILE)
    }
}

/// Get the default data directory
/// - Linux: ~/.local/share/ymmp-shelf
/// - macOS: ~/Library/Application Support/ymmp-shelf
/// - Windows: %APPDATA%\ymmp-shelf
fn default_data_dir() -> PathBuf {
    let mut path = dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    path.push(APP_DIR);
    path
}

fn ffmpeg_binary_name() -> &'static str {
    if cfg!(windows) {
        "ffmpeg.exe"
    } else {
        "ffmpeg"
    }
}

/// Find the ffmpeg binary.
///
/// Checks the editor's bundled copy under `<host_dir>/user/resources/ffmpeg`,
/// then next to our own executable, then the system PATH. When nothing is
/// found the first candidate is returned anyway so that the precondition
/// error names a concrete path.
pub fn find_ffmpeg(host_dir: Option<&Path>) -> PathBuf {
    let binary_name = ffmpeg_binary_name();
    let mut candidates = Vec::new();

    if let Some(host_dir) = host_dir {
        candidates.push(
            host_dir
                .join("user")
                .join("resources")
                .join("ffmpeg")
                .join(binary_name),
        );
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.push(exe_dir.join(binary_name));
        }
    }

    if let Some(found) = candidates.iter().find(|p| p.exists()) {
        return found.clone();
    }

    if let Some(found) = find_on_path(binary_name) {
        return found;
    }

    candidates
        .into_iter()
        .next()
        .unwrap_or_else(|| PathBuf::from(binary_name))
}

fn find_on_path(binary_name: &str) -> Option<PathBuf> {
    let locator = if cfg!(windows) { "where" } else { "which" };
    let output = std::process::Command::new(locator)
        .arg(binary_name)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let first_line = stdout.lines().next().unwrap_or("").trim();
    if first_line.is_empty() {
        return None;
    }
    let path = PathBuf::from(first_line);
    path.exists().then_some(path)
}
