//! The outward-facing side of the shelf: adding dropped or imported files,
//! resolving user queries and opening projects with the OS.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{Result, ShelfError};
use crate::media::project_file::is_project_file;
use crate::state::data::ProjectRecord;
use crate::state::directory::ProjectDirectory;

/// Result of a folder import operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportResult {
    pub imported_count: usize,
    pub skipped_count: usize,
}

/// Adapter between user actions and the project directory
#[derive(Debug)]
pub struct ProjectShelf {
    directory: ProjectDirectory,
}

impl ProjectShelf {
    pub fn new(config: &Config) -> Self {
        Self {
            directory: ProjectDirectory::from_config(config),
        }
    }

    pub fn directory(&self) -> &ProjectDirectory {
        &self.directory
    }

    pub fn directory_mut(&mut self) -> &mut ProjectDirectory {
        &mut self.directory
    }

    /// Load the persisted list. A broken list is logged and leaves the
    /// shelf empty for this session.
    pub async fn load(&mut self) -> usize {
        match self.directory.load_all().await {
            Ok(count) => count,
            Err(e) => {
                log::error!(
                    "failed to load {}: {}",
                    self.directory.store().path().display(),
                    e
                );
                0
            }
        }
    }

    pub async fn add_project(&mut self, path: &Path) -> bool {
        self.directory.add(path).await
    }

    /// Add the project files out of a dropped path list; other files are
    /// ignored. Returns how many were added.
    pub async fn add_dropped<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut added = 0;
        for path in paths {
            let path = path.as_ref();
            if !is_project_file(path) {
                log::debug!("dropped file ignored: {}", path.display());
                continue;
            }
            if self.add_project(path).await {
                added += 1;
            }
        }
        added
    }

    /// Add every project file under `folder`, recursively
    pub async fn import_folder(&mut self, folder: &Path) -> ImportResult {
        log::info!("scanning folder: {}", folder.display());

        let found: Vec<PathBuf> = WalkDir::new(folder)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_project_file(e.path()))
            .map(|e| e.into_path())
            .collect();

        let mut result = ImportResult::default();
        for path in found {
            if self.add_project(&path).await {
                result.imported_count += 1;
            } else {
                result.skipped_count += 1;
            }
        }

        log::info!(
            "import complete: {} new, {} skipped",
            result.imported_count,
            result.skipped_count
        );
        result
    }

    /// Resolve a record by path, or by file name with or without extension
    pub fn find(&self, query: &str) -> Option<&ProjectRecord> {
        if let Some(record) = self.directory.find(Path::new(query)) {
            return Some(record);
        }

        let query = query.to_lowercase();
        self.directory.records().iter().find(|r| {
            let name = r.name.to_lowercase();
            let stem = r
                .path
                .file_stem()
                .map(|s| s.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            name == query || stem == query
        })
    }

    /// Open a project with the OS default application.
    ///
    /// A project whose file is gone is a no-op. Launch failures are logged.
    /// Returns whether a launch was started.
    pub fn open_project(&self, record: &ProjectRecord) -> bool {
        if !record.path.exists() {
            log::warn!("open skipped, file does not exist: {}", record.path.display());
            return false;
        }

        match launch_with_default_app(&record.path) {
            Ok(()) => {
                log::info!("project opened: {}", record.path.display());
                true
            }
            Err(e) => {
                log::error!("open failed for {}: {}", record.path.display(), e);
                false
            }
        }
    }
}

fn launch_with_default_app(path: &Path) -> Result<()> {
    let mut command = opener_command(path);
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    spawn_reaped(command).map(|_| ())
}

/// Spawn a detached child and wait for it on a background thread so it does
/// not linger as a zombie after it exits.
fn spawn_reaped(mut command: Command) -> Result<JoinHandle<()>> {
    let program = command.get_program().to_string_lossy().to_string();
    let mut child = command
        .spawn()
        .map_err(|source| ShelfError::Launch { program: program.clone(), source })?;

    Ok(std::thread::spawn(move || match child.wait() {
        Ok(status) => log::debug!("{} exited with {}", program, status),
        Err(e) => log::warn!("waiting for {} failed: {}", program, e),
    }))
}

#[cfg(windows)]
fn opener_command(path: &Path) -> Command {
    use std::os::windows::process::CommandExt;
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;

    let mut command = Command::new("cmd");
    command
        .args(["/C", "start", ""])
        .arg(path)
        .creation_flags(CREATE_NO_WINDOW);
    command
}

#[cfg(target_os = "macos")]
fn opener_command(path: &Path) -> Command {
    let mut command = Command::new("open");
    command.arg(path);
    command
}

#[cfg(not(any(windows, target_os = "macos")))]
fn opener_command(path: &Path) -> Command {
    let mut command = Command::new("xdg-open");
    command.arg(path);
    command
}
