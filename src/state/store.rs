use std::path::{Path, PathBuf};

use crate::error::Result;

/// The persisted project list: a JSON array of absolute path strings.
///
/// Order in the file carries no meaning; the directory re-sorts on load.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    path: PathBuf,
}

impl ProjectStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the path to the list file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the list. A missing file is an empty list, not an error.
    pub async fn load(&self) -> Result<Vec<PathBuf>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("{} does not exist yet", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        // Editors may write a BOM; `null` documents and entries read as empty.
        let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
        let paths: Option<Vec<Option<PathBuf>>> = serde_json::from_str(text)?;
        Ok(paths.unwrap_or_default().into_iter().flatten().collect())
    }

    /// Replace the whole file with `paths`
    pub async fn save(&self, paths: &[PathBuf]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string(paths)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}
