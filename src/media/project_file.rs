//! Reading the parts of a `.ymmp` project file the shelf cares about.

use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::error::{Result, ShelfError};

/// Extension of the editor's project files, without the dot
pub const PROJECT_EXTENSION: &str = "ymmp";

/// JSON pointer to the source file of the first clip on the first timeline
const FIRST_CLIP_SOURCE: &str = "/Timelines/0/Items/0/FilePath";

/// True when `path` has the project extension (case-insensitive)
pub fn is_project_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(PROJECT_EXTENSION))
        .unwrap_or(false)
}

/// Source file of the first timeline's first item, if declared and non-empty
pub fn first_clip_source(root: &Value) -> Option<PathBuf> {
    root.pointer(FIRST_CLIP_SOURCE)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

/// Parse project file text. The editor writes UTF-8 with a byte-order mark.
pub fn parse(project_path: &Path, text: &str) -> Result<Value> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    serde_json::from_str(text).map_err(|source| ShelfError::ProjectParse {
        path: project_path.to_path_buf(),
        source,
    })
}

/// Pick what ffmpeg should decode for `project_path`.
///
/// Prefers the first clip's source; without one, the project file itself is
/// handed to ffmpeg, which will usually fail and leave the placeholder.
pub async fn resolve_decoder_input(project_path: &Path) -> Result<PathBuf> {
    let text = tokio::fs::read_to_string(project_path).await?;
    let root = parse(project_path, &text)?;

    match first_clip_source(&root) {
        Some(source) => Ok(source),
        None => {
            log::warn!(
                "no clip source in {}, using the project file itself as input",
                project_path.display()
            );
            Ok(project_path.to_path_buf())
        }
    }
}
