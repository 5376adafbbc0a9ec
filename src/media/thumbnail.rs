use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use super::project_file;
use crate::error::{Result, ShelfError};

/// Width of generated thumbnails; height follows the aspect ratio
pub const THUMBNAIL_WIDTH: u32 = 320;

/// Windows CREATE_NO_WINDOW process flag
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Extracts one frame per project with ffmpeg into the image cache.
#[derive(Debug, Clone)]
pub struct ThumbnailExtractor {
    decoder: PathBuf,
    image_dir: PathBuf,
}

impl ThumbnailExtractor {
    pub fn new(decoder: impl Into<PathBuf>, image_dir: impl Into<PathBuf>) -> Self {
        Self {
            decoder: decoder.into(),
            image_dir: image_dir.into(),
        }
    }

    /// Where the thumbnail for `project_path` lives: `<image_dir>/<stem>.png`
    pub fn output_path(&self, project_path: &Path) -> PathBuf {
        let stem = project_path.file_stem().unwrap_or_default();
        let mut file_name = stem.to_os_string();
        file_name.push(".png");
        self.image_dir.join(file_name)
    }

    /// Generate the thumbnail for a project.
    ///
    /// Fails only when ffmpeg or the project file is missing, or when the
    /// project is not valid JSON. Otherwise the output path is returned
    /// whether or not ffmpeg produced it; callers check existence.
    pub async fn generate(&self, project_path: &Path) -> Result<PathBuf> {
        let thumb_path = self.output_path(project_path);

        log::info!("project: {}", project_path.display());
        log::info!("ffmpeg: {}", self.decoder.display());
        log::info!("thumbnail: {}", thumb_path.display());

        if !self.decoder.exists() {
            log::error!("ffmpeg not found: {}", self.decoder.display());
            return Err(ShelfError::DecoderMissing(self.decoder.clone()));
        }
        if !project_path.exists() {
            log::error!("project file does not exist: {}", project_path.display());
            return Err(ShelfError::ProjectMissing(project_path.to_path_buf()));
        }

        tokio::fs::create_dir_all(&self.image_dir).await?;

        let input = project_file::resolve_decoder_input(project_path).await?;
        log::info!("decoding from: {}", input.display());

        if let Err(e) = self.run_decoder(&input, &thumb_path).await {
            log::error!("{}", e);
        }

        if thumb_path.exists() {
            log::info!("thumbnail generated: {}", thumb_path.display());
        } else {
            log::error!("thumbnail generation failed: {}", thumb_path.display());
        }

        Ok(thumb_path)
    }

    /// Run ffmpeg to completion, streaming its output into the log.
    /// The exit status is logged but is not the success signal.
    async fn run_decoder(&self, input: &Path, output: &Path) -> Result<()> {
        let args = decoder_args(input, output);
        log::info!("ffmpeg args: {:?}", args);

        let mut command = Command::new(&self.decoder);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(windows)]
        command.creation_flags(CREATE_NO_WINDOW);

        let mut child = command.spawn().map_err(|source| ShelfError::Launch {
            program: self.decoder.display().to_string(),
            source,
        })?;

        let stdout = child.stdout.take().map(|s| tokio::spawn(log_lines(s, "stdout")));
        let stderr = child.stderr.take().map(|s| tokio::spawn(log_lines(s, "stderr")));

        let status = child.wait().await?;
        for reader in [stdout, stderr].into_iter().flatten() {
            let _ = reader.await;
        }

        log::info!("ffmpeg exited with {}", status);
        Ok(())
    }
}

/// `-i <input> -vf scale=320:-1 -vframes 1 <output> -y`
pub fn decoder_args(input: &Path, output: &Path) -> Vec<OsString> {
    vec![
        "-i".into(),
        input.as_os_str().to_os_string(),
        "-vf".into(),
        format!("scale={}:-1", THUMBNAIL_WIDTH).into(),
        "-vframes".into(),
        "1".into(),
        output.as_os_str().to_os_string(),
        "-y".into(),
    ]
}

/// Log a child's output line by line until EOF.
///
/// The pipe must stay open until the child is done with it: closing it early
/// kills ffmpeg with SIGPIPE before it writes the frame. Lines are raw bytes
/// since ffmpeg echoes metadata in whatever encoding the input uses.
async fn log_lines<R: AsyncRead + Unpin>(stream: R, label: &'static str) {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(|c| c == '\r' || c == '\n');
                if !line.is_empty() {
                    log::debug!("[ffmpeg {}] {}", label, line);
                }
            }
            Err(e) => {
                log::warn!("reading ffmpeg {} failed: {}", label, e);
                let _ = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await;
                break;
            }
        }
    }
}
