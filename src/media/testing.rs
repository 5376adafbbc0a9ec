//! Test support: a shell script standing in for ffmpeg.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

/// ETXTBSY: another thread forked while the script was still open for writing
const TEXT_FILE_BUSY: i32 = 26;

pub struct FakeDecoder {
    pub path: PathBuf,
    args_file: PathBuf,
}

impl FakeDecoder {
    /// Install a decoder that records its arguments and copies a 640x360 PNG
    /// to the output path (the second-to-last argument).
    pub fn install(dir: &Path) -> Self {
        Self::install_with_output(dir, "")
    }

    /// Like [`FakeDecoder::install`], running `extra` before the frame is written
    pub fn install_with_output(dir: &Path, extra: &str) -> Self {
        let path = dir.join("ffmpeg");
        let args_file = dir.join("args.txt");
        let frame = dir.join("frame.png");
        image::RgbaImage::new(640, 360).save(&frame).unwrap();

        let script = format!(
            "#!/bin/sh\n\
             [ \"$1\" = \"--ready\" ] && exit 0\n\
             for a in \"$@\"; do printf '%s\\n' \"$a\"; done > '{args}'\n\
             {extra}\n\
             eval \"out=\\${{$(($# - 1))}}\"\n\
             cp '{frame}' \"$out\"\n",
            args = args_file.display(),
            frame = frame.display(),
            extra = extra,
        );
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        wait_until_executable(&path);

        Self { path, args_file }
    }

    pub fn recorded_args(&self) -> Vec<String> {
        std::fs::read_to_string(&self.args_file)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

fn wait_until_executable(path: &Path) {
    for _ in 0..100 {
        match Command::new(path).arg("--ready").status() {
            Ok(status) => {
                assert!(status.success());
                return;
            }
            Err(e) if e.raw_os_error() == Some(TEXT_FILE_BUSY) => {
                std::thread::sleep(std::time::Duration::from_millis(10));
            }
            Err(e) => panic!("cannot run {}: {}", path.display(), e),
        }
    }
    panic!("{} stayed busy", path.display());
}
