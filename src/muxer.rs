use crate::{AsciiStudioError, Result};
use log::{debug, info, warn};
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Locate an external media tool by name.
///
/// Resolution order: the tool on the system search path (probed with a
/// version query), then a bundled copy at `<exe_dir>/ffmpeg/bin/<tool>`
/// next to the running executable. Fails with
/// [`AsciiStudioError::ExternalToolNotFound`] before any media work when
/// neither exists.
pub fn locate_tool(name: &str) -> Result<PathBuf> {
    let on_path = Command::new(name)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    if matches!(on_path, Ok(status) if status.success()) {
        debug!("Using {} from PATH", name);
        return Ok(PathBuf::from(name));
    }

    let fallback = bundled_tool_path(name);
    if fallback.exists() {
        debug!("Using bundled {} at {}", name, fallback.display());
        return Ok(fallback);
    }

    Err(AsciiStudioError::ExternalToolNotFound {
        fallback: fallback.display().to_string(),
    })
}

/// Fixed fallback location for a bundled tool, next to the executable.
pub fn bundled_tool_path(name: &str) -> PathBuf {
    let exe_dir = env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    let file = if cfg!(windows) {
        format!("{}.exe", name)
    } else {
        name.to_string()
    };
    exe_dir.join("ffmpeg").join("bin").join(file)
}

/// Merges rendered silent video with the original source's audio track,
/// and converts silent video to GIF, by driving an external ffmpeg.
pub struct AudioMuxer {
    ffmpeg: PathBuf,
}

/// `ffmpeg <args>` for extracting the source audio into a temp mp3.
fn extract_audio_args(original: &Path, temp_audio: &Path) -> Vec<OsString> {
    vec![
        "-y".into(),
        "-i".into(),
        original.into(),
        "-vn".into(),
        "-acodec".into(),
        "mp3".into(),
        temp_audio.into(),
    ]
}

/// `ffmpeg <args>` for merging silent video and extracted audio,
/// trimming to the shorter stream.
fn merge_args(silent_video: &Path, temp_audio: &Path, output: &Path) -> Vec<OsString> {
    vec![
        "-y".into(),
        "-i".into(),
        silent_video.into(),
        "-i".into(),
        temp_audio.into(),
        "-c:v".into(),
        "libx264".into(),
        "-c:a".into(),
        "aac".into(),
        "-shortest".into(),
        output.into(),
    ]
}

/// `ffmpeg <args>` for resampling the silent video into a GIF.
fn gif_args(silent_video: &Path, frame_rate: f64, canvas_width: u32, output: &Path) -> Vec<OsString> {
    vec![
        "-y".into(),
        "-i".into(),
        silent_video.into(),
        "-vf".into(),
        format!("fps={},scale={}:-1:flags=lanczos", frame_rate, canvas_width).into(),
        output.into(),
    ]
}

impl AudioMuxer {
    /// Resolve the external encoder; fails before any media work if none
    /// is available.
    pub fn locate() -> Result<Self> {
        Ok(Self {
            ffmpeg: locate_tool("ffmpeg")?,
        })
    }

    pub fn with_tool(ffmpeg: PathBuf) -> Self {
        Self { ffmpeg }
    }

    /// Combine `silent_video` with the audio track of `original_source`
    /// into `output`.
    ///
    /// Two sequential one-shot invocations: audio extraction into a temp
    /// file, then the merge. A failing step aborts the export with its
    /// captured diagnostics; the temp audio file is removed best-effort
    /// either way.
    pub fn mux(&self, silent_video: &Path, original_source: &Path, output: &Path) -> Result<()> {
        let temp_audio = env::temp_dir().join("ascii_studio_audio.mp3");

        let result = self
            .run(&extract_audio_args(original_source, &temp_audio))
            .and_then(|_| self.run(&merge_args(silent_video, &temp_audio, output)));

        remove_temp(&temp_audio);
        result?;

        info!("Muxed {} + audio -> {}", silent_video.display(), output.display());
        Ok(())
    }

    /// Rescale and sample `silent_video` at `frame_rate` directly into a
    /// GIF at `output`. No audio step.
    pub fn to_gif(
        &self,
        silent_video: &Path,
        frame_rate: f64,
        canvas_width: u32,
        output: &Path,
    ) -> Result<()> {
        self.run(&gif_args(silent_video, frame_rate, canvas_width, output))?;
        info!("Wrote GIF {}", output.display());
        Ok(())
    }

    /// One synchronous, one-shot tool invocation. Non-zero exit surfaces
    /// the captured diagnostic text; there is no retry.
    fn run(&self, args: &[OsString]) -> Result<()> {
        debug!("Running {} {:?}", self.ffmpeg.display(), args);
        let output = Command::new(&self.ffmpeg)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?;

        if !output.status.success() {
            return Err(AsciiStudioError::ExternalToolExecution {
                status: output.status.code().unwrap_or(-1),
                output: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }
}

/// Best-effort temp file removal; failure is a warning, never an error.
pub fn remove_temp(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Could not remove temp file {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_extract_audio_arg_shape() {
        let args = strings(&extract_audio_args(
            Path::new("in.mp4"),
            Path::new("/tmp/a.mp3"),
        ));
        assert_eq!(args, ["-y", "-i", "in.mp4", "-vn", "-acodec", "mp3", "/tmp/a.mp3"]);
    }

    #[test]
    fn test_merge_arg_shape() {
        let args = strings(&merge_args(
            Path::new("silent.mp4"),
            Path::new("/tmp/a.mp3"),
            Path::new("out.mp4"),
        ));
        assert_eq!(
            args,
            ["-y", "-i", "silent.mp4", "-i", "/tmp/a.mp3", "-c:v", "libx264", "-c:a", "aac",
             "-shortest", "out.mp4"]
        );
    }

    #[test]
    fn test_gif_arg_shape() {
        let args = strings(&gif_args(Path::new("silent.mp4"), 12.5, 640, Path::new("out.gif")));
        assert_eq!(
            args,
            ["-y", "-i", "silent.mp4", "-vf", "fps=12.5,scale=640:-1:flags=lanczos", "out.gif"]
        );
    }

    #[test]
    fn test_bundled_fallback_is_next_to_executable() {
        let path = bundled_tool_path("ffmpeg");
        let tail: Vec<_> = path
            .components()
            .rev()
            .take(3)
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        let expected_file = if cfg!(windows) { "ffmpeg.exe" } else { "ffmpeg" };
        assert_eq!(tail[0], expected_file);
        assert_eq!(tail[1], "bin");
        assert_eq!(tail[2], "ffmpeg");
    }

    #[test]
    fn test_failed_tool_surfaces_diagnostics() {
        // `false` exits non-zero with no output on any unix
        #[cfg(unix)]
        {
            let muxer = AudioMuxer::with_tool(PathBuf::from("false"));
            let result = muxer.run(&["-y".into()]);
            assert!(matches!(
                result,
                Err(AsciiStudioError::ExternalToolExecution { .. })
            ));
        }
    }

    #[test]
    fn test_remove_temp_missing_file_is_quiet() {
        remove_temp(Path::new("/definitely/not/here.mp3"));
    }
}
