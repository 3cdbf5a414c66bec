use crate::muxer;
use crate::{AsciiStudioError, Result};
use image::codecs::gif::GifDecoder;
use image::AnimationDecoder;
use log::{debug, info, warn};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

/// Frame rate assumed when the source reports none.
pub const DEFAULT_FRAME_RATE: f64 = 24.0;

/// One decoded frame: a width x height grid of rgb24 samples.
///
/// Owned exclusively by the conversion step that consumes it and discarded
/// immediately after mapping.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    /// Tightly packed rgb24, row-major, `width * height * 3` bytes.
    pub data: Vec<u8>,
}

impl RawFrame {
    /// rgb sample at `(x, y)`; callers stay within `width`/`height`.
    pub fn pixel(&self, x: u32, y: u32) -> (u8, u8, u8) {
        let idx = ((y * self.width + x) * 3) as usize;
        (self.data[idx], self.data[idx + 1], self.data[idx + 2])
    }
}

/// A decoded source: a finite sequence of raw frames plus its nominal
/// frame rate and frame count.
///
/// `frame_count` is 0 when the container does not report one; progress is
/// then indeterminate. The frame iterator yields frames lazily so video
/// sources never hold more than one undecoded frame in memory.
pub struct FrameStream {
    pub frames: Box<dyn Iterator<Item = Result<RawFrame>> + Send>,
    pub frame_rate: f64,
    pub frame_count: u64,
}

impl FrameStream {
    /// Wrap an already-decoded frame list (images, GIFs, tests).
    pub fn from_frames(frames: Vec<RawFrame>, frame_rate: f64) -> Self {
        let frame_count = frames.len() as u64;
        Self {
            frames: Box::new(frames.into_iter().map(Ok)),
            frame_rate,
            frame_count,
        }
    }
}

/// Decodes a path into a sequence of raw pixel frames.
///
/// Still images yield a single frame, animated GIFs yield every frame at
/// the GIF's own delay-derived rate, and anything else is handed to an
/// external ffmpeg process that writes raw rgb24 onto a pipe.
pub struct FrameSource;

impl FrameSource {
    /// Open a source file and return its decoded frame stream.
    ///
    /// Fails with [`AsciiStudioError::SourceOpen`] when the path cannot be
    /// decoded.
    pub fn open(path: &Path) -> Result<FrameStream> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "png" | "jpg" | "jpeg" | "bmp" => open_image(path),
            "gif" => open_gif(path),
            _ => open_video(path),
        }
    }
}

fn source_open_error(path: &Path, reason: impl std::fmt::Display) -> AsciiStudioError {
    AsciiStudioError::SourceOpen {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

fn open_image(path: &Path) -> Result<FrameStream> {
    let img = image::open(path)
        .map_err(|e| source_open_error(path, e))?
        .to_rgb8();
    let (width, height) = img.dimensions();
    debug!("Decoded image {}: {}x{}", path.display(), width, height);

    let frame = RawFrame {
        width,
        height,
        data: img.into_raw(),
    };
    Ok(FrameStream::from_frames(vec![frame], DEFAULT_FRAME_RATE))
}

fn open_gif(path: &Path) -> Result<FrameStream> {
    let file = File::open(path).map_err(|e| source_open_error(path, e))?;
    let decoder = GifDecoder::new(BufReader::new(file)).map_err(|e| source_open_error(path, e))?;
    let gif_frames = decoder
        .into_frames()
        .collect_frames()
        .map_err(|e| source_open_error(path, e))?;

    // Per-frame delays can vary; the first frame's delay sets the nominal rate.
    let frame_rate = gif_frames
        .first()
        .map(|f| {
            let (numer, denom) = f.delay().numer_denom_ms();
            if numer == 0 || denom == 0 {
                DEFAULT_FRAME_RATE
            } else {
                1000.0 * f64::from(denom) / f64::from(numer)
            }
        })
        .unwrap_or(DEFAULT_FRAME_RATE);

    let frames: Vec<RawFrame> = gif_frames
        .into_iter()
        .map(|f| {
            let rgba = f.into_buffer();
            let (width, height) = rgba.dimensions();
            let mut data = Vec::with_capacity((width * height * 3) as usize);
            for px in rgba.pixels() {
                data.extend_from_slice(&[px[0], px[1], px[2]]);
            }
            RawFrame {
                width,
                height,
                data,
            }
        })
        .collect();

    info!(
        "Decoded GIF {}: {} frames @ {:.2} FPS",
        path.display(),
        frames.len(),
        frame_rate
    );
    Ok(FrameStream::from_frames(frames, frame_rate))
}

/// Video stream metadata reported by ffprobe.
#[derive(Debug, Clone, Copy)]
struct VideoInfo {
    width: u32,
    height: u32,
    frame_rate: f64,
    frame_count: u64,
}

fn probe_video(ffprobe: &Path, path: &Path) -> Result<VideoInfo> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-count_packets",
            "-show_entries",
            "stream=width,height,r_frame_rate,nb_read_packets",
            "-of",
            "default=noprint_wrappers=1",
            "-i",
        ])
        .arg(path)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .map_err(|e| source_open_error(path, format!("running ffprobe: {}", e)))?;

    if !output.status.success() {
        return Err(source_open_error(path, "ffprobe found no video stream"));
    }

    let text = String::from_utf8_lossy(&output.stdout);
    let mut width = 0u32;
    let mut height = 0u32;
    let mut frame_rate = 0.0f64;
    let mut frame_count = 0u64;

    for line in text.lines() {
        if let Some(val) = line.strip_prefix("width=") {
            width = val.trim().parse().unwrap_or(0);
        } else if let Some(val) = line.strip_prefix("height=") {
            height = val.trim().parse().unwrap_or(0);
        } else if let Some(val) = line.strip_prefix("r_frame_rate=") {
            // Shaped like "24/1" or "30000/1001".
            let mut parts = val.trim().splitn(2, '/');
            let num: f64 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0.0);
            let den: f64 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(1.0);
            if den > 0.0 {
                frame_rate = num / den;
            }
        } else if let Some(val) = line.strip_prefix("nb_read_packets=") {
            frame_count = val.trim().parse().unwrap_or(0);
        }
    }

    if width == 0 || height == 0 {
        return Err(source_open_error(path, "ffprobe found no video stream"));
    }
    if frame_rate <= 0.0 {
        warn!(
            "Source {} reports no frame rate, assuming {:.1} FPS",
            path.display(),
            DEFAULT_FRAME_RATE
        );
        frame_rate = DEFAULT_FRAME_RATE;
    }

    debug!(
        "Probed {}: {}x{} @ {:.3} FPS, {} packets",
        path.display(),
        width,
        height,
        frame_rate,
        frame_count
    );

    Ok(VideoInfo {
        width,
        height,
        frame_rate,
        frame_count,
    })
}

fn open_video(path: &Path) -> Result<FrameStream> {
    let ffmpeg = muxer::locate_tool("ffmpeg")?;
    let ffprobe = locate_ffprobe(&ffmpeg);
    let info = probe_video(&ffprobe, path)?;

    let child = Command::new(&ffmpeg)
        .arg("-i")
        .arg(path)
        .args([
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgb24",
            "-an",
            "-hide_banner",
            "-loglevel",
            "error",
            "pipe:1",
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| source_open_error(path, format!("spawning ffmpeg: {}", e)))?;

    info!(
        "Decoding {} via ffmpeg pipe: {}x{} @ {:.2} FPS",
        path.display(),
        info.width,
        info.height,
        info.frame_rate
    );

    Ok(FrameStream {
        frames: Box::new(VideoFrameIter {
            child,
            width: info.width,
            height: info.height,
            done: false,
        }),
        frame_rate: info.frame_rate,
        frame_count: info.frame_count,
    })
}

/// ffprobe ships next to ffmpeg in both the PATH and the bundled layout.
fn locate_ffprobe(ffmpeg: &Path) -> PathBuf {
    let name = if cfg!(windows) {
        "ffprobe.exe"
    } else {
        "ffprobe"
    };
    match ffmpeg.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(name),
        _ => PathBuf::from(name),
    }
}

/// Reads fixed-size rgb24 frames from a decoder subprocess stdout.
struct VideoFrameIter {
    child: Child,
    width: u32,
    height: u32,
    done: bool,
}

impl Iterator for VideoFrameIter {
    type Item = Result<RawFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let frame_bytes = (self.width * self.height * 3) as usize;
        let mut data = vec![0u8; frame_bytes];

        let stdout = match self.child.stdout.as_mut() {
            Some(s) => s,
            None => {
                self.done = true;
                return None;
            }
        };

        match read_exact_or_eof(stdout, &mut data) {
            Ok(true) => Some(Ok(RawFrame {
                width: self.width,
                height: self.height,
                data,
            })),
            Ok(false) => {
                self.done = true;
                let _ = self.child.wait();
                None
            }
            Err(e) => {
                self.done = true;
                reap_child(&mut self.child);
                Some(Err(e))
            }
        }
    }
}

impl Drop for VideoFrameIter {
    fn drop(&mut self) {
        if !self.done {
            reap_child(&mut self.child);
        }
    }
}

/// Kill and reap a decoder child so it never outlives the iterator as a
/// zombie.
fn reap_child(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Fill `buf` completely; `Ok(false)` means EOF before any/all bytes arrived.
fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<bool> {
    let mut total = 0usize;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => return Ok(false),
            Ok(n) => total += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}
