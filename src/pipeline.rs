use crate::charset::Charset;
use crate::converter::{convert_frame, AsciiFrame, ColorMode};
use crate::source::FrameStream;
use crate::{AsciiStudioError, Result};
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// The complete, immutable output of one conversion run.
///
/// Created once by a completed worker and handed off to the consumer;
/// a new conversion produces a new cache, nothing mutates one in place.
#[derive(Debug, Clone)]
pub struct FrameCache {
    frames: Vec<AsciiFrame>,
    frame_rate: f64,
}

impl FrameCache {
    pub fn new(frames: Vec<AsciiFrame>, frame_rate: f64) -> Self {
        Self { frames, frame_rate }
    }

    /// Source frame rate in frames per second.
    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame(&self, index: usize) -> &AsciiFrame {
        &self.frames[index]
    }

    pub fn frames(&self) -> &[AsciiFrame] {
        &self.frames
    }
}

/// Progress of one conversion run: `(frames_processed, total_frames)`.
///
/// Non-decreasing within a run; `frames_processed` never exceeds
/// `total_frames`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionProgress {
    pub frames_processed: u64,
    pub total_frames: u64,
}

impl ConversionProgress {
    pub fn percentage(&self) -> f64 {
        if self.total_frames == 0 {
            0.0
        } else {
            self.frames_processed as f64 / self.total_frames as f64 * 100.0
        }
    }
}

/// Handle to a background conversion run.
///
/// The worker drives [`convert_frame`] across every frame of a decoded
/// source on its own thread and assembles a [`FrameCache`]. Cancellation is
/// cooperative: the flag is consulted once per frame, never mid-frame, and
/// [`ConversionHandle::wait`] blocks until the worker has acknowledged it.
pub struct ConversionHandle {
    progress: flume::Receiver<ConversionProgress>,
    cancel: Arc<AtomicBool>,
    join: Option<thread::JoinHandle<Result<FrameCache>>>,
}

impl ConversionHandle {
    /// Start converting `stream` on a dedicated worker thread.
    pub fn spawn(
        stream: FrameStream,
        columns: u32,
        charset: Charset,
        mode: ColorMode,
    ) -> Result<Self> {
        let (tx, rx) = flume::unbounded();
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);

        let join = thread::Builder::new()
            .name("ascii-convert".to_string())
            .spawn(move || run_conversion(stream, columns, &charset, mode, &flag, &tx))?;

        Ok(Self {
            progress: rx,
            cancel,
            join: Some(join),
        })
    }

    /// Progress updates; a finite, non-restartable stream that disconnects
    /// when the run reaches a terminal state.
    pub fn progress(&self) -> &flume::Receiver<ConversionProgress> {
        &self.progress
    }

    /// Request cooperative cancellation. The worker notices between frames.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Block until the run terminates and return its result.
    ///
    /// A cancelled run yields [`AsciiStudioError::Cancelled`]; a run whose
    /// source produced zero frames yields [`AsciiStudioError::NoFrames`].
    pub fn wait(mut self) -> Result<FrameCache> {
        match self.join.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                Err(AsciiStudioError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "conversion worker panicked",
                )))
            }),
            None => Err(AsciiStudioError::Cancelled),
        }
    }
}

fn run_conversion(
    stream: FrameStream,
    columns: u32,
    charset: &Charset,
    mode: ColorMode,
    cancel: &AtomicBool,
    progress: &flume::Sender<ConversionProgress>,
) -> Result<FrameCache> {
    let total = stream.frame_count;
    debug!(
        "Conversion started: {} columns, {} glyphs, {:?}, {} frames expected",
        columns,
        charset.len(),
        mode,
        total
    );

    // Indeterminate totals (unreported by the container) emit no progress,
    // matching a zero-width progress bar rather than a lying one.
    if total > 0 {
        let _ = progress.send(ConversionProgress {
            frames_processed: 0,
            total_frames: total,
        });
    }

    let mut frames = Vec::new();
    for item in stream.frames {
        if cancel.load(Ordering::Relaxed) {
            info!("Conversion cancelled after {} frames", frames.len());
            return Err(AsciiStudioError::Cancelled);
        }
        let raw = item?;
        frames.push(convert_frame(&raw, columns, charset, mode));
        if total > 0 {
            let _ = progress.send(ConversionProgress {
                frames_processed: (frames.len() as u64).min(total),
                total_frames: total,
            });
        }
    }

    if frames.is_empty() {
        return Err(AsciiStudioError::NoFrames);
    }

    info!(
        "Conversion complete: {} frames @ {:.2} FPS",
        frames.len(),
        stream.frame_rate
    );
    Ok(FrameCache::new(frames, stream.frame_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::RawFrame;
    use std::time::Duration;

    fn gray_frame(shade: u8) -> RawFrame {
        RawFrame {
            width: 4,
            height: 4,
            data: vec![shade; 4 * 4 * 3],
        }
    }

    fn stream_of(count: usize, frame_rate: f64) -> FrameStream {
        let frames = (0..count).map(|i| gray_frame((i * 20) as u8)).collect();
        FrameStream::from_frames(frames, frame_rate)
    }

    #[test]
    fn test_completed_run_produces_cache() {
        let charset = Charset::new(" .:-=+*#%@").unwrap();
        let handle =
            ConversionHandle::spawn(stream_of(5, 30.0), 4, charset, ColorMode::Monochrome).unwrap();
        let cache = handle.wait().unwrap();
        assert_eq!(cache.frame_count(), 5);
        assert_eq!(cache.frame_rate(), 30.0);
        assert!(!cache.is_empty());
    }

    #[test]
    fn test_progress_is_monotonic_and_bounded() {
        let charset = Charset::new(" .:-=+*#%@").unwrap();
        let handle =
            ConversionHandle::spawn(stream_of(8, 24.0), 4, charset, ColorMode::Color).unwrap();
        let updates: Vec<ConversionProgress> = handle.progress().iter().collect();
        let cache = handle.wait().unwrap();

        assert_eq!(updates.first().unwrap().frames_processed, 0);
        assert_eq!(updates.last().unwrap().frames_processed, 8);
        for pair in updates.windows(2) {
            assert!(pair[0].frames_processed <= pair[1].frames_processed);
        }
        for update in &updates {
            assert!(update.frames_processed <= update.total_frames);
            assert_eq!(update.total_frames, 8);
        }
        assert_eq!(cache.frame_count(), 8);
    }

    #[test]
    fn test_empty_source_reports_no_frames() {
        let charset = Charset::new(" .:-=+*#%@").unwrap();
        let handle =
            ConversionHandle::spawn(stream_of(0, 24.0), 4, charset, ColorMode::Monochrome).unwrap();
        assert!(matches!(handle.wait(), Err(AsciiStudioError::NoFrames)));
    }

    #[test]
    fn test_source_error_fails_the_run() {
        let charset = Charset::new(" .:-=+*#%@").unwrap();
        let stream = FrameStream {
            frames: Box::new(std::iter::once(Err(AsciiStudioError::SourceOpen {
                path: "broken.mp4".to_string(),
                reason: "decode error".to_string(),
            }))),
            frame_rate: 24.0,
            frame_count: 1,
        };
        let handle = ConversionHandle::spawn(stream, 4, charset, ColorMode::Monochrome).unwrap();
        assert!(matches!(
            handle.wait(),
            Err(AsciiStudioError::SourceOpen { .. })
        ));
    }

    #[test]
    fn test_cancellation_between_frames() {
        let charset = Charset::new(" .:-=+*#%@").unwrap();
        // Endless source: cancellation is the only way this run terminates.
        let stream = FrameStream {
            frames: Box::new(std::iter::repeat_with(|| {
                thread::sleep(Duration::from_millis(1));
                Ok(gray_frame(128))
            })),
            frame_rate: 24.0,
            frame_count: 0,
        };
        let handle = ConversionHandle::spawn(stream, 4, charset, ColorMode::Monochrome).unwrap();
        thread::sleep(Duration::from_millis(20));
        handle.cancel();
        assert!(matches!(handle.wait(), Err(AsciiStudioError::Cancelled)));
    }
}
