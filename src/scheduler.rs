use crate::pipeline::FrameCache;
use log::debug;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How often the host loop should poll [`PlaybackScheduler::on_tick`].
/// Independent of content frame rate; ~60 Hz.
pub const TICK_PERIOD: Duration = Duration::from_millis(15);

/// Outcome of one scheduler poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// A new frame index to display.
    Show(usize),
    /// The current frame is still the right one; nothing to re-render.
    Hold,
    /// Non-looping playback ran past the last frame. Terminal.
    Finished,
}

/// Maps wall-clock time to a frame index for a completed [`FrameCache`].
///
/// This is a polling design, not frame-accurate delivery: when wall-clock
/// time outruns the tick period, intermediate frames are skipped, never
/// queued or replayed, so emitted indices are monotonic in the non-looping
/// case and never out of order.
pub struct PlaybackScheduler {
    cache: Arc<FrameCache>,
    started_at: Instant,
    last_emitted: Option<usize>,
    looping: bool,
    finished: bool,
}

impl PlaybackScheduler {
    /// Start playback of `cache` at `now`. `looping` selects GIF-style
    /// endless playback; otherwise playback is one-shot.
    pub fn start(cache: Arc<FrameCache>, looping: bool, now: Instant) -> Self {
        debug!(
            "Playback started: {} frames @ {:.2} FPS, looping={}",
            cache.frame_count(),
            cache.frame_rate(),
            looping
        );
        Self {
            cache,
            started_at: now,
            last_emitted: None,
            looping,
            finished: false,
        }
    }

    /// Poll the scheduler at wall-clock instant `now`.
    ///
    /// Computes `floor(elapsed_secs * frame_rate)` and emits
    /// [`Tick::Show`] only when the resulting index differs from the
    /// previously emitted one. One-shot playback becomes [`Tick::Finished`]
    /// once the raw index reaches the frame count; looping playback wraps
    /// with a modulo and only stops on an explicit [`Self::stop`].
    pub fn on_tick(&mut self, now: Instant) -> Tick {
        if self.finished {
            return Tick::Finished;
        }
        let frame_count = self.cache.frame_count();
        if frame_count == 0 {
            self.finished = true;
            return Tick::Finished;
        }

        let elapsed = now.saturating_duration_since(self.started_at);
        let raw_index = (elapsed.as_secs_f64() * self.cache.frame_rate()) as usize;

        let index = if self.looping {
            raw_index % frame_count
        } else if raw_index >= frame_count {
            self.finished = true;
            return Tick::Finished;
        } else {
            raw_index
        };

        if self.last_emitted == Some(index) {
            Tick::Hold
        } else {
            self.last_emitted = Some(index);
            Tick::Show(index)
        }
    }

    /// The cache being played.
    pub fn cache(&self) -> &Arc<FrameCache> {
        &self.cache
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Stop playback and release the scheduler's cache reference.
    /// Restarting requires a fresh [`Self::start`] with a new timestamp.
    pub fn stop(self) {
        debug!("Playback stopped");
    }
}
