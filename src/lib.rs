//! ASCII Studio - convert images, GIFs and videos to ASCII art
//!
//! This crate converts raster imagery into character-grid renderings, plays
//! the rendered sequence back in real time synchronized to the source frame
//! rate, and exports the rendered sequence to a video (remuxed with the
//! source audio) or a GIF.
//!
//! The pipeline is: [`source::FrameSource`] decodes a path into raw pixel
//! frames; [`converter`] maps each frame to an [`converter::AsciiFrame`]
//! using a [`charset::Charset`]; the [`pipeline`] worker assembles a
//! [`pipeline::FrameCache`]; [`scheduler::PlaybackScheduler`] drives the live
//! preview while [`export`] and [`muxer`] produce video/GIF files.

pub mod charset;
pub mod cli;
pub mod config;
pub mod converter;
pub mod export;
pub mod muxer;
pub mod pipeline;
pub mod renderer;
pub mod scheduler;
pub mod source;

pub use charset::Charset;
pub use cli::Cli;
pub use config::AppConfig;
pub use converter::{convert_frame, AsciiFrame, ColorMode};
pub use export::{ExportRenderer, GlyphMetrics};
pub use pipeline::{ConversionHandle, ConversionProgress, FrameCache};
pub use scheduler::{PlaybackScheduler, Tick};
pub use source::{FrameSource, FrameStream, RawFrame};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name
pub const PACKAGE_NAME: &str = env!("CARGO_PKG_NAME");

/// Error types used throughout the application
#[derive(thiserror::Error, Debug)]
pub enum AsciiStudioError {
    #[error("Failed to open source '{path}': {reason}")]
    SourceOpen { path: String, reason: String },

    #[error("Charset is empty")]
    EmptyCharset,

    #[error("Invalid canvas dimensions: {width}x{height}")]
    InvalidDimensions { width: i64, height: i64 },

    #[error("Failed to open video encoder: {0}")]
    EncoderInit(String),

    #[error("No usable ffmpeg found: not on PATH and no bundled copy at {fallback}")]
    ExternalToolNotFound { fallback: String },

    #[error("External tool failed with status {status}:\n{output}")]
    ExternalToolExecution { status: i32, output: String },

    #[error("Conversion was cancelled")]
    Cancelled,

    #[error("No frames produced")]
    NoFrames,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, AsciiStudioError>;

/// Utility functions
pub mod utils {
    /// Format duration in a human-readable way
    pub fn format_duration(seconds: f64) -> String {
        let total_seconds = seconds as u64;
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let secs = total_seconds % 60;

        if hours > 0 {
            format!("{}:{:02}:{:02}", hours, minutes, secs)
        } else {
            format!("{}:{:02}", minutes, secs)
        }
    }
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        charset::Charset,
        cli::Cli,
        config::AppConfig,
        converter::{convert_frame, AsciiFrame, ColorMode},
        export::{ExportRenderer, GlyphMetrics},
        muxer::AudioMuxer,
        pipeline::{ConversionHandle, ConversionProgress, FrameCache},
        scheduler::{PlaybackScheduler, Tick},
        source::{FrameSource, FrameStream, RawFrame},
        utils::*,
        AsciiStudioError,
    };
}
