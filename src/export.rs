use crate::converter::AsciiFrame;
use crate::pipeline::FrameCache;
use crate::{AsciiStudioError, Result};
use ab_glyph::{point, Font, FontRef, PxScale, ScaleFont};
use image::RgbImage;
use log::{debug, info};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

/// Fixed pixel size of one glyph cell for the chosen rendering font.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlyphMetrics {
    pub width: u32,
    pub height: u32,
}

impl GlyphMetrics {
    /// Canvas size for a `columns x rows` grid.
    ///
    /// Fails with [`AsciiStudioError::InvalidDimensions`] when either side
    /// would come out non-positive.
    pub fn canvas_size(&self, columns: u32, rows: u32) -> Result<(u32, u32)> {
        let width = i64::from(self.width) * i64::from(columns);
        let height = i64::from(self.height) * i64::from(rows);
        if width <= 0 || height <= 0 || width > i64::from(u32::MAX) || height > i64::from(u32::MAX)
        {
            return Err(AsciiStudioError::InvalidDimensions { width, height });
        }
        Ok((width as u32, height as u32))
    }
}

/// Foreground used for every glyph in monochrome frames.
const MONO_FOREGROUND: (u8, u8, u8) = (255, 255, 255);

/// Rasterizes ASCII frames back into pixel images with fixed glyph
/// metrics, one glyph per cell on a black background.
///
/// All charset glyphs are rendered to alpha-coverage buffers up front so
/// the per-frame loop does no font work.
pub struct ExportRenderer {
    metrics: GlyphMetrics,
    glyph_cache: HashMap<char, Vec<u8>>,
    blank_glyph: Vec<u8>,
}

impl ExportRenderer {
    /// Build a renderer from raw font bytes at the given pixel size,
    /// pre-rasterizing every glyph of `charset`.
    pub fn new(font_data: &[u8], px_size: f32, charset: &crate::charset::Charset) -> Result<Self> {
        let font = FontRef::try_from_slice(font_data)
            .map_err(|e| AsciiStudioError::EncoderInit(format!("invalid font: {}", e)))?;
        let scale = PxScale::from(px_size);
        let scaled = font.as_scaled(scale);

        // Monospace cell: the advance of any glyph; 'M' by convention.
        let cell_width = scaled.h_advance(font.glyph_id('M')).ceil() as u32;
        let cell_height = (scaled.ascent() - scaled.descent() + scaled.line_gap()).ceil() as u32;
        let metrics = GlyphMetrics {
            width: cell_width.max(1),
            height: cell_height.max(1),
        };
        let ascent = scaled.ascent();

        let blank_glyph = vec![0u8; (metrics.width * metrics.height) as usize];
        let mut glyph_cache = HashMap::new();

        for &ch in charset.glyphs() {
            let mut coverage = blank_glyph.clone();
            let glyph = font
                .glyph_id(ch)
                .with_scale_and_position(scale, point(0.0, ascent));
            if let Some(outline) = font.outline_glyph(glyph) {
                let bounds = outline.px_bounds();
                outline.draw(|x, y, v| {
                    let px = x as i64 + bounds.min.x as i64;
                    let py = y as i64 + bounds.min.y as i64;
                    if px >= 0
                        && py >= 0
                        && (px as u32) < metrics.width
                        && (py as u32) < metrics.height
                    {
                        coverage[(py as u32 * metrics.width + px as u32) as usize] =
                            (v * 255.0).round() as u8;
                    }
                });
            }
            glyph_cache.insert(ch, coverage);
        }

        debug!(
            "Glyph cell {}x{} px, {} glyphs cached",
            metrics.width,
            metrics.height,
            glyph_cache.len()
        );

        Ok(Self {
            metrics,
            glyph_cache,
            blank_glyph,
        })
    }

    pub fn metrics(&self) -> GlyphMetrics {
        self.metrics
    }

    /// Paint one frame onto an rgb24 canvas of exactly
    /// `canvas_size(frame.columns(), frame.rows())` bytes * 3.
    ///
    /// Color frames paint each glyph in its stored color; monochrome frames
    /// paint white on the black background.
    pub fn paint(&self, frame: &AsciiFrame, canvas: &mut [u8]) {
        let cell_w = self.metrics.width as usize;
        let cell_h = self.metrics.height as usize;
        let canvas_w = cell_w * frame.columns() as usize;
        let stride = canvas_w * 3;

        canvas.fill(0);

        for gy in 0..frame.rows() {
            for gx in 0..frame.columns() {
                let coverage = self
                    .glyph_cache
                    .get(&frame.glyph(gx, gy))
                    .unwrap_or(&self.blank_glyph);
                let (fg_r, fg_g, fg_b) = frame.color(gx, gy).unwrap_or(MONO_FOREGROUND);

                let origin_x = gx as usize * cell_w;
                let origin_y = gy as usize * cell_h;

                for cy in 0..cell_h {
                    let row_base = (origin_y + cy) * stride + origin_x * 3;
                    for cx in 0..cell_w {
                        let alpha = coverage[cy * cell_w + cx];
                        if alpha == 0 {
                            continue;
                        }
                        let a = u32::from(alpha);
                        let idx = row_base + cx * 3;
                        canvas[idx] = ((u32::from(fg_r) * a) / 255) as u8;
                        canvas[idx + 1] = ((u32::from(fg_g) * a) / 255) as u8;
                        canvas[idx + 2] = ((u32::from(fg_b) * a) / 255) as u8;
                    }
                }
            }
        }
    }

    /// Rasterize a single frame into an image buffer (for "save as picture").
    pub fn render_image(&self, frame: &AsciiFrame) -> Result<RgbImage> {
        let (width, height) = self.metrics.canvas_size(frame.columns(), frame.rows())?;
        let mut canvas = vec![0u8; (width * height * 3) as usize];
        self.paint(frame, &mut canvas);
        RgbImage::from_raw(width, height, canvas).ok_or_else(|| {
            AsciiStudioError::InvalidDimensions {
                width: i64::from(width),
                height: i64::from(height),
            }
        })
    }

    /// Rasterize every frame of `cache` in order into a silent intermediate
    /// video at `output`, encoded at the cache's frame rate. Returns the
    /// canvas dimensions.
    pub fn export_video(
        &self,
        ffmpeg: &Path,
        cache: &FrameCache,
        output: &Path,
    ) -> Result<(u32, u32)> {
        if cache.is_empty() {
            return Err(AsciiStudioError::NoFrames);
        }
        let first = cache.frame(0);
        let (width, height) = self.metrics.canvas_size(first.columns(), first.rows())?;

        let mut encoder = VideoEncoder::open(ffmpeg, width, height, cache.frame_rate(), output)?;
        let mut canvas = vec![0u8; (width * height * 3) as usize];

        for frame in cache.frames() {
            self.paint(frame, &mut canvas);
            encoder.write_frame(&canvas)?;
        }
        encoder.finish()?;

        info!(
            "Rendered {} frames at {}x{} -> {}",
            cache.frame_count(),
            width,
            height,
            output.display()
        );
        Ok((width, height))
    }
}

/// Silent video encoder: an ffmpeg process consuming raw rgb24 frames on
/// stdin, opened at the source frame rate.
struct VideoEncoder {
    child: Child,
}

impl VideoEncoder {
    fn open(ffmpeg: &Path, width: u32, height: u32, frame_rate: f64, output: &Path) -> Result<Self> {
        let child = Command::new(ffmpeg)
            .args([
                "-y",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "-s",
                &format!("{}x{}", width, height),
                "-r",
                &format!("{}", frame_rate),
                "-i",
                "-",
                "-c:v",
                "libx264",
                // yuv420p needs even dimensions; glyph grids often aren't.
                "-vf",
                "pad=ceil(iw/2)*2:ceil(ih/2)*2",
                "-pix_fmt",
                "yuv420p",
                "-an",
                "-hide_banner",
                "-loglevel",
                "error",
            ])
            .arg(output)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                AsciiStudioError::EncoderInit(format!(
                    "could not start encoder at {}x{} @ {:.2} FPS: {}",
                    width, height, frame_rate, e
                ))
            })?;
        Ok(Self { child })
    }

    fn write_frame(&mut self, rgb: &[u8]) -> Result<()> {
        if let Some(stdin) = self.child.stdin.as_mut() {
            stdin.write_all(rgb)?;
        }
        Ok(())
    }

    fn finish(mut self) -> Result<()> {
        drop(self.child.stdin.take());
        let output = self.child.wait_with_output()?;
        if !output.status.success() {
            return Err(AsciiStudioError::ExternalToolExecution {
                status: output.status.code().unwrap_or(-1),
                output: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }
}

/// Well-known monospace font locations, probed when no `--font` is given.
pub fn find_monospace_font() -> Option<PathBuf> {
    const CANDIDATES: &[&str] = &[
        "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf",
        "/usr/share/fonts/TTF/DejaVuSansMono.ttf",
        "/usr/share/fonts/dejavu/DejaVuSansMono.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationMono-Regular.ttf",
        "/usr/share/fonts/liberation-mono/LiberationMono-Regular.ttf",
        "/Library/Fonts/Courier New.ttf",
        "C:\\Windows\\Fonts\\consola.ttf",
        "C:\\Windows\\Fonts\\cour.ttf",
    ];
    CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}
