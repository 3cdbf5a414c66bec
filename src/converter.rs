use crate::charset::Charset;
use crate::source::RawFrame;
use log::trace;

/// Vertical compensation for the taller-than-wide aspect ratio of a typical
/// monospace glyph cell. Fixed heuristic, not derived from real font metrics;
/// changing it changes visual output.
pub const ROW_ASPECT: f64 = 0.55;

/// Whether converted cells keep the source color sample alongside the glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    /// Glyphs only; rendered white-on-black.
    Monochrome,
    /// Each cell carries the resampled source color.
    Color,
}

/// One converted frame: a fixed `columns x rows` grid of glyph cells.
///
/// `colors` is `Some` exactly when the frame was converted in color mode,
/// so color and monochrome cells never mix within one frame. Immutable
/// once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsciiFrame {
    glyphs: Vec<char>,
    colors: Option<Vec<(u8, u8, u8)>>,
    columns: u32,
    rows: u32,
}

impl AsciiFrame {
    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn is_color(&self) -> bool {
        self.colors.is_some()
    }

    /// Glyph at grid position `(x, y)`.
    pub fn glyph(&self, x: u32, y: u32) -> char {
        self.glyphs[y as usize * self.columns as usize + x as usize]
    }

    /// Stored color sample at `(x, y)`, `None` in monochrome mode.
    pub fn color(&self, x: u32, y: u32) -> Option<(u8, u8, u8)> {
        self.colors
            .as_ref()
            .map(|c| c[y as usize * self.columns as usize + x as usize])
    }

    pub fn glyphs(&self) -> &[char] {
        &self.glyphs
    }

    /// Plain-text rendering, one line per grid row.
    pub fn to_plain_text(&self) -> String {
        let mut out = String::with_capacity((self.columns as usize + 1) * self.rows as usize);
        for y in 0..self.rows {
            for x in 0..self.columns {
                out.push(self.glyph(x, y));
            }
            if y + 1 < self.rows {
                out.push('\n');
            }
        }
        out
    }

    /// Color-tagged markup rendering: one `<span>` per cell, rows joined by
    /// `<br>`. Monochrome frames fall back to escaped plain glyphs.
    pub fn to_html(&self) -> String {
        let mut lines = Vec::with_capacity(self.rows as usize);
        for y in 0..self.rows {
            let mut line = String::new();
            for x in 0..self.columns {
                let glyph = escape_html(self.glyph(x, y));
                match self.color(x, y) {
                    Some((r, g, b)) => {
                        line.push_str(&format!(
                            "<span style=\"color: rgb({},{},{})\">{}</span>",
                            r, g, b, glyph
                        ));
                    }
                    None => line.push_str(&glyph),
                }
            }
            lines.push(line);
        }
        lines.join("<br>")
    }
}

fn escape_html(ch: char) -> String {
    match ch {
        '&' => "&amp;".to_string(),
        '<' => "&lt;".to_string(),
        '>' => "&gt;".to_string(),
        _ => ch.to_string(),
    }
}

/// Grid height for a given column count and source dimensions:
/// `max(1, round(columns * (height / width) * 0.55))`.
pub fn rows_for(columns: u32, source_width: u32, source_height: u32) -> u32 {
    let aspect = f64::from(source_height) / f64::from(source_width);
    let rows = (f64::from(columns) * aspect * ROW_ASPECT).round() as u32;
    rows.max(1)
}

/// Convert one raw frame into an ASCII frame.
///
/// Pure function of its inputs: the frame is resampled (nearest neighbor)
/// to exactly `columns x rows`, then each pixel's gray value
/// `0.299*r + 0.587*g + 0.114*b` selects a glyph from the charset.
pub fn convert_frame(
    frame: &RawFrame,
    columns: u32,
    charset: &Charset,
    mode: ColorMode,
) -> AsciiFrame {
    convert_frame_with_progress(frame, columns, charset, mode, |_, _| {})
}

/// Like [`convert_frame`], invoking `on_row(completed, total)` once per
/// emitted grid row. Used by the single-image path to drive a progress bar.
pub fn convert_frame_with_progress<F>(
    frame: &RawFrame,
    columns: u32,
    charset: &Charset,
    mode: ColorMode,
    mut on_row: F,
) -> AsciiFrame
where
    F: FnMut(u32, u32),
{
    let rows = rows_for(columns, frame.width, frame.height);
    trace!(
        "Converting {}x{} frame to {}x{} grid",
        frame.width,
        frame.height,
        columns,
        rows
    );

    let cells = columns as usize * rows as usize;
    let mut glyphs = Vec::with_capacity(cells);
    let mut colors = match mode {
        ColorMode::Color => Some(Vec::with_capacity(cells)),
        ColorMode::Monochrome => None,
    };

    let x_ratio = f64::from(frame.width) / f64::from(columns);
    let y_ratio = f64::from(frame.height) / f64::from(rows);

    for row in 0..rows {
        let src_y = ((f64::from(row) * y_ratio) as u32).min(frame.height - 1);
        for col in 0..columns {
            let src_x = ((f64::from(col) * x_ratio) as u32).min(frame.width - 1);
            let (r, g, b) = frame.pixel(src_x, src_y);
            let gray = 0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b);
            glyphs.push(charset.glyph_for_gray(gray));
            if let Some(ref mut colors) = colors {
                colors.push((r, g, b));
            }
        }
        on_row(row + 1, rows);
    }

    AsciiFrame {
        glyphs,
        colors,
        columns,
        rows,
    }
}
