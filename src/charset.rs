use crate::{AsciiStudioError, Result};
use serde::{Deserialize, Serialize};

/// Default glyph palette, darkest to brightest.
pub const DEFAULT_CHARSET: &str = ".,:;i1tfLCG08@";

/// Dense 70-glyph palette for high-detail output.
pub const DENSE_CHARSET: &str =
    " .'`^\",:;Il!i><~+_-?][}{1)(|\\/tfjrxnuvczXYUJCLQ0OZmwqpdbkhao*#MW&8%B@$";

/// Short palette suitable for low-resolution frames.
pub const SIMPLE_CHARSET: &str = ".:-=+*#%@";

/// Inverted short palette (bright source maps to sparse glyphs).
pub const REVERSE_CHARSET: &str = "@%#*+=-:. ";

/// An ordered glyph palette used for luminance quantization.
///
/// Glyphs are ordered darkest to brightest; a pixel's gray value selects
/// an index into the palette. The palette is validated at construction so
/// the conversion hot path never sees an empty charset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Charset {
    glyphs: Vec<char>,
}

impl Charset {
    /// Build a charset from a string of glyphs, darkest first.
    ///
    /// Fails with [`AsciiStudioError::EmptyCharset`] for an empty string;
    /// this is checked before any frame is read from a source.
    pub fn new(glyphs: &str) -> Result<Self> {
        if glyphs.is_empty() {
            return Err(AsciiStudioError::EmptyCharset);
        }
        Ok(Self {
            glyphs: glyphs.chars().collect(),
        })
    }

    /// Number of glyphs in the palette (always >= 1).
    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Glyph at `index`; panics only on out-of-range indices, which
    /// [`Self::index_for_gray`] never produces.
    pub fn glyph(&self, index: usize) -> char {
        self.glyphs[index]
    }

    /// All glyphs in palette order.
    pub fn glyphs(&self) -> &[char] {
        &self.glyphs
    }

    /// Map an 8-bit-range gray value to a glyph index.
    ///
    /// `index = clamp(floor(gray / 255 * (N - 1)), 0, N - 1)`; deterministic
    /// for any `(gray, charset)` pair.
    pub fn index_for_gray(&self, gray: f64) -> usize {
        let n = self.glyphs.len();
        let idx = (gray / 255.0 * (n - 1) as f64) as i64;
        idx.clamp(0, n as i64 - 1) as usize
    }

    /// Glyph selected by a gray value.
    pub fn glyph_for_gray(&self, gray: f64) -> char {
        self.glyphs[self.index_for_gray(gray)]
    }
}

impl Default for Charset {
    fn default() -> Self {
        Self {
            glyphs: DEFAULT_CHARSET.chars().collect(),
        }
    }
}

impl TryFrom<String> for Charset {
    type Error = AsciiStudioError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<Charset> for String {
    fn from(charset: Charset) -> Self {
        charset.glyphs.into_iter().collect()
    }
}

impl std::fmt::Display for Charset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for ch in &self.glyphs {
            write!(f, "{}", ch)?;
        }
        Ok(())
    }
}
