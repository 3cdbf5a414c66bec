use crate::charset::Charset;
use crate::config::AppConfig;
use crate::converter::ColorMode;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Widest supported output grid; wider grids make degenerate glyph cells.
pub const MAX_COLUMNS: u32 = 800;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Convert a single image and save it as text, markup or a picture
    Image {
        #[command(flatten)]
        convert: ConvertOpts,

        /// Output file; extension picks the format (.txt, .html, .png, .jpg, .bmp)
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        font: FontOpts,
    },

    /// Convert a source and play it back in the terminal
    Play {
        #[command(flatten)]
        convert: ConvertOpts,

        /// Loop playback endlessly (default for GIF sources)
        #[arg(long = "loop")]
        loop_playback: bool,

        /// Play through once and stop (default for video sources)
        #[arg(long, conflicts_with = "loop_playback")]
        once: bool,
    },

    /// Convert a source and export it as a video or GIF
    Export {
        #[command(flatten)]
        convert: ConvertOpts,

        /// Output file; .mp4 remuxes the source audio, .gif is silent
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        font: FontOpts,
    },
}

/// Options shared by every conversion-driven subcommand.
#[derive(Args, Debug)]
pub struct ConvertOpts {
    /// Source file (image, GIF or video)
    #[arg(required = true)]
    pub input: PathBuf,

    /// Output width in characters
    #[arg(short, long, default_value_t = 100)]
    pub columns: u32,

    /// Explicit glyph palette, darkest to brightest
    #[arg(long, conflicts_with = "preset")]
    pub charset: Option<String>,

    /// Named charset preset from the configuration
    #[arg(short, long)]
    pub preset: Option<String>,

    /// Drop per-cell color and render monochrome
    #[arg(short, long)]
    pub mono: bool,

    /// Path to a JSON configuration file with charset presets
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Font options for subcommands that rasterize glyphs back to pixels.
#[derive(Args, Debug)]
pub struct FontOpts {
    /// Monospace font file for rendering; probed from system locations
    /// when omitted
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Glyph size in pixels
    #[arg(long, default_value_t = 16.0)]
    pub font_size: f32,
}

impl ConvertOpts {
    /// Resolve the effective charset from the explicit palette, a named
    /// preset, or the configuration default, in that order.
    pub fn resolve_charset(&self, config: &AppConfig) -> anyhow::Result<Charset> {
        if let Some(ref glyphs) = self.charset {
            return Ok(Charset::new(glyphs)?);
        }
        if let Some(ref name) = self.preset {
            return config.preset(name);
        }
        config.default_charset()
    }

    pub fn color_mode(&self) -> ColorMode {
        if self.mono {
            ColorMode::Monochrome
        } else {
            ColorMode::Color
        }
    }
}

impl Cli {
    /// Validate command line arguments
    pub fn validate(&self) -> Result<(), String> {
        let convert = self.convert_opts();

        if !convert.input.exists() {
            return Err(format!(
                "Source file does not exist: {}",
                convert.input.display()
            ));
        }

        if convert.columns == 0 || convert.columns > MAX_COLUMNS {
            return Err(format!(
                "Columns must be between 1 and {}",
                MAX_COLUMNS
            ));
        }

        if let Some(ref config) = convert.config {
            if !config.exists() {
                return Err(format!("Config file does not exist: {}", config.display()));
            }
        }

        match &self.command {
            Command::Image { output, font, .. } => {
                match extension_of(output).as_str() {
                    "txt" | "html" | "png" | "jpg" | "jpeg" | "bmp" => {}
                    other => {
                        return Err(format!(
                            "Unsupported image output format '.{}' (use .txt, .html, .png, .jpg or .bmp)",
                            other
                        ))
                    }
                }
                validate_font(font)?;
            }
            Command::Export { output, font, .. } => {
                match extension_of(output).as_str() {
                    "mp4" | "gif" => {}
                    other => {
                        return Err(format!(
                            "Unsupported export format '.{}' (use .mp4 or .gif)",
                            other
                        ))
                    }
                }
                validate_font(font)?;
            }
            Command::Play { .. } => {}
        }

        Ok(())
    }

    /// The conversion options of whichever subcommand was chosen.
    pub fn convert_opts(&self) -> &ConvertOpts {
        match &self.command {
            Command::Image { convert, .. }
            | Command::Play { convert, .. }
            | Command::Export { convert, .. } => convert,
        }
    }
}

fn validate_font(font: &FontOpts) -> Result<(), String> {
    if let Some(ref path) = font.font {
        if !path.exists() {
            return Err(format!("Font file does not exist: {}", path.display()));
        }
    }
    if font.font_size <= 0.0 {
        return Err("Font size must be greater than 0".to_string());
    }
    Ok(())
}

/// Lowercased extension of a path, empty when absent.
pub fn extension_of(path: &std::path::Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_parse_play_defaults() {
        let cli = parse(&["ascii-studio", "play", "clip.mp4"]);
        let opts = cli.convert_opts();
        assert_eq!(opts.columns, 100);
        assert!(opts.charset.is_none());
        assert!(!opts.mono);
        match cli.command {
            Command::Play {
                loop_playback,
                once,
                ..
            } => {
                assert!(!loop_playback);
                assert!(!once);
            }
            _ => panic!("expected play subcommand"),
        }
    }

    #[test]
    fn test_loop_conflicts_with_once() {
        let result = Cli::try_parse_from(["ascii-studio", "play", "clip.mp4", "--loop", "--once"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_charset_conflicts_with_preset() {
        let result = Cli::try_parse_from([
            "ascii-studio",
            "image",
            "pic.png",
            "-o",
            "out.txt",
            "--charset",
            ".#",
            "--preset",
            "dense",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_missing_input() {
        let cli = parse(&["ascii-studio", "play", "definitely_missing.mp4"]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_and_huge_columns() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("pic.png");
        fs::write(&input, b"stub").unwrap();
        let input = input.to_str().unwrap();

        let cli = parse(&["ascii-studio", "play", input, "--columns", "0"]);
        assert!(cli.validate().is_err());

        let cli = parse(&["ascii-studio", "play", input, "--columns", "801"]);
        assert!(cli.validate().is_err());

        let cli = parse(&["ascii-studio", "play", input, "--columns", "800"]);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_export_extension() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clip.mp4");
        fs::write(&input, b"stub").unwrap();

        let cli = parse(&[
            "ascii-studio",
            "export",
            input.to_str().unwrap(),
            "-o",
            "out.avi",
        ]);
        assert!(cli.validate().is_err());

        let cli = parse(&[
            "ascii-studio",
            "export",
            input.to_str().unwrap(),
            "-o",
            "out.mp4",
        ]);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_resolve_charset_precedence() {
        let config = AppConfig::default();

        let mut opts = ConvertOpts {
            input: PathBuf::from("x.png"),
            columns: 100,
            charset: Some(".#".to_string()),
            preset: None,
            mono: false,
            config: None,
        };
        assert_eq!(opts.resolve_charset(&config).unwrap().len(), 2);

        opts.charset = None;
        opts.preset = Some("simple".to_string());
        assert_eq!(
            opts.resolve_charset(&config).unwrap().len(),
            crate::charset::SIMPLE_CHARSET.chars().count()
        );

        opts.preset = None;
        assert_eq!(
            opts.resolve_charset(&config).unwrap().len(),
            crate::charset::DEFAULT_CHARSET.chars().count()
        );
    }

    #[test]
    fn test_color_mode_flag() {
        let cli = parse(&["ascii-studio", "play", "clip.mp4", "--mono"]);
        assert_eq!(cli.convert_opts().color_mode(), ColorMode::Monochrome);
        let cli = parse(&["ascii-studio", "play", "clip.mp4"]);
        assert_eq!(cli.convert_opts().color_mode(), ColorMode::Color);
    }
}
