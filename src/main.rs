use ascii_studio::cli::{extension_of, Cli, Command, ConvertOpts, FontOpts};
use ascii_studio::converter::{convert_frame, ColorMode};
use ascii_studio::muxer::{self, AudioMuxer};
use ascii_studio::pipeline::{ConversionHandle, FrameCache};
use ascii_studio::renderer::Renderer;
use ascii_studio::scheduler::{PlaybackScheduler, Tick, TICK_PERIOD};
use ascii_studio::source::FrameSource;
use ascii_studio::{export, utils, AppConfig, AsciiStudioError, Charset, ExportRenderer};

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyModifiers};
use log::{error, info};
use std::env;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Err(e) = cli.validate() {
        error!("Invalid arguments: {}", e);
        std::process::exit(1);
    }

    info!("Starting ASCII Studio v{}", env!("CARGO_PKG_VERSION"));

    let convert = cli.convert_opts();
    let config = match convert.config {
        Some(ref path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    let charset = convert.resolve_charset(&config)?;
    let mode = convert.color_mode();

    match &cli.command {
        Command::Image {
            convert,
            output,
            font,
        } => run_image(convert, output, font, &charset, mode),
        Command::Play {
            convert,
            loop_playback,
            once,
        } => run_play(convert, *loop_playback, *once, &charset, mode).await,
        Command::Export {
            convert,
            output,
            font,
        } => run_export(convert, output, font, &charset, mode),
    }
}

/// Convert the first frame of the source and save it in the format the
/// output extension names.
fn run_image(
    convert: &ConvertOpts,
    output: &Path,
    font: &FontOpts,
    charset: &Charset,
    mode: ColorMode,
) -> Result<()> {
    let stream = FrameSource::open(&convert.input)?;
    let mut frames = stream.frames;
    let raw = frames.next().ok_or(AsciiStudioError::NoFrames)??;
    let frame = convert_frame(&raw, convert.columns, charset, mode);

    match extension_of(output).as_str() {
        "txt" => fs::write(output, frame.to_plain_text())
            .with_context(|| format!("writing {}", output.display()))?,
        "html" => fs::write(output, frame.to_html())
            .with_context(|| format!("writing {}", output.display()))?,
        _ => {
            let font_data = load_font(font)?;
            let renderer = ExportRenderer::new(&font_data, font.font_size, charset)?;
            let image = renderer.render_image(&frame)?;
            image
                .save(output)
                .with_context(|| format!("writing {}", output.display()))?;
        }
    }

    info!(
        "Wrote {} ({}x{} cells)",
        output.display(),
        frame.columns(),
        frame.rows()
    );
    Ok(())
}

/// Convert the whole source and play it back in the terminal.
async fn run_play(
    convert: &ConvertOpts,
    loop_playback: bool,
    once: bool,
    charset: &Charset,
    mode: ColorMode,
) -> Result<()> {
    let cache = convert_to_cache(convert, charset, mode)?;
    let looping = effective_looping(
        loop_playback,
        once,
        extension_of(&convert.input) == "gif",
    );

    let filename = convert
        .input
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("unknown")
        .to_string();

    let use_colors = mode == ColorMode::Color && atty::is(atty::Stream::Stdout);
    let mut renderer = Renderer::new(use_colors)?;
    renderer.init()?;

    let result = playback_loop(&mut renderer, cache, looping, &filename).await;
    if let Err(ref e) = result {
        renderer.display_error(&format!("Playback failed: {}", e))?;
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
    renderer.cleanup()?;
    result
}

/// GIFs loop by default, everything else plays once; explicit flags win.
fn effective_looping(loop_playback: bool, once: bool, is_gif: bool) -> bool {
    if loop_playback {
        true
    } else if once {
        false
    } else {
        is_gif
    }
}

async fn playback_loop(
    renderer: &mut Renderer,
    cache: FrameCache,
    looping: bool,
    filename: &str,
) -> Result<()> {
    let cache = Arc::new(cache);
    let frame_count = cache.frame_count();
    let frame_rate = cache.frame_rate();
    let started = Instant::now();
    let mut scheduler = PlaybackScheduler::start(Arc::clone(&cache), looping, started);
    let mut ticker = tokio::time::interval(TICK_PERIOD);

    loop {
        ticker.tick().await;

        if event::poll(Duration::ZERO)? {
            match event::read()? {
                Event::Key(key) => match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => {
                        info!("Quit requested by user");
                        break;
                    }
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        info!("Ctrl+C pressed, exiting");
                        break;
                    }
                    _ => {}
                },
                Event::Resize(..) => {
                    renderer.update_dimensions()?;
                }
                _ => {}
            }
        }

        match scheduler.on_tick(Instant::now()) {
            Tick::Show(index) => {
                let status = format!(
                    "{} | frame {}/{} @ {:.1} FPS | {} | q to quit",
                    filename,
                    index + 1,
                    frame_count,
                    frame_rate,
                    utils::format_duration(started.elapsed().as_secs_f64())
                );
                renderer.render_frame_with_status(cache.frame(index), &status)?;
            }
            Tick::Hold => {}
            Tick::Finished => {
                info!("Playback completed");
                break;
            }
        }
    }

    scheduler.stop();
    Ok(())
}

/// Convert the whole source and export it as an .mp4 (with the source
/// audio remuxed in) or a silent .gif.
fn run_export(
    convert: &ConvertOpts,
    output: &Path,
    font: &FontOpts,
    charset: &Charset,
    mode: ColorMode,
) -> Result<()> {
    // Resolve the external encoder up front so a missing ffmpeg fails
    // before any decoding work starts.
    let ffmpeg = muxer::locate_tool("ffmpeg")?;
    let muxer = AudioMuxer::with_tool(ffmpeg.clone());

    let font_data = load_font(font)?;
    let renderer = ExportRenderer::new(&font_data, font.font_size, charset)?;
    let cache = convert_to_cache(convert, charset, mode)?;

    let silent = env::temp_dir().join("ascii_studio_silent.mp4");
    let result = (|| -> Result<()> {
        let (canvas_width, _) = renderer.export_video(&ffmpeg, &cache, &silent)?;
        match extension_of(output).as_str() {
            "mp4" => muxer.mux(&silent, &convert.input, output)?,
            "gif" => muxer.to_gif(&silent, cache.frame_rate(), canvas_width, output)?,
            other => bail!("Unsupported export format '.{}'", other),
        }
        Ok(())
    })();
    muxer::remove_temp(&silent);
    result?;

    info!("Export complete: {}", output.display());
    Ok(())
}

/// Run the conversion worker to completion, echoing progress to stderr
/// when it is a terminal.
fn convert_to_cache(convert: &ConvertOpts, charset: &Charset, mode: ColorMode) -> Result<FrameCache> {
    let stream = FrameSource::open(&convert.input)?;
    let handle = ConversionHandle::spawn(stream, convert.columns, charset.clone(), mode)?;

    let show_progress = atty::is(atty::Stream::Stderr);
    let mut printed = false;
    for update in handle.progress().iter() {
        if show_progress {
            eprint!(
                "\rConverting... {:5.1}% ({}/{})",
                update.percentage(),
                update.frames_processed,
                update.total_frames
            );
            printed = true;
        }
    }
    if printed {
        eprintln!();
    }

    Ok(handle.wait()?)
}

/// Font bytes from the explicit option or a probed system location.
fn load_font(font: &FontOpts) -> Result<Vec<u8>> {
    let path = match font.font {
        Some(ref path) => path.clone(),
        None => export::find_monospace_font()
            .ok_or_else(|| anyhow!("No monospace font found; pass one with --font"))?,
    };
    fs::read(&path).with_context(|| format!("reading font {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gif_sources_loop_by_default() {
        assert!(effective_looping(false, false, true));
        assert!(!effective_looping(false, false, false));
    }

    #[test]
    fn test_explicit_flags_override_source_kind() {
        assert!(effective_looping(true, false, false));
        assert!(!effective_looping(false, true, true));
    }
}
