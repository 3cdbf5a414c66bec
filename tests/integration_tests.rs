use ascii_studio::prelude::*;
use assert_cmd::Command;
use image::RgbImage;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

/// Write a solid-color test image into `dir`.
fn create_test_image(dir: &Path, shade: u8) -> PathBuf {
    let path = dir.join("test_image.png");
    let img = RgbImage::from_pixel(64, 48, image::Rgb([shade, shade, shade]));
    img.save(&path).unwrap();
    path
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("ascii-studio").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("ASCII art"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("ascii-studio").unwrap();
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_missing_file() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("ascii-studio").unwrap();
    cmd.arg("image")
        .arg("nonexistent.png")
        .arg("-o")
        .arg(dir.path().join("out.txt"));
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_verbose_flag_enables_debug_logging() {
    let dir = tempdir().unwrap();
    let input = create_test_image(dir.path(), 128);
    let output = dir.path().join("out.txt");

    let mut cmd = Command::cargo_bin("ascii-studio").unwrap();
    cmd.env_remove("RUST_LOG")
        .arg("image")
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .arg("--verbose");
    // The image decode path logs at debug level; without --verbose the
    // default info filter hides it.
    cmd.assert()
        .success()
        .stderr(predicate::str::contains("DEBUG"));

    let mut cmd = Command::cargo_bin("ascii-studio").unwrap();
    cmd.env_remove("RUST_LOG")
        .arg("image")
        .arg(&input)
        .arg("-o")
        .arg(&output);
    cmd.assert()
        .success()
        .stderr(predicate::str::contains("DEBUG").not());
}

#[test]
fn test_cli_rejects_bad_columns() {
    let dir = tempdir().unwrap();
    let input = create_test_image(dir.path(), 128);

    let mut cmd = Command::cargo_bin("ascii-studio").unwrap();
    cmd.arg("play").arg(&input).arg("--columns").arg("0");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Columns must be between"));
}

#[test]
fn test_image_to_text_end_to_end() {
    let dir = tempdir().unwrap();
    let input = create_test_image(dir.path(), 255);
    let output = dir.path().join("out.txt");

    let mut cmd = Command::cargo_bin("ascii-studio").unwrap();
    cmd.arg("image")
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .arg("--columns")
        .arg("20")
        .arg("--charset")
        .arg(" .:-=+*#%@");
    cmd.assert().success();

    let text = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    // 20 columns, 64x48 source: round(20 * 48/64 * 0.55) = 8 rows.
    assert_eq!(lines.len(), 8);
    assert!(lines.iter().all(|l| l.chars().count() == 20));
    // An all-white source maps every cell to the brightest glyph.
    assert!(text.chars().filter(|c| *c != '\n').all(|c| c == '@'));
}

#[test]
fn test_image_to_html_end_to_end() {
    let dir = tempdir().unwrap();
    let input = create_test_image(dir.path(), 200);
    let output = dir.path().join("out.html");

    let mut cmd = Command::cargo_bin("ascii-studio").unwrap();
    cmd.arg("image")
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .arg("--columns")
        .arg("10");
    cmd.assert().success();

    let html = std::fs::read_to_string(&output).unwrap();
    assert!(html.contains("<span style=\"color: rgb(200,200,200)\">"));
    assert!(html.contains("<br>"));
}

#[test]
fn test_image_mono_html_has_no_color_tags() {
    let dir = tempdir().unwrap();
    let input = create_test_image(dir.path(), 200);
    let output = dir.path().join("out.html");

    let mut cmd = Command::cargo_bin("ascii-studio").unwrap();
    cmd.arg("image")
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .arg("--mono");
    cmd.assert().success();

    let html = std::fs::read_to_string(&output).unwrap();
    assert!(!html.contains("<span"));
}

#[test]
fn test_export_rejects_unknown_format() {
    let dir = tempdir().unwrap();
    let input = create_test_image(dir.path(), 128);

    let mut cmd = Command::cargo_bin("ascii-studio").unwrap();
    cmd.arg("export")
        .arg(&input)
        .arg("-o")
        .arg(dir.path().join("out.avi"));
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported export format"));
}

mod pipeline_tests {
    use super::*;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn cache_from_image(dir: &Path, columns: u32) -> FrameCache {
        let input = create_test_image(dir, 128);
        let stream = FrameSource::open(&input).unwrap();
        let charset = Charset::new(" .:-=+*#%@").unwrap();
        let handle =
            ConversionHandle::spawn(stream, columns, charset, ColorMode::Color).unwrap();
        handle.wait().unwrap()
    }

    #[test]
    fn test_image_pipeline_produces_single_frame_cache() {
        let dir = tempdir().unwrap();
        let cache = cache_from_image(dir.path(), 40);
        assert_eq!(cache.frame_count(), 1);
        let frame = cache.frame(0);
        assert_eq!(frame.columns(), 40);
        assert!(frame.is_color());
    }

    #[test]
    fn test_playback_of_converted_cache() {
        let dir = tempdir().unwrap();
        let cache = Arc::new(cache_from_image(dir.path(), 10));
        let start = Instant::now();
        let mut scheduler = PlaybackScheduler::start(cache, false, start);

        assert_eq!(scheduler.on_tick(start), Tick::Show(0));
        // A single still frame ends after its display window.
        assert_eq!(
            scheduler.on_tick(start + Duration::from_secs(1)),
            Tick::Finished
        );
    }

    #[test]
    fn test_cancelled_conversion_reports_cancelled() {
        let dir = tempdir().unwrap();
        let input = create_test_image(dir.path(), 128);
        let stream = FrameSource::open(&input).unwrap();
        let charset = Charset::new(" .:-=+*#%@").unwrap();
        let handle =
            ConversionHandle::spawn(stream, 10, charset, ColorMode::Monochrome).unwrap();
        handle.cancel();
        // One-frame sources may finish before the flag is seen; both
        // outcomes are legal, an error other than Cancelled is not.
        match handle.wait() {
            Ok(cache) => assert_eq!(cache.frame_count(), 1),
            Err(AsciiStudioError::Cancelled) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
}

mod config_tests {
    use super::*;

    #[test]
    fn test_custom_config_preset_selected() {
        let dir = tempdir().unwrap();
        let input = create_test_image(dir.path(), 255);
        let config_path = dir.path().join("config.json");
        let output = dir.path().join("out.txt");
        std::fs::write(
            &config_path,
            r#"{"presets": {"binary": " #"}, "default_preset": "binary"}"#,
        )
        .unwrap();

        let mut cmd = Command::cargo_bin("ascii-studio").unwrap();
        cmd.arg("image")
            .arg(&input)
            .arg("-o")
            .arg(&output)
            .arg("--columns")
            .arg("10")
            .arg("--config")
            .arg(&config_path);
        cmd.assert().success();

        let text = std::fs::read_to_string(&output).unwrap();
        assert!(text.chars().filter(|c| *c != '\n').all(|c| c == '#'));
    }
}

mod utils_tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "0:00");
        assert_eq!(format_duration(30.0), "0:30");
        assert_eq!(format_duration(90.0), "1:30");
        assert_eq!(format_duration(3661.0), "1:01:01");
    }
}
