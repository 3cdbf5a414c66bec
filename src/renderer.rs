use crate::converter::AsciiFrame;
use crate::Result;
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{disable_raw_mode, enable_raw_mode, Clear, ClearType},
};
use log::debug;
use std::io::{stdout, Stdout, Write};

/// Terminal renderer for ASCII frames
pub struct Renderer {
    stdout: Stdout,
    use_colors: bool,
    terminal_width: u16,
    terminal_height: u16,
}

impl Renderer {
    /// Create a new renderer
    pub fn new(use_colors: bool) -> Result<Self> {
        let (terminal_width, terminal_height) = crossterm::terminal::size()?;

        Ok(Self {
            stdout: stdout(),
            use_colors,
            terminal_width,
            terminal_height,
        })
    }

    /// Initialize the terminal for rendering
    pub fn init(&mut self) -> Result<()> {
        enable_raw_mode()?;
        execute!(self.stdout, Hide, Clear(ClearType::All))?;
        debug!("Terminal initialized for rendering");
        Ok(())
    }

    /// Restore terminal to normal state
    pub fn cleanup(&mut self) -> Result<()> {
        execute!(self.stdout, Show, ResetColor, Clear(ClearType::All), MoveTo(0, 0))?;
        disable_raw_mode()?;
        debug!("Terminal restored to normal state");
        Ok(())
    }

    /// Update terminal dimensions after a resize event
    pub fn update_dimensions(&mut self) -> Result<(u16, u16)> {
        let (width, height) = crossterm::terminal::size()?;
        self.terminal_width = width;
        self.terminal_height = height;
        debug!("Terminal dimensions updated: {}x{}", width, height);
        Ok((width, height))
    }

    /// Current terminal dimensions
    pub fn dimensions(&self) -> (u16, u16) {
        (self.terminal_width, self.terminal_height)
    }

    /// Render an ASCII frame centered in the terminal
    pub fn render_frame(&mut self, frame: &AsciiFrame) -> Result<()> {
        // Grids wider or taller than the terminal are clipped to it.
        let visible_columns = frame.columns().min(u32::from(self.terminal_width)) as u16;
        let visible_rows = frame.rows().min(u32::from(self.terminal_height)) as u16;
        let offset_x = (self.terminal_width - visible_columns) / 2;
        let offset_y = (self.terminal_height - visible_rows) / 2;

        queue!(self.stdout, Clear(ClearType::All))?;

        for y in 0..visible_rows {
            queue!(self.stdout, MoveTo(offset_x, offset_y + y))?;
            for x in 0..visible_columns {
                if self.use_colors {
                    if let Some((r, g, b)) = frame.color(u32::from(x), u32::from(y)) {
                        queue!(self.stdout, SetForegroundColor(Color::Rgb { r, g, b }))?;
                    }
                }
                queue!(self.stdout, Print(frame.glyph(u32::from(x), u32::from(y))))?;
            }
        }

        if self.use_colors {
            queue!(self.stdout, ResetColor)?;
        }
        self.stdout.flush()?;
        Ok(())
    }

    /// Render frame with a status line at the bottom of the screen
    pub fn render_frame_with_status(&mut self, frame: &AsciiFrame, status: &str) -> Result<()> {
        self.render_frame(frame)?;

        if !status.is_empty() {
            let status_y = self.terminal_height.saturating_sub(1);
            queue!(self.stdout, MoveTo(0, status_y))?;

            if self.use_colors {
                queue!(self.stdout, SetForegroundColor(Color::White))?;
            }
            queue!(
                self.stdout,
                Print(truncate_status(status, self.terminal_width))
            )?;
            if self.use_colors {
                queue!(self.stdout, ResetColor)?;
            }
            self.stdout.flush()?;
        }

        Ok(())
    }

    /// Display error message
    pub fn display_error(&mut self, error: &str) -> Result<()> {
        execute!(self.stdout, Clear(ClearType::All))?;

        let y = self.terminal_height / 2;
        let x = (self.terminal_width / 2).saturating_sub(error.len() as u16 / 2);

        execute!(self.stdout, MoveTo(x, y))?;
        if self.use_colors {
            execute!(self.stdout, SetForegroundColor(Color::Red))?;
        }
        execute!(self.stdout, Print("ERROR: "), Print(error))?;
        if self.use_colors {
            execute!(self.stdout, ResetColor)?;
        }

        debug!("Error displayed: {}", error);
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        // Ensure terminal is restored on drop
        let _ = self.cleanup();
    }
}

/// Clip a status line to the terminal width without splitting a char.
fn truncate_status(status: &str, width: u16) -> &str {
    let width = width as usize;
    if status.len() <= width {
        return status;
    }
    let mut end = width;
    while !status.is_char_boundary(end) {
        end -= 1;
    }
    &status[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_status_untouched() {
        assert_eq!(truncate_status("playing", 80), "playing");
    }

    #[test]
    fn test_long_status_clipped_to_width() {
        let status = "x".repeat(200);
        assert_eq!(truncate_status(&status, 80).len(), 80);
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        // 'é' is two bytes; clipping at byte 3 would split it.
        let status = "aaé";
        assert_eq!(truncate_status(status, 3), "aa");
    }
}
