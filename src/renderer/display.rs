use anyhow::Result;
use crossterm::{
    cursor,
    event::{DisableMouseCapture, EnableMouseCapture},
    style::Print,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen, SetTitle},
    ExecutableCommand,
};
use std::io::{BufWriter, Stdout, Write};

use super::cell::CellData;
use super::layout::Viewport;

/// Owns the terminal while the viewer runs: image cells on top, status rows below.
pub struct DisplayManager {
    stdout: BufWriter<Stdout>,
    status_rows: u16,
    last_cells: Option<Vec<CellData>>,
    last_width: usize,
    render_buffer: Vec<u8>,
}

impl DisplayManager {
    pub fn new(title: &str, status_rows: u16) -> Result<Self> {
        let stdout = BufWriter::with_capacity(4 * 1024 * 1024, std::io::stdout());
        let mut dm = Self {
            stdout,
            status_rows,
            last_cells: None,
            last_width: 0,
            render_buffer: Vec::with_capacity(4 * 1024 * 1024),
        };

        dm.initialize_terminal(title)?;

        Ok(dm)
    }

    fn initialize_terminal(&mut self, title: &str) -> Result<()> {
        terminal::enable_raw_mode()?;
        self.stdout.execute(EnterAlternateScreen)?;
        self.stdout.execute(cursor::Hide)?;
        self.stdout.execute(EnableMouseCapture)?;
        self.stdout.execute(SetTitle(title))?;

        // Disable line wrapping (DECRAWM) so the last column never scrolls
        self.stdout.execute(Print("\x1b[?7l"))?;
        // Disable cursor blinking
        self.stdout.execute(Print("\x1b[?12l"))?;

        Ok(())
    }

    /// Return terminal size in character columns and rows, converting from pixels when needed.
    pub fn terminal_size_chars(&self) -> Result<(u16, u16)> {
        let (mut term_cols, mut term_rows) = terminal::size()?;
        if let (Ok(cw_str), Ok(ch_str)) =
            (std::env::var("CHAR_WIDTH"), std::env::var("CHAR_HEIGHT"))
        {
            if let (Ok(cw), Ok(ch)) = (cw_str.parse::<u16>(), ch_str.parse::<u16>()) {
                if term_cols > cw * 16 {
                    term_cols = (term_cols / cw).max(1);
                }
                if term_rows > ch * 8 {
                    term_rows = (term_rows / ch).max(1);
                }
            }
        }
        Ok((term_cols, term_rows))
    }

    /// Image area in pixels: one column per cell, two rows per cell.
    pub fn viewport(&self) -> Result<Viewport> {
        let (cols, rows) = self.terminal_size_chars()?;
        Ok(viewport_for(cols, rows, self.status_rows))
    }

    pub fn status_rows(&self) -> u16 {
        self.status_rows
    }


    /// Force a full repaint on the next frame (after a resize).
    pub fn invalidate(&mut self) {
        self.last_cells = None;
    }

    // Helper for zero-allocation integer writing
    #[inline(always)]
    fn write_u8_fast(buffer: &mut Vec<u8>, mut n: u8) {
        if n >= 100 {
            buffer.push(b'0' + (n / 100));
            n %= 100;
            buffer.push(b'0' + (n / 10));
            n %= 10;
            buffer.push(b'0' + n);
        } else if n >= 10 {
            buffer.push(b'0' + (n / 10));
            n %= 10;
            buffer.push(b'0' + n);
        } else {
            buffer.push(b'0' + n);
        }
    }

    #[inline(always)]
    fn write_u16_fast(buffer: &mut Vec<u8>, n: u16) {
        let mut digits = [0u8; 5];
        let mut len = 0;
        let mut rest = n;
        loop {
            digits[len] = b'0' + (rest % 10) as u8;
            len += 1;
            rest /= 10;
            if rest == 0 {
                break;
            }
        }
        for d in digits[..len].iter().rev() {
            buffer.push(*d);
        }
    }

    fn push_rgb(buffer: &mut Vec<u8>, prefix: &[u8], rgb: (u8, u8, u8)) {
        buffer.extend_from_slice(prefix);
        Self::write_u8_fast(buffer, rgb.0);
        buffer.push(b';');
        Self::write_u8_fast(buffer, rgb.1);
        buffer.push(b';');
        Self::write_u8_fast(buffer, rgb.2);
        buffer.push(b'm');
    }

    fn move_to(buffer: &mut Vec<u8>, col: u16, row: u16) {
        buffer.extend_from_slice(b"\x1b[");
        Self::write_u16_fast(buffer, row + 1);
        buffer.push(b';');
        Self::write_u16_fast(buffer, col + 1);
        buffer.push(b'H');
    }

    /// Write only the cells that changed since the previous call.
    pub fn render_diff(&mut self, cells: &[CellData], width: usize) -> Result<()> {
        let start_render = std::time::Instant::now();

        self.render_buffer.clear();
        let buffer = &mut self.render_buffer;

        // Synchronized update begin (DECSM 2026)
        buffer.extend_from_slice(b"\x1b[?2026h");

        let mut force_redraw = false;
        if self.last_width != width
            || self.last_cells.as_ref().map(|v| v.len()).unwrap_or(0) != cells.len()
        {
            buffer.extend_from_slice(b"\x1b[2J");
            self.last_cells = Some(vec![CellData::default(); cells.len()]);
            self.last_width = width;
            force_redraw = true;
        }

        let last_cells = match &mut self.last_cells {
            Some(v) => v,
            None => {
                return Ok(());
            }
        };

        let (term_cols, term_rows) = terminal::size().unwrap_or((80, 24));

        let mut last_fg: Option<(u8, u8, u8)> = None;
        let mut last_bg: Option<(u8, u8, u8)> = None;
        let mut cursor_x: i32 = -1;
        let mut cursor_y: i32 = -1;

        for (i, cell) in cells.iter().enumerate() {
            let old_cell = &last_cells[i];
            if !force_redraw && cell == old_cell {
                cursor_x = -1;
                continue;
            }

            let x = (i % width) as u16;
            let y = (i / width) as u16;
            if x >= term_cols || y >= term_rows {
                cursor_x = -1;
                continue;
            }

            if cursor_x != x as i32 || cursor_y != y as i32 {
                Self::move_to(buffer, x, y);
                cursor_x = x as i32;
                cursor_y = y as i32;
            }

            if Some(cell.fg) != last_fg {
                Self::push_rgb(buffer, b"\x1b[38;2;", cell.fg);
                last_fg = Some(cell.fg);
            }
            if Some(cell.bg) != last_bg {
                Self::push_rgb(buffer, b"\x1b[48;2;", cell.bg);
                last_bg = Some(cell.bg);
            }

            let mut b_dst = [0u8; 4];
            buffer.extend_from_slice(cell.char.encode_utf8(&mut b_dst).as_bytes());

            last_cells[i] = *cell;
            cursor_x += 1;
        }

        buffer.extend_from_slice(b"\x1b[0m");
        buffer.extend_from_slice(b"\x1b[?2026l");

        let diff_time = start_render.elapsed();

        let start_io = std::time::Instant::now();
        self.stdout.write_all(buffer)?;
        self.stdout.flush()?;
        let io_time = start_io.elapsed();

        let total_time = start_render.elapsed();
        if total_time.as_millis() > 10 {
            crate::utils::logger::debug(&format!(
                "SLOW RENDER: Total={}us | Diff={}us | IO={}us | Cells: {}",
                total_time.as_micros(),
                diff_time.as_micros(),
                io_time.as_micros(),
                cells.len()
            ));
        }

        Ok(())
    }

    /// Draw the status rows starting at `first_row`; `patch` is drawn after the last line.
    pub fn draw_status(&mut self, first_row: u16, lines: &[String], patch: Option<(u8, u8, u8)>) -> Result<()> {
        if self.status_rows == 0 {
            return Ok(());
        }
        let (term_cols, _) = self.terminal_size_chars()?;

        self.render_buffer.clear();
        let buffer = &mut self.render_buffer;
        buffer.extend_from_slice(b"\x1b[?2026h");

        for row in 0..self.status_rows {
            Self::move_to(buffer, 0, first_row + row);
            buffer.extend_from_slice(b"\x1b[0m\x1b[2K");
            if let Some(line) = lines.get(row as usize) {
                let text: String = line.chars().take(term_cols as usize).collect();
                buffer.extend_from_slice(text.as_bytes());

                let is_last = row as usize + 1 == lines.len();
                if let (true, Some(rgb)) = (is_last, patch) {
                    if text.chars().count() + 3 <= term_cols as usize {
                        buffer.push(b' ');
                        Self::push_rgb(buffer, b"\x1b[48;2;", rgb);
                        buffer.extend_from_slice(b"  \x1b[0m");
                    }
                }
            }
        }

        buffer.extend_from_slice(b"\x1b[?2026l");
        self.stdout.write_all(buffer)?;
        self.stdout.flush()?;
        Ok(())
    }

    /// Clear the whole screen, used when no frame has arrived yet.
    pub fn clear(&mut self) -> Result<()> {
        self.stdout.write_all(b"\x1b[0m\x1b[2J")?;
        self.stdout.flush()?;
        self.invalidate();
        Ok(())
    }
}

/// Pixel viewport for a terminal of `cols × rows` with `status_rows` reserved.
pub fn viewport_for(cols: u16, rows: u16, status_rows: u16) -> Viewport {
    let image_rows = rows.saturating_sub(status_rows);
    Viewport::new(cols as u32, image_rows as u32 * 2)
}

impl Drop for DisplayManager {
    fn drop(&mut self) {
        let _ = self.stdout.execute(Print("\x1b[?7h"));
        let _ = self.stdout.execute(DisableMouseCapture);
        let _ = self.stdout.execute(cursor::Show);
        let _ = self.stdout.execute(LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}
