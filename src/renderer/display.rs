use anyhow::Result;
use crossbeam_channel::{Sender, TrySendError};
use crossterm::terminal;
use std::io::{BufWriter, Write};
use std::thread::JoinHandle;

use super::cell::{CellData, Rgb};

/// Rows kept free under the picture for status text.
pub const STATUS_ROWS: u16 = 3;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
pub enum DisplayMode {
    /// Grayscale characters, no color escapes.
    Ascii,
    /// Truecolor half blocks.
    Rgb,
}

/// Owns the terminal while the preview is up.
///
/// Output is assembled here and handed to a writer thread through a channel
/// of capacity 2; if the terminal can't keep up, picture updates are
/// dropped rather than queued.
pub struct DisplayManager {
    tx: Option<Sender<Vec<u8>>>,
    writer: Option<JoinHandle<()>>,
    mode: DisplayMode,
    last_cells: Option<Vec<CellData>>,
    last_status: Vec<String>,
    render_buffer: Vec<u8>,
}

impl DisplayManager {
    pub fn new(mode: DisplayMode) -> Result<Self> {
        let (tx, rx) = crossbeam_channel::bounded::<Vec<u8>>(2);

        let writer = std::thread::Builder::new().name("display".to_string()).spawn(move || {
            let stdout = std::io::stdout();
            let mut writer = BufWriter::with_capacity(4 * 1024 * 1024, stdout);

            while let Ok(data) = rx.recv() {
                if let Err(e) = writer.write_all(&data).and_then(|_| writer.flush()) {
                    log::error!("Terminal write failed: {}", e);
                    break;
                }
            }
        })?;

        terminal::enable_raw_mode()?;

        let mut dm = Self {
            tx: Some(tx),
            writer: Some(writer),
            mode,
            last_cells: None,
            last_status: Vec::new(),
            render_buffer: Vec::with_capacity(1024 * 1024),
        };

        let mut init = Vec::new();
        init.extend_from_slice(b"\x1b[?1049h"); // alternate screen
        init.extend_from_slice(b"\x1b[?25l"); // hide cursor
        init.extend_from_slice(b"\x1b[?7l"); // no line wrap
        init.extend_from_slice(b"\x1b[?12l"); // no cursor blink
        init.extend_from_slice(b"\x1b[2J");
        dm.send_blocking(init);

        Ok(dm)
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    /// Terminal size in character cells.
    pub fn terminal_size(&self) -> (u16, u16) {
        terminal::size().unwrap_or((80, 24))
    }

    /// Largest pixel canvas (width, height) available for the picture.
    pub fn canvas_size(&self) -> (u32, u32) {
        let (cols, rows) = self.terminal_size();
        let rows = rows.saturating_sub(STATUS_ROWS).max(1);
        (cols as u32, rows as u32 * 2)
    }

    /// Forget what is on screen so the next frame is drawn in full.
    pub fn invalidate(&mut self) {
        self.last_cells = None;
        self.last_status.clear();
    }

    #[inline(always)]
    fn write_num(buffer: &mut Vec<u8>, n: u16) {
        let mut digits = [0u8; 5];
        let mut len = 0;
        let mut n = n;
        loop {
            digits[len] = b'0' + (n % 10) as u8;
            len += 1;
            n /= 10;
            if n == 0 {
                break;
            }
        }
        buffer.extend(digits[..len].iter().rev());
    }

    #[inline(always)]
    fn move_to(buffer: &mut Vec<u8>, x: u16, y: u16) {
        buffer.extend_from_slice(b"\x1b[");
        Self::write_num(buffer, y + 1);
        buffer.push(b';');
        Self::write_num(buffer, x + 1);
        buffer.push(b'H');
    }

    #[inline(always)]
    fn write_color(buffer: &mut Vec<u8>, prefix: &[u8], c: Rgb) {
        buffer.extend_from_slice(prefix);
        Self::write_num(buffer, c.0 as u16);
        buffer.push(b';');
        Self::write_num(buffer, c.1 as u16);
        buffer.push(b';');
        Self::write_num(buffer, c.2 as u16);
        buffer.push(b'm');
    }

    #[inline(always)]
    fn color_distance_sq(c1: Rgb, c2: Rgb) -> i32 {
        let r = c1.0 as i32 - c2.0 as i32;
        let g = c1.1 as i32 - c2.1 as i32;
        let b = c1.2 as i32 - c2.2 as i32;
        r * r + g * g + b * b
    }

    fn ascii_for(c: Rgb) -> char {
        const RAMP: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];
        let brightness = (c.0 as u32 * 299 + c.1 as u32 * 587 + c.2 as u32 * 114) / 1000;
        RAMP[((brightness * (RAMP.len() as u32 - 1)) / 255) as usize]
    }

    /// Draw a cell grid `width` cells wide, centered above the status area.
    /// Cells whose colors barely moved are skipped; sensor noise would
    /// otherwise repaint the whole screen every frame.
    pub fn render_diff(&mut self, cells: &[CellData], width: usize) -> Result<()> {
        if width == 0 || cells.is_empty() {
            return Ok(());
        }

        self.render_buffer.clear();
        let buffer = &mut self.render_buffer;
        buffer.extend_from_slice(b"\x1b[?2026h");

        let force_redraw = self.last_cells.as_ref().map(|v| v.len()) != Some(cells.len());
        if force_redraw {
            // Clear only the picture area, the status lines stay.
            let (_, rows) = terminal::size().unwrap_or((80, 24));
            for y in 0..rows.saturating_sub(STATUS_ROWS) {
                Self::move_to(buffer, 0, y);
                buffer.extend_from_slice(b"\x1b[0m\x1b[2K");
            }
            self.last_cells = Some(vec![CellData::default(); cells.len()]);
        }
        let last_cells = match &mut self.last_cells {
            Some(v) => v,
            None => return Ok(()),
        };

        let (term_cols, term_rows) = terminal::size().unwrap_or((80, 24));
        let area_rows = term_rows.saturating_sub(STATUS_ROWS);
        let content_width = width as u16;
        let content_height = (cells.len() / width) as u16;
        let offset_x = term_cols.saturating_sub(content_width) / 2;
        let offset_y = area_rows.saturating_sub(content_height) / 2;

        let diff_threshold = 100;
        let mut last_fg: Option<Rgb> = None;
        let mut last_bg: Option<Rgb> = None;
        let mut cursor: Option<(u16, u16)> = None;

        for (i, cell) in cells.iter().enumerate() {
            let old = &last_cells[i];
            let changed = force_redraw
                || cell.char != old.char
                || Self::color_distance_sq(cell.fg, old.fg) > diff_threshold
                || Self::color_distance_sq(cell.bg, old.bg) > diff_threshold;

            if !changed {
                cursor = None;
                continue;
            }

            let x = (i % width) as u16 + offset_x;
            let y = (i / width) as u16 + offset_y;
            if x >= term_cols || y >= area_rows {
                cursor = None;
                continue;
            }

            if cursor != Some((x, y)) {
                Self::move_to(buffer, x, y);
            }

            match self.mode {
                DisplayMode::Rgb => {
                    if Some(cell.fg) != last_fg {
                        Self::write_color(buffer, b"\x1b[38;2;", cell.fg);
                        last_fg = Some(cell.fg);
                    }
                    if Some(cell.bg) != last_bg {
                        Self::write_color(buffer, b"\x1b[48;2;", cell.bg);
                        last_bg = Some(cell.bg);
                    }
                    let mut utf8 = [0u8; 4];
                    buffer.extend_from_slice(cell.char.encode_utf8(&mut utf8).as_bytes());
                }
                DisplayMode::Ascii => {
                    let mut utf8 = [0u8; 4];
                    buffer.extend_from_slice(Self::ascii_for(cell.fg).encode_utf8(&mut utf8).as_bytes());
                }
            }

            last_cells[i] = *cell;
            cursor = Some((x + 1, y));
        }

        buffer.extend_from_slice(b"\x1b[0m");
        buffer.extend_from_slice(b"\x1b[?2026l");

        let frame = buffer.clone();
        match self.tx.as_ref().map(|tx| tx.try_send(frame)) {
            Some(Ok(())) | None => {}
            Some(Err(TrySendError::Full(_))) => {
                // Terminal is behind. Forget the screen state so the next
                // frame repaints what this one would have.
                self.last_cells = None;
            }
            Some(Err(e)) => return Err(anyhow::anyhow!("Display channel error: {}", e)),
        }

        Ok(())
    }

    /// Replace the status area under the picture. Unchanged text is not resent.
    pub fn draw_status(&mut self, lines: &[String]) -> Result<()> {
        if lines == self.last_status.as_slice() {
            return Ok(());
        }

        let (cols, rows) = terminal::size().unwrap_or((80, 24));
        let top = rows.saturating_sub(STATUS_ROWS);
        let mut buffer = Vec::new();
        buffer.extend_from_slice(b"\x1b[0m");
        for row in 0..STATUS_ROWS {
            Self::move_to(&mut buffer, 0, top + row);
            buffer.extend_from_slice(b"\x1b[2K");
            if let Some(line) = lines.get(row as usize) {
                let clipped: String = line.chars().take(cols as usize).collect();
                buffer.extend_from_slice(clipped.as_bytes());
            }
        }

        self.send_blocking(buffer);
        self.last_status = lines.to_vec();
        Ok(())
    }

    /// Status text must not be dropped like picture updates.
    fn send_blocking(&mut self, data: Vec<u8>) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(data);
        }
    }
}

impl Drop for DisplayManager {
    fn drop(&mut self) {
        let mut restore = Vec::new();
        restore.extend_from_slice(b"\x1b[0m");
        restore.extend_from_slice(b"\x1b[?7h"); // line wrap back on
        restore.extend_from_slice(b"\x1b[?25h"); // show cursor
        restore.extend_from_slice(b"\x1b[?1049l"); // leave alternate screen
        self.send_blocking(restore);

        // Closing the channel lets the writer drain and exit.
        self.tx.take();
        if let Some(writer) = self.writer.take() {
            let _ = writer.join();
        }
        let _ = terminal::disable_raw_mode();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_num() {
        let mut buf = Vec::new();
        for n in [0u16, 7, 42, 255, 1000, 65535] {
            buf.clear();
            DisplayManager::write_num(&mut buf, n);
            assert_eq!(String::from_utf8(buf.clone()).unwrap(), n.to_string());
        }
    }

    #[test]
    fn test_ascii_ramp_ends() {
        assert_eq!(DisplayManager::ascii_for((0, 0, 0)), ' ');
        assert_eq!(DisplayManager::ascii_for((255, 255, 255)), '@');
    }

    #[test]
    fn test_move_to_is_one_based() {
        let mut buf = Vec::new();
        DisplayManager::move_to(&mut buf, 0, 4);
        assert_eq!(buf, b"\x1b[5;1H");
    }
}
