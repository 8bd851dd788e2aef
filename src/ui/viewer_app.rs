use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use fast_image_resize::{images::Image, PixelType, Resizer};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::ViewerConfig;
use crate::renderer::cell::CellData;
use crate::renderer::preview::{fit_within, RgbCanvas};
use crate::renderer::{DisplayManager, DisplayMode, FrameProcessor};
use crate::viewer::{load_batch, UploadedImage, ViewerSession};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Decode an uploaded image and shrink it to fit `max` pixels.
pub fn decode_to_canvas(upload: &UploadedImage, max: (u32, u32), resizer: &mut Resizer) -> Result<(RgbCanvas, (u32, u32))> {
    let decoded = image::load_from_memory(&upload.bytes)
        .with_context(|| format!("Error loading image {}", upload.name))?
        .to_rgb8();
    let (src_w, src_h) = decoded.dimensions();

    let (w, h) = fit_within((src_w, src_h), max);
    if w == 0 || h == 0 {
        anyhow::bail!("Terminal too small to show {}", upload.name);
    }

    let src = Image::from_vec_u8(src_w, src_h, decoded.into_raw(), PixelType::U8x3)?;
    let mut dst = Image::new(w, h, PixelType::U8x3);
    resizer.resize(&src, &mut dst, None)?;

    let canvas = RgbCanvas { data: dst.buffer().to_vec(), width: w, height: h };
    Ok((canvas, (src_w, src_h)))
}

struct ViewerApp {
    config: ViewerConfig,
    uploads: Vec<PathBuf>,
    session: ViewerSession,
    resizer: Resizer,
    cells: Vec<CellData>,
    dimensions: Option<(u32, u32)>,
    message: String,
    dirty: bool,
    quit: bool,
}

pub fn run(config: ViewerConfig, uploads: Vec<PathBuf>, mode: DisplayMode) -> Result<()> {
    let mut app = ViewerApp {
        config,
        uploads,
        session: ViewerSession::new(),
        resizer: Resizer::new(),
        cells: Vec::new(),
        dimensions: None,
        message: String::new(),
        dirty: true,
        quit: false,
    };
    app.upload();

    let mut display = DisplayManager::new(mode)?;
    while !app.quit {
        if app.dirty {
            app.render(&mut display)?;
            app.dirty = false;
        }
        if event::poll(POLL_INTERVAL)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => app.handle_key(key),
                Event::Resize(_, _) => {
                    display.invalidate();
                    app.dirty = true;
                }
                _ => {}
            }
        }
    }
    Ok(())
}

impl ViewerApp {
    /// Validate the command-line batch and load what passes into the session.
    fn upload(&mut self) {
        let outcome = load_batch(&self.uploads, &self.config);
        let rejected: Vec<String> = outcome.rejected.iter().map(|(name, e)| format!("Skipped {}: {}", name, e)).collect();
        let loaded = self.session.load_batch(outcome);

        self.message = match (loaded, rejected.first()) {
            (0, None) => "No images uploaded".to_string(),
            (0, Some(first)) => format!("No valid images. {}", first),
            (n, None) => format!("✓ Loaded {} images", n),
            (n, Some(first)) if rejected.len() == 1 => format!("✓ Loaded {} images. {}", n, first),
            (n, Some(first)) => format!("✓ Loaded {} images. {} (+{} more skipped)", n, first, rejected.len() - 1),
        };
        self.dirty = true;
    }

    fn handle_key(&mut self, key: KeyEvent) {
        let moved = match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.quit = true;
                false
            }
            KeyCode::Char('q') | KeyCode::Esc => {
                self.quit = true;
                false
            }
            KeyCode::Right | KeyCode::Char('l') | KeyCode::Char(' ') => self.session.next(),
            KeyCode::Left | KeyCode::Char('h') | KeyCode::Backspace => self.session.previous(),
            KeyCode::Home | KeyCode::Char('g') => {
                self.session.first();
                true
            }
            KeyCode::End | KeyCode::Char('G') => {
                self.session.last();
                true
            }
            KeyCode::Char(d) if d.is_ascii_digit() && d != '0' => {
                // 1 is the first image, 9 the last, the rest spread between.
                let step = d.to_digit(10).unwrap_or(1) as usize - 1;
                self.session.seek(step * self.session.len().saturating_sub(1) / 8);
                true
            }
            KeyCode::Char('n') => {
                self.session.reset();
                self.message = "New session started, press [u] to upload".to_string();
                true
            }
            KeyCode::Char('u') => {
                self.upload();
                true
            }
            _ => false,
        };
        if moved {
            self.dirty = true;
        }
    }

    fn render(&mut self, display: &mut DisplayManager) -> Result<()> {
        self.dimensions = None;
        let canvas = display.canvas_size();

        match self.session.current() {
            Some(upload) => match decode_to_canvas(upload, canvas, &mut self.resizer) {
                Ok((rgb, dims)) => {
                    let processor = FrameProcessor::new(rgb.width as usize, rgb.height as usize);
                    processor.process_frame_into(&rgb.data, &mut self.cells);
                    display.invalidate();
                    display.render_diff(&self.cells, rgb.width as usize)?;
                    self.dimensions = Some(dims);
                }
                Err(e) => {
                    log::warn!("{:#}", e);
                    self.message = format!("{:#}", e);
                    self.clear_picture(display, canvas)?;
                }
            },
            None => self.clear_picture(display, canvas)?,
        }

        display.draw_status(&self.status_lines())
    }

    fn clear_picture(&mut self, display: &mut DisplayManager, canvas: (u32, u32)) -> Result<()> {
        let (w, h) = (canvas.0 as usize, canvas.1 as usize);
        self.cells.clear();
        self.cells.resize(w * (h / 2), CellData::default());
        display.invalidate();
        display.render_diff(&self.cells, w)
    }

    fn status_lines(&self) -> Vec<String> {
        let info = match (self.session.current(), self.session.position()) {
            (Some(upload), Some((pos, total))) => {
                let dims = self
                    .dimensions
                    .map(|(w, h)| format!(" | {} × {}", w, h))
                    .unwrap_or_default();
                format!(
                    "Image {} / {} | {} | {:.1} KB{}",
                    pos,
                    total,
                    upload.name,
                    upload.size() as f64 / 1024.0,
                    dims
                )
            }
            _ => "Upload images to get started".to_string(),
        };

        vec![
            info,
            format!(
                "Session: {}... since {} | User ID: {} | [←/→] prev/next [g/G] first/last [1-9] jump [n] new [u] upload [q] quit",
                &self.session.token()[..16],
                self.session.created().format("%H:%M:%S"),
                self.session.user_id()
            ),
            self.message.clone(),
        ]
    }
}
