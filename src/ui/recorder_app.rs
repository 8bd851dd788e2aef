use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use crate::config::AppConfig;
use crate::core::capture::{CaptureHandle, NoDevice};
use crate::core::extractor::{spawn_extraction, ExtractionEvent, ExtractionJob, ExtractionOutcome};
use crate::core::frame_queue::FrameQueue;
use crate::core::recorder::Recorder;
use crate::core::session::session_stamp;
use crate::decoder::{Camera, CameraInfo, FrameSink, VideoFileWriter};
use crate::renderer::{DisplayManager, DisplayMode, FrameProcessor, PreviewScaler};

/// Terminal front end for the recorder. Everything here runs on the one UI
/// thread; the camera is read on the capture thread and stills are
/// extracted on their own threads.
struct RecorderApp {
    config: AppConfig,
    recorder: Arc<Recorder>,
    queue: FrameQueue,
    camera: Option<CameraInfo>,
    events_tx: Sender<ExtractionEvent>,
    events_rx: Receiver<ExtractionEvent>,
    extractions: Vec<JoinHandle<ExtractionOutcome>>,
    scaler: PreviewScaler,
    processor: Option<FrameProcessor>,
    cells: Vec<crate::renderer::cell::CellData>,
    status: String,
    stats: String,
    progress: String,
    quit: bool,
}

pub fn run(config: AppConfig, mode: DisplayMode) -> Result<()> {
    fs::create_dir_all(&config.recording.output_dir)
        .with_context(|| format!("Failed to create {}", config.recording.output_dir.display()))?;
    fs::create_dir_all(&config.extraction.images_dir)
        .with_context(|| format!("Failed to create {}", config.extraction.images_dir.display()))?;

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)).context("Error registering Ctrl-C handler")?;

    let recorder = Arc::new(Recorder::new(config.recording.stats_interval));
    let queue = FrameQueue::default();
    let (events_tx, events_rx) = crossbeam_channel::unbounded();

    let mut app = RecorderApp {
        scaler: PreviewScaler::new(config.preview.width, config.preview.height),
        config,
        recorder,
        queue,
        camera: None,
        events_tx,
        events_rx,
        extractions: Vec::new(),
        processor: None,
        cells: Vec::new(),
        status: "Initializing...".to_string(),
        stats: String::new(),
        progress: String::new(),
        quit: false,
    };

    let interval = app.config.camera.frame_interval();
    let capture = match Camera::open(&app.config.camera) {
        Ok(camera) => {
            let info = camera.info();
            app.camera = Some(info);
            app.status = format!("Ready - {}x{} @ {:.1} FPS", info.width, info.height, info.fps);
            CaptureHandle::spawn(camera, app.queue.clone(), Arc::clone(&app.recorder), interval)?
        }
        Err(e) => {
            log::error!("Camera error: {}", e);
            app.status = format!("Error: {}", e);
            CaptureHandle::spawn(NoDevice, app.queue.clone(), Arc::clone(&app.recorder), interval)?
        }
    };

    let loop_result = {
        let mut display = DisplayManager::new(mode)?;
        let result = app.event_loop(&mut display, &interrupted);
        app.shutdown_recording();
        result
        // display dropped here, terminal restored
    };

    if capture.shutdown(app.config.preview.join_timeout()).is_none() {
        log::warn!("Capture thread left running at exit");
    }

    app.finish_extractions();
    println!("✓ Closed");
    loop_result
}

impl RecorderApp {
    fn event_loop(&mut self, display: &mut DisplayManager, interrupted: &AtomicBool) -> Result<()> {
        let refresh = self.config.preview.refresh();
        let mut next_tick = Instant::now();

        while !self.quit && !interrupted.load(Ordering::SeqCst) {
            let timeout = next_tick.saturating_duration_since(Instant::now());
            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key),
                    Event::Resize(_, _) => display.invalidate(),
                    _ => {}
                }
            }

            let now = Instant::now();
            if now >= next_tick {
                self.tick(display)?;
                next_tick += refresh;
                if next_tick < now {
                    next_tick = now + refresh;
                }
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => self.quit = true,
            KeyCode::Char('q') | KeyCode::Esc => self.quit = true,
            KeyCode::Char('r') | KeyCode::Char(' ') | KeyCode::Enter => self.toggle_recording(),
            _ => {}
        }
    }

    fn toggle_recording(&mut self) {
        if self.recorder.is_recording() {
            self.stop_recording();
        } else {
            self.start_recording();
        }
    }

    fn start_recording(&mut self) {
        let Some(info) = self.camera else {
            self.status = "Error: Camera not available".to_string();
            return;
        };

        let fps = self.config.camera.fps;
        let codec = self.config.recording.codec.clone();
        let stamp = session_stamp(chrono::Local::now());

        let result = self.recorder.start(
            &self.config.recording.output_dir,
            stamp,
            &self.config.recording.container,
            fps,
            |path: &Path| {
                VideoFileWriter::create(path, &codec, fps, info.width, info.height)
                    .map(|writer| Box::new(writer) as Box<dyn FrameSink>)
            },
        );

        match result {
            Ok(()) => {
                self.status = format!("Recording {}x{} @ {} FPS", info.width, info.height, fps);
                self.stats.clear();
            }
            Err(e) => {
                log::error!("Could not start recording: {}", e);
                self.status = format!("Error: {}", e);
            }
        }
    }

    fn stop_recording(&mut self) {
        let summary = match self.recorder.stop() {
            Ok(summary) => summary,
            Err(e) => {
                log::error!("Stopping recording failed: {}", e);
                self.status = format!("Error: {}", e);
                return;
            }
        };

        self.stats = format!(
            "Video: {:.1}s | {} frames | Avg FPS: {:.2}",
            summary.elapsed.as_secs_f64(),
            summary.frames,
            summary.average_fps
        );

        let job = ExtractionJob::for_session(&summary, &self.config.extraction);
        match spawn_extraction(job, self.events_tx.clone()) {
            Ok(handle) => {
                self.extractions.push(handle);
                self.status = "Recording saved - Extracting images...".to_string();
            }
            Err(e) => {
                log::error!("Could not start extraction thread: {}", e);
                self.status = format!("Recording saved - extraction not started: {}", e);
            }
        }
    }

    fn shutdown_recording(&mut self) {
        if self.recorder.is_recording() {
            log::info!("Stopping active recording before exit");
            self.stop_recording();
        }
    }

    fn drain_extraction_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                ExtractionEvent::Started { planned, .. } => {
                    self.progress = format!("⏳ Extracting {} images...", planned);
                }
                ExtractionEvent::Progress { done, planned, .. } => {
                    let pct = done as f64 / planned.max(1) as f64 * 100.0;
                    self.progress = format!("⏳ Extracting images: {}/{} ({:.0}%)", done, planned, pct);
                }
                ExtractionEvent::Skipped { .. } => {}
                ExtractionEvent::Finished(ExtractionOutcome::Complete(report)) => {
                    self.progress =
                        format!("✓ Extracted {} images to: {}", report.extracted, report.output_dir.display());
                    self.status = format!("Complete - Video saved & {} images extracted", report.extracted);
                }
                ExtractionEvent::Finished(ExtractionOutcome::FailedToOpen(_)) => {
                    self.progress = "✗ Error opening video".to_string();
                }
                ExtractionEvent::Finished(ExtractionOutcome::Aborted(reason)) => {
                    self.progress = format!("✗ Error: {}", reason);
                }
            }
        }
        self.extractions.retain(|handle| !handle.is_finished());
    }

    fn tick(&mut self, display: &mut DisplayManager) -> Result<()> {
        self.drain_extraction_events();

        if self.recorder.is_recording() {
            self.stats = format!(
                "Recording: {} frames | Actual FPS: {:.2}",
                self.recorder.frames_recorded(),
                self.recorder.measured_fps()
            );
        }

        if let Some(frame) = self.queue.take_latest() {
            match self.scaler.prepare(&frame, display.canvas_size()) {
                Ok(canvas) => {
                    let (w, h) = (canvas.width as usize, canvas.height as usize);
                    let processor = match self.processor.take() {
                        Some(p) if p.width == w && p.height == h => p,
                        _ => FrameProcessor::new(w, h),
                    };
                    processor.process_frame_into(&canvas.data, &mut self.cells);
                    display.render_diff(&self.cells, w)?;
                    self.processor = Some(processor);
                }
                Err(e) => log::debug!("Preview skipped: {}", e),
            }
        }

        display.draw_status(&self.status_lines())
    }

    fn status_lines(&self) -> Vec<String> {
        let camera = match self.camera {
            Some(info) => format!("Camera: {}×{} @ {:.1} FPS", info.width, info.height, info.fps),
            None => "Camera: unavailable".to_string(),
        };
        let indicator = if self.recorder.is_recording() { "  ● RECORDING" } else { "" };
        let extract = format!(
            "Auto-Extract: {} images per video ({})",
            self.config.extraction.image_count, self.config.extraction.method
        );

        let detail = if self.progress.is_empty() {
            self.stats.clone()
        } else if self.stats.is_empty() {
            self.progress.clone()
        } else {
            format!("{} | {}", self.stats, self.progress)
        };

        vec![
            format!("{}{} | {} | [r] record  [q] quit", camera, indicator, extract),
            format!("Status: {}", self.status),
            detail,
        ]
    }

    /// Extraction has no cancellation; wait for whatever is still running.
    fn finish_extractions(&mut self) {
        if !self.extractions.is_empty() {
            println!("Waiting for {} image extraction(s) to finish...", self.extractions.len());
        }
        for handle in self.extractions.drain(..) {
            match handle.join() {
                Ok(ExtractionOutcome::Complete(report)) => println!(
                    "✓ Extracted {}/{} images to {}",
                    report.extracted,
                    report.attempted,
                    report.output_dir.display()
                ),
                Ok(ExtractionOutcome::FailedToOpen(reason)) | Ok(ExtractionOutcome::Aborted(reason)) => {
                    eprintln!("✗ Image extraction failed: {}", reason)
                }
                Err(_) => eprintln!("✗ Image extraction thread panicked"),
            }
        }
    }
}
