use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::session::{RecordingSession, SessionSummary};
use crate::decoder::{FrameData, FrameSink};
use crate::error::{CaptureError, CaptureResult};

struct ActiveRecording {
    session: RecordingSession,
    writer: Box<dyn FrameSink>,
}

/// Recording state shared by the capture thread and the UI.
///
/// Only `start`, `stop` and `append` take the lock. The atomics mirror the
/// counters so the UI can read them without contending with the capture loop.
pub struct Recorder {
    active: Mutex<Option<ActiveRecording>>,
    recording: AtomicBool,
    frames: AtomicU64,
    measured_fps_bits: AtomicU64,
    stats_interval: u64,
}

/// Returned by `append` when the frame was written.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppendOutcome {
    pub frames: u64,
    /// Present every `stats_interval` frames.
    pub measured_fps: Option<f64>,
}

impl Recorder {
    pub fn new(stats_interval: u64) -> Self {
        Self {
            active: Mutex::new(None),
            recording: AtomicBool::new(false),
            frames: AtomicU64::new(0),
            measured_fps_bits: AtomicU64::new(0f64.to_bits()),
            stats_interval: stats_interval.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<ActiveRecording>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Open a writer for a new session. Rejected while a session is active,
    /// so there is never more than one writer.
    pub fn start<F>(&self, output_dir: &Path, stamp: String, container: &str, target_fps: f64, open_writer: F) -> CaptureResult<()>
    where
        F: FnOnce(&Path) -> CaptureResult<Box<dyn FrameSink>>,
    {
        let mut active = self.lock();
        if active.is_some() {
            return Err(CaptureError::AlreadyRecording);
        }

        fs::create_dir_all(output_dir)?;
        let session = RecordingSession::new(output_dir, stamp, container, target_fps);
        let writer = open_writer(session.video_path())?;

        log::info!(
            "Recording started: {} (target {} FPS)",
            session.video_path().display(),
            session.target_fps()
        );
        self.frames.store(0, Ordering::Relaxed);
        self.measured_fps_bits.store(0f64.to_bits(), Ordering::Relaxed);
        self.recording.store(true, Ordering::Release);
        *active = Some(ActiveRecording { session, writer });
        Ok(())
    }

    /// Write a frame into the active session. `None` when idle or when the
    /// writer rejected the frame.
    pub fn append(&self, frame: &FrameData) -> Option<AppendOutcome> {
        if !self.recording.load(Ordering::Acquire) {
            return None;
        }

        let mut active = self.lock();
        let recording = active.as_mut()?;

        if let Err(e) = recording.writer.write_frame(frame) {
            log::warn!("Dropping frame, writer rejected it: {}", e);
            return None;
        }

        let frames = recording.session.record_frame();
        self.frames.store(frames, Ordering::Relaxed);

        let measured_fps = if frames % self.stats_interval == 0 {
            let fps = recording.session.measured_fps();
            self.measured_fps_bits.store(fps.to_bits(), Ordering::Relaxed);
            Some(fps)
        } else {
            None
        };

        Some(AppendOutcome { frames, measured_fps })
    }

    /// Close the writer and hand back what was recorded.
    pub fn stop(&self) -> CaptureResult<SessionSummary> {
        let mut active = self.lock();
        let mut recording = active.take().ok_or(CaptureError::NotRecording)?;
        self.recording.store(false, Ordering::Release);

        let close_result = recording.writer.finish();
        let summary = recording.session.finish();
        close_result?;

        log::info!(
            "Recording stopped: {} | {:.1}s | {} frames | avg {:.2} FPS",
            summary.video_path.display(),
            summary.elapsed.as_secs_f64(),
            summary.frames,
            summary.average_fps
        );
        Ok(summary)
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }

    pub fn frames_recorded(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn measured_fps(&self) -> f64 {
        f64::from_bits(self.measured_fps_bits.load(Ordering::Relaxed))
    }
}
