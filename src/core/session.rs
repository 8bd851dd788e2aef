use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Folder/file stamp for a recording, e.g. `20240131_235959`.
pub fn session_stamp(at: DateTime<Local>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

/// One continuous recording, bound to one output file.
#[derive(Debug)]
pub struct RecordingSession {
    stamp: String,
    video_path: PathBuf,
    started: Instant,
    frames: u64,
    target_fps: f64,
}

impl RecordingSession {
    pub fn new(output_dir: &Path, stamp: String, container: &str, target_fps: f64) -> Self {
        let video_path = output_dir.join(format!("video_{}.{}", stamp, container));
        Self { stamp, video_path, started: Instant::now(), frames: 0, target_fps }
    }

    pub fn video_path(&self) -> &Path {
        &self.video_path
    }

    pub fn target_fps(&self) -> f64 {
        self.target_fps
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn record_frame(&mut self) -> u64 {
        self.frames += 1;
        self.frames
    }

    pub fn measured_fps(&self) -> f64 {
        average_fps(self.frames, self.elapsed())
    }

    pub fn finish(self) -> SessionSummary {
        let elapsed = self.elapsed();
        SessionSummary {
            average_fps: average_fps(self.frames, elapsed),
            stamp: self.stamp,
            video_path: self.video_path,
            frames: self.frames,
            elapsed,
        }
    }
}

/// What's left of a session once its writer is closed.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub stamp: String,
    pub video_path: PathBuf,
    pub frames: u64,
    pub elapsed: Duration,
    pub average_fps: f64,
}

fn average_fps(frames: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        frames as f64 / secs
    } else {
        0.0
    }
}
