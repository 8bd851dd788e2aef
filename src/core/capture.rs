use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thread_priority::{set_current_thread_priority, ThreadPriority};

use super::frame_queue::FrameQueue;
use super::recorder::Recorder;
use crate::decoder::{FrameData, FrameSource};
use crate::error::CaptureResult;

/// Back-off while there is no usable device.
const IDLE_SLEEP: Duration = Duration::from_millis(100);

/// Stand-in source used when the camera failed to open. The loop stays
/// alive but idle.
pub struct NoDevice;

impl FrameSource for NoDevice {
    fn is_opened(&self) -> bool {
        false
    }

    fn read_frame(&mut self) -> CaptureResult<Option<FrameData>> {
        Ok(None)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CaptureStats {
    pub frames_read: u64,
    pub read_failures: u64,
    pub frames_dropped: u64,
}

/// Read one frame per iteration until `running` clears. Frames go to the
/// recorder (if a session is active) and to the preview queue (drop on
/// full). Each iteration sleeps whatever is left of `target_interval`.
pub fn run_capture_loop<S: FrameSource>(
    source: &mut S,
    queue: &FrameQueue,
    recorder: &Recorder,
    running: &AtomicBool,
    target_interval: Duration,
) -> CaptureStats {
    let mut stats = CaptureStats::default();

    while running.load(Ordering::Acquire) {
        if !source.is_opened() {
            thread::sleep(IDLE_SLEEP);
            continue;
        }

        let frame_start = Instant::now();

        match source.read_frame() {
            Ok(Some(frame)) => {
                stats.frames_read += 1;

                if let Some(outcome) = recorder.append(&frame) {
                    if let Some(fps) = outcome.measured_fps {
                        log::info!("Recording: {} frames | actual FPS: {:.2}", outcome.frames, fps);
                    }
                }

                if !queue.publish(frame) {
                    stats.frames_dropped += 1;
                }
            }
            Ok(None) => {
                stats.read_failures += 1;
                log::debug!("Camera returned no frame");
            }
            Err(e) => {
                stats.read_failures += 1;
                log::warn!("Frame read failed: {}", e);
            }
        }

        if let Some(remaining) = target_interval.checked_sub(frame_start.elapsed()) {
            thread::sleep(remaining);
        }
    }

    log::info!(
        "Capture loop exiting: {} frames read, {} read failures, {} preview drops",
        stats.frames_read,
        stats.read_failures,
        stats.frames_dropped
    );
    stats
}

/// Owns the capture thread and the flag that stops it.
pub struct CaptureHandle {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<CaptureStats>>,
    done_rx: Receiver<()>,
}

impl CaptureHandle {
    /// Move `source` onto a dedicated thread. The source is dropped (and the
    /// device released) when the loop exits.
    pub fn spawn<S>(mut source: S, queue: FrameQueue, recorder: Arc<Recorder>, target_interval: Duration) -> std::io::Result<Self>
    where
        S: FrameSource + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);
        let flag = Arc::clone(&running);

        let handle = thread::Builder::new().name("capture".to_string()).spawn(move || {
            if let Err(e) = set_current_thread_priority(ThreadPriority::Max) {
                log::debug!("Could not raise capture thread priority: {:?}", e);
            }
            let stats = run_capture_loop(&mut source, &queue, &recorder, &flag, target_interval);
            drop(source);
            let _ = done_tx.send(());
            stats
        })?;

        Ok(Self { running, handle: Some(handle), done_rx })
    }

    /// Signal the loop and wait at most `timeout` for it. Returns `None` if
    /// the thread didn't finish in time; it is then left detached.
    pub fn shutdown(mut self, timeout: Duration) -> Option<CaptureStats> {
        self.running.store(false, Ordering::Release);
        let handle = self.handle.take()?;

        match self.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => handle.join().ok(),
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("Capture thread did not stop within {:?}", timeout);
                None
            }
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}
