use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::decoder::FrameData;

pub const PREVIEW_QUEUE_CAPACITY: usize = 3;

// A drop is logged once per this many drops so a slow preview can't flood the log.
const DROP_LOG_EVERY: u64 = 100;

/// Bounded hand-off between the capture thread and the preview.
///
/// The producer never blocks: if the queue is full the new frame is
/// discarded. The consumer never blocks either and only ever wants the
/// freshest frame.
#[derive(Clone)]
pub struct FrameQueue {
    tx: Sender<FrameData>,
    rx: Receiver<FrameData>,
    dropped: Arc<AtomicU64>,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        Self { tx, rx, dropped: Arc::new(AtomicU64::new(0)) }
    }

    /// Returns `false` when the frame was dropped.
    pub fn publish(&self, frame: FrameData) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped % DROP_LOG_EVERY == 1 {
                    log::debug!("Preview queue full, {} frames dropped so far", dropped);
                }
                false
            }
        }
    }

    /// Drain everything queued and keep only the newest frame.
    pub fn take_latest(&self) -> Option<FrameData> {
        self.rx.try_iter().last()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(0)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self::new(PREVIEW_QUEUE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(tag: u8) -> FrameData {
        FrameData::new(vec![tag; 3], 1, 1)
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let queue = FrameQueue::default();
        for i in 0..10u8 {
            queue.publish(frame(i));
            assert!(queue.len() <= PREVIEW_QUEUE_CAPACITY);
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.capacity(), 3);
        assert_eq!(queue.dropped(), 7);
    }

    #[test]
    fn test_publish_returns_immediately_when_full() {
        let queue = FrameQueue::new(1);
        assert!(queue.publish(frame(1)));
        let start = std::time::Instant::now();
        assert!(!queue.publish(frame(2)));
        assert!(start.elapsed() < std::time::Duration::from_millis(50));
    }

    #[test]
    fn test_take_latest_returns_newest_and_empties() {
        let queue = FrameQueue::default();
        queue.publish(frame(1));
        queue.publish(frame(2));
        queue.publish(frame(3));

        let latest = queue.take_latest().unwrap();
        assert_eq!(latest.as_bytes()[0], 3);
        assert!(queue.is_empty());
        assert!(queue.take_latest().is_none());
    }

    #[test]
    fn test_room_frees_after_take() {
        let queue = FrameQueue::new(2);
        queue.publish(frame(1));
        queue.publish(frame(2));
        assert!(!queue.publish(frame(3)));
        queue.take_latest();
        assert!(queue.publish(frame(4)));
    }
}
