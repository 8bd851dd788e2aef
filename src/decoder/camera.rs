use opencv::{prelude::*, videoio};

use super::frame_data::FrameData;
use crate::config::{fourcc_chars, CameraConfig};
use crate::error::{CaptureError, CaptureResult};

/// Anything the capture loop can pull frames from.
pub trait FrameSource: Send {
    fn is_opened(&self) -> bool;

    /// `Ok(None)` means the device answered but had no frame this time.
    fn read_frame(&mut self) -> CaptureResult<Option<FrameData>>;
}

/// Resolution and rate the device actually agreed to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

pub struct Camera {
    capture: videoio::VideoCapture,
    info: CameraInfo,
}

impl Camera {
    pub fn open(config: &CameraConfig) -> CaptureResult<Self> {
        let mut capture = videoio::VideoCapture::new(config.device_index, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(CaptureError::DeviceOpen { index: config.device_index });
        }

        // Property requests are hints; drivers silently keep what they can't do.
        let [a, b, c, d] = fourcc_chars(&config.fourcc)?;
        let fourcc = videoio::VideoWriter::fourcc(a, b, c, d)?;
        capture.set(videoio::CAP_PROP_FOURCC, fourcc as f64)?;
        capture.set(videoio::CAP_PROP_FRAME_WIDTH, config.width as f64)?;
        capture.set(videoio::CAP_PROP_FRAME_HEIGHT, config.height as f64)?;
        capture.set(videoio::CAP_PROP_FPS, config.fps)?;
        capture.set(videoio::CAP_PROP_BUFFERSIZE, config.buffer_size as f64)?;

        let info = CameraInfo {
            width: capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32,
            height: capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32,
            fps: capture.get(videoio::CAP_PROP_FPS)?,
        };

        log::info!(
            "Camera {} opened: {}x{} @ {:.1} FPS (requested {}x{} @ {:.1})",
            config.device_index,
            info.width,
            info.height,
            info.fps,
            config.width,
            config.height,
            config.fps
        );

        Ok(Self { capture, info })
    }

    pub fn info(&self) -> CameraInfo {
        self.info
    }
}

impl FrameSource for Camera {
    fn is_opened(&self) -> bool {
        self.capture.is_opened().unwrap_or(false)
    }

    fn read_frame(&mut self) -> CaptureResult<Option<FrameData>> {
        let mut frame = Mat::default();
        if !self.capture.read(&mut frame)? || frame.empty() {
            return Ok(None);
        }
        FrameData::from_mat(&frame).map(Some)
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        if let Err(e) = self.capture.release() {
            log::warn!("Camera release failed: {}", e);
        } else {
            log::info!("Camera released");
        }
    }
}
