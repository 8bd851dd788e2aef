use opencv::{core, imgcodecs, prelude::*, videoio};
use std::path::Path;

use super::frame_data::FrameData;
use crate::config::fourcc_chars;
use crate::error::{CaptureError, CaptureResult};

/// A finished video that can be read at arbitrary frame positions.
pub trait SeekableSource {
    fn frame_count(&self) -> u64;
    fn fps(&self) -> f64;
    fn seek(&mut self, index: u64) -> CaptureResult<()>;
    fn read_frame(&mut self) -> CaptureResult<Option<FrameData>>;
}

/// Destination for recorded frames.
pub trait FrameSink: Send {
    fn write_frame(&mut self, frame: &FrameData) -> CaptureResult<()>;
    /// Flush and close. Further writes are errors.
    fn finish(&mut self) -> CaptureResult<()>;
}

/// Destination for extracted stills.
pub trait ImageSink {
    fn write_image(&mut self, path: &Path, frame: &FrameData, quality: i32) -> CaptureResult<()>;
}

pub struct VideoFile {
    capture: videoio::VideoCapture,
    frame_count: u64,
    fps: f64,
}

impl VideoFile {
    pub fn open(path: &Path) -> CaptureResult<Self> {
        let source_err = || CaptureError::SourceOpen { path: path.to_path_buf() };
        let path_str = path.to_str().ok_or_else(source_err)?;

        let capture = videoio::VideoCapture::from_file(path_str, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(source_err());
        }

        let frame_count = capture.get(videoio::CAP_PROP_FRAME_COUNT)?.max(0.0) as u64;
        let fps = capture.get(videoio::CAP_PROP_FPS)?;
        log::info!("Opened {}: {} frames @ {:.2} FPS", path.display(), frame_count, fps);

        Ok(Self { capture, frame_count, fps })
    }
}

impl SeekableSource for VideoFile {
    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn seek(&mut self, index: u64) -> CaptureResult<()> {
        self.capture.set(videoio::CAP_PROP_POS_FRAMES, index as f64)?;
        Ok(())
    }

    fn read_frame(&mut self) -> CaptureResult<Option<FrameData>> {
        let mut frame = Mat::default();
        if !self.capture.read(&mut frame)? || frame.empty() {
            return Ok(None);
        }
        FrameData::from_mat(&frame).map(Some)
    }
}

pub struct VideoFileWriter {
    writer: videoio::VideoWriter,
    width: u32,
    height: u32,
    finished: bool,
}

impl VideoFileWriter {
    pub fn create(path: &Path, codec: &str, fps: f64, width: u32, height: u32) -> CaptureResult<Self> {
        let writer_err = || CaptureError::WriterOpen { path: path.to_path_buf() };
        let path_str = path.to_str().ok_or_else(writer_err)?;

        let [a, b, c, d] = fourcc_chars(codec)?;
        let fourcc = videoio::VideoWriter::fourcc(a, b, c, d)?;
        let writer = videoio::VideoWriter::new(
            path_str,
            fourcc,
            fps,
            core::Size::new(width as i32, height as i32),
            true,
        )?;
        if !writer.is_opened()? {
            return Err(writer_err());
        }

        log::debug!("Video writer open: {} {} {}x{} @ {}", path.display(), codec, width, height, fps);
        Ok(Self { writer, width, height, finished: false })
    }
}

impl FrameSink for VideoFileWriter {
    fn write_frame(&mut self, frame: &FrameData) -> CaptureResult<()> {
        if self.finished {
            return Err(CaptureError::NotRecording);
        }
        if frame.width != self.width || frame.height != self.height {
            return Err(CaptureError::FrameLayout(format!(
                "frame {}x{} does not match writer {}x{}",
                frame.width, frame.height, self.width, self.height
            )));
        }
        let mat = frame.to_mat()?;
        self.writer.write(&mat)?;
        Ok(())
    }

    fn finish(&mut self) -> CaptureResult<()> {
        if !self.finished {
            self.finished = true;
            self.writer.release()?;
        }
        Ok(())
    }
}

impl Drop for VideoFileWriter {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            log::warn!("Video writer release failed: {}", e);
        }
    }
}

/// Writes stills through OpenCV's codec layer.
#[derive(Default)]
pub struct JpegWriter;

impl ImageSink for JpegWriter {
    fn write_image(&mut self, path: &Path, frame: &FrameData, quality: i32) -> CaptureResult<()> {
        let path_str = path
            .to_str()
            .ok_or_else(|| CaptureError::FrameLayout(format!("non UTF-8 path {}", path.display())))?;
        let mat = frame.to_mat()?;
        let params = core::Vector::<i32>::from_slice(&[imgcodecs::IMWRITE_JPEG_QUALITY, quality]);
        if !imgcodecs::imwrite(path_str, &mat, &params)? {
            return Err(CaptureError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("imwrite refused {}", path.display()),
            )));
        }
        Ok(())
    }
}
