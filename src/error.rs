use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the capture, record and extraction pipeline.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("cannot open camera at index {index}")]
    DeviceOpen { index: i32 },

    #[error("could not create video file {}", path.display())]
    WriterOpen { path: PathBuf },

    #[error("could not open video file {}", path.display())]
    SourceOpen { path: PathBuf },

    #[error("a recording is already in progress")]
    AlreadyRecording,

    #[error("no recording in progress")]
    NotRecording,

    #[error("unsupported frame layout: {0}")]
    FrameLayout(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("opencv: {0}")]
    OpenCv(#[from] opencv::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type CaptureResult<T> = std::result::Result<T, CaptureError>;

/// Reasons an uploaded file is turned away by the viewer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum UploadError {
    #[error("file type {0} not allowed")]
    DisallowedExtension(String),

    #[error("file too large ({:.1}MB > {:.0}MB)", megabytes(.size), megabytes(.max))]
    TooLarge { size: u64, max: u64 },

    #[error("file could not be read: {0}")]
    Unreadable(String),
}

fn megabytes(bytes: &u64) -> f64 {
    *bytes as f64 / 1024.0 / 1024.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_too_large_message_in_megabytes() {
        let err = UploadError::TooLarge { size: 60 * 1024 * 1024, max: 50 * 1024 * 1024 };
        assert_eq!(err.to_string(), "file too large (60.0MB > 50MB)");
    }

    #[test]
    fn test_extension_message_names_extension() {
        let err = UploadError::DisallowedExtension(".exe".to_string());
        assert_eq!(err.to_string(), "file type .exe not allowed");
    }
}
