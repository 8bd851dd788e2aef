use opencv::{core, prelude::*};
use std::sync::Arc;

use crate::error::{CaptureError, CaptureResult};

/// One decoded BGR frame, 3 bytes per pixel, rows packed without padding.
///
/// Cloning shares the pixel buffer, so the same frame can go to the
/// recorder and the preview queue without a copy.
#[derive(Clone, Debug)]
pub struct FrameData {
    pub data: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
}

impl FrameData {
    pub fn new(buffer: Vec<u8>, width: u32, height: u32) -> Self {
        Self { data: Arc::new(buffer), width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Copy an 8-bit 3-channel `Mat` into an owned frame.
    pub fn from_mat(mat: &Mat) -> CaptureResult<Self> {
        if mat.empty() {
            return Err(CaptureError::FrameLayout("empty frame".to_string()));
        }
        if mat.typ() != core::CV_8UC3 {
            return Err(CaptureError::FrameLayout(format!("expected CV_8UC3, got type {}", mat.typ())));
        }

        let width = mat.cols() as u32;
        let height = mat.rows() as u32;
        let buffer = if mat.is_continuous() {
            mat.data_bytes()?.to_vec()
        } else {
            let packed = mat.try_clone()?;
            packed.data_bytes()?.to_vec()
        };

        Ok(Self::new(buffer, width, height))
    }

    /// Build a `Mat` view of this frame for OpenCV writers and codecs.
    pub fn to_mat(&self) -> CaptureResult<Mat> {
        let expected = self.width as usize * self.height as usize * 3;
        if self.data.len() != expected {
            return Err(CaptureError::FrameLayout(format!(
                "buffer holds {} bytes, {}x{} needs {}",
                self.data.len(),
                self.width,
                self.height,
                expected
            )));
        }

        let mut mat = Mat::new_rows_cols_with_default(
            self.height as i32,
            self.width as i32,
            core::CV_8UC3,
            core::Scalar::all(0.0),
        )?;
        mat.data_bytes_mut()?.copy_from_slice(&self.data);
        Ok(mat)
    }
}
