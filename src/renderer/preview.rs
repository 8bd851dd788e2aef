use opencv::{core, imgproc, prelude::*};

use crate::decoder::FrameData;
use crate::error::{CaptureError, CaptureResult};

/// Packed RGB pixels ready for `FrameProcessor`.
pub struct RgbCanvas {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Largest (w, h) with the aspect of `src` that fits in `max`. Height is
/// kept even so it splits into whole half-block rows.
pub fn fit_within(src: (u32, u32), max: (u32, u32)) -> (u32, u32) {
    let (sw, sh) = src;
    let (mw, mh) = max;
    if sw == 0 || sh == 0 || mw == 0 || mh < 2 {
        return (0, 0);
    }

    let (sw, sh, mw, mh) = (sw as u64, sh as u64, mw as u64, mh as u64);
    let (w, h) = if mw * sh <= mh * sw {
        (mw, sh * mw / sw)
    } else {
        (sw * mh / sh, mh)
    };
    (w.clamp(1, mw) as u32, (h.clamp(2, mh) as u32) & !1)
}

/// Shrinks camera frames to the fixed preview size, then to whatever the
/// terminal can show.
pub struct PreviewScaler {
    preview_width: u32,
    preview_height: u32,
}

impl PreviewScaler {
    pub fn new(preview_width: u32, preview_height: u32) -> Self {
        Self { preview_width, preview_height }
    }

    pub fn prepare(&self, frame: &FrameData, canvas: (u32, u32)) -> CaptureResult<RgbCanvas> {
        let source = frame.to_mat()?;

        let mut preview = Mat::default();
        imgproc::resize(
            &source,
            &mut preview,
            core::Size::new(self.preview_width as i32, self.preview_height as i32),
            0.0,
            0.0,
            imgproc::INTER_AREA,
        )?;

        let mut rgb = Mat::default();
        imgproc::cvt_color_def(&preview, &mut rgb, imgproc::COLOR_BGR2RGB)?;

        let (w, h) = fit_within((self.preview_width, self.preview_height), canvas);
        if w == 0 || h == 0 {
            return Err(CaptureError::FrameLayout(format!("canvas {:?} too small", canvas)));
        }

        let mut fitted = Mat::default();
        imgproc::resize(&rgb, &mut fitted, core::Size::new(w as i32, h as i32), 0.0, 0.0, imgproc::INTER_AREA)?;

        let data = if fitted.is_continuous() {
            fitted.data_bytes()?.to_vec()
        } else {
            fitted.try_clone()?.data_bytes()?.to_vec()
        };

        Ok(RgbCanvas { data, width: w, height: h })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_keeps_aspect_in_wide_terminal() {
        // 16:9 preview into a 200x100 pixel canvas: height bound.
        assert_eq!(fit_within((960, 540), (200, 100)), (177, 100));
    }

    #[test]
    fn test_fit_in_narrow_terminal() {
        assert_eq!(fit_within((960, 540), (80, 100)), (80, 44));
    }

    #[test]
    fn test_fit_height_is_even() {
        let (_, h) = fit_within((100, 77), (100, 77));
        assert_eq!(h % 2, 0);
    }

    #[test]
    fn test_fit_degenerate() {
        assert_eq!(fit_within((0, 10), (80, 48)), (0, 0));
        assert_eq!(fit_within((960, 540), (80, 1)), (0, 0));
    }
}
