//! Uniform cropping of missing-value borders across a stack.

use ndarray::{s, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{RegistrationError, Result};
use crate::frame::{Frame, Stack};

/// A rectangle in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl CropRect {
    /// The rectangle covering a whole (height, width) frame.
    pub fn full(dim: (usize, usize)) -> Self {
        Self {
            x: 0,
            y: 0,
            width: dim.1,
            height: dim.0,
        }
    }

    /// Check the rectangle is non-empty and fits inside a (height, width) frame.
    pub fn validated(&self, dim: (usize, usize)) -> Result<CropRect> {
        let (src_h, src_w) = dim;
        if self.width == 0 || self.height == 0 {
            return Err(RegistrationError::InvalidInput(
                "crop width and height must be > 0".into(),
            ));
        }
        if self.x + self.width > src_w || self.y + self.height > src_h {
            return Err(RegistrationError::InvalidInput(format!(
                "crop region ({},{} {}x{}) exceeds frame dimensions ({src_w}x{src_h})",
                self.x, self.y, self.width, self.height
            )));
        }
        Ok(*self)
    }

    /// Overlap of two rectangles, `None` if they do not intersect.
    pub fn intersect(&self, other: &CropRect) -> Option<CropRect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x + self.width).min(other.x + other.width);
        let y1 = (self.y + self.height).min(other.y + other.height);
        (x1 > x0 && y1 > y0).then(|| CropRect {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }

    pub fn dim(&self) -> (usize, usize) {
        (self.height, self.width)
    }
}

/// Bounding box of the non-missing samples of one frame.
///
/// An entirely missing frame has no bounding box and is rejected.
pub fn valid_bounds(frame: &Frame) -> Result<CropRect> {
    let row_has_data: Vec<bool> = frame
        .data
        .axis_iter(Axis(0))
        .map(|row| row.iter().any(|v| !v.is_nan()))
        .collect();
    let col_has_data: Vec<bool> = frame
        .data
        .axis_iter(Axis(1))
        .map(|col| col.iter().any(|v| !v.is_nan()))
        .collect();

    let first_row = row_has_data.iter().position(|&b| b);
    let last_row = row_has_data.iter().rposition(|&b| b);
    let first_col = col_has_data.iter().position(|&b| b);
    let last_col = col_has_data.iter().rposition(|&b| b);

    match (first_row, last_row, first_col, last_col) {
        (Some(r0), Some(r1), Some(c0), Some(c1)) => Ok(CropRect {
            x: c0,
            y: r0,
            width: c1 - c0 + 1,
            height: r1 - r0 + 1,
        }),
        _ => Err(RegistrationError::InvalidInput(format!(
            "frame {} contains no valid samples",
            frame.index
        ))),
    }
}

/// The box valid for every frame simultaneously, or `None` when no frame
/// has missing values.
pub fn common_bounds(stack: &Stack) -> Result<Option<CropRect>> {
    if !stack.has_missing() {
        return Ok(None);
    }

    let mut common = CropRect::full(stack.dim());
    for frame in stack.iter() {
        let bounds = valid_bounds(frame)?;
        debug!(frame = frame.index, ?bounds, "Valid-data bounds");
        common = common.intersect(&bounds).ok_or_else(|| {
            RegistrationError::InvalidInput(format!(
                "valid regions do not overlap once frame {} is included",
                frame.index
            ))
        })?;
    }
    Ok(Some(common))
}

/// Crop every frame of a stack to the same rectangle.
pub fn crop_stack(stack: &Stack, rect: &CropRect) -> Result<Stack> {
    let rect = rect.validated(stack.dim())?;
    let frames = stack
        .iter()
        .map(|f| {
            let view = f.data.slice(s![
                rect.y..rect.y + rect.height,
                rect.x..rect.x + rect.width
            ]);
            Frame::new(view.to_owned(), f.index)
        })
        .collect();
    Stack::new(frames)
}

/// Remove missing-value borders from a stack, cropping every frame to the
/// largest box that is valid in all of them. A stack without missing values
/// is returned unchanged.
pub fn crop_nans(stack: &Stack) -> Result<Stack> {
    Ok(crop_nans_with_rect(stack)?.0)
}

/// [`crop_nans`], also returning the rectangle that was applied.
pub fn crop_nans_with_rect(stack: &Stack) -> Result<(Stack, Option<CropRect>)> {
    match common_bounds(stack)? {
        None => Ok((stack.clone(), None)),
        Some(rect) => {
            let (h, w) = stack.dim();
            let cropped = crop_stack(stack, &rect)?;
            info!(
                from_height = h,
                from_width = w,
                height = rect.height,
                width = rect.width,
                "Cropped missing-value borders"
            );
            Ok((cropped, Some(rect)))
        }
    }
}
