use ndarray::{s, Array2};

use crate::align::interpolate::sample_cubic;
use crate::error::{RegistrationError, Result};

use super::gaussian_blur::gaussian_blur;

/// Resize an image by `factor` with cubic resampling.
///
/// Downsizing is preceded by an anti-aliasing blur of sigma `(1/factor - 1) / 2`.
pub fn resize(data: &Array2<f32>, factor: f64) -> Array2<f32> {
    let (h, w) = data.dim();
    let new_h = ((h as f64 * factor).round() as usize).max(1);
    let new_w = ((w as f64 * factor).round() as usize).max(1);
    resize_to(data, (new_h, new_w))
}

/// Resample to exactly `(height, width)`, blurring first along a shrinking axis.
pub fn resize_to(data: &Array2<f32>, dim: (usize, usize)) -> Array2<f32> {
    let (h, w) = data.dim();
    let (new_h, new_w) = (dim.0.max(1), dim.1.max(1));
    let scale_y = h as f64 / new_h as f64;
    let scale_x = w as f64 / new_w as f64;

    let shrink = scale_y.max(scale_x);
    let source = if shrink > 1.0 {
        gaussian_blur(data, ((shrink - 1.0) / 2.0) as f32)
    } else {
        data.clone()
    };

    Array2::from_shape_fn((new_h, new_w), |(row, col)| {
        let y = (row as f64 + 0.5) * scale_y - 0.5;
        let x = (col as f64 + 0.5) * scale_x - 0.5;
        sample_cubic(&source, y, x) as f32
    })
}

/// Crop a window given in normalized `[0, 1]` coordinates.
///
/// `x_range` and `y_range` are `(start, end)` fractions of width and height.
pub fn crop_normalized(
    data: &Array2<f32>,
    x_range: (f64, f64),
    y_range: (f64, f64),
) -> Result<Array2<f32>> {
    let (h, w) = data.dim();
    let to_pixels = |(start, end): (f64, f64), len: usize| -> Result<(usize, usize)> {
        if !(0.0..=1.0).contains(&start) || !(0.0..=1.0).contains(&end) || end <= start {
            return Err(RegistrationError::InvalidCrop(format!(
                "range ({start}, {end}) is not a non-empty sub-interval of [0, 1]"
            )));
        }
        let first = (start * len as f64).floor() as usize;
        let last = ((end * len as f64).floor() as usize).min(len);
        if last <= first {
            return Err(RegistrationError::InvalidCrop(format!(
                "range ({start}, {end}) selects no pixels of {len}"
            )));
        }
        Ok((first, last))
    };

    let (c0, c1) = to_pixels(x_range, w)?;
    let (r0, r1) = to_pixels(y_range, h)?;
    Ok(data.slice(s![r0..r1, c0..c1]).to_owned())
}
