#![allow(dead_code)]

use ndarray::Array2;

/// Smooth, asymmetric test slice: Gaussian blobs on a flat background.
///
/// Structure stays away from the borders so resampling with edge extension
/// only ever sees background there.
pub fn textured_image(h: usize, w: usize) -> Array2<f32> {
    // (row fraction, col fraction, sigma fraction, amplitude)
    const BLOBS: [(f64, f64, f64, f64); 5] = [
        (0.38, 0.40, 0.080, 0.60),
        (0.62, 0.66, 0.060, 0.45),
        (0.45, 0.68, 0.050, 0.35),
        (0.66, 0.34, 0.070, 0.50),
        (0.50, 0.52, 0.040, 0.25),
    ];
    let scale = h.min(w) as f64;
    Array2::from_shape_fn((h, w), |(r, c)| {
        let mut v = 0.1;
        for &(fy, fx, fs, amp) in &BLOBS {
            let dy = r as f64 - fy * h as f64;
            let dx = c as f64 - fx * w as f64;
            let sigma = fs * scale;
            v += amp * (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp();
        }
        v as f32
    })
}

/// Single Gaussian blob centred at `(cy, cx)`.
pub fn blob_image(h: usize, w: usize, cy: f64, cx: f64, sigma: f64) -> Array2<f32> {
    Array2::from_shape_fn((h, w), |(r, c)| {
        let dy = r as f64 - cy;
        let dx = c as f64 - cx;
        (0.8 * (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp()) as f32
    })
}

pub fn constant_image(h: usize, w: usize, value: f32) -> Array2<f32> {
    Array2::from_elem((h, w), value)
}

/// Horizontal intensity ramp `slope * col`.
pub fn ramp_image(h: usize, w: usize, slope: f32) -> Array2<f32> {
    Array2::from_shape_fn((h, w), |(_, c)| slope * c as f32)
}

pub fn max_abs_diff(a: &Array2<f32>, b: &Array2<f32>) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f32::max)
}
