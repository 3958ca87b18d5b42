//! Intensity-centroid translation seed for the coarsest pyramid level.

use ndarray::{Array2, Axis};
use rayon::prelude::*;

use crate::consts::PARALLEL_PIXEL_THRESHOLD;

use super::transform::{Point, Transform};

/// Translation that moves the target centroid onto the source centroid.
///
/// Under the target-to-source mapping convention this is
/// `centroid(source) - centroid(target)`. `None` when either image is flat.
pub fn centroid_seed(source: &Array2<f32>, target: &Array2<f32>) -> Option<Transform> {
    let src = intensity_centroid(source)?;
    let tgt = intensity_centroid(target)?;
    Some(Transform::translation(src.x - tgt.x, src.y - tgt.y))
}

/// Centroid weighted by intensity above the image minimum.
///
/// Subtracting the minimum keeps a uniform background from pulling the
/// centroid towards the geometric centre.
pub fn intensity_centroid(data: &Array2<f32>) -> Option<Point> {
    let (h, w) = data.dim();
    let floor = data.iter().copied().fold(f32::INFINITY, f32::min);
    if !floor.is_finite() {
        return None;
    }

    let row_sum = |(row, lane): (usize, ndarray::ArrayView1<f32>)| -> (f64, f64, f64) {
        let mut sum_x = 0.0;
        let mut sum_w = 0.0;
        for (col, &v) in lane.iter().enumerate() {
            let weight = (v - floor) as f64;
            sum_x += col as f64 * weight;
            sum_w += weight;
        }
        (sum_x, row as f64 * sum_w, sum_w)
    };
    let add = |a: (f64, f64, f64), b: (f64, f64, f64)| (a.0 + b.0, a.1 + b.1, a.2 + b.2);

    let (sum_x, sum_y, sum_w) = if h * w >= PARALLEL_PIXEL_THRESHOLD {
        data.axis_iter(Axis(0))
            .into_par_iter()
            .enumerate()
            .map(row_sum)
            .reduce(|| (0.0, 0.0, 0.0), add)
    } else {
        data.axis_iter(Axis(0))
            .enumerate()
            .map(row_sum)
            .fold((0.0, 0.0, 0.0), add)
    };

    if sum_w <= f64::EPSILON {
        return None;
    }
    Some(Point::new(sum_x / sum_w, sum_y / sum_w))
}
