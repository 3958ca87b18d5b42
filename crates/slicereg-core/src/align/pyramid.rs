//! Gaussian image pyramid.
//!
//! Level 0 is the original image; level `k + 1` is level `k` smoothed with an
//! anti-aliasing Gaussian and decimated by the integer downscale factor.
//! Decimation keeps pixel `f * i` of the finer level as pixel `i`, so a
//! coordinate `u` at level `k` is `u * f^k` at level 0.

use ndarray::{s, Array2};

use crate::error::{RegistrationError, Result};
use crate::filters::gaussian_blur::{antialias_sigma, gaussian_blur};

#[derive(Clone, Debug)]
pub struct Pyramid {
    levels: Vec<Array2<f32>>,
}

impl Pyramid {
    /// Build a pyramid with `depth` downsampled levels on top of the original.
    pub fn build(data: &Array2<f32>, depth: usize, downscale: usize) -> Result<Self> {
        if depth < 1 {
            return Err(RegistrationError::InvalidPyramidDepth { depth });
        }
        if downscale < 2 {
            return Err(RegistrationError::InvalidDownscale(downscale));
        }

        let sigma = antialias_sigma(downscale as f64);
        let mut levels = Vec::with_capacity(depth + 1);
        levels.push(data.clone());
        for k in 0..depth {
            let blurred = gaussian_blur(&levels[k], sigma);
            levels.push(decimate(&blurred, downscale));
        }

        Ok(Self { levels })
    }

    pub fn level(&self, level: usize) -> &Array2<f32> {
        &self.levels[level]
    }

    /// Number of stored levels (`depth + 1`).
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn iter(&self) -> impl Iterator<Item = &Array2<f32>> {
        self.levels.iter()
    }
}

/// Smallest depth at which both dimensions of the coarsest level are at most `min_size`.
///
/// Level sizes follow the same ceiling division as [`Pyramid::build`].
pub fn natural_depth(height: usize, width: usize, min_size: usize, downscale: usize) -> usize {
    let downscale = downscale.max(2);
    let (mut h, mut w) = (height, width);
    let mut depth = 0;
    while h > min_size || w > min_size {
        h = h.div_ceil(downscale);
        w = w.div_ceil(downscale);
        depth += 1;
    }
    depth
}

fn decimate(data: &Array2<f32>, factor: usize) -> Array2<f32> {
    data.slice(s![..;factor, ..;factor]).to_owned()
}
