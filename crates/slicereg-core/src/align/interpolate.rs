//! Order-3 (Keys cubic convolution) sampling with nearest-edge extension.

use ndarray::Array2;

use crate::consts::CUBIC_A;

/// Precomputed 4x4 stencil for one off-grid position.
///
/// Building the stencil once lets the solver sample the source image and
/// both gradient components at the same position without recomputing weights.
#[derive(Clone, Copy, Debug)]
pub struct CubicStencil {
    rows: [usize; 4],
    cols: [usize; 4],
    wy: [f64; 4],
    wx: [f64; 4],
}

impl CubicStencil {
    /// Stencil for position `(y, x)` on a grid of shape `(h, w)`.
    pub fn new(y: f64, x: f64, h: usize, w: usize) -> Self {
        let (rows, wy) = axis_taps(y, h);
        let (cols, wx) = axis_taps(x, w);
        Self { rows, cols, wy, wx }
    }

    pub fn sample(&self, data: &Array2<f32>) -> f64 {
        let mut sum = 0.0;
        for (i, &r) in self.rows.iter().enumerate() {
            let mut row_sum = 0.0;
            for (j, &c) in self.cols.iter().enumerate() {
                row_sum += self.wx[j] * data[[r, c]] as f64;
            }
            sum += self.wy[i] * row_sum;
        }
        sum
    }
}

/// Sample `data` at `(y, x)`; coordinates outside the grid take the nearest edge value.
pub fn sample_cubic(data: &Array2<f32>, y: f64, x: f64) -> f64 {
    let (h, w) = data.dim();
    CubicStencil::new(y, x, h, w).sample(data)
}

fn axis_taps(pos: f64, len: usize) -> ([usize; 4], [f64; 4]) {
    let last = len as isize - 1;
    let pos = pos.clamp(-1.0, len as f64);
    let base = pos.floor();
    let t = pos - base;
    let base = base as isize;

    let idx = |offset: isize| (base + offset).clamp(0, last) as usize;
    (
        [idx(-1), idx(0), idx(1), idx(2)],
        [
            keys_kernel(1.0 + t),
            keys_kernel(t),
            keys_kernel(1.0 - t),
            keys_kernel(2.0 - t),
        ],
    )
}

fn keys_kernel(d: f64) -> f64 {
    let d = d.abs();
    if d <= 1.0 {
        ((CUBIC_A + 2.0) * d - (CUBIC_A + 3.0)) * d * d + 1.0
    } else if d < 2.0 {
        ((CUBIC_A * d - 5.0 * CUBIC_A) * d + 8.0 * CUBIC_A) * d - 4.0 * CUBIC_A
    } else {
        0.0
    }
}
