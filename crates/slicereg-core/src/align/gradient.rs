use ndarray::Array2;

use crate::consts::{SCHARR_NORM, SCHARR_SMOOTH};

/// Horizontal and vertical intensity derivatives of an image, in intensity per pixel.
#[derive(Clone, Debug)]
pub struct GradientField {
    /// d/dx (along columns).
    pub gx: Array2<f32>,
    /// d/dy (along rows).
    pub gy: Array2<f32>,
}

impl GradientField {
    pub fn dim(&self) -> (usize, usize) {
        self.gx.dim()
    }
}

/// Scharr gradient with symmetric boundary extension, same size as the input.
///
/// For a 3x3 stencil symmetric extension (`x[-1] = x[0]`) is the same as
/// clamping indices to the border.
pub fn scharr_gradient(data: &Array2<f32>) -> GradientField {
    let (h, w) = data.dim();
    let mut gx = Array2::<f32>::zeros((h, w));
    let mut gy = Array2::<f32>::zeros((h, w));
    if h == 0 || w == 0 {
        return GradientField { gx, gy };
    }

    let at = |r: isize, c: isize| -> f64 {
        let r = r.clamp(0, h as isize - 1) as usize;
        let c = c.clamp(0, w as isize - 1) as usize;
        data[[r, c]] as f64
    };

    for row in 0..h as isize {
        for col in 0..w as isize {
            let mut dx = 0.0;
            let mut dy = 0.0;
            for (k, &weight) in SCHARR_SMOOTH.iter().enumerate() {
                let off = k as isize - 1;
                dx += weight * (at(row + off, col + 1) - at(row + off, col - 1));
                dy += weight * (at(row + 1, col + off) - at(row - 1, col + off));
            }
            gx[[row as usize, col as usize]] = (dx / SCHARR_NORM) as f32;
            gy[[row as usize, col as usize]] = (dy / SCHARR_NORM) as f32;
        }
    }

    GradientField { gx, gy }
}
