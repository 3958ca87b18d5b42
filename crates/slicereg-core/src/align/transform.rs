//! Rigid-body and affine transforms and the resampling operator that applies them.
//!
//! A transform maps pixel coordinates of the *target* frame to coordinates in
//! the *source* image, both measured from a fixed origin `o`:
//!
//! ```text
//! warped(u) = source(A · (u - o) + o + t)
//! ```
//!
//! Composition is 3x3 homogeneous matrix multiplication in origin-centred
//! coordinates, so `a.compose(&b)` maps through `b` first and then `a`.

use std::fmt;

use nalgebra::Matrix3;
use ndarray::{Array2, Zip};

use crate::config::{MotionModel, OutOfBounds};
use crate::consts::{DOMAIN_MARGIN, LINEAR_DISPLACEMENT_WEIGHT, PARALLEL_PIXEL_THRESHOLD};
use crate::error::{ensure_same_dim, Result};

use super::interpolate::CubicStencil;

/// A point in pixel coordinates (`x` along columns, `y` along rows).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn scaled(self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }
}

/// Geometric centre of an image of shape `(height, width)`.
pub fn image_center(dim: (usize, usize)) -> Point {
    Point::new(
        (dim.1 as f64 - 1.0) / 2.0,
        (dim.0 as f64 - 1.0) / 2.0,
    )
}

/// Rotation by `theta` radians followed by translation `(tx, ty)`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rigid {
    pub theta: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Rigid {
    pub fn new(theta: f64, tx: f64, ty: f64) -> Self {
        Self { theta, tx, ty }
    }

    /// Closed-form inverse: negate the angle and rotate the negated translation by `-theta`.
    pub fn inverse(&self) -> Self {
        let (s, c) = (-self.theta).sin_cos();
        Self {
            theta: -self.theta,
            tx: -(c * self.tx - s * self.ty),
            ty: -(s * self.tx + c * self.ty),
        }
    }
}

/// Row-major 2x3 matrix `[[a00, a01, tx], [a10, a11, ty]]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine {
    pub matrix: [[f64; 3]; 2],
}

impl Default for Affine {
    fn default() -> Self {
        Self {
            matrix: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        }
    }
}

impl Affine {
    pub fn new(matrix: [[f64; 3]; 2]) -> Self {
        Self { matrix }
    }

    fn from_homogeneous(m: &Matrix3<f64>) -> Self {
        Self::new([
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
        ])
    }
}

impl From<Rigid> for Affine {
    /// Embed a rigid transform: rotation matrix at unit scale, no shear.
    fn from(r: Rigid) -> Self {
        let (s, c) = r.theta.sin_cos();
        Self::new([[c, -s, r.tx], [s, c, r.ty]])
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Transform {
    Rigid(Rigid),
    Affine(Affine),
}

impl Default for Transform {
    fn default() -> Self {
        Self::Rigid(Rigid::default())
    }
}

impl From<Rigid> for Transform {
    fn from(r: Rigid) -> Self {
        Self::Rigid(r)
    }
}

impl From<Affine> for Transform {
    fn from(a: Affine) -> Self {
        Self::Affine(a)
    }
}

impl Transform {
    pub fn identity(model: MotionModel) -> Self {
        match model {
            MotionModel::Rigid => Self::Rigid(Rigid::default()),
            MotionModel::Affine => Self::Affine(Affine::default()),
        }
    }

    pub fn translation(tx: f64, ty: f64) -> Self {
        Self::Rigid(Rigid::new(0.0, tx, ty))
    }

    pub fn model(&self) -> MotionModel {
        match self {
            Self::Rigid(_) => MotionModel::Rigid,
            Self::Affine(_) => MotionModel::Affine,
        }
    }

    pub fn to_matrix(&self) -> Matrix3<f64> {
        let a = self.to_affine().matrix;
        Matrix3::new(
            a[0][0], a[0][1], a[0][2],
            a[1][0], a[1][1], a[1][2],
            0.0, 0.0, 1.0,
        )
    }

    pub fn to_affine(&self) -> Affine {
        match *self {
            Self::Rigid(r) => r.into(),
            Self::Affine(a) => a,
        }
    }

    /// `self ∘ other`: apply `other` first. Two rigid transforms compose to a rigid one.
    pub fn compose(&self, other: &Transform) -> Transform {
        match (self, other) {
            (Self::Rigid(a), Self::Rigid(b)) => {
                let (s, c) = a.theta.sin_cos();
                Self::Rigid(Rigid::new(
                    a.theta + b.theta,
                    c * b.tx - s * b.ty + a.tx,
                    s * b.tx + c * b.ty + a.ty,
                ))
            }
            _ => Self::Affine(Affine::from_homogeneous(
                &(self.to_matrix() * other.to_matrix()),
            )),
        }
    }

    /// `None` when an affine linear part is singular.
    pub fn inverse(&self) -> Option<Transform> {
        match self {
            Self::Rigid(r) => Some(Self::Rigid(r.inverse())),
            Self::Affine(_) => self
                .to_matrix()
                .try_inverse()
                .map(|m| Self::Affine(Affine::from_homogeneous(&m))),
        }
    }

    pub fn translation_part(&self) -> (f64, f64) {
        match self {
            Self::Rigid(r) => (r.tx, r.ty),
            Self::Affine(a) => (a.matrix[0][2], a.matrix[1][2]),
        }
    }

    /// Rescale the translation between pyramid levels; the linear part is scale free.
    pub fn with_scaled_translation(&self, factor: f64) -> Transform {
        match *self {
            Self::Rigid(r) => Self::Rigid(Rigid::new(r.theta, r.tx * factor, r.ty * factor)),
            Self::Affine(mut a) => {
                a.matrix[0][2] *= factor;
                a.matrix[1][2] *= factor;
                Self::Affine(a)
            }
        }
    }

    /// Map an origin-centred target coordinate to an origin-centred source coordinate.
    pub fn map(&self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Self::Rigid(r) => {
                let (s, c) = r.theta.sin_cos();
                (c * x - s * y + r.tx, s * x + c * y + r.ty)
            }
            Self::Affine(a) => {
                let m = &a.matrix;
                (
                    m[0][0] * x + m[0][1] * y + m[0][2],
                    m[1][0] * x + m[1][1] * y + m[1][2],
                )
            }
        }
    }

    pub fn param_count(&self) -> usize {
        match self {
            Self::Rigid(_) => 3,
            Self::Affine(_) => 6,
        }
    }

    /// Solver parameter vector: `(theta, tx, ty)` or the six matrix entries row by row.
    pub fn params(&self) -> Vec<f64> {
        match self {
            Self::Rigid(r) => vec![r.theta, r.tx, r.ty],
            Self::Affine(a) => a.matrix.iter().flatten().copied().collect(),
        }
    }

    /// Same variant, parameters shifted by `delta`.
    pub fn offset_by(&self, delta: &[f64]) -> Transform {
        match *self {
            Self::Rigid(r) => Self::Rigid(Rigid::new(
                r.theta + delta[0],
                r.tx + delta[1],
                r.ty + delta[2],
            )),
            Self::Affine(mut a) => {
                for (v, d) in a.matrix.iter_mut().flatten().zip(delta) {
                    *v += d;
                }
                Self::Affine(a)
            }
        }
    }

    /// Partial derivatives of the warped intensity with respect to each parameter,
    /// at centred target coordinate `(x, y)` where the source gradient is `(gx, gy)`.
    pub fn partials(&self, x: f64, y: f64, gx: f64, gy: f64, out: &mut [f64]) {
        match self {
            Self::Rigid(r) => {
                let (s, c) = r.theta.sin_cos();
                // d/dtheta of R(theta)·(x, y); at theta = 0 this is gy·x - gx·y.
                out[0] = gx * (-s * x - c * y) + gy * (c * x - s * y);
                out[1] = gx;
                out[2] = gy;
            }
            Self::Affine(_) => {
                out[0] = gx * x;
                out[1] = gx * y;
                out[2] = gx;
                out[3] = gy * x;
                out[4] = gy * y;
                out[5] = gy;
            }
        }
    }

    /// Combined displacement of a parameter update for an image of shape `(h, w)`:
    /// translation norm plus the rotation/linear change weighted by a quarter diagonal.
    pub fn update_displacement(&self, delta: &[f64], dim: (usize, usize)) -> f64 {
        let diagonal = ((dim.0 * dim.0 + dim.1 * dim.1) as f64).sqrt();
        let (translation, linear) = match self {
            Self::Rigid(_) => ((delta[1].powi(2) + delta[2].powi(2)).sqrt(), delta[0].abs()),
            Self::Affine(_) => (
                (delta[2].powi(2) + delta[5].powi(2)).sqrt(),
                delta[0].abs() + delta[1].abs() + delta[3].abs() + delta[4].abs(),
            ),
        };
        translation + LINEAR_DISPLACEMENT_WEIGHT * diagonal * linear
    }

    pub fn is_identity(&self, tolerance: f64) -> bool {
        let id = Matrix3::identity();
        (self.to_matrix() - id).iter().all(|v| v.abs() <= tolerance)
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rigid(r) => write!(
                f,
                "rigid theta={:.5} tx={:.2} ty={:.2}",
                r.theta, r.tx, r.ty
            ),
            Self::Affine(a) => {
                let m = &a.matrix;
                write!(
                    f,
                    "affine [[{:.4}, {:.4}, {:.2}], [{:.4}, {:.4}, {:.2}]]",
                    m[0][0], m[0][1], m[0][2], m[1][0], m[1][1], m[1][2]
                )
            }
        }
    }
}

/// A resampled image plus, under [`OutOfBounds::Mask`], which pixels came from inside the source.
#[derive(Clone, Debug)]
pub struct Warped {
    pub data: Array2<f32>,
    pub mask: Option<Array2<bool>>,
}

/// Resample `source` through `transform` about `origin`, cubic interpolation.
///
/// With `OutOfBounds::Extend` off-grid coordinates take the nearest edge value.
/// With `OutOfBounds::Mask` they are written as zero and flagged in the mask.
pub fn warp(
    source: &Array2<f32>,
    transform: &Transform,
    origin: Point,
    policy: OutOfBounds,
) -> Warped {
    let (h, w) = source.dim();
    let mut data = Array2::<f32>::zeros((h, w));
    let mut mask = Array2::<bool>::from_elem((h, w), true);

    let sample = |(row, col): (usize, usize), value: &mut f32, inside: &mut bool| {
        let (sx, sy) = transform.map(col as f64 - origin.x, row as f64 - origin.y);
        let (sx, sy) = (sx + origin.x, sy + origin.y);
        if policy == OutOfBounds::Mask && !in_domain(sx, sy, h, w) {
            *inside = false;
            return;
        }
        *value = CubicStencil::new(sy, sx, h, w).sample(source) as f32;
    };

    let zip = Zip::indexed(&mut data).and(&mut mask);
    if h * w >= PARALLEL_PIXEL_THRESHOLD {
        zip.par_for_each(|idx, v, m| sample(idx, v, m));
    } else {
        zip.for_each(|idx, v, m| sample(idx, v, m));
    }

    Warped {
        data,
        mask: (policy == OutOfBounds::Mask).then_some(mask),
    }
}

/// Apply a transform about the image centre with nearest-edge extension.
pub fn apply(transform: &Transform, source: &Array2<f32>) -> Array2<f32> {
    warp(source, transform, image_center(source.dim()), OutOfBounds::Extend).data
}

/// Apply a transform about the image centre, masking out-of-domain pixels.
pub fn apply_masked(transform: &Transform, source: &Array2<f32>) -> Warped {
    warp(source, transform, image_center(source.dim()), OutOfBounds::Mask)
}

pub(crate) fn in_domain(x: f64, y: f64, h: usize, w: usize) -> bool {
    x >= -DOMAIN_MARGIN
        && x <= w as f64 - 1.0 + DOMAIN_MARGIN
        && y >= -DOMAIN_MARGIN
        && y <= h as f64 - 1.0 + DOMAIN_MARGIN
}

/// Mean of squared per-pixel differences.
pub fn mean_squared_error(a: &Array2<f32>, b: &Array2<f32>) -> Result<f64> {
    ensure_same_dim(a.dim(), b.dim())?;
    if a.is_empty() {
        return Ok(0.0);
    }
    let sum: f64 = Zip::from(a)
        .and(b)
        .fold(0.0, |acc, &x, &y| acc + ((x - y) as f64).powi(2));
    Ok(sum / a.len() as f64)
}
