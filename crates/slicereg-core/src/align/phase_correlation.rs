//! Translation-only registration by FFT phase correlation.

use ndarray::{Array2, Axis, Zip};
use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

use crate::config::PyramidSchedule;
use crate::error::{ensure_same_dim, Result};

use super::registrar::{RegistrationResult, Registrar};
use super::solver::SolverStatus;
use super::transform::{apply, mean_squared_error, Transform};

/// Registrar that only recovers a translation. Ignores the pyramid schedule.
#[derive(Clone, Copy, Debug, Default)]
pub struct PhaseCorrelationRegistrar;

impl Registrar for PhaseCorrelationRegistrar {
    fn name(&self) -> &str {
        "translation"
    }

    fn register(
        &self,
        source: &Array2<f32>,
        target: &Array2<f32>,
        _schedule: &PyramidSchedule,
    ) -> Result<RegistrationResult> {
        let (tx, ty) = estimate_translation(source, target)?;
        let transform = Transform::translation(tx, ty);
        let mse = mean_squared_error(target, &apply(&transform, source))?;
        Ok(RegistrationResult {
            transform,
            mse,
            iterations: 1,
            status: SolverStatus::Converged,
        })
    }
}

/// Translation `(tx, ty)` such that `source(u + t) ≈ target(u)`.
///
/// Integer peak of the phase correlation surface plus a parabolic subpixel fit.
pub fn estimate_translation(source: &Array2<f32>, target: &Array2<f32>) -> Result<(f64, f64)> {
    ensure_same_dim(target.dim(), source.dim())?;
    let (h, w) = target.dim();
    if h == 0 || w == 0 {
        return Ok((0.0, 0.0));
    }

    let mut planner = FftPlanner::new();
    let forward = (planner.plan_fft_forward(h), planner.plan_fft_forward(w));
    let inverse = (planner.plan_fft_inverse(h), planner.plan_fft_inverse(w));

    let mut target_spec = hann_windowed(target);
    let mut source_spec = hann_windowed(source);
    fft2d(&mut target_spec, &forward);
    fft2d(&mut source_spec, &forward);

    // Normalized cross-power spectrum; its inverse peaks at `d` where `source(u) = target(u + d)`.
    let mut cross = Array2::<Complex<f64>>::zeros((h, w));
    Zip::from(&mut cross)
        .and(&target_spec)
        .and(&source_spec)
        .for_each(|c, &t, &s| {
            let prod = t * s.conj();
            let mag = prod.norm();
            *c = if mag > 1e-12 { prod / mag } else { Complex::new(0.0, 0.0) };
        });
    fft2d(&mut cross, &inverse);
    let correlation = cross.mapv(|c| c.re);

    let (peak_row, peak_col) = find_peak(&correlation);
    let wrap = |peak: usize, len: usize| {
        if peak > len / 2 {
            peak as f64 - len as f64
        } else {
            peak as f64
        }
    };
    let (sub_row, sub_col) = refine_peak_paraboloid(&correlation, peak_row, peak_col);
    let dy = wrap(peak_row, h) + sub_row;
    let dx = wrap(peak_col, w) + sub_col;

    Ok((-dx, -dy))
}

fn hann_windowed(data: &Array2<f32>) -> Array2<Complex<f64>> {
    let (h, w) = data.dim();
    let hann = |i: usize, n: usize| 0.5 * (1.0 - (std::f64::consts::TAU * i as f64 / n as f64).cos());
    Array2::from_shape_fn((h, w), |(r, c)| {
        Complex::new(data[[r, c]] as f64 * hann(r, h) * hann(c, w), 0.0)
    })
}

/// In-place 2D transform: every row, then every column. `plans` are sized `(h, w)`.
fn fft2d(data: &mut Array2<Complex<f64>>, plans: &(Arc<dyn Fft<f64>>, Arc<dyn Fft<f64>>)) {
    let (column_plan, row_plan) = plans;
    let mut buffer = Vec::with_capacity(data.nrows().max(data.ncols()));
    for (lane_axis, plan) in [(Axis(1), row_plan), (Axis(0), column_plan)] {
        for mut lane in data.lanes_mut(lane_axis) {
            buffer.clear();
            buffer.extend(lane.iter().copied());
            plan.process(&mut buffer);
            lane.iter_mut().zip(&buffer).for_each(|(dst, src)| *dst = *src);
        }
    }
}

fn find_peak(data: &Array2<f64>) -> (usize, usize) {
    data.indexed_iter()
        .fold(((0, 0), f64::NEG_INFINITY), |best, (idx, &v)| {
            if v > best.1 {
                (idx, v)
            } else {
                best
            }
        })
        .0
}

/// Fit a parabola through the peak and its neighbours along each axis.
///
/// Returns `(delta_row, delta_col)` clamped to half a pixel; zero at the border.
fn refine_peak_paraboloid(correlation: &Array2<f64>, row: usize, col: usize) -> (f64, f64) {
    let (h, w) = correlation.dim();
    if row == 0 || row + 1 >= h || col == 0 || col + 1 >= w {
        return (0.0, 0.0);
    }
    let vertex = |prev: f64, curr: f64, next: f64| {
        let denom = prev - 2.0 * curr + next;
        if denom.abs() > 1e-12 {
            ((prev - next) / (2.0 * denom)).clamp(-0.5, 0.5)
        } else {
            0.0
        }
    };
    let c = correlation[[row, col]];
    (
        vertex(correlation[[row - 1, col]], c, correlation[[row + 1, col]]),
        vertex(correlation[[row, col - 1]], c, correlation[[row, col + 1]]),
    )
}
