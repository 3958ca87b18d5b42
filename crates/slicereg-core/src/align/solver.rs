//! Damped least-squares (modified Levenberg–Marquardt) refinement at one resolution.
//!
//! Minimizes `Σ (fixed(u) - moving(T(u)))²` over the transform parameters.
//! The Jacobian uses the moving image's Scharr gradient, computed once and
//! resampled at the warped positions on every evaluation. Each iteration
//! solves `(H + λ·diag(H))·Δ = g` with `g = Σ r·∂`, tries `T + Δ`, and keeps
//! the candidate only if its mean squared error beats the best so far.
//!
//! Damping scales the diagonal, so it cannot repair a parameter the image
//! does not constrain at all. Horizontal stripes have `gx = 0` everywhere,
//! leaving a zero row for `tx`; the system stays singular and the solve ends
//! `Degenerate` at the starting transform even though `ty` is observable.

use nalgebra::{DMatrix, DVector};
use ndarray::Array2;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::config::{OutOfBounds, SolverConfig};
use crate::consts::{HESSIAN_EPSILON, PARALLEL_PIXEL_THRESHOLD};
use crate::error::{ensure_same_dim, Result};

use super::gradient::{scharr_gradient, GradientField};
use super::interpolate::CubicStencil;
use super::transform::{image_center, in_domain, Point, Transform};

const MAX_PARAMS: usize = 6;
const ACCUMULATE_CHUNK: usize = 4096;

/// Why the solver stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolverStatus {
    /// The last update moved the transform less than the convergence threshold.
    Converged,
    /// The iteration budget ran out; the best transform found is still returned.
    MaxIterations,
    /// The damped Hessian stayed singular (e.g. a flat image) or no pixels overlapped.
    Degenerate,
}

impl SolverStatus {
    pub fn is_degenerate(&self) -> bool {
        matches!(self, Self::Degenerate)
    }
}

#[derive(Clone, Debug)]
pub struct SolveResult {
    pub transform: Transform,
    pub mse: f64,
    pub iterations: usize,
    pub status: SolverStatus,
}

/// Outcome of offering a candidate to [`DampedSearch::consider`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Accepted,
    Rejected,
}

/// Best-so-far bookkeeping and damping adaptation.
#[derive(Clone, Debug)]
pub struct DampedSearch {
    pub best: Transform,
    pub best_mse: f64,
    pub lambda: f64,
    factor: f64,
}

impl DampedSearch {
    pub fn new(initial: Transform, initial_mse: f64, lambda: f64, factor: f64) -> Self {
        Self {
            best: initial,
            best_mse: initial_mse,
            lambda,
            factor,
        }
    }

    /// Keep `candidate` and relax damping if it lowers the error; otherwise
    /// keep the previous best and increase damping.
    pub fn consider(&mut self, candidate: Transform, mse: f64) -> StepOutcome {
        if mse < self.best_mse {
            self.best = candidate;
            self.best_mse = mse;
            self.lambda /= self.factor;
            StepOutcome::Accepted
        } else {
            self.lambda *= self.factor;
            StepOutcome::Rejected
        }
    }

    fn grow(&mut self) {
        self.lambda *= self.factor;
    }
}

/// Solve `(H + λ·diag(H))·Δ = g`. `None` if the system is singular or the step is not finite.
pub fn damped_update(
    hessian: &DMatrix<f64>,
    gradient: &DVector<f64>,
    lambda: f64,
) -> Option<DVector<f64>> {
    if hessian.diagonal().iter().all(|d| d.abs() < HESSIAN_EPSILON) {
        return None;
    }
    let mut system = hessian.clone();
    for i in 0..system.nrows() {
        system[(i, i)] += lambda * hessian[(i, i)];
    }
    let delta = system.lu().solve(gradient)?;
    delta.iter().all(|v| v.is_finite()).then_some(delta)
}

/// Refine `initial` with default settings, masking out-of-domain pixels.
pub fn solve(
    fixed: &Array2<f32>,
    moving: &Array2<f32>,
    initial: Transform,
    max_iterations: usize,
) -> Result<SolveResult> {
    Solver::new(&SolverConfig::default(), OutOfBounds::Mask).solve(
        fixed,
        moving,
        initial,
        max_iterations,
    )
}

pub struct Solver<'a> {
    config: &'a SolverConfig,
    policy: OutOfBounds,
}

impl<'a> Solver<'a> {
    pub fn new(config: &'a SolverConfig, policy: OutOfBounds) -> Self {
        Self { config, policy }
    }

    /// Solve with the transform origin at the image centre.
    pub fn solve(
        &self,
        fixed: &Array2<f32>,
        moving: &Array2<f32>,
        initial: Transform,
        max_iterations: usize,
    ) -> Result<SolveResult> {
        self.solve_about(fixed, moving, initial, max_iterations, image_center(fixed.dim()))
    }

    /// Solve with an explicit transform origin (pyramid levels pass the
    /// level-0 centre expressed in level coordinates).
    pub fn solve_about(
        &self,
        fixed: &Array2<f32>,
        moving: &Array2<f32>,
        initial: Transform,
        max_iterations: usize,
        origin: Point,
    ) -> Result<SolveResult> {
        ensure_same_dim(fixed.dim(), moving.dim())?;

        let problem = Problem {
            fixed,
            moving,
            gradient: scharr_gradient(moving),
            origin,
            policy: self.policy,
            min_overlap: self.config.min_overlap,
        };

        let mut best_eval = problem.evaluate(&initial);
        let mut search = DampedSearch::new(
            initial,
            best_eval.mse,
            self.config.initial_lambda,
            self.config.lambda_factor,
        );

        if !best_eval.mse.is_finite() {
            warn!("initial transform leaves too few overlapping pixels");
            return Ok(SolveResult {
                transform: initial,
                mse: best_eval.mse,
                iterations: 0,
                status: SolverStatus::Degenerate,
            });
        }

        let mut status = SolverStatus::MaxIterations;
        let mut iterations = 0;
        while iterations < max_iterations {
            let (hessian, gradient) = best_eval.normal_equations(&search.best);
            let Some(delta) = self.damped_with_retries(&hessian, &gradient, &mut search) else {
                status = SolverStatus::Degenerate;
                break;
            };
            iterations += 1;

            let candidate = search.best.offset_by(delta.as_slice());
            let displacement = search
                .best
                .update_displacement(delta.as_slice(), fixed.dim());
            let candidate_eval = problem.evaluate(&candidate);
            if search.consider(candidate, candidate_eval.mse) == StepOutcome::Accepted {
                best_eval = candidate_eval;
            }

            if displacement < self.config.convergence_threshold {
                status = SolverStatus::Converged;
                break;
            }
        }

        if status != SolverStatus::Degenerate {
            // One undamped Gauss-Newton step from the best point.
            let (hessian, gradient) = best_eval.normal_equations(&search.best);
            if let Some(delta) = damped_update(&hessian, &gradient, 0.0) {
                let candidate = search.best.offset_by(delta.as_slice());
                let candidate_mse = problem.evaluate(&candidate).mse;
                if candidate_mse < search.best_mse {
                    search.best = candidate;
                    search.best_mse = candidate_mse;
                }
            }
        } else {
            warn!(
                iterations,
                "damped Hessian singular; keeping best transform found"
            );
        }

        debug!(
            iterations,
            mse = search.best_mse,
            status = ?status,
            "solver finished"
        );

        Ok(SolveResult {
            transform: search.best,
            mse: search.best_mse,
            iterations,
            status,
        })
    }

    fn damped_with_retries(
        &self,
        hessian: &DMatrix<f64>,
        gradient: &DVector<f64>,
        search: &mut DampedSearch,
    ) -> Option<DVector<f64>> {
        for _ in 0..=self.config.max_damping_retries {
            if let Some(delta) = damped_update(hessian, gradient, search.lambda) {
                return Some(delta);
            }
            search.grow();
        }
        None
    }
}

struct Problem<'a> {
    fixed: &'a Array2<f32>,
    moving: &'a Array2<f32>,
    gradient: GradientField,
    origin: Point,
    policy: OutOfBounds,
    min_overlap: f64,
}

/// One in-domain pixel: centred target coordinate, residual and resampled source gradient.
#[derive(Clone, Copy, Debug)]
struct Sample {
    x: f64,
    y: f64,
    residual: f64,
    gx: f64,
    gy: f64,
}

struct Evaluation {
    samples: Vec<Sample>,
    mse: f64,
}

impl Problem<'_> {
    fn evaluate(&self, transform: &Transform) -> Evaluation {
        let (h, w) = self.fixed.dim();
        let row_samples = |row: usize| -> Vec<Sample> {
            let mut out = Vec::with_capacity(w);
            let y = row as f64 - self.origin.y;
            for col in 0..w {
                let x = col as f64 - self.origin.x;
                let (sx, sy) = transform.map(x, y);
                let (sx, sy) = (sx + self.origin.x, sy + self.origin.y);
                if self.policy == OutOfBounds::Mask && !in_domain(sx, sy, h, w) {
                    continue;
                }
                let stencil = CubicStencil::new(sy, sx, h, w);
                out.push(Sample {
                    x,
                    y,
                    residual: self.fixed[[row, col]] as f64 - stencil.sample(self.moving),
                    gx: stencil.sample(&self.gradient.gx),
                    gy: stencil.sample(&self.gradient.gy),
                });
            }
            out
        };

        let samples: Vec<Sample> = if h * w >= PARALLEL_PIXEL_THRESHOLD {
            (0..h).into_par_iter().flat_map_iter(row_samples).collect()
        } else {
            (0..h).flat_map(row_samples).collect()
        };

        let required = (self.min_overlap * (h * w) as f64).ceil().max(1.0) as usize;
        let mse = if samples.len() < required {
            f64::INFINITY
        } else {
            samples.iter().map(|s| s.residual * s.residual).sum::<f64>() / samples.len() as f64
        };
        Evaluation { samples, mse }
    }
}

impl Evaluation {
    /// Approximate Hessian `Σ ∂∂ᵀ` and gradient `Σ r·∂` over all samples.
    fn normal_equations(&self, transform: &Transform) -> (DMatrix<f64>, DVector<f64>) {
        let n = transform.param_count();
        let accumulate = |chunk: &[Sample]| {
            let mut acc = Accumulator::default();
            let mut d = [0.0; MAX_PARAMS];
            for s in chunk {
                transform.partials(s.x, s.y, s.gx, s.gy, &mut d[..n]);
                acc.add(&d[..n], s.residual);
            }
            acc
        };

        let total = if self.samples.len() >= PARALLEL_PIXEL_THRESHOLD {
            self.samples
                .par_chunks(ACCUMULATE_CHUNK)
                .map(accumulate)
                .reduce(Accumulator::default, Accumulator::merge)
        } else {
            accumulate(&self.samples)
        };
        total.into_system(n)
    }
}

#[derive(Clone, Copy)]
struct Accumulator {
    hessian: [[f64; MAX_PARAMS]; MAX_PARAMS],
    gradient: [f64; MAX_PARAMS],
}

impl Default for Accumulator {
    fn default() -> Self {
        Self {
            hessian: [[0.0; MAX_PARAMS]; MAX_PARAMS],
            gradient: [0.0; MAX_PARAMS],
        }
    }
}

impl Accumulator {
    /// Upper triangle only; mirrored in `into_system`.
    fn add(&mut self, d: &[f64], residual: f64) {
        for i in 0..d.len() {
            self.gradient[i] += residual * d[i];
            for j in i..d.len() {
                self.hessian[i][j] += d[i] * d[j];
            }
        }
    }

    fn merge(mut self, other: Self) -> Self {
        for i in 0..MAX_PARAMS {
            self.gradient[i] += other.gradient[i];
            for j in 0..MAX_PARAMS {
                self.hessian[i][j] += other.hessian[i][j];
            }
        }
        self
    }

    fn into_system(self, n: usize) -> (DMatrix<f64>, DVector<f64>) {
        let hessian = DMatrix::from_fn(n, n, |i, j| {
            if i <= j {
                self.hessian[i][j]
            } else {
                self.hessian[j][i]
            }
        });
        let gradient = DVector::from_fn(n, |i, _| self.gradient[i]);
        (hessian, gradient)
    }
}
