//! Coarse-to-fine registration driver and the backend-agnostic `Registrar` seam.

use ndarray::{Array2, Zip};
use tracing::debug;

use crate::config::{
    InitialGuess, MotionModel, OutOfBounds, PyramidSchedule, RegistrationConfig,
};
use crate::error::{ensure_same_dim, RegistrationError, Result};

use super::centroid::centroid_seed;
use super::pyramid::Pyramid;
use super::solver::{SolveResult, Solver, SolverStatus};
use super::transform::{image_center, warp, Point, Transform};

/// Outcome of one pairwise registration.
#[derive(Clone, Debug)]
pub struct RegistrationResult {
    /// Maps target pixel coordinates to source coordinates, level-0 units,
    /// origin at the image centre. `apply(&transform, source)` lands on the target.
    pub transform: Transform,
    /// Mean squared residual at the finest level that was solved.
    pub mse: f64,
    pub iterations: usize,
    pub status: SolverStatus,
}

impl RegistrationResult {
    pub fn identity(model: MotionModel, mse: f64) -> Self {
        Self {
            transform: Transform::identity(model),
            mse,
            iterations: 0,
            status: SolverStatus::Converged,
        }
    }
}

/// A pairwise registration backend. The stack aligner only talks to this trait.
pub trait Registrar: Send + Sync {
    fn name(&self) -> &str;

    /// Find the transform that brings `source` onto `target`.
    fn register(
        &self,
        source: &Array2<f32>,
        target: &Array2<f32>,
        schedule: &PyramidSchedule,
    ) -> Result<RegistrationResult>;
}

/// Register `source` to `target` with the rigid least-squares pyramid and default settings.
pub fn register(
    source: &Array2<f32>,
    target: &Array2<f32>,
    pyramid_depth: usize,
    min_level: usize,
    downscale: usize,
) -> Result<Transform> {
    let schedule = PyramidSchedule::new(pyramid_depth, min_level, downscale)?;
    let registrar = PyramidRegistrar::new(RegistrationConfig::default());
    Ok(registrar.register(source, target, &schedule)?.transform)
}

/// Levenberg–Marquardt over a Gaussian pyramid, rigid or affine.
#[derive(Clone, Debug, Default)]
pub struct PyramidRegistrar {
    model: MotionModel,
    config: RegistrationConfig,
}

impl PyramidRegistrar {
    /// Rigid registration with `config`.
    pub fn new(config: RegistrationConfig) -> Self {
        Self::with_model(MotionModel::Rigid, &config)
    }

    pub fn with_model(model: MotionModel, config: &RegistrationConfig) -> Self {
        Self {
            model,
            config: config.clone(),
        }
    }

    pub fn model(&self) -> MotionModel {
        self.model
    }

    /// Seed at the coarsest level, in that level's pixel units.
    fn seed(&self, source: &Array2<f32>, target: &Array2<f32>, origin: Point) -> Transform {
        let identity = Transform::identity(MotionModel::Rigid);
        if self.config.initial_guess == InitialGuess::Identity {
            return identity;
        }
        let Some(centroid) = centroid_seed(source, target) else {
            return identity;
        };
        let policy = self.config.out_of_bounds;
        let centroid_mse = level_mse(source, target, &centroid, origin, policy);
        let identity_mse = level_mse(source, target, &identity, origin, policy);
        if centroid_mse < identity_mse {
            centroid
        } else {
            identity
        }
    }

    /// Run the solver from the coarsest level down to `min_level`.
    ///
    /// `initial` is in level-0 units; the returned transform is too.
    fn descend(
        &self,
        source: &Pyramid,
        target: &Pyramid,
        schedule: &PyramidSchedule,
        initial: Transform,
        center: Point,
    ) -> Result<(Transform, SolveResult)> {
        let solver = Solver::new(&self.config.solver, self.config.out_of_bounds);
        let mut transform =
            initial.with_scaled_translation(1.0 / schedule.scale_of(schedule.depth));
        let mut last: Option<SolveResult> = None;
        let mut total_iterations = 0;

        for level in (schedule.min_level..=schedule.depth).rev() {
            if level < schedule.depth {
                transform = transform.with_scaled_translation(schedule.downscale as f64);
            }
            let scale = schedule.scale_of(level);
            let fixed = target.level(level);
            let result = solver.solve_about(
                fixed,
                source.level(level),
                transform,
                self.config.iterations.for_level(level),
                center.scaled(1.0 / scale),
            )?;
            transform = result.transform;
            total_iterations += result.iterations;

            debug!(
                level,
                width = fixed.ncols(),
                height = fixed.nrows(),
                transform = %transform.with_scaled_translation(scale),
                mse = result.mse,
                "pyramid level solved"
            );
            last = Some(result);
        }

        let transform =
            transform.with_scaled_translation(schedule.scale_of(schedule.min_level));
        let mut last = last.ok_or(RegistrationError::InvalidMinLevel {
            min_level: schedule.min_level,
            depth: schedule.depth,
        })?;
        last.iterations = total_iterations;
        Ok((transform, last))
    }
}

impl Registrar for PyramidRegistrar {
    fn name(&self) -> &str {
        match self.model {
            MotionModel::Rigid => "rigid",
            MotionModel::Affine => "affine",
        }
    }

    fn register(
        &self,
        source: &Array2<f32>,
        target: &Array2<f32>,
        schedule: &PyramidSchedule,
    ) -> Result<RegistrationResult> {
        ensure_same_dim(target.dim(), source.dim())?;
        schedule.validate()?;

        let source_pyramid = Pyramid::build(source, schedule.depth, schedule.downscale)?;
        let target_pyramid = Pyramid::build(target, schedule.depth, schedule.downscale)?;
        let center = image_center(target.dim());

        let coarse_scale = schedule.scale_of(schedule.depth);
        let seed = self
            .seed(
                source_pyramid.level(schedule.depth),
                target_pyramid.level(schedule.depth),
                center.scaled(1.0 / coarse_scale),
            )
            .with_scaled_translation(coarse_scale);

        let (mut transform, mut result) =
            self.descend(&source_pyramid, &target_pyramid, schedule, seed, center)?;

        if self.model == MotionModel::Affine {
            let rigid_iterations = result.iterations;
            let embedded = Transform::Affine(transform.to_affine());
            (transform, result) =
                self.descend(&source_pyramid, &target_pyramid, schedule, embedded, center)?;
            result.iterations += rigid_iterations;
        }

        // Rescaled coarse solutions are not guaranteed to beat identity at the finest level.
        let finest = schedule.min_level;
        let finest_center = center.scaled(1.0 / schedule.scale_of(finest));
        let identity = Transform::identity(self.model);
        let identity_mse = level_mse(
            source_pyramid.level(finest),
            target_pyramid.level(finest),
            &identity,
            finest_center,
            self.config.out_of_bounds,
        );
        if identity_mse <= result.mse && !result.status.is_degenerate() {
            debug!(identity_mse, mse = result.mse, "keeping identity");
            return Ok(RegistrationResult {
                transform: identity,
                mse: identity_mse,
                iterations: result.iterations,
                status: result.status,
            });
        }

        Ok(RegistrationResult {
            transform,
            mse: result.mse,
            iterations: result.iterations,
            status: result.status,
        })
    }
}

/// Passes every image through unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityRegistrar;

impl Registrar for IdentityRegistrar {
    fn name(&self) -> &str {
        "identity"
    }

    fn register(
        &self,
        source: &Array2<f32>,
        target: &Array2<f32>,
        _schedule: &PyramidSchedule,
    ) -> Result<RegistrationResult> {
        ensure_same_dim(target.dim(), source.dim())?;
        let mse = crate::align::transform::mean_squared_error(target, source)?;
        Ok(RegistrationResult::identity(MotionModel::Rigid, mse))
    }
}

/// Mean squared residual of `target - warp(source)`, skipping masked pixels.
fn level_mse(
    source: &Array2<f32>,
    target: &Array2<f32>,
    transform: &Transform,
    origin: Point,
    policy: OutOfBounds,
) -> f64 {
    let warped = warp(source, transform, origin, policy);
    let (sum, count) = match &warped.mask {
        Some(mask) => Zip::from(target).and(&warped.data).and(mask).fold(
            (0.0, 0usize),
            |(sum, count), &t, &s, &inside| {
                if inside {
                    (sum + ((t - s) as f64).powi(2), count + 1)
                } else {
                    (sum, count)
                }
            },
        ),
        None => Zip::from(target)
            .and(&warped.data)
            .fold((0.0, 0usize), |(sum, count), &t, &s| {
                (sum + ((t - s) as f64).powi(2), count + 1)
            }),
    };
    if count == 0 {
        f64::INFINITY
    } else {
        sum / count as f64
    }
}
