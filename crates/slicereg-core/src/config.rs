use std::fmt;

use serde::{Deserialize, Serialize};

use crate::consts::{
    BASE_LEVEL_ITERATIONS, CONVERGENCE_THRESHOLD, DEFAULT_DOWNSCALE, INITIAL_LAMBDA,
    LAMBDA_FACTOR, MAX_DAMPING_RETRIES, MIN_OVERLAP_FRACTION, MIN_PYRAMID_SIZE, STACK_MIN_LEVEL,
};
use crate::error::{RegistrationError, Result};

/// Parametrization fitted by the least-squares solver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionModel {
    #[default]
    Rigid,
    Affine,
}

impl fmt::Display for MotionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rigid => write!(f, "Rigid"),
            Self::Affine => write!(f, "Affine"),
        }
    }
}

/// How the coarsest level is seeded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitialGuess {
    Identity,
    /// Translation between intensity centroids, kept only if it beats identity.
    #[default]
    Centroid,
}

impl fmt::Display for InitialGuess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => write!(f, "Identity"),
            Self::Centroid => write!(f, "Centroid"),
        }
    }
}

/// Treatment of samples that land outside the source image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutOfBounds {
    /// Replicate the nearest edge pixel; every pixel counts.
    Extend,
    /// Drop out-of-domain pixels from residual sums.
    #[default]
    Mask,
}

impl fmt::Display for OutOfBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extend => write!(f, "Extend"),
            Self::Mask => write!(f, "Mask"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub convergence_threshold: f64,
    pub initial_lambda: f64,
    pub lambda_factor: f64,
    pub max_damping_retries: usize,
    /// Fraction of pixels that must remain in-domain under `OutOfBounds::Mask`.
    pub min_overlap: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            convergence_threshold: CONVERGENCE_THRESHOLD,
            initial_lambda: INITIAL_LAMBDA,
            lambda_factor: LAMBDA_FACTOR,
            max_damping_retries: MAX_DAMPING_RETRIES,
            min_overlap: MIN_OVERLAP_FRACTION,
        }
    }
}

/// Per-level iteration budget: `base * 2^(level-1)`, so level 0 gets `base / 2`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct IterationBudget {
    pub base: usize,
    /// Hard per-level ceiling, for callers that need bounded latency.
    pub cap: Option<usize>,
}

impl Default for IterationBudget {
    fn default() -> Self {
        Self {
            base: BASE_LEVEL_ITERATIONS,
            cap: None,
        }
    }
}

impl IterationBudget {
    pub fn for_level(&self, level: usize) -> usize {
        let budget = if level == 0 {
            self.base / 2
        } else {
            self.base.saturating_mul(1usize << (level - 1).min(30))
        };
        let budget = budget.max(1);
        match self.cap {
            Some(cap) => budget.min(cap.max(1)),
            None => budget,
        }
    }
}

/// Concrete pyramid schedule for one registration call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PyramidSchedule {
    pub depth: usize,
    pub min_level: usize,
    pub downscale: usize,
}

impl PyramidSchedule {
    pub fn new(depth: usize, min_level: usize, downscale: usize) -> Result<Self> {
        let schedule = Self {
            depth,
            min_level,
            downscale,
        };
        schedule.validate()?;
        Ok(schedule)
    }

    pub fn validate(&self) -> Result<()> {
        if self.depth < 1 {
            return Err(RegistrationError::InvalidPyramidDepth { depth: self.depth });
        }
        if self.min_level > self.depth {
            return Err(RegistrationError::InvalidMinLevel {
                min_level: self.min_level,
                depth: self.depth,
            });
        }
        if self.downscale < 2 {
            return Err(RegistrationError::InvalidDownscale(self.downscale));
        }
        Ok(())
    }

    /// Pixel scale of `level` relative to level 0.
    pub fn scale_of(&self, level: usize) -> f64 {
        (self.downscale as f64).powi(level as i32)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PyramidConfig {
    /// Explicit depth; `None` derives it from the image size.
    pub depth: Option<usize>,
    pub min_level: usize,
    pub downscale: usize,
    /// Coarsest-level size threshold used when deriving the depth.
    pub min_size: usize,
}

impl Default for PyramidConfig {
    fn default() -> Self {
        Self {
            depth: None,
            min_level: 0,
            downscale: DEFAULT_DOWNSCALE,
            min_size: MIN_PYRAMID_SIZE,
        }
    }
}

impl PyramidConfig {
    /// Resolve to a schedule for an image of the given `(height, width)`.
    ///
    /// An explicit depth is validated as given. A derived depth is at least 1,
    /// and the minimum level is clamped to it so small images still register.
    pub fn schedule_for(&self, dim: (usize, usize)) -> Result<PyramidSchedule> {
        if self.downscale < 2 {
            return Err(RegistrationError::InvalidDownscale(self.downscale));
        }
        match self.depth {
            Some(depth) => PyramidSchedule::new(depth, self.min_level, self.downscale),
            None => {
                let depth = crate::align::pyramid::natural_depth(
                    dim.0,
                    dim.1,
                    self.min_size,
                    self.downscale,
                )
                .max(1);
                PyramidSchedule::new(depth, self.min_level.min(depth), self.downscale)
            }
        }
    }
}

/// Settings shared by the pyramid methods. The motion model is not one of
/// them: it comes from the method identifier (`rigid` or `affine`).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistrationConfig {
    pub initial_guess: InitialGuess,
    pub out_of_bounds: OutOfBounds,
    pub solver: SolverConfig,
    pub iterations: IterationBudget,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    /// Registry identifier of the registration method.
    pub method: String,
    pub reference_index: usize,
    /// Chain each image to its already aligned neighbour instead of the reference.
    pub relative: bool,
    pub pyramid: PyramidConfig,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            method: "rigid".into(),
            reference_index: 0,
            relative: true,
            pyramid: PyramidConfig {
                min_level: STACK_MIN_LEVEL,
                ..Default::default()
            },
        }
    }
}

/// Top-level document read from and written to TOML by the CLI.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignConfig {
    pub stack: StackConfig,
    pub registration: RegistrationConfig,
}
