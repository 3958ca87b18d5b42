/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Minimum image count to register independent pairs in parallel.
pub const PARALLEL_FRAME_THRESHOLD: usize = 4;

/// Default integer downscale factor between pyramid levels.
pub const DEFAULT_DOWNSCALE: usize = 2;

/// Largest width/height (in pixels) still considered usable at the
/// coarsest pyramid level.
pub const MIN_PYRAMID_SIZE: usize = 24;

/// Coarsest level kept at full resolution when aligning a whole stack.
pub const STACK_MIN_LEVEL: usize = 3;

/// Minimum level used when registering across magnifications.
pub const CROSS_SCALE_MIN_LEVEL: usize = 2;

/// Iteration budget at level 1; level `k` gets `base * 2^(k-1)`.
pub const BASE_LEVEL_ITERATIONS: usize = 10;

/// Stop the solver once the combined displacement of an update drops below this.
pub const CONVERGENCE_THRESHOLD: f64 = 0.001;

/// Weight of the rotation/linear part in the displacement metric,
/// relative to the image diagonal.
pub const LINEAR_DISPLACEMENT_WEIGHT: f64 = 0.25;

/// Starting Levenberg–Marquardt damping.
pub const INITIAL_LAMBDA: f64 = 1.0;

/// Multiplier applied to the damping on rejection (divisor on acceptance).
pub const LAMBDA_FACTOR: f64 = 10.0;

/// Consecutive singular solves tolerated before a solve is declared degenerate.
pub const MAX_DAMPING_RETRIES: usize = 12;

/// Fraction of pixels that must stay inside the source image for a masked
/// candidate to be comparable with the current best.
pub const MIN_OVERLAP_FRACTION: f64 = 0.25;

/// Diagonal Hessian entries below this are treated as a flat gradient field.
pub const HESSIAN_EPSILON: f64 = 1e-12;

/// Scharr 3x3 weights: smoothing row (3, 10, 3), normalized so the
/// response equals the derivative in intensity per pixel.
pub const SCHARR_SMOOTH: [f64; 3] = [3.0, 10.0, 3.0];
pub const SCHARR_NORM: f64 = 32.0;

/// Keys cubic convolution parameter (Catmull-Rom).
pub const CUBIC_A: f64 = -0.5;

/// Pixels with coordinates this far outside the grid are out of domain.
pub const DOMAIN_MARGIN: f64 = 0.5;
