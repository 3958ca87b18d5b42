pub mod centroid;
pub mod gradient;
pub mod interpolate;
pub mod phase_correlation;
pub mod pyramid;
pub mod registrar;
pub mod solver;
pub mod transform;

pub use registrar::{register, IdentityRegistrar, PyramidRegistrar, RegistrationResult, Registrar};
pub use solver::{solve, SolveResult, SolverStatus};
pub use transform::{apply, apply_masked, mean_squared_error, Affine, Rigid, Transform};
