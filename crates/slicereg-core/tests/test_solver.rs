mod common;

use approx::assert_abs_diff_eq;
use nalgebra::{DMatrix, DVector};
use slicereg_core::align::solver::{
    damped_update, solve, DampedSearch, Solver, SolverStatus, StepOutcome,
};
use slicereg_core::align::transform::{apply, mean_squared_error, Rigid, Transform};
use slicereg_core::config::{MotionModel, OutOfBounds, SolverConfig};

use common::{constant_image, textured_image};

#[test]
fn test_accepted_step_relaxes_damping() {
    let mut search = DampedSearch::new(Transform::default(), 1.0, 1.0, 10.0);
    let candidate = Transform::translation(0.5, 0.0);
    assert_eq!(search.consider(candidate, 0.5), StepOutcome::Accepted);
    assert_eq!(search.best, candidate);
    assert_eq!(search.best_mse, 0.5);
    assert_abs_diff_eq!(search.lambda, 0.1, epsilon = 1e-15);
}

#[test]
fn test_rejected_step_keeps_best_and_increases_damping() {
    let mut search = DampedSearch::new(Transform::default(), 1.0, 1.0, 10.0);
    assert_eq!(
        search.consider(Transform::translation(3.0, 0.0), 2.0),
        StepOutcome::Rejected
    );
    assert_eq!(search.best, Transform::default());
    assert_eq!(search.best_mse, 1.0);
    assert_abs_diff_eq!(search.lambda, 10.0, epsilon = 1e-12);

    // Equal error is not an improvement.
    assert_eq!(
        search.consider(Transform::translation(1.0, 0.0), 1.0),
        StepOutcome::Rejected
    );
    assert_abs_diff_eq!(search.lambda, 100.0, epsilon = 1e-9);
}

#[test]
fn test_damped_update_scales_diagonal() {
    let hessian = DMatrix::from_diagonal(&DVector::from_vec(vec![2.0, 2.0]));
    let gradient = DVector::from_vec(vec![2.0, 4.0]);
    let delta = damped_update(&hessian, &gradient, 1.0).unwrap();
    assert_abs_diff_eq!(delta[0], 0.5, epsilon = 1e-12);
    assert_abs_diff_eq!(delta[1], 1.0, epsilon = 1e-12);

    let delta = damped_update(&hessian, &gradient, 0.0).unwrap();
    assert_abs_diff_eq!(delta[1], 2.0, epsilon = 1e-12);
}

#[test]
fn test_damped_update_singular() {
    let zero = DMatrix::<f64>::zeros(3, 3);
    assert!(damped_update(&zero, &DVector::zeros(3), 1.0).is_none());

    // Rank-deficient: damping a zero diagonal entry cannot fix it.
    let rank_one = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 0.0]);
    assert!(damped_update(&rank_one, &DVector::from_vec(vec![1.0, 1.0]), 1.0).is_none());
}

#[test]
fn test_self_registration_converges_at_identity() {
    let image = textured_image(48, 48);
    let result = solve(&image, &image, Transform::default(), 10).unwrap();
    assert_eq!(result.status, SolverStatus::Converged);
    assert!(result.transform.is_identity(1e-9));
    assert!(result.mse < 1e-12);
}

#[test]
fn test_blank_images_are_degenerate() {
    let blank = constant_image(32, 32, 0.5);
    let result = solve(&blank, &blank, Transform::default(), 10).unwrap();
    assert!(result.status.is_degenerate());
    assert_eq!(result.transform, Transform::default());
    assert!(result.mse.is_finite());
}

#[test]
fn test_unconstrained_parameter_is_degenerate() {
    // Rows vary, columns do not: nothing pins the horizontal translation.
    let fixed = ndarray::Array2::from_shape_fn((64, 64), |(r, _)| {
        (0.5 + 0.3 * (r as f64 * 0.3).sin()) as f32
    });
    let moving = apply(&Transform::translation(0.0, 1.5), &fixed);
    let config = SolverConfig::default();
    let solver = Solver::new(&config, OutOfBounds::Mask);
    let start = Transform::Rigid(Rigid::default());

    let result = solver.solve(&fixed, &moving, start, 10).unwrap();
    assert!(result.status.is_degenerate());
    assert_eq!(result.iterations, 0);
    assert_eq!(result.transform, start);
}

#[test]
fn test_no_overlap_is_degenerate() {
    let image = textured_image(32, 32);
    let result = solve(&image, &image, Transform::translation(1000.0, 0.0), 5).unwrap();
    assert!(result.status.is_degenerate());
    assert_eq!(result.iterations, 0);
    assert!(result.mse.is_infinite());
}

#[test]
fn test_recovers_subpixel_translation() {
    let fixed = textured_image(64, 64);
    let moving = apply(&Transform::translation(1.5, -1.0), &fixed);
    let result = solve(&fixed, &moving, Transform::default(), 50).unwrap();

    let (tx, ty) = result.transform.translation_part();
    assert_abs_diff_eq!(tx, -1.5, epsilon = 0.05);
    assert_abs_diff_eq!(ty, 1.0, epsilon = 0.05);
    assert!(!result.status.is_degenerate());
    assert!(result.iterations <= 50);
}

#[test]
fn test_error_never_increases() {
    let fixed = textured_image(64, 64);
    let moving = apply(&Transform::translation(2.0, 1.0), &fixed);
    let config = SolverConfig::default();
    let solver = Solver::new(&config, OutOfBounds::Extend);
    let start = Transform::identity(MotionModel::Affine);

    let initial_mse = mean_squared_error(&fixed, &moving).unwrap();
    let result = solver.solve(&fixed, &moving, start, 3).unwrap();
    assert!(result.mse <= initial_mse);
    assert_eq!(result.transform.model(), MotionModel::Affine);
}
