mod common;

use approx::assert_abs_diff_eq;
use slicereg_core::align::registrar::{
    register, IdentityRegistrar, PyramidRegistrar, Registrar,
};
use slicereg_core::align::transform::{apply, mean_squared_error, Affine, Rigid, Transform};
use slicereg_core::config::{
    InitialGuess, IterationBudget, MotionModel, PyramidSchedule, RegistrationConfig,
};
use slicereg_core::error::RegistrationError;

use common::{constant_image, textured_image};

fn assert_near_identity(t: &Transform, linear_tol: f64, translation_tol: f64) {
    let m = t.to_affine().matrix;
    assert_abs_diff_eq!(m[0][0], 1.0, epsilon = linear_tol);
    assert_abs_diff_eq!(m[0][1], 0.0, epsilon = linear_tol);
    assert_abs_diff_eq!(m[1][0], 0.0, epsilon = linear_tol);
    assert_abs_diff_eq!(m[1][1], 1.0, epsilon = linear_tol);
    assert_abs_diff_eq!(m[0][2], 0.0, epsilon = translation_tol);
    assert_abs_diff_eq!(m[1][2], 0.0, epsilon = translation_tol);
}

#[test]
fn test_self_registration_is_identity() {
    let image = textured_image(128, 128);
    let transform = register(&image, &image, 3, 0, 2).unwrap();
    assert_near_identity(&transform, 1e-6, 1e-4);
}

#[test]
fn test_rigid_roundtrip() {
    let target = textured_image(128, 128);
    let applied = Transform::Rigid(Rigid::new(0.05, 8.0, -5.0));
    let source = apply(&applied, &target);

    let recovered = register(&source, &target, 3, 0, 2).unwrap();
    assert_eq!(recovered.model(), MotionModel::Rigid);
    // source(S u) = target(T S u), so T ∘ S must be the identity.
    assert_near_identity(&applied.compose(&recovered), 1e-2, 1.0);
}

#[test]
fn test_result_never_worse_than_identity() {
    let target = textured_image(96, 96);
    let source = apply(&Transform::Rigid(Rigid::new(-0.03, -3.0, 2.5)), &target);

    let transform = register(&source, &target, 2, 0, 2).unwrap();
    let before = mean_squared_error(&target, &source).unwrap();
    let after = mean_squared_error(&target, &apply(&transform, &source)).unwrap();
    assert!(after <= before, "mse went from {before} to {after}");
}

#[test]
fn test_affine_roundtrip() {
    let target = textured_image(128, 128);
    let applied = Transform::Affine(Affine::new([[1.03, 0.02, 3.0], [-0.01, 0.98, -2.0]]));
    let source = apply(&applied, &target);

    let registrar = PyramidRegistrar::with_model(MotionModel::Affine, &RegistrationConfig::default());
    let schedule = PyramidSchedule::new(3, 0, 2).unwrap();
    let result = registrar.register(&source, &target, &schedule).unwrap();

    assert_eq!(result.transform.model(), MotionModel::Affine);
    assert_near_identity(&applied.compose(&result.transform), 5e-3, 0.3);
}

#[test]
fn test_identity_seed_matches_centroid_seed_on_small_motion() {
    let target = textured_image(96, 96);
    let source = apply(&Transform::translation(2.0, 1.0), &target);
    let schedule = PyramidSchedule::new(2, 0, 2).unwrap();

    for guess in [InitialGuess::Identity, InitialGuess::Centroid] {
        let config = RegistrationConfig {
            initial_guess: guess,
            ..Default::default()
        };
        let result = PyramidRegistrar::new(config)
            .register(&source, &target, &schedule)
            .unwrap();
        let (tx, ty) = result.transform.translation_part();
        assert_abs_diff_eq!(tx, -2.0, epsilon = 0.1);
        assert_abs_diff_eq!(ty, -1.0, epsilon = 0.1);
    }
}

#[test]
fn test_iteration_cap_bounds_work() {
    let target = textured_image(64, 64);
    let source = apply(&Transform::translation(1.0, 0.0), &target);
    let config = RegistrationConfig {
        iterations: IterationBudget {
            cap: Some(1),
            ..Default::default()
        },
        ..Default::default()
    };
    let schedule = PyramidSchedule::new(2, 0, 2).unwrap();
    let result = PyramidRegistrar::new(config)
        .register(&source, &target, &schedule)
        .unwrap();
    assert!(result.iterations <= 3);
    assert!(result.mse.is_finite());
}

#[test]
fn test_coarse_min_level_still_returns_full_resolution_units() {
    let target = textured_image(128, 128);
    let source = apply(&Transform::translation(8.0, -4.0), &target);
    let transform = register(&source, &target, 3, 1, 2).unwrap();
    let (tx, ty) = transform.translation_part();
    assert_abs_diff_eq!(tx, -8.0, epsilon = 0.5);
    assert_abs_diff_eq!(ty, 4.0, epsilon = 0.5);
}

#[test]
fn test_blank_images_give_identity() {
    let blank = constant_image(64, 64, 0.2);
    let transform = register(&blank, &blank, 2, 0, 2).unwrap();
    assert!(transform.is_identity(1e-12));

    let zeros = constant_image(64, 64, 0.0);
    let registrar = PyramidRegistrar::default();
    let result = registrar
        .register(&zeros, &zeros, &PyramidSchedule::new(2, 0, 2).unwrap())
        .unwrap();
    assert!(result.transform.is_identity(1e-12));
    assert_eq!(result.mse, 0.0);
    assert!(result.status.is_degenerate());
}

#[test]
fn test_invalid_schedule_rejected() {
    let image = textured_image(32, 32);
    assert!(matches!(
        register(&image, &image, 0, 0, 2),
        Err(RegistrationError::InvalidPyramidDepth { depth: 0 })
    ));
    assert!(matches!(
        register(&image, &image, 2, 3, 2),
        Err(RegistrationError::InvalidMinLevel { min_level: 3, depth: 2 })
    ));
}

#[test]
fn test_dimension_mismatch_rejected() {
    let a = textured_image(32, 32);
    let b = textured_image(32, 40);
    assert!(matches!(
        register(&a, &b, 1, 0, 2),
        Err(RegistrationError::DimensionMismatch { .. })
    ));
}

#[test]
fn test_identity_registrar() {
    let a = textured_image(32, 32);
    let b = apply(&Transform::translation(3.0, 0.0), &a);
    let schedule = PyramidSchedule::new(1, 0, 2).unwrap();
    let result = IdentityRegistrar.register(&a, &b, &schedule).unwrap();
    assert!(result.transform.is_identity(0.0));
    assert_eq!(result.iterations, 0);
    assert_abs_diff_eq!(result.mse, mean_squared_error(&a, &b).unwrap(), epsilon = 1e-12);
    assert_eq!(IdentityRegistrar.name(), "identity");
}

#[test]
fn test_registrar_names() {
    let config = RegistrationConfig::default();
    assert_eq!(PyramidRegistrar::with_model(MotionModel::Rigid, &config).name(), "rigid");
    assert_eq!(PyramidRegistrar::with_model(MotionModel::Affine, &config).name(), "affine");
    assert_eq!(PyramidRegistrar::new(config).model(), MotionModel::Rigid);
}
