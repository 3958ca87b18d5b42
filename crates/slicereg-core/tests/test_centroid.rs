mod common;

use approx::assert_abs_diff_eq;
use slicereg_core::align::centroid::{centroid_seed, intensity_centroid};
use slicereg_core::align::registrar::{PyramidRegistrar, Registrar};
use slicereg_core::config::{InitialGuess, PyramidSchedule, RegistrationConfig};

use common::{blob_image, constant_image, textured_image};

fn registrar(initial_guess: InitialGuess) -> PyramidRegistrar {
    PyramidRegistrar::new(RegistrationConfig {
        initial_guess,
        ..Default::default()
    })
}

#[test]
fn test_centroid_of_blob() {
    let image = blob_image(96, 128, 30.0, 70.0, 5.0);
    let centroid = intensity_centroid(&image).unwrap();
    assert_abs_diff_eq!(centroid.x, 70.0, epsilon = 1e-2);
    assert_abs_diff_eq!(centroid.y, 30.0, epsilon = 1e-2);
}

#[test]
fn test_centroid_ignores_uniform_background() {
    let mut image = blob_image(64, 64, 20.0, 44.0, 4.0);
    image += 0.3;
    let centroid = intensity_centroid(&image).unwrap();
    assert_abs_diff_eq!(centroid.x, 44.0, epsilon = 1e-2);
    assert_abs_diff_eq!(centroid.y, 20.0, epsilon = 1e-2);
}

#[test]
fn test_flat_image_has_no_centroid() {
    let flat = constant_image(32, 32, 0.4);
    assert!(intensity_centroid(&flat).is_none());
    assert!(centroid_seed(&flat, &blob_image(32, 32, 16.0, 16.0, 3.0)).is_none());
}

#[test]
fn test_seed_points_from_target_to_source() {
    let source = blob_image(128, 128, 80.0, 85.0, 6.0);
    let target = blob_image(128, 128, 50.0, 50.0, 6.0);
    let (tx, ty) = centroid_seed(&source, &target).unwrap().translation_part();
    assert_abs_diff_eq!(tx, 35.0, epsilon = 1e-2);
    assert_abs_diff_eq!(ty, 30.0, epsilon = 1e-2);
}

#[test]
fn test_centroid_seed_recovers_large_shift() {
    // Far apart blobs share no gradient overlap; only the seed can bridge the gap.
    let source = blob_image(128, 128, 80.0, 85.0, 6.0);
    let target = blob_image(128, 128, 50.0, 50.0, 6.0);
    let schedule = PyramidSchedule::new(1, 0, 2).unwrap();

    let seeded = registrar(InitialGuess::Centroid)
        .register(&source, &target, &schedule)
        .unwrap();
    let (tx, ty) = seeded.transform.translation_part();
    assert_abs_diff_eq!(tx, 35.0, epsilon = 0.1);
    assert_abs_diff_eq!(ty, 30.0, epsilon = 0.1);
    assert!(seeded.mse < 1e-6, "mse = {}", seeded.mse);

    let unseeded = registrar(InitialGuess::Identity)
        .register(&source, &target, &schedule)
        .unwrap();
    let (tx, _) = unseeded.transform.translation_part();
    assert!((tx - 35.0).abs() > 10.0, "identity start reached tx = {tx}");
    assert!(unseeded.mse > seeded.mse);
}

#[test]
fn test_worse_seed_is_discarded() {
    // An extra bright spot in the source drags its centroid, but the slices
    // themselves are already aligned.
    let target = textured_image(128, 128);
    let source = &target + &blob_image(128, 128, 110.0, 110.0, 4.0);
    let (sx, sy) = centroid_seed(&source, &target).unwrap().translation_part();
    assert!(sx.hypot(sy) > 1.0, "seed ({sx}, {sy}) too small to matter");

    let schedule = PyramidSchedule::new(2, 0, 2).unwrap();
    let with_seed = registrar(InitialGuess::Centroid)
        .register(&source, &target, &schedule)
        .unwrap();
    let without_seed = registrar(InitialGuess::Identity)
        .register(&source, &target, &schedule)
        .unwrap();

    let (tx, ty) = with_seed.transform.translation_part();
    assert!(tx.abs() < 0.5 && ty.abs() < 0.5, "drifted to ({tx}, {ty})");
    let (ix, iy) = without_seed.transform.translation_part();
    assert_abs_diff_eq!(tx, ix, epsilon = 1e-6);
    assert_abs_diff_eq!(ty, iy, epsilon = 1e-6);
    assert_abs_diff_eq!(with_seed.mse, without_seed.mse, epsilon = 1e-9);
}
