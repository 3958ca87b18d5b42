mod common;

use slicereg_core::error::RegistrationError;
use slicereg_core::io::image_io::{load_image, load_stack, save_image, save_png, save_tiff};

use common::{max_abs_diff, textured_image};

#[test]
fn test_tiff_roundtrip_keeps_16_bits() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("slice.tiff");
    let image = textured_image(24, 40);

    save_tiff(&image, &path).unwrap();
    let loaded = load_image(&path).unwrap();
    assert_eq!(loaded.dim(), (24, 40));
    assert!(max_abs_diff(&image, &loaded) <= 1.0 / 65535.0 + 1e-6);
}

#[test]
fn test_png_roundtrip_keeps_8_bits() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("slice.png");
    let image = textured_image(20, 20);

    save_png(&image, &path).unwrap();
    let loaded = load_image(&path).unwrap();
    assert!(max_abs_diff(&image, &loaded) <= 1.0 / 255.0 + 1e-6);
}

#[test]
fn test_save_clamps_out_of_range() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clamped.tif");
    let image = ndarray::Array2::from_shape_vec((1, 3), vec![-0.5f32, 0.5, 1.5]).unwrap();

    save_image(&image, &path).unwrap();
    let loaded = load_image(&path).unwrap();
    assert_eq!(loaded[[0, 0]], 0.0);
    assert_eq!(loaded[[0, 2]], 1.0);
}

#[test]
fn test_load_stack() {
    let dir = tempfile::tempdir().unwrap();
    let paths: Vec<_> = (0..3)
        .map(|i| {
            let path = dir.path().join(format!("s{i}.png"));
            save_image(&textured_image(16, 16), &path).unwrap();
            path
        })
        .collect();
    let stack = load_stack(&paths).unwrap();
    assert_eq!(stack.len(), 3);

    let odd = dir.path().join("odd.png");
    save_image(&textured_image(16, 18), &odd).unwrap();
    let mixed = vec![paths[0].clone(), odd];
    assert!(matches!(
        load_stack(&mixed),
        Err(RegistrationError::DimensionMismatch { .. })
    ));

    let none: Vec<std::path::PathBuf> = Vec::new();
    assert!(matches!(load_stack(&none), Err(RegistrationError::EmptyStack)));
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_image(&dir.path().join("absent.tiff")).is_err());
}
