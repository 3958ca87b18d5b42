//! Registration of a higher-magnification stack onto a region of an
//! already aligned lower-magnification stack.

use ndarray::Array2;
use tracing::{debug, info};

use crate::align::pyramid::natural_depth;
use crate::align::registrar::Registrar;
use crate::align::transform::{apply, Transform};
use crate::config::PyramidSchedule;
use crate::consts::{CROSS_SCALE_MIN_LEVEL, DEFAULT_DOWNSCALE, MIN_PYRAMID_SIZE};
use crate::error::{RegistrationError, Result};
use crate::filters::resize::{crop_normalized, resize_to};

/// Align each image of `source_stack` to the matching region of `reference_stack`.
///
/// `downscale` is the magnification ratio (e.g. 0.5 for a 2x objective against
/// a 1x stack) and `corner` the `(x, y)` pixel position of the region's top-left
/// corner on the reference images. The region spans `downscale` of the reference
/// in each direction. Returns the full-resolution aligned sources and their
/// transforms.
pub fn align_to_reference_stack(
    reference_stack: &[Array2<f32>],
    source_stack: &[Array2<f32>],
    downscale: f64,
    corner: (usize, usize),
    registrar: &dyn Registrar,
) -> Result<(Vec<Array2<f32>>, Vec<Transform>)> {
    if reference_stack.is_empty() {
        return Err(RegistrationError::EmptyStack);
    }
    if reference_stack.len() != source_stack.len() {
        return Err(RegistrationError::DimensionMismatch {
            expected: (reference_stack.len(), 1),
            actual: (source_stack.len(), 1),
        });
    }
    if !(downscale > 0.0 && downscale <= 1.0) {
        return Err(RegistrationError::InvalidCrop(format!(
            "downscale {downscale} must lie in (0, 1]"
        )));
    }

    let (height, width) = reference_stack[0].dim();
    let x0 = corner.0 as f64 / width as f64;
    let y0 = corner.1 as f64 / height as f64;

    let regions = reference_stack
        .iter()
        .map(|image| crop_normalized(image, (x0, x0 + downscale), (y0, y0 + downscale)))
        .collect::<Result<Vec<_>>>()?;

    // Sized from the first region so every pair shares one schedule.
    let region_dim = regions[0].dim();
    let depth = natural_depth(region_dim.0, region_dim.1, MIN_PYRAMID_SIZE, DEFAULT_DOWNSCALE)
        .max(1);
    let schedule = PyramidSchedule::new(
        depth,
        CROSS_SCALE_MIN_LEVEL.min(depth),
        DEFAULT_DOWNSCALE,
    )?;
    info!(
        images = source_stack.len(),
        downscale,
        region_width = region_dim.1,
        region_height = region_dim.0,
        depth,
        "registering across magnifications"
    );

    let mut aligned = Vec::with_capacity(source_stack.len());
    let mut transforms = Vec::with_capacity(source_stack.len());
    for (index, (source, region)) in source_stack.iter().zip(&regions).enumerate() {
        let shrunk = resize_to(source, region.dim());
        let result = registrar.register(&shrunk, region, &schedule)?;
        let transform = result.transform.with_scaled_translation(1.0 / downscale);
        debug!(index, transform = %transform, mse = result.mse, "cross-scale pair");
        aligned.push(apply(&transform, source));
        transforms.push(transform);
    }
    Ok((aligned, transforms))
}
