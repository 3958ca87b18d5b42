//! Propagates pairwise registrations across an ordered stack.
//!
//! In relative mode each image is registered to its already aligned
//! neighbour one step closer to the reference. Errors accumulate along the
//! chain; there is no global correction. In absolute mode every image is
//! registered to the reference directly, and the pairs are independent.

use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::Array2;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::align::registrar::{RegistrationResult, Registrar};
use crate::align::transform::{apply, Transform};
use crate::config::{PyramidConfig, PyramidSchedule};
use crate::consts::PARALLEL_FRAME_THRESHOLD;
use crate::error::{ensure_same_dim, RegistrationError, Result};

/// Register image `source` against the (aligned) image at `target`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegistrationStep {
    pub source: usize,
    pub target: usize,
}

/// Order in which a stack of `len` images is registered around `reference`.
///
/// Indices below the reference are visited from `reference - 1` down to 0,
/// then indices above from `reference + 1` up to the end. In relative mode
/// the target is the neighbour one step closer to the reference.
pub fn registration_plan(
    len: usize,
    reference: usize,
    relative: bool,
) -> Result<Vec<RegistrationStep>> {
    if len == 0 {
        return Err(RegistrationError::EmptyStack);
    }
    if reference >= len {
        return Err(RegistrationError::ReferenceOutOfRange {
            index: reference,
            len,
        });
    }

    let below = (0..reference).rev().map(|i| RegistrationStep {
        source: i,
        target: if relative { i + 1 } else { reference },
    });
    let above = (reference + 1..len).map(|i| RegistrationStep {
        source: i,
        target: if relative { i - 1 } else { reference },
    });
    Ok(below.chain(above).collect())
}

#[derive(Clone, Debug)]
pub struct AlignedStack {
    /// Same length and order as the input; the reference is passed through.
    pub images: Vec<Array2<f32>>,
    /// `None` at the reference index.
    pub results: Vec<Option<RegistrationResult>>,
}

impl AlignedStack {
    /// Per-image transform into the reference frame (identity at the reference).
    pub fn transforms(&self) -> Vec<Transform> {
        self.results
            .iter()
            .map(|r| r.as_ref().map(|r| r.transform).unwrap_or_default())
            .collect()
    }
}

pub fn align_stack(
    images: &[Array2<f32>],
    reference: usize,
    relative: bool,
    registrar: &dyn Registrar,
    pyramid: &PyramidConfig,
) -> Result<AlignedStack> {
    align_stack_with_progress(images, reference, relative, registrar, pyramid, |_| {})
}

/// Align a stack, calling `on_image_done(done)` after each registered image.
pub fn align_stack_with_progress<F>(
    images: &[Array2<f32>],
    reference: usize,
    relative: bool,
    registrar: &dyn Registrar,
    pyramid: &PyramidConfig,
    on_image_done: F,
) -> Result<AlignedStack>
where
    F: Fn(usize) + Send + Sync,
{
    let plan = registration_plan(images.len(), reference, relative)?;
    let dim = images[reference].dim();
    for image in images {
        ensure_same_dim(dim, image.dim())?;
    }

    // One schedule for the whole stack, from the reference size.
    let schedule = pyramid.schedule_for(dim)?;
    info!(
        images = images.len(),
        reference,
        relative,
        method = registrar.name(),
        depth = schedule.depth,
        min_level = schedule.min_level,
        "registering stack"
    );

    let mut aligned = images.to_vec();
    let mut results: Vec<Option<RegistrationResult>> = vec![None; images.len()];
    let counter = AtomicUsize::new(0);
    let report = || on_image_done(counter.fetch_add(1, Ordering::Relaxed) + 1);

    if relative || plan.len() + 1 < PARALLEL_FRAME_THRESHOLD {
        for step in &plan {
            let (image, result) =
                register_step(images, &aligned, *step, registrar, &schedule)?;
            aligned[step.source] = image;
            results[step.source] = Some(result);
            report();
        }
    } else {
        let outputs: Vec<Result<(usize, Array2<f32>, RegistrationResult)>> = plan
            .par_iter()
            .map(|step| {
                let (image, result) =
                    register_step(images, images, *step, registrar, &schedule)?;
                report();
                Ok((step.source, image, result))
            })
            .collect();
        for output in outputs {
            let (index, image, result) = output?;
            aligned[index] = image;
            results[index] = Some(result);
        }
    }

    Ok(AlignedStack {
        images: aligned,
        results,
    })
}

fn register_step(
    originals: &[Array2<f32>],
    aligned: &[Array2<f32>],
    step: RegistrationStep,
    registrar: &dyn Registrar,
    schedule: &PyramidSchedule,
) -> Result<(Array2<f32>, RegistrationResult)> {
    info!("{} to {}", step.source, step.target);
    let source = &originals[step.source];
    let result = registrar.register(source, &aligned[step.target], schedule)?;
    if result.status.is_degenerate() {
        warn!(
            source = step.source,
            target = step.target,
            "degenerate registration; image may be blank"
        );
    }
    Ok((apply(&result.transform, source), result))
}
