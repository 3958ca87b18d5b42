use std::path::Path;

use image::{ImageBuffer, ImageFormat, Luma};
use ndarray::Array2;
use tracing::debug;

use crate::error::{ensure_same_dim, RegistrationError, Result};

/// Load any supported image as grayscale intensities in `[0, 1]`.
pub fn load_image(path: &Path) -> Result<Array2<f32>> {
    let gray = image::open(path)?.to_luma16();
    let (w, h) = gray.dimensions();
    let data = Array2::from_shape_fn((h as usize, w as usize), |(row, col)| {
        gray.get_pixel(col as u32, row as u32).0[0] as f32 / 65535.0
    });
    debug!(path = %path.display(), width = w, height = h, "loaded image");
    Ok(data)
}

/// Load an ordered stack of slices; every slice must match the first in size.
pub fn load_stack<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Array2<f32>>> {
    if paths.is_empty() {
        return Err(RegistrationError::EmptyStack);
    }
    let mut images: Vec<Array2<f32>> = Vec::with_capacity(paths.len());
    for path in paths {
        let image = load_image(path.as_ref())?;
        if let Some(first) = images.first() {
            ensure_same_dim(first.dim(), image.dim())?;
        }
        images.push(image);
    }
    Ok(images)
}

/// Save as 16-bit grayscale TIFF.
pub fn save_tiff(data: &Array2<f32>, path: &Path) -> Result<()> {
    let (h, w) = data.dim();
    let img: ImageBuffer<Luma<u16>, Vec<u16>> =
        ImageBuffer::from_fn(w as u32, h as u32, |col, row| {
            Luma([(data[[row as usize, col as usize]].clamp(0.0, 1.0) * 65535.0) as u16])
        });
    img.save_with_format(path, ImageFormat::Tiff)?;
    Ok(())
}

/// Save as 8-bit grayscale PNG.
pub fn save_png(data: &Array2<f32>, path: &Path) -> Result<()> {
    let (h, w) = data.dim();
    let img: ImageBuffer<Luma<u8>, Vec<u8>> =
        ImageBuffer::from_fn(w as u32, h as u32, |col, row| {
            Luma([(data[[row as usize, col as usize]].clamp(0.0, 1.0) * 255.0) as u8])
        });
    img.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Save, choosing the format from the file extension (TIFF by default).
pub fn save_image(data: &Array2<f32>, path: &Path) -> Result<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("png") => save_png(data, path),
        _ => save_tiff(data, path),
    }
}
