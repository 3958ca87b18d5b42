use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image format error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Image size mismatch: expected {}x{}, got {}x{}", expected.1, expected.0, actual.1, actual.0)]
    DimensionMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Invalid pyramid depth {depth} (must be at least 1)")]
    InvalidPyramidDepth { depth: usize },

    #[error("Minimum level {min_level} exceeds pyramid depth {depth}")]
    InvalidMinLevel { min_level: usize, depth: usize },

    #[error("Invalid downscale factor {0} (must be at least 2)")]
    InvalidDownscale(usize),

    #[error("Empty image stack")]
    EmptyStack,

    #[error("Reference index {index} out of range (stack length: {len})")]
    ReferenceOutOfRange { index: usize, len: usize },

    #[error("Unknown registration method: {0}")]
    UnknownMethod(String),

    #[error("Invalid crop window: {0}")]
    InvalidCrop(String),
}

pub type Result<T> = std::result::Result<T, RegistrationError>;

/// Reject a pair of arrays whose shapes differ.
pub(crate) fn ensure_same_dim(
    expected: (usize, usize),
    actual: (usize, usize),
) -> Result<()> {
    if expected != actual {
        return Err(RegistrationError::DimensionMismatch { expected, actual });
    }
    Ok(())
}
