//! Error types shared by every stage of the correction pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Reflection-correction error types
///
/// Every variant is fatal to the current invocation.
#[derive(Debug, Error)]
pub enum ReflFixError {
    #[error("Input not found: {0}")]
    InputNotFound(PathBuf),

    #[error("Geometry mismatch: {0}")]
    GeometryMismatch(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReflFixError>;

impl From<tiff::TiffError> for ReflFixError {
    fn from(err: tiff::TiffError) -> Self {
        match err {
            tiff::TiffError::IoError(e) => ReflFixError::IoError(e),
            other => ReflFixError::UnsupportedFormat(other.to_string()),
        }
    }
}

impl From<image::ImageError> for ReflFixError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(e) => ReflFixError::IoError(e),
            other => ReflFixError::UnsupportedFormat(other.to_string()),
        }
    }
}
