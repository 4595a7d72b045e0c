use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RasterError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("raster dimensions {0}x{1} do not match {2}x{3}")]
    Dimensions(usize, usize, usize, usize),

    #[error("expected {expected} samples, got {actual}")]
    SampleCount { expected: usize, actual: usize },

    #[error("invalid raster file len {0} for width {1}: {2}")]
    Len(u64, usize, PathBuf),

    #[error("raster must have non-zero width and height")]
    Empty,

    #[error("pixel scale must be positive and finite, got {0}")]
    PixelScale(f64),
}
