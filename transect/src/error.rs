use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransectError {
    #[error("transect length {0} px is below one pixel")]
    DegenerateTransect(f64),

    #[error("point ({x}, {y}) lies outside {width}x{height} raster")]
    OutOfBounds {
        x: f64,
        y: f64,
        width: usize,
        height: usize,
    },

    #[error("sample spacing must be positive and finite, got {0}")]
    InvalidSpacing(f64),
}
