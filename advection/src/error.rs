use transect::TransectError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdvectionError {
    #[error("missing or invalid parameter '{0}'")]
    InvalidParameter(&'static str),

    #[error("need at least {needed} samples, got {got}")]
    InsufficientSamples { needed: usize, got: usize },

    #[error("no lag in the search window has a usable correlation")]
    DegenerateSignal,

    #[error("elapsed time must be positive and finite, got {0}")]
    InvalidTimeDelta(f64),

    #[error("sample spacings differ: {0} vs {1}")]
    SpacingMismatch(f64, f64),

    #[error("raster (width, height, scale) {actual:?} does not match {expected:?}")]
    RasterMismatch {
        expected: (usize, usize, f64),
        actual: (usize, usize, f64),
    },

    #[error("{0}")]
    Transect(#[from] TransectError),
}

impl AdvectionError {
    pub(crate) fn raster_mismatch(expected: &raster::Raster, actual: &raster::Raster) -> Self {
        let shape = |r: &raster::Raster| (r.width(), r.height(), r.pixel_scale());
        Self::RasterMismatch {
            expected: shape(expected),
            actual: shape(actual),
        }
    }
}
