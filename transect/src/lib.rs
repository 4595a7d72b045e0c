mod error;
mod math;
mod sequence;
mod transect;

pub use crate::{
    error::TransectError,
    sequence::{sample, SampleSequence, CLAMP_EPSILON, MAX_SAMPLES},
    transect::Transect,
};
pub use {geo, raster};
