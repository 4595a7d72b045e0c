use crate::TransectError;
use geo::{
    algorithm::EuclideanLength,
    geometry::{Coord, Line},
};
use raster::C;

/// A straight line drawn across a raster, in pixel coordinates.
///
/// The order of the endpoints is meaningful: positive displacement
/// along a transect runs from `start` toward `end`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transect {
    line: Line<C>,
}

impl Transect {
    /// Shortest accepted transect, in pixels.
    pub const MIN_LENGTH: C = 1.0;

    pub fn new(start: Coord<C>, end: Coord<C>) -> Result<Self, TransectError> {
        let line = Line::new(start, end);
        let length = line.euclidean_length();
        // Written so NaN endpoints are rejected too.
        if !(length >= Self::MIN_LENGTH) {
            return Err(TransectError::DegenerateTransect(length));
        }
        Ok(Self { line })
    }

    pub fn start(&self) -> Coord<C> {
        self.line.start
    }

    pub fn end(&self) -> Coord<C> {
        self.line.end
    }

    /// Returns `end - start`.
    pub fn delta(&self) -> Coord<C> {
        self.line.delta()
    }

    /// Length in pixels.
    pub fn length(&self) -> C {
        self.line.euclidean_length()
    }

    /// Returns this transect with its endpoints swapped.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            line: Line::new(self.line.end, self.line.start),
        }
    }

    pub fn line(&self) -> Line<C> {
        self.line
    }
}
