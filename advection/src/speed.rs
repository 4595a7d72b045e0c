use crate::{AdvectionError, DisplacementEstimate};
use raster::C;
use std::{fmt, ops::Neg};

/// Which way a feature moved along a transect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From the transect start toward its end.
    Forward,

    /// From the transect end toward its start.
    Backward,

    Stationary,
}

impl Direction {
    pub fn from_lag(lag: C) -> Self {
        if lag > 0.0 {
            Self::Forward
        } else if lag < 0.0 {
            Self::Backward
        } else {
            Self::Stationary
        }
    }

    /// Returns +1, -1, or 0.
    pub fn signum(self) -> C {
        match self {
            Self::Forward => 1.0,
            Self::Backward => -1.0,
            Self::Stationary => 0.0,
        }
    }
}

impl Neg for Direction {
    type Output = Self;

    fn neg(self) -> Self {
        match self {
            Self::Forward => Self::Backward,
            Self::Backward => Self::Forward,
            Self::Stationary => Self::Stationary,
        }
    }
}

/// Physical advection speed along a transect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedResult {
    /// Distance units (of the raster pixel scale) per time unit (of
    /// `elapsed`). Never negative.
    pub speed: C,

    pub direction: Direction,

    /// Physical distance travelled between the two rasters.
    pub distance: C,

    /// Time between the two rasters.
    pub elapsed: C,

    /// Copied from the displacement estimate. A low-confidence speed
    /// must not be presented as reliable.
    pub confident: bool,
}

impl fmt::Display for SpeedResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let toward = match self.direction {
            Direction::Forward => "toward end",
            Direction::Backward => "toward start",
            Direction::Stationary => "stationary",
        };
        write!(f, "{:.2} ({toward})", self.speed)?;
        if !self.confident {
            write!(f, " [LOW CONFIDENCE]")?;
        }
        Ok(())
    }
}

/// Converts a lag in samples to a speed.
///
/// `speed = |lag| * spacing * pixel_scale / elapsed`, where `spacing`
/// is the sample spacing in pixels.
pub fn compute_speed(
    displacement: &DisplacementEstimate,
    pixel_scale: C,
    spacing: C,
    elapsed: C,
) -> Result<SpeedResult, AdvectionError> {
    if !(elapsed.is_finite() && elapsed > 0.0) {
        return Err(AdvectionError::InvalidTimeDelta(elapsed));
    }
    let distance = displacement.lag.abs() * spacing * pixel_scale;
    Ok(SpeedResult {
        speed: distance / elapsed,
        direction: Direction::from_lag(displacement.lag),
        distance,
        elapsed,
        confident: displacement.confident,
    })
}
