use crate::{
    displacement::{estimate, DisplacementEstimate},
    speed::{compute_speed, Direction, SpeedResult},
    AdvectionError,
};
use log::debug;
use raster::{Raster, C};
use transect::{sample, SampleSequence, Transect};

/// Advection of a feature along a transect between two rasters.
#[derive(Debug, Clone, PartialEq)]
pub struct Advection {
    pub transect: Transect,

    /// Profile along `transect` in the earlier raster.
    pub before: SampleSequence,

    /// Profile along `transect` in the later raster.
    pub after: SampleSequence,

    pub displacement: DisplacementEstimate,

    pub speed: SpeedResult,

    /// Compass heading of the motion in the raster's world frame,
    /// degrees clockwise from north. `None` when stationary.
    pub heading: Option<C>,
}

impl Advection {
    pub fn builder<'a>() -> AdvectionBuilder<'a> {
        AdvectionBuilder {
            before: None,
            after: None,
            transect: None,
            spacing: 1.0,
            max_lag: None,
            min_correlation: 0.5,
            elapsed: None,
        }
    }
}

pub struct AdvectionBuilder<'a> {
    /// Earlier raster (required).
    before: Option<&'a Raster>,

    /// Later raster (required).
    after: Option<&'a Raster>,

    /// Where to sample (required).
    transect: Option<Transect>,

    /// Sample spacing in pixels (defaults to 1).
    spacing: C,

    /// Correlation search half-width in samples (required).
    max_lag: Option<usize>,

    /// Correlation a confident estimate must exceed (defaults to 0.5).
    min_correlation: C,

    /// Time between the two rasters (required).
    elapsed: Option<C>,
}

impl<'a> AdvectionBuilder<'a> {
    /// Earlier raster (required).
    #[must_use]
    pub fn before(mut self, raster: &'a Raster) -> Self {
        self.before = Some(raster);
        self
    }

    /// Later raster (required).
    #[must_use]
    pub fn after(mut self, raster: &'a Raster) -> Self {
        self.after = Some(raster);
        self
    }

    /// Where to sample (required).
    #[must_use]
    pub fn transect(mut self, transect: Transect) -> Self {
        self.transect = Some(transect);
        self
    }

    /// Sample spacing in pixels (defaults to 1).
    #[must_use]
    pub fn spacing(mut self, pixels: C) -> Self {
        self.spacing = pixels;
        self
    }

    /// Correlation search half-width in samples (required).
    #[must_use]
    pub fn max_lag(mut self, samples: usize) -> Self {
        self.max_lag = Some(samples);
        self
    }

    /// Correlation a confident estimate must exceed (defaults to 0.5).
    #[must_use]
    pub fn min_correlation(mut self, ncc: C) -> Self {
        self.min_correlation = ncc;
        self
    }

    /// Time between the two rasters (required).
    #[must_use]
    pub fn elapsed(mut self, elapsed: C) -> Self {
        self.elapsed = Some(elapsed);
        self
    }

    pub fn build(&self) -> Result<Advection, AdvectionError> {
        let before = self.before.ok_or(AdvectionError::InvalidParameter("before"))?;
        let after = self.after.ok_or(AdvectionError::InvalidParameter("after"))?;
        let transect = self
            .transect
            .ok_or(AdvectionError::InvalidParameter("transect"))?;
        let max_lag = self.max_lag.ok_or(AdvectionError::InvalidParameter("max_lag"))?;
        let elapsed = self.elapsed.ok_or(AdvectionError::InvalidParameter("elapsed"))?;

        if !before.is_co_registered(after) {
            return Err(AdvectionError::raster_mismatch(before, after));
        }

        let now = std::time::Instant::now();
        let before_seq = sample(before, &transect, self.spacing)?;
        let after_seq = sample(after, &transect, self.spacing)?;
        let displacement = estimate(&before_seq, &after_seq, max_lag, self.min_correlation)?;
        let speed = compute_speed(&displacement, before.pixel_scale(), self.spacing, elapsed)?;
        let heading = match speed.direction {
            Direction::Stationary => None,
            direction => Some(before.geo().heading(transect.delta() * direction.signum())),
        };

        debug!(
            "advection; samples: {}, lag: {:.3}, speed: {}, exec: {:?}",
            before_seq.len(),
            displacement.lag,
            speed,
            now.elapsed()
        );

        Ok(Advection {
            transect,
            before: before_seq,
            after: after_seq,
            displacement,
            speed,
            heading,
        })
    }
}
