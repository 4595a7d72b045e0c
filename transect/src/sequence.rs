use crate::{
    math::{bilinear, linspace},
    Transect, TransectError,
};
use geo::geometry::Coord;
use log::debug;
use raster::{Raster, C};

/// Endpoint coordinates this far below zero are snapped onto the
/// raster instead of being rejected.
pub const CLAMP_EPSILON: C = 1e-6;

/// Most samples a single transect may produce.
pub const MAX_SAMPLES: usize = 1 << 24;

/// Raster intensity sampled at fixed arc-length steps along a
/// [Transect].
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSequence {
    /// Arc-length distance between consecutive samples, in pixels.
    pub spacing: C,

    /// Arc-length distance of each sample from the transect start.
    pub distances: Vec<C>,

    /// Pixel location of each sample.
    pub points: Vec<Coord<C>>,

    /// Interpolated intensity at each sample. NaN where the raster
    /// has no data.
    pub values: Vec<C>,
}

impl SampleSequence {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns an iterator of `(distance, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (C, C)> + '_ {
        self.distances
            .iter()
            .copied()
            .zip(self.values.iter().copied())
    }
}

/// Samples `raster` every `spacing` pixels along `transect`.
///
/// Produces `floor(length / spacing) + 1` samples starting exactly at
/// the transect start. Sampling is a pure function of its inputs.
///
/// A spacing so fine that more than [MAX_SAMPLES] would be produced
/// fails with `InvalidSpacing`.
pub fn sample(
    raster: &Raster,
    transect: &Transect,
    spacing: C,
) -> Result<SampleSequence, TransectError> {
    if !(spacing.is_finite() && spacing > 0.0) {
        return Err(TransectError::InvalidSpacing(spacing));
    }

    let start = clamp_to_raster(raster, transect.start())?;
    let end = clamp_to_raster(raster, transect.end())?;
    let delta = end - start;
    let length = delta.x.hypot(delta.y);
    // Clamping moves endpoints by less than a pixel, so `length` stays
    // positive.
    let direction = delta / length;

    let steps = (length / spacing).floor();
    #[allow(clippy::cast_precision_loss)]
    let limit = MAX_SAMPLES as C;
    if !(steps < limit) {
        return Err(TransectError::InvalidSpacing(spacing));
    }

    let now = std::time::Instant::now();

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let n = steps as usize + 1;
    #[allow(clippy::cast_precision_loss)]
    let last = (n - 1) as C * spacing;

    let distances: Vec<C> = linspace(0.0, last, n).collect();
    let points: Vec<Coord<C>> = distances
        .iter()
        .map(|&d| start + direction * d)
        .collect();
    let values: Vec<C> = points.iter().map(|&p| bilinear(raster, p)).collect();

    debug!(
        "sample; len: {}, spacing: {spacing}, exec: {:?}",
        values.len(),
        now.elapsed()
    );

    Ok(SampleSequence {
        spacing,
        distances,
        points,
        values,
    })
}

/// Returns `coord` snapped onto the raster, or `OutOfBounds` if it
/// lies outside of `[0, width) x [0, height)`.
#[allow(clippy::cast_precision_loss)]
fn clamp_to_raster(raster: &Raster, coord: Coord<C>) -> Result<Coord<C>, TransectError> {
    let (width, height) = raster.dimensions();
    let clamp = |v: C, limit: usize| {
        let v = if (-CLAMP_EPSILON..0.0).contains(&v) {
            0.0
        } else {
            v
        };
        (v >= 0.0 && v < limit as C).then_some(v)
    };
    match (clamp(coord.x, width), clamp(coord.y, height)) {
        (Some(x), Some(y)) => Ok(Coord { x, y }),
        _ => Err(TransectError::OutOfBounds {
            x: coord.x,
            y: coord.y,
            width,
            height,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{sample, Transect, TransectError};
    use approx::assert_relative_eq;
    use geo::coord;
    use raster::{GeoTransform, Raster};

    fn ramp(width: usize, height: usize) -> Raster {
        Raster::from_fn(width, height, GeoTransform::with_scale(1.0), |x, y| {
            (x + 1000 * y) as f32
        })
        .unwrap()
    }

    #[test]
    fn test_sample_count_and_values() {
        let raster = ramp(100, 100);
        let transect = Transect::new(coord!(x: 10.0, y: 50.0), coord!(x: 90.0, y: 50.0)).unwrap();
        let seq = sample(&raster, &transect, 1.0).unwrap();
        assert_eq!(seq.len(), 81);
        assert_relative_eq!(seq.values[0], 50_010.0);
        assert_relative_eq!(seq.values[80], 50_090.0);
        assert_relative_eq!(seq.distances[80], 80.0);
        assert_eq!(seq.points[3], coord!(x: 13.0, y: 50.0));
    }

    #[test]
    fn test_fractional_spacing() {
        let raster = ramp(100, 100);
        let transect = Transect::new(coord!(x: 0.0, y: 0.0), coord!(x: 10.0, y: 0.0)).unwrap();
        let seq = sample(&raster, &transect, 3.0).unwrap();
        // floor(10 / 3) + 1; the last sample stops short of the end.
        assert_eq!(seq.len(), 4);
        assert_relative_eq!(seq.distances[3], 9.0);
        assert_relative_eq!(seq.values[3], 9.0);

        let fine = sample(&raster, &transect, 0.5).unwrap();
        assert_eq!(fine.len(), 21);
        assert_relative_eq!(fine.values[1], 0.5);
    }

    #[test]
    fn test_sample_is_idempotent() {
        let raster = ramp(64, 48);
        let transect = Transect::new(coord!(x: 3.3, y: 7.9), coord!(x: 60.1, y: 40.2)).unwrap();
        let a = sample(&raster, &transect, 0.75).unwrap();
        let b = sample(&raster, &transect, 0.75).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_full_diagonal_is_in_bounds() {
        let raster = ramp(100, 80);
        let transect = Transect::new(coord!(x: 0.0, y: 0.0), coord!(x: 99.0, y: 79.0)).unwrap();
        let seq = sample(&raster, &transect, 1.0).unwrap();
        assert!(seq.values.iter().all(|v| v.is_finite()));
        assert_relative_eq!(seq.values[0], 0.0);
    }

    #[test]
    fn test_tiny_negative_is_clamped() {
        let raster = ramp(10, 10);
        let transect = Transect::new(coord!(x: -1e-9, y: 2.0), coord!(x: 9.0, y: 2.0)).unwrap();
        let seq = sample(&raster, &transect, 1.0).unwrap();
        assert_eq!(seq.points[0], coord!(x: 0.0, y: 2.0));
    }

    #[test]
    fn test_out_of_bounds() {
        let raster = ramp(100, 100);
        for (start, end) in [
            (coord!(x: 0.0, y: 0.0), coord!(x: 100.0, y: 50.0)),
            (coord!(x: 0.0, y: 0.0), coord!(x: 50.0, y: 100.0)),
            (coord!(x: -0.5, y: 0.0), coord!(x: 50.0, y: 50.0)),
        ] {
            let transect = Transect::new(start, end).unwrap();
            assert!(matches!(
                sample(&raster, &transect, 1.0),
                Err(TransectError::OutOfBounds { .. })
            ));
        }
    }

    #[test]
    fn test_invalid_spacing() {
        let raster = ramp(10, 10);
        let transect = Transect::new(coord!(x: 0.0, y: 0.0), coord!(x: 5.0, y: 5.0)).unwrap();
        for spacing in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                sample(&raster, &transect, spacing),
                Err(TransectError::InvalidSpacing(_))
            ));
        }
    }

    #[test]
    fn test_spacing_too_fine() {
        let raster = ramp(10, 10);
        let transect = Transect::new(coord!(x: 0.0, y: 0.0), coord!(x: 9.0, y: 0.0)).unwrap();
        for spacing in [1e-320, 1e-9] {
            assert_eq!(
                sample(&raster, &transect, spacing),
                Err(TransectError::InvalidSpacing(spacing))
            );
        }
        let fine = 1.0 / 1024.0;
        assert_eq!(sample(&raster, &transect, fine).unwrap().len(), 9 * 1024 + 1);
    }
}
