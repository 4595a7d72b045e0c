use geo::geometry::Coord;
use raster::{Raster, C};

/// Returns the bilinearly interpolated sample at `coord`.
///
/// Neighbours outside of the raster or holding missing (non-finite)
/// data are dropped and the remaining weights renormalized. Returns
/// NaN when no neighbour contributes.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn bilinear(raster: &Raster, Coord { x, y }: Coord<C>) -> C {
    let (x0, y0) = (x.floor(), y.floor());
    let (fx, fy) = (x - x0, y - y0);
    let (x0, y0) = (x0 as isize, y0 as isize);

    let neighbours = [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x0 + 1, y0, fx * (1.0 - fy)),
        (x0, y0 + 1, (1.0 - fx) * fy),
        (x0 + 1, y0 + 1, fx * fy),
    ];

    let (sum, weight) = neighbours
        .into_iter()
        .filter(|&(xi, yi, w)| w > 0.0 && xi >= 0 && yi >= 0)
        .filter_map(|(xi, yi, w)| {
            raster
                .get(xi as usize, yi as usize)
                .map(C::from)
                .filter(|sample| sample.is_finite())
                .map(|sample| (sample * w, w))
        })
        .fold((0.0, 0.0), |(sum, weight), (s, w)| (sum + s, weight + w));

    if weight > 0.0 {
        sum / weight
    } else {
        C::NAN
    }
}

#[cfg(test)]
mod tests {
    use super::bilinear;
    use approx::assert_relative_eq;
    use geo::coord;
    use raster::{GeoTransform, Raster};

    fn raster_2x2() -> Raster {
        Raster::from_vec(2, 2, vec![0.0, 10.0, 20.0, 30.0], GeoTransform::with_scale(1.0)).unwrap()
    }

    #[test]
    fn test_interior() {
        let raster = raster_2x2();
        assert_relative_eq!(bilinear(&raster, coord!(x: 0.5, y: 0.5)), 15.0);
        assert_relative_eq!(bilinear(&raster, coord!(x: 0.25, y: 0.0)), 2.5);
        assert_relative_eq!(bilinear(&raster, coord!(x: 1.0, y: 1.0)), 30.0);
    }

    #[test]
    fn test_edge_renormalizes() {
        let raster = raster_2x2();
        // Right-hand neighbours fall off the raster; only the last
        // column contributes.
        assert_relative_eq!(bilinear(&raster, coord!(x: 1.5, y: 0.0)), 10.0);
        assert_relative_eq!(bilinear(&raster, coord!(x: 1.5, y: 0.5)), 20.0);
    }

    #[test]
    fn test_missing_data() {
        let raster = Raster::from_vec(
            2,
            2,
            vec![f32::NAN, 10.0, 20.0, 30.0],
            GeoTransform::with_scale(1.0),
        )
        .unwrap();
        // (0,0) is missing; remaining weights are 1/4 each -> (10+20+30)/3.
        assert_relative_eq!(bilinear(&raster, coord!(x: 0.5, y: 0.5)), 20.0);
        assert!(bilinear(&raster, coord!(x: 0.0, y: 0.0)).is_nan());
    }
}
