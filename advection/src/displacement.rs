use crate::AdvectionError;
use log::debug;
use raster::C;
use transect::SampleSequence;

/// Scores closer than this are considered tied.
pub const TIE_TOLERANCE: C = 1e-9;

/// Overlaps whose spread is below this fraction of their mean are
/// treated as flat.
const FLAT_TOLERANCE: C = 1e-10;

/// Best alignment between two sample sequences.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplacementEstimate {
    /// Shift, in samples, that moves `before` onto `after`. Positive
    /// when the feature moved toward the transect end.
    pub lag: C,

    /// Normalized cross-correlation at the best integer lag.
    pub correlation: C,

    /// Correlation exceeded the threshold and the peak was interior
    /// to the search window.
    pub confident: bool,
}

/// Estimates the lag between `before` and `after` by normalized
/// cross-correlation over lags `-max_lag..=max_lag`.
///
/// The best integer lag is refined by fitting a parabola through its
/// neighbours. Ties prefer the smallest absolute lag, then the
/// positive one. A peak on the edge of the window is reported
/// unrefined and not confident.
pub fn estimate(
    before: &SampleSequence,
    after: &SampleSequence,
    max_lag: usize,
    min_correlation: C,
) -> Result<DisplacementEstimate, AdvectionError> {
    if max_lag == 0 {
        return Err(AdvectionError::InvalidParameter("max_lag"));
    }
    if (before.spacing - after.spacing).abs() > 1e-9 * before.spacing.max(after.spacing) {
        return Err(AdvectionError::SpacingMismatch(before.spacing, after.spacing));
    }
    let got = before.len().min(after.len());
    let needed = max_lag
        .checked_mul(2)
        .and_then(|n| n.checked_add(1))
        .unwrap_or(usize::MAX);
    if got < needed {
        return Err(AdvectionError::InsufficientSamples { needed, got });
    }

    #[allow(clippy::cast_possible_wrap)]
    let max_lag = max_lag as isize;
    let scores: Vec<Option<C>> = (-max_lag..=max_lag)
        .map(|lag| ncc(&before.values, &after.values, lag))
        .collect();
    #[allow(clippy::cast_sign_loss)]
    let score = |lag: isize| scores[(lag + max_lag) as usize];

    // Visit lags by increasing magnitude so that only a strictly
    // better score displaces an earlier, smaller lag.
    let (peak_lag, correlation) = std::iter::once(0)
        .chain((1..=max_lag).flat_map(|k| [k, -k]))
        .filter_map(|lag| score(lag).map(|s| (lag, s)))
        .fold(None, |best: Option<(isize, C)>, (lag, s)| match best {
            Some((_, best_score)) if s <= best_score + TIE_TOLERANCE => best,
            _ => Some((lag, s)),
        })
        .ok_or(AdvectionError::DegenerateSignal)?;

    let interior = peak_lag.abs() < max_lag;
    let neighbours = if interior {
        score(peak_lag - 1).zip(score(peak_lag + 1))
    } else {
        None
    };

    #[allow(clippy::cast_precision_loss)]
    let (lag, confident) = match neighbours {
        Some((left, right)) => (
            peak_lag as C + parabolic_offset(left, correlation, right),
            correlation > min_correlation,
        ),
        None => (peak_lag as C, false),
    };

    debug!("estimate; peak: {peak_lag}, lag: {lag}, ncc: {correlation}, confident: {confident}");

    Ok(DisplacementEstimate {
        lag,
        correlation,
        confident,
    })
}

/// Returns the vertex offset, in `[-0.5, 0.5]`, of the parabola through
/// three equally spaced scores.
fn parabolic_offset(left: C, center: C, right: C) -> C {
    let denom = left - 2.0 * center + right;
    if denom < 0.0 {
        (0.5 * (left - right) / denom).clamp(-0.5, 0.5)
    } else {
        0.0
    }
}

/// Normalized cross-correlation of `before[i]` against `after[i + lag]`
/// over their overlap.
///
/// Pairs with missing data are ignored. Returns `None` when fewer than
/// two pairs remain or either side is flat.
fn ncc(before: &[C], after: &[C], lag: isize) -> Option<C> {
    let shift = lag.unsigned_abs();
    let (before, after) = if lag >= 0 {
        (before, after.get(shift..)?)
    } else {
        (before.get(shift..)?, after)
    };

    let pairs = || {
        before
            .iter()
            .zip(after.iter())
            .map(|(&b, &a)| (b, a))
            .filter(|(b, a)| b.is_finite() && a.is_finite())
    };

    let (n, sum_b, sum_a) = pairs().fold((0_usize, 0.0, 0.0), |(n, sb, sa): (usize, C, C), (b, a)| {
        (n + 1, sb + b, sa + a)
    });
    if n < 2 {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let len = n as C;
    let (mean_b, mean_a) = (sum_b / len, sum_a / len);

    let (cov, var_b, var_a) = pairs().fold((0.0, 0.0, 0.0), |(c, vb, va): (C, C, C), (b, a)| {
        let (db, da) = (b - mean_b, a - mean_a);
        (c + db * da, vb + db * db, va + da * da)
    });

    let is_flat = |var: C, mean: C| var <= len * (FLAT_TOLERANCE * mean).powi(2);
    if is_flat(var_b, mean_b) || is_flat(var_a, mean_a) {
        return None;
    }

    Some((cov / (var_b.sqrt() * var_a.sqrt())).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::{estimate, ncc, parabolic_offset, AdvectionError, SampleSequence, C};
    use approx::assert_relative_eq;
    use geo::coord;

    fn seq(values: Vec<C>) -> SampleSequence {
        seq_with_spacing(values, 1.0)
    }

    #[allow(clippy::cast_precision_loss)]
    fn seq_with_spacing(values: Vec<C>, spacing: C) -> SampleSequence {
        let distances = (0..values.len()).map(|i| i as C * spacing).collect();
        let points = (0..values.len())
            .map(|i| coord!(x: i as C * spacing, y: 0.0))
            .collect();
        SampleSequence {
            spacing,
            distances,
            points,
            values,
        }
    }

    /// A fog edge: low BTD on one side, high on the other.
    #[allow(clippy::cast_precision_loss)]
    fn edge(len: usize, center: C) -> Vec<C> {
        (0..len)
            .map(|i| 4.0 * ((i as C - center) / 4.0).tanh())
            .collect()
    }

    #[allow(clippy::cast_precision_loss)]
    fn bump(len: usize, center: C) -> Vec<C> {
        (0..len)
            .map(|i| (-(i as C - center).powi(2) / 32.0).exp())
            .collect()
    }

    #[test]
    fn test_zero_displacement() {
        let before = seq(edge(81, 40.0));
        let est = estimate(&before, &before.clone(), 5, 0.5).unwrap();
        assert_relative_eq!(est.lag, 0.0, epsilon = 1e-9);
        assert_relative_eq!(est.correlation, 1.0, epsilon = 1e-12);
        assert!(est.confident);
    }

    #[test]
    fn test_integer_shift() {
        let est = estimate(&seq(edge(81, 35.0)), &seq(edge(81, 38.0)), 5, 0.5).unwrap();
        assert_relative_eq!(est.lag, 3.0, epsilon = 0.1);
        assert!(est.correlation > 0.999);
        assert!(est.confident);

        let back = estimate(&seq(edge(81, 38.0)), &seq(edge(81, 35.0)), 5, 0.5).unwrap();
        assert_relative_eq!(back.lag, -3.0, epsilon = 0.1);
    }

    #[test]
    fn test_subsample_shift() {
        let est = estimate(&seq(bump(81, 38.0)), &seq(bump(81, 40.5)), 5, 0.5).unwrap();
        assert_relative_eq!(est.lag, 2.5, epsilon = 0.2);
        assert!(est.confident);
    }

    #[test]
    fn test_edge_peak_is_not_confident() {
        let est = estimate(&seq(edge(81, 35.0)), &seq(edge(81, 40.0)), 5, 0.5).unwrap();
        assert_eq!(est.lag, 5.0);
        assert!(est.correlation > 0.999);
        assert!(!est.confident);
    }

    #[test]
    fn test_threshold_is_strict() {
        let before = seq(edge(81, 40.0));
        let est = estimate(&before, &before.clone(), 5, 1.0).unwrap();
        assert!(!est.confident);
    }

    #[test]
    fn test_tie_prefers_smallest_lag() {
        // Period-2 signal correlates perfectly at every even lag.
        let alternating: Vec<C> = (0..21).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let est = estimate(&seq(alternating.clone()), &seq(alternating), 3, 0.5).unwrap();
        assert_eq!(est.lag, 0.0);
        assert!(est.confident);
    }

    #[test]
    fn test_tie_between_signs_prefers_positive() {
        // Period-4 signal inverted: lags +2 and -2 align equally well.
        let pattern = [1.0, 0.0, -1.0, 0.0];
        let before: Vec<C> = (0..21).map(|i| pattern[i % 4]).collect();
        let after: Vec<C> = before.iter().map(|v| -v).collect();
        let est = estimate(&seq(before), &seq(after), 3, 0.5).unwrap();
        assert_relative_eq!(est.lag, 2.0, epsilon = 0.01);
        assert!(est.confident);
    }

    #[test]
    fn test_degenerate_signal() {
        let flat = seq(vec![0.0; 41]);
        assert_eq!(
            estimate(&flat, &flat.clone(), 5, 0.5),
            Err(AdvectionError::DegenerateSignal)
        );

        let level = seq(vec![0.1; 41]);
        assert_eq!(
            estimate(&level, &seq(edge(41, 20.0)), 5, 0.5),
            Err(AdvectionError::DegenerateSignal)
        );
    }

    #[test]
    fn test_insufficient_samples() {
        assert_eq!(
            estimate(&seq(edge(10, 5.0)), &seq(edge(10, 5.0)), 5, 0.5),
            Err(AdvectionError::InsufficientSamples { needed: 11, got: 10 })
        );
        assert!(estimate(&seq(edge(11, 5.0)), &seq(edge(11, 5.0)), 5, 0.5).is_ok());

        let huge = usize::MAX / 2 + 1;
        assert_eq!(
            estimate(&seq(edge(11, 5.0)), &seq(edge(11, 5.0)), huge, 0.5),
            Err(AdvectionError::InsufficientSamples {
                needed: usize::MAX,
                got: 11
            })
        );
    }

    #[test]
    fn test_invalid_inputs() {
        let a = seq(edge(41, 20.0));
        assert_eq!(
            estimate(&a, &a.clone(), 0, 0.5),
            Err(AdvectionError::InvalidParameter("max_lag"))
        );
        let b = seq_with_spacing(edge(41, 20.0), 0.5);
        assert_eq!(
            estimate(&a, &b, 5, 0.5),
            Err(AdvectionError::SpacingMismatch(1.0, 0.5))
        );
    }

    #[test]
    fn test_missing_samples_are_skipped() {
        let before = edge(81, 35.0);
        let mut after = edge(81, 38.0);
        after[10] = C::NAN;
        after[70] = C::NAN;
        let est = estimate(&seq(before), &seq(after), 5, 0.5).unwrap();
        assert_relative_eq!(est.lag, 3.0, epsilon = 0.1);
        assert!(est.confident);
    }

    #[test]
    fn test_ncc_overlap() {
        let values = [1.0, 2.0, 4.0, 8.0];
        assert_relative_eq!(ncc(&values, &values, 0).unwrap(), 1.0, epsilon = 1e-12);
        // Two pairs remain after shifting by two.
        assert!(ncc(&values, &values, 2).is_some());
        assert!(ncc(&values, &values, 3).is_none());
        assert!(ncc(&values, &values, -4).is_none());
    }

    #[test]
    fn test_parabolic_offset() {
        assert_relative_eq!(parabolic_offset(0.5, 1.0, 0.5), 0.0);
        assert!(parabolic_offset(0.9, 1.0, 0.5) < 0.0);
        assert!(parabolic_offset(0.5, 1.0, 0.9) > 0.0);
        assert_relative_eq!(parabolic_offset(1.0, 1.0, 1.0), 0.0);
    }
}
