//! Order statistics over column values.

/// Sorted copy of the non-`NaN` values.
pub fn sorted_finite<'a>(values: impl IntoIterator<Item = &'a f64>) -> Vec<f64> {
    let mut out: Vec<f64> = values.into_iter().copied().filter(|v| !v.is_nan()).collect();
    out.sort_by(f64::total_cmp);
    out
}

/// Percentile `q` in `[0, 100]` of sorted values, linearly interpolated
/// between the two closest ranks. `None` for an empty slice.
pub fn percentile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Median of the non-`NaN` values.
pub fn nan_median<'a>(values: impl IntoIterator<Item = &'a f64>) -> Option<f64> {
    percentile_sorted(&sorted_finite(values), 50.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(nan_median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(nan_median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
    }

    #[test]
    fn test_median_skips_nan() {
        assert_eq!(nan_median(&[f64::NAN, 5.0, 1.0]), Some(3.0));
        assert_eq!(nan_median(&[f64::NAN]), None);
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile_sorted(&sorted, 25.0), Some(2.0));
        assert_eq!(percentile_sorted(&sorted, 75.0), Some(4.0));
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile_sorted(&sorted, 25.0), Some(1.75));
    }
}
