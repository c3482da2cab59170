//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Map a value from one range into another.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where
    T: Float,
{
    target_range.0
        + ((value - source_range.0) * (target_range.1 - target_range.0)
            / (source_range.1 - source_range.0))
}

/// Clamp a value into `[min, max]`.
pub fn clamp<T>(value: &T, min: &T, max: &T) -> T
where
    T: Float,
{
    let mut ret = *value;

    if ret > *max {
        ret = *max
    }
    if ret < *min {
        ret = *min
    }

    ret
}

/// Centred moving average with the given window.
///
/// Near the ends of the series the window shrinks to the samples available, so the output has the
/// same length as the input.
pub fn moving_average<T>(values: &[T], window: usize) -> Vec<T>
where
    T: Float,
{
    if window <= 1 || values.len() < 2 {
        return values.to_vec();
    }

    let half = window / 2;

    (0..values.len())
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(values.len());
            let sum = values[lo..hi].iter().fold(T::zero(), |acc, v| acc + *v);

            // Window length is never zero here
            sum / T::from(hi - lo).unwrap_or_else(T::one)
        })
        .collect()
}

/// Finite difference derivative of `values` with respect to `times`.
///
/// Interior points use central differences, the end points one-sided differences. Returns an
/// empty vector if the inputs have different lengths or fewer than two points.
pub fn gradient<T>(values: &[T], times: &[T]) -> Vec<T>
where
    T: Float,
{
    let n = values.len();

    if n != times.len() || n < 2 {
        return Vec::new();
    }

    let diff = |a: usize, b: usize| {
        let dt = times[b] - times[a];
        if dt > T::zero() {
            (values[b] - values[a]) / dt
        } else {
            T::zero()
        }
    };

    (0..n)
        .map(|i| match i {
            0 => diff(0, 1),
            i if i == n - 1 => diff(n - 2, n - 1),
            i => diff(i - 1, i + 1),
        })
        .collect()
}

/// Linearly interpolated percentile of a set of values, with `pct` in `[0, 100]`.
///
/// Returns `None` for an empty set.
pub fn percentile<T>(values: &[T], pct: T) -> Option<T>
where
    T: Float,
{
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let hundred = T::from(100.0)?;
    let rank = clamp(&pct, &T::zero(), &hundred) / hundred * T::from(sorted.len() - 1)?;
    let lo = rank.floor().to_usize()?;
    let hi = rank.ceil().to_usize()?;
    let frac = rank - rank.floor();

    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Arithmetic mean, `None` for an empty set.
pub fn mean<T>(values: &[T]) -> Option<T>
where
    T: Float,
{
    if values.is_empty() {
        return None;
    }

    let sum = values.iter().fold(T::zero(), |acc, v| acc + *v);
    Some(sum / T::from(values.len())?)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_lin_map() {
        assert_eq!(lin_map((0.0, 10.0), (0.0, 100.0), 2.5), 25.0);
        assert_eq!(lin_map((0.0, 20_000.0), (0.0, 4096.0), 1500.0), 307.2);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(&190.0, &0.0, &180.0), 180.0);
        assert_eq!(clamp(&-3.0, &0.0, &180.0), 0.0);
        assert_eq!(clamp(&42.0, &0.0, &180.0), 42.0);
    }

    #[test]
    fn test_moving_average() {
        let v = [0.0, 0.0, 5.0, 0.0, 0.0];
        assert_eq!(moving_average(&v, 5), vec![5.0 / 3.0, 1.25, 1.0, 1.25, 5.0 / 3.0]);

        // A linear series is unchanged in the interior
        let v: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let s = moving_average(&v, 5);
        assert_eq!(&s[2..8], &v[2..8]);

        assert_eq!(moving_average(&[1.0, 2.0], 1), vec![1.0, 2.0]);
    }

    #[test]
    fn test_gradient() {
        let t = [0.0, 0.5, 1.0, 1.5];
        let v = [0.0, 1.0, 2.0, 3.0];
        assert_eq!(gradient(&v, &t), vec![2.0, 2.0, 2.0, 2.0]);

        assert!(gradient(&[1.0], &[0.0]).is_empty());
        assert!(gradient(&[1.0, 2.0], &[0.0]).is_empty());
    }

    #[test]
    fn test_percentile_and_mean() {
        let v: Vec<f64> = (1..=11).map(|i| i as f64).collect();
        assert_eq!(percentile(&v, 90.0), Some(10.0));
        assert_eq!(percentile(&v, 50.0), Some(6.0));
        assert_eq!(percentile(&v, 0.0), Some(1.0));
        assert_eq!(percentile::<f64>(&[], 90.0), None);

        assert_eq!(mean(&[1.0, 2.0, 3.0]), Some(2.0));
        assert_eq!(mean::<f64>(&[]), None);
    }
}
