//! Descriptive statistics used throughout the engine.

/// Calculate the mean of a slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Calculate the sample variance (n-1 denominator).
pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let sum_sq: f64 = values.iter().map(|x| (x - m).powi(2)).sum();
    sum_sq / (values.len() - 1) as f64
}

/// Calculate the sample standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Calculate the median of a slice.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Quantile with linear interpolation between order statistics.
///
/// `q` is clamped to `[0, 1]`; an empty slice yields NaN.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = pos - lo as f64;
        sorted[lo] + frac * (sorted[hi] - sorted[lo])
    }
}

/// Median absolute deviation scaled to be consistent with the standard
/// deviation under normality (factor 1.4826).
pub fn scaled_mad(values: &[f64], center: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let deviations: Vec<f64> = values.iter().map(|x| (x - center).abs()).collect();
    1.4826 * median(&deviations)
}

/// Pearson correlation between two equal-length series.
///
/// A zero-variance series carries no trend information, so the
/// correlation is defined as 0.0 rather than NaN. Mismatched or
/// too-short inputs also yield 0.0.
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.len() < 2 {
        return 0.0;
    }
    let ma = mean(a);
    let mb = mean(b);

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        cov += (x - ma) * (y - mb);
        var_a += (x - ma).powi(2);
        var_b += (y - mb).powi(2);
    }

    let denom = (var_a * var_b).sqrt();
    if denom < 1e-12 {
        return 0.0;
    }
    cov / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn mean_and_variance_basic() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(mean(&values), 5.0, epsilon = 1e-12);
        assert_relative_eq!(variance(&values), 32.0 / 7.0, epsilon = 1e-12);
        assert_relative_eq!(std_dev(&values), (32.0f64 / 7.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn mean_of_empty_is_nan() {
        assert!(mean(&[]).is_nan());
        assert!(variance(&[1.0]).is_nan());
    }

    #[test]
    fn median_even_and_odd() {
        assert_relative_eq!(median(&[3.0, 1.0, 2.0]), 2.0, epsilon = 1e-12);
        assert_relative_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5, epsilon = 1e-12);
    }

    #[test]
    fn quantile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(quantile(&values, 0.0), 1.0, epsilon = 1e-12);
        assert_relative_eq!(quantile(&values, 0.25), 1.75, epsilon = 1e-12);
        assert_relative_eq!(quantile(&values, 0.5), 2.5, epsilon = 1e-12);
        assert_relative_eq!(quantile(&values, 1.0), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn scaled_mad_of_flat_series_is_zero() {
        let values = [5.0; 10];
        assert_relative_eq!(scaled_mad(&values, 5.0), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn pearson_perfect_positive_and_negative() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let b = [2.0, 4.0, 6.0, 8.0, 10.0];
        assert_relative_eq!(pearson(&a, &b), 1.0, epsilon = 1e-10);

        let c = [10.0, 8.0, 6.0, 4.0, 2.0];
        assert_relative_eq!(pearson(&a, &c), -1.0, epsilon = 1e-10);
    }

    #[test]
    fn pearson_flat_series_is_zero() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let flat = [7.0, 7.0, 7.0, 7.0];
        assert_relative_eq!(pearson(&a, &flat), 0.0, epsilon = 1e-12);
        assert_relative_eq!(pearson(&flat, &flat), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn pearson_length_mismatch_is_zero() {
        assert_relative_eq!(pearson(&[1.0, 2.0], &[1.0]), 0.0, epsilon = 1e-12);
    }
}
