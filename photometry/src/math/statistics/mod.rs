//! Statistical functions: median, MAD, sigma-clipped statistics.
//!
//! Sky estimates come from two places: an annulus whose pixels carry
//! fractional coverage weights, and the whole frame when the annulus is
//! empty. Both use iterative median/MAD clipping.

use super::mad_to_sigma;

#[cfg(test)]
mod tests;

/// Result of a sigma-clipped estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClippedStats {
    pub median: f64,
    /// Robust standard deviation (1.4826 × MAD) of the surviving values.
    pub sigma: f64,
    /// Number of values that survived clipping.
    pub count: usize,
}

impl ClippedStats {
    const EMPTY: Self = Self {
        median: 0.0,
        sigma: 0.0,
        count: 0,
    };
}

/// A value with a non-negative weight, e.g. a pixel and its area coverage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedSample {
    pub value: f64,
    pub weight: f64,
}

/// Calculate the median in-place.
///
/// Mutates the input buffer (partial sort via quickselect).
#[inline]
pub fn median_mut(data: &mut [f64]) -> f64 {
    debug_assert!(!data.is_empty());

    let len = data.len();
    let mid = len / 2;

    let (left_part, median, _) = data.select_nth_unstable_by(mid, f64::total_cmp);
    let right = *median;
    if len & 1 == 1 {
        right
    } else {
        let left = left_part
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        (left + right) * 0.5
    }
}

fn median_and_sigma(values: &mut [f64], deviations: &mut Vec<f64>) -> (f64, f64) {
    let median = median_mut(values);
    deviations.clear();
    deviations.extend(values.iter().map(|&v| (v - median).abs()));
    let mad = median_mut(deviations);
    (median, mad_to_sigma(mad))
}

/// Compute sigma-clipped median and MAD-based sigma.
///
/// Iteratively rejects values beyond `kappa × sigma` from the median.
/// `values` is reordered; `deviations` is scratch reused between calls.
pub fn sigma_clipped_median_mad(
    values: &mut [f64],
    deviations: &mut Vec<f64>,
    kappa: f64,
    iterations: usize,
) -> ClippedStats {
    if values.is_empty() {
        return ClippedStats::EMPTY;
    }

    let mut len = values.len();

    for _ in 0..iterations {
        if len < 3 {
            break;
        }

        let (median, sigma) = median_and_sigma(&mut values[..len], deviations);
        if sigma < f64::EPSILON {
            return ClippedStats {
                median,
                sigma: 0.0,
                count: len,
            };
        }

        let threshold = kappa * sigma;
        let mut write_idx = 0;
        for i in 0..len {
            if (values[i] - median).abs() <= threshold {
                values[write_idx] = values[i];
                write_idx += 1;
            }
        }

        if write_idx == len || write_idx == 0 {
            // Converged, or a tiny kappa would clip everything
            return ClippedStats {
                median,
                sigma,
                count: len,
            };
        }
        len = write_idx;
    }

    let (median, sigma) = median_and_sigma(&mut values[..len], deviations);
    ClippedStats {
        median,
        sigma,
        count: len,
    }
}

/// Weighted median: the smallest value at which the cumulative weight reaches half.
///
/// When exactly half the weight lies at or below a value, the result is the
/// midpoint with the next value, so uniform weights reproduce the ordinary median.
/// Sorts `samples` by value.
pub fn weighted_median(samples: &mut [WeightedSample]) -> f64 {
    debug_assert!(!samples.is_empty());

    samples.sort_unstable_by(|a, b| a.value.total_cmp(&b.value));
    let total: f64 = samples.iter().map(|s| s.weight).sum();
    let half = 0.5 * total;

    let mut cumulative = 0.0;
    for (i, sample) in samples.iter().enumerate() {
        cumulative += sample.weight;
        if cumulative >= half {
            if (cumulative - half).abs() <= half * 1e-12 && i + 1 < samples.len() {
                return 0.5 * (sample.value + samples[i + 1].value);
            }
            return sample.value;
        }
    }

    samples[samples.len() - 1].value
}

fn weighted_median_and_sigma(
    samples: &mut [WeightedSample],
    deviations: &mut Vec<WeightedSample>,
) -> (f64, f64) {
    let median = weighted_median(samples);
    deviations.clear();
    deviations.extend(samples.iter().map(|s| WeightedSample {
        value: (s.value - median).abs(),
        weight: s.weight,
    }));
    let mad = weighted_median(deviations);
    (median, mad_to_sigma(mad))
}

/// Sigma-clipped weighted median and weighted-MAD sigma.
///
/// Same iteration as [`sigma_clipped_median_mad`], but every statistic uses the
/// sample weights. Zero-weight samples must be filtered out by the caller.
/// Clipped samples are removed from `samples`.
pub fn weighted_sigma_clipped(
    samples: &mut Vec<WeightedSample>,
    kappa: f64,
    iterations: usize,
) -> ClippedStats {
    debug_assert!(samples.iter().all(|s| s.weight > 0.0));

    if samples.is_empty() {
        return ClippedStats::EMPTY;
    }

    let mut deviations = Vec::with_capacity(samples.len());

    for _ in 0..iterations {
        if samples.len() < 3 {
            break;
        }

        let (median, sigma) = weighted_median_and_sigma(samples, &mut deviations);
        if sigma < f64::EPSILON {
            return ClippedStats {
                median,
                sigma: 0.0,
                count: samples.len(),
            };
        }

        let threshold = kappa * sigma;
        let before = samples.len();
        if samples
            .iter()
            .all(|s| (s.value - median).abs() > threshold)
        {
            return ClippedStats {
                median,
                sigma,
                count: before,
            };
        }
        samples.retain(|s| (s.value - median).abs() <= threshold);
        if samples.len() == before {
            return ClippedStats {
                median,
                sigma,
                count: before,
            };
        }
    }

    let (median, sigma) = weighted_median_and_sigma(samples, &mut deviations);
    ClippedStats {
        median,
        sigma,
        count: samples.len(),
    }
}
