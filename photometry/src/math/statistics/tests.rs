//! Tests for statistical functions.

use super::*;

fn uniform(values: &[f64]) -> Vec<WeightedSample> {
    values
        .iter()
        .map(|&value| WeightedSample { value, weight: 1.0 })
        .collect()
}

// ---------------------------------------------------------------------------
// Median tests
// ---------------------------------------------------------------------------

#[test]
fn test_median_odd() {
    let mut values = [1.0, 3.0, 2.0, 5.0, 4.0];
    assert_eq!(median_mut(&mut values), 3.0);
}

#[test]
fn test_median_even() {
    let mut values = [1.0, 2.0, 3.0, 4.0];
    assert_eq!(median_mut(&mut values), 2.5);
}

#[test]
fn test_median_single() {
    let mut values = [42.0];
    assert_eq!(median_mut(&mut values), 42.0);
}

// ---------------------------------------------------------------------------
// Sigma-clipped median/MAD tests
// ---------------------------------------------------------------------------

#[test]
fn test_sigma_clipped_empty_input() {
    let mut values: [f64; 0] = [];
    let stats = sigma_clipped_median_mad(&mut values, &mut Vec::new(), 3.0, 5);
    assert_eq!(stats.count, 0);
    assert_eq!(stats.median, 0.0);
    assert_eq!(stats.sigma, 0.0);
}

#[test]
fn test_sigma_clipped_constant_values() {
    let mut values = [7.0; 25];
    let stats = sigma_clipped_median_mad(&mut values, &mut Vec::new(), 3.0, 5);
    assert_eq!(stats.median, 7.0);
    assert_eq!(stats.sigma, 0.0);
    assert_eq!(stats.count, 25);
}

#[test]
fn test_sigma_clipped_rejects_outliers() {
    // Symmetric spread around 100 plus two hot pixels
    let mut values: Vec<f64> = (0..50).map(|i| 100.0 + (i % 5) as f64 - 2.0).collect();
    values.push(5000.0);
    values.push(9000.0);

    let stats = sigma_clipped_median_mad(&mut values, &mut Vec::new(), 3.0, 5);
    assert!(
        (stats.median - 100.0).abs() < 1e-9,
        "median = {}",
        stats.median
    );
    assert_eq!(stats.count, 50, "both outliers should be clipped");
    assert!(stats.sigma > 0.0 && stats.sigma < 3.0, "sigma = {}", stats.sigma);
}

#[test]
fn test_sigma_clipped_two_values_skips_clipping() {
    let mut values = [1.0, 3.0];
    let stats = sigma_clipped_median_mad(&mut values, &mut Vec::new(), 3.0, 5);
    assert_eq!(stats.median, 2.0);
    assert_eq!(stats.count, 2);
}

// ---------------------------------------------------------------------------
// Weighted statistics tests
// ---------------------------------------------------------------------------

#[test]
fn test_weighted_median_uniform_matches_median() {
    let mut odd = uniform(&[5.0, 1.0, 3.0]);
    assert_eq!(weighted_median(&mut odd), 3.0);

    let mut even = uniform(&[4.0, 1.0, 3.0, 2.0]);
    assert_eq!(weighted_median(&mut even), 2.5);
}

#[test]
fn test_weighted_median_heavy_sample_dominates() {
    let mut samples = vec![
        WeightedSample {
            value: 1.0,
            weight: 0.1,
        },
        WeightedSample {
            value: 2.0,
            weight: 0.1,
        },
        WeightedSample {
            value: 10.0,
            weight: 5.0,
        },
    ];
    assert_eq!(weighted_median(&mut samples), 10.0);
}

#[test]
fn test_weighted_median_partial_weights() {
    // Cumulative: 0.25, 0.75 (>= 0.6 half of 1.2), 1.2
    let mut samples = vec![
        WeightedSample {
            value: 3.0,
            weight: 0.45,
        },
        WeightedSample {
            value: 1.0,
            weight: 0.25,
        },
        WeightedSample {
            value: 2.0,
            weight: 0.5,
        },
    ];
    assert_eq!(weighted_median(&mut samples), 2.0);
}

#[test]
fn test_weighted_sigma_clipped_rejects_outlier() {
    let mut samples = uniform(&[10.0, 11.0, 9.0, 10.5, 9.5, 10.0, 250.0]);
    let stats = weighted_sigma_clipped(&mut samples, 3.0, 5);
    assert_eq!(stats.median, 10.0);
    assert_eq!(stats.count, 6);
    assert!(samples.iter().all(|s| s.value < 100.0));
}

#[test]
fn test_weighted_sigma_clipped_matches_unweighted_for_unit_weights() {
    let raw = [12.0, 15.0, 11.0, 13.0, 14.0, 12.5, 13.5, 80.0, -40.0];

    let mut values = raw;
    let plain = sigma_clipped_median_mad(&mut values, &mut Vec::new(), 2.5, 5);

    let mut samples = uniform(&raw);
    let weighted = weighted_sigma_clipped(&mut samples, 2.5, 5);

    assert!((plain.median - weighted.median).abs() < 1e-12);
    assert!((plain.sigma - weighted.sigma).abs() < 1e-12);
    assert_eq!(plain.count, weighted.count);
}

#[test]
fn test_weighted_sigma_clipped_empty() {
    let mut samples = Vec::new();
    let stats = weighted_sigma_clipped(&mut samples, 3.0, 5);
    assert_eq!(stats.count, 0);
}
