//! Differential magnitudes against an ensemble of reference stars.
//!
//! The result is the mean of `target - reference` over every reference.
//! Each reference is an independent noise source, so the per-reference
//! errors add in quadrature with the target's and the sum shrinks as `1/N`:
//!
//! ```text
//! diff     = mean(target.mag - ref.mag)
//! diff_err = sqrt(Σ (ref.err² + target.err²)) / N
//! ```

use crate::measurement::{Magnitude, StarMeasurement};

/// Combine a target magnitude with reference magnitudes.
///
/// Returns `None` when there are no references.
pub fn differential_magnitude(target: Magnitude, references: &[Magnitude]) -> Option<Magnitude> {
    if references.is_empty() {
        return None;
    }

    let n = references.len() as f64;
    let target_var = target.error * target.error;

    let mut diff_sum = 0.0;
    let mut var_sum = 0.0;
    for reference in references {
        diff_sum += target.value - reference.value;
        var_sum += reference.error * reference.error + target_var;
    }

    Some(Magnitude::new(diff_sum / n, var_sum.sqrt() / n))
}

/// Return `target` with its differential magnitude computed from `references`.
///
/// References without a magnitude are skipped. A target without a magnitude,
/// or with no usable reference, comes back unchanged.
pub fn combine(target: &StarMeasurement, references: &[&StarMeasurement]) -> StarMeasurement {
    let mut result = target.clone();
    let Some(target_mag) = target.magnitude else {
        return result;
    };

    let reference_mags: Vec<Magnitude> = references.iter().filter_map(|r| r.magnitude).collect();
    if let Some(differential) = differential_magnitude(target_mag, &reference_mags) {
        result.differential = Some(differential);
    }
    result
}
