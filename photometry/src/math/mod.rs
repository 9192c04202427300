//! Numeric helpers shared by the photometry stages.

pub mod statistics;

/// MAD (Median Absolute Deviation) to standard deviation conversion factor.
///
/// For a normal distribution, σ ≈ 1.4826 × MAD.
/// This is the exact value: 1 / Φ⁻¹(3/4) where Φ⁻¹ is the inverse CDF.
pub const MAD_TO_SIGMA: f64 = 1.482_602_218_505_602;

/// Convert MAD to standard deviation (assuming normal distribution).
#[inline]
pub fn mad_to_sigma(mad: f64) -> f64 {
    mad * MAD_TO_SIGMA
}

/// `2.5 / ln(10)`: converts a relative flux error into a magnitude error.
pub const MAGNITUDE_ERROR_FACTOR: f64 = 1.085_736_204_758_129_6;
