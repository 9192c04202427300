//! Tests for aperture photometry.

use super::*;
use crate::synthetic::{add_gaussian_star, add_poisson_noise, flat_frame};
use common::FloatExt;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::f64::consts::PI;

fn small_config() -> PhotometryConfig {
    PhotometryConfig {
        aperture_radius: 6.0,
        annulus_inner: 9.0,
        annulus_outer: 13.0,
        ..Default::default()
    }
}

#[test]
fn test_noiseless_star_recovers_injected_flux() {
    let config = PhotometryConfig::default();
    let mut pixels = flat_frame(64, 64, 100.0);
    let center = DVec2::new(32.3, 31.7);
    let injected = add_gaussian_star(&mut pixels, center, 50_000.0, 2.0);

    let result = measure(&pixels, center, &config).unwrap();

    assert_eq!(result.background_source, BackgroundSource::Annulus);
    assert!(
        (result.background - 100.0).abs() < 1e-3,
        "background = {}",
        result.background
    );
    assert!(
        (result.net_flux - injected).abs() < 0.001 * injected,
        "net flux {} vs injected {}",
        result.net_flux,
        injected
    );
    assert!((result.aperture_area - PI * 100.0).abs() < 1e-6);
}

#[test]
fn test_magnitude_from_flux_and_zero_point() {
    let config = PhotometryConfig::default();
    let mut pixels = flat_frame(64, 64, 0.0);
    let center = DVec2::new(32.0, 32.0);
    add_gaussian_star(&mut pixels, center, 10_000.0, 1.5);

    let result = measure(&pixels, center, &config).unwrap();

    let expected = -2.5 * result.net_flux.log10() + 25.0;
    assert!(result.magnitude.approximately_eq(expected));
    // 10_000 ADU at zero point 25 is magnitude 15
    assert!((result.magnitude - 15.0).abs() < 0.001, "mag = {}", result.magnitude);

    // Zero sky noise and no read noise: pure shot noise in electrons
    assert!((result.flux_error - result.net_flux.sqrt()).abs() < 1e-6);
    let expected_mag_err = 2.5 / 10f64.ln() * result.flux_error / result.net_flux;
    assert!(result.magnitude_error.approximately_eq(expected_mag_err));
}

#[test]
fn test_error_terms_with_gain_and_read_noise() {
    let config = PhotometryConfig {
        gain: 2.0,
        read_noise: 5.0,
        ..small_config()
    };
    let mut pixels = flat_frame(48, 48, 0.0);
    let center = DVec2::new(24.0, 24.0);
    add_gaussian_star(&mut pixels, center, 20_000.0, 1.5);

    let result = measure(&pixels, center, &config).unwrap();

    // Flat zero sky: only shot and read noise remain.
    let electrons = result.net_flux * 2.0;
    let variance = electrons + result.aperture_area * 25.0;
    let expected = variance.sqrt() / 2.0;
    assert!(
        (result.flux_error - expected).abs() < 1e-6,
        "flux error {} vs {}",
        result.flux_error,
        expected
    );
}

#[test]
fn test_sky_mean_term_penalizes_small_annulus() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut pixels = flat_frame(80, 80, 400.0);
    let center = DVec2::new(40.0, 40.0);
    add_gaussian_star(&mut pixels, center, 30_000.0, 2.0);
    add_poisson_noise(&mut pixels, &mut rng);

    let thin = PhotometryConfig {
        aperture_radius: 6.0,
        annulus_inner: 12.0,
        annulus_outer: 13.0,
        ..Default::default()
    };
    let wide = PhotometryConfig {
        annulus_outer: 30.0,
        ..thin.clone()
    };

    let thin_result = measure(&pixels, center, &thin).unwrap();
    let wide_result = measure(&pixels, center, &wide).unwrap();

    let thin_term = thin_result.aperture_area.powi(2) / thin_result.annulus_area;
    let wide_term = wide_result.aperture_area.powi(2) / wide_result.annulus_area;
    assert!(thin_term > 5.0 * wide_term);
    assert!((thin_result.annulus_area - PI * (169.0 - 144.0)).abs() < 1e-6);
}

#[test]
fn test_poisson_field_flux_within_error() {
    let config = PhotometryConfig::default();
    let mut rng = StdRng::seed_from_u64(1234);

    for trial in 0..8 {
        let mut pixels = flat_frame(64, 64, 100.0);
        let center = DVec2::new(31.0 + trial as f64 * 0.27, 32.5 - trial as f64 * 0.19);
        let injected = add_gaussian_star(&mut pixels, center, 50_000.0, 2.0);
        add_poisson_noise(&mut pixels, &mut rng);

        let result = measure(&pixels, center, &config).unwrap();

        assert!(
            (result.net_flux - injected).abs() < 5.0 * result.flux_error,
            "trial {trial}: flux {} injected {} error {}",
            result.net_flux,
            injected,
            result.flux_error
        );
        assert!(
            (result.background_rms - 10.0).abs() < 2.0,
            "trial {trial}: sky rms {}",
            result.background_rms
        );
    }
}

#[test]
fn test_sub_pixel_shift_keeps_exact_area() {
    // A binary inside/outside mask would give an integer pixel count that
    // jumps as the center moves.
    let config = small_config();
    let mut previous = None;
    for step in 0..10 {
        let center = DVec2::new(24.0 + step as f64 * 0.1, 24.0 - step as f64 * 0.03);
        let mut pixels = flat_frame(48, 48, 10.0);
        add_gaussian_star(&mut pixels, center, 8_000.0, 1.2);

        let result = measure(&pixels, center, &config).unwrap();
        assert!(
            (result.aperture_area - PI * 36.0).abs() < 1e-9,
            "step {step}: area {}",
            result.aperture_area
        );
        if let Some(prev) = previous {
            let change: f64 = result.net_flux - prev;
            assert!(change.abs() < 1.0, "step {step}: flux jumped by {change}");
        }
        previous = Some(result.net_flux);
    }
}

#[test]
fn test_empty_annulus_falls_back_to_global_sky() {
    // 21x21 frame: every corner is closer than 15 px to the center.
    let config = PhotometryConfig::default();
    let mut pixels = flat_frame(21, 21, 50.0);
    let center = DVec2::new(10.0, 10.0);
    let injected = add_gaussian_star(&mut pixels, center, 20_000.0, 1.5);

    let result = measure(&pixels, center, &config).unwrap();

    assert_eq!(result.background_source, BackgroundSource::GlobalFallback);
    assert!(
        (result.background - 50.0).abs() < 0.5,
        "background = {}",
        result.background
    );
    assert!(
        (result.net_flux - injected).abs() < 0.02 * injected,
        "net flux {} vs injected {}",
        result.net_flux,
        injected
    );
}

#[test]
fn test_global_sky_is_shared_between_measurements() {
    let config = PhotometryConfig::default();
    let mut pixels = flat_frame(21, 21, 50.0);
    add_gaussian_star(&mut pixels, DVec2::new(6.0, 6.0), 5_000.0, 1.0);
    add_gaussian_star(&mut pixels, DVec2::new(14.0, 14.0), 5_000.0, 1.0);

    let photometer = Photometer::new(&pixels, &config);
    let a = photometer.measure(DVec2::new(10.0, 10.0)).unwrap();
    let b = photometer.measure(DVec2::new(10.2, 10.0)).unwrap();
    assert_eq!(a.background_source, BackgroundSource::GlobalFallback);
    assert_eq!(b.background_source, BackgroundSource::GlobalFallback);
    assert_eq!(a.background, b.background);
    assert_eq!(a.annulus_area, b.annulus_area);
}

#[test]
fn test_flat_frame_is_non_positive_flux() {
    let config = small_config();
    // A power of two keeps weighted sums exact, so the net flux is exactly zero.
    let pixels = flat_frame(48, 48, 256.0);

    let err = measure(&pixels, DVec2::new(24.0, 24.0), &config).unwrap_err();
    match err {
        PhotometryError::NonPositiveFlux {
            net_flux,
            flux_error,
        } => {
            assert_eq!(net_flux, 0.0);
            assert!(flux_error >= 0.0 && !flux_error.is_nan());
        }
        other => panic!("expected NonPositiveFlux, got {other:?}"),
    }
}

#[test]
fn test_dip_below_sky_is_non_positive_flux() {
    let config = small_config();
    let mut pixels = flat_frame(48, 48, 250.0);
    pixels[(24, 24)] = 0.0;

    let err = measure(&pixels, DVec2::new(24.0, 24.0), &config).unwrap_err();
    assert!(
        matches!(err, PhotometryError::NonPositiveFlux { net_flux, .. } if net_flux < 0.0),
        "got {err:?}"
    );
}

#[test]
fn test_aperture_outside_frame() {
    let config = small_config();
    let pixels = flat_frame(32, 32, 10.0);

    let err = measure(&pixels, DVec2::new(-100.0, 500.0), &config).unwrap_err();
    assert_eq!(err, PhotometryError::EmptyAperture { x: -100.0, y: 500.0 });
}

#[test]
fn test_star_on_edge_uses_in_image_area() {
    let config = small_config();
    let mut pixels = flat_frame(48, 48, 20.0);
    let center = DVec2::new(-0.5, 24.0);
    add_gaussian_star(&mut pixels, DVec2::new(0.0, 24.0), 5_000.0, 1.0);

    let result = measure(&pixels, center, &config).unwrap();
    // The aperture's left half lies beyond the frame edge at x = -0.5.
    assert!((result.aperture_area - PI * 36.0 / 2.0).abs() < 1e-6);
    assert_eq!(result.background_source, BackgroundSource::Annulus);
}

#[test]
#[should_panic(expected = "annulus_outer")]
fn test_invalid_geometry_panics() {
    let config = PhotometryConfig {
        annulus_outer: 12.0,
        annulus_inner: 14.0,
        ..Default::default()
    };
    let pixels = flat_frame(8, 8, 0.0);
    let _ = measure(&pixels, DVec2::new(4.0, 4.0), &config);
}
