//! Differential light curve of a synthetic variable star.
//!
//! Usage: `synthetic_lightcurve [config.yaml|config.json]`

use anyhow::{Context, Result};
use glam::DVec2;

use common::log_setup::setup_logging;
use photometry::synthetic::{SequenceConfig, SyntheticStar, generate_sequence};
use photometry::{Frame, PhotometryConfig, PixelScaling, Session};

fn main() -> Result<()> {
    setup_logging("info", "synthetic_lightcurve");

    let config = match std::env::args().nth(1) {
        Some(path) => PhotometryConfig::load(&path).with_context(|| format!("loading {path}"))?,
        None => PhotometryConfig::default(),
    };

    let target_position = DVec2::new(48.0, 52.0);
    let mut stars = vec![SyntheticStar {
        position: target_position,
        flux: 25_000.0,
        amplitude: 0.15,
        period: 0.12,
    }];
    stars.extend([
        SyntheticStar::constant(DVec2::new(110.0, 40.0), 40_000.0),
        SyntheticStar::constant(DVec2::new(60.0, 150.0), 32_000.0),
        SyntheticStar::constant(DVec2::new(150.0, 130.0), 55_000.0),
    ]);

    let sequence = SequenceConfig {
        width: 200,
        height: 200,
        frames: 24,
        ..Default::default()
    };
    let frames = generate_sequence(&sequence, &stars);
    tracing::info!(frames = frames.len(), stars = stars.len(), "Generated synthetic sequence");

    let mut session = Session::new(config);
    let mut target = None;
    for frame in frames {
        let image =
            session.load_frame(Frame::new(frame.time, frame.pixels, PixelScaling::IDENTITY))?;
        let labels = session.add_detections(image, &frame.detections)?;
        target = target.or(labels.first().copied());
    }
    let target = target.context("no frames generated")?;

    let outcomes = session.measure_all();
    let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
    if failed > 0 {
        tracing::warn!(failed, "Some stars could not be measured");
    }

    let comparisons: Vec<_> = session
        .catalog()
        .identities()
        .map(|identity| identity.label())
        .filter(|&label| label != target)
        .collect();
    for label in comparisons {
        session.set_ensemble(label, true)?;
    }
    session.set_name(target, Some("synthetic variable".to_string()))?;

    session.apply_differential(target)?;
    let curve = session.light_curve(target)?;

    println!("# star {target}: {} points", curve.len());
    println!("{:>14} {:>10} {:>8}", "time", "diff_mag", "error");
    for point in &curve {
        println!(
            "{:>14.5} {:>10.4} {:>8.4}",
            point.time, point.magnitude, point.error
        );
    }

    Ok(())
}
