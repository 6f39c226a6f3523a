//! Track finding on a simulated telescope detector
//!
//! Straight tracks cross a stack of equally spaced planes. Each crossing
//! leaves a smeared pixel hit (or none, with a small inefficiency), and
//! every plane carries uniformly distributed noise hits. The combinatorial
//! Kalman filter starts from smeared seeds on the first plane.
//!
//! Set `RUST_LOG=tracktor_ckf=debug` to follow the search step by step.

use std::result::Result;

use rand::distr::Uniform;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tracktor_ckf::prelude::*;

// ============================================================================
// Detector and Simulation Parameters
// ============================================================================

const LAYERS: u64 = 8;
const SPACING: f64 = 25.0;
const SCATTERING: f64 = 1e-3;
const HALF_WIDTH: f64 = 100.0;

const NUM_TRACKS: usize = 5;
const HIT_RESOLUTION: f64 = 0.05;
const HIT_EFFICIENCY: f64 = 0.95;
const NOISE_HITS_PER_LAYER: usize = 20;

const SEED_POSITION_SMEAR: f64 = 0.2;
const SEED_SLOPE_SMEAR: f64 = 2e-3;

/// A simulated particle: origin on plane 0 and local slopes.
struct TrueTrack {
    origin: [f64; 2],
    slopes: [f64; 2],
}

impl TrueTrack {
    fn position_on(&self, layer: u64) -> [f64; 2] {
        let z = layer as f64 * SPACING;
        [
            self.origin[0] + self.slopes[0] * z,
            self.origin[1] + self.slopes[1] * z,
        ]
    }
}

fn simulate_tracks(rng: &mut StdRng) -> Result<Vec<TrueTrack>, Box<dyn std::error::Error>> {
    let origin = Uniform::new(-0.5 * HALF_WIDTH, 0.5 * HALF_WIDTH)?;
    let slope = Uniform::new(-0.2, 0.2)?;

    Ok((0..NUM_TRACKS)
        .map(|_| TrueTrack {
            origin: [origin.sample(rng), origin.sample(rng)],
            slopes: [slope.sample(rng), slope.sample(rng)],
        })
        .collect())
}

fn simulate_hits(
    tracks: &[TrueTrack],
    rng: &mut StdRng,
) -> Result<Vec<Measurement<f64>>, Box<dyn std::error::Error>> {
    let smear = Normal::new(0.0, HIT_RESOLUTION)?;
    let noise = Uniform::new(-HALF_WIDTH, HALF_WIDTH)?;
    let variance = [HIT_RESOLUTION * HIT_RESOLUTION; 2];

    let mut hits = Vec::new();
    let mut next_id = 0u64;
    for layer in 0..LAYERS {
        for track in tracks {
            if rng.random::<f64>() >= HIT_EFFICIENCY {
                continue;
            }
            let [x, y] = track.position_on(layer);
            let local = [x + smear.sample(rng), y + smear.sample(rng)];
            hits.push(Measurement::pixel(next_id, SurfaceId(layer), local, variance));
            next_id += 1;
        }
        for _ in 0..NOISE_HITS_PER_LAYER {
            let local = [noise.sample(rng), noise.sample(rng)];
            hits.push(Measurement::pixel(next_id, SurfaceId(layer), local, variance));
            next_id += 1;
        }
    }
    Ok(hits)
}

fn make_seeds(
    tracks: &[TrueTrack],
    rng: &mut StdRng,
) -> Result<Vec<BoundTrackParameters<f64>>, Box<dyn std::error::Error>> {
    let position = Normal::new(0.0, SEED_POSITION_SMEAR)?;
    let slope = Normal::new(0.0, SEED_SLOPE_SMEAR)?;

    Ok(tracks
        .iter()
        .map(|track| {
            BoundTrackParameters::with_diagonal_covariance(
                SurfaceId(0),
                nalgebra::vector![
                    track.origin[0] + position.sample(rng),
                    track.origin[1] + position.sample(rng),
                    track.slopes[0] + slope.sample(rng),
                    track.slopes[1] + slope.sample(rng),
                    0.01
                ],
                &nalgebra::vector![
                    4.0 * SEED_POSITION_SMEAR * SEED_POSITION_SMEAR,
                    4.0 * SEED_POSITION_SMEAR * SEED_POSITION_SMEAR,
                    4.0 * SEED_SLOPE_SMEAR * SEED_SLOPE_SMEAR,
                    4.0 * SEED_SLOPE_SMEAR * SEED_SLOPE_SMEAR,
                    1e-4
                ],
            )
        })
        .collect())
}

fn finder() -> Result<
    CombinatorialKalmanFilter<TelescopePropagator<f64>, KalmanUpdater>,
    Box<dyn std::error::Error>,
> {
    let config = FindingConfig::default()
        .with_max_steps(LAYERS as usize)
        .with_max_holes_per_candidate(2)
        .with_min_candidate_length(5)
        .with_chi2_max(15.0);

    Ok(CombinatorialKalmanFilter::new(
        config,
        TelescopePropagator::new(LAYERS, SPACING, SCATTERING),
        KalmanUpdater,
    )?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(false))
        .init();

    println!("Tracktor-CKF: Combinatorial Kalman Filter Track Finding");
    println!("=======================================================\n");

    let mut rng = StdRng::seed_from_u64(42);
    let tracks = simulate_tracks(&mut rng)?;
    let hits = simulate_hits(&tracks, &mut rng)?;
    let seeds = make_seeds(&tracks, &mut rng)?;

    println!(
        "Detector: {} planes, {} hits ({} noise per plane), {} seeds\n",
        LAYERS,
        hits.len(),
        NOISE_HITS_PER_LAYER,
        seeds.len()
    );

    let measurements = MeasurementIndex::new(hits);
    let output = finder()?.find_tracks(&seeds, &measurements)?;

    println!(
        "Search: {} steps, {} links, {} tips\n",
        output.steps,
        output.links.len(),
        output.tips.len()
    );

    for (i, track) in output.tracks.iter().enumerate() {
        let ids: Vec<u64> = track.measurements.iter().map(|m| m.id).collect();
        println!(
            "  Track {}: seed={}, hits={}, holes={}, chi2={:.2}, ndf={}, p={:.3}",
            i,
            track.seed_index,
            track.len(),
            track.holes,
            track.chi2,
            track.ndf,
            track.p_value
        );
        println!("    measurements: {:?}", ids);
    }

    println!("\nTrack finding complete!");
    Ok(())
}
