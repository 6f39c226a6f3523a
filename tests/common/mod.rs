//! Common test helpers for track finding integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use tracktor_ckf::models::{MeasurementUpdater, Propagator, UpdateOutcome};
use tracktor_ckf::types::measurement::Measurement;
use tracktor_ckf::types::parameters::{BoundMatrix, BoundTrackParameters, BoundVector, SurfaceId};

/// Accepts every measurement with the same chi-square.
#[derive(Debug, Clone, Copy)]
pub struct FixedChi2Updater(pub f64);

impl MeasurementUpdater<f64> for FixedChi2Updater {
    fn update(
        &self,
        predicted: &BoundTrackParameters<f64>,
        measurement: &Measurement<f64>,
    ) -> Option<UpdateOutcome<f64>> {
        Some(UpdateOutcome {
            filtered: predicted.on_surface(measurement.surface),
            chi2: self.0,
        })
    }
}

/// Chi-square derived from the measurement id: `(id % 7) * 2`.
#[derive(Debug, Clone, Copy)]
pub struct IdChi2Updater;

impl MeasurementUpdater<f64> for IdChi2Updater {
    fn update(
        &self,
        predicted: &BoundTrackParameters<f64>,
        measurement: &Measurement<f64>,
    ) -> Option<UpdateOutcome<f64>> {
        Some(UpdateOutcome {
            filtered: predicted.on_surface(measurement.surface),
            chi2: (measurement.id % 7) as f64 * 2.0,
        })
    }
}

/// Accepts every measurement with chi2 0.1 and counts the updates run.
#[derive(Debug, Default)]
pub struct CountingUpdater {
    calls: AtomicUsize,
}

impl CountingUpdater {
    /// Updates run since the last reset.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.calls.store(0, Ordering::Release);
    }
}

impl MeasurementUpdater<f64> for CountingUpdater {
    fn update(
        &self,
        predicted: &BoundTrackParameters<f64>,
        measurement: &Measurement<f64>,
    ) -> Option<UpdateOutcome<f64>> {
        self.calls.fetch_add(1, Ordering::AcqRel);
        Some(UpdateOutcome {
            filtered: predicted.on_surface(measurement.surface),
            chi2: 0.1,
        })
    }
}

/// Fails every update, as a singular innovation would.
#[derive(Debug, Clone, Copy)]
pub struct FailingUpdater;

impl MeasurementUpdater<f64> for FailingUpdater {
    fn update(
        &self,
        _predicted: &BoundTrackParameters<f64>,
        _measurement: &Measurement<f64>,
    ) -> Option<UpdateOutcome<f64>> {
        None
    }
}

/// Moves a state to the next surface unchanged, up to `layers` surfaces.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceStepper {
    pub layers: u64,
}

impl Propagator<f64> for SurfaceStepper {
    fn propagate(&self, filtered: &BoundTrackParameters<f64>) -> Option<BoundTrackParameters<f64>> {
        let next = filtered.surface.0 + 1;
        (next < self.layers).then(|| filtered.on_surface(SurfaceId(next)))
    }
}

/// Creates a seed on the given surface.
pub fn make_seed(surface: u64) -> BoundTrackParameters<f64> {
    BoundTrackParameters::new(SurfaceId(surface), BoundVector::zeros(), BoundMatrix::identity())
}

/// Creates a pixel measurement at the origin of a surface.
pub fn make_pixel(id: u64, surface: u64) -> Measurement<f64> {
    Measurement::pixel(id, SurfaceId(surface), [0.0, 0.0], [0.01, 0.01])
}

/// Creates a strip measurement at the origin of a surface.
pub fn make_strip(id: u64, surface: u64) -> Measurement<f64> {
    Measurement::strip(id, SurfaceId(surface), 0.0, 0.01)
}

/// Creates one pixel per listed surface, with ids counting up from `first_id`.
pub fn make_pixels_on(surfaces: &[u64], first_id: u64) -> Vec<Measurement<f64>> {
    surfaces
        .iter()
        .enumerate()
        .map(|(i, &surface)| make_pixel(first_id + i as u64, surface))
        .collect()
}

/// Exact hits of a straight track through a telescope.
///
/// Surface `k` sits at distance `k * spacing` from surface 0.
pub fn straight_track_hits(
    first_id: u64,
    layers: u64,
    spacing: f64,
    origin: [f64; 2],
    slopes: [f64; 2],
) -> Vec<Measurement<f64>> {
    (0..layers)
        .map(|k| {
            let z = k as f64 * spacing;
            Measurement::pixel(
                first_id + k,
                SurfaceId(k),
                [origin[0] + slopes[0] * z, origin[1] + slopes[1] * z],
                [0.01, 0.01],
            )
        })
        .collect()
}
