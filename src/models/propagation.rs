//! Propagation to the next detector surface
//!
//! Geometry and navigation live outside the search. The search only needs
//! the prediction of a filtered state on the next surface it will cross,
//! expressed through the [`Propagator`] trait.

use crate::types::parameters::{
    BoundMatrix, BoundTrackParameters, SurfaceId, LOC0, LOC1, PHI, THETA,
};
use crate::types::TrackScalar;

/// Predicts a state onto the next surface.
pub trait Propagator<T: TrackScalar>: Sync {
    /// Returns the prediction on the next surface, or `None` once the
    /// candidate leaves the detector.
    fn propagate(&self, filtered: &BoundTrackParameters<T>) -> Option<BoundTrackParameters<T>>;
}

// ============================================================================
// Telescope Propagator
// ============================================================================

/// Straight-line propagation through equally spaced parallel planes.
///
/// Surfaces are numbered `0..layers` along the beam axis. The direction
/// parameters are read as small-angle local slopes, so transport is linear:
/// - loc0 += spacing * phi
/// - loc1 += spacing * theta
///
/// Each crossing adds `scattering^2` to the variance of both slopes.
#[derive(Debug, Clone)]
pub struct TelescopePropagator<T: TrackScalar> {
    /// Number of planes
    pub layers: u64,
    /// Distance between consecutive planes
    pub spacing: T,
    /// Slope spread added per plane crossing
    pub scattering: T,
}

impl<T: TrackScalar> TelescopePropagator<T> {
    /// Creates a telescope propagator.
    ///
    /// # Panics
    /// Panics if `spacing <= 0` or `scattering < 0`.
    pub fn new(layers: u64, spacing: T, scattering: T) -> Self {
        assert!(spacing > T::zero(), "Plane spacing must be positive");
        assert!(scattering >= T::zero(), "Scattering spread must be non-negative");
        Self {
            layers,
            spacing,
            scattering,
        }
    }

    /// Transport matrix between consecutive planes.
    pub fn transport_matrix(&self) -> BoundMatrix<T> {
        let mut f = BoundMatrix::identity();
        f[(LOC0, PHI)] = self.spacing;
        f[(LOC1, THETA)] = self.spacing;
        f
    }

    /// Process noise added per crossing.
    pub fn process_noise(&self) -> BoundMatrix<T> {
        let mut q = BoundMatrix::zeros();
        let var = self.scattering * self.scattering;
        q[(PHI, PHI)] = var;
        q[(THETA, THETA)] = var;
        q
    }
}

impl<T: TrackScalar> Propagator<T> for TelescopePropagator<T> {
    fn propagate(&self, filtered: &BoundTrackParameters<T>) -> Option<BoundTrackParameters<T>> {
        let next = filtered.surface.0.checked_add(1)?;
        if next >= self.layers {
            return None;
        }

        let f = self.transport_matrix();
        let vector = f * filtered.vector;
        let covariance = f * filtered.covariance * f.transpose() + self.process_noise();

        Some(BoundTrackParameters::new(SurfaceId(next), vector, covariance))
    }
}
