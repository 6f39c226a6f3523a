//! Measurement update
//!
//! The search treats the Kalman update as a black box: given a predicted
//! state and a measurement it returns the filtered state together with the
//! chi-square of the match, or nothing when the update is numerically
//! impossible.
//!
//! # Example
//!
//! ```
//! use tracktor_ckf::models::{KalmanUpdater, MeasurementUpdater};
//! use tracktor_ckf::types::measurement::Measurement;
//! use tracktor_ckf::types::parameters::{BoundTrackParameters, SurfaceId};
//!
//! let predicted = BoundTrackParameters::with_diagonal_covariance(
//!     SurfaceId(1),
//!     nalgebra::vector![0.0, 0.0, 0.0, 0.0, 0.01],
//!     &nalgebra::vector![1.0, 1.0, 0.01, 0.01, 1e-4],
//! );
//! let measurement = Measurement::pixel(7, SurfaceId(1), [0.1, -0.1], [0.01, 0.01]);
//!
//! let outcome = KalmanUpdater.update(&predicted, &measurement).unwrap();
//! assert!(outcome.chi2 < 1.0);
//! ```

use nalgebra::{SMatrix, SVector};

use crate::types::measurement::Measurement;
use crate::types::parameters::{BoundMatrix, BoundTrackParameters, BOUND_SIZE};
use crate::types::TrackScalar;

/// Result of a successful measurement update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome<T: TrackScalar> {
    /// Filtered state on the measurement's surface
    pub filtered: BoundTrackParameters<T>,
    /// Chi-square of the predicted residual
    pub chi2: T,
}

/// Incorporates one measurement into a predicted state.
///
/// Implementations must be callable concurrently for disjoint inputs; the
/// search calls `update` from many worker threads at once.
pub trait MeasurementUpdater<T: TrackScalar>: Sync {
    /// Returns `None` when the update fails numerically (singular
    /// innovation covariance, degenerate geometry, ...).
    fn update(
        &self,
        predicted: &BoundTrackParameters<T>,
        measurement: &Measurement<T>,
    ) -> Option<UpdateOutcome<T>>;
}

// ============================================================================
// Kalman Updater
// ============================================================================

/// Gain-form Kalman update on the local coordinates.
///
/// The measurement projects onto `loc0` (strips) or `loc0, loc1` (pixels):
/// - r = m - H * x (residual)
/// - S = H * P * H^T + V (residual covariance)
/// - K = P * H^T * S^{-1}
/// - x_flt = x + K * r
/// - P_flt = (I - K*H) * P * (I - K*H)^T + K * V * K^T (Joseph form)
/// - chi2 = r^T * S^{-1} * r
#[derive(Debug, Clone, Copy, Default)]
pub struct KalmanUpdater;

impl<T: TrackScalar> MeasurementUpdater<T> for KalmanUpdater {
    fn update(
        &self,
        predicted: &BoundTrackParameters<T>,
        measurement: &Measurement<T>,
    ) -> Option<UpdateOutcome<T>> {
        match measurement.dimension() {
            1 => update_with_dimension::<T, 1>(predicted, measurement),
            2 => update_with_dimension::<T, 2>(predicted, measurement),
            _ => None,
        }
    }
}

fn update_with_dimension<T: TrackScalar, const D: usize>(
    predicted: &BoundTrackParameters<T>,
    measurement: &Measurement<T>,
) -> Option<UpdateOutcome<T>> {
    // Projection onto the first D local coordinates
    let h: SMatrix<T, D, BOUND_SIZE> =
        SMatrix::from_fn(|row, col| if row == col { T::one() } else { T::zero() });
    let v: SMatrix<T, D, D> =
        SMatrix::from_diagonal(&SVector::<T, D>::from_fn(|i, _| measurement.variance[i]));
    let m = SVector::<T, D>::from_fn(|i, _| measurement.local[i]);

    let x = &predicted.vector;
    let p = &predicted.covariance;

    let residual = m - h * x;
    let s = h * p * h.transpose() + v;
    let s_inv = s.try_inverse()?;

    let gain = p * h.transpose() * s_inv;
    let filtered_vector = x + gain * residual;

    let i_kh = BoundMatrix::<T>::identity() - gain * h;
    let filtered_cov = i_kh * p * i_kh.transpose() + gain * v * gain.transpose();

    let chi2 = (residual.transpose() * s_inv * residual)[(0, 0)];
    if !num_traits::Float::is_finite(chi2) || chi2 < T::zero() {
        return None;
    }

    Some(UpdateOutcome {
        filtered: BoundTrackParameters::new(measurement.surface, filtered_vector, filtered_cov),
        chi2,
    })
}

// ============================================================================
// Tests
// ============================================================================
