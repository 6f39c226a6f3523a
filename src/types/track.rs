//! Reconstructed track candidates

use nalgebra::RealField;

use super::measurement::Measurement;
use super::parameters::BoundTrackParameters;

/// A complete candidate track recovered from one tip of the search.
///
/// Owns its measurements; nothing refers back into the link table once
/// the candidate has been assembled.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackCandidate<T: RealField> {
    /// Link table index of the tip this track was traced from
    pub tip: usize,
    /// Index of the originating seed
    pub seed_index: usize,
    /// Initial parameters of the originating seed
    pub seed: BoundTrackParameters<T>,
    /// Assigned measurements, innermost first
    pub measurements: Vec<Measurement<T>>,
    /// Degrees of freedom: summed measurement dimensions minus the track parameters
    pub ndf: i32,
    /// Sum of the chi-square of all measurement extensions
    pub chi2: T,
    /// Chi-square survival probability for `chi2` and `ndf`
    pub p_value: T,
    /// Hole count recorded on the root-most link of the chain
    pub holes: usize,
}

impl<T: RealField + Copy> TrackCandidate<T> {
    /// Number of measurements on the track.
    #[inline]
    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    /// Returns true if the track carries no measurement.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }
}
