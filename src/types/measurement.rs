//! Measurements and the per-surface measurement index
//!
//! The search looks up the measurements of one surface at a time. To make
//! that a contiguous slice, measurements are sorted by surface once per
//! event and a table of cumulative per-surface counts is kept alongside.

use core::ops::Range;

use nalgebra::RealField;

use super::parameters::SurfaceId;

// ============================================================================
// Measurement
// ============================================================================

/// A spatial measurement on one detector surface.
///
/// Strip measurements constrain only the first local coordinate; pixel
/// measurements constrain both.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement<T: RealField> {
    /// Caller-assigned identifier
    pub id: u64,
    /// Surface the measurement was recorded on
    pub surface: SurfaceId,
    /// Local coordinates (the second entry is ignored for 1D measurements)
    pub local: [T; 2],
    /// Variances of the local coordinates
    pub variance: [T; 2],
    dimension: usize,
}

impl<T: RealField + Copy> Measurement<T> {
    /// Creates a two-dimensional (pixel) measurement.
    pub fn pixel(id: u64, surface: SurfaceId, local: [T; 2], variance: [T; 2]) -> Self {
        Self {
            id,
            surface,
            local,
            variance,
            dimension: 2,
        }
    }

    /// Creates a one-dimensional (strip) measurement of the first local coordinate.
    pub fn strip(id: u64, surface: SurfaceId, loc0: T, variance: T) -> Self {
        Self {
            id,
            surface,
            local: [loc0, T::zero()],
            variance: [variance, T::one()],
            dimension: 1,
        }
    }

    /// Number of constrained coordinates (1 or 2).
    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

// ============================================================================
// Measurement Index
// ============================================================================

/// Measurements sorted by surface, with cumulative per-surface offsets.
///
/// `offsets[i]` is the end of the range belonging to `surfaces[i]`; the
/// start is the previous entry (or 0). Candidate links refer to
/// measurements by their position in [`MeasurementIndex::measurements`].
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementIndex<T: RealField> {
    measurements: Vec<Measurement<T>>,
    surfaces: Vec<SurfaceId>,
    offsets: Vec<usize>,
}

impl<T: RealField + Copy> MeasurementIndex<T> {
    /// Builds the index from measurements in any order.
    ///
    /// Within a surface, measurements keep the order of their ids so the
    /// index is reproducible regardless of input order.
    pub fn new(mut measurements: Vec<Measurement<T>>) -> Self {
        measurements.sort_by_key(|m| (m.surface, m.id));

        let mut surfaces: Vec<SurfaceId> = Vec::new();
        let mut offsets: Vec<usize> = Vec::new();
        for (position, measurement) in measurements.iter().enumerate() {
            if surfaces.last() == Some(&measurement.surface) {
                if let Some(end) = offsets.last_mut() {
                    *end = position + 1;
                }
            } else {
                surfaces.push(measurement.surface);
                offsets.push(position + 1);
            }
        }

        Self {
            measurements,
            surfaces,
            offsets,
        }
    }

    /// Creates an index without measurements.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Returns the range of measurement positions recorded on `surface`.
    ///
    /// A surface without measurements yields an empty range.
    pub fn surface_range(&self, surface: SurfaceId) -> Range<usize> {
        match self.surfaces.binary_search(&surface) {
            Ok(i) => {
                let start = if i == 0 { 0 } else { self.offsets[i - 1] };
                start..self.offsets[i]
            }
            Err(_) => 0..0,
        }
    }

    /// Returns the measurement at a sorted position.
    #[inline]
    pub fn get(&self, position: usize) -> Option<&Measurement<T>> {
        self.measurements.get(position)
    }

    /// All measurements in surface order.
    #[inline]
    pub fn measurements(&self) -> &[Measurement<T>] {
        &self.measurements
    }

    /// Surfaces that carry at least one measurement, ascending.
    #[inline]
    pub fn surfaces(&self) -> &[SurfaceId] {
        &self.surfaces
    }

    /// Cumulative measurement counts, one per entry of [`Self::surfaces`].
    #[inline]
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Total number of measurements.
    #[inline]
    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    /// Returns true if the index holds no measurements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }
}
