//! Bound track parameters
//!
//! A track state is expressed on a detector surface by five parameters:
//! two local positions, the two direction angles and the signed inverse
//! momentum. Seeds, predictions and filtered states all share this form.

use nalgebra::{RealField, SMatrix, SVector};

/// Number of free parameters of the track model.
pub const BOUND_SIZE: usize = 5;

/// Index of the first local coordinate.
pub const LOC0: usize = 0;
/// Index of the second local coordinate.
pub const LOC1: usize = 1;
/// Index of the azimuthal direction angle.
pub const PHI: usize = 2;
/// Index of the polar direction angle.
pub const THETA: usize = 3;
/// Index of the signed inverse momentum.
pub const QOP: usize = 4;

/// Parameter vector of the track model.
pub type BoundVector<T> = SVector<T, BOUND_SIZE>;

/// Covariance of the track model parameters.
pub type BoundMatrix<T> = SMatrix<T, BOUND_SIZE, BOUND_SIZE>;

/// Identifier of a detector surface.
///
/// Only ordering and equality matter to the search; measurements are
/// grouped and looked up by this value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct SurfaceId(pub u64);

impl core::fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

/// Track parameters with covariance, bound to a surface.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundTrackParameters<T: RealField> {
    /// Surface the parameters are expressed on
    pub surface: SurfaceId,
    /// Parameter vector `[loc0, loc1, phi, theta, qop]`
    pub vector: BoundVector<T>,
    /// Parameter covariance
    pub covariance: BoundMatrix<T>,
}

impl<T: RealField + Copy> BoundTrackParameters<T> {
    /// Creates parameters from a vector and covariance.
    #[inline]
    pub fn new(surface: SurfaceId, vector: BoundVector<T>, covariance: BoundMatrix<T>) -> Self {
        Self {
            surface,
            vector,
            covariance,
        }
    }

    /// Creates parameters with a diagonal covariance.
    #[inline]
    pub fn with_diagonal_covariance(
        surface: SurfaceId,
        vector: BoundVector<T>,
        diagonal: &BoundVector<T>,
    ) -> Self {
        Self {
            surface,
            vector,
            covariance: BoundMatrix::from_diagonal(diagonal),
        }
    }

    /// First local coordinate.
    #[inline]
    pub fn loc0(&self) -> T {
        self.vector[LOC0]
    }

    /// Second local coordinate.
    #[inline]
    pub fn loc1(&self) -> T {
        self.vector[LOC1]
    }

    /// Signed inverse momentum.
    #[inline]
    pub fn qop(&self) -> T {
        self.vector[QOP]
    }

    /// Returns a copy moved onto another surface, values untouched.
    #[inline]
    pub fn on_surface(&self, surface: SurfaceId) -> Self {
        Self {
            surface,
            vector: self.vector,
            covariance: self.covariance,
        }
    }
}
