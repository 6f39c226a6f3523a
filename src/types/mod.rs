//! Core types: track parameters, measurements and reconstructed tracks

use nalgebra::RealField;
use num_traits::Float;

pub mod measurement;
pub mod parameters;
pub mod track;

/// Scalar type usable throughout the search.
///
/// Bundles the `RealField + Float` pair used by the linear algebra with the
/// thread-safety bounds the parallel expansion needs.
pub trait TrackScalar: RealField + Float + Copy + Send + Sync {}

impl<T: RealField + Float + Copy + Send + Sync> TrackScalar for T {}
