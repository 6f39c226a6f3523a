//! Tracktor-CKF: Combinatorial Kalman Filter track finding
//!
//! Reconstructs particle trajectories from measurements recorded on the
//! layers of a detector. Starting from seeds, every candidate is extended
//! step by step through the layers; each compatible measurement spawns a
//! new branch, and candidates that find nothing continue through a hole.
//!
//! # Structure
//!
//! - [`finding::LinkTable`]: append-only forest of every extension made
//! - [`finding::SeedBranchCounter`]: per-seed branch budget
//! - [`finding::CkfSearch`]: load-balanced, parallel step expansion
//! - [`finding::assemble_tracks`]: back-trace from tips into tracks
//! - [`finding::CombinatorialKalmanFilter`]: full propagate/expand loop
//!
//! The measurement update and the propagation to the next surface are
//! collaborators expressed as the [`models::MeasurementUpdater`] and
//! [`models::Propagator`] traits.

pub mod config;
pub mod finding;
pub mod models;
pub mod types;

pub mod prelude {
    pub use crate::config::FindingConfig;
    pub use crate::finding::{
        assemble_tracks, CandidateLink, CkfSearch, CombinatorialKalmanFilter, FindingOutput,
        LinkTable, Slot, TipCollector,
    };
    pub use crate::models::*;
    pub use crate::types::measurement::*;
    pub use crate::types::parameters::*;
    pub use crate::types::track::*;
    pub use crate::types::TrackScalar;
    pub use crate::{CkfError, Result};
}

/// Error types for the library
///
/// Numerical rejections and exhausted budgets are ordinary outcomes of the
/// search and never surface here.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CkfError {
    /// A configuration value is out of its accepted range
    #[error("invalid finding configuration: {0}")]
    InvalidConfig(String),
    /// More candidate links were produced than the link table can hold
    #[error("link table capacity of {capacity} links exceeded")]
    LinkTableOverflow { capacity: usize },
    /// More tips were produced than the tip collector can hold
    #[error("tip collector capacity of {capacity} tips exceeded")]
    TipOverflow { capacity: usize },
    /// A step was requested after the configured number of steps ran
    #[error("search already ran its {max_steps} steps")]
    StepLimitReached { max_steps: usize },
}

pub type Result<T> = ::core::result::Result<T, CkfError>;
