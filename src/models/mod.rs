//! Collaborator models for the search
//!
//! The measurement update and the propagation to the next surface are
//! external to the track finding itself; these traits are the seams, and
//! the provided implementations serve simple telescope setups.

mod propagation;
mod update;

pub use propagation::*;
pub use update::*;
