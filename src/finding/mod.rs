//! Combinatorial Kalman filter track finding
//!
//! The search runs in navigation steps. In each step every live candidate
//! is paired with the measurements on the surface it crosses; each
//! compatible measurement spawns a new branch, and a candidate that finds
//! none may continue through a hole. Every extension is recorded as a link
//! pointing back to its parent, so the whole search is one append-only
//! forest rooted at the seeds. Once the search ends, the recorded tips are
//! traced back into tracks.
//!
//! # Components
//!
//! - [`LinkTable`] and [`TipCollector`]: lock-free append-only arenas
//! - [`SeedBranchCounter`]: per-seed branch budget
//! - [`CkfSearch`]: step-by-step driver over one search
//! - [`assemble_tracks`]: back-trace from tips into tracks
//! - [`CombinatorialKalmanFilter`]: propagate/expand loop over all steps

mod assembler;
mod budget;
mod expander;
mod holes;
mod links;
mod search;

pub use assembler::{assemble_tracks, chi2_p_value};
pub use budget::SeedBranchCounter;
pub use expander::{Candidate, Slot, StepSummary};
pub use links::{CandidateLink, LinkTable, TipCollector};
pub use search::CkfSearch;

use rayon::prelude::*;

use crate::config::FindingConfig;
use crate::models::{MeasurementUpdater, Propagator};
use crate::types::measurement::MeasurementIndex;
use crate::types::parameters::BoundTrackParameters;
use crate::types::track::TrackCandidate;
use crate::types::TrackScalar;
use crate::Result;

/// Result of a complete search.
#[derive(Debug)]
pub struct FindingOutput<T: TrackScalar> {
    /// One track per tip, in tip order
    pub tracks: Vec<TrackCandidate<T>>,
    /// Every link appended during the search
    pub links: LinkTable<T>,
    /// Terminal links the tracks were traced from
    pub tips: TipCollector,
    /// Number of steps that ran
    pub steps: usize,
}

/// Combinatorial Kalman filter.
///
/// Couples the search with a propagator, which predicts candidates onto the
/// next surface, and a measurement updater.
#[derive(Debug, Clone)]
pub struct CombinatorialKalmanFilter<P, U> {
    /// Search options
    pub config: FindingConfig,
    /// Propagation to the next surface
    pub propagator: P,
    /// Measurement update
    pub updater: U,
}

impl<P, U> CombinatorialKalmanFilter<P, U> {
    /// Creates a filter, rejecting an invalid configuration.
    pub fn new(config: FindingConfig, propagator: P, updater: U) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            propagator,
            updater,
        })
    }

    /// Finds tracks starting from `seeds` among `measurements`.
    ///
    /// Seed `i` enters step 0 as slot `i`, its parameters being the
    /// prediction on the first surface. Survivors of every step are
    /// propagated in parallel; a candidate the propagator drops has left
    /// the detector and ends at its current link. The loop stops after
    /// `max_steps` steps or once no candidate is alive.
    pub fn find_tracks<T>(
        &self,
        seeds: &[BoundTrackParameters<T>],
        measurements: &MeasurementIndex<T>,
    ) -> Result<FindingOutput<T>>
    where
        T: TrackScalar,
        P: Propagator<T>,
        U: MeasurementUpdater<T>,
    {
        let mut search = CkfSearch::new(self.config.clone(), seeds.len())?;
        let mut batch: Vec<Option<Slot<T>>> =
            seeds.iter().cloned().map(|seed| Some(Slot::seed(seed))).collect();

        while !search.is_complete() && !batch.is_empty() {
            let survivors = search.expand(&batch, measurements, &self.updater)?;

            let propagated: Vec<(usize, Option<BoundTrackParameters<T>>)> = survivors
                .par_iter()
                .map(|candidate| (candidate.link, self.propagator.propagate(&candidate.parameters)))
                .collect();

            batch = Vec::with_capacity(propagated.len());
            for (link, predicted) in propagated {
                match predicted {
                    Some(predicted) => batch.push(Some(Slot::continuing(link, predicted))),
                    None => {
                        search.terminate(link)?;
                    }
                }
            }
        }

        let steps = search.step();
        let (links, tips) = search.finish();
        let tracks = assemble_tracks(&links, &tips, seeds, measurements);

        tracing::info!(
            seeds = seeds.len(),
            measurements = measurements.len(),
            steps,
            links = links.len(),
            tips = tips.len(),
            tracks = tracks.len(),
            "track finding finished"
        );

        Ok(FindingOutput {
            tracks,
            links,
            tips,
            steps,
        })
    }
}
