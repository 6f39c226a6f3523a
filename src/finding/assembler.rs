//! Track assembly
//!
//! After the last step, every tip is traced back through its parent links
//! to the seed. Holes are stepped over; the measurements met on the way
//! form the track, innermost first.

use std::collections::HashSet;

use statrs::distribution::{ChiSquared, ContinuousCDF};

use super::links::{LinkTable, TipCollector};
use crate::types::measurement::MeasurementIndex;
use crate::types::parameters::{BoundTrackParameters, BOUND_SIZE};
use crate::types::track::TrackCandidate;
use crate::types::TrackScalar;

/// Chi-square survival probability.
///
/// Returns 0 when `ndf` leaves no degree of freedom to test.
pub fn chi2_p_value(chi2: f64, ndf: i32) -> f64 {
    if ndf <= 0 || chi2.is_nan() {
        return 0.0;
    }
    ChiSquared::new(f64::from(ndf))
        .map(|distribution| distribution.sf(chi2.max(0.0)))
        .unwrap_or(0.0)
}

/// Assembles one track per tip, in tip order.
///
/// Pure with respect to its inputs: running it twice over the same link
/// table and tips yields identical tracks.
///
/// # Panics
/// Panics if a tip or parent index is outside the link table, a seed index
/// is outside `seeds`, the chain does not step back one step at a time, a
/// measurement appears twice on one track, or the number of measurements
/// differs from `step + 1 - skipped` of the tip. Each of these means the
/// link table is corrupt.
pub fn assemble_tracks<T: TrackScalar>(
    links: &LinkTable<T>,
    tips: &TipCollector,
    seeds: &[BoundTrackParameters<T>],
    measurements: &MeasurementIndex<T>,
) -> Vec<TrackCandidate<T>> {
    tips.iter()
        .map(|tip| assemble_track(links, tip, seeds, measurements))
        .collect()
}

fn assemble_track<T: TrackScalar>(
    links: &LinkTable<T>,
    tip: usize,
    seeds: &[BoundTrackParameters<T>],
    measurements: &MeasurementIndex<T>,
) -> TrackCandidate<T> {
    let tip_link = links.link(tip);
    let expected = tip_link.chain_length();

    let mut collected = Vec::with_capacity(expected);
    let mut seen: HashSet<usize> = HashSet::with_capacity(expected);
    let mut chi2 = T::zero();
    let mut dimensions = 0usize;

    let mut link = tip_link;
    loop {
        if let Some(position) = link.measurement {
            assert!(
                seen.insert(position),
                "measurement {position} appears twice on the track of tip {tip}"
            );
            let measurement = match measurements.get(position) {
                Some(measurement) => measurement,
                None => panic!(
                    "measurement position {position} outside the index ({} measurements)",
                    measurements.len()
                ),
            };
            dimensions += measurement.dimension();
            chi2 += link.chi2;
            collected.push(measurement.clone());
        }

        match link.previous {
            Some(previous) => {
                let parent = links.link(previous);
                // Steps strictly decrease, so the walk cannot revisit a link
                assert_eq!(
                    parent.step + 1,
                    link.step,
                    "link {previous} is not one step before its child"
                );
                link = parent;
            }
            None => break,
        }
    }

    assert_eq!(
        collected.len(),
        expected,
        "tip {tip} assembled {} measurements, expected {expected}",
        collected.len()
    );
    collected.reverse();

    let seed = match seeds.get(link.seed) {
        Some(seed) => seed.clone(),
        None => panic!("seed index {} outside {} seeds", link.seed, seeds.len()),
    };

    let ndf = dimensions as i32 - BOUND_SIZE as i32;
    let chi2_f64 = num_traits::ToPrimitive::to_f64(&chi2).unwrap_or(f64::NAN);
    let p_value = T::from_f64(chi2_p_value(chi2_f64, ndf)).unwrap_or_else(T::zero);

    TrackCandidate {
        tip,
        seed_index: link.seed,
        seed,
        measurements: collected,
        ndf,
        chi2,
        p_value,
        holes: link.skipped,
    }
}
