//! Hole insertion
//!
//! A slot that found no acceptable measurement in a step is not dropped
//! right away. It may continue through a hole, a link without a
//! measurement, as long as its seed has branches left and its own hole
//! budget is not spent.

use num_traits::Float;

use super::expander::{Candidate, Slot, StepContext};
use super::links::CandidateLink;
use crate::types::TrackScalar;
use crate::Result;

/// Extends (or terminates) a slot that produced no accepted child.
///
/// - Seed budget spent: the slot dies silently.
/// - Hole budget spent: the branch ends at its current link, which becomes
///   a tip when long enough. At step 0 there is no current link, so
///   nothing is recorded.
/// - Otherwise a hole link is appended. On the last step that hole is the
///   terminal link and may become a tip; before it, the slot continues
///   with its prediction unchanged.
pub(crate) fn insert_hole<T: TrackScalar, U>(
    ctx: &StepContext<'_, T, U>,
    slot_index: usize,
    slot: &Slot<T>,
) -> Result<Option<Candidate<T>>> {
    let seed = ctx.seed_of(slot_index, slot);
    if !ctx.branches.try_reserve(seed) {
        return Ok(None);
    }

    let parent = slot.link.map(|index| (index, *ctx.links.link(index)));
    let skipped = parent.map_or(0, |(_, link)| link.skipped);

    if skipped >= ctx.max_holes {
        if let Some((index, link)) = parent {
            ctx.record_tip_if_long_enough(index, &link)?;
        }
        return Ok(None);
    }

    let hole = CandidateLink {
        step: ctx.step,
        previous: slot.link,
        measurement: None,
        seed,
        skipped: skipped + 1,
        chi2: <T as Float>::max_value(),
    };
    let index = ctx.links.push(hole)?;

    if ctx.last_step {
        ctx.record_tip_if_long_enough(index, &hole)?;
        return Ok(None);
    }

    Ok(Some(Candidate {
        link: index,
        parameters: slot.predicted.clone(),
    }))
}
