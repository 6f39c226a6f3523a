//! Load-balanced step expansion
//!
//! One navigation step takes the live slots, pairs every slot with the
//! measurements on its surface and runs the measurement update for each
//! pair. The number of measurements per slot varies wildly, so slots do
//! not process their own pairs. Within a group of `group_width` slots, all
//! pairs are pushed into a shared bounded buffer and drained in waves of
//! `group_width` pairs by whichever worker is free. A wave runs four
//! lockstep phases:
//!
//! 1. buffer reset (once per group)
//! 2. enqueue: slots push pending pairs until the buffer is full
//! 3. process: the first `group_width` pairs are updated in parallel
//! 4. compaction: unprocessed pairs move to the front for the next wave
//!
//! Groups run in parallel and share nothing but the link table, the tip
//! collector and the branch counters.

use core::ops::Range;
use core::sync::atomic::{AtomicU32, Ordering};

use rayon::prelude::*;

use super::budget::SeedBranchCounter;
use super::holes::insert_hole;
use super::links::{CandidateLink, LinkTable, TipCollector};
use crate::models::MeasurementUpdater;
use crate::types::measurement::MeasurementIndex;
use crate::types::parameters::BoundTrackParameters;
use crate::types::TrackScalar;
use crate::Result;

// ============================================================================
// Slots and Candidates
// ============================================================================

/// A live candidate entering a step.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot<T: TrackScalar> {
    /// Current link of the candidate; `None` at step 0, where the slot
    /// index is the seed index
    pub link: Option<usize>,
    /// Prediction on the surface the candidate crosses in this step
    pub predicted: BoundTrackParameters<T>,
}

impl<T: TrackScalar> Slot<T> {
    /// Creates the step-0 slot of a seed.
    pub fn seed(parameters: BoundTrackParameters<T>) -> Self {
        Self {
            link: None,
            predicted: parameters,
        }
    }

    /// Creates a slot continuing from an existing link.
    pub fn continuing(link: usize, predicted: BoundTrackParameters<T>) -> Self {
        Self {
            link: Some(link),
            predicted,
        }
    }
}

/// A candidate leaving a step, to be propagated to the next surface.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<T: TrackScalar> {
    /// Link created for the candidate in this step
    pub link: usize,
    /// Filtered state (or the unchanged prediction after a hole)
    pub parameters: BoundTrackParameters<T>,
}

// ============================================================================
// Step Context
// ============================================================================

/// Everything one step shares between its groups.
pub(crate) struct StepContext<'a, T: TrackScalar, U> {
    pub links: &'a LinkTable<T>,
    pub tips: &'a TipCollector,
    pub branches: &'a SeedBranchCounter,
    pub measurements: &'a MeasurementIndex<T>,
    pub updater: &'a U,
    pub step: usize,
    pub last_step: bool,
    pub chi2_max: T,
    pub max_holes: usize,
    pub min_length: usize,
}

impl<T: TrackScalar, U> StepContext<'_, T, U> {
    /// Seed of a slot: inherited from its link, or the slot index at step 0.
    pub fn seed_of(&self, slot_index: usize, slot: &Slot<T>) -> usize {
        match slot.link {
            Some(link) => self.links.link(link).seed,
            None => slot_index,
        }
    }

    /// Records `link` as a tip if the chain ending there is long enough.
    pub fn record_tip_if_long_enough(&self, index: usize, link: &CandidateLink<T>) -> Result<()> {
        if link.chain_length() >= self.min_length {
            self.tips.push(index)?;
        }
        Ok(())
    }
}

/// Per-step totals, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepSummary {
    /// Slots that entered the step alive
    pub live_slots: usize,
    /// Measurement extensions accepted
    pub accepted: usize,
    /// Hole links appended
    pub holes: usize,
    /// Candidates continuing to the next step
    pub survivors: usize,
}

impl core::ops::AddAssign for StepSummary {
    fn add_assign(&mut self, other: Self) {
        self.live_slots += other.live_slots;
        self.accepted += other.accepted;
        self.holes += other.holes;
        self.survivors += other.survivors;
    }
}

// ============================================================================
// Work Buffer
// ============================================================================

/// A (measurement position, group-local slot) pair awaiting an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WorkItem {
    measurement: usize,
    slot: usize,
}

/// Bounded buffer shared by the workers of one group.
///
/// Holds up to two waves so that slots with many measurements can keep
/// filling while the front wave is processed.
#[derive(Debug)]
struct WorkBuffer {
    items: Vec<WorkItem>,
    capacity: usize,
}

impl WorkBuffer {
    fn new(width: usize) -> Self {
        Self {
            items: Vec::with_capacity(2 * width),
            capacity: 2 * width,
        }
    }

    /// Enqueue phase: every slot pushes pending pairs while room remains.
    fn fill(&mut self, pending: &mut [Range<usize>]) {
        for (slot, range) in pending.iter_mut().enumerate() {
            while self.items.len() < self.capacity {
                match range.next() {
                    Some(measurement) => self.items.push(WorkItem { measurement, slot }),
                    None => break,
                }
            }
        }
    }

    /// The pairs processed in the current wave.
    fn wave(&self, width: usize) -> &[WorkItem] {
        &self.items[..self.items.len().min(width)]
    }

    /// Compaction phase: drop the processed wave, keep the overflow.
    fn compact(&mut self, width: usize) {
        let processed = self.items.len().min(width);
        self.items.drain(..processed);
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ============================================================================
// Expansion
// ============================================================================

/// Expands all slots of one step; returns the continuing candidates.
pub(crate) fn expand_step<T, U>(
    ctx: &StepContext<'_, T, U>,
    batch: &[Option<Slot<T>>],
    group_width: usize,
) -> Result<(Vec<Candidate<T>>, StepSummary)>
where
    T: TrackScalar,
    U: MeasurementUpdater<T>,
{
    let groups: Vec<(Vec<Candidate<T>>, StepSummary)> = batch
        .par_chunks(group_width)
        .enumerate()
        .map(|(group, slots)| expand_group(ctx, slots, group * group_width))
        .collect::<Result<_>>()?;

    let mut survivors = Vec::new();
    let mut summary = StepSummary::default();
    for (candidates, group_summary) in groups {
        survivors.extend(candidates);
        summary += group_summary;
    }
    Ok((survivors, summary))
}

fn expand_group<T, U>(
    ctx: &StepContext<'_, T, U>,
    slots: &[Option<Slot<T>>],
    first_slot: usize,
) -> Result<(Vec<Candidate<T>>, StepSummary)>
where
    T: TrackScalar,
    U: MeasurementUpdater<T>,
{
    let width = slots.len();
    let mut pending: Vec<Range<usize>> = slots
        .iter()
        .map(|slot| match slot {
            Some(slot) => ctx.measurements.surface_range(slot.predicted.surface),
            None => 0..0,
        })
        .collect();
    let accepted: Vec<AtomicU32> = (0..width).map(|_| AtomicU32::new(0)).collect();

    let mut buffer = WorkBuffer::new(width);
    let mut survivors = Vec::new();
    let mut summary = StepSummary {
        live_slots: slots.iter().filter(|s| s.is_some()).count(),
        ..StepSummary::default()
    };

    loop {
        buffer.fill(&mut pending);
        if buffer.is_empty() {
            break;
        }

        let wave = buffer.wave(width);
        tracing::trace!(step = ctx.step, first_slot, pairs = wave.len(), "processing wave");
        let outcomes: Vec<Option<Candidate<T>>> = wave
            .par_iter()
            .map(|item| process_pair(ctx, slots, first_slot, &accepted, *item))
            .collect::<Result<_>>()?;
        survivors.extend(outcomes.into_iter().flatten());

        buffer.compact(width);
    }

    summary.accepted = accepted
        .iter()
        .map(|a| a.load(Ordering::Acquire) as usize)
        .sum();

    for (local, slot) in slots.iter().enumerate() {
        let Some(slot) = slot else { continue };
        if accepted[local].load(Ordering::Acquire) > 0 {
            continue;
        }
        if let Some(candidate) = insert_hole(ctx, first_slot + local, slot)? {
            summary.holes += 1;
            survivors.push(candidate);
        }
    }

    summary.survivors = survivors.len();
    Ok((survivors, summary))
}

/// Process phase for one pair.
///
/// Returns the continuing candidate if the extension was accepted and the
/// search goes on after this step.
fn process_pair<T, U>(
    ctx: &StepContext<'_, T, U>,
    slots: &[Option<Slot<T>>],
    first_slot: usize,
    accepted: &[AtomicU32],
    item: WorkItem,
) -> Result<Option<Candidate<T>>>
where
    T: TrackScalar,
    U: MeasurementUpdater<T>,
{
    let Some(slot) = slots[item.slot].as_ref() else {
        return Ok(None);
    };
    let seed = ctx.seed_of(first_slot + item.slot, slot);

    // A spent seed skips the update entirely; the slot may fall through to
    // hole insertion, which checks the same budget.
    if ctx.branches.is_saturated(seed) {
        return Ok(None);
    }

    let measurement = match ctx.measurements.get(item.measurement) {
        Some(measurement) => measurement,
        None => panic!(
            "measurement position {} outside the index ({} measurements)",
            item.measurement,
            ctx.measurements.len()
        ),
    };
    let Some(outcome) = ctx.updater.update(&slot.predicted, measurement) else {
        return Ok(None);
    };
    // NaN fails this comparison too
    if !(outcome.chi2 < ctx.chi2_max) {
        return Ok(None);
    }
    if !ctx.branches.try_reserve(seed) {
        return Ok(None);
    }
    accepted[item.slot].fetch_add(1, Ordering::AcqRel);

    let skipped = slot.link.map_or(0, |parent| ctx.links.link(parent).skipped);
    let link = CandidateLink {
        step: ctx.step,
        previous: slot.link,
        measurement: Some(item.measurement),
        seed,
        skipped,
        chi2: outcome.chi2,
    };
    let index = ctx.links.push(link)?;

    if ctx.last_step {
        ctx.record_tip_if_long_enough(index, &link)?;
        return Ok(None);
    }

    Ok(Some(Candidate {
        link: index,
        parameters: outcome.filtered,
    }))
}
