//! Integration tests for the combinatorial Kalman filter search
//!
//! Tests cover:
//! - Single clean candidates with and without holes
//! - Branching on ambiguous measurements
//! - Per-seed branch budget
//! - Navigation exit and hole budget termination
//! - Arena overflow
//! - Telescope detector with the Kalman updater

mod common;

use common::*;
use tracktor_ckf::prelude::*;

fn filter<U>(
    config: FindingConfig,
    layers: u64,
    updater: U,
) -> CombinatorialKalmanFilter<SurfaceStepper, U> {
    CombinatorialKalmanFilter::new(config, SurfaceStepper { layers }, updater).unwrap()
}

#[cfg(test)]
mod single_candidate {
    use super::*;

    #[test]
    fn test_three_clean_steps() {
        let config = FindingConfig::default()
            .with_max_steps(3)
            .with_max_holes_per_candidate(0)
            .with_min_candidate_length(3);
        let ckf = filter(config, 10, FixedChi2Updater(0.1));
        let index = MeasurementIndex::new(make_pixels_on(&[0, 1, 2], 0));

        let output = ckf.find_tracks(&[make_seed(0)], &index).unwrap();

        assert_eq!(output.tips.len(), 1);
        assert_eq!(output.links.len(), 3);
        assert_eq!(output.steps, 3);

        let track = &output.tracks[0];
        let ids: Vec<u64> = track.measurements.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert!((track.chi2 - 0.3).abs() < 1e-12);
        assert_eq!(track.ndf, 1);
        assert_eq!(track.holes, 0);
        assert_eq!(track.seed_index, 0);
        assert!(track.p_value > 0.0 && track.p_value < 1.0);
    }

    #[test]
    fn test_strips_count_one_dimension() {
        let config = FindingConfig::default().with_max_steps(3);
        let ckf = filter(config, 10, FixedChi2Updater(0.1));
        let index =
            MeasurementIndex::new(vec![make_strip(0, 0), make_strip(1, 1), make_pixel(2, 2)]);

        let output = ckf.find_tracks(&[make_seed(0)], &index).unwrap();

        // 1 + 1 + 2 dimensions against 5 parameters
        assert_eq!(output.tracks[0].ndf, -1);
        assert_eq!(output.tracks[0].p_value, 0.0);
    }

    #[test]
    fn test_single_hole_step() {
        let config = FindingConfig::default()
            .with_max_steps(1)
            .with_max_holes_per_candidate(1)
            .with_min_candidate_length(0);
        let ckf = filter(config, 10, FixedChi2Updater(0.1));

        let output = ckf.find_tracks(&[make_seed(0)], &MeasurementIndex::empty()).unwrap();

        assert_eq!(output.tips.len(), 1);
        let tip = output.links.link(output.tips.to_vec()[0]);
        assert!(tip.is_hole());
        assert_eq!(tip.skipped, 1);

        let track = &output.tracks[0];
        assert!(track.is_empty());
        assert_eq!(track.holes, 1);
        assert_eq!(track.ndf, -5);
        assert_eq!(track.p_value, 0.0);
    }

    #[test]
    fn test_hole_between_measurements() {
        let config = FindingConfig::default()
            .with_max_steps(3)
            .with_max_holes_per_candidate(1)
            .with_min_candidate_length(2);
        let ckf = filter(config, 10, FixedChi2Updater(0.5));
        let index = MeasurementIndex::new(make_pixels_on(&[0, 2], 0));

        let output = ckf.find_tracks(&[make_seed(0)], &index).unwrap();

        assert_eq!(output.tracks.len(), 1);
        let track = &output.tracks[0];
        let ids: Vec<u64> = track.measurements.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![0, 1]);
        assert!((track.chi2 - 1.0).abs() < 1e-12);

        let tip = output.links.link(track.tip);
        assert_eq!(tip.step, 2);
        assert_eq!(tip.skipped, 1);
        assert_eq!(tip.chain_length(), 2);
    }
}

#[cfg(test)]
mod termination {
    use super::*;

    #[test]
    fn test_navigation_exit_records_tip() {
        let config = FindingConfig::default()
            .with_max_steps(5)
            .with_min_candidate_length(2);
        let ckf = filter(config, 2, FixedChi2Updater(0.1));
        let index = MeasurementIndex::new(make_pixels_on(&[0, 1], 0));

        let output = ckf.find_tracks(&[make_seed(0)], &index).unwrap();

        // The stepper drops the candidate after surface 1
        assert_eq!(output.steps, 2);
        assert_eq!(output.tracks.len(), 1);
        assert_eq!(output.tracks[0].len(), 2);
    }

    #[test]
    fn test_short_exit_is_discarded() {
        let config = FindingConfig::default()
            .with_max_steps(5)
            .with_min_candidate_length(3);
        let ckf = filter(config, 2, FixedChi2Updater(0.1));
        let index = MeasurementIndex::new(make_pixels_on(&[0, 1], 0));

        let output = ckf.find_tracks(&[make_seed(0)], &index).unwrap();

        assert!(output.tracks.is_empty());
        assert_eq!(output.links.len(), 2);
    }

    #[test]
    fn test_exhausted_hole_budget_ends_at_current_link() {
        let config = FindingConfig::default()
            .with_max_steps(4)
            .with_max_holes_per_candidate(1)
            .with_min_candidate_length(1);
        let ckf = filter(config, 10, FixedChi2Updater(0.1));
        let index = MeasurementIndex::new(make_pixels_on(&[0], 0));

        let output = ckf.find_tracks(&[make_seed(0)], &index).unwrap();

        // Step 0 measurement, step 1 hole, step 2 ends the branch at the hole
        assert_eq!(output.links.len(), 2);
        assert_eq!(output.steps, 3);
        assert_eq!(output.tracks.len(), 1);

        let track = &output.tracks[0];
        assert_eq!(track.len(), 1);
        assert!(output.links.link(track.tip).is_hole());
    }

    #[test]
    fn test_failing_updates_without_holes_find_nothing() {
        let config = FindingConfig::default()
            .with_max_holes_per_candidate(0)
            .with_min_candidate_length(0);
        let ckf = filter(config, 10, FailingUpdater);
        let index = MeasurementIndex::new(make_pixels_on(&[0, 1, 2], 0));

        let output = ckf.find_tracks(&[make_seed(0), make_seed(0)], &index).unwrap();

        assert!(output.links.is_empty());
        assert!(output.tips.is_empty());
        assert!(output.tracks.is_empty());
        assert_eq!(output.steps, 1);
    }

    #[test]
    fn test_no_seeds() {
        let ckf = filter(FindingConfig::default(), 10, FixedChi2Updater(0.1));
        let index = MeasurementIndex::new(make_pixels_on(&[0, 1, 2], 0));

        let output = ckf.find_tracks(&[], &index).unwrap();

        assert!(output.tracks.is_empty());
        assert_eq!(output.steps, 0);
    }
}

#[cfg(test)]
mod branching {
    use super::*;

    #[test]
    fn test_ambiguous_hits_branch() {
        let config = FindingConfig::default()
            .with_max_steps(2)
            .with_min_candidate_length(2);
        let ckf = filter(config, 10, FixedChi2Updater(0.1));
        let mut hits = make_pixels_on(&[0, 0, 0], 0);
        hits.push(make_pixel(10, 1));
        let index = MeasurementIndex::new(hits);

        let output = ckf.find_tracks(&[make_seed(0)], &index).unwrap();

        assert_eq!(output.links.len(), 6);
        assert_eq!(output.tracks.len(), 3);

        let mut firsts: Vec<u64> = output.tracks.iter().map(|t| t.measurements[0].id).collect();
        firsts.sort_unstable();
        assert_eq!(firsts, vec![0, 1, 2]);
        assert!(output.tracks.iter().all(|t| t.measurements[1].id == 10));
    }

    #[test]
    fn test_chi2_cut_is_exclusive() {
        let config = FindingConfig::default()
            .with_max_steps(1)
            .with_max_holes_per_candidate(0)
            .with_min_candidate_length(0)
            .with_chi2_max(0.5);
        let ckf = filter(config, 10, FixedChi2Updater(0.5));
        let index = MeasurementIndex::new(make_pixels_on(&[0], 0));

        let output = ckf.find_tracks(&[make_seed(0)], &index).unwrap();
        assert!(output.links.is_empty());
    }

    #[test]
    fn test_branch_cap_per_seed() {
        let config = FindingConfig::default()
            .with_max_steps(1)
            .with_max_branches_per_seed(1)
            .with_min_candidate_length(1);
        let ckf = filter(config, 10, FixedChi2Updater(0.1));
        let index = MeasurementIndex::new(make_pixels_on(&[0, 0], 0));

        let output = ckf.find_tracks(&[make_seed(0), make_seed(0)], &index).unwrap();

        // Which hit each seed keeps is not fixed, the counts are
        assert_eq!(output.links.len(), 2);
        assert_eq!(output.tracks.len(), 2);
        let mut seeds: Vec<usize> = output.tracks.iter().map(|t| t.seed_index).collect();
        seeds.sort_unstable();
        assert_eq!(seeds, vec![0, 1]);
        assert!(output.tracks.iter().all(|t| t.len() == 1));
    }

    #[test]
    fn test_branch_cap_stops_hole_insertion() {
        let config = FindingConfig::default()
            .with_max_steps(3)
            .with_max_branches_per_seed(2)
            .with_min_candidate_length(0);
        let ckf = filter(config, 10, FixedChi2Updater(0.1));

        let output = ckf.find_tracks(&[make_seed(0)], &MeasurementIndex::empty()).unwrap();

        // Two holes use up the budget; the third step cannot append anything
        assert_eq!(output.links.len(), 2);
        assert!(output.tracks.is_empty());
    }

    #[test]
    fn test_racing_hits_fill_the_cap_exactly() {
        const CAP: usize = 5;
        let mut hits: Vec<_> = (0..200).map(|id| make_pixel(id, 0)).collect();
        hits.extend((200..210).map(|id| make_pixel(id, 1)));
        let index = MeasurementIndex::new(hits);

        for width in [1, 3, 64] {
            let config = FindingConfig::default()
                .with_max_steps(3)
                .with_max_branches_per_seed(CAP)
                .with_group_width(width);
            let mut search = CkfSearch::<f64>::new(config, 1).unwrap();
            let updater = CountingUpdater::default();

            let survivors = search
                .expand(&[Some(Slot::seed(make_seed(0)))], &index, &updater)
                .unwrap();

            assert_eq!(search.links().len(), CAP, "group width {width}");
            assert_eq!(survivors.len(), CAP);
            assert_eq!(search.branches().count(0), CAP as u32);
            // A lone slot drains its pairs one per wave, so once the seed
            // is saturated no further update runs
            assert_eq!(updater.calls(), CAP, "group width {width}");

            // Saturated before the step starts: no update, no link, no hole
            updater.reset();
            let batch: Vec<_> = survivors
                .iter()
                .map(|c| Some(Slot::continuing(c.link, c.parameters.on_surface(SurfaceId(1)))))
                .collect();
            let next = search.expand(&batch, &index, &updater).unwrap();

            assert_eq!(updater.calls(), 0);
            assert!(next.is_empty());
            assert_eq!(search.links().len(), CAP);
        }
    }

    #[test]
    fn test_sibling_slots_race_for_the_cap() {
        const CAP: usize = 20;
        let mut hits: Vec<_> = (0..4).map(|id| make_pixel(id, 0)).collect();
        hits.extend((100..150).map(|id| make_pixel(id, 1)));
        let index = MeasurementIndex::new(hits);

        for width in [1, 3, 64] {
            let config = FindingConfig::default()
                .with_max_steps(3)
                .with_max_branches_per_seed(CAP)
                .with_group_width(width);
            let mut search = CkfSearch::<f64>::new(config, 1).unwrap();
            let updater = CountingUpdater::default();

            let survivors = search
                .expand(&[Some(Slot::seed(make_seed(0)))], &index, &updater)
                .unwrap();
            assert_eq!(survivors.len(), 4);

            // Four sibling slots, 200 passing pairs, 16 branches left
            updater.reset();
            let batch: Vec<_> = survivors
                .iter()
                .map(|c| Some(Slot::continuing(c.link, c.parameters.on_surface(SurfaceId(1)))))
                .collect();
            let next = search.expand(&batch, &index, &updater).unwrap();

            assert_eq!(search.links().len(), CAP, "group width {width}");
            assert_eq!(next.len(), CAP - 4);
            assert!(search.branches().is_saturated(0));
            // Only pairs already in flight when the cap is reached may
            // still run an update, at most one per slot
            assert!(updater.calls() >= CAP - 4);
            assert!(updater.calls() <= CAP, "group width {width}");
        }
    }

    #[test]
    fn test_group_width_does_not_change_result_size() {
        let mut hits = Vec::new();
        for surface in 0..3 {
            hits.extend((0..3).map(|i| make_pixel(surface * 10 + i, surface)));
        }
        let index = MeasurementIndex::new(hits);
        let seeds: Vec<_> = (0..5).map(|_| make_seed(0)).collect();

        let sizes: Vec<(usize, usize)> = [1, 2, 7, 64]
            .into_iter()
            .map(|width| {
                let config = FindingConfig::default()
                    .with_max_steps(3)
                    .with_group_width(width);
                let output = filter(config, 10, FixedChi2Updater(0.1))
                    .find_tracks(&seeds, &index)
                    .unwrap();
                (output.links.len(), output.tracks.len())
            })
            .collect();

        // 3 + 9 + 27 = 39 links fit under the default cap of 64 per seed
        assert!(sizes.iter().all(|&size| size == (5 * 39, 5 * 27)));
    }
}

#[cfg(test)]
mod overflow {
    use super::*;

    #[test]
    fn test_tip_overflow_aborts() {
        let config = FindingConfig::default()
            .with_max_steps(1)
            .with_min_candidate_length(1);
        let mut search = CkfSearch::<f64>::with_capacity(config, 2, 8, 1).unwrap();
        let index = MeasurementIndex::new(make_pixels_on(&[0], 0));
        let batch = vec![Some(Slot::seed(make_seed(0))), Some(Slot::seed(make_seed(0)))];

        let err = search.expand(&batch, &index, &FixedChi2Updater(0.1)).unwrap_err();
        assert_eq!(err, CkfError::TipOverflow { capacity: 1 });
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = FindingConfig::default().with_max_steps(0);
        let result =
            CombinatorialKalmanFilter::new(config, SurfaceStepper { layers: 3 }, KalmanUpdater);
        assert!(matches!(result, Err(CkfError::InvalidConfig(_))));
    }
}

#[cfg(test)]
mod telescope {
    use super::*;

    const LAYERS: u64 = 6;
    const SPACING: f64 = 10.0;

    fn seed_for(origin: [f64; 2], slopes: [f64; 2]) -> BoundTrackParameters<f64> {
        BoundTrackParameters::with_diagonal_covariance(
            SurfaceId(0),
            nalgebra::vector![origin[0], origin[1], slopes[0], slopes[1], 0.01],
            &nalgebra::vector![1.0, 1.0, 1e-4, 1e-4, 1e-4],
        )
    }

    #[test]
    fn test_two_tracks_with_noise() {
        let mut hits = straight_track_hits(0, LAYERS, SPACING, [0.0, 0.0], [0.1, -0.05]);
        hits.extend(straight_track_hits(100, LAYERS, SPACING, [30.0, 5.0], [-0.2, 0.0]));
        // Far off both tracks
        hits.extend((0..LAYERS).map(|k| {
            Measurement::pixel(1000 + k, SurfaceId(k), [-60.0, 60.0], [0.01, 0.01])
        }));
        let index = MeasurementIndex::new(hits);

        let seeds = vec![seed_for([0.0, 0.0], [0.1, -0.05]), seed_for([30.0, 5.0], [-0.2, 0.0])];
        let config = FindingConfig::default()
            .with_max_steps(LAYERS as usize)
            .with_min_candidate_length(LAYERS as usize);
        let ckf = CombinatorialKalmanFilter::new(
            config,
            TelescopePropagator::new(LAYERS, SPACING, 0.0),
            KalmanUpdater,
        )
        .unwrap();

        let output = ckf.find_tracks(&seeds, &index).unwrap();

        assert_eq!(output.tracks.len(), 2);
        for track in &output.tracks {
            let first_id = if track.seed_index == 0 { 0 } else { 100 };
            let ids: Vec<u64> = track.measurements.iter().map(|m| m.id).collect();
            assert_eq!(ids, (first_id..first_id + LAYERS).collect::<Vec<_>>());
            assert_eq!(track.ndf, 2 * LAYERS as i32 - 5);
            assert!(track.chi2 < 1e-6);
            assert!(track.p_value > 0.99);
            assert_eq!(track.holes, 0);
        }
    }
}
