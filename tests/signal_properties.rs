// tests/signal_properties.rs
//! Property tests for the signal utilities

use b3d_post::config::constants::signal::MIN_CUTOFF_FREQUENCY_HZ;
use b3d_post::processing::{
    estimate_matrix_cutoff, lowpass_filter, repair_boundaries, resample_discrete, resample_poly,
};
use ndarray::Array2;
use proptest::prelude::*;

proptest! {
    #[test]
    fn discrete_same_rate_is_identity(signal in prop::collection::vec(0u8..10, 0..200), rate in 1u32..1000) {
        let rate = rate as f64;
        prop_assert_eq!(resample_discrete(&signal, rate, rate), signal);
    }

    #[test]
    fn discrete_indices_are_monotonic_and_in_bounds(
        len in 1usize..300,
        old_rate in 1u32..500,
        new_rate in 1u32..500,
    ) {
        // Resampling the index sequence itself exposes the chosen source indices
        let indices: Vec<usize> = (0..len).collect();
        let picked = resample_discrete(&indices, old_rate as f64, new_rate as f64);

        prop_assert!(picked.iter().all(|&i| i < len));
        prop_assert!(picked.windows(2).all(|w| w[0] <= w[1]));
        prop_assert_eq!(picked.first().copied(), Some(0));
    }

    #[test]
    fn matrix_cutoff_is_floored(
        values in prop::collection::vec(-10.0f64..10.0, 16..256),
        rate in 10u32..500,
    ) {
        let frames = values.len();
        let matrix = Array2::from_shape_vec((1, frames), values).unwrap();
        let cutoff = estimate_matrix_cutoff(matrix.view(), rate as f64);
        prop_assert!(cutoff >= MIN_CUTOFF_FREQUENCY_HZ);
        prop_assert!(cutoff <= rate as f64 / 2.0 + 1e-9);
    }

    #[test]
    fn repaired_boundaries_match_neighbors(
        values in prop::collection::vec(-100.0f64..100.0, 2..64),
        rows in 1usize..4,
    ) {
        let frames = values.len();
        let mut matrix = Array2::from_shape_fn((rows, frames), |(r, c)| values[c] * (r + 1) as f64);
        repair_boundaries(&mut matrix);
        for row in matrix.rows() {
            prop_assert_eq!(row[0], row[1]);
            prop_assert_eq!(row[frames - 1], row[frames - 2]);
        }
    }

    #[test]
    fn poly_resampling_preserves_rows(
        rows in 1usize..5,
        frames in 1usize..80,
        up in 1usize..6,
        down in 1usize..6,
    ) {
        let matrix = Array2::from_shape_fn((rows, frames), |(r, c)| (r * frames + c) as f64);
        let resampled = resample_poly(matrix.view(), up, down).unwrap();
        prop_assert_eq!(resampled.nrows(), rows);
        prop_assert_eq!(resampled.ncols(), (frames * up).div_ceil(down));
    }

    #[test]
    fn lowpass_keeps_constants(level in -50.0f64..50.0, frames in 13usize..200) {
        let filtered = lowpass_filter(&vec![level; frames], 3, 5.0, 100.0).unwrap();
        prop_assert!(filtered.iter().all(|y| (y - level).abs() < 1e-6 * level.abs().max(1.0)));
    }
}
