// src/config/constants.rs
//! System-wide configuration constants

/// Signal processing constants
pub mod signal {
    /// Trials with this many frames or fewer are too short to filter
    pub const MIN_FILTERABLE_FRAMES: usize = 12;
    pub const CUTOFF_POWER_FRACTION: f64 = 0.99;
    pub const MIN_CUTOFF_FREQUENCY_HZ: f64 = 1.0;
    pub const MAX_WELCH_SEGMENT_SAMPLES: usize = 1024;
    pub const LOWPASS_FILTER_ORDER: usize = 3;
    pub const MIN_FILTER_ORDER: usize = 1;
    pub const MAX_FILTER_ORDER: usize = 8;

    // Polyphase resampler design
    pub const RESAMPLE_KAISER_BETA: f64 = 5.0;
    pub const RESAMPLE_HALF_LEN_FACTOR: usize = 10;
}

/// Physical plausibility thresholds
pub mod physics {
    /// Plates carrying less force than this are treated as unloaded
    pub const COP_FORCE_THRESHOLD_N: f64 = 1e-3;
    /// A bit more than one foot length
    pub const COP_MAX_FOOT_DISTANCE_M: f64 = 0.35;
    pub const DEFAULT_GRAVITY: [f64; 3] = [0.0, -9.81, 0.0];
}

/// Recompute-values pass constants
pub mod recompute {
    pub const DEFAULT_ROOT_HISTORY_LEN: usize = 5;
    pub const DEFAULT_ROOT_HISTORY_STRIDE: usize = 1;
    pub const MAX_ROOT_HISTORY_LEN: usize = 256;
}

/// File and folder naming
pub mod paths {
    pub const RECORD_EXTENSION: &str = "b3d";
    pub const DEFAULT_REVIEW_FOLDER: &str = "trials";
    pub const REVIEW_FILE_NAME: &str = "review.json";
    pub const REVIEW_FLAGS_KEY: &str = "missing_grf_data";
    pub const SEGMENT_FOLDER_PREFIX: &str = "segment_";
    pub const DEFAULT_GEOMETRY_FOLDER: &str = "Geometry";
    pub const ENV_PREFIX: &str = "B3D_POST";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_constants_consistency() {
        assert!(signal::MIN_FILTER_ORDER <= signal::LOWPASS_FILTER_ORDER);
        assert!(signal::LOWPASS_FILTER_ORDER <= signal::MAX_FILTER_ORDER);
        // filtfilt pads 3 * (order + 1) samples and needs strictly more than that
        assert_eq!(signal::MIN_FILTERABLE_FRAMES, 3 * (signal::LOWPASS_FILTER_ORDER + 1));
        assert!(signal::CUTOFF_POWER_FRACTION > 0.0 && signal::CUTOFF_POWER_FRACTION < 1.0);
    }

    #[test]
    fn test_recompute_constants() {
        assert!(recompute::DEFAULT_ROOT_HISTORY_STRIDE >= 1);
        assert!(recompute::DEFAULT_ROOT_HISTORY_LEN <= recompute::MAX_ROOT_HISTORY_LEN);
    }
}
