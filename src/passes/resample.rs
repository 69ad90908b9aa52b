// src/passes/resample.rs
//! Change every trial of a record to a common sample rate

use crate::error::{PostErrorBuilder, PostResult, Stage};
use crate::processing::resampling::{resample_discrete_to_length, resample_to_rate};
use crate::record::{Record, Trial};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResampleSummary {
    pub resampled: usize,
    pub unchanged: usize,
}

/// Resample every trial not already at `target_hz`
///
/// Force plates, pass resampling matrices and missing-GRF reasons all move to
/// the new rate together. Marker, IMU and EMG channels cannot be resampled and
/// are replaced with empty per-frame placeholders. Poses, velocities and
/// accelerations are regenerated from the resampling matrices, but torques and
/// residuals are stale until values are recomputed.
pub fn resample_record(record: &mut Record, target_hz: u32) -> PostResult<ResampleSummary> {
    if target_hz == 0 {
        return Err(PostErrorBuilder::new("resample").processing(Stage::Resample, "target sample rate must be positive"));
    }
    warn!("resampling marker, IMU and EMG observations is not supported; they will be cleared");

    let mut summary = ResampleSummary::default();
    for trial in &mut record.trials {
        if resample_trial(trial, target_hz)? {
            summary.resampled += 1;
        } else {
            summary.unchanged += 1;
        }
    }

    info!(
        target_hz,
        resampled = summary.resampled,
        unchanged = summary.unchanged,
        "resampling complete"
    );
    Ok(summary)
}

/// Resample one trial; returns `false` when it was already at `target_hz`
pub fn resample_trial(trial: &mut Trial, target_hz: u32) -> PostResult<bool> {
    let original_hz = trial.sample_rate_hz();
    if original_hz == 0 {
        return Err(PostErrorBuilder::new("resample").processing(
            Stage::Resample,
            &format!("trial {} has non-positive timestep {}", trial.original_name, trial.timestep),
        ));
    }
    if original_hz == target_hz {
        debug!(trial = %trial.original_name, hz = target_hz, "already at target rate");
        return Ok(false);
    }

    trial.timestep = 1.0 / target_hz as f64;

    let mut frames = None;
    for plate in &mut trial.force_plates {
        let matrix = resample_to_rate(plate.resampling_matrix().view(), original_hz, target_hz)?;
        let heights = resample_discrete_to_length(
            &plate.ground_heights,
            original_hz as f64,
            target_hz as f64,
            matrix.ncols(),
        );
        plate.set_resampling_matrix(&matrix, heights)?;
        frames = Some(matrix.ncols());
    }

    for pass in &mut trial.passes {
        let matrix = resample_to_rate(pass.resampling_matrix().view(), original_hz, target_hz)?;
        frames = Some(matrix.ncols());
        pass.set_resampling_matrix(matrix)?;
    }

    let frames = frames.unwrap_or_else(|| {
        (trial.missing_grf_reason.len() as f64 * target_hz as f64 / original_hz as f64).ceil() as usize
    });
    trial.missing_grf_reason = resample_discrete_to_length(
        &trial.missing_grf_reason,
        original_hz as f64,
        target_hz as f64,
        frames,
    );
    trial.clear_sensor_observations(frames);

    info!(
        trial = %trial.original_name,
        from_hz = original_hz,
        to_hz = target_hz,
        frames,
        "trial resampled"
    );
    Ok(true)
}
