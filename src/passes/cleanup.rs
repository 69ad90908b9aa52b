// src/passes/cleanup.rs
//! Noise cleanup: append one lowpass-filtered pass per trial
//!
//! Each surviving trial gets a new `LowPassFilter` pass derived from its last
//! pass. The filtered root acceleration is then corrected so the body's COM
//! acceleration agrees with the measured ground reaction forces, and centers
//! of pressure that drifted far from every foot are pulled back in.

use super::drop_list::{DropList, DropReason};
use crate::config::constants::physics::{COP_FORCE_THRESHOLD_N, COP_MAX_FOOT_DISTANCE_M};
use crate::config::constants::signal::{LOWPASS_FILTER_ORDER, MIN_FILTERABLE_FRAMES};
use crate::error::{PostErrorBuilder, PostResult};
use crate::processing::filters::{butterworth_lowpass, filtfilt_rows, repair_boundaries};
use crate::processing::spectrum::estimate_matrix_cutoff;
use crate::record::{LowpassSettings, PassKind, ProcessingPass, Record, Trial};
use crate::skeleton::{evaluate, PassSkeletons, Skeleton, SkeletonLoader, ROOT_TRANSLATION_DOFS};
use nalgebra::Vector3;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupSummary {
    pub filtered: usize,
    pub dropped: usize,
    pub projected_cops: usize,
}

/// Outcome of cleaning one trial
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrialCleanup {
    Filtered { cutoff_hz: f64, projected_cops: usize },
    Dropped(DropReason),
}

/// Append a lowpass pass type to the record and a filtered pass to every trial not yet dropped
pub fn clean_up_record(
    record: &mut Record,
    skeletons: &mut PassSkeletons,
    loader: &dyn SkeletonLoader,
    geometry_folder: &Path,
    drops: &mut DropList,
) -> PostResult<CleanupSummary> {
    record.append_pass_type(PassKind::LowPassFilter);
    skeletons.push_inherited(loader, geometry_folder)?;
    let skeleton = skeletons.last_mut()?;
    let foot_bodies = record.header.ground_force_bodies.clone();

    let mut summary = CleanupSummary::default();
    for trial in &mut record.trials {
        if drops.contains(trial.id) {
            continue;
        }
        match clean_up_trial(trial, &mut *skeleton, &foot_bodies)? {
            TrialCleanup::Filtered { projected_cops, .. } => {
                summary.filtered += 1;
                summary.projected_cops += projected_cops;
            }
            TrialCleanup::Dropped(reason) => {
                drops.mark(trial.id, reason);
                summary.dropped += 1;
            }
        }
    }

    info!(
        filtered = summary.filtered,
        dropped = summary.dropped,
        projected_cops = summary.projected_cops,
        "noise cleanup complete"
    );
    Ok(summary)
}

/// Filter one trial's last pass into a new pass, or report why the trial must be dropped
pub fn clean_up_trial(trial: &mut Trial, skeleton: &mut dyn Skeleton, foot_bodies: &[String]) -> PostResult<TrialCleanup> {
    let last = trial.last_pass().ok_or_else(|| {
        PostErrorBuilder::new("trial").invalid_data(&format!("trial {} has no processing passes", trial.original_name))
    })?;

    let frames = last.num_frames();
    if frames <= MIN_FILTERABLE_FRAMES {
        warn!(trial = %trial.original_name, frames, "trial too short to filter, dropping");
        return Ok(TrialCleanup::Dropped(DropReason::TooShort { frames }));
    }

    let sample_rate_hz = trial.sample_rate_hz() as f64;
    let cutoff_hz = estimate_matrix_cutoff(last.poses.view(), sample_rate_hz);
    let nyquist_hz = 0.5 * sample_rate_hz;
    info!(trial = %trial.original_name, cutoff_hz, "cutoff frequency preserving 99% of signal power");
    if cutoff_hz >= nyquist_hz {
        warn!(
            trial = %trial.original_name,
            cutoff_hz,
            nyquist_hz,
            "cutoff frequency is at or above Nyquist, dropping trial"
        );
        return Ok(TrialCleanup::Dropped(DropReason::CutoffAtNyquist));
    }

    let coefficients = butterworth_lowpass(LOWPASS_FILTER_ORDER, cutoff_hz, sample_rate_hz)?;
    let mut filtered = last.derive(PassKind::LowPassFilter);
    filtered.lowpass = Some(LowpassSettings {
        cutoff_hz,
        order: LOWPASS_FILTER_ORDER,
    });
    let matrix = filtfilt_rows(&coefficients, filtered.resampling_matrix().view())?;
    filtered.set_resampling_matrix(matrix)?;
    repair_boundaries(&mut filtered.vels);
    repair_boundaries(&mut filtered.accs);

    correct_com_acceleration(trial, &mut filtered, skeleton)?;
    let projected_cops = project_centers_of_pressure(trial, &filtered, skeleton, foot_bodies)?;
    debug!(trial = %trial.original_name, projected_cops, "center of pressure cleanup done");

    trial.append_pass(filtered);
    Ok(TrialCleanup::Filtered {
        cutoff_hz,
        projected_cops,
    })
}

/// Shift root linear acceleration so COM acceleration matches total plate force over mass
pub fn correct_com_acceleration(trial: &Trial, pass: &mut ProcessingPass, skeleton: &mut dyn Skeleton) -> PostResult<()> {
    for t in 0..pass.num_frames() {
        let frame = evaluate(&mut *skeleton, pass.poses.column(t), pass.vels.column(t), pass.accs.column(t))?;
        let measured = Vector3::from(trial.total_force(t)) / frame.mass();
        let correction = measured - frame.com_acceleration_net_of_gravity();

        for (axis, dof) in ROOT_TRANSLATION_DOFS.enumerate() {
            pass.accs[[dof, t]] += correction[axis];
        }
    }
    Ok(())
}

/// Pull loaded CoPs farther than the plausibility radius back toward the nearest foot
///
/// Returns the number of CoPs moved.
pub fn project_centers_of_pressure(
    trial: &mut Trial,
    pass: &ProcessingPass,
    skeleton: &mut dyn Skeleton,
    foot_bodies: &[String],
) -> PostResult<usize> {
    if foot_bodies.is_empty() {
        return Ok(0);
    }

    let mut projected = 0;
    for t in 0..pass.num_frames() {
        let frame = evaluate(&mut *skeleton, pass.poses.column(t), pass.vels.column(t), pass.accs.column(t))?;
        let feet = foot_bodies
            .iter()
            .map(|name| {
                frame.body_world_position(name).ok_or_else(|| {
                    PostErrorBuilder::new("skeleton").invalid_data(&format!("no body named '{}'", name))
                })
            })
            .collect::<PostResult<Vec<_>>>()?;

        for plate in &mut trial.force_plates {
            let force = Vector3::from(plate.forces[t]);
            if force.norm() <= COP_FORCE_THRESHOLD_N {
                continue;
            }
            let cop = Vector3::from(plate.centers_of_pressure[t]);
            if let Some(moved) = project_toward_nearest(cop, &feet, COP_MAX_FOOT_DISTANCE_M) {
                plate.centers_of_pressure[t] = moved.into();
                projected += 1;
            }
        }
    }
    Ok(projected)
}

/// `Some(point)` within `radius` of the nearest anchor if `point` is farther than that
fn project_toward_nearest(point: Vector3<f64>, anchors: &[Vector3<f64>], radius: f64) -> Option<Vector3<f64>> {
    let (nearest, distance) = anchors
        .iter()
        .map(|anchor| (anchor, (point - anchor).norm()))
        .min_by(|a, b| a.1.total_cmp(&b.1))?;

    if distance <= radius {
        return None;
    }
    Some(nearest + (point - nearest) * (radius / distance))
}
