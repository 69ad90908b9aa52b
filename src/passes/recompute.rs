// src/passes/recompute.rs
//! Recompute derived kinematic and dynamic values for every pass

use super::drop_list::DropList;
use crate::error::{PostError, PostErrorBuilder, PostResult};
use crate::record::{ForcePlate, ProcessingPass, Record};
use crate::skeleton::{evaluate, ContactWrench, PassSkeletons, Skeleton, ROOT_ROTATION_DOFS, ROOT_TRANSLATION_DOFS};
use nalgebra::{Rotation3, Vector3};
use ndarray::{Array2, ArrayView1};
use tracing::{info, warn};

/// Root history window used when recomputing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootHistory {
    pub len: usize,
    pub stride: usize,
}

/// Velocities and accelerations to keep instead of differentiating poses
#[derive(Debug, Clone, Copy, Default)]
pub struct ExplicitDerivatives<'a> {
    pub vels: Option<&'a Array2<f64>>,
    pub accs: Option<&'a Array2<f64>>,
}

/// Recompute every pass of every trial that has not been dropped
///
/// Each pass keeps its own velocities and accelerations as explicit overrides,
/// so filtered or corrected values survive. The header's joint count is taken
/// from the first pass's skeleton.
pub fn recompute_record(
    record: &mut Record,
    skeletons: &mut PassSkeletons,
    drops: &DropList,
    history: RootHistory,
) -> PostResult<usize> {
    if let Some(skeleton) = skeletons.get(0) {
        record.header.num_joints = skeleton.num_joints();
    }

    let mut recomputed = 0;
    for trial in &mut record.trials {
        if drops.contains(trial.id) {
            continue;
        }
        for (index, pass) in trial.passes.iter_mut().enumerate() {
            let skeleton = skeletons.get_mut(index)?;
            let explicit_vels = pass.vels.clone();
            let explicit_accs = pass.accs.clone();
            let explicit = ExplicitDerivatives {
                vels: Some(&explicit_vels),
                accs: Some(&explicit_accs),
            };

            compute_values_from_force_plates(pass, skeleton, trial.timestep, &trial.force_plates, history, explicit)?;

            if pass.vels != explicit_vels || pass.accs != explicit_accs {
                return Err(PostError::RecomputeMismatch {
                    trial: trial.id.0,
                    pass: index,
                });
            }

            log_pass_ranges(trial.id.0, index, pass);
            recomputed += 1;
        }
    }

    info!(passes = recomputed, joints = record.header.num_joints, "values recomputed");
    Ok(recomputed)
}

/// Regenerate derived quantities of `pass` from its poses and the trial's force plates
///
/// Velocities and accelerations come from `explicit` when given, otherwise from
/// central differences of the poses. Torques, residuals, COM positions and the
/// root history windows are always recomputed.
pub fn compute_values_from_force_plates(
    pass: &mut ProcessingPass,
    skeleton: &mut dyn Skeleton,
    timestep: f64,
    force_plates: &[ForcePlate],
    history: RootHistory,
    explicit: ExplicitDerivatives<'_>,
) -> PostResult<()> {
    let dofs = pass.num_dofs();
    let frames = pass.num_frames();
    if dofs != skeleton.num_dofs() {
        return Err(PostErrorBuilder::new("processing pass").invalid_data(&format!(
            "poses have {} DOFs but the skeleton has {}",
            dofs,
            skeleton.num_dofs()
        )));
    }
    if let Some(plate) = force_plates.iter().find(|plate| plate.num_frames() != frames) {
        return Err(PostErrorBuilder::new("force plate").invalid_data(&format!(
            "plate has {} frames, pass has {}",
            plate.num_frames(),
            frames
        )));
    }
    if history.stride == 0 {
        return Err(PostErrorBuilder::new("root history").configuration("stride must be at least 1"));
    }

    pass.vels = match explicit.vels {
        Some(vels) => checked_override("velocities", vels, dofs, frames)?,
        None => finite_difference(&pass.poses, timestep),
    };
    pass.accs = match explicit.accs {
        Some(accs) => checked_override("accelerations", accs, dofs, frames)?,
        None => finite_difference(&pass.vels, timestep),
    };

    pass.taus = Array2::zeros((dofs, frames));
    pass.linear_residuals = vec![0.0; frames];
    pass.angular_residuals = vec![0.0; frames];
    pass.com_positions = vec![[0.0; 3]; frames];

    for t in 0..frames {
        let contacts: Vec<ContactWrench> = force_plates
            .iter()
            .map(|plate| ContactWrench {
                force: Vector3::from(plate.forces[t]),
                moment: Vector3::from(plate.moments[t]),
                center_of_pressure: Vector3::from(plate.centers_of_pressure[t]),
            })
            .collect();

        let frame = evaluate(&mut *skeleton, pass.poses.column(t), pass.vels.column(t), pass.accs.column(t))?;
        let torques = frame.joint_torques(&contacts);
        pass.com_positions[t] = frame.com_position().into();

        pass.linear_residuals[t] = residual_norm(&torques, ROOT_TRANSLATION_DOFS.start);
        pass.angular_residuals[t] = residual_norm(&torques, ROOT_ROTATION_DOFS.start);
        for (dof, tau) in torques.into_iter().enumerate().take(dofs) {
            pass.taus[[dof, t]] = tau;
        }
    }

    let (positions, rotations) = root_history(&pass.poses, history);
    pass.root_position_history = positions;
    pass.root_rotation_history = rotations;
    Ok(())
}

fn checked_override(name: &str, values: &Array2<f64>, dofs: usize, frames: usize) -> PostResult<Array2<f64>> {
    if values.dim() != (dofs, frames) {
        return Err(PostErrorBuilder::new("explicit override").invalid_data(&format!(
            "{} have shape {:?}, expected ({}, {})",
            name,
            values.dim(),
            dofs,
            frames
        )));
    }
    Ok(values.clone())
}

fn residual_norm(torques: &[f64], start: usize) -> f64 {
    torques
        .get(start..start + 3)
        .map(|axis| axis.iter().map(|tau| tau * tau).sum::<f64>().sqrt())
        .unwrap_or(0.0)
}

/// Central differences along frames; one-sided at the ends
pub fn finite_difference(values: &Array2<f64>, timestep: f64) -> Array2<f64> {
    let (rows, frames) = values.dim();
    let mut derivative = Array2::zeros((rows, frames));
    if frames < 2 || timestep <= 0.0 {
        return derivative;
    }
    for r in 0..rows {
        derivative[[r, 0]] = (values[[r, 1]] - values[[r, 0]]) / timestep;
        derivative[[r, frames - 1]] = (values[[r, frames - 1]] - values[[r, frames - 2]]) / timestep;
        for t in 1..frames - 1 {
            derivative[[r, t]] = (values[[r, t + 1]] - values[[r, t - 1]]) / (2.0 * timestep);
        }
    }
    derivative
}

/// Past root positions and rotations relative to each frame's root
///
/// Entry `k` of frame `t` describes frame `t - (k + 1) * stride` (clamped to
/// the first frame) in the root frame at `t`: positions as a translation,
/// rotations as a scaled axis.
pub fn root_history(poses: &Array2<f64>, history: RootHistory) -> (Array2<f64>, Array2<f64>) {
    let frames = poses.ncols();
    let mut positions = Array2::zeros((3 * history.len, frames));
    let mut rotations = Array2::zeros((3 * history.len, frames));
    if poses.nrows() < ROOT_TRANSLATION_DOFS.end {
        return (positions, rotations);
    }

    let root = |t: usize| root_transform(poses.column(t));
    for t in 0..frames {
        let (current_rotation, current_position) = root(t);
        let to_local = current_rotation.inverse();
        for k in 0..history.len {
            let past = t.saturating_sub((k + 1) * history.stride);
            let (past_rotation, past_position) = root(past);

            let offset = to_local * (past_position - current_position);
            let relative = (to_local * past_rotation).scaled_axis();
            for axis in 0..3 {
                positions[[3 * k + axis, t]] = offset[axis];
                rotations[[3 * k + axis, t]] = relative[axis];
            }
        }
    }
    (positions, rotations)
}

fn root_transform(pose: ArrayView1<f64>) -> (Rotation3<f64>, Vector3<f64>) {
    let r = ROOT_ROTATION_DOFS.start;
    let p = ROOT_TRANSLATION_DOFS.start;
    (
        Rotation3::from_euler_angles(pose[r], pose[r + 1], pose[r + 2]),
        Vector3::new(pose[p], pose[p + 1], pose[p + 2]),
    )
}

fn log_pass_ranges(trial: usize, pass_index: usize, pass: &ProcessingPass) {
    let (acc_min, acc_max) = range(&pass.accs);
    let (tau_min, tau_max) = range(&pass.taus);
    let mean = |values: &[f64]| {
        if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        }
    };
    let linear = mean(&pass.linear_residuals);
    let angular = mean(&pass.angular_residuals);
    if !linear.is_finite() || !angular.is_finite() {
        warn!(trial, pass = pass_index, "non-finite residuals after recompute");
    }
    info!(
        trial,
        pass = pass_index,
        kind = %pass.kind,
        acc_min,
        acc_max,
        tau_min,
        tau_max,
        mean_linear_residual = linear,
        mean_angular_residual = angular,
        "pass recomputed"
    );
}

fn range(values: &Array2<f64>) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::test_support::*;
    use crate::record::PassKind;
    use crate::skeleton::{PointMassLoader, SkeletonLoader};
    use std::path::Path;

    const HISTORY: RootHistory = RootHistory { len: 3, stride: 2 };

    fn skeletons_for(record: &mut Record) -> PassSkeletons {
        PassSkeletons::load(record, &PointMassLoader, Path::new("Geometry")).unwrap()
    }

    #[test]
    fn test_explicit_values_survive() {
        let mut record = single_pass_record(vec![walking_trial(30, 100.0)]);
        record.trials[0].passes[0].accs[[2, 7]] = 42.0;
        let before = record.trials[0].passes[0].clone();
        let mut skeletons = skeletons_for(&mut record);

        let count = recompute_record(&mut record, &mut skeletons, &DropList::new(), HISTORY).unwrap();
        assert_eq!(count, 1);

        let pass = &record.trials[0].passes[0];
        assert_eq!(pass.vels, before.vels);
        assert_eq!(pass.accs, before.accs);
        assert_eq!(pass.root_position_history.dim(), (9, 30));
        assert_eq!(record.header.num_joints, 1);
    }

    #[test]
    fn test_standing_body_has_no_linear_residual() {
        let mut record = single_pass_record(vec![walking_trial(30, 100.0)]);
        let pass = &mut record.trials[0].passes[0];
        pass.vels.fill(0.0);
        pass.accs.fill(0.0);
        let mut skeletons = skeletons_for(&mut record);

        recompute_record(&mut record, &mut skeletons, &DropList::new(), HISTORY).unwrap();
        let pass = &record.trials[0].passes[0];
        assert!(pass.linear_residuals.iter().all(|r| *r < 1e-9));
        assert_eq!(pass.com_positions[4][0], pass.poses[[3, 4]]);
    }

    #[test]
    fn test_dropped_trials_are_skipped() {
        let mut record = single_pass_record(vec![walking_trial(30, 100.0), walking_trial(30, 100.0)]);
        let mut skeletons = skeletons_for(&mut record);
        let mut drops = DropList::new();
        drops.mark(record.trials[1].id, crate::passes::DropReason::CutoffAtNyquist);

        recompute_record(&mut record, &mut skeletons, &drops, HISTORY).unwrap();
        assert_eq!(record.trials[0].passes[0].root_position_history.nrows(), 9);
        assert_eq!(record.trials[1].passes[0].root_position_history.nrows(), 0);
    }

    #[test]
    fn test_dof_mismatch_rejected() {
        let mut record = single_pass_record(vec![walking_trial(30, 100.0)]);
        record.trials[0].passes[0] = ProcessingPass::new(PassKind::Kinematics, Array2::zeros((4, 30)));
        let mut skeletons = skeletons_for(&mut record);
        assert!(recompute_record(&mut record, &mut skeletons, &DropList::new(), HISTORY).is_err());
    }

    #[test]
    fn test_finite_difference_of_ramp() {
        let values = Array2::from_shape_fn((1, 5), |(_, t)| 2.0 * t as f64);
        let derivative = finite_difference(&values, 0.5);
        assert!(derivative.iter().all(|d| (d - 4.0).abs() < 1e-12));
    }

    #[test]
    fn test_differentiates_without_overrides() {
        let mut trial = walking_trial(30, 100.0);
        let mut skeleton = PointMassLoader.load(POINT_MASS_MODEL, Path::new("Geometry")).unwrap();
        let pass = &mut trial.passes[0];
        pass.vels.fill(0.0);

        compute_values_from_force_plates(
            pass,
            skeleton.as_mut(),
            trial.timestep,
            &trial.force_plates,
            HISTORY,
            ExplicitDerivatives::default(),
        )
        .unwrap();
        assert!((pass.vels[[3, 10]] - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_root_history_of_translation() {
        // Root moves +1 m per frame along x with no rotation
        let poses = Array2::from_shape_fn((6, 6), |(dof, t)| if dof == 3 { t as f64 } else { 0.0 });
        let (positions, rotations) = root_history(&poses, RootHistory { len: 2, stride: 2 });

        assert_eq!(positions.dim(), (6, 6));
        // Frame 5 looks back to frames 3 and 1
        assert!((positions[[0, 5]] + 2.0).abs() < 1e-12);
        assert!((positions[[3, 5]] + 4.0).abs() < 1e-12);
        // Frame 1 clamps both lookbacks to frame 0
        assert!((positions[[0, 1]] + 1.0).abs() < 1e-12);
        assert!((positions[[3, 1]] + 1.0).abs() < 1e-12);
        assert!(rotations.iter().all(|r| r.abs() < 1e-12));
    }
}
