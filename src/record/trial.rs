// src/record/trial.rs
//! Trials: one continuous capture session and its ordered pass chain

use super::force_plate::ForcePlate;
use super::pass::{PassKind, ProcessingPass};
use crate::error::{PostErrorBuilder, PostResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stable identifier of a trial, assigned from its position when the record is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct TrialId(pub usize);

/// Why ground reaction force data for a frame should not be trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingGrfReason {
    NotMissing,
    MeasuredGrfZero,
    InterpolatedClippedGrf,
    ManualReview,
    FootNotOverForcePlate,
    ExtendedToNearestPeakForce,
    UnmeasuredExternalForceDetected,
    ShiftGrf,
    TorqueDiscrepancy,
    ZeroForceFrame,
}

impl MissingGrfReason {
    pub fn is_missing(&self) -> bool {
        *self != MissingGrfReason::NotMissing
    }
}

pub type MarkerFrame = BTreeMap<String, [f64; 3]>;
pub type ImuFrame = BTreeMap<String, [f64; 3]>;
pub type EmgFrame = BTreeMap<String, Vec<f64>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    #[serde(skip)]
    pub id: TrialId,
    pub original_name: String,
    #[serde(default)]
    pub split_index: usize,
    /// Seconds per frame
    pub timestep: f64,
    #[serde(default)]
    pub force_plates: Vec<ForcePlate>,
    /// Ordered chain; pass `i > 0` is derived from pass `i - 1`
    pub passes: Vec<ProcessingPass>,
    #[serde(default)]
    pub missing_grf_reason: Vec<MissingGrfReason>,
    #[serde(default)]
    pub marker_observations: Vec<MarkerFrame>,
    #[serde(default)]
    pub imu_observations: Vec<ImuFrame>,
    #[serde(default)]
    pub emg_observations: Vec<EmgFrame>,
}

impl Trial {
    /// Sample rate implied by the timestep, rounded to whole Hz
    pub fn sample_rate_hz(&self) -> u32 {
        if self.timestep <= 0.0 {
            return 0;
        }
        (1.0 / self.timestep).round() as u32
    }

    /// Frame count of the newest pass
    pub fn num_frames(&self) -> usize {
        self.passes
            .last()
            .map(ProcessingPass::num_frames)
            .unwrap_or(self.missing_grf_reason.len())
    }

    pub fn last_pass(&self) -> Option<&ProcessingPass> {
        self.passes.last()
    }

    /// The pass `index` was derived from, if any
    pub fn source_pass(&self, index: usize) -> Option<&ProcessingPass> {
        index.checked_sub(1).and_then(|i| self.passes.get(i))
    }

    pub fn has_pass_kind(&self, kind: PassKind) -> bool {
        self.passes.iter().any(|pass| pass.kind == kind)
    }

    /// Append a pass derived from the current last pass
    pub fn append_pass(&mut self, pass: ProcessingPass) -> usize {
        self.passes.push(pass);
        self.passes.len() - 1
    }

    /// Replace raw marker, IMU and EMG channels with empty per-frame placeholders
    pub fn clear_sensor_observations(&mut self, frames: usize) {
        self.marker_observations = vec![MarkerFrame::new(); frames];
        self.imu_observations = vec![ImuFrame::new(); frames];
        self.emg_observations = vec![EmgFrame::new(); frames];
    }

    /// Total ground reaction force across all plates at frame `t`
    pub fn total_force(&self, t: usize) -> [f64; 3] {
        self.force_plates.iter().fold([0.0; 3], |mut sum, plate| {
            if let Some(force) = plate.forces.get(t) {
                for axis in 0..3 {
                    sum[axis] += force[axis];
                }
            }
            sum
        })
    }

    /// Check the frame-count invariants shared by passes, plates and annotations
    pub fn validate(&self) -> PostResult<()> {
        if !(self.timestep.is_finite() && self.timestep > 0.0) {
            return Err(PostErrorBuilder::new("trial").invalid_data(&format!(
                "trial {} has timestep {}, expected a positive number of seconds",
                self.original_name, self.timestep
            )));
        }
        let frames = self.num_frames();
        for (index, pass) in self.passes.iter().enumerate() {
            pass.validate_shapes()?;
            if pass.num_frames() != frames {
                return Err(PostErrorBuilder::new("trial").invalid_data(&format!(
                    "trial {} pass {} has {} frames, expected {}",
                    self.original_name,
                    index,
                    pass.num_frames(),
                    frames
                )));
            }
        }
        for plate in &self.force_plates {
            plate.validate_shapes()?;
            if plate.num_frames() != frames {
                return Err(PostErrorBuilder::new("trial").invalid_data(&format!(
                    "trial {} force plate has {} frames, expected {}",
                    self.original_name,
                    plate.num_frames(),
                    frames
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn trial(frames: usize) -> Trial {
        Trial {
            id: TrialId(0),
            original_name: "walk".into(),
            split_index: 0,
            timestep: 1.0 / 120.0,
            force_plates: vec![
                ForcePlate {
                    forces: vec![[0.0, 300.0, 0.0]; frames],
                    moments: vec![[0.0; 3]; frames],
                    centers_of_pressure: vec![[0.0; 3]; frames],
                    ground_heights: vec![0.0; frames],
                },
                ForcePlate {
                    forces: vec![[1.0, 400.0, 0.0]; frames],
                    moments: vec![[0.0; 3]; frames],
                    centers_of_pressure: vec![[0.0; 3]; frames],
                    ground_heights: vec![0.0; frames],
                },
            ],
            passes: vec![ProcessingPass::new(PassKind::Kinematics, Array2::zeros((6, frames)))],
            missing_grf_reason: vec![MissingGrfReason::NotMissing; frames],
            marker_observations: Vec::new(),
            imu_observations: Vec::new(),
            emg_observations: Vec::new(),
        }
    }

    #[test]
    fn test_sample_rate_rounds() {
        // 1 / (1 / 120) is not exactly 120 in floating point
        assert_eq!(trial(4).sample_rate_hz(), 120);
    }

    #[test]
    fn test_pass_chain() {
        let mut t = trial(4);
        let derived = t.passes[0].derive(PassKind::Dynamics);
        let index = t.append_pass(derived);

        assert_eq!(index, 1);
        assert_eq!(t.source_pass(1).map(|p| p.kind), Some(PassKind::Kinematics));
        assert!(t.source_pass(0).is_none());
        assert!(t.has_pass_kind(PassKind::Dynamics));
        assert!(!t.has_pass_kind(PassKind::LowPassFilter));
    }

    #[test]
    fn test_total_force() {
        assert_eq!(trial(3).total_force(1), [1.0, 700.0, 0.0]);
    }

    #[test]
    fn test_validate_detects_mismatched_plate() {
        let mut t = trial(5);
        assert!(t.validate().is_ok());
        t.force_plates[0].forces.pop();
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_degenerate_timestep() {
        for timestep in [0.0, -0.01, f64::NAN, f64::INFINITY] {
            let mut t = trial(5);
            t.timestep = timestep;
            assert!(t.validate().is_err(), "timestep {} accepted", timestep);
        }
    }

    #[test]
    fn test_clear_sensor_observations() {
        let mut t = trial(3);
        t.marker_observations = vec![MarkerFrame::from([("RASI".to_string(), [0.1, 0.9, 0.0])]); 3];
        t.clear_sensor_observations(6);
        assert_eq!(t.marker_observations.len(), 6);
        assert!(t.marker_observations.iter().all(|frame| frame.is_empty()));
        assert_eq!(t.emg_observations.len(), 6);
    }
}
