// src/record/pass.rs
//! Processing passes: one derived version of a trial's frame data

use crate::error::{PostErrorBuilder, PostResult};
use ndarray::{concatenate, s, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of processing that produced a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassKind {
    Kinematics,
    Dynamics,
    LowPassFilter,
    AccelerationMinimizingSmoother,
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassKind::Kinematics => write!(f, "KINEMATICS"),
            PassKind::Dynamics => write!(f, "DYNAMICS"),
            PassKind::LowPassFilter => write!(f, "LOW_PASS_FILTER"),
            PassKind::AccelerationMinimizingSmoother => write!(f, "ACC_MINIMIZING_FILTER"),
        }
    }
}

/// Parameters of the lowpass filter that produced a filter pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LowpassSettings {
    pub cutoff_hz: f64,
    pub order: usize,
}

/// Dense per-frame arrays for one pass; every matrix is `(rows, frames)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingPass {
    pub kind: PassKind,
    pub poses: Array2<f64>,
    pub vels: Array2<f64>,
    pub accs: Array2<f64>,
    pub taus: Array2<f64>,
    #[serde(default)]
    pub linear_residuals: Vec<f64>,
    #[serde(default)]
    pub angular_residuals: Vec<f64>,
    #[serde(default)]
    pub com_positions: Vec<[f64; 3]>,
    /// `(3 * history_len, frames)` past root positions in the current root frame
    #[serde(default = "empty_matrix")]
    pub root_position_history: Array2<f64>,
    /// `(3 * history_len, frames)` past root rotations relative to the current one
    #[serde(default = "empty_matrix")]
    pub root_rotation_history: Array2<f64>,
    #[serde(default)]
    pub lowpass: Option<LowpassSettings>,
}

fn empty_matrix() -> Array2<f64> {
    Array2::zeros((0, 0))
}

impl ProcessingPass {
    /// Create a pass from poses with zeroed derivatives and derived values
    pub fn new(kind: PassKind, poses: Array2<f64>) -> Self {
        let dim = poses.raw_dim();
        let frames = poses.ncols();
        Self {
            kind,
            vels: Array2::zeros(dim),
            accs: Array2::zeros(dim),
            taus: Array2::zeros(dim),
            poses,
            linear_residuals: vec![0.0; frames],
            angular_residuals: vec![0.0; frames],
            com_positions: vec![[0.0; 3]; frames],
            root_position_history: Array2::zeros((0, frames)),
            root_rotation_history: Array2::zeros((0, frames)),
            lowpass: None,
        }
    }

    /// Copy every value of `self` into a new pass of `kind`
    pub fn derive(&self, kind: PassKind) -> Self {
        Self {
            kind,
            lowpass: None,
            ..self.clone()
        }
    }

    pub fn num_dofs(&self) -> usize {
        self.poses.nrows()
    }

    pub fn num_frames(&self) -> usize {
        self.poses.ncols()
    }

    /// Stack `[poses; vels; accs]` into the matrix used to regenerate the pass at any rate
    pub fn resampling_matrix(&self) -> Array2<f64> {
        concatenate(Axis(0), &[self.poses.view(), self.vels.view(), self.accs.view()])
            .unwrap_or_else(|_| Array2::zeros((3 * self.num_dofs(), 0)))
    }

    /// Replace poses, velocities and accelerations from a resampling matrix
    ///
    /// The matrix's column count becomes the pass's frame count. Values derived
    /// from the old frames (torques, residuals, COM, root histories) are reset to
    /// zero at the new length until they are recomputed.
    pub fn set_resampling_matrix(&mut self, matrix: Array2<f64>) -> PostResult<()> {
        let dofs = self.num_dofs();
        if matrix.nrows() != 3 * dofs {
            return Err(PostErrorBuilder::new("resampling matrix").invalid_data(&format!(
                "expected {} rows for {} DOFs, got {}",
                3 * dofs,
                dofs,
                matrix.nrows()
            )));
        }

        let frames = matrix.ncols();
        let frame_count_changed = frames != self.num_frames();

        self.poses = matrix.slice(s![0..dofs, ..]).to_owned();
        self.vels = matrix.slice(s![dofs..2 * dofs, ..]).to_owned();
        self.accs = matrix.slice(s![2 * dofs..3 * dofs, ..]).to_owned();

        if frame_count_changed {
            self.taus = Array2::zeros((dofs, frames));
            self.linear_residuals = vec![0.0; frames];
            self.angular_residuals = vec![0.0; frames];
            self.com_positions = vec![[0.0; 3]; frames];
            self.root_position_history = Array2::zeros((self.root_position_history.nrows(), frames));
            self.root_rotation_history = Array2::zeros((self.root_rotation_history.nrows(), frames));
        }
        Ok(())
    }

    /// Check that every per-frame array agrees on the frame count
    pub fn validate_shapes(&self) -> PostResult<()> {
        let dofs = self.num_dofs();
        let frames = self.num_frames();
        for (name, matrix) in [("vels", &self.vels), ("accs", &self.accs), ("taus", &self.taus)] {
            if matrix.dim() != (dofs, frames) {
                return Err(PostErrorBuilder::new("processing pass").invalid_data(&format!(
                    "{} has shape {:?}, expected ({}, {})",
                    name,
                    matrix.dim(),
                    dofs,
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

    fn ramp_pass(dofs: usize, frames: usize) -> ProcessingPass {
        let poses = Array2::from_shape_fn((dofs, frames), |(r, c)| (r * 100 + c) as f64);
        let mut pass = ProcessingPass::new(PassKind::Kinematics, poses);
        pass.vels.fill(1.0);
        pass.accs.fill(2.0);
        pass
    }

    #[test]
    fn test_resampling_matrix_layout() {
        let pass = ramp_pass(2, 5);
        let matrix = pass.resampling_matrix();
        assert_eq!(matrix.dim(), (6, 5));
        assert_eq!(matrix[[1, 3]], 103.0);
        assert_eq!(matrix[[2, 0]], 1.0);
        assert_eq!(matrix[[5, 4]], 2.0);
    }

    #[test]
    fn test_set_resampling_matrix_changes_frame_count() {
        let mut pass = ramp_pass(2, 5);
        let matrix = Array2::from_elem((6, 10), 3.0);
        pass.set_resampling_matrix(matrix).unwrap();

        assert_eq!(pass.num_frames(), 10);
        assert_eq!(pass.taus.dim(), (2, 10));
        assert_eq!(pass.linear_residuals.len(), 10);
        assert!(pass.validate_shapes().is_ok());
    }

    #[test]
    fn test_set_resampling_matrix_rejects_wrong_rows() {
        let mut pass = ramp_pass(2, 5);
        assert!(pass.set_resampling_matrix(Array2::zeros((5, 5))).is_err());
    }

    #[test]
    fn test_derive_copies_values() {
        let mut pass = ramp_pass(3, 4);
        pass.lowpass = Some(LowpassSettings { cutoff_hz: 6.0, order: 3 });
        let derived = pass.derive(PassKind::LowPassFilter);

        assert_eq!(derived.kind, PassKind::LowPassFilter);
        assert_eq!(derived.poses, pass.poses);
        assert_eq!(derived.accs, pass.accs);
        assert!(derived.lowpass.is_none());
    }

    #[test]
    fn test_pass_kind_display() {
        assert_eq!(PassKind::Dynamics.to_string(), "DYNAMICS");
        assert_eq!(PassKind::LowPassFilter.to_string(), "LOW_PASS_FILTER");
    }
}
