// src/record/mod.rs
//! In-memory biomechanics record model
//!
//! A [`Record`] owns its trials; each [`Trial`] owns its force plates and an
//! append-only chain of [`ProcessingPass`]es. The header carries one
//! [`PassTypeHeader`] per pass position, shared by every trial.

pub mod codec;
pub mod force_plate;
pub mod pass;
pub mod trial;

pub use codec::{JsonRecordCodec, RecordCodec};
pub use force_plate::{ForcePlate, FORCE_PLATE_MATRIX_ROWS};
pub use pass::{LowpassSettings, PassKind, ProcessingPass};
pub use trial::{MissingGrfReason, Trial, TrialId};

use crate::error::{PostErrorBuilder, PostResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Record-wide description of one pass position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassTypeHeader {
    pub kind: PassKind,
    /// Body-model description; `None` or empty inherits the previous pass's model
    #[serde(default)]
    pub model_text: Option<String>,
}

impl PassTypeHeader {
    pub fn new(kind: PassKind, model_text: Option<String>) -> Self {
        Self { kind, model_text }
    }

    /// Model text if present and non-empty
    pub fn own_model_text(&self) -> Option<&str> {
        self.model_text.as_deref().filter(|text| !text.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordHeader {
    /// Names of the foot bodies that can carry ground reaction force
    #[serde(default)]
    pub ground_force_bodies: Vec<String>,
    #[serde(default)]
    pub pass_types: Vec<PassTypeHeader>,
    #[serde(default)]
    pub num_joints: usize,
}

/// One subject's full multi-trial dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Path the record was read from
    #[serde(skip)]
    pub source: PathBuf,
    pub header: RecordHeader,
    pub trials: Vec<Trial>,
}

impl Record {
    pub fn new(header: RecordHeader, trials: Vec<Trial>) -> Self {
        let mut record = Self {
            source: PathBuf::new(),
            header,
            trials,
        };
        record.assign_trial_ids();
        record
    }

    /// Give every trial a stable id from its current position
    pub fn assign_trial_ids(&mut self) {
        for (index, trial) in self.trials.iter_mut().enumerate() {
            trial.id = TrialId(index);
        }
    }

    pub fn num_passes(&self) -> usize {
        self.header.pass_types.len()
    }

    /// Whether any pass position in the record has `kind`
    pub fn has_pass_kind(&self, kind: PassKind) -> bool {
        self.header.pass_types.iter().any(|header| header.kind == kind)
    }

    pub fn trial(&self, id: TrialId) -> Option<&Trial> {
        self.trials.iter().find(|trial| trial.id == id)
    }

    /// Append a pass type whose model is copied from the current last pass type
    pub fn append_pass_type(&mut self, kind: PassKind) -> usize {
        let model_text = self
            .header
            .pass_types
            .last()
            .and_then(|header| header.model_text.clone());
        self.header.pass_types.push(PassTypeHeader::new(kind, model_text));
        self.header.pass_types.len() - 1
    }

    /// Check header/trial agreement and per-trial shape invariants
    pub fn validate(&self) -> PostResult<()> {
        for trial in &self.trials {
            if trial.passes.len() > self.num_passes() {
                return Err(PostErrorBuilder::new("record").invalid_data(&format!(
                    "trial {} has {} passes but the header declares {}",
                    trial.original_name,
                    trial.passes.len(),
                    self.num_passes()
                )));
            }
            for (index, pass) in trial.passes.iter().enumerate() {
                let declared = self.header.pass_types[index].kind;
                if pass.kind != declared {
                    return Err(PostErrorBuilder::new("record").invalid_data(&format!(
                        "trial {} pass {} is {} but the header declares {}",
                        trial.original_name, index, pass.kind, declared
                    )));
                }
            }
            trial.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Small synthetic records shared by unit tests across modules

    use super::*;
    use ndarray::Array2;

    pub const POINT_MASS_MODEL: &str = r#"
mass_kg = 70.0
gravity = [0.0, -9.81, 0.0]
num_dofs = 6
num_joints = 1

[[bodies]]
name = "calcn_r"
offset = [0.1, -0.9, 0.0]

[[bodies]]
name = "calcn_l"
offset = [-0.1, -0.9, 0.0]
"#;

    /// A trial whose single pass has smooth root motion and constant body-weight force
    pub fn walking_trial(frames: usize, sample_rate_hz: f64) -> Trial {
        let dt = 1.0 / sample_rate_hz;
        let poses = Array2::from_shape_fn((6, frames), |(dof, t)| {
            let time = t as f64 * dt;
            match dof {
                3 => 1.2 * time,
                4 => 0.95 + 0.02 * (2.0 * std::f64::consts::PI * time).sin(),
                _ => 0.0,
            }
        });
        let mut pass = ProcessingPass::new(PassKind::Kinematics, poses);
        for t in 0..frames {
            let time = t as f64 * dt;
            let omega = 2.0 * std::f64::consts::PI;
            pass.vels[[3, t]] = 1.2;
            pass.vels[[4, t]] = 0.02 * omega * (omega * time).cos();
            pass.accs[[4, t]] = -0.02 * omega * omega * (omega * time).sin();
        }

        let plate = ForcePlate {
            forces: vec![[0.0, 70.0 * 9.81, 0.0]; frames],
            moments: vec![[0.0; 3]; frames],
            centers_of_pressure: (0..frames).map(|t| [1.2 * t as f64 * dt + 0.1, 0.0, 0.0]).collect(),
            ground_heights: vec![0.0; frames],
        };

        Trial {
            id: TrialId(0),
            original_name: "walking".into(),
            split_index: 0,
            timestep: dt,
            force_plates: vec![plate],
            passes: vec![pass],
            missing_grf_reason: vec![MissingGrfReason::NotMissing; frames],
            marker_observations: vec![Default::default(); frames],
            imu_observations: vec![Default::default(); frames],
            emg_observations: vec![Default::default(); frames],
        }
    }

    pub fn single_pass_record(trials: Vec<Trial>) -> Record {
        let header = RecordHeader {
            ground_force_bodies: vec!["calcn_r".into(), "calcn_l".into()],
            pass_types: vec![PassTypeHeader::new(PassKind::Kinematics, Some(POINT_MASS_MODEL.to_string()))],
            num_joints: 0,
        };
        Record::new(header, trials)
    }
}
