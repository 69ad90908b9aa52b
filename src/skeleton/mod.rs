// src/skeleton/mod.rs
//! Skeleton collaborator: physical evaluation of a body model
//!
//! Skeletons are stateful. Setting a pose, velocity and acceleration changes
//! what every later query returns, so frames are evaluated through
//! [`FrameEvaluation`], which holds the skeleton's exclusive borrow from the
//! moment the state is set until the frame's queries are done.

pub mod point_mass;

pub use point_mass::{PointMassLoader, PointMassSkeleton};

use crate::error::{PostError, PostErrorBuilder, PostResult};
use crate::record::Record;
use nalgebra::Vector3;
use ndarray::ArrayView1;
use std::ops::Range;
use std::path::Path;
use tracing::{debug, info};

/// Pose DOFs holding the root segment's XYZ Euler rotation
pub const ROOT_ROTATION_DOFS: Range<usize> = 0..3;

/// Pose DOFs holding the root segment's world translation
pub const ROOT_TRANSLATION_DOFS: Range<usize> = 3..6;

/// External load applied by one force plate at one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactWrench {
    pub force: Vector3<f64>,
    pub moment: Vector3<f64>,
    pub center_of_pressure: Vector3<f64>,
}

/// Body model that can be posed and queried
pub trait Skeleton {
    /// Number of degrees of freedom in a pose
    fn num_dofs(&self) -> usize;

    /// Number of joints in the model
    fn num_joints(&self) -> usize;

    /// Total mass in kilograms
    fn mass(&self) -> f64;

    /// Gravity vector in m/s²
    fn gravity(&self) -> Vector3<f64>;

    /// Replace the current pose, velocity and acceleration
    fn set_state(&mut self, pose: ArrayView1<f64>, vel: ArrayView1<f64>, acc: ArrayView1<f64>) -> PostResult<()>;

    /// World position of the center of mass at the current state
    fn com_position(&self) -> Vector3<f64>;

    /// World linear acceleration of the center of mass at the current state
    fn com_linear_acceleration(&self) -> Vector3<f64>;

    /// World position of a named body, if the model has it
    fn body_world_position(&self, name: &str) -> Option<Vector3<f64>>;

    /// Generalized forces needed to produce the current acceleration under `contacts`
    fn joint_torques(&self, contacts: &[ContactWrench]) -> Vec<f64>;
}

/// Builds skeletons from the body-model text stored in a record header
pub trait SkeletonLoader {
    fn load(&self, model_text: &str, geometry_folder: &Path) -> PostResult<Box<dyn Skeleton>>;
}

/// One frame's view of a skeleton whose state has been set
pub struct FrameEvaluation<'a> {
    skeleton: &'a mut dyn Skeleton,
}

/// Set the skeleton's state and borrow it for this frame's queries
pub fn evaluate<'a>(
    skeleton: &'a mut dyn Skeleton,
    pose: ArrayView1<f64>,
    vel: ArrayView1<f64>,
    acc: ArrayView1<f64>,
) -> PostResult<FrameEvaluation<'a>> {
    skeleton.set_state(pose, vel, acc)?;
    Ok(FrameEvaluation { skeleton })
}

impl FrameEvaluation<'_> {
    pub fn mass(&self) -> f64 {
        self.skeleton.mass()
    }

    pub fn gravity(&self) -> Vector3<f64> {
        self.skeleton.gravity()
    }

    pub fn com_position(&self) -> Vector3<f64> {
        self.skeleton.com_position()
    }

    pub fn com_linear_acceleration(&self) -> Vector3<f64> {
        self.skeleton.com_linear_acceleration()
    }

    /// COM acceleration with gravity removed, i.e. what external forces must supply per kg
    pub fn com_acceleration_net_of_gravity(&self) -> Vector3<f64> {
        self.skeleton.com_linear_acceleration() - self.skeleton.gravity()
    }

    pub fn body_world_position(&self, name: &str) -> Option<Vector3<f64>> {
        self.skeleton.body_world_position(name)
    }

    pub fn joint_torques(&self, contacts: &[ContactWrench]) -> Vec<f64> {
        self.skeleton.joint_torques(contacts)
    }
}

/// One skeleton per pass position of a record
pub struct PassSkeletons {
    skeletons: Vec<Box<dyn Skeleton>>,
    model_texts: Vec<String>,
}

impl PassSkeletons {
    /// Load a skeleton for every pass type in the record header
    ///
    /// A pass type without model text reuses the previous pass's model and the
    /// header is rewritten to carry the inherited text.
    pub fn load(record: &mut Record, loader: &dyn SkeletonLoader, geometry_folder: &Path) -> PostResult<Self> {
        let mut skeletons = Self {
            skeletons: Vec::new(),
            model_texts: Vec::new(),
        };

        for index in 0..record.header.pass_types.len() {
            let header = &mut record.header.pass_types[index];
            let own_text = header.own_model_text().map(str::to_string);
            let text = match own_text {
                Some(text) => text,
                None => {
                    let inherited = skeletons.model_texts.last().cloned().ok_or_else(|| PostError::SkeletonLoad {
                        pass_index: index,
                        reason: "first processing pass has no model text".to_string(),
                    })?;
                    debug!(pass = index, "pass has no model text, inheriting previous model");
                    header.model_text = Some(inherited.clone());
                    inherited
                }
            };
            info!(pass = index, kind = %header.kind, "loading skeleton");
            skeletons.push_model(index, text, loader, geometry_folder)?;
        }

        Ok(skeletons)
    }

    /// Load one more skeleton for a pass type appended after loading
    pub fn push_inherited(&mut self, loader: &dyn SkeletonLoader, geometry_folder: &Path) -> PostResult<usize> {
        let index = self.skeletons.len();
        let text = self.model_texts.last().cloned().ok_or_else(|| PostError::SkeletonLoad {
            pass_index: index,
            reason: "no previous model to inherit".to_string(),
        })?;
        self.push_model(index, text, loader, geometry_folder)?;
        Ok(index)
    }

    fn push_model(
        &mut self,
        index: usize,
        text: String,
        loader: &dyn SkeletonLoader,
        geometry_folder: &Path,
    ) -> PostResult<()> {
        let skeleton = loader.load(&text, geometry_folder).map_err(|e| PostError::SkeletonLoad {
            pass_index: index,
            reason: e.to_string(),
        })?;
        self.skeletons.push(skeleton);
        self.model_texts.push(text);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.skeletons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skeletons.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&dyn Skeleton> {
        self.skeletons.get(index).map(|skeleton| skeleton.as_ref())
    }

    /// Mutable access for evaluation; a missing skeleton is a data error
    pub fn get_mut(&mut self, index: usize) -> PostResult<&mut dyn Skeleton> {
        let count = self.skeletons.len();
        match self.skeletons.get_mut(index) {
            Some(skeleton) => Ok(skeleton.as_mut()),
            None => Err(PostErrorBuilder::new("skeletons").invalid_data(&format!(
                "no skeleton for processing pass {} ({} loaded)",
                index, count
            ))),
        }
    }

    /// The newest skeleton, used by passes appended to the end of the chain
    pub fn last_mut(&mut self) -> PostResult<&mut dyn Skeleton> {
        let last = self.skeletons.len().saturating_sub(1);
        self.get_mut(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::test_support::*;
    use crate::record::{PassKind, PassTypeHeader};
    use ndarray::Array1;

    #[test]
    fn test_inherited_model_rewrites_header() {
        let mut record = single_pass_record(vec![]);
        record.header.pass_types.push(PassTypeHeader::new(PassKind::Dynamics, None));

        let skeletons = PassSkeletons::load(&mut record, &PointMassLoader, Path::new("Geometry")).unwrap();
        assert_eq!(skeletons.len(), 2);
        assert_eq!(record.header.pass_types[1].model_text, record.header.pass_types[0].model_text);
    }

    #[test]
    fn test_first_pass_without_model_fails() {
        let mut record = single_pass_record(vec![]);
        record.header.pass_types[0].model_text = Some(String::new());

        match PassSkeletons::load(&mut record, &PointMassLoader, Path::new("Geometry")) {
            Err(PostError::SkeletonLoad { pass_index, .. }) => assert_eq!(pass_index, 0),
            _ => panic!("expected skeleton load failure"),
        }
    }

    #[test]
    fn test_bad_model_text_reports_pass_index() {
        let mut record = single_pass_record(vec![]);
        record
            .header
            .pass_types
            .push(PassTypeHeader::new(PassKind::Dynamics, Some("mass_kg = \"heavy\"".into())));

        match PassSkeletons::load(&mut record, &PointMassLoader, Path::new("Geometry")) {
            Err(PostError::SkeletonLoad { pass_index, .. }) => assert_eq!(pass_index, 1),
            _ => panic!("expected skeleton load failure"),
        }
    }

    #[test]
    fn test_frame_evaluation_reflects_state() {
        let mut record = single_pass_record(vec![]);
        let mut skeletons = PassSkeletons::load(&mut record, &PointMassLoader, Path::new("Geometry")).unwrap();
        let skeleton = skeletons.get_mut(0).unwrap();

        let pose = Array1::from(vec![0.0, 0.0, 0.0, 1.0, 1.0, 0.0]);
        let vel = Array1::zeros(6);
        let acc = Array1::from(vec![0.0, 0.0, 0.0, 0.0, 0.5, 0.0]);
        let frame = evaluate(skeleton, pose.view(), vel.view(), acc.view()).unwrap();

        assert_eq!(frame.com_position(), Vector3::new(1.0, 1.0, 0.0));
        assert!((frame.com_acceleration_net_of_gravity() - Vector3::new(0.0, 10.31, 0.0)).norm() < 1e-12);
        assert!(frame.body_world_position("calcn_r").is_some());
        assert!(frame.body_world_position("head").is_none());
    }

    #[test]
    fn test_push_inherited() {
        let mut record = single_pass_record(vec![]);
        let mut skeletons = PassSkeletons::load(&mut record, &PointMassLoader, Path::new("Geometry")).unwrap();
        assert_eq!(skeletons.push_inherited(&PointMassLoader, Path::new("Geometry")).unwrap(), 1);
        assert!(skeletons.last_mut().is_ok());
        assert!(skeletons.get_mut(2).is_err());
    }
}
