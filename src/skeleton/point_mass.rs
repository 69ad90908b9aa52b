// src/skeleton/point_mass.rs
//! Point-mass body model with rigidly attached contact bodies
//!
//! The whole mass sits at the root translation. Named bodies (feet, usually)
//! are fixed offsets in the root frame, so they follow the root's rotation.
//! The model text is TOML:
//!
//! ```toml
//! mass_kg = 72.5
//! gravity = [0.0, -9.81, 0.0]
//! num_dofs = 6
//! num_joints = 1
//!
//! [[bodies]]
//! name = "calcn_r"
//! offset = [0.1, -0.9, 0.0]
//! ```

use super::{ContactWrench, Skeleton, SkeletonLoader, ROOT_ROTATION_DOFS, ROOT_TRANSLATION_DOFS};
use crate::config::constants::physics::DEFAULT_GRAVITY;
use crate::error::{PostErrorBuilder, PostResult};
use nalgebra::{Rotation3, Vector3};
use ndarray::ArrayView1;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
struct PointMassModel {
    mass_kg: f64,
    #[serde(default = "defaults::gravity")]
    gravity: [f64; 3],
    #[serde(default = "defaults::num_dofs")]
    num_dofs: usize,
    #[serde(default)]
    num_joints: usize,
    #[serde(default)]
    bodies: Vec<BodyDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
struct BodyDefinition {
    name: String,
    offset: [f64; 3],
}

mod defaults {
    pub fn gravity() -> [f64; 3] {
        super::DEFAULT_GRAVITY
    }

    pub fn num_dofs() -> usize {
        super::ROOT_TRANSLATION_DOFS.end
    }
}

/// Point-mass skeleton; see the module docs for the model text format
#[derive(Debug, Clone)]
pub struct PointMassSkeleton {
    mass: f64,
    gravity: Vector3<f64>,
    num_joints: usize,
    bodies: Vec<(String, Vector3<f64>)>,
    pose: Vec<f64>,
    vel: Vec<f64>,
    acc: Vec<f64>,
}

impl PointMassSkeleton {
    /// Parse TOML model text
    pub fn from_model_text(text: &str) -> PostResult<Self> {
        let model: PointMassModel = toml::from_str(text)?;

        if !(model.mass_kg > 0.0) {
            return Err(PostErrorBuilder::new("point mass model").invalid_data(&format!(
                "mass must be positive, got {}",
                model.mass_kg
            )));
        }
        if model.num_dofs < ROOT_TRANSLATION_DOFS.end {
            return Err(PostErrorBuilder::new("point mass model").invalid_data(&format!(
                "at least {} DOFs are needed for the root, got {}",
                ROOT_TRANSLATION_DOFS.end, model.num_dofs
            )));
        }

        Ok(Self {
            mass: model.mass_kg,
            gravity: Vector3::from(model.gravity),
            num_joints: model.num_joints,
            bodies: model
                .bodies
                .into_iter()
                .map(|body| (body.name, Vector3::from(body.offset)))
                .collect(),
            pose: vec![0.0; model.num_dofs],
            vel: vec![0.0; model.num_dofs],
            acc: vec![0.0; model.num_dofs],
        })
    }

    fn root_rotation(&self) -> Rotation3<f64> {
        let r = &self.pose[ROOT_ROTATION_DOFS];
        Rotation3::from_euler_angles(r[0], r[1], r[2])
    }

    fn root_translation(&self) -> Vector3<f64> {
        Vector3::from_column_slice(&self.pose[ROOT_TRANSLATION_DOFS])
    }
}

impl Skeleton for PointMassSkeleton {
    fn num_dofs(&self) -> usize {
        self.pose.len()
    }

    fn num_joints(&self) -> usize {
        self.num_joints
    }

    fn mass(&self) -> f64 {
        self.mass
    }

    fn gravity(&self) -> Vector3<f64> {
        self.gravity
    }

    fn set_state(&mut self, pose: ArrayView1<f64>, vel: ArrayView1<f64>, acc: ArrayView1<f64>) -> PostResult<()> {
        let dofs = self.num_dofs();
        for (name, len) in [("pose", pose.len()), ("velocity", vel.len()), ("acceleration", acc.len())] {
            if len != dofs {
                return Err(PostErrorBuilder::new("skeleton state").invalid_data(&format!(
                    "{} has {} entries, skeleton has {} DOFs",
                    name, len, dofs
                )));
            }
        }
        self.pose = pose.to_vec();
        self.vel = vel.to_vec();
        self.acc = acc.to_vec();
        Ok(())
    }

    fn com_position(&self) -> Vector3<f64> {
        self.root_translation()
    }

    fn com_linear_acceleration(&self) -> Vector3<f64> {
        Vector3::from_column_slice(&self.acc[ROOT_TRANSLATION_DOFS])
    }

    fn body_world_position(&self, name: &str) -> Option<Vector3<f64>> {
        self.bodies
            .iter()
            .find(|(body, _)| body == name)
            .map(|(_, offset)| self.root_translation() + self.root_rotation() * offset)
    }

    fn joint_torques(&self, contacts: &[ContactWrench]) -> Vec<f64> {
        let com = self.com_position();
        let (total_force, total_moment) = contacts.iter().fold(
            (Vector3::zeros(), Vector3::zeros()),
            |(force, moment), contact| {
                let lever = contact.center_of_pressure - com;
                (force + contact.force, moment + lever.cross(&contact.force) + contact.moment)
            },
        );

        // A point mass has no rotational inertia, so any net moment is unexplained
        let linear = self.mass * (self.com_linear_acceleration() - self.gravity) - total_force;
        let angular = -total_moment;

        let mut torques = vec![0.0; self.num_dofs()];
        for axis in 0..3 {
            torques[ROOT_ROTATION_DOFS.start + axis] = angular[axis];
            torques[ROOT_TRANSLATION_DOFS.start + axis] = linear[axis];
        }
        torques
    }
}

/// Loads [`PointMassSkeleton`]s; the geometry folder is not needed by this model
#[derive(Debug, Clone, Copy, Default)]
pub struct PointMassLoader;

impl SkeletonLoader for PointMassLoader {
    fn load(&self, model_text: &str, geometry_folder: &Path) -> PostResult<Box<dyn Skeleton>> {
        let skeleton = PointMassSkeleton::from_model_text(model_text)?;
        debug!(
            mass_kg = skeleton.mass,
            bodies = skeleton.bodies.len(),
            geometry = %geometry_folder.display(),
            "point mass skeleton loaded"
        );
        Ok(Box::new(skeleton))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::test_support::POINT_MASS_MODEL;
    use ndarray::Array1;
    use std::f64::consts::FRAC_PI_2;

    fn posed(pose: [f64; 6], acc: [f64; 6]) -> PointMassSkeleton {
        let mut skeleton = PointMassSkeleton::from_model_text(POINT_MASS_MODEL).unwrap();
        let pose = Array1::from(pose.to_vec());
        let acc = Array1::from(acc.to_vec());
        skeleton.set_state(pose.view(), Array1::zeros(6).view(), acc.view()).unwrap();
        skeleton
    }

    #[test]
    fn test_parse_defaults() {
        let skeleton = PointMassSkeleton::from_model_text("mass_kg = 60.0").unwrap();
        assert_eq!(skeleton.num_dofs(), 6);
        assert_eq!(skeleton.num_joints(), 0);
        assert_eq!(skeleton.gravity(), Vector3::new(0.0, -9.81, 0.0));
    }

    #[test]
    fn test_invalid_models() {
        assert!(PointMassSkeleton::from_model_text("mass_kg = 0.0").is_err());
        assert!(PointMassSkeleton::from_model_text("mass_kg = 60.0\nnum_dofs = 3").is_err());
        assert!(PointMassSkeleton::from_model_text("not toml at all [").is_err());
    }

    #[test]
    fn test_set_state_checks_dofs() {
        let mut skeleton = PointMassSkeleton::from_model_text(POINT_MASS_MODEL).unwrap();
        let short = Array1::zeros(4);
        let full = Array1::zeros(6);
        assert!(skeleton.set_state(short.view(), full.view(), full.view()).is_err());
    }

    #[test]
    fn test_body_follows_root_rotation() {
        // Yaw a quarter turn: the right foot's +x offset swings onto +y
        let skeleton = posed([0.0, 0.0, FRAC_PI_2, 1.0, 0.0, 2.0], [0.0; 6]);
        let foot = skeleton.body_world_position("calcn_r").unwrap();
        assert!((foot - Vector3::new(1.9, 0.1, 2.0)).norm() < 1e-12);
    }

    #[test]
    fn test_standing_torques_vanish() {
        // Body weight through the COM balances gravity
        let skeleton = posed([0.0, 0.0, 0.0, 0.0, 1.0, 0.0], [0.0; 6]);
        let contact = ContactWrench {
            force: Vector3::new(0.0, 70.0 * 9.81, 0.0),
            moment: Vector3::zeros(),
            center_of_pressure: Vector3::new(0.0, 0.0, 0.0),
        };
        let torques = skeleton.joint_torques(&[contact]);
        assert!(torques.iter().all(|tau| tau.abs() < 1e-9), "{:?}", torques);
    }

    #[test]
    fn test_offset_force_leaves_moment_residual() {
        let skeleton = posed([0.0, 0.0, 0.0, 0.0, 1.0, 0.0], [0.0; 6]);
        let contact = ContactWrench {
            force: Vector3::new(0.0, 100.0, 0.0),
            moment: Vector3::zeros(),
            center_of_pressure: Vector3::new(0.5, 0.0, 0.0),
        };
        let torques = skeleton.joint_torques(&[contact]);
        // lever (0.5, -1, 0) x (0, 100, 0) = (0, 0, 50)
        assert!((torques[2] + 50.0).abs() < 1e-9);
        assert!((torques[4] - (70.0 * 9.81 - 100.0)).abs() < 1e-9);
    }
}
