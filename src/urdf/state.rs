//! Robot state
//!
//! Joint positions and the per-link world transforms derived from them.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use glam::Mat4;

use super::robot_model::RobotModel;
use crate::collision::LinkTransforms;
use crate::error::{CollisionError, Result};

/// Joint values and forward kinematics for one [`RobotModel`].
#[derive(Debug, Clone)]
pub struct RobotState {
    model: Arc<RobotModel>,
    positions: HashMap<String, f32>,
    link_transforms: HashMap<String, Mat4>,
}

impl RobotState {
    /// Create a state at the default joint values.
    pub fn new(model: Arc<RobotModel>) -> Self {
        let mut state = Self {
            model,
            positions: HashMap::new(),
            link_transforms: HashMap::new(),
        };
        state.set_to_default_values();
        state
    }

    pub fn model(&self) -> &Arc<RobotModel> {
        &self.model
    }

    /// Reset every joint to its default position and recompute transforms.
    pub fn set_to_default_values(&mut self) {
        self.positions = self
            .model
            .joints()
            .iter()
            .map(|j| (j.name.clone(), j.default_position()))
            .collect();
        self.update_transforms();
    }

    /// Set named joint positions and recompute transforms.
    ///
    /// Nothing changes if any joint name is unknown.
    pub fn set_joint_positions(&mut self, positions: &[(&str, f32)]) -> Result<()> {
        if let Some((name, _)) = positions
            .iter()
            .find(|(name, _)| !self.positions.contains_key(*name))
        {
            return Err(CollisionError::joint_not_found(name));
        }
        for (name, value) in positions {
            self.positions.insert(name.to_string(), *value);
        }
        self.update_transforms();
        Ok(())
    }

    pub fn joint_position(&self, name: &str) -> Option<f32> {
        self.positions.get(name).copied()
    }

    /// Place `link` at a world transform; its descendants follow rigidly.
    ///
    /// The override lasts until the next joint update.
    pub fn update_link_transform(&mut self, link: &str, transform: Mat4) -> Result<()> {
        if !self.model.has_link(link) {
            return Err(CollisionError::link_not_found(link));
        }
        self.link_transforms.insert(link.to_string(), transform);

        let mut moved = HashSet::from([link.to_string()]);
        for joint in self.model.joints() {
            if !moved.contains(&joint.parent_link) {
                continue;
            }
            let parent = self
                .link_transforms
                .get(&joint.parent_link)
                .copied()
                .unwrap_or(Mat4::IDENTITY);
            let position = self.positions.get(&joint.name).copied().unwrap_or(0.0);
            self.link_transforms
                .insert(joint.child_link.clone(), parent * joint.child_transform(position));
            moved.insert(joint.child_link.clone());
        }
        Ok(())
    }

    /// World transform of a link.
    pub fn link_transform(&self, link: &str) -> Option<Mat4> {
        self.link_transforms.get(link).copied()
    }

    fn update_transforms(&mut self) {
        self.link_transforms.clear();
        self.link_transforms
            .insert(self.model.root_link().to_string(), Mat4::IDENTITY);

        // Joints are ordered parent-first
        for joint in self.model.joints() {
            let parent_transform = self
                .link_transforms
                .get(&joint.parent_link)
                .copied()
                .unwrap_or(Mat4::IDENTITY);
            let position = self.positions.get(&joint.name).copied().unwrap_or(0.0);
            self.link_transforms.insert(
                joint.child_link.clone(),
                parent_transform * joint.child_transform(position),
            );
        }
    }
}

impl LinkTransforms for RobotState {
    fn link_transform(&self, link: &str) -> Option<Mat4> {
        RobotState::link_transform(self, link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use glam::Vec3;

    fn translation(state: &RobotState, link: &str) -> Vec3 {
        state.link_transform(link).unwrap().w_axis.truncate()
    }

    #[test]
    fn test_default_forward_kinematics() {
        let state = RobotState::new(fixtures::test_robot());
        assert_eq!(translation(&state, "base_link"), Vec3::ZERO);
        assert!((translation(&state, "torso_lift_link") - Vec3::new(0.0, 0.0, 0.65)).length() < 1e-6);
        assert!(
            (translation(&state, "r_gripper_palm_link") - Vec3::new(0.65, -0.3, 0.75)).length()
                < 1e-5
        );
    }

    #[test]
    fn test_joint_positions_move_children() {
        let mut state = RobotState::new(fixtures::test_robot());
        state
            .set_joint_positions(&[("torso_lift_joint", 0.2)])
            .unwrap();
        assert!((translation(&state, "torso_lift_link").z - 0.85).abs() < 1e-6);
        assert!((translation(&state, "l_gripper_palm_link").z - 0.95).abs() < 1e-5);

        state
            .set_joint_positions(&[("r_shoulder_pan_joint", std::f32::consts::FRAC_PI_2)])
            .unwrap();
        let forearm = translation(&state, "r_forearm_link");
        assert!((forearm - Vec3::new(0.0, 0.05, 0.95)).length() < 1e-5);
    }

    #[test]
    fn test_unknown_joint_leaves_state_unchanged() {
        let mut state = RobotState::new(fixtures::test_robot());
        let err = state
            .set_joint_positions(&[("torso_lift_joint", 0.2), ("ghost", 1.0)])
            .unwrap_err();
        assert!(matches!(err, CollisionError::NotFound { kind: "joint", .. }));
        assert_eq!(state.joint_position("torso_lift_joint"), Some(0.0));
    }

    #[test]
    fn test_update_link_transform_carries_descendants() {
        let mut state = RobotState::new(fixtures::test_robot());
        let before = translation(&state, "r_gripper_palm_link");
        state
            .update_link_transform(
                "r_shoulder_link",
                Mat4::from_translation(Vec3::new(0.1, -0.3, 0.75)),
            )
            .unwrap();
        let after = translation(&state, "r_gripper_palm_link");
        assert!((after - before - Vec3::new(0.1, 0.0, 0.0)).length() < 1e-5);
        // Siblings stay put
        assert!((translation(&state, "l_shoulder_link") - Vec3::new(0.0, 0.3, 0.75)).length() < 1e-6);

        assert!(state.update_link_transform("ghost", Mat4::IDENTITY).is_err());
    }
}
