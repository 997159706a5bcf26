//! Rein Collision
//!
//! Distance-field collision checking for articulated robots.
//!
//! # Architecture
//!
//! The library is organized into layers:
//!
//! 1. **shape** - Geometric primitives with signed distance and sampling
//! 2. **distance_field** - Voxel signed distance fields built from shapes
//! 3. **acm** - Allowed collision matrix (pair filter)
//! 4. **urdf** - Robot models, URDF loading and forward kinematics
//! 5. **collision** - Robot self check, world check, contact reporting
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rein_collision::{
//!     AllowedCollisionMatrix, CollisionConfig, CollisionRequest, CollisionResult,
//!     CollisionRobot, RobotState, UrdfLoader,
//! };
//!
//! # fn main() -> anyhow::Result<()> {
//! let model = Arc::new(UrdfLoader::load("robot.urdf")?);
//! let robot = CollisionRobot::new(model.clone(), CollisionConfig::default())?;
//! let state = RobotState::new(model.clone());
//! let acm = AllowedCollisionMatrix::new(model.link_names().iter().cloned(), false);
//!
//! let mut result = CollisionResult::new();
//! robot.check_self_collision(&CollisionRequest::default(), &mut result, &state, &acm)?;
//! println!("in collision: {}", result.collision);
//! # Ok(())
//! # }
//! ```

pub mod acm;
pub mod collision;
pub mod distance_field;
pub mod error;
pub mod shape;
pub mod urdf;

// Re-export commonly used types
pub use acm::AllowedCollisionMatrix;
pub use collision::{
    AttachedBody, CollisionBody, CollisionConfig, CollisionRequest, CollisionResult,
    CollisionRobot, CollisionWorld, Contact, LinkGeometry, LinkTransforms, WorldObject,
};
pub use distance_field::{DistanceField, DistanceFieldConfig};
pub use error::{CollisionError, Result};
pub use shape::{Aabb, Shape};
pub use urdf::{JointInfo, JointType, RobotModel, RobotState, UrdfLoader};

// Re-export glam for convenience
pub use glam;

#[cfg(test)]
pub(crate) mod fixtures {
    //! Two-armed test robot.

    use std::sync::Arc;

    use glam::{Mat4, Vec3};

    use crate::acm::AllowedCollisionMatrix;
    use crate::shape::Shape;
    use crate::urdf::{JointInfo, RobotModel};

    fn cuboid(x: f32, y: f32, z: f32) -> Vec<(Shape, Mat4)> {
        vec![(Shape::cuboid(Vec3::new(x, y, z)), Mat4::IDENTITY)]
    }

    fn at(x: f32, y: f32, z: f32) -> Mat4 {
        Mat4::from_translation(Vec3::new(x, y, z))
    }

    /// Base with a bellow and a lifting torso carrying two arms of
    /// shoulder, forearm and palm.
    pub fn test_robot() -> Arc<RobotModel> {
        let mut builder = RobotModel::builder("test_robot")
            .link("base_link", cuboid(0.6, 0.6, 0.2))
            .link("base_bellow_link", cuboid(0.2, 0.2, 0.3))
            .link("torso_lift_link", cuboid(0.3, 0.3, 0.3))
            .joint(JointInfo::fixed(
                "base_bellow_joint",
                "base_link",
                "base_bellow_link",
                at(0.0, 0.0, 0.25),
            ))
            .joint(JointInfo::prismatic(
                "torso_lift_joint",
                "base_link",
                "torso_lift_link",
                at(0.0, 0.0, 0.65),
                Vec3::Z,
                (0.0, 0.3),
            ));

        for (side, y) in [("r", -0.3), ("l", 0.3)] {
            let shoulder = format!("{side}_shoulder_link");
            let forearm = format!("{side}_forearm_link");
            let palm = format!("{side}_gripper_palm_link");
            builder = builder
                .link(&shoulder, cuboid(0.2, 0.2, 0.2))
                .link(&forearm, cuboid(0.3, 0.1, 0.1))
                .link(&palm, cuboid(0.1, 0.1, 0.1))
                .joint(JointInfo::revolute(
                    &format!("{side}_shoulder_pan_joint"),
                    "torso_lift_link",
                    &shoulder,
                    at(0.0, y, 0.1),
                    Vec3::Z,
                    (-2.0, 2.0),
                ))
                .joint(JointInfo::revolute(
                    &format!("{side}_elbow_flex_joint"),
                    &shoulder,
                    &forearm,
                    at(0.35, 0.0, 0.0),
                    Vec3::Y,
                    (-2.0, 0.5),
                ))
                .joint(JointInfo::fixed(
                    &format!("{side}_gripper_palm_joint"),
                    &forearm,
                    &palm,
                    at(0.3, 0.0, 0.0),
                ))
                .group(
                    if side == "r" { "right_arm" } else { "left_arm" },
                    [shoulder, forearm, palm],
                );
        }

        let model = builder
            .group(
                "whole_body",
                [
                    "base_link",
                    "base_bellow_link",
                    "torso_lift_link",
                    "r_shoulder_link",
                    "r_forearm_link",
                    "r_gripper_palm_link",
                    "l_shoulder_link",
                    "l_forearm_link",
                    "l_gripper_palm_link",
                ],
            )
            .build()
            .expect("test robot is valid");
        Arc::new(model)
    }

    /// Matrix over every test robot link with the given default.
    pub fn test_acm(default_entry: bool) -> AllowedCollisionMatrix {
        AllowedCollisionMatrix::new(test_robot().link_names().iter().cloned(), default_entry)
    }
}
