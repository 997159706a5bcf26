//! URDF loader
//!
//! Parses URDF files into a [`RobotModel`] with collision geometry.

use anyhow::{Context, Result};
use glam::{Mat4, Quat, Vec3};
use std::path::Path;
use tracing::{info, warn};

use super::robot_model::{JointInfo, JointType, LinkShapes, RobotModel};
use crate::shape::Shape;

/// URDF loader utility.
pub struct UrdfLoader;

impl UrdfLoader {
    /// Load a URDF file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<RobotModel> {
        let path = path.as_ref();
        info!("Loading URDF from {:?}", path);

        let robot = urdf_rs::read_file(path)
            .with_context(|| format!("Failed to load URDF from {:?}", path))?;
        Self::convert(&robot)
    }

    /// Load a URDF document held in memory.
    pub fn load_str(xml: &str) -> Result<RobotModel> {
        let robot = urdf_rs::read_from_string(xml).context("Failed to parse URDF")?;
        Self::convert(&robot)
    }

    fn convert(robot: &urdf_rs::Robot) -> Result<RobotModel> {
        let mut builder = RobotModel::builder(&robot.name);
        let mut shape_count = 0;

        for link in &robot.links {
            let mut shapes = LinkShapes::new();
            for collision in &link.collision {
                let shape = match &collision.geometry {
                    urdf_rs::Geometry::Box { size } => {
                        Shape::cuboid(Vec3::new(size[0] as f32, size[1] as f32, size[2] as f32))
                    }
                    urdf_rs::Geometry::Cylinder { radius, length } => {
                        Shape::cylinder(*radius as f32, *length as f32)
                    }
                    urdf_rs::Geometry::Sphere { radius } => Shape::sphere(*radius as f32),
                    urdf_rs::Geometry::Capsule { radius, length } => {
                        Shape::capsule(*radius as f32, *length as f32)
                    }
                    urdf_rs::Geometry::Mesh { filename, .. } => {
                        warn!(
                            "Skipping mesh collision geometry '{}' on link '{}'",
                            filename, link.name
                        );
                        continue;
                    }
                };
                shapes.push((shape, Self::pose_to_mat4(&collision.origin)));
            }
            shape_count += shapes.len();
            builder = builder.link(&link.name, shapes);
        }

        for joint in &robot.joints {
            let joint_type = match joint.joint_type {
                urdf_rs::JointType::Fixed => JointType::Fixed,
                urdf_rs::JointType::Revolute => JointType::Revolute,
                urdf_rs::JointType::Continuous => JointType::Continuous,
                urdf_rs::JointType::Prismatic => JointType::Prismatic,
                ref other => {
                    warn!(
                        "Joint '{}' has unsupported type {:?}; treating it as fixed",
                        joint.name, other
                    );
                    JointType::Fixed
                }
            };

            builder = builder.joint(JointInfo {
                name: joint.name.clone(),
                joint_type,
                parent_link: joint.parent.link.clone(),
                child_link: joint.child.link.clone(),
                origin: Self::pose_to_mat4(&joint.origin),
                axis: Vec3::new(
                    joint.axis.xyz[0] as f32,
                    joint.axis.xyz[1] as f32,
                    joint.axis.xyz[2] as f32,
                ),
                lower: joint.limit.lower as f32,
                upper: joint.limit.upper as f32,
            });
        }

        let model = builder
            .build()
            .with_context(|| format!("Invalid kinematic tree in URDF robot '{}'", robot.name))?;

        info!(
            "Loaded robot '{}': {} links, {} collision shapes, {} joints",
            model.name(),
            model.link_names().len(),
            shape_count,
            model.joints().len()
        );

        Ok(model)
    }

    fn pose_to_mat4(pose: &urdf_rs::Pose) -> Mat4 {
        let translation = Vec3::new(pose.xyz[0] as f32, pose.xyz[1] as f32, pose.xyz[2] as f32);

        // URDF rpy is fixed-axis X, Y, Z: R = Rz(yaw) * Ry(pitch) * Rx(roll)
        let roll = pose.rpy[0] as f32;
        let pitch = pose.rpy[1] as f32;
        let yaw = pose.rpy[2] as f32;

        let rotation = Quat::from_euler(glam::EulerRot::ZYX, yaw, pitch, roll);

        Mat4::from_rotation_translation(rotation, translation)
    }
}
