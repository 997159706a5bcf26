//! Robot models
//!
//! Kinematic trees with collision geometry, loaded from URDF or built in
//! code, and the joint state that places their links in the world.

pub mod loader;
pub mod robot_model;
pub mod state;

pub use loader::UrdfLoader;
pub use robot_model::{JointInfo, JointType, LinkShapes, RobotModel, RobotModelBuilder};
pub use state::RobotState;
