//! Shared scene setup for the collision benchmarks.

use std::sync::Arc;

use anyhow::Result;
use glam::{Mat4, Vec3};
use rein_collision::{
    AllowedCollisionMatrix, CollisionConfig, CollisionRobot, CollisionWorld, JointInfo,
    RobotModel, RobotState, Shape,
};

/// Serial arm of `segments` box links along +X, each on a revolute Z joint.
pub fn arm_model(segments: usize) -> Result<Arc<RobotModel>> {
    let mut builder = RobotModel::builder("bench_arm").link(
        "base_link",
        vec![(Shape::cuboid(Vec3::new(0.4, 0.4, 0.1)), Mat4::IDENTITY)],
    );
    let mut parent = "base_link".to_string();
    for i in 0..segments {
        let link = format!("link_{i}");
        builder = builder
            .link(
                &link,
                vec![(
                    Shape::cuboid(Vec3::new(0.25, 0.08, 0.08)),
                    Mat4::from_translation(Vec3::new(0.125, 0.0, 0.0)),
                )],
            )
            .joint(JointInfo::revolute(
                &format!("joint_{i}"),
                &parent,
                &link,
                Mat4::from_translation(Vec3::new(if i == 0 { 0.0 } else { 0.3 }, 0.0, 0.1)),
                Vec3::Z,
                (-2.5, 2.5),
            ));
        parent = link;
    }
    Ok(Arc::new(builder.build()?))
}

/// Collision robot, default state and a check-by-default matrix.
pub fn setup_robot(
    segments: usize,
) -> Result<(CollisionRobot, RobotState, AllowedCollisionMatrix)> {
    let model = arm_model(segments)?;
    let robot = CollisionRobot::new(model.clone(), CollisionConfig::default())?;
    let acm = AllowedCollisionMatrix::new(model.link_names().iter().cloned(), false);
    Ok((robot, RobotState::new(model), acm))
}

/// Fold the arm back on itself so distant links overlap.
pub fn fold_arm(state: &mut RobotState, segments: usize) -> Result<()> {
    let names: Vec<String> = (0..segments).map(|i| format!("joint_{i}")).collect();
    let positions: Vec<(&str, f32)> = names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), if i % 2 == 1 { 2.4 } else { 0.0 }))
        .collect();
    state.set_joint_positions(&positions)?;
    Ok(())
}

/// `n` spheres scattered on a ring around the arm's reach.
pub fn setup_world(n: usize) -> Result<CollisionWorld> {
    let mut world = CollisionWorld::new(CollisionConfig::default());
    for i in 0..n {
        let angle = i as f32 / n.max(1) as f32 * std::f32::consts::TAU;
        let radius = 0.6 + (i % 3) as f32 * 0.3;
        world.add_to_object(
            &format!("obstacle_{i}"),
            Shape::sphere(0.05),
            Mat4::from_translation(Vec3::new(
                radius * angle.cos(),
                radius * angle.sin(),
                0.1,
            )),
        )?;
    }
    Ok(world)
}
