//! Environment objects and the robot-versus-world check.

use std::collections::BTreeMap;

use glam::Mat4;
use tracing::info;

use super::body::CollisionBody;
use super::robot::Element;
use super::{check_pair, pair_distance, CollisionConfig, CollisionRequest, CollisionResult};
use super::{CollisionRobot, LinkTransforms, Placed};
use crate::acm::AllowedCollisionMatrix;
use crate::error::{CollisionError, Result};
use crate::shape::Shape;

/// A named obstacle: shapes fixed to one world pose.
#[derive(Debug, Clone)]
pub struct WorldObject {
    name: String,
    pose: Mat4,
    body: CollisionBody,
}

impl WorldObject {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// World pose of the object frame.
    pub fn pose(&self) -> Mat4 {
        self.pose
    }

    /// Shapes with poses relative to the object frame.
    pub fn body(&self) -> &CollisionBody {
        &self.body
    }

    fn placed(&self) -> Placed<'_> {
        Placed {
            name: &self.name,
            body: &self.body,
            transform: self.pose,
        }
    }
}

/// Environment obstacles, each exclusively owning its shapes.
#[derive(Debug, Clone, Default)]
pub struct CollisionWorld {
    config: CollisionConfig,
    objects: BTreeMap<String, WorldObject>,
}

impl CollisionWorld {
    pub fn new(config: CollisionConfig) -> Self {
        Self {
            config,
            objects: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &CollisionConfig {
        &self.config
    }

    /// Add a shape at a world pose to `name`, creating the object if needed.
    ///
    /// A new object's frame is the pose of its first shape. Nothing changes
    /// on error.
    pub fn add_to_object(&mut self, name: &str, shape: Shape, pose: Mat4) -> Result<()> {
        match self.objects.get_mut(name) {
            Some(object) => {
                let relative = object.pose.inverse() * pose;
                object.body.push_shape(shape, relative, &self.config)?;
            }
            None => {
                let body = CollisionBody::from_shapes([(shape, Mat4::IDENTITY)], &self.config)?;
                self.objects.insert(
                    name.to_string(),
                    WorldObject {
                        name: name.to_string(),
                        pose,
                        body,
                    },
                );
            }
        }
        info!("Added shape to world object '{}'", name);
        Ok(())
    }

    /// Move an object's frame. Its fields are reused.
    pub fn move_object(&mut self, name: &str, pose: Mat4) -> Result<()> {
        let object = self
            .objects
            .get_mut(name)
            .ok_or_else(|| CollisionError::object_not_found(name))?;
        object.pose = pose;
        Ok(())
    }

    /// Remove an object and its shapes.
    pub fn remove_object(&mut self, name: &str) -> Result<()> {
        self.objects
            .remove(name)
            .ok_or_else(|| CollisionError::object_not_found(name))?;
        info!("Removed world object '{}'", name);
        Ok(())
    }

    pub fn has_object(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }

    pub fn object(&self, name: &str) -> Option<&WorldObject> {
        self.objects.get(name)
    }

    /// Object names in sorted order.
    pub fn object_names(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(String::as_str)
    }

    pub fn clear_objects(&mut self) {
        if !self.objects.is_empty() {
            info!("Removed {} world objects", self.objects.len());
        }
        self.objects.clear();
    }

    fn skip_pair(element: &Element<'_>, object: &WorldObject, acm: &AllowedCollisionMatrix) -> bool {
        element.touches(&object.name) || acm.get_entry(element.name, &object.name)
    }

    /// Check the robot's group against every object, adding to `result`.
    ///
    /// `result` is untouched if the request names an unknown group.
    pub fn check_robot_collision<T: LinkTransforms + ?Sized>(
        &self,
        request: &CollisionRequest,
        result: &mut CollisionResult,
        robot: &CollisionRobot,
        state: &T,
        acm: &AllowedCollisionMatrix,
    ) -> Result<()> {
        let elements = robot.elements(&request.group_name)?;
        if result.is_done(request) {
            return Ok(());
        }

        for element in &elements {
            let mut placed = None;
            for object in self.objects.values() {
                if Self::skip_pair(element, object, acm) {
                    continue;
                }
                let Some(a) = *placed.get_or_insert_with(|| element.place(state)) else {
                    break;
                };
                if check_pair(a, object.placed(), request, result) {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// Smallest sampled signed distance between the robot's group and the
    /// objects. `f32::INFINITY` when no pair survives filtering.
    pub fn distance_robot<T: LinkTransforms + ?Sized>(
        &self,
        request: &CollisionRequest,
        robot: &CollisionRobot,
        state: &T,
        acm: &AllowedCollisionMatrix,
    ) -> Result<f32> {
        let elements = robot.elements(&request.group_name)?;
        let mut best = f32::INFINITY;
        for element in &elements {
            for object in self.objects.values() {
                if Self::skip_pair(element, object, acm) {
                    continue;
                }
                if let Some(a) = element.place(state) {
                    best = best.min(pair_distance(a, object.placed()));
                }
            }
        }
        Ok(best)
    }
}
