//! Collision bodies and the sampled narrow phase.
//!
//! A body is a set of shapes rigidly fixed to one frame. Each shape carries a
//! distance field and a cached set of sample points in its own frame. Two
//! bodies are compared by evaluating each body's samples in the other body's
//! fields.

use glam::{Mat4, Vec3};

use super::{CollisionConfig, Contact};
use crate::distance_field::DistanceField;
use crate::error::Result;
use crate::shape::{Aabb, Shape};

/// Interpolated gradients shorter than this have no reliable direction.
const MIN_GRADIENT: f32 = 0.5;

/// One shape of a body with its cached field and sample points.
#[derive(Debug, Clone)]
pub struct BodyShape {
    shape: Shape,
    pose: Mat4,
    field: DistanceField,
    samples: Vec<Vec3>,
}

impl BodyShape {
    fn new(shape: Shape, pose: Mat4, config: &CollisionConfig) -> Result<Self> {
        let field = DistanceField::from_shape(&shape, &config.field)?;
        let mut samples = shape.surface_samples(config.sample_spacing);
        samples.extend(shape.interior_samples(config.sample_spacing));
        Ok(Self {
            shape,
            pose,
            field,
            samples,
        })
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Pose relative to the body frame.
    pub fn pose(&self) -> Mat4 {
        self.pose
    }

    pub fn field(&self) -> &DistanceField {
        &self.field
    }

    /// Sample points in the shape frame.
    pub fn samples(&self) -> &[Vec3] {
        &self.samples
    }
}

/// Shapes rigidly attached to one frame.
#[derive(Debug, Clone, Default)]
pub struct CollisionBody {
    shapes: Vec<BodyShape>,
}

impl CollisionBody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a body from shapes and their poses. Fails without side effects
    /// if any shape is rejected.
    pub fn from_shapes<I>(shapes: I, config: &CollisionConfig) -> Result<Self>
    where
        I: IntoIterator<Item = (Shape, Mat4)>,
    {
        let shapes = shapes
            .into_iter()
            .map(|(shape, pose)| BodyShape::new(shape, pose, config))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { shapes })
    }

    /// Add a shape. The body is unchanged if the field cannot be built.
    pub fn push_shape(&mut self, shape: Shape, pose: Mat4, config: &CollisionConfig) -> Result<()> {
        let body_shape = BodyShape::new(shape, pose, config)?;
        self.shapes.push(body_shape);
        Ok(())
    }

    pub fn shapes(&self) -> &[BodyShape] {
        &self.shapes
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// World-space bounds at `transform`.
    pub fn aabb(&self, transform: &Mat4) -> Aabb {
        self.shapes
            .iter()
            .map(|s| s.shape.aabb(&(*transform * s.pose)))
            .reduce(|a, b| a.union(&b))
            .unwrap_or_else(|| {
                let p = transform.w_axis.truncate();
                Aabb::new(p, p)
            })
    }

    /// Smallest signed distance from a world point to any shape of the body,
    /// with the outward world-space gradient there. The gradient is zero where
    /// the field has no clear direction.
    fn query(&self, frames: &[(Mat4, Mat4)], point: Vec3) -> (f32, Vec3) {
        let mut best = (f32::INFINITY, Vec3::ZERO);
        for (shape, (to_world, to_local)) in self.shapes.iter().zip(frames) {
            let (distance, gradient) = shape.field.sample(to_local.transform_point3(point));
            if distance < best.0 {
                let normal = if gradient.length() < MIN_GRADIENT {
                    Vec3::ZERO
                } else {
                    to_world
                        .transform_vector3(gradient)
                        .try_normalize()
                        .unwrap_or(Vec3::ZERO)
                };
                best = (distance, normal);
            }
        }
        best
    }

    /// World and inverse transforms of each shape.
    fn frames(&self, transform: &Mat4) -> Vec<(Mat4, Mat4)> {
        self.shapes
            .iter()
            .map(|s| {
                let to_world = *transform * s.pose;
                (to_world, to_world.inverse())
            })
            .collect()
    }

    /// World positions of every sample point.
    fn world_samples<'a>(&'a self, transform: &'a Mat4) -> impl Iterator<Item = Vec3> + 'a {
        self.shapes.iter().flat_map(move |s| {
            let to_world = *transform * s.pose;
            s.samples.iter().map(move |p| to_world.transform_point3(*p))
        })
    }
}

/// Penetrating sample points of the pair, deepest first, at most `limit`.
///
/// Samples of `a` are evaluated in `b`'s fields and the other way round.
/// Normals point from `a` to `b`. Where the field gradient is unclear, deep
/// inside a shape, the normal is the direction between the bounds centers.
pub(crate) fn penetrations(
    a: &CollisionBody,
    ta: &Mat4,
    b: &CollisionBody,
    tb: &Mat4,
    limit: usize,
) -> Vec<Contact> {
    let frames_a = a.frames(ta);
    let frames_b = b.frames(tb);

    let mut found = Vec::new();
    // Gradient of b's field points out of b, toward a
    for position in a.world_samples(ta) {
        let (distance, gradient) = b.query(&frames_b, position);
        if distance <= 0.0 {
            found.push(Contact {
                position,
                depth: -distance,
                normal: -gradient,
            });
        }
    }
    for position in b.world_samples(tb) {
        let (distance, gradient) = a.query(&frames_a, position);
        if distance <= 0.0 {
            found.push(Contact {
                position,
                depth: -distance,
                normal: gradient,
            });
        }
    }

    // Stable: equal depths keep sample order
    found.sort_by(|x, y| y.depth.total_cmp(&x.depth));
    found.truncate(limit);

    if found.iter().any(|c| c.normal == Vec3::ZERO) {
        let fallback = (b.aabb(tb).center() - a.aabb(ta).center())
            .try_normalize()
            .unwrap_or(Vec3::Z);
        for contact in found.iter_mut().filter(|c| c.normal == Vec3::ZERO) {
            contact.normal = fallback;
        }
    }
    found
}

/// Whether any sample of either body lies inside the other.
pub(crate) fn intersects(a: &CollisionBody, ta: &Mat4, b: &CollisionBody, tb: &Mat4) -> bool {
    let frames_a = a.frames(ta);
    let frames_b = b.frames(tb);
    a.world_samples(ta).any(|p| b.query(&frames_b, p).0 <= 0.0)
        || b.world_samples(tb).any(|p| a.query(&frames_a, p).0 <= 0.0)
}

/// Smallest sampled signed distance between the bodies. Negative values are
/// penetration depths.
pub(crate) fn min_distance(a: &CollisionBody, ta: &Mat4, b: &CollisionBody, tb: &Mat4) -> f32 {
    let frames_a = a.frames(ta);
    let frames_b = b.frames(tb);
    let a_in_b = a
        .world_samples(ta)
        .map(|p| b.query(&frames_b, p).0)
        .fold(f32::INFINITY, f32::min);
    let b_in_a = b
        .world_samples(tb)
        .map(|p| a.query(&frames_a, p).0)
        .fold(f32::INFINITY, f32::min);
    a_in_b.min(b_in_a)
}
