//! Geometric primitives and their distance queries.
//!
//! All queries are expressed in the shape's local frame. Cylinders and
//! capsules are aligned with the local Z axis, following the URDF convention.

use std::f32::consts::PI;

use glam::{Mat4, Vec2, Vec3};

use crate::error::{CollisionError, Result};

/// Shapes below this volume are rejected as degenerate.
const MIN_VOLUME: f32 = 1e-12;

/// Upper bound on cached samples per shape (surface and interior each).
const MAX_SAMPLES: usize = 4096;

/// Interior lattices never use more than this many points along one axis.
const MAX_INTERIOR_STEPS: f32 = 12.0;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Test whether two AABBs overlap.
    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    #[inline]
    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// World-space box enclosing this local box under `transform`.
    pub fn transformed(&self, transform: &Mat4) -> Aabb {
        let center = transform.transform_point3(self.center());

        // For each world axis, compute the extent by projecting the local box axes
        let abs_col0 = transform.x_axis.truncate().abs();
        let abs_col1 = transform.y_axis.truncate().abs();
        let abs_col2 = transform.z_axis.truncate().abs();
        let half = self.half_extents();
        let extent = abs_col0 * half.x + abs_col1 * half.y + abs_col2 * half.z;

        Aabb {
            min: center - extent,
            max: center + extent,
        }
    }
}

/// Collision geometry primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Box { half_extents: Vec3 },
    Sphere { radius: f32 },
    /// Cylinder along local Z.
    Cylinder { radius: f32, half_height: f32 },
    /// Capsule along local Z; `half_height` excludes the end caps.
    Capsule { radius: f32, half_height: f32 },
    /// Closed triangle mesh with outward (counter-clockwise) winding.
    Mesh {
        vertices: Vec<Vec3>,
        triangles: Vec<[u32; 3]>,
    },
}

impl Shape {
    /// Box from full side lengths.
    pub fn cuboid(size: Vec3) -> Self {
        Shape::Box {
            half_extents: size * 0.5,
        }
    }

    pub fn sphere(radius: f32) -> Self {
        Shape::Sphere { radius }
    }

    /// Cylinder from radius and full length.
    pub fn cylinder(radius: f32, length: f32) -> Self {
        Shape::Cylinder {
            radius,
            half_height: length * 0.5,
        }
    }

    /// Capsule from radius and full length of the straight section.
    pub fn capsule(radius: f32, length: f32) -> Self {
        Shape::Capsule {
            radius,
            half_height: length * 0.5,
        }
    }

    pub fn mesh(vertices: Vec<Vec3>, triangles: Vec<[u32; 3]>) -> Self {
        Shape::Mesh {
            vertices,
            triangles,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Shape::Box { .. } => "box",
            Shape::Sphere { .. } => "sphere",
            Shape::Cylinder { .. } => "cylinder",
            Shape::Capsule { .. } => "capsule",
            Shape::Mesh { .. } => "mesh",
        }
    }

    /// Reject shapes with non-finite, non-positive or zero-volume geometry.
    pub fn validate(&self) -> Result<()> {
        let positive = |v: f32| v.is_finite() && v > 0.0;
        let ok = match self {
            Shape::Box { half_extents } => {
                positive(half_extents.x) && positive(half_extents.y) && positive(half_extents.z)
            }
            Shape::Sphere { radius } => positive(*radius),
            Shape::Cylinder {
                radius,
                half_height,
            } => positive(*radius) && positive(*half_height),
            Shape::Capsule {
                radius,
                half_height,
            } => positive(*radius) && half_height.is_finite() && *half_height >= 0.0,
            Shape::Mesh {
                vertices,
                triangles,
            } => {
                if triangles.is_empty() {
                    return Err(CollisionError::Geometry("mesh has no triangles".into()));
                }
                let count = vertices.len();
                if triangles
                    .iter()
                    .any(|t| t.iter().any(|&i| i as usize >= count))
                {
                    return Err(CollisionError::Geometry(
                        "mesh triangle references a missing vertex".into(),
                    ));
                }
                vertices.iter().all(|v| v.is_finite())
            }
        };

        if !ok {
            return Err(CollisionError::Geometry(format!(
                "degenerate {} dimensions",
                self.kind()
            )));
        }
        if self.volume() <= MIN_VOLUME {
            return Err(CollisionError::Geometry(format!(
                "{} has zero volume",
                self.kind()
            )));
        }
        Ok(())
    }

    /// Enclosed volume.
    pub fn volume(&self) -> f32 {
        match self {
            Shape::Box { half_extents } => 8.0 * half_extents.x * half_extents.y * half_extents.z,
            Shape::Sphere { radius } => 4.0 / 3.0 * PI * radius.powi(3),
            Shape::Cylinder {
                radius,
                half_height,
            } => PI * radius * radius * 2.0 * half_height,
            Shape::Capsule {
                radius,
                half_height,
            } => PI * radius * radius * 2.0 * half_height + 4.0 / 3.0 * PI * radius.powi(3),
            Shape::Mesh {
                vertices,
                triangles,
            } => {
                // Divergence theorem over signed tetrahedra
                let six_volume: f32 = triangles
                    .iter()
                    .map(|t| {
                        let [a, b, c] = triangle(vertices, t);
                        a.dot(b.cross(c))
                    })
                    .sum();
                (six_volume / 6.0).abs()
            }
        }
    }

    /// Local-frame bounding box.
    pub fn local_aabb(&self) -> Aabb {
        match self {
            Shape::Box { half_extents } => Aabb::new(-*half_extents, *half_extents),
            Shape::Sphere { radius } => Aabb::new(Vec3::splat(-radius), Vec3::splat(*radius)),
            Shape::Cylinder {
                radius,
                half_height,
            } => {
                let extents = Vec3::new(*radius, *radius, *half_height);
                Aabb::new(-extents, extents)
            }
            Shape::Capsule {
                radius,
                half_height,
            } => {
                let extents = Vec3::new(*radius, *radius, *half_height + *radius);
                Aabb::new(-extents, extents)
            }
            Shape::Mesh { vertices, .. } => {
                if vertices.is_empty() {
                    return Aabb::new(Vec3::ZERO, Vec3::ZERO);
                }
                let mut min = Vec3::splat(f32::MAX);
                let mut max = Vec3::splat(f32::MIN);
                for v in vertices {
                    min = min.min(*v);
                    max = max.max(*v);
                }
                Aabb::new(min, max)
            }
        }
    }

    /// World-space bounding box under a rigid `pose`.
    pub fn aabb(&self, pose: &Mat4) -> Aabb {
        match self {
            Shape::Sphere { radius } => {
                let center = pose.transform_point3(Vec3::ZERO);
                Aabb::new(center - Vec3::splat(*radius), center + Vec3::splat(*radius))
            }
            _ => self.local_aabb().transformed(pose),
        }
    }

    /// Signed distance from a local point to the surface (negative inside).
    pub fn signed_distance(&self, p: Vec3) -> f32 {
        match self {
            Shape::Box { half_extents } => {
                let q = p.abs() - *half_extents;
                q.max(Vec3::ZERO).length() + q.max_element().min(0.0)
            }
            Shape::Sphere { radius } => p.length() - radius,
            Shape::Cylinder {
                radius,
                half_height,
            } => {
                let d = Vec2::new(p.truncate().length() - radius, p.z.abs() - half_height);
                d.max_element().min(0.0) + d.max(Vec2::ZERO).length()
            }
            Shape::Capsule {
                radius,
                half_height,
            } => {
                let axis_point = Vec3::new(0.0, 0.0, p.z.clamp(-half_height, *half_height));
                (p - axis_point).length() - radius
            }
            Shape::Mesh {
                vertices,
                triangles,
            } => {
                let closest = closest_point_on_mesh(vertices, triangles, p);
                let distance = (closest - p).length();
                if point_in_mesh(vertices, triangles, p) {
                    -distance
                } else {
                    distance
                }
            }
        }
    }

    /// Whether the local point lies inside or on the surface.
    #[inline]
    pub fn contains(&self, p: Vec3) -> bool {
        match self {
            Shape::Mesh {
                vertices,
                triangles,
            } => point_in_mesh(vertices, triangles, p),
            _ => self.signed_distance(p) <= 0.0,
        }
    }

    /// Nearest point on the surface to a local point.
    pub fn closest_surface_point(&self, p: Vec3) -> Vec3 {
        match self {
            Shape::Box { half_extents } => {
                let h = *half_extents;
                let clamped = p.clamp(-h, h);
                if clamped != p {
                    return clamped;
                }
                // Inside: push out through the nearest face
                let gap = h - p.abs();
                let mut out = p;
                if gap.x <= gap.y && gap.x <= gap.z {
                    out.x = h.x.copysign(p.x);
                } else if gap.y <= gap.z {
                    out.y = h.y.copysign(p.y);
                } else {
                    out.z = h.z.copysign(p.z);
                }
                out
            }
            Shape::Sphere { radius } => p.try_normalize().unwrap_or(Vec3::X) * *radius,
            Shape::Cylinder {
                radius,
                half_height,
            } => {
                let radial = p.truncate();
                let radial_len = radial.length();
                let radial_dir = if radial_len > 1e-9 {
                    radial / radial_len
                } else {
                    Vec2::X
                };
                let inside = radial_len <= *radius && p.z.abs() <= *half_height;
                if !inside {
                    let r = radial_len.min(*radius);
                    let xy = radial_dir * r;
                    return Vec3::new(xy.x, xy.y, p.z.clamp(-half_height, *half_height));
                }
                if radius - radial_len <= half_height - p.z.abs() {
                    let xy = radial_dir * *radius;
                    Vec3::new(xy.x, xy.y, p.z)
                } else {
                    Vec3::new(p.x, p.y, half_height.copysign(p.z))
                }
            }
            Shape::Capsule {
                radius,
                half_height,
            } => {
                let axis_point = Vec3::new(0.0, 0.0, p.z.clamp(-half_height, *half_height));
                axis_point + (p - axis_point).try_normalize().unwrap_or(Vec3::X) * *radius
            }
            Shape::Mesh {
                vertices,
                triangles,
            } => closest_point_on_mesh(vertices, triangles, p),
        }
    }

    /// Points on the surface spaced roughly `spacing` apart.
    pub fn surface_samples(&self, spacing: f32) -> Vec<Vec3> {
        let spacing = spacing.max(1e-4);
        match self {
            Shape::Box { half_extents } => box_surface_samples(*half_extents, spacing),
            Shape::Sphere { radius } => {
                let area = 4.0 * PI * radius * radius;
                fibonacci_sphere(sample_budget(area, spacing).max(12))
                    .into_iter()
                    .map(|d| d * *radius)
                    .collect()
            }
            Shape::Cylinder {
                radius,
                half_height,
            } => cylinder_surface_samples(*radius, *half_height, spacing),
            Shape::Capsule {
                radius,
                half_height,
            } => capsule_surface_samples(*radius, *half_height, spacing),
            Shape::Mesh {
                vertices,
                triangles,
            } => mesh_surface_samples(vertices, triangles, spacing),
        }
    }

    /// Lattice points strictly inside the shape. The lattice is centered on
    /// the bounding box and has an odd count per axis so the center is included.
    pub fn interior_samples(&self, spacing: f32) -> Vec<Vec3> {
        let bounds = self.local_aabb();
        let half = bounds.half_extents();
        let center = bounds.center();
        let step = spacing.max(half.max_element() * 2.0 / MAX_INTERIOR_STEPS).max(1e-4);

        let count = |h: f32| {
            let n = ((2.0 * h) / step).floor() as usize + 1;
            if n % 2 == 0 {
                n - 1
            } else {
                n
            }
        };
        let n = [count(half.x), count(half.y), count(half.z)];
        let offset = |i: usize, n: usize| (i as f32 - (n - 1) as f32 * 0.5) * step;

        let mut samples = Vec::new();
        for k in 0..n[2] {
            for j in 0..n[1] {
                for i in 0..n[0] {
                    let p = center + Vec3::new(offset(i, n[0]), offset(j, n[1]), offset(k, n[2]));
                    if self.signed_distance(p) < 0.0 {
                        samples.push(p);
                    }
                }
            }
        }
        samples
    }
}

/// Number of samples covering `area` at `spacing`, capped.
fn sample_budget(area: f32, spacing: f32) -> usize {
    ((area / (spacing * spacing)).ceil() as usize).min(MAX_SAMPLES)
}

/// Evenly spread unit directions.
fn fibonacci_sphere(n: usize) -> Vec<Vec3> {
    let golden = PI * (3.0 - 5.0_f32.sqrt());
    (0..n)
        .map(|i| {
            let z = 1.0 - 2.0 * (i as f32 + 0.5) / n as f32;
            let r = (1.0 - z * z).max(0.0).sqrt();
            let theta = golden * i as f32;
            Vec3::new(r * theta.cos(), r * theta.sin(), z)
        })
        .collect()
}

/// Evenly spaced values covering `[-half, half]` including both ends.
fn span(half: f32, spacing: f32) -> Vec<f32> {
    let n = ((2.0 * half / spacing).ceil() as usize).max(1);
    (0..=n)
        .map(|i| -half + 2.0 * half * i as f32 / n as f32)
        .collect()
}

fn box_surface_samples(h: Vec3, spacing: f32) -> Vec<Vec3> {
    let area = 8.0 * (h.x * h.y + h.y * h.z + h.x * h.z);
    let spacing = spacing.max((area / MAX_SAMPLES as f32).sqrt());
    let (xs, ys, zs) = (span(h.x, spacing), span(h.y, spacing), span(h.z, spacing));

    let mut samples = Vec::new();
    for sign in [-1.0, 1.0] {
        for &y in &ys {
            for &z in &zs {
                samples.push(Vec3::new(sign * h.x, y, z));
            }
        }
        for &x in &xs {
            for &z in &zs {
                samples.push(Vec3::new(x, sign * h.y, z));
            }
        }
        for &x in &xs {
            for &y in &ys {
                samples.push(Vec3::new(x, y, sign * h.z));
            }
        }
    }
    samples
}

/// Points on a disc of `radius` at height `z`: center plus concentric rings.
fn disc_samples(radius: f32, z: f32, spacing: f32, samples: &mut Vec<Vec3>) {
    samples.push(Vec3::new(0.0, 0.0, z));
    let rings = (radius / spacing).ceil() as usize;
    for ring in 1..=rings {
        let r = radius * ring as f32 / rings as f32;
        let count = ((2.0 * PI * r / spacing).ceil() as usize).max(6);
        for i in 0..count {
            let theta = 2.0 * PI * i as f32 / count as f32;
            samples.push(Vec3::new(r * theta.cos(), r * theta.sin(), z));
        }
    }
}

fn cylinder_surface_samples(radius: f32, half_height: f32, spacing: f32) -> Vec<Vec3> {
    let area = 2.0 * PI * radius * (2.0 * half_height + radius);
    let spacing = spacing.max((area / MAX_SAMPLES as f32).sqrt());
    let around = ((2.0 * PI * radius / spacing).ceil() as usize).max(8);

    let mut samples = Vec::new();
    for z in span(half_height, spacing) {
        for i in 0..around {
            let theta = 2.0 * PI * i as f32 / around as f32;
            samples.push(Vec3::new(radius * theta.cos(), radius * theta.sin(), z));
        }
    }
    disc_samples(radius, half_height, spacing, &mut samples);
    disc_samples(radius, -half_height, spacing, &mut samples);
    samples
}

fn capsule_surface_samples(radius: f32, half_height: f32, spacing: f32) -> Vec<Vec3> {
    let area = 2.0 * PI * radius * 2.0 * half_height + 4.0 * PI * radius * radius;
    let spacing = spacing.max((area / MAX_SAMPLES as f32).sqrt());
    let around = ((2.0 * PI * radius / spacing).ceil() as usize).max(8);

    let mut samples = Vec::new();
    if half_height > 0.0 {
        for z in span(half_height, spacing) {
            for i in 0..around {
                let theta = 2.0 * PI * i as f32 / around as f32;
                samples.push(Vec3::new(radius * theta.cos(), radius * theta.sin(), z));
            }
        }
    }
    let caps = sample_budget(4.0 * PI * radius * radius, spacing).max(12);
    for dir in fibonacci_sphere(caps) {
        let end = if dir.z >= 0.0 { half_height } else { -half_height };
        samples.push(Vec3::new(0.0, 0.0, end) + dir * radius);
    }
    samples
}

fn mesh_surface_samples(vertices: &[Vec3], triangles: &[[u32; 3]], spacing: f32) -> Vec<Vec3> {
    let mut samples: Vec<Vec3> = vertices.to_vec();
    for t in triangles {
        let [a, b, c] = triangle(vertices, t);
        let longest = (b - a).length().max((c - a).length()).max((c - b).length());
        let n = (longest / spacing).ceil() as usize;
        if n < 2 {
            samples.push((a + b + c) / 3.0);
            continue;
        }
        for i in 0..=n {
            for j in 0..=(n - i) {
                // Vertices are already in the list
                if (i == 0 && j == 0) || i == n || j == n {
                    continue;
                }
                let u = i as f32 / n as f32;
                let v = j as f32 / n as f32;
                samples.push(a + (b - a) * u + (c - a) * v);
            }
        }
        if samples.len() >= MAX_SAMPLES {
            break;
        }
    }
    samples
}

#[inline]
fn triangle(vertices: &[Vec3], t: &[u32; 3]) -> [Vec3; 3] {
    [
        vertices[t[0] as usize],
        vertices[t[1] as usize],
        vertices[t[2] as usize],
    ]
}

fn closest_point_on_mesh(vertices: &[Vec3], triangles: &[[u32; 3]], p: Vec3) -> Vec3 {
    let mut best = p;
    let mut best_dist_sq = f32::MAX;
    for t in triangles {
        let [a, b, c] = triangle(vertices, t);
        let candidate = closest_point_on_triangle(p, a, b, c);
        let dist_sq = (candidate - p).length_squared();
        if dist_sq < best_dist_sq {
            best_dist_sq = dist_sq;
            best = candidate;
        }
    }
    best
}

/// Find the closest point on triangle `abc` to `p`.
pub(crate) fn closest_point_on_triangle(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;

    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a;
    }

    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return a + ab * v;
    }

    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return a + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    let denom = 1.0 / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    a + ab * v + ac * w
}

/// Möller-Trumbore ray/triangle test. Returns the ray parameter of the hit.
pub(crate) fn ray_triangle_intersect(
    origin: Vec3,
    dir: Vec3,
    a: Vec3,
    b: Vec3,
    c: Vec3,
) -> Option<f32> {
    let e1 = b - a;
    let e2 = c - a;
    let h = dir.cross(e2);
    let det = e1.dot(h);
    if det.abs() < 1e-12 {
        return None;
    }
    let inv_det = 1.0 / det;
    let s = origin - a;
    let u = s.dot(h) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(e1);
    let v = dir.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(q) * inv_det;
    (t > 0.0).then_some(t)
}

/// Ray-parity inside test. The ray is skewed off the axes to avoid grazing
/// edges of axis-aligned meshes.
fn point_in_mesh(vertices: &[Vec3], triangles: &[[u32; 3]], p: Vec3) -> bool {
    let dir = Vec3::new(1.0, 1.3e-3, 0.7e-3).normalize();
    let crossings = triangles
        .iter()
        .filter(|t| {
            let [a, b, c] = triangle(vertices, t);
            ray_triangle_intersect(p, dir, a, b, c).is_some()
        })
        .count();
    crossings % 2 == 1
}

#[cfg(test)]
pub(crate) fn unit_cube_mesh(half: f32) -> Shape {
    let h = half;
    let vertices = vec![
        Vec3::new(-h, -h, -h),
        Vec3::new(h, -h, -h),
        Vec3::new(h, h, -h),
        Vec3::new(-h, h, -h),
        Vec3::new(-h, -h, h),
        Vec3::new(h, -h, h),
        Vec3::new(h, h, h),
        Vec3::new(-h, h, h),
    ];
    let triangles = vec![
        [0, 2, 1],
        [0, 3, 2],
        [4, 5, 6],
        [4, 6, 7],
        [0, 1, 5],
        [0, 5, 4],
        [2, 3, 7],
        [2, 7, 6],
        [1, 2, 6],
        [1, 6, 5],
        [0, 4, 7],
        [0, 7, 3],
    ];
    Shape::mesh(vertices, triangles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[test]
    fn test_box_signed_distance() {
        let shape = Shape::cuboid(Vec3::splat(2.0));
        let eps = 1e-5;
        assert!((shape.signed_distance(Vec3::ZERO) + 1.0).abs() < eps);
        assert!((shape.signed_distance(Vec3::new(3.0, 0.0, 0.0)) - 2.0).abs() < eps);
        assert!((shape.signed_distance(Vec3::new(2.0, 2.0, 0.0)) - 2.0_f32.sqrt()).abs() < eps);
        assert!(shape.signed_distance(Vec3::new(1.0, 0.5, 0.0)).abs() < eps);
    }

    #[test]
    fn test_cylinder_and_capsule_distance() {
        let cylinder = Shape::cylinder(1.0, 2.0);
        let eps = 1e-5;
        assert!((cylinder.signed_distance(Vec3::new(2.0, 0.0, 0.0)) - 1.0).abs() < eps);
        assert!((cylinder.signed_distance(Vec3::new(0.0, 0.0, 3.0)) - 2.0).abs() < eps);
        assert!((cylinder.signed_distance(Vec3::ZERO) + 1.0).abs() < eps);

        let capsule = Shape::capsule(0.5, 2.0);
        assert!((capsule.signed_distance(Vec3::new(0.0, 0.0, 2.0)) - 0.5).abs() < eps);
        assert!((capsule.signed_distance(Vec3::new(1.0, 0.0, 0.5)) - 0.5).abs() < eps);
    }

    #[test]
    fn test_mesh_matches_box() {
        let mesh = unit_cube_mesh(0.5);
        let reference = Shape::cuboid(Vec3::ONE);
        assert!((mesh.volume() - 1.0).abs() < 1e-5);
        for p in [
            Vec3::ZERO,
            Vec3::new(0.2, 0.1, -0.3),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.8, 0.9, 0.0),
        ] {
            let d = mesh.signed_distance(p);
            let expected = reference.signed_distance(p);
            assert!((d - expected).abs() < 1e-4, "p={p}: {d} vs {expected}");
        }
    }

    #[test]
    fn test_closest_surface_point_lies_on_surface() {
        let shapes = [
            Shape::cuboid(Vec3::new(1.0, 2.0, 0.5)),
            Shape::sphere(0.7),
            Shape::cylinder(0.4, 1.0),
            Shape::capsule(0.3, 0.6),
        ];
        let points = [
            Vec3::new(0.1, 0.05, 0.02),
            Vec3::new(2.0, -1.0, 0.5),
            Vec3::new(0.0, 0.0, 3.0),
        ];
        for shape in &shapes {
            for p in points {
                let q = shape.closest_surface_point(p);
                assert!(
                    shape.signed_distance(q).abs() < 1e-4,
                    "{} closest point off surface",
                    shape.kind()
                );
                assert!(
                    ((q - p).length() - shape.signed_distance(p).abs()).abs() < 1e-4,
                    "{} closest point not nearest",
                    shape.kind()
                );
            }
        }
    }

    #[test]
    fn test_validate_rejects_degenerate() {
        assert!(Shape::cuboid(Vec3::new(1.0, 0.0, 1.0)).validate().is_err());
        assert!(Shape::sphere(-1.0).validate().is_err());
        assert!(Shape::sphere(f32::NAN).validate().is_err());
        assert!(Shape::mesh(vec![Vec3::ZERO], vec![]).validate().is_err());
        assert!(Shape::mesh(vec![Vec3::ZERO], vec![[0, 1, 2]]).validate().is_err());
        // Flat mesh encloses no volume
        let flat = Shape::mesh(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![[0, 1, 2]]);
        assert!(matches!(flat.validate(), Err(CollisionError::Geometry(_))));
        assert!(Shape::capsule(0.1, 0.0).validate().is_ok());
    }

    #[test]
    fn test_surface_samples_on_surface() {
        for shape in [
            Shape::cuboid(Vec3::new(0.2, 0.1, 0.3)),
            Shape::sphere(0.1),
            Shape::cylinder(0.05, 0.2),
            Shape::capsule(0.05, 0.1),
            unit_cube_mesh(0.1),
        ] {
            let samples = shape.surface_samples(0.02);
            assert!(!samples.is_empty());
            for s in samples {
                assert!(shape.signed_distance(s).abs() < 1e-4, "{}", shape.kind());
            }
        }
    }

    #[test]
    fn test_interior_samples_include_center() {
        let shape = Shape::cuboid(Vec3::splat(0.1));
        let samples = shape.interior_samples(0.02);
        assert!(samples.iter().any(|s| s.length() < 1e-6));
        assert!(samples.iter().all(|s| shape.signed_distance(*s) < 0.0));
    }

    #[test]
    fn test_rotated_box_aabb() {
        let shape = Shape::cuboid(Vec3::new(2.0, 2.0, 2.0));
        let pose = Mat4::from_rotation_translation(
            Quat::from_rotation_z(std::f32::consts::FRAC_PI_4),
            Vec3::new(1.0, 0.0, 0.0),
        );
        let aabb = shape.aabb(&pose);
        let r = 2.0_f32.sqrt();
        assert!((aabb.min - Vec3::new(1.0 - r, -r, -1.0)).length() < 1e-5);
        assert!((aabb.max - Vec3::new(1.0 + r, r, 1.0)).length() < 1e-5);
    }

    #[test]
    fn test_aabb_overlap() {
        let a = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let b = Aabb::new(Vec3::splat(0.5), Vec3::splat(2.0));
        let c = Aabb::new(Vec3::splat(2.5), Vec3::splat(3.0));
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
        assert!(a.union(&c).contains(Vec3::splat(2.7)));
    }
}
