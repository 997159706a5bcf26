//! Voxel signed distance fields built from shapes.
//!
//! # Construction
//!
//! 1. Voxelize the shape over its bounding box grown by the padding
//! 2. Run an exact separable Euclidean distance transform twice: outside
//!    voxels to the nearest inside voxel, and inside voxels to the nearest
//!    outside voxel
//! 3. Replace the narrow band around the surface with exact shape distances
//! 4. Store the normalized central-difference gradient per voxel, or zero
//!    where it vanishes at the shape center
//!
//! Queries are trilinear lookups and never touch the shape again.

use glam::Vec3;
use tracing::debug;

use crate::error::{CollisionError, Result};
use crate::shape::{ray_triangle_intersect, Aabb, Shape};

/// Voxels closer than this many cells to the surface get exact distances.
const NARROW_BAND_CELLS: f32 = 2.0;

/// Configuration for distance field construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceFieldConfig {
    /// Edge length of one voxel. Default: 0.02.
    pub resolution: f32,
    /// Margin added around the shape's bounding box. Never less than one
    /// voxel. Default: 0.05.
    pub padding: f32,
    /// Largest grid accepted before construction fails. Default: 2_000_000.
    pub max_voxels: usize,
}

impl Default for DistanceFieldConfig {
    fn default() -> Self {
        Self {
            resolution: 0.02,
            padding: 0.05,
            max_voxels: 2_000_000,
        }
    }
}

/// Signed distance samples on a regular grid in the shape's local frame.
#[derive(Debug, Clone)]
pub struct DistanceField {
    origin: Vec3,
    resolution: f32,
    dims: [usize; 3],
    distances: Vec<f32>,
    gradients: Vec<Vec3>,
}

impl DistanceField {
    /// Build the field for `shape` at its reference pose (the identity).
    pub fn from_shape(shape: &Shape, config: &DistanceFieldConfig) -> Result<Self> {
        shape.validate()?;

        let resolution = config.resolution;
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(CollisionError::Geometry(format!(
                "resolution {resolution} produces an empty grid"
            )));
        }
        if !(config.padding.is_finite() && config.padding >= 0.0) {
            return Err(CollisionError::Geometry(format!(
                "invalid padding {}",
                config.padding
            )));
        }

        let bounds = shape.local_aabb();
        let padding = config.padding.max(resolution);
        let origin = bounds.min - Vec3::splat(padding);
        let extent = bounds.max + Vec3::splat(padding) - origin;
        let cells = extent / resolution;
        if !cells.is_finite() {
            return Err(CollisionError::Geometry(
                "grid extent is not finite".to_string(),
            ));
        }
        let dims = [
            cells.x.ceil() as usize + 1,
            cells.y.ceil() as usize + 1,
            cells.z.ceil() as usize + 1,
        ];
        let voxel_count = dims
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .unwrap_or(usize::MAX);
        if voxel_count > config.max_voxels {
            return Err(CollisionError::Geometry(format!(
                "grid of {voxel_count} voxels exceeds the limit of {}",
                config.max_voxels
            )));
        }

        let mut field = Self {
            origin,
            resolution,
            dims,
            distances: Vec::new(),
            gradients: Vec::new(),
        };

        let mut occupied = field.voxelize(shape);
        if !occupied.contains(&true) {
            // Thinner than a voxel: occupy the voxels nearest the surface
            for p in shape.surface_samples(resolution) {
                occupied[field.flatten(field.nearest_voxel(p))] = true;
            }
        }
        let inside_count = occupied.iter().filter(|&&o| o).count();
        if inside_count == 0 {
            return Err(CollisionError::Geometry(format!(
                "{} is thinner than resolution {resolution}; grid is empty",
                shape.kind()
            )));
        }

        // Distances in voxel units, measured between voxel centers
        let outside = squared_edt(&occupied, dims, true);
        let inside = squared_edt(&occupied, dims, false);

        let band = NARROW_BAND_CELLS * resolution;
        field.distances = (0..voxel_count)
            .map(|i| {
                let approx = if occupied[i] {
                    -(inside[i].sqrt() - 0.5) * resolution
                } else {
                    (outside[i].sqrt() - 0.5) * resolution
                };
                if approx.abs() < band {
                    shape.signed_distance(field.voxel_center(field.unflatten(i)))
                } else {
                    approx
                }
            })
            .collect();
        field.gradients = field.compute_gradients(&bounds);

        debug!(
            "Built {} distance field: dims {:?}, {} voxels ({} inside)",
            shape.kind(),
            dims,
            voxel_count,
            inside_count
        );

        Ok(field)
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn resolution(&self) -> f32 {
        self.resolution
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn voxel_count(&self) -> usize {
        self.distances.len()
    }

    /// Region covered by voxel centers.
    pub fn bounds(&self) -> Aabb {
        let last = Vec3::new(
            (self.dims[0] - 1) as f32,
            (self.dims[1] - 1) as f32,
            (self.dims[2] - 1) as f32,
        );
        Aabb::new(self.origin, self.origin + last * self.resolution)
    }

    /// Signed distance and outward gradient at a local point.
    ///
    /// Outside the grid the distance is the value at the nearest grid point
    /// plus the distance to it, an upper bound on the true distance.
    pub fn signed_distance(&self, point: Vec3) -> (f32, Vec3) {
        let (distance, gradient) = self.sample(point);
        (distance, gradient.normalize_or_zero())
    }

    /// Signed distance and the interpolated gradient before normalization.
    ///
    /// The gradient is shorter than one where neighboring voxels disagree on
    /// the direction, and zero on the medial point of symmetric shapes.
    pub fn sample(&self, point: Vec3) -> (f32, Vec3) {
        let bounds = self.bounds();
        let clamped = point.clamp(bounds.min, bounds.max);
        let g = (clamped - self.origin) / self.resolution;

        let base = [
            cell_index(g.x, self.dims[0]),
            cell_index(g.y, self.dims[1]),
            cell_index(g.z, self.dims[2]),
        ];
        let t = Vec3::new(
            (g.x - base[0] as f32).clamp(0.0, 1.0),
            (g.y - base[1] as f32).clamp(0.0, 1.0),
            (g.z - base[2] as f32).clamp(0.0, 1.0),
        );

        let mut distance = 0.0;
        let mut gradient = Vec3::ZERO;
        for corner in 0..8 {
            let offset = [corner & 1, (corner >> 1) & 1, (corner >> 2) & 1];
            let weight = (if offset[0] == 1 { t.x } else { 1.0 - t.x })
                * (if offset[1] == 1 { t.y } else { 1.0 - t.y })
                * (if offset[2] == 1 { t.z } else { 1.0 - t.z });
            if weight == 0.0 {
                continue;
            }
            let idx = self.flatten([
                base[0] + offset[0],
                base[1] + offset[1],
                base[2] + offset[2],
            ]);
            distance += weight * self.distances[idx];
            gradient += weight * self.gradients[idx];
        }

        let outside = point - clamped;
        let outside_len = outside.length();
        if outside_len > 0.0 {
            return (distance + outside_len, outside / outside_len);
        }
        (distance, gradient)
    }

    /// Signed distance only.
    #[inline]
    pub fn distance(&self, point: Vec3) -> f32 {
        self.signed_distance(point).0
    }

    #[inline]
    fn flatten(&self, [i, j, k]: [usize; 3]) -> usize {
        i + self.dims[0] * (j + self.dims[1] * k)
    }

    #[inline]
    fn unflatten(&self, idx: usize) -> [usize; 3] {
        let i = idx % self.dims[0];
        let j = (idx / self.dims[0]) % self.dims[1];
        let k = idx / (self.dims[0] * self.dims[1]);
        [i, j, k]
    }

    #[inline]
    fn voxel_center(&self, [i, j, k]: [usize; 3]) -> Vec3 {
        self.origin + Vec3::new(i as f32, j as f32, k as f32) * self.resolution
    }

    fn nearest_voxel(&self, point: Vec3) -> [usize; 3] {
        let g = ((point - self.origin) / self.resolution).round();
        let index = |v: f32, n: usize| (v.max(0.0) as usize).min(n - 1);
        [
            index(g.x, self.dims[0]),
            index(g.y, self.dims[1]),
            index(g.z, self.dims[2]),
        ]
    }

    fn voxelize(&self, shape: &Shape) -> Vec<bool> {
        match shape {
            Shape::Mesh {
                vertices,
                triangles,
            } => self.voxelize_mesh(vertices, triangles),
            _ => (0..self.dims.iter().product::<usize>())
                .map(|idx| shape.contains(self.voxel_center(self.unflatten(idx))))
                .collect(),
        }
    }

    /// Scanline parity fill: one ray along +X per (y, z) row.
    fn voxelize_mesh(&self, vertices: &[Vec3], triangles: &[[u32; 3]]) -> Vec<bool> {
        let [nx, ny, nz] = self.dims;
        let mut occupied = vec![false; nx * ny * nz];
        // Nudge rows off exact vertex coordinates
        let jitter = Vec3::new(0.0, 1.7e-4, 1.1e-4) * self.resolution;
        let start_x = self.origin.x - self.resolution;

        let mut crossings: Vec<f32> = Vec::new();
        for k in 0..nz {
            for j in 0..ny {
                let row = self.voxel_center([0, j, k]) + jitter;
                let ray_origin = Vec3::new(start_x, row.y, row.z);

                crossings.clear();
                for t in triangles {
                    let a = vertices[t[0] as usize];
                    let b = vertices[t[1] as usize];
                    let c = vertices[t[2] as usize];
                    if let Some(hit) = ray_triangle_intersect(ray_origin, Vec3::X, a, b, c) {
                        crossings.push(start_x + hit);
                    }
                }
                if crossings.is_empty() {
                    continue;
                }
                crossings.sort_by(f32::total_cmp);

                let mut next = 0;
                for i in 0..nx {
                    let x = self.origin.x + i as f32 * self.resolution;
                    while next < crossings.len() && crossings[next] < x {
                        next += 1;
                    }
                    if next % 2 == 1 {
                        occupied[self.flatten([i, j, k])] = true;
                    }
                }
            }
        }
        occupied
    }

    fn compute_gradients(&self, bounds: &Aabb) -> Vec<Vec3> {
        let [nx, ny, nz] = self.dims;
        let shape_center = bounds.center();
        // Central differences are in distance per voxel
        let flat = 0.1 * self.resolution;
        (0..self.distances.len())
            .map(|idx| {
                let [i, j, k] = self.unflatten(idx);
                let axis = |lo: [usize; 3], hi: [usize; 3], span: f32| {
                    (self.distances[self.flatten(hi)] - self.distances[self.flatten(lo)]) / span
                };
                let diff = |c: usize, n: usize| -> (usize, usize, f32) {
                    let lo = c.saturating_sub(1);
                    let hi = (c + 1).min(n - 1);
                    (lo, hi, (hi - lo).max(1) as f32)
                };
                let (x0, x1, sx) = diff(i, nx);
                let (y0, y1, sy) = diff(j, ny);
                let (z0, z1, sz) = diff(k, nz);
                let g = Vec3::new(
                    axis([x0, j, k], [x1, j, k], sx),
                    axis([i, y0, k], [i, y1, k], sy),
                    axis([i, j, z0], [i, j, z1], sz),
                );
                if g.length() > flat {
                    return g.normalize();
                }
                let outward = self.voxel_center([i, j, k]) - shape_center;
                if outward.length() > flat {
                    outward.normalize()
                } else {
                    Vec3::ZERO
                }
            })
            .collect()
    }
}

/// Lower corner of the interpolation cell containing grid coordinate `g`.
#[inline]
fn cell_index(g: f32, n: usize) -> usize {
    if n < 2 {
        return 0;
    }
    (g.floor().max(0.0) as usize).min(n - 2)
}

/// Squared Euclidean distance (in voxels) from every voxel to the nearest
/// voxel whose occupancy equals `target`.
fn squared_edt(occupied: &[bool], dims: [usize; 3], target: bool) -> Vec<f32> {
    let mut grid: Vec<f32> = occupied
        .iter()
        .map(|&o| if o == target { 0.0 } else { f32::INFINITY })
        .collect();

    let [nx, ny, nz] = dims;
    let longest = nx.max(ny).max(nz);
    let mut line = vec![0.0f32; longest];
    let mut out = vec![0.0f32; longest];
    let mut scratch = EdtScratch::new(longest);

    // X rows
    for k in 0..nz {
        for j in 0..ny {
            let base = nx * (j + ny * k);
            line[..nx].copy_from_slice(&grid[base..base + nx]);
            edt_1d(&line[..nx], &mut out[..nx], &mut scratch);
            grid[base..base + nx].copy_from_slice(&out[..nx]);
        }
    }
    // Y columns
    for k in 0..nz {
        for i in 0..nx {
            for j in 0..ny {
                line[j] = grid[i + nx * (j + ny * k)];
            }
            edt_1d(&line[..ny], &mut out[..ny], &mut scratch);
            for j in 0..ny {
                grid[i + nx * (j + ny * k)] = out[j];
            }
        }
    }
    // Z columns
    for j in 0..ny {
        for i in 0..nx {
            for k in 0..nz {
                line[k] = grid[i + nx * (j + ny * k)];
            }
            edt_1d(&line[..nz], &mut out[..nz], &mut scratch);
            for k in 0..nz {
                grid[i + nx * (j + ny * k)] = out[k];
            }
        }
    }
    grid
}

struct EdtScratch {
    vertices: Vec<usize>,
    boundaries: Vec<f32>,
}

impl EdtScratch {
    fn new(n: usize) -> Self {
        Self {
            vertices: vec![0; n],
            boundaries: vec![0.0; n + 1],
        }
    }
}

/// One-dimensional squared distance transform (lower envelope of parabolas,
/// Felzenszwalb and Huttenlocher).
fn edt_1d(f: &[f32], d: &mut [f32], scratch: &mut EdtScratch) {
    let n = f.len();
    // Infinite samples contribute no parabola
    let Some(first) = f.iter().position(|v| v.is_finite()) else {
        d.fill(f32::INFINITY);
        return;
    };

    let v = &mut scratch.vertices;
    let z = &mut scratch.boundaries;
    let mut k = 0usize;
    v[0] = first;
    z[0] = f32::NEG_INFINITY;
    z[1] = f32::INFINITY;

    for q in (first + 1)..n {
        if !f[q].is_finite() {
            continue;
        }
        loop {
            let p = v[k];
            let s = ((f[q] + (q * q) as f32) - (f[p] + (p * p) as f32)) / (2.0 * (q - p) as f32);
            // z[0] is -inf, so k never drops below zero
            if s <= z[k] {
                k -= 1;
                continue;
            }
            k += 1;
            v[k] = q;
            z[k] = s;
            z[k + 1] = f32::INFINITY;
            break;
        }
    }

    let mut k = 0usize;
    for (q, out) in d.iter_mut().enumerate() {
        while z[k + 1] < q as f32 {
            k += 1;
        }
        let p = v[k];
        let delta = q as f32 - p as f32;
        *out = delta * delta + f[p];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::unit_cube_mesh;

    fn config() -> DistanceFieldConfig {
        DistanceFieldConfig {
            resolution: 0.02,
            padding: 0.06,
            max_voxels: 1_000_000,
        }
    }

    #[test]
    fn test_edt_1d_matches_brute_force() {
        let inf = f32::INFINITY;
        let f = [inf, 0.0, inf, inf, inf, 0.0, inf, inf];
        let mut d = [0.0; 8];
        let mut scratch = EdtScratch::new(8);
        edt_1d(&f, &mut d, &mut scratch);
        assert_eq!(d, [1.0, 0.0, 1.0, 4.0, 1.0, 0.0, 1.0, 4.0]);

        let empty = [inf; 4];
        let mut d = [0.0; 4];
        edt_1d(&empty, &mut d, &mut scratch);
        assert!(d.iter().all(|v| v.is_infinite()));
    }

    #[test]
    fn test_squared_edt_3d() {
        // Single occupied voxel in the middle of a 5x5x5 grid
        let dims = [5, 5, 5];
        let mut occupied = vec![false; 125];
        occupied[2 + 5 * (2 + 5 * 2)] = true;
        let grid = squared_edt(&occupied, dims, true);
        assert_eq!(grid[2 + 5 * (2 + 5 * 2)], 0.0);
        assert_eq!(grid[0], 12.0);
        assert_eq!(grid[4 + 5 * (2 + 5 * 2)], 4.0);
        assert_eq!(grid[3 + 5 * (3 + 5 * 2)], 2.0);
    }

    #[test]
    fn test_sphere_field_matches_shape() {
        let shape = Shape::sphere(0.1);
        let field = DistanceField::from_shape(&shape, &config()).unwrap();
        let tolerance = field.resolution();

        for p in [
            Vec3::ZERO,
            Vec3::new(0.05, 0.0, 0.0),
            Vec3::new(0.1, 0.0, 0.0),
            Vec3::new(0.0, 0.12, 0.03),
            Vec3::new(-0.07, 0.07, -0.07),
        ] {
            let (d, _) = field.signed_distance(p);
            let expected = shape.signed_distance(p);
            assert!(
                (d - expected).abs() < tolerance,
                "p={p}: field {d}, exact {expected}"
            );
        }
    }

    #[test]
    fn test_gradient_points_outward() {
        let shape = Shape::cuboid(Vec3::splat(0.2));
        let field = DistanceField::from_shape(&shape, &config()).unwrap();

        let (_, g) = field.signed_distance(Vec3::new(0.09, 0.0, 0.0));
        assert!(g.dot(Vec3::X) > 0.9, "gradient {g}");

        let (_, g) = field.signed_distance(Vec3::new(0.0, -0.12, 0.0));
        assert!(g.dot(-Vec3::Y) > 0.9, "gradient {g}");
    }

    #[test]
    fn test_query_outside_grid() {
        let shape = Shape::sphere(0.1);
        let field = DistanceField::from_shape(&shape, &config()).unwrap();
        let (d, g) = field.signed_distance(Vec3::new(2.0, 0.0, 0.0));
        assert!(d >= 1.9 - field.resolution(), "d = {d}");
        assert!((g - Vec3::X).length() < 1e-4);
        assert!(d > 0.0);
    }

    #[test]
    fn test_mesh_field_matches_box_field() {
        let mesh = unit_cube_mesh(0.1);
        let cube = Shape::cuboid(Vec3::splat(0.2));
        let mesh_field = DistanceField::from_shape(&mesh, &config()).unwrap();
        let box_field = DistanceField::from_shape(&cube, &config()).unwrap();
        assert_eq!(mesh_field.dims(), box_field.dims());

        for p in [
            Vec3::ZERO,
            Vec3::new(0.09, 0.0, 0.0),
            Vec3::new(0.15, 0.05, 0.0),
        ] {
            let exact = cube.signed_distance(p);
            for (name, field) in [("mesh", &mesh_field), ("box", &box_field)] {
                let d = field.distance(p);
                assert!((d - exact).abs() <= 0.02, "p={p}: {name} {d}, exact {exact}");
            }
        }
    }

    #[test]
    fn test_deep_interior_uses_transform() {
        // 0.6 m box: the center is far outside the narrow band
        let shape = Shape::cuboid(Vec3::splat(0.6));
        let field = DistanceField::from_shape(&shape, &config()).unwrap();
        let d = field.distance(Vec3::ZERO);
        assert!((d + 0.3).abs() < 0.02, "d = {d}");
    }

    #[test]
    fn test_degenerate_shape_rejected() {
        let result = DistanceField::from_shape(&Shape::cuboid(Vec3::new(0.1, 0.0, 0.1)), &config());
        assert!(matches!(result, Err(CollisionError::Geometry(_))));
    }

    #[test]
    fn test_bad_resolution_rejected() {
        let shape = Shape::sphere(0.1);
        for resolution in [0.0, -0.1, f32::NAN] {
            let cfg = DistanceFieldConfig {
                resolution,
                ..config()
            };
            assert!(matches!(
                DistanceField::from_shape(&shape, &cfg),
                Err(CollisionError::Geometry(_))
            ));
        }

        // No voxel center lands inside, so the surface voxels are used
        let cfg = DistanceFieldConfig {
            resolution: 1.0,
            padding: 0.0,
            max_voxels: 1000,
        };
        assert!(DistanceField::from_shape(&Shape::sphere(0.01), &cfg).is_ok());
    }

    #[test]
    fn test_plate_thinner_than_a_voxel() {
        let plate = Shape::cuboid(Vec3::new(0.2, 0.2, 0.008));
        for padding in [0.05, 0.06, 0.07] {
            let cfg = DistanceFieldConfig {
                padding,
                ..DistanceFieldConfig::default()
            };
            let field = DistanceField::from_shape(&plate, &cfg).unwrap();
            let d = field.distance(Vec3::ZERO);
            assert!(d.abs() <= cfg.resolution, "padding {padding}: d = {d}");
            assert!(field.distance(Vec3::new(0.0, 0.0, 0.1)) > 0.05);
            let (_, g) = field.signed_distance(Vec3::new(0.0, 0.0, 0.03));
            assert!(g.z > 0.9, "padding {padding}: gradient {g}");
        }
    }

    #[test]
    fn test_center_gradient_vanishes() {
        // 0.1 box at the default grid: the center is a grid node
        let field = DistanceField::from_shape(
            &Shape::cuboid(Vec3::splat(0.1)),
            &DistanceFieldConfig::default(),
        )
        .unwrap();
        let (d, g) = field.sample(Vec3::ZERO);
        assert!((d + 0.05).abs() < 1e-4, "d = {d}");
        assert!(g.length() < 1e-4, "gradient {g}");

        let (_, g) = field.sample(Vec3::new(0.03, 0.0, 0.0));
        assert!(g.x > 0.9, "gradient {g}");
    }

    #[test]
    fn test_voxel_limit() {
        let cfg = DistanceFieldConfig {
            max_voxels: 100,
            ..config()
        };
        let result = DistanceField::from_shape(&Shape::sphere(0.5), &cfg);
        assert!(matches!(result, Err(CollisionError::Geometry(_))));
    }
}
