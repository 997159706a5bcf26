//! Collision engine benchmarks (criterion - wall-clock time).
//!
//! Run all:    cargo bench --manifest-path benchmarks/Cargo.toml --bench collision
//! Filter:     cargo bench --manifest-path benchmarks/Cargo.toml --bench collision -- self_check

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::Vec3;
use rein_collision::{CollisionRequest, CollisionResult, DistanceField, DistanceFieldConfig, Shape};
use rein_collision_bench::*;

// ---------------------------------------------------------------------------
// Distance field construction
// ---------------------------------------------------------------------------

fn bench_field_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("field_build");
    let config = DistanceFieldConfig::default();
    let shapes = [
        ("box", Shape::cuboid(Vec3::new(0.3, 0.2, 0.1))),
        ("sphere", Shape::sphere(0.15)),
        ("cylinder", Shape::cylinder(0.08, 0.4)),
        ("capsule", Shape::capsule(0.08, 0.3)),
    ];
    for (name, shape) in &shapes {
        group.bench_function(*name, |b| {
            b.iter(|| DistanceField::from_shape(shape, &config));
        });
    }
    group.finish();

    let field = DistanceField::from_shape(&Shape::sphere(0.15), &config).expect("sphere field");
    c.bench_function("field_query", |b| {
        b.iter(|| field.signed_distance(Vec3::new(0.05, 0.11, -0.02)));
    });
}

// ---------------------------------------------------------------------------
// Self check
// ---------------------------------------------------------------------------

fn bench_self_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("self_check");
    for &segments in &[2, 4, 8] {
        let (robot, mut state, acm) = setup_robot(segments).expect("bench robot");

        let request = CollisionRequest::default();
        group.bench_with_input(BenchmarkId::new("free", segments), &segments, |b, _| {
            b.iter(|| {
                let mut result = CollisionResult::new();
                robot
                    .check_self_collision(&request, &mut result, &state, &acm)
                    .expect("self check");
                result.collision
            });
        });

        fold_arm(&mut state, segments).expect("fold arm");
        let request = CollisionRequest {
            contacts: true,
            max_contacts: 100,
            max_contacts_per_pair: 4,
            ..Default::default()
        };
        group.bench_with_input(BenchmarkId::new("folded", segments), &segments, |b, _| {
            b.iter(|| {
                let mut result = CollisionResult::new();
                robot
                    .check_self_collision(&request, &mut result, &state, &acm)
                    .expect("self check");
                result.contact_count
            });
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// World check
// ---------------------------------------------------------------------------

fn bench_world_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_check");
    let (robot, state, acm) = setup_robot(4).expect("bench robot");
    for &n in &[10, 50, 200] {
        let world = setup_world(n).expect("bench world");
        let request = CollisionRequest::default();
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let mut result = CollisionResult::new();
                world
                    .check_robot_collision(&request, &mut result, &robot, &state, &acm)
                    .expect("world check");
                result.collision
            });
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

criterion_group!(benches, bench_field_build, bench_self_check, bench_world_check);
criterion_main!(benches);
