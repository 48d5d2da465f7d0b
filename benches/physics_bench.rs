use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use jiggle_chain::collision::narrowphase::resolve;
use jiggle_chain::*;
use std::hint::black_box;

const DT: f32 = 1.0 / 60.0;

fn prepare_engine(chain_count: usize, links: usize) -> JiggleEngine {
    let mut engine = JiggleEngine::new(SchedulerConfig::default()).unwrap();
    let body = engine.create_node("body", None, Transform::from_position(Vec3::new(0.0, -3.0, 0.5)));
    for c in 0..chain_count {
        let owner = engine.create_node(
            format!("owner{c}"),
            None,
            Transform::from_position(Vec3::new(c as f32 * 0.2, 0.0, 0.0)),
        );
        let mut parent = owner;
        for i in 0..links {
            parent = engine.create_node(format!("link{c}_{i}"), Some(parent), Transform::from_position(-Vec3::Y * 0.5));
        }
        let settings = ChainSettings::default()
            .with_root(owner)
            .with_radius(0.05, None)
            .with_force(Vec3::new(0.0, 0.0, 0.001))
            .with_collider(Collider::builder(body).capsule(0.5, 2.0).build());
        engine.add_bone(owner, settings);
    }
    // Admit everything before measuring.
    engine.step(DT);
    engine
}

fn bench_world_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_step");
    for &count in &[64usize, 256, 1024] {
        group.bench_with_input(BenchmarkId::new("sequential", count), &count, |b, &count| {
            let mut engine = prepare_engine(count, 12);
            engine.set_parallel_enabled(false);
            b.iter(|| engine.step(black_box(DT)))
        });
        group.bench_with_input(BenchmarkId::new("parallel", count), &count, |b, &count| {
            let mut engine = prepare_engine(count, 12);
            engine.set_parallel_enabled(true);
            b.iter(|| engine.step(black_box(DT)))
        });
    }
    group.finish();
}

fn bench_collider_resolve(c: &mut Criterion) {
    let node = NodeId::default();
    let shapes = [
        ("sphere", Collider::builder(node).sphere(0.5).build()),
        ("capsule", Collider::builder(node).capsule(0.5, 2.0).build()),
        ("tapered", Collider::builder(node).tapered_capsule(0.5, 0.2, 2.0).build()),
    ];
    let mut group = c.benchmark_group("collider_resolve");
    for (name, collider) in shapes {
        let prepared = collider.prepare(Vec3::ZERO, Quat::IDENTITY, 1.0);
        group.bench_function(name, |b| {
            b.iter(|| resolve(black_box(&prepared), black_box(Vec3::new(0.2, 0.1, 0.3)), black_box(0.05)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_world_step, bench_collider_resolve);
criterion_main!(benches);
