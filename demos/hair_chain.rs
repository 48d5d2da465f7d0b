use jiggle_chain::*;

fn main() {
    let mut engine = JiggleEngine::new(SchedulerConfig::default()).unwrap();
    engine.set_parallel_enabled(true);

    let head = engine.create_node("head", None, Transform::default());
    let mut strands = Vec::new();
    for s in 0..3 {
        let x = (s as f32 - 1.0) * 0.3;
        let mut parent = engine.create_node(format!("strand{s}"), Some(head), Transform::from_position(Vec3::new(x, 0.0, 0.0)));
        let root = parent;
        for i in 0..6 {
            parent = engine.create_node(format!("strand{s}_{i}"), Some(parent), Transform::from_position(Vec3::new(0.0, -0.25, 0.0)));
        }
        strands.push((root, parent));
    }

    let shoulder = engine.create_node("shoulder", None, Transform::from_position(Vec3::new(0.0, -1.4, 0.2)));
    let mut settings = ChainSettings::default()
        .with_damping(0.2, None)
        .with_elasticity(0.05, Some(ResponseCurve::linear(1.0, 0.2)))
        .with_stiffness(0.3, Some(ResponseCurve::linear(1.0, 0.0)))
        .with_radius(0.05, None)
        .with_gravity(Vec3::new(0.0, -0.002, 0.0))
        .with_collider(Collider::builder(shoulder).capsule(0.3, 1.0).direction(Direction::X).build());
    for &(root, _) in &strands {
        settings = settings.with_extra_root(root);
    }
    let bone = engine.add_bone(head, settings);

    // Swing the head back and forth for two seconds.
    for frame in 0..120 {
        let t = frame as f32 / 60.0;
        let sway = Transform::from_position(Vec3::new((t * 4.0).sin() * 0.3, 0.0, 0.0));
        engine.scene_mut().set_local_transform(head, sway);
        engine.step(1.0 / 60.0);
    }

    for &(_, tip) in &strands {
        println!(
            "{} tip at {:?}",
            engine.scene().name(tip).unwrap_or("?"),
            engine.scene().world_position(tip)
        );
    }
    let world = engine.world();
    println!(
        "bone {} owns {} chains; {} substeps last frame",
        bone,
        world.bone(bone).map(|b| b.chains().len()).unwrap_or(0),
        world.last_substeps()
    );
}
