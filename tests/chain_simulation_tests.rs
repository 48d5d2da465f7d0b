use jiggle_chain::*;

const DT: f32 = 1.0 / 60.0;

fn straight_chain(scene: &mut TransformHierarchy, links: usize) -> (NodeId, NodeId, Vec<NodeId>) {
    let owner = scene.create_node("owner", None, Transform::default());
    let root = scene.create_node("root", Some(owner), Transform::default());
    let mut nodes = vec![root];
    for i in 0..links {
        let parent = *nodes.last().unwrap();
        nodes.push(scene.create_node(format!("link{i}"), Some(parent), Transform::from_position(-Vec3::Y)));
    }
    (owner, root, nodes)
}

fn world() -> JiggleWorld {
    JiggleWorld::new(SchedulerConfig::default().with_parallel(false)).unwrap()
}

fn positions(scene: &TransformHierarchy, nodes: &[NodeId]) -> Vec<Vec3> {
    nodes.iter().map(|&n| scene.world_position(n)).collect()
}

#[test]
fn rigid_chain_follows_owner_translation() {
    let mut scene = TransformHierarchy::new();
    let (owner, root, nodes) = straight_chain(&mut scene, 4);
    let mut world = world();
    let settings = ChainSettings::default()
        .with_root(root)
        .with_damping(0.0, None)
        .with_elasticity(1.0, None)
        .with_stiffness(1.0, None);
    world.add_bone(owner, settings, &scene);

    world.step(&mut scene, &FrameClock::from_delta(DT));
    let rest = positions(&scene, &nodes);

    let displacement = Vec3::new(0.1, 0.05, -0.02);
    scene.set_local_transform(owner, Transform::from_position(displacement));
    world.step(&mut scene, &FrameClock::from_delta(DT));

    for (moved, rest) in positions(&scene, &nodes).iter().zip(&rest) {
        let delta = *moved - (*rest + displacement);
        assert!(delta.length() < 1e-4, "particle off by {delta:?}");
    }
}

#[test]
fn zero_weight_keeps_rest_pose() {
    let mut scene = TransformHierarchy::new();
    let (owner, root, nodes) = straight_chain(&mut scene, 3);
    let mut world = world();
    let settings = ChainSettings::default()
        .with_root(root)
        .with_blend_weight(0.0)
        .with_force(Vec3::new(0.5, 0.0, 0.0));
    world.add_bone(owner, settings, &scene);

    for frame in 0..10 {
        scene.set_local_transform(owner, Transform::from_position(Vec3::new(frame as f32 * 0.2, 0.0, 0.0)));
        world.step(&mut scene, &FrameClock::from_delta(DT));
    }

    for &node in &nodes[1..] {
        assert_eq!(scene.local_position(node), -Vec3::Y);
        assert_eq!(scene.local_rotation(node), Quat::IDENTITY);
    }
}

#[test]
fn zero_elapsed_time_leaves_pose_unchanged() {
    let mut scene = TransformHierarchy::new();
    let (owner, root, nodes) = straight_chain(&mut scene, 4);
    let mut world = world();
    world.add_bone(owner, ChainSettings::default().with_root(root), &scene);

    world.step(&mut scene, &FrameClock::from_delta(DT));
    let before = positions(&scene, &nodes);
    for _ in 0..3 {
        world.step(&mut scene, &FrameClock::from_delta(0.0));
    }

    for (after, before) in positions(&scene, &nodes).iter().zip(&before) {
        assert!((*after - *before).length() < 1e-5);
    }
}

#[test]
fn bone_lengths_hold_under_gravity_and_motion() {
    let mut scene = TransformHierarchy::new();
    let (owner, root, nodes) = straight_chain(&mut scene, 5);
    let mut world = world();
    let settings = ChainSettings::default()
        .with_root(root)
        .with_force(Vec3::new(0.03, -0.02, 0.04))
        .with_inert(0.5, None);
    let id = world.add_bone(owner, settings, &scene);

    for frame in 0..40 {
        let t = frame as f32 * DT;
        scene.set_local_transform(owner, Transform::from_position(Vec3::new(t.sin(), 0.0, t.cos())));
        world.step(&mut scene, &FrameClock::from_delta(DT));
    }

    let world_positions = positions(&scene, &nodes);
    for pair in world_positions.windows(2) {
        let len = (pair[1] - pair[0]).length();
        assert!((len - 1.0).abs() < 1e-4, "segment length {len}");
    }

    world.read_bone(id).unwrap();
    let chain = &world.bone(id).unwrap().chains()[0];
    assert!(chain.max_length_error() < 1e-4);
}

#[test]
fn sphere_collider_pushes_chain_aside() {
    let mut scene = TransformHierarchy::new();
    let (owner, root, nodes) = straight_chain(&mut scene, 3);
    let body = scene.create_node("body", None, Transform::from_position(Vec3::new(0.3, -2.0, 0.0)));
    let mut world = world();
    let settings = ChainSettings::default()
        .with_root(root)
        .with_collider(Collider::builder(body).sphere(0.5).build());
    world.add_bone(owner, settings, &scene);

    for _ in 0..10 {
        world.step(&mut scene, &FrameClock::from_delta(DT));
    }

    let mid = scene.world_position(nodes[2]);
    assert!(mid.x < 0.0);
    assert!((mid - scene.world_position(body)).length() > 0.45);
}

#[test]
fn gravity_only_acts_once_the_root_tilts() {
    let mut scene = TransformHierarchy::new();
    let (owner, root, nodes) = straight_chain(&mut scene, 2);
    let mut world = world();
    let settings = ChainSettings::default()
        .with_root(root)
        .with_gravity(Vec3::new(0.0, -0.05, 0.0));
    world.add_bone(owner, settings, &scene);

    for _ in 0..5 {
        world.step(&mut scene, &FrameClock::from_delta(DT));
    }
    let tip = *nodes.last().unwrap();
    assert!((scene.world_position(tip) - Vec3::new(0.0, -2.0, 0.0)).length() < 1e-4);

    let tilted = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
    scene.set_local_transform(owner, Transform::from_position_rotation(Vec3::ZERO, tilted));
    for _ in 0..30 {
        world.step(&mut scene, &FrameClock::from_delta(DT));
    }
    // The tilted chain points along +X at rest; gravity now bends it downward.
    assert!(scene.world_position(tip).y < -0.1);
}

#[test]
fn end_particle_turns_the_last_bone() {
    let mut scene = TransformHierarchy::new();
    let (owner, root, nodes) = straight_chain(&mut scene, 2);
    let mut world = world();
    let settings = ChainSettings::default()
        .with_root(root)
        .with_end_length(1.0)
        .with_force(Vec3::new(0.05, 0.0, 0.0));
    world.add_bone(owner, settings, &scene);

    for _ in 0..20 {
        world.step(&mut scene, &FrameClock::from_delta(DT));
    }

    let last = *nodes.last().unwrap();
    assert_ne!(scene.world_rotation(last), Quat::IDENTITY);
}

#[test]
fn reenabled_bone_starts_at_rest() {
    let mut scene = TransformHierarchy::new();
    let (owner, root, nodes) = straight_chain(&mut scene, 4);
    let mut world = world();
    let id = world.add_bone(owner, ChainSettings::default().with_root(root), &scene);
    for _ in 0..3 {
        world.step(&mut scene, &FrameClock::from_delta(DT));
    }

    world.disable_bone(id).unwrap();
    world.step(&mut scene, &FrameClock::from_delta(DT));
    assert!(!world.is_admitted(id));

    let carried = Vec3::new(10.0, 0.0, 0.0);
    scene.set_local_transform(owner, Transform::from_position(carried));
    world.enable_bone(id).unwrap();

    for frame in 0..10 {
        world.step(&mut scene, &FrameClock::from_delta(DT));
        for (i, position) in positions(&scene, &nodes).into_iter().enumerate() {
            let rest = carried - Vec3::Y * i as f32;
            let error = (position - rest).length();
            assert!(error < 1e-3, "frame {frame}, node {i} is {error} from rest");
        }
    }
}
