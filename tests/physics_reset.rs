use glam::{Quat, Vec3};
use tamarin_engine::engine::{EntityOptions, EntityUpdate, PhysicsOptions, PhysicsUpdate};
use tamarin_engine::registry::{BodyType, EntityKind};
use tamarin_engine::{Engine, EngineError, FIXED_TIME_STEP};

fn dynamic_box(position: Vec3, mass: f32) -> EntityOptions {
    EntityOptions {
        position: Some(position.into()),
        physics: Some(PhysicsOptions { mass: Some(mass), ..PhysicsOptions::default() }),
        ..EntityOptions::default()
    }
}

#[test]
fn run_then_stop_restores_the_exact_snapshot() {
    let mut engine = Engine::new();
    engine.set_gravity(Vec3::new(0.0, -9.82, 0.0));
    engine
        .add_entity("crate", "Crate", EntityKind::Box, &dynamic_box(Vec3::new(0.0, 5.0, 0.0), 2.0))
        .unwrap();

    engine.play();
    for _ in 0..10 {
        engine.update(FIXED_TIME_STEP);
    }

    let record = engine.get("crate").unwrap();
    let moved = engine.graph().node(record.visual).unwrap().position;
    assert!(moved.y < 5.0, "gravity should have pulled the crate down, y = {}", moved.y);

    engine.stop();

    let record = engine.get("crate").unwrap();
    let node = engine.graph().node(record.visual).unwrap();
    assert_eq!(node.position, Vec3::new(0.0, 5.0, 0.0));
    assert_eq!(node.orientation, Quat::IDENTITY);
    let handle = record.body.expect("body survives the reset");
    assert_eq!(engine.physics().linear_velocity(handle), Some(Vec3::ZERO));
    assert_eq!(engine.physics().angular_velocity(handle), Some(Vec3::ZERO));
    let (position, _) = engine.physics().body_pose(handle).unwrap();
    assert_eq!(position, Vec3::new(0.0, 5.0, 0.0));
}

#[test]
fn negative_dynamic_mass_is_corrected_to_one() {
    let mut engine = Engine::new();
    engine
        .add_entity("crate", "Crate", EntityKind::Box, &dynamic_box(Vec3::new(0.0, 5.0, 0.0), -5.0))
        .unwrap();

    let record = engine.get("crate").unwrap();
    let config = record.physics.expect("mesh entities carry a physics config");
    assert_eq!(config.mass, 1.0);
    let handle = record.body.expect("dynamic body exists");
    let body_mass = engine.physics().body(handle).unwrap().mass();
    assert!((body_mass - 1.0).abs() < 1e-5, "effective mass should be 1, got {body_mass}");
}

#[test]
fn static_and_none_bodies_force_mass_to_zero() {
    let mut engine = Engine::new();
    engine
        .add_entity(
            "wall",
            "Wall",
            EntityKind::Box,
            &EntityOptions {
                physics: Some(PhysicsOptions {
                    body_type: Some("static".into()),
                    mass: Some(7.0),
                    ..PhysicsOptions::default()
                }),
                ..EntityOptions::default()
            },
        )
        .unwrap();
    assert_eq!(engine.get("wall").unwrap().physics.unwrap().mass, 0.0);
    assert!(engine.get("wall").unwrap().body.is_some());

    engine.update_property("wall", EntityUpdate::Physics(PhysicsUpdate::BodyType(BodyType::None))).unwrap();
    let record = engine.get("wall").unwrap();
    assert!(record.body.is_none(), "body type none is a valid terminal state");
    assert_eq!(engine.physics().body_count(), 0);
}

#[test]
fn switching_body_type_back_rebuilds_the_body() {
    let mut engine = Engine::new();
    engine.add_entity("crate", "Crate", EntityKind::Box, &dynamic_box(Vec3::ZERO, 1.0)).unwrap();
    engine.update_property("crate", EntityUpdate::Physics(PhysicsUpdate::BodyType(BodyType::None))).unwrap();
    assert_eq!(engine.physics().body_count(), 0);

    engine
        .update_property("crate", EntityUpdate::Physics(PhysicsUpdate::BodyType(BodyType::Dynamic)))
        .unwrap();
    assert_eq!(engine.physics().body_count(), 1);
    assert!(engine.get("crate").unwrap().body.is_some());
}

#[test]
fn transform_and_physics_edits_are_rejected_while_running() {
    let mut engine = Engine::new();
    engine.add_entity("crate", "Crate", EntityKind::Box, &dynamic_box(Vec3::new(0.0, 5.0, 0.0), 1.0)).unwrap();
    engine.play();

    let before = engine.get("crate").unwrap().initial_state;
    let moved = engine.update_property("crate", EntityUpdate::Position(Vec3::new(9.0, 9.0, 9.0)));
    assert!(matches!(moved, Err(EngineError::InvalidState(_))));
    let mass = engine.update_property("crate", EntityUpdate::Physics(PhysicsUpdate::Mass(3.0)));
    assert!(matches!(mass, Err(EngineError::InvalidState(_))));
    let after = engine.get("crate").unwrap().initial_state;
    assert_eq!(before.position, after.position);
    assert_eq!(before.orientation, after.orientation);

    engine.stop();
    engine.update_property("crate", EntityUpdate::Position(Vec3::new(1.0, 1.0, 1.0))).unwrap();
    assert_eq!(engine.get("crate").unwrap().initial_state.position, Vec3::new(1.0, 1.0, 1.0));
}

#[test]
fn edit_mode_transform_edits_recapture_the_snapshot() {
    let mut engine = Engine::new();
    engine.add_entity("crate", "Crate", EntityKind::Box, &dynamic_box(Vec3::new(0.0, 5.0, 0.0), 1.0)).unwrap();

    engine.update_property("crate", EntityUpdate::Position(Vec3::new(3.0, 1.0, -2.0))).unwrap();

    let record = engine.get("crate").unwrap();
    assert_eq!(record.initial_state.position, Vec3::new(3.0, 1.0, -2.0));
    let handle = record.body.unwrap();
    let (body_position, _) = engine.physics().body_pose(handle).unwrap();
    assert_eq!(body_position, Vec3::new(3.0, 1.0, -2.0));
    assert_eq!(engine.physics().linear_velocity(handle), Some(Vec3::ZERO));

    // The re-captured snapshot is what a later run/stop cycle resets to.
    engine.play();
    for _ in 0..5 {
        engine.update(FIXED_TIME_STEP);
    }
    engine.stop();
    let node = engine.graph().node(engine.get("crate").unwrap().visual).unwrap();
    assert_eq!(node.position, Vec3::new(3.0, 1.0, -2.0));
}

#[test]
fn repeated_play_and_stop_are_harmless() {
    let mut engine = Engine::new();
    engine.add_entity("crate", "Crate", EntityKind::Box, &dynamic_box(Vec3::new(0.0, 5.0, 0.0), 1.0)).unwrap();

    engine.play();
    engine.play();
    for _ in 0..3 {
        engine.update(FIXED_TIME_STEP);
    }
    engine.stop();
    engine.stop();

    let node = engine.graph().node(engine.get("crate").unwrap().visual).unwrap();
    assert_eq!(node.position, Vec3::new(0.0, 5.0, 0.0));
    assert!(!engine.is_running());
}
