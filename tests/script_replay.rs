use glam::Vec3;
use tamarin_engine::engine::{BackgroundOptions, EntityOptions, LightOptions, PhysicsOptions, SizeData};
use tamarin_engine::material::MaterialDesc;
use tamarin_engine::registry::EntityKind;
use tamarin_engine::script::{generate_scene_script, run_script};
use tamarin_engine::settings::{FogConfig, QualityPreset};
use tamarin_engine::Engine;

fn build_reference_scene(engine: &mut Engine) {
    engine.set_gravity(Vec3::new(0.0, -9.82, 0.0));
    engine
        .set_fog(FogConfig { enabled: true, color: "#87ceeb".into(), near: 20.0, far: 100.0 })
        .unwrap();
    engine
        .set_background(&BackgroundOptions { color: Some("#101820".into()), ..BackgroundOptions::default() })
        .unwrap();
    engine.apply_quality_preset(QualityPreset::High);

    engine
        .add_entity(
            "ground",
            "Ground",
            EntityKind::Plane,
            &EntityOptions {
                position: Some(Vec3::ZERO.into()),
                size: Some(SizeData { w: 30.0, h: 1.0, d: 30.0 }),
                material: Some(MaterialDesc { color: Some("#404040".into()), ..MaterialDesc::default() }),
                ..EntityOptions::default()
            },
        )
        .unwrap();
    engine
        .add_entity(
            "crate",
            "Crate",
            EntityKind::Box,
            &EntityOptions {
                position: Some(Vec3::new(0.0, 5.0, 0.0).into()),
                rotation: Some(Vec3::new(0.0, 0.5, 0.0).into()),
                material: Some(MaterialDesc {
                    color: Some("#b5651d".into()),
                    roughness: Some(0.8),
                    metalness: Some(0.1),
                    ..MaterialDesc::default()
                }),
                physics: Some(PhysicsOptions { mass: Some(2.0), ..PhysicsOptions::default() }),
                ..EntityOptions::default()
            },
        )
        .unwrap();
    engine
        .add_entity(
            "ball",
            "Ball",
            EntityKind::Sphere,
            &EntityOptions {
                position: Some(Vec3::new(2.0, 7.0, -1.0).into()),
                radius: Some(0.75),
                ..EntityOptions::default()
            },
        )
        .unwrap();
    engine
        .add_entity(
            "cam",
            "Game Camera",
            EntityKind::GameCamera,
            &EntityOptions {
                position: Some(Vec3::new(0.0, 4.0, 12.0).into()),
                fov: Some(60.0),
                near: Some(0.1),
                far: Some(500.0),
                ..EntityOptions::default()
            },
        )
        .unwrap();
    engine
        .add_light(
            "lamp",
            "Lamp",
            &LightOptions {
                light_type: "point".to_string(),
                color: Some("#fff2cc".to_string()),
                intensity: Some(0.8),
                position: Some(Vec3::new(-6.0, 8.0, 4.0).into()),
                ..LightOptions::default()
            },
        )
        .unwrap();
}

#[test]
fn replay_script_is_idempotent_byte_for_byte() {
    let mut original = Engine::new();
    build_reference_scene(&mut original);
    let first = generate_scene_script(&original);

    let mut replayed = Engine::new();
    run_script(&mut replayed, &first, "replay").expect("generated script must execute cleanly");
    let second = generate_scene_script(&replayed);

    assert_eq!(first, second, "generate -> execute -> regenerate must be byte-identical");
}

#[test]
fn replay_reproduces_entities_and_settings() {
    let mut original = Engine::new();
    build_reference_scene(&mut original);
    let script = generate_scene_script(&original);

    let mut replayed = Engine::new();
    run_script(&mut replayed, &script, "replay").unwrap();

    assert_eq!(replayed.entity_ids(), original.entity_ids());
    assert_eq!(replayed.settings(), original.settings());
    assert_eq!(replayed.gravity(), original.gravity());

    let crate_record = replayed.get("crate").expect("crate replayed");
    let config = crate_record.physics.unwrap();
    assert_eq!(config.mass, 2.0);
    assert!(crate_record.body.is_some());
}

#[test]
fn replay_clears_previous_user_entities() {
    let mut original = Engine::new();
    build_reference_scene(&mut original);
    let script = generate_scene_script(&original);

    let mut stale = Engine::new();
    stale.add_entity("junk", "Junk", EntityKind::Box, &EntityOptions::default()).unwrap();
    run_script(&mut stale, &script, "replay").unwrap();

    assert!(stale.get("junk").is_none(), "the leading clear must remove user entities");
    assert_eq!(stale.entity_ids(), original.entity_ids());
}

#[test]
fn script_errors_surface_but_do_not_corrupt_the_registry() {
    let mut engine = Engine::new();
    engine.add_entity("keeper", "Keeper", EntityKind::Box, &EntityOptions::default()).unwrap();

    // Unknown kinds are logged and skipped; a syntax error aborts the run.
    run_script(&mut engine, "scene.add_entity(\"x\", \"X\", \"torus\", #{});", "bad kind").unwrap();
    assert!(engine.get("x").is_none());
    assert!(engine.get("keeper").is_some());

    let result = run_script(&mut engine, "scene.add_entity(", "syntax error");
    assert!(result.is_err());
    assert!(engine.get("keeper").is_some());
}
