use glam::Vec3;
use log::info;
use tamarin_engine::engine::{EntityOptions, LightOptions, PhysicsOptions, SizeData};
use tamarin_engine::material::MaterialDesc;
use tamarin_engine::project::{self, FileTree, ProjectDocument};
use tamarin_engine::registry::EntityKind;
use tamarin_engine::{Engine, FIXED_TIME_STEP};

/// Headless demo: builds a small scene, runs the simulation for two seconds,
/// resets it, and writes the replay script plus the project file to disk.
fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut engine = Engine::new();

    engine.add_entity(
        "ground",
        "Ground",
        EntityKind::Plane,
        &EntityOptions {
            position: Some(Vec3::new(0.0, 0.0, 0.0).into()),
            size: Some(SizeData { w: 30.0, h: 1.0, d: 30.0 }),
            material: Some(MaterialDesc { color: Some("#404040".into()), ..MaterialDesc::default() }),
            ..EntityOptions::default()
        },
    )?;
    for (id, name, x) in [("crate_a", "Crate A", -2.0f32), ("crate_b", "Crate B", 2.0f32)] {
        engine.add_entity(
            id,
            name,
            EntityKind::Box,
            &EntityOptions {
                position: Some(Vec3::new(x, 6.0, 0.0).into()),
                material: Some(MaterialDesc { color: Some("#b5651d".into()), ..MaterialDesc::default() }),
                physics: Some(PhysicsOptions { mass: Some(2.0), ..PhysicsOptions::default() }),
                ..EntityOptions::default()
            },
        )?;
    }
    engine.add_entity(
        "ball",
        "Ball",
        EntityKind::Sphere,
        &EntityOptions {
            position: Some(Vec3::new(0.0, 9.0, 0.0).into()),
            radius: Some(0.75),
            material: Some(MaterialDesc { color: Some("#3060c0".into()), ..MaterialDesc::default() }),
            ..EntityOptions::default()
        },
    )?;
    engine.add_entity(
        "chase_cam",
        "Chase Camera",
        EntityKind::GameCamera,
        &EntityOptions {
            position: Some(Vec3::new(0.0, 4.0, 14.0).into()),
            fov: Some(60.0),
            ..EntityOptions::default()
        },
    )?;
    engine.add_light(
        "fill_light",
        "Fill Light",
        &LightOptions {
            light_type: "point".to_string(),
            color: Some("#fff2cc".to_string()),
            intensity: Some(0.8),
            position: Some(Vec3::new(-6.0, 8.0, 4.0).into()),
            ..LightOptions::default()
        },
    )?;

    engine.play();
    for _ in 0..120 {
        engine.update(FIXED_TIME_STEP);
    }
    engine.stop();

    let script_text = tamarin_engine::script::generate_scene_script(&engine);
    let mut files = FileTree::with_default_layout();
    files.insert_file(&["assets", "scripts", "main.rhai"], script_text.clone())?;
    let document = ProjectDocument::capture(
        &engine,
        files,
        vec!["assets".to_string(), "scripts".to_string(), "main.rhai".to_string()],
    );

    std::fs::create_dir_all("target/demo")?;
    std::fs::write("target/demo/scene.rhai", script_text)?;
    project::save_to_path(&document, "target/demo/project.rhai")?;

    info!(
        "demo finished: {} entities, {} frames rendered, outputs in target/demo/",
        engine.registry().len(),
        engine.graph().frames_rendered()
    );
    Ok(())
}
