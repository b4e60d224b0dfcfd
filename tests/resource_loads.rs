use tamarin_engine::assets::TextureRef;
use tamarin_engine::engine::{BackgroundOptions, EntityOptions, EntityUpdate};
use tamarin_engine::registry::EntityKind;
use tamarin_engine::render_graph::{NodeKind, TextureSlot};
use tamarin_engine::{Engine, FIXED_TIME_STEP};

fn write_png(dir: &tempfile::TempDir, name: &str) -> String {
    let path = dir.path().join(name);
    image::RgbaImage::from_pixel(2, 2, image::Rgba([200, 120, 40, 255]))
        .save(&path)
        .expect("test png should encode");
    path.to_string_lossy().into_owned()
}

fn base_color_texture(engine: &Engine, id: &str) -> Option<String> {
    let record = engine.get(id)?;
    let material = match &engine.graph().node(record.visual)?.kind {
        NodeKind::Mesh { material, .. } => *material,
        _ => return None,
    };
    let texture = engine.graph().material(material)?.base_color_map?;
    engine.graph().texture(texture).map(|t| t.name.clone())
}

#[test]
fn completed_texture_loads_install_on_the_frame_tick() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_png(&dir, "crate.png");

    let mut engine = Engine::new();
    engine.add_entity("crate", "Crate", EntityKind::Box, &EntityOptions::default()).unwrap();
    engine
        .update_property(
            "crate",
            EntityUpdate::MaterialTexture {
                slot: TextureSlot::BaseColor,
                texture: Some(TextureRef::from_source(source)),
            },
        )
        .unwrap();
    assert_eq!(engine.graph().texture_count(), 0, "loads only land on the tick");

    engine.update(FIXED_TIME_STEP);

    assert_eq!(engine.graph().texture_count(), 1);
    assert_eq!(base_color_texture(&engine, "crate").as_deref(), Some("crate.png"));
}

#[test]
fn failed_loads_leave_the_slot_empty() {
    let mut engine = Engine::new();
    engine.add_entity("crate", "Crate", EntityKind::Box, &EntityOptions::default()).unwrap();
    engine
        .update_property(
            "crate",
            EntityUpdate::MaterialTexture {
                slot: TextureSlot::BaseColor,
                texture: Some(TextureRef::from_source("missing/nowhere.png")),
            },
        )
        .unwrap();

    engine.update(FIXED_TIME_STEP);

    assert_eq!(engine.graph().texture_count(), 0);
    assert_eq!(base_color_texture(&engine, "crate"), None);
    assert_eq!(engine.loader().failures().len(), 1);
}

#[test]
fn completions_for_removed_entities_are_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_png(&dir, "late.png");

    let mut engine = Engine::new();
    engine.add_entity("crate", "Crate", EntityKind::Box, &EntityOptions::default()).unwrap();
    engine
        .update_property(
            "crate",
            EntityUpdate::MaterialTexture {
                slot: TextureSlot::BaseColor,
                texture: Some(TextureRef::from_source(source)),
            },
        )
        .unwrap();

    // The entity (and its material) disappear before the load completes.
    engine.remove_entity("crate").unwrap();
    engine.update(FIXED_TIME_STEP);

    assert_eq!(engine.graph().texture_count(), 0, "stale completion must be discarded, not applied");
}

#[test]
fn superseding_environment_loads_wins_over_the_stale_one() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_png(&dir, "dawn.png");
    let second = write_png(&dir, "dusk.png");

    let mut engine = Engine::new();
    engine
        .set_background(&BackgroundOptions { environment_map: Some(first), ..BackgroundOptions::default() })
        .unwrap();
    engine
        .set_background(&BackgroundOptions { environment_map: Some(second), ..BackgroundOptions::default() })
        .unwrap();

    engine.update(FIXED_TIME_STEP);

    let environment = engine.graph().environment().expect("an environment is installed");
    assert_eq!(environment.name, "dusk.png");
}

#[test]
fn clearing_a_texture_slot_disposes_the_old_resource() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_png(&dir, "crate.png");

    let mut engine = Engine::new();
    engine.add_entity("crate", "Crate", EntityKind::Box, &EntityOptions::default()).unwrap();
    engine
        .update_property(
            "crate",
            EntityUpdate::MaterialTexture {
                slot: TextureSlot::BaseColor,
                texture: Some(TextureRef::from_source(source)),
            },
        )
        .unwrap();
    engine.update(FIXED_TIME_STEP);
    assert_eq!(engine.graph().texture_count(), 1);

    engine
        .update_property(
            "crate",
            EntityUpdate::MaterialTexture { slot: TextureSlot::BaseColor, texture: None },
        )
        .unwrap();
    assert_eq!(engine.graph().texture_count(), 0);
    assert_eq!(base_color_texture(&engine, "crate"), None);
}

#[test]
fn embedded_data_urls_decode_without_touching_disk() {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;

    let mut bytes = Vec::new();
    image::RgbaImage::from_pixel(1, 1, image::Rgba([10, 20, 30, 255]))
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    let data_url = format!("data:image/png;base64,{}", STANDARD.encode(&bytes));

    let mut engine = Engine::new();
    engine.add_entity("crate", "Crate", EntityKind::Box, &EntityOptions::default()).unwrap();
    engine
        .update_property(
            "crate",
            EntityUpdate::MaterialTexture {
                slot: TextureSlot::BaseColor,
                texture: Some(TextureRef::named("crate.png", data_url)),
            },
        )
        .unwrap();
    engine.update(FIXED_TIME_STEP);

    assert_eq!(base_color_texture(&engine, "crate").as_deref(), Some("crate.png"));
}
