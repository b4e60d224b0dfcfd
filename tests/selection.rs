use glam::{Quat, Vec2, Vec3};
use tamarin_engine::engine::EntityOptions;
use tamarin_engine::registry::EntityKind;
use tamarin_engine::{Engine, EngineError};

fn box_at(position: Vec3) -> EntityOptions {
    EntityOptions { position: Some(position.into()), ..EntityOptions::default() }
}

fn helper_visible(engine: &Engine, id: &str) -> bool {
    let record = engine.get(id).expect("record exists");
    let helper = record.collision_debug.or(record.camera_debug).expect("entity has a debug visual");
    engine.graph().node(helper).expect("helper node exists").visible
}

#[test]
fn selection_is_exclusive() {
    let mut engine = Engine::new();
    engine.add_entity("a", "A", EntityKind::Box, &box_at(Vec3::new(-2.0, 0.0, 0.0))).unwrap();
    engine.add_entity("b", "B", EntityKind::Box, &box_at(Vec3::new(2.0, 0.0, 0.0))).unwrap();
    engine.drain_events();

    engine.select("a").unwrap();
    assert!(helper_visible(&engine, "a"));

    engine.select("b").unwrap();
    assert_eq!(engine.selected_id(), Some("b"));
    assert!(!helper_visible(&engine, "a"), "previous selection must hide its debug visual");
    assert!(helper_visible(&engine, "b"));

    let events: Vec<String> = engine.drain_events().iter().map(|e| e.to_string()).collect();
    assert_eq!(
        events,
        ["EntitySelected id=a", "EntityDeselected id=a", "EntitySelected id=b"],
        "A must be deselected before B is selected"
    );
}

#[test]
fn selecting_while_running_is_rejected() {
    let mut engine = Engine::new();
    engine.add_entity("a", "A", EntityKind::Box, &box_at(Vec3::ZERO)).unwrap();
    engine.play();
    assert!(matches!(engine.select("a"), Err(EngineError::InvalidState(_))));
    assert_eq!(engine.selected_id(), None);
}

#[test]
fn selecting_an_unknown_id_is_not_found() {
    let mut engine = Engine::new();
    assert!(matches!(engine.select("ghost"), Err(EngineError::NotFound(_))));
}

#[test]
fn play_remembers_and_stop_restores_the_selection() {
    let mut engine = Engine::new();
    engine.add_entity("a", "A", EntityKind::Box, &box_at(Vec3::ZERO)).unwrap();
    engine.select("a").unwrap();

    engine.play();
    assert_eq!(engine.selected_id(), None, "running clears the selection");
    assert!(!helper_visible(&engine, "a"));

    engine.stop();
    assert_eq!(engine.selected_id(), Some("a"));
    assert!(helper_visible(&engine, "a"));
}

#[test]
fn running_uses_the_selected_game_camera() {
    let mut engine = Engine::new();
    engine
        .add_entity("cam", "Cam", EntityKind::GameCamera, &box_at(Vec3::new(0.0, 4.0, 12.0)))
        .unwrap();
    engine.select("cam").unwrap();
    let camera_node = engine.get("cam").unwrap().visual;

    engine.play();
    assert_eq!(engine.active_camera(), camera_node);

    engine.stop();
    assert_eq!(engine.active_camera(), engine.editor_camera());
}

#[test]
fn pointer_pick_selects_the_nearest_entity_and_misses_deselect() {
    let mut engine = Engine::new();
    engine.add_entity("target", "Target", EntityKind::Box, &box_at(Vec3::ZERO)).unwrap();

    let center = Vec2::new(
        engine.viewport().width as f32 * 0.5,
        engine.viewport().height as f32 * 0.5,
    );
    let picked = engine.pick(center).unwrap();
    assert_eq!(picked.as_deref(), Some("target"));
    assert_eq!(engine.selected_id(), Some("target"));

    let picked = engine.pick(Vec2::new(2.0, 2.0)).unwrap();
    assert_eq!(picked, None);
    assert_eq!(engine.selected_id(), None, "a miss deselects");
}

#[test]
fn pointer_pick_resolves_camera_helpers_to_their_entity() {
    let mut engine = Engine::new();
    engine.add_entity("cam", "Cam", EntityKind::GameCamera, &box_at(Vec3::ZERO)).unwrap();

    let center = Vec2::new(
        engine.viewport().width as f32 * 0.5,
        engine.viewport().height as f32 * 0.5,
    );
    let picked = engine.pick(center).unwrap();
    assert_eq!(picked.as_deref(), Some("cam"), "the helper hit must walk up to the camera entity");
}

#[test]
fn picking_is_inert_while_running() {
    let mut engine = Engine::new();
    engine.add_entity("target", "Target", EntityKind::Box, &box_at(Vec3::ZERO)).unwrap();
    engine.play();
    let center = Vec2::new(
        engine.viewport().width as f32 * 0.5,
        engine.viewport().height as f32 * 0.5,
    );
    assert_eq!(engine.pick(center).unwrap(), None);
}

#[test]
fn gizmo_drag_updates_body_and_snapshot_immediately() {
    let mut engine = Engine::new();
    engine.add_entity("a", "A", EntityKind::Box, &box_at(Vec3::ZERO)).unwrap();
    engine.select("a").unwrap();
    engine.begin_gizmo_drag();

    let new_position = Vec3::new(4.0, 2.0, -1.0);
    engine.apply_gizmo_transform(new_position, Quat::IDENTITY).unwrap();

    let record = engine.get("a").unwrap();
    assert_eq!(record.initial_state.position, new_position);
    let (body_position, _) = engine.physics().body_pose(record.body.unwrap()).unwrap();
    assert_eq!(body_position, new_position);

    let removal = engine.remove_entity("a");
    assert!(matches!(removal, Err(EngineError::InvalidState(_))), "mid-drag removal is rejected");
    engine.end_gizmo_drag();
    engine.remove_entity("a").unwrap();
}

#[test]
fn gizmo_feedback_without_a_selection_is_an_error() {
    let mut engine = Engine::new();
    let result = engine.apply_gizmo_transform(Vec3::ONE, Quat::IDENTITY);
    assert!(matches!(result, Err(EngineError::InvalidState(_))));
}
