use crate::color::Color;
use crate::physics::{iso_to_physics, PhysicsWorld};
use crate::registry::{BodyType, CollisionShape, EntityKind, EntityRecord};
use crate::render_graph::{Geometry, NodeKind, RenderGraph};
use log::{info, warn};
use rapier3d::math::Vector;
use rapier3d::prelude::{ColliderBuilder, RigidBodyBuilder};

pub const BODY_ACTIVE_COLOR: Color = Color::new(0.0, 1.0, 0.0);
pub const BODY_INACTIVE_COLOR: Color = Color::new(1.0, 0.0, 0.0);

/// Wireframe tint is a pure function of whether a body exists.
pub fn debug_color(body_present: bool) -> Color {
    if body_present {
        BODY_ACTIVE_COLOR
    } else {
        BODY_INACTIVE_COLOR
    }
}

/// Rebuilds the physics body of a record from its config and visual geometry.
///
/// This is the only place a body is derived from the visual side. Any
/// existing body is removed first, so the world never holds two bodies for
/// one record. `BodyType::None` is a valid terminal state: the old body is
/// dropped and none is created.
pub fn rebuild(record: &mut EntityRecord, graph: &RenderGraph, physics: &mut PhysicsWorld) {
    if let Some(handle) = record.body.take() {
        physics.remove_body(handle);
    }
    let Some(config) = record.physics.as_mut() else {
        return;
    };

    let effective_mass = match config.body_type {
        BodyType::Dynamic => {
            if config.mass < 0.0 {
                warn!(
                    "negative mass {} on dynamic entity '{}'; correcting to 1",
                    config.mass, record.id
                );
                config.mass = 1.0;
            }
            config.mass
        }
        BodyType::Static | BodyType::None => {
            config.mass = 0.0;
            0.0
        }
    };

    if config.body_type == BodyType::None {
        info!("entity '{}' carries no physics body (body type none)", record.id);
        return;
    }

    let Some(node) = graph.node(record.visual) else {
        warn!("entity '{}' lost its visual node; body not rebuilt", record.id);
        return;
    };
    let geometry = match &node.kind {
        NodeKind::Mesh { geometry, .. } => graph.geometry(*geometry).copied(),
        _ => None,
    };

    let body_builder = match config.body_type {
        BodyType::Dynamic => RigidBodyBuilder::dynamic().additional_mass(effective_mass),
        _ => RigidBodyBuilder::fixed(),
    }
    .position(iso_to_physics(node.position, node.orientation))
    .linear_damping(config.linear_damping)
    .angular_damping(config.angular_damping);

    let collider = build_collider(config.collision_shape, record.kind, geometry)
        .friction(config.friction)
        .restitution(config.restitution)
        .density(0.0)
        .build();

    record.body = Some(physics.insert_body(body_builder.build(), collider));
    info!(
        "physics body for '{}' rebuilt: type={} mass={:.2} shape={}",
        record.id,
        config.body_type.as_str(),
        effective_mass,
        config.collision_shape.as_str()
    );
}

/// Pushes in-place-editable fields (mass, damping, surface material) onto the
/// existing body without touching the shape.
pub fn patch(record: &EntityRecord, physics: &mut PhysicsWorld) {
    let (Some(handle), Some(config)) = (record.body, record.physics.as_ref()) else {
        return;
    };
    physics.set_body_mass(handle, config.mass.max(0.0));
    physics.set_body_damping(handle, config.linear_damping, config.angular_damping);
    physics.set_body_material(handle, config.friction, config.restitution);
}

/// Collision shape from the visual geometry when it matches the entity's
/// native kind, unit-sized otherwise. The plane is an infinite halfspace
/// facing local +Z, same as the plane mesh.
fn build_collider(shape: CollisionShape, kind: EntityKind, geometry: Option<Geometry>) -> ColliderBuilder {
    match shape {
        CollisionShape::Box => {
            let (width, height, depth) = match (kind, geometry) {
                (EntityKind::Box, Some(Geometry::Box { width, height, depth })) => (width, height, depth),
                _ => (1.0, 1.0, 1.0),
            };
            ColliderBuilder::cuboid(width * 0.5, height * 0.5, depth * 0.5)
        }
        CollisionShape::Sphere => {
            let radius = match (kind, geometry) {
                (EntityKind::Sphere, Some(Geometry::Sphere { radius })) => radius,
                _ => 1.0,
            };
            ColliderBuilder::ball(radius)
        }
        CollisionShape::Plane => ColliderBuilder::halfspace(Vector::z_axis()),
    }
}
