use crate::error::{EngineError, EngineResult};
use crate::render_graph::NodeId;
use glam::{Quat, Vec3};
use rapier3d::prelude::RigidBodyHandle;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Box,
    Sphere,
    Plane,
    GameCamera,
    AmbientLight,
    DirectionalLight,
    PointLight,
}

impl EntityKind {
    pub fn is_mesh(self) -> bool {
        matches!(self, EntityKind::Box | EntityKind::Sphere | EntityKind::Plane)
    }

    pub fn is_light(self) -> bool {
        matches!(self, EntityKind::AmbientLight | EntityKind::DirectionalLight | EntityKind::PointLight)
    }

    /// Script-dialect name for mesh and camera kinds.
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Box => "box",
            EntityKind::Sphere => "sphere",
            EntityKind::Plane => "plane",
            EntityKind::GameCamera => "camera",
            EntityKind::AmbientLight => "ambient_light",
            EntityKind::DirectionalLight => "directional_light",
            EntityKind::PointLight => "point_light",
        }
    }

    pub fn parse(value: &str) -> EngineResult<Self> {
        match value {
            "box" => Ok(EntityKind::Box),
            "sphere" => Ok(EntityKind::Sphere),
            "plane" => Ok(EntityKind::Plane),
            "camera" => Ok(EntityKind::GameCamera),
            other => Err(EngineError::UnknownKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyType {
    None,
    Static,
    Dynamic,
}

impl BodyType {
    pub fn as_str(self) -> &'static str {
        match self {
            BodyType::None => "none",
            BodyType::Static => "static",
            BodyType::Dynamic => "dynamic",
        }
    }

    pub fn parse(value: &str) -> EngineResult<Self> {
        match value {
            "none" => Ok(BodyType::None),
            "static" => Ok(BodyType::Static),
            "dynamic" => Ok(BodyType::Dynamic),
            other => Err(EngineError::UnknownBodyType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionShape {
    Box,
    Sphere,
    Plane,
}

impl CollisionShape {
    pub fn as_str(self) -> &'static str {
        match self {
            CollisionShape::Box => "box",
            CollisionShape::Sphere => "sphere",
            CollisionShape::Plane => "plane",
        }
    }

    pub fn parse(value: &str) -> EngineResult<Self> {
        match value {
            "box" => Ok(CollisionShape::Box),
            "sphere" => Ok(CollisionShape::Sphere),
            "plane" => Ok(CollisionShape::Plane),
            other => Err(EngineError::UnknownShape(other.to_string())),
        }
    }
}

/// Per-entity physics behavior. Present only on mesh-kind records.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicsConfig {
    pub body_type: BodyType,
    pub mass: f32,
    pub friction: f32,
    pub restitution: f32,
    pub collision_shape: CollisionShape,
    pub linear_damping: f32,
    pub angular_damping: f32,
}

impl PhysicsConfig {
    /// Defaults per entity kind: planes are static floors, boxes and spheres
    /// fall. Non-mesh kinds carry no config at all.
    pub fn default_for(kind: EntityKind) -> Option<Self> {
        let (body_type, collision_shape) = match kind {
            EntityKind::Box => (BodyType::Dynamic, CollisionShape::Box),
            EntityKind::Sphere => (BodyType::Dynamic, CollisionShape::Sphere),
            EntityKind::Plane => (BodyType::Static, CollisionShape::Plane),
            _ => return None,
        };
        Some(Self {
            body_type,
            mass: 1.0,
            friction: 0.7,
            restitution: 0.3,
            collision_shape,
            linear_damping: 0.01,
            angular_damping: 0.01,
        })
    }
}

/// Pose snapshot used to reset the entity when the simulation stops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitialState {
    pub position: Vec3,
    pub orientation: Quat,
}

/// One scene entity: the visual node, the optional physics body, optional
/// helper visuals, and metadata. The record owns both handles; all teardown
/// goes through the engine so neither subsystem is left with a dangling half.
#[derive(Debug)]
pub struct EntityRecord {
    pub id: String,
    pub name: String,
    pub kind: EntityKind,
    pub visual: NodeId,
    pub body: Option<RigidBodyHandle>,
    pub collision_debug: Option<NodeId>,
    pub camera_debug: Option<NodeId>,
    pub physics: Option<PhysicsConfig>,
    pub initial_state: InitialState,
    pub default_entity: bool,
}

/// Id-keyed entity store. Iteration order is insertion order, which keeps
/// replay-script generation deterministic.
#[derive(Default)]
pub struct EntityRegistry {
    records: HashMap<String, EntityRecord>,
    order: Vec<String>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: EntityRecord) -> EngineResult<()> {
        if self.records.contains_key(&record.id) {
            return Err(EngineError::DuplicateId(record.id.clone()));
        }
        self.order.push(record.id.clone());
        self.records.insert(record.id.clone(), record);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Option<EntityRecord> {
        let record = self.records.remove(id)?;
        self.order.retain(|entry| entry != id);
        Some(record)
    }

    pub fn get(&self, id: &str) -> Option<&EntityRecord> {
        self.records.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut EntityRecord> {
        self.records.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Snapshot of ids in insertion order. Mutating the registry while
    /// walking this list is safe; removed entries simply stop resolving.
    pub fn ids(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityRecord> {
        self.order.iter().filter_map(|id| self.records.get(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> EntityRecord {
        EntityRecord {
            id: id.to_string(),
            name: id.to_string(),
            kind: EntityKind::Box,
            visual: NodeId::from_raw(1),
            body: None,
            collision_debug: None,
            camera_debug: None,
            physics: PhysicsConfig::default_for(EntityKind::Box),
            initial_state: InitialState { position: Vec3::ZERO, orientation: Quat::IDENTITY },
            default_entity: false,
        }
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut registry = EntityRegistry::new();
        registry.insert(record("a")).unwrap();
        assert!(matches!(registry.insert(record("a")), Err(EngineError::DuplicateId(_))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn iteration_keeps_insertion_order() {
        let mut registry = EntityRegistry::new();
        for id in ["c", "a", "b"] {
            registry.insert(record(id)).unwrap();
        }
        let ids: Vec<_> = registry.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["c", "a", "b"]);
        registry.remove("a");
        assert_eq!(registry.ids(), ["c", "b"]);
    }
}
