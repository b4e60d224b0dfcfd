use crate::assets::{AssetLoader, LoadCompletion, TextureRef};
use crate::body_sync;
use crate::camera::{OrbitController, Viewport};
use crate::color::{Color, ColorNames};
use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, EventBus};
use crate::gizmo::GizmoBinding;
use crate::material::{self, MaterialDesc};
use crate::physics::PhysicsWorld;
use crate::registry::{
    BodyType, CollisionShape, EntityKind, EntityRecord, EntityRegistry, InitialState, PhysicsConfig,
};
use crate::render_graph::{
    EnvironmentHandle, Geometry, LightParams, NodeId, NodeKind, RenderGraph, TextureSlot,
};
use crate::settings::{BackgroundConfig, FogConfig, QualityPreset, RenderSettings, RenderSettingsPatch, SceneSettings};
use glam::{EulerRot, Quat, Vec2, Vec3};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_2;

pub const FIXED_TIME_STEP: f32 = 1.0 / 60.0;
pub const DEFAULT_GRAVITY: Vec3 = Vec3::new(0.0, -9.82, 0.0);

const DEFAULT_SPAWN_HEIGHT: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimMode {
    Editing,
    Running,
}

/// Plain serde mirror for vectors crossing the script/document boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VecData {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<VecData> for Vec3 {
    fn from(value: VecData) -> Self {
        Vec3::new(value.x, value.y, value.z)
    }
}

impl From<Vec3> for VecData {
    fn from(value: Vec3) -> Self {
        Self { x: value.x, y: value.y, z: value.z }
    }
}

const fn default_extent() -> f32 {
    1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeData {
    pub w: f32,
    pub h: f32,
    pub d: f32,
}

impl Default for SizeData {
    fn default() -> Self {
        Self { w: default_extent(), h: default_extent(), d: default_extent() }
    }
}

/// Partial physics config accepted at creation time; unset fields take the
/// kind's defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsOptions {
    pub body_type: Option<String>,
    pub mass: Option<f32>,
    pub friction: Option<f32>,
    pub restitution: Option<f32>,
    pub collision_shape: Option<String>,
    pub linear_damping: Option<f32>,
    pub angular_damping: Option<f32>,
}

impl PhysicsOptions {
    fn merge_into(&self, config: &mut PhysicsConfig) -> EngineResult<()> {
        if let Some(body_type) = &self.body_type {
            config.body_type = BodyType::parse(body_type)?;
        }
        if let Some(shape) = &self.collision_shape {
            config.collision_shape = CollisionShape::parse(shape)?;
        }
        if let Some(mass) = self.mass {
            config.mass = mass;
        }
        if let Some(friction) = self.friction {
            config.friction = friction;
        }
        if let Some(restitution) = self.restitution {
            config.restitution = restitution;
        }
        if let Some(linear) = self.linear_damping {
            config.linear_damping = linear;
        }
        if let Some(angular) = self.angular_damping {
            config.angular_damping = angular;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityOptions {
    pub position: Option<VecData>,
    pub rotation: Option<VecData>,
    pub size: Option<SizeData>,
    pub radius: Option<f32>,
    pub material: Option<MaterialDesc>,
    pub physics: Option<PhysicsOptions>,
    pub fov: Option<f32>,
    pub near: Option<f32>,
    pub far: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightOptions {
    #[serde(rename = "type")]
    pub light_type: String,
    pub color: Option<String>,
    pub intensity: Option<f32>,
    pub position: Option<VecData>,
    pub rotation: Option<VecData>,
    pub cast_shadow: Option<bool>,
    pub shadow_map_size: Option<u32>,
    pub distance: Option<f32>,
    pub decay: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundOptions {
    pub color: Option<String>,
    pub environment_map: Option<String>,
    pub clear_environment: bool,
}

/// Closed set of property updates. Anything the editor can change on an
/// entity is one of these variants; there is no string-path fallback.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityUpdate {
    Name(String),
    Position(Vec3),
    /// Euler XYZ radians.
    Rotation(Vec3),
    MaterialColor(String),
    MaterialRoughness(f32),
    MaterialMetalness(f32),
    MaterialTexture { slot: TextureSlot, texture: Option<TextureRef> },
    Physics(PhysicsUpdate),
    Camera(CameraUpdate),
    LightColor(String),
    LightIntensity(f32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PhysicsUpdate {
    BodyType(BodyType),
    Mass(f32),
    Friction(f32),
    Restitution(f32),
    CollisionShape(CollisionShape),
    LinearDamping(f32),
    AngularDamping(f32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraUpdate {
    Fov(f32),
    Near(f32),
    Far(f32),
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub gravity: Vec3,
    pub camera_distance: f32,
    pub viewport: Viewport,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self { gravity: DEFAULT_GRAVITY, camera_distance: 20.0, viewport: Viewport::default() }
    }
}

/// The editor/runtime core. Owns both representations of every entity and is
/// the only writer on either side: the synchronizer derives bodies from
/// visuals, the frame driver pulls visuals from bodies while Running, and
/// never both in the same tick.
pub struct Engine {
    graph: RenderGraph,
    physics: PhysicsWorld,
    registry: EntityRegistry,
    loader: AssetLoader,
    settings: SceneSettings,
    events: EventBus,
    color_names: ColorNames,
    orbit: OrbitController,
    gizmo: GizmoBinding,
    viewport: Viewport,
    editor_camera: NodeId,
    active_camera: NodeId,
    mode: SimMode,
    selected: Option<String>,
    selection_before_run: Option<String>,
    saved_orbit_target: Vec3,
    environment_request: Option<TextureRef>,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    pub fn with_options(options: EngineOptions) -> Self {
        let mut graph = RenderGraph::new();
        let editor_camera = graph.add_node(
            NodeKind::Camera { fov_degrees: 75.0, near: 0.1, far: 1000.0, aspect: options.viewport.aspect() },
            Vec3::new(0.0, 10.0, options.camera_distance),
            Quat::IDENTITY,
        );
        let mut engine = Self {
            graph,
            physics: PhysicsWorld::new(options.gravity),
            registry: EntityRegistry::new(),
            loader: AssetLoader::new(),
            settings: SceneSettings::default(),
            events: EventBus::default(),
            color_names: ColorNames::new(),
            orbit: OrbitController::new(Vec3::ZERO, options.camera_distance.max(0.1)),
            gizmo: GizmoBinding::default(),
            viewport: options.viewport,
            editor_camera,
            active_camera: editor_camera,
            mode: SimMode::Editing,
            selected: None,
            selection_before_run: None,
            saved_orbit_target: Vec3::ZERO,
            environment_request: None,
        };
        engine.spawn_default_lights();
        info!("engine initialized: gravity={:?}", engine.physics.gravity());
        engine
    }

    /// The default lighting pair keeps fresh scenes visible. Both records are
    /// flagged so `clear_user_entities` and the replay codec skip them.
    fn spawn_default_lights(&mut self) {
        let ambient = LightOptions {
            light_type: "ambient".to_string(),
            intensity: Some(0.3),
            ..LightOptions::default()
        };
        let directional = LightOptions {
            light_type: "directional".to_string(),
            intensity: Some(1.0),
            position: Some(Vec3::new(10.0, 20.0, 10.0).into()),
            cast_shadow: Some(true),
            ..LightOptions::default()
        };
        for (id, name, options) in [
            ("ambient_light_default", "Default Ambient Light", ambient),
            ("directional_light_default", "Default Directional Light", directional),
        ] {
            if self.registry.contains(id) {
                continue;
            }
            if let Err(err) = self.add_light_internal(id, name, &options, true) {
                warn!("default light '{id}' not created: {err}");
            }
        }
    }

    /// Re-creates the default lighting pair after a full clear. Existing
    /// records are left alone.
    pub fn restore_default_entities(&mut self) {
        self.spawn_default_lights();
    }

    // --- lifecycle ---

    pub fn add_entity(
        &mut self,
        id: &str,
        name: &str,
        kind: EntityKind,
        options: &EntityOptions,
    ) -> EngineResult<()> {
        if self.registry.contains(id) {
            warn!("rejected add of '{id}': id already in use");
            return Err(EngineError::DuplicateId(id.to_string()));
        }
        if kind.is_light() {
            return Err(EngineError::UnknownKind(kind.as_str().to_string()));
        }

        let position = options
            .position
            .map(Vec3::from)
            .unwrap_or(Vec3::new(0.0, DEFAULT_SPAWN_HEIGHT, 0.0));
        let mut euler = options.rotation.map(Vec3::from).unwrap_or(Vec3::ZERO);
        if kind == EntityKind::Plane {
            euler.x = -FRAC_PI_2;
        }
        let orientation = Quat::from_euler(EulerRot::XYZ, euler.x, euler.y, euler.z);

        let record = if kind == EntityKind::GameCamera {
            self.spawn_game_camera(id, name, position, orientation, options)
        } else {
            self.spawn_mesh(id, name, kind, position, orientation, options)?
        };

        let is_mesh = kind.is_mesh();
        self.registry.insert(record)?;
        if is_mesh {
            self.rebuild_body(id);
        }
        self.events.push(EngineEvent::EntityAdded { id: id.to_string() });
        info!("entity '{name}' (id: {id}, kind: {}) added", kind.as_str());
        Ok(())
    }

    fn spawn_game_camera(
        &mut self,
        id: &str,
        name: &str,
        position: Vec3,
        orientation: Quat,
        options: &EntityOptions,
    ) -> EntityRecord {
        let camera = self.graph.add_node(
            NodeKind::Camera {
                fov_degrees: options.fov.unwrap_or(75.0),
                near: options.near.unwrap_or(0.1),
                far: options.far.unwrap_or(1000.0),
                aspect: self.viewport.aspect(),
            },
            position,
            orientation,
        );
        let helper = self.graph.add_node(NodeKind::CameraHelper, Vec3::ZERO, Quat::IDENTITY);
        self.graph.attach_child(camera, helper);
        self.graph.set_visible(helper, false);
        EntityRecord {
            id: id.to_string(),
            name: name.to_string(),
            kind: EntityKind::GameCamera,
            visual: camera,
            body: None,
            collision_debug: None,
            camera_debug: Some(helper),
            physics: None,
            initial_state: InitialState { position, orientation },
            default_entity: false,
        }
    }

    fn spawn_mesh(
        &mut self,
        id: &str,
        name: &str,
        kind: EntityKind,
        position: Vec3,
        orientation: Quat,
        options: &EntityOptions,
    ) -> EngineResult<EntityRecord> {
        let mut config = match PhysicsConfig::default_for(kind) {
            Some(config) => config,
            None => return Err(EngineError::UnknownKind(kind.as_str().to_string())),
        };
        if let Some(physics) = &options.physics {
            physics.merge_into(&mut config)?;
        }
        let material_desc = options.material.clone().unwrap_or_default();
        let material =
            material::resolve(&material_desc, &self.color_names, &mut self.graph, &mut self.loader)?;

        let geometry = match kind {
            EntityKind::Box => {
                let size = options.size.unwrap_or_default();
                Geometry::Box { width: size.w, height: size.h, depth: size.d }
            }
            EntityKind::Sphere => Geometry::Sphere { radius: options.radius.unwrap_or(1.0) },
            EntityKind::Plane => {
                let size = options.size.unwrap_or(SizeData { w: 10.0, h: 1.0, d: 10.0 });
                Geometry::Plane { width: size.w, depth: size.d }
            }
            _ => return Err(EngineError::UnknownKind(kind.as_str().to_string())),
        };
        let geometry = self.graph.add_geometry(geometry);
        let mesh = self.graph.add_node(NodeKind::Mesh { geometry, material }, position, orientation);
        let helper = self.graph.add_node(
            NodeKind::WireHelper { color: body_sync::debug_color(false) },
            Vec3::ZERO,
            Quat::IDENTITY,
        );
        self.graph.attach_child(mesh, helper);
        self.graph.set_visible(helper, false);

        Ok(EntityRecord {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            visual: mesh,
            body: None,
            collision_debug: Some(helper),
            camera_debug: None,
            physics: Some(config),
            initial_state: InitialState { position, orientation },
            default_entity: false,
        })
    }

    pub fn add_light(&mut self, id: &str, name: &str, options: &LightOptions) -> EngineResult<()> {
        self.add_light_internal(id, name, options, false)
    }

    fn add_light_internal(
        &mut self,
        id: &str,
        name: &str,
        options: &LightOptions,
        default_entity: bool,
    ) -> EngineResult<()> {
        if self.registry.contains(id) {
            warn!("rejected add of light '{id}': id already in use");
            return Err(EngineError::DuplicateId(id.to_string()));
        }
        let color = match &options.color {
            Some(value) => Color::parse(value, &self.color_names)?,
            None => crate::color::WHITE,
        };
        let intensity = options.intensity.unwrap_or(1.0);
        let (kind, params) = match options.light_type.as_str() {
            "ambient" => (EntityKind::AmbientLight, LightParams::Ambient { color, intensity }),
            "directional" => (
                EntityKind::DirectionalLight,
                LightParams::Directional {
                    color,
                    intensity,
                    cast_shadow: options.cast_shadow.unwrap_or(false),
                    shadow_map_size: options.shadow_map_size.unwrap_or(2048),
                },
            ),
            "point" => (
                EntityKind::PointLight,
                LightParams::Point {
                    color,
                    intensity,
                    distance: options.distance.unwrap_or(100.0),
                    decay: options.decay.unwrap_or(2.0),
                    cast_shadow: options.cast_shadow.unwrap_or(false),
                },
            ),
            other => return Err(EngineError::UnknownLightType(other.to_string())),
        };
        let position = options.position.map(Vec3::from).unwrap_or(Vec3::ZERO);
        let euler = options.rotation.map(Vec3::from).unwrap_or(Vec3::ZERO);
        let orientation = Quat::from_euler(EulerRot::XYZ, euler.x, euler.y, euler.z);
        let node = self.graph.add_node(NodeKind::Light(params), position, orientation);
        self.registry.insert(EntityRecord {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            visual: node,
            body: None,
            collision_debug: None,
            camera_debug: None,
            physics: None,
            initial_state: InitialState { position, orientation },
            default_entity,
        })?;
        self.events.push(EngineEvent::EntityAdded { id: id.to_string() });
        info!("light '{name}' (id: {id}, type: {}) added", options.light_type);
        Ok(())
    }

    /// Removes an entity and everything it owns. Teardown order is the
    /// load-bearing contract: selection detach, debug visuals, visual
    /// resources, physics body, record — in that order, so neither the
    /// physics step nor the render pass can observe a disposed resource.
    pub fn remove_entity(&mut self, id: &str) -> EngineResult<()> {
        if !self.registry.contains(id) {
            warn!("remove of '{id}' ignored: not found");
            return Err(EngineError::NotFound(id.to_string()));
        }
        if self.gizmo.is_dragging() && self.selected.as_deref() == Some(id) {
            return Err(EngineError::InvalidState("cannot remove an entity while a gizmo drag is in progress"));
        }
        if self.selected.as_deref() == Some(id) {
            self.deselect();
        }
        let Some(record) = self.registry.remove(id) else {
            return Err(EngineError::NotFound(id.to_string()));
        };

        if let Some(helper) = record.collision_debug {
            self.graph.remove_node(helper);
        }
        if let Some(helper) = record.camera_debug {
            self.graph.remove_node(helper);
        }
        let resources = self.graph.node(record.visual).and_then(|node| match &node.kind {
            NodeKind::Mesh { geometry, material } => Some((*geometry, *material)),
            _ => None,
        });
        if let Some((geometry, material)) = resources {
            let textures: Vec<_> = self
                .graph
                .material(material)
                .map(|mat| mat.texture_ids().collect())
                .unwrap_or_default();
            for texture in textures {
                self.graph.dispose_texture(texture);
            }
            self.graph.dispose_geometry(geometry);
            self.graph.dispose_material(material);
        }
        self.graph.remove_node(record.visual);
        if let Some(handle) = record.body {
            self.physics.remove_body(handle);
        }

        self.events.push(EngineEvent::EntityRemoved { id: id.to_string() });
        info!("entity '{}' removed", record.name);
        Ok(())
    }

    pub fn remove_selected(&mut self) -> EngineResult<()> {
        match self.selected.clone() {
            Some(id) => self.remove_entity(&id),
            None => Err(EngineError::InvalidState("no entity is selected")),
        }
    }

    /// Removes every non-default entity and resets the background, leaving
    /// the scene as the replay script expects to find it.
    pub fn clear_user_entities(&mut self) -> usize {
        let mut removed = 0;
        for id in self.registry.ids() {
            let keep = self.registry.get(&id).map(|record| record.default_entity).unwrap_or(true);
            if !keep && self.remove_entity(&id).is_ok() {
                removed += 1;
            }
        }
        if let Ok(color) = Color::parse(&self.settings.background.color, &self.color_names) {
            self.graph.set_background_color(color);
        }
        self.settings.background.environment_map = None;
        self.environment_request = None;
        self.graph.set_environment(None);
        info!("scene cleared: {removed} user entities removed");
        removed
    }

    /// Removes everything, defaults included. Used before loading a project.
    pub fn clear_all(&mut self) {
        self.deselect();
        for id in self.registry.ids() {
            let _ = self.remove_entity(&id);
        }
        self.physics.clear();
        info!("scene fully cleared");
    }

    pub fn get(&self, id: &str) -> Option<&EntityRecord> {
        self.registry.get(id)
    }

    pub fn entity_ids(&self) -> Vec<String> {
        self.registry.ids()
    }

    // --- typed property updates ---

    pub fn update_property(&mut self, id: &str, update: EntityUpdate) -> EngineResult<()> {
        if !self.registry.contains(id) {
            return Err(EngineError::NotFound(id.to_string()));
        }
        match update {
            EntityUpdate::Name(name) => {
                if let Some(record) = self.registry.get_mut(id) {
                    record.name = name;
                }
                Ok(())
            }
            EntityUpdate::Position(position) => self.apply_transform_edit(id, Some(position), None),
            EntityUpdate::Rotation(euler) => self.apply_transform_edit(id, None, Some(euler)),
            EntityUpdate::MaterialColor(value) => {
                let color = Color::parse(&value, &self.color_names)?;
                let material = self.mesh_material(id, "material.color")?;
                if let Some(mat) = self.graph.material_mut(material) {
                    mat.color = color;
                }
                Ok(())
            }
            EntityUpdate::MaterialRoughness(value) => {
                let material = self.mesh_material(id, "material.roughness")?;
                if let Some(mat) = self.graph.material_mut(material) {
                    mat.roughness = value.clamp(0.0, 1.0);
                }
                Ok(())
            }
            EntityUpdate::MaterialMetalness(value) => {
                let material = self.mesh_material(id, "material.metalness")?;
                if let Some(mat) = self.graph.material_mut(material) {
                    mat.metalness = value.clamp(0.0, 1.0);
                }
                Ok(())
            }
            EntityUpdate::MaterialTexture { slot, texture } => self.apply_texture_edit(id, slot, texture),
            EntityUpdate::Physics(field) => self.apply_physics_edit(id, field),
            EntityUpdate::Camera(field) => self.apply_camera_edit(id, field),
            EntityUpdate::LightColor(value) => {
                let color = Color::parse(&value, &self.color_names)?;
                self.with_light_params(id, "light.color", |params| params.set_color(color))
            }
            EntityUpdate::LightIntensity(value) => {
                self.with_light_params(id, "light.intensity", |params| params.set_intensity(value.max(0.0)))
            }
        }
    }

    fn mesh_material(&self, id: &str, property: &'static str) -> EngineResult<crate::render_graph::MaterialId> {
        let record = self.registry.get(id).ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        match self.graph.node(record.visual).map(|node| &node.kind) {
            Some(NodeKind::Mesh { material, .. }) => Ok(*material),
            _ => Err(EngineError::UnknownProperty { id: id.to_string(), property }),
        }
    }

    fn with_light_params(
        &mut self,
        id: &str,
        property: &'static str,
        apply: impl FnOnce(&mut LightParams),
    ) -> EngineResult<()> {
        let record = self.registry.get(id).ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        let visual = record.visual;
        match self.graph.node_mut(visual).map(|node| &mut node.kind) {
            Some(NodeKind::Light(params)) => {
                apply(params);
                Ok(())
            }
            _ => Err(EngineError::UnknownProperty { id: id.to_string(), property }),
        }
    }

    /// Editing-mode transform edit: the visual moves, the body follows
    /// immediately with zeroed velocities, and the initial-state snapshot is
    /// re-captured (I4).
    fn apply_transform_edit(
        &mut self,
        id: &str,
        position: Option<Vec3>,
        euler: Option<Vec3>,
    ) -> EngineResult<()> {
        if self.mode == SimMode::Running {
            return Err(EngineError::InvalidState("transform edits are rejected while the simulation is running"));
        }
        let record = self.registry.get(id).ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        let visual = record.visual;
        let body = record.body;
        let Some(node) = self.graph.node(visual) else {
            return Err(EngineError::NotFound(id.to_string()));
        };
        let new_position = position.unwrap_or(node.position);
        let new_orientation = match euler {
            Some(euler) => Quat::from_euler(EulerRot::XYZ, euler.x, euler.y, euler.z),
            None => node.orientation,
        };
        self.graph.set_pose(visual, new_position, new_orientation);
        if let Some(handle) = body {
            self.physics.set_body_pose(handle, new_position, new_orientation);
            self.physics.zero_velocities(handle);
        }
        if let Some(record) = self.registry.get_mut(id) {
            record.initial_state = InitialState { position: new_position, orientation: new_orientation };
        }
        Ok(())
    }

    fn apply_texture_edit(
        &mut self,
        id: &str,
        slot: TextureSlot,
        texture: Option<TextureRef>,
    ) -> EngineResult<()> {
        let material = self.mesh_material(id, "material.texture")?;
        match texture {
            Some(source) => {
                // The old texture is replaced (and disposed) when the load
                // completes; a failed load leaves the current one in place.
                self.loader.request_texture(material, slot, source);
            }
            None => {
                let old = self.graph.material(material).and_then(|mat| mat.texture_in(slot));
                if let Some(old) = old {
                    self.graph.dispose_texture(old);
                }
                if let Some(mat) = self.graph.material_mut(material) {
                    mat.set_texture(slot, None);
                }
            }
        }
        Ok(())
    }

    fn apply_physics_edit(&mut self, id: &str, field: PhysicsUpdate) -> EngineResult<()> {
        if self.mode == SimMode::Running {
            return Err(EngineError::InvalidState("physics edits are rejected while the simulation is running"));
        }
        let record = self.registry.get_mut(id).ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        let Some(config) = record.physics.as_mut() else {
            return Err(EngineError::UnknownProperty { id: id.to_string(), property: "physics" });
        };
        let mut rebuild = false;
        match field {
            PhysicsUpdate::BodyType(body_type) => {
                config.body_type = body_type;
                rebuild = true;
            }
            PhysicsUpdate::CollisionShape(shape) => {
                config.collision_shape = shape;
                rebuild = true;
            }
            PhysicsUpdate::Mass(mass) => {
                config.mass = match config.body_type {
                    BodyType::Dynamic if mass < 0.0 => {
                        warn!("negative mass {mass} on dynamic entity '{id}'; correcting to 1");
                        1.0
                    }
                    BodyType::Dynamic => mass,
                    _ => 0.0,
                };
            }
            PhysicsUpdate::Friction(value) => config.friction = value,
            PhysicsUpdate::Restitution(value) => config.restitution = value,
            PhysicsUpdate::LinearDamping(value) => config.linear_damping = value,
            PhysicsUpdate::AngularDamping(value) => config.angular_damping = value,
        }
        if rebuild {
            self.rebuild_body(id);
        } else {
            let record = self.registry.get(id).ok_or_else(|| EngineError::NotFound(id.to_string()))?;
            body_sync::patch(record, &mut self.physics);
            let helper = record.collision_debug;
            let present = record.body.is_some();
            self.refresh_debug_color(helper, present);
        }
        Ok(())
    }

    fn apply_camera_edit(&mut self, id: &str, field: CameraUpdate) -> EngineResult<()> {
        let record = self.registry.get(id).ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        if record.kind != EntityKind::GameCamera {
            return Err(EngineError::UnknownProperty { id: id.to_string(), property: "camera" });
        }
        let visual = record.visual;
        if let Some(NodeKind::Camera { fov_degrees, near, far, .. }) =
            self.graph.node_mut(visual).map(|node| &mut node.kind)
        {
            match field {
                CameraUpdate::Fov(value) => *fov_degrees = value.clamp(1.0, 179.0),
                CameraUpdate::Near(value) => *near = value.max(0.001),
                CameraUpdate::Far(value) => *far = value,
            }
        }
        Ok(())
    }

    /// Replaces the whole physics config and rebuilds the body.
    pub fn set_physics_config(&mut self, id: &str, config: PhysicsConfig) -> EngineResult<()> {
        if self.mode == SimMode::Running {
            return Err(EngineError::InvalidState("physics edits are rejected while the simulation is running"));
        }
        let record = self.registry.get_mut(id).ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        if record.physics.is_none() {
            return Err(EngineError::UnknownProperty { id: id.to_string(), property: "physics" });
        }
        record.physics = Some(config);
        self.rebuild_body(id);
        Ok(())
    }

    fn rebuild_body(&mut self, id: &str) {
        let Some(record) = self.registry.get_mut(id) else {
            return;
        };
        body_sync::rebuild(record, &self.graph, &mut self.physics);
        let helper = record.collision_debug;
        let present = record.body.is_some();
        self.refresh_debug_color(helper, present);
    }

    fn refresh_debug_color(&mut self, helper: Option<NodeId>, body_present: bool) {
        let Some(helper) = helper else {
            return;
        };
        if let Some(NodeKind::WireHelper { color }) = self.graph.node_mut(helper).map(|node| &mut node.kind) {
            *color = body_sync::debug_color(body_present);
        }
    }

    // --- selection & gizmo ---

    pub fn select(&mut self, id: &str) -> EngineResult<()> {
        if self.mode == SimMode::Running {
            warn!("selection of '{id}' rejected while the simulation is running");
            return Err(EngineError::InvalidState("cannot select while the simulation is running"));
        }
        if !self.registry.contains(id) {
            return Err(EngineError::NotFound(id.to_string()));
        }
        if let Some(previous) = self.selected.clone() {
            if previous != id {
                self.deselect();
            }
        }
        self.selected = Some(id.to_string());
        let Some(record) = self.registry.get(id) else {
            return Err(EngineError::NotFound(id.to_string()));
        };
        let visual = record.visual;
        let collision_debug = record.collision_debug;
        let camera_debug = record.camera_debug;
        let body_present = record.body.is_some();
        self.gizmo.attach(visual);
        if let Some(helper) = collision_debug {
            self.graph.set_visible(helper, true);
            self.refresh_debug_color(Some(helper), body_present);
        }
        if let Some(helper) = camera_debug {
            self.graph.set_visible(helper, true);
        }
        self.events.push(EngineEvent::EntitySelected { id: id.to_string() });
        info!("entity '{id}' selected");
        Ok(())
    }

    pub fn deselect(&mut self) {
        let Some(id) = self.selected.take() else {
            return;
        };
        if let Some(record) = self.registry.get(&id) {
            let collision_debug = record.collision_debug;
            let camera_debug = record.camera_debug;
            if let Some(helper) = collision_debug {
                self.graph.set_visible(helper, false);
            }
            if let Some(helper) = camera_debug {
                self.graph.set_visible(helper, false);
            }
        }
        self.gizmo.detach();
        self.events.push(EngineEvent::EntityDeselected { id: id.clone() });
        info!("entity '{id}' deselected");
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Pointer-pick: casts a ray through the editor camera against mesh
    /// visuals and camera helpers, then resolves the nearest hit to the
    /// closest ancestor that belongs to a registered entity. A miss
    /// deselects.
    pub fn pick(&mut self, screen: Vec2) -> EngineResult<Option<String>> {
        if self.mode == SimMode::Running || self.gizmo.is_dragging() {
            return Ok(None);
        }
        let camera = self.editor_camera_rig();
        let Some((origin, dir)) = camera.screen_ray(screen, self.viewport) else {
            return Ok(None);
        };
        let mut targets = Vec::new();
        for record in self.registry.iter() {
            if record.kind.is_mesh() {
                targets.push(record.visual);
            }
            if let Some(helper) = record.camera_debug {
                targets.push(helper);
            }
        }
        let hits = self.graph.raycast(origin, dir, &targets);
        for hit in hits {
            if let Some(id) = self.owner_of(hit.node) {
                self.select(&id)?;
                return Ok(Some(id));
            }
            warn!("picked node has no registered owner");
        }
        self.deselect();
        Ok(None)
    }

    /// Walks the ancestor chain until a node owned by a registry record is
    /// found.
    fn owner_of(&self, node: NodeId) -> Option<String> {
        let mut current = Some(node);
        while let Some(id) = current {
            for record in self.registry.iter() {
                let owns = record.visual == id
                    || record.collision_debug == Some(id)
                    || record.camera_debug == Some(id);
                if owns {
                    return Some(record.id.clone());
                }
            }
            current = self.graph.node(id).and_then(|n| n.parent);
        }
        None
    }

    pub fn begin_gizmo_drag(&mut self) {
        self.gizmo.set_dragging(true);
        self.orbit.enabled = false;
    }

    pub fn end_gizmo_drag(&mut self) {
        self.gizmo.set_dragging(false);
        if self.mode == SimMode::Editing {
            self.orbit.enabled = true;
        }
    }

    /// Drag feedback from the external gizmo. The visual pose is copied onto
    /// the physics body immediately so manual edits never wait for a tick,
    /// and the initial-state snapshot follows the edit.
    pub fn apply_gizmo_transform(&mut self, position: Vec3, orientation: Quat) -> EngineResult<()> {
        if self.mode == SimMode::Running {
            return Err(EngineError::InvalidState("the gizmo is inactive while the simulation is running"));
        }
        let Some(id) = self.selected.clone() else {
            return Err(EngineError::InvalidState("the gizmo is not attached to an entity"));
        };
        let record = self.registry.get_mut(&id).ok_or_else(|| EngineError::NotFound(id.clone()))?;
        let visual = record.visual;
        let body = record.body;
        record.initial_state = InitialState { position, orientation };
        self.graph.set_pose(visual, position, orientation);
        if let Some(handle) = body {
            self.physics.set_body_pose(handle, position, orientation);
            self.physics.zero_velocities(handle);
        }
        Ok(())
    }

    // --- simulation state machine ---

    pub fn is_running(&self) -> bool {
        self.mode == SimMode::Running
    }

    pub fn mode(&self) -> SimMode {
        self.mode
    }

    /// Enters Running: remembers the orbit target, picks the active camera
    /// (the selected GameCamera if any), clears the selection, disables orbit
    /// editing, and hides every debug visual. Safe to call again while
    /// already Running.
    pub fn play(&mut self) {
        self.saved_orbit_target = self.orbit.target();
        let game_camera = self
            .selected
            .as_ref()
            .and_then(|id| self.registry.get(id))
            .filter(|record| record.kind == EntityKind::GameCamera)
            .map(|record| record.visual);
        self.active_camera = game_camera.unwrap_or(self.editor_camera);
        self.selection_before_run = self.selected.clone();
        self.deselect();
        self.orbit.enabled = false;
        for id in self.registry.ids() {
            let helpers = self.registry.get(&id).map(|r| (r.collision_debug, r.camera_debug));
            if let Some((collision, camera)) = helpers {
                if let Some(helper) = collision {
                    self.graph.set_visible(helper, false);
                }
                if let Some(helper) = camera {
                    self.graph.set_visible(helper, false);
                }
            }
        }
        self.mode = SimMode::Running;
        info!(
            "simulation started (camera: {})",
            if self.active_camera == self.editor_camera { "editor" } else { "game" }
        );
    }

    /// Returns to Editing: restores the editor camera and orbit target, and
    /// forces every entity with a body back to its initial-state snapshot —
    /// pose applied to the body first, then pushed to the visual, velocities
    /// zeroed. Re-selects whatever was selected before `play`.
    pub fn stop(&mut self) {
        self.mode = SimMode::Editing;
        self.active_camera = self.editor_camera;
        self.orbit.enabled = true;
        self.orbit.set_target(self.saved_orbit_target);
        for id in self.registry.ids() {
            let reset = self
                .registry
                .get(&id)
                .and_then(|record| record.body.map(|handle| (handle, record.visual, record.initial_state)));
            if let Some((handle, visual, snapshot)) = reset {
                self.physics.set_body_pose(handle, snapshot.position, snapshot.orientation);
                self.physics.zero_velocities(handle);
                self.graph.set_pose(visual, snapshot.position, snapshot.orientation);
            }
        }
        info!("simulation stopped; entities reset to their snapshots");
        if let Some(id) = self.selection_before_run.take() {
            if let Err(err) = self.select(&id) {
                warn!("previous selection '{id}' not restored: {err}");
            }
        }
    }

    // --- frame driver ---

    /// One display-refresh tick. The only place state flows from physics to
    /// visuals, and only while Running; rendering happens unconditionally.
    pub fn update(&mut self, dt: f32) {
        self.orbit.update(dt);
        let rig = self.editor_camera_rig();
        self.graph.set_pose(self.editor_camera, rig.position, rig.orientation());

        if self.mode == SimMode::Running {
            self.physics.step(FIXED_TIME_STEP);
            for id in self.registry.ids() {
                let pull = self.registry.get(&id).and_then(|record| {
                    let dynamic = record
                        .physics
                        .map(|config| config.body_type == BodyType::Dynamic)
                        .unwrap_or(false);
                    record.body.filter(|_| dynamic).map(|handle| (handle, record.visual))
                });
                if let Some((handle, visual)) = pull {
                    if let Some((position, orientation)) = self.physics.body_pose(handle) {
                        self.graph.set_pose(visual, position, orientation);
                    }
                }
            }
        }

        self.loader.pump();
        for completion in self.loader.drain() {
            self.apply_load_completion(completion);
        }

        self.graph.render(self.active_camera);
    }

    /// Applies a finished load if (and only if) its target still exists;
    /// stale completions are discarded without being dereferenced.
    fn apply_load_completion(&mut self, completion: LoadCompletion) {
        match completion {
            LoadCompletion::TextureReady { material, slot, texture } => {
                let old = match self.graph.material(material) {
                    Some(mat) => mat.texture_in(slot),
                    None => {
                        debug!("discarding texture '{}': target material was disposed", texture.name);
                        return;
                    }
                };
                let name = texture.name.clone();
                let id = self.graph.add_texture(texture);
                if let Some(old) = old {
                    self.graph.dispose_texture(old);
                }
                if let Some(mat) = self.graph.material_mut(material) {
                    mat.set_texture(slot, Some(id));
                }
                info!("texture '{name}' installed in slot {}", slot.label());
            }
            LoadCompletion::EnvironmentReady { name } => {
                let live = self.environment_request.as_ref().map(|r| r.name == name).unwrap_or(false);
                if live {
                    self.graph.set_environment(Some(EnvironmentHandle { name: name.clone() }));
                    self.environment_request = None;
                    info!("environment map '{name}' installed");
                } else {
                    debug!("discarding environment '{name}': superseded or cleared");
                }
            }
        }
    }

    fn editor_camera_rig(&self) -> crate::camera::Camera3D {
        let (fov, near, far) = match self.graph.node(self.editor_camera).map(|node| &node.kind) {
            Some(NodeKind::Camera { fov_degrees, near, far, .. }) => (*fov_degrees, *near, *far),
            _ => (75.0, 0.1, 1000.0),
        };
        self.orbit.to_camera(fov.to_radians(), near, far)
    }

    // --- scene-level state ---

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.physics.set_gravity(gravity);
        info!("gravity set to ({:.2}, {:.2}, {:.2})", gravity.x, gravity.y, gravity.z);
    }

    pub fn gravity(&self) -> Vec3 {
        self.physics.gravity()
    }

    pub fn set_fog(&mut self, fog: FogConfig) -> EngineResult<()> {
        if fog.enabled {
            Color::parse(&fog.color, &self.color_names)?;
            info!("fog enabled: color {} near {:.2} far {:.2}", fog.color, fog.near, fog.far);
            self.settings.fog = fog;
        } else {
            info!("fog disabled");
            self.settings.fog = FogConfig::default();
        }
        Ok(())
    }

    pub fn set_background(&mut self, options: &BackgroundOptions) -> EngineResult<()> {
        if let Some(color) = &options.color {
            let parsed = Color::parse(color, &self.color_names)?;
            self.graph.set_background_color(parsed);
            self.settings.background.color = color.clone();
            info!("background color set to '{color}'");
        }
        if options.clear_environment {
            self.graph.set_environment(None);
            self.settings.background.environment_map = None;
            self.environment_request = None;
            info!("environment map removed");
        } else if let Some(map) = &options.environment_map {
            let source = TextureRef::from_source(map.clone());
            self.settings.background.environment_map = Some(map.clone());
            self.environment_request = Some(source.clone());
            self.loader.request_environment(source);
        }
        Ok(())
    }

    pub fn apply_render_settings(&mut self, patch: &RenderSettingsPatch) {
        self.settings.render.apply(patch);
        info!("render settings applied");
    }

    pub fn apply_quality_preset(&mut self, preset: QualityPreset) -> RenderSettings {
        let settings = preset.settings();
        self.settings.render = settings;
        info!("quality preset applied");
        settings
    }

    pub fn set_render_settings(&mut self, settings: RenderSettings) {
        self.settings.render = settings;
    }

    pub fn set_background_config(&mut self, background: BackgroundConfig) -> EngineResult<()> {
        let options = BackgroundOptions {
            color: Some(background.color),
            environment_map: background.environment_map,
            clear_environment: false,
        };
        self.set_background(&options)
    }

    // --- accessors ---

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &SceneSettings {
        &self.settings
    }

    pub fn graph(&self) -> &RenderGraph {
        &self.graph
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    pub fn loader(&self) -> &AssetLoader {
        &self.loader
    }

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        self.events.drain()
    }

    pub fn color_names_mut(&mut self) -> &mut ColorNames {
        &mut self.color_names
    }

    pub fn orbit(&self) -> &OrbitController {
        &self.orbit
    }

    pub fn orbit_mut(&mut self) -> &mut OrbitController {
        &mut self.orbit
    }

    pub fn editor_camera(&self) -> NodeId {
        self.editor_camera
    }

    pub fn active_camera(&self) -> NodeId {
        self.active_camera
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
