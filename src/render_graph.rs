use crate::color::Color;
use glam::{Quat, Vec3};
use smallvec::SmallVec;
use std::collections::HashMap;

/// In-memory render-side collaborator: a scene graph of typed nodes plus the
/// geometry/material/texture resources they reference. Draw calls live in the
/// real renderer; this façade tracks everything the editor core needs to keep
/// consistent — poses, visibility, parent links, resource lifetimes, and ray
/// queries for picking.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    #[cfg(test)]
    pub(crate) fn from_raw(value: u64) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(u64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Geometry {
    Box { width: f32, height: f32, depth: f32 },
    Sphere { radius: f32 },
    Plane { width: f32, depth: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    BaseColor,
    Roughness,
    Metalness,
}

impl TextureSlot {
    pub fn label(self) -> &'static str {
        match self {
            TextureSlot::BaseColor => "map",
            TextureSlot::Roughness => "roughness_map",
            TextureSlot::Metalness => "metalness_map",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Material {
    pub color: Color,
    pub roughness: f32,
    pub metalness: f32,
    pub base_color_map: Option<TextureId>,
    pub roughness_map: Option<TextureId>,
    pub metalness_map: Option<TextureId>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: crate::color::WHITE,
            roughness: 0.5,
            metalness: 0.5,
            base_color_map: None,
            roughness_map: None,
            metalness_map: None,
        }
    }
}

impl Material {
    pub fn texture_in(&self, slot: TextureSlot) -> Option<TextureId> {
        match slot {
            TextureSlot::BaseColor => self.base_color_map,
            TextureSlot::Roughness => self.roughness_map,
            TextureSlot::Metalness => self.metalness_map,
        }
    }

    pub fn set_texture(&mut self, slot: TextureSlot, texture: Option<TextureId>) {
        match slot {
            TextureSlot::BaseColor => self.base_color_map = texture,
            TextureSlot::Roughness => self.roughness_map = texture,
            TextureSlot::Metalness => self.metalness_map = texture,
        }
    }

    pub fn texture_ids(&self) -> impl Iterator<Item = TextureId> {
        [self.base_color_map, self.roughness_map, self.metalness_map].into_iter().flatten()
    }
}

/// Decoded texture resource. The GPU upload is the renderer's concern; the
/// graph only owns the decoded bytes and the name used for serialization.
#[derive(Debug, Clone)]
pub struct Texture {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LightParams {
    Ambient { color: Color, intensity: f32 },
    Directional { color: Color, intensity: f32, cast_shadow: bool, shadow_map_size: u32 },
    Point { color: Color, intensity: f32, distance: f32, decay: f32, cast_shadow: bool },
}

impl LightParams {
    pub fn color(&self) -> Color {
        match self {
            LightParams::Ambient { color, .. }
            | LightParams::Directional { color, .. }
            | LightParams::Point { color, .. } => *color,
        }
    }

    pub fn set_color(&mut self, value: Color) {
        match self {
            LightParams::Ambient { color, .. }
            | LightParams::Directional { color, .. }
            | LightParams::Point { color, .. } => *color = value,
        }
    }

    pub fn intensity(&self) -> f32 {
        match self {
            LightParams::Ambient { intensity, .. }
            | LightParams::Directional { intensity, .. }
            | LightParams::Point { intensity, .. } => *intensity,
        }
    }

    pub fn set_intensity(&mut self, value: f32) {
        match self {
            LightParams::Ambient { intensity, .. }
            | LightParams::Directional { intensity, .. }
            | LightParams::Point { intensity, .. } => *intensity = value,
        }
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Mesh { geometry: GeometryId, material: MaterialId },
    Camera { fov_degrees: f32, near: f32, far: f32, aspect: f32 },
    Light(LightParams),
    /// Collision-debug wireframe, child of a mesh node.
    WireHelper { color: Color },
    /// Frustum helper, child of a game-camera node.
    CameraHelper,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub position: Vec3,
    pub orientation: Quat,
    pub visible: bool,
    pub parent: Option<NodeId>,
    pub children: SmallVec<[NodeId; 4]>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub node: NodeId,
    pub distance: f32,
}

/// Handle for an installed environment map, produced by the loader after the
/// renderer-side equirectangular pre-filter.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentHandle {
    pub name: String,
}

pub struct RenderGraph {
    nodes: HashMap<NodeId, Node>,
    geometries: HashMap<GeometryId, Geometry>,
    materials: HashMap<MaterialId, Material>,
    textures: HashMap<TextureId, Texture>,
    environment: Option<EnvironmentHandle>,
    background_color: Color,
    next_id: u64,
    frames_rendered: u64,
}

impl RenderGraph {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            geometries: HashMap::new(),
            materials: HashMap::new(),
            textures: HashMap::new(),
            environment: None,
            background_color: Color::new(0.102, 0.102, 0.102),
            next_id: 1,
            frames_rendered: 0,
        }
    }

    fn bump(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // --- nodes ---

    pub fn add_node(&mut self, kind: NodeKind, position: Vec3, orientation: Quat) -> NodeId {
        let id = NodeId(self.bump());
        self.nodes.insert(
            id,
            Node { kind, position, orientation, visible: true, parent: None, children: SmallVec::new() },
        );
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn set_pose(&mut self, id: NodeId, position: Vec3, orientation: Quat) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.position = position;
            node.orientation = orientation;
        }
    }

    pub fn set_visible(&mut self, id: NodeId, visible: bool) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.visible = visible;
        }
    }

    pub fn attach_child(&mut self, parent: NodeId, child: NodeId) {
        if !self.nodes.contains_key(&parent) || !self.nodes.contains_key(&child) {
            return;
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(&parent) {
            if !node.children.contains(&child) {
                node.children.push(child);
            }
        }
    }

    /// Unlinks a node from its parent without removing it.
    pub fn detach_child(&mut self, child: NodeId) {
        let parent = match self.nodes.get_mut(&child) {
            Some(node) => node.parent.take(),
            None => return,
        };
        if let Some(parent) = parent {
            if let Some(node) = self.nodes.get_mut(&parent) {
                node.children.retain(|c| *c != child);
            }
        }
    }

    /// Removes a node. Children are unlinked, not removed; the caller owns
    /// their teardown order.
    pub fn remove_node(&mut self, id: NodeId) {
        self.detach_child(id);
        if let Some(node) = self.nodes.remove(&id) {
            for child in node.children {
                if let Some(orphan) = self.nodes.get_mut(&child) {
                    orphan.parent = None;
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// World position of a node (parent chain applied).
    pub fn world_position(&self, id: NodeId) -> Option<Vec3> {
        let node = self.nodes.get(&id)?;
        match node.parent {
            Some(parent) => {
                let base = self.world_position(parent)?;
                let rotation = self.world_orientation(parent)?;
                Some(base + rotation * node.position)
            }
            None => Some(node.position),
        }
    }

    pub fn world_orientation(&self, id: NodeId) -> Option<Quat> {
        let node = self.nodes.get(&id)?;
        match node.parent {
            Some(parent) => Some(self.world_orientation(parent)? * node.orientation),
            None => Some(node.orientation),
        }
    }

    // --- resources ---

    pub fn add_geometry(&mut self, geometry: Geometry) -> GeometryId {
        let id = GeometryId(self.bump());
        self.geometries.insert(id, geometry);
        id
    }

    pub fn geometry(&self, id: GeometryId) -> Option<&Geometry> {
        self.geometries.get(&id)
    }

    pub fn dispose_geometry(&mut self, id: GeometryId) {
        self.geometries.remove(&id);
    }

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        let id = MaterialId(self.bump());
        self.materials.insert(id, material);
        id
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(&id)
    }

    pub fn material_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(&id)
    }

    pub fn dispose_material(&mut self, id: MaterialId) {
        self.materials.remove(&id);
    }

    pub fn add_texture(&mut self, texture: Texture) -> TextureId {
        let id = TextureId(self.bump());
        self.textures.insert(id, texture);
        id
    }

    pub fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(&id)
    }

    pub fn dispose_texture(&mut self, id: TextureId) {
        self.textures.remove(&id);
    }

    pub fn geometry_count(&self) -> usize {
        self.geometries.len()
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    // --- scene-level state ---

    pub fn set_background_color(&mut self, color: Color) {
        self.background_color = color;
    }

    pub fn background_color(&self) -> Color {
        self.background_color
    }

    pub fn set_environment(&mut self, environment: Option<EnvironmentHandle>) {
        self.environment = environment;
    }

    pub fn environment(&self) -> Option<&EnvironmentHandle> {
        self.environment.as_ref()
    }

    /// Stands in for the draw pass: validates the camera and counts the frame.
    pub fn render(&mut self, camera: NodeId) -> bool {
        let is_camera = matches!(self.nodes.get(&camera).map(|n| &n.kind), Some(NodeKind::Camera { .. }));
        if is_camera {
            self.frames_rendered += 1;
        }
        is_camera
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    // --- picking ---

    /// Intersects a world-space ray with the listed nodes, nearest first.
    /// Visibility is ignored so hidden helpers stay pickable.
    pub fn raycast(&self, origin: Vec3, dir: Vec3, targets: &[NodeId]) -> Vec<RayHit> {
        let mut hits: Vec<RayHit> = targets
            .iter()
            .filter_map(|&id| self.intersect_node(origin, dir, id).map(|distance| RayHit { node: id, distance }))
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }

    fn intersect_node(&self, origin: Vec3, dir: Vec3, id: NodeId) -> Option<f32> {
        let node = self.nodes.get(&id)?;
        let position = self.world_position(id)?;
        let orientation = self.world_orientation(id)?;
        match &node.kind {
            NodeKind::Mesh { geometry, .. } => match self.geometries.get(geometry)? {
                Geometry::Sphere { radius } => ray_sphere(origin, dir, position, *radius),
                Geometry::Box { width, height, depth } => {
                    let half = Vec3::new(width * 0.5, height * 0.5, depth * 0.5);
                    ray_obb(origin, dir, position, orientation, half)
                }
                Geometry::Plane { width, depth } => {
                    ray_plane_rect(origin, dir, position, orientation, width * 0.5, depth * 0.5)
                }
            },
            NodeKind::CameraHelper => ray_obb(origin, dir, position, orientation, Vec3::splat(0.5)),
            _ => None,
        }
    }
}

impl Default for RenderGraph {
    fn default() -> Self {
        Self::new()
    }
}

fn ray_sphere(origin: Vec3, dir: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let to_center = center - origin;
    let projected = to_center.dot(dir);
    let closest_sq = to_center.length_squared() - projected * projected;
    let radius_sq = radius * radius;
    if closest_sq > radius_sq {
        return None;
    }
    let half_chord = (radius_sq - closest_sq).sqrt();
    let near = projected - half_chord;
    let far = projected + half_chord;
    if near >= 0.0 {
        Some(near)
    } else if far >= 0.0 {
        Some(far)
    } else {
        None
    }
}

fn ray_obb(origin: Vec3, dir: Vec3, center: Vec3, orientation: Quat, half: Vec3) -> Option<f32> {
    let inv = orientation.conjugate();
    let local_origin = inv * (origin - center);
    let local_dir = inv * dir;
    let mut t_min = f32::NEG_INFINITY;
    let mut t_max = f32::INFINITY;
    for axis in 0..3 {
        let o = local_origin[axis];
        let d = local_dir[axis];
        let h = half[axis];
        if d.abs() < 1e-8 {
            if o.abs() > h {
                return None;
            }
            continue;
        }
        let t1 = (-h - o) / d;
        let t2 = (h - o) / d;
        let (lo, hi) = if t1 < t2 { (t1, t2) } else { (t2, t1) };
        t_min = t_min.max(lo);
        t_max = t_max.min(hi);
        if t_min > t_max {
            return None;
        }
    }
    if t_max < 0.0 {
        None
    } else if t_min >= 0.0 {
        Some(t_min)
    } else {
        Some(t_max)
    }
}

/// Plane geometry lies in the local XY plane, matching the mesh primitive.
fn ray_plane_rect(
    origin: Vec3,
    dir: Vec3,
    center: Vec3,
    orientation: Quat,
    half_width: f32,
    half_depth: f32,
) -> Option<f32> {
    let inv = orientation.conjugate();
    let local_origin = inv * (origin - center);
    let local_dir = inv * dir;
    if local_dir.z.abs() < 1e-8 {
        return None;
    }
    let t = -local_origin.z / local_dir.z;
    if t < 0.0 {
        return None;
    }
    let point = local_origin + local_dir * t;
    if point.x.abs() <= half_width && point.y.abs() <= half_depth {
        Some(t)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with_sphere(radius: f32, position: Vec3) -> (RenderGraph, NodeId) {
        let mut graph = RenderGraph::new();
        let geometry = graph.add_geometry(Geometry::Sphere { radius });
        let material = graph.add_material(Material::default());
        let node = graph.add_node(NodeKind::Mesh { geometry, material }, position, Quat::IDENTITY);
        (graph, node)
    }

    #[test]
    fn raycast_hits_sphere_in_front() {
        let (graph, node) = graph_with_sphere(1.0, Vec3::new(0.0, 0.0, -5.0));
        let hits = graph.raycast(Vec3::ZERO, Vec3::NEG_Z, &[node]);
        assert_eq!(hits.len(), 1);
        assert!((hits[0].distance - 4.0).abs() < 1e-5);
    }

    #[test]
    fn raycast_orders_by_distance() {
        let mut graph = RenderGraph::new();
        let geometry = graph.add_geometry(Geometry::Box { width: 1.0, height: 1.0, depth: 1.0 });
        let material = graph.add_material(Material::default());
        let near = graph.add_node(
            NodeKind::Mesh { geometry, material },
            Vec3::new(0.0, 0.0, -3.0),
            Quat::IDENTITY,
        );
        let far = graph.add_node(
            NodeKind::Mesh { geometry, material },
            Vec3::new(0.0, 0.0, -8.0),
            Quat::IDENTITY,
        );
        let hits = graph.raycast(Vec3::ZERO, Vec3::NEG_Z, &[far, near]);
        assert_eq!(hits.first().map(|h| h.node), Some(near));
    }

    #[test]
    fn child_world_position_follows_parent() {
        let mut graph = RenderGraph::new();
        let parent = graph.add_node(
            NodeKind::Camera { fov_degrees: 75.0, near: 0.1, far: 1000.0, aspect: 1.0 },
            Vec3::new(1.0, 2.0, 3.0),
            Quat::IDENTITY,
        );
        let child = graph.add_node(NodeKind::CameraHelper, Vec3::ZERO, Quat::IDENTITY);
        graph.attach_child(parent, child);
        assert_eq!(graph.world_position(child), Some(Vec3::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn remove_node_unlinks_children() {
        let mut graph = RenderGraph::new();
        let parent = graph.add_node(NodeKind::CameraHelper, Vec3::ZERO, Quat::IDENTITY);
        let child = graph.add_node(NodeKind::CameraHelper, Vec3::ZERO, Quat::IDENTITY);
        graph.attach_child(parent, child);
        graph.remove_node(parent);
        assert!(graph.node(parent).is_none());
        assert_eq!(graph.node(child).unwrap().parent, None);
    }
}
