use glam::{Quat, Vec3};
use rapier3d::math::{Isometry, Real, Rotation, Translation, Vector};
use rapier3d::na::Quaternion;
use rapier3d::prelude::{
    CCDSolver, Collider, DefaultBroadPhase, ImpulseJointSet, IntegrationParameters, IslandManager,
    MultibodyJointSet, NarrowPhase, PhysicsPipeline, QueryPipeline, RigidBody, RigidBodyHandle, RigidBodySet,
    ColliderSet,
};

/// Owns the entire physics-side state: solver pipeline, body and collider
/// sets, islands, phases, joints. Bodies are only created and removed through
/// the synchronizer, which keeps I1 (one body per entity record) checkable by
/// comparing `body_count` against the registry.
pub struct PhysicsWorld {
    pipeline: PhysicsPipeline,
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
}

impl PhysicsWorld {
    pub fn new(gravity: Vec3) -> Self {
        Self {
            pipeline: PhysicsPipeline::new(),
            gravity: vec_to_physics(gravity),
            integration_parameters: IntegrationParameters::default(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
        }
    }

    pub fn gravity(&self) -> Vec3 {
        vec_from_physics(&self.gravity)
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = vec_to_physics(gravity);
    }

    pub fn insert_body(&mut self, body: RigidBody, collider: Collider) -> RigidBodyHandle {
        let handle = self.bodies.insert(body);
        self.colliders.insert_with_parent(collider, handle, &mut self.bodies);
        handle
    }

    pub fn remove_body(&mut self, handle: RigidBodyHandle) {
        let _ = self.bodies.remove(
            handle,
            &mut self.island_manager,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    pub fn body(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle)
    }

    pub fn body_mut(&mut self, handle: RigidBodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(handle)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn body_pose(&self, handle: RigidBodyHandle) -> Option<(Vec3, Quat)> {
        let body = self.bodies.get(handle)?;
        let iso = body.position();
        Some((vec_from_physics(&iso.translation.vector), quat_from_physics(&iso.rotation)))
    }

    pub fn set_body_pose(&mut self, handle: RigidBodyHandle, position: Vec3, orientation: Quat) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_position(iso_to_physics(position, orientation), true);
        }
    }

    pub fn zero_velocities(&mut self, handle: RigidBodyHandle) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_linvel(Vector::zeros(), true);
            body.set_angvel(Vector::zeros(), true);
        }
    }

    pub fn linear_velocity(&self, handle: RigidBodyHandle) -> Option<Vec3> {
        self.bodies.get(handle).map(|body| vec_from_physics(body.linvel()))
    }

    pub fn angular_velocity(&self, handle: RigidBodyHandle) -> Option<Vec3> {
        self.bodies.get(handle).map(|body| vec_from_physics(body.angvel()))
    }

    pub fn set_body_mass(&mut self, handle: RigidBodyHandle, mass: f32) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_additional_mass(mass, true);
        }
    }

    pub fn set_body_damping(&mut self, handle: RigidBodyHandle, linear: f32, angular: f32) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_linear_damping(linear);
            body.set_angular_damping(angular);
        }
    }

    /// Patches friction/restitution on every collider of the body.
    pub fn set_body_material(&mut self, handle: RigidBodyHandle, friction: f32, restitution: f32) {
        let collider_handles: Vec<_> = self
            .bodies
            .get(handle)
            .map(|body| body.colliders().to_vec())
            .unwrap_or_default();
        for collider in collider_handles {
            if let Some(collider) = self.colliders.get_mut(collider) {
                collider.set_friction(friction);
                collider.set_restitution(restitution);
            }
        }
    }

    pub fn step(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
        self.query_pipeline.update(&self.colliders);
    }

    /// Drops every body. Used when tearing the whole scene down before a
    /// project reload.
    pub fn clear(&mut self) {
        let handles: Vec<_> = self.bodies.iter().map(|(handle, _)| handle).collect();
        for handle in handles {
            self.remove_body(handle);
        }
    }
}

pub(crate) fn vec_to_physics(v: Vec3) -> Vector<Real> {
    Vector::new(v.x, v.y, v.z)
}

pub(crate) fn vec_from_physics(v: &Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

pub(crate) fn quat_to_physics(q: Quat) -> Rotation<Real> {
    Rotation::from_quaternion(Quaternion::new(q.w, q.x, q.y, q.z))
}

pub(crate) fn quat_from_physics(q: &Rotation<Real>) -> Quat {
    let coords = q.as_ref().coords;
    Quat::from_xyzw(coords.x, coords.y, coords.z, coords.w)
}

pub(crate) fn iso_to_physics(position: Vec3, orientation: Quat) -> Isometry<Real> {
    Isometry::from_parts(Translation::from(vec_to_physics(position)), quat_to_physics(orientation))
}
