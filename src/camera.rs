use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

const DEFAULT_UP: Vec3 = Vec3::Y;
const ORBIT_DAMPING_RATE: f32 = 12.0;

/// Viewport dimensions in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f32 {
        if self.height > 0 {
            self.width as f32 / self.height as f32
        } else {
            1.0
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self { width: 1280, height: 720 }
    }
}

/// Perspective camera used for editor-side ray math.
#[derive(Debug, Clone)]
pub struct Camera3D {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_radians: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera3D {
    pub fn new(position: Vec3, target: Vec3, fov_y_radians: f32, near: f32, far: f32) -> Self {
        Self { position, target, up: DEFAULT_UP, fov_y_radians, near, far }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov_y_radians, aspect.max(0.0001), self.near, self.far)
    }

    /// World-space ray from the camera through a screen position.
    pub fn screen_ray(&self, screen: Vec2, viewport: Viewport) -> Option<(Vec3, Vec3)> {
        if viewport.width == 0 || viewport.height == 0 {
            return None;
        }
        let ndc_x = (2.0 * screen.x / viewport.width as f32) - 1.0;
        let ndc_y = 1.0 - (2.0 * screen.y / viewport.height as f32);
        let clip = Vec4::new(ndc_x, ndc_y, 1.0, 1.0);
        let inv_view_proj = (self.projection_matrix(viewport.aspect()) * self.view_matrix()).inverse();
        let world = inv_view_proj * clip;
        if world.w.abs() < f32::EPSILON {
            return None;
        }
        let dir = ((world.truncate() / world.w) - self.position).normalize();
        Some((self.position, dir))
    }

    pub fn orientation(&self) -> Quat {
        let forward = (self.target - self.position).normalize_or_zero();
        if forward.length_squared() < f32::EPSILON {
            Quat::IDENTITY
        } else {
            Quat::from_rotation_arc(Vec3::NEG_Z, forward)
        }
    }
}

/// Orbit controller driving the editor camera.
///
/// `target` is where the user asked the camera to look; the damped target
/// eases toward it each frame, so a restored target settles over a few ticks
/// instead of snapping.
#[derive(Debug, Clone)]
pub struct OrbitController {
    target: Vec3,
    damped_target: Vec3,
    pub radius: f32,
    pub yaw_radians: f32,
    pub pitch_radians: f32,
    pub enabled: bool,
}

impl OrbitController {
    pub fn new(target: Vec3, radius: f32) -> Self {
        Self {
            target,
            damped_target: target,
            radius: radius.max(0.01),
            yaw_radians: 0.0,
            pitch_radians: -0.4,
            enabled: true,
        }
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn set_target(&mut self, target: Vec3) {
        self.target = target;
    }

    pub fn orbit(&mut self, delta: Vec2) {
        if !self.enabled {
            return;
        }
        self.yaw_radians += delta.x;
        self.pitch_radians = (self.pitch_radians + delta.y)
            .clamp(-std::f32::consts::FRAC_PI_2 + 0.01, std::f32::consts::FRAC_PI_2 - 0.01);
    }

    pub fn zoom(&mut self, factor: f32) {
        if self.enabled {
            self.radius = (self.radius * factor).clamp(0.1, 10_000.0);
        }
    }

    pub fn update(&mut self, dt: f32) {
        let blend = 1.0 - (-ORBIT_DAMPING_RATE * dt.max(0.0)).exp();
        self.damped_target = self.damped_target.lerp(self.target, blend.clamp(0.0, 1.0));
    }

    pub fn to_camera(&self, fov_y_radians: f32, near: f32, far: f32) -> Camera3D {
        let rotation = Quat::from_euler(glam::EulerRot::YXZ, self.yaw_radians, self.pitch_radians, 0.0);
        let position = self.damped_target + rotation * Vec3::new(0.0, 0.0, self.radius);
        Camera3D::new(position, self.damped_target, fov_y_radians, near, far)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_ray_points_roughly_forward() {
        let camera = Camera3D::new(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, 60f32.to_radians(), 0.1, 1000.0);
        let viewport = Viewport::new(800, 600);
        let (origin, dir) = camera.screen_ray(Vec2::new(400.0, 300.0), viewport).unwrap();
        assert_eq!(origin, Vec3::new(0.0, 0.0, 10.0));
        assert!(dir.z < -0.9, "center ray should look down -Z, got {dir:?}");
    }

    #[test]
    fn damped_target_converges() {
        let mut orbit = OrbitController::new(Vec3::ZERO, 5.0);
        orbit.set_target(Vec3::new(4.0, 0.0, 0.0));
        for _ in 0..240 {
            orbit.update(1.0 / 60.0);
        }
        let camera = orbit.to_camera(75f32.to_radians(), 0.1, 1000.0);
        assert!(camera.target.distance(Vec3::new(4.0, 0.0, 0.0)) < 1e-3);
    }
}
