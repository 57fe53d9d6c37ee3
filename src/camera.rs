use crate::config::ViewportConfig;
use crate::raycast::Ray;
use glam::{Mat4, Quat, UVec2, Vec2, Vec3, Vec4};

/// Preset viewpoints a viewport can be opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    ThreeD,
    Top,
    Right,
    Front,
}

impl ViewKind {
    /// Normal of the construction plane the view starts with.
    pub fn plane_normal(self) -> Vec3 {
        match self {
            ViewKind::ThreeD | ViewKind::Top => Vec3::Z,
            ViewKind::Right => Vec3::X,
            ViewKind::Front => Vec3::Y,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ViewKind::ThreeD => "3d",
            ViewKind::Top => "top",
            ViewKind::Right => "right",
            ViewKind::Front => "front",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective { fov_y_radians: f32 },
    Orthographic { frustum_size: f32, zoom: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewportCamera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub projection: Projection,
    pub near: f32,
    pub far: f32,
    pub rotation_enabled: bool,
}

impl ViewportCamera {
    pub fn for_view(kind: ViewKind, config: &ViewportConfig) -> Self {
        let ortho = Projection::Orthographic { frustum_size: config.frustum_size, zoom: config.ortho_zoom };
        let (position, up, projection, rotation_enabled) = match kind {
            ViewKind::ThreeD => (
                Vec3::new(100.0, -100.0, 100.0),
                Vec3::Z,
                Projection::Perspective { fov_y_radians: 50.0_f32.to_radians() },
                true,
            ),
            ViewKind::Top => (Vec3::new(0.0, 0.0, 10.0), Vec3::Y, ortho, false),
            ViewKind::Right => (Vec3::new(10.0, 0.0, 0.0), Vec3::Z, ortho, false),
            ViewKind::Front => (Vec3::new(0.0, 10.0, 0.0), Vec3::Z, ortho, false),
        };
        Self { position, target: Vec3::ZERO, up, projection, near: config.near, far: config.far, rotation_enabled }
    }

    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or_zero()
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        let aspect = aspect.max(0.0001);
        match self.projection {
            Projection::Perspective { fov_y_radians } => Mat4::perspective_rh_gl(fov_y_radians, aspect, self.near, self.far),
            Projection::Orthographic { frustum_size, zoom } => {
                let half_h = frustum_size / zoom.max(0.0001) * 0.5;
                let half_w = half_h * aspect;
                Mat4::orthographic_rh_gl(-half_w, half_w, -half_h, half_h, self.near, self.far)
            }
        }
    }

    pub fn view_projection(&self, size: UVec2) -> Mat4 {
        let aspect = if size.y > 0 { size.x as f32 / size.y as f32 } else { 1.0 };
        self.projection_matrix(aspect) * self.view_matrix()
    }

    /// World-space ray through a pixel; works for both projections.
    pub fn screen_ray(&self, screen: Vec2, size: UVec2) -> Option<Ray> {
        if size.x == 0 || size.y == 0 {
            return None;
        }
        let ndc_x = (2.0 * screen.x / size.x as f32) - 1.0;
        let ndc_y = 1.0 - (2.0 * screen.y / size.y as f32);
        let inv = self.view_projection(size).inverse();
        let unproject = |z: f32| {
            let world = inv * Vec4::new(ndc_x, ndc_y, z, 1.0);
            (world.w.abs() > f32::EPSILON).then(|| world.truncate() / world.w)
        };
        let (near, far) = (unproject(-1.0)?, unproject(1.0)?);
        Some(Ray::towards(near, far))
    }

    /// Orbits around the target; ignored for locked orthographic views.
    pub fn orbit(&mut self, delta: Vec2) {
        if !self.rotation_enabled {
            return;
        }
        let offset = self.position - self.target;
        let right = self.forward().cross(self.up).normalize_or_zero();
        let rotation = Quat::from_axis_angle(self.up, -delta.x) * Quat::from_axis_angle(right, -delta.y);
        self.position = self.target + rotation * offset;
    }

    pub fn zoom(&mut self, factor: f32) {
        match &mut self.projection {
            Projection::Orthographic { zoom, .. } => *zoom = (*zoom * factor).clamp(0.01, 1_000.0),
            Projection::Perspective { .. } => {
                let offset = (self.position - self.target) / factor.max(0.0001);
                self.position = self.target + offset;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_view_center_ray_points_down() {
        let camera = ViewportCamera::for_view(ViewKind::Top, &ViewportConfig::default());
        let ray = camera.screen_ray(Vec2::new(640.0, 360.0), UVec2::new(1280, 720)).expect("ray");
        assert!(ray.direction.distance(-Vec3::Z) < 1e-3);
        assert!(ray.origin.truncate().length() < 1e-3);
    }

    #[test]
    fn view_projection_is_finite_for_every_preset() {
        for kind in [ViewKind::ThreeD, ViewKind::Top, ViewKind::Right, ViewKind::Front] {
            let vp = ViewportCamera::for_view(kind, &ViewportConfig::default()).view_projection(UVec2::new(800, 600));
            assert!(vp.to_cols_array().iter().all(|v| v.is_finite()), "{}", kind.label());
        }
    }
}
