use crate::camera::ViewportCamera;
use crate::raycast::Ray;
use glam::Vec3;

/// Plane that unrestricted point picks land on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstructionPlane {
    Fixed { origin: Vec3, normal: Vec3 },
    /// Faces the camera; re-oriented whenever the camera moves.
    Camera { origin: Vec3, normal: Vec3 },
}

impl Default for ConstructionPlane {
    fn default() -> Self {
        ConstructionPlane::Fixed { origin: Vec3::ZERO, normal: Vec3::Z }
    }
}

impl ConstructionPlane {
    pub fn origin(&self) -> Vec3 {
        match self {
            ConstructionPlane::Fixed { origin, .. } | ConstructionPlane::Camera { origin, .. } => *origin,
        }
    }

    pub fn normal(&self) -> Vec3 {
        match self {
            ConstructionPlane::Fixed { normal, .. } | ConstructionPlane::Camera { normal, .. } => *normal,
        }
    }

    pub fn follows_camera(&self) -> bool {
        matches!(self, ConstructionPlane::Camera { .. })
    }

    pub fn update(&mut self, camera: &ViewportCamera) {
        if let ConstructionPlane::Camera { normal, .. } = self {
            *normal = -camera.forward();
        }
    }

    /// Switches between the fixed plane and a camera-facing one through the same origin.
    pub fn toggled(&self, camera: &ViewportCamera, fixed_normal: Vec3) -> Self {
        match *self {
            ConstructionPlane::Fixed { origin, .. } => ConstructionPlane::Camera { origin, normal: -camera.forward() },
            ConstructionPlane::Camera { origin, .. } => ConstructionPlane::Fixed { origin, normal: fixed_normal },
        }
    }

    pub fn intersect(&self, ray: &Ray) -> Option<Vec3> {
        ray.intersect_plane(self.origin(), self.normal())
    }
}
