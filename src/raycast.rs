use crate::geometry::{GeometryDatabase, ItemRef};
use crate::selection::SelectionMode;
use glam::Vec3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction: direction.normalize_or_zero() }
    }

    /// Ray from `origin` through `target`.
    pub fn towards(origin: Vec3, target: Vec3) -> Self {
        Self::new(origin, target - origin)
    }

    pub fn at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }

    /// Closest approach between the ray and segment `a..b`:
    /// `(distance along ray, segment parameter, gap between the two closest points)`.
    pub fn closest_to_segment(&self, a: Vec3, b: Vec3) -> (f32, f32, f32) {
        let d1 = self.direction;
        let d2 = b - a;
        let r = self.origin - a;
        let e = d2.length_squared();
        let f = d2.dot(r);
        let c = d1.dot(r);
        let bb = d1.dot(d2);
        let denom = e - bb * bb;
        let mut s = if denom.abs() > 1e-6 { ((bb * f - c * e) / denom).max(0.0) } else { 0.0 };
        let mut u = if e > f32::EPSILON { (bb * s + f) / e } else { 0.0 };
        if u < 0.0 {
            u = 0.0;
            s = (-c).max(0.0);
        } else if u > 1.0 {
            u = 1.0;
            s = (bb - c).max(0.0);
        }
        let gap = self.at(s).distance(a + d2 * u);
        (s, u, gap)
    }

    pub fn intersect_plane(&self, origin: Vec3, normal: Vec3) -> Option<Vec3> {
        let denom = normal.dot(self.direction);
        if denom.abs() < 1e-6 {
            return None;
        }
        let t = normal.dot(origin - self.origin) / denom;
        (t >= 0.0).then(|| self.at(t))
    }
}

/// Per-input-type hit-test tolerances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RaycasterParams {
    pub line_threshold: f32,
    pub points_threshold: f32,
}

impl Default for RaycasterParams {
    fn default() -> Self {
        Self { line_threshold: 0.1, points_threshold: 0.1 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub item: ItemRef,
    pub distance: f32,
    pub point: Vec3,
}

/// Everything under `ray` that `mode` accepts, nearest first. Edges win ties with the
/// solid faces they bound.
pub fn intersect(db: &GeometryDatabase, ray: &Ray, params: &RaycasterParams, mode: SelectionMode) -> Vec<Hit> {
    let mut hits = Vec::new();
    if mode.contains(SelectionMode::CURVE_EDGE) {
        for edge in db.edges() {
            let best = edge
                .curve
                .segments()
                .map(|(a, b)| {
                    let (s, _, gap) = ray.closest_to_segment(a, b);
                    (s, gap)
                })
                .filter(|(_, gap)| *gap <= params.line_threshold)
                .min_by(|x, y| x.0.total_cmp(&y.0));
            if let Some((s, _)) = best {
                hits.push(Hit { item: ItemRef::Edge(edge.id), distance: s, point: ray.at(s) });
            }
        }
    }
    if mode.contains(SelectionMode::SOLID) {
        for solid in db.solids() {
            if let Some((t, point)) = ray_aabb_intersection(ray.origin, ray.direction, solid.min, solid.max) {
                hits.push(Hit { item: ItemRef::Solid(solid.id), distance: t, point });
            }
        }
    }
    let bias = |hit: &Hit| match hit.item {
        ItemRef::Edge(_) => hit.distance - params.line_threshold,
        ItemRef::Solid(_) => hit.distance,
    };
    hits.sort_by(|a, b| bias(a).total_cmp(&bias(b)));
    hits
}

pub fn ray_aabb_intersection(origin: Vec3, dir: Vec3, min: Vec3, max: Vec3) -> Option<(f32, Vec3)> {
    let mut t_min: f32 = 0.0;
    let mut t_max: f32 = f32::INFINITY;
    for axis in 0..3 {
        let (o, d) = (origin[axis], dir[axis]);
        if d.abs() < 1e-6 {
            if o < min[axis] || o > max[axis] {
                return None;
            }
            continue;
        }
        let inv_d = 1.0 / d;
        let mut t1 = (min[axis] - o) * inv_d;
        let mut t2 = (max[axis] - o) * inv_d;
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        t_min = t_min.max(t1);
        t_max = t_max.min(t2);
        if t_min > t_max {
            return None;
        }
    }
    if t_max < 0.0 {
        return None;
    }
    let t_hit = if t_min >= 0.0 { t_min } else { t_max };
    Some((t_hit, origin + dir * t_hit))
}
