use crate::geometry::{Curve, CurveEdge, EdgeId};
use crate::raycast::{ray_aabb_intersection, Ray};
use glam::Vec3;

struct Entry {
    edge: EdgeId,
    name: String,
    curve: Curve,
    min: Vec3,
    max: Vec3,
}

/// A restricted-pick hit: the edge, its curve model and the nearest point on it.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeMatch {
    pub edge: EdgeId,
    pub name: String,
    pub model: Curve,
    pub point: Vec3,
    pub distance: f32,
}

impl EdgeMatch {
    /// Normalised parameter of `point` projected onto the matched edge.
    pub fn t(&self, point: Vec3) -> f32 {
        self.model.closest_point(point).0
    }
}

/// Fixed set of candidate edges a restricted pick may land on.
pub struct EdgeIndex {
    entries: Vec<Entry>,
}

impl EdgeIndex {
    pub fn build<'a>(edges: impl IntoIterator<Item = &'a CurveEdge>) -> Self {
        let entries = edges
            .into_iter()
            .map(|edge| {
                let (min, max) = edge.curve.bounds();
                Entry { edge: edge.id, name: edge.name.clone(), curve: edge.curve.clone(), min, max }
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn edges(&self) -> Vec<EdgeId> {
        self.entries.iter().map(|entry| entry.edge).collect()
    }

    /// Candidate passing within `threshold` of the ray, nearest to the ray origin.
    ///
    /// One bounds test and one segment scan per candidate; the cost does not depend on
    /// `threshold` or on how small the edges are.
    pub fn raycast(&self, ray: &Ray, threshold: f32) -> Option<EdgeMatch> {
        let pad = Vec3::splat(threshold);
        self.entries
            .iter()
            .filter(|entry| ray_aabb_intersection(ray.origin, ray.direction, entry.min - pad, entry.max + pad).is_some())
            .filter_map(|entry| {
                entry
                    .curve
                    .segments()
                    .map(|(a, b)| {
                        let (s, u, gap) = ray.closest_to_segment(a, b);
                        (s, a.lerp(b, u), gap)
                    })
                    .filter(|(_, _, gap)| *gap <= threshold)
                    .min_by(|x, y| x.0.total_cmp(&y.0))
                    .map(|(s, point, gap)| (entry, s, point, gap))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(entry, _, point, distance)| EdgeMatch {
                edge: entry.edge,
                name: entry.name.clone(),
                model: entry.curve.clone(),
                point,
                distance,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::SolidId;

    fn edge(id: u32, a: Vec3, b: Vec3) -> CurveEdge {
        CurveEdge { id: EdgeId(id), solid: SolidId(1), name: format!("e{id}"), curve: Curve::line(a, b) }
    }

    #[test]
    fn raycast_only_matches_indexed_edges() {
        let edges = [edge(1, Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0)), edge(2, Vec3::new(0.0, 4.0, 0.0), Vec3::new(4.0, 4.0, 0.0))];
        let index = EdgeIndex::build(edges.iter());
        let ray = Ray::towards(Vec3::new(1.0, 0.02, 10.0), Vec3::new(1.0, 0.02, 0.0));
        let hit = index.raycast(&ray, 0.1).map(|m| (m.edge, m.t(m.point)));
        assert!(matches!(hit, Some((EdgeId(1), t)) if (t - 0.25).abs() < 1e-4));
        let miss = Ray::towards(Vec3::new(1.0, 2.0, 10.0), Vec3::new(1.0, 2.0, 0.0));
        assert!(index.raycast(&miss, 0.1).is_none());
    }

    #[test]
    fn tiny_edge_with_wide_threshold_is_matched_directly() {
        let edges = [edge(7, Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.02, 0.0, 0.0))];
        let index = EdgeIndex::build(edges.iter());
        let ray = Ray::towards(Vec3::new(0.01, 0.0, 5.0), Vec3::new(0.01, 0.0, 0.0));
        for threshold in [0.3, 1.0, 10.0] {
            let hit = index.raycast(&ray, threshold).expect("ray crosses the edge");
            assert_eq!(hit.edge, EdgeId(7));
            assert!(hit.distance < 1e-4);
        }
    }

    #[test]
    fn nearest_candidate_along_the_ray_wins() {
        let edges = [
            edge(1, Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0)),
            edge(2, Vec3::new(0.0, 0.0, 2.0), Vec3::new(1.0, 0.0, 2.0)),
        ];
        let index = EdgeIndex::build(edges.iter());
        let ray = Ray::towards(Vec3::new(0.5, 0.0, 10.0), Vec3::new(0.5, 0.0, 0.0));
        assert_eq!(index.raycast(&ray, 0.05).map(|hit| hit.edge), Some(EdgeId(2)));
        assert!(EdgeIndex::build(std::iter::empty()).raycast(&ray, 1.0).is_none());
    }
}
