//! Minimal object model standing in for the geometry kernel: solids bounded by boxes, with
//! polyline edges and a creator history.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SolidId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemRef {
    Solid(SolidId),
    Edge(EdgeId),
}

impl ItemRef {
    pub fn as_edge(self) -> Option<EdgeId> {
        match self {
            ItemRef::Edge(id) => Some(id),
            ItemRef::Solid(_) => None,
        }
    }

    pub fn as_solid(self) -> Option<SolidId> {
        match self {
            ItemRef::Solid(id) => Some(id),
            ItemRef::Edge(_) => None,
        }
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemRef::Solid(id) => write!(f, "solid#{}", id.0),
            ItemRef::Edge(id) => write!(f, "edge#{}", id.0),
        }
    }
}

/// Polyline parameterised by normalised arc length in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub points: Vec<Vec3>,
}

impl Curve {
    pub fn line(start: Vec3, end: Vec3) -> Self {
        Self { points: vec![start, end] }
    }

    pub fn start(&self) -> Vec3 {
        self.points.first().copied().unwrap_or(Vec3::ZERO)
    }

    pub fn end(&self) -> Vec3 {
        self.points.last().copied().unwrap_or(Vec3::ZERO)
    }

    pub fn segments(&self) -> impl Iterator<Item = (Vec3, Vec3)> + '_ {
        self.points.windows(2).map(|pair| (pair[0], pair[1]))
    }

    pub fn length(&self) -> f32 {
        self.segments().map(|(a, b)| a.distance(b)).sum()
    }

    pub fn point_at(&self, t: f32) -> Vec3 {
        let total = self.length();
        if total <= f32::EPSILON {
            return self.start();
        }
        let mut remaining = t.clamp(0.0, 1.0) * total;
        for (a, b) in self.segments() {
            let len = a.distance(b);
            if remaining <= len {
                return a.lerp(b, if len > 0.0 { remaining / len } else { 0.0 });
            }
            remaining -= len;
        }
        self.end()
    }

    /// Nearest point on the curve to `point`, with its normalised parameter.
    pub fn closest_point(&self, point: Vec3) -> (f32, Vec3) {
        let total = self.length();
        let mut best = (f32::INFINITY, 0.0, self.start());
        let mut travelled = 0.0;
        for (a, b) in self.segments() {
            let ab = b - a;
            let len = ab.length();
            let s = if len > 0.0 { ((point - a).dot(ab) / (len * len)).clamp(0.0, 1.0) } else { 0.0 };
            let candidate = a + ab * s;
            let distance = candidate.distance_squared(point);
            if distance < best.0 {
                let t = if total > 0.0 { (travelled + s * len) / total } else { 0.0 };
                best = (distance, t, candidate);
            }
            travelled += len;
        }
        (best.1, best.2)
    }

    pub fn bounds(&self) -> (Vec3, Vec3) {
        self.points
            .iter()
            .fold((Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY)), |(min, max), p| {
                (min.min(*p), max.max(*p))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveEdge {
    pub id: EdgeId,
    pub solid: SolidId,
    pub name: String,
    pub curve: Curve,
}

/// Tag of the operation that produced a solid or modified it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CreatorKind {
    ElementarySolid,
    CurveExtrusion,
    Revolution,
    Fillet,
    Chamfer,
    Boolean,
    Symmetry,
    Imported,
}

impl CreatorKind {
    pub fn name(self) -> &'static str {
        match self {
            CreatorKind::ElementarySolid => "ElementarySolid",
            CreatorKind::CurveExtrusion => "CurveExtrusion",
            CreatorKind::Revolution => "Revolution",
            CreatorKind::Fillet => "Fillet",
            CreatorKind::Chamfer => "Chamfer",
            CreatorKind::Boolean => "Boolean",
            CreatorKind::Symmetry => "Symmetry",
            CreatorKind::Imported => "Imported",
        }
    }

    pub fn dasherized(self) -> &'static str {
        match self {
            CreatorKind::ElementarySolid => "elementary-solid",
            CreatorKind::CurveExtrusion => "curve-extrusion",
            CreatorKind::Revolution => "revolution",
            CreatorKind::Fillet => "fillet",
            CreatorKind::Chamfer => "chamfer",
            CreatorKind::Boolean => "boolean",
            CreatorKind::Symmetry => "symmetry",
            CreatorKind::Imported => "imported",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Creator {
    pub kind: CreatorKind,
    #[serde(default)]
    pub parameters: BTreeMap<String, f32>,
}

impl Creator {
    pub fn new(kind: CreatorKind) -> Self {
        Self { kind, parameters: BTreeMap::new() }
    }

    pub fn with(mut self, key: &str, value: f32) -> Self {
        self.parameters.insert(key.to_string(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeShape {
    pub name: String,
    pub curve: Curve,
}

/// Kernel-independent description of a solid, used for previews and exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolidShape {
    pub name: String,
    pub min: Vec3,
    pub max: Vec3,
    pub edges: Vec<EdgeShape>,
    #[serde(default)]
    pub creators: Vec<Creator>,
}

impl SolidShape {
    /// Axis-aligned box with its twelve edges.
    pub fn cuboid(name: impl Into<String>, min: Vec3, max: Vec3) -> Self {
        let corner = |x: bool, y: bool, z: bool| {
            Vec3::new(
                if x { max.x } else { min.x },
                if y { max.y } else { min.y },
                if z { max.z } else { min.z },
            )
        };
        let mut edges = Vec::with_capacity(12);
        for (axis, label) in ["x", "y", "z"].iter().enumerate() {
            for i in 0..4 {
                let (p, q) = (i & 1 == 1, i & 2 == 2);
                let (a, b) = match axis {
                    0 => (corner(false, p, q), corner(true, p, q)),
                    1 => (corner(p, false, q), corner(p, true, q)),
                    _ => (corner(p, q, false), corner(p, q, true)),
                };
                edges.push(EdgeShape { name: format!("{label}{i}"), curve: Curve::line(a, b) });
            }
        }
        Self {
            name: name.into(),
            min,
            max,
            edges,
            creators: vec![Creator::new(CreatorKind::ElementarySolid)],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solid {
    pub id: SolidId,
    pub name: String,
    pub min: Vec3,
    pub max: Vec3,
    pub edges: Vec<EdgeId>,
    pub creators: Vec<Creator>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeometryModel {
    pub solids: Vec<SolidShape>,
}

/// Uncommitted preview owned by a factory.
#[derive(Debug, Clone, PartialEq)]
pub struct PhantomObject {
    pub owner: &'static str,
    pub replaces: Option<SolidId>,
    pub shape: SolidShape,
}

/// Committed solids and edges plus the phantom previews currently on display.
///
/// The database never dispatches signals; callers announce changes after they release
/// their borrow.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryDatabase {
    solids: BTreeMap<SolidId, Solid>,
    edges: BTreeMap<EdgeId, CurveEdge>,
    phantoms: Vec<PhantomObject>,
    next_solid: u32,
    next_edge: u32,
}

impl GeometryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_shape(&mut self, shape: SolidShape) -> SolidId {
        self.next_solid += 1;
        let id = SolidId(self.next_solid);
        let mut edge_ids = Vec::with_capacity(shape.edges.len());
        for edge in shape.edges {
            self.next_edge += 1;
            let edge_id = EdgeId(self.next_edge);
            self.edges.insert(edge_id, CurveEdge { id: edge_id, solid: id, name: edge.name, curve: edge.curve });
            edge_ids.push(edge_id);
        }
        self.solids.insert(
            id,
            Solid { id, name: shape.name, min: shape.min, max: shape.max, edges: edge_ids, creators: shape.creators },
        );
        id
    }

    pub fn remove_solid(&mut self, id: SolidId) -> Option<SolidShape> {
        let solid = self.solids.remove(&id)?;
        let edges = solid
            .edges
            .iter()
            .filter_map(|edge| self.edges.remove(edge))
            .map(|edge| EdgeShape { name: edge.name, curve: edge.curve })
            .collect();
        Some(SolidShape { name: solid.name, min: solid.min, max: solid.max, edges, creators: solid.creators })
    }

    pub fn solid(&self, id: SolidId) -> Option<&Solid> {
        self.solids.get(&id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&CurveEdge> {
        self.edges.get(&id)
    }

    pub fn contains(&self, item: ItemRef) -> bool {
        match item {
            ItemRef::Solid(id) => self.solids.contains_key(&id),
            ItemRef::Edge(id) => self.edges.contains_key(&id),
        }
    }

    pub fn solids(&self) -> impl Iterator<Item = &Solid> {
        self.solids.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &CurveEdge> {
        self.edges.values()
    }

    pub fn edges_of(&self, solid: SolidId) -> Vec<&CurveEdge> {
        self.solids
            .get(&solid)
            .map(|s| s.edges.iter().filter_map(|id| self.edges.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn solid_count(&self) -> usize {
        self.solids.len()
    }

    /// Items the base render pass draws.
    pub fn scene_items(&self) -> Vec<ItemRef> {
        self.solids
            .values()
            .flat_map(|solid| {
                std::iter::once(ItemRef::Solid(solid.id)).chain(solid.edges.iter().map(|e| ItemRef::Edge(*e)))
            })
            .collect()
    }

    pub fn solid_shape(&self, id: SolidId) -> Option<SolidShape> {
        self.solids.get(&id).map(|solid| self.shape_of(solid))
    }

    fn shape_of(&self, solid: &Solid) -> SolidShape {
        SolidShape {
            name: solid.name.clone(),
            min: solid.min,
            max: solid.max,
            edges: solid
                .edges
                .iter()
                .filter_map(|id| self.edges.get(id))
                .map(|edge| EdgeShape { name: edge.name.clone(), curve: edge.curve.clone() })
                .collect(),
            creators: solid.creators.clone(),
        }
    }

    pub fn export_model(&self) -> GeometryModel {
        GeometryModel { solids: self.solids.values().map(|solid| self.shape_of(solid)).collect() }
    }

    /// Appends every solid of `model`, returning the new ids in model order.
    pub fn load(&mut self, model: GeometryModel) -> Vec<SolidId> {
        model.solids.into_iter().map(|shape| self.add_shape(shape)).collect()
    }

    /// Replaces the phantoms owned by `owner`.
    pub fn set_phantoms(&mut self, owner: &'static str, phantoms: Vec<PhantomObject>) {
        self.phantoms.retain(|phantom| phantom.owner != owner);
        self.phantoms.extend(phantoms);
    }

    pub fn clear_phantoms(&mut self, owner: &'static str) -> usize {
        let before = self.phantoms.len();
        self.phantoms.retain(|phantom| phantom.owner != owner);
        before - self.phantoms.len()
    }

    pub fn phantoms(&self) -> &[PhantomObject] {
        &self.phantoms
    }
}
