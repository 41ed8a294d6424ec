//! Constructive solid geometry on BSP trees.
//!
//! A [`Solid`] is a soup of convex polygons with outward facing planes. Union
//! and subtraction clip the polygons of each operand against a BSP tree built
//! from the other one and merge what survives. Both operations consume their
//! operands, so intermediates of a chain of unions are released as soon as the
//! step using them finishes.
//!
//! All math runs in `f64`; meshes go in and come out as `f32` [`MeshData`].

use std::mem;

use cgmath::{InnerSpace, Vector2, Vector3};

use crate::data_structures::{
    instance::Instance,
    model::{MeshData, ModelVertex},
};

/// Tolerance used to decide whether a point lies on a plane.
const EPSILON: f64 = 1e-5;

const COPLANAR: u8 = 0;
const FRONT: u8 = 1;
const BACK: u8 = 2;
const SPANNING: u8 = 3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CsgVertex {
    pub pos: Vector3<f64>,
    pub normal: Vector3<f64>,
    pub uv: Vector2<f64>,
}

impl CsgVertex {
    fn flip(&mut self) {
        self.normal = -self.normal;
    }

    fn interpolate(&self, other: &CsgVertex, t: f64) -> CsgVertex {
        CsgVertex {
            pos: self.pos + (other.pos - self.pos) * t,
            normal: self.normal + (other.normal - self.normal) * t,
            uv: self.uv + (other.uv - self.uv) * t,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Plane {
    normal: Vector3<f64>,
    w: f64,
}

impl Plane {
    fn from_points(a: Vector3<f64>, b: Vector3<f64>, c: Vector3<f64>) -> Option<Plane> {
        let n = (b - a).cross(c - a);
        if n.magnitude2() < EPSILON * EPSILON * EPSILON {
            return None;
        }
        let normal = n.normalize();
        Some(Plane {
            normal,
            w: normal.dot(a),
        })
    }

    fn flip(&mut self) {
        self.normal = -self.normal;
        self.w = -self.w;
    }

    fn classify(&self, point: Vector3<f64>) -> u8 {
        let t = self.normal.dot(point) - self.w;
        if t < -EPSILON {
            BACK
        } else if t > EPSILON {
            FRONT
        } else {
            COPLANAR
        }
    }

    /// Sorts `polygon` into one of the four lists, splitting it when it
    /// spans the plane.
    fn split_polygon(
        &self,
        polygon: Polygon,
        coplanar_front: &mut Vec<Polygon>,
        coplanar_back: &mut Vec<Polygon>,
        front: &mut Vec<Polygon>,
        back: &mut Vec<Polygon>,
    ) {
        let types: Vec<u8> = polygon
            .vertices
            .iter()
            .map(|v| self.classify(v.pos))
            .collect();
        let polygon_type = types.iter().fold(COPLANAR, |acc, t| acc | t);

        match polygon_type {
            COPLANAR => {
                if self.normal.dot(polygon.plane.normal) > 0.0 {
                    coplanar_front.push(polygon);
                } else {
                    coplanar_back.push(polygon);
                }
            }
            FRONT => front.push(polygon),
            BACK => back.push(polygon),
            _ => {
                let n = polygon.vertices.len();
                let mut f = Vec::with_capacity(n + 1);
                let mut b = Vec::with_capacity(n + 1);
                for i in 0..n {
                    let j = (i + 1) % n;
                    let (ti, tj) = (types[i], types[j]);
                    let (vi, vj) = (&polygon.vertices[i], &polygon.vertices[j]);
                    if ti != BACK {
                        f.push(*vi);
                    }
                    if ti != FRONT {
                        b.push(*vi);
                    }
                    if ti | tj == SPANNING {
                        let t = (self.w - self.normal.dot(vi.pos))
                            / self.normal.dot(vj.pos - vi.pos);
                        let v = vi.interpolate(vj, t);
                        f.push(v);
                        b.push(v);
                    }
                }
                if f.len() >= 3 {
                    front.push(Polygon {
                        vertices: f,
                        plane: polygon.plane,
                    });
                }
                if b.len() >= 3 {
                    back.push(Polygon {
                        vertices: b,
                        plane: polygon.plane,
                    });
                }
            }
        }
    }
}

/// A convex planar polygon.
#[derive(Clone, Debug, PartialEq)]
pub struct Polygon {
    vertices: Vec<CsgVertex>,
    plane: Plane,
}

impl Polygon {
    /// `None` for degenerate input (fewer than three vertices or collinear points).
    pub fn new(vertices: Vec<CsgVertex>) -> Option<Polygon> {
        if vertices.len() < 3 {
            return None;
        }
        let plane = Plane::from_points(vertices[0].pos, vertices[1].pos, vertices[2].pos)?;
        Some(Polygon { vertices, plane })
    }

    fn flip(&mut self) {
        self.vertices.reverse();
        self.vertices.iter_mut().for_each(CsgVertex::flip);
        self.plane.flip();
    }
}

#[derive(Debug, Default)]
struct Node {
    plane: Option<Plane>,
    front: Option<Box<Node>>,
    back: Option<Box<Node>>,
    polygons: Vec<Polygon>,
}

impl Node {
    fn new(polygons: Vec<Polygon>) -> Node {
        let mut node = Node::default();
        node.build(polygons);
        node
    }

    /// Turns solid space into empty space and vice versa.
    fn invert(&mut self) {
        self.polygons.iter_mut().for_each(Polygon::flip);
        if let Some(plane) = self.plane.as_mut() {
            plane.flip();
        }
        if let Some(front) = self.front.as_mut() {
            front.invert();
        }
        if let Some(back) = self.back.as_mut() {
            back.invert();
        }
        mem::swap(&mut self.front, &mut self.back);
    }

    /// Removes the parts of `polygons` that are inside this tree.
    fn clip_polygons(&self, polygons: Vec<Polygon>) -> Vec<Polygon> {
        let Some(plane) = self.plane else {
            return polygons;
        };
        let mut coplanar_front = Vec::new();
        let mut coplanar_back = Vec::new();
        let mut front = Vec::new();
        let mut back = Vec::new();
        for polygon in polygons {
            plane.split_polygon(
                polygon,
                &mut coplanar_front,
                &mut coplanar_back,
                &mut front,
                &mut back,
            );
        }
        front.append(&mut coplanar_front);
        back.append(&mut coplanar_back);

        let mut front = match &self.front {
            Some(node) => node.clip_polygons(front),
            None => front,
        };
        let mut back = match &self.back {
            Some(node) => node.clip_polygons(back),
            None => Vec::new(),
        };
        front.append(&mut back);
        front
    }

    /// Removes the parts of this tree's polygons that are inside `bsp`.
    fn clip_to(&mut self, bsp: &Node) {
        self.polygons = bsp.clip_polygons(mem::take(&mut self.polygons));
        if let Some(front) = self.front.as_mut() {
            front.clip_to(bsp);
        }
        if let Some(back) = self.back.as_mut() {
            back.clip_to(bsp);
        }
    }

    fn all_polygons(&self) -> Vec<Polygon> {
        let mut polygons = self.polygons.clone();
        if let Some(front) = &self.front {
            polygons.append(&mut front.all_polygons());
        }
        if let Some(back) = &self.back {
            polygons.append(&mut back.all_polygons());
        }
        polygons
    }

    fn build(&mut self, polygons: Vec<Polygon>) {
        let Some(first) = polygons.first() else {
            return;
        };
        let plane = *self.plane.get_or_insert(first.plane);
        let mut coplanar_front = Vec::new();
        let mut coplanar_back = Vec::new();
        let mut front = Vec::new();
        let mut back = Vec::new();
        for polygon in polygons {
            plane.split_polygon(
                polygon,
                &mut coplanar_front,
                &mut coplanar_back,
                &mut front,
                &mut back,
            );
        }
        self.polygons.append(&mut coplanar_front);
        self.polygons.append(&mut coplanar_back);
        if !front.is_empty() {
            self.front.get_or_insert_with(Default::default).build(front);
        }
        if !back.is_empty() {
            self.back.get_or_insert_with(Default::default).build(back);
        }
    }
}

/// A closed solid described by its boundary polygons.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Solid {
    polygons: Vec<Polygon>,
}

impl Solid {
    /// Bakes `transform` into the triangles of `mesh`. Degenerate triangles are dropped.
    pub fn from_mesh(mesh: &MeshData, transform: &Instance) -> Self {
        let to_csg = |v: &ModelVertex| {
            let p = transform.transform_point(v.position.into());
            let n = transform.rotation * cgmath::Vector3::from(v.normal);
            CsgVertex {
                pos: p.cast().unwrap_or(Vector3::new(0.0, 0.0, 0.0)),
                normal: n.cast().unwrap_or(Vector3::new(0.0, 0.0, 0.0)),
                uv: Vector2::new(v.tex_coords[0] as f64, v.tex_coords[1] as f64),
            }
        };
        let polygons = mesh
            .indices
            .chunks_exact(3)
            .filter_map(|tri| {
                Polygon::new(
                    tri.iter()
                        .map(|&i| to_csg(&mesh.vertices[i as usize]))
                        .collect(),
                )
            })
            .collect();
        Self { polygons }
    }

    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Everything inside `self` or `other`.
    pub fn union(self, other: Solid) -> Solid {
        let mut a = Node::new(self.polygons);
        let mut b = Node::new(other.polygons);
        a.clip_to(&b);
        b.clip_to(&a);
        b.invert();
        b.clip_to(&a);
        b.invert();
        a.build(b.all_polygons());
        Solid {
            polygons: a.all_polygons(),
        }
    }

    /// Everything inside `self` but not inside `other`.
    pub fn subtract(self, other: Solid) -> Solid {
        let mut a = Node::new(self.polygons);
        let mut b = Node::new(other.polygons);
        a.invert();
        a.clip_to(&b);
        b.clip_to(&a);
        b.invert();
        b.clip_to(&a);
        b.invert();
        a.build(b.all_polygons());
        a.invert();
        Solid {
            polygons: a.all_polygons(),
        }
    }

    /// Fan-triangulates every polygon. Vertices are not shared between polygons
    /// so each face keeps its own normals and texture coordinates.
    pub fn to_mesh(&self, name: &str) -> MeshData {
        let mut vertices = Vec::new();
        let mut indices = Vec::new();
        for polygon in &self.polygons {
            let base = vertices.len() as u32;
            vertices.extend(polygon.vertices.iter().map(|v| {
                let normal = if v.normal.magnitude2() > 0.0 {
                    v.normal.normalize()
                } else {
                    polygon.plane.normal
                };
                ModelVertex {
                    position: [v.pos.x as f32, v.pos.y as f32, v.pos.z as f32],
                    tex_coords: [v.uv.x as f32, v.uv.y as f32],
                    normal: [normal.x as f32, normal.y as f32, normal.z as f32],
                }
            }));
            for i in 1..polygon.vertices.len() as u32 - 1 {
                indices.extend_from_slice(&[base, base + i, base + i + 1]);
            }
        }
        log::debug!(
            "CSG mesh {} has {} polygons, {} triangles",
            name,
            self.polygons.len(),
            indices.len() / 3
        );
        MeshData::new(name, vertices, indices)
    }
}
