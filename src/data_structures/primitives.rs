//! Builders for the primitive shapes the card is made of.
//!
//! All shapes are centred on the origin, wound counter-clockwise when seen
//! from outside, and use texture coordinates with `v = 0` on the top row of
//! the image.

use std::f32::consts::TAU;

use cgmath::Vector3;

use crate::data_structures::model::{MeshData, ModelVertex};

/// Segments around a cylinder when no tessellation is given.
pub const DEFAULT_TESSELLATION: u32 = 24;

/// An axis aligned box of `width` (x), `height` (y) and `depth` (z).
pub fn create_box(name: &str, width: f32, height: f32, depth: f32) -> MeshData {
    let half = Vector3::new(width / 2.0, height / 2.0, depth / 2.0);
    let mul = |a: Vector3<f32>, b: Vector3<f32>| Vector3::new(a.x * b.x, a.y * b.y, a.z * b.z);
    // (normal, u, v) with u x v = normal
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];
    let corners = [(-1.0, -1.0, [0.0, 1.0]), (1.0, -1.0, [1.0, 1.0]), (1.0, 1.0, [1.0, 0.0]), (-1.0, 1.0, [0.0, 0.0])];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, u, v) in faces {
        let (n, u, v) = (Vector3::from(normal), Vector3::from(u), Vector3::from(v));
        let base = vertices.len() as u32;
        for (su, sv, uv) in corners {
            let position = mul(n, half) + mul(u, half) * su + mul(v, half) * sv;
            vertices.push(ModelVertex {
                position: position.into(),
                tex_coords: uv,
                normal,
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    MeshData::new(name, vertices, indices)
}

/// A capped cylinder along the y axis.
pub fn create_cylinder(name: &str, height: f32, diameter: f32, tessellation: u32) -> MeshData {
    let tessellation = tessellation.max(3);
    let radius = diameter / 2.0;
    let top = height / 2.0;
    let ring = |i: u32| {
        let angle = TAU * i as f32 / tessellation as f32;
        (angle.cos(), angle.sin())
    };

    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    // side, with a duplicated seam column so u runs from 0 to 1
    for i in 0..=tessellation {
        let (c, s) = ring(i);
        let u = i as f32 / tessellation as f32;
        let normal = [c, 0.0, s];
        vertices.push(ModelVertex {
            position: [radius * c, -top, radius * s],
            tex_coords: [u, 1.0],
            normal,
        });
        vertices.push(ModelVertex {
            position: [radius * c, top, radius * s],
            tex_coords: [u, 0.0],
            normal,
        });
    }
    for i in 0..tessellation {
        let bottom = 2 * i;
        let (top_i, bottom_next, top_next) = (bottom + 1, bottom + 2, bottom + 3);
        indices.extend_from_slice(&[bottom, top_next, bottom_next, bottom, top_i, top_next]);
    }

    for (y, normal_y) in [(top, 1.0f32), (-top, -1.0)] {
        let center = vertices.len() as u32;
        vertices.push(ModelVertex {
            position: [0.0, y, 0.0],
            tex_coords: [0.5, 0.5],
            normal: [0.0, normal_y, 0.0],
        });
        for i in 0..tessellation {
            let (c, s) = ring(i);
            vertices.push(ModelVertex {
                position: [radius * c, y, radius * s],
                tex_coords: [0.5 + c / 2.0, 0.5 + s / 2.0],
                normal: [0.0, normal_y, 0.0],
            });
        }
        for i in 0..tessellation {
            let current = center + 1 + i;
            let next = center + 1 + (i + 1) % tessellation;
            if normal_y > 0.0 {
                indices.extend_from_slice(&[center, next, current]);
            } else {
                indices.extend_from_slice(&[center, current, next]);
            }
        }
    }
    MeshData::new(name, vertices, indices)
}

/// A `width` x `height` quad in the xy plane facing -z.
pub fn create_plane(name: &str, width: f32, height: f32) -> MeshData {
    let (hw, hh) = (width / 2.0, height / 2.0);
    let normal = [0.0, 0.0, -1.0];
    let vertex = |position: [f32; 3], tex_coords: [f32; 2]| ModelVertex {
        position,
        tex_coords,
        normal,
    };
    MeshData::new(
        name,
        vec![
            vertex([-hw, -hh, 0.0], [0.0, 1.0]),
            vertex([hw, -hh, 0.0], [1.0, 1.0]),
            vertex([hw, hh, 0.0], [1.0, 0.0]),
            vertex([-hw, hh, 0.0], [0.0, 0.0]),
        ],
        vec![0, 2, 1, 0, 3, 2],
    )
}
