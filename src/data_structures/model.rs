//! Meshes and materials, in their CPU form and as uploaded GPU resources.
//!
//! `MeshData` and `StandardMaterial` are plain data produced by the geometry
//! builders and the glTF importer. `Mesh` and `Material` own the wgpu buffers
//! and bind groups created from them.

use wgpu::util::DeviceExt;

use crate::data_structures::{scene_graph::TextureId, texture::Texture};

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 5]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Skinning attributes, one entry per vertex.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SkinWeights {
    pub joints: Vec<[u16; 4]>,
    pub weights: Vec<[f32; 4]>,
}

/// Triangle mesh kept on the CPU.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
    pub skin_weights: Option<SkinWeights>,
}

impl MeshData {
    pub fn new(name: impl Into<String>, vertices: Vec<ModelVertex>, indices: Vec<u32>) -> Self {
        Self {
            name: name.into(),
            vertices,
            indices,
            skin_weights: None,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Axis aligned bounds as `(min, max)`, `None` for an empty mesh.
    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        let first = self.vertices.first()?.position;
        Some(self.vertices.iter().fold((first, first), |(mut min, mut max), v| {
            for axis in 0..3 {
                min[axis] = min[axis].min(v.position[axis]);
                max[axis] = max[axis].max(v.position[axis]);
            }
            (min, max)
        }))
    }

    /// Signed volume enclosed by the triangles. Positive for outward (counter-clockwise) winding.
    pub fn signed_volume(&self) -> f64 {
        self.indices
            .chunks_exact(3)
            .map(|tri| {
                let p = |i: u32| {
                    let v = self.vertices[i as usize].position;
                    cgmath::Vector3::new(v[0] as f64, v[1] as f64, v[2] as f64)
                };
                let (a, b, c) = (p(tri[0]), p(tri[1]), p(tri[2]));
                cgmath::dot(a, b.cross(c)) / 6.0
            })
            .sum()
    }
}

/// Colour values in linear 0..1 RGB.
pub type Color3 = [f32; 3];

/// A Phong-style material: diffuse colour or texture, alpha, specular and emissive terms.
#[derive(Clone, Debug, PartialEq)]
pub struct StandardMaterial {
    pub name: String,
    pub diffuse_color: Color3,
    pub specular_color: Color3,
    pub emissive_color: Color3,
    pub alpha: f32,
    pub diffuse_texture: Option<TextureId>,
    /// Discard fragments whose texture alpha falls below the cutoff instead of blending.
    pub texture_alpha_test: bool,
}

impl StandardMaterial {
    pub const ALPHA_CUTOFF: f32 = 0.4;

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            diffuse_color: [1.0, 1.0, 1.0],
            specular_color: [1.0, 1.0, 1.0],
            emissive_color: [0.0, 0.0, 0.0],
            alpha: 1.0,
            diffuse_texture: None,
            texture_alpha_test: false,
        }
    }

    pub fn with_diffuse(mut self, color: Color3) -> Self {
        self.diffuse_color = color;
        self
    }

    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn needs_blending(&self) -> bool {
        self.alpha < 1.0
    }

    pub(crate) fn to_uniform(&self) -> MaterialUniform {
        let [r, g, b] = self.diffuse_color;
        let [sr, sg, sb] = self.specular_color;
        let [er, eg, eb] = self.emissive_color;
        MaterialUniform {
            diffuse: [r, g, b, self.alpha],
            specular: [sr, sg, sb, 64.0],
            emissive: [er, eg, eb, 0.0],
            alpha_cutoff: if self.texture_alpha_test {
                Self::ALPHA_CUTOFF
            } else {
                0.0
            },
            _padding: [0.0; 3],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct MaterialUniform {
    diffuse: [f32; 4],
    // w holds the specular power
    specular: [f32; 4],
    emissive: [f32; 4],
    alpha_cutoff: f32,
    _padding: [f32; 3],
}

/// GPU side of a `StandardMaterial`.
#[derive(Debug)]
pub struct Material {
    pub name: String,
    pub blend: bool,
    pub uniform: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

impl Material {
    pub fn new(
        device: &wgpu::Device,
        material: &StandardMaterial,
        diffuse_texture: &Texture,
        layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let uniform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Material Buffer", material.name)),
            contents: bytemuck::cast_slice(&[material.to_uniform()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let sampler = diffuse_texture
            .sampler
            .clone()
            .unwrap_or_else(|| crate::data_structures::texture::create_default_sampler(device));
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&diffuse_texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: uniform.as_entire_binding(),
                },
            ],
            label: Some(&material.name),
        });
        Self {
            name: material.name.clone(),
            blend: material.needs_blending(),
            uniform,
            bind_group,
        }
    }
}

/// GPU side of a `MeshData`.
#[derive(Debug)]
pub struct Mesh {
    pub name: String,
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_elements: u32,
}

impl Mesh {
    pub fn new(device: &wgpu::Device, data: &MeshData) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Vertex Buffer", data.name)),
            contents: bytemuck::cast_slice(&data.vertices),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Index Buffer", data.name)),
            contents: bytemuck::cast_slice(&data.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            name: data.name.clone(),
            vertex_buffer,
            index_buffer,
            num_elements: data.indices.len() as u32,
        }
    }
}

pub trait DrawModel<'a> {
    fn draw_mesh_instanced(
        &mut self,
        mesh: &'a Mesh,
        material: &'a Material,
        instances: std::ops::Range<u32>,
        camera_bind_group: &'a wgpu::BindGroup,
        light_bind_group: &'a wgpu::BindGroup,
    );
}

impl<'a, 'b> DrawModel<'b> for wgpu::RenderPass<'a>
where
    'b: 'a,
{
    fn draw_mesh_instanced(
        &mut self,
        mesh: &'b Mesh,
        material: &'b Material,
        instances: std::ops::Range<u32>,
        camera_bind_group: &'b wgpu::BindGroup,
        light_bind_group: &'b wgpu::BindGroup,
    ) {
        self.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        self.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        self.set_bind_group(0, &material.bind_group, &[]);
        self.set_bind_group(1, camera_bind_group, &[]);
        self.set_bind_group(2, light_bind_group, &[]);
        self.draw_indexed(0..mesh.num_elements, 0, instances);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tetrahedron() -> MeshData {
        let v = |p: [f32; 3]| ModelVertex {
            position: p,
            ..Default::default()
        };
        MeshData::new(
            "tetra",
            vec![
                v([0.0, 0.0, 0.0]),
                v([1.0, 0.0, 0.0]),
                v([0.0, 1.0, 0.0]),
                v([0.0, 0.0, 1.0]),
            ],
            vec![0, 2, 1, 0, 1, 3, 0, 3, 2, 1, 2, 3],
        )
    }

    #[test]
    fn outward_tetrahedron_has_positive_volume() {
        let volume = tetrahedron().signed_volume();
        assert!((volume - 1.0 / 6.0).abs() < 1e-9, "{}", volume);
    }

    #[test]
    fn bounds_cover_all_vertices() {
        let (min, max) = tetrahedron().bounds().unwrap();
        assert_eq!(min, [0.0, 0.0, 0.0]);
        assert_eq!(max, [1.0, 1.0, 1.0]);
        assert!(MeshData::default().bounds().is_none());
    }

    #[test]
    fn alpha_test_only_sets_cutoff_when_enabled() {
        let mut material = StandardMaterial::new("m").with_alpha(0.6);
        assert!(material.needs_blending());
        assert_eq!(material.to_uniform().alpha_cutoff, 0.0);
        material.texture_alpha_test = true;
        assert_eq!(
            material.to_uniform().alpha_cutoff,
            StandardMaterial::ALPHA_CUTOFF
        );
    }
}
