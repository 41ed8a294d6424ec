//! GPU mirror of a [`SceneGraph`].
//!
//! `GpuScene::sync` uploads whatever was added since the previous frame,
//! moves instances and poses skinned meshes. Textures and materials never
//! change once added, so each is uploaded once. `GpuScene::render` then hands the engine
//! one instanced draw per visible mesh node.

use std::collections::HashMap;

use cgmath::{InnerSpace, Point3};
use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        instance::InstanceRaw,
        model::{Material, Mesh, MeshData},
        scene_graph::{MaterialId, MeshId, NodeId, SceneGraph},
        skin::{joint_matrices, skin_vertices},
        texture::Texture,
    },
    error::SceneError,
    render::{Instanced, Render},
    resources::texture::material_layout,
};

/// Vertex data of a draw. Skinned meshes are posed per skin anchor, so every
/// node sharing a skeleton draws from the same posed buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum MeshSlot {
    Shared(MeshId),
    Skinned(NodeId, MeshId),
}

struct Draw {
    node: NodeId,
    mesh: MeshSlot,
    material: MaterialId,
    blend: bool,
    depth: f32,
}

pub struct GpuScene {
    layout: wgpu::BindGroupLayout,
    white: Texture,
    textures: Vec<Texture>,
    materials: Vec<Material>,
    meshes: HashMap<MeshSlot, Mesh>,
    instances: HashMap<NodeId, wgpu::Buffer>,
    draws: Vec<Draw>,
}

impl GpuScene {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Self {
            layout: material_layout(device),
            white: Texture::create_solid([255, 255, 255, 255], device, queue, "white"),
            textures: Vec::new(),
            materials: Vec::new(),
            meshes: HashMap::new(),
            instances: HashMap::new(),
            draws: Vec::new(),
        }
    }

    /// Brings the GPU copy up to date with `scene`. World transforms must be
    /// current. `eye` orders the blended draws.
    pub fn sync(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        scene: &SceneGraph,
        eye: Point3<f32>,
    ) -> Result<(), SceneError> {
        self.sync_textures(device, queue, scene);
        self.sync_materials(device, scene);

        self.draws.clear();
        for (id, node) in scene.nodes() {
            let (Some(mesh_id), Some(material_id)) = (node.mesh, node.material) else {
                continue;
            };
            if !node.visible {
                continue;
            }
            let Some(data) = scene.mesh(mesh_id) else {
                continue;
            };
            if data.indices.is_empty() {
                continue;
            }

            let slot = match &node.skin {
                Some(skin) if data.skin_weights.is_some() => {
                    let slot = MeshSlot::Skinned(skin.anchor, mesh_id);
                    // the first node of a skeleton poses the buffer for all of them
                    if !self.draws.iter().any(|draw| draw.mesh == slot) {
                        let joints = joint_matrices(scene, skin)?;
                        let vertices = skin_vertices(data, &joints);
                        match self.meshes.get(&slot) {
                            Some(mesh) => queue.write_buffer(
                                &mesh.vertex_buffer,
                                0,
                                bytemuck::cast_slice(&vertices),
                            ),
                            None => {
                                let posed = MeshData {
                                    vertices,
                                    ..data.clone()
                                };
                                self.meshes.insert(slot, Mesh::new(device, &posed));
                            }
                        }
                    }
                    slot
                }
                _ => {
                    let slot = MeshSlot::Shared(mesh_id);
                    self.meshes
                        .entry(slot)
                        .or_insert_with(|| Mesh::new(device, data));
                    slot
                }
            };

            let raw = InstanceRaw::from_matrix(&node.world());
            match self.instances.get(&id) {
                Some(buffer) => queue.write_buffer(buffer, 0, bytemuck::cast_slice(&[raw])),
                None => {
                    let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(&format!("{} Instance Buffer", node.name)),
                        contents: bytemuck::cast_slice(&[raw]),
                        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                    });
                    self.instances.insert(id, buffer);
                }
            }

            let blend = self
                .materials
                .get(material_id.index())
                .is_some_and(|material| material.blend);
            let position = node.world_position();
            self.draws.push(Draw {
                node: id,
                mesh: slot,
                material: material_id,
                blend,
                depth: (Point3::new(position.x, position.y, position.z) - eye).magnitude(),
            });
        }
        Ok(())
    }

    fn sync_textures(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, scene: &SceneGraph) {
        for (id, image) in scene.textures().skip(self.textures.len()) {
            let label = format!("texture {}", id.index());
            self.textures
                .push(Texture::from_rgba(device, queue, image, Some(&label)));
        }
    }

    fn sync_materials(&mut self, device: &wgpu::Device, scene: &SceneGraph) {
        for material in scene.materials().iter().skip(self.materials.len()) {
            let texture = material
                .diffuse_texture
                .and_then(|id| self.textures.get(id.index()))
                .unwrap_or(&self.white);
            self.materials
                .push(Material::new(device, material, texture, &self.layout));
        }
    }

    pub fn render(&self) -> Render<'_> {
        let mut opaque = Vec::new();
        let mut blended = Vec::new();
        for draw in &self.draws {
            let (Some(instance), Some(mesh), Some(material)) = (
                self.instances.get(&draw.node),
                self.meshes.get(&draw.mesh),
                self.materials.get(draw.material.index()),
            ) else {
                continue;
            };
            let instanced = Instanced {
                instance,
                mesh,
                material,
                amount: 1,
                depth: draw.depth,
            };
            if draw.blend {
                blended.push(instanced);
            } else {
                opaque.push(instanced);
            }
        }
        Render::Composed(vec![Render::Defaults(opaque), Render::Transparents(blended)])
    }
}
