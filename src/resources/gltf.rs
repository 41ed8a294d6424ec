//! glTF 2.0 import.
//!
//! [`import_gltf`] parses a self-contained `.glb` (or a `.gltf` with embedded
//! buffers) into an [`ImportedScene`], which owns plain CPU data only.
//! [`ImportedScene::instantiate`] then adds one copy of it to a
//! [`SceneGraph`] under a new root node.
//!
//! glTF is right-handed. The root node converts to the scene's left-handed
//! space by turning 180° about y and mirroring z, so the asset data itself is
//! used unchanged.

use std::collections::HashMap;

use cgmath::{Matrix4, Quaternion, Rotation3, Vector3};
use image::RgbaImage;

use crate::{
    data_structures::{
        animation::{AnimationGroup, NodeChannel},
        instance::Instance,
        model::{MeshData, ModelVertex, SkinWeights, StandardMaterial},
        scene_graph::{MaterialId, MeshId, NodeId, SceneGraph, Skin, TextureId},
    },
    error::SceneError,
    resources::animation::Keyframes,
};

/// Name of the node every instantiated asset hangs under.
pub const ROOT_NODE_NAME: &str = "__root__";

#[derive(Clone, Debug)]
pub struct ImportedNode {
    pub name: String,
    pub local: Instance,
    pub children: Vec<usize>,
    pub mesh: Option<usize>,
    pub skin: Option<usize>,
}

#[derive(Clone, Debug)]
pub struct ImportedPrimitive {
    pub data: MeshData,
    pub material: Option<usize>,
}

#[derive(Clone, Debug)]
pub struct ImportedMesh {
    pub name: String,
    pub primitives: Vec<ImportedPrimitive>,
}

#[derive(Clone, Debug)]
pub struct ImportedSkin {
    pub joints: Vec<usize>,
    pub inverse_bind: Vec<Matrix4<f32>>,
}

#[derive(Clone, Debug)]
pub struct ImportedChannel {
    pub node: usize,
    pub times: Vec<f32>,
    pub values: Keyframes,
}

#[derive(Clone, Debug)]
pub struct ImportedAnimation {
    pub name: String,
    pub channels: Vec<ImportedChannel>,
}

/// A parsed asset, independent of any scene.
#[derive(Clone, Debug, Default)]
pub struct ImportedScene {
    pub nodes: Vec<ImportedNode>,
    pub roots: Vec<usize>,
    pub meshes: Vec<ImportedMesh>,
    pub materials: Vec<StandardMaterial>,
    /// Diffuse texture of each material, as an index into `images`.
    pub material_textures: Vec<Option<usize>>,
    pub images: Vec<RgbaImage>,
    pub skins: Vec<ImportedSkin>,
    pub animations: Vec<ImportedAnimation>,
}

/// Handles of one instantiated asset.
#[derive(Debug)]
pub struct Instantiated {
    pub root: NodeId,
    pub animation_groups: Vec<AnimationGroup>,
}

pub fn import_gltf(bytes: &[u8]) -> anyhow::Result<ImportedScene> {
    let (document, buffers, images) = ::gltf::import_slice(bytes)?;

    // decodable images, and where each glTF image ended up among them
    let mut decoded = Vec::new();
    let image_slots: Vec<Option<usize>> = images
        .into_iter()
        .map(|data| {
            let image = to_rgba(data)?;
            decoded.push(image);
            Some(decoded.len() - 1)
        })
        .collect();

    let mut materials = Vec::new();
    let mut material_textures = Vec::new();
    for (index, material) in document.materials().enumerate() {
        let pbr = material.pbr_metallic_roughness();
        let [r, g, b, a] = pbr.base_color_factor();
        let name = material
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("material{index}"));
        materials.push(StandardMaterial::new(name).with_diffuse([r, g, b]).with_alpha(a));
        let texture = pbr
            .base_color_texture()
            .and_then(|info| image_slots.get(info.texture().source().index()).copied().flatten());
        material_textures.push(texture);
    }

    let mut meshes = Vec::new();
    for mesh in document.meshes() {
        let name = mesh
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("mesh{}", mesh.index()));
        let mut primitives = Vec::new();
        for (index, primitive) in mesh.primitives().enumerate() {
            if !matches!(primitive.mode(), ::gltf::mesh::Mode::Triangles) {
                log::warn!(
                    "Skipping primitive {} of mesh {}: only triangle lists are supported",
                    index,
                    name
                );
                continue;
            }
            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));
            let positions: Vec<[f32; 3]> = reader
                .read_positions()
                .ok_or_else(|| {
                    SceneError::UnsupportedAsset(format!("mesh {name} has a primitive without positions"))
                })?
                .collect();
            let normals = reader.read_normals().map(|n| n.collect::<Vec<_>>());
            let tex_coords = reader
                .read_tex_coords(0)
                .map(|t| t.into_f32().collect::<Vec<_>>());
            let vertices = positions
                .iter()
                .enumerate()
                .map(|(i, &position)| ModelVertex {
                    position,
                    tex_coords: tex_coords
                        .as_ref()
                        .and_then(|t| t.get(i).copied())
                        .unwrap_or([0.0, 0.0]),
                    normal: normals
                        .as_ref()
                        .and_then(|n| n.get(i).copied())
                        .unwrap_or([0.0, 1.0, 0.0]),
                })
                .collect::<Vec<_>>();
            let indices = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..vertices.len() as u32).collect(),
            };
            let mut data = MeshData::new(format!("{name}_primitive{index}"), vertices, indices);
            if let (Some(joints), Some(weights)) = (reader.read_joints(0), reader.read_weights(0)) {
                data.skin_weights = Some(SkinWeights {
                    joints: joints.into_u16().collect(),
                    weights: weights.into_f32().collect(),
                });
            }
            primitives.push(ImportedPrimitive {
                data,
                material: primitive.material().index(),
            });
        }
        if let [only] = primitives.as_mut_slice() {
            only.data.name = name.clone();
        }
        meshes.push(ImportedMesh { name, primitives });
    }

    let nodes = document
        .nodes()
        .map(|node| {
            let (translation, [x, y, z, w], scale) = node.transform().decomposed();
            ImportedNode {
                name: node
                    .name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("node{}", node.index())),
                local: Instance {
                    position: translation.into(),
                    rotation: Quaternion::new(w, x, y, z),
                    scale: scale.into(),
                },
                children: node.children().map(|child| child.index()).collect(),
                mesh: node.mesh().map(|mesh| mesh.index()),
                skin: node.skin().map(|skin| skin.index()),
            }
        })
        .collect();

    let roots = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .map(|scene| scene.nodes().map(|node| node.index()).collect())
        .unwrap_or_default();

    let skins = document
        .skins()
        .map(|skin| {
            let reader = skin.reader(|buffer| Some(&buffers[buffer.index()]));
            ImportedSkin {
                joints: skin.joints().map(|joint| joint.index()).collect(),
                inverse_bind: reader
                    .read_inverse_bind_matrices()
                    .map(|matrices| matrices.map(Matrix4::from).collect())
                    .unwrap_or_default(),
            }
        })
        .collect();

    let mut animations = Vec::new();
    for (index, animation) in document.animations().enumerate() {
        let name = animation
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("animation{index}"));
        let mut channels = Vec::new();
        for channel in animation.channels() {
            let reader = channel.reader(|buffer| Some(&buffers[buffer.index()]));
            let Some(times) = reader.read_inputs().map(|t| t.collect::<Vec<f32>>()) else {
                log::warn!("Animation {} has a channel without keyframe times", name);
                continue;
            };
            let cubic = matches!(
                channel.sampler().interpolation(),
                ::gltf::animation::Interpolation::CubicSpline
            );
            let values = match reader.read_outputs() {
                Some(::gltf::animation::util::ReadOutputs::Translations(values)) => {
                    Keyframes::Translation(keep_values(values.map(Vector3::from), cubic))
                }
                Some(::gltf::animation::util::ReadOutputs::Rotations(values)) => Keyframes::Rotation(
                    keep_values(
                        values.into_f32().map(|[x, y, z, w]| Quaternion::new(w, x, y, z)),
                        cubic,
                    ),
                ),
                Some(::gltf::animation::util::ReadOutputs::Scales(values)) => {
                    Keyframes::Scale(keep_values(values.map(Vector3::from), cubic))
                }
                Some(::gltf::animation::util::ReadOutputs::MorphTargetWeights(_)) => {
                    log::debug!("Ignoring morph target channel in animation {}", name);
                    continue;
                }
                None => continue,
            };
            channels.push(ImportedChannel {
                node: channel.target().node().index(),
                times,
                values,
            });
        }
        animations.push(ImportedAnimation { name, channels });
    }

    log::info!(
        "Imported glTF: {} nodes, {} meshes, {} skins, {} animations",
        document.nodes().len(),
        meshes.len(),
        document.skins().len(),
        animations.len()
    );

    Ok(ImportedScene {
        nodes,
        roots,
        meshes,
        materials,
        material_textures,
        images: decoded,
        skins,
        animations,
    })
}

/// Cubic spline samplers store in-tangent, value and out-tangent per key.
/// Only the values are kept and played back linearly.
fn keep_values<T>(values: impl Iterator<Item = T>, cubic: bool) -> Vec<T> {
    if cubic {
        values.skip(1).step_by(3).collect()
    } else {
        values.collect()
    }
}

fn to_rgba(data: ::gltf::image::Data) -> Option<RgbaImage> {
    use ::gltf::image::Format;
    let pixels = match data.format {
        Format::R8G8B8A8 => data.pixels,
        Format::R8G8B8 => data
            .pixels
            .chunks_exact(3)
            .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 255])
            .collect(),
        other => {
            log::warn!("Skipping glTF image with unsupported format {:?}", other);
            return None;
        }
    };
    RgbaImage::from_raw(data.width, data.height, pixels)
}

impl ImportedScene {
    /// Names of all animation clips.
    pub fn animation_names(&self) -> impl Iterator<Item = &str> {
        self.animations.iter().map(|a| a.name.as_str())
    }

    /// Adds a copy of the asset to `scene` under a new node called `root_name`.
    pub fn instantiate(
        &self,
        scene: &mut SceneGraph,
        root_name: &str,
        parent: Option<NodeId>,
    ) -> Result<Instantiated, SceneError> {
        let root = scene.add_node(root_name, parent);
        {
            let local = &mut scene.node_mut(root)?.local;
            local.rotation = Quaternion::from_angle_y(cgmath::Rad(std::f32::consts::PI));
            local.scale = Vector3::new(1.0, 1.0, -1.0);
        }

        let textures: Vec<TextureId> = self
            .images
            .iter()
            .map(|image| scene.add_texture(image.clone()))
            .collect();
        let materials: Vec<MaterialId> = self
            .materials
            .iter()
            .zip(&self.material_textures)
            .map(|(material, texture)| {
                let mut material = material.clone();
                material.diffuse_texture = texture.and_then(|t| textures.get(t).copied());
                scene.add_material(material)
            })
            .collect();
        let mut fallback_material = None;
        let meshes: Vec<Vec<(MeshId, MaterialId)>> = self
            .meshes
            .iter()
            .map(|mesh| {
                mesh.primitives
                    .iter()
                    .map(|primitive| {
                        let material = match primitive.material.and_then(|m| materials.get(m)) {
                            Some(&material) => material,
                            None => *fallback_material.get_or_insert_with(|| {
                                scene.add_material(StandardMaterial::new("default material"))
                            }),
                        };
                        (scene.add_mesh(primitive.data.clone()), material)
                    })
                    .collect()
            })
            .collect();

        let mut ids: HashMap<usize, NodeId> = HashMap::new();
        // nodes that draw something, per imported node
        let mut drawn: HashMap<usize, Vec<NodeId>> = HashMap::new();
        let mut stack: Vec<(usize, NodeId)> = self.roots.iter().rev().map(|&r| (r, root)).collect();
        while let Some((index, parent)) = stack.pop() {
            let source = self.nodes.get(index).ok_or_else(|| {
                SceneError::UnsupportedAsset(format!("node {index} is referenced but not defined"))
            })?;
            if ids.contains_key(&index) {
                return Err(SceneError::UnsupportedAsset(format!(
                    "node {index} appears more than once in the hierarchy"
                )));
            }
            let id = scene.add_node(source.name.clone(), Some(parent));
            scene.node_mut(id)?.local = source.local;
            ids.insert(index, id);

            if let Some(primitives) = source.mesh.and_then(|m| meshes.get(m)) {
                if let [(mesh, material)] = primitives.as_slice() {
                    let node = scene.node_mut(id)?;
                    node.mesh = Some(*mesh);
                    node.material = Some(*material);
                    drawn.insert(index, vec![id]);
                } else {
                    let mut parts = Vec::new();
                    for (i, &(mesh, material)) in primitives.iter().enumerate() {
                        let name = scene
                            .mesh(mesh)
                            .map(|data| data.name.clone())
                            .unwrap_or_else(|| format!("{}_primitive{i}", source.name));
                        parts.push(scene.add_mesh_node(name, mesh, Some(material), Some(id)));
                    }
                    drawn.insert(index, parts);
                }
            }
            stack.extend(source.children.iter().rev().map(|&child| (child, id)));
        }

        for (index, source) in self.nodes.iter().enumerate() {
            let (Some(skin), Some(parts)) = (source.skin, drawn.get(&index)) else {
                continue;
            };
            let skin = self.skins.get(skin).ok_or_else(|| {
                SceneError::UnsupportedAsset(format!("skin {skin} is referenced but not defined"))
            })?;
            let joints = skin
                .joints
                .iter()
                .map(|joint| {
                    ids.get(joint).copied().ok_or_else(|| {
                        SceneError::UnsupportedAsset(format!("joint {joint} is not part of the scene"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            for &part in parts {
                scene.node_mut(part)?.skin = Some(Skin {
                    anchor: part,
                    joints: joints.clone(),
                    inverse_bind: skin.inverse_bind.clone(),
                });
            }
        }

        let animation_groups = self
            .animations
            .iter()
            .map(|animation| {
                let channels = animation
                    .channels
                    .iter()
                    .filter_map(|channel| {
                        Some(NodeChannel {
                            target: *ids.get(&channel.node)?,
                            times: channel.times.clone(),
                            values: channel.values.clone(),
                        })
                    })
                    .collect();
                AnimationGroup::new(animation.name.clone(), channels)
            })
            .collect();

        Ok(Instantiated {
            root,
            animation_groups,
        })
    }
}

#[cfg(test)]
mod tests {
    use cgmath::InnerSpace;

    use super::*;

    const JSON: &str = r#"{
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [
            { "name": "Armature", "children": [1, 2] },
            { "name": "Body", "mesh": 0, "skin": 0 },
            { "name": "Hip", "translation": [1.0, 1.0, 2.0] }
        ],
        "meshes": [{
            "name": "Body",
            "primitives": [
                { "attributes": { "POSITION": 0, "JOINTS_0": 2, "WEIGHTS_0": 3 }, "indices": 1, "material": 0 },
                { "attributes": { "POSITION": 0 }, "indices": 1 }
            ]
        }, {
            "name": "Head",
            "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1 }]
        }],
        "materials": [{ "name": "Skin", "pbrMetallicRoughness": { "baseColorFactor": [0.5, 0.25, 1.0, 1.0] } }],
        "skins": [{ "joints": [2], "inverseBindMatrices": 4 }],
        "animations": [{
            "name": "Walk",
            "samplers": [{ "input": 5, "output": 6, "interpolation": "LINEAR" }],
            "channels": [{ "sampler": 0, "target": { "node": 2, "path": "translation" } }]
        }],
        "buffers": [{ "byteLength": 216 }],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 12 },
            { "buffer": 0, "byteOffset": 48, "byteLength": 24 },
            { "buffer": 0, "byteOffset": 72, "byteLength": 48 },
            { "buffer": 0, "byteOffset": 120, "byteLength": 64 },
            { "buffer": 0, "byteOffset": 184, "byteLength": 8 },
            { "buffer": 0, "byteOffset": 192, "byteLength": 24 }
        ],
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3", "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
            { "bufferView": 1, "componentType": 5125, "count": 3, "type": "SCALAR" },
            { "bufferView": 2, "componentType": 5123, "count": 3, "type": "VEC4" },
            { "bufferView": 3, "componentType": 5126, "count": 3, "type": "VEC4" },
            { "bufferView": 4, "componentType": 5126, "count": 1, "type": "MAT4" },
            { "bufferView": 5, "componentType": 5126, "count": 2, "type": "SCALAR", "min": [0.0], "max": [1.0] },
            { "bufferView": 6, "componentType": 5126, "count": 2, "type": "VEC3" }
        ]
    }"#;

    fn bin() -> Vec<u8> {
        let mut out = Vec::new();
        let floats = |out: &mut Vec<u8>, values: &[f32]| {
            values.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes()))
        };
        floats(&mut out, &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        [0u32, 1, 2].iter().for_each(|i| out.extend_from_slice(&i.to_le_bytes()));
        [0u16; 12].iter().for_each(|j| out.extend_from_slice(&j.to_le_bytes()));
        floats(&mut out, &[1.0, 0.0, 0.0, 0.0].repeat(3));
        floats(
            &mut out,
            &[
                1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, -1.0, -1.0, -2.0, 1.0,
            ],
        );
        floats(&mut out, &[0.0, 1.0]);
        floats(&mut out, &[1.0, 1.0, 2.0, 1.0, 3.0, 2.0]);
        assert_eq!(out.len(), 216);
        out
    }

    fn glb() -> Vec<u8> {
        let mut json = JSON.as_bytes().to_vec();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }
        let bin = bin();
        let total = 12 + 8 + json.len() + 8 + bin.len();
        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(b"glTF");
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&(json.len() as u32).to_le_bytes());
        out.extend_from_slice(b"JSON");
        out.extend_from_slice(&json);
        out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        out.extend_from_slice(b"BIN\0");
        out.extend_from_slice(&bin);
        out
    }

    #[test]
    fn imports_meshes_materials_skins_and_clips() {
        let imported = import_gltf(&glb()).unwrap();
        assert_eq!(imported.nodes.len(), 3);
        assert_eq!(imported.roots, vec![0]);
        assert_eq!(imported.meshes[0].primitives.len(), 2);
        assert_eq!(imported.meshes[0].primitives[0].data.name, "Body_primitive0");
        // a lone primitive keeps the mesh name
        assert_eq!(imported.meshes[1].primitives.len(), 1);
        assert_eq!(imported.meshes[1].primitives[0].data.name, "Head");
        assert!(imported.meshes[0].primitives[0].data.skin_weights.is_some());
        assert!(imported.meshes[0].primitives[1].data.skin_weights.is_none());
        assert_eq!(imported.materials[0].diffuse_color, [0.5, 0.25, 1.0]);
        assert_eq!(imported.skins[0].joints, vec![2]);
        assert_eq!(imported.animation_names().collect::<Vec<_>>(), vec!["Walk"]);
    }

    #[test]
    fn instantiate_splits_primitives_and_mirrors_into_left_handed_space() {
        let imported = import_gltf(&glb()).unwrap();
        let mut scene = SceneGraph::new();
        let instance = imported.instantiate(&mut scene, ROOT_NODE_NAME, None).unwrap();

        let body = scene.find_by_name("Body").unwrap();
        let parts = scene.node(body).unwrap().children().to_vec();
        assert_eq!(parts.len(), 2);
        assert_eq!(scene.node(parts[1]).unwrap().name, "Body_primitive1");
        let hip = scene.find_by_name("Hip").unwrap();
        let skin = scene.node(parts[0]).unwrap().skin.clone().unwrap();
        assert_eq!((skin.anchor, skin.joints), (parts[0], vec![hip]));

        let primitive = scene.node(parts[0]).unwrap();
        let material = scene.material(primitive.material.unwrap()).unwrap();
        assert_eq!(material.name, "Skin");
        // the second primitive has no material of its own
        let fallback = scene.node(parts[1]).unwrap().material.unwrap();
        assert_eq!(scene.material(fallback).unwrap().name, "default material");

        scene.update_world_transform_all();
        let hip_world = scene.node(hip).unwrap().world_position();
        assert!((hip_world - Vector3::new(-1.0, 1.0, 2.0)).magnitude() < 1e-5, "{:?}", hip_world);

        assert_eq!(instance.animation_groups.len(), 1);
        let walk = &instance.animation_groups[0];
        assert_eq!((walk.from, walk.to), (0.0, 1.0));
        assert_eq!(walk.channels[0].target, hip);
        assert_eq!(scene.node(instance.root).unwrap().name, ROOT_NODE_NAME);
    }

    #[test]
    fn garbage_is_not_an_asset() {
        assert!(import_gltf(b"definitely not a glb").is_err());
    }
}
