//! The two dancing characters hanging off the card.

use crate::{
    config::CharacterConfig,
    data_structures::{
        animation::AnimationGroup,
        model::StandardMaterial,
        scene_graph::{NodeId, SceneGraph},
    },
    error::SceneError,
    resources::gltf::{ImportedScene, ROOT_NODE_NAME},
};

/// What the scene expects to find in a character asset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CharacterSchema {
    /// Submeshes are called `{submesh_prefix}0` up to `{submesh_prefix}{submesh_count - 1}`.
    pub submesh_prefix: String,
    pub submesh_count: usize,
    /// Animation clip both characters play.
    pub clip: String,
}

impl Default for CharacterSchema {
    fn default() -> Self {
        Self {
            submesh_prefix: "HVGirl_primitive".to_string(),
            submesh_count: 11,
            clip: "Samba".to_string(),
        }
    }
}

/// Where the schema's parts ended up in one instantiated character.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CharacterParts {
    pub submeshes: Vec<NodeId>,
    /// Index of the clip among the instantiated animation groups.
    pub clip: usize,
}

impl CharacterSchema {
    /// Finds every submesh below `root`. Clones carry a `"{prefix}."` in
    /// front of the original names, so only the last path segment is compared.
    pub fn submeshes(&self, scene: &SceneGraph, root: NodeId) -> Result<Vec<NodeId>, SceneError> {
        let below = scene.descendants(root);
        (0..self.submesh_count)
            .map(|i| {
                let name = format!("{}{i}", self.submesh_prefix);
                let dotted = format!(".{name}");
                below
                    .iter()
                    .copied()
                    .find(|&id| {
                        scene
                            .node(id)
                            .is_ok_and(|node| node.name == name || node.name.ends_with(&dotted))
                    })
                    .ok_or(SceneError::MissingSubmesh { name })
            })
            .collect()
    }

    pub fn validate(
        &self,
        scene: &SceneGraph,
        root: NodeId,
        clips: &[AnimationGroup],
    ) -> Result<CharacterParts, SceneError> {
        let submeshes = self.submeshes(scene, root)?;
        let clip = clips
            .iter()
            .position(|group| group.name == self.clip)
            .ok_or_else(|| SceneError::MissingAnimation {
                name: self.clip.clone(),
            })?;
        Ok(CharacterParts { submeshes, clip })
    }
}

#[derive(Debug)]
pub struct Characters {
    pub first: NodeId,
    pub clone: NodeId,
    /// Every clip of the asset. Only the schema's clip is started.
    pub animation_groups: Vec<AnimationGroup>,
}

/// Adds the imported character twice: once under `card` and once as a clone
/// at the scene root. Both share one skeleton, so the clip moves both.
pub fn attach_characters(
    scene: &mut SceneGraph,
    imported: &ImportedScene,
    card: NodeId,
    config: &CharacterConfig,
) -> Result<Characters, SceneError> {
    let instance = imported.instantiate(scene, ROOT_NODE_NAME, None)?;
    let first = instance.root;
    let mut animation_groups = instance.animation_groups;
    let parts = match config.schema.validate(scene, first, &animation_groups) {
        Ok(parts) => parts,
        Err(e) => {
            // leave nothing half set up on screen
            for id in scene.descendants(first) {
                scene.node_mut(id)?.visible = false;
            }
            return Err(e);
        }
    };

    {
        let local = &mut scene.node_mut(first)?.local;
        local.scale *= config.scale;
        local.position += config.offset;
    }

    let clone = scene.clone_subtree(first, &config.clone_name, None)?;
    let clone_submeshes = config.schema.submeshes(scene, clone)?;

    let first_material = scene.add_material(
        StandardMaterial::new("baseMaterial")
            .with_diffuse(config.first_color)
            .with_alpha(config.alpha),
    );
    let clone_material = scene.add_material(
        StandardMaterial::new("baseMaterial2")
            .with_diffuse(config.clone_color)
            .with_alpha(config.alpha),
    );
    for &submesh in &parts.submeshes {
        scene.node_mut(submesh)?.material = Some(first_material);
    }
    for submesh in clone_submeshes {
        scene.node_mut(submesh)?.material = Some(clone_material);
    }

    if let Some(clip) = animation_groups.get_mut(parts.clip) {
        clip.start(true, config.speed);
        log::info!("Playing {} from {}s to {}s", clip.name, clip.from, clip.to);
    }

    scene.set_parent(first, Some(card))?;

    Ok(Characters {
        first,
        clone,
        animation_groups,
    })
}

#[cfg(test)]
mod tests {
    use cgmath::{InnerSpace, Vector3};

    use super::*;
    use crate::{
        data_structures::{instance::Instance, primitives::create_box},
        resources::{
            animation::Keyframes,
            gltf::{ImportedAnimation, ImportedChannel, ImportedMesh, ImportedNode, ImportedPrimitive},
        },
    };

    fn schema(count: usize, clip: &str) -> CharacterSchema {
        CharacterSchema {
            submesh_prefix: "HVGirl_primitive".to_string(),
            submesh_count: count,
            clip: clip.to_string(),
        }
    }

    /// An "Idle" node holding an "HVGirl" mesh with three primitives, and a
    /// "Samba" clip moving "Idle".
    fn girl() -> ImportedScene {
        let primitives = (0..3)
            .map(|i| ImportedPrimitive {
                data: create_box(&format!("HVGirl_primitive{i}"), 1.0, 1.0, 1.0),
                material: None,
            })
            .collect();
        ImportedScene {
            nodes: vec![
                ImportedNode {
                    name: "Idle".to_string(),
                    local: Instance::new(),
                    children: vec![1],
                    mesh: None,
                    skin: None,
                },
                ImportedNode {
                    name: "HVGirl".to_string(),
                    local: Instance::new(),
                    children: vec![],
                    mesh: Some(0),
                    skin: None,
                },
            ],
            roots: vec![0],
            meshes: vec![ImportedMesh {
                name: "HVGirl".to_string(),
                primitives,
            }],
            animations: vec![
                ImportedAnimation {
                    name: "Walking".to_string(),
                    channels: vec![],
                },
                ImportedAnimation {
                    name: "Samba".to_string(),
                    channels: vec![ImportedChannel {
                        node: 0,
                        times: vec![0.0, 2.0],
                        values: Keyframes::Translation(vec![
                            Vector3::new(0.0, 0.0, 0.0),
                            Vector3::new(0.0, 1.0, 0.0),
                        ]),
                    }],
                },
            ],
            ..Default::default()
        }
    }

    fn card(scene: &mut SceneGraph) -> NodeId {
        let card = scene.add_node("baseCard", None);
        scene
            .set_rotation_euler(card, Vector3::new(-std::f32::consts::FRAC_PI_2, std::f32::consts::PI, 0.0))
            .unwrap();
        card
    }

    #[test]
    fn both_characters_are_coloured_and_dancing() {
        let mut scene = SceneGraph::new();
        let card = card(&mut scene);
        let config = CharacterConfig {
            schema: schema(3, "Samba"),
            ..Default::default()
        };
        let characters = attach_characters(&mut scene, &girl(), card, &config).unwrap();

        let blue = scene
            .find_by_name("blueGirl.Idle.HVGirl.HVGirl_primitive2")
            .unwrap();
        let blue_material = scene.material(scene.node(blue).unwrap().material.unwrap()).unwrap();
        assert_eq!(blue_material.diffuse_color, [0.0, 0.0, 1.0]);
        assert_eq!(blue_material.alpha, 0.2);

        let red = scene.find_by_name("HVGirl_primitive0").unwrap();
        let red_material = scene.material(scene.node(red).unwrap().material.unwrap()).unwrap();
        assert_eq!(red_material.diffuse_color, [1.0, 0.0, 0.0]);
        assert!(red_material.needs_blending());

        assert_eq!(scene.node(characters.first).unwrap().parent(), Some(card));
        assert_eq!(scene.node(characters.clone).unwrap().parent(), None);
        assert_eq!(scene.node(characters.clone).unwrap().name, "blueGirl");

        let playing: Vec<_> = characters
            .animation_groups
            .iter()
            .filter(|group| group.is_playing())
            .map(|group| group.name.as_str())
            .collect();
        assert_eq!(playing, vec!["Samba"]);
    }

    #[test]
    fn reparenting_under_the_card_keeps_the_character_in_place() {
        let mut scene = SceneGraph::new();
        let card = card(&mut scene);
        let characters = attach_characters(
            &mut scene,
            &girl(),
            card,
            &CharacterConfig {
                schema: schema(3, "Samba"),
                ..Default::default()
            },
        )
        .unwrap();
        scene.update_world_transform_all();

        let first = scene.node(characters.first).unwrap();
        assert!((first.world_position() - Vector3::new(0.0, -1.0, -2.0)).magnitude() < 1e-5);
        let clone = scene.node(characters.clone).unwrap();
        assert!((clone.world_position() - Vector3::new(0.0, -1.0, -2.0)).magnitude() < 1e-5);
        assert!((clone.local.scale.x - 0.2).abs() < 1e-6);
    }

    #[test]
    fn missing_parts_fail_fast() {
        let mut scene = SceneGraph::new();
        let card = card(&mut scene);
        let too_many = CharacterConfig {
            schema: schema(4, "Samba"),
            ..Default::default()
        };
        assert_eq!(
            attach_characters(&mut scene, &girl(), card, &too_many).unwrap_err(),
            SceneError::MissingSubmesh {
                name: "HVGirl_primitive3".to_string()
            }
        );

        let no_clip = CharacterConfig {
            schema: schema(3, "Tango"),
            ..Default::default()
        };
        assert_eq!(
            attach_characters(&mut scene, &girl(), card, &no_clip).unwrap_err(),
            SceneError::MissingAnimation {
                name: "Tango".to_string()
            }
        );
    }
}
