//! The card scene on the CPU side: the scene graph, the swing and the
//! characters once they arrive. [`super::flow::CardFlow`] mirrors it to the GPU.

use crate::{
    config::SceneConfig,
    data_structures::{
        animation::{Animatable, AnimationGroup},
        dynamic_texture::Typeface,
        scene_graph::SceneGraph,
    },
    error::SceneError,
    resources::{font::card_faces, gltf::ImportedScene},
};

use super::{
    CardHandles,
    animation::{begin_card_swing, card_rotation_animation},
    assemble_card,
    character::attach_characters,
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CharacterStatus {
    #[default]
    Loading,
    Loaded,
    Failed(String),
}

pub struct CardScene {
    config: SceneConfig,
    graph: SceneGraph,
    card: CardHandles,
    swing: Animatable,
    animation_groups: Vec<AnimationGroup>,
}

impl CardScene {
    /// Builds the card with the configured font family, or the bundled font.
    pub fn new(config: SceneConfig) -> Result<Self, SceneError> {
        let faces = card_faces(config.font_family.as_deref());
        Self::with_typefaces(config, faces.regular.as_ref(), faces.bold.as_ref())
    }

    pub fn with_typefaces(
        config: SceneConfig,
        regular: &dyn Typeface,
        bold: &dyn Typeface,
    ) -> Result<Self, SceneError> {
        let mut graph = SceneGraph::new();
        let card = assemble_card(&mut graph, &config.card, regular, bold)?;
        let base = graph.rotation_euler(card.card)?.z;
        let swing = begin_card_swing(
            card.card,
            card_rotation_animation(base, config.animation_frame_rate, config.rotation_amplitude),
        );
        Ok(Self {
            config,
            graph,
            card,
            swing,
            animation_groups: Vec::new(),
        })
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn card(&self) -> CardHandles {
        self.card
    }

    pub fn animation_groups(&self) -> &[AnimationGroup] {
        &self.animation_groups
    }

    /// Moves every animation on by `dt` seconds and refreshes world transforms.
    pub fn advance(&mut self, dt: f32) -> Result<(), SceneError> {
        self.swing.advance(dt);
        self.swing.apply(&mut self.graph)?;
        for group in &mut self.animation_groups {
            group.advance(dt);
            if group.is_playing() {
                group.apply(&mut self.graph)?;
            }
        }
        self.graph.update_world_transform_all();
        Ok(())
    }

    /// Attaches the characters from a finished load. Any failure leaves the
    /// card as it was and is reported in the returned status.
    pub fn character_loaded(&mut self, loaded: anyhow::Result<ImportedScene>) -> CharacterStatus {
        let imported = match loaded {
            Ok(imported) => imported,
            Err(e) => {
                log::error!("Cannot load the character asset: {:#}", e);
                return CharacterStatus::Failed(format!("{:#}", e));
            }
        };
        match attach_characters(&mut self.graph, &imported, self.card.card, &self.config.character) {
            Ok(characters) => {
                log::info!("Characters attached to the card");
                self.animation_groups = characters.animation_groups;
                self.graph.update_world_transform_all();
                CharacterStatus::Loaded
            }
            Err(e) => {
                log::error!("Character asset does not fit the scene: {}", e);
                CharacterStatus::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::Vector3;

    use super::*;
    use crate::{
        data_structures::{
            dynamic_texture::BlockTypeface, instance::Instance, primitives::create_box,
            scene_graph::NodeId,
        },
        resources::{
            animation::Keyframes,
            gltf::{ImportedAnimation, ImportedChannel, ImportedMesh, ImportedNode, ImportedPrimitive},
        },
    };

    fn scene() -> CardScene {
        CardScene::with_typefaces(SceneConfig::default(), &BlockTypeface::REGULAR, &BlockTypeface::BOLD)
            .unwrap()
    }

    /// A girl with `parts` primitives and a "Samba" clip.
    fn girl(parts: usize) -> ImportedScene {
        ImportedScene {
            nodes: vec![ImportedNode {
                name: "HVGirl".to_string(),
                local: Instance::new(),
                children: vec![],
                mesh: Some(0),
                skin: None,
            }],
            roots: vec![0],
            meshes: vec![ImportedMesh {
                name: "HVGirl".to_string(),
                primitives: (0..parts)
                    .map(|i| ImportedPrimitive {
                        data: create_box(&format!("HVGirl_primitive{i}"), 1.0, 1.0, 1.0),
                        material: None,
                    })
                    .collect(),
            }],
            animations: vec![ImportedAnimation {
                name: "Samba".to_string(),
                channels: vec![ImportedChannel {
                    node: 0,
                    times: vec![0.0, 1.0],
                    values: Keyframes::Translation(vec![Vector3::new(0.0, 0.0, 0.0); 2]),
                }],
            }],
            ..Default::default()
        }
    }

    /// Everything about the card subtree that a failed load must not touch.
    fn card_snapshot(scene: &CardScene) -> Vec<(NodeId, String, bool, Instance, Vec<NodeId>)> {
        let graph = scene.graph();
        graph
            .descendants(scene.card().card)
            .into_iter()
            .map(|id| {
                let node = graph.node(id).unwrap();
                (id, node.name.clone(), node.visible, node.local, node.children().to_vec())
            })
            .collect()
    }

    #[test]
    fn an_invalid_card_is_a_construction_error() {
        let mut config = SceneConfig::default();
        config.card.body.corner_radius = 10.0;
        let err = CardScene::with_typefaces(config, &BlockTypeface::REGULAR, &BlockTypeface::BOLD)
            .err()
            .unwrap();
        assert!(matches!(err, SceneError::InvalidRoundedBox { .. }));
    }

    #[test]
    fn a_failed_download_keeps_the_card() {
        let mut scene = scene();
        let before = card_snapshot(&scene);
        let nodes = scene.graph().node_count();

        let status = scene.character_loaded(Err(anyhow::anyhow!("network is unreachable")));
        assert!(matches!(&status, CharacterStatus::Failed(msg) if msg.contains("unreachable")));
        assert_eq!(scene.graph().node_count(), nodes);
        assert_eq!(card_snapshot(&scene), before);
        assert!(scene.animation_groups().is_empty());

        // the swing keeps going
        let rest = scene.graph().rotation_euler(scene.card().card).unwrap().z;
        scene.advance(5.0).unwrap();
        let swung = scene.graph().rotation_euler(scene.card().card).unwrap().z;
        assert!((swung - rest).abs() > 0.5, "{} -> {}", rest, swung);
    }

    #[test]
    fn an_asset_without_the_parts_keeps_the_card_and_hides_itself() {
        let mut scene = scene();
        let before = card_snapshot(&scene);
        let nodes = scene.graph().node_count();

        let status = scene.character_loaded(Ok(girl(3)));
        assert_eq!(
            status,
            CharacterStatus::Failed(
                SceneError::MissingSubmesh {
                    name: "HVGirl_primitive3".to_string()
                }
                .to_string()
            )
        );
        assert_eq!(card_snapshot(&scene), before);
        assert!(scene.animation_groups().is_empty());
        let graph = scene.graph();
        assert!(
            graph
                .nodes()
                .skip(nodes)
                .all(|(_, node)| !node.visible)
        );
        scene.advance(0.1).unwrap();
    }

    #[test]
    fn a_matching_asset_hangs_the_characters_off_the_card() {
        let mut scene = scene();
        assert_eq!(scene.character_loaded(Ok(girl(11))), CharacterStatus::Loaded);
        let graph = scene.graph();
        let below_card = graph.descendants(scene.card().card);
        let first = graph.find_by_name("HVGirl_primitive10").unwrap();
        assert!(below_card.contains(&first));
        let clone = graph.find_by_name("blueGirl").unwrap();
        assert!(!below_card.contains(&clone));
        assert!(scene.animation_groups().iter().any(|group| group.is_playing()));
    }
}
