//! The card scene: a rounded, holed card with a printed face, swinging back
//! and forth, with two characters dancing along.
//!
//! - `rounded_box` builds the card body by CSG
//! - `text` lays out and rasterizes the printed face
//! - `animation` creates the swing
//! - `character` attaches the imported characters
//! - `scene` holds the graph and reacts to the loaded asset
//! - `flow` drives all of it from the engine loop

pub mod animation;
pub mod character;
pub mod flow;
pub mod rounded_box;
pub mod scene;
pub mod text;

use std::f32::consts::{FRAC_PI_2, PI};

use cgmath::Vector3;

use crate::{
    config::CardConfig,
    data_structures::{
        csg::Solid,
        dynamic_texture::Typeface,
        instance::Instance,
        model::StandardMaterial,
        primitives::create_plane,
        scene_graph::{NodeId, SceneGraph},
    },
    error::SceneError,
};

use self::{rounded_box::build_rounded_box, text::rasterize_card_text};

/// Name of the front card node.
pub const CARD_NODE_NAME: &str = "baseCard";
pub const BACK_NODE_NAME: &str = "back card";
pub const TEXT_PLANE_NAME: &str = "textPlane";

/// Nodes of an assembled card.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CardHandles {
    pub card: NodeId,
    pub back: NodeId,
    pub text_plane: NodeId,
}

/// Builds the card into `scene` and turns it to face the default camera.
pub fn assemble_card(
    scene: &mut SceneGraph,
    config: &CardConfig,
    regular: &dyn Typeface,
    bold: &dyn Typeface,
) -> Result<CardHandles, SceneError> {
    let body = build_rounded_box(&config.body)?;
    let hole = build_rounded_box(&config.hole)?;
    let hole = Solid::from_mesh(&hole.to_mesh("hole"), &Instance::from(config.hole_offset));
    let solid = body.subtract(hole);
    if solid.is_empty() {
        return Err(SceneError::EmptySolid {
            operation: "subtract",
        });
    }

    let mesh = scene.add_mesh(solid.to_mesh(CARD_NODE_NAME));
    let front = scene.add_material(
        StandardMaterial::new("frontMaterial")
            .with_diffuse(config.front_color)
            .with_alpha(config.front_alpha),
    );
    let card = scene.add_mesh_node(CARD_NODE_NAME, mesh, Some(front), None);

    let texture = scene.add_texture(rasterize_card_text(&config.text, regular, bold).into_image());
    let text_material = scene.add_material(StandardMaterial {
        diffuse_texture: Some(texture),
        specular_color: [0.0; 3],
        emissive_color: [0.0; 3],
        texture_alpha_test: true,
        ..StandardMaterial::new("cardTextMaterial")
    });
    let plane = scene.add_mesh(create_plane(
        TEXT_PLANE_NAME,
        config.body.width,
        config.body.height,
    ));
    let text_plane = scene.add_mesh_node(TEXT_PLANE_NAME, plane, Some(text_material), None);
    scene.set_rotation_euler(text_plane, Vector3::new(FRAC_PI_2, 0.0, 0.0))?;
    scene.node_mut(text_plane)?.local.position.y += config.text_plane_lift;

    // cloned before the text plane moves under the card so it is not copied
    let back = scene.clone_subtree(card, BACK_NODE_NAME, Some(card))?;
    let back_material = scene.add_material(
        StandardMaterial::new("backMaterial").with_diffuse(config.back_color),
    );
    {
        let node = scene.node_mut(back)?;
        node.material = Some(back_material);
        node.local.position.y += config.back_offset;
    }

    scene.set_parent(text_plane, Some(card))?;

    let mut rotation = scene.rotation_euler(card)?;
    rotation.x -= FRAC_PI_2;
    rotation.y = PI;
    scene.set_rotation_euler(card, rotation)?;
    scene.update_world_transform_all();

    log::info!(
        "Card assembled: {} triangles, {} scene nodes",
        scene.mesh(mesh).map(|m| m.triangle_count()).unwrap_or(0),
        scene.node_count()
    );
    Ok(CardHandles {
        card,
        back,
        text_plane,
    })
}

#[cfg(test)]
mod tests {
    use cgmath::InnerSpace;

    use super::*;
    use crate::data_structures::dynamic_texture::BlockTypeface;

    fn assemble(scene: &mut SceneGraph) -> CardHandles {
        assemble_card(
            scene,
            &CardConfig::default(),
            &BlockTypeface::REGULAR,
            &BlockTypeface::BOLD,
        )
        .unwrap()
    }

    #[test]
    fn card_has_one_front_and_one_offset_back() {
        let mut scene = SceneGraph::new();
        let handles = assemble(&mut scene);

        let card = scene.node(handles.card).unwrap();
        let back = scene.node(handles.back).unwrap();
        assert_eq!(card.name, CARD_NODE_NAME);
        assert_eq!(back.name, BACK_NODE_NAME);
        assert_eq!(back.parent(), Some(handles.card));
        assert_eq!(back.mesh, card.mesh);
        assert_eq!(back.local.position, Vector3::new(0.0, -0.5, 0.0));

        let front = scene.material(card.material.unwrap()).unwrap();
        assert!(front.needs_blending());
        assert_eq!(front.alpha, 0.6);
        assert!(!scene.material(back.material.unwrap()).unwrap().needs_blending());

        let fronts = scene
            .nodes()
            .filter(|(_, node)| node.visible && node.name == CARD_NODE_NAME)
            .count();
        assert_eq!(fronts, 1);
        // the back face is a plain copy, the text plane stayed out of it
        assert!(back.children().is_empty());
        assert_eq!(card.children(), &[handles.back, handles.text_plane]);
    }

    #[test]
    fn card_faces_the_camera_with_the_text_in_front() {
        let mut scene = SceneGraph::new();
        let handles = assemble(&mut scene);

        let euler = scene.rotation_euler(handles.card).unwrap();
        assert!((euler - Vector3::new(-FRAC_PI_2, PI, 0.0)).magnitude() < 1e-6);

        // the camera sits on +z: the text is nearer to it, the back farther away
        let text = scene.node(handles.text_plane).unwrap().world_position();
        let back = scene.node(handles.back).unwrap().world_position();
        assert!((text - Vector3::new(0.0, 0.0, 0.35)).magnitude() < 1e-5, "{:?}", text);
        assert!((back - Vector3::new(0.0, 0.0, -0.5)).magnitude() < 1e-5, "{:?}", back);
    }

    #[test]
    fn the_hole_goes_through_the_card() {
        let mut scene = SceneGraph::new();
        let handles = assemble(&mut scene);
        let mesh = scene.mesh(scene.node(handles.card).unwrap().mesh.unwrap()).unwrap();
        let (min, max) = mesh.bounds().unwrap();
        assert!((max[0] - min[0] - 6.0).abs() < 1e-4);
        assert!((max[2] - min[2] - 9.0).abs() < 1e-4);

        let full = 6.0 * 9.0 * 0.0333;
        let volume = mesh.signed_volume();
        assert!(volume > 0.0 && volume < full * 0.7, "{} of {}", volume, full);
    }

    #[test]
    fn the_text_material_is_alpha_tested() {
        let mut scene = SceneGraph::new();
        let handles = assemble(&mut scene);
        let node = scene.node(handles.text_plane).unwrap();
        let material = scene.material(node.material.unwrap()).unwrap();
        assert!(material.texture_alpha_test);
        assert!(!material.needs_blending());
        let texture = scene.texture(material.diffuse_texture.unwrap()).unwrap();
        assert_eq!(texture.dimensions(), (text::TEXTURE_WIDTH, text::TEXTURE_HEIGHT));
    }

    #[test]
    fn a_hole_larger_than_the_card_is_fatal() {
        let mut config = CardConfig::default();
        config.hole.width = 20.0;
        config.hole.height = 20.0;
        config.hole.corner_radius = 1.0;
        config.hole_offset = Vector3::new(0.0, 0.0, 0.0);
        let err = assemble_card(
            &mut SceneGraph::new(),
            &config,
            &BlockTypeface::REGULAR,
            &BlockTypeface::BOLD,
        )
        .unwrap_err();
        assert_eq!(err, SceneError::EmptySolid { operation: "subtract" });
    }
}
