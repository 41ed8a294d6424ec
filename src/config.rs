//! Presentation parameters of the card scene.
//!
//! Everything here has a `Default` that reproduces the stock scene. The card
//! flow reads the config while it is built and in `on_init`; nothing watches
//! it afterwards.

use std::f32::consts::{FRAC_PI_2, FRAC_PI_3};

use cgmath::{Point3, Vector3};

use crate::{
    camera::{ArcRotateCamera, CameraLimits},
    card::{character::CharacterSchema, rounded_box::RoundedBoxParams, text::CardTextPayload},
    data_structures::model::Color3,
};

pub const HVGIRL_URL: &str = "https://assets.babylonjs.com/meshes/HVGirl.glb";

#[derive(Clone, Debug, PartialEq)]
pub struct CameraConfig {
    pub alpha: f32,
    pub beta: f32,
    pub radius: f32,
    pub target: Point3<f32>,
    pub fovy: f32,
    pub znear: f32,
    pub zfar: f32,
    pub limits: CameraLimits,
}

impl CameraConfig {
    pub fn camera(&self) -> ArcRotateCamera {
        ArcRotateCamera::new(self.alpha, self.beta, self.radius, self.target)
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            alpha: FRAC_PI_2,
            beta: FRAC_PI_2,
            radius: 16.0,
            target: Point3::new(0.0, 0.0, 0.0),
            fovy: crate::context::DEFAULT_FOVY,
            znear: crate::context::DEFAULT_ZNEAR,
            zfar: crate::context::DEFAULT_ZFAR,
            limits: CameraLimits::default(),
        }
    }
}

/// Geometry and materials of the card itself.
#[derive(Clone, Debug, PartialEq)]
pub struct CardConfig {
    pub body: RoundedBoxParams,
    pub hole: RoundedBoxParams,
    /// Where the hole's centre sits relative to the body before subtraction.
    pub hole_offset: Vector3<f32>,
    pub text_plane_lift: f32,
    /// Local offset of the back face along the thickness axis.
    pub back_offset: f32,
    pub front_color: Color3,
    pub front_alpha: f32,
    pub back_color: Color3,
    pub text: CardTextPayload,
}

impl Default for CardConfig {
    fn default() -> Self {
        let body = RoundedBoxParams {
            thickness: 0.0333,
            corner_radius: 0.5,
            width: 6.0,
            height: 9.0,
        };
        let hole = RoundedBoxParams {
            thickness: 1.0,
            corner_radius: 0.25,
            width: 5.0,
            height: 5.0,
        };
        Self {
            hole_offset: Vector3::new(0.0, 0.3, (body.height - hole.height) / 2.0 - 0.5),
            body,
            hole,
            text_plane_lift: 0.35,
            back_offset: -0.5,
            front_color: [1.0, 1.0, 1.0],
            front_alpha: 0.6,
            back_color: [1.0, 1.0, 1.0],
            text: CardTextPayload::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CharacterConfig {
    /// Asset path below `assets/`, or an `http(s)://` URL.
    pub url: String,
    pub scale: f32,
    pub offset: Vector3<f32>,
    pub clone_name: String,
    pub first_color: Color3,
    pub clone_color: Color3,
    pub alpha: f32,
    pub speed: f32,
    pub schema: CharacterSchema,
}

impl Default for CharacterConfig {
    fn default() -> Self {
        Self {
            url: HVGIRL_URL.to_string(),
            scale: 0.2,
            offset: Vector3::new(0.0, -1.0, -2.0),
            clone_name: "blueGirl".to_string(),
            first_color: [1.0, 0.0, 0.0],
            clone_color: [0.0, 0.0, 1.0],
            alpha: 0.2,
            speed: 1.0,
            schema: CharacterSchema::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneConfig {
    pub clear_colour: wgpu::Color,
    pub camera: CameraConfig,
    pub light_direction: [f32; 3],
    pub card: CardConfig,
    pub character: CharacterConfig,
    pub animation_frame_rate: f32,
    /// Peak z rotation of the card swing, in radians.
    pub rotation_amplitude: f32,
    /// Installed font family for the card text. The bundled font is used when
    /// it is `None` or not installed.
    pub font_family: Option<String>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            clear_colour: wgpu::Color {
                r: 0.2,
                g: 0.2,
                b: 0.2,
                a: 1.0,
            },
            camera: CameraConfig::default(),
            light_direction: [0.0, 10.0, 10.0],
            card: CardConfig::default(),
            character: CharacterConfig::default(),
            animation_frame_rate: 10.0,
            rotation_amplitude: FRAC_PI_3,
            font_family: Some("Verdana".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hole_sits_half_a_unit_inside_the_top_edge() {
        let card = CardConfig::default();
        assert!((card.hole_offset.z - 1.5).abs() < 1e-6);
        assert!((card.hole_offset.y - 0.3).abs() < 1e-6);
    }

    #[test]
    fn default_camera_orbits_sixteen_units_out() {
        let camera = SceneConfig::default().camera.camera();
        assert_eq!(camera.radius, 16.0);
        assert!((camera.position().z - 16.0).abs() < 1e-4);
    }
}
