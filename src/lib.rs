//! card-ngin
//!
//! A rounded card with a hole, a printed text face and a mirrored back,
//! swinging around its axis while two glTF characters dance along. Runs
//! natively and in the browser on top of wgpu.
//!
//! High-level modules
//! - `camera`: arc-rotate camera, its controller and uniforms
//! - `card`: the card scene itself and the flow driving it
//! - `config`: every tunable of the scene in one place
//! - `context`: central GPU and window context that owns device/queue/pipelines
//! - `data_structures`: scene graph, meshes, materials, CSG and animation
//! - `flow`: the event loop and the `GraphicsFlow` trait scenes implement
//! - `pipelines`: the opaque and the blended render pipelines
//! - `resources`: helpers to fetch files and import glTF assets
//! - `render`: render composition for efficient pipeline reuse
//!

pub mod camera;
pub mod card;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod error;
pub mod flow;
pub mod pipelines;
pub mod render;
pub mod resources;

pub use card::{
    flow::{CardFlow, SceneEvent, SceneState, card_flow},
    scene::{CardScene, CharacterStatus},
};
pub use config::SceneConfig;
pub use error::SceneError;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath::*;
pub use winit::event::WindowEvent;

/// Opens a window (or binds the page canvas) and runs the card scene until
/// it is closed.
pub fn run_card_scene(config: SceneConfig) -> anyhow::Result<()> {
    flow::run(vec![card_flow(config)])
}

#[cfg(target_arch = "wasm32")]
mod web {
    use wasm_bindgen::prelude::*;

    use crate::{SceneConfig, run_card_scene};

    #[wasm_bindgen(start)]
    pub fn start() -> Result<(), JsValue> {
        run_card_scene(SceneConfig::default()).map_err(|e| JsValue::from_str(&format!("{:#}", e)))
    }
}
