//! The card scene as a [`GraphicsFlow`].
//!
//! The card is built by the constructor, so a broken card never reaches the
//! event loop. The character asset is fetched after `on_init` and attached
//! whenever it arrives; until then, or if it never does, only the card shows.

use instant::Duration;
use winit::event::WindowEvent;

#[cfg(feature = "integration-tests")]
use crate::flow::ImageTestResult;
use crate::{
    config::SceneConfig,
    context::{Context, InitContext},
    data_structures::gpu_scene::GpuScene,
    flow::{FlowConsturctor, GraphicsFlow, Out},
    pipelines::light::LightUniform,
    render::Render,
    resources::{gltf::ImportedScene, load_model_gltf},
};

use super::scene::{CardScene, CharacterStatus};

pub enum SceneEvent {
    CharacterLoaded(anyhow::Result<ImportedScene>),
}

#[derive(Debug, Default)]
pub struct SceneState {
    pub characters: CharacterStatus,
}

pub struct CardFlow {
    scene: CardScene,
    gpu: GpuScene,
}

impl CardFlow {
    pub async fn new(ctx: InitContext, config: SceneConfig) -> anyhow::Result<Self> {
        Ok(Self {
            scene: CardScene::new(config)?,
            gpu: GpuScene::new(&ctx.device, &ctx.queue),
        })
    }

    pub fn scene(&self) -> &CardScene {
        &self.scene
    }
}

impl GraphicsFlow<SceneState, SceneEvent> for CardFlow {
    fn on_init(&mut self, ctx: &mut Context, state: &mut SceneState) -> Out<SceneEvent> {
        let config = self.scene.config();
        let camera = &config.camera;
        ctx.clear_colour = config.clear_colour;
        ctx.camera.controller.limits = camera.limits;
        ctx.set_camera(camera.camera(), camera.fovy, camera.znear, camera.zfar);
        ctx.set_light(LightUniform::hemispheric(config.light_direction));

        state.characters = CharacterStatus::Loading;
        let url = config.character.url.clone();
        Out::FutEvent(vec![Box::new(async move {
            SceneEvent::CharacterLoaded(load_model_gltf(&url).await)
        })])
    }

    fn on_update(&mut self, ctx: &Context, _: &mut SceneState, dt: Duration) -> Out<SceneEvent> {
        if let Err(e) = self.scene.advance(dt.as_secs_f32()) {
            log::error!("Animation failed: {}", e);
        }
        let eye = ctx.camera.camera.position();
        if let Err(e) = self.gpu.sync(&ctx.device, &ctx.queue, self.scene.graph(), eye) {
            log::error!("Cannot upload the scene: {}", e);
        }
        Out::Empty
    }

    fn on_window_events(&mut self, _: &Context, _: &mut SceneState, _: &WindowEvent) -> Out<SceneEvent> {
        Out::Empty
    }

    fn on_custom_events(
        &mut self,
        _: &Context,
        state: &mut SceneState,
        event: SceneEvent,
    ) -> Option<SceneEvent> {
        let SceneEvent::CharacterLoaded(loaded) = event;
        state.characters = self.scene.character_loaded(loaded);
        None
    }

    fn on_render(&self) -> Render<'_> {
        self.gpu.render()
    }

    #[cfg(feature = "integration-tests")]
    fn render_to_texture(
        &self,
        _: &Context,
        _: &mut SceneState,
        _: &mut image::ImageBuffer<image::Rgba<u8>, wgpu::BufferView>,
    ) -> Result<ImageTestResult, anyhow::Error> {
        Ok(ImageTestResult::Passed)
    }
}

/// Constructor of the card flow for [`crate::flow::run`].
pub fn card_flow(config: SceneConfig) -> FlowConsturctor<SceneState, SceneEvent> {
    Box::new(move |ctx| {
        Box::pin(async move {
            let flow = CardFlow::new(ctx, config).await?;
            Ok(Box::new(flow) as Box<dyn GraphicsFlow<SceneState, SceneEvent>>)
        })
    })
}
