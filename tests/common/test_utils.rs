#![allow(dead_code)]

#[cfg(feature = "integration-tests")]
use card_ngin::flow::ImageTestResult;
use card_ngin::{
    context::Context,
    flow::{GraphicsFlow, Out},
    render::Render,
};

pub(crate) type Frame = image::ImageBuffer<image::Rgba<u8>, wgpu::BufferView>;

#[derive(Default)]
pub(crate) struct State {
    frame_counter: u32,
    init_invocations: u32,
    update_invocations: u32,
    custom_invocations: u32,
}

impl State {
    pub fn frame(&mut self) {
        self.frame_counter += 1;
    }

    pub fn init(&mut self) {
        self.init_invocations += 1;
    }

    pub fn update(&mut self) {
        self.update_invocations += 1;
    }

    pub fn custom(&mut self) {
        self.custom_invocations += 1;
    }

    pub fn frame_counter(&self) -> u32 {
        self.frame_counter
    }

    pub fn init_invocations(&self) -> u32 {
        self.init_invocations
    }

    pub fn update_invocations(&self) -> u32 {
        self.update_invocations
    }

    pub fn custom_invocations(&self) -> u32 {
        self.custom_invocations
    }
}

#[derive(Default)]
pub(crate) struct FrameCounter(pub(crate) u32);

impl FrameCounter {
    pub(crate) fn frame(&self) -> u32 {
        self.0
    }

    pub(crate) fn progress(&mut self) {
        self.0 += 1;
    }
}

/// Converts a clear colour to the pixel it ends up as in an 8 bit target.
pub(crate) fn to_pixel(colour: wgpu::Color) -> image::Rgba<u8> {
    let f_to_u8 = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    image::Rgba([
        f_to_u8(colour.r),
        f_to_u8(colour.g),
        f_to_u8(colour.b),
        f_to_u8(colour.a),
    ])
}

/// A flow that draws nothing and hands every rendered frame to `validate`.
#[cfg(feature = "integration-tests")]
pub(crate) struct TestRender {
    setup: Box<dyn Fn(&mut Context)>,
    validate: Box<dyn Fn(&Context, &mut FrameCounter, &mut Frame) -> Result<ImageTestResult, anyhow::Error>>,
}

#[cfg(feature = "integration-tests")]
impl TestRender {
    pub(crate) fn new(
        setup: impl Fn(&mut Context) + 'static,
        validate: impl Fn(&Context, &mut FrameCounter, &mut Frame) -> Result<ImageTestResult, anyhow::Error>
        + 'static,
    ) -> Self {
        Self {
            setup: Box::new(setup),
            validate: Box::new(validate),
        }
    }
}

#[cfg(feature = "integration-tests")]
impl GraphicsFlow<FrameCounter, ()> for TestRender {
    fn on_init(&mut self, ctx: &mut Context, _: &mut FrameCounter) -> Out<()> {
        (self.setup)(ctx);
        Out::Empty
    }

    fn on_update(&mut self, _: &Context, state: &mut FrameCounter, _: instant::Duration) -> Out<()> {
        state.progress();
        Out::Empty
    }

    fn on_window_events(&mut self, _: &Context, _: &mut FrameCounter, _: &card_ngin::WindowEvent) -> Out<()> {
        Out::Empty
    }

    fn on_custom_events(&mut self, _: &Context, _: &mut FrameCounter, event: ()) -> Option<()> {
        Some(event)
    }

    fn on_render(&self) -> Render<'_> {
        Render::None
    }

    fn render_to_texture(
        &self,
        ctx: &Context,
        state: &mut FrameCounter,
        texture: &mut Frame,
    ) -> Result<ImageTestResult, anyhow::Error> {
        (self.validate)(ctx, state, texture)
    }
}

#[macro_export]
macro_rules! golden_image_test {
    ($graphics_elem:expr) => {{
        use card_ngin::flow::{FlowConsturctor, GraphicsFlow};
        use $crate::common::test_utils::FrameCounter;
        let make = $graphics_elem;
        let model_constructor: FlowConsturctor<FrameCounter, ()> = Box::new(move |ctx| {
            Box::pin(async move {
                let g_flow: Box<dyn GraphicsFlow<FrameCounter, ()>> = Box::new(make(ctx).await);
                Ok(g_flow)
            })
        });

        card_ngin::flow::run(vec![model_constructor])
            .expect("Failed to run flow for integration test.");
    }};
}
