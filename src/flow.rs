//! Flow control and application event loop.
//!
//! A "flow" is a self-contained part of the application: it reacts to input,
//! updates its state every frame and says what to draw. The engine owns the
//! window and the GPU [`Context`], drives every registered flow and renders
//! what they return.
//!
//! # User-facing types
//!
//! - [`GraphicsFlow<S, E>`] is the trait every flow implements
//! - [`Out<E>`] is what a hook hands back: futures to resolve or a context change
//!
//! # Lifecycle
//!
//! Every frame the loop
//! 1. forwards window events to the camera controller and to all flows,
//! 2. applies the camera controller and writes the camera uniform,
//! 3. calls `on_update` on all flows,
//! 4. collects `on_render` from all flows, draws the opaque batch and then
//!    the transparent batch back to front,
//! 5. presents the frame.
//!
//! Futures returned in [`Out::FutEvent`] run next to the loop; their outputs
//! come back through `on_custom_events`.

use std::{fmt::Debug, iter, pin::Pin, sync::Arc};

use instant::{Duration, Instant};

#[cfg(not(target_arch = "wasm32"))]
use futures::task::LocalSpawnExt;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::Window,
};

use crate::{
    context::{Context, InitContext},
    data_structures::{model::DrawModel, texture::Texture},
    render::{Instanced, Render, sort_back_to_front},
};

/// DOM id of the canvas the scene is drawn into on the web.
pub const CANVAS_ID: &str = "renderCanvas";

///
/// This is the output type of every lifecycle hook.
///
/// `Out::FutEvent` hands the engine futures that produce events. Each future
/// runs on its own next to the event loop and its event is delivered to
/// `on_custom_events` once it resolves. Nothing happens unless a flow handles
/// the event.
///
/// `Out::Configure` changes the Context, for instance the clear colour.
///
/// `Empty` is the default output used when nothing needs to be handled.
///
pub enum Out<E> {
    FutEvent(Vec<Box<dyn Future<Output = E>>>),
    Configure(Box<dyn FnOnce(&mut Context)>),
    Empty,
}

impl<E> Default for Out<E> {
    fn default() -> Self {
        Self::Empty
    }
}

#[cfg(feature = "integration-tests")]
pub enum ImageTestResult {
    Passed,
    Waiting,
    Failed,
}

/// Trait for implementing a renderable scene.
///
/// # Lifecycle
///
/// 1. `on_init()` is called once after the window and the GPU are ready
/// 2. `on_window_events()` is called for each winit window event
/// 3. `on_update()` is called every frame
/// 4. `on_custom_events()` is called when a future from `Out::FutEvent` resolved
/// 5. `on_render()` is called each frame and specifies how to render `self`
///
pub trait GraphicsFlow<S, E> {
    /// Initialize the flow and configure the context.
    ///
    /// This is the place to set the background colour, the camera and the light.
    fn on_init(&mut self, ctx: &mut Context, state: &mut S) -> Out<E>;

    /// Update state every frame with the elapsed time `dt`.
    fn on_update(&mut self, ctx: &Context, state: &mut S, dt: Duration) -> Out<E>;

    /// Handle window events (keyboard, mouse, window resizing, etc.).
    fn on_window_events(&mut self, ctx: &Context, state: &mut S, event: &WindowEvent) -> Out<E>;

    /// Handle custom application events.
    ///
    /// Returns the event if it was not consumed, allowing it to be passed to
    /// the next flow. Returning `None` means the event was consumed.
    fn on_custom_events(&mut self, ctx: &Context, state: &mut S, event: E) -> Option<E>;

    /// What to draw this frame.
    fn on_render(&self) -> Render<'_>;

    #[cfg(feature = "integration-tests")]
    fn render_to_texture(
        &self,
        ctx: &Context,
        state: &mut S,
        texture: &mut image::ImageBuffer<image::Rgba<u8>, wgpu::BufferView>,
    ) -> Result<ImageTestResult, anyhow::Error>;
}

// Dummy impl to make wasm work
impl<State, Event> Debug for dyn GraphicsFlow<State, Event> + 'static {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("GraphicsFlow")
    }
}

/// A flow factory.
///
/// It gets an `InitContext` to create GPU resources with and resolves to the
/// flow, or to the error that kept it from being built.
pub type FlowConsturctor<S, E> = Box<
    dyn FnOnce(InitContext) -> Pin<Box<dyn Future<Output = anyhow::Result<Box<dyn GraphicsFlow<S, E>>>>>>,
>;

/// Application state bundle: GPU context, app state, and surface status.
#[derive(Debug)]
pub struct AppState<State: 'static> {
    pub(crate) ctx: Context,
    state: State,
    is_surface_configured: bool,
}

impl<State: Default> AppState<State> {
    async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let ctx = Context::new(window).await?;
        Ok(Self {
            ctx,
            state: State::default(),
            is_surface_configured: false,
        })
    }
}

impl<State> AppState<State> {
    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.ctx.config.width = width;
            self.ctx.config.height = height;
            self.is_surface_configured = true;
            self.ctx.projection.resize(width, height);
            self.ctx
                .surface
                .configure(&self.ctx.device, &self.ctx.config);
            self.ctx.depth_texture = Texture::create_depth_texture(
                &self.ctx.device,
                [self.ctx.config.width, self.ctx.config.height],
                "depth_texture",
            );
            self.ctx.write_camera();
        }
    }

    #[cfg(feature = "integration-tests")]
    fn get_test_texture(&self, extent3d: wgpu::Extent3d, format: wgpu::TextureFormat) -> wgpu::Texture {
        self.ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Golden Image Test Output Texture"),
            size: extent3d,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
    }

    /// Size of the test target. Rows of a texture copy must be 256 byte aligned.
    #[cfg(feature = "integration-tests")]
    fn get_test_3d_extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.ctx.config.width.div_ceil(64) * 64,
            height: self.ctx.config.height,
            depth_or_array_layers: 1,
        }
    }

    fn render<Event>(
        &mut self,
        graphics_flows: &[Box<dyn GraphicsFlow<State, Event>>],
        #[cfg(feature = "integration-tests")] async_runtime: &tokio::runtime::Runtime,
        #[cfg(feature = "integration-tests")] event_loop: &winit::event_loop::EventLoopProxy<
            FlowEvent<State, Event>,
        >,
    ) -> Result<(), wgpu::SurfaceError> {
        // invoke main render loop
        self.ctx.window.request_redraw();

        // Rendering requires the surface to be configured
        if !self.is_surface_configured {
            return Ok(());
        }

        let output = self.ctx.surface.get_current_texture()?;
        #[cfg(not(feature = "integration-tests"))]
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        #[cfg(feature = "integration-tests")]
        let (tex, depth) = {
            let extent3d = self.get_test_3d_extent();
            let tex = self.get_test_texture(extent3d, self.ctx.config.format);
            let depth = Texture::create_depth_texture(
                &self.ctx.device,
                [extent3d.width, extent3d.height],
                "test_depth_texture",
            );
            (tex, depth)
        };
        #[cfg(feature = "integration-tests")]
        let view = tex.create_view(&wgpu::TextureViewDescriptor::default());
        #[cfg(feature = "integration-tests")]
        let depth_view = &depth.view;
        #[cfg(not(feature = "integration-tests"))]
        let depth_view = &self.ctx.depth_texture.view;

        let mut encoder: wgpu::CommandEncoder =
            self.ctx
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Render Encoder"),
                });
        {
            let mut render_pass: wgpu::RenderPass<'_> =
                encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Render Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(self.ctx.clear_colour),
                            store: wgpu::StoreOp::Store,
                        },
                        depth_slice: None,
                    })],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: depth_view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(1.0),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }),
                    occlusion_query_set: None,
                    timestamp_writes: None,
                    multiview_mask: None,
                });

            let mut basics: Vec<Instanced> = Vec::new();
            let mut trans: Vec<Instanced> = Vec::new();
            graphics_flows.iter().for_each(|flow| {
                flow.on_render().set_pipelines(&mut basics, &mut trans);
            });
            sort_back_to_front(&mut trans);

            render_pass.set_pipeline(&self.ctx.pipelines.basic);
            draw_batch(&mut render_pass, &self.ctx, &basics);
            render_pass.set_pipeline(&self.ctx.pipelines.transparent);
            draw_batch(&mut render_pass, &self.ctx, &trans);
        }

        #[cfg(feature = "integration-tests")]
        let output_buffer = {
            let u32_size = std::mem::size_of::<u32>() as u32;
            let extent = self.get_test_3d_extent();
            let output_buffer_size = (u32_size * extent.width * extent.height) as wgpu::BufferAddress;
            let output_buffer = self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
                size: output_buffer_size,
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                label: None,
                mapped_at_creation: false,
            });
            encoder.copy_texture_to_buffer(
                wgpu::TexelCopyTextureInfo {
                    aspect: wgpu::TextureAspect::All,
                    texture: &tex,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                },
                wgpu::TexelCopyBufferInfo {
                    buffer: &output_buffer,
                    layout: wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(u32_size * extent.width),
                        rows_per_image: Some(extent.height),
                    },
                },
                extent,
            );
            output_buffer
        };

        self.ctx.queue.submit(iter::once(encoder.finish()));

        #[cfg(feature = "integration-tests")]
        {
            use std::convert::identity;

            let extent = self.get_test_3d_extent();
            let buffer_slice = output_buffer.slice(..);
            let fut_img = async {
                let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
                buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
                    tx.send(result).unwrap();
                });
                self.ctx
                    .device
                    .poll(wgpu::PollType::Wait {
                        submission_index: None,
                        timeout: Some(Duration::from_secs(3)),
                    })
                    .unwrap();
                rx.receive().await.unwrap().unwrap();
                let data = buffer_slice.get_mapped_range();
                image::ImageBuffer::<image::Rgba<u8>, _>::from_raw(extent.width, extent.height, data)
                    .unwrap()
            };
            let mut img: image::ImageBuffer<image::Rgba<u8>, wgpu::BufferView> =
                async_runtime.block_on(fut_img);
            let state = &mut self.state;
            let all_passed = graphics_flows
                .iter()
                .map(|flow| flow.render_to_texture(&self.ctx, state, &mut img))
                .map(|res| match res {
                    Err(e) => panic!("{}", e),
                    Ok(ImageTestResult::Passed) => true,
                    Ok(ImageTestResult::Failed) => panic!("Assertion failed"),
                    Ok(ImageTestResult::Waiting) => false,
                })
                .all(identity);
            if all_passed {
                event_loop
                    .send_event(FlowEvent::Exit)
                    .expect("All assertions passed but the winit event-loop could not safely exit")
            }
        }

        output.present();
        Ok(())
    }
}

fn draw_batch<'a, 'b: 'a>(
    render_pass: &mut wgpu::RenderPass<'a>,
    ctx: &'b Context,
    batch: &[Instanced<'b>],
) {
    for instanced in batch {
        if instanced.amount == 0 || instanced.instance.size() == 0 {
            log::warn!("Skipping {} with zero instances", instanced.mesh.name);
            continue;
        }
        render_pass.set_vertex_buffer(1, instanced.instance.slice(..));
        render_pass.draw_mesh_instanced(
            instanced.mesh,
            instanced.material,
            0..instanced.amount as u32,
            &ctx.camera.bind_group,
            &ctx.light.bind_group,
        );
    }
}

pub struct App<State: 'static, Event: 'static> {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    // flow futures are not Send, so they are polled on the event loop thread
    #[cfg(not(target_arch = "wasm32"))]
    local_pool: futures::executor::LocalPool,
    proxy: winit::event_loop::EventLoopProxy<FlowEvent<State, Event>>,
    state: Option<AppState<State>>,
    // This will hold the fully initialized flows once they are ready.
    graphics_flows: Vec<Box<dyn GraphicsFlow<State, Event>>>,
    // We use Option to `take()` the constructors after use.
    constructors: Option<Vec<FlowConsturctor<State, Event>>>,
    last_time: Instant,
    // returned from `run` once the loop has exited
    init_error: Option<anyhow::Error>,
}

impl<State, Event> App<State, Event>
where
    State: 'static,
    Event: 'static,
{
    fn new(
        event_loop: &EventLoop<FlowEvent<State, Event>>,
        constructors: Vec<FlowConsturctor<State, Event>>,
    ) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime: tokio::runtime::Runtime::new()?,
            #[cfg(not(target_arch = "wasm32"))]
            local_pool: futures::executor::LocalPool::new(),
            proxy,
            state: None,
            graphics_flows: Vec::new(),
            constructors: Some(constructors),
            last_time: Instant::now(),
            init_error: None,
        })
    }

    fn handle_flow_output(&self, ctx: &mut Context, out: Out<Event>) {
        match out {
            Out::FutEvent(futures) => {
                for future in futures {
                    let proxy = self.proxy.clone();
                    let task = async move {
                        let event = Pin::from(future).await;
                        if proxy.send_event(FlowEvent::Custom(event)).is_err() {
                            log::error!("Event loop was closed before an event could be delivered");
                        }
                    };
                    #[cfg(not(target_arch = "wasm32"))]
                    if let Err(e) = self.local_pool.spawner().spawn_local(task) {
                        log::error!("Cannot spawn flow future: {}", e);
                    }
                    #[cfg(target_arch = "wasm32")]
                    wasm_bindgen_futures::spawn_local(task);
                }
            }
            Out::Configure(f) => f(ctx),
            Out::Empty => (),
        }
    }

    fn init_flows(
        &mut self,
        mut app_state: AppState<State>,
        mut flows: Vec<Box<dyn GraphicsFlow<State, Event>>>,
    ) {
        let size = app_state.ctx.window.inner_size();
        app_state.resize(size.width, size.height);
        for flow in flows.iter_mut() {
            let out = flow.on_init(&mut app_state.ctx, &mut app_state.state);
            self.handle_flow_output(&mut app_state.ctx, out);
        }
        self.graphics_flows = flows;
        app_state.ctx.window.request_redraw();
        self.last_time = Instant::now();
        self.state = Some(app_state);
    }

    /// Runs the frame: camera, flow updates, then drawing.
    fn redraw(&mut self) {
        let Some(mut state) = self.state.take() else {
            return;
        };
        let dt = self.last_time.elapsed();
        self.last_time = Instant::now();

        {
            let ctx = &mut state.ctx;
            ctx.camera.controller.update(&mut ctx.camera.camera, dt);
            ctx.write_camera();
        }
        let mut flows = std::mem::take(&mut self.graphics_flows);
        for flow in flows.iter_mut() {
            let out = flow.on_update(&state.ctx, &mut state.state, dt);
            self.handle_flow_output(&mut state.ctx, out);
        }
        self.graphics_flows = flows;

        match state.render(
            &self.graphics_flows,
            #[cfg(feature = "integration-tests")]
            &self.async_runtime,
            #[cfg(feature = "integration-tests")]
            &self.proxy,
        ) {
            Ok(()) => (),
            // Reconfigure the surface if it's lost or outdated
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = state.ctx.window.inner_size();
                state.resize(size.width, size.height);
            }
            Err(e) => log::error!("Unable to render {}", e),
        }
        self.state = Some(state);
    }
}

pub(crate) enum FlowEvent<State: 'static, Event: 'static> {
    #[allow(dead_code)]
    Initialized {
        state: AppState<State>,
        flows: Vec<Box<dyn GraphicsFlow<State, Event>>>,
    },
    Custom(Event),
    #[allow(dead_code)]
    InitFailed(anyhow::Error),
    #[allow(dead_code)]
    Exit,
}

impl<State, Event> Debug for FlowEvent<State, Event> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialized { state: _, flows } => {
                f.debug_struct("Initialized").field("flows", flows).finish()
            }
            Self::Custom(_) => f.write_str("Custom(E)"),
            Self::InitFailed(e) => f.debug_tuple("InitFailed").field(e).finish(),
            Self::Exit => f.write_str("Exit"),
        }
    }
}

impl<State: 'static + Default, Event: 'static> ApplicationHandler<FlowEvent<State, Event>>
    for App<State, Event>
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(constructors) = self.constructors.take() else {
            return;
        };

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title("card-ngin");

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            let canvas = wgpu::web_sys::window()
                .and_then(|window| window.document())
                .and_then(|document| document.get_element_by_id(CANVAS_ID));
            match canvas {
                Some(canvas) => {
                    window_attributes = window_attributes.with_canvas(Some(canvas.unchecked_into()));
                }
                None => {
                    log::error!("No canvas with id {} in the page", CANVAS_ID);
                    self.init_error = Some(anyhow::anyhow!("no canvas with id {CANVAS_ID}"));
                    event_loop.exit();
                    return;
                }
            }
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Cannot create a window: {}", e);
                self.init_error = Some(anyhow::anyhow!("cannot create a window: {e}"));
                event_loop.exit();
                return;
            }
        };

        let init_future = async move {
            let app_state = AppState::new(window).await?;
            let flow_futures: Vec<_> = constructors
                .into_iter()
                // InitContext only clones the internal Arcs of Device and Queue
                .map(|constructor| constructor((&app_state.ctx).into()))
                .collect();
            let flows = futures::future::join_all(flow_futures)
                .await
                .into_iter()
                .collect::<anyhow::Result<Vec<_>>>()?;
            anyhow::Ok((app_state, flows))
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            let initialized = {
                let _guard = self.async_runtime.enter();
                futures::executor::block_on(init_future)
            };
            match initialized {
                Ok((app_state, flows)) => self.init_flows(app_state, flows),
                Err(e) => {
                    log::error!("Initialization failed: {:#}", e);
                    self.init_error = Some(e);
                    event_loop.exit();
                }
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let event = match init_future.await {
                    Ok((state, flows)) => FlowEvent::Initialized { state, flows },
                    Err(e) => {
                        log::error!("Initialization failed: {:#}", e);
                        FlowEvent::InitFailed(e)
                    }
                };
                if proxy.send_event(event).is_err() {
                    log::error!("Event loop was closed during initialization");
                }
            });
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: FlowEvent<State, Event>) {
        match event {
            // This is the message from our wasm `spawn_local`
            FlowEvent::Initialized { state, flows } => self.init_flows(state, flows),
            FlowEvent::Custom(custom_event) => {
                if let Some(state) = &mut self.state {
                    let result = self
                        .graphics_flows
                        .iter_mut()
                        .fold(Some(custom_event), |event, flow| {
                            flow.on_custom_events(&state.ctx, &mut state.state, event?)
                        });
                    if result.is_some() {
                        log::warn!("Custom event was not consumed by any flow");
                    }
                }
            }
            FlowEvent::InitFailed(e) => {
                self.init_error = Some(e);
                event_loop.exit();
            }
            FlowEvent::Exit => event_loop.exit(),
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        #[cfg(not(target_arch = "wasm32"))]
        {
            let _guard = self.async_runtime.enter();
            self.local_pool.run_until_stalled();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(mut state) = self.state.take() else {
            return;
        };

        state.ctx.camera.controller.handle_window_events(&event);
        let mut flows = std::mem::take(&mut self.graphics_flows);
        for flow in flows.iter_mut() {
            let out = flow.on_window_events(&state.ctx, &mut state.state, &event);
            self.handle_flow_output(&mut state.ctx, out);
        }
        self.graphics_flows = flows;

        match &event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => state.resize(size.width, size.height),
            _ => {}
        }
        self.state = Some(state);

        if let WindowEvent::RedrawRequested = event {
            self.redraw();
        }
    }
}

/// Runs the event loop until the window closes. Fails when the window or any
/// flow could not be set up.
pub fn run<State: 'static + Default, Event: 'static>(
    constructors: Vec<FlowConsturctor<State, Event>>,
) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        // a logger may already be installed by the embedding page
        console_log::init_with_level(log::Level::Info).ok();
    }

    #[cfg(all(feature = "integration-tests", target_os = "linux"))]
    let event_loop: EventLoop<FlowEvent<State, Event>> = {
        use winit::platform::wayland::EventLoopBuilderExtWayland;

        winit::event_loop::EventLoop::with_user_event()
            .with_any_thread(true)
            .build()?
    };

    #[cfg(all(feature = "integration-tests", target_os = "windows"))]
    let event_loop: EventLoop<FlowEvent<State, Event>> = {
        use winit::platform::windows::EventLoopBuilderExtWindows;

        winit::event_loop::EventLoop::with_user_event()
            .with_any_thread(true)
            .build()?
    };

    #[cfg(not(feature = "integration-tests"))]
    let event_loop: EventLoop<FlowEvent<State, Event>> = EventLoop::with_user_event().build()?;

    let mut app: App<State, Event> = App::new(&event_loop, constructors)?;

    event_loop.run_app(&mut app)?;

    match app.init_error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
