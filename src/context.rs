//! GPU and window context shared by every flow.
//!
//! [`Context`] owns the surface, device, queue, camera, light and the render
//! pipelines. Flows may change it in `on_init` (clear colour, camera, light)
//! and read it everywhere else. [`InitContext`] is the slice of it handed to
//! flow constructors so they can create GPU resources before the first frame.

use std::sync::Arc;

use cgmath::Point3;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::{
    camera::{ArcRotateCamera, CameraController, CameraResources, CameraUniform, Projection},
    data_structures::texture,
    pipelines::{
        basic::mk_basic_pipeline,
        light::{LightResources, LightUniform},
        transparent::mk_transparent_pipeline,
    },
};

/// Field of view used until a flow configures the camera.
pub const DEFAULT_FOVY: f32 = 0.8;
pub const DEFAULT_ZNEAR: f32 = 1.0;
pub const DEFAULT_ZFAR: f32 = 10000.0;

#[derive(Debug)]
pub struct Pipelines {
    pub basic: wgpu::RenderPipeline,
    pub transparent: wgpu::RenderPipeline,
}

#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub(crate) depth_texture: texture::Texture,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub camera: CameraResources,
    pub projection: Projection,
    pub light: LightResources,
    pub pipelines: Pipelines,
    pub clear_colour: wgpu::Color,
}

impl Context {
    pub async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let size = window.inner_size();

        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        log::info!("device and queue");
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                // WebGL doesn't support all of wgpu's features, so if
                // we're building for the web we'll have to disable some.
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;

        log::info!("Surface");
        let surface_caps = surface.get_capabilities(&adapter);
        // The shader writes linear colours, so prefer an sRGB surface.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow::anyhow!("The surface reports no supported formats"))?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let camera = ArcRotateCamera::new(
            std::f32::consts::FRAC_PI_2,
            std::f32::consts::FRAC_PI_2,
            10.0,
            Point3::new(0.0, 0.0, 0.0),
        );
        let projection = Projection::new(
            config.width,
            config.height,
            DEFAULT_FOVY,
            DEFAULT_ZNEAR,
            DEFAULT_ZFAR,
        );
        let camera = mk_camera_resources(&device, camera, &projection);

        let depth_texture = texture::Texture::create_depth_texture(
            &device,
            [config.width, config.height],
            "depth_texture",
        );

        let light = LightResources::new(LightUniform::hemispheric([0.0, 1.0, 0.0]), &device);

        log::info!("Pipelines");
        let pipelines = Pipelines {
            basic: mk_basic_pipeline(
                &device,
                &config,
                &light.bind_group_layout,
                &camera.bind_group_layout,
            ),
            transparent: mk_transparent_pipeline(
                &device,
                &config,
                &light.bind_group_layout,
                &camera.bind_group_layout,
            ),
        };

        Ok(Self {
            surface,
            device,
            queue,
            config,
            camera,
            projection,
            light,
            pipelines,
            window,
            depth_texture,
            clear_colour: wgpu::Color {
                r: 0.1,
                g: 0.2,
                b: 0.3,
                a: 1.0,
            },
        })
    }

    /// Replaces the camera and its lens. The controller and its limits are kept.
    pub fn set_camera(&mut self, camera: ArcRotateCamera, fovy: f32, znear: f32, zfar: f32) {
        self.camera.camera = camera;
        self.projection = Projection::new(self.config.width, self.config.height, fovy, znear, zfar);
        self.write_camera();
    }

    pub fn set_light(&mut self, uniform: LightUniform) {
        self.light.uniform = uniform;
        self.light.write(&self.queue);
    }

    pub(crate) fn write_camera(&mut self) {
        self.camera
            .uniform
            .update_view_proj(&self.camera.camera, &self.projection);
        self.queue.write_buffer(
            &self.camera.buffer,
            0,
            bytemuck::cast_slice(&[self.camera.uniform]),
        );
    }
}

fn mk_camera_resources(
    device: &wgpu::Device,
    camera: ArcRotateCamera,
    projection: &Projection,
) -> CameraResources {
    let mut uniform = CameraUniform::new();
    uniform.update_view_proj(&camera, projection);

    let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Camera Buffer"),
        contents: bytemuck::cast_slice(&[uniform]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    });

    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("camera_bind_group_layout"),
    });

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout: &bind_group_layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }],
        label: Some("camera_bind_group"),
    });

    CameraResources {
        camera,
        controller: CameraController::new(0.005, 0.1),
        uniform,
        buffer,
        bind_group,
        bind_group_layout,
    }
}

/// What a flow constructor gets to prepare GPU resources with.
///
/// `wgpu::Device` and `wgpu::Queue` are reference counted, so this is a
/// cheap handle onto the same device as the [`Context`].
#[derive(Clone, Debug)]
pub struct InitContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl From<&Context> for InitContext {
    fn from(ctx: &Context) -> Self {
        Self {
            device: ctx.device.clone(),
            queue: ctx.queue.clone(),
        }
    }
}
