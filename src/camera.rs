//! Arc-rotate camera: orbits a target at a distance, driven by two angles.
//!
//! The scene uses a left-handed, y-up coordinate system. `alpha` is the
//! longitudinal angle in the xz plane and `beta` the latitude measured from
//! the +y axis, both in radians.

use std::f32::consts::PI;

use cgmath::{Matrix4, Point3, SquareMatrix, Vector3};
use instant::Duration;
use winit::{
    dpi::PhysicalPosition,
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ArcRotateCamera {
    pub alpha: f32,
    pub beta: f32,
    pub radius: f32,
    pub target: Point3<f32>,
}

impl ArcRotateCamera {
    pub fn new(alpha: f32, beta: f32, radius: f32, target: impl Into<Point3<f32>>) -> Self {
        Self {
            alpha,
            beta,
            radius,
            target: target.into(),
        }
    }

    pub fn position(&self) -> Point3<f32> {
        let (sin_a, cos_a) = self.alpha.sin_cos();
        let (sin_b, cos_b) = self.beta.sin_cos();
        self.target
            + Vector3::new(
                self.radius * cos_a * sin_b,
                self.radius * cos_b,
                self.radius * sin_a * sin_b,
            )
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_lh(self.position(), self.target, Vector3::unit_y())
    }
}

/// Left-handed perspective projection with a 0..1 depth range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    aspect: f32,
    fovy: f32,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new(width: u32, height: u32, fovy: f32, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width.max(1) as f32 / height.max(1) as f32,
            fovy,
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        let f = 1.0 / (self.fovy / 2.0).tan();
        let depth = self.zfar / (self.zfar - self.znear);
        #[rustfmt::skip]
        let projection = Matrix4::new(
            f / self.aspect, 0.0, 0.0, 0.0,
            0.0, f, 0.0, 0.0,
            0.0, 0.0, depth, 1.0,
            0.0, 0.0, -self.znear * depth, 0.0,
        );
        projection
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraLimits {
    pub lower_beta: f32,
    pub upper_beta: f32,
    pub lower_radius: f32,
    pub upper_radius: f32,
}

impl Default for CameraLimits {
    fn default() -> Self {
        Self {
            lower_beta: 0.01,
            upper_beta: PI - 0.01,
            lower_radius: 1.0,
            upper_radius: 200.0,
        }
    }
}

/// Left-drag orbits, the wheel zooms. Input is accumulated from window
/// events and applied once per frame in [`CameraController::update`].
#[derive(Debug)]
pub struct CameraController {
    /// Radians per dragged pixel.
    pub angular_speed: f32,
    /// Fraction of the radius per wheel line.
    pub zoom_speed: f32,
    pub limits: CameraLimits,
    dragging: bool,
    last_cursor: Option<PhysicalPosition<f64>>,
    rotate_horizontal: f32,
    rotate_vertical: f32,
    scroll: f32,
}

impl CameraController {
    pub fn new(angular_speed: f32, zoom_speed: f32) -> Self {
        Self {
            angular_speed,
            zoom_speed,
            limits: CameraLimits::default(),
            dragging: false,
            last_cursor: None,
            rotate_horizontal: 0.0,
            rotate_vertical: 0.0,
            scroll: 0.0,
        }
    }

    pub fn handle_window_events(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.dragging = *state == ElementState::Pressed;
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let (true, Some(last)) = (self.dragging, self.last_cursor) {
                    self.rotate_horizontal += (position.x - last.x) as f32;
                    self.rotate_vertical += (position.y - last.y) as f32;
                }
                self.last_cursor = Some(*position);
            }
            WindowEvent::CursorLeft { .. } => {
                self.dragging = false;
                self.last_cursor = None;
            }
            WindowEvent::MouseWheel { delta, .. } => {
                self.scroll += match delta {
                    MouseScrollDelta::LineDelta(_, lines) => *lines,
                    MouseScrollDelta::PixelDelta(PhysicalPosition { y, .. }) => *y as f32 / 100.0,
                };
            }
            _ => (),
        }
    }

    pub fn update(&mut self, camera: &mut ArcRotateCamera, _dt: Duration) {
        camera.alpha -= self.rotate_horizontal * self.angular_speed;
        camera.beta -= self.rotate_vertical * self.angular_speed;
        camera.radius -= self.scroll * self.zoom_speed * camera.radius;
        self.rotate_horizontal = 0.0;
        self.rotate_vertical = 0.0;
        self.scroll = 0.0;

        camera.beta = camera
            .beta
            .clamp(self.limits.lower_beta, self.limits.upper_beta);
        camera.radius = camera
            .radius
            .clamp(self.limits.lower_radius, self.limits.upper_radius);
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &ArcRotateCamera, projection: &Projection) {
        self.view_position = camera.position().to_homogeneous().into();
        self.view_proj = (projection.calc_matrix() * camera.calc_matrix()).into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct CameraResources {
    pub camera: ArcRotateCamera,
    pub controller: CameraController,
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}
