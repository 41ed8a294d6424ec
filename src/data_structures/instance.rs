//! Instance transformation data for GPU rendering.
//!
//! Every scene node carries a local `Instance`. World transforms are kept as
//! matrices and packed into an `InstanceRaw`, which is bound as a per-instance
//! vertex buffer so the shaders receive the model and normal matrices.

use cgmath::{InnerSpace, Matrix, One, Rotation3, SquareMatrix};

use crate::data_structures::model;

/// Per-instance transformation: position, rotation (as quaternion), and scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Instance {
    pub position: cgmath::Vector3<f32>,
    pub rotation: cgmath::Quaternion<f32>,
    pub scale: cgmath::Vector3<f32>,
}

impl Instance {
    /// Create a new instance with identity transformation (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: cgmath::Vector3::new(0.0, 0.0, 0.0),
            // `Quaternion::one()` is the identity quaternion (no rotation)
            rotation: cgmath::Quaternion::one(),
            scale: cgmath::Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn to_matrix(&self) -> cgmath::Matrix4<f32> {
        cgmath::Matrix4::from_translation(self.position)
            * cgmath::Matrix4::from(self.rotation)
            * cgmath::Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    pub fn to_raw(&self) -> InstanceRaw {
        InstanceRaw::from_matrix(&self.to_matrix())
    }

    /// Transforms a point from this instance's space into its parent's space.
    pub fn transform_point(&self, point: cgmath::Vector3<f32>) -> cgmath::Vector3<f32> {
        let scaled = cgmath::Vector3::new(
            self.scale.x * point.x,
            self.scale.y * point.y,
            self.scale.z * point.z,
        );
        self.position + self.rotation * scaled
    }

    /// Splits an affine matrix into translation, rotation and scale. A mirroring
    /// matrix gets a negative z scale.
    pub fn from_matrix(m: &cgmath::Matrix4<f32>) -> Instance {
        let position = m.w.truncate();
        let mut x = m.x.truncate();
        let mut y = m.y.truncate();
        let mut z = m.z.truncate();
        let mut scale = cgmath::Vector3::new(x.magnitude(), y.magnitude(), z.magnitude());
        if m.determinant() < 0.0 {
            scale.z = -scale.z;
        }
        if scale.x.abs() > f32::EPSILON {
            x /= scale.x;
        }
        if scale.y.abs() > f32::EPSILON {
            y /= scale.y;
        }
        if scale.z.abs() > f32::EPSILON {
            z /= scale.z;
        }
        let rotation = cgmath::Quaternion::from(cgmath::Matrix3::from_cols(x, y, z)).normalize();
        Instance {
            position,
            rotation,
            scale,
        }
    }
}

/// Builds a rotation from Euler angles (radians) applied roll (z), then pitch (x),
/// then yaw (y).
pub fn rotation_from_euler(euler: cgmath::Vector3<f32>) -> cgmath::Quaternion<f32> {
    let yaw = cgmath::Quaternion::from_angle_y(cgmath::Rad(euler.y));
    let pitch = cgmath::Quaternion::from_angle_x(cgmath::Rad(euler.x));
    let roll = cgmath::Quaternion::from_angle_z(cgmath::Rad(euler.z));
    yaw * pitch * roll
}

impl From<cgmath::Vector3<f32>> for Instance {
    fn from(position: cgmath::Vector3<f32>) -> Self {
        Instance {
            position,
            ..Default::default()
        }
    }
}

impl Default for Instance {
    fn default() -> Self {
        Self::new()
    }
}

/**
 * The raw instance is the actual data stored on the GPU
 */
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    model: [[f32; 4]; 4],
    normal: [[f32; 3]; 3],
}

impl InstanceRaw {
    pub fn from_matrix(world: &cgmath::Matrix4<f32>) -> InstanceRaw {
        let upper = cgmath::Matrix3::from_cols(
            world.x.truncate(),
            world.y.truncate(),
            world.z.truncate(),
        );
        // inverse transpose keeps normals perpendicular under non-uniform scale
        let normal = upper
            .invert()
            .map(|inv| inv.transpose())
            .unwrap_or_else(cgmath::Matrix3::identity);
        InstanceRaw {
            model: (*world).into(),
            normal: normal.into(),
        }
    }
}

/**
 * As we store vertex data directly in the GPU memory we need to tell what the bytes refer to:
 *
 * offset: zero as we want to use the full space.
 * stride: length of a vertex
 *
 * Stride layout here: position + rotation + scale as 4x4 matrix (hence the four 4d vectors)
 */
impl model::Vertex for InstanceRaw {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            // The shader only moves on to the next instance once a new instance starts
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
                // A mat4 takes up 4 vertex slots as it is technically 4 vec4s.
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 6,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 7,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 12]>() as wgpu::BufferAddress,
                    shader_location: 8,
                    format: wgpu::VertexFormat::Float32x4,
                },
                // Normal matrix as 3x3
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 16]>() as wgpu::BufferAddress,
                    shader_location: 9,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 19]>() as wgpu::BufferAddress,
                    shader_location: 10,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 22]>() as wgpu::BufferAddress,
                    shader_location: 11,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}
