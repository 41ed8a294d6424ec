//! Render pipelines.
//!
//! - `basic` draws opaque meshes with the standard material shader
//! - `transparent` draws blended meshes with the same shader
//! - `light` holds the hemispheric light uniform and its bind group

pub mod basic;
pub mod light;
pub mod transparent;
