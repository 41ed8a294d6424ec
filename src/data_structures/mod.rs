//! Engine data structures: the scene graph and everything hanging off it.
//!
//! - `scene_graph` owns nodes, meshes, materials and textures by handle
//! - `model` contains mesh data, materials and their GPU counterparts
//! - `primitives` builds boxes, cylinders and planes
//! - `csg` does boolean operations on triangle solids
//! - `dynamic_texture` rasterizes text into an image
//! - `animation` holds property animations and glTF animation groups
//! - `skin` poses skinned meshes on the CPU
//! - `gpu_scene` mirrors the scene graph into GPU buffers
//! - `instance` holds per-instance transformation data
//! - `texture` contains the GPU texture wrapper

pub mod animation;
pub mod csg;
pub mod dynamic_texture;
pub mod gpu_scene;
pub mod instance;
pub mod model;
pub mod primitives;
pub mod scene_graph;
pub mod skin;
pub mod texture;
