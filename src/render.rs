//! Render composition and pipeline batching.
//!
//! Flows describe what to draw with a [`Render`] value each frame. The engine
//! walks it, sorts the draws into the opaque and the transparent batch and
//! issues the opaque batch first.

use crate::data_structures::model::{Material, Mesh};

/// One instanced draw of a mesh with a material.
#[derive(Clone, Copy)]
pub struct Instanced<'a> {
    pub instance: &'a wgpu::Buffer,
    pub mesh: &'a Mesh,
    pub material: &'a Material,
    pub amount: usize,
    /// Distance from the camera, used to order transparent draws.
    pub depth: f32,
}

/// Specifies how a scene object should be rendered.
///
/// # Variants
///
/// - `None` renders nothing
/// - `Default(Instanced)` renders a single opaque instanced object
/// - `Defaults(Vec<Instanced>)` renders a batch of opaque instanced objects
/// - `Transparent(Instanced)` renders a single blended object
/// - `Transparents(Vec<Instanced>)` renders a batch of blended objects
/// - `Composed(Vec<Render>)` recursively renders a composition of renders
pub enum Render<'a> {
    None,
    Default(Instanced<'a>),
    Defaults(Vec<Instanced<'a>>),
    Transparent(Instanced<'a>),
    Transparents(Vec<Instanced<'a>>),
    Composed(Vec<Render<'a>>),
}

impl<'a> Render<'a> {
    pub(crate) fn set_pipelines(
        self,
        basics: &mut Vec<Instanced<'a>>,
        trans: &mut Vec<Instanced<'a>>,
    ) {
        match self {
            Render::Default(instanced) => basics.push(instanced),
            Render::Defaults(mut vec) => basics.append(&mut vec),
            Render::Transparent(instanced) => trans.push(instanced),
            Render::Transparents(mut vec) => trans.append(&mut vec),
            Render::Composed(renders) => renders
                .into_iter()
                .for_each(|render| render.set_pipelines(basics, trans)),
            Render::None => (),
        }
    }
}

/// Orders blended draws back to front.
pub(crate) fn sort_back_to_front(trans: &mut [Instanced<'_>]) {
    trans.sort_by(|a, b| b.depth.total_cmp(&a.depth));
}
