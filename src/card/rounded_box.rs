//! A box with rounded vertical edges, built by CSG from up to nine primitives.
//!
//! The box lies in the xz plane: `width` along x, `height` along z and
//! `thickness` along y. The straight parts are four edge boxes plus one
//! centre box, the rounded corners are cylinders of diameter `2 * radius`.

use cgmath::Vector3;

use crate::{
    data_structures::{
        csg::Solid,
        instance::Instance,
        model::MeshData,
        primitives::{DEFAULT_TESSELLATION, create_box, create_cylinder},
    },
    error::SceneError,
};

/// Straight parts shorter than this are left out.
const DEGENERATE: f32 = 1e-5;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RoundedBoxParams {
    pub thickness: f32,
    pub corner_radius: f32,
    pub width: f32,
    pub height: f32,
}

impl RoundedBoxParams {
    pub fn validate(&self) -> Result<(), SceneError> {
        let fail = |reason| {
            Err(SceneError::InvalidRoundedBox {
                thickness: self.thickness as f64,
                corner_radius: self.corner_radius as f64,
                width: self.width as f64,
                height: self.height as f64,
                reason,
            })
        };
        let dimensions = [self.thickness, self.corner_radius, self.width, self.height];
        if dimensions.iter().any(|d| !d.is_finite()) {
            return fail("dimensions must be finite");
        }
        if dimensions.iter().any(|&d| d <= 0.0) {
            return fail("dimensions must be positive");
        }
        if self.corner_radius > self.width.min(self.height) / 2.0 {
            return fail("corner radius exceeds half the shorter side");
        }
        Ok(())
    }
}

/// Builds the solid centred on the origin.
pub fn build_rounded_box(params: &RoundedBoxParams) -> Result<Solid, SceneError> {
    params.validate()?;
    let RoundedBoxParams {
        thickness: t,
        corner_radius: r,
        width,
        height,
    } = *params;

    // distance between the centres of opposite corners
    let w_c2c = width - 2.0 * r;
    let h_c2c = height - 2.0 * r;
    let (half_w, half_h) = (w_c2c / 2.0, h_c2c / 2.0);

    let place = |mesh: MeshData, x: f32, z: f32| {
        Solid::from_mesh(&mesh, &Instance::from(Vector3::new(x, 0.0, z)))
    };
    let corner = |x: f32, z: f32| place(create_cylinder("corner", t, 2.0 * r, DEFAULT_TESSELLATION), x, z);

    let center = place(create_box("centerBase", w_c2c + r, t, h_c2c + r), 0.0, 0.0);
    // at the largest radius opposite corners meet and the edge boxes between them vanish
    let xs: &[f32] = if w_c2c > DEGENERATE { &[-half_w, half_w] } else { &[0.0] };
    let zs: &[f32] = if h_c2c > DEGENERATE { &[-half_h, half_h] } else { &[0.0] };
    let mut parts = Vec::with_capacity(8);
    if w_c2c > DEGENERATE {
        for &z in zs {
            parts.push(place(create_box("topBase", w_c2c, t, 2.0 * r), 0.0, z));
        }
    }
    if h_c2c > DEGENERATE {
        for &x in xs {
            parts.push(place(create_box("leftBase", 2.0 * r, t, h_c2c), x, 0.0));
        }
    }
    for &x in xs {
        for &z in zs {
            parts.push(corner(x, z));
        }
    }

    let solid = parts.into_iter().fold(center, Solid::union);
    if solid.is_empty() {
        return Err(SceneError::EmptySolid { operation: "union" });
    }
    log::debug!("Rounded box has {} polygons", solid.polygons().len());
    Ok(solid)
}
