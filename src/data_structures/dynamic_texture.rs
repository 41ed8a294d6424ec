//! A CPU-side RGBA drawing surface that is uploaded as a texture.
//!
//! Text is drawn through a [`Typeface`]: either a real font rasterized by
//! `ab_glyph` or a fixed-advance block face used when no font can be parsed.

use ab_glyph::{Font, FontVec, PxScale, ScaleFont, point};
use image::{Rgba, RgbaImage};

use crate::error::SceneError;

/// Measures and rasterizes text at a pixel size.
pub trait Typeface {
    /// Horizontal advance of `text` in pixels.
    fn measure(&self, text: &str, px: f32) -> f32;

    /// Calls `plot(x, y, coverage)` for every covered pixel. Coordinates are
    /// relative to the start of the baseline, y grows downwards.
    fn rasterize(&self, text: &str, px: f32, plot: &mut dyn FnMut(i32, i32, f32));
}

/// A TTF/OTF font rasterized with `ab_glyph`.
pub struct GlyphTypeface {
    font: FontVec,
    // extra horizontal strokes for faces without a real bold cut
    embolden: u32,
}

impl GlyphTypeface {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, SceneError> {
        Self::from_collection(data, 0)
    }

    /// Face `index` of a font file, which may be a TTC collection.
    pub fn from_collection(data: Vec<u8>, index: u32) -> Result<Self, SceneError> {
        let font = FontVec::try_from_vec_and_index(data, index)
            .map_err(|e| SceneError::Font(e.to_string()))?;
        Ok(Self { font, embolden: 0 })
    }

    /// Fakes a bold cut by smearing every glyph `strokes` pixels to the right.
    pub fn emboldened(mut self, strokes: u32) -> Self {
        self.embolden = strokes;
        self
    }
}

impl Typeface for GlyphTypeface {
    fn measure(&self, text: &str, px: f32) -> f32 {
        let scaled = self.font.as_scaled(PxScale::from(px));
        let mut width = 0.0;
        let mut previous = None;
        for ch in text.chars() {
            let glyph_id = scaled.glyph_id(ch);
            if let Some(previous) = previous {
                width += scaled.kern(previous, glyph_id);
            }
            width += scaled.h_advance(glyph_id);
            previous = Some(glyph_id);
        }
        width
    }

    fn rasterize(&self, text: &str, px: f32, plot: &mut dyn FnMut(i32, i32, f32)) {
        let scale = PxScale::from(px);
        let scaled = self.font.as_scaled(scale);
        let mut cursor = 0.0;
        let mut previous = None;
        for ch in text.chars() {
            let glyph_id = scaled.glyph_id(ch);
            if let Some(previous) = previous {
                cursor += scaled.kern(previous, glyph_id);
            }
            let glyph = glyph_id.with_scale_and_position(scale, point(cursor, 0.0));
            if let Some(outlined) = self.font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                let (left, top) = (bounds.min.x as i32, bounds.min.y as i32);
                outlined.draw(|x, y, coverage| {
                    for stroke in 0..=self.embolden as i32 {
                        plot(left + x as i32 + stroke, top + y as i32, coverage);
                    }
                });
            }
            cursor += scaled.h_advance(glyph_id);
            previous = Some(glyph_id);
        }
    }
}

/// Deterministic stand-in face: every character advances by a fixed fraction
/// of the pixel size and every visible character is drawn as a solid box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlockTypeface {
    pub advance: f32,
    pub ascent: f32,
}

impl BlockTypeface {
    pub const REGULAR: BlockTypeface = BlockTypeface {
        advance: 0.6,
        ascent: 0.7,
    };
    pub const BOLD: BlockTypeface = BlockTypeface {
        advance: 0.7,
        ascent: 0.7,
    };
}

impl Typeface for BlockTypeface {
    fn measure(&self, text: &str, px: f32) -> f32 {
        text.chars().count() as f32 * self.advance * px
    }

    fn rasterize(&self, text: &str, px: f32, plot: &mut dyn FnMut(i32, i32, f32)) {
        let advance = self.advance * px;
        let height = (self.ascent * px).round() as i32;
        for (i, ch) in text.chars().enumerate() {
            if ch.is_whitespace() {
                continue;
            }
            let left = (i as f32 * advance + 0.1 * advance).round() as i32;
            let right = ((i + 1) as f32 * advance - 0.1 * advance).round() as i32;
            for y in -height..0 {
                for x in left..right {
                    plot(x, y, 1.0);
                }
            }
        }
    }
}

/// An RGBA drawing surface, transparent until something is drawn on it.
#[derive(Clone, Debug)]
pub struct DynamicTexture {
    image: RgbaImage,
}

impl DynamicTexture {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Draws `text` with its baseline starting at `(x, y)`, blending over what
    /// is already there. Pixels outside the surface are dropped.
    pub fn draw_text(
        &mut self,
        text: &str,
        x: f32,
        y: f32,
        face: &dyn Typeface,
        px: f32,
        color: [u8; 3],
    ) {
        let (ox, oy) = (x.round() as i32, y.round() as i32);
        let (width, height) = self.image.dimensions();
        let image = &mut self.image;
        face.rasterize(text, px, &mut |gx, gy, coverage| {
            let (tx, ty) = (ox + gx, oy + gy);
            if tx < 0 || ty < 0 || tx as u32 >= width || ty as u32 >= height {
                return;
            }
            let dst = image.get_pixel_mut(tx as u32, ty as u32);
            *dst = blend_over(*dst, color, coverage.clamp(0.0, 1.0));
        });
    }
}

/// Source-over compositing of a coloured sample with `alpha` onto `dst`,
/// both with straight alpha.
fn blend_over(dst: Rgba<u8>, color: [u8; 3], alpha: f32) -> Rgba<u8> {
    let dst_a = dst[3] as f32 / 255.0;
    let out_a = alpha + dst_a * (1.0 - alpha);
    if out_a <= 0.0 {
        return dst;
    }
    let mut out = [0u8; 4];
    for c in 0..3 {
        let value = (color[c] as f32 * alpha + dst[c] as f32 * dst_a * (1.0 - alpha)) / out_a;
        out[c] = value.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round() as u8;
    Rgba(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_face_measures_per_character() {
        let face = BlockTypeface::REGULAR;
        assert_eq!(face.measure("", 10.0), 0.0);
        assert!((face.measure("abcd", 10.0) - 24.0).abs() < 1e-5);
    }

    #[test]
    fn text_is_drawn_above_the_baseline() {
        let mut texture = DynamicTexture::new(64, 64);
        texture.draw_text("I", 10.0, 40.0, &BlockTypeface::REGULAR, 20.0, [255, 0, 0]);
        // box spans y in [26, 40)
        assert_eq!(texture.image().get_pixel(14, 30).0, [255, 0, 0, 255]);
        assert_eq!(texture.image().get_pixel(14, 41).0, [0, 0, 0, 0]);
        assert_eq!(texture.image().get_pixel(14, 20).0, [0, 0, 0, 0]);
    }

    #[test]
    fn drawing_off_the_surface_is_clipped() {
        let mut texture = DynamicTexture::new(8, 8);
        texture.draw_text("WWWW", -20.0, 100.0, &BlockTypeface::BOLD, 30.0, [0, 0, 0]);
        assert!(texture.image().pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }

    #[test]
    fn partial_coverage_blends_over_existing_pixels() {
        let half = blend_over(Rgba([255, 255, 255, 255]), [0, 0, 0], 0.5);
        assert_eq!(half.0, [128, 128, 128, 255]);
        let on_clear = blend_over(Rgba([0, 0, 0, 0]), [102, 102, 102], 0.5);
        assert_eq!(on_clear.0, [102, 102, 102, 128]);
    }

    #[test]
    fn garbage_font_bytes_are_rejected() {
        assert!(matches!(
            GlyphTypeface::from_bytes(vec![0, 1, 2, 3]),
            Err(SceneError::Font(_))
        ));
    }
}
