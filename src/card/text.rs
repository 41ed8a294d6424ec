//! The card's printed face: title, subtitle lines, id and border label.
//!
//! Font sizes are derived from the title. The title is measured once in bold
//! at a reference size and scaled so that it spans the texture width with a
//! margin; every other size is a fixed ratio of the title size.

use crate::data_structures::dynamic_texture::{DynamicTexture, Typeface};

pub const TEXTURE_WIDTH: u32 = 600;
pub const TEXTURE_HEIGHT: u32 = 900;

const TITLE_REFERENCE_PX: f32 = 48.0;
const SUBTITLE_REFERENCE_PX: f32 = 18.0;
const ID_REFERENCE_PX: f32 = 32.0;
const BORDER_REFERENCE_PX: f32 = 18.0;

const BLACK: [u8; 3] = [0x00, 0x00, 0x00];
const SUBTITLE_GREY: [u8; 3] = [0x66, 0x66, 0x66];
const ID_GREY: [u8; 3] = [0x55, 0x55, 0x55];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CardTextPayload {
    pub title: String,
    pub subtitle: Vec<String>,
    pub id: String,
    pub border_label: String,
}

impl Default for CardTextPayload {
    fn default() -> Self {
        Self {
            title: "My title".to_string(),
            subtitle: vec![
                "My subtitle could be a way too long.".to_string(),
                "It's an explanation or a list.".to_string(),
                "Whatever you need".to_string(),
            ],
            id: "12345678".to_string(),
            border_label: "My name".to_string(),
        }
    }
}

/// Pixel sizes of every text element.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CardTextLayout {
    pub title_px: f32,
    pub subtitle_px: f32,
    pub border_px: f32,
    pub id_px: f32,
}

impl CardTextLayout {
    pub fn compute(payload: &CardTextPayload, bold: &dyn Typeface) -> Self {
        let measured = bold.measure(&payload.title, TITLE_REFERENCE_PX);
        let ratio = (measured / TITLE_REFERENCE_PX) * 1.5;
        let mut title_px = (TEXTURE_WIDTH as f32 / (ratio * 1.5)).floor();
        // an empty title measures zero and would divide to infinity
        if measured <= 0.0 || !title_px.is_finite() {
            title_px = TEXTURE_HEIGHT as f32;
        }
        let layout = Self {
            title_px,
            subtitle_px: SUBTITLE_REFERENCE_PX / TITLE_REFERENCE_PX * title_px,
            border_px: BORDER_REFERENCE_PX / TITLE_REFERENCE_PX * title_px,
            id_px: ID_REFERENCE_PX / TITLE_REFERENCE_PX * title_px,
        };
        log::debug!("Card text layout for {:?}: {:?}", payload.title, layout);
        layout
    }
}

/// Draws `payload` onto a fresh transparent texture.
pub fn rasterize_card_text(
    payload: &CardTextPayload,
    regular: &dyn Typeface,
    bold: &dyn Typeface,
) -> DynamicTexture {
    let layout = CardTextLayout::compute(payload, bold);
    let mut texture = DynamicTexture::new(TEXTURE_WIDTH, TEXTURE_HEIGHT);

    texture.draw_text(&payload.title, 50.0, 625.0, bold, layout.title_px, BLACK);
    for (s, line) in payload.subtitle.iter().enumerate() {
        let y = 690.0 + 50.0 * s as f32;
        texture.draw_text(line, 50.0, y, bold, layout.subtitle_px, SUBTITLE_GREY);
    }
    texture.draw_text(&payload.border_label, 50.0, 40.0, regular, layout.border_px, BLACK);
    texture.draw_text(
        &format!("#{}", payload.id),
        TEXTURE_WIDTH as f32 / 2.0,
        50.0,
        regular,
        layout.id_px,
        ID_GREY,
    );
    texture
}
