//! Typefaces for the card face.
//!
//! A named system family is preferred where one is installed (native only,
//! looked up with `fontdb`). Otherwise the DejaVu Sans cuts bundled into the
//! binary are used, so text renders the same on every platform.

use crate::{
    data_structures::dynamic_texture::{BlockTypeface, GlyphTypeface, Typeface},
    error::SceneError,
};

const BUNDLED_REGULAR: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");
const BUNDLED_BOLD: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans-Bold.ttf");

/// The regular and bold faces the card text is drawn with.
pub struct CardFaces {
    pub regular: Box<dyn Typeface>,
    pub bold: Box<dyn Typeface>,
}

pub fn bundled_faces() -> Result<CardFaces, SceneError> {
    Ok(CardFaces {
        regular: Box::new(GlyphTypeface::from_bytes(BUNDLED_REGULAR.to_vec())?),
        bold: Box::new(GlyphTypeface::from_bytes(BUNDLED_BOLD.to_vec())?),
    })
}

/// Regular and bold cut of an installed `family`. A family without a bold
/// cut gets an emboldened regular face.
#[cfg(not(target_arch = "wasm32"))]
pub fn system_faces(family: &str) -> Result<CardFaces, SceneError> {
    use fontdb::{Database, Family, Query, Weight};

    let mut db = Database::new();
    db.load_system_fonts();

    let load = |weight: Weight| -> Result<(GlyphTypeface, Weight), SceneError> {
        let query = Query {
            families: &[Family::Name(family)],
            weight,
            ..Query::default()
        };
        let id = db
            .query(&query)
            .ok_or_else(|| SceneError::Font(format!("system font `{family}` not found")))?;
        let found = db.face(id).map(|face| face.weight).unwrap_or(weight);
        let face = db
            .with_face_data(id, |data, index| GlyphTypeface::from_collection(data.to_vec(), index))
            .ok_or_else(|| SceneError::Font(format!("cannot read system font `{family}`")))??;
        Ok((face, found))
    };

    let (regular, _) = load(Weight::NORMAL)?;
    let (bold, weight) = load(Weight::BOLD)?;
    let bold = if weight.0 < Weight::SEMIBOLD.0 {
        bold.emboldened(1)
    } else {
        bold
    };
    Ok(CardFaces {
        regular: Box::new(regular),
        bold: Box::new(bold),
    })
}

/// Faces for the card: `family` if installed, else the bundled font. Block
/// glyphs are the last resort.
pub fn card_faces(family: Option<&str>) -> CardFaces {
    #[cfg(not(target_arch = "wasm32"))]
    if let Some(family) = family {
        match system_faces(family) {
            Ok(faces) => {
                log::info!("Card text uses the system font {}", family);
                return faces;
            }
            Err(e) => log::info!("{}, using the bundled font", e),
        }
    }
    #[cfg(target_arch = "wasm32")]
    let _ = family;

    match bundled_faces() {
        Ok(faces) => faces,
        Err(e) => {
            log::warn!("Bundled font is unusable, drawing block glyphs: {}", e);
            CardFaces {
                regular: Box::new(BlockTypeface::REGULAR),
                bold: Box::new(BlockTypeface::BOLD),
            }
        }
    }
}
