//! Loading of external data: files and URLs, glTF assets and their
//! animations, and the fonts of the card face.

pub mod animation;
pub mod font;
pub mod gltf;
pub mod texture;

pub use texture::load_binary;

/// Fetches `file_name` (see [`load_binary`]) and imports it as glTF.
pub async fn load_model_gltf(file_name: &str) -> anyhow::Result<gltf::ImportedScene> {
    log::info!("Loading {}", file_name);
    let bytes = load_binary(file_name).await?;
    let imported = self::gltf::import_gltf(&bytes)?;
    log::info!("Loaded {}", file_name);
    Ok(imported)
}
