/// Bind group layout of a standard material: diffuse texture, its sampler
/// and the material uniform.
pub fn material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
        label: Some("material_bind_group_layout"),
    })
}

fn is_remote(file_name: &str) -> bool {
    file_name.starts_with("http://") || file_name.starts_with("https://")
}

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> anyhow::Result<reqwest::Url> {
    if is_remote(file_name) {
        return Ok(reqwest::Url::parse(file_name)?);
    }
    let window = web_sys::window().ok_or_else(|| anyhow::anyhow!("No browser window"))?;
    let origin = window
        .location()
        .origin()
        .map_err(|_| anyhow::anyhow!("Cannot read the page origin"))?;
    let base = reqwest::Url::parse(&format!("{}/assets/", origin))?;
    Ok(base.join(file_name)?)
}

/// Reads `file_name` from the `assets` directory, or fetches it when it is an
/// `http(s)://` URL. On the web every name is resolved against the page origin.
pub async fn load_binary(file_name: &str) -> anyhow::Result<Vec<u8>> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = format_url(file_name)?;
        reqwest::get(url)
            .await?
            .error_for_status()?
            .bytes()
            .await?
            .to_vec()
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = if is_remote(file_name) {
        reqwest::get(file_name)
            .await?
            .error_for_status()?
            .bytes()
            .await?
            .to_vec()
    } else {
        let path = std::path::Path::new("./").join("assets").join(file_name);
        tokio::fs::read(&path)
            .await
            .map_err(|e| anyhow::anyhow!("Cannot read {}: {}", path.display(), e))?
    };

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_http_urls_are_remote() {
        assert!(is_remote("https://assets.babylonjs.com/meshes/HVGirl.glb"));
        assert!(is_remote("http://localhost/a.glb"));
        assert!(!is_remote("fonts/card.ttf"));
    }

    #[tokio::test]
    async fn missing_asset_files_are_reported() {
        let err = load_binary("does/not/exist.bin").await.unwrap_err();
        assert!(err.to_string().contains("does/not/exist.bin"), "{}", err);
    }
}
