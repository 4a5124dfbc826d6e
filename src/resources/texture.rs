use crate::{
    config::AssetPaths,
    data_structures::texture::{ColorSpace, Texture},
    resources::load_binary,
};

pub async fn load_texture(
    paths: &AssetPaths,
    file_name: &str,
    color_space: ColorSpace,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> anyhow::Result<Texture> {
    let data = load_binary(paths, file_name).await?;
    Texture::from_bytes(device, queue, &data, file_name, color_space)
}

/// Loads a 2D texture, substituting a 1x1 texture of `placeholder` when the
/// file is missing or cannot be decoded.
pub async fn load_texture_or(
    paths: &AssetPaths,
    file_name: &str,
    color_space: ColorSpace,
    placeholder: [u8; 4],
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> Texture {
    match load_texture(paths, file_name, color_space, device, queue).await {
        Ok(texture) => {
            log::info!("Loaded texture {}", file_name);
            texture
        }
        Err(e) => {
            log::warn!("Texture {} unavailable, using a placeholder: {:#}", file_name, e);
            Texture::create_solid(device, queue, placeholder, color_space, file_name)
        }
    }
}

/// Loads a skybox cubemap stored as a vertical strip of six faces, falling back
/// to flat-coloured faces.
pub async fn load_cubemap_or_placeholder(
    paths: &AssetPaths,
    file_name: &str,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> Texture {
    let loaded = async {
        let data = load_binary(paths, file_name).await?;
        let img = image::load_from_memory(&data)?;
        Texture::cube_from_strip(device, queue, &img, file_name)
    };
    match loaded.await {
        Ok(texture) => {
            log::info!("Loaded cubemap {}", file_name);
            texture
        }
        Err(e) => {
            log::warn!("Cubemap {} unavailable, using a placeholder: {:#}", file_name, e);
            Texture::placeholder_cube(device, queue)
        }
    }
}
