//! GPU textures and texture creation utilities.
//!
//! This module provides [`Texture`], a wrapper around a WGPU texture and its
//! default view, plus helpers for depth buffers, solid placeholder textures,
//! 2D textures decoded from image data and cubemaps assembled from a strip of
//! six faces.

use anyhow::*;
use image::GenericImageView;

/// A GPU texture and the view shaders sample it through.
#[derive(Clone, Debug)]
pub struct Texture {
    #[allow(unused)]
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

/// Colour space the texel data is stored in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorSpace {
    /// Albedo and skybox colours.
    Srgb,
    /// Data textures such as normal and height maps.
    Linear,
}

impl ColorSpace {
    fn format(self) -> wgpu::TextureFormat {
        match self {
            ColorSpace::Srgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            ColorSpace::Linear => wgpu::TextureFormat::Rgba8Unorm,
        }
    }
}

impl Texture {
    /// Depth/stencil format of the main depth buffer.
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

    /// Faces in a cubemap, in layer order +X, -X, +Y, -Y, +Z, -Z.
    pub const CUBE_FACES: u32 = 6;

    /// Create a depth/stencil texture matching the surface size.
    ///
    /// Zero-sized dimensions are clamped to one texel so a minimised window
    /// never produces an invalid texture descriptor.
    pub fn create_depth_texture(device: &wgpu::Device, size: [u32; 2], label: &str) -> Self {
        let size = wgpu::Extent3d {
            width: size[0].max(1),
            height: size[1].max(1),
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }

    /// Create a texture filled with a single colour.
    ///
    /// Used as a stand-in whenever an image asset is missing or fails to decode.
    pub fn create_solid(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        rgba: [u8; 4],
        color_space: ColorSpace,
        label: &str,
    ) -> Texture {
        let image = image::RgbaImage::from_pixel(1, 1, image::Rgba(rgba));
        Self::from_rgba(device, queue, &image, Some(label), color_space)
    }

    /// Load a texture from raw image file contents.
    ///
    /// # Arguments
    ///
    /// * `bytes` represent raw image file data (PNG, BMP, TIFF, etc.)
    /// * `label` is used as a debug name for the GPU resource
    /// * `color_space` selects between an sRGB and a linear texture format
    pub fn from_bytes(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        bytes: &[u8],
        label: &str,
        color_space: ColorSpace,
    ) -> Result<Self> {
        let img = image::load_from_memory(bytes)?;
        Ok(Self::from_image(device, queue, &img, Some(label), color_space))
    }

    pub fn from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        img: &image::DynamicImage,
        label: Option<&str>,
        color_space: ColorSpace,
    ) -> Self {
        Self::from_rgba(device, queue, &img.to_rgba8(), label, color_space)
    }

    fn from_rgba(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        rgba: &image::RgbaImage,
        label: Option<&str>,
        color_space: ColorSpace,
    ) -> Self {
        let dimensions = rgba.dimensions();
        let size = wgpu::Extent3d {
            width: dimensions.0,
            height: dimensions.1,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: color_space.format(),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * dimensions.0),
                rows_per_image: Some(dimensions.1),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }

    /// Build a cubemap from an image holding six square faces stacked
    /// vertically (`height == 6 * width`).
    pub fn cube_from_strip(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        img: &image::DynamicImage,
        label: &str,
    ) -> Result<Self> {
        let (width, height) = img.dimensions();
        let face = cube_face_size(width, height)
            .with_context(|| format!("{label}: expected a {width}x{} face strip, got {width}x{height}", width * 6))?;
        Ok(Self::cube_from_rgba(device, queue, &img.to_rgba8(), face, label))
    }

    /// A cubemap whose faces are flat colours, used when the skybox image is
    /// unavailable.
    pub fn placeholder_cube(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        const FACES: [[u8; 4]; 6] = [
            [92, 104, 128, 255],
            [92, 104, 128, 255],
            [150, 170, 200, 255],
            [30, 32, 40, 255],
            [100, 112, 138, 255],
            [84, 96, 120, 255],
        ];
        let mut strip = image::RgbaImage::new(1, Texture::CUBE_FACES);
        for (y, rgba) in FACES.iter().enumerate() {
            strip.put_pixel(0, y as u32, image::Rgba(*rgba));
        }
        Self::cube_from_rgba(device, queue, &strip, 1, "placeholder sky")
    }

    fn cube_from_rgba(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        strip: &image::RgbaImage,
        face: u32,
        label: &str,
    ) -> Self {
        let size = wgpu::Extent3d {
            width: face,
            height: face,
            depth_or_array_layers: Self::CUBE_FACES,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: ColorSpace::Srgb.format(),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        // The strip is tightly packed, so writing it as one copy lands each
        // face in consecutive array layers.
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            strip,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * face),
                rows_per_image: Some(face),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });
        Self { texture, view }
    }
}

/// Edge length of one face in a vertical six-face strip, if the dimensions
/// describe one.
pub fn cube_face_size(width: u32, height: u32) -> Option<u32> {
    (width > 0 && height == width * Texture::CUBE_FACES).then_some(width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_vertical_face_strips() {
        assert_eq!(cube_face_size(64, 384), Some(64));
        assert_eq!(cube_face_size(1, 6), Some(1));
        assert_eq!(cube_face_size(64, 64), None);
        assert_eq!(cube_face_size(384, 64), None);
        assert_eq!(cube_face_size(0, 0), None);
    }

    #[test]
    fn colour_spaces_pick_matching_formats() {
        assert!(ColorSpace::Srgb.format().is_srgb());
        assert!(!ColorSpace::Linear.format().is_srgb());
    }
}
