//! Window, surface and GPU device.
//!
//! [`Context`] owns everything tied to the window. [`request_gpu`] is also
//! used without a window, e.g. for offscreen rendering in tests.

use std::sync::Arc;

use anyhow::Context as _;
use winit::window::Window;

use crate::data_structures::texture::Texture;

/// Features used when the adapter offers them: line fill for the wireframe
/// toggle and depth clamping for the sphere's rasterizer state.
pub const OPTIONAL_FEATURES: [wgpu::Features; 2] =
    [wgpu::Features::POLYGON_MODE_LINE, wgpu::Features::DEPTH_CLIP_CONTROL];

/// Requests an adapter, device and queue. Pass the window's surface so the
/// adapter can present to it.
pub async fn request_gpu(
    instance: &wgpu::Instance,
    compatible_surface: Option<&wgpu::Surface<'_>>,
) -> anyhow::Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue)> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface,
            force_fallback_adapter: false,
        })
        .await
        .context("no suitable GPU adapter")?;

    let info = adapter.get_info();
    log::info!("Using {} ({:?})", info.name, info.backend);

    let available = adapter.features();
    let required_features = OPTIONAL_FEATURES
        .into_iter()
        .filter(|f| available.contains(*f))
        .fold(wgpu::Features::empty(), |acc, f| acc | f);
    if !required_features.contains(wgpu::Features::POLYGON_MODE_LINE) {
        log::warn!("Adapter lacks line fill; wireframe mode will render solid");
    }

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("Tessellation Demo Device"),
            required_features,
            required_limits: wgpu::Limits::default(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        })
        .await
        .context("failed to create the GPU device")?;
    // Validation errors are logged; the frame that caused them is lost.
    device.on_uncaptured_error(Arc::new(|error: wgpu::Error| {
        log::error!("GPU error: {error}");
    }));

    Ok((adapter, device, queue))
}

#[derive(Debug)]
pub struct Context {
    pub window: Arc<Window>,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub depth_texture: Texture,
    is_surface_configured: bool,
}

impl Context {
    pub async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance
            .create_surface(window.clone())
            .context("failed to create the window surface")?;
        let (adapter, device, queue) = request_gpu(&instance, Some(&surface)).await?;

        let surface_caps = surface.get_capabilities(&adapter);
        // Textures are sampled as sRGB, so present through an sRGB format too.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("the surface supports no formats")?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            // Presented without vsync.
            present_mode: wgpu::PresentMode::AutoNoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        let depth_texture = Texture::create_depth_texture(&device, [config.width, config.height], "depth_texture");

        let mut ctx = Self {
            window,
            surface,
            device,
            queue,
            config,
            depth_texture,
            is_surface_configured: false,
        };
        ctx.resize(size.width, size.height);
        Ok(ctx)
    }

    pub fn colour_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn is_surface_configured(&self) -> bool {
        self.is_surface_configured
    }

    /// Reconfigures the surface and depth buffer. Zero sizes (minimised
    /// windows) are ignored.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth_texture = Texture::create_depth_texture(&self.device, [width, height], "depth_texture");
        self.is_surface_configured = true;
        true
    }

    /// Acquires the next frame. Lost and outdated surfaces are reconfigured
    /// and `Ok(None)` is returned so the frame is skipped.
    pub fn acquire_frame(&mut self) -> anyhow::Result<Option<wgpu::SurfaceTexture>> {
        match self.surface.get_current_texture() {
            Ok(frame) => Ok(Some(frame)),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("Surface lost or outdated, reconfiguring");
                let (width, height) = self.size();
                self.resize(width, height);
                Ok(None)
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Timed out acquiring the next frame");
                Ok(None)
            }
            Err(e) => Err(e).context("failed to acquire the next frame"),
        }
    }
}
