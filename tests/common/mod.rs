//! Offscreen rendering helpers for the GPU tests.

use std::time::Duration;

use tess_demo::{
    DemoConfig,
    context::request_gpu,
    data_structures::texture::Texture,
    flow::DemoScene,
    pipelines::executor::{ExecuteError, FrameTarget},
};

pub const WIDTH: u32 = 256;
pub const HEIGHT: u32 = 256;
pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

pub struct Offscreen {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub scene: DemoScene,
    colour: wgpu::Texture,
    colour_view: wgpu::TextureView,
    depth: Texture,
}

impl Offscreen {
    /// Loads the demo scene against an offscreen target. Returns `None` when
    /// the machine has no usable adapter.
    pub fn new() -> Option<Self> {
        Self::with_config(DemoConfig {
            width: WIDTH,
            height: HEIGHT,
            ..Default::default()
        })
    }

    /// Like [`Offscreen::new`], with the scene loaded from `config`. The
    /// target stays `WIDTH` x `HEIGHT`.
    pub fn with_config(config: DemoConfig) -> Option<Self> {
        let _ = env_logger::builder().is_test(true).try_init();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let (device, queue) = match futures::executor::block_on(request_gpu(&instance, None)) {
            Ok((_, device, queue)) => (device, queue),
            Err(e) => {
                eprintln!("skipping GPU test: {:#}", e);
                return None;
            }
        };

        let scene = futures::executor::block_on(DemoScene::load(
            &device,
            &queue,
            FORMAT,
            &config,
            config.aspect_ratio(),
        ))
        .expect("the demo scene loads from the crate's assets");

        let colour = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Test Output Texture"),
            size: extent(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FORMAT,
            usage: wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let colour_view = colour.create_view(&wgpu::TextureViewDescriptor::default());
        let depth = Texture::create_depth_texture(&device, [WIDTH, HEIGHT], "test depth");

        Some(Self {
            device,
            queue,
            scene,
            colour,
            colour_view,
            depth,
        })
    }

    pub fn render(&mut self) -> Result<(), ExecuteError> {
        let target = FrameTarget {
            colour: &self.colour_view,
            depth: &self.depth.view,
        };
        self.scene.update(Duration::ZERO);
        self.scene.render(&self.device, &self.queue, &target)
    }

    /// Copies the colour target back to the CPU.
    pub fn read_pixels(&self) -> image::RgbaImage {
        // WIDTH * 4 is a multiple of COPY_BYTES_PER_ROW_ALIGNMENT.
        let bytes_per_row = WIDTH * 4;
        let output_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Test Readback Buffer"),
            size: (bytes_per_row * HEIGHT) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Readback Encoder") });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &self.colour,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &output_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(HEIGHT),
                },
            },
            extent(),
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let (tx, rx) = futures::channel::oneshot::channel();
        let buffer_slice = output_buffer.slice(..);
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: Some(Duration::from_secs(5)),
            })
            .unwrap();
        futures::executor::block_on(rx).unwrap().unwrap();

        let data = buffer_slice.get_mapped_range().to_vec();
        output_buffer.unmap();
        image::RgbaImage::from_raw(WIDTH, HEIGHT, data).unwrap()
    }
}

fn extent() -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: WIDTH,
        height: HEIGHT,
        depth_or_array_layers: 1,
    }
}
