//! Demo lifecycle and the application event loop.
//!
//! # Lifecycle
//!
//! 1. `resumed`: create the window, the GPU context and load the scene
//! 2. every redraw: collect input, update camera and entities, record the
//!    frame, validate it, execute it and present
//! 3. `Resized`: reconfigure the surface and update the projection
//!
//! [`DemoScene`] holds everything that does not depend on the window, so it
//! can also render into offscreen targets.

use std::sync::Arc;

use anyhow::Context as _;
use instant::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::KeyCode,
    window::{Window, WindowId},
};

use crate::{
    camera::{Camera, CameraController},
    config::{AssetPaths, DemoConfig, init_logging},
    context::Context,
    controls::apply_controls,
    data_structures::{
        entity::GameEntity,
        mesh::Mesh,
        texture::ColorSpace,
    },
    frame::{FrameInputs, FrameRenderer, MaterialBindings, RenderParams, SkyPrograms, TessellationPrograms},
    input::InputState,
    pipelines::{
        executor::{ExecuteError, FrameTarget, GpuExecutor},
        state::RenderStates,
    },
    render::FramePlan,
    resources::{
        Assets, load_string,
        mesh::load_mesh_obj,
        texture::{load_cubemap_or_placeholder, load_texture_or},
    },
    shader::{ProgramId, ShaderLibrary, ShaderProgram, ShaderStage},
    time::FrameStats,
};

pub const SPHERE_MODEL: &str = "models/sphere.obj";
pub const SKY_MODEL: &str = "models/cube.obj";
pub const PATCH_SHADER: &str = "shaders/patch.wgsl";

const SPHERE_ALBEDO: &str = "textures/sphere_albedo.png";
const SPHERE_NORMAL_MAP: &str = "textures/sphere_normal.png";
const SPHERE_HEIGHT_MAP: &str = "textures/sphere_height.png";
const SKY_CUBEMAP: &str = "textures/skybox/stormy.png";

/// Placeholder texels used when a sphere texture is missing. The normal map
/// placeholder encodes the tangent-space +Z normal.
const ALBEDO_PLACEHOLDER: [u8; 4] = [180, 180, 180, 255];
const FLAT_NORMAL: [u8; 4] = [128, 128, 255, 255];
const ZERO_HEIGHT: [u8; 4] = [0, 0, 0, 255];

/// Camera start position, in front of the sphere.
pub const CAMERA_START: [f32; 3] = [0.0, 0.0, -5.0];

fn load_program(library: &mut ShaderLibrary, paths: &AssetPaths, stage: ShaderStage, file: &str) -> anyhow::Result<ProgramId> {
    let program = ShaderProgram::load_from_file(stage, &paths.primary(file), &paths.secondary(file))?;
    Ok(library.add(program))
}

/// Loads every shader stage the demo binds.
pub fn load_programs(
    library: &mut ShaderLibrary,
    paths: &AssetPaths,
) -> anyhow::Result<(TessellationPrograms, SkyPrograms)> {
    let tessellation = TessellationPrograms {
        vertex: load_program(library, paths, ShaderStage::Vertex, "shaders/tess_vertex.wgsl")?,
        hull: load_program(library, paths, ShaderStage::Hull, "shaders/hull.wgsl")?,
        domain: load_program(library, paths, ShaderStage::Domain, "shaders/domain.wgsl")?,
        pixel: load_program(library, paths, ShaderStage::Pixel, "shaders/tess_pixel.wgsl")?,
    };
    let sky = SkyPrograms {
        vertex: load_program(library, paths, ShaderStage::Vertex, "shaders/sky_vertex.wgsl")?,
        pixel: load_program(library, paths, ShaderStage::Pixel, "shaders/sky_pixel.wgsl")?,
    };
    Ok((tessellation, sky))
}

/// The sphere, the skybox and everything needed to draw them.
pub struct DemoScene {
    library: ShaderLibrary,
    assets: Assets,
    renderer: FrameRenderer,
    executor: GpuExecutor,
    sphere: GameEntity,
    sky: GameEntity,
    pub camera: Camera,
    pub params: RenderParams,
}

impl DemoScene {
    /// Loads shaders, meshes and textures. Missing shaders or meshes fail the
    /// load; missing textures are replaced by placeholders.
    pub async fn load(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        colour_format: wgpu::TextureFormat,
        config: &DemoConfig,
        aspect: f32,
    ) -> anyhow::Result<Self> {
        let paths = &config.assets;

        let mut library = ShaderLibrary::new();
        let (tessellation, sky_programs) = load_programs(&mut library, paths)?;
        let patch_glue = load_string(paths, PATCH_SHADER).await?;

        let mut assets = Assets::new();
        let sphere_data = load_mesh_obj(paths, SPHERE_MODEL).await?;
        let sphere_mesh = assets.add_mesh(Mesh::upload(device, "sphere", &sphere_data));
        let sky_data = load_mesh_obj(paths, SKY_MODEL).await?;
        let sky_mesh = assets.add_mesh(Mesh::upload(device, "sky", &sky_data));

        let albedo = load_texture_or(paths, SPHERE_ALBEDO, ColorSpace::Srgb, ALBEDO_PLACEHOLDER, device, queue).await;
        let normal_map = load_texture_or(paths, SPHERE_NORMAL_MAP, ColorSpace::Linear, FLAT_NORMAL, device, queue).await;
        let height_map = load_texture_or(paths, SPHERE_HEIGHT_MAP, ColorSpace::Linear, ZERO_HEIGHT, device, queue).await;
        let sky_texture = load_cubemap_or_placeholder(paths, SKY_CUBEMAP, device, queue).await;

        let states = RenderStates::new();
        let materials = MaterialBindings {
            albedo: assets.add_texture(albedo),
            normal_map: assets.add_texture(normal_map),
            height_map: assets.add_texture(height_map),
            sky: assets.add_texture(sky_texture),
            basic_sampler: assets.add_sampler(states.basic_sampler.create(device, "basic sampler")),
            height_sampler: assets.add_sampler(states.height_sampler.create(device, "height sampler")),
        };

        let mut sphere = GameEntity::new(sphere_mesh);
        sphere.set_position((0.0, 0.0, 0.0));
        sphere.set_rotation((0.0, 0.0, 0.0));
        sphere.set_scale((0.5, 0.5, 0.5));
        let mut sky = GameEntity::new(sky_mesh);
        sky.set_scale((1.0, 1.0, 1.0));

        Ok(Self {
            library,
            assets,
            renderer: FrameRenderer::new(tessellation, sky_programs, materials, states),
            executor: GpuExecutor::new(device, colour_format, patch_glue),
            sphere,
            sky,
            camera: Camera::new(CAMERA_START, aspect),
            params: RenderParams {
                clear_colour: config.clear_colour,
                fill_mode: config.fill_mode,
                tessellation_amount: config.tessellation_amount,
                height_scale: config.height_scale,
                height_bias: config.height_bias,
            },
        })
    }

    pub fn update(&mut self, dt: Duration) {
        self.camera.update(dt);
        self.sphere.update_world_matrix();
    }

    pub fn resize(&mut self, aspect: f32) {
        self.camera.update_projection(aspect);
    }

    pub fn record(&mut self) -> FramePlan {
        let inputs = FrameInputs {
            view: self.camera.view(),
            projection: self.camera.projection(),
            sphere: self.sphere.mesh(),
            sphere_world: self.sphere.world_matrix(),
            sky: self.sky.mesh(),
            params: self.params,
        };
        self.renderer.record(&mut self.library, &inputs)
    }

    /// Records the frame and draws it into `target`. Invalid frames are
    /// rejected before anything reaches the GPU.
    pub fn render(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, target: &FrameTarget) -> Result<(), ExecuteError> {
        let plan = self.record();
        self.executor
            .execute(device, queue, &self.library, &self.assets, &plan, target)
    }

    pub fn cached_pipelines(&self) -> usize {
        self.executor.cached_pipelines()
    }
}

/// The windowed demo: GPU context, scene and input handling.
pub struct TessellationDemo {
    ctx: Context,
    scene: DemoScene,
    input: InputState,
    controller: CameraController,
    stats: FrameStats,
    last_frame: Instant,
}

impl TessellationDemo {
    pub async fn new(window: Arc<Window>, config: &DemoConfig) -> anyhow::Result<Self> {
        let ctx = Context::new(window).await?;
        let (width, height) = ctx.size();
        let scene = DemoScene::load(
            &ctx.device,
            &ctx.queue,
            ctx.colour_format(),
            config,
            width as f32 / height.max(1) as f32,
        )
        .await?;
        log::info!("Initialized at {}x{}", width, height);

        Ok(Self {
            ctx,
            scene,
            input: InputState::new(),
            controller: CameraController::new(config.camera_speed, config.camera_sensitivity),
            stats: FrameStats::new(config.title.clone()),
            last_frame: Instant::now(),
        })
    }

    pub fn window(&self) -> &Window {
        &self.ctx.window
    }

    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        self.input.handle_window_event(event)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if self.ctx.resize(width, height) {
            self.scene.resize(width as f32 / height as f32);
        }
    }

    /// Applies this frame's input. Returns `false` once the demo should exit.
    pub fn update(&mut self) -> bool {
        let now = Instant::now();
        let dt = now - self.last_frame;
        self.last_frame = now;

        if self.input.was_key_pressed(KeyCode::Escape) {
            return false;
        }

        apply_controls(&mut self.scene.params, &self.input);
        self.controller.update(&mut self.scene.camera, &self.input, dt);
        self.scene.update(dt);

        if let Some(title) = self.stats.tick(dt) {
            self.ctx.window.set_title(&title);
        }
        self.input.end_frame();
        true
    }

    pub fn draw(&mut self) -> anyhow::Result<()> {
        if !self.ctx.is_surface_configured() {
            return Ok(());
        }
        let Some(frame) = self.ctx.acquire_frame()? else {
            return Ok(());
        };
        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let target = FrameTarget {
            colour: &view,
            depth: &self.ctx.depth_texture.view,
        };
        if let Err(e) = self.scene.render(&self.ctx.device, &self.ctx.queue, &target) {
            // The frame is dropped unpresented.
            log::error!("Skipping frame: {}", e);
            return Ok(());
        }
        self.ctx.window.pre_present_notify();
        frame.present();
        Ok(())
    }
}

pub struct App {
    config: DemoConfig,
    demo: Option<TessellationDemo>,
    error: Option<anyhow::Error>,
}

impl App {
    pub fn new(config: DemoConfig) -> Self {
        Self {
            config,
            demo: None,
            error: None,
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.demo.is_some() {
            return;
        }
        let window_attributes = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));

        let init = event_loop
            .create_window(window_attributes)
            .context("failed to create the window")
            .and_then(|window| futures::executor::block_on(TessellationDemo::new(Arc::new(window), &self.config)));
        match init {
            Ok(demo) => {
                demo.window().request_redraw();
                self.demo = Some(demo);
            }
            Err(e) => {
                log::error!("Initialization failed: {:#}", e);
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let Some(demo) = &mut self.demo else {
            return;
        };
        if demo.handle_window_event(&event) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => demo.resize(size.width, size.height),
            WindowEvent::RedrawRequested => {
                if !demo.update() {
                    event_loop.exit();
                    return;
                }
                if let Err(e) = demo.draw() {
                    log::error!("Unable to render: {:#}", e);
                }
                demo.window().request_redraw();
            }
            _ => {}
        }
    }
}

/// Opens the demo window and runs until it is closed or Escape is pressed.
pub fn run(config: DemoConfig) -> anyhow::Result<()> {
    init_logging(&config.logging);

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
