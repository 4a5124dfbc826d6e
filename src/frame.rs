//! Per-frame command recording.
//!
//! [`FrameRenderer::record`] turns the current scene and render parameters
//! into a [`FramePlan`]: clear, the tessellated sphere, the skybox and present,
//! always in the same order. Recording only stages shader parameters and
//! snapshots state, it never touches the GPU.

use cgmath::Matrix4;

use crate::{
    data_structures::{handle::Handle, mesh::MeshRef, texture::Texture},
    pipelines::state::{DepthStencilState, FillMode, PrimitiveTopology, RasterizerState, RenderStates},
    render::{Command, DrawCall, FramePlan, PipelineDesc, tess_factor},
    shader::{ProgramId, Resource, ShaderLibrary, ShaderProgram, ShaderStage},
};

/// The four stages that draw the sphere.
#[derive(Clone, Copy, Debug)]
pub struct TessellationPrograms {
    pub vertex: ProgramId,
    pub hull: ProgramId,
    pub domain: ProgramId,
    pub pixel: ProgramId,
}

#[derive(Clone, Copy, Debug)]
pub struct SkyPrograms {
    pub vertex: ProgramId,
    pub pixel: ProgramId,
}

/// Textures and samplers the draws bind.
#[derive(Clone, Copy, Debug)]
pub struct MaterialBindings {
    pub albedo: Handle<Texture>,
    pub normal_map: Handle<Texture>,
    pub height_map: Handle<Texture>,
    pub sky: Handle<Texture>,
    pub basic_sampler: Handle<wgpu::Sampler>,
    pub height_sampler: Handle<wgpu::Sampler>,
}

/// Values that may change between frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderParams {
    pub clear_colour: [f32; 4],
    pub fill_mode: FillMode,
    pub tessellation_amount: f32,
    pub height_scale: f32,
    pub height_bias: f32,
}

#[derive(Clone, Copy, Debug)]
pub struct FrameInputs {
    pub view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
    pub sphere: MeshRef,
    pub sphere_world: Matrix4<f32>,
    pub sky: MeshRef,
    pub params: RenderParams,
}

#[derive(Debug)]
pub struct FrameRenderer {
    tessellation: TessellationPrograms,
    sky: SkyPrograms,
    materials: MaterialBindings,
    states: RenderStates,
}

impl FrameRenderer {
    pub fn new(
        tessellation: TessellationPrograms,
        sky: SkyPrograms,
        materials: MaterialBindings,
        states: RenderStates,
    ) -> Self {
        Self {
            tessellation,
            sky,
            materials,
            states,
        }
    }

    pub fn states(&self) -> &RenderStates {
        &self.states
    }

    pub fn record(&self, library: &mut ShaderLibrary, inputs: &FrameInputs) -> FramePlan {
        let params = &inputs.params;
        let tess = self.tessellation;
        let mats = self.materials;
        let mut rec = Recorder::new(library);

        rec.push(Command::Clear {
            colour: params.clear_colour,
            depth: 1.0,
            stencil: 0,
        });
        rec.set_rasterizer(Some(self.states.rasterizer_for(params.fill_mode)));
        rec.set_geometry(inputs.sphere, PrimitiveTopology::PatchList3);

        rec.bind(ShaderStage::Vertex, tess.vertex, |p| {
            p.set_parameter("world", inputs.sphere_world);
        });
        rec.bind(ShaderStage::Hull, tess.hull, |p| {
            p.set_parameter("tessellationAmount", params.tessellation_amount);
            p.set_parameter("padding", [0.0f32; 3]);
        });
        rec.bind(ShaderStage::Domain, tess.domain, |p| {
            p.set_parameter("view", inputs.view);
            p.set_parameter("projection", inputs.projection);
            p.set_parameter("Hscale", params.height_scale);
            p.set_parameter("Hbias", params.height_bias);
            p.set_resource("heightSRV", Resource::Texture(mats.height_map));
            p.set_resource("heightSampler", Resource::Sampler(mats.height_sampler));
        });
        rec.bind(ShaderStage::Pixel, tess.pixel, |p| {
            p.set_resource("textureSRV", Resource::Texture(mats.albedo));
            p.set_resource("normalMapSRV", Resource::Texture(mats.normal_map));
            p.set_resource("basicSampler", Resource::Sampler(mats.basic_sampler));
        });

        // The hull program's staged amount is exactly what was flushed above.
        let factor = rec
            .library
            .get(tess.hull)
            .and_then(|p| p.get_f32("tessellationAmount"))
            .map_or(0, tess_factor);
        rec.draw(inputs.sphere.index_count, Some(factor));

        rec.unbind(ShaderStage::Hull);
        rec.unbind(ShaderStage::Domain);

        rec.set_geometry(inputs.sky, PrimitiveTopology::TriangleList);
        rec.bind(ShaderStage::Vertex, self.sky.vertex, |p| {
            p.set_parameter("view", inputs.view);
            p.set_parameter("projection", inputs.projection);
        });
        rec.bind(ShaderStage::Pixel, self.sky.pixel, |p| {
            p.set_resource("Sky", Resource::Texture(mats.sky));
            p.set_resource("skySampler", Resource::Sampler(mats.basic_sampler));
        });
        rec.set_rasterizer(Some(self.states.sky_rasterizer));
        rec.set_depth_stencil(Some(self.states.sky_depth));
        rec.draw(inputs.sky.index_count, None);

        rec.set_rasterizer(None);
        rec.set_depth_stencil(None);
        rec.push(Command::Present);
        rec.plan
    }
}

/// Appends commands while tracking the state every draw snapshots.
struct Recorder<'a> {
    library: &'a mut ShaderLibrary,
    plan: FramePlan,
    geometry: Option<(MeshRef, PrimitiveTopology)>,
    programs: [Option<ProgramId>; 4],
    rasterizer: Option<RasterizerState>,
    depth_stencil: Option<DepthStencilState>,
}

impl<'a> Recorder<'a> {
    fn new(library: &'a mut ShaderLibrary) -> Self {
        Self {
            library,
            plan: FramePlan::new(),
            geometry: None,
            programs: [None; 4],
            rasterizer: None,
            depth_stencil: None,
        }
    }

    fn push(&mut self, command: Command) {
        self.plan.push(command);
    }

    fn set_rasterizer(&mut self, state: Option<RasterizerState>) {
        self.rasterizer = state;
        self.push(Command::SetRasterizer(state));
    }

    fn set_depth_stencil(&mut self, state: Option<DepthStencilState>) {
        self.depth_stencil = state;
        self.push(Command::SetDepthStencil(state));
    }

    fn set_geometry(&mut self, mesh: MeshRef, topology: PrimitiveTopology) {
        self.geometry = Some((mesh, topology));
        self.push(Command::SetGeometry { mesh, topology });
    }

    /// Binds `program` to `stage`, lets `set` stage its parameters and
    /// records the flush.
    fn bind(&mut self, stage: ShaderStage, program: ProgramId, set: impl FnOnce(&mut ShaderProgram)) {
        self.programs[stage.index()] = Some(program);
        self.push(Command::BindStage {
            stage,
            program: Some(program),
        });
        let Some(p) = self.library.get_mut(program) else {
            log::error!("{:?} program {:?} is not in the library", stage, program);
            return;
        };
        set(p);
        let upload = p.flush();
        self.push(Command::Flush {
            stage,
            program,
            upload,
        });
    }

    fn unbind(&mut self, stage: ShaderStage) {
        self.programs[stage.index()] = None;
        self.push(Command::BindStage {
            stage,
            program: None,
        });
    }

    fn draw(&mut self, index_count: u32, tess_factor: Option<u32>) {
        let Some((geometry, topology)) = self.geometry else {
            log::error!("draw recorded without geometry");
            return;
        };
        self.push(Command::DrawIndexed(DrawCall {
            geometry,
            index_count,
            pipeline: PipelineDesc {
                topology,
                programs: self.programs,
                rasterizer: self.rasterizer.unwrap_or_default(),
                depth_stencil: self.depth_stencil.unwrap_or_default(),
            },
            tess_factor,
        }));
    }
}
