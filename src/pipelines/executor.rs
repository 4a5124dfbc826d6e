//! Runs recorded frames on the GPU.
//!
//! wgpu has no hull or domain stages. Patch-list draws are expanded here: the
//! bound vertex, hull, domain and pixel sources are linked with the patch
//! glue shader, whose vertex entry point generates `3 * factor²` vertices per
//! patch, fetches the control points from the mesh buffers (bound as
//! read-only storage next to the vertex stage's constants) and evaluates the
//! domain stage for each generated vertex.

use std::{borrow::Cow, collections::HashMap};

use thiserror::Error;

use crate::{
    data_structures::{
        handle::Handle,
        mesh::{Mesh, MeshVertex, Vertex},
        texture::Texture,
    },
    pipelines::{PipelineParts, mk_render_pipeline},
    render::{DrawCall, FramePlan, PipelineDesc, PlanError, patch_vertex_count},
    resources::Assets,
    shader::{ProgramId, Resource, ShaderError, ShaderLibrary, ShaderStage, StageUpload, reflect},
};

/// Group holding the vertex stage's bindings plus the patch buffers.
const PATCH_GROUP: u32 = 0;
const PATCH_VERTICES_BINDING: u32 = 1;
const PATCH_INDICES_BINDING: u32 = 2;

#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("invalid frame: {0}")]
    Plan(#[from] PlanError),
    #[error("program {0:?} is not in the shader library")]
    MissingProgram(ProgramId),
    #[error("mesh {0:?} is not loaded")]
    MissingMesh(Handle<Mesh>),
    #[error("texture {0:?} is not loaded")]
    MissingTexture(Handle<Texture>),
    #[error("sampler {0:?} is not loaded")]
    MissingSampler(Handle<wgpu::Sampler>),
    #[error("{0:?} and {1:?} stages both use bind group {2}")]
    GroupConflict(ShaderStage, ShaderStage, u32),
    #[error("bind group {group} exceeds the device limit of {max}")]
    GroupOutOfRange { group: u32, max: u32 },
    #[error("the vertex stage of a patch draw must use bind group 0, not {0}")]
    PatchGroup(u32),
    #[error("linking the pipeline's stages failed: {0}")]
    Link(#[from] ShaderError),
}

/// Where a frame is drawn.
pub struct FrameTarget<'a> {
    pub colour: &'a wgpu::TextureView,
    pub depth: &'a wgpu::TextureView,
}

/// Bind group layout of one group of a cached pipeline.
struct GroupLayout {
    layout: wgpu::BindGroupLayout,
    stage: Option<(ShaderStage, ProgramId)>,
    constants_binding: Option<u32>,
    patch_buffers: bool,
}

struct CachedPipeline {
    pipeline: wgpu::RenderPipeline,
    groups: Vec<GroupLayout>,
}

/// Everything one draw needs once the render pass has begun.
struct PreparedDraw {
    key: PipelineDesc,
    bind_groups: Vec<wgpu::BindGroup>,
    mesh: Handle<Mesh>,
    vertex_count: u32,
    patched: bool,
    index_count: u32,
}

/// The stages of one pipeline joined into a single module.
#[derive(Debug)]
struct Linked {
    source: String,
    /// Stage and program owning each bind group, indexed by group.
    owners: Vec<Option<(ShaderStage, ProgramId)>>,
}

/// Concatenates the bound stages (plus `patch_glue` for patch lists),
/// validates the result and assigns every stage its bind group.
fn link(
    library: &ShaderLibrary,
    desc: &PipelineDesc,
    patch_glue: &str,
    max_bind_groups: u32,
) -> Result<Linked, ExecuteError> {
    let patched = desc.topology.is_patch_list();

    let mut owners: Vec<Option<(ShaderStage, ProgramId)>> = Vec::new();
    let mut sources = Vec::new();
    for stage in ShaderStage::ALL {
        let Some(id) = desc.program(stage) else {
            continue;
        };
        let program = library.get(id).ok_or(ExecuteError::MissingProgram(id))?;
        sources.push(program.source());

        let group = match (program.group(), patched && stage == ShaderStage::Vertex) {
            (Some(g), true) if g != PATCH_GROUP => return Err(ExecuteError::PatchGroup(g)),
            (None, true) => PATCH_GROUP,
            (Some(g), _) => g,
            (None, false) => continue,
        };
        if group >= max_bind_groups {
            return Err(ExecuteError::GroupOutOfRange {
                group,
                max: max_bind_groups,
            });
        }
        let slot = group as usize;
        if owners.len() <= slot {
            owners.resize(slot + 1, None);
        }
        if let Some((other, _)) = owners[slot] {
            return Err(ExecuteError::GroupConflict(other, stage, group));
        }
        owners[slot] = Some((stage, id));
    }
    if patched {
        sources.push(patch_glue);
    }

    let source = sources.join("\n");
    reflect::parse(&source)?;
    Ok(Linked { source, owners })
}

pub struct GpuExecutor {
    colour_format: wgpu::TextureFormat,
    features: wgpu::Features,
    max_bind_groups: u32,
    patch_glue: String,
    pipelines: HashMap<PipelineDesc, CachedPipeline>,
    uniforms: HashMap<ProgramId, wgpu::Buffer>,
}

impl GpuExecutor {
    /// `patch_glue` is the source of the vertex entry point that expands
    /// patch-list draws.
    pub fn new(device: &wgpu::Device, colour_format: wgpu::TextureFormat, patch_glue: impl Into<String>) -> Self {
        Self {
            colour_format,
            features: device.features(),
            max_bind_groups: device.limits().max_bind_groups,
            patch_glue: patch_glue.into(),
            pipelines: HashMap::new(),
            uniforms: HashMap::new(),
        }
    }

    pub fn cached_pipelines(&self) -> usize {
        self.pipelines.len()
    }

    /// Validates `plan`, uploads its constant buffers and encodes it as one
    /// render pass into `target`.
    pub fn execute(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        library: &ShaderLibrary,
        assets: &Assets,
        plan: &FramePlan,
        target: &FrameTarget,
    ) -> Result<(), ExecuteError> {
        plan.validate()?;

        let uploads = plan.uploads();
        for (program, upload) in &uploads {
            self.write_constants(device, queue, *program, upload);
        }

        let mut prepared = Vec::new();
        for draw in plan.draws() {
            if !self.pipelines.contains_key(&draw.pipeline) {
                let cached = self.build_pipeline(device, library, &draw.pipeline)?;
                self.pipelines.insert(draw.pipeline, cached);
            }
            let Some(cached) = self.pipelines.get(&draw.pipeline) else {
                continue;
            };
            prepared.push(self.prepare_draw(device, cached, assets, &uploads, draw)?);
        }

        let (colour, depth, stencil) = plan.clear_values().unwrap_or(([0.0; 4], 1.0, 0));
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Frame Encoder"),
        });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Frame Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target.colour,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: colour[0] as f64,
                            g: colour[1] as f64,
                            b: colour[2] as f64,
                            a: colour[3] as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: target.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(depth),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(stencil),
                        store: wgpu::StoreOp::Store,
                    }),
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            for draw in &prepared {
                let Some(cached) = self.pipelines.get(&draw.key) else {
                    continue;
                };
                let mesh = assets.mesh(draw.mesh).ok_or(ExecuteError::MissingMesh(draw.mesh))?;

                render_pass.set_pipeline(&cached.pipeline);
                for (index, group) in draw.bind_groups.iter().enumerate() {
                    render_pass.set_bind_group(index as u32, group, &[]);
                }
                if draw.patched {
                    if draw.vertex_count > 0 {
                        render_pass.draw(0..draw.vertex_count, 0..1);
                    }
                } else {
                    render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                    render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                    render_pass.draw_indexed(0..draw.index_count, 0, 0..1);
                }
            }
        }
        queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn write_constants(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, program: ProgramId, upload: &StageUpload) {
        if upload.constants.is_empty() {
            return;
        }
        let size = upload.constants.len() as wgpu::BufferAddress;
        let buffer = self
            .uniforms
            .entry(program)
            .or_insert_with(|| {
                device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("{:?} Constants", program)),
                    size,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                })
            });
        queue.write_buffer(buffer, 0, &upload.constants);
    }

    fn build_pipeline(
        &self,
        device: &wgpu::Device,
        library: &ShaderLibrary,
        desc: &PipelineDesc,
    ) -> Result<CachedPipeline, ExecuteError> {
        let patched = desc.topology.is_patch_list();
        let Linked { source, owners } = link(library, desc, &self.patch_glue, self.max_bind_groups)?;

        let groups = owners
            .iter()
            .enumerate()
            .map(|(index, owner)| {
                let patch_buffers = patched && index as u32 == PATCH_GROUP;
                let reflection = owner.and_then(|(_, id)| library.get(id)).map(|p| p.reflection());
                let mut entries = match (owner, reflection) {
                    (Some((stage, _)), Some(reflection)) => reflection.layout_entries(stage.visibility()),
                    _ => Vec::new(),
                };
                if patch_buffers {
                    entries.extend(
                        [PATCH_VERTICES_BINDING, PATCH_INDICES_BINDING].map(|binding| wgpu::BindGroupLayoutEntry {
                            binding,
                            visibility: wgpu::ShaderStages::VERTEX,
                            ty: wgpu::BindingType::Buffer {
                                ty: wgpu::BufferBindingType::Storage { read_only: true },
                                has_dynamic_offset: false,
                                min_binding_size: None,
                            },
                            count: None,
                        }),
                    );
                }
                GroupLayout {
                    layout: device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                        label: Some(&format!("Group {} Layout", index)),
                        entries: &entries,
                    }),
                    stage: *owner,
                    constants_binding: reflection.and_then(|r| r.constants.as_ref()).map(|c| c.binding),
                    patch_buffers,
                }
            })
            .collect::<Vec<_>>();

        let layout_refs: Vec<&wgpu::BindGroupLayout> = groups.iter().map(|g| &g.layout).collect();
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Frame Pipeline Layout"),
            bind_group_layouts: &layout_refs,
            immediate_size: 0,
        });

        let label = if patched { "Tessellated Pipeline" } else { "Triangle Pipeline" };
        let vertex_layouts = [MeshVertex::desc()];
        let pipeline = mk_render_pipeline(
            device,
            &layout,
            self.colour_format,
            wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(Cow::Owned(source)),
            },
            PipelineParts {
                label,
                vertex_entry: if patched { "vs_patch" } else { "vs_main" },
                fragment_entry: "fs_main",
                vertex_layouts: if patched { &vertex_layouts[..0] } else { &vertex_layouts[..] },
                primitive: desc.rasterizer.to_primitive(self.features),
                depth_stencil: Some(desc.depth_stencil.to_wgpu(Texture::DEPTH_FORMAT)),
            },
        );
        log::debug!("Built {} for {:?}", label, desc);

        Ok(CachedPipeline { pipeline, groups })
    }

    fn prepare_draw(
        &self,
        device: &wgpu::Device,
        cached: &CachedPipeline,
        assets: &Assets,
        uploads: &HashMap<ProgramId, &StageUpload>,
        draw: &DrawCall,
    ) -> Result<PreparedDraw, ExecuteError> {
        let mesh_handle = draw.geometry.handle;
        let mesh = assets.mesh(mesh_handle).ok_or(ExecuteError::MissingMesh(mesh_handle))?;

        let mut bind_groups = Vec::with_capacity(cached.groups.len());
        for (index, group) in cached.groups.iter().enumerate() {
            let mut entries = Vec::new();
            if let Some((_, program)) = group.stage
                && let Some(upload) = uploads.get(&program)
            {
                if let (Some(binding), Some(buffer)) = (group.constants_binding, self.uniforms.get(&program)) {
                    entries.push(wgpu::BindGroupEntry {
                        binding,
                        resource: buffer.as_entire_binding(),
                    });
                }
                for bound in &upload.resources {
                    let resource = match bound.resource {
                        Some(Resource::Texture(handle)) => wgpu::BindingResource::TextureView(
                            &assets.texture(handle).ok_or(ExecuteError::MissingTexture(handle))?.view,
                        ),
                        Some(Resource::Sampler(handle)) => wgpu::BindingResource::Sampler(
                            assets.sampler(handle).ok_or(ExecuteError::MissingSampler(handle))?,
                        ),
                        // Rejected by plan validation.
                        None => continue,
                    };
                    entries.push(wgpu::BindGroupEntry {
                        binding: bound.binding,
                        resource,
                    });
                }
            }
            if group.patch_buffers {
                entries.push(wgpu::BindGroupEntry {
                    binding: PATCH_VERTICES_BINDING,
                    resource: mesh.vertex_buffer.as_entire_binding(),
                });
                entries.push(wgpu::BindGroupEntry {
                    binding: PATCH_INDICES_BINDING,
                    resource: mesh.index_buffer.as_entire_binding(),
                });
            }
            bind_groups.push(device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("Group {} Bindings", index)),
                layout: &group.layout,
                entries: &entries,
            }));
        }

        let patched = draw.pipeline.topology.is_patch_list();
        Ok(PreparedDraw {
            key: draw.pipeline,
            bind_groups,
            mesh: mesh_handle,
            vertex_count: if patched {
                // Overflowing expansions were rejected by validation.
                patch_vertex_count(draw.index_count, draw.tess_factor.unwrap_or(0)).unwrap_or(0)
            } else {
                0
            },
            patched,
            index_count: draw.index_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::pipelines::state::{DepthStencilState, PrimitiveTopology, RasterizerState};

    use super::*;

    const TESS_VERTEX: &str = include_str!("../../assets/shaders/tess_vertex.wgsl");
    const HULL: &str = include_str!("../../assets/shaders/hull.wgsl");
    const DOMAIN: &str = include_str!("../../assets/shaders/domain.wgsl");
    const TESS_PIXEL: &str = include_str!("../../assets/shaders/tess_pixel.wgsl");
    const PATCH: &str = include_str!("../../assets/shaders/patch.wgsl");
    const SKY_VERTEX: &str = include_str!("../../assets/shaders/sky_vertex.wgsl");
    const SKY_PIXEL: &str = include_str!("../../assets/shaders/sky_pixel.wgsl");

    fn add(library: &mut ShaderLibrary, stage: ShaderStage, source: &str) -> ProgramId {
        library.add(crate::shader::ShaderProgram::from_source(stage, format!("{:?}", stage), source).unwrap())
    }

    fn desc(topology: PrimitiveTopology, programs: [Option<ProgramId>; 4]) -> PipelineDesc {
        PipelineDesc {
            topology,
            programs,
            rasterizer: RasterizerState::DEFAULT,
            depth_stencil: DepthStencilState::DEFAULT,
        }
    }

    #[test]
    fn tessellated_stages_take_one_group_each() {
        let mut library = ShaderLibrary::new();
        let v = add(&mut library, ShaderStage::Vertex, TESS_VERTEX);
        let h = add(&mut library, ShaderStage::Hull, HULL);
        let d = add(&mut library, ShaderStage::Domain, DOMAIN);
        let p = add(&mut library, ShaderStage::Pixel, TESS_PIXEL);

        let linked = link(
            &library,
            &desc(PrimitiveTopology::PatchList3, [Some(v), Some(h), Some(d), Some(p)]),
            PATCH,
            4,
        )
        .unwrap();
        assert_eq!(
            linked.owners,
            vec![
                Some((ShaderStage::Vertex, v)),
                Some((ShaderStage::Hull, h)),
                Some((ShaderStage::Domain, d)),
                Some((ShaderStage::Pixel, p)),
            ]
        );
        assert!(linked.source.contains("fn vs_patch"));
    }

    #[test]
    fn triangle_pipelines_skip_the_patch_glue() {
        let mut library = ShaderLibrary::new();
        let v = add(&mut library, ShaderStage::Vertex, SKY_VERTEX);
        let p = add(&mut library, ShaderStage::Pixel, SKY_PIXEL);

        let linked = link(
            &library,
            &desc(PrimitiveTopology::TriangleList, [Some(v), None, None, Some(p)]),
            PATCH,
            4,
        )
        .unwrap();
        assert_eq!(linked.owners, vec![Some((ShaderStage::Vertex, v)), Some((ShaderStage::Pixel, p))]);
        assert!(!linked.source.contains("vs_patch"));
    }

    #[test]
    fn stages_sharing_a_group_are_rejected() {
        let mut library = ShaderLibrary::new();
        let v = add(&mut library, ShaderStage::Vertex, SKY_VERTEX);
        let p = add(&mut library, ShaderStage::Pixel, "@group(0) @binding(3) var s: sampler;\n@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }");

        let err = link(
            &library,
            &desc(PrimitiveTopology::TriangleList, [Some(v), None, None, Some(p)]),
            PATCH,
            4,
        )
        .unwrap_err();
        assert!(matches!(err, ExecuteError::GroupConflict(ShaderStage::Vertex, ShaderStage::Pixel, 0)));
    }

    #[test]
    fn groups_beyond_the_device_limit_are_rejected() {
        let mut library = ShaderLibrary::new();
        let v = add(&mut library, ShaderStage::Vertex, SKY_VERTEX);
        let p = add(&mut library, ShaderStage::Pixel, TESS_PIXEL);

        let err = link(
            &library,
            &desc(PrimitiveTopology::TriangleList, [Some(v), None, None, Some(p)]),
            PATCH,
            2,
        )
        .unwrap_err();
        assert!(matches!(err, ExecuteError::GroupOutOfRange { group: 3, max: 2 }));
    }

    #[test]
    fn patch_vertex_stage_must_own_group_zero() {
        let mut library = ShaderLibrary::new();
        let v = add(
            &mut library,
            ShaderStage::Vertex,
            "struct P { world: mat4x4<f32> }\n@group(1) @binding(0) var<uniform> vs_params: P;",
        );
        let h = add(&mut library, ShaderStage::Hull, HULL);
        let d = add(&mut library, ShaderStage::Domain, DOMAIN);
        let p = add(&mut library, ShaderStage::Pixel, TESS_PIXEL);

        let err = link(
            &library,
            &desc(PrimitiveTopology::PatchList3, [Some(v), Some(h), Some(d), Some(p)]),
            PATCH,
            4,
        )
        .unwrap_err();
        assert!(matches!(err, ExecuteError::PatchGroup(1)));
    }

    #[test]
    fn unresolved_functions_fail_to_link() {
        let mut library = ShaderLibrary::new();
        // Hull and domain are missing, so the glue's calls cannot resolve.
        let v = add(&mut library, ShaderStage::Vertex, TESS_VERTEX);
        let p = add(&mut library, ShaderStage::Pixel, TESS_PIXEL);

        let err = link(
            &library,
            &desc(PrimitiveTopology::PatchList3, [Some(v), None, None, Some(p)]),
            PATCH,
            4,
        )
        .unwrap_err();
        assert!(matches!(err, ExecuteError::Link(_)));
    }
}
