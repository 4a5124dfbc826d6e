//! Recorded frames.
//!
//! A frame is recorded as a flat list of [`Command`]s before anything touches
//! the GPU. Every draw carries a [`PipelineDesc`] snapshot of the state it was
//! recorded under, so [`FramePlan::validate`] can replay the state commands and
//! reject inconsistent frames, and the executor can look up one cached wgpu
//! pipeline per distinct snapshot.

use std::collections::HashMap;

use thiserror::Error;

use crate::{
    data_structures::mesh::MeshRef,
    pipelines::state::{DepthStencilState, PrimitiveTopology, RasterizerState},
    shader::{ProgramId, ShaderStage, StageUpload},
};

/// Largest edge factor the tessellator produces.
pub const MAX_TESS_FACTOR: u32 = 64;

/// Edge factor for a requested tessellation amount with integer partitioning.
///
/// Amounts of zero or less (and NaN) cull the patch.
pub fn tess_factor(amount: f32) -> u32 {
    if !(amount > 0.0) {
        return 0;
    }
    amount.ceil().clamp(1.0, MAX_TESS_FACTOR as f32) as u32
}

/// Vertices generated for `index_count / 3` patches at edge factor `factor`,
/// or `None` when the count does not fit a single draw.
pub fn patch_vertex_count(index_count: u32, factor: u32) -> Option<u32> {
    index_count.checked_mul(factor)?.checked_mul(factor)
}

/// Fixed-function and programmable state a draw runs with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PipelineDesc {
    pub topology: PrimitiveTopology,
    /// Bound program per stage, indexed by [`ShaderStage::index`].
    pub programs: [Option<ProgramId>; 4],
    pub rasterizer: RasterizerState,
    pub depth_stencil: DepthStencilState,
}

impl PipelineDesc {
    pub fn program(&self, stage: ShaderStage) -> Option<ProgramId> {
        self.programs[stage.index()]
    }

    pub fn is_tessellated(&self) -> bool {
        self.program(ShaderStage::Hull).is_some() || self.program(ShaderStage::Domain).is_some()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawCall {
    pub geometry: MeshRef,
    pub index_count: u32,
    pub pipeline: PipelineDesc,
    /// Edge factor of patch-list draws, `None` for triangle lists.
    pub tess_factor: Option<u32>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Clear {
        colour: [f32; 4],
        depth: f32,
        stencil: u32,
    },
    /// `None` restores the default state.
    SetRasterizer(Option<RasterizerState>),
    /// `None` restores the default state.
    SetDepthStencil(Option<DepthStencilState>),
    SetGeometry {
        mesh: MeshRef,
        topology: PrimitiveTopology,
    },
    /// `None` unbinds the stage.
    BindStage {
        stage: ShaderStage,
        program: Option<ProgramId>,
    },
    Flush {
        stage: ShaderStage,
        program: ProgramId,
        upload: StageUpload,
    },
    DrawIndexed(DrawCall),
    Present,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("the frame does not start with a clear")]
    MissingClear,
    #[error("the frame does not end with a present")]
    MissingPresent,
    #[error("command {0} comes after present")]
    CommandAfterPresent(usize),
    #[error("draw at command {0} has no geometry bound")]
    MissingGeometry(usize),
    #[error("draw at command {index} has no {stage:?} stage bound")]
    MissingStage { index: usize, stage: ShaderStage },
    #[error("draw at command {index} uses the {stage:?} program without flushing it")]
    Unflushed { index: usize, stage: ShaderStage },
    #[error("flush at command {0} targets a program that is not bound to its stage")]
    FlushOfUnboundProgram(usize),
    #[error("flush at command {index} leaves `{name}` unbound")]
    UnboundResource { index: usize, name: String },
    #[error("program flushed twice with different data, second time at command {0}")]
    ConflictingUploads(usize),
    #[error("draw at command {0} uses patch topology without hull and domain stages")]
    PatchWithoutTessellation(usize),
    #[error("draw at command {0} binds hull or domain stages to a triangle list")]
    TessellationWithoutPatches(usize),
    #[error("draw at command {index} uses {index_count} indices, not a whole number of patches")]
    PartialPatch { index: usize, index_count: u32 },
    #[error("draw at command {index} expands {index_count} indices at factor {factor} past the vertex limit")]
    PatchExpansionOverflow {
        index: usize,
        index_count: u32,
        factor: u32,
    },
    #[error("draw at command {index} uses {index_count} indices out of {available}")]
    IndexCountOutOfRange {
        index: usize,
        index_count: u32,
        available: u32,
    },
    #[error("draw at command {0} does not match the state recorded before it")]
    StateMismatch(usize),
}

/// One recorded frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FramePlan {
    commands: Vec<Command>,
}

/// State tracked while replaying a plan.
#[derive(Default)]
struct Replay {
    geometry: Option<(MeshRef, PrimitiveTopology)>,
    programs: [Option<ProgramId>; 4],
    flushed: [bool; 4],
    rasterizer: Option<RasterizerState>,
    depth_stencil: Option<DepthStencilState>,
}

impl FramePlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn draws(&self) -> impl Iterator<Item = &DrawCall> {
        self.commands.iter().filter_map(|c| match c {
            Command::DrawIndexed(draw) => Some(draw),
            _ => None,
        })
    }

    /// The last upload recorded for each program.
    pub fn uploads(&self) -> HashMap<ProgramId, &StageUpload> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::Flush { program, upload, .. } => Some((*program, upload)),
                _ => None,
            })
            .collect()
    }

    pub fn clear_values(&self) -> Option<([f32; 4], f32, u32)> {
        self.commands.iter().find_map(|c| match c {
            Command::Clear {
                colour,
                depth,
                stencil,
            } => Some((*colour, *depth, *stencil)),
            _ => None,
        })
    }

    /// Checks that the frame is well formed and that every draw's snapshot is
    /// consistent with the commands recorded before it.
    pub fn validate(&self) -> Result<(), PlanError> {
        if !matches!(self.commands.first(), Some(Command::Clear { .. })) {
            return Err(PlanError::MissingClear);
        }
        match self.commands.iter().position(|c| *c == Command::Present) {
            None => return Err(PlanError::MissingPresent),
            Some(p) if p + 1 != self.commands.len() => {
                return Err(PlanError::CommandAfterPresent(p + 1));
            }
            Some(_) => {}
        }

        let mut state = Replay::default();
        let mut uploads: HashMap<ProgramId, &StageUpload> = HashMap::new();

        for (index, command) in self.commands.iter().enumerate() {
            match command {
                Command::Clear { .. } | Command::Present => {}
                Command::SetRasterizer(r) => state.rasterizer = *r,
                Command::SetDepthStencil(d) => state.depth_stencil = *d,
                Command::SetGeometry { mesh, topology } => {
                    state.geometry = Some((*mesh, *topology));
                }
                Command::BindStage { stage, program } => {
                    state.programs[stage.index()] = *program;
                    state.flushed[stage.index()] = false;
                }
                Command::Flush {
                    stage,
                    program,
                    upload,
                } => {
                    if state.programs[stage.index()] != Some(*program) {
                        return Err(PlanError::FlushOfUnboundProgram(index));
                    }
                    if let Some(name) = upload.unbound().next() {
                        return Err(PlanError::UnboundResource {
                            index,
                            name: name.to_string(),
                        });
                    }
                    // Constant buffers are written once per frame, before the
                    // render pass.
                    if uploads.insert(*program, upload).is_some_and(|prev| prev != upload) {
                        return Err(PlanError::ConflictingUploads(index));
                    }
                    state.flushed[stage.index()] = true;
                }
                Command::DrawIndexed(draw) => state.check_draw(index, draw)?,
            }
        }
        Ok(())
    }
}

impl Replay {
    fn check_draw(&self, index: usize, draw: &DrawCall) -> Result<(), PlanError> {
        let Some((mesh, topology)) = self.geometry else {
            return Err(PlanError::MissingGeometry(index));
        };
        let expected = PipelineDesc {
            topology,
            programs: self.programs,
            rasterizer: self.rasterizer.unwrap_or_default(),
            depth_stencil: self.depth_stencil.unwrap_or_default(),
        };
        if draw.pipeline != expected || draw.geometry != mesh {
            return Err(PlanError::StateMismatch(index));
        }

        for stage in [ShaderStage::Vertex, ShaderStage::Pixel] {
            if draw.pipeline.program(stage).is_none() {
                return Err(PlanError::MissingStage { index, stage });
            }
        }
        for stage in ShaderStage::ALL {
            if draw.pipeline.program(stage).is_some() && !self.flushed[stage.index()] {
                return Err(PlanError::Unflushed { index, stage });
            }
        }

        let tessellation_bound = draw.pipeline.program(ShaderStage::Hull).is_some()
            && draw.pipeline.program(ShaderStage::Domain).is_some();
        if topology.is_patch_list() {
            if !tessellation_bound || draw.tess_factor.is_none() {
                return Err(PlanError::PatchWithoutTessellation(index));
            }
            if draw.index_count % 3 != 0 {
                return Err(PlanError::PartialPatch {
                    index,
                    index_count: draw.index_count,
                });
            }
            let factor = draw.tess_factor.unwrap_or(0);
            if patch_vertex_count(draw.index_count, factor).is_none() {
                return Err(PlanError::PatchExpansionOverflow {
                    index,
                    index_count: draw.index_count,
                    factor,
                });
            }
        } else if draw.pipeline.is_tessellated() || draw.tess_factor.is_some() {
            return Err(PlanError::TessellationWithoutPatches(index));
        }

        if draw.index_count == 0 || draw.index_count > mesh.index_count {
            return Err(PlanError::IndexCountOutOfRange {
                index,
                index_count: draw.index_count,
                available: mesh.index_count,
            });
        }
        Ok(())
    }
}
