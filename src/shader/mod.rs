//! Shader stages, their reflected parameters and the library that owns them.

pub mod program;
pub mod reflect;

use crate::data_structures::handle::Handle;

pub use program::{BoundResource, ParamValue, Resource, ShaderProgram, StageUpload};
pub use reflect::ShaderError;

/// The four programmable stages of the tessellation pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    Vertex,
    Hull,
    Domain,
    Pixel,
}

impl ShaderStage {
    pub const ALL: [ShaderStage; 4] = [
        ShaderStage::Vertex,
        ShaderStage::Hull,
        ShaderStage::Domain,
        ShaderStage::Pixel,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// The wgpu stages that run this stage's code. Hull and domain code is
    /// evaluated while vertices are generated.
    pub fn visibility(self) -> wgpu::ShaderStages {
        match self {
            ShaderStage::Vertex | ShaderStage::Hull | ShaderStage::Domain => {
                wgpu::ShaderStages::VERTEX
            }
            ShaderStage::Pixel => wgpu::ShaderStages::FRAGMENT,
        }
    }
}

pub type ProgramId = Handle<ShaderProgram>;

/// Owns every loaded shader program.
#[derive(Debug, Default)]
pub struct ShaderLibrary {
    programs: Vec<ShaderProgram>,
}

impl ShaderLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, program: ShaderProgram) -> ProgramId {
        self.programs.push(program);
        Handle::new(self.programs.len() - 1)
    }

    pub fn get(&self, id: ProgramId) -> Option<&ShaderProgram> {
        self.programs.get(id.index())
    }

    pub fn get_mut(&mut self, id: ProgramId) -> Option<&mut ShaderProgram> {
        self.programs.get_mut(id.index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_hands_out_stable_ids() {
        let mut library = ShaderLibrary::new();
        let a = library.add(ShaderProgram::from_source(ShaderStage::Hull, "a", "fn a() {}").unwrap());
        let b = library.add(ShaderProgram::from_source(ShaderStage::Pixel, "b", "fn b() {}").unwrap());
        assert_ne!(a, b);
        assert_eq!(library.get(a).map(|p| p.label()), Some("a"));
        assert_eq!(library.get(b).map(|p| p.stage()), Some(ShaderStage::Pixel));
    }
}
