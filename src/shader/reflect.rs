//! WGSL reflection.
//!
//! A stage source is parsed and validated with naga, then its resource
//! bindings are read back: at most one uniform block (the stage's constant
//! buffer, whose struct members become the named parameters) plus any number
//! of textures and samplers. Every binding of one stage must live in the same
//! bind group.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("failed to parse WGSL:\n{0}")]
    Parse(String),
    #[error("WGSL validation failed:\n{0}")]
    Validation(String),
    #[error("bindings span groups {0} and {1}; a stage must use a single bind group")]
    MixedGroups(u32, u32),
    #[error("more than one uniform block ({0} and {1}); a stage has one constant buffer")]
    MultipleConstantBlocks(String, String),
    #[error("uniform `{0}` must be a struct")]
    UniformNotStruct(String),
    #[error("unsupported resource `{0}`")]
    UnsupportedResource(String),
}

/// One named member of a stage's constant buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConstantMember {
    pub name: String,
    pub offset: u32,
    pub size: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConstantBlock {
    pub name: String,
    pub binding: u32,
    /// Size of the whole block including trailing padding.
    pub size: u32,
    pub members: Vec<ConstantMember>,
}

impl ConstantBlock {
    pub fn member(&self, name: &str) -> Option<&ConstantMember> {
        self.members.iter().find(|m| m.name == name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Texture2d,
    TextureCube,
    Sampler,
}

/// A texture or sampler binding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceSlot {
    pub name: String,
    pub binding: u32,
    pub kind: ResourceKind,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reflection {
    /// The bind group the stage uses, `None` if it declares no bindings.
    pub group: Option<u32>,
    pub constants: Option<ConstantBlock>,
    pub resources: Vec<ResourceSlot>,
}

impl Reflection {
    /// Bind group layout entries for this stage, ordered by binding.
    pub fn layout_entries(&self, visibility: wgpu::ShaderStages) -> Vec<wgpu::BindGroupLayoutEntry> {
        let mut entries = Vec::with_capacity(self.resources.len() + 1);
        if let Some(block) = &self.constants {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: block.binding,
                visibility,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(block.size as u64),
                },
                count: None,
            });
        }
        for slot in &self.resources {
            let ty = match slot.kind {
                ResourceKind::Texture2d | ResourceKind::TextureCube => wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: if slot.kind == ResourceKind::TextureCube {
                        wgpu::TextureViewDimension::Cube
                    } else {
                        wgpu::TextureViewDimension::D2
                    },
                    multisampled: false,
                },
                ResourceKind::Sampler => {
                    wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering)
                }
            };
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: slot.binding,
                visibility,
                ty,
                count: None,
            });
        }
        entries.sort_by_key(|e| e.binding);
        entries
    }
}

/// Parses and validates `source`.
pub fn parse(source: &str) -> Result<naga::Module, ShaderError> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| ShaderError::Parse(e.emit_to_string(source)))?;
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::default(),
    )
    .validate(&module)
    .map_err(|e| ShaderError::Validation(e.emit_to_string(source)))?;
    Ok(module)
}

pub fn reflect(source: &str) -> Result<Reflection, ShaderError> {
    let module = parse(source)?;
    reflect_module(&module)
}

pub fn reflect_module(module: &naga::Module) -> Result<Reflection, ShaderError> {
    let mut reflection = Reflection::default();

    for (_, var) in module.global_variables.iter() {
        let Some(binding) = &var.binding else {
            continue;
        };
        let name = var.name.clone().unwrap_or_default();

        match reflection.group {
            Some(group) if group != binding.group => {
                return Err(ShaderError::MixedGroups(group, binding.group));
            }
            _ => reflection.group = Some(binding.group),
        }

        let inner = &module.types[var.ty].inner;
        match var.space {
            naga::AddressSpace::Uniform => {
                if let Some(existing) = &reflection.constants {
                    return Err(ShaderError::MultipleConstantBlocks(existing.name.clone(), name));
                }
                let naga::TypeInner::Struct { members, span } = inner else {
                    return Err(ShaderError::UniformNotStruct(name));
                };
                let members = members
                    .iter()
                    .filter_map(|m| {
                        Some(ConstantMember {
                            name: m.name.clone()?,
                            offset: m.offset,
                            size: module.types[m.ty].inner.size(module.to_ctx()),
                        })
                    })
                    .collect();
                reflection.constants = Some(ConstantBlock {
                    name,
                    binding: binding.binding,
                    size: *span,
                    members,
                });
            }
            naga::AddressSpace::Handle => {
                let kind = match inner {
                    naga::TypeInner::Image {
                        dim: naga::ImageDimension::D2,
                        arrayed: false,
                        class: naga::ImageClass::Sampled { .. },
                    } => ResourceKind::Texture2d,
                    naga::TypeInner::Image {
                        dim: naga::ImageDimension::Cube,
                        arrayed: false,
                        class: naga::ImageClass::Sampled { .. },
                    } => ResourceKind::TextureCube,
                    naga::TypeInner::Sampler { comparison: false } => ResourceKind::Sampler,
                    _ => return Err(ShaderError::UnsupportedResource(name)),
                };
                reflection.resources.push(ResourceSlot {
                    name,
                    binding: binding.binding,
                    kind,
                });
            }
            _ => return Err(ShaderError::UnsupportedResource(name)),
        }
    }

    reflection.resources.sort_by_key(|r| r.binding);
    Ok(reflection)
}
