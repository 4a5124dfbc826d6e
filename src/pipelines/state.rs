//! Fixed-function state descriptors.
//!
//! These are small immutable values created once at start-up. Frame recording
//! copies them into each draw's pipeline descriptor, and the executor turns
//! them into the matching `wgpu` primitive/depth/sampler descriptors.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FillMode {
    Solid,
    Wireframe,
}

impl FillMode {
    pub fn toggled(self) -> Self {
        match self {
            FillMode::Solid => FillMode::Wireframe,
            FillMode::Wireframe => FillMode::Solid,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    Front,
    Back,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    TriangleList,
    /// Patches of three control points, expanded by the tessellation stages.
    PatchList3,
}

impl PrimitiveTopology {
    pub fn is_patch_list(self) -> bool {
        matches!(self, PrimitiveTopology::PatchList3)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RasterizerState {
    pub fill: FillMode,
    pub cull: CullMode,
    pub depth_clip: bool,
}

impl RasterizerState {
    /// The state a null binding resets to.
    pub const DEFAULT: Self = Self {
        fill: FillMode::Solid,
        cull: CullMode::Back,
        depth_clip: true,
    };

    pub fn with_fill(self, fill: FillMode) -> Self {
        Self { fill, ..self }
    }

    /// Builds the `wgpu` primitive state. Wireframe and disabled depth clipping
    /// need optional device features; without them the state degrades to solid
    /// fill and clipped depth.
    pub fn to_primitive(&self, features: wgpu::Features) -> wgpu::PrimitiveState {
        let polygon_mode = match self.fill {
            FillMode::Wireframe if features.contains(wgpu::Features::POLYGON_MODE_LINE) => {
                wgpu::PolygonMode::Line
            }
            _ => wgpu::PolygonMode::Fill,
        };
        wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            // Front faces wind clockwise in the left-handed convention meshes
            // are converted to.
            front_face: wgpu::FrontFace::Cw,
            cull_mode: match self.cull {
                CullMode::None => None,
                CullMode::Front => Some(wgpu::Face::Front),
                CullMode::Back => Some(wgpu::Face::Back),
            },
            polygon_mode,
            unclipped_depth: !self.depth_clip
                && features.contains(wgpu::Features::DEPTH_CLIP_CONTROL),
            conservative: false,
        }
    }
}

impl Default for RasterizerState {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Never,
    Less,
    LessEqual,
    Always,
}

impl From<CompareFunction> for wgpu::CompareFunction {
    fn from(f: CompareFunction) -> Self {
        match f {
            CompareFunction::Never => wgpu::CompareFunction::Never,
            CompareFunction::Less => wgpu::CompareFunction::Less,
            CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
            CompareFunction::Always => wgpu::CompareFunction::Always,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DepthStencilState {
    pub depth_test: bool,
    pub depth_write: bool,
    pub compare: CompareFunction,
}

impl DepthStencilState {
    /// The state a null binding resets to.
    pub const DEFAULT: Self = Self {
        depth_test: true,
        depth_write: true,
        compare: CompareFunction::Less,
    };

    pub fn to_wgpu(&self, format: wgpu::TextureFormat) -> wgpu::DepthStencilState {
        wgpu::DepthStencilState {
            format,
            depth_write_enabled: self.depth_test && self.depth_write,
            depth_compare: if self.depth_test {
                self.compare.into()
            } else {
                wgpu::CompareFunction::Always
            },
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }
    }
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Wrap,
    Clamp,
}

/// Linear-filtered sampler description.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SamplerState {
    pub address: AddressMode,
    pub max_anisotropy: u16,
}

impl SamplerState {
    pub fn descriptor<'a>(&self, label: &'a str) -> wgpu::SamplerDescriptor<'a> {
        let address_mode = match self.address {
            AddressMode::Wrap => wgpu::AddressMode::Repeat,
            AddressMode::Clamp => wgpu::AddressMode::ClampToEdge,
        };
        wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: address_mode,
            address_mode_v: address_mode,
            address_mode_w: address_mode,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            lod_min_clamp: 0.0,
            lod_max_clamp: f32::MAX,
            anisotropy_clamp: self.max_anisotropy.max(1),
            ..Default::default()
        }
    }

    pub fn create(&self, device: &wgpu::Device, label: &str) -> wgpu::Sampler {
        device.create_sampler(&self.descriptor(label))
    }
}

/// Every fixed-function state object the demo uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderStates {
    pub solid: RasterizerState,
    pub wireframe: RasterizerState,
    pub sky_rasterizer: RasterizerState,
    pub sky_depth: DepthStencilState,
    pub basic_sampler: SamplerState,
    pub height_sampler: SamplerState,
}

impl RenderStates {
    pub fn new() -> Self {
        let solid = RasterizerState {
            fill: FillMode::Solid,
            cull: CullMode::None,
            depth_clip: false,
        };
        Self {
            solid,
            wireframe: solid.with_fill(FillMode::Wireframe),
            // The camera sits inside the sky cube.
            sky_rasterizer: RasterizerState {
                fill: FillMode::Solid,
                cull: CullMode::Front,
                depth_clip: true,
            },
            // The sky is drawn at the far plane, where depth equals the cleared 1.0.
            sky_depth: DepthStencilState {
                depth_test: true,
                depth_write: true,
                compare: CompareFunction::LessEqual,
            },
            basic_sampler: SamplerState {
                address: AddressMode::Wrap,
                max_anisotropy: 16,
            },
            height_sampler: SamplerState {
                address: AddressMode::Clamp,
                max_anisotropy: 16,
            },
        }
    }

    pub fn rasterizer_for(&self, fill: FillMode) -> RasterizerState {
        match fill {
            FillMode::Solid => self.solid,
            FillMode::Wireframe => self.wireframe,
        }
    }
}

impl Default for RenderStates {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggling_fill_mode_changes_only_the_fill() {
        let states = RenderStates::new();
        let solid = states.rasterizer_for(FillMode::Solid);
        let wire = states.rasterizer_for(FillMode::Solid.toggled());

        assert_eq!(solid.fill, FillMode::Solid);
        assert_eq!(wire.fill, FillMode::Wireframe);
        assert_eq!(solid.cull, wire.cull);
        assert_eq!(solid.depth_clip, wire.depth_clip);
        assert_eq!(FillMode::Wireframe.toggled(), FillMode::Solid);

        let all = wgpu::Features::POLYGON_MODE_LINE | wgpu::Features::DEPTH_CLIP_CONTROL;
        let a = solid.to_primitive(all);
        let b = wire.to_primitive(all);
        assert_eq!(a.polygon_mode, wgpu::PolygonMode::Fill);
        assert_eq!(b.polygon_mode, wgpu::PolygonMode::Line);
        assert_eq!(wgpu::PrimitiveState { polygon_mode: wgpu::PolygonMode::Fill, ..b }, a);
    }

    #[test]
    fn wireframe_degrades_without_the_line_feature() {
        let wire = RenderStates::new().wireframe;
        let primitive = wire.to_primitive(wgpu::Features::empty());
        assert_eq!(primitive.polygon_mode, wgpu::PolygonMode::Fill);
        assert!(!primitive.unclipped_depth);
    }

    #[test]
    fn sky_states_cull_front_and_pass_at_far_depth() {
        let states = RenderStates::new();
        let primitive = states.sky_rasterizer.to_primitive(wgpu::Features::empty());
        assert_eq!(primitive.cull_mode, Some(wgpu::Face::Front));

        let depth = states.sky_depth.to_wgpu(wgpu::TextureFormat::Depth24PlusStencil8);
        assert_eq!(depth.depth_compare, wgpu::CompareFunction::LessEqual);
    }

    #[test]
    fn null_bindings_reset_to_the_defaults() {
        assert_eq!(RasterizerState::default().cull, CullMode::Back);
        assert_eq!(
            DepthStencilState::default().to_wgpu(wgpu::TextureFormat::Depth32Float).depth_compare,
            wgpu::CompareFunction::Less
        );
    }

    #[test]
    fn samplers_filter_linearly_across_mip_levels() {
        let states = RenderStates::new();
        let basic = states.basic_sampler.descriptor("basic");
        assert_eq!(basic.address_mode_u, wgpu::AddressMode::Repeat);
        assert_eq!(basic.mipmap_filter, wgpu::MipmapFilterMode::Linear);
        assert_eq!(basic.min_filter, wgpu::FilterMode::Linear);

        let height = states.height_sampler.descriptor("height");
        assert_eq!(height.address_mode_v, wgpu::AddressMode::ClampToEdge);
        assert_eq!(height.mipmap_filter, wgpu::MipmapFilterMode::Linear);
        assert!(height.anisotropy_clamp >= 1);
    }
}
