use std::path::Path;

use anyhow::Context;
use cgmath::{Matrix4, Vector3};

use crate::{
    data_structures::{handle::Handle, texture::Texture},
    resources::read_with_fallback,
    shader::{
        ShaderStage,
        reflect::{self, Reflection, ResourceKind, ShaderError},
    },
};

/// A value for one named constant-buffer member.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamValue {
    Float(f32),
    Float3([f32; 3]),
    Float4([f32; 4]),
    Matrix4([[f32; 4]; 4]),
}

impl ParamValue {
    fn bytes(&self) -> &[u8] {
        match self {
            ParamValue::Float(v) => bytemuck::bytes_of(v),
            ParamValue::Float3(v) => bytemuck::bytes_of(v),
            ParamValue::Float4(v) => bytemuck::bytes_of(v),
            ParamValue::Matrix4(v) => bytemuck::bytes_of(v),
        }
    }
}

impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        ParamValue::Float(v)
    }
}

impl From<[f32; 3]> for ParamValue {
    fn from(v: [f32; 3]) -> Self {
        ParamValue::Float3(v)
    }
}

impl From<Vector3<f32>> for ParamValue {
    fn from(v: Vector3<f32>) -> Self {
        ParamValue::Float3(v.into())
    }
}

impl From<[f32; 4]> for ParamValue {
    fn from(v: [f32; 4]) -> Self {
        ParamValue::Float4(v)
    }
}

impl From<Matrix4<f32>> for ParamValue {
    // cgmath and WGSL both store matrices column by column.
    fn from(m: Matrix4<f32>) -> Self {
        ParamValue::Matrix4(m.into())
    }
}

/// A texture or sampler bound to a named slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Resource {
    Texture(Handle<Texture>),
    Sampler(Handle<wgpu::Sampler>),
}

impl Resource {
    fn fits(&self, kind: ResourceKind) -> bool {
        matches!(
            (self, kind),
            (Resource::Texture(_), ResourceKind::Texture2d | ResourceKind::TextureCube)
                | (Resource::Sampler(_), ResourceKind::Sampler)
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoundResource {
    pub name: String,
    pub binding: u32,
    /// `None` until the slot has been given a resource.
    pub resource: Option<Resource>,
}

/// Everything one flush sends to the GPU: the whole constant buffer plus the
/// current resource bindings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageUpload {
    pub constants: Vec<u8>,
    pub resources: Vec<BoundResource>,
}

impl StageUpload {
    pub fn unbound(&self) -> impl Iterator<Item = &str> {
        self.resources
            .iter()
            .filter(|r| r.resource.is_none())
            .map(|r| r.name.as_str())
    }
}

/// One shader stage: validated source, reflected bindings and a CPU staging
/// copy of its constant buffer.
///
/// Parameters are staged by name with [`set_parameter`](Self::set_parameter)
/// and sent in a single batch by [`flush`](Self::flush).
#[derive(Clone, Debug)]
pub struct ShaderProgram {
    label: String,
    stage: ShaderStage,
    source: String,
    reflection: Reflection,
    staging: Vec<u8>,
    resources: Vec<BoundResource>,
}

impl ShaderProgram {
    pub fn from_source(
        stage: ShaderStage,
        label: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<Self, ShaderError> {
        let source = source.into();
        let reflection = reflect::reflect(&source)?;
        let staging = vec![0; reflection.constants.as_ref().map_or(0, |c| c.size as usize)];
        let resources = reflection
            .resources
            .iter()
            .map(|slot| BoundResource {
                name: slot.name.clone(),
                binding: slot.binding,
                resource: None,
            })
            .collect();
        Ok(Self {
            label: label.into(),
            stage,
            source,
            reflection,
            staging,
            resources,
        })
    }

    /// Loads and reflects a stage from `primary`, or from `fallback` when the
    /// primary file cannot be read.
    pub fn load_from_file(stage: ShaderStage, primary: &Path, fallback: &Path) -> anyhow::Result<Self> {
        let bytes = read_with_fallback(primary, fallback)?;
        let source = String::from_utf8(bytes)
            .with_context(|| format!("{} is not valid UTF-8", primary.display()))?;
        let label = primary
            .file_name()
            .map_or_else(|| primary.display().to_string(), |f| f.to_string_lossy().into_owned());
        let program = Self::from_source(stage, label, source)
            .with_context(|| format!("while loading the {:?} shader {}", stage, primary.display()))?;
        log::info!("Loaded {:?} shader {}", stage, program.label);
        Ok(program)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn reflection(&self) -> &Reflection {
        &self.reflection
    }

    /// The bind group this stage's bindings live in.
    pub fn group(&self) -> Option<u32> {
        self.reflection.group
    }

    /// Stages `value` into the constant-buffer member called `name`.
    ///
    /// Returns `false` and leaves the buffer untouched when the stage declares
    /// no such member or its size differs from the value's.
    pub fn set_parameter(&mut self, name: &str, value: impl Into<ParamValue>) -> bool {
        let value = value.into();
        let Some(member) = self
            .reflection
            .constants
            .as_ref()
            .and_then(|c| c.member(name))
        else {
            log::debug!("{}: no parameter named {}", self.label, name);
            return false;
        };
        let bytes = value.bytes();
        if bytes.len() != member.size as usize {
            log::debug!(
                "{}: {} is {} bytes, got {} bytes",
                self.label,
                name,
                member.size,
                bytes.len()
            );
            return false;
        }
        let offset = member.offset as usize;
        self.staging[offset..offset + bytes.len()].copy_from_slice(bytes);
        true
    }

    /// Reads back a staged `f32` parameter.
    pub fn get_f32(&self, name: &str) -> Option<f32> {
        let member = self.reflection.constants.as_ref()?.member(name)?;
        if member.size != 4 {
            return None;
        }
        let offset = member.offset as usize;
        let bytes: [u8; 4] = self.staging[offset..offset + 4].try_into().ok()?;
        Some(f32::from_ne_bytes(bytes))
    }

    /// Binds `resource` to the texture or sampler slot called `name`.
    pub fn set_resource(&mut self, name: &str, resource: Resource) -> bool {
        let Some(slot) = self.reflection.resources.iter().find(|s| s.name == name) else {
            log::debug!("{}: no resource named {}", self.label, name);
            return false;
        };
        if !resource.fits(slot.kind) {
            log::debug!("{}: {:?} does not fit {} ({:?})", self.label, resource, name, slot.kind);
            return false;
        }
        let binding = slot.binding;
        if let Some(bound) = self.resources.iter_mut().find(|r| r.binding == binding) {
            bound.resource = Some(resource);
        }
        true
    }

    /// Snapshots the staged constants and resource bindings for upload.
    pub fn flush(&self) -> StageUpload {
        StageUpload {
            constants: self.staging.clone(),
            resources: self.resources.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::SquareMatrix;

    use super::*;

    const HULL: &str = "
struct HullParams { tessellationAmount: f32, padding: vec3<f32> }
@group(1) @binding(0) var<uniform> hs_params: HullParams;
fn amount() -> f32 { return hs_params.tessellationAmount; }
";

    const PIXEL: &str = "
@group(3) @binding(0) var albedo: texture_2d<f32>;
@group(3) @binding(1) var albedo_sampler: sampler;
@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(albedo, albedo_sampler, uv);
}
";

    #[test]
    fn stages_parameters_at_reflected_offsets() {
        let mut hull = ShaderProgram::from_source(ShaderStage::Hull, "hull", HULL).unwrap();
        assert!(hull.set_parameter("tessellationAmount", 10.0));
        assert!(hull.set_parameter("padding", [1.0, 2.0, 3.0]));

        let upload = hull.flush();
        assert_eq!(upload.constants.len(), 32);
        assert_eq!(&upload.constants[0..4], &10.0f32.to_ne_bytes());
        assert_eq!(&upload.constants[16..20], &1.0f32.to_ne_bytes());
        assert_eq!(hull.get_f32("tessellationAmount"), Some(10.0));
    }

    #[test]
    fn ignores_unknown_names_and_wrong_sizes() {
        let mut hull = ShaderProgram::from_source(ShaderStage::Hull, "hull", HULL).unwrap();
        let before = hull.flush();

        assert!(!hull.set_parameter("tessellationAmuont", 3.0));
        assert!(!hull.set_parameter("tessellationAmount", Matrix4::<f32>::identity()));
        assert!(!hull.set_resource("heightSRV", Resource::Texture(Handle::new(0))));
        assert_eq!(hull.flush(), before);
    }

    #[test]
    fn flushing_identical_values_is_deterministic() {
        let mut a = ShaderProgram::from_source(ShaderStage::Hull, "hull", HULL).unwrap();
        let mut b = a.clone();
        a.set_parameter("tessellationAmount", 7.0);
        b.set_parameter("tessellationAmount", 7.0);
        let first = a.flush();
        a.set_parameter("tessellationAmount", 7.0);
        assert_eq!(first, a.flush());
        assert_eq!(first, b.flush());
    }

    #[test]
    fn resources_must_match_the_slot_kind() {
        let mut pixel = ShaderProgram::from_source(ShaderStage::Pixel, "pixel", PIXEL).unwrap();
        assert!(!pixel.set_resource("albedo", Resource::Sampler(Handle::new(0))));
        assert_eq!(pixel.flush().unbound().collect::<Vec<_>>(), ["albedo", "albedo_sampler"]);

        assert!(pixel.set_resource("albedo", Resource::Texture(Handle::new(2))));
        assert!(pixel.set_resource("albedo_sampler", Resource::Sampler(Handle::new(0))));
        let upload = pixel.flush();
        assert_eq!(upload.unbound().count(), 0);
        assert!(upload.constants.is_empty());
        assert_eq!(upload.resources[0].resource, Some(Resource::Texture(Handle::new(2))));
    }

    #[test]
    fn load_from_file_uses_the_fallback() {
        let dir = std::env::temp_dir().join(format!("tess-demo-shader-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("hull.wgsl"), HULL).unwrap();

        let program =
            ShaderProgram::load_from_file(ShaderStage::Hull, &dir.join("missing.wgsl"), &dir.join("hull.wgsl"))
                .unwrap();
        assert_eq!(program.group(), Some(1));

        let err = ShaderProgram::load_from_file(ShaderStage::Hull, &dir.join("a.wgsl"), &dir.join("b.wgsl"))
            .unwrap_err();
        assert!(err.to_string().contains("b.wgsl"));
        std::fs::remove_dir_all(dir).unwrap();
    }
}
