//! Pure WGSL compile step.
//!
//! [`compile`] parses and validates both stages with naga and resolves the
//! four named slots every program must expose. The result is an immutable
//! [`CompiledProgram`]; backends build GPU objects from it and never look
//! anything up by name again.

use meshview_common::Vertex;
use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::{AddressSpace, Binding, EntryPoint, Handle, Module, ShaderStage, Type, TypeInner, VectorSize};
use serde::Serialize;
use std::fmt;

/// Vertex input carrying the model-space position.
pub const POSITION_ATTRIBUTE: &str = "Position";
/// Vertex input carrying the per-vertex color.
pub const COLOR_ATTRIBUTE: &str = "SourceColor";
/// Uniform holding the model's world matrix.
pub const WORLD_UNIFORM: &str = "World";
/// Uniform holding projection * view.
pub const PROJECTION_UNIFORM: &str = "Projection";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Vertex,
    Fragment,
}

impl Stage {
    fn naga(self) -> ShaderStage {
        match self {
            Stage::Vertex => ShaderStage::Vertex,
            Stage::Fragment => ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Vertex => f.write_str("vertex"),
            Stage::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShaderError {
    #[error("{stage} shader of `{label}` failed to parse:\n{message}")]
    Parse {
        label: String,
        stage: Stage,
        message: String,
    },
    #[error("{stage} shader of `{label}` failed validation: {message}")]
    Validation {
        label: String,
        stage: Stage,
        message: String,
    },
    #[error("{stage} shader of `{label}` has no {stage} entry point")]
    MissingEntryPoint { label: String, stage: Stage },
    #[error("vertex shader of `{label}` has no `{name}` input")]
    MissingAttribute { label: String, name: &'static str },
    #[error("vertex input `{name}` of `{label}` must be a {expected}")]
    AttributeType {
        label: String,
        name: &'static str,
        expected: &'static str,
    },
    #[error("vertex shader of `{label}` has no `{name}` uniform")]
    MissingUniform { label: String, name: &'static str },
    #[error("uniform `{name}` of `{label}` must be a mat4x4<f32>")]
    UniformType { label: String, name: &'static str },
    #[error("uniform `{name}` of `{label}` is in group {group}; only group 0 is supported")]
    UniformGroup {
        label: String,
        name: &'static str,
        group: u32,
    },
    #[error("`World` and `Projection` of `{label}` share binding {binding}")]
    SharedBinding { label: String, binding: u32 },
    #[error("fragment input @location({location}) of `{label}` is not written by the vertex stage")]
    Link { label: String, location: u32 },
    #[error("@location({location}) of `{label}` has different types in the vertex and fragment stages")]
    LinkType { label: String, location: u32 },
}

/// Location of a uniform inside the program's bind groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UniformSlot {
    pub group: u32,
    pub binding: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttributeFormat {
    Float32x3,
    Float32x4,
}

/// One vertex attribute as it is laid out inside a [`Vertex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: AttributeFormat,
    pub offset: u64,
    pub stride: u64,
}

/// Resolved attribute locations and uniform bindings of a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgramSlots {
    pub position: u32,
    pub color: u32,
    pub world: UniformSlot,
    pub projection: UniformSlot,
}

impl ProgramSlots {
    /// Position then color, both read from a tightly packed [`Vertex`] stream.
    pub fn vertex_attributes(&self) -> [VertexAttribute; 2] {
        [
            VertexAttribute {
                location: self.position,
                format: AttributeFormat::Float32x3,
                offset: Vertex::POSITION_OFFSET,
                stride: Vertex::STRIDE,
            },
            VertexAttribute {
                location: self.color,
                format: AttributeFormat::Float32x4,
                offset: Vertex::COLOR_OFFSET,
                stride: Vertex::STRIDE,
            },
        ]
    }
}

/// A validated program: both sources, their entry points and resolved slots.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledProgram {
    label: String,
    vertex_source: String,
    fragment_source: String,
    vertex_entry: String,
    fragment_entry: String,
    slots: ProgramSlots,
}

impl CompiledProgram {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn vertex_source(&self) -> &str {
        &self.vertex_source
    }

    pub fn fragment_source(&self) -> &str {
        &self.fragment_source
    }

    pub fn vertex_entry(&self) -> &str {
        &self.vertex_entry
    }

    pub fn fragment_entry(&self) -> &str {
        &self.fragment_entry
    }

    pub fn slots(&self) -> ProgramSlots {
        self.slots
    }
}

/// Compile a vertex/fragment pair of WGSL sources.
pub fn compile(
    label: &str,
    vertex_source: &str,
    fragment_source: &str,
) -> Result<CompiledProgram, ShaderError> {
    let vertex = parse(label, Stage::Vertex, vertex_source)?;
    let fragment = parse(label, Stage::Fragment, fragment_source)?;

    let vs_entry = entry_point(label, &vertex, Stage::Vertex)?;
    let fs_entry = entry_point(label, &fragment, Stage::Fragment)?;

    let inputs = location_inputs(&vertex, vs_entry);
    let position = attribute(label, &vertex, &inputs, POSITION_ATTRIBUTE, VectorSize::Tri)?;
    let color = attribute(label, &vertex, &inputs, COLOR_ATTRIBUTE, VectorSize::Quad)?;

    let world = uniform(label, &vertex, WORLD_UNIFORM)?;
    let projection = uniform(label, &vertex, PROJECTION_UNIFORM)?;
    if world.binding == projection.binding {
        return Err(ShaderError::SharedBinding {
            label: label.to_string(),
            binding: world.binding,
        });
    }

    link(label, &vertex, vs_entry, &fragment, fs_entry)?;

    let slots = ProgramSlots {
        position,
        color,
        world,
        projection,
    };
    tracing::debug!(label, ?slots, "compiled shader program");

    Ok(CompiledProgram {
        label: label.to_string(),
        vertex_source: vertex_source.to_string(),
        fragment_source: fragment_source.to_string(),
        vertex_entry: vs_entry.name.clone(),
        fragment_entry: fs_entry.name.clone(),
        slots,
    })
}

fn parse(label: &str, stage: Stage, source: &str) -> Result<Module, ShaderError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| ShaderError::Parse {
        label: label.to_string(),
        stage,
        message: e.emit_to_string(source),
    })?;
    Validator::new(ValidationFlags::all(), Capabilities::empty())
        .validate(&module)
        .map_err(|e| ShaderError::Validation {
            label: label.to_string(),
            stage,
            message: e.to_string(),
        })?;
    Ok(module)
}

fn entry_point<'m>(label: &str, module: &'m Module, stage: Stage) -> Result<&'m EntryPoint, ShaderError> {
    module
        .entry_points
        .iter()
        .find(|ep| ep.stage == stage.naga())
        .ok_or_else(|| ShaderError::MissingEntryPoint {
            label: label.to_string(),
            stage,
        })
}

/// Named `@location` inputs of an entry point, whether declared as plain
/// arguments or as members of a struct argument.
fn location_inputs(module: &Module, ep: &EntryPoint) -> Vec<(String, u32, Handle<Type>)> {
    let mut inputs = Vec::new();
    for arg in &ep.function.arguments {
        match (&arg.binding, &module.types[arg.ty].inner) {
            (Some(Binding::Location { location, .. }), _) => {
                if let Some(name) = &arg.name {
                    inputs.push((name.clone(), *location, arg.ty));
                }
            }
            (None, TypeInner::Struct { members, .. }) => {
                for member in members {
                    if let (Some(name), Some(Binding::Location { location, .. })) =
                        (&member.name, &member.binding)
                    {
                        inputs.push((name.clone(), *location, member.ty));
                    }
                }
            }
            _ => {}
        }
    }
    inputs
}

/// `@location` outputs of a vertex entry point, from a bare result or the
/// members of a result struct.
fn location_outputs(module: &Module, ep: &EntryPoint) -> Vec<(u32, Handle<Type>)> {
    let Some(result) = &ep.function.result else {
        return Vec::new();
    };
    match (&result.binding, &module.types[result.ty].inner) {
        (Some(Binding::Location { location, .. }), _) => vec![(*location, result.ty)],
        (None, TypeInner::Struct { members, .. }) => members
            .iter()
            .filter_map(|member| match member.binding {
                Some(Binding::Location { location, .. }) => Some((location, member.ty)),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Every fragment `@location` input must be written by the vertex stage with
/// the same type.
fn link(
    label: &str,
    vertex: &Module,
    vs_entry: &EntryPoint,
    fragment: &Module,
    fs_entry: &EntryPoint,
) -> Result<(), ShaderError> {
    let outputs = location_outputs(vertex, vs_entry);
    for (_, location, ty) in location_inputs(fragment, fs_entry) {
        let Some((_, out_ty)) = outputs.iter().find(|(l, _)| *l == location) else {
            return Err(ShaderError::Link {
                label: label.to_string(),
                location,
            });
        };
        if vertex.types[*out_ty].inner != fragment.types[ty].inner {
            return Err(ShaderError::LinkType {
                label: label.to_string(),
                location,
            });
        }
    }
    Ok(())
}

fn attribute(
    label: &str,
    module: &Module,
    inputs: &[(String, u32, Handle<Type>)],
    name: &'static str,
    size: VectorSize,
) -> Result<u32, ShaderError> {
    let (_, location, ty) = inputs
        .iter()
        .find(|(n, _, _)| n == name)
        .ok_or_else(|| ShaderError::MissingAttribute {
            label: label.to_string(),
            name,
        })?;
    match module.types[*ty].inner {
        TypeInner::Vector { size: s, .. } if s == size => Ok(*location),
        _ => Err(ShaderError::AttributeType {
            label: label.to_string(),
            name,
            expected: match size {
                VectorSize::Tri => "vec3<f32>",
                _ => "vec4<f32>",
            },
        }),
    }
}

fn uniform(label: &str, module: &Module, name: &'static str) -> Result<UniformSlot, ShaderError> {
    let missing = || ShaderError::MissingUniform {
        label: label.to_string(),
        name,
    };
    let (_, var) = module
        .global_variables
        .iter()
        .find(|(_, var)| var.name.as_deref() == Some(name) && var.space == AddressSpace::Uniform)
        .ok_or_else(missing)?;
    let binding = var.binding.as_ref().ok_or_else(missing)?;

    let is_mat4 = matches!(
        module.types[var.ty].inner,
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            ..
        }
    );
    if !is_mat4 {
        return Err(ShaderError::UniformType {
            label: label.to_string(),
            name,
        });
    }
    if binding.group != 0 {
        return Err(ShaderError::UniformGroup {
            label: label.to_string(),
            name,
            group: binding.group,
        });
    }
    Ok(UniformSlot {
        group: binding.group,
        binding: binding.binding,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shaders;

    const FS: &str = shaders::COLOR_FS;

    #[test]
    fn builtin_program_resolves_all_slots() {
        let program = compile("color", shaders::COLOR_VS, FS).unwrap();
        let slots = program.slots();
        assert_eq!(slots.position, 0);
        assert_eq!(slots.color, 1);
        assert_eq!(slots.projection, UniformSlot { group: 0, binding: 0 });
        assert_eq!(slots.world, UniformSlot { group: 0, binding: 1 });
        assert_eq!(program.vertex_entry(), "vs_main");
        assert_eq!(program.fragment_entry(), "fs_main");
    }

    #[test]
    fn attribute_layout_uses_vertex_stride() {
        let program = compile("color", shaders::COLOR_VS, FS).unwrap();
        let [position, color] = program.slots().vertex_attributes();
        assert_eq!(position.offset, 0);
        assert_eq!(color.offset, 12);
        assert_eq!(position.stride, 28);
        assert_eq!(color.format, AttributeFormat::Float32x4);
    }

    #[test]
    fn plain_argument_inputs_are_found() {
        let vs = r#"
@group(0) @binding(3) var<uniform> World: mat4x4<f32>;
@group(0) @binding(2) var<uniform> Projection: mat4x4<f32>;

@vertex
fn main(@location(4) Position: vec3<f32>, @location(7) SourceColor: vec4<f32>) -> @builtin(position) vec4<f32> {
    return Projection * World * vec4<f32>(Position, SourceColor.a);
}
"#;
        let fs = "@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";
        let program = compile("plain", vs, fs).unwrap();
        let slots = program.slots();
        assert_eq!((slots.position, slots.color), (4, 7));
        assert_eq!(slots.world.binding, 3);
        assert_eq!(slots.projection.binding, 2);
        assert_eq!(program.vertex_entry(), "main");
    }

    #[test]
    fn malformed_source_fails_to_parse() {
        let err = compile("broken", "@vertex fn vs_main( -> {", FS).unwrap_err();
        assert!(matches!(
            err,
            ShaderError::Parse {
                stage: Stage::Vertex,
                ..
            }
        ));
    }

    #[test]
    fn malformed_fragment_reports_fragment_stage() {
        let err = compile("broken", shaders::COLOR_VS, "fn nope(").unwrap_err();
        assert!(matches!(
            err,
            ShaderError::Parse {
                stage: Stage::Fragment,
                ..
            }
        ));
    }

    #[test]
    fn stages_must_match_their_slot() {
        let err = compile("swapped", FS, shaders::COLOR_VS).unwrap_err();
        assert_eq!(
            err,
            ShaderError::MissingEntryPoint {
                label: "swapped".into(),
                stage: Stage::Vertex,
            }
        );
    }

    #[test]
    fn missing_color_input_is_reported() {
        let vs = r#"
@group(0) @binding(0) var<uniform> Projection: mat4x4<f32>;
@group(0) @binding(1) var<uniform> World: mat4x4<f32>;

@vertex
fn vs_main(@location(0) Position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return Projection * World * vec4<f32>(Position, 1.0);
}
"#;
        let err = compile("no_color", vs, FS).unwrap_err();
        assert!(matches!(
            err,
            ShaderError::MissingAttribute {
                name: COLOR_ATTRIBUTE,
                ..
            }
        ));
    }

    #[test]
    fn wrong_position_width_is_reported() {
        let vs = r#"
@group(0) @binding(0) var<uniform> Projection: mat4x4<f32>;
@group(0) @binding(1) var<uniform> World: mat4x4<f32>;

@vertex
fn vs_main(@location(0) Position: vec4<f32>, @location(1) SourceColor: vec4<f32>) -> @builtin(position) vec4<f32> {
    return Projection * World * Position * SourceColor.a;
}
"#;
        let err = compile("wide", vs, FS).unwrap_err();
        assert!(matches!(
            err,
            ShaderError::AttributeType {
                name: POSITION_ATTRIBUTE,
                expected: "vec3<f32>",
                ..
            }
        ));
    }

    #[test]
    fn missing_world_uniform_is_reported() {
        let vs = r#"
@group(0) @binding(0) var<uniform> Projection: mat4x4<f32>;

@vertex
fn vs_main(@location(0) Position: vec3<f32>, @location(1) SourceColor: vec4<f32>) -> @builtin(position) vec4<f32> {
    return Projection * vec4<f32>(Position, SourceColor.a);
}
"#;
        let err = compile("no_world", vs, FS).unwrap_err();
        assert!(matches!(
            err,
            ShaderError::MissingUniform {
                name: WORLD_UNIFORM,
                ..
            }
        ));
    }

    #[test]
    fn non_matrix_uniform_is_reported() {
        let vs = r#"
@group(0) @binding(0) var<uniform> Projection: mat4x4<f32>;
@group(0) @binding(1) var<uniform> World: vec4<f32>;

@vertex
fn vs_main(@location(0) Position: vec3<f32>, @location(1) SourceColor: vec4<f32>) -> @builtin(position) vec4<f32> {
    return Projection * vec4<f32>(Position, SourceColor.a) + World;
}
"#;
        let err = compile("vec_world", vs, FS).unwrap_err();
        assert!(matches!(
            err,
            ShaderError::UniformType {
                name: WORLD_UNIFORM,
                ..
            }
        ));
    }

    #[test]
    fn uniforms_outside_group_zero_are_rejected() {
        let vs = r#"
@group(0) @binding(0) var<uniform> Projection: mat4x4<f32>;
@group(1) @binding(0) var<uniform> World: mat4x4<f32>;

@vertex
fn vs_main(@location(0) Position: vec3<f32>, @location(1) SourceColor: vec4<f32>) -> @builtin(position) vec4<f32> {
    return Projection * World * vec4<f32>(Position, SourceColor.a);
}
"#;
        let err = compile("group1", vs, FS).unwrap_err();
        assert!(matches!(err, ShaderError::UniformGroup { group: 1, .. }));
    }

    #[test]
    fn unwritten_fragment_input_fails_to_link() {
        let fs = r#"
@fragment
fn fs_main(@location(3) tint: vec4<f32>) -> @location(0) vec4<f32> {
    return tint;
}
"#;
        let err = compile("unlinked", shaders::COLOR_VS, fs).unwrap_err();
        assert_eq!(
            err,
            ShaderError::Link {
                label: "unlinked".into(),
                location: 3,
            }
        );
    }

    #[test]
    fn mismatched_interface_type_fails_to_link() {
        let fs = r#"
@fragment
fn fs_main(@location(0) color: vec3<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(color, 1.0);
}
"#;
        let err = compile("narrow", shaders::COLOR_VS, fs).unwrap_err();
        assert!(matches!(err, ShaderError::LinkType { location: 0, .. }));
    }

    #[test]
    fn unlinkable_program_never_reaches_backend() {
        use crate::{FrameRenderer, RecordingBackend, Viewport};
        use meshview_common::ClearColor;

        let fs = "@fragment fn fs_main(@location(3) t: vec4<f32>) -> @location(0) vec4<f32> { return t; }";
        let mut r = FrameRenderer::new(
            RecordingBackend::new(Viewport::new(64, 64)),
            ClearColor::default(),
        );
        let err = r.create_program("unlinked", shaders::COLOR_VS, fs).err().unwrap();
        assert!(matches!(err, crate::RenderError::Shader(ShaderError::Link { .. })));
        assert_eq!(r.backend().program_count(), 0);
    }

    #[test]
    fn type_errors_fail_validation() {
        let fs = r#"
fn half() -> f32 {
    return 1i;
}

@fragment
fn fs_main(@location(0) color: vec4<f32>) -> @location(0) vec4<f32> {
    return color * half();
}
"#;
        let err = compile("mistyped", shaders::COLOR_VS, fs).unwrap_err();
        assert!(matches!(
            err,
            ShaderError::Validation {
                stage: Stage::Fragment,
                ..
            }
        ));
    }

    #[test]
    fn colliding_bindings_in_use_fail_validation() {
        let vs = r#"
@group(0) @binding(0) var<uniform> Projection: mat4x4<f32>;
@group(0) @binding(0) var<uniform> World: mat4x4<f32>;

@vertex
fn vs_main(@location(0) Position: vec3<f32>, @location(1) SourceColor: vec4<f32>) -> @builtin(position) vec4<f32> {
    return Projection * World * vec4<f32>(Position, SourceColor.a);
}
"#;
        let fs = "@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";
        let err = compile("collide", vs, fs).unwrap_err();
        assert!(matches!(
            err,
            ShaderError::Validation {
                stage: Stage::Vertex,
                ..
            }
        ));
    }

    #[test]
    fn world_sharing_projection_binding_is_rejected() {
        // `World` is declared but unused, so naga accepts the collision.
        let vs = r#"
@group(0) @binding(0) var<uniform> Projection: mat4x4<f32>;
@group(0) @binding(0) var<uniform> World: mat4x4<f32>;

@vertex
fn vs_main(@location(0) Position: vec3<f32>, @location(1) SourceColor: vec4<f32>) -> @builtin(position) vec4<f32> {
    return Projection * vec4<f32>(Position, SourceColor.a);
}
"#;
        let fs = "@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";
        let err = compile("shared", vs, fs).unwrap_err();
        assert_eq!(
            err,
            ShaderError::SharedBinding {
                label: "shared".into(),
                binding: 0,
            }
        );
    }
}
