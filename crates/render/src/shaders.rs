//! Built-in WGSL sources, addressed by stem.
//!
//! Vertex stages declare `Position`/`SourceColor` inputs and the
//! `Projection`/`World` uniforms; fragment stages take the interpolated color
//! at location 0.

/// Transforms by `Projection * World` and passes the vertex color through.
pub const COLOR_VS: &str = r#"
@group(0) @binding(0)
var<uniform> Projection: mat4x4<f32>;

@group(0) @binding(1)
var<uniform> World: mat4x4<f32>;

struct VertexInput {
    @location(0) Position: vec3<f32>,
    @location(1) SourceColor: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
};

@vertex
fn vs_main(vertex: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = Projection * World * vec4<f32>(vertex.Position, 1.0);
    out.color = vertex.SourceColor;
    return out;
}
"#;

/// Writes the interpolated vertex color.
pub const COLOR_FS: &str = r#"
@fragment
fn fs_main(@location(0) color: vec4<f32>) -> @location(0) vec4<f32> {
    return color;
}
"#;

/// Interpolated vertex color pushed toward red.
pub const TINT_FS: &str = r#"
@fragment
fn fs_main(@location(0) color: vec4<f32>) -> @location(0) vec4<f32> {
    let tint = vec3<f32>(1.0, 0.45, 0.45);
    return vec4<f32>(color.rgb * tint, color.a);
}
"#;

/// Stems of every built-in source, in lookup order.
pub const BUILTIN_STEMS: [&str; 3] = ["color_vs", "color_fs", "tint_fs"];

/// Built-in source for `stem`, if there is one.
pub fn builtin(stem: &str) -> Option<&'static str> {
    match stem {
        "color_vs" => Some(COLOR_VS),
        "color_fs" => Some(COLOR_FS),
        "tint_fs" => Some(TINT_FS),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile;

    #[test]
    fn every_stem_resolves() {
        for stem in BUILTIN_STEMS {
            assert!(builtin(stem).is_some(), "missing {stem}");
        }
        assert!(builtin("nope").is_none());
    }

    #[test]
    fn builtin_pairs_compile() {
        compile("color", COLOR_VS, COLOR_FS).unwrap();
        compile("tint", COLOR_VS, TINT_FS).unwrap();
    }
}
