//! Forward renderer core, independent of any GPU API.
//!
//! A frame is `begin_frame` → one `render` per (model, shader) pair →
//! `end_frame`. Everything GPU-specific sits behind [`GraphicsBackend`];
//! [`RecordingBackend`] is the headless implementation used by tools and tests.
//!
//! # Invariants
//! - A [`ShaderProgram`] only exists if both stages compiled and every slot resolved.
//! - A [`Model`] never draws more indices than it owns.
//! - `render` outside a begun frame, or a second `begin_frame`, is an error.

mod backend;
mod camera;
mod frame;
mod model;
mod program;
mod recording;
mod shader;
pub mod shaders;

pub use backend::{GraphicsBackend, RenderError, Viewport};
pub use camera::{Camera, CameraError};
pub use frame::{FrameRenderer, FrameStats, Perspective};
pub use model::Model;
pub use program::ShaderProgram;
pub use recording::{Command, MeshId, ProgramId, RecordingBackend};
pub use shader::{
    AttributeFormat, COLOR_ATTRIBUTE, CompiledProgram, POSITION_ATTRIBUTE, PROJECTION_UNIFORM,
    ProgramSlots, ShaderError, Stage, UniformSlot, VertexAttribute, WORLD_UNIFORM, compile,
};

pub fn crate_info() -> &'static str {
    "meshview-render v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("render"));
    }
}
