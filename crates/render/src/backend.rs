use crate::shader::{CompiledProgram, ShaderError};
use glam::Mat4;
use meshview_common::{ClearColor, Vertex};
use serde::Serialize;

/// Errors surfaced by the renderer and its backends.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("a frame is already in progress; call end_frame first")]
    FrameInProgress,
    #[error("no frame in progress; call begin_frame first")]
    NoFrameInProgress,
    #[error(transparent)]
    Shader(#[from] ShaderError),
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),
    #[error("viewport {width}x{height} has no area")]
    InvalidViewport { width: u32, height: u32 },
    #[error("surface unavailable this frame")]
    SurfaceUnavailable,
    #[error("backend error: {0}")]
    Backend(String),
}

/// Drawable area of the current surface, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Width over height. A zero height is treated as one pixel.
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

/// The GPU-facing half of the renderer.
///
/// Implementations own every GPU object. `Program` and `Mesh` are opaque
/// handles returned at creation time and handed back on every draw; the
/// renderer never looks inside them.
pub trait GraphicsBackend {
    /// Handle for a linked program.
    type Program;
    /// Handle for uploaded vertex and index buffers.
    type Mesh;

    /// Current size of the presentation surface.
    fn surface_size(&self) -> Viewport;

    /// Turn a compiled program into a GPU program.
    fn create_program(&mut self, program: &CompiledProgram) -> Result<Self::Program, RenderError>;

    /// Upload static geometry. `world` is the initial world transform.
    fn upload_mesh(
        &mut self,
        vertices: &[Vertex],
        indices: &[u8],
        world: Mat4,
    ) -> Result<Self::Mesh, RenderError>;

    /// Clear color and depth, enable depth testing, set the viewport.
    fn begin_frame(&mut self, clear: ClearColor, viewport: Viewport) -> Result<(), RenderError>;

    /// Activate `program`, upload both matrices and bind the mesh buffers
    /// with the vertex attribute layouts.
    fn set_parameters(
        &mut self,
        program: &Self::Program,
        mesh: &Self::Mesh,
        view_projection: Mat4,
        world: Mat4,
    ) -> Result<(), RenderError>;

    /// Indexed triangle-list draw over the first `index_count` indices of `mesh`.
    fn draw_indexed(&mut self, mesh: &Self::Mesh, index_count: u32) -> Result<(), RenderError>;

    /// Submit and present the frame.
    fn end_frame(&mut self) -> Result<(), RenderError>;

    /// Drop the frame in flight without presenting it.
    fn abort_frame(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_is_width_over_height() {
        assert_eq!(Viewport::new(1280, 640).aspect(), 2.0);
    }

    #[test]
    fn aspect_survives_zero_height() {
        assert_eq!(Viewport::new(300, 0).aspect(), 300.0);
    }

    #[test]
    fn zero_dimension_is_empty() {
        assert!(Viewport::new(0, 480).is_empty());
        assert!(Viewport::new(640, 0).is_empty());
        assert!(!Viewport::new(1, 1).is_empty());
    }
}
