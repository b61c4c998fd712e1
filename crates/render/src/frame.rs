use crate::backend::{GraphicsBackend, RenderError, Viewport};
use crate::camera::Camera;
use crate::model::Model;
use crate::program::ShaderProgram;
use glam::{Mat4, Vec3};
use meshview_common::{ClearColor, Vertex};
use serde::Serialize;

/// Fixed perspective used for every frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Perspective {
    /// Vertical field of view in radians (about 80 degrees).
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Perspective {
    pub const FOV_Y: f32 = 1.39;
    pub const NEAR: f32 = 1.0;
    pub const FAR: f32 = 1000.0;

    /// Right-handed projection with a 0..1 depth range.
    pub fn matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, aspect, self.near, self.far)
    }
}

impl Default for Perspective {
    fn default() -> Self {
        Self {
            fov_y: Self::FOV_Y,
            near: Self::NEAR,
            far: Self::FAR,
        }
    }
}

/// Counters for one presented frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameStats {
    pub draw_calls: u32,
    pub indices: u32,
}

impl FrameStats {
    /// Count one draw of `indices` indices. Saturates at `u32::MAX`.
    pub fn record(&mut self, indices: u32) {
        self.draw_calls = self.draw_calls.saturating_add(1);
        self.indices = self.indices.saturating_add(indices);
    }
}

#[derive(Debug, Clone, Copy)]
struct FrameInFlight {
    viewport: Viewport,
    projection: Mat4,
    stats: FrameStats,
}

#[derive(Debug, Clone, Copy)]
enum FrameState {
    Idle,
    InProgress(FrameInFlight),
}

/// Per-frame orchestration over a [`GraphicsBackend`].
///
/// Two states: idle and frame-in-progress. `begin_frame` moves to in-progress,
/// `end_frame` presents and returns to idle; `render` is only accepted in
/// between.
pub struct FrameRenderer<B: GraphicsBackend> {
    backend: B,
    clear_color: ClearColor,
    perspective: Perspective,
    state: FrameState,
}

impl<B: GraphicsBackend> FrameRenderer<B> {
    pub fn new(backend: B, clear_color: ClearColor) -> Self {
        Self {
            backend,
            clear_color,
            perspective: Perspective::default(),
            state: FrameState::Idle,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    pub fn clear_color(&self) -> ClearColor {
        self.clear_color
    }

    pub fn perspective(&self) -> Perspective {
        self.perspective
    }

    pub fn is_frame_in_progress(&self) -> bool {
        matches!(self.state, FrameState::InProgress(_))
    }

    /// Projection of the frame in progress.
    pub fn projection(&self) -> Option<Mat4> {
        match self.state {
            FrameState::InProgress(frame) => Some(frame.projection),
            FrameState::Idle => None,
        }
    }

    /// Viewport of the frame in progress.
    pub fn viewport(&self) -> Option<Viewport> {
        match self.state {
            FrameState::InProgress(frame) => Some(frame.viewport),
            FrameState::Idle => None,
        }
    }

    pub fn create_program(
        &mut self,
        label: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<ShaderProgram<B>, RenderError> {
        ShaderProgram::new(&mut self.backend, label, vertex_source, fragment_source)
    }

    pub fn create_model(&mut self, position: Vec3) -> Result<Model<B>, RenderError> {
        Model::at(&mut self.backend, position)
    }

    pub fn create_mesh_model(
        &mut self,
        position: Vec3,
        vertices: Vec<Vertex>,
        indices: Vec<u8>,
    ) -> Result<Model<B>, RenderError> {
        Model::with_geometry(&mut self.backend, position, vertices, indices)
    }

    /// Clear the targets and fix the projection for this frame from the
    /// current surface aspect ratio.
    pub fn begin_frame(&mut self) -> Result<(), RenderError> {
        if self.is_frame_in_progress() {
            return Err(RenderError::FrameInProgress);
        }
        let viewport = self.backend.surface_size();
        if viewport.is_empty() {
            return Err(RenderError::InvalidViewport {
                width: viewport.width,
                height: viewport.height,
            });
        }
        let projection = self.perspective.matrix(viewport.aspect());
        self.backend.begin_frame(self.clear_color, viewport)?;
        self.state = FrameState::InProgress(FrameInFlight {
            viewport,
            projection,
            stats: FrameStats::default(),
        });
        tracing::trace!(width = viewport.width, height = viewport.height, "frame begun");
        Ok(())
    }

    /// Draw `model` with `shader` as seen from `camera`.
    pub fn render(
        &mut self,
        model: &Model<B>,
        shader: &ShaderProgram<B>,
        camera: &Camera,
    ) -> Result<(), RenderError> {
        let FrameState::InProgress(frame) = &mut self.state else {
            return Err(RenderError::NoFrameInProgress);
        };
        shader.set_parameters(
            &mut self.backend,
            model,
            frame.projection,
            camera.view_matrix(),
        )?;
        let count = model.index_count();
        self.backend.draw_indexed(model.mesh(), count)?;
        frame.stats.record(count);
        tracing::trace!(program = shader.label(), indices = count, "draw");
        Ok(())
    }

    /// Present the frame. The renderer is idle afterwards even if presenting
    /// failed.
    pub fn end_frame(&mut self) -> Result<FrameStats, RenderError> {
        let FrameState::InProgress(frame) = std::mem::replace(&mut self.state, FrameState::Idle)
        else {
            return Err(RenderError::NoFrameInProgress);
        };
        self.backend.end_frame()?;
        Ok(frame.stats)
    }

    /// Discard the frame in progress without presenting. No-op when idle.
    pub fn abort_frame(&mut self) {
        if let FrameState::InProgress(_) = std::mem::replace(&mut self.state, FrameState::Idle) {
            self.backend.abort_frame();
            tracing::debug!("frame aborted");
        }
    }
}
