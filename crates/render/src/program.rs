use crate::backend::{GraphicsBackend, RenderError};
use crate::model::Model;
use crate::shader::{CompiledProgram, ProgramSlots, compile};
use glam::Mat4;

/// A compiled program together with the backend object built from it.
pub struct ShaderProgram<B: GraphicsBackend> {
    compiled: CompiledProgram,
    handle: B::Program,
}

impl<B: GraphicsBackend> ShaderProgram<B> {
    /// Compile both stages and create the GPU program.
    ///
    /// Any compile, reflection or backend failure is returned; there is no
    /// partially built program to fall back on.
    pub fn new(
        backend: &mut B,
        label: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self, RenderError> {
        let compiled = compile(label, vertex_source, fragment_source)?;
        Self::from_compiled(backend, compiled)
    }

    pub fn from_compiled(backend: &mut B, compiled: CompiledProgram) -> Result<Self, RenderError> {
        let handle = backend.create_program(&compiled)?;
        Ok(Self { compiled, handle })
    }

    /// Bind this program for `model`: uploads `projection * view` and the
    /// model's world matrix, then binds its buffers and attribute layouts.
    pub fn set_parameters(
        &self,
        backend: &mut B,
        model: &Model<B>,
        projection: Mat4,
        view: Mat4,
    ) -> Result<(), RenderError> {
        backend.set_parameters(
            &self.handle,
            model.mesh(),
            projection * view,
            model.world_matrix(),
        )
    }

    pub fn label(&self) -> &str {
        self.compiled.label()
    }

    pub fn slots(&self) -> ProgramSlots {
        self.compiled.slots()
    }

    pub fn compiled(&self) -> &CompiledProgram {
        &self.compiled
    }

    pub fn handle(&self) -> &B::Program {
        &self.handle
    }
}
