use crate::backend::{GraphicsBackend, RenderError, Viewport};
use crate::shader::{CompiledProgram, ProgramSlots, VertexAttribute};
use glam::Mat4;
use meshview_common::{ClearColor, Vertex};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ProgramId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MeshId(pub u32);

/// One call received by a [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    CreateProgram {
        program: ProgramId,
        label: String,
        slots: ProgramSlots,
    },
    UploadMesh {
        mesh: MeshId,
        vertices: usize,
        indices: usize,
        world: Mat4,
    },
    BeginFrame {
        clear: ClearColor,
        viewport: Viewport,
    },
    SetParameters {
        program: ProgramId,
        mesh: MeshId,
        view_projection: Mat4,
        world: Mat4,
        attributes: [VertexAttribute; 2],
    },
    DrawIndexed {
        mesh: MeshId,
        index_count: u32,
    },
    Present,
    Abort,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::CreateProgram {
                program,
                label,
                slots,
            } => write!(
                f,
                "create_program #{} `{label}` position@{} color@{} world@{}/{} projection@{}/{}",
                program.0,
                slots.position,
                slots.color,
                slots.world.group,
                slots.world.binding,
                slots.projection.group,
                slots.projection.binding
            ),
            Command::UploadMesh {
                mesh,
                vertices,
                indices,
                world,
            } => {
                let t = world.w_axis;
                write!(
                    f,
                    "upload_mesh #{} vertices={vertices} indices={indices} at=({:.2}, {:.2}, {:.2})",
                    mesh.0, t.x, t.y, t.z
                )
            }
            Command::BeginFrame { clear, viewport } => write!(
                f,
                "begin_frame {}x{} clear=({:.3}, {:.3}, {:.3}, {:.3})",
                viewport.width,
                viewport.height,
                clear.r(),
                clear.g(),
                clear.b(),
                clear.a()
            ),
            Command::SetParameters { program, mesh, .. } => {
                write!(f, "set_parameters program=#{} mesh=#{}", program.0, mesh.0)
            }
            Command::DrawIndexed { mesh, index_count } => {
                write!(f, "draw_indexed mesh=#{} count={index_count} (u8, triangles)", mesh.0)
            }
            Command::Present => f.write_str("present"),
            Command::Abort => f.write_str("abort"),
        }
    }
}

/// Headless backend that records every call instead of touching a GPU.
///
/// It enforces the same contract a real device would: parameters and draws
/// only inside a frame, and draws never beyond a mesh's index list.
#[derive(Debug)]
pub struct RecordingBackend {
    viewport: Viewport,
    commands: Vec<Command>,
    programs: Vec<(String, ProgramSlots)>,
    mesh_indices: Vec<u32>,
    frame_open: bool,
    frames_presented: u64,
}

impl RecordingBackend {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            commands: Vec::new(),
            programs: Vec::new(),
            mesh_indices: Vec::new(),
            frame_open: false,
            frames_presented: 0,
        }
    }

    /// Simulate a surface resize.
    pub fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Drain the recorded commands.
    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    pub fn mesh_count(&self) -> usize {
        self.mesh_indices.len()
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    pub fn program_label(&self, id: ProgramId) -> Option<&str> {
        self.programs.get(id.0 as usize).map(|(label, _)| label.as_str())
    }

    /// Draw commands recorded so far, in submission order.
    pub fn draws(&self) -> impl Iterator<Item = (MeshId, u32)> + '_ {
        self.commands.iter().filter_map(|c| match c {
            Command::DrawIndexed { mesh, index_count } => Some((*mesh, *index_count)),
            _ => None,
        })
    }

    fn require_frame(&self, op: &str) -> Result<(), RenderError> {
        if self.frame_open {
            Ok(())
        } else {
            Err(RenderError::Backend(format!("{op} outside of a frame")))
        }
    }
}

impl GraphicsBackend for RecordingBackend {
    type Program = ProgramId;
    type Mesh = MeshId;

    fn surface_size(&self) -> Viewport {
        self.viewport
    }

    fn create_program(&mut self, program: &CompiledProgram) -> Result<ProgramId, RenderError> {
        let id = ProgramId(self.programs.len() as u32);
        self.programs
            .push((program.label().to_string(), program.slots()));
        self.commands.push(Command::CreateProgram {
            program: id,
            label: program.label().to_string(),
            slots: program.slots(),
        });
        Ok(id)
    }

    fn upload_mesh(
        &mut self,
        vertices: &[Vertex],
        indices: &[u8],
        world: Mat4,
    ) -> Result<MeshId, RenderError> {
        let id = MeshId(self.mesh_indices.len() as u32);
        self.mesh_indices.push(indices.len() as u32);
        self.commands.push(Command::UploadMesh {
            mesh: id,
            vertices: vertices.len(),
            indices: indices.len(),
            world,
        });
        Ok(id)
    }

    fn begin_frame(&mut self, clear: ClearColor, viewport: Viewport) -> Result<(), RenderError> {
        if self.frame_open {
            return Err(RenderError::Backend("begin_frame with a frame already open".into()));
        }
        self.frame_open = true;
        self.commands.push(Command::BeginFrame { clear, viewport });
        Ok(())
    }

    fn set_parameters(
        &mut self,
        program: &ProgramId,
        mesh: &MeshId,
        view_projection: Mat4,
        world: Mat4,
    ) -> Result<(), RenderError> {
        self.require_frame("set_parameters")?;
        let (_, slots) = self
            .programs
            .get(program.0 as usize)
            .ok_or_else(|| RenderError::Backend(format!("unknown program #{}", program.0)))?;
        let attributes = slots.vertex_attributes();
        self.commands.push(Command::SetParameters {
            program: *program,
            mesh: *mesh,
            view_projection,
            world,
            attributes,
        });
        Ok(())
    }

    fn draw_indexed(&mut self, mesh: &MeshId, index_count: u32) -> Result<(), RenderError> {
        self.require_frame("draw_indexed")?;
        let available = *self
            .mesh_indices
            .get(mesh.0 as usize)
            .ok_or_else(|| RenderError::Backend(format!("unknown mesh #{}", mesh.0)))?;
        if index_count > available {
            return Err(RenderError::Backend(format!(
                "draw of {index_count} indices exceeds mesh #{} ({available})",
                mesh.0
            )));
        }
        self.commands.push(Command::DrawIndexed {
            mesh: *mesh,
            index_count,
        });
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), RenderError> {
        self.require_frame("end_frame")?;
        self.frame_open = false;
        self.frames_presented += 1;
        self.commands.push(Command::Present);
        Ok(())
    }

    fn abort_frame(&mut self) {
        if self.frame_open {
            self.frame_open = false;
            self.commands.push(Command::Abort);
        }
    }
}
