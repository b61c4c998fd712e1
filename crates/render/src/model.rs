use crate::backend::{GraphicsBackend, RenderError};
use glam::{Mat4, Vec3};
use meshview_common::{CUBE_INDICES, CUBE_VERTICES, Vertex};

/// Static geometry placed in the world by a translation.
///
/// Buffers are uploaded once at construction and never resized.
pub struct Model<B: GraphicsBackend> {
    position: Vec3,
    world: Mat4,
    vertices: Vec<Vertex>,
    indices: Vec<u8>,
    mesh: B::Mesh,
}

impl<B: GraphicsBackend> Model<B> {
    /// A cube translated to (x, y, z).
    pub fn new(backend: &mut B, x: f32, y: f32, z: f32) -> Result<Self, RenderError> {
        Self::at(backend, Vec3::new(x, y, z))
    }

    pub fn at(backend: &mut B, position: Vec3) -> Result<Self, RenderError> {
        Self::with_geometry(
            backend,
            position,
            CUBE_VERTICES.to_vec(),
            CUBE_INDICES.to_vec(),
        )
    }

    /// Arbitrary triangle-list geometry. Every index must address a vertex.
    pub fn with_geometry(
        backend: &mut B,
        position: Vec3,
        vertices: Vec<Vertex>,
        indices: Vec<u8>,
    ) -> Result<Self, RenderError> {
        validate(&vertices, &indices)?;
        let world = Mat4::from_translation(position);
        let mesh = backend.upload_mesh(&vertices, &indices, world)?;
        tracing::debug!(
            ?position,
            vertices = vertices.len(),
            indices = indices.len(),
            "uploaded model"
        );
        Ok(Self {
            position,
            world,
            vertices,
            indices,
            mesh,
        })
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn world_matrix(&self) -> Mat4 {
        self.world
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u8] {
        &self.indices
    }

    /// Number of indices drawn per frame; always the full index list.
    pub fn index_count(&self) -> u32 {
        u32::try_from(self.indices.len()).unwrap_or(u32::MAX)
    }

    pub fn mesh(&self) -> &B::Mesh {
        &self.mesh
    }
}

fn validate(vertices: &[Vertex], indices: &[u8]) -> Result<(), RenderError> {
    if vertices.is_empty() || indices.is_empty() {
        return Err(RenderError::InvalidMesh("empty geometry".into()));
    }
    draw_count(indices.len())?;
    if indices.len() % 3 != 0 {
        return Err(RenderError::InvalidMesh(format!(
            "{} indices do not form whole triangles",
            indices.len()
        )));
    }
    if let Some(&i) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
        return Err(RenderError::InvalidMesh(format!(
            "index {i} out of bounds for {} vertices",
            vertices.len()
        )));
    }
    Ok(())
}

/// Index count of one draw call; must fit the backend's `u32` range.
fn draw_count(len: usize) -> Result<u32, RenderError> {
    u32::try_from(len)
        .map_err(|_| RenderError::InvalidMesh(format!("{len} indices exceed a single draw")))
}
