use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// A single mesh vertex: position followed by an RGBA color.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

impl Vertex {
    /// Distance in bytes between consecutive vertices.
    pub const STRIDE: u64 = std::mem::size_of::<Vertex>() as u64;
    /// Byte offset of `position` inside a vertex.
    pub const POSITION_OFFSET: u64 = std::mem::offset_of!(Vertex, position) as u64;
    /// Byte offset of `color` inside a vertex.
    pub const COLOR_OFFSET: u64 = std::mem::offset_of!(Vertex, color) as u64;

    pub const fn new(position: [f32; 3], color: [f32; 4]) -> Self {
        Self { position, color }
    }

    pub fn position_vec3(&self) -> Vec3 {
        Vec3::from(self.position)
    }
}

const YELLOW: [f32; 4] = [1.0, 1.0, 0.0, 1.0];
const CYAN: [f32; 4] = [0.0, 1.0, 1.0, 1.0];

/// Corners of a cube spanning [-1, 1] on every axis.
#[rustfmt::skip]
pub const CUBE_VERTICES: [Vertex; 8] = [
    Vertex::new([ 1.0, -1.0,  1.0], YELLOW),
    Vertex::new([ 1.0,  1.0,  1.0], CYAN),
    Vertex::new([-1.0,  1.0,  1.0], YELLOW),
    Vertex::new([-1.0, -1.0,  1.0], YELLOW),
    Vertex::new([ 1.0, -1.0, -1.0], CYAN),
    Vertex::new([ 1.0,  1.0, -1.0], YELLOW),
    Vertex::new([-1.0,  1.0, -1.0], YELLOW),
    Vertex::new([-1.0, -1.0, -1.0], CYAN),
];

/// Triangle list over [`CUBE_VERTICES`], two triangles per face.
#[rustfmt::skip]
pub const CUBE_INDICES: [u8; 36] = [
    0, 1, 2,  2, 3, 0, // front
    4, 6, 5,  4, 7, 6, // back
    2, 7, 3,  7, 6, 2, // left
    0, 4, 1,  4, 1, 5, // right
    6, 2, 1,  1, 6, 5, // top
    0, 3, 7,  0, 7, 4, // bottom
];

/// RGBA color used to clear the color target at the start of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClearColor(pub [f32; 4]);

impl ClearColor {
    pub fn r(&self) -> f32 {
        self.0[0]
    }

    pub fn g(&self) -> f32 {
        self.0[1]
    }

    pub fn b(&self) -> f32 {
        self.0[2]
    }

    pub fn a(&self) -> f32 {
        self.0[3]
    }
}

impl Default for ClearColor {
    /// Dark green background.
    fn default() -> Self {
        Self([0.0, 104.0 / 255.0, 55.0 / 255.0, 1.0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_matches_gpu_expectations() {
        assert_eq!(Vertex::STRIDE, 28);
        assert_eq!(Vertex::POSITION_OFFSET, 0);
        assert_eq!(Vertex::COLOR_OFFSET, 12);
    }

    #[test]
    fn cube_indices_stay_in_bounds() {
        assert_eq!(CUBE_INDICES.len() % 3, 0);
        assert!(
            CUBE_INDICES
                .iter()
                .all(|&i| (i as usize) < CUBE_VERTICES.len())
        );
    }

    #[test]
    fn cube_spans_unit_extent() {
        for v in CUBE_VERTICES {
            assert!(v.position_vec3().abs().cmpeq(Vec3::ONE).all());
        }
    }

    #[test]
    fn vertices_cast_to_bytes() {
        let bytes: &[u8] = bytemuck::cast_slice(&CUBE_VERTICES);
        assert_eq!(bytes.len(), 8 * 28);
    }

    #[test]
    fn default_clear_color_is_opaque() {
        let c = ClearColor::default();
        assert_eq!(c.r(), 0.0);
        assert!(c.g() > c.b());
        assert_eq!(c.a(), 1.0);
    }
}
