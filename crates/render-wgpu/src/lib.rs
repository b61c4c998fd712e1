//! wgpu implementation of [`meshview_render::GraphicsBackend`].
//!
//! # Invariants
//! - One render pipeline per program, built from its resolved slots.
//! - Every mesh owns its vertex, index and uniform buffers for the process lifetime.
//! - 8-bit indices are widened to 16 bits on upload; wgpu has no 8-bit index format.

mod gpu;

pub use gpu::{WgpuBackend, WgpuMesh, WgpuProgram};
