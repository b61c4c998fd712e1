//! Shared types for the meshview workspace.
//!
//! # Invariants
//! - `Vertex` is `#[repr(C)]` and POD, so its byte layout is the GPU layout.
//! - Cube indices never exceed the cube vertex count.

mod types;

pub use types::{CUBE_INDICES, CUBE_VERTICES, ClearColor, Vertex};
