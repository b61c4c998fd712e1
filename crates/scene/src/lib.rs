//! Scene description and assembly.
//!
//! A [`SceneConfig`] names the programs and models to create; [`Scene::build`]
//! turns it into live objects on a [`meshview_render::FrameRenderer`], and
//! [`Scene::draw`] renders one frame of them.
//!
//! # Invariants
//! - A scene is either fully built or not built at all.
//! - Every model references a program that exists in the same scene.

mod config;
mod library;
mod scene;

pub use config::{CameraConfig, ConfigError, ModelConfig, ProgramConfig, SceneConfig, WindowConfig};
pub use library::{LibraryError, ShaderLibrary};
pub use scene::{Scene, SceneError};

pub fn crate_info() -> &'static str {
    "meshview-scene v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("scene"));
    }
}
