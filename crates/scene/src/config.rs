use glam::Vec3;
use meshview_common::ClearColor;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Errors from loading or validating a scene file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read scene file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("program `{0}` is declared more than once")]
    DuplicateProgram(String),
    #[error("model {index} uses unknown program `{program}`")]
    UnknownProgram { index: usize, program: String },
    #[error("scene has no models")]
    NoModels,
    #[error("window size must be non-zero, got {width}x{height}")]
    EmptyWindow { width: u32, height: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "meshview".into(),
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub position: Vec3,
    pub look: Vec3,
    /// Amplitude of the sideways look oscillation, per second of run time.
    /// Zero keeps the camera still.
    pub sway: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            look: Vec3::new(0.0, 0.0, -5.0),
            sway: 1.0,
        }
    }
}

/// A shader program built from two source stems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramConfig {
    pub name: String,
    pub vertex: String,
    pub fragment: String,
}

/// A cube placed in the world, drawn with the named program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub position: Vec3,
    pub program: String,
}

/// Everything needed to build a [`crate::Scene`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub clear_color: ClearColor,
    pub window: WindowConfig,
    pub camera: CameraConfig,
    pub programs: Vec<ProgramConfig>,
    pub models: Vec<ModelConfig>,
}

impl Default for SceneConfig {
    /// Two cubes in front of the camera, one per built-in program.
    fn default() -> Self {
        Self {
            clear_color: ClearColor::default(),
            window: WindowConfig::default(),
            camera: CameraConfig::default(),
            programs: vec![
                ProgramConfig {
                    name: "color".into(),
                    vertex: "color_vs".into(),
                    fragment: "color_fs".into(),
                },
                ProgramConfig {
                    name: "tint".into(),
                    vertex: "color_vs".into(),
                    fragment: "tint_fs".into(),
                },
            ],
            models: vec![
                ModelConfig {
                    position: Vec3::new(1.0, 0.0, -12.0),
                    program: "color".into(),
                },
                ModelConfig {
                    position: Vec3::new(-2.0, -3.0, -8.0),
                    program: "tint".into(),
                },
            ],
        }
    }
}

impl SceneConfig {
    /// Read and validate a YAML scene file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&text)?;
        tracing::debug!(path = %path.display(), models = config.models.len(), "loaded scene file");
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::EmptyWindow {
                width: self.window.width,
                height: self.window.height,
            });
        }
        let mut names = HashSet::new();
        for program in &self.programs {
            if !names.insert(program.name.as_str()) {
                return Err(ConfigError::DuplicateProgram(program.name.clone()));
            }
        }
        if self.models.is_empty() {
            return Err(ConfigError::NoModels);
        }
        for (index, model) in self.models.iter().enumerate() {
            if !names.contains(model.program.as_str()) {
                return Err(ConfigError::UnknownProgram {
                    index,
                    program: model.program.clone(),
                });
            }
        }
        Ok(())
    }

    /// Index of the program named `name` in [`SceneConfig::programs`].
    pub fn program_index(&self, name: &str) -> Option<usize> {
        self.programs.iter().position(|p| p.name == name)
    }
}
