use crate::config::{ConfigError, SceneConfig};
use crate::library::{LibraryError, ShaderLibrary};
use glam::Vec3;
use meshview_render::{
    Camera, CameraError, FrameRenderer, FrameStats, GraphicsBackend, Model, RenderError,
    ShaderProgram,
};

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Library(#[from] LibraryError),
    #[error("invalid camera: {0}")]
    Camera(#[from] CameraError),
    #[error("program `{name}` failed: {source}")]
    Program {
        name: String,
        #[source]
        source: RenderError,
    },
    #[error(transparent)]
    Render(#[from] RenderError),
}

struct Entry<B: GraphicsBackend> {
    model: Model<B>,
    program: usize,
}

/// Live programs, models and camera built from a [`SceneConfig`].
pub struct Scene<B: GraphicsBackend> {
    camera: Camera,
    base_look: Vec3,
    sway: f32,
    programs: Vec<(String, ShaderProgram<B>)>,
    entries: Vec<Entry<B>>,
}

impl<B: GraphicsBackend> Scene<B> {
    /// Compile every program and upload every model. Nothing is returned
    /// unless all of them succeed.
    pub fn build(
        renderer: &mut FrameRenderer<B>,
        config: &SceneConfig,
        library: &ShaderLibrary,
    ) -> Result<Self, SceneError> {
        config.validate()?;
        let camera = Camera::new(config.camera.position, config.camera.look)?;

        let mut programs = Vec::with_capacity(config.programs.len());
        for program in &config.programs {
            let vertex = library.source(&program.vertex)?;
            let fragment = library.source(&program.fragment)?;
            let built = renderer
                .create_program(&program.name, &vertex, &fragment)
                .map_err(|source| SceneError::Program {
                    name: program.name.clone(),
                    source,
                })?;
            tracing::debug!(
                name = %program.name,
                vertex = %program.vertex,
                fragment = %program.fragment,
                "program ready"
            );
            programs.push((program.name.clone(), built));
        }

        let mut entries = Vec::with_capacity(config.models.len());
        for model in &config.models {
            let program = config
                .program_index(&model.program)
                .ok_or_else(|| ConfigError::UnknownProgram {
                    index: entries.len(),
                    program: model.program.clone(),
                })?;
            entries.push(Entry {
                model: renderer.create_model(model.position)?,
                program,
            });
        }

        tracing::info!(
            programs = programs.len(),
            models = entries.len(),
            source = ?library,
            "scene built"
        );
        Ok(Self {
            camera,
            base_look: config.camera.look,
            sway: config.camera.sway,
            programs,
            entries,
        })
    }

    /// Advance the camera animation to `elapsed` seconds since start.
    pub fn update(&mut self, elapsed: f32) -> Result<(), CameraError> {
        if self.sway == 0.0 {
            return Ok(());
        }
        let x = self.base_look.x + self.sway * elapsed.sin();
        self.camera.set_look(x, self.base_look.y, self.base_look.z)
    }

    /// Render one full frame. A failed draw aborts the frame.
    pub fn draw(&self, renderer: &mut FrameRenderer<B>) -> Result<FrameStats, RenderError> {
        renderer.begin_frame()?;
        for entry in &self.entries {
            let (_, program) = &self.programs[entry.program];
            if let Err(e) = renderer.render(&entry.model, program, &self.camera) {
                renderer.abort_frame();
                return Err(e);
            }
        }
        renderer.end_frame()
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn program(&self, name: &str) -> Option<&ShaderProgram<B>> {
        self.programs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p)
    }

    pub fn program_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.programs.iter().map(|(n, _)| n.as_str())
    }

    /// Models paired with the name of the program that draws them.
    pub fn models(&self) -> impl Iterator<Item = (&Model<B>, &str)> + '_ {
        self.entries
            .iter()
            .map(|e| (&e.model, self.programs[e.program].0.as_str()))
    }

    pub fn model_count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshview_render::{Command, RecordingBackend, ShaderError, Viewport, shaders};

    fn renderer() -> FrameRenderer<RecordingBackend> {
        let config = SceneConfig::default();
        FrameRenderer::new(
            RecordingBackend::new(Viewport::new(
                config.window.width,
                config.window.height,
            )),
            config.clear_color,
        )
    }

    #[test]
    fn default_scene_draws_every_model() {
        let mut r = renderer();
        let scene = Scene::build(&mut r, &SceneConfig::default(), &ShaderLibrary::Builtin).unwrap();
        assert_eq!(scene.program_names().collect::<Vec<_>>(), vec!["color", "tint"]);

        let stats = scene.draw(&mut r).unwrap();
        assert_eq!(stats.draw_calls, 2);
        assert_eq!(stats.indices, 72);
        assert_eq!(r.backend().draws().map(|(_, n)| n).collect::<Vec<_>>(), vec![36, 36]);
        assert_eq!(r.backend().frames_presented(), 1);
    }

    #[test]
    fn models_keep_their_programs() {
        let mut r = renderer();
        let scene = Scene::build(&mut r, &SceneConfig::default(), &ShaderLibrary::Builtin).unwrap();
        let placed: Vec<_> = scene.models().map(|(m, p)| (m.position(), p)).collect();
        assert_eq!(
            placed,
            vec![
                (Vec3::new(1.0, 0.0, -12.0), "color"),
                (Vec3::new(-2.0, -3.0, -8.0), "tint"),
            ]
        );
    }

    #[test]
    fn broken_shader_directory_fails_build_without_programs() {
        let tmp = tempfile::tempdir().unwrap();
        ShaderLibrary::export_builtins(tmp.path()).unwrap();
        std::fs::write(tmp.path().join("color_fs.wgsl"), "fn fs_main( {").unwrap();

        let mut r = renderer();
        let err = Scene::build(
            &mut r,
            &SceneConfig::default(),
            &ShaderLibrary::directory(tmp.path()),
        )
        .err()
        .unwrap();
        assert!(matches!(
            err,
            SceneError::Program {
                ref name,
                source: RenderError::Shader(ShaderError::Parse { .. }),
            } if name == "color"
        ));
        assert_eq!(r.backend().program_count(), 0);
        assert_eq!(r.backend().mesh_count(), 0);
        assert_eq!(r.backend().draws().count(), 0);
    }

    #[test]
    fn missing_shader_file_fails_build() {
        let tmp = tempfile::tempdir().unwrap();
        let mut r = renderer();
        let err = Scene::build(
            &mut r,
            &SceneConfig::default(),
            &ShaderLibrary::directory(tmp.path()),
        )
        .err()
        .unwrap();
        assert!(matches!(err, SceneError::Library(LibraryError::Io { .. })));
    }

    #[test]
    fn degenerate_camera_fails_build() {
        let mut config = SceneConfig::default();
        config.camera.look = Vec3::ZERO;
        let mut r = renderer();
        let err = Scene::build(&mut r, &config, &ShaderLibrary::Builtin)
            .err()
            .unwrap();
        assert!(matches!(err, SceneError::Camera(CameraError::DegenerateLook(_))));
    }

    #[test]
    fn update_sways_look_sideways() {
        let mut r = renderer();
        let mut scene = Scene::build(&mut r, &SceneConfig::default(), &ShaderLibrary::Builtin).unwrap();
        scene.update(std::f32::consts::FRAC_PI_2).unwrap();
        let look = scene.camera().look();
        assert!((look.x - 1.0).abs() < 1e-6);
        assert_eq!((look.y, look.z), (0.0, -5.0));

        scene.update(0.0).unwrap();
        assert_eq!(scene.camera().look(), Vec3::new(0.0, 0.0, -5.0));
    }

    #[test]
    fn zero_sway_keeps_camera_still() {
        let mut config = SceneConfig::default();
        config.camera.sway = 0.0;
        let mut r = renderer();
        let mut scene = Scene::build(&mut r, &config, &ShaderLibrary::Builtin).unwrap();
        scene.update(1.3).unwrap();
        assert_eq!(scene.camera().look(), config.camera.look);
    }

    #[test]
    fn draw_refuses_open_frame() {
        let mut r = renderer();
        let scene = Scene::build(&mut r, &SceneConfig::default(), &ShaderLibrary::Builtin).unwrap();
        r.begin_frame().unwrap();
        assert!(matches!(scene.draw(&mut r), Err(RenderError::FrameInProgress)));
        r.end_frame().unwrap();

        scene.draw(&mut r).unwrap();
        assert!(!r.is_frame_in_progress());
        assert!(r.backend().commands().contains(&Command::Present));
    }

    #[test]
    fn custom_program_from_directory() {
        let tmp = tempfile::tempdir().unwrap();
        ShaderLibrary::export_builtins(tmp.path()).unwrap();
        std::fs::write(tmp.path().join("flat_fs.wgsl"), shaders::TINT_FS).unwrap();
        let config = SceneConfig::from_yaml(
            r#"
programs:
  - { name: flat, vertex: color_vs, fragment: flat_fs }
models:
  - { position: [0, 0, -10], program: flat }
"#,
        )
        .unwrap();

        let mut r = renderer();
        let scene = Scene::build(&mut r, &config, &ShaderLibrary::directory(tmp.path())).unwrap();
        assert!(scene.program("flat").is_some());
        assert_eq!(scene.draw(&mut r).unwrap().draw_calls, 1);
    }
}
