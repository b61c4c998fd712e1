use anyhow::{Context, Result};
use clap::Parser;
use meshview_render::{FrameRenderer, RenderError};
use meshview_render_wgpu::WgpuBackend;
use meshview_scene::{Scene, SceneConfig, ShaderLibrary};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

#[derive(Parser)]
#[command(name = "meshview-desktop", about = "Render a meshview scene in a window")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// YAML scene file (built-in demo scene if omitted)
    #[arg(long)]
    scene: Option<PathBuf>,

    /// Directory of `<stem>.wgsl` shader sources
    #[arg(long)]
    shader_dir: Option<PathBuf>,
}

/// Everything that exists once the window and device are up.
struct Viewer {
    window: Arc<Window>,
    renderer: FrameRenderer<WgpuBackend>,
    scene: Scene<WgpuBackend>,
}

impl Viewer {
    fn create(
        event_loop: &ActiveEventLoop,
        config: &SceneConfig,
        library: &ShaderLibrary,
    ) -> Result<Self> {
        let attrs = Window::default_attributes()
            .with_title(config.window.title.clone())
            .with_inner_size(PhysicalSize::new(config.window.width, config.window.height));
        let window = Arc::new(event_loop.create_window(attrs).context("create window")?);

        let size = window.inner_size();
        let backend = WgpuBackend::new(window.clone(), size.width, size.height)?;
        let mut renderer = FrameRenderer::new(backend, config.clear_color);
        let scene = Scene::build(&mut renderer, config, library)?;

        Ok(Self {
            window,
            renderer,
            scene,
        })
    }

    fn redraw(&mut self, elapsed: f32) {
        if let Err(e) = self.scene.update(elapsed) {
            tracing::warn!("camera update skipped: {e}");
        }
        match self.scene.draw(&mut self.renderer) {
            Ok(stats) => tracing::trace!(draw_calls = stats.draw_calls, "frame presented"),
            Err(RenderError::SurfaceUnavailable) => {
                tracing::debug!("surface unavailable, skipping frame");
            }
            Err(e) => tracing::error!("frame failed: {e}"),
        }
    }
}

struct App {
    config: SceneConfig,
    library: ShaderLibrary,
    viewer: Option<Viewer>,
    started: Instant,
    error: Option<anyhow::Error>,
}

impl App {
    fn new(config: SceneConfig, library: ShaderLibrary) -> Self {
        Self {
            config,
            library,
            viewer: None,
            started: Instant::now(),
            error: None,
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.viewer.is_some() {
            return;
        }
        match Viewer::create(event_loop, &self.config, &self.library) {
            Ok(viewer) => {
                self.started = Instant::now();
                self.viewer = Some(viewer);
            }
            Err(e) => {
                tracing::error!("startup failed: {e:#}");
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(viewer) = &mut self.viewer else {
            return;
        };
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                viewer
                    .renderer
                    .backend_mut()
                    .resize(new_size.width, new_size.height);
            }
            WindowEvent::RedrawRequested => {
                viewer.redraw(self.started.elapsed().as_secs_f32());
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(viewer) = &self.viewer {
            viewer.window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    tracing::info!("meshview-desktop starting");

    let config = match &cli.scene {
        Some(path) => SceneConfig::load(path)
            .with_context(|| format!("loading scene {}", path.display()))?,
        None => SceneConfig::default(),
    };
    let library = ShaderLibrary::from_option(cli.shader_dir.as_deref());

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config, library);
    event_loop.run_app(&mut app)?;

    match app.error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
