use anyhow::Context;
use clap::{Parser, Subcommand};
use meshview_render::{
    Command, FrameRenderer, FrameStats, Perspective, RecordingBackend, Viewport, compile, shaders,
};
use meshview_scene::{Scene, SceneConfig, ShaderLibrary};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "meshview-cli", about = "Headless tool for meshview scenes and shaders")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version, crate info and renderer constants
    Info,
    /// Record one frame of a scene and print the backend calls
    Frame {
        /// YAML scene file (built-in demo scene if omitted)
        #[arg(long)]
        scene: Option<PathBuf>,
        /// Directory of `<stem>.wgsl` shader sources
        #[arg(long)]
        shader_dir: Option<PathBuf>,
        /// Surface width (scene window width if omitted)
        #[arg(long)]
        width: Option<u32>,
        /// Surface height (scene window height if omitted)
        #[arg(long)]
        height: Option<u32>,
        /// Seconds since start, drives the camera sway
        #[arg(short, long, default_value = "0")]
        time: f32,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Compile and reflect every program of a scene
    CheckShaders {
        #[arg(long)]
        scene: Option<PathBuf>,
        #[arg(long)]
        shader_dir: Option<PathBuf>,
    },
    /// Print the built-in scene as YAML
    DefaultScene {
        /// Also write the built-in shaders into this directory
        #[arg(long)]
        export_shaders: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct FrameDump<'a> {
    viewport: Viewport,
    stats: FrameStats,
    commands: &'a [Command],
}

fn load_scene(path: Option<&PathBuf>) -> anyhow::Result<SceneConfig> {
    match path {
        Some(path) => SceneConfig::load(path)
            .with_context(|| format!("loading scene {}", path.display())),
        None => Ok(SceneConfig::default()),
    }
}

/// Surface size for a recorded frame; CLI overrides win over the scene window.
fn surface_viewport(
    config: &SceneConfig,
    width: Option<u32>,
    height: Option<u32>,
) -> anyhow::Result<Viewport> {
    let viewport = Viewport::new(
        width.unwrap_or(config.window.width),
        height.unwrap_or(config.window.height),
    );
    anyhow::ensure!(
        !viewport.is_empty(),
        "surface size must be non-zero, got {}x{}",
        viewport.width,
        viewport.height
    );
    Ok(viewport)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Info => {
            let perspective = Perspective::default();
            println!("meshview-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("render: {}", meshview_render::crate_info());
            println!("scene: {}", meshview_scene::crate_info());
            println!(
                "perspective: fov_y={} rad near={} far={}",
                perspective.fov_y, perspective.near, perspective.far
            );
            println!(
                "vertex: stride={} position@{} color@{}",
                meshview_common::Vertex::STRIDE,
                meshview_common::Vertex::POSITION_OFFSET,
                meshview_common::Vertex::COLOR_OFFSET
            );
            println!("built-in shaders: {}", shaders::BUILTIN_STEMS.join(", "));
        }
        Commands::Frame {
            scene,
            shader_dir,
            width,
            height,
            time,
            json,
        } => {
            let config = load_scene(scene.as_ref())?;
            let library = ShaderLibrary::from_option(shader_dir.as_deref());
            let viewport = surface_viewport(&config, width, height)?;

            let mut renderer =
                FrameRenderer::new(RecordingBackend::new(viewport), config.clear_color);
            let mut scene = Scene::build(&mut renderer, &config, &library)?;
            scene.update(time)?;
            let stats = scene.draw(&mut renderer)?;
            tracing::debug!(draw_calls = stats.draw_calls, "frame recorded");

            let commands = renderer.backend().commands();
            if json {
                let dump = FrameDump {
                    viewport,
                    stats,
                    commands,
                };
                println!("{}", serde_json::to_string_pretty(&dump)?);
            } else {
                for command in commands {
                    println!("{command}");
                }
                println!(
                    "-- {} draw call(s), {} indices",
                    stats.draw_calls, stats.indices
                );
            }
        }
        Commands::CheckShaders { scene, shader_dir } => {
            let config = load_scene(scene.as_ref())?;
            let library = ShaderLibrary::from_option(shader_dir.as_deref());
            let mut failed = 0;
            for program in &config.programs {
                let vertex = library.source(&program.vertex)?;
                let fragment = library.source(&program.fragment)?;
                match compile(&program.name, &vertex, &fragment) {
                    Ok(compiled) => {
                        let slots = compiled.slots();
                        println!(
                            "OK   {} ({} + {}): Position@{} SourceColor@{} World@{}/{} Projection@{}/{}",
                            program.name,
                            program.vertex,
                            program.fragment,
                            slots.position,
                            slots.color,
                            slots.world.group,
                            slots.world.binding,
                            slots.projection.group,
                            slots.projection.binding
                        );
                    }
                    Err(e) => {
                        failed += 1;
                        println!("FAIL {}: {e}", program.name);
                    }
                }
            }
            if failed > 0 {
                anyhow::bail!("{failed} of {} program(s) failed", config.programs.len());
            }
        }
        Commands::DefaultScene { export_shaders } => {
            if let Some(dir) = export_shaders {
                let written = ShaderLibrary::export_builtins(&dir)
                    .with_context(|| format!("exporting shaders to {}", dir.display()))?;
                tracing::info!(count = written.len(), dir = %dir.display(), "exported built-in shaders");
            }
            print!("{}", SceneConfig::default().to_yaml()?);
        }
    }

    Ok(())
}
