mod scene;

use anyhow::Context;
use clap::{Parser, Subcommand};
use glam::Vec3;
use scene::DemoScene;
use shadekit_assets::TextureStore;
use shadekit_common::FilterMode;
use shadekit_render::{
    PipelineManager, RecordingDevice, ShaderConfig, ShaderDirectory, ShaderProgram, ShaderSource,
    fingerprint, stub_shaders,
};
use shadekit_render_wgpu::{WgpuDevice, embedded_shaders};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shadekit-cli", about = "Pipeline state manager tools")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate versions and the shader file layout
    Info {
        /// Shader config file (YAML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Run one demo frame on the recording device and print the binding trace
    Frame {
        /// Load compiled shaders from this directory instead of stub byte-code
        #[arg(long)]
        shader_dir: Option<PathBuf>,
        /// Shader config file (YAML or JSON); implies loading from disk
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Player position as x,y,z
        #[arg(
            long,
            value_delimiter = ',',
            allow_negative_numbers = true,
            default_values_t = [0.0, 5.0, -5.0]
        )]
        player: Vec<f32>,
        /// Print draw labels only, without the command log
        #[arg(long)]
        draws_only: bool,
    },
    /// Load every shader resource and initialize against the recording device
    Check {
        #[arg(long)]
        shader_dir: Option<PathBuf>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Initialize on a headless GPU adapter with the embedded WGSL programs
    GpuProbe,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info { config } => {
            let config = resolve_config(config.as_ref(), None)?.unwrap_or_default();
            println!("shadekit-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("render: {}", shadekit_render::crate_info());
            println!("render-wgpu: {}", shadekit_render_wgpu::crate_info());
            println!("assets: {}", shadekit_assets::crate_info());
            println!("shader files:");
            for program in ShaderProgram::ALL {
                let path = config.path_for(program);
                println!("  {:<12} {}", program.label(), path.display());
            }
        }
        Commands::Frame {
            shader_dir,
            config,
            player,
            draws_only,
        } => {
            let config = resolve_config(config.as_ref(), shader_dir)?;
            let mut manager = match config {
                Some(config) => {
                    PipelineManager::new(RecordingDevice::new(), &ShaderDirectory::new(config))?
                }
                None => PipelineManager::new(RecordingDevice::new(), &stub_shaders())?,
            };

            let mut store = TextureStore::new();
            scene::register_recording_textures(manager.device_mut(), &mut store)?;
            let mut scene = DemoScene::new(&store)?;
            match player[..] {
                [x, y, z] => scene.set_player_position(Vec3::new(x, y, z)),
                _ => anyhow::bail!("--player takes exactly three values, got {}", player.len()),
            }

            // Drop creation-time commands; only the frame is of interest.
            manager.device_mut().take_commands();
            scene.update(&mut manager);
            scene.draw(&mut manager, &store, |m, label| {
                m.device_mut().draw(label)
            })?;

            let device = manager.device();
            tracing::info!(
                draws = device.draws().len(),
                commands = device.commands().len(),
                "demo frame recorded"
            );
            if !draws_only {
                print!("{}", device.trace());
            }
            println!("draws: {}", device.draws().len());
            for draw in device.draws() {
                println!("  {}", draw.label);
            }
        }
        Commands::Check { shader_dir, config } => {
            let config = resolve_config(config.as_ref(), shader_dir)?.unwrap_or_default();
            let source = ShaderDirectory::new(config);
            for program in ShaderProgram::ALL {
                let bytes = source
                    .load(program)
                    .with_context(|| format!("loading {}", program.label()))?;
                println!(
                    "  {:<12} {:>8} bytes  {:016x}",
                    program.label(),
                    bytes.len(),
                    fingerprint(&bytes)
                );
            }
            PipelineManager::new(RecordingDevice::new(), &source).context("initializing pipeline")?;
            let root = source.config().root.display();
            tracing::info!(%root, "shader resources check passed");
            println!("ok: all shader resources loaded");
        }
        Commands::GpuProbe => {
            let device = WgpuDevice::request_headless(wgpu::TextureFormat::Rgba8UnormSrgb)?;
            let mut manager = PipelineManager::new(device, &embedded_shaders())?;
            manager.begin_3d_field(FilterMode::Linear);
            manager.begin_3d(FilterMode::Anisotropic);
            manager.begin_2d(FilterMode::Point);
            let pipelines = manager.device().pipeline_count();
            tracing::info!(pipelines, "gpu pipeline ready");
            println!("ok: pipeline initialized on GPU");
        }
    }

    Ok(())
}

/// A config file wins over `--shader-dir`; neither means no on-disk shaders.
fn resolve_config(
    config: Option<&PathBuf>,
    shader_dir: Option<PathBuf>,
) -> anyhow::Result<Option<ShaderConfig>> {
    match (config, shader_dir) {
        (Some(path), _) => Ok(Some(ShaderConfig::load(path)?)),
        (None, Some(dir)) => Ok(Some(ShaderConfig::with_root(dir))),
        (None, None) => Ok(None),
    }
}
