#![recursion_limit = "256"]

use std::path::PathBuf;

use burn::backend::Wgpu;
use burn::config::Config;
use clap::{Parser, Subcommand};
use pipeline::denoiser::{DenoiserBackend, DenoiserTraining};
use pipeline::export::denoise_file;
use pipeline::{RenderTargetRequest, SelectDevice, generate_with_mitsuba};
use train::config::TrainerConfig;
use train::denoiser::DenoiserBaselineConfig;
use train::device::{DeviceArg, DeviceSpec};
use tracing_subscriber::EnvFilter;

/// Render training data for the denoiser, train it and run it on images.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the scenes available for rendering.
    ListScenes {
        /// Falls back to `scenes` when neither the flag nor the variable is set.
        #[arg(long, env = "DEFAULT_SCENE_FOLDER")]
        scene_folder: Option<PathBuf>,
    },
    /// Render every spp level of a render target.
    Generate {
        /// JSON config with folder_out, scene_path and render_targets.
        #[arg(short, long)]
        config_path: String,

        #[arg(short, long, default_value = "low_spp")]
        render_target: String,

        /// `cpu`, `gpu` or `gpu_multi`.
        #[arg(short, long, default_value = "gpu_multi")]
        device: String,

        /// Mitsuba variant, derived from the device when omitted.
        #[arg(long)]
        variant: Option<String>,

        /// Samples per pixel of one render pass.
        #[arg(short, long, default_value_t = 4)]
        base_spp_level: u32,
    },
    /// Train the baseline denoiser on rendered data.
    Train {
        /// Device count, name, or a JSON list of device indices.
        #[arg(short, long)]
        device: Option<DeviceArg>,

        /// Folder holding the `render_<spp>` folders.
        #[arg(long)]
        data_dir: Option<String>,

        /// Trainer settings saved as JSON.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Model settings saved as JSON.
        #[arg(long)]
        model: Option<PathBuf>,
    },
    /// Denoise one EXR image with a trained checkpoint.
    Denoise {
        #[arg(short, long)]
        checkpoint: PathBuf,

        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(long)]
        model: Option<PathBuf>,

        #[arg(short, long)]
        device: Option<DeviceArg>,
    },
}

fn model_config(path: Option<PathBuf>) -> anyhow::Result<DenoiserBaselineConfig> {
    Ok(match path {
        Some(path) => DenoiserBaselineConfig::load(path)?,
        None => DenoiserBaselineConfig::new(),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    match args.command {
        Command::ListScenes { scene_folder } => {
            for scene in pipeline::list_available_scenes(scene_folder.as_deref())? {
                println!("{scene}");
            }
        }
        Command::Generate {
            config_path,
            render_target,
            device,
            variant,
            base_spp_level,
        } => {
            let request = RenderTargetRequest::new(config_path)
                .with_render_target(render_target)
                .with_device(device)
                .with_variant(variant)
                .with_base_spp_level(base_spp_level);
            let results = generate_with_mitsuba(&request).await?;
            for (level, repeats) in &results {
                tracing::info!("Rendered {} repeats at {level} spp", repeats.len());
            }
        }
        Command::Train {
            device,
            data_dir,
            config,
            model,
        } => {
            let mut training = DenoiserTraining::new(device);
            if let Some(path) = config {
                training = training.with_trainer(TrainerConfig::load(path)?);
            }
            if let Some(data_dir) = data_dir {
                training.data = training.data.with_data_dir(data_dir);
            }
            training.model = model_config(model)?;

            // Training is synchronous, keep it off the async workers.
            let outcome =
                tokio::task::spawn_blocking(move || training.run::<DenoiserBackend>()).await??;
            tracing::info!(
                "Finished {} epochs after {} steps",
                outcome.epochs,
                outcome.global_step
            );
            for (key, value) in &outcome.last_metrics {
                tracing::info!("{key}: {value:.6}");
            }
        }
        Command::Denoise {
            checkpoint,
            input,
            output,
            model,
            device,
        } => {
            let device = Wgpu::select_device(&DeviceSpec::resolve(device)?)?;
            denoise_file::<Wgpu>(&model_config(model)?, &checkpoint, &input, &output, &device)?;
        }
    }

    Ok(())
}
