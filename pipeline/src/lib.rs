#![recursion_limit = "256"]

mod config;
mod error;

pub mod denoiser;
pub mod export;
pub mod prepare;
pub mod training;

pub use config::RenderTargetRequest;
pub use denoiser::{DenoiserTraining, train_denoiser};
pub use error::{PipelineError, Result};
pub use prepare::{RenderResults, generate_render_target, generate_with_mitsuba};
pub use scene_source::list_available_scenes;
pub use training::{SelectDevice, TrainingRun, build_trainer, train, train_from_built};
