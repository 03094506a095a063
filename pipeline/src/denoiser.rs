use burn::backend::{Autodiff, Wgpu};
use burn::tensor::backend::AutodiffBackend;
use dataset::{DataConfig, DenoiserBatcher, DenoiserDataModule};
use train::checkpoint::{CheckpointConfig, MonitorMode};
use train::config::TrainerConfig;
use train::denoiser::{DenoiserBaseline, DenoiserBaselineConfig};
use train::device::DeviceArg;
use train::logger::LoggerConfig;
use train::msg::FitOutcome;
use train::ModelAdapter;

use crate::error::Result;
use crate::training::{SelectDevice, TrainingRun, build_trainer, train_from_built};

pub type DenoiserBackend = Autodiff<Wgpu>;

/// Complete setup of a denoiser training run.
#[derive(Debug, Clone)]
pub struct DenoiserTraining {
    pub model: DenoiserBaselineConfig,
    pub data: DataConfig,
    pub run: TrainingRun,
}

impl DenoiserTraining {
    pub fn new(device: Option<DeviceArg>) -> Self {
        Self {
            model: DenoiserBaselineConfig::new(),
            data: DataConfig::new()
                .with_data_dir("data/denoiser".to_owned())
                .with_batch_size(16)
                .with_split_perc(0.8),
            run: TrainingRun {
                trainer: TrainerConfig::new(),
                logger: LoggerConfig::new("Denoiser", "Baseline"),
                checkpoint: CheckpointConfig::new()
                    .with_save_last(true)
                    .with_save_top_k(3)
                    .with_save_weights_only(true)
                    .with_mode(MonitorMode::Min)
                    .with_monitor("validation/loss".to_owned()),
                device,
            },
        }
    }

    pub fn with_trainer(mut self, trainer: TrainerConfig) -> Self {
        self.run.trainer = trainer;
        self
    }

    /// Fit a fresh [`DenoiserBaseline`] on the renders in `data.data_dir`.
    pub fn run<B: AutodiffBackend + SelectDevice>(&self) -> Result<FitOutcome> {
        let mut trainer = build_trainer::<B, DenoiserBaseline<B>>(&self.run, vec![])?;

        B::seed(self.run.trainer.seed);
        let model = self.model.init::<B>(trainer.device());
        let mut adapter = ModelAdapter::regression(model);

        let mut datamodule = DenoiserDataModule::from_render_folder(self.data.clone())?;
        train_from_built(&mut trainer, &mut adapter, &mut datamodule, &DenoiserBatcher)
    }
}

/// Train the baseline denoiser on `data/denoiser` with the wgpu backend.
pub fn train_denoiser(device: Option<DeviceArg>) -> Result<FitOutcome> {
    DenoiserTraining::new(device).run::<DenoiserBackend>()
}
