use std::fmt::Debug;

use burn::backend::ndarray::NdArrayDevice;
use burn::backend::wgpu::WgpuDevice;
use burn::backend::{Autodiff, NdArray, Wgpu};
use burn::module::AutodiffModule;
use burn::tensor::backend::{AutodiffBackend, Backend};
use dataset::{Batcher, DataModule};
use train::callback::Callback;
use train::checkpoint::{CheckpointConfig, ModelCheckpoint};
use train::config::TrainerConfig;
use train::device::{DeviceArg, DeviceSpec};
use train::logger::{JsonlLogger, LoggerConfig};
use train::msg::FitOutcome;
use train::{ImageRegressor, ModelAdapter, RegressionBatch, TrainError, Trainer};

use crate::error::Result;

/// Backends that can turn a [`DeviceSpec`] into one of their devices.
pub trait SelectDevice: Backend {
    fn select_device(spec: &DeviceSpec) -> Result<Self::Device>;
}

impl SelectDevice for Wgpu {
    fn select_device(spec: &DeviceSpec) -> Result<Self::Device> {
        Ok(match spec {
            DeviceSpec::Default | DeviceSpec::Count(1..) => WgpuDevice::DefaultDevice,
            DeviceSpec::Count(0) => WgpuDevice::Cpu,
            DeviceSpec::Indices(indices) => match indices.first() {
                Some(&index) => WgpuDevice::DiscreteGpu(index),
                None => WgpuDevice::Cpu,
            },
            DeviceSpec::Named(name) => match name.as_str() {
                "auto" | "default" | "gpu" => WgpuDevice::DefaultDevice,
                "cpu" => WgpuDevice::Cpu,
                "integrated" => WgpuDevice::IntegratedGpu(0),
                _ => return Err(TrainError::InvalidDevice(name.clone()).into()),
            },
        })
    }
}

impl SelectDevice for NdArray {
    fn select_device(spec: &DeviceSpec) -> Result<Self::Device> {
        if !matches!(spec, DeviceSpec::Default | DeviceSpec::Named(_)) {
            log::warn!("The ndarray backend only runs on the cpu, ignoring device {spec}.");
        }
        Ok(NdArrayDevice::Cpu)
    }
}

impl<B: SelectDevice> SelectDevice for Autodiff<B> {
    fn select_device(spec: &DeviceSpec) -> Result<Self::Device> {
        B::select_device(spec)
    }
}

/// Everything a training run is configured with besides model and data.
#[derive(Debug, Clone)]
pub struct TrainingRun {
    pub trainer: TrainerConfig,
    pub logger: LoggerConfig,
    pub checkpoint: CheckpointConfig,
    pub device: Option<DeviceArg>,
}

/// Resolve the device and assemble a trainer. A [`ModelCheckpoint`] configured by
/// `run.checkpoint` is always appended to `callbacks`.
pub fn build_trainer<B, M>(
    run: &TrainingRun,
    mut callbacks: Vec<Box<dyn Callback<B, M>>>,
) -> Result<Trainer<B, M>>
where
    B: AutodiffBackend + SelectDevice,
    M: ImageRegressor<B> + AutodiffModule<B>,
    M::InnerModule: ImageRegressor<B::InnerBackend>,
{
    let spec = DeviceSpec::resolve(run.device.clone())?;
    if spec.device_count() > 1 {
        log::warn!("Multiple devices requested ({spec}), training runs on the first one only.");
    }
    let device = B::select_device(&spec)?;
    log::info!("Training on {device:?}");

    callbacks.push(Box::new(ModelCheckpoint::new(run.checkpoint.clone())));
    let logger = JsonlLogger::new(&run.logger)?;

    Ok(Trainer::new(run.trainer.clone(), device)
        .with_callbacks(callbacks)
        .with_logger(logger))
}

pub fn train_from_built<B, M, I, Bt, O, V>(
    trainer: &mut Trainer<B, M>,
    adapter: &mut ModelAdapter<B, M>,
    datamodule: &mut DataModule<I>,
    batcher: &Bt,
) -> Result<FitOutcome>
where
    B: AutodiffBackend,
    M: ImageRegressor<B> + AutodiffModule<B>,
    M::InnerModule: ImageRegressor<B::InnerBackend>,
    I: Clone + Debug + Send + Sync + 'static,
    Bt: Batcher<B, I, O> + Batcher<B::InnerBackend, I, V> + Clone + 'static,
    O: RegressionBatch<B> + Clone + Debug + Send + 'static,
    V: RegressionBatch<B::InnerBackend> + Clone + Debug + Send + 'static,
{
    Ok(trainer.fit(adapter, datamodule, batcher)?)
}

/// [`build_trainer`] followed by [`train_from_built`].
pub fn train<B, M, I, Bt, O, V>(
    adapter: &mut ModelAdapter<B, M>,
    datamodule: &mut DataModule<I>,
    batcher: &Bt,
    run: &TrainingRun,
    callbacks: Vec<Box<dyn Callback<B, M>>>,
) -> Result<FitOutcome>
where
    B: AutodiffBackend + SelectDevice,
    M: ImageRegressor<B> + AutodiffModule<B>,
    M::InnerModule: ImageRegressor<B::InnerBackend>,
    I: Clone + Debug + Send + Sync + 'static,
    Bt: Batcher<B, I, O> + Batcher<B::InnerBackend, I, V> + Clone + 'static,
    O: RegressionBatch<B> + Clone + Debug + Send + 'static,
    V: RegressionBatch<B::InnerBackend> + Clone + Debug + Send + 'static,
{
    let mut trainer = build_trainer(run, callbacks)?;
    train_from_built(&mut trainer, adapter, datamodule, batcher)
}
