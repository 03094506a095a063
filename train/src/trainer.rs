use std::fmt::Debug;

use burn::module::AutodiffModule;
use burn::optim::{GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;
use dataset::{Batcher, DataModule};
use tracing::{info, info_span};

use crate::callback::{Callback, EpochContext};
use crate::config::TrainerConfig;
use crate::error::{Result, TrainError};
use crate::logger::{MetricLogger, NoopLogger};
use crate::model::{ImageRegressor, ModelAdapter, RegressionBatch};
use crate::msg::{FitOutcome, MetricValues};
use crate::phase::Phase;
use crate::session::Session;

/// Runs the fit loop of a [`ModelAdapter`] over a [`DataModule`].
pub struct Trainer<B: AutodiffBackend, M: AutodiffModule<B>> {
    pub(crate) config: TrainerConfig,
    pub(crate) callbacks: Vec<Box<dyn Callback<B, M>>>,
    pub(crate) logger: Box<dyn MetricLogger>,
    pub(crate) device: B::Device,
    pub(crate) session: Session,
    pub(crate) global_step: u64,
}

impl<B, M> Trainer<B, M>
where
    B: AutodiffBackend,
    M: ImageRegressor<B> + AutodiffModule<B>,
    M::InnerModule: ImageRegressor<B::InnerBackend>,
{
    pub fn new(config: TrainerConfig, device: B::Device) -> Self {
        Self {
            config,
            callbacks: vec![],
            logger: Box::new(NoopLogger),
            device,
            session: Session::new(),
            global_step: 0,
        }
    }

    pub fn with_logger(mut self, logger: impl MetricLogger + 'static) -> Self {
        self.logger = Box::new(logger);
        self
    }

    pub fn with_callback(mut self, callback: impl Callback<B, M> + 'static) -> Self {
        self.callbacks.push(Box::new(callback));
        self
    }

    pub fn with_callbacks(mut self, callbacks: Vec<Box<dyn Callback<B, M>>>) -> Self {
        self.callbacks.extend(callbacks);
        self
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Nr. of optimizer steps taken.
    pub fn global_step(&self) -> u64 {
        self.global_step
    }

    fn log(&mut self, values: &MetricValues, epoch: Option<usize>) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        let mut values = values.clone();
        if let Some(epoch) = epoch {
            values.insert("epoch".to_owned(), epoch as f64);
        }
        self.logger.log_metrics(self.global_step, &values)
    }

    /// Fit `adapter` on the train split of `datamodule`, validating after every
    /// `check_val_every_n_epoch` epochs when the validation split is not empty.
    ///
    /// Inference only adapters are refused before any data is touched.
    pub fn fit<I, Bt, O, V>(
        &mut self,
        adapter: &mut ModelAdapter<B, M>,
        datamodule: &mut DataModule<I>,
        batcher: &Bt,
    ) -> Result<FitOutcome>
    where
        I: Clone + Debug + Send + Sync + 'static,
        Bt: Batcher<B, I, O> + Batcher<B::InnerBackend, I, V> + Clone + 'static,
        O: RegressionBatch<B> + Clone + Debug + Send + 'static,
        V: RegressionBatch<B::InnerBackend> + Clone + Debug + Send + 'static,
    {
        adapter.ensure_trainable()?;
        let (mut optimizer, learning_rate) =
            adapter
                .configure_optimizers()
                .ok_or_else(|| TrainError::InferenceOnly {
                    missing: "optimizer".to_owned(),
                })?;

        B::seed(self.config.seed);
        datamodule.setup()?;
        let train_loader = datamodule.train_loader::<B, O>(batcher.clone(), &self.device)?;
        let valid_loader =
            datamodule.valid_loader::<B::InnerBackend, V>(batcher.clone(), &self.device)?;
        if train_loader.num_items() == 0 {
            return Err(TrainError::EmptyTrainSplit);
        }
        let has_validation = valid_loader.num_items() > 0;
        if !has_validation {
            info!("Validation split is empty, skipping validation.");
        }

        for callback in &mut self.callbacks {
            callback.on_fit_start()?;
        }

        let max_train_batches = self.config.limit_train_batches.unwrap_or(usize::MAX);
        let check_val_every = self.config.check_val_every_n_epoch.max(1);
        let log_every = self.config.log_every_n_steps.max(1) as u64;
        let mut last_metrics = MetricValues::new();

        for epoch in 1..=self.config.max_epochs {
            let _span = info_span!("Train epoch", epoch).entered();
            let validates = has_validation && epoch % check_val_every == 0;

            for (batch_idx, batch) in train_loader.iter().enumerate().take(max_train_batches) {
                let output = adapter.training_step(&mut self.session, batch, batch_idx)?;

                let grads = output.loss.backward();
                let grads = GradientsParams::from_grads(grads, adapter.model());
                let model = optimizer.step(learning_rate, adapter.model().clone(), grads);
                adapter.update_model(model);
                self.global_step += 1;

                if self.global_step % log_every == 0 {
                    self.log(&output.values, None)?;
                }
            }

            let mut epoch_metrics = adapter.epoch_end(&mut self.session, Phase::Training);
            self.log(&epoch_metrics, Some(epoch))?;
            info!("Epoch {epoch} done after {} steps", self.global_step);

            let ctx = EpochContext {
                epoch,
                global_step: self.global_step,
                metrics: &epoch_metrics,
                validates,
                model: adapter.model(),
                optimizer: &optimizer,
            };
            for callback in &mut self.callbacks {
                callback.on_train_epoch_end(&ctx)?;
            }

            if validates {
                let limit = self.config.limit_val_batches;
                let values =
                    self.run_evaluation(adapter, &valid_loader, Phase::Validation, limit)?;
                self.log(&values, Some(epoch))?;

                let ctx = EpochContext {
                    epoch,
                    global_step: self.global_step,
                    metrics: &values,
                    validates,
                    model: adapter.model(),
                    optimizer: &optimizer,
                };
                for callback in &mut self.callbacks {
                    callback.on_validation_epoch_end(&ctx)?;
                }
                epoch_metrics.extend(values);
            }

            last_metrics = epoch_metrics;
        }

        for callback in &mut self.callbacks {
            callback.on_fit_end()?;
        }
        self.logger.finish()?;

        Ok(FitOutcome {
            epochs: self.config.max_epochs,
            global_step: self.global_step,
            last_metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use burn::backend::NdArray;
    use burn::backend::ndarray::NdArrayDevice;
    use burn::prelude::{Backend, Tensor};
    use dataset::{DataConfig, InMemDataset};

    use super::*;
    use crate::checkpoint::{CheckpointConfig, ModelCheckpoint};
    use crate::model::tests::{Gain, TestBackend};

    const SIDE: usize = 4;

    /// Items are `(x, y)` pairs, each turned into a constant image.
    #[derive(Clone)]
    struct PairBatcher;

    impl<B: Backend> Batcher<B, (f32, f32), (Tensor<B, 4>, Tensor<B, 4>)> for PairBatcher {
        fn batch(
            &self,
            items: Vec<(f32, f32)>,
            device: &B::Device,
        ) -> (Tensor<B, 4>, Tensor<B, 4>) {
            let n = items.len();
            let image = |value: f32| vec![value; 3 * SIDE * SIDE];
            let xs: Vec<f32> = items.iter().flat_map(|(x, _)| image(*x)).collect();
            let ys: Vec<f32> = items.iter().flat_map(|(_, y)| image(*y)).collect();
            (
                Tensor::<B, 1>::from_floats(xs.as_slice(), device).reshape([n, 3, SIDE, SIDE]),
                Tensor::<B, 1>::from_floats(ys.as_slice(), device).reshape([n, 3, SIDE, SIDE]),
            )
        }
    }

    fn datamodule(split_perc: f64) -> DataModule<(f32, f32)> {
        pairs(20, split_perc)
    }

    fn pairs(n: usize, split_perc: f64) -> DataModule<(f32, f32)> {
        let items = (0..n)
            .map(|i| {
                let x = 0.5 + i as f32 / n as f32;
                (x, 3.0 * x)
            })
            .collect();
        let config = DataConfig::new()
            .with_batch_size(4)
            .with_split_perc(split_perc)
            .with_seed(1);
        DataModule::new(InMemDataset::new(items), config)
    }

    #[derive(Clone, Default)]
    struct CollectLogger(Arc<Mutex<Vec<(u64, MetricValues)>>>);

    impl MetricLogger for CollectLogger {
        fn log_metrics(&mut self, step: u64, values: &MetricValues) -> Result<()> {
            self.0.lock().unwrap().push((step, values.clone()));
            Ok(())
        }
    }

    fn trainer(epochs: usize) -> Trainer<TestBackend, Gain<TestBackend>> {
        let config = TrainerConfig::new()
            .with_max_epochs(epochs)
            .with_log_every_n_steps(2);
        Trainer::new(config, NdArrayDevice::Cpu)
    }

    fn gain() -> Gain<TestBackend> {
        Gain::new(1.0, &NdArrayDevice::Cpu)
    }

    #[test]
    fn fit_learns_and_keeps_top_k() {
        let dir = tempfile::tempdir().unwrap();
        let logger = CollectLogger::default();
        let checkpoint = ModelCheckpoint::new(
            CheckpointConfig::new()
                .with_dirpath(dir.path().to_path_buf())
                .with_save_top_k(2)
                .with_save_last(true),
        );

        let mut adapter = ModelAdapter::<TestBackend, _>::regression(gain())
            .with_optimizer(crate::config::OptimizerSpec::new().with_learning_rate(0.1));
        let mut module = datamodule(0.8);
        let mut trainer = trainer(3).with_logger(logger.clone()).with_callback(checkpoint);

        let outcome = trainer.fit(&mut adapter, &mut module, &PairBatcher).unwrap();

        // 16 training items in batches of 4.
        assert_eq!(outcome.global_step, 12);
        assert_eq!(trainer.session().steps(Phase::Training), 12);
        assert_eq!(trainer.session().epochs(Phase::Training), 3);
        assert_eq!(trainer.session().epochs(Phase::Validation), 3);

        let weight = adapter.model().weight.val().into_scalar();
        assert!(weight > 1.5 && weight < 3.0, "{weight}");

        assert!(outcome.last_metrics.contains_key("validation/loss"));
        assert!(outcome.last_metrics.contains_key("validation/ssim_epoch"));
        assert!(outcome.last_metrics.contains_key("training/mse_epoch"));

        let logged = logger.0.lock().unwrap();
        let val_losses: Vec<f64> = logged
            .iter()
            .filter_map(|(_, values)| values.get("validation/loss").copied())
            .collect();
        assert_eq!(val_losses.len(), 3);
        assert!(val_losses.windows(2).all(|w| w[1] < w[0]), "{val_losses:?}");
        // Every other step plus two epoch ends per epoch.
        assert_eq!(logged.len(), 6 + 3 * 2);

        assert_eq!(
            file_names(dir.path()),
            vec![
                "epoch=2-step=8-optim.mpk",
                "epoch=2-step=8.mpk",
                "epoch=3-step=12-optim.mpk",
                "epoch=3-step=12.mpk",
                "last-optim.mpk",
                "last.mpk",
            ]
        );
    }

    #[test]
    fn inference_only_is_refused_before_setup() {
        let mut adapter = ModelAdapter::<TestBackend, _>::new(gain());
        let mut module = datamodule(0.8);

        let err = trainer(1).fit(&mut adapter, &mut module, &PairBatcher).err();
        assert!(matches!(err, Some(TrainError::InferenceOnly { .. })));
        assert!(module.partition().is_none());
    }

    #[test]
    fn empty_train_split() {
        let mut adapter = ModelAdapter::<TestBackend, _>::regression(gain());
        let mut module = datamodule(0.0);

        let err = trainer(1).fit(&mut adapter, &mut module, &PairBatcher).err();
        assert!(matches!(err, Some(TrainError::EmptyTrainSplit)));
    }

    #[test]
    fn missing_monitor_fails() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = ModelCheckpoint::new(
            CheckpointConfig::new()
                .with_dirpath(dir.path().to_path_buf())
                .with_monitor("validation/psnr".to_owned()),
        );
        let mut adapter = ModelAdapter::<TestBackend, _>::regression(gain());
        let mut module = datamodule(0.8);

        let err = trainer(1)
            .with_callback(checkpoint)
            .fit(&mut adapter, &mut module, &PairBatcher)
            .err();
        assert!(matches!(err, Some(TrainError::MonitorMissing(name)) if name == "validation/psnr"));
    }

    #[test]
    fn test_split_is_evaluated() {
        let mut adapter = ModelAdapter::<TestBackend, _>::regression(gain());
        let mut module = datamodule(0.8);
        let mut trainer = trainer(1);
        trainer.fit(&mut adapter, &mut module, &PairBatcher).unwrap();

        let values = trainer.test::<_, _, (Tensor<NdArray, 4>, Tensor<NdArray, 4>)>(
            &mut adapter,
            &module,
            &PairBatcher,
        );
        let values = values.unwrap();
        assert!(values.contains_key("test/loss"));
        assert!(values.contains_key("test/mae_epoch"));
        assert_eq!(trainer.session().epochs(Phase::Test), 1);
        // 3 test items, all in one batch.
        assert_eq!(trainer.session().steps(Phase::Test), 1);
    }

    fn file_names(dir: &std::path::Path) -> Vec<String> {
        let mut files: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        files.sort();
        files
    }

    #[test]
    fn checkpoints_without_validation_split() {
        // 9 items at 0.8 split into 7 train, 0 validation and 2 test items.
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = ModelCheckpoint::new(
            CheckpointConfig::new()
                .with_dirpath(dir.path().to_path_buf())
                .with_save_last(true),
        );
        let mut adapter = ModelAdapter::<TestBackend, _>::regression(gain());
        let mut module = pairs(9, 0.8);
        let mut trainer = trainer(2).with_callback(checkpoint);

        let outcome = trainer.fit(&mut adapter, &mut module, &PairBatcher).unwrap();

        assert_eq!(module.partition().unwrap().sizes.valid, 0);
        // 7 items in batches of 4.
        assert_eq!(outcome.global_step, 4);
        assert_eq!(trainer.session().epochs(Phase::Validation), 0);
        assert!(!outcome.last_metrics.contains_key("validation/loss"));
        // Nothing to rank on, so only `last` is written.
        assert_eq!(file_names(dir.path()), vec!["last-optim.mpk", "last.mpk"]);
    }

    #[test]
    fn checkpoints_epochs_between_validations() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = ModelCheckpoint::new(
            CheckpointConfig::new()
                .with_dirpath(dir.path().to_path_buf())
                .with_monitor("training/loss".to_owned())
                .with_save_top_k(-1)
                .with_save_weights_only(true),
        );
        let mut adapter = ModelAdapter::<TestBackend, _>::regression(gain())
            .with_optimizer(crate::config::OptimizerSpec::new().with_learning_rate(0.1));
        let mut module = datamodule(0.8);
        let mut trainer: Trainer<TestBackend, Gain<TestBackend>> = Trainer::new(
            TrainerConfig::new()
                .with_max_epochs(2)
                .with_check_val_every_n_epoch(5),
            NdArrayDevice::Cpu,
        )
        .with_callback(checkpoint);

        trainer.fit(&mut adapter, &mut module, &PairBatcher).unwrap();

        assert_eq!(trainer.session().epochs(Phase::Validation), 0);
        // A training value is monitored, so both epochs are ranked.
        assert_eq!(
            file_names(dir.path()),
            vec!["epoch=1-step=4.mpk", "epoch=2-step=8.mpk"]
        );
    }
}
