use burn::module::{AutodiffModule, Module};
use burn::optim::{Adam, adaptor::OptimizerAdaptor};
use burn::prelude::{Backend, Tensor};
use burn::tensor::ElementConversion;
use burn::tensor::backend::AutodiffBackend;
use dataset::DenoiserBatch;
use tracing::{trace, warn};

use crate::config::OptimizerSpec;
use crate::error::{Result, TrainError};
use crate::loss::Loss;
use crate::metric::MetricRegistry;
use crate::msg::{EvalStepOutput, MetricValues, TrainStepOutput};
use crate::phase::Phase;
use crate::session::Session;

pub type AdamOptimizer<B, M> = OptimizerAdaptor<Adam, M, B>;

/// A model mapping a batch of images to a batch of images.
pub trait ImageRegressor<B: Backend>: Module<B> {
    /// `[N, C, H, W]` in, `[N, C, H, W]` out.
    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4>;
}

/// A batch that splits into model input and regression target.
pub trait RegressionBatch<B: Backend> {
    fn into_pair(self) -> (Tensor<B, 4>, Tensor<B, 4>);
}

impl<B: Backend> RegressionBatch<B> for DenoiserBatch<B> {
    fn into_pair(self) -> (Tensor<B, 4>, Tensor<B, 4>) {
        (self.noisy, self.clean)
    }
}

impl<B: Backend> RegressionBatch<B> for (Tensor<B, 4>, Tensor<B, 4>) {
    fn into_pair(self) -> (Tensor<B, 4>, Tensor<B, 4>) {
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Loss and optimizer are set, the model can be fit.
    Trainable,
    /// Only `forward` can be used.
    InferenceOnly,
}

/// Every prediction goes through here so the step counter of `phase` moves exactly once
/// per forward call.
fn get_predictions<B: Backend, R: ImageRegressor<B>>(
    session: &mut Session,
    phase: Phase,
    model: &R,
    inputs: Tensor<B, 4>,
) -> Tensor<B, 4> {
    session.record_step(phase);
    model.forward(inputs)
}

/// Wraps a model with the loss, metrics and optimizer needed to train it.
///
/// Built with [`ModelAdapter::new`] the adapter is inference only. Loss and optimizer are
/// added with the `with_*` builders, or all at once with [`ModelAdapter::regression`].
pub struct ModelAdapter<B: AutodiffBackend, M> {
    model: M,
    loss: Option<Loss>,
    metrics: MetricRegistry<B::InnerBackend>,
    optimizer: Option<OptimizerSpec>,
    warned_no_metrics: bool,
}

impl<B, M> ModelAdapter<B, M>
where
    B: AutodiffBackend,
    M: ImageRegressor<B> + AutodiffModule<B>,
    M::InnerModule: ImageRegressor<B::InnerBackend>,
{
    pub fn new(model: M) -> Self {
        warn!("No loss set, the model can only be used for inference.");
        warn!("No metrics registered, nothing will be reported besides the loss.");
        warn!("No optimizer set, the model can only be used for inference.");
        Self {
            model,
            loss: None,
            metrics: MetricRegistry::new(),
            optimizer: None,
            warned_no_metrics: true,
        }
    }

    /// Trainable adapter with an MSE loss, default Adam and MSE/MAE/SSIM metrics.
    pub fn regression(model: M) -> Self {
        Self {
            model,
            loss: Some(Loss::Mse),
            metrics: MetricRegistry::regression(),
            optimizer: Some(OptimizerSpec::new()),
            warned_no_metrics: false,
        }
    }

    pub fn with_loss(mut self, loss: Loss) -> Self {
        self.loss = Some(loss);
        self
    }

    pub fn with_metrics(mut self, metrics: MetricRegistry<B::InnerBackend>) -> Self {
        self.metrics = metrics;
        self.warned_no_metrics = false;
        self
    }

    pub fn with_optimizer(mut self, optimizer: OptimizerSpec) -> Self {
        self.optimizer = Some(optimizer);
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    pub fn loss(&self) -> Option<Loss> {
        self.loss
    }

    pub fn metrics(&self) -> &MetricRegistry<B::InnerBackend> {
        &self.metrics
    }

    pub(crate) fn update_model(&mut self, model: M) {
        self.model = model;
    }

    pub fn capability(&self) -> Capability {
        if self.loss.is_some() && self.optimizer.is_some() {
            Capability::Trainable
        } else {
            Capability::InferenceOnly
        }
    }

    /// Fails with the list of missing parts when the adapter can't be trained.
    pub fn ensure_trainable(&self) -> Result<()> {
        let missing: Vec<&str> = [
            self.loss.is_none().then_some("loss"),
            self.optimizer.is_none().then_some("optimizer"),
        ]
        .into_iter()
        .flatten()
        .collect();

        if missing.is_empty() {
            return Ok(());
        }
        let missing = missing.join(", ");
        warn!("Refusing to train an inference only model, missing {missing}.");
        Err(TrainError::InferenceOnly { missing })
    }

    /// A fresh optimizer and its learning rate, `None` for inference only models.
    pub fn configure_optimizers(&self) -> Option<(AdamOptimizer<B, M>, f64)> {
        let Some(spec) = &self.optimizer else {
            warn!("No optimizer configured.");
            return None;
        };
        Some((spec.adam.init::<B, M>(), spec.learning_rate))
    }

    fn update_metrics<BB: Backend>(
        metrics: &mut MetricRegistry<BB>,
        warned: &mut bool,
        phase: Phase,
        preds: Tensor<BB, 4>,
        targets: Tensor<BB, 4>,
        values: &mut MetricValues,
    ) {
        if metrics.is_empty() {
            if !*warned {
                warn!("No metrics registered, nothing will be reported besides the loss.");
                *warned = true;
            }
            return;
        }
        for (name, value) in metrics.update(phase, preds, targets) {
            values.insert(phase.step_key(&name), value);
        }
    }

    fn loss_fn(&self) -> Result<Loss> {
        self.loss.ok_or_else(|| TrainError::InferenceOnly {
            missing: "loss".to_owned(),
        })
    }

    /// Forward, loss and training metrics of one batch. The returned loss still carries
    /// its autodiff graph.
    pub fn training_step(
        &mut self,
        session: &mut Session,
        batch: impl RegressionBatch<B>,
        batch_idx: usize,
    ) -> Result<TrainStepOutput<B>> {
        let loss_fn = self.loss_fn()?;
        let (inputs, targets) = batch.into_pair();

        let preds = get_predictions(session, Phase::Training, &self.model, inputs);
        let loss = loss_fn.forward(preds.clone(), targets.clone());
        let loss_value = loss.clone().inner().into_scalar().elem::<f64>();
        session.record_loss(Phase::Training, loss_value);

        let mut values = MetricValues::new();
        values.insert(Phase::Training.loss_key(), loss_value);
        Self::update_metrics(
            &mut self.metrics,
            &mut self.warned_no_metrics,
            Phase::Training,
            preds.inner(),
            targets.inner(),
            &mut values,
        );
        trace!(batch_idx, loss = loss_value, "Training step");

        Ok(TrainStepOutput { loss, values })
    }

    /// Forward, loss and metrics of `phase` on the non-autodiff model, see
    /// [`AutodiffModule::valid`].
    pub fn evaluation_step(
        &mut self,
        session: &mut Session,
        phase: Phase,
        model: &M::InnerModule,
        batch: impl RegressionBatch<B::InnerBackend>,
        batch_idx: usize,
    ) -> Result<EvalStepOutput> {
        let loss_fn = self.loss_fn()?;
        let (inputs, targets) = batch.into_pair();

        let preds = get_predictions(session, phase, model, inputs);
        let loss = loss_fn
            .forward(preds.clone(), targets.clone())
            .into_scalar()
            .elem::<f64>();
        session.record_loss(phase, loss);

        let mut values = MetricValues::new();
        values.insert(phase.loss_key(), loss);
        Self::update_metrics(
            &mut self.metrics,
            &mut self.warned_no_metrics,
            phase,
            preds,
            targets,
            &mut values,
        );
        trace!(batch_idx, loss, %phase, "Evaluation step");

        Ok(EvalStepOutput { loss, values })
    }

    pub fn validation_step(
        &mut self,
        session: &mut Session,
        batch: impl RegressionBatch<B::InnerBackend>,
        batch_idx: usize,
    ) -> Result<EvalStepOutput> {
        let model = self.model.valid();
        self.evaluation_step(session, Phase::Validation, &model, batch, batch_idx)
    }

    /// Accumulated values of `phase`: the mean loss under `<phase>/loss` and every metric
    /// under `<phase>/<metric>_epoch`. Accumulators are reset afterwards.
    pub fn epoch_end(&mut self, session: &mut Session, phase: Phase) -> MetricValues {
        let mut values = MetricValues::new();
        if let Some(loss) = session.take_epoch_loss(phase) {
            values.insert(phase.loss_key(), loss);
        }
        for (name, value) in self.metrics.compute(phase) {
            values.insert(phase.epoch_key(&name), value);
        }
        self.metrics.reset(phase);
        session.record_epoch(phase);
        values
    }
}
