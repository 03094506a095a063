use std::collections::BTreeMap;

use burn::prelude::{Backend, Tensor};

/// Values emitted by a step or epoch end, keyed like `validation/mse_step`.
pub type MetricValues = BTreeMap<String, f64>;

#[derive(Clone, Debug)]
pub struct TrainStepOutput<B: Backend> {
    /// Scalar loss, still attached to the autodiff graph.
    pub loss: Tensor<B, 1>,
    pub values: MetricValues,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct EvalStepOutput {
    pub loss: f64,
    pub values: MetricValues,
}

/// What a finished fit run produced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FitOutcome {
    pub epochs: usize,
    pub global_step: u64,
    /// Values of the last train and validation epoch ends.
    pub last_metrics: MetricValues,
}
