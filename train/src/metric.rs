use std::collections::BTreeMap;

use burn::prelude::{Backend, Tensor};
use burn::tensor::ElementConversion;

use crate::phase::Phase;
use crate::ssim::Ssim;

const SSIM_WINDOW_SIZE: usize = 11;

/// Stateful accumulator of an image quality measure over an epoch.
pub trait Metric<B: Backend>: Send {
    fn name(&self) -> &str;

    /// Accumulate a batch of `[N, C, H, W]` predictions and return the value for this
    /// batch alone.
    fn update(&mut self, preds: Tensor<B, 4>, targets: Tensor<B, 4>) -> f64;

    /// Value over everything accumulated since the last reset, `None` when empty.
    fn compute(&self) -> Option<f64>;

    fn reset(&mut self);
}

#[derive(Debug, Clone, Copy, Default)]
struct Mean {
    sum: f64,
    count: u64,
}

impl Mean {
    fn add(&mut self, value: f64, count: u64) {
        self.sum += value * count as f64;
        self.count += count;
    }

    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

fn scalar<B: Backend>(tensor: Tensor<B, 1>) -> f64 {
    tensor.into_scalar().elem::<f64>()
}

#[derive(Debug, Default)]
pub struct MeanSquaredError {
    mean: Mean,
}

impl<B: Backend> Metric<B> for MeanSquaredError {
    fn name(&self) -> &str {
        "mse"
    }

    fn update(&mut self, preds: Tensor<B, 4>, targets: Tensor<B, 4>) -> f64 {
        let count = preds.shape().num_elements() as u64;
        let value = scalar((preds - targets).powi_scalar(2).mean());
        self.mean.add(value, count);
        value
    }

    fn compute(&self) -> Option<f64> {
        self.mean.value()
    }

    fn reset(&mut self) {
        self.mean = Mean::default();
    }
}

#[derive(Debug, Default)]
pub struct MeanAbsoluteError {
    mean: Mean,
}

impl<B: Backend> Metric<B> for MeanAbsoluteError {
    fn name(&self) -> &str {
        "mae"
    }

    fn update(&mut self, preds: Tensor<B, 4>, targets: Tensor<B, 4>) -> f64 {
        let count = preds.shape().num_elements() as u64;
        let value = scalar((preds - targets).abs().mean());
        self.mean.add(value, count);
        value
    }

    fn compute(&self) -> Option<f64> {
        self.mean.value()
    }

    fn reset(&mut self) {
        self.mean = Mean::default();
    }
}

/// Mean SSIM per image. The window is built on first use, matching the channel count and
/// device of the data.
#[derive(Debug)]
pub struct StructuralSimilarity<B: Backend> {
    ssim: Option<Ssim<B>>,
    mean: Mean,
}

impl<B: Backend> Default for StructuralSimilarity<B> {
    fn default() -> Self {
        Self {
            ssim: None,
            mean: Mean::default(),
        }
    }
}

impl<B: Backend> Metric<B> for StructuralSimilarity<B> {
    fn name(&self) -> &str {
        "ssim"
    }

    fn update(&mut self, preds: Tensor<B, 4>, targets: Tensor<B, 4>) -> f64 {
        let [n, channels, _, _] = preds.dims();
        let device = preds.device();
        let ssim = self
            .ssim
            .get_or_insert_with(|| Ssim::new(SSIM_WINDOW_SIZE, channels, &device));

        let per_image: Tensor<B, 1> = ssim
            .ssim_map(preds, targets)
            .reshape([n as i32, -1])
            .mean_dim(1)
            .reshape([n]);
        let value = scalar(per_image.mean());
        self.mean.add(value, n as u64);
        value
    }

    fn compute(&self) -> Option<f64> {
        self.mean.value()
    }

    fn reset(&mut self) {
        self.mean = Mean::default();
    }
}

/// Named metrics per phase, in registration order.
pub struct MetricRegistry<B: Backend> {
    metrics: BTreeMap<Phase, Vec<Box<dyn Metric<B>>>>,
}

impl<B: Backend> Default for MetricRegistry<B> {
    fn default() -> Self {
        Self {
            metrics: BTreeMap::new(),
        }
    }
}

impl<B: Backend> MetricRegistry<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// MSE, MAE and SSIM, the same set for every phase.
    pub fn regression() -> Self {
        let mut registry = Self::new();
        for phase in Phase::ALL {
            registry.register(phase, MeanSquaredError::default());
            registry.register(phase, MeanAbsoluteError::default());
            registry.register(phase, StructuralSimilarity::<B>::default());
        }
        registry
    }

    pub fn register(&mut self, phase: Phase, metric: impl Metric<B> + 'static) {
        self.metrics.entry(phase).or_default().push(Box::new(metric));
    }

    pub fn with(mut self, phase: Phase, metric: impl Metric<B> + 'static) -> Self {
        self.register(phase, metric);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.values().all(Vec::is_empty)
    }

    pub fn names(&self, phase: Phase) -> Vec<&str> {
        self.metrics
            .get(&phase)
            .map(|metrics| metrics.iter().map(|m| m.name()).collect())
            .unwrap_or_default()
    }

    /// Feed a batch to every metric of `phase`, returning the batch values by name.
    pub fn update(
        &mut self,
        phase: Phase,
        preds: Tensor<B, 4>,
        targets: Tensor<B, 4>,
    ) -> Vec<(String, f64)> {
        let Some(metrics) = self.metrics.get_mut(&phase) else {
            return vec![];
        };
        metrics
            .iter_mut()
            .map(|metric| {
                let value = metric.update(preds.clone(), targets.clone());
                (metric.name().to_owned(), value)
            })
            .collect()
    }

    /// Accumulated values of `phase`. Metrics that saw no data are left out.
    pub fn compute(&self, phase: Phase) -> Vec<(String, f64)> {
        self.metrics
            .get(&phase)
            .into_iter()
            .flatten()
            .filter_map(|metric| Some((metric.name().to_owned(), metric.compute()?)))
            .collect()
    }

    pub fn reset(&mut self, phase: Phase) {
        if let Some(metrics) = self.metrics.get_mut(&phase) {
            metrics.iter_mut().for_each(|metric| metric.reset());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::backend::ndarray::NdArrayDevice;

    type TestBackend = NdArray;

    fn filled(value: f32, n: usize) -> Tensor<TestBackend, 4> {
        Tensor::full([n, 3, 8, 8], value, &NdArrayDevice::Cpu)
    }

    #[test]
    fn mse_and_mae_accumulate_over_elements() {
        let mut mse = MeanSquaredError::default();
        let mut mae = MeanAbsoluteError::default();
        assert_eq!(Metric::<TestBackend>::compute(&mse), None);

        let batch = Metric::<TestBackend>::update(&mut mse, filled(1.0, 1), filled(0.0, 1));
        assert!((batch - 1.0).abs() < 1e-6);
        // Three times as many elements at error 3, mean is (1 + 9 * 3) / 4.
        Metric::<TestBackend>::update(&mut mse, filled(3.0, 3), filled(0.0, 3));
        let value = Metric::<TestBackend>::compute(&mse).unwrap();
        assert!((value - 7.0).abs() < 1e-5, "{value}");

        Metric::<TestBackend>::update(&mut mae, filled(0.5, 2), filled(1.0, 2));
        let value = Metric::<TestBackend>::compute(&mae).unwrap();
        assert!((value - 0.5).abs() < 1e-6);

        Metric::<TestBackend>::reset(&mut mse);
        assert_eq!(Metric::<TestBackend>::compute(&mse), None);
    }

    #[test]
    fn ssim_of_identical_images_is_one() {
        let mut ssim = StructuralSimilarity::<TestBackend>::default();
        let value = ssim.update(filled(0.3, 2), filled(0.3, 2));
        assert!((value - 1.0).abs() < 1e-4);
        assert!((ssim.compute().unwrap() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn registry_tracks_phases_separately() {
        let mut registry = MetricRegistry::<TestBackend>::regression();
        assert!(!registry.is_empty());
        assert_eq!(registry.names(Phase::Training), vec!["mse", "mae", "ssim"]);
        assert_eq!(registry.names(Phase::Validation), registry.names(Phase::Training));

        let values = registry.update(Phase::Training, filled(1.0, 2), filled(0.5, 2));
        assert_eq!(values.len(), 3);
        assert_eq!(values[0].0, "mse");
        assert!((values[0].1 - 0.25).abs() < 1e-6);

        assert_eq!(registry.compute(Phase::Training).len(), 3);
        assert!(registry.compute(Phase::Validation).is_empty());

        registry.reset(Phase::Training);
        assert!(registry.compute(Phase::Training).is_empty());
    }

    #[test]
    fn empty_registry() {
        let mut registry = MetricRegistry::<TestBackend>::new();
        assert!(registry.is_empty());
        assert!(registry.update(Phase::Test, filled(0.0, 1), filled(0.0, 1)).is_empty());
    }
}
