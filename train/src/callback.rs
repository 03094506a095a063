use burn::module::AutodiffModule;
use burn::tensor::backend::AutodiffBackend;

use crate::error::Result;
use crate::model::AdamOptimizer;
use crate::msg::MetricValues;

/// State handed to callbacks at an epoch boundary.
pub struct EpochContext<'a, B: AutodiffBackend, M: AutodiffModule<B>> {
    /// 1-based epoch that just finished.
    pub epoch: usize,
    /// Nr. of optimizer steps so far.
    pub global_step: u64,
    /// Values emitted by this epoch end.
    pub metrics: &'a MetricValues,
    /// Whether a validation loop follows this training epoch.
    pub validates: bool,
    pub model: &'a M,
    pub optimizer: &'a AdamOptimizer<B, M>,
}

/// Hooks into the fit loop. Every hook defaults to doing nothing.
pub trait Callback<B: AutodiffBackend, M: AutodiffModule<B>>: Send {
    fn on_fit_start(&mut self) -> Result<()> {
        Ok(())
    }

    fn on_train_epoch_end(&mut self, _ctx: &EpochContext<'_, B, M>) -> Result<()> {
        Ok(())
    }

    fn on_validation_epoch_end(&mut self, _ctx: &EpochContext<'_, B, M>) -> Result<()> {
        Ok(())
    }

    fn on_fit_end(&mut self) -> Result<()> {
        Ok(())
    }
}
