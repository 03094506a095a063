use std::fmt::Debug;

use burn::module::AutodiffModule;
use burn::tensor::backend::AutodiffBackend;
use dataset::{Batcher, DataModule, Loader};
use tracing::{info, info_span};

use crate::error::Result;
use crate::model::{ImageRegressor, ModelAdapter, RegressionBatch};
use crate::msg::MetricValues;
use crate::phase::Phase;
use crate::trainer::Trainer;

impl<B, M> Trainer<B, M>
where
    B: AutodiffBackend,
    M: ImageRegressor<B> + AutodiffModule<B>,
    M::InnerModule: ImageRegressor<B::InnerBackend>,
{
    /// One pass over `loader` without gradients, returning the epoch values of `phase`.
    pub(crate) fn run_evaluation<V: RegressionBatch<B::InnerBackend>>(
        &mut self,
        adapter: &mut ModelAdapter<B, M>,
        loader: &Loader<B::InnerBackend, V>,
        phase: Phase,
        limit: Option<usize>,
    ) -> Result<MetricValues> {
        let _span = info_span!("Evaluate", %phase).entered();
        let model = adapter.model().valid();

        for (batch_idx, batch) in loader.iter().enumerate().take(limit.unwrap_or(usize::MAX)) {
            adapter.evaluation_step(&mut self.session, phase, &model, batch, batch_idx)?;
        }

        let values = adapter.epoch_end(&mut self.session, phase);
        if let Some(loss) = values.get(&phase.loss_key()) {
            info!("{phase} loss: {loss:.6}");
        }
        Ok(values)
    }

    /// Evaluate the model on the test split of a data module that has been set up, eg.
    /// by a previous [`Trainer::fit`].
    pub fn test<I, Bt, V>(
        &mut self,
        adapter: &mut ModelAdapter<B, M>,
        datamodule: &DataModule<I>,
        batcher: &Bt,
    ) -> Result<MetricValues>
    where
        I: Clone + Debug + Send + Sync + 'static,
        Bt: Batcher<B::InnerBackend, I, V> + Clone + 'static,
        V: RegressionBatch<B::InnerBackend> + Clone + Debug + Send + 'static,
    {
        let loader = datamodule.test_loader::<B::InnerBackend, V>(batcher.clone(), &self.device)?;
        let values = self.run_evaluation(adapter, &loader, Phase::Test, None)?;
        if !values.is_empty() {
            self.logger.log_metrics(self.global_step, &values)?;
            self.logger.finish()?;
        }
        Ok(values)
    }
}
