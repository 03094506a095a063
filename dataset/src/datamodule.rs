use std::fmt::Debug;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataloader::{DataLoader, DataLoaderBuilder};
use burn::data::dataset::Dataset;
use burn::prelude::Backend;

use crate::config::DataConfig;
use crate::denoiser::{DenoiserDataset, DenoiserItem};
use crate::error::{DatasetError, Result};
use crate::split::{Partition, Shuffled};

/// Batches of one split, as produced by burn's data loaders.
pub type Loader<B, O> = Arc<dyn DataLoader<B, O>>;

/// Wraps a dataset with a fixed train/validation/test partition and hands out loaders.
pub struct DataModule<I> {
    dataset: Arc<dyn Dataset<I>>,
    config: DataConfig,
    prepared: Option<(Partition, Shuffled<I>)>,
}

impl<I> DataModule<I>
where
    I: Clone + Debug + Send + Sync + 'static,
{
    pub fn new(dataset: impl Dataset<I> + 'static, config: DataConfig) -> Self {
        Self {
            dataset: Arc::new(dataset),
            config,
            prepared: None,
        }
    }

    pub fn config(&self) -> &DataConfig {
        &self.config
    }

    /// Compute the partition. Calling this again recomputes the same partition.
    pub fn setup(&mut self) -> Result<&Partition> {
        let partition = Partition::new(self.dataset.len(), self.config.split_perc, self.config.seed)?;
        log::info!(
            "Split {} items into {} train, {} validation, {} test (seed {})",
            self.dataset.len(),
            partition.sizes.train,
            partition.sizes.valid,
            partition.sizes.test,
            partition.seed
        );
        let shuffled = partition.shuffle(self.dataset.clone());
        let (partition, _) = self.prepared.insert((partition, shuffled));
        Ok(partition)
    }

    pub fn partition(&self) -> Option<&Partition> {
        self.prepared.as_ref().map(|(partition, _)| partition)
    }

    fn loader<B, O>(
        &self,
        batcher: impl Batcher<B, I, O> + 'static,
        device: &B::Device,
        range: impl FnOnce(&Partition) -> Range<usize>,
        shuffle: bool,
    ) -> Result<Loader<B, O>>
    where
        B: Backend,
        O: Clone + Debug + Send + 'static,
    {
        let (partition, shuffled) = self.prepared.as_ref().ok_or(DatasetError::NotSetUp)?;
        let split = Partition::split(shuffled, range(partition));

        let mut builder = DataLoaderBuilder::new(batcher)
            .batch_size(self.config.batch_size.max(1))
            .set_device(device.clone());
        if shuffle {
            builder = builder.shuffle(self.config.seed);
        }
        if let Some(workers) = self.config.num_workers {
            builder = builder.num_workers(workers);
        }
        Ok(builder.build(split))
    }

    /// Reshuffled every time an epoch starts iterating it.
    pub fn train_loader<B: Backend, O: Clone + Debug + Send + 'static>(
        &self,
        batcher: impl Batcher<B, I, O> + 'static,
        device: &B::Device,
    ) -> Result<Loader<B, O>> {
        self.loader(batcher, device, Partition::train_range, true)
    }

    pub fn valid_loader<B: Backend, O: Clone + Debug + Send + 'static>(
        &self,
        batcher: impl Batcher<B, I, O> + 'static,
        device: &B::Device,
    ) -> Result<Loader<B, O>> {
        self.loader(batcher, device, Partition::valid_range, false)
    }

    pub fn test_loader<B: Backend, O: Clone + Debug + Send + 'static>(
        &self,
        batcher: impl Batcher<B, I, O> + 'static,
        device: &B::Device,
    ) -> Result<Loader<B, O>> {
        self.loader(batcher, device, Partition::test_range, false)
    }
}

pub type DenoiserDataModule = DataModule<DenoiserItem>;

impl DataModule<DenoiserItem> {
    /// Data module over the renders found in `config.data_dir`.
    pub fn from_render_folder(config: DataConfig) -> Result<Self> {
        let dataset = DenoiserDataset::from_render_folder(
            Path::new(&config.data_dir),
            config.input_level,
            config.target_level,
        )?;
        Ok(Self::new(dataset, config))
    }
}
