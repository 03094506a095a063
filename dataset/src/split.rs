use std::ops::Range;
use std::sync::Arc;

use burn::data::dataset::Dataset;
use burn::data::dataset::transform::{PartialDataset, ShuffledDataset};

use crate::error::{DatasetError, Result};

/// Sizes of the train / validation / test splits of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitSizes {
    pub train: usize,
    pub valid: usize,
    pub test: usize,
}

impl SplitSizes {
    /// `train = floor(f * n)`, `valid = floor((1 - f) * n) / 2`, test gets the remainder.
    ///
    /// Validation is derived from `1 - f` directly rather than from `n - train`, so with
    /// floating point rounding the test split can end up one larger than validation.
    pub fn new(len: usize, split_perc: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&split_perc) {
            return Err(DatasetError::InvalidSplit(split_perc));
        }
        let train = (split_perc * len as f64).floor() as usize;
        let valid = ((1.0 - split_perc) * len as f64).floor() as usize / 2;
        // Both terms are bounded by len, so this can't underflow.
        let test = len - train - valid;
        Ok(Self { train, valid, test })
    }

    pub fn total(&self) -> usize {
        self.train + self.valid + self.test
    }
}

/// A dataset in the seeded order the splits are cut from.
pub type Shuffled<I> = Arc<ShuffledDataset<Arc<dyn Dataset<I>>, I>>;

/// One split: a consecutive run of a [`Shuffled`] dataset.
pub type Split<I> = PartialDataset<Shuffled<I>, I>;

/// Train / validation / test runs over a dataset shuffled once with `seed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub sizes: SplitSizes,
    pub seed: u64,
}

impl Partition {
    pub fn new(len: usize, split_perc: f64, seed: u64) -> Result<Self> {
        Ok(Self {
            sizes: SplitSizes::new(len, split_perc)?,
            seed,
        })
    }

    pub fn train_range(&self) -> Range<usize> {
        0..self.sizes.train
    }

    pub fn valid_range(&self) -> Range<usize> {
        self.sizes.train..self.sizes.train + self.sizes.valid
    }

    pub fn test_range(&self) -> Range<usize> {
        self.sizes.train + self.sizes.valid..self.sizes.total()
    }

    /// The seeded permutation of `dataset` all three splits are cut from.
    pub fn shuffle<I>(&self, dataset: Arc<dyn Dataset<I>>) -> Shuffled<I> {
        Arc::new(ShuffledDataset::with_seed(dataset, self.seed))
    }

    pub fn split<I: Clone + Send + Sync>(shuffled: &Shuffled<I>, range: Range<usize>) -> Split<I> {
        PartialDataset::new(shuffled.clone(), range.start, range.end)
    }
}
