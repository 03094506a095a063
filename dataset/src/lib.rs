mod config;
mod datamodule;
mod denoiser;
mod error;
mod split;

pub use config::DataConfig;
pub use datamodule::{DataModule, DenoiserDataModule, Loader};
pub use denoiser::{
    DenoiserBatch, DenoiserBatcher, DenoiserDataset, DenoiserItem, LevelFolder, RenderRepeat,
    available_levels, image_to_tensor, level_folders, scan_level,
};
pub use error::{DatasetError, Result};
pub use split::{Partition, Shuffled, Split, SplitSizes};

/// Dataset and batching traits of the training framework.
pub use burn::data::dataloader::batcher::Batcher;
pub use burn::data::dataset::{Dataset, InMemDataset};
