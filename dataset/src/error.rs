use thiserror::Error;

pub type Result<T> = std::result::Result<T, DatasetError>;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("File IO error: {0}")]
    File(#[from] std::io::Error),

    #[error("Failed to walk dataset folder: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Image error: {0}")]
    InvalidImage(#[from] image::ImageError),

    #[error("Split fraction must be within [0, 1], got {0}")]
    InvalidSplit(f64),

    #[error("Dataset is empty: {0}")]
    Empty(String),

    #[error("No render_{0} folder in dataset")]
    MissingLevel(u32),

    #[error("Passes of {path} do not share the same resolution")]
    MismatchedPasses { path: String },

    #[error("Data module must be set up before requesting a loader")]
    NotSetUp,
}
