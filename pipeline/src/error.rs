use dataset::DatasetError;
use render::RenderError;
use scene_source::{ConfigError, SceneSourceError};
use thiserror::Error;
use train::TrainError;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("base_spp_level must be a positive integer")]
    InvalidBaseSpp,

    #[error("Failed to load config: {0}")]
    Source(#[from] SceneSourceError),

    #[error("Rendering failed: {0}")]
    Render(#[from] RenderError),

    #[error("Failed to load dataset: {0}")]
    Dataset(#[from] DatasetError),

    #[error("Training failed: {0}")]
    Train(#[from] TrainError),

    #[error("Failed to load or save model: {0}")]
    Recorder(#[from] burn::record::RecorderError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Tensor is not a valid image: {0}")]
    InvalidTensor(String),

    #[error("File IO error: {0}")]
    File(#[from] std::io::Error),
}

impl PipelineError {
    /// Whether this is a problem with the given parameters rather than a failure of the
    /// renderer or training framework.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Source(SceneSourceError::Config(_))
                | Self::InvalidBaseSpp
                | Self::Render(RenderError::UnknownDevice(_))
                | Self::Train(TrainError::InvalidDevice(_))
        )
    }
}
