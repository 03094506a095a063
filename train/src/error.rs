use dataset::DatasetError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrainError>;

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("Model is inference only, cannot train without: {missing}")]
    InferenceOnly { missing: String },

    #[error("Device is not valid: {0}")]
    InvalidDevice(String),

    #[error("The training split is empty, nothing to fit on")]
    EmptyTrainSplit,

    #[error("Monitored metric {0} was not logged, cannot rank checkpoints")]
    MonitorMissing(String),

    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("Failed to record checkpoint: {0}")]
    Recorder(#[from] burn::record::RecorderError),

    #[error("File IO error: {0}")]
    File(#[from] std::io::Error),

    #[error("Invalid json: {0}")]
    Json(#[from] serde_json::Error),
}
