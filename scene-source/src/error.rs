use thiserror::Error;

pub type Result<T> = std::result::Result<T, SceneSourceError>;

#[derive(Debug, Error)]
pub enum SceneSourceError {
    #[error("File IO error: {0}")]
    File(#[from] std::io::Error),

    #[error("Invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to walk scene folder: {0}")]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors raised while validating a scene config. The messages are reported verbatim by the CLI.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Config is not well formatted, missing folder_out path and/or render_targets")]
    Malformed,

    #[error("There is no target for render with key: {0}")]
    UnknownTarget(String),

    #[error("There is no proper scene_path specified")]
    MissingScenePath,

    #[error("Render target {target} is not a mapping of spp levels to repeat counts")]
    InvalidTarget { target: String },

    #[error("Spp level {level} of render target {target} is not a positive integer")]
    InvalidLevel { target: String, level: String },

    #[error("Repeat count for spp level {level} of render target {target} is not a non-negative integer")]
    InvalidRepeatCount { target: String, level: String },
}
