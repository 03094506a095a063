use thiserror::Error;

pub type Result<T> = std::result::Result<T, RenderError>;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Unknown renderer device: {0}. Expected one of cpu, cpu_multi, gpu, gpu_multi")]
    UnknownDevice(String),

    #[error("No scene loaded with id: {0}")]
    UnknownScene(String),

    #[error("Scene file not found: {0}")]
    MissingScene(String),

    #[error("Renderer exited with {status}: {stderr}")]
    Process { status: String, stderr: String },

    #[error("File IO error: {0}")]
    File(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}
