#![recursion_limit = "256"]

pub mod callback;
pub mod checkpoint;
pub mod config;
pub mod denoiser;
pub mod device;
pub mod eval;
pub mod logger;
pub mod loss;
pub mod metric;
pub mod model;
pub mod msg;
pub mod phase;
pub mod session;
pub mod trainer;

mod error;
mod ssim;

pub use error::{Result, TrainError};
pub use model::{Capability, ImageRegressor, ModelAdapter, RegressionBatch};
pub use phase::Phase;
pub use session::Session;
pub use trainer::Trainer;
