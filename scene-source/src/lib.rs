mod config;
mod error;
mod json;
mod source;

pub use config::{RenderLevel, SceneConfig};
pub use error::{ConfigError, SceneSourceError};
pub use json::{load_json, write_json};
pub use source::{SCENE_FOLDER_ENV, default_scene_folder, list_available_scenes};
