use std::path::Path;

use async_trait::async_trait;
use image::Rgb32FImage;

mod env;
mod error;
mod kind;
pub mod mitsuba;

pub use env::RenderEnv;
pub use error::{RenderError, Result};
pub use kind::RendererKind;

/// One rendering pass: a linear HDR image with `spp_per_pass` samples per pixel.
pub type RenderPass = Rgb32FImage;

/// Client of an external physically based renderer.
///
/// Scenes are loaded once under an id and can then be rendered any number of times.
/// Calls are made sequentially; any parallelism is internal to the renderer.
#[async_trait]
pub trait Renderer: Send {
    /// Load (or re-load) the scene file at `scene_path` under `scene_id`.
    async fn load_scene(&mut self, scene_path: &Path, scene_id: &str) -> Result<()>;

    /// Render `n_pass` independent passes of a loaded scene.
    ///
    /// The passes are returned in order, one image per pass. Averaging all of them gives
    /// an image with `n_pass * spp_per_pass` samples per pixel.
    async fn render(&mut self, scene_id: &str, n_pass: u32) -> Result<Vec<RenderPass>>;
}
