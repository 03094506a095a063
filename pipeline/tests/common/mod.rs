use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::{Rgb, Rgb32FImage};
use render::{RenderError, RenderPass, Renderer};
use serde_json::Value;

/// Renderer returning constant images, recording every call.
#[derive(Default)]
pub struct FakeRenderer {
    pub loaded: Vec<(PathBuf, String)>,
    pub calls: Vec<u32>,
    /// Fail every render call after this many succeeded.
    pub fail_after: Option<usize>,
}

impl FakeRenderer {
    pub fn failing_after(calls: usize) -> Self {
        Self {
            fail_after: Some(calls),
            ..Default::default()
        }
    }
}

pub const SIZE: u32 = 8;

#[async_trait]
impl Renderer for FakeRenderer {
    async fn load_scene(&mut self, scene_path: &Path, scene_id: &str) -> render::Result<()> {
        self.loaded
            .push((scene_path.to_path_buf(), scene_id.to_owned()));
        Ok(())
    }

    async fn render(&mut self, scene_id: &str, n_pass: u32) -> render::Result<Vec<RenderPass>> {
        if !self.loaded.iter().any(|(_, id)| id == scene_id) {
            return Err(RenderError::UnknownScene(scene_id.to_owned()));
        }
        if self.fail_after.is_some_and(|n| self.calls.len() >= n) {
            return Err(RenderError::Process {
                status: "exit status: 1".to_owned(),
                stderr: "out of memory".to_owned(),
            });
        }
        let call = self.calls.len() as f32;
        self.calls.push(n_pass);
        Ok((0..n_pass)
            .map(|k| {
                Rgb32FImage::from_fn(SIZE, SIZE, |x, y| {
                    let v = 0.1 * k as f32 + 0.01 * call + 0.001 * (x + y) as f32;
                    Rgb([v, v * 0.5, v * 0.25])
                })
            })
            .collect())
    }
}

/// Write `config` to a json file inside `dir`.
pub fn write_config(dir: &Path, config: &Value) -> String {
    let path = dir.join("config.json");
    scene_source::write_json(&path, config).unwrap();
    path.to_string_lossy().into_owned()
}

pub fn exr_files(folder: &Path) -> Vec<String> {
    let mut files: Vec<String> = std::fs::read_dir(folder)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".exr"))
        .collect();
    files.sort();
    files
}
