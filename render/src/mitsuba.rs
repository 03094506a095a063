//! Renderer client driving the Mitsuba command line renderer.
//!
//! Every pass is a separate process invocation writing an EXR file to a scratch
//! directory, which is decoded and returned in memory. The scene is expected to
//! declare `spp` and `seed` parameters (`<default name="spp" value="4"/>`) so the
//! sample count and the sampler seed can be set per pass.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::debug;

use crate::error::{RenderError, Result};
use crate::{RenderEnv, RenderPass, Renderer};

pub struct MitsubaCli {
    env: RenderEnv,
    scenes: HashMap<String, PathBuf>,
    scratch: TempDir,
    next_seed: u64,
}

impl MitsubaCli {
    pub fn new(env: RenderEnv) -> Result<Self> {
        Ok(Self {
            env,
            scenes: HashMap::new(),
            scratch: tempfile::tempdir()?,
            next_seed: 0,
        })
    }

    pub fn env(&self) -> &RenderEnv {
        &self.env
    }
}

pub(crate) fn pass_args(env: &RenderEnv, scene: &Path, seed: u64, output: &Path) -> Vec<OsString> {
    vec![
        "-m".into(),
        env.variant.clone().into(),
        "-D".into(),
        format!("spp={}", env.spp_per_pass).into(),
        "-D".into(),
        format!("seed={seed}").into(),
        "-o".into(),
        output.into(),
        scene.into(),
    ]
}

#[async_trait]
impl Renderer for MitsubaCli {
    async fn load_scene(&mut self, scene_path: &Path, scene_id: &str) -> Result<()> {
        if !tokio::fs::try_exists(scene_path).await? {
            return Err(RenderError::MissingScene(scene_path.display().to_string()));
        }
        let scene_path = tokio::fs::canonicalize(scene_path).await?;
        debug!("Loaded scene {scene_id} from {}", scene_path.display());
        self.scenes.insert(scene_id.to_string(), scene_path);
        Ok(())
    }

    async fn render(&mut self, scene_id: &str, n_pass: u32) -> Result<Vec<RenderPass>> {
        let scene = self
            .scenes
            .get(scene_id)
            .ok_or_else(|| RenderError::UnknownScene(scene_id.to_string()))?
            .clone();

        let mut passes = Vec::with_capacity(n_pass as usize);
        for pass in 0..n_pass {
            let seed = self.next_seed;
            self.next_seed += 1;

            let output = self.scratch.path().join(format!("pass_{pass}.exr"));
            let result = Command::new(&self.env.executable)
                .args(pass_args(&self.env, &scene, seed, &output))
                .output()
                .await?;

            if !result.status.success() {
                return Err(RenderError::Process {
                    status: result.status.to_string(),
                    stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
                });
            }

            debug!("Rendered pass {pass} of {n_pass} for {scene_id} (seed {seed})");
            let image = image::open(&output)?.into_rgb32f();
            tokio::fs::remove_file(&output).await?;
            passes.push(image);
        }
        Ok(passes)
    }
}
