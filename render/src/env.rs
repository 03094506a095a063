use std::path::PathBuf;
use std::str::FromStr;

use crate::error::Result;
use crate::kind::RendererKind;

/// Describes which renderer backend and variant to drive.
#[derive(Debug, Clone)]
pub struct RenderEnv {
    pub kind: RendererKind,
    pub variant: String,
    /// Renderer executable, looked up on `PATH` when relative.
    pub executable: PathBuf,
    /// Samples per pixel rendered by a single pass.
    pub spp_per_pass: u32,
}

impl RenderEnv {
    pub fn new(kind: RendererKind, spp_per_pass: u32) -> Self {
        Self {
            kind,
            variant: kind.default_variant().to_string(),
            executable: PathBuf::from("mitsuba"),
            spp_per_pass,
        }
    }

    /// Resolve a device string, using the backend's default variant unless one is given.
    pub fn from_device(device: &str, variant: Option<&str>, spp_per_pass: u32) -> Result<Self> {
        let env = Self::new(RendererKind::from_str(device)?, spp_per_pass);
        Ok(match variant {
            Some(variant) => env.with_variant(variant),
            None => env,
        })
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = variant.into();
        self
    }

    pub fn with_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = executable.into();
        self
    }
}
