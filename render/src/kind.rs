use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// Renderer backend selected from a device string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RendererKind {
    /// Single threaded scalar CPU renderer.
    Cpu,
    /// Vectorized, multi-threaded CPU renderer.
    CpuMulti,
    /// CUDA renderer.
    Gpu,
    /// CUDA megakernel renderer, rendering many samples in a single launch.
    GpuMulti,
}

impl RendererKind {
    pub const ALL: [Self; 4] = [Self::Cpu, Self::CpuMulti, Self::Gpu, Self::GpuMulti];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::CpuMulti => "cpu_multi",
            Self::Gpu => "gpu",
            Self::GpuMulti => "gpu_multi",
        }
    }

    /// Renderer variant used when none is given explicitly.
    pub fn default_variant(self) -> &'static str {
        match self {
            Self::Cpu => "scalar_rgb",
            Self::CpuMulti => "llvm_ad_rgb",
            Self::Gpu => "cuda_rgb",
            Self::GpuMulti => "cuda_ad_rgb",
        }
    }
}

impl FromStr for RendererKind {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| RenderError::UnknownDevice(s.to_string()))
    }
}

impl fmt::Display for RendererKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_device() {
        for kind in RendererKind::ALL {
            assert_eq!(kind.as_str().parse::<RendererKind>().unwrap(), kind);
        }
        assert_eq!(" GPU_multi ".parse::<RendererKind>().unwrap(), RendererKind::GpuMulti);
    }

    #[test]
    fn unknown_device_is_rejected() {
        let err = "tpu".parse::<RendererKind>().unwrap_err();
        assert!(matches!(err, RenderError::UnknownDevice(device) if device == "tpu"));
    }

    #[test]
    fn default_variants() {
        assert_eq!(RendererKind::GpuMulti.default_variant(), "cuda_ad_rgb");
        assert_eq!(RendererKind::Cpu.default_variant(), "scalar_rgb");
    }
}
