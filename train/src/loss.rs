use burn::prelude::{Backend, Tensor};
use serde::{Deserialize, Serialize};

use crate::ssim::Ssim;

const SSIM_WINDOW_SIZE: usize = 11;

/// Reconstruction loss between a prediction and its clean target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Loss {
    #[default]
    Mse,
    L1,
    /// `l1 * (1 - w) - ssim * w`, averaged over all pixels.
    L1Ssim { ssim_weight: f32 },
}

impl Loss {
    pub fn forward<B: Backend>(&self, preds: Tensor<B, 4>, targets: Tensor<B, 4>) -> Tensor<B, 1> {
        match *self {
            Self::Mse => (preds - targets).powi_scalar(2).mean(),
            Self::L1 => (preds - targets).abs().mean(),
            Self::L1Ssim { ssim_weight } => {
                let [_, channels, _, _] = preds.dims();
                let ssim = Ssim::new(SSIM_WINDOW_SIZE, channels, &preds.device());
                let l1 = (preds.clone() - targets.clone()).abs();
                let ssim_map = ssim.ssim_map(preds, targets);
                (l1 * (1.0 - ssim_weight) - ssim_map * ssim_weight).mean()
            }
        }
    }
}
