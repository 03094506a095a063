use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{PaddingConfig2d, Relu};
use burn::prelude::{Backend, Config, Module, Tensor};

use crate::model::ImageRegressor;

#[derive(Config, Debug)]
pub struct DenoiserBaselineConfig {
    /// Channels of the images, 3 for RGB renders.
    #[config(default = 3)]
    pub channels: usize,

    #[config(default = 32)]
    pub hidden: usize,

    /// Nr. of hidden convolutions between the input and output layer.
    #[config(default = 4)]
    pub depth: usize,

    #[config(default = 3)]
    pub kernel_size: usize,
}

impl DenoiserBaselineConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> DenoiserBaseline<B> {
        let conv = |channels_in: usize, channels_out: usize| {
            Conv2dConfig::new(
                [channels_in, channels_out],
                [self.kernel_size, self.kernel_size],
            )
            .with_padding(PaddingConfig2d::Same)
            .init(device)
        };

        DenoiserBaseline {
            input: conv(self.channels, self.hidden),
            hidden: (0..self.depth)
                .map(|_| conv(self.hidden, self.hidden))
                .collect(),
            output: conv(self.hidden, self.channels),
            activation: Relu::new(),
        }
    }
}

/// Small fully convolutional denoiser. Predicts the noise of the input and subtracts it,
/// so an untrained network starts close to the identity.
#[derive(Module, Debug)]
pub struct DenoiserBaseline<B: Backend> {
    input: Conv2d<B>,
    hidden: Vec<Conv2d<B>>,
    output: Conv2d<B>,
    activation: Relu,
}

impl<B: Backend> ImageRegressor<B> for DenoiserBaseline<B> {
    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = self.activation.forward(self.input.forward(input.clone()));
        for conv in &self.hidden {
            x = self.activation.forward(conv.forward(x));
        }
        input - self.output.forward(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::backend::ndarray::NdArrayDevice;

    #[test]
    fn keeps_image_shape() {
        let device = NdArrayDevice::Cpu;
        let model = DenoiserBaselineConfig::new()
            .with_hidden(4)
            .with_depth(1)
            .init::<NdArray>(&device);

        let input = Tensor::<NdArray, 4>::zeros([2, 3, 7, 9], &device);
        assert_eq!(model.forward(input).dims(), [2, 3, 7, 9]);
    }
}
