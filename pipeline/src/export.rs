use std::path::Path;

use burn::module::Module;
use burn::prelude::{Backend, Tensor};
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use dataset::image_to_tensor;
use image::{ImageFormat, Rgb32FImage};
use train::ImageRegressor;
use train::denoiser::DenoiserBaselineConfig;

use crate::error::{PipelineError, Result};

/// Convert a `[C, H, W]` tensor with 3 channels back to an image.
pub fn tensor_to_image<B: Backend>(tensor: Tensor<B, 3>) -> Result<Rgb32FImage> {
    let [c, h, w] = tensor.dims();
    if c != 3 {
        return Err(PipelineError::InvalidTensor(format!("expected 3 channels, got {c}")));
    }
    let data = tensor
        .permute([1, 2, 0])
        .into_data()
        .convert::<f32>()
        .into_vec::<f32>()
        .map_err(|err| PipelineError::InvalidTensor(format!("{err:?}")))?;
    Rgb32FImage::from_raw(w as u32, h as u32, data)
        .ok_or_else(|| PipelineError::InvalidTensor("size mismatch".to_owned()))
}

/// Denoise the EXR at `input` with a saved baseline model and write the prediction to
/// `output`.
pub fn denoise_file<B: Backend>(
    model: &DenoiserBaselineConfig,
    checkpoint: &Path,
    input: &Path,
    output: &Path,
    device: &B::Device,
) -> Result<()> {
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    let model = model
        .init::<B>(device)
        .load_file(checkpoint, &recorder, device)?;

    let noisy = image::open(input)?.into_rgb32f();
    let prediction = model
        .forward(image_to_tensor::<B>(&noisy, device).unsqueeze())
        .squeeze::<3>(0);
    let image = tensor_to_image(prediction)?;

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    log::info!("Saving denoised image to {output:?}");
    image.save_with_format(output, ImageFormat::OpenExr)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::backend::ndarray::NdArrayDevice;
    use image::Rgb;

    #[test]
    fn image_roundtrips_through_tensor() {
        let device = NdArrayDevice::Cpu;
        let mut image = Rgb32FImage::from_pixel(5, 3, Rgb([0.25, 0.5, 2.0]));
        image.put_pixel(4, 2, Rgb([1.0, 0.0, 3.0]));

        let tensor = image_to_tensor::<NdArray>(&image, &device);
        assert_eq!(tensor_to_image(tensor).unwrap(), image);
    }

    #[test]
    fn rejects_wrong_channel_count() {
        let tensor = Tensor::<NdArray, 3>::zeros([1, 2, 2], &NdArrayDevice::Cpu);
        assert!(matches!(
            tensor_to_image(tensor),
            Err(PipelineError::InvalidTensor(_))
        ));
    }
}
