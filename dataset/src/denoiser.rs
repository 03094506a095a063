use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::{Backend, Tensor, TensorData};
use image::Rgb32FImage;
use walkdir::WalkDir;

use crate::error::{DatasetError, Result};

/// A noisy render and the clean reference it should be denoised to.
#[derive(Clone, Debug)]
pub struct DenoiserItem {
    pub noisy: Rgb32FImage,
    pub clean: Rgb32FImage,
}

#[derive(Clone, Debug)]
pub struct DenoiserBatch<B: Backend> {
    /// [N, C, H, W]
    pub noisy: Tensor<B, 4>,
    /// [N, C, H, W]
    pub clean: Tensor<B, 4>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DenoiserBatcher;

impl<B: Backend> Batcher<B, DenoiserItem, DenoiserBatch<B>> for DenoiserBatcher {
    fn batch(&self, items: Vec<DenoiserItem>, device: &B::Device) -> DenoiserBatch<B> {
        let (noisy, clean): (Vec<_>, Vec<_>) = items
            .iter()
            .map(|item| {
                (
                    image_to_tensor::<B>(&item.noisy, device),
                    image_to_tensor::<B>(&item.clean, device),
                )
            })
            .unzip();

        DenoiserBatch {
            noisy: Tensor::stack(noisy, 0),
            clean: Tensor::stack(clean, 0),
        }
    }
}

/// Converts a linear float image to a [C, H, W] tensor. Values are not clamped, HDR
/// renders can exceed 1.
pub fn image_to_tensor<B: Backend>(image: &Rgb32FImage, device: &B::Device) -> Tensor<B, 3> {
    let (w, h) = (image.width() as usize, image.height() as usize);
    let data = TensorData::new(image.as_raw().clone(), [h, w, 3]);
    Tensor::<B, 3>::from_data(data, device).permute([2, 0, 1])
}

/// Passes of one render repeat, ordered by pass index.
#[derive(Clone, Debug)]
pub struct RenderRepeat {
    pub passes: Vec<PathBuf>,
}

impl RenderRepeat {
    /// Average of all passes, i.e. the render at the full spp of its level.
    pub fn load(&self) -> Result<Rgb32FImage> {
        let mut passes = self.passes.iter();
        let first = passes
            .next()
            .ok_or_else(|| DatasetError::Empty("render repeat without passes".to_string()))?;
        let mut accum = image::open(first)?.into_rgb32f();

        for path in passes {
            let pass = image::open(path)?.into_rgb32f();
            if pass.dimensions() != accum.dimensions() {
                return Err(DatasetError::MismatchedPasses {
                    path: path.display().to_string(),
                });
            }
            for (acc, value) in accum.iter_mut().zip(pass.iter()) {
                *acc += value;
            }
        }

        let count = self.passes.len() as f32;
        accum.iter_mut().for_each(|value| *value /= count);
        Ok(accum)
    }
}

/// Parses `spp_<repeat>th_<pass>.exr` into `(repeat, pass)`.
pub(crate) fn parse_pass_name(name: &str) -> Option<(usize, usize)> {
    let (repeat, pass) = name
        .strip_prefix("spp_")?
        .strip_suffix(".exr")?
        .split_once("th_")?;
    Some((repeat.parse().ok()?, pass.parse().ok()?))
}

/// A `render_<label>` folder. `path` is the folder as named on disk, the label may be
/// written with padding (`render_04`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelFolder {
    pub spp: u32,
    pub path: PathBuf,
}

/// Level folders directly under `root`, by spp then name.
pub fn level_folders(root: &Path) -> Result<Vec<LevelFolder>> {
    let mut folders = vec![];
    for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if let Some(spp) = name
            .strip_prefix("render_")
            .and_then(|label| label.trim().parse().ok())
        {
            folders.push(LevelFolder {
                spp,
                path: entry.path().to_path_buf(),
            });
        }
    }
    folders.sort_by(|a, b| a.spp.cmp(&b.spp).then_with(|| a.path.cmp(&b.path)));
    Ok(folders)
}

/// Spp levels present under `root`, lowest first.
pub fn available_levels(root: &Path) -> Result<Vec<u32>> {
    let mut levels: Vec<u32> = level_folders(root)?.iter().map(|f| f.spp).collect();
    levels.dedup();
    Ok(levels)
}

fn pick_level(folders: &[LevelFolder], spp: u32) -> Result<&LevelFolder> {
    let mut matching = folders.iter().filter(|f| f.spp == spp);
    let folder = matching.next().ok_or(DatasetError::MissingLevel(spp))?;
    if matching.next().is_some() {
        log::warn!(
            "Several folders hold spp level {spp}, using {}",
            folder.path.display()
        );
    }
    Ok(folder)
}

/// Repeats stored in one level folder, ordered by repeat index.
pub fn scan_level(folder: &Path) -> Result<Vec<RenderRepeat>> {
    let mut repeats: BTreeMap<usize, BTreeMap<usize, PathBuf>> = BTreeMap::new();
    for entry in WalkDir::new(folder).min_depth(1).max_depth(1) {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy();
        if let Some((repeat, pass)) = parse_pass_name(&name) {
            repeats
                .entry(repeat)
                .or_default()
                .insert(pass, entry.path().to_path_buf());
        }
    }

    Ok(repeats
        .into_values()
        .map(|passes| RenderRepeat {
            passes: passes.into_values().collect(),
        })
        .collect())
}

/// Noisy/clean pairs built from the output of render target generation.
///
/// Item `i` pairs input repeat `i` with target repeat `i % n_targets`. Images are decoded
/// when an item is requested.
pub struct DenoiserDataset {
    inputs: Vec<RenderRepeat>,
    targets: Vec<RenderRepeat>,
}

impl DenoiserDataset {
    pub fn new(inputs: Vec<RenderRepeat>, targets: Vec<RenderRepeat>) -> Result<Self> {
        if targets.is_empty() {
            return Err(DatasetError::Empty("no clean target renders".to_string()));
        }
        Ok(Self { inputs, targets })
    }

    /// Load from a folder of `render_<spp>` folders. Without explicit levels the lowest
    /// level is the noisy input and the highest the clean target.
    pub fn from_render_folder(
        root: &Path,
        input_level: Option<u32>,
        target_level: Option<u32>,
    ) -> Result<Self> {
        let folders = level_folders(root)?;
        let empty = || DatasetError::Empty(format!("no render folders in {}", root.display()));

        let input = match input_level {
            Some(spp) => pick_level(&folders, spp)?,
            None => folders.first().ok_or_else(empty)?,
        };
        let target = match target_level {
            Some(spp) => pick_level(&folders, spp)?,
            None => {
                let highest = folders.last().ok_or_else(empty)?;
                pick_level(&folders, highest.spp)?
            }
        };

        if input.spp == target.spp {
            log::warn!("Input and target both use spp level {}.", input.spp);
        }

        let inputs = scan_level(&input.path)?;
        let targets = scan_level(&target.path)?;
        log::info!(
            "Denoiser dataset: {} inputs at {} spp, {} targets at {} spp",
            inputs.len(),
            input.spp,
            targets.len(),
            target.spp
        );
        Self::new(inputs, targets)
    }

    fn load(&self, index: usize) -> Result<DenoiserItem> {
        let noisy = self.inputs[index].load()?;
        let clean = self.targets[index % self.targets.len()].load()?;
        Ok(DenoiserItem { noisy, clean })
    }
}

impl Dataset<DenoiserItem> for DenoiserDataset {
    fn get(&self, index: usize) -> Option<DenoiserItem> {
        if index >= self.inputs.len() {
            return None;
        }
        match self.load(index) {
            Ok(item) => Some(item),
            Err(err) => {
                log::warn!("Failed to load denoiser item {index}: {err}");
                None
            }
        }
    }

    fn len(&self) -> usize {
        self.inputs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::backend::ndarray::NdArrayDevice;
    use image::Rgb;

    type TestBackend = NdArray;

    fn write_pass(root: &Path, label: &str, repeat: usize, pass: usize, value: f32) {
        let folder = root.join(format!("render_{label}"));
        std::fs::create_dir_all(&folder).unwrap();
        Rgb32FImage::from_pixel(4, 4, Rgb([value; 3]))
            .save(folder.join(format!("spp_{repeat}th_{pass}.exr")))
            .unwrap();
    }

    fn solid(w: u32, h: u32, value: f32) -> Rgb32FImage {
        Rgb32FImage::from_pixel(w, h, Rgb([value, value * 2.0, value * 3.0]))
    }

    #[test]
    fn image_becomes_channel_first() {
        let device = NdArrayDevice::Cpu;
        let mut image = solid(4, 2, 0.0);
        image.put_pixel(3, 1, Rgb([1.0, 2.0, 3.0]));

        let tensor = image_to_tensor::<TestBackend>(&image, &device);
        assert_eq!(tensor.dims(), [3, 2, 4]);

        let values = tensor.into_data().to_vec::<f32>().unwrap();
        // Channel 1, row 1, column 3.
        assert_eq!(values[8 + 4 + 3], 2.0);
        assert_eq!(values.iter().sum::<f32>(), 6.0);
    }

    #[test]
    fn batches_stack_on_first_dim() {
        let device = NdArrayDevice::Cpu;
        let items = vec![
            DenoiserItem { noisy: solid(5, 3, 0.1), clean: solid(5, 3, 0.2) },
            DenoiserItem { noisy: solid(5, 3, 0.3), clean: solid(5, 3, 0.4) },
        ];

        let batch: DenoiserBatch<TestBackend> = DenoiserBatcher.batch(items, &device);
        assert_eq!(batch.noisy.dims(), [2, 3, 3, 5]);
        assert_eq!(batch.clean.dims(), [2, 3, 3, 5]);
    }

    #[test]
    fn pass_names() {
        assert_eq!(parse_pass_name("spp_0th_7.exr"), Some((0, 7)));
        assert_eq!(parse_pass_name("spp_12th_3.exr"), Some((12, 3)));
        assert_eq!(parse_pass_name("spp_xth_3.exr"), None);
        assert_eq!(parse_pass_name("spp_1th_3.png"), None);
    }

    #[test]
    fn pairs_low_and_high_levels() {
        let dir = tempfile::tempdir().unwrap();
        for repeat in 0..3 {
            write_pass(dir.path(), "8", repeat, 0, 0.0);
            write_pass(dir.path(), "8", repeat, 1, 1.0);
        }
        for pass in 0..4 {
            write_pass(dir.path(), "16", 0, pass, pass as f32);
        }

        assert_eq!(available_levels(dir.path()).unwrap(), vec![8, 16]);

        let dataset = DenoiserDataset::from_render_folder(dir.path(), None, None).unwrap();
        assert_eq!(dataset.len(), 3);

        let item = dataset.get(2).unwrap();
        assert_eq!(item.noisy.get_pixel(0, 0), &Rgb([0.5; 3]));
        assert_eq!(item.clean.get_pixel(3, 3), &Rgb([1.5; 3]));
        assert!(dataset.get(3).is_none());
    }

    #[test]
    fn padded_labels_are_found() {
        let dir = tempfile::tempdir().unwrap();
        for repeat in 0..2 {
            write_pass(dir.path(), "04", repeat, 0, 1.0);
        }
        write_pass(dir.path(), "16", 0, 0, 2.0);

        let folders = level_folders(dir.path()).unwrap();
        assert_eq!(folders[0].spp, 4);
        assert_eq!(folders[0].path, dir.path().join("render_04"));

        let dataset = DenoiserDataset::from_render_folder(dir.path(), Some(4), None).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.get(1).unwrap().noisy.get_pixel(0, 0), &Rgb([1.0; 3]));
    }

    #[test]
    fn missing_level_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_pass(dir.path(), "8", 0, 0, 0.0);
        let err = DenoiserDataset::from_render_folder(dir.path(), None, Some(64)).err();
        assert!(matches!(err, Some(DatasetError::MissingLevel(64))));
    }

    #[test]
    fn empty_folder_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DenoiserDataset::from_render_folder(dir.path(), None, None).err();
        assert!(matches!(err, Some(DatasetError::Empty(_))));
    }
}
