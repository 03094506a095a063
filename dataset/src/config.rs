use burn::prelude::Config;

#[derive(Config, Debug)]
pub struct DataConfig {
    /// Folder holding the `render_<spp>` folders written by render target generation.
    #[config(default = "String::from(\"data/denoiser\")")]
    pub data_dir: String,

    /// Nr. of examples per batch.
    #[config(default = 32)]
    pub batch_size: usize,

    /// Fraction of the dataset used for training. What remains is halved (rounding down)
    /// into the validation split, and the test split takes the rest.
    #[config(default = 0.8)]
    pub split_perc: f64,

    /// Seed of the train/validation/test partition and of the training shuffle.
    #[config(default = 0)]
    pub seed: u64,

    /// Worker threads loading batches. Batches are loaded on the calling thread when unset.
    pub num_workers: Option<usize>,

    /// Spp level used as noisy input. Defaults to the lowest level found.
    pub input_level: Option<u32>,

    /// Spp level used as clean target. Defaults to the highest level found.
    pub target_level: Option<u32>,
}
