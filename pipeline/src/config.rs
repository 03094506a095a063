use burn::prelude::Config;

/// Parameters of a render target generation run.
#[derive(Config, Debug)]
pub struct RenderTargetRequest {
    /// Json file with `folder_out`, `scene_path` and `render_targets`.
    pub config_path: String,

    /// Which entry of `render_targets` to render.
    #[config(default = "String::from(\"low_spp\")")]
    pub render_target: String,

    /// Renderer backend: cpu, cpu_multi, gpu or gpu_multi.
    #[config(default = "String::from(\"gpu_multi\")")]
    pub device: String,

    /// Overrides the default variant of the backend.
    pub variant: Option<String>,

    /// Samples per pixel of a single pass. A level of `n` spp is rendered as
    /// `n / base_spp_level` passes.
    #[config(default = 4)]
    pub base_spp_level: u32,
}
