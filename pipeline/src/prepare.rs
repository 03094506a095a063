use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use image::{ImageFormat, Rgb32FImage};
use render::mitsuba::MitsubaCli;
use render::{RenderEnv, Renderer};
use scene_source::{RenderLevel, SceneConfig, load_json};

use crate::config::RenderTargetRequest;
use crate::error::{PipelineError, Result};

/// Id the scene is loaded under for generation.
pub const SCENE_ID: &str = "scene_gen";

/// Spp level label to one entry per repeat, each holding the images of every pass.
pub type RenderResults = BTreeMap<String, Vec<Vec<Rgb32FImage>>>;

pub fn level_folder(folder_out: &Path, label: &str) -> PathBuf {
    folder_out.join(format!("render_{label}"))
}

pub fn pass_file_name(repeat: u32, pass: usize) -> String {
    format!("spp_{repeat}th_{pass}.exr")
}

/// Everything needed for a run, checked before anything touches the disk.
struct Plan {
    config: SceneConfig,
    levels: Vec<RenderLevel>,
    base_spp_level: u32,
}

fn plan(request: &RenderTargetRequest) -> Result<Plan> {
    if request.base_spp_level == 0 {
        return Err(PipelineError::InvalidBaseSpp);
    }
    let config = SceneConfig::from_value(&load_json(&request.config_path)?)?;
    let levels = config.target(&request.render_target)?;
    Ok(Plan {
        config,
        levels,
        base_spp_level: request.base_spp_level,
    })
}

/// Render every level of the requested target with `renderer`, writing each pass to
/// `<folder_out>/render_<level>/spp_<repeat>th_<pass>.exr`.
///
/// Config problems fail before any folder is created. Renderer and IO errors abort the
/// run as they happen, files written by earlier repeats are left in place.
pub async fn generate_render_target<R: Renderer + ?Sized>(
    renderer: &mut R,
    request: &RenderTargetRequest,
) -> Result<RenderResults> {
    let Plan {
        config,
        levels,
        base_spp_level,
    } = plan(request)?;

    tokio::fs::create_dir_all(&config.folder_out).await?;
    renderer.load_scene(&config.scene_path, SCENE_ID).await?;

    let mut results = RenderResults::new();
    for level in levels {
        log::info!("Starting renders for spp level: {}", level.label);

        let folder = level_folder(&config.folder_out, &level.label);
        tokio::fs::create_dir_all(&folder).await?;

        let n_pass = level.spp / base_spp_level;
        if n_pass == 0 {
            log::warn!(
                "Spp level {} is below the base level {base_spp_level}, renders will have no passes.",
                level.label
            );
        }

        let repeats = results.entry(level.label.clone()).or_default();
        for i in 0..level.repeats {
            log::info!(
                "Rendering repeat {} of {} at {} spp",
                i + 1,
                level.repeats,
                level.label
            );
            let passes = renderer.render(SCENE_ID, n_pass).await?;
            for (k, pass) in passes.iter().enumerate() {
                pass.save_with_format(folder.join(pass_file_name(i, k)), ImageFormat::OpenExr)?;
            }
            repeats.push(passes);
        }
    }
    Ok(results)
}

/// [`generate_render_target`] driving the Mitsuba command line renderer.
pub async fn generate_with_mitsuba(request: &RenderTargetRequest) -> Result<RenderResults> {
    let env = RenderEnv::from_device(
        &request.device,
        request.variant.as_deref(),
        request.base_spp_level,
    )?;
    // Validate the request before spawning anything.
    plan(request)?;
    log::info!("Rendering with {} ({})", env.kind, env.variant);

    let mut renderer = MitsubaCli::new(env)?;
    generate_render_target(&mut renderer, request).await
}
