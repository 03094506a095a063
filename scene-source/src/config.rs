use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::error::ConfigError;

/// One spp level of a render target: how many samples per pixel and how many
/// independent renders to produce at that level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderLevel {
    /// Level key exactly as written in the config, used for folder and result names.
    pub label: String,
    pub spp: u32,
    pub repeats: u32,
}

/// Declarative description of a render job, loaded once per invocation.
#[derive(Debug, Clone)]
pub struct SceneConfig {
    pub folder_out: PathBuf,
    pub scene_path: PathBuf,
    /// Target name to levels, in file order.
    render_targets: Vec<(String, Map<String, Value>)>,
}

impl SceneConfig {
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        let folder_out = value.get("folder_out").and_then(Value::as_str);
        let render_targets = value.get("render_targets").and_then(Value::as_object);

        let (Some(folder_out), Some(render_targets)) = (folder_out, render_targets) else {
            return Err(ConfigError::Malformed);
        };

        let scene_path = value
            .get("scene_path")
            .and_then(Value::as_str)
            .ok_or(ConfigError::MissingScenePath)?;

        let render_targets = render_targets
            .iter()
            .map(|(name, levels)| {
                levels
                    .as_object()
                    .map(|levels| (name.clone(), levels.clone()))
                    .ok_or_else(|| ConfigError::InvalidTarget {
                        target: name.clone(),
                    })
            })
            .collect::<Result<_, _>>()?;

        Ok(Self {
            folder_out: PathBuf::from(folder_out),
            scene_path: PathBuf::from(scene_path),
            render_targets,
        })
    }

    pub fn target_names(&self) -> impl Iterator<Item = &str> {
        self.render_targets.iter().map(|(name, _)| name.as_str())
    }

    /// Levels of the named target, in the order they appear in the config.
    pub fn target(&self, name: &str) -> Result<Vec<RenderLevel>, ConfigError> {
        let (_, levels) = self
            .render_targets
            .iter()
            .find(|(target, _)| target == name)
            .ok_or_else(|| ConfigError::UnknownTarget(name.to_string()))?;

        levels
            .iter()
            .map(|(label, repeats)| {
                let spp = label
                    .trim()
                    .parse::<u32>()
                    .ok()
                    .filter(|spp| *spp > 0)
                    .ok_or_else(|| ConfigError::InvalidLevel {
                        target: name.to_string(),
                        level: label.clone(),
                    })?;
                let repeats = repeats
                    .as_u64()
                    .and_then(|r| u32::try_from(r).ok())
                    .ok_or_else(|| ConfigError::InvalidRepeatCount {
                        target: name.to_string(),
                        level: label.clone(),
                    })?;
                Ok(RenderLevel {
                    label: label.clone(),
                    spp,
                    repeats,
                })
            })
            .collect()
    }
}
