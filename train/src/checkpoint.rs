use std::fs;
use std::path::{Path, PathBuf};

use burn::module::AutodiffModule;
use burn::optim::Optimizer;
use burn::prelude::Config;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::callback::{Callback, EpochContext};
use crate::error::TrainError;
use crate::model::AdamOptimizer;

const EXTENSION: &str = "mpk";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorMode {
    /// Lower is better.
    Min,
    /// Higher is better.
    Max,
}

impl MonitorMode {
    /// Whether `a` ranks strictly above `b`.
    fn better(self, a: f64, b: f64) -> bool {
        match self {
            Self::Min => a < b,
            Self::Max => a > b,
        }
    }
}

#[derive(Config, Debug)]
pub struct CheckpointConfig {
    #[config(default = "PathBuf::from(\"checkpoints\")")]
    pub dirpath: PathBuf,

    /// Logged value checkpoints are ranked on.
    #[config(default = "String::from(\"validation/loss\")")]
    pub monitor: String,

    #[config(default = "MonitorMode::Min")]
    pub mode: MonitorMode,

    /// Nr. of best checkpoints kept. 0 keeps none, a negative value keeps all of them.
    #[config(default = 1)]
    pub save_top_k: i64,

    /// Also refresh a `last` checkpoint at every checkpointed epoch.
    #[config(default = false)]
    pub save_last: bool,

    /// Skip the optimizer state.
    #[config(default = false)]
    pub save_weights_only: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct Ranked {
    score: f64,
    path: PathBuf,
}

/// The best `k` scores seen so far, best first.
#[derive(Debug, Clone)]
pub(crate) struct TopK {
    k: i64,
    mode: MonitorMode,
    entries: Vec<Ranked>,
}

impl TopK {
    pub fn new(k: i64, mode: MonitorMode) -> Self {
        Self {
            k,
            mode,
            entries: vec![],
        }
    }

    fn is_full(&self) -> bool {
        self.k >= 0 && self.entries.len() as i64 >= self.k
    }

    /// NaN never makes it in.
    pub fn admits(&self, score: f64) -> bool {
        if score.is_nan() || self.k == 0 {
            return false;
        }
        if !self.is_full() {
            return true;
        }
        self.entries
            .last()
            .is_some_and(|worst| self.mode.better(score, worst.score))
    }

    /// Insert an admitted entry, returning the path that fell out of the top k.
    pub fn insert(&mut self, score: f64, path: PathBuf) -> Option<PathBuf> {
        let pos = self
            .entries
            .iter()
            .position(|entry| self.mode.better(score, entry.score))
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, Ranked { score, path });

        if self.k >= 0 && self.entries.len() as i64 > self.k {
            self.entries.pop().map(|entry| entry.path)
        } else {
            None
        }
    }

    pub fn best(&self) -> Option<(f64, &Path)> {
        self.entries
            .first()
            .map(|entry| (entry.score, entry.path.as_path()))
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(|entry| entry.path.as_path())
    }
}

/// Saves the model at validation epoch ends, or at training epoch ends when no validation
/// runs, keeping the best `save_top_k` by the monitored value.
pub struct ModelCheckpoint {
    config: CheckpointConfig,
    recorder: NamedMpkFileRecorder<FullPrecisionSettings>,
    top_k: TopK,
    warned_unranked: bool,
}

impl ModelCheckpoint {
    pub fn new(config: CheckpointConfig) -> Self {
        let top_k = TopK::new(config.save_top_k, config.mode);
        Self {
            config,
            recorder: NamedMpkFileRecorder::new(),
            top_k,
            warned_unranked: false,
        }
    }

    pub fn config(&self) -> &CheckpointConfig {
        &self.config
    }

    /// File of the best checkpoint so far.
    pub fn best_model_path(&self) -> Option<PathBuf> {
        self.top_k
            .best()
            .map(|(_, base)| base.with_extension(EXTENSION))
    }

    pub fn best_model_score(&self) -> Option<f64> {
        self.top_k.best().map(|(score, _)| score)
    }

    /// Files of the kept top k checkpoints, best first.
    pub fn kept_paths(&self) -> Vec<PathBuf> {
        self.top_k
            .paths()
            .map(|base| base.with_extension(EXTENSION))
            .collect()
    }

    pub fn last_model_path(&self) -> PathBuf {
        self.config.dirpath.join("last").with_extension(EXTENSION)
    }

    fn optim_base(base: &Path) -> PathBuf {
        let mut name = base.as_os_str().to_owned();
        name.push("-optim");
        PathBuf::from(name)
    }

    fn save<B: AutodiffBackend, M: AutodiffModule<B>>(
        &self,
        base: &Path,
        model: &M,
        optimizer: &AdamOptimizer<B, M>,
    ) -> crate::Result<()> {
        model.clone().save_file(base, &self.recorder)?;
        if !self.config.save_weights_only {
            Recorder::<B>::record(&self.recorder, optimizer.to_record(), Self::optim_base(base))?;
        }
        Ok(())
    }

    fn remove(base: &Path) -> crate::Result<()> {
        for file in [
            base.with_extension(EXTENSION),
            Self::optim_base(base).with_extension(EXTENSION),
        ] {
            if file.exists() {
                fs::remove_file(file)?;
            }
        }
        Ok(())
    }

    /// Refresh `last` and rank the epoch. Without the monitored value the epoch is only
    /// ranked when `require_monitor` is set, in which case a missing value is an error.
    fn checkpoint<B: AutodiffBackend, M: AutodiffModule<B>>(
        &mut self,
        ctx: &EpochContext<'_, B, M>,
        require_monitor: bool,
    ) -> crate::Result<()> {
        fs::create_dir_all(&self.config.dirpath)?;

        if self.config.save_last {
            self.save(&self.config.dirpath.join("last"), ctx.model, ctx.optimizer)?;
        }

        if self.config.save_top_k == 0 {
            return Ok(());
        }

        let score = match ctx.metrics.get(&self.config.monitor) {
            Some(score) => *score,
            None if require_monitor => {
                return Err(TrainError::MonitorMissing(self.config.monitor.clone()));
            }
            None => {
                if !self.warned_unranked {
                    warn!(
                        "{} is not available without validation, only `last` is saved.",
                        self.config.monitor
                    );
                    self.warned_unranked = true;
                }
                return Ok(());
            }
        };

        if !self.top_k.admits(score) {
            return Ok(());
        }

        let base = self
            .config
            .dirpath
            .join(format!("epoch={}-step={}", ctx.epoch, ctx.global_step));
        self.save(&base, ctx.model, ctx.optimizer)?;
        info!(
            "Saved checkpoint {} ({} = {score})",
            base.display(),
            self.config.monitor
        );

        if let Some(evicted) = self.top_k.insert(score, base) {
            Self::remove(&evicted)?;
        }
        Ok(())
    }

    /// Ranked checkpoints already in `dirpath`, eg. from an earlier run.
    fn existing_ranked(&self) -> crate::Result<Vec<PathBuf>> {
        if !self.config.dirpath.is_dir() {
            return Ok(vec![]);
        }
        let mut found = vec![];
        for entry in fs::read_dir(&self.config.dirpath)? {
            let path = entry?.path();
            let is_ranked = path
                .file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with("epoch="));
            if is_ranked {
                found.push(path);
            }
        }
        found.sort();
        Ok(found)
    }
}

impl<B: AutodiffBackend, M: AutodiffModule<B>> Callback<B, M> for ModelCheckpoint {
    fn on_fit_start(&mut self) -> crate::Result<()> {
        let existing = self.existing_ranked()?;
        if !existing.is_empty() {
            warn!(
                "Checkpoint directory {} already holds {} ranked checkpoints, they are not part of this run's top {}.",
                self.config.dirpath.display(),
                existing.len(),
                self.config.save_top_k
            );
        }
        Ok(())
    }

    /// Epochs without a validation loop are checkpointed here, so a run without a
    /// validation split still leaves its weights behind.
    fn on_train_epoch_end(&mut self, ctx: &EpochContext<'_, B, M>) -> crate::Result<()> {
        if ctx.validates {
            return Ok(());
        }
        self.checkpoint(ctx, false)
    }

    fn on_validation_epoch_end(&mut self, ctx: &EpochContext<'_, B, M>) -> crate::Result<()> {
        self.checkpoint(ctx, true)
    }

    fn on_fit_end(&mut self) -> crate::Result<()> {
        if let Some(path) = self.best_model_path() {
            info!("Best checkpoint: {}", path.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(name: &str) -> PathBuf {
        PathBuf::from(name)
    }

    #[test]
    fn keeps_lowest_scores() {
        let mut top = TopK::new(2, MonitorMode::Min);
        assert!(top.admits(3.0));
        assert_eq!(top.insert(3.0, base("a")), None);
        assert_eq!(top.insert(1.0, base("b")), None);

        assert!(!top.admits(5.0));
        assert!(!top.admits(3.0));
        assert!(top.admits(2.0));
        assert_eq!(top.insert(2.0, base("c")), Some(base("a")));

        assert_eq!(top.best(), Some((1.0, Path::new("b"))));
        assert_eq!(top.paths().collect::<Vec<_>>(), vec![Path::new("b"), Path::new("c")]);
    }

    #[test]
    fn max_mode_and_nan() {
        let mut top = TopK::new(1, MonitorMode::Max);
        assert!(!top.admits(f64::NAN));
        top.insert(0.5, base("a"));
        assert!(top.admits(0.9));
        assert!(!top.admits(0.1));
        assert_eq!(top.insert(0.9, base("b")), Some(base("a")));
    }

    #[test]
    fn zero_and_unbounded_k() {
        assert!(!TopK::new(0, MonitorMode::Min).admits(1.0));

        let mut all = TopK::new(-1, MonitorMode::Min);
        for i in 0..10 {
            assert!(all.admits(i as f64));
            assert_eq!(all.insert(i as f64, base(&i.to_string())), None);
        }
        assert_eq!(all.paths().count(), 10);
    }

    #[test]
    fn file_names() {
        let checkpoint = ModelCheckpoint::new(CheckpointConfig::new().with_dirpath("ckpt".into()));
        assert_eq!(checkpoint.last_model_path(), Path::new("ckpt/last.mpk"));
        assert_eq!(
            ModelCheckpoint::optim_base(Path::new("ckpt/epoch=1-step=10")),
            Path::new("ckpt/epoch=1-step=10-optim")
        );
        assert_eq!(checkpoint.best_model_path(), None);
    }
}
