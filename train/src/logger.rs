use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::error::Result;
use crate::msg::MetricValues;

/// Where and under which names a run is logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggerConfig {
    pub name: String,
    pub experiment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    #[serde(default = "default_save_dir")]
    pub save_dir: PathBuf,
    /// Any other keys, stored with the run as they are.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_save_dir() -> PathBuf {
    PathBuf::from("runs")
}

impl LoggerConfig {
    pub fn new(name: impl Into<String>, experiment: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            experiment: experiment.into(),
            entity: None,
            save_dir: default_save_dir(),
            extra: Map::new(),
        }
    }

    pub fn with_save_dir(mut self, save_dir: impl Into<PathBuf>) -> Self {
        self.save_dir = save_dir.into();
        self
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn run_dir(&self) -> PathBuf {
        self.save_dir.join(&self.name).join(&self.experiment)
    }
}

/// Sink for the values produced during a fit.
pub trait MetricLogger: Send {
    fn log_metrics(&mut self, step: u64, values: &MetricValues) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Serialize)]
struct Record<'a> {
    step: u64,
    #[serde(flatten)]
    values: &'a MetricValues,
}

/// Writes one JSON object per logging call to `metrics.jsonl` in the run folder, starting
/// from an empty file.
pub struct JsonlLogger {
    run_dir: PathBuf,
    writer: BufWriter<File>,
}

impl JsonlLogger {
    pub fn new(config: &LoggerConfig) -> Result<Self> {
        let run_dir = config.run_dir();
        fs::create_dir_all(&run_dir)?;
        fs::write(
            run_dir.join("run.json"),
            serde_json::to_string_pretty(config)?,
        )?;

        // A run owns its folder, values of an earlier run under the same names are dropped.
        let file = File::create(run_dir.join("metrics.jsonl"))?;
        info!("Logging run {}/{} to {}", config.name, config.experiment, run_dir.display());

        Ok(Self {
            run_dir,
            writer: BufWriter::new(file),
        })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }
}

impl MetricLogger for JsonlLogger {
    fn log_metrics(&mut self, step: u64, values: &MetricValues) -> Result<()> {
        for (key, value) in values {
            info!(step, key = key.as_str(), value, "metric");
        }
        serde_json::to_writer(&mut self.writer, &Record { step, values })?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl Drop for JsonlLogger {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl MetricLogger for NoopLogger {
    fn log_metrics(&mut self, _step: u64, _values: &MetricValues) -> Result<()> {
        Ok(())
    }
}
