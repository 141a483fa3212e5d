//! Configuration of [`ParameterServer`](super::ParameterServer).
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`ParameterServer`](super::ParameterServer).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ParameterServerConfig {
    /// Seconds waited in each [`step`](super::ParameterServer::step), serving requests.
    pub non_blocking_sleep_seconds: f64,

    /// If `true`, parameters are restored at start and saved periodically.
    pub checkpoint: bool,

    /// Directory of the checkpoint file.
    pub checkpoint_dir: String,

    /// Interval of saving checkpoints in minutes.
    pub checkpoint_minute_interval: f64,

    /// The run terminates when `trainer_steps` reaches this value.
    pub max_trainer_steps: Option<i64>,

    /// The run terminates when `executor_steps` reaches this value.
    pub max_executor_steps: Option<i64>,

    /// Interval of logging counters in seconds.
    pub log_interval_seconds: f64,
}

impl Default for ParameterServerConfig {
    fn default() -> Self {
        Self {
            non_blocking_sleep_seconds: 10.0,
            checkpoint: false,
            checkpoint_dir: "./checkpoints".to_string(),
            checkpoint_minute_interval: 5.0,
            max_trainer_steps: None,
            max_executor_steps: None,
            log_interval_seconds: 60.0,
        }
    }
}

impl ParameterServerConfig {
    /// Sets the waiting time of a step in seconds.
    pub fn non_blocking_sleep_seconds(mut self, v: f64) -> Self {
        self.non_blocking_sleep_seconds = v;
        self
    }

    /// Enables checkpointing into the given directory.
    pub fn checkpoint_dir(mut self, dir: impl Into<String>) -> Self {
        self.checkpoint = true;
        self.checkpoint_dir = dir.into();
        self
    }

    /// Sets the checkpoint interval in minutes.
    pub fn checkpoint_minute_interval(mut self, v: f64) -> Self {
        self.checkpoint_minute_interval = v;
        self
    }

    /// Sets the maximum number of trainer steps.
    pub fn max_trainer_steps(mut self, v: i64) -> Self {
        self.max_trainer_steps = Some(v);
        self
    }

    /// Sets the maximum number of executor steps.
    pub fn max_executor_steps(mut self, v: i64) -> Self {
        self.max_executor_steps = Some(v);
        self
    }

    /// Sets the interval of logging counters in seconds.
    pub fn log_interval_seconds(mut self, v: f64) -> Self {
        self.log_interval_seconds = v;
        self
    }

    /// Constructs [`ParameterServerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`ParameterServerConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
