//! Configuration of [`Trainer`](super::Trainer).
use crate::parameter_client::ParameterClientConfig;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Trainer`](super::Trainer).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct TrainerConfig {
    /// The number of records in a batch.
    pub batch_size: usize,

    /// The maximum number of trainer steps, unbounded if `None`.
    pub max_trainer_steps: Option<usize>,

    /// Interval of flushing records in trainer steps.
    pub record_interval: usize,

    /// Configuration of the parameter client.
    ///
    /// `update_period` is counted in trainer steps.
    pub client: ParameterClientConfig,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            max_trainer_steps: None,
            record_interval: 100,
            client: ParameterClientConfig::default().update_period(1),
        }
    }
}

impl TrainerConfig {
    /// Sets the batch size.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Sets the maximum number of trainer steps.
    pub fn max_trainer_steps(mut self, v: Option<usize>) -> Self {
        self.max_trainer_steps = v;
        self
    }

    /// Sets the interval of flushing records in trainer steps.
    pub fn record_interval(mut self, v: usize) -> Self {
        self.record_interval = v;
        self
    }

    /// Sets the configuration of the parameter client.
    pub fn client(mut self, v: ParameterClientConfig) -> Self {
        self.client = v;
        self
    }

    /// Constructs [`TrainerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`TrainerConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
