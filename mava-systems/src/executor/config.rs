//! Configuration of [`Executor`](super::Executor) and [`EnvironmentLoop`](super::EnvironmentLoop).
use crate::parameter_client::ParameterClientConfig;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Executor`](super::Executor) and [`EnvironmentLoop`](super::EnvironmentLoop).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ExecutorConfig {
    /// Random seed of action sampling.
    pub seed: u64,

    /// If `true`, agents of the same type share a network.
    pub shared_weights: bool,

    /// The maximum number of episodes, unbounded if `None`.
    pub max_episodes: Option<usize>,

    /// Interval of flushing episode records in episodes.
    pub record_interval: usize,

    /// Configuration of the parameter client.
    pub client: ParameterClientConfig,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            shared_weights: true,
            max_episodes: None,
            record_interval: 10,
            client: ParameterClientConfig::default(),
        }
    }
}

impl ExecutorConfig {
    /// Sets the random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Sets weight sharing between agents of the same type.
    pub fn shared_weights(mut self, v: bool) -> Self {
        self.shared_weights = v;
        self
    }

    /// Sets the maximum number of episodes.
    pub fn max_episodes(mut self, v: Option<usize>) -> Self {
        self.max_episodes = v;
        self
    }

    /// Sets the interval of flushing records in episodes.
    pub fn record_interval(mut self, v: usize) -> Self {
        self.record_interval = v;
        self
    }

    /// Sets the configuration of the parameter client.
    pub fn client(mut self, v: ParameterClientConfig) -> Self {
        self.client = v;
        self
    }

    /// Constructs [`ExecutorConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`ExecutorConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
