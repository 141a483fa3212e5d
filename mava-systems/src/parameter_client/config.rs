//! Configuration of [`ParameterClient`](super::ParameterClient).
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
    time::Duration,
};

/// Configuration of [`ParameterClient`](super::ParameterClient).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ParameterClientConfig {
    /// Local steps between two fetches from the parameter server.
    pub update_period: usize,

    /// Consecutive transient failures tolerated before giving up.
    pub max_retries: usize,

    /// Timeout of a request in milliseconds.
    pub rpc_timeout_ms: u64,

    /// Waiting time between retries of a blocking request in milliseconds.
    pub retry_interval_ms: u64,
}

impl Default for ParameterClientConfig {
    fn default() -> Self {
        Self {
            update_period: 100,
            max_retries: 10,
            rpc_timeout_ms: 30_000,
            retry_interval_ms: 100,
        }
    }
}

impl ParameterClientConfig {
    /// Sets the update period in local steps.
    pub fn update_period(mut self, v: usize) -> Self {
        self.update_period = v;
        self
    }

    /// Sets the number of tolerated consecutive failures.
    pub fn max_retries(mut self, v: usize) -> Self {
        self.max_retries = v;
        self
    }

    /// Sets the request timeout in milliseconds.
    pub fn rpc_timeout_ms(mut self, v: u64) -> Self {
        self.rpc_timeout_ms = v;
        self
    }

    /// Sets the waiting time between retries in milliseconds.
    pub fn retry_interval_ms(mut self, v: u64) -> Self {
        self.retry_interval_ms = v;
        self
    }

    /// Request timeout.
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    /// Constructs [`ParameterClientConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`ParameterClientConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
