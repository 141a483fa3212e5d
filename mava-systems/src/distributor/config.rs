//! Configuration of [`Distributor`](super::Distributor).
use crate::{
    executor::ExecutorConfig, parameter_server::ParameterServerConfig, trainer::TrainerConfig,
};
use anyhow::Result;
use mava_core::data_server::DataServerConfig;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Distributor`](super::Distributor).
///
/// Executor `i` is seeded with `seed + i`; the evaluator with
/// `seed + num_executors`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct DistributorConfig {
    /// The number of executors writing experience.
    pub num_executors: usize,

    /// The number of trainers.
    pub num_trainers: usize,

    /// If `true`, an evaluator runs along with the executors.
    pub run_evaluator: bool,

    /// Base random seed of environments and executors.
    pub seed: i64,

    /// The number of records an executor buffers before appending them to
    /// the data server.
    pub n_buffer: usize,

    /// Configuration of the parameter server.
    pub parameter_server: ParameterServerConfig,

    /// Configuration of the data server.
    pub data_server: DataServerConfig,

    /// Configuration of executors; the evaluator uses it as well.
    pub executor: ExecutorConfig,

    /// Configuration of trainers.
    pub trainer: TrainerConfig,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            num_executors: 1,
            num_trainers: 1,
            run_evaluator: true,
            seed: 42,
            n_buffer: 16,
            parameter_server: ParameterServerConfig::default(),
            data_server: DataServerConfig::default(),
            executor: ExecutorConfig::default(),
            trainer: TrainerConfig::default(),
        }
    }
}

impl DistributorConfig {
    /// Sets the number of executors.
    pub fn num_executors(mut self, v: usize) -> Self {
        self.num_executors = v;
        self
    }

    /// Sets the number of trainers.
    pub fn num_trainers(mut self, v: usize) -> Self {
        self.num_trainers = v;
        self
    }

    /// Sets whether an evaluator runs.
    pub fn run_evaluator(mut self, v: bool) -> Self {
        self.run_evaluator = v;
        self
    }

    /// Sets the base random seed.
    pub fn seed(mut self, v: i64) -> Self {
        self.seed = v;
        self
    }

    /// Sets the number of records buffered by executors.
    pub fn n_buffer(mut self, v: usize) -> Self {
        self.n_buffer = v;
        self
    }

    /// Sets the configuration of the parameter server.
    pub fn parameter_server(mut self, v: ParameterServerConfig) -> Self {
        self.parameter_server = v;
        self
    }

    /// Sets the configuration of the data server.
    pub fn data_server(mut self, v: DataServerConfig) -> Self {
        self.data_server = v;
        self
    }

    /// Sets the configuration of executors.
    pub fn executor(mut self, v: ExecutorConfig) -> Self {
        self.executor = v;
        self
    }

    /// Sets the configuration of trainers.
    pub fn trainer(mut self, v: TrainerConfig) -> Self {
        self.trainer = v;
        self
    }

    /// Constructs [`DistributorConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`DistributorConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
