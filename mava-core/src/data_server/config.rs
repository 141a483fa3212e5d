//! Configuration of [`DataServer`](super::DataServer).
use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Sampling strategy of a data server table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TableKind {
    /// First-in first-out; each record is sampled exactly once.
    ///
    /// Appending blocks while the queue holds `max_size` records.
    Queue {
        /// Maximum number of records in the queue.
        max_size: usize,
    },

    /// Uniform sampling with replacement; the oldest record is evicted when full.
    ///
    /// Sampling blocks until `min_size` records were appended.
    Uniform {
        /// Maximum number of records.
        capacity: usize,
        /// Number of records required before sampling.
        min_size: usize,
        /// Random seed.
        seed: u64,
    },
}

/// Configuration of [`DataServer`](super::DataServer).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataServerConfig {
    /// Sampling strategy.
    pub table: TableKind,

    /// Interval in milliseconds at which blocked calls re-check whether the
    /// server was closed.
    pub poll_interval_ms: u64,
}

impl Default for DataServerConfig {
    fn default() -> Self {
        Self {
            table: TableKind::Queue { max_size: 1000 },
            poll_interval_ms: 100,
        }
    }
}

impl DataServerConfig {
    /// Checks that batches of `batch_size` records can ever be sampled.
    ///
    /// A queue smaller than a batch blocks its writers before the batch is
    /// full; a uniform table with `min_size` above its capacity never becomes
    /// ready.
    pub fn check_batch_size(&self, batch_size: usize) -> Result<()> {
        ensure!(batch_size > 0, "Batch size must be positive");
        match self.table {
            TableKind::Queue { max_size } => ensure!(
                batch_size <= max_size,
                "Batch size {} exceeds the queue size {}",
                batch_size,
                max_size
            ),
            TableKind::Uniform {
                capacity, min_size, ..
            } => ensure!(
                min_size <= capacity.max(1),
                "min_size {} exceeds the capacity {} of the uniform table",
                min_size,
                capacity
            ),
        }
        Ok(())
    }

    /// Sets the sampling strategy.
    pub fn table(mut self, table: TableKind) -> Self {
        self.table = table;
        self
    }

    /// Sets the poll interval in milliseconds.
    pub fn poll_interval_ms(mut self, v: u64) -> Self {
        self.poll_interval_ms = v;
        self
    }

    /// Constructs [`DataServerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`DataServerConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
