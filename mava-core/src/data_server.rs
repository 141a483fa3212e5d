//! Data server storing records written by executors.
//!
//! A [`DataServer`] is a thread-safe table shared by executors, which append
//! records through [`DataServerClient`]s, and trainers, which pull fixed-size
//! [`Batch`]es. Pulling blocks until enough records are available or the
//! server is closed.
mod client;
mod config;
mod server;
pub use client::DataServerClient;
pub use config::{DataServerConfig, TableKind};
pub use server::{DataServer, DatasetIterator};

/// Records sampled for one training step.
#[derive(Clone, Debug, PartialEq)]
pub struct Batch<T> {
    /// Sampled records.
    pub items: Vec<T>,
}

impl<T> Batch<T> {
    /// Number of records.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the batch has no record.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates over records.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}
