use super::{Batch, DataServerConfig, TableKind};
use crate::{
    adder::{AdderSignature, SignedRecord},
    error::MavaError,
};
use anyhow::Result;
use log::{debug, trace};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{
    collections::VecDeque,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

struct Table<T> {
    items: VecDeque<T>,
    closed: bool,
    total_appended: u64,
    total_sampled: u64,
    rng: StdRng,
}

struct Shared<T> {
    table: Mutex<Table<T>>,
    changed: Condvar,
    config: DataServerConfig,
    signature: AdderSignature,
}

/// Thread-safe table of records.
///
/// Cloning returns a handle to the same table.
pub struct DataServer<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for DataServer<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: SignedRecord + Clone + Send> DataServer<T> {
    /// Creates an empty table accepting records of the given signature.
    pub fn new(config: DataServerConfig, signature: AdderSignature) -> Self {
        let seed = match config.table {
            TableKind::Uniform { seed, .. } => seed,
            TableKind::Queue { .. } => 0,
        };
        Self {
            shared: Arc::new(Shared {
                table: Mutex::new(Table {
                    items: VecDeque::new(),
                    closed: false,
                    total_appended: 0,
                    total_sampled: 0,
                    rng: StdRng::seed_from_u64(seed),
                }),
                changed: Condvar::new(),
                config,
                signature,
            }),
        }
    }

    /// Fails if batches of `batch_size` records can never be sampled, see
    /// [`DataServerConfig::check_batch_size`].
    pub fn check_batch_size(&self, batch_size: usize) -> Result<()> {
        self.shared.config.check_batch_size(batch_size)
    }

    /// Signature of accepted records.
    pub fn signature(&self) -> &AdderSignature {
        &self.shared.signature
    }

    fn lock(&self) -> MutexGuard<'_, Table<T>> {
        self.shared
            .table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.shared.config.poll_interval_ms.max(1))
    }

    /// Appends a record.
    ///
    /// Blocks while a queue is full. Fails if the record does not match the
    /// signature or the server is closed.
    pub fn append(&self, record: T) -> Result<()> {
        self.append_many(vec![record])
    }

    /// Appends records in order. Nothing is appended if any record does not
    /// match the signature.
    pub fn append_many(&self, records: Vec<T>) -> Result<()> {
        for record in records.iter() {
            record.check_signature(&self.shared.signature)?;
        }
        let n = records.len();
        for record in records {
            let mut table = self.lock();
            loop {
                if table.closed {
                    return Err(MavaError::DataServerClosed.into());
                }
                match self.shared.config.table {
                    TableKind::Queue { max_size } if table.items.len() >= max_size => {
                        table = self
                            .shared
                            .changed
                            .wait_timeout(table, self.poll_interval())
                            .unwrap_or_else(PoisonError::into_inner)
                            .0;
                    }
                    _ => break,
                }
            }
            if let TableKind::Uniform { capacity, .. } = self.shared.config.table {
                while table.items.len() >= capacity.max(1) {
                    table.items.pop_front();
                }
            }
            table.items.push_back(record);
            table.total_appended += 1;
            self.shared.changed.notify_all();
        }
        trace!("Appended {} records", n);
        Ok(())
    }

    fn ready(&self, table: &Table<T>, batch_size: usize) -> bool {
        match self.shared.config.table {
            TableKind::Queue { .. } => table.items.len() >= batch_size,
            TableKind::Uniform { min_size, .. } => {
                !table.items.is_empty() && table.items.len() >= min_size
            }
        }
    }

    /// Samples a batch, blocking until enough records are available.
    ///
    /// Fails with [`MavaError::DataServerClosed`] if the server is closed.
    pub fn sample(&self, batch_size: usize) -> Result<Batch<T>> {
        loop {
            if let Some(batch) = self.sample_timeout(batch_size, self.poll_interval())? {
                return Ok(batch);
            }
        }
    }

    /// Samples a batch, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` if not enough records became available in time.
    pub fn sample_timeout(&self, batch_size: usize, timeout: Duration) -> Result<Option<Batch<T>>> {
        self.check_batch_size(batch_size)?;
        let deadline = Instant::now() + timeout;
        let mut table = self.lock();
        loop {
            if table.closed {
                return Err(MavaError::DataServerClosed.into());
            }
            if self.ready(&table, batch_size) {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            table = self
                .shared
                .changed
                .wait_timeout(table, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }

        let items = match self.shared.config.table {
            TableKind::Queue { .. } => table.items.drain(..batch_size).collect(),
            TableKind::Uniform { .. } => {
                let n = table.items.len();
                let ixs: Vec<usize> = (0..batch_size).map(|_| table.rng.gen_range(0..n)).collect();
                ixs.into_iter().map(|ix| table.items[ix].clone()).collect()
            }
        };
        table.total_sampled += batch_size as u64;
        self.shared.changed.notify_all();
        Ok(Some(Batch { items }))
    }

    /// Iterator of batches; ends when the server is closed.
    pub fn iter(&self, batch_size: usize) -> DatasetIterator<T> {
        DatasetIterator {
            server: self.clone(),
            batch_size,
        }
    }

    /// Closes the server, waking up blocked callers.
    pub fn close(&self) {
        let mut table = self.lock();
        if !table.closed {
            debug!(
                "Close data server: {} appended, {} sampled",
                table.total_appended, table.total_sampled
            );
        }
        table.closed = true;
        self.shared.changed.notify_all();
    }

    /// Number of records in the table.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// Returns `true` if the table has no record.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of records appended since creation.
    pub fn total_appended(&self) -> u64 {
        self.lock().total_appended
    }
}

/// Blocking iterator of batches, see [`DataServer::iter`].
pub struct DatasetIterator<T> {
    server: DataServer<T>,
    batch_size: usize,
}

impl<T: SignedRecord + Clone + Send> Iterator for DatasetIterator<T> {
    type Item = Batch<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.server.sample(self.batch_size).ok()
    }
}
