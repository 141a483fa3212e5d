use super::ParameterClientConfig;
use crate::parameter_server::{ParameterServerHandle, PendingReply};
use anyhow::Result;
use log::{debug, warn};
use mava_core::{
    error::is_transient,
    parameters::{ParamValue, ParameterSnapshot, Parameters},
    MavaError,
};
use std::{thread, time::Duration};

/// Local cache of parameters synchronized with a parameter server.
///
/// The cache is stale by at most `update_period` calls of
/// [`ParameterClient::get_async`] while the server is reachable. Timeouts and
/// disconnections are transient: the cache keeps serving and a warning is
/// logged. More than `max_retries` consecutive failures end with
/// [`MavaError::RetriesExhausted`].
pub struct ParameterClient {
    handle: ParameterServerHandle,
    config: ParameterClientConfig,
    names: Vec<String>,
    cache: Parameters,
    version: Option<u64>,
    steps_since_get: usize,
    pending_get: Option<PendingReply<ParameterSnapshot>>,
    pending_add: Option<PendingReply<u64>>,
    add_buffer: Parameters,
    failures: usize,
}

impl ParameterClient {
    /// Creates a client caching the named parameters.
    pub fn new(
        handle: ParameterServerHandle,
        names: Vec<String>,
        config: ParameterClientConfig,
    ) -> Self {
        let handle = handle.with_timeout(config.rpc_timeout());
        Self {
            handle,
            config,
            names,
            cache: Parameters::new(),
            version: None,
            steps_since_get: 0,
            pending_get: None,
            pending_add: None,
            add_buffer: Parameters::new(),
            failures: 0,
        }
    }

    /// Cached parameters.
    pub fn parameters(&self) -> &Parameters {
        &self.cache
    }

    /// Cached value of a parameter.
    pub fn value(&self, name: &str) -> Option<&ParamValue> {
        self.cache.get(name)
    }

    /// Version of the cached snapshot, `None` before the first fetch.
    pub fn version(&self) -> Option<u64> {
        self.version
    }

    /// Current number of consecutive failures.
    pub fn failures(&self) -> usize {
        self.failures
    }

    /// Stores a snapshot unless it is older than the cache.
    ///
    /// Returns `true` if the snapshot was accepted.
    pub fn accept(&mut self, snapshot: ParameterSnapshot) -> bool {
        if let Some(v) = self.version {
            if snapshot.version < v {
                debug!(
                    "Discard stale snapshot of version {} (cached {})",
                    snapshot.version, v
                );
                return false;
            }
        }
        self.version = Some(snapshot.version);
        self.cache.extend(snapshot.values);
        true
    }

    fn on_success(&mut self) {
        self.failures = 0;
    }

    fn on_failure(&mut self, err: anyhow::Error) -> Result<()> {
        if !is_transient(&err) {
            return Err(err);
        }
        self.failures += 1;
        if self.failures > self.config.max_retries {
            return Err(MavaError::RetriesExhausted(self.failures).into());
        }
        warn!(
            "Parameter server request failed ({}/{}): {}",
            self.failures, self.config.max_retries, err
        );
        Ok(())
    }

    fn retry<T>(&mut self, mut request: impl FnMut(&ParameterServerHandle) -> Result<T>) -> Result<T> {
        loop {
            match request(&self.handle) {
                Ok(v) => {
                    self.on_success();
                    return Ok(v);
                }
                Err(e) => {
                    self.on_failure(e)?;
                    thread::sleep(Duration::from_millis(self.config.retry_interval_ms));
                }
            }
        }
    }

    /// Fetches parameters, blocking until they arrive.
    pub fn get_and_wait(&mut self) -> Result<()> {
        let names = self.names.clone();
        let snapshot = self.retry(|h| h.get_parameters(names.clone()))?;
        self.accept(snapshot);
        self.steps_since_get = 0;
        Ok(())
    }

    /// Overwrites parameters, blocking until the server answers.
    pub fn set_and_wait(&mut self, updates: Parameters) -> Result<u64> {
        self.retry(|h| h.set_parameters(updates.clone()))
    }

    /// Adds to parameters, blocking until the server answers.
    ///
    /// An addition is never resent: after a transient failure the deltas are
    /// dropped and `None` is returned.
    pub fn add_and_wait(&mut self, updates: Parameters) -> Result<Option<u64>> {
        match self.handle.add_to_parameters(updates) {
            Ok(v) => {
                self.on_success();
                Ok(Some(v))
            }
            Err(e) => {
                self.on_failure(e)?;
                Ok(None)
            }
        }
    }

    /// Accumulates deltas sent with the next periodic request.
    pub fn add_async(&mut self, updates: Parameters) -> Result<()> {
        for (name, delta) in updates {
            match self.add_buffer.get_mut(&name) {
                Some(acc) => acc.add_assign(&name, &delta)?,
                None => {
                    self.add_buffer.insert(name, delta);
                }
            }
        }
        Ok(())
    }

    fn harvest(&mut self) -> Result<bool> {
        let mut updated = false;
        if let Some(pending) = self.pending_get.as_mut() {
            if let Some(reply) = pending.poll() {
                self.pending_get = None;
                match reply {
                    Ok(snapshot) => {
                        self.on_success();
                        updated = self.accept(snapshot);
                    }
                    Err(e) => self.on_failure(e)?,
                }
            }
        }
        if let Some(pending) = self.pending_add.as_mut() {
            if let Some(reply) = pending.poll() {
                self.pending_add = None;
                match reply {
                    Ok(_) => self.on_success(),
                    Err(e) => self.on_failure(e)?,
                }
            }
        }
        Ok(updated)
    }

    /// Sends buffered deltas unless an addition is in flight.
    pub fn flush_async(&mut self) -> Result<()> {
        if self.add_buffer.is_empty() || self.pending_add.is_some() {
            return Ok(());
        }
        let updates = std::mem::take(&mut self.add_buffer);
        match self.handle.add_to_parameters_async(updates) {
            Ok(pending) => self.pending_add = Some(pending),
            Err(e) => self.on_failure(e)?,
        }
        Ok(())
    }

    /// Called once per local step.
    ///
    /// Harvests finished replies and, every `update_period` calls, requests
    /// fresh parameters and sends buffered deltas. Returns `true` if the cache
    /// was updated.
    pub fn get_async(&mut self) -> Result<bool> {
        let updated = self.harvest()?;
        self.steps_since_get += 1;
        if self.steps_since_get >= self.config.update_period.max(1) {
            self.steps_since_get = 0;
            if self.pending_get.is_none() {
                match self.handle.get_parameters_async(self.names.clone()) {
                    Ok(pending) => self.pending_get = Some(pending),
                    Err(e) => self.on_failure(e)?,
                }
            }
            self.flush_async()?;
        }
        Ok(updated)
    }

    /// Sends buffered deltas and waits for in-flight requests.
    pub fn flush_and_wait(&mut self) -> Result<()> {
        if let Some(pending) = self.pending_add.take() {
            if let Err(e) = pending.wait() {
                self.on_failure(e)?;
            }
        }
        if !self.add_buffer.is_empty() {
            let updates = std::mem::take(&mut self.add_buffer);
            self.add_and_wait(updates)?;
        }
        Ok(())
    }
}
