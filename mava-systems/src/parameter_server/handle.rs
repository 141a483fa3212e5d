use anyhow::Result;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use mava_core::{
    parameters::{ParameterSnapshot, Parameters},
    MavaError,
};
use std::time::{Duration, Instant};

/// Request to a parameter server, carrying the sender of its reply.
pub enum ParameterServerRequest {
    /// Reads the named parameters.
    Get {
        /// Parameter names.
        names: Vec<String>,
        /// Reply.
        reply: Sender<Result<ParameterSnapshot>>,
    },

    /// Overwrites parameters; replies with the new version.
    Set {
        /// New values.
        updates: Parameters,
        /// Reply.
        reply: Sender<Result<u64>>,
    },

    /// Adds to parameters; replies with the new version.
    Add {
        /// Deltas.
        updates: Parameters,
        /// Reply.
        reply: Sender<Result<u64>>,
    },
}

/// Reply of an asynchronous request, see [`PendingReply::poll`].
pub struct PendingReply<T> {
    receiver: Receiver<Result<T>>,
    deadline: Instant,
    timeout: Duration,
}

impl<T> PendingReply<T> {
    /// Returns the reply if it arrived, `None` if it is still pending.
    ///
    /// After the deadline the reply is [`MavaError::RpcTimeout`].
    pub fn poll(&mut self) -> Option<Result<T>> {
        match self.receiver.try_recv() {
            Ok(reply) => Some(reply),
            Err(TryRecvError::Disconnected) => Some(Err(MavaError::RpcDisconnected.into())),
            Err(TryRecvError::Empty) if Instant::now() >= self.deadline => {
                Some(Err(MavaError::RpcTimeout(self.timeout.as_millis() as u64).into()))
            }
            Err(TryRecvError::Empty) => None,
        }
    }

    /// Blocks until the reply arrives or the deadline passes.
    pub fn wait(self) -> Result<T> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        match self.receiver.recv_timeout(remaining) {
            Ok(reply) => reply,
            Err(RecvTimeoutError::Timeout) => {
                Err(MavaError::RpcTimeout(self.timeout.as_millis() as u64).into())
            }
            Err(RecvTimeoutError::Disconnected) => Err(MavaError::RpcDisconnected.into()),
        }
    }
}

/// Cloneable remote interface of a [`ParameterServer`](super::ParameterServer).
///
/// Requests are queued in the inbox of the server and answered while it
/// waits in [`step`](super::ParameterServer::step).
#[derive(Clone)]
pub struct ParameterServerHandle {
    sender: Sender<ParameterServerRequest>,
    timeout: Duration,
}

impl ParameterServerHandle {
    pub(super) fn new(sender: Sender<ParameterServerRequest>, timeout: Duration) -> Self {
        Self { sender, timeout }
    }

    /// Returns a handle whose requests time out after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Timeout of requests.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn send<T>(
        &self,
        make: impl FnOnce(Sender<Result<T>>) -> ParameterServerRequest,
    ) -> Result<PendingReply<T>> {
        let (reply, receiver) = bounded(1);
        self.sender
            .send(make(reply))
            .map_err(|_| MavaError::RpcDisconnected)?;
        Ok(PendingReply {
            receiver,
            deadline: Instant::now() + self.timeout,
            timeout: self.timeout,
        })
    }

    /// Requests the named parameters without waiting.
    pub fn get_parameters_async(&self, names: Vec<String>) -> Result<PendingReply<ParameterSnapshot>> {
        self.send(|reply| ParameterServerRequest::Get { names, reply })
    }

    /// Requests an overwrite without waiting.
    pub fn set_parameters_async(&self, updates: Parameters) -> Result<PendingReply<u64>> {
        self.send(|reply| ParameterServerRequest::Set { updates, reply })
    }

    /// Requests an addition without waiting.
    pub fn add_to_parameters_async(&self, updates: Parameters) -> Result<PendingReply<u64>> {
        self.send(|reply| ParameterServerRequest::Add { updates, reply })
    }

    /// Reads the named parameters.
    pub fn get_parameters(&self, names: Vec<String>) -> Result<ParameterSnapshot> {
        self.get_parameters_async(names)?.wait()
    }

    /// Overwrites parameters and returns the new version.
    pub fn set_parameters(&self, updates: Parameters) -> Result<u64> {
        self.set_parameters_async(updates)?.wait()
    }

    /// Adds to parameters and returns the new version.
    pub fn add_to_parameters(&self, updates: Parameters) -> Result<u64> {
        self.add_to_parameters_async(updates)?.wait()
    }
}
