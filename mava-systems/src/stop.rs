//! System-wide stop signal.
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

/// Stop signal shared by all components of a system.
///
/// Nothing is ever sent on the underlying channel; [`StopSignal::stop`]
/// drops the only sender, which disconnects every receiver at once. Waiting
/// on [`StopSignal::receiver`] in a `select!` therefore returns as soon as the
/// system stops.
#[derive(Clone)]
pub struct StopSignal {
    sender: Arc<Mutex<Option<Sender<()>>>>,
    receiver: Receiver<()>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    /// Creates a signal that is not raised.
    pub fn new() -> Self {
        let (sender, receiver) = bounded(0);
        Self {
            sender: Arc::new(Mutex::new(Some(sender))),
            receiver,
        }
    }

    /// Raises the signal. Idempotent.
    pub fn stop(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_some() {
            log::info!("Stop signal raised");
        }
    }

    /// Returns `true` if the signal was raised.
    pub fn is_stopped(&self) -> bool {
        matches!(self.receiver.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Sleeps for `duration` or until the signal is raised.
    ///
    /// Returns `true` if the signal was raised.
    pub fn sleep(&self, duration: Duration) -> bool {
        matches!(
            self.receiver.recv_timeout(duration),
            Err(RecvTimeoutError::Disconnected)
        )
    }

    /// Receiver disconnected when the signal is raised, for `select!`.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.receiver
    }
}
