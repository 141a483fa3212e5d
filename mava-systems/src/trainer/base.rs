use super::{TrainerConfig, TrainerStat};
use crate::{
    parameter_client::TrainerParameterClient, parameter_server::ParameterServerHandle, StopSignal,
};
use anyhow::Result;
use chrono::Local;
use log::{debug, info};
use mava_core::{
    adder::SignedRecord,
    data_server::{Batch, DataServer},
    record::{NullRecorder, Record, RecordValue, Recorder},
    MavaError, Updater,
};
use std::time::{Duration, Instant};

const SAMPLE_POLL: Duration = Duration::from_millis(100);

/// Consumes batches from a data server and publishes parameter updates.
///
/// A step pulls one batch, refreshes the cached parameters, computes an
/// update with the [`Updater`] and publishes it to the parameter server
/// together with `trainer_steps += 1`. A step is complete before the next
/// one starts.
pub struct Trainer<T> {
    config: TrainerConfig,
    data_server: DataServer<T>,
    updater: Box<dyn Updater<T>>,
    client: TrainerParameterClient,
    stop: StopSignal,
    recorder: Box<dyn Recorder>,
    n_steps: usize,
    n_samples: usize,
}

impl<T: SignedRecord + Clone + Send> Trainer<T> {
    /// Creates a trainer.
    ///
    /// Fails if the data server can never provide a batch of
    /// `config.batch_size` records.
    pub fn new(
        config: TrainerConfig,
        data_server: DataServer<T>,
        updater: Box<dyn Updater<T>>,
        handle: ParameterServerHandle,
        stop: StopSignal,
    ) -> Result<Self> {
        data_server.check_batch_size(config.batch_size)?;
        let client =
            TrainerParameterClient::new(handle, updater.parameter_names(), config.client.clone());
        Ok(Self {
            config,
            data_server,
            updater,
            client,
            stop,
            recorder: Box::new(NullRecorder {}),
            n_steps: 0,
            n_samples: 0,
        })
    }

    /// Sets the recorder of training records.
    pub fn recorder(mut self, recorder: Box<dyn Recorder>) -> Self {
        self.recorder = recorder;
        self
    }

    /// The number of trainer steps taken.
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    fn next_batch(&self) -> Result<Option<Batch<T>>> {
        loop {
            if self.stop.is_stopped() {
                return Ok(None);
            }
            if let Some(batch) = self
                .data_server
                .sample_timeout(self.config.batch_size, SAMPLE_POLL)?
            {
                return Ok(Some(batch));
            }
        }
    }

    /// Takes a trainer step.
    ///
    /// Blocks until a batch is available. Returns `None` if the stop signal
    /// was raised while waiting.
    pub fn step(&mut self) -> Result<Option<Record>> {
        let batch = match self.next_batch()? {
            Some(batch) => batch,
            None => return Ok(None),
        };
        let t = Instant::now();
        self.client.refresh()?;
        let update = self.updater.update(&batch, self.client.parameters())?;
        self.client.publish(&update, t.elapsed().as_secs_f32())?;

        self.n_steps += 1;
        self.n_samples += batch.len();
        let mut record = update.record;
        record.insert("trainer_steps", RecordValue::Scalar(self.n_steps as f32));
        record.insert("datetime", RecordValue::DateTime(Local::now()));
        Ok(Some(record))
    }

    fn budget_spent(&self) -> bool {
        matches!(self.config.max_trainer_steps, Some(n) if self.n_steps >= n)
    }

    /// Takes steps until the stop signal, the step budget or the closing of
    /// the data server.
    pub fn run(mut self) -> Result<TrainerStat> {
        let t = Instant::now();
        let record_interval = self.config.record_interval.max(1);
        info!("Trainer started");

        let result = loop {
            if self.stop.is_stopped() || self.budget_spent() {
                break Ok(());
            }
            match self.step() {
                Ok(Some(record)) => {
                    self.recorder.store(record);
                    if self.n_steps % record_interval == 0 {
                        self.recorder.flush(self.n_steps as i64);
                    }
                }
                Ok(None) => break Ok(()),
                Err(e)
                    if matches!(
                        e.downcast_ref::<MavaError>(),
                        Some(MavaError::DataServerClosed)
                    ) =>
                {
                    debug!("Data server closed");
                    break Ok(());
                }
                Err(e) if self.stop.is_stopped() => {
                    debug!("Trainer interrupted by stop: {}", e);
                    break Ok(());
                }
                Err(e) => break Err(e),
            }
        };
        self.recorder.flush(self.n_steps as i64);

        let stat = TrainerStat {
            n_steps: self.n_steps,
            n_samples: self.n_samples,
            duration: t.elapsed(),
        };
        info!("Trainer stopped\n{}", stat.fmt());
        result.map(|_| stat)
    }
}

