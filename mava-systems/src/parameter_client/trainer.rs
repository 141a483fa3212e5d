use super::{ParameterClient, ParameterClientConfig};
use crate::parameter_server::ParameterServerHandle;
use anyhow::Result;
use mava_core::{
    parameters::{counters, ParamValue, Parameters},
    ParameterUpdate,
};

/// Parameter client of a trainer.
///
/// Reads the parameters of an update rule and publishes updates together
/// with the trainer counters.
pub struct TrainerParameterClient {
    client: ParameterClient,
    update_period: usize,
    steps_since_get: usize,
}

impl TrainerParameterClient {
    /// Creates a client reading the named parameters.
    pub fn new(
        handle: ParameterServerHandle,
        names: Vec<String>,
        config: ParameterClientConfig,
    ) -> Self {
        let update_period = config.update_period.max(1);
        Self {
            client: ParameterClient::new(handle, names, config),
            update_period,
            steps_since_get: 0,
        }
    }

    /// Fetches parameters, blocking.
    pub fn get_and_wait(&mut self) -> Result<()> {
        self.steps_since_get = 0;
        self.client.get_and_wait()
    }

    /// Called once per trainer step; fetches parameters every `update_period` calls.
    pub fn refresh(&mut self) -> Result<()> {
        self.steps_since_get += 1;
        if self.client.version().is_none() || self.steps_since_get >= self.update_period {
            self.get_and_wait()?;
        }
        Ok(())
    }

    /// Cached parameters.
    pub fn parameters(&self) -> &Parameters {
        self.client.parameters()
    }

    /// Publishes an update and counts one trainer step taking `walltime` seconds.
    pub fn publish(&mut self, update: &ParameterUpdate, walltime: f32) -> Result<()> {
        if !update.set.is_empty() {
            self.client.set_and_wait(update.set.clone())?;
        }
        let mut add = update.add.clone();
        add.insert(
            counters::TRAINER_STEPS.to_string(),
            ParamValue::Counter(1),
        );
        add.insert(
            counters::TRAINER_WALLTIME.to_string(),
            ParamValue::scalar(walltime),
        );
        self.client.add_and_wait(add)?;
        Ok(())
    }
}
