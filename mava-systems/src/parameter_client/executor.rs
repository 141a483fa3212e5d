use super::{ParameterClient, ParameterClientConfig};
use crate::parameter_server::ParameterServerHandle;
use anyhow::Result;
use mava_core::{
    parameters::{counters, network_parameters, network_variables, ParamValue, Parameters},
    Networks,
};

/// Parameter client of an executor or an evaluator.
///
/// Pulls the variables of the networks of the executor and pushes its step
/// and episode counters.
pub struct ExecutorParameterClient {
    client: ParameterClient,
    steps_counter: &'static str,
    episodes_counter: &'static str,
}

impl ExecutorParameterClient {
    /// Creates a client syncing the variables of `networks`.
    ///
    /// Counters are pushed to `evaluator_*` if `evaluator` is `true`,
    /// otherwise to `executor_*`.
    pub fn new(
        handle: ParameterServerHandle,
        networks: &Networks,
        evaluator: bool,
        config: ParameterClientConfig,
    ) -> Self {
        let names = network_parameters(networks).into_keys().collect();
        let (steps_counter, episodes_counter) = counters::executor_counters(evaluator);
        Self {
            client: ParameterClient::new(handle, names, config),
            steps_counter,
            episodes_counter,
        }
    }

    /// Copies cached variables into the networks.
    pub fn sync_policies(&self, networks: &mut Networks) -> Result<()> {
        for (net_key, network) in networks.iter_mut() {
            let variables = network_variables(net_key, self.client.parameters());
            if !variables.is_empty() {
                network.set_variables(&variables)?;
            }
        }
        Ok(())
    }

    /// Fetches variables, blocking, and copies them into the networks.
    pub fn get_and_wait(&mut self, networks: &mut Networks) -> Result<()> {
        self.client.get_and_wait()?;
        self.sync_policies(networks)
    }

    /// Called once per environment step; copies fresh variables into the networks.
    pub fn get_async(&mut self, networks: &mut Networks) -> Result<()> {
        if self.client.get_async()? {
            self.sync_policies(networks)?;
        }
        Ok(())
    }

    /// Counts environment steps and episodes.
    pub fn add_counts(&mut self, steps: i64, episodes: i64) -> Result<()> {
        self.client.add_async(Parameters::from([
            (self.steps_counter.to_string(), ParamValue::Counter(steps)),
            (self.episodes_counter.to_string(), ParamValue::Counter(episodes)),
        ]))
    }

    /// Sends remaining counts, blocking.
    pub fn flush_and_wait(&mut self) -> Result<()> {
        self.client.flush_and_wait()
    }

    /// Version of the cached variables.
    pub fn version(&self) -> Option<u64> {
        self.client.version()
    }
}
