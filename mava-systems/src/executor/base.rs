use super::ExecutorConfig;
use crate::parameter_client::ExecutorParameterClient;
use anyhow::Result;
use log::trace;
use mava_core::{
    adder::ParallelAdder, agent_net_keys, ActionSpec, Actions, AgentId, EnvironmentSpec, Extras,
    MavaError, Networks, Observation, PolicyInfo, TimeStep,
};
use rand::{rngs::SmallRng, SeedableRng};
use std::collections::BTreeMap;

/// State of an [`Executor`] within an episode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutorState {
    /// Waiting for the first time step of an episode.
    AwaitingFirstObservation,

    /// Selecting actions within an episode.
    Acting,

    /// The last time step of an episode was observed.
    Terminated,
}

impl ExecutorState {
    /// Name of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AwaitingFirstObservation => "AwaitingFirstObservation",
            Self::Acting => "Acting",
            Self::Terminated => "Terminated",
        }
    }
}

/// Selects actions of all agents and forwards experience to an adder.
///
/// An executor without an adder is an evaluator: it acts with the same
/// policies but leaves the data server untouched, and pushes its counters to
/// `evaluator_steps` and `evaluator_episodes`.
pub struct Executor {
    networks: Networks,
    net_keys: BTreeMap<AgentId, String>,
    action_specs: BTreeMap<AgentId, ActionSpec>,
    adder: Option<Box<dyn ParallelAdder>>,
    client: Option<ExecutorParameterClient>,
    state: ExecutorState,
    rng: SmallRng,
}

impl Executor {
    /// Creates an executor acting with `networks`.
    pub fn new(
        config: &ExecutorConfig,
        spec: &EnvironmentSpec,
        networks: Networks,
        adder: Option<Box<dyn ParallelAdder>>,
        client: Option<ExecutorParameterClient>,
    ) -> Self {
        Self {
            networks,
            net_keys: agent_net_keys(spec, config.shared_weights),
            action_specs: spec.action_specs(),
            adder,
            client,
            state: ExecutorState::AwaitingFirstObservation,
            rng: SmallRng::seed_from_u64(config.seed),
        }
    }

    /// Current state.
    pub fn state(&self) -> ExecutorState {
        self.state
    }

    /// Returns `true` if the executor has no adder.
    pub fn is_evaluator(&self) -> bool {
        self.adder.is_none()
    }

    /// Networks of the executor.
    pub fn networks(&self) -> &Networks {
        &self.networks
    }

    /// Adder of the executor.
    pub fn adder(&self) -> Option<&dyn ParallelAdder> {
        self.adder.as_deref()
    }

    fn invalid_state(&self, operation: &str) -> MavaError {
        MavaError::InvalidExecutorState {
            state: self.state.name().to_string(),
            operation: operation.to_string(),
        }
    }

    /// Starts an episode.
    ///
    /// Resets per-episode state of the networks and passes the time step to
    /// the adder.
    pub fn observe_first(&mut self, timestep: &TimeStep) -> Result<()> {
        if self.state == ExecutorState::Acting {
            return Err(self.invalid_state("observe_first").into());
        }
        for network in self.networks.values_mut() {
            network.reset_state();
        }
        if let Some(adder) = self.adder.as_mut() {
            adder.add_first(timestep)?;
        }
        self.state = ExecutorState::Acting;
        Ok(())
    }

    /// Abandons the current episode, if any.
    ///
    /// The adder drops its unfinished episode; records it already wrote stay
    /// in the data server.
    pub fn reset(&mut self) {
        if let Some(adder) = self.adder.as_mut() {
            adder.reset();
        }
        self.state = ExecutorState::AwaitingFirstObservation;
    }

    /// Selects actions of all agents, in the order of agent ids.
    pub fn select_actions(
        &mut self,
        observations: &BTreeMap<AgentId, Observation>,
    ) -> Result<(Actions, BTreeMap<AgentId, PolicyInfo>)> {
        if self.state != ExecutorState::Acting {
            return Err(self.invalid_state("select_actions").into());
        }
        let mut actions = Actions::new();
        let mut infos = BTreeMap::new();
        for (id, obs) in observations.iter() {
            let unknown = || MavaError::UnknownAgent(id.clone());
            let network = self
                .net_keys
                .get(id)
                .and_then(|k| self.networks.get(k))
                .ok_or_else(unknown)?;
            let spec = self.action_specs.get(id).ok_or_else(unknown)?;
            let dist = network.action_distribution(obs)?;
            let (action, log_prob) = dist.sample(&mut self.rng, obs.legal_actions.as_deref())?;
            if !spec.contains(&action) {
                return Err(MavaError::ActionOutOfSpace {
                    agent: id.clone(),
                    action: format!("{:?}", action),
                    spec: format!("{:?}", spec),
                }
                .into());
            }
            trace!("{}: {:?} (log_prob {})", id, action, log_prob);
            actions.insert(id.clone(), action);
            infos.insert(id.clone(), PolicyInfo { log_prob });
        }
        Ok((actions, infos))
    }

    /// Observes the time step the actions led to.
    pub fn observe(
        &mut self,
        actions: &Actions,
        next_timestep: &TimeStep,
        extras: &Extras,
    ) -> Result<()> {
        if self.state != ExecutorState::Acting {
            return Err(self.invalid_state("observe").into());
        }
        if let Some(adder) = self.adder.as_mut() {
            adder.add(actions, next_timestep, extras)?;
        }
        if next_timestep.last() {
            self.state = ExecutorState::Terminated;
        }
        Ok(())
    }

    /// Refreshes the variables of the networks.
    ///
    /// Blocks until fresh variables arrive if `wait` is `true`, otherwise
    /// fetches them at most once per update period.
    pub fn update(&mut self, wait: bool) -> Result<()> {
        if let Some(client) = self.client.as_mut() {
            if wait {
                client.get_and_wait(&mut self.networks)?;
            } else {
                client.get_async(&mut self.networks)?;
            }
        }
        Ok(())
    }

    /// Counts environment steps and episodes on the parameter server.
    pub fn add_counts(&mut self, steps: usize, episodes: usize) -> Result<()> {
        if let Some(client) = self.client.as_mut() {
            client.add_counts(steps as i64, episodes as i64)?;
        }
        Ok(())
    }

    /// Sends remaining counts, blocking.
    pub fn flush(&mut self) -> Result<()> {
        if let Some(client) = self.client.as_mut() {
            client.flush_and_wait()?;
        }
        Ok(())
    }
}

/// Extras stored with a step: the log-probability of the action of each agent.
pub fn policy_extras(infos: &BTreeMap<AgentId, PolicyInfo>) -> Extras {
    infos
        .iter()
        .map(|(id, info)| {
            (
                id.clone(),
                BTreeMap::from([("log_prob".to_string(), info.log_prob)]),
            )
        })
        .collect()
}
