//! Environment.
use super::{ActionSpec, Actions, AgentId, AgentSpec, EnvironmentSpec, ObservationSpec, TimeStep};
use anyhow::Result;
use std::collections::BTreeMap;

/// A multi-agent environment.
///
/// All agents act simultaneously: [`MultiAgentEnv::step`] takes one action per
/// agent and returns observations, rewards and discounts for every agent.
pub trait MultiAgentEnv {
    /// Configurations.
    type Config: Clone;

    /// Builds an environment with a given random seed.
    fn build(config: &Self::Config, seed: i64) -> Result<Self>
    where
        Self: Sized;

    /// Starts a new episode and returns its first time step.
    fn reset(&mut self) -> Result<TimeStep>;

    /// Performs an environment step with the actions of all agents.
    fn step(&mut self, actions: &Actions) -> Result<TimeStep>;

    /// Ids of agents in the environment.
    fn agents(&self) -> Vec<AgentId>;

    /// Action spaces of agents.
    fn action_spec(&self) -> BTreeMap<AgentId, ActionSpec>;

    /// Observation spaces of agents.
    fn observation_spec(&self) -> BTreeMap<AgentId, ObservationSpec>;

    /// Specification of the environment, combining action and observation spaces.
    fn environment_spec(&self) -> EnvironmentSpec {
        let mut actions = self.action_spec();
        let mut observations = self.observation_spec();
        let agents = self
            .agents()
            .into_iter()
            .filter_map(|id| {
                let action = actions.remove(&id)?;
                let observation = observations.remove(&id)?;
                Some((
                    id,
                    AgentSpec {
                        observation,
                        action,
                    },
                ))
            })
            .collect();
        EnvironmentSpec::new(agents)
    }
}
