//! Core functionalities.
mod env;
mod policy;
mod spec;
mod timestep;
mod updater;
pub use env::MultiAgentEnv;
pub use policy::{
    agent_net_keys, ActionDistribution, NetworkFactory, Networks, Policy, PolicyInfo,
};
pub use spec::{ActionSpec, AgentId, AgentSpec, EnvironmentSpec, ObservationSpec};
pub use timestep::{Action, Actions, Extras, Observation, StepType, TimeStep};
pub use updater::{ParameterUpdate, Updater};
