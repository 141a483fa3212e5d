//! Time steps of multi-agent environments.
use super::AgentId;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Position of a time step in an episode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepType {
    /// First time step of an episode, returned by `reset()`.
    First,

    /// Intermediate time step.
    Mid,

    /// Last time step of an episode.
    Last,
}

/// Action of a single agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Action {
    /// Index of a discrete action.
    Discrete(usize),

    /// Continuous action vector.
    Continuous(Vec<f32>),
}

/// Actions of all agents.
pub type Actions = BTreeMap<AgentId, Action>;

/// Extra values stored with a step, e.g., log-probabilities of actions.
pub type Extras = BTreeMap<AgentId, BTreeMap<String, f32>>;

/// Observation of a single agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Observation vector.
    pub observation: Array1<f32>,

    /// Mask of legal discrete actions, all actions are legal if `None`.
    pub legal_actions: Option<Vec<bool>>,
}

impl Observation {
    /// Observation without an action mask.
    pub fn new(observation: Array1<f32>) -> Self {
        Self {
            observation,
            legal_actions: None,
        }
    }

    /// All-zero observation of the same shape, used to pad sequences.
    pub fn zeros_like(&self) -> Self {
        Self {
            observation: Array1::zeros(self.observation.len()),
            legal_actions: self.legal_actions.as_ref().map(|m| vec![false; m.len()]),
        }
    }
}

/// A time step of a multi-agent environment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeStep {
    /// Position in the episode.
    pub step_type: StepType,

    /// Observations of agents.
    pub observations: BTreeMap<AgentId, Observation>,

    /// Rewards of agents. Zero on the first step.
    pub rewards: BTreeMap<AgentId, f32>,

    /// Discounts of agents. Zero on the last step of a terminated episode.
    pub discounts: BTreeMap<AgentId, f32>,
}

impl TimeStep {
    /// Returns `true` on the first step of an episode.
    pub fn first(&self) -> bool {
        self.step_type == StepType::First
    }

    /// Returns `true` on the last step of an episode.
    pub fn last(&self) -> bool {
        self.step_type == StepType::Last
    }

    /// Sum of rewards over agents.
    pub fn total_reward(&self) -> f32 {
        self.rewards.values().sum()
    }
}
