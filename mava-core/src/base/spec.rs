//! Specifications of multi-agent environments.
use super::Action;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier of an agent, e.g. `agent_0`.
///
/// Ids are ordered as strings, so `agent_10` comes before `agent_2`.
/// Environments with ten or more agents of a type should zero-pad the index
/// if the numeric order matters.
pub type AgentId = String;

/// Action space of a single agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ActionSpec {
    /// Actions `0..num_values`.
    Discrete {
        /// Number of actions.
        num_values: usize,
    },

    /// Real vectors bounded elementwise by `low` and `high`.
    Continuous {
        /// Lower bounds.
        low: Vec<f32>,
        /// Upper bounds.
        high: Vec<f32>,
    },
}

impl ActionSpec {
    /// Returns `true` if `action` lies in this action space.
    pub fn contains(&self, action: &Action) -> bool {
        match (self, action) {
            (ActionSpec::Discrete { num_values }, Action::Discrete(a)) => a < num_values,
            (ActionSpec::Continuous { low, high }, Action::Continuous(a)) => {
                a.len() == low.len()
                    && a.iter()
                        .zip(low.iter().zip(high.iter()))
                        .all(|(v, (l, h))| v.is_finite() && l <= v && v <= h)
            }
            _ => false,
        }
    }
}

/// Observation space of a single agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObservationSpec {
    /// Shape of the observation array.
    pub shape: Vec<usize>,
}

/// Specification of a single agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Observation space.
    pub observation: ObservationSpec,

    /// Action space.
    pub action: ActionSpec,
}

/// Specification of a multi-agent environment.
///
/// Agents are kept in the string order of their ids, which is the order in
/// which executors select actions, see [`AgentId`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSpec {
    agents: BTreeMap<AgentId, AgentSpec>,
}

impl EnvironmentSpec {
    /// Builds a specification from per-agent specs.
    pub fn new(agents: BTreeMap<AgentId, AgentSpec>) -> Self {
        Self { agents }
    }

    /// Agent ids in order.
    pub fn agent_ids(&self) -> Vec<AgentId> {
        self.agents.keys().cloned().collect()
    }

    /// Spec of the given agent.
    pub fn agent(&self, id: &str) -> Option<&AgentSpec> {
        self.agents.get(id)
    }

    /// Iterates over agents and their specs.
    pub fn iter(&self) -> impl Iterator<Item = (&AgentId, &AgentSpec)> {
        self.agents.iter()
    }

    /// Action specs keyed by agent id.
    pub fn action_specs(&self) -> BTreeMap<AgentId, ActionSpec> {
        self.agents
            .iter()
            .map(|(id, spec)| (id.clone(), spec.action.clone()))
            .collect()
    }
}

/// Returns the type of an agent, `agent` for `agent_0`.
///
/// The type is the id up to the last underscore.
pub fn agent_type(id: &str) -> String {
    match id.rsplit_once('_') {
        Some((ty, _)) => ty.to_string(),
        None => id.to_string(),
    }
}
