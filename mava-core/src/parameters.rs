//! Named parameters shared between components.
//!
//! The parameter server owns a [`ParameterStore`]; executors and trainers see
//! copies of it as [`ParameterSnapshot`]s. Network variables are named
//! `<network key>/<variable>`, see [`variable_name`].
mod store;
mod value;
pub use store::{ParameterSnapshot, ParameterStore};
pub use value::ParamValue;

use crate::Networks;
use std::collections::BTreeMap;

/// Parameter values keyed by name.
pub type Parameters = BTreeMap<String, ParamValue>;

/// Name of the variable `var` of the network `net_key` in the parameter store.
pub fn variable_name(net_key: &str, var: &str) -> String {
    format!("{}/{}", net_key, var)
}

/// Counters tracked by the parameter server.
pub mod counters {
    use super::{ParamValue, Parameters};

    /// Number of trainer steps.
    pub const TRAINER_STEPS: &str = "trainer_steps";
    /// Seconds spent in trainer steps.
    pub const TRAINER_WALLTIME: &str = "trainer_walltime";
    /// Number of environment steps of executors.
    pub const EXECUTOR_STEPS: &str = "executor_steps";
    /// Number of episodes of executors.
    pub const EXECUTOR_EPISODES: &str = "executor_episodes";
    /// Number of environment steps of evaluators.
    pub const EVALUATOR_STEPS: &str = "evaluator_steps";
    /// Number of episodes of evaluators.
    pub const EVALUATOR_EPISODES: &str = "evaluator_episodes";

    /// All counters, registered with value zero.
    pub fn default_counters() -> Parameters {
        Parameters::from([
            (TRAINER_STEPS.to_string(), ParamValue::Counter(0)),
            (TRAINER_WALLTIME.to_string(), ParamValue::scalar(0.0)),
            (EXECUTOR_STEPS.to_string(), ParamValue::Counter(0)),
            (EXECUTOR_EPISODES.to_string(), ParamValue::Counter(0)),
            (EVALUATOR_STEPS.to_string(), ParamValue::Counter(0)),
            (EVALUATOR_EPISODES.to_string(), ParamValue::Counter(0)),
        ])
    }

    /// Step and episode counter names of an executor or an evaluator.
    pub fn executor_counters(evaluator: bool) -> (&'static str, &'static str) {
        if evaluator {
            (EVALUATOR_STEPS, EVALUATOR_EPISODES)
        } else {
            (EXECUTOR_STEPS, EXECUTOR_EPISODES)
        }
    }
}

/// Collects the variables of networks under their parameter names.
pub fn network_parameters(networks: &Networks) -> Parameters {
    let mut params = BTreeMap::new();
    for (net_key, network) in networks.iter() {
        for (var, value) in network.variables() {
            params.insert(variable_name(net_key, &var), value);
        }
    }
    params
}

/// Variables of the network `net_key` in `params`, keyed by variable name.
pub fn network_variables(net_key: &str, params: &Parameters) -> Parameters {
    let prefix = format!("{}/", net_key);
    params
        .iter()
        .filter_map(|(name, value)| {
            name.strip_prefix(&prefix)
                .map(|var| (var.to_string(), value.clone()))
        })
        .collect()
}
