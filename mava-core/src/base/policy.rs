//! Policy.
use super::{spec::agent_type, Action, AgentId, EnvironmentSpec, Observation};
use crate::parameters::Parameters;
use anyhow::{bail, ensure, Result};
use rand::{distributions::WeightedIndex, prelude::Distribution, Rng};
use rand_distr::Normal;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};

/// A policy network of one or more agents.
///
/// The network maps an observation to a distribution over actions. Its
/// trainable variables are exchanged with the parameter server by name.
pub trait Policy: Send {
    /// Distribution over actions given an observation.
    fn action_distribution(&self, obs: &Observation) -> Result<ActionDistribution>;

    /// Current values of the variables of the network.
    fn variables(&self) -> Parameters;

    /// Overwrites the variables of the network.
    ///
    /// Names not in `variables` are left unchanged.
    fn set_variables(&mut self, variables: &Parameters) -> Result<()>;

    /// Resets per-episode state, e.g., hidden state of a recurrent network.
    fn reset_state(&mut self) {}
}

/// Networks keyed by network key, see [`agent_net_keys`].
pub type Networks = BTreeMap<String, Box<dyn Policy>>;

/// Builds the networks of a system from the spec of its environment.
pub type NetworkFactory = Arc<dyn Fn(&EnvironmentSpec) -> Result<Networks> + Send + Sync>;

/// Assigns a network key to each agent.
///
/// With shared weights all agents of the same type use `network_<type>`,
/// otherwise every agent has its own `network_<id>`.
pub fn agent_net_keys(spec: &EnvironmentSpec, shared_weights: bool) -> BTreeMap<AgentId, String> {
    spec.agent_ids()
        .into_iter()
        .map(|id| {
            let key = if shared_weights {
                format!("network_{}", agent_type(&id))
            } else {
                format!("network_{}", id)
            };
            (id, key)
        })
        .collect()
}

/// Information on a selected action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicyInfo {
    /// Log-probability of the action under the policy.
    pub log_prob: f32,
}

/// Distribution over the actions of a single agent.
#[derive(Clone, Debug, PartialEq)]
pub enum ActionDistribution {
    /// Categorical distribution over discrete actions.
    Categorical {
        /// Probabilities of actions.
        probs: Vec<f32>,
    },

    /// Gaussian squashed into a box with `tanh`.
    SquashedGaussian {
        /// Mean before squashing.
        mean: Vec<f32>,
        /// Standard deviation before squashing.
        std: Vec<f32>,
        /// Lower bounds of the box.
        low: Vec<f32>,
        /// Upper bounds of the box.
        high: Vec<f32>,
    },
}

impl ActionDistribution {
    /// Samples an action and returns it with its log-probability.
    ///
    /// Illegal actions in `legal_actions` have zero probability. Fails if the
    /// vectors of the distribution, or the mask, differ in length.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        legal_actions: Option<&[bool]>,
    ) -> Result<(Action, f32)> {
        match self {
            Self::Categorical { probs } => {
                let probs = masked_probs(probs, legal_actions)?;
                let ix = WeightedIndex::new(&probs)?.sample(rng);
                Ok((Action::Discrete(ix), probs[ix].ln()))
            }
            Self::SquashedGaussian {
                mean,
                std,
                low,
                high,
            } => {
                ensure!(
                    std.len() == mean.len() && low.len() == mean.len() && high.len() == mean.len(),
                    "Gaussian of dimension {} with {} stds, {} lower and {} upper bounds",
                    mean.len(),
                    std.len(),
                    low.len(),
                    high.len()
                );
                let mut action = Vec::with_capacity(mean.len());
                let mut log_prob = 0f32;
                for i in 0..mean.len() {
                    let normal = Normal::new(mean[i], std[i])?;
                    let u: f32 = normal.sample(rng);
                    let t = u.tanh();
                    let half = 0.5 * (high[i] - low[i]);
                    action.push((low[i] + (t + 1.0) * half).clamp(low[i], high[i]));
                    log_prob += normal_log_pdf(u, mean[i], std[i])
                        - (half * (1.0 - t * t) + 1e-6).ln();
                }
                Ok((Action::Continuous(action), log_prob))
            }
        }
    }
}

fn masked_probs(probs: &[f32], legal_actions: Option<&[bool]>) -> Result<Vec<f32>> {
    let probs: Vec<f32> = match legal_actions {
        None => probs.to_vec(),
        Some(mask) => {
            ensure!(
                mask.len() == probs.len(),
                "Mask of {} legal actions for {} probabilities",
                mask.len(),
                probs.len()
            );
            probs
                .iter()
                .zip(mask.iter())
                .map(|(p, &legal)| if legal { *p } else { 0.0 })
                .collect()
        }
    };
    let sum: f32 = probs.iter().sum();
    if !(sum > 0.0) {
        bail!("No legal action with positive probability");
    }
    Ok(probs.into_iter().map(|p| p / sum).collect())
}

fn normal_log_pdf(x: f32, mean: f32, std: f32) -> f32 {
    let z = (x - mean) / std;
    -0.5 * z * z - std.ln() - 0.5 * (2.0 * std::f32::consts::PI).ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{ActionSpec, AgentSpec, ObservationSpec};
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_categorical_respects_mask() -> Result<()> {
        let dist = ActionDistribution::Categorical {
            probs: vec![0.5, 0.3, 0.2],
        };
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            let (action, log_prob) = dist.sample(&mut rng, Some(&[false, true, false][..]))?;
            assert_eq!(action, Action::Discrete(1));
            assert!(log_prob.abs() < 1e-6);
        }
        Ok(())
    }

    #[test]
    fn test_categorical_without_legal_action() {
        let dist = ActionDistribution::Categorical {
            probs: vec![0.0, 1.0],
        };
        let mut rng = StdRng::seed_from_u64(42);
        assert!(dist.sample(&mut rng, Some(&[true, false][..])).is_err());
    }

    #[test]
    fn test_squashed_gaussian_in_bounds() -> Result<()> {
        let spec = ActionSpec::Continuous {
            low: vec![-2.0, 0.0],
            high: vec![2.0, 1.0],
        };
        let dist = ActionDistribution::SquashedGaussian {
            mean: vec![0.0, 5.0],
            std: vec![3.0, 1.0],
            low: vec![-2.0, 0.0],
            high: vec![2.0, 1.0],
        };
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..100 {
            let (action, log_prob) = dist.sample(&mut rng, None)?;
            assert!(spec.contains(&action));
            assert!(log_prob.is_finite());
        }
        Ok(())
    }

    #[test]
    fn test_mismatched_lengths_are_errors() {
        let mut rng = StdRng::seed_from_u64(0);
        let dist = ActionDistribution::SquashedGaussian {
            mean: vec![0.0, 0.0],
            std: vec![1.0],
            low: vec![-1.0, -1.0],
            high: vec![1.0, 1.0],
        };
        assert!(dist.sample(&mut rng, None).is_err());

        let dist = ActionDistribution::SquashedGaussian {
            mean: vec![0.0],
            std: vec![1.0],
            low: vec![-1.0],
            high: vec![],
        };
        assert!(dist.sample(&mut rng, None).is_err());

        let dist = ActionDistribution::Categorical {
            probs: vec![0.5, 0.5],
        };
        assert!(dist.sample(&mut rng, Some(&[true][..])).is_err());
        assert!(dist.sample(&mut rng, Some(&[true, true, false][..])).is_err());
    }

    #[test]
    fn test_agent_net_keys() {
        let agent = AgentSpec {
            observation: ObservationSpec { shape: vec![1] },
            action: ActionSpec::Discrete { num_values: 2 },
        };
        let spec = EnvironmentSpec::new(BTreeMap::from([
            ("agent_0".to_string(), agent.clone()),
            ("agent_1".to_string(), agent),
        ]));

        let shared = agent_net_keys(&spec, true);
        assert_eq!(shared["agent_0"], "network_agent");
        assert_eq!(shared["agent_1"], "network_agent");

        let separate = agent_net_keys(&spec, false);
        assert_eq!(separate["agent_0"], "network_agent_0");
        assert_eq!(separate["agent_1"], "network_agent_1");
    }
}
