//! Small collaborators for tests and demos.
//!
//! [`DebuggingEnv`] is a multi-agent bandit: at every step each agent sees a
//! random vector and is rewarded for choosing the index of its largest
//! entry. [`LinearPolicy`] and [`ReinforceUpdater`] learn it with a softmax
//! policy and the REINFORCE rule.
use crate::{
    adder::Transition,
    base::{
        agent_net_keys, Action, ActionDistribution, ActionSpec, Actions, AgentId,
        EnvironmentSpec, MultiAgentEnv, NetworkFactory, Networks, Observation, ObservationSpec,
        ParameterUpdate, Policy, StepType, TimeStep, Updater,
    },
    data_server::Batch,
    error::MavaError,
    parameters::{variable_name, ParamValue, Parameters},
    record::{Record, RecordValue},
};
use anyhow::{bail, ensure, Context, Result};
use ndarray::{Array1, Array2, Axis, Ix1, Ix2};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};

/// Configuration of [`DebuggingEnv`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DebuggingEnvConfig {
    /// Number of agents, named `agent_0`, `agent_1`, ...
    pub num_agents: usize,

    /// Number of discrete actions of every agent.
    pub num_actions: usize,

    /// Dimension of observations, at least `num_actions`.
    pub obs_dim: usize,

    /// Number of steps in an episode.
    pub episode_length: usize,
}

impl Default for DebuggingEnvConfig {
    fn default() -> Self {
        Self {
            num_agents: 3,
            num_actions: 2,
            obs_dim: 4,
            episode_length: 10,
        }
    }
}

impl DebuggingEnvConfig {
    /// Sets the number of agents.
    pub fn num_agents(mut self, v: usize) -> Self {
        self.num_agents = v;
        self
    }

    /// Sets the number of actions.
    pub fn num_actions(mut self, v: usize) -> Self {
        self.num_actions = v;
        self
    }

    /// Sets the dimension of observations.
    pub fn obs_dim(mut self, v: usize) -> Self {
        self.obs_dim = v;
        self
    }

    /// Sets the episode length.
    pub fn episode_length(mut self, v: usize) -> Self {
        self.episode_length = v;
        self
    }
}

/// Multi-agent bandit with episodes of fixed length.
pub struct DebuggingEnv {
    config: DebuggingEnvConfig,
    agents: Vec<AgentId>,
    rng: StdRng,
    t: usize,
    observations: BTreeMap<AgentId, Observation>,
}

impl DebuggingEnv {
    fn observe(&mut self) -> BTreeMap<AgentId, Observation> {
        let dim = self.config.obs_dim;
        let mut observations = BTreeMap::new();
        for id in self.agents.iter() {
            let x: Array1<f32> = (0..dim).map(|_| self.rng.gen_range(-1.0f32..1.0)).collect();
            observations.insert(id.clone(), Observation::new(x));
        }
        self.observations = observations.clone();
        observations
    }

    fn per_agent(&self, v: f32) -> BTreeMap<AgentId, f32> {
        self.agents.iter().map(|id| (id.clone(), v)).collect()
    }

    /// Index of the rewarded action for an observation.
    pub fn target(&self, obs: &Observation) -> usize {
        obs.observation
            .iter()
            .take(self.config.num_actions)
            .enumerate()
            .fold((0, f32::MIN), |best, (i, &x)| if x > best.1 { (i, x) } else { best })
            .0
    }
}

impl MultiAgentEnv for DebuggingEnv {
    type Config = DebuggingEnvConfig;

    fn build(config: &Self::Config, seed: i64) -> Result<Self> {
        ensure!(config.num_agents > 0, "num_agents must be positive");
        ensure!(config.num_actions > 0, "num_actions must be positive");
        ensure!(
            config.obs_dim >= config.num_actions,
            "obs_dim must be at least num_actions"
        );
        ensure!(config.episode_length > 0, "episode_length must be positive");
        Ok(Self {
            config: config.clone(),
            agents: (0..config.num_agents)
                .map(|i| format!("agent_{}", i))
                .collect(),
            rng: StdRng::seed_from_u64(seed as u64),
            t: 0,
            observations: BTreeMap::new(),
        })
    }

    fn reset(&mut self) -> Result<TimeStep> {
        self.t = 0;
        Ok(TimeStep {
            step_type: StepType::First,
            observations: self.observe(),
            rewards: self.per_agent(0.0),
            discounts: self.per_agent(1.0),
        })
    }

    fn step(&mut self, actions: &Actions) -> Result<TimeStep> {
        let mut rewards = BTreeMap::new();
        for (id, obs) in self.observations.iter() {
            let reward = match actions.get(id) {
                Some(Action::Discrete(a)) if *a == self.target(obs) => 1.0,
                Some(Action::Discrete(_)) => 0.0,
                Some(a) => bail!("Discrete action expected for {}, got {:?}", id, a),
                None => return Err(MavaError::UnknownAgent(id.clone()).into()),
            };
            rewards.insert(id.clone(), reward);
        }

        self.t += 1;
        let last = self.t >= self.config.episode_length;
        Ok(TimeStep {
            step_type: if last { StepType::Last } else { StepType::Mid },
            observations: self.observe(),
            rewards,
            discounts: self.per_agent(if last { 0.0 } else { 1.0 }),
        })
    }

    fn agents(&self) -> Vec<AgentId> {
        self.agents.clone()
    }

    fn action_spec(&self) -> BTreeMap<AgentId, ActionSpec> {
        self.agents
            .iter()
            .map(|id| {
                (
                    id.clone(),
                    ActionSpec::Discrete {
                        num_values: self.config.num_actions,
                    },
                )
            })
            .collect()
    }

    fn observation_spec(&self) -> BTreeMap<AgentId, ObservationSpec> {
        self.agents
            .iter()
            .map(|id| {
                (
                    id.clone(),
                    ObservationSpec {
                        shape: vec![self.config.obs_dim],
                    },
                )
            })
            .collect()
    }
}

/// Softmax policy with linear logits `weights . obs + bias`.
pub struct LinearPolicy {
    weights: Array2<f32>,
    bias: Array1<f32>,
}

impl LinearPolicy {
    /// Policy with zero parameters, i.e., uniform over actions.
    pub fn zeros(num_actions: usize, obs_dim: usize) -> Self {
        Self {
            weights: Array2::zeros((num_actions, obs_dim)),
            bias: Array1::zeros(num_actions),
        }
    }

    fn from_variables(variables: &Parameters) -> Result<Self> {
        let array = |name: &str| {
            variables
                .get(name)
                .and_then(ParamValue::as_array)
                .cloned()
                .ok_or_else(|| MavaError::UnknownParameter(name.to_string()))
        };
        Ok(Self {
            weights: array("weights")?.into_dimensionality::<Ix2>()?,
            bias: array("bias")?.into_dimensionality::<Ix1>()?,
        })
    }

    fn probs(&self, x: &Array1<f32>) -> Vec<f32> {
        let logits = self.weights.dot(x) + &self.bias;
        let max = logits.fold(f32::MIN, |m, &v| m.max(v));
        let exp = logits.mapv(|v| (v - max).exp());
        let sum = exp.sum();
        exp.iter().map(|v| v / sum).collect()
    }
}

impl Policy for LinearPolicy {
    fn action_distribution(&self, obs: &Observation) -> Result<ActionDistribution> {
        ensure!(
            obs.observation.len() == self.weights.ncols(),
            "observation of length {} given to a policy of input size {}",
            obs.observation.len(),
            self.weights.ncols()
        );
        Ok(ActionDistribution::Categorical {
            probs: self.probs(&obs.observation),
        })
    }

    fn variables(&self) -> Parameters {
        Parameters::from([
            (
                "weights".to_string(),
                ParamValue::Array(self.weights.clone().into_dyn()),
            ),
            (
                "bias".to_string(),
                ParamValue::Array(self.bias.clone().into_dyn()),
            ),
        ])
    }

    fn set_variables(&mut self, variables: &Parameters) -> Result<()> {
        let mut merged = self.variables();
        for (name, value) in variables.iter() {
            if let Some(current) = merged.get_mut(name) {
                current.check_compatible(name, value)?;
                *current = value.clone();
            }
        }
        *self = Self::from_variables(&merged)?;
        Ok(())
    }
}

fn discrete_dims(spec: &EnvironmentSpec, id: &str) -> Result<(usize, usize)> {
    let agent = spec
        .agent(id)
        .ok_or_else(|| MavaError::UnknownAgent(id.to_string()))?;
    let num_actions = match agent.action {
        ActionSpec::Discrete { num_values } => num_values,
        ActionSpec::Continuous { .. } => bail!("Linear policy requires discrete actions"),
    };
    let obs_dim = agent.observation.shape.iter().product();
    Ok((num_actions, obs_dim))
}

/// Factory of [`LinearPolicy`] networks, one per network key.
pub fn make_debugging_networks(shared_weights: bool) -> NetworkFactory {
    Arc::new(move |spec: &EnvironmentSpec| -> Result<Networks> {
        let mut networks = Networks::new();
        for (id, net_key) in agent_net_keys(spec, shared_weights) {
            if networks.contains_key(&net_key) {
                continue;
            }
            let (num_actions, obs_dim) = discrete_dims(spec, &id)?;
            networks.insert(
                net_key,
                Box::new(LinearPolicy::zeros(num_actions, obs_dim)) as Box<dyn Policy>,
            );
        }
        Ok(networks)
    })
}

/// One-step REINFORCE on [`Transition`]s for [`LinearPolicy`] networks.
///
/// The update adds `learning_rate * mean(reward * grad log pi(a|s))` to the
/// variables of every network.
pub struct ReinforceUpdater {
    net_keys: BTreeMap<AgentId, String>,
    learning_rate: f32,
}

impl ReinforceUpdater {
    /// Creates an updater for the networks of an environment.
    pub fn new(spec: &EnvironmentSpec, shared_weights: bool, learning_rate: f32) -> Self {
        Self {
            net_keys: agent_net_keys(spec, shared_weights),
            learning_rate,
        }
    }
}

impl Updater<Transition> for ReinforceUpdater {
    fn parameter_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .net_keys
            .values()
            .flat_map(|k| [variable_name(k, "weights"), variable_name(k, "bias")])
            .collect();
        names.sort();
        names.dedup();
        names
    }

    fn update(
        &mut self,
        batch: &Batch<Transition>,
        parameters: &Parameters,
    ) -> Result<ParameterUpdate> {
        let mut grads: BTreeMap<String, (Array2<f32>, Array1<f32>, LinearPolicy, usize)> =
            BTreeMap::new();
        for net_key in self.net_keys.values() {
            if grads.contains_key(net_key) {
                continue;
            }
            let variables = crate::parameters::network_variables(net_key, parameters);
            let policy = LinearPolicy::from_variables(&variables)
                .with_context(|| format!("Variables of {}", net_key))?;
            grads.insert(
                net_key.clone(),
                (
                    Array2::zeros(policy.weights.raw_dim()),
                    Array1::zeros(policy.bias.raw_dim()),
                    policy,
                    0,
                ),
            );
        }

        let mut n = 0usize;
        let mut reward_sum = 0f32;
        for transition in batch.iter() {
            for (id, net_key) in self.net_keys.iter() {
                let (obs, action, reward) = match (
                    transition.observations.get(id),
                    transition.actions.get(id),
                    transition.rewards.get(id),
                ) {
                    (Some(o), Some(Action::Discrete(a)), Some(r)) => (o, *a, *r),
                    _ => continue,
                };
                if let Some((gw, gb, policy, count)) = grads.get_mut(net_key) {
                    let x = &obs.observation;
                    if action >= gb.len() || x.len() != gw.ncols() {
                        bail!("Transition of {} does not fit network {}", id, net_key);
                    }
                    let mut d: Array1<f32> = Array1::from(policy.probs(x)).mapv(|p| -p);
                    d[action] += 1.0;
                    d *= reward;
                    let outer = d
                        .view()
                        .insert_axis(Axis(1))
                        .dot(&x.view().insert_axis(Axis(0)));
                    *gw += &outer;
                    *gb += &d;
                    *count += 1;
                }
                n += 1;
                reward_sum += reward;
            }
        }

        let mut add = Parameters::new();
        for (net_key, (gw, gb, _, count)) in grads {
            let scale = if count > 0 {
                self.learning_rate / count as f32
            } else {
                0.0
            };
            add.insert(
                variable_name(&net_key, "weights"),
                ParamValue::Array((gw * scale).into_dyn()),
            );
            add.insert(
                variable_name(&net_key, "bias"),
                ParamValue::Array((gb * scale).into_dyn()),
            );
        }

        let mean_reward = if n > 0 { reward_sum / n as f32 } else { 0.0 };
        Ok(ParameterUpdate {
            set: Parameters::new(),
            add,
            record: Record::from_slice(&[
                ("mean_reward", RecordValue::Scalar(mean_reward)),
                ("n_samples", RecordValue::Scalar(n as f32)),
            ]),
        })
    }
}
