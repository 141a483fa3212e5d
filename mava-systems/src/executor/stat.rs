use mava_core::AgentId;
use std::{collections::BTreeMap, time::Duration};

/// Summary of an episode run by [`EnvironmentLoop`](super::EnvironmentLoop).
#[derive(Clone, Debug, PartialEq)]
pub struct EpisodeStats {
    /// Sum of rewards over agents and steps.
    pub total_reward: f32,

    /// Sum of rewards over steps for each agent.
    pub returns: BTreeMap<AgentId, f32>,

    /// The number of environment steps.
    pub length: usize,

    /// Environment steps per second.
    pub steps_per_second: f32,
}

/// Stats of [`EnvironmentLoop::run`](super::EnvironmentLoop::run).
#[derive(Clone, Debug)]
pub struct ExecutorStat {
    /// The number of episodes.
    pub n_episodes: usize,

    /// The number of environment steps.
    pub n_steps: usize,

    /// Mean of the total rewards of episodes.
    pub mean_return: f32,

    /// Duration of the loop.
    pub duration: Duration,
}

impl ExecutorStat {
    /// Returns a formatted string.
    pub fn fmt(&self) -> String {
        let mut s = "episodes, steps, mean return, steps/sec, duration [sec]\n".to_string();
        let d = self.duration.as_secs_f32();
        s += format!(
            "{}, {}, {}, {}, {}\n",
            self.n_episodes,
            self.n_steps,
            self.mean_return,
            self.n_steps as f32 / d,
            d
        )
        .as_str();
        s
    }
}
