use super::{policy_extras, EpisodeStats, Executor, ExecutorStat, ExecutorState};
use crate::StopSignal;
use anyhow::Result;
use chrono::Local;
use log::{debug, info, warn};
use mava_core::{
    record::{NullRecorder, Record, RecordValue, Recorder},
    AgentId, MultiAgentEnv,
};
use std::{collections::BTreeMap, time::Instant};

/// Runs episodes of an [`Executor`] in an environment.
///
/// Every environment step the executor refreshes its networks without
/// blocking; every episode its step and episode counts are pushed to the
/// parameter server.
pub struct EnvironmentLoop<E: MultiAgentEnv> {
    env: E,
    executor: Executor,
    stop: StopSignal,
    max_episodes: Option<usize>,
    record_interval: usize,
    recorder: Box<dyn Recorder>,
    n_episodes: usize,
    n_steps: usize,
    sum_return: f32,
}

impl<E: MultiAgentEnv> EnvironmentLoop<E> {
    /// Creates a loop running at most `max_episodes` episodes.
    pub fn new(env: E, executor: Executor, stop: StopSignal, max_episodes: Option<usize>) -> Self {
        Self {
            env,
            executor,
            stop,
            max_episodes,
            record_interval: 10,
            recorder: Box::new(NullRecorder {}),
            n_episodes: 0,
            n_steps: 0,
            sum_return: 0.0,
        }
    }

    /// Sets the recorder of episode records.
    pub fn recorder(mut self, recorder: Box<dyn Recorder>) -> Self {
        self.recorder = recorder;
        self
    }

    /// Sets the interval of flushing records in episodes.
    pub fn record_interval(mut self, v: usize) -> Self {
        self.record_interval = v.max(1);
        self
    }

    /// The executor.
    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// The executor, mutably.
    pub fn executor_mut(&mut self) -> &mut Executor {
        &mut self.executor
    }

    /// The environment.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// The number of episodes run so far.
    pub fn n_episodes(&self) -> usize {
        self.n_episodes
    }

    /// Runs an episode until its last time step.
    ///
    /// An episode left unfinished by the executor, e.g., after a failed
    /// environment step, is abandoned first.
    pub fn run_episode(&mut self) -> Result<EpisodeStats> {
        let t = Instant::now();
        if self.executor.state() == ExecutorState::Acting {
            warn!("Abandon an unfinished episode");
            self.executor.reset();
        }
        let mut timestep = self.env.reset()?;
        self.executor.observe_first(&timestep)?;

        let mut returns: BTreeMap<AgentId, f32> =
            timestep.observations.keys().map(|id| (id.clone(), 0.0)).collect();
        let mut length = 0;
        while !timestep.last() {
            self.executor.update(false)?;
            let (actions, infos) = self.executor.select_actions(&timestep.observations)?;
            let next_timestep = self.env.step(&actions)?;
            self.executor
                .observe(&actions, &next_timestep, &policy_extras(&infos))?;
            for (id, r) in next_timestep.rewards.iter() {
                *returns.entry(id.clone()).or_insert(0.0) += r;
            }
            length += 1;
            timestep = next_timestep;
        }
        self.executor.add_counts(length, 1)?;

        let secs = t.elapsed().as_secs_f32();
        let stats = EpisodeStats {
            total_reward: returns.values().sum(),
            returns,
            length,
            steps_per_second: if secs > 0.0 { length as f32 / secs } else { 0.0 },
        };
        self.n_episodes += 1;
        self.n_steps += length;
        self.sum_return += stats.total_reward;
        self.record(&stats);
        Ok(stats)
    }

    fn record(&mut self, stats: &EpisodeStats) {
        let mut record = Record::from_slice(&[
            ("episode_return", RecordValue::Scalar(stats.total_reward)),
            ("episode_length", RecordValue::Scalar(stats.length as f32)),
            ("steps_per_second", RecordValue::Scalar(stats.steps_per_second)),
            ("datetime", RecordValue::DateTime(Local::now())),
        ]);
        for (id, r) in stats.returns.iter() {
            record.insert(format!("return_{}", id), RecordValue::Scalar(*r));
        }
        self.recorder.store(record);
        if self.n_episodes % self.record_interval == 0 {
            self.recorder.flush(self.n_episodes as i64);
        }
    }

    /// Lazy iterator of episodes.
    ///
    /// Ends when the episode budget is spent, the stop signal is raised or
    /// after the first failed episode.
    pub fn episodes(&mut self) -> Episodes<'_, E> {
        Episodes {
            inner: self,
            failed: false,
        }
    }

    /// Runs episodes until the budget is spent or the stop signal is raised.
    ///
    /// Failures after the stop signal was raised end the loop normally: the
    /// parameter server may already be gone.
    pub fn run(mut self) -> Result<ExecutorStat> {
        let t = Instant::now();
        let label = if self.executor.is_evaluator() {
            "Evaluator"
        } else {
            "Executor"
        };
        info!("{} started", label);

        let result = self.run_inner();
        let result = match result {
            Err(e) if self.stop.is_stopped() => {
                debug!("{} interrupted by stop: {}", label, e);
                Ok(())
            }
            r => r,
        };
        if let Err(e) = self.executor.flush() {
            warn!("{} could not send its last counts: {}", label, e);
        }
        self.recorder.flush(self.n_episodes as i64);

        let stat = ExecutorStat {
            n_episodes: self.n_episodes,
            n_steps: self.n_steps,
            mean_return: if self.n_episodes > 0 {
                self.sum_return / self.n_episodes as f32
            } else {
                0.0
            },
            duration: t.elapsed(),
        };
        info!("{} stopped\n{}", label, stat.fmt());
        result.map(|_| stat)
    }

    fn run_inner(&mut self) -> Result<()> {
        self.executor.update(true)?;
        for episode in self.episodes() {
            episode?;
        }
        Ok(())
    }
}

/// Iterator of episodes, see [`EnvironmentLoop::episodes`].
pub struct Episodes<'a, E: MultiAgentEnv> {
    inner: &'a mut EnvironmentLoop<E>,
    failed: bool,
}

impl<'a, E: MultiAgentEnv> Iterator for Episodes<'a, E> {
    type Item = Result<EpisodeStats>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.inner.stop.is_stopped() {
            return None;
        }
        if let Some(n) = self.inner.max_episodes {
            if self.inner.n_episodes >= n {
                return None;
            }
        }
        let episode = self.inner.run_episode();
        self.failed = episode.is_err();
        Some(episode)
    }
}
