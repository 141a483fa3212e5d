//! Executors and evaluators interacting with environments.
mod base;
mod config;
mod environment_loop;
mod stat;
pub use base::{policy_extras, Executor, ExecutorState};
pub use config::ExecutorConfig;
pub use environment_loop::{EnvironmentLoop, Episodes};
pub use stat::{EpisodeStats, ExecutorStat};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StopSignal;
    use anyhow::{bail, Result};
    use mava_core::{
        adder::ParallelAdder,
        debugging::{make_debugging_networks, DebuggingEnv, DebuggingEnvConfig},
        parameters::Parameters,
        Action, ActionDistribution, ActionSpec, Actions, AgentId, Extras, MavaError,
        MultiAgentEnv, Networks, Observation, ObservationSpec, Policy, TimeStep,
    };
    use std::{
        collections::BTreeMap,
        sync::{Arc, Mutex},
    };
    use test_log::test;

    #[derive(Default)]
    struct Counts {
        first: usize,
        add: usize,
        episodes: usize,
        resets: usize,
    }

    struct CountingAdder(Arc<Mutex<Counts>>);

    impl ParallelAdder for CountingAdder {
        fn add_first(&mut self, _timestep: &TimeStep) -> Result<()> {
            self.0.lock().unwrap().first += 1;
            Ok(())
        }

        fn add(&mut self, _actions: &Actions, next: &TimeStep, _extras: &Extras) -> Result<()> {
            let mut c = self.0.lock().unwrap();
            c.add += 1;
            if next.last() {
                c.episodes += 1;
            }
            Ok(())
        }

        fn reset(&mut self) {
            self.0.lock().unwrap().resets += 1;
        }

        fn episodes(&self) -> usize {
            self.0.lock().unwrap().episodes
        }
    }

    /// Debugging environment whose step fails once, at a given step.
    struct FlakyEnv {
        inner: DebuggingEnv,
        fail_at_step: Option<usize>,
        n_steps: usize,
    }

    impl MultiAgentEnv for FlakyEnv {
        type Config = DebuggingEnvConfig;

        fn build(config: &Self::Config, seed: i64) -> Result<Self> {
            Ok(Self {
                inner: DebuggingEnv::build(config, seed)?,
                fail_at_step: None,
                n_steps: 0,
            })
        }

        fn reset(&mut self) -> Result<TimeStep> {
            self.inner.reset()
        }

        fn step(&mut self, actions: &Actions) -> Result<TimeStep> {
            let t = self.n_steps;
            self.n_steps += 1;
            if self.fail_at_step == Some(t) {
                self.fail_at_step = None;
                bail!("Environment failed at step {}", t);
            }
            self.inner.step(actions)
        }

        fn agents(&self) -> Vec<AgentId> {
            self.inner.agents()
        }

        fn action_spec(&self) -> BTreeMap<AgentId, ActionSpec> {
            self.inner.action_spec()
        }

        fn observation_spec(&self) -> BTreeMap<AgentId, ObservationSpec> {
            self.inner.observation_spec()
        }
    }

    /// Always picks the last of `n` actions.
    struct LastActionPolicy(usize);

    impl Policy for LastActionPolicy {
        fn action_distribution(&self, _obs: &Observation) -> Result<ActionDistribution> {
            let mut probs = vec![0.0; self.0];
            probs[self.0 - 1] = 1.0;
            Ok(ActionDistribution::Categorical { probs })
        }

        fn variables(&self) -> Parameters {
            Parameters::new()
        }

        fn set_variables(&mut self, _variables: &Parameters) -> Result<()> {
            Ok(())
        }
    }

    fn env_config() -> DebuggingEnvConfig {
        DebuggingEnvConfig::default()
            .num_agents(3)
            .num_actions(2)
            .episode_length(5)
    }

    fn executor(
        env: &impl MultiAgentEnv,
        adder: Option<Box<dyn ParallelAdder>>,
    ) -> Result<Executor> {
        let spec = env.environment_spec();
        let networks = make_debugging_networks(true)(&spec)?;
        Ok(Executor::new(
            &ExecutorConfig::default(),
            &spec,
            networks,
            adder,
            None,
        ))
    }

    #[test]
    fn test_evaluator_selects_actions_of_all_agents() -> Result<()> {
        let mut env = DebuggingEnv::build(&env_config(), 0)?;
        let mut executor = executor(&env, None)?;
        assert!(executor.is_evaluator());

        let timestep = env.reset()?;
        executor.observe_first(&timestep)?;
        let (actions, infos) = executor.select_actions(&timestep.observations)?;

        let ids: Vec<&String> = actions.keys().collect();
        assert_eq!(ids, vec!["agent_0", "agent_1", "agent_2"]);
        for action in actions.values() {
            assert!(matches!(action, Action::Discrete(a) if *a < 2));
        }
        for info in infos.values() {
            // Zero weights give a uniform policy over 2 actions.
            assert!((info.log_prob - 0.5f32.ln()).abs() < 1e-5);
        }
        let extras = policy_extras(&infos);
        assert!(extras["agent_1"].contains_key("log_prob"));
        Ok(())
    }

    #[test]
    fn test_state_machine() -> Result<()> {
        let mut env = DebuggingEnv::build(&env_config(), 0)?;
        let mut executor = executor(&env, None)?;
        let timestep = env.reset()?;

        let err = executor.select_actions(&timestep.observations).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MavaError>(),
            Some(MavaError::InvalidExecutorState { state, .. }) if state == "AwaitingFirstObservation"
        ));

        executor.observe_first(&timestep)?;
        assert!(executor.observe_first(&timestep).is_err());

        let mut timestep = timestep;
        while !timestep.last() {
            let (actions, _) = executor.select_actions(&timestep.observations)?;
            timestep = env.step(&actions)?;
            executor.observe(&actions, &timestep, &Extras::new())?;
        }
        assert_eq!(executor.state(), ExecutorState::Terminated);
        let err = executor
            .observe(&Actions::new(), &timestep, &Extras::new())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MavaError>(),
            Some(MavaError::InvalidExecutorState { state, .. }) if state == "Terminated"
        ));

        // A new episode may start after termination.
        executor.observe_first(&env.reset()?)?;
        assert_eq!(executor.state(), ExecutorState::Acting);
        Ok(())
    }

    #[test]
    fn test_unknown_agent() -> Result<()> {
        let mut env = DebuggingEnv::build(&env_config(), 0)?;
        let spec = env.environment_spec();
        let mut networks = make_debugging_networks(false)(&spec)?;
        networks.remove("network_agent_2");
        let mut executor = Executor::new(
            &ExecutorConfig::default().shared_weights(false),
            &spec,
            networks,
            None,
            None,
        );
        let timestep = env.reset()?;
        executor.observe_first(&timestep)?;
        let err = executor.select_actions(&timestep.observations).unwrap_err();
        assert_eq!(
            err.downcast_ref::<MavaError>(),
            Some(&MavaError::UnknownAgent("agent_2".to_string()))
        );
        Ok(())
    }

    #[test]
    fn test_action_out_of_space_is_fatal() -> Result<()> {
        let mut env = DebuggingEnv::build(&env_config(), 0)?;
        let spec = env.environment_spec();
        let mut networks = Networks::new();
        networks.insert(
            "network_agent".to_string(),
            Box::new(LastActionPolicy(3)) as Box<dyn Policy>,
        );
        let mut executor =
            Executor::new(&ExecutorConfig::default(), &spec, networks, None, None);
        let timestep = env.reset()?;
        executor.observe_first(&timestep)?;
        let err = executor.select_actions(&timestep.observations).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MavaError>(),
            Some(MavaError::ActionOutOfSpace { agent, .. }) if agent == "agent_0"
        ));
        Ok(())
    }

    #[test]
    fn test_episode_loop_with_adder() -> Result<()> {
        let env = DebuggingEnv::build(&env_config(), 0)?;
        let counts = Arc::new(Mutex::new(Counts::default()));
        let executor = executor(&env, Some(Box::new(CountingAdder(counts.clone()))))?;
        let mut env_loop = EnvironmentLoop::new(env, executor, StopSignal::new(), Some(3));

        let episodes: Vec<EpisodeStats> = env_loop.episodes().collect::<Result<_>>()?;
        assert_eq!(episodes.len(), 3);
        for stats in episodes.iter() {
            assert_eq!(stats.length, 5);
            assert_eq!(stats.returns.len(), 3);
            assert!((stats.total_reward - stats.returns.values().sum::<f32>()).abs() < 1e-6);
        }
        assert!(env_loop.episodes().next().is_none());

        let c = counts.lock().unwrap();
        assert_eq!(c.first, 3);
        assert_eq!(c.add, 15);
        assert_eq!(c.episodes, 3);
        Ok(())
    }

    #[test]
    fn test_episode_after_failed_step() -> Result<()> {
        let mut env = FlakyEnv::build(&env_config(), 0)?;
        env.fail_at_step = Some(2);
        let counts = Arc::new(Mutex::new(Counts::default()));
        let executor = executor(&env, Some(Box::new(CountingAdder(counts.clone()))))?;
        let mut env_loop = EnvironmentLoop::new(env, executor, StopSignal::new(), None);

        assert!(env_loop.run_episode().is_err());
        assert_eq!(env_loop.executor().state(), ExecutorState::Acting);
        assert_eq!(env_loop.n_episodes(), 0);

        let stats = env_loop.run_episode()?;
        assert_eq!(stats.length, 5);
        assert_eq!(env_loop.executor().state(), ExecutorState::Terminated);
        assert_eq!(env_loop.n_episodes(), 1);

        let c = counts.lock().unwrap();
        assert_eq!(c.first, 2);
        assert_eq!(c.resets, 1);
        assert_eq!(c.add, 2 + 5);
        assert_eq!(c.episodes, 1);
        Ok(())
    }

    #[test]
    fn test_episode_after_manual_steps() -> Result<()> {
        let mut env = DebuggingEnv::build(&env_config(), 0)?;
        let mut executor = executor(&env, None)?;
        let timestep = env.reset()?;
        executor.observe_first(&timestep)?;
        executor.select_actions(&timestep.observations)?;

        let mut env_loop = EnvironmentLoop::new(env, executor, StopSignal::new(), None);
        assert_eq!(env_loop.run_episode()?.length, 5);
        assert_eq!(env_loop.executor().state(), ExecutorState::Terminated);
        Ok(())
    }

    #[test]
    fn test_stop_ends_episodes() -> Result<()> {
        let env = DebuggingEnv::build(&env_config(), 0)?;
        let executor = executor(&env, None)?;
        let stop = StopSignal::new();
        let env_loop = EnvironmentLoop::new(env, executor, stop.clone(), None);
        stop.stop();
        let stat = env_loop.run()?;
        assert_eq!(stat.n_episodes, 0);
        Ok(())
    }
}
