//! Trainers consuming experience and publishing parameter updates.
mod base;
mod config;
mod stat;
pub use base::Trainer;
pub use config::TrainerConfig;
pub use stat::TrainerStat;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        executor::{EnvironmentLoop, Executor, ExecutorConfig},
        parameter_server::{ParameterServer, ParameterServerConfig, ParameterServerHandle},
        StopSignal,
    };
    use anyhow::Result;
    use mava_core::{
        adder::{AdderSignature, ParallelTransitionAdder, Transition},
        data_server::{DataServer, DataServerClient, DataServerConfig, TableKind},
        debugging::{make_debugging_networks, DebuggingEnv, DebuggingEnvConfig, ReinforceUpdater},
        parameters::{counters, network_parameters},
        record::BufferedRecorder,
        EnvironmentSpec, MultiAgentEnv,
    };
    use std::{thread, time::Duration};
    use tempdir::TempDir;
    use test_log::test;

    fn env_config() -> DebuggingEnvConfig {
        DebuggingEnvConfig::default().episode_length(5)
    }

    /// Fills a data server with the transitions of two episodes.
    fn filled_data_server() -> Result<(EnvironmentSpec, DataServer<Transition>)> {
        let env = DebuggingEnv::build(&env_config(), 0)?;
        let spec = env.environment_spec();
        let data_server =
            DataServer::new(DataServerConfig::default(), AdderSignature::from_spec(&spec, None));
        let adder = ParallelTransitionAdder::new(DataServerClient::new(data_server.clone(), 4));
        let executor = Executor::new(
            &ExecutorConfig::default(),
            &spec,
            make_debugging_networks(true)(&spec)?,
            Some(Box::new(adder)),
            None,
        );
        let env_loop = EnvironmentLoop::new(env, executor, StopSignal::new(), Some(2));
        env_loop.run()?;
        assert_eq!(data_server.len(), 10);
        Ok((spec, data_server))
    }

    fn spawn_server(
        spec: &EnvironmentSpec,
        stop: &StopSignal,
    ) -> Result<(ParameterServerHandle, thread::JoinHandle<()>)> {
        let networks = make_debugging_networks(true)(spec)?;
        let mut server = ParameterServer::build(
            ParameterServerConfig::default().non_blocking_sleep_seconds(0.01),
            network_parameters(&networks),
            vec![],
            stop.clone(),
        )?;
        let handle = server.handle(Duration::from_secs(5));
        let join = thread::spawn(move || {
            server.run().unwrap();
        });
        Ok((handle, join))
    }

    #[test]
    fn test_trainer_steps_publish_updates() -> Result<()> {
        let (spec, data_server) = filled_data_server()?;
        let stop = StopSignal::new();
        let (handle, join) = spawn_server(&spec, &stop)?;

        let config = TrainerConfig::default().batch_size(4);
        let updater = ReinforceUpdater::new(&spec, true, 0.1);
        let mut trainer = Trainer::new(
            config,
            data_server.clone(),
            Box::new(updater),
            handle.clone(),
            stop.clone(),
        )?;
        let record = trainer.step()?.unwrap();
        assert!(record.get("trainer_steps").is_some());
        trainer.step()?.unwrap();
        assert_eq!(trainer.n_steps(), 2);
        assert_eq!(data_server.len(), 2);

        let snapshot = handle.get_parameters(vec![counters::TRAINER_STEPS.to_string()])?;
        assert_eq!(
            snapshot.values[counters::TRAINER_STEPS].as_counter(),
            Some(2)
        );

        stop.stop();
        join.join().unwrap();
        Ok(())
    }

    #[test]
    fn test_run_honors_step_budget() -> Result<()> {
        let (spec, data_server) = filled_data_server()?;
        let stop = StopSignal::new();
        let (handle, join) = spawn_server(&spec, &stop)?;

        let config = TrainerConfig::default()
            .batch_size(2)
            .max_trainer_steps(Some(3))
            .record_interval(1);
        let trainer = Trainer::new(
            config,
            data_server,
            Box::new(ReinforceUpdater::new(&spec, true, 0.1)),
            handle,
            stop.clone(),
        )?
        .recorder(Box::new(BufferedRecorder::new()));
        let stat = trainer.run()?;
        assert_eq!(stat.n_steps, 3);
        assert_eq!(stat.n_samples, 6);

        stop.stop();
        join.join().unwrap();
        Ok(())
    }

    #[test]
    fn test_step_returns_none_after_stop() -> Result<()> {
        let env = DebuggingEnv::build(&env_config(), 0)?;
        let spec = env.environment_spec();
        let data_server: DataServer<Transition> =
            DataServer::new(DataServerConfig::default(), AdderSignature::from_spec(&spec, None));
        let stop = StopSignal::new();
        let mut server = ParameterServer::build(
            ParameterServerConfig::default(),
            Default::default(),
            vec![],
            stop.clone(),
        )?;
        let mut trainer = Trainer::new(
            TrainerConfig::default(),
            data_server.clone(),
            Box::new(ReinforceUpdater::new(&spec, true, 0.1)),
            server.handle(Duration::from_secs(1)),
            stop.clone(),
        )?;
        stop.stop();
        assert!(trainer.step()?.is_none());

        // A closed data server ends the run without error.
        let stop = StopSignal::new();
        let trainer = Trainer::new(
            TrainerConfig::default(),
            data_server.clone(),
            Box::new(ReinforceUpdater::new(&spec, true, 0.1)),
            server.handle(Duration::from_secs(1)),
            stop,
        )?;
        data_server.close();
        assert_eq!(trainer.run()?.n_steps, 0);
        Ok(())
    }

    #[test]
    fn test_batch_larger_than_queue_rejected() -> Result<()> {
        let env = DebuggingEnv::build(&env_config(), 0)?;
        let spec = env.environment_spec();
        let data_server: DataServer<Transition> = DataServer::new(
            DataServerConfig::default().table(TableKind::Queue { max_size: 2 }),
            AdderSignature::from_spec(&spec, None),
        );
        let mut server = ParameterServer::build(
            ParameterServerConfig::default(),
            Default::default(),
            vec![],
            StopSignal::new(),
        )?;
        let trainer = Trainer::new(
            TrainerConfig::default().batch_size(3),
            data_server,
            Box::new(ReinforceUpdater::new(&spec, true, 0.1)),
            server.handle(Duration::from_secs(1)),
            StopSignal::new(),
        );
        assert!(trainer.is_err());
        Ok(())
    }

    #[test]
    fn test_config_yaml() -> Result<()> {
        let dir = TempDir::new("trainer_config")?;
        let path = dir.path().join("trainer.yaml");
        let config = TrainerConfig::default()
            .batch_size(8)
            .max_trainer_steps(Some(10));
        config.save(&path)?;
        assert_eq!(TrainerConfig::load(&path)?, config);
        Ok(())
    }
}
