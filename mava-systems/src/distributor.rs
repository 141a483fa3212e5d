//! Launcher wiring the components of a system.
mod base;
mod config;
pub use base::{AdderFactory, Distributor, LocalSystem, Program, UpdaterFactory};
pub use config::DistributorConfig;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        executor::ExecutorConfig, parameter_client::ParameterClientConfig, trainer::TrainerConfig,
    };
    use anyhow::Result;
    use mava_core::{
        adder::Transition,
        data_server::{DataServerConfig, TableKind},
        debugging::{make_debugging_networks, DebuggingEnv, DebuggingEnvConfig, ReinforceUpdater},
        parameters::counters,
        EnvironmentSpec, Updater,
    };
    use std::sync::Arc;
    use tempdir::TempDir;
    use test_log::test;

    fn distributor(config: DistributorConfig) -> Distributor<DebuggingEnv, Transition> {
        let updater_factory: UpdaterFactory<Transition> = Arc::new(
            |spec: &EnvironmentSpec| -> Result<Box<dyn Updater<Transition>>> {
                Ok(Box::new(ReinforceUpdater::new(spec, true, 0.1)))
            },
        );
        Distributor::new(
            config,
            DebuggingEnvConfig::default().episode_length(5),
            make_debugging_networks(true),
            updater_factory,
            AdderFactory::transition(),
        )
    }

    #[test]
    fn test_build_local() -> Result<()> {
        let config = DistributorConfig::default()
            .num_executors(2)
            .num_trainers(1)
            .executor(
                ExecutorConfig::default().client(ParameterClientConfig::default().update_period(1)),
            );
        let mut system = distributor(config).build_local()?;
        assert_eq!(system.executors.len(), 2);
        assert_eq!(system.trainers.len(), 1);

        let evaluator = system.evaluator.as_mut().unwrap();
        assert!(evaluator.executor().is_evaluator());
        let stats = evaluator.run_episode()?;
        assert_eq!(stats.length, 5);
        assert!(system.data_server.is_empty());

        system.executors[0].run_episode()?;
        assert_eq!(system.data_server.len(), 5);

        let snapshot = system
            .handle
            .get_parameters(vec![counters::EXECUTOR_EPISODES.to_string()])?;
        assert!(snapshot.values.contains_key(counters::EXECUTOR_EPISODES));

        system.shutdown()
    }

    #[test]
    fn test_queue_smaller_than_batch_rejected() {
        let config = DistributorConfig::default()
            .data_server(DataServerConfig::default().table(TableKind::Queue { max_size: 8 }))
            .trainer(TrainerConfig::default().batch_size(16));
        assert!(distributor(config).build_local().is_err());
    }

    #[test]
    fn test_config_yaml() -> Result<()> {
        let dir = TempDir::new("distributor_config")?;
        let path = dir.path().join("distributor.yaml");
        let config = DistributorConfig::default().num_executors(4).seed(7);
        config.save(&path)?;
        assert_eq!(DistributorConfig::load(&path)?, config);
        Ok(())
    }
}
