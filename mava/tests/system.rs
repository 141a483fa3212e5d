use anyhow::Result;
use mava::{
    core::{
        adder::{Sequence, Transition},
        data_server::{Batch, DataServerConfig, TableKind},
        debugging::{make_debugging_networks, DebuggingEnv, DebuggingEnvConfig, ReinforceUpdater},
        parameters::{counters, Parameters},
        record::Record,
        EnvironmentSpec, ParameterUpdate, Updater,
    },
    systems::{
        distributor::{AdderFactory, Distributor, DistributorConfig, UpdaterFactory},
        parameter_client::ParameterClientConfig,
        parameter_server::{Checkpointer, ParameterServerConfig, CHECKPOINT_FILE},
        trainer::TrainerConfig,
    },
};
use std::sync::Arc;
use tempdir::TempDir;
use test_log::test;

fn config(max_trainer_steps: i64) -> DistributorConfig {
    let mut config = DistributorConfig::default()
        .num_executors(2)
        .num_trainers(1)
        .n_buffer(4)
        .parameter_server(
            ParameterServerConfig::default()
                .non_blocking_sleep_seconds(0.01)
                .max_trainer_steps(max_trainer_steps),
        )
        .data_server(DataServerConfig::default().table(TableKind::Queue { max_size: 64 }))
        .trainer(TrainerConfig::default().batch_size(4).record_interval(5));
    config.executor = config
        .executor
        .client(ParameterClientConfig::default().update_period(5));
    config
}

fn reinforce() -> UpdaterFactory<Transition> {
    Arc::new(
        |spec: &EnvironmentSpec| -> Result<Box<dyn Updater<Transition>>> {
            Ok(Box::new(ReinforceUpdater::new(spec, true, 0.1)))
        },
    )
}

#[test]
fn test_system_runs_until_trainer_step_limit() -> Result<()> {
    let dir = TempDir::new("mava_system")?;
    let mut config = config(10);
    config.parameter_server = config
        .parameter_server
        .checkpoint_dir(dir.path().to_string_lossy().to_string());

    let program = Distributor::<DebuggingEnv, _>::new(
        config,
        DebuggingEnvConfig::default().episode_length(5),
        make_debugging_networks(true),
        reinforce(),
        AdderFactory::transition(),
    )
    .launch()?;
    program.join()?;

    // The final checkpoint holds the counters at shutdown.
    let snapshot = Checkpointer::load(dir.path().join(CHECKPOINT_FILE))?;
    let trainer_steps = snapshot.values[counters::TRAINER_STEPS].as_counter();
    assert!(matches!(trainer_steps, Some(n) if n >= 10));
    let executor_steps = snapshot.values[counters::EXECUTOR_STEPS].as_counter();
    assert!(matches!(executor_steps, Some(n) if n > 0));
    assert!(snapshot.values.contains_key("network_agent/weights"));
    Ok(())
}

/// Counts sequences and publishes nothing but the trainer counters.
struct SequenceCounter;

impl Updater<Sequence> for SequenceCounter {
    fn parameter_names(&self) -> Vec<String> {
        vec![counters::EXECUTOR_STEPS.to_string()]
    }

    fn update(
        &mut self,
        batch: &Batch<Sequence>,
        _parameters: &Parameters,
    ) -> Result<ParameterUpdate> {
        let valid: usize = batch.iter().map(|s| s.n_valid()).sum();
        Ok(ParameterUpdate {
            record: Record::from_scalar("valid_steps", valid as f32),
            ..Default::default()
        })
    }
}

#[test]
fn test_system_with_sequences() -> Result<()> {
    let updater_factory: UpdaterFactory<Sequence> = Arc::new(
        |_spec: &EnvironmentSpec| -> Result<Box<dyn Updater<Sequence>>> {
            Ok(Box::new(SequenceCounter))
        },
    );
    let program = Distributor::<DebuggingEnv, _>::new(
        config(5).run_evaluator(false),
        DebuggingEnvConfig::default().episode_length(7),
        make_debugging_networks(true),
        updater_factory,
        AdderFactory::sequence(3, 2),
    )
    .launch()?;
    program.join()
}
