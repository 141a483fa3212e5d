use anyhow::Result;
use mava::{
    core::{
        adder::Transition,
        debugging::{make_debugging_networks, DebuggingEnv, DebuggingEnvConfig, ReinforceUpdater},
        parameters::counters,
        Action, ActionSpec, EnvironmentSpec, MultiAgentEnv, Updater,
    },
    systems::{
        distributor::{AdderFactory, Distributor, DistributorConfig, UpdaterFactory},
        executor::{ExecutorConfig, ExecutorState},
        parameter_client::ParameterClientConfig,
        parameter_server::ParameterServerConfig,
    },
};
use std::sync::Arc;
use test_log::test;

#[test]
fn test_evaluator_acts_without_writing_experience() -> Result<()> {
    let env_config = DebuggingEnvConfig::default().num_agents(3).episode_length(4);
    let config = DistributorConfig::default()
        .num_executors(1)
        .parameter_server(ParameterServerConfig::default().non_blocking_sleep_seconds(0.01))
        .executor(
            ExecutorConfig::default()
                .max_episodes(Some(3))
                .client(ParameterClientConfig::default().update_period(1)),
        );
    let updater_factory: UpdaterFactory<Transition> = Arc::new(
        |spec: &EnvironmentSpec| -> Result<Box<dyn Updater<Transition>>> {
            Ok(Box::new(ReinforceUpdater::new(spec, true, 0.1)))
        },
    );
    let mut system = Distributor::<DebuggingEnv, _>::new(
        config,
        env_config.clone(),
        make_debugging_networks(true),
        updater_factory,
        AdderFactory::transition(),
    )
    .build_local()?;
    let mut evaluator = system.evaluator.take().unwrap();
    assert!(evaluator.executor().is_evaluator());
    let spec = evaluator.env().environment_spec();

    // Actions of all agents, in agent order, within their action spaces.
    let timestep = DebuggingEnv::build(&env_config, 7)?.reset()?;
    let executor = evaluator.executor_mut();
    executor.update(true)?;
    executor.observe_first(&timestep)?;
    let (actions, infos) = executor.select_actions(&timestep.observations)?;
    let ids: Vec<&str> = actions.keys().map(|id| id.as_str()).collect();
    assert_eq!(ids, ["agent_0", "agent_1", "agent_2"]);
    for (id, action) in actions.iter() {
        assert!(matches!(action, Action::Discrete(_)));
        assert!(spec.agent(id).unwrap().action.contains(action));
        assert_eq!(spec.agent(id).unwrap().action, ActionSpec::Discrete { num_values: 2 });
        assert!(infos[id].log_prob <= 0.0);
    }
    assert_eq!(evaluator.executor().state(), ExecutorState::Acting);

    // The unfinished episode is abandoned by the loop.
    let stat = evaluator.run()?;
    assert_eq!(stat.n_episodes, 3);
    assert_eq!(stat.n_steps, 12);
    assert_eq!(system.data_server.total_appended(), 0);

    let snapshot = system.handle.get_parameters(vec![
        counters::EVALUATOR_EPISODES.to_string(),
        counters::EVALUATOR_STEPS.to_string(),
        counters::EXECUTOR_EPISODES.to_string(),
    ])?;
    assert_eq!(snapshot.values[counters::EVALUATOR_EPISODES].as_counter(), Some(3));
    assert_eq!(snapshot.values[counters::EVALUATOR_STEPS].as_counter(), Some(12));
    assert_eq!(snapshot.values[counters::EXECUTOR_EPISODES].as_counter(), Some(0));

    // An executor of the same system writes to the data server the evaluator left empty.
    system.executors[0].run_episode()?;
    assert_eq!(system.data_server.total_appended(), 4);

    system.shutdown()
}
