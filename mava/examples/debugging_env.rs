use anyhow::Result;
use clap::Parser;
use log::info;
use mava::{
    core::{
        adder::Transition,
        data_server::{DataServerConfig, TableKind},
        debugging::{make_debugging_networks, DebuggingEnv, DebuggingEnvConfig, ReinforceUpdater},
        EnvironmentSpec, Updater,
    },
    systems::{
        distributor::{AdderFactory, Distributor, DistributorConfig, UpdaterFactory},
        parameter_client::ParameterClientConfig,
        parameter_server::ParameterServerConfig,
        trainer::TrainerConfig,
    },
};
use std::sync::Arc;

const LEARNING_RATE: f32 = 0.1;

/// Trains linear policies on the debugging environment with REINFORCE.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Number of executors
    #[arg(long, default_value_t = 2)]
    num_executors: usize,

    /// Number of trainers
    #[arg(long, default_value_t = 1)]
    num_trainers: usize,

    /// Number of agents in the environment
    #[arg(long, default_value_t = 3)]
    num_agents: usize,

    /// The system stops after this number of trainer steps
    #[arg(long, default_value_t = 500)]
    max_trainer_steps: i64,

    /// Agents of the same type share a network
    #[arg(long, default_value_t = false)]
    shared_weights: bool,

    /// Directory of checkpoints, no checkpoint if not given
    #[arg(long)]
    checkpoint_dir: Option<String>,

    /// YAML file of the system configuration, overriding other options
    #[arg(long)]
    config: Option<String>,
}

fn config(args: &Args) -> Result<DistributorConfig> {
    if let Some(path) = &args.config {
        return DistributorConfig::load(path);
    }
    let mut parameter_server = ParameterServerConfig::default()
        .non_blocking_sleep_seconds(1.0)
        .log_interval_seconds(5.0)
        .max_trainer_steps(args.max_trainer_steps);
    if let Some(dir) = &args.checkpoint_dir {
        parameter_server = parameter_server.checkpoint_dir(dir);
    }
    let mut config = DistributorConfig::default()
        .num_executors(args.num_executors)
        .num_trainers(args.num_trainers)
        .parameter_server(parameter_server)
        .data_server(DataServerConfig::default().table(TableKind::Queue { max_size: 2000 }))
        .trainer(TrainerConfig::default().batch_size(32).record_interval(50));
    config.executor = config
        .executor
        .shared_weights(args.shared_weights)
        .client(ParameterClientConfig::default().update_period(10));
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = config(&args)?;
    let shared_weights = config.executor.shared_weights;
    info!("Configuration: {:?}", config);

    let updater_factory: UpdaterFactory<Transition> = Arc::new(
        move |spec: &EnvironmentSpec| -> Result<Box<dyn Updater<Transition>>> {
            Ok(Box::new(ReinforceUpdater::new(
                spec,
                shared_weights,
                LEARNING_RATE,
            )))
        },
    );
    let distributor = Distributor::<DebuggingEnv, _>::new(
        config,
        DebuggingEnvConfig::default().num_agents(args.num_agents),
        make_debugging_networks(shared_weights),
        updater_factory,
        AdderFactory::transition(),
    );

    let program = distributor.launch()?;
    program.join()
}
