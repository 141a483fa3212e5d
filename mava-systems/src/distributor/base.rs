use super::DistributorConfig;
use crate::{
    executor::{EnvironmentLoop, Executor},
    parameter_client::ExecutorParameterClient,
    parameter_server::{ParameterServer, ParameterServerHandle, ParameterServerHook},
    trainer::Trainer,
    StopSignal,
};
use anyhow::{anyhow, Result};
use log::{info, warn};
use mava_core::{
    adder::{
        AdderSignature, ParallelAdder, ParallelSequenceAdder, ParallelTransitionAdder, Sequence,
        SignedRecord, Transition,
    },
    data_server::{DataServer, DataServerClient},
    parameters::network_parameters,
    record::LogRecorder,
    EnvironmentSpec, MultiAgentEnv, NetworkFactory, Updater,
};
use std::{
    sync::Arc,
    thread::{self, JoinHandle},
};

/// Builds the update rule of a trainer from the spec of the environment.
pub type UpdaterFactory<T> =
    Arc<dyn Fn(&EnvironmentSpec) -> Result<Box<dyn Updater<T>>> + Send + Sync>;

/// Builds the adder of an executor writing records of type `T`.
pub struct AdderFactory<T> {
    sequence_length: Option<usize>,
    build: Arc<dyn Fn(DataServerClient<T>) -> Result<Box<dyn ParallelAdder>> + Send + Sync>,
}

impl<T> Clone for AdderFactory<T> {
    fn clone(&self) -> Self {
        Self {
            sequence_length: self.sequence_length,
            build: self.build.clone(),
        }
    }
}

impl<T> AdderFactory<T> {
    /// Length of sequences written by the adders, `None` for transitions.
    pub fn sequence_length(&self) -> Option<usize> {
        self.sequence_length
    }

    /// Builds an adder writing to `client`.
    pub fn build(&self, client: DataServerClient<T>) -> Result<Box<dyn ParallelAdder>> {
        (self.build)(client)
    }
}

impl AdderFactory<Transition> {
    /// Adders writing [`Transition`]s.
    pub fn transition() -> Self {
        Self {
            sequence_length: None,
            build: Arc::new(
                |client: DataServerClient<Transition>| -> Result<Box<dyn ParallelAdder>> {
                    Ok(Box::new(ParallelTransitionAdder::new(client)))
                },
            ),
        }
    }
}

impl AdderFactory<Sequence> {
    /// Adders writing [`Sequence`]s of `length` steps, starting every `period` steps.
    pub fn sequence(length: usize, period: usize) -> Self {
        Self {
            sequence_length: Some(length),
            build: Arc::new(
                move |client: DataServerClient<Sequence>| -> Result<Box<dyn ParallelAdder>> {
                    Ok(Box::new(ParallelSequenceAdder::new(client, length, period)?))
                },
            ),
        }
    }
}

fn spawn<R: Send + 'static>(
    name: String,
    f: impl FnOnce() -> Result<R> + Send + 'static,
) -> Result<JoinHandle<Result<R>>> {
    Ok(thread::Builder::new().name(name).spawn(f)?)
}

fn join_thread<R>(name: &str, handle: JoinHandle<Result<R>>) -> Result<R> {
    handle
        .join()
        .map_err(|_| anyhow!("Thread {} panicked", name))?
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Builds and wires the components of a system.
///
/// A system has one parameter server, one data server, `num_executors`
/// executors, an optional evaluator and `num_trainers` trainers:
///
/// ```mermaid
/// graph LR
///     E[Executor]-->|append|D[DataServer]
///     D -->|Batch|T[Trainer]
///     T -->|set/add|P[ParameterServer]
///     P -->|get|E
///     P -->|get|V[Evaluator]
///     E -->|executor counters|P
///     V -->|evaluator counters|P
/// ```
///
/// Every component shares one [`StopSignal`]. The parameter server raises it
/// when a termination condition holds; the data server is then closed so that
/// blocked executors and trainers return.
pub struct Distributor<E: MultiAgentEnv, T> {
    config: DistributorConfig,
    env_config: E::Config,
    network_factory: NetworkFactory,
    updater_factory: UpdaterFactory<T>,
    adder_factory: AdderFactory<T>,
    hooks: Vec<Box<dyn ParameterServerHook>>,
}

impl<E, T> Distributor<E, T>
where
    E: MultiAgentEnv + Send + 'static,
    T: SignedRecord + Clone + Send + 'static,
{
    /// Creates a distributor.
    pub fn new(
        config: DistributorConfig,
        env_config: E::Config,
        network_factory: NetworkFactory,
        updater_factory: UpdaterFactory<T>,
        adder_factory: AdderFactory<T>,
    ) -> Self {
        Self {
            config,
            env_config,
            network_factory,
            updater_factory,
            adder_factory,
            hooks: vec![],
        }
    }

    /// Registers a hook of the parameter server, after the built-in ones.
    pub fn hook(mut self, hook: Box<dyn ParameterServerHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    fn build_loop(
        &self,
        id: usize,
        handle: &ParameterServerHandle,
        data_server: &DataServer<T>,
        stop: &StopSignal,
        evaluator: bool,
    ) -> Result<EnvironmentLoop<E>> {
        let seed = self.config.seed + id as i64;
        let env = E::build(&self.env_config, seed)?;
        let spec = env.environment_spec();
        let networks = (self.network_factory)(&spec)?;
        let client = ExecutorParameterClient::new(
            handle.clone(),
            &networks,
            evaluator,
            self.config.executor.client.clone(),
        );
        let adder = if evaluator {
            None
        } else {
            let client = DataServerClient::new(data_server.clone(), self.config.n_buffer);
            Some(self.adder_factory.build(client)?)
        };
        let config = self.config.executor.clone().seed(seed as u64);
        let executor = Executor::new(&config, &spec, networks, adder, Some(client));
        let label = if evaluator {
            "evaluator".to_string()
        } else {
            format!("executor_{}", id)
        };
        Ok(
            EnvironmentLoop::new(env, executor, stop.clone(), config.max_episodes)
                .recorder(Box::new(LogRecorder::new(label)))
                .record_interval(config.record_interval),
        )
    }

    /// Builds all components without starting them, except the parameter
    /// server running in its own thread.
    pub fn build_local(mut self) -> Result<LocalSystem<E, T>> {
        self.config
            .data_server
            .check_batch_size(self.config.trainer.batch_size)?;
        let stop = StopSignal::new();
        let spec = E::build(&self.env_config, self.config.seed)?.environment_spec();
        let networks = (self.network_factory)(&spec)?;
        let data_server = DataServer::new(
            self.config.data_server.clone(),
            AdderSignature::from_spec(&spec, self.adder_factory.sequence_length()),
        );
        let mut server = ParameterServer::build(
            self.config.parameter_server.clone(),
            network_parameters(&networks),
            std::mem::take(&mut self.hooks),
            stop.clone(),
        )?;
        let handle = server.handle(self.config.executor.client.rpc_timeout());

        let n = self.config.num_executors;
        let executors = (0..n)
            .map(|i| self.build_loop(i, &handle, &data_server, &stop, false))
            .collect::<Result<Vec<_>>>()?;
        let evaluator = if self.config.run_evaluator {
            Some(self.build_loop(n, &handle, &data_server, &stop, true)?)
        } else {
            None
        };
        let trainers = (0..self.config.num_trainers)
            .map(|i| -> Result<Trainer<T>> {
                let updater = (self.updater_factory)(&spec)?;
                Ok(Trainer::new(
                    self.config.trainer.clone(),
                    data_server.clone(),
                    updater,
                    handle.clone(),
                    stop.clone(),
                )?
                .recorder(Box::new(LogRecorder::new(format!("trainer_{}", i)))))
            })
            .collect::<Result<Vec<_>>>()?;

        let parameter_server = spawn("parameter_server".to_string(), move || {
            server.run().map(|_| ())
        })?;
        let data_server_closer = {
            let stop = stop.clone();
            let data_server = data_server.clone();
            spawn("data_server_closer".to_string(), move || {
                // Nothing is sent on the stop channel; recv returns on disconnection.
                let _ = stop.receiver().recv();
                data_server.close();
                Ok(())
            })?
        };
        info!(
            "Built system: {} executors, {} trainers, evaluator: {}",
            n,
            trainers.len(),
            evaluator.is_some()
        );

        Ok(LocalSystem {
            stop,
            handle,
            data_server,
            executors,
            evaluator,
            trainers,
            services: vec![
                ("parameter_server".to_string(), parameter_server),
                ("data_server_closer".to_string(), data_server_closer),
            ],
        })
    }

    /// Builds the system and runs every component in its own thread.
    pub fn launch(self) -> Result<Program> {
        self.build_local()?.launch()
    }
}

/// Components of a system built by [`Distributor::build_local`].
///
/// The parameter server already runs in a thread; executors and trainers are
/// driven by the caller. Call [`LocalSystem::shutdown`] when done.
pub struct LocalSystem<E: MultiAgentEnv, T> {
    /// Stop signal shared by all components.
    pub stop: StopSignal,

    /// Handle of the parameter server.
    pub handle: ParameterServerHandle,

    /// The data server.
    pub data_server: DataServer<T>,

    /// Executors writing experience.
    pub executors: Vec<EnvironmentLoop<E>>,

    /// The evaluator.
    pub evaluator: Option<EnvironmentLoop<E>>,

    /// Trainers.
    pub trainers: Vec<Trainer<T>>,

    services: Vec<(String, JoinHandle<Result<()>>)>,
}

impl<E, T> LocalSystem<E, T>
where
    E: MultiAgentEnv + Send + 'static,
    T: SignedRecord + Clone + Send + 'static,
{
    /// Stops the system and waits for the parameter server.
    pub fn shutdown(self) -> Result<()> {
        self.stop.stop();
        self.data_server.close();
        let mut result = Ok(());
        for (name, handle) in self.services {
            if let Err(e) = join_thread(&name, handle) {
                warn!("{} failed: {}", name, e);
                result = result.and(Err(e));
            }
        }
        result
    }

    /// Runs every executor, the evaluator and every trainer in its own thread.
    pub fn launch(self) -> Result<Program> {
        let mut threads = self.services;
        for (i, env_loop) in self.executors.into_iter().enumerate() {
            let name = format!("executor_{}", i);
            let handle = spawn(name.clone(), move || env_loop.run().map(|_| ()))?;
            threads.push((name, handle));
        }
        if let Some(env_loop) = self.evaluator {
            let name = "evaluator".to_string();
            let handle = spawn(name.clone(), move || env_loop.run().map(|_| ()))?;
            threads.push((name, handle));
        }
        for (i, trainer) in self.trainers.into_iter().enumerate() {
            let name = format!("trainer_{}", i);
            let handle = spawn(name.clone(), move || trainer.run().map(|_| ()))?;
            threads.push((name, handle));
        }
        Ok(Program {
            stop: self.stop,
            threads,
        })
    }
}

/// A running system, see [`Distributor::launch`].
pub struct Program {
    stop: StopSignal,
    threads: Vec<(String, JoinHandle<Result<()>>)>,
}

impl Program {
    /// Stop signal of the system.
    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    /// Asks every component to stop.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Waits for every component.
    ///
    /// A failed component does not stop the others. Returns the first error.
    pub fn join(self) -> Result<()> {
        let mut result = Ok(());
        for (name, handle) in self.threads {
            match join_thread(&name, handle) {
                Ok(()) => info!("{} finished", name),
                Err(e) => {
                    warn!("{} failed: {}", name, e);
                    result = result.and(Err(e));
                }
            }
        }
        result
    }
}
