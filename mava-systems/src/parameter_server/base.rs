use super::{
    Checkpointer, HookContext, ParameterServerConfig, ParameterServerHandle,
    ParameterServerHook, ParameterServerLogger, ParameterServerRequest, ParameterServerStat,
    Stage, TerminationCondition,
};
use crate::StopSignal;
use anyhow::Result;
use crossbeam_channel::{select, unbounded, Receiver, Sender};
use log::{info, warn};
use mava_core::parameters::{counters, ParameterSnapshot, ParameterStore, Parameters};
use std::time::{Duration, Instant};

/// Authoritative store of parameters and counters.
///
/// Every operation runs the hooks of its stages in registration order,
/// see [`Stage`]. Remote components talk to the server through
/// [`ParameterServerHandle`]s; their requests are served while the server
/// waits in [`ParameterServer::step`].
pub struct ParameterServer {
    config: ParameterServerConfig,
    store: ParameterStore,
    hooks: Vec<Box<dyn ParameterServerHook>>,
    inbox: Option<(Sender<ParameterServerRequest>, Receiver<ParameterServerRequest>)>,
    stop: StopSignal,
    n_steps: usize,
    n_requests: usize,
}

impl ParameterServer {
    /// Builds a server holding `parameters` and the default counters.
    ///
    /// Built-in hooks are registered before `hooks`: a [`Checkpointer`] if
    /// checkpointing is enabled, [`TerminationCondition`]s for the step limits
    /// of the configuration and a [`ParameterServerLogger`].
    pub fn build(
        config: ParameterServerConfig,
        parameters: Parameters,
        hooks: Vec<Box<dyn ParameterServerHook>>,
        stop: StopSignal,
    ) -> Result<Self> {
        let mut all_hooks: Vec<Box<dyn ParameterServerHook>> = vec![];
        if config.checkpoint {
            all_hooks.push(Box::new(Checkpointer::new(
                &config.checkpoint_dir,
                config.checkpoint_minute_interval,
            )));
        }
        if let Some(n) = config.max_trainer_steps {
            all_hooks.push(Box::new(TerminationCondition::max_trainer_steps(n)));
        }
        if let Some(n) = config.max_executor_steps {
            all_hooks.push(Box::new(TerminationCondition::max_executor_steps(n)));
        }
        all_hooks.push(Box::new(ParameterServerLogger::new(
            config.log_interval_seconds,
        )));
        all_hooks.extend(hooks);

        let mut server = Self {
            config,
            store: ParameterStore::default(),
            hooks: all_hooks,
            inbox: None,
            stop,
            n_steps: 0,
            n_requests: 0,
        };

        server.run_hooks(Stage::InitStart, &[], None, None)?;
        let mut values = counters::default_counters();
        values.extend(parameters);
        server.store = ParameterStore::new(values);
        for stage in &Stage::INIT[1..] {
            server.run_hooks(*stage, &[], None, None)?;
        }
        Ok(server)
    }

    fn run_hooks(
        &mut self,
        stage: Stage,
        names: &[String],
        updates: Option<&Parameters>,
        snapshot: Option<&ParameterSnapshot>,
    ) -> Result<bool> {
        self.run_hooks_with(stage, names, updates, snapshot, false)
    }

    fn run_hooks_with(
        &mut self,
        stage: Stage,
        names: &[String],
        updates: Option<&Parameters>,
        snapshot: Option<&ParameterSnapshot>,
        force_checkpoint: bool,
    ) -> Result<bool> {
        let mut ctx = HookContext {
            store: &mut self.store,
            config: &self.config,
            names,
            updates,
            snapshot,
            force_checkpoint,
            terminate: false,
        };
        for hook in self.hooks.iter_mut() {
            hook.on_stage(stage, &mut ctx)?;
        }
        Ok(ctx.terminate)
    }

    /// Parameter store.
    pub fn store(&self) -> &ParameterStore {
        &self.store
    }

    /// Configuration.
    pub fn config(&self) -> &ParameterServerConfig {
        &self.config
    }

    /// Returns a handle sending requests to this server.
    ///
    /// Requests time out after `timeout` if the server does not answer.
    pub fn handle(&mut self, timeout: Duration) -> ParameterServerHandle {
        let (sender, _) = self.inbox.get_or_insert_with(unbounded);
        ParameterServerHandle::new(sender.clone(), timeout)
    }

    /// Snapshot of the named parameters.
    pub fn get_parameters(&mut self, names: &[String]) -> Result<ParameterSnapshot> {
        self.run_hooks(Stage::GetParametersStart, names, None, None)?;
        let snapshot = self.store.get(names)?;
        self.run_hooks(Stage::GetParameters, names, None, Some(&snapshot))?;
        self.run_hooks(Stage::GetParametersEnd, names, None, Some(&snapshot))?;
        Ok(snapshot)
    }

    /// Overwrites parameters and returns the new version.
    pub fn set_parameters(&mut self, updates: &Parameters) -> Result<u64> {
        self.run_hooks(Stage::SetParametersStart, &[], Some(updates), None)?;
        let version = self.store.set(updates)?;
        self.run_hooks(Stage::SetParameters, &[], Some(updates), None)?;
        self.run_hooks(Stage::SetParametersEnd, &[], Some(updates), None)?;
        Ok(version)
    }

    /// Adds to parameters and returns the new version.
    pub fn add_to_parameters(&mut self, updates: &Parameters) -> Result<u64> {
        self.run_hooks(Stage::AddToParametersStart, &[], Some(updates), None)?;
        let version = self.store.add(updates)?;
        self.run_hooks(Stage::AddToParameters, &[], Some(updates), None)?;
        self.run_hooks(Stage::AddToParametersEnd, &[], Some(updates), None)?;
        Ok(version)
    }

    fn serve(&mut self, request: ParameterServerRequest) {
        self.n_requests += 1;
        // A requester that gave up has dropped its receiver; its reply is discarded.
        match request {
            ParameterServerRequest::Get { names, reply } => {
                let _ = reply.send(self.get_parameters(&names));
            }
            ParameterServerRequest::Set { updates, reply } => {
                let _ = reply.send(self.set_parameters(&updates));
            }
            ParameterServerRequest::Add { updates, reply } => {
                let _ = reply.send(self.add_to_parameters(&updates));
            }
        }
    }

    /// Serves queued requests without waiting. Returns the number served.
    pub fn serve_pending(&mut self) -> usize {
        let receiver = match &self.inbox {
            Some((_, r)) => r.clone(),
            None => return 0,
        };
        let mut n = 0;
        while let Ok(request) = receiver.try_recv() {
            self.serve(request);
            n += 1;
        }
        n
    }

    /// Serves requests until `duration` elapses or the stop signal is raised.
    fn wait(&mut self, duration: Duration) {
        let deadline = Instant::now() + duration;
        let receiver = match &self.inbox {
            Some((_, r)) => r.clone(),
            None => {
                self.stop.sleep(duration);
                return;
            }
        };
        let stop = self.stop.receiver().clone();
        loop {
            let now = Instant::now();
            if now >= deadline {
                self.serve_pending();
                return;
            }
            select! {
                recv(receiver) -> request => match request {
                    Ok(request) => self.serve(request),
                    Err(_) => {
                        self.stop.sleep(deadline - now);
                        return;
                    }
                },
                recv(stop) -> _ => return,
                default(deadline - now) => {}
            }
        }
    }

    /// One maintenance pass of the run loop.
    ///
    /// Runs the checkpoint hooks, waits `non_blocking_sleep_seconds` while
    /// serving requests and evaluates termination conditions. Returns `true`
    /// if the run should terminate.
    pub fn step(&mut self) -> Result<bool> {
        self.run_hooks(Stage::RunLoopStart, &[], None, None)?;
        self.run_hooks(Stage::RunLoopCheckpoint, &[], None, None)?;
        self.run_hooks(Stage::RunLoop, &[], None, None)?;
        self.wait(Duration::from_secs_f64(
            self.config.non_blocking_sleep_seconds.max(0.0),
        ));
        let terminate = self.run_hooks(Stage::RunLoopTermination, &[], None, None)?;
        self.run_hooks(Stage::RunLoopEnd, &[], None, None)?;
        self.n_steps += 1;
        Ok(terminate)
    }

    /// Runs [`ParameterServer::step`] until termination or the stop signal.
    ///
    /// Raises the stop signal on termination so that every component of the
    /// system shuts down, then writes a final checkpoint.
    pub fn run(mut self) -> Result<ParameterServerStat> {
        let t = Instant::now();
        info!("Parameter server started");
        let result = loop {
            if self.stop.is_stopped() {
                break Ok(());
            }
            match self.step() {
                Ok(true) => break Ok(()),
                Ok(false) => {}
                Err(e) => break Err(e),
            }
        };
        self.stop.stop();
        self.serve_pending();
        if let Err(e) = self.run_hooks_with(Stage::RunLoopCheckpoint, &[], None, None, true) {
            warn!("Final checkpoint failed: {}", e);
        }

        let stat = ParameterServerStat {
            n_steps: self.n_steps,
            n_requests: self.n_requests,
            version: self.store.version(),
            duration: t.elapsed(),
        };
        info!("Parameter server stopped\n{}", stat.fmt());
        result.map(|_| stat)
    }
}
