use super::{HookContext, ParameterServerHook, Stage};
use anyhow::Result;
use log::{debug, info};
use mava_core::parameters::{counters, ParamValue};
use std::time::{Duration, Instant};

/// Logs traffic at debug level and counters at info level.
pub struct ParameterServerLogger {
    interval: Duration,
    last: Instant,
}

impl ParameterServerLogger {
    /// Logs counters at most once per `seconds`.
    pub fn new(seconds: f64) -> Self {
        Self {
            interval: Duration::from_secs_f64(seconds.max(0.0)),
            last: Instant::now(),
        }
    }
}

impl ParameterServerHook for ParameterServerLogger {
    fn name(&self) -> &str {
        "logger"
    }

    fn on_stage(&mut self, stage: Stage, ctx: &mut HookContext<'_>) -> Result<()> {
        match stage {
            Stage::InitEnd => info!(
                "Parameter server holds {} parameters",
                ctx.store.names().len()
            ),
            Stage::GetParametersEnd => debug!("get {:?}", ctx.names),
            Stage::SetParametersEnd | Stage::AddToParametersEnd => {
                if let Some(updates) = ctx.updates {
                    debug!(
                        "{} {:?} -> version {}",
                        if stage == Stage::SetParametersEnd { "set" } else { "add" },
                        updates.keys().collect::<Vec<_>>(),
                        ctx.store.version()
                    );
                }
            }
            Stage::RunLoopEnd if self.last.elapsed() >= self.interval => {
                let mut s = String::new();
                for name in [
                    counters::TRAINER_STEPS,
                    counters::EXECUTOR_STEPS,
                    counters::EXECUTOR_EPISODES,
                    counters::EVALUATOR_EPISODES,
                ] {
                    if let Ok(ParamValue::Counter(c)) = ctx.store.value(name) {
                        s += format!("{}: {}, ", name, c).as_str();
                    }
                }
                info!("{}version: {}", s, ctx.store.version());
                self.last = Instant::now();
            }
            _ => {}
        }
        Ok(())
    }
}
