use super::{HookContext, ParameterServerHook, Stage};
use anyhow::Result;
use log::info;
use mava_core::parameters::counters;

/// Ends the run when a counter reaches a limit.
pub struct TerminationCondition {
    counter: String,
    limit: i64,
}

impl TerminationCondition {
    /// Terminates when `counter` is at least `limit`.
    pub fn new(counter: impl Into<String>, limit: i64) -> Self {
        Self {
            counter: counter.into(),
            limit,
        }
    }

    /// Terminates after `n` trainer steps.
    pub fn max_trainer_steps(n: i64) -> Self {
        Self::new(counters::TRAINER_STEPS, n)
    }

    /// Terminates after `n` executor steps.
    pub fn max_executor_steps(n: i64) -> Self {
        Self::new(counters::EXECUTOR_STEPS, n)
    }
}

impl ParameterServerHook for TerminationCondition {
    fn name(&self) -> &str {
        "termination_condition"
    }

    fn on_stage(&mut self, stage: Stage, ctx: &mut HookContext<'_>) -> Result<()> {
        if stage == Stage::RunLoopTermination {
            let value = ctx.store.counter(&self.counter)?;
            if value >= self.limit {
                info!(
                    "Termination condition met: {} = {} >= {}",
                    self.counter, value, self.limit
                );
                ctx.terminate = true;
            }
        }
        Ok(())
    }
}
