use super::ParameterServerConfig;
use anyhow::Result;
use mava_core::parameters::{ParameterSnapshot, ParameterStore, Parameters};

/// Stages of the parameter server at which hooks are called.
///
/// Stages of one operation are always visited in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Start of construction, before the store is populated.
    InitStart,
    /// The store holds the initial parameters and counters.
    Init,
    /// Restoring parameters from a checkpoint.
    InitCheckpointer,
    /// End of construction.
    InitEnd,
    /// Before reading parameters.
    GetParametersStart,
    /// Parameters were read; `snapshot` holds them.
    GetParameters,
    /// End of a read.
    GetParametersEnd,
    /// Before overwriting parameters.
    SetParametersStart,
    /// Parameters were overwritten.
    SetParameters,
    /// End of an overwrite.
    SetParametersEnd,
    /// Before adding to parameters.
    AddToParametersStart,
    /// Deltas were added.
    AddToParameters,
    /// End of an addition.
    AddToParametersEnd,
    /// Start of a step of the run loop.
    RunLoopStart,
    /// Saving a checkpoint if due.
    RunLoopCheckpoint,
    /// Main part of a step, before waiting for requests.
    RunLoop,
    /// Deciding whether the run terminates.
    RunLoopTermination,
    /// End of a step.
    RunLoopEnd,
}

impl Stage {
    /// Name of the hook method of the stage.
    pub fn name(&self) -> &'static str {
        match self {
            Self::InitStart => "on_parameter_server_init_start",
            Self::Init => "on_parameter_server_init",
            Self::InitCheckpointer => "on_parameter_server_init_checkpointer",
            Self::InitEnd => "on_parameter_server_init_end",
            Self::GetParametersStart => "on_parameter_server_get_parameters_start",
            Self::GetParameters => "on_parameter_server_get_parameters",
            Self::GetParametersEnd => "on_parameter_server_get_parameters_end",
            Self::SetParametersStart => "on_parameter_server_set_parameters_start",
            Self::SetParameters => "on_parameter_server_set_parameters",
            Self::SetParametersEnd => "on_parameter_server_set_parameters_end",
            Self::AddToParametersStart => "on_parameter_server_add_to_parameters_start",
            Self::AddToParameters => "on_parameter_server_add_to_parameters",
            Self::AddToParametersEnd => "on_parameter_server_add_to_parameters_end",
            Self::RunLoopStart => "on_parameter_server_run_loop_start",
            Self::RunLoopCheckpoint => "on_parameter_server_run_loop_checkpoint",
            Self::RunLoop => "on_parameter_server_run_loop",
            Self::RunLoopTermination => "on_parameter_server_run_loop_termination",
            Self::RunLoopEnd => "on_parameter_server_run_loop_end",
        }
    }

    /// Stages of construction.
    pub const INIT: [Stage; 4] = [
        Self::InitStart,
        Self::Init,
        Self::InitCheckpointer,
        Self::InitEnd,
    ];

    /// Stages of a step of the run loop.
    pub const RUN_LOOP: [Stage; 5] = [
        Self::RunLoopStart,
        Self::RunLoopCheckpoint,
        Self::RunLoop,
        Self::RunLoopTermination,
        Self::RunLoopEnd,
    ];
}

/// State visible to hooks.
pub struct HookContext<'a> {
    /// The parameter store.
    pub store: &'a mut ParameterStore,

    /// Configuration of the server.
    pub config: &'a ParameterServerConfig,

    /// Names of a read, empty at other stages.
    pub names: &'a [String],

    /// Values of an overwrite or deltas of an addition.
    pub updates: Option<&'a Parameters>,

    /// Result of a read, at [`Stage::GetParameters`] and [`Stage::GetParametersEnd`].
    pub snapshot: Option<&'a ParameterSnapshot>,

    /// Set at the final checkpoint, written regardless of the interval.
    pub force_checkpoint: bool,

    /// Set by hooks at [`Stage::RunLoopTermination`] to end the run.
    pub terminate: bool,
}

/// Extends the behavior of a parameter server.
///
/// Hooks are called in registration order at every [`Stage`]. An error
/// returned by a hook aborts the operation and is returned to its caller.
pub trait ParameterServerHook: Send {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Called at every stage.
    fn on_stage(&mut self, stage: Stage, ctx: &mut HookContext<'_>) -> Result<()>;
}
