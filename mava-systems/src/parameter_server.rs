//! Parameter server.
mod base;
mod checkpointer;
mod config;
mod handle;
mod hooks;
mod logger;
mod stat;
mod termination;
pub use base::ParameterServer;
pub use checkpointer::{Checkpointer, CHECKPOINT_FILE};
pub use config::ParameterServerConfig;
pub use handle::{ParameterServerHandle, ParameterServerRequest, PendingReply};
pub use hooks::{HookContext, ParameterServerHook, Stage};
pub use logger::ParameterServerLogger;
pub use stat::ParameterServerStat;
pub use termination::TerminationCondition;
