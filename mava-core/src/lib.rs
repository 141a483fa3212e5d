#![warn(missing_docs)]
//! Core primitives of a distributed multi-agent reinforcement learning system.
//!
//! This crate has no notion of threads or processes. It provides the pieces
//! shared by the components in `mava-systems`: environment and policy traits,
//! named parameters, adders writing experience and the data server buffering it.
pub mod adder;
pub mod data_server;
pub mod debugging;
pub mod error;
pub mod parameters;
pub mod record;

mod base;
pub use base::{
    agent_net_keys, Action, ActionDistribution, ActionSpec, Actions, AgentId, AgentSpec,
    EnvironmentSpec, Extras, MultiAgentEnv, NetworkFactory, Networks, Observation,
    ObservationSpec, ParameterUpdate, Policy, PolicyInfo, StepType, TimeStep, Updater,
};
pub use error::MavaError;
