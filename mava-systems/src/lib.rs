#![warn(missing_docs)]
//! Distributed components of a multi-agent reinforcement learning system.
//!
//! Each component runs a sequential loop in its own thread:
//!
//! * [`ParameterServer`](parameter_server::ParameterServer) holds parameters
//!   and counters, and serves requests of parameter clients.
//! * [`EnvironmentLoop`](executor::EnvironmentLoop) runs an
//!   [`Executor`](executor::Executor) in an environment and writes experience
//!   to a data server. Without an adder the executor is an evaluator.
//! * [`Trainer`](trainer::Trainer) consumes batches and publishes updates.
//! * [`Distributor`](distributor::Distributor) builds and launches a system.
//!
//! Components never share state: parameters go through
//! [`ParameterServerHandle`](parameter_server::ParameterServerHandle)s and
//! experience through the data server. A [`StopSignal`] shuts everything down.
pub mod distributor;
pub mod executor;
pub mod parameter_client;
pub mod parameter_server;
pub mod trainer;
mod stop;
pub use stop::StopSignal;
