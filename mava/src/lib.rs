//! Distributed multi-agent reinforcement learning in Rust.
//!
//! Mava consists of the following crates:
//!
//! * [mava-core](mava_core) provides environment and policy traits, named
//!   parameters, adders and the data server. Nothing in it knows about
//!   threads.
//! * [mava-systems](mava_systems) provides the parameter server with its
//!   hooks, parameter clients, executors, trainers and the distributor
//!   launching them as a system.
//!
//! This crate re-exports both and hosts the demo in `examples/`.
pub use mava_core as core;
pub use mava_systems as systems;
