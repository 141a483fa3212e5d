//! Parameter clients of executors and trainers.
mod base;
mod config;
mod executor;
mod trainer;
pub use base::ParameterClient;
pub use config::ParameterClientConfig;
pub use executor::ExecutorParameterClient;
pub use trainer::TrainerParameterClient;
