//! Update rules of trainers.
use crate::{data_server::Batch, parameters::Parameters, record::Record};
use anyhow::Result;

/// Parameter changes computed from a batch.
#[derive(Clone, Debug, Default)]
pub struct ParameterUpdate {
    /// Values overwriting parameters.
    pub set: Parameters,

    /// Deltas added to parameters.
    pub add: Parameters,

    /// Metrics of the update, e.g., losses.
    pub record: Record,
}

/// Computes parameter updates from batches of records of type `T`.
///
/// The update rule is not fixed by the framework; any learning algorithm
/// fits as long as it reads and writes parameters by name.
pub trait Updater<T>: Send {
    /// Names of parameters the update rule reads.
    fn parameter_names(&self) -> Vec<String>;

    /// Computes an update from a batch and the current parameter values.
    fn update(&mut self, batch: &Batch<T>, parameters: &Parameters) -> Result<ParameterUpdate>;
}
