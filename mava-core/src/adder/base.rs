use crate::{
    base::{Actions, AgentId, EnvironmentSpec, Extras, Observation, TimeStep},
    error::MavaError,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Destination of records produced by an adder.
pub trait ExperienceWriter<T>: Send {
    /// Writes a record.
    fn write(&mut self, record: T) -> Result<()>;

    /// Marks the end of an episode.
    fn end_episode(&mut self) -> Result<()>;
}

impl<T, W: ExperienceWriter<T> + ?Sized> ExperienceWriter<T> for Box<W> {
    fn write(&mut self, record: T) -> Result<()> {
        (**self).write(record)
    }

    fn end_episode(&mut self) -> Result<()> {
        (**self).end_episode()
    }
}

/// Writes executor steps as records.
pub trait ParallelAdder: Send {
    /// Starts an episode with its first time step.
    fn add_first(&mut self, timestep: &TimeStep) -> Result<()>;

    /// Adds the actions taken and the time step they led to.
    fn add(&mut self, actions: &Actions, next_timestep: &TimeStep, extras: &Extras) -> Result<()>;

    /// Drops an unfinished episode.
    ///
    /// Records already written are kept and no episode end is signalled; the
    /// next call must be [`ParallelAdder::add_first`].
    fn reset(&mut self);

    /// Number of episodes ended so far.
    fn episodes(&self) -> usize;
}

/// Shape of records accepted by a data server table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdderSignature {
    /// Observation shapes of agents.
    pub observation_shapes: BTreeMap<AgentId, Vec<usize>>,

    /// Length of sequences, `None` for transitions.
    pub sequence_length: Option<usize>,
}

impl AdderSignature {
    /// Signature of records of an environment.
    pub fn from_spec(spec: &EnvironmentSpec, sequence_length: Option<usize>) -> Self {
        Self {
            observation_shapes: spec
                .iter()
                .map(|(id, agent)| (id.clone(), agent.observation.shape.clone()))
                .collect(),
            sequence_length,
        }
    }

    pub(crate) fn check_step(
        &self,
        observations: &BTreeMap<AgentId, Observation>,
        actions: &Actions,
    ) -> Result<(), MavaError> {
        if observations.len() != self.observation_shapes.len()
            || actions.len() != self.observation_shapes.len()
        {
            return Err(MavaError::SignatureMismatch(format!(
                "expected {} agents, got {} observations and {} actions",
                self.observation_shapes.len(),
                observations.len(),
                actions.len()
            )));
        }
        for (id, shape) in self.observation_shapes.iter() {
            let obs = observations.get(id).ok_or_else(|| {
                MavaError::SignatureMismatch(format!("missing observation of {}", id))
            })?;
            if obs.observation.shape() != shape.as_slice() {
                return Err(MavaError::SignatureMismatch(format!(
                    "observation of {} has shape {:?}, expected {:?}",
                    id,
                    obs.observation.shape(),
                    shape
                )));
            }
            if !actions.contains_key(id) {
                return Err(MavaError::SignatureMismatch(format!(
                    "missing action of {}",
                    id
                )));
            }
        }
        Ok(())
    }
}

/// A record that can be checked against an [`AdderSignature`].
pub trait SignedRecord {
    /// Returns an error if the record does not match the signature.
    fn check_signature(&self, signature: &AdderSignature) -> Result<(), MavaError>;
}

pub(super) fn require_first<'a, T>(
    pending: &'a Option<T>,
    operation: &str,
) -> Result<&'a T, MavaError> {
    pending.as_ref().ok_or_else(|| MavaError::InvalidExecutorState {
        state: "AwaitingFirstObservation".to_string(),
        operation: operation.to_string(),
    })
}
