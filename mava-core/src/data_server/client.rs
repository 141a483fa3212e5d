use super::DataServer;
use crate::adder::{ExperienceWriter, SignedRecord};
use anyhow::Result;

/// Writer of an executor, appending records to a [`DataServer`] in chunks.
///
/// Records are buffered until `n_buffer` of them are collected or an
/// episode ends.
pub struct DataServerClient<T> {
    server: DataServer<T>,
    n_buffer: usize,
    buffer: Vec<T>,
}

impl<T: SignedRecord + Clone + Send> DataServerClient<T> {
    /// Creates a client of `server`.
    pub fn new(server: DataServer<T>, n_buffer: usize) -> Self {
        let n_buffer = n_buffer.max(1);
        Self {
            server,
            n_buffer,
            buffer: Vec::with_capacity(n_buffer),
        }
    }

    /// Appends buffered records to the server.
    pub fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let buffer = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.n_buffer));
        self.server.append_many(buffer)
    }
}

impl<T: SignedRecord + Clone + Send> ExperienceWriter<T> for DataServerClient<T> {
    fn write(&mut self, record: T) -> Result<()> {
        self.buffer.push(record);
        if self.buffer.len() >= self.n_buffer {
            self.flush()?;
        }
        Ok(())
    }

    fn end_episode(&mut self) -> Result<()> {
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adder::{AdderSignature, ParallelAdder, ParallelTransitionAdder},
        base::{Action, Observation, StepType, TimeStep},
        data_server::DataServerConfig,
    };
    use ndarray::array;
    use std::collections::BTreeMap;

    fn timestep(step_type: StepType) -> TimeStep {
        TimeStep {
            step_type,
            observations: BTreeMap::from([(
                "agent_0".to_string(),
                Observation::new(array![0.0f32]),
            )]),
            rewards: BTreeMap::from([("agent_0".to_string(), 0.0)]),
            discounts: BTreeMap::from([("agent_0".to_string(), 1.0)]),
        }
    }

    #[test]
    fn test_buffered_until_episode_end() -> Result<()> {
        let server = DataServer::new(
            DataServerConfig::default(),
            AdderSignature {
                observation_shapes: BTreeMap::from([("agent_0".to_string(), vec![1])]),
                sequence_length: None,
            },
        );
        let mut adder = ParallelTransitionAdder::new(DataServerClient::new(server.clone(), 4));
        let actions = BTreeMap::from([("agent_0".to_string(), Action::Discrete(0))]);

        adder.add_first(&timestep(StepType::First))?;
        adder.add(&actions, &timestep(StepType::Mid), &BTreeMap::new())?;
        adder.add(&actions, &timestep(StepType::Mid), &BTreeMap::new())?;
        assert_eq!(server.len(), 0);
        adder.add(&actions, &timestep(StepType::Last), &BTreeMap::new())?;
        assert_eq!(server.len(), 3);
        Ok(())
    }
}
