use super::{base::require_first, AdderSignature, ExperienceWriter, ParallelAdder, SignedRecord};
use crate::{
    base::{Actions, AgentId, Extras, Observation, TimeStep},
    error::MavaError,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single step of all agents.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// Observations before the actions.
    pub observations: BTreeMap<AgentId, Observation>,

    /// Actions taken.
    pub actions: Actions,

    /// Rewards received after the actions.
    pub rewards: BTreeMap<AgentId, f32>,

    /// Discounts after the actions.
    pub discounts: BTreeMap<AgentId, f32>,

    /// Observations after the actions.
    pub next_observations: BTreeMap<AgentId, Observation>,

    /// Extra values, e.g., log-probabilities of the actions.
    pub extras: Extras,
}

impl SignedRecord for Transition {
    fn check_signature(&self, signature: &AdderSignature) -> Result<(), MavaError> {
        if let Some(len) = signature.sequence_length {
            return Err(MavaError::SignatureMismatch(format!(
                "expected sequences of length {}, got a transition",
                len
            )));
        }
        signature.check_step(&self.observations, &self.actions)?;
        signature.check_step(&self.next_observations, &self.actions)
    }
}

/// Writes one [`Transition`] per step.
pub struct ParallelTransitionAdder<W> {
    writer: W,
    observations: Option<BTreeMap<AgentId, Observation>>,
    episodes: usize,
}

impl<W: ExperienceWriter<Transition>> ParallelTransitionAdder<W> {
    /// Creates an adder writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            observations: None,
            episodes: 0,
        }
    }

    /// The underlying writer.
    pub fn writer(&self) -> &W {
        &self.writer
    }
}

impl<W: ExperienceWriter<Transition>> ParallelAdder for ParallelTransitionAdder<W> {
    fn add_first(&mut self, timestep: &TimeStep) -> Result<()> {
        self.observations = Some(timestep.observations.clone());
        Ok(())
    }

    fn add(&mut self, actions: &Actions, next_timestep: &TimeStep, extras: &Extras) -> Result<()> {
        let observations = require_first(&self.observations, "add")?.clone();
        self.writer.write(Transition {
            observations,
            actions: actions.clone(),
            rewards: next_timestep.rewards.clone(),
            discounts: next_timestep.discounts.clone(),
            next_observations: next_timestep.observations.clone(),
            extras: extras.clone(),
        })?;

        if next_timestep.last() {
            self.observations = None;
            self.episodes += 1;
            self.writer.end_episode()?;
        } else {
            self.observations = Some(next_timestep.observations.clone());
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.observations = None;
    }

    fn episodes(&self) -> usize {
        self.episodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adder::test_utils::VecWriter,
        base::{Action, StepType},
    };
    use ndarray::array;

    fn timestep(step_type: StepType, x: f32) -> TimeStep {
        TimeStep {
            step_type,
            observations: BTreeMap::from([(
                "agent_0".to_string(),
                Observation::new(array![x, x]),
            )]),
            rewards: BTreeMap::from([("agent_0".to_string(), x)]),
            discounts: BTreeMap::from([("agent_0".to_string(), 1.0)]),
        }
    }

    fn actions() -> Actions {
        BTreeMap::from([("agent_0".to_string(), Action::Discrete(1))])
    }

    #[test]
    fn test_transitions_and_boundary() -> Result<()> {
        let mut adder = ParallelTransitionAdder::new(VecWriter::default());
        adder.add_first(&timestep(StepType::First, 0.0))?;
        adder.add(&actions(), &timestep(StepType::Mid, 1.0), &Extras::new())?;
        adder.add(&actions(), &timestep(StepType::Last, 2.0), &Extras::new())?;

        let writer = adder.writer();
        assert_eq!(writer.records.len(), 2);
        assert_eq!(writer.episodes, 1);
        assert_eq!(adder.episodes(), 1);
        let second = &writer.records[1];
        assert_eq!(second.observations["agent_0"].observation, array![1.0f32, 1.0]);
        assert_eq!(
            second.next_observations["agent_0"].observation,
            array![2.0f32, 2.0]
        );
        assert_eq!(second.rewards["agent_0"], 2.0);
        Ok(())
    }

    #[test]
    fn test_add_before_first_fails() {
        let mut adder = ParallelTransitionAdder::new(VecWriter::default());
        let err = adder
            .add(&actions(), &timestep(StepType::Mid, 1.0), &Extras::new())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MavaError>(),
            Some(MavaError::InvalidExecutorState { .. })
        ));
    }

    #[test]
    fn test_reset_drops_unfinished_episode() -> Result<()> {
        let mut adder = ParallelTransitionAdder::new(VecWriter::default());
        adder.add_first(&timestep(StepType::First, 0.0))?;
        adder.add(&actions(), &timestep(StepType::Mid, 1.0), &Extras::new())?;
        adder.reset();
        assert!(adder
            .add(&actions(), &timestep(StepType::Mid, 2.0), &Extras::new())
            .is_err());
        assert_eq!(adder.writer().records.len(), 1);
        assert_eq!(adder.writer().episodes, 0);
        Ok(())
    }

    #[test]
    fn test_signature() {
        let signature = AdderSignature {
            observation_shapes: BTreeMap::from([("agent_0".to_string(), vec![2])]),
            sequence_length: None,
        };
        let transition = Transition {
            observations: timestep(StepType::First, 0.0).observations,
            actions: actions(),
            rewards: BTreeMap::new(),
            discounts: BTreeMap::new(),
            next_observations: timestep(StepType::Mid, 1.0).observations,
            extras: Extras::new(),
        };
        assert!(transition.check_signature(&signature).is_ok());

        let mut bad = transition;
        bad.next_observations.insert(
            "agent_0".to_string(),
            Observation::new(array![1.0f32, 2.0, 3.0]),
        );
        assert!(matches!(
            bad.check_signature(&signature),
            Err(MavaError::SignatureMismatch(_))
        ));
    }
}
