use super::{base::require_first, AdderSignature, ExperienceWriter, ParallelAdder, SignedRecord};
use crate::{
    base::{Action, Actions, AgentId, Extras, Observation, TimeStep},
    error::MavaError,
};
use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// A step of all agents in a [`Sequence`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SequenceStep {
    /// Observations before the actions.
    pub observations: BTreeMap<AgentId, Observation>,

    /// Actions taken.
    pub actions: Actions,

    /// Rewards received after the actions.
    pub rewards: BTreeMap<AgentId, f32>,

    /// Discounts after the actions.
    pub discounts: BTreeMap<AgentId, f32>,

    /// Extra values, e.g., log-probabilities of the actions.
    pub extras: Extras,
}

impl SequenceStep {
    /// Padding step with zero observations, actions, rewards and discounts.
    fn zeros_like(&self) -> Self {
        let zero_f32 = |m: &BTreeMap<AgentId, f32>| -> BTreeMap<AgentId, f32> {
            m.keys().map(|k| (k.clone(), 0.0)).collect()
        };
        Self {
            observations: self
                .observations
                .iter()
                .map(|(id, obs)| (id.clone(), obs.zeros_like()))
                .collect(),
            actions: self
                .actions
                .iter()
                .map(|(id, a)| {
                    let zero = match a {
                        Action::Discrete(_) => Action::Discrete(0),
                        Action::Continuous(v) => Action::Continuous(vec![0.0; v.len()]),
                    };
                    (id.clone(), zero)
                })
                .collect(),
            rewards: zero_f32(&self.rewards),
            discounts: zero_f32(&self.discounts),
            extras: self
                .extras
                .iter()
                .map(|(id, e)| (id.clone(), e.keys().map(|k| (k.clone(), 0.0)).collect()))
                .collect(),
        }
    }
}

/// Fixed-length window of steps.
///
/// Windows reaching past the end of an episode are padded with zero steps;
/// `mask[i]` is `false` for padding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    /// Steps in the window.
    pub steps: Vec<SequenceStep>,

    /// Validity of each step.
    pub mask: Vec<bool>,
}

impl Sequence {
    /// Number of valid steps.
    pub fn n_valid(&self) -> usize {
        self.mask.iter().filter(|m| **m).count()
    }
}

impl SignedRecord for Sequence {
    fn check_signature(&self, signature: &AdderSignature) -> Result<(), MavaError> {
        let len = signature.sequence_length.ok_or_else(|| {
            MavaError::SignatureMismatch("expected transitions, got a sequence".to_string())
        })?;
        if self.steps.len() != len || self.mask.len() != len {
            return Err(MavaError::SignatureMismatch(format!(
                "sequence has {} steps and {} mask entries, expected {}",
                self.steps.len(),
                self.mask.len(),
                len
            )));
        }
        for step in self.steps.iter() {
            signature.check_step(&step.observations, &step.actions)?;
        }
        Ok(())
    }
}

/// Writes overlapping windows of `sequence_length` steps.
///
/// Windows start every `period` steps of an episode. At the end of an episode,
/// windows that started but are incomplete are written with zero padding.
pub struct ParallelSequenceAdder<W> {
    writer: W,
    sequence_length: usize,
    period: usize,
    buffer: VecDeque<SequenceStep>,
    skip: usize,
    observations: Option<BTreeMap<AgentId, Observation>>,
    episodes: usize,
}

impl<W: ExperienceWriter<Sequence>> ParallelSequenceAdder<W> {
    /// Creates an adder writing to `writer`.
    pub fn new(writer: W, sequence_length: usize, period: usize) -> Result<Self> {
        ensure!(sequence_length > 0, "sequence_length must be positive");
        ensure!(period > 0, "period must be positive");
        Ok(Self {
            writer,
            sequence_length,
            period,
            buffer: VecDeque::with_capacity(sequence_length),
            skip: 0,
            observations: None,
            episodes: 0,
        })
    }

    /// The underlying writer.
    pub fn writer(&self) -> &W {
        &self.writer
    }

    fn write_window(&mut self) -> Result<()> {
        let n = self.buffer.len().min(self.sequence_length);
        let mut steps: Vec<SequenceStep> = self.buffer.iter().take(n).cloned().collect();
        let mut mask = vec![true; n];
        if let Some(last) = steps.last() {
            let padding = last.zeros_like();
            steps.resize(self.sequence_length, padding);
            mask.resize(self.sequence_length, false);
        }
        self.writer.write(Sequence { steps, mask })?;

        let drop = self.period.min(self.buffer.len());
        self.buffer.drain(..drop);
        self.skip = self.period - drop;
        Ok(())
    }
}

impl<W: ExperienceWriter<Sequence>> ParallelAdder for ParallelSequenceAdder<W> {
    fn add_first(&mut self, timestep: &TimeStep) -> Result<()> {
        self.buffer.clear();
        self.skip = 0;
        self.observations = Some(timestep.observations.clone());
        Ok(())
    }

    fn add(&mut self, actions: &Actions, next_timestep: &TimeStep, extras: &Extras) -> Result<()> {
        let observations = require_first(&self.observations, "add")?.clone();
        if self.skip > 0 {
            self.skip -= 1;
        } else {
            self.buffer.push_back(SequenceStep {
                observations,
                actions: actions.clone(),
                rewards: next_timestep.rewards.clone(),
                discounts: next_timestep.discounts.clone(),
                extras: extras.clone(),
            });
        }
        if self.buffer.len() == self.sequence_length {
            self.write_window()?;
        }

        if next_timestep.last() {
            while !self.buffer.is_empty() {
                self.write_window()?;
            }
            self.skip = 0;
            self.observations = None;
            self.episodes += 1;
            self.writer.end_episode()?;
        } else {
            self.observations = Some(next_timestep.observations.clone());
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.skip = 0;
        self.observations = None;
    }

    fn episodes(&self) -> usize {
        self.episodes
    }
}
