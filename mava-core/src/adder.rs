//! Adders turning executor steps into records for the data server.
//!
//! An adder receives the first time step of an episode with
//! [`ParallelAdder::add_first`] and every following step with
//! [`ParallelAdder::add`]. Completed records are handed to an
//! [`ExperienceWriter`]; at the last step of an episode the adder calls
//! [`ExperienceWriter::end_episode`] exactly once.
mod base;
mod sequence;
mod transition;
pub use base::{AdderSignature, ExperienceWriter, ParallelAdder, SignedRecord};
pub use sequence::{ParallelSequenceAdder, Sequence, SequenceStep};
pub use transition::{ParallelTransitionAdder, Transition};
