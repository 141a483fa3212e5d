//! Key-value records of metrics.
//!
//! Executors, evaluators and trainers summarise what they did as [`Record`]s,
//! e.g., episode returns or losses, and hand them to a [`Recorder`].
//!
//! ```rust
//! use mava_core::record::{Record, RecordValue};
//!
//! let mut record = Record::from_scalar("episode_return", 12.5);
//! record.insert("episode_length", RecordValue::Scalar(50.0));
//! assert_eq!(record.get_scalar("episode_return").unwrap(), 12.5);
//! ```
mod base;
mod recorder;

pub use base::{Record, RecordValue};
pub use recorder::{aggregate, BufferedRecorder, LogRecorder, NullRecorder, Recorder};
