use super::{Record, RecordValue};
use std::collections::BTreeMap;

/// Writes records to an output destination.
///
/// [`Recorder::write`] outputs a record immediately. [`Recorder::store`] keeps
/// records until [`Recorder::flush`] writes their aggregate, see [`aggregate`].
pub trait Recorder: Send {
    /// Writes a record.
    fn write(&mut self, record: Record);

    /// Stores a record for aggregation.
    fn store(&mut self, record: Record);

    /// Writes the aggregate of stored records with the given step and clears them.
    fn flush(&mut self, step: i64);
}

/// Aggregates records into one.
///
/// Scalars are averaged over the records containing them; for other values
/// the last one wins.
pub fn aggregate(records: Vec<Record>) -> Record {
    let mut sums: BTreeMap<String, (f32, usize)> = BTreeMap::new();
    let mut out = Record::empty();
    for record in records {
        for (k, v) in record {
            match v {
                RecordValue::Scalar(x) => {
                    let e = sums.entry(k).or_insert((0.0, 0));
                    e.0 += x;
                    e.1 += 1;
                }
                v => out.insert(k, v),
            }
        }
    }
    for (k, (sum, n)) in sums {
        out.insert(k, RecordValue::Scalar(sum / n as f32));
    }
    out
}

/// Keeps written records in memory.
#[derive(Default)]
pub struct BufferedRecorder {
    buf: Vec<Record>,
    stored: Vec<Record>,
}

impl BufferedRecorder {
    /// Constructs the recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterates over written records.
    pub fn iter(&self) -> std::slice::Iter<Record> {
        self.buf.iter()
    }

    /// Number of written records.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if no record was written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

impl Recorder for BufferedRecorder {
    fn write(&mut self, record: Record) {
        self.buf.push(record);
    }

    fn store(&mut self, record: Record) {
        self.stored.push(record);
    }

    fn flush(&mut self, step: i64) {
        if self.stored.is_empty() {
            return;
        }
        let mut record = aggregate(std::mem::take(&mut self.stored));
        record.insert("step", RecordValue::Scalar(step as f32));
        self.buf.push(record);
    }
}

/// A recorder that ignores any record.
pub struct NullRecorder {}

impl Recorder for NullRecorder {
    fn write(&mut self, _record: Record) {}

    fn store(&mut self, _record: Record) {}

    fn flush(&mut self, _step: i64) {}
}

/// Writes records with [`log::info!`], prefixed by a component label.
pub struct LogRecorder {
    label: String,
    stored: Vec<Record>,
}

impl LogRecorder {
    /// Constructs the recorder.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            stored: vec![],
        }
    }
}

impl Recorder for LogRecorder {
    fn write(&mut self, record: Record) {
        log::info!("[{}] {}", self.label, record);
    }

    fn store(&mut self, record: Record) {
        self.stored.push(record);
    }

    fn flush(&mut self, step: i64) {
        if self.stored.is_empty() {
            return;
        }
        let record = aggregate(std::mem::take(&mut self.stored));
        log::info!("[{}] step {}: {}", self.label, step, record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flush_averages_scalars() {
        let mut recorder = BufferedRecorder::new();
        recorder.store(Record::from_scalar("loss", 1.0));
        recorder.store(Record::from_scalar("loss", 3.0));
        recorder.store(Record::from_slice(&[
            ("lr", RecordValue::Scalar(0.1)),
            ("datetime", RecordValue::DateTime(chrono::Local::now())),
        ]));
        recorder.flush(10);
        recorder.flush(11);

        assert_eq!(recorder.len(), 1);
        let record = recorder.iter().next().unwrap();
        assert_eq!(record.get_scalar("loss"), Ok(2.0));
        assert_eq!(record.get_scalar("lr"), Ok(0.1));
        assert_eq!(record.get_scalar("step"), Ok(10.0));
        assert!(matches!(record.get("datetime"), Some(RecordValue::DateTime(_))));
    }
}
