use super::{ParamValue, Parameters};
use crate::error::MavaError;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Copy of parameter values at a version of a [`ParameterStore`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSnapshot {
    /// Version of the store when the snapshot was taken.
    pub version: u64,

    /// Parameter values.
    pub values: Parameters,
}

/// Named parameters with a version bumped on every change.
///
/// The set of names is fixed at construction. Reads and writes naming an
/// unregistered parameter fail with [`MavaError::UnknownParameter`] and a
/// failing write leaves every value untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterStore {
    values: Parameters,
    version: u64,
}

impl ParameterStore {
    /// Creates a store with the given parameters at version 0.
    pub fn new(values: Parameters) -> Self {
        Self { values, version: 0 }
    }

    /// Current version.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Registered names.
    pub fn names(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    /// Returns `true` if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Value of a single parameter.
    pub fn value(&self, name: &str) -> Result<&ParamValue> {
        Ok(self
            .values
            .get(name)
            .ok_or_else(|| MavaError::UnknownParameter(name.to_string()))?)
    }

    /// Value of a counter.
    pub fn counter(&self, name: &str) -> Result<i64> {
        let value = self.value(name)?;
        Ok(value
            .as_counter()
            .ok_or_else(|| MavaError::ParameterTypeMismatch {
                name: name.to_string(),
                expected: "Counter".to_string(),
                actual: value.kind().to_string(),
            })?)
    }

    /// Snapshot of the named parameters.
    pub fn get(&self, names: &[String]) -> Result<ParameterSnapshot> {
        let mut values = Parameters::new();
        for name in names {
            values.insert(name.clone(), self.value(name)?.clone());
        }
        Ok(ParameterSnapshot {
            version: self.version,
            values,
        })
    }

    /// Snapshot of all parameters.
    pub fn snapshot(&self) -> ParameterSnapshot {
        ParameterSnapshot {
            version: self.version,
            values: self.values.clone(),
        }
    }

    /// Overwrites the named parameters and returns the new version.
    pub fn set(&mut self, updates: &Parameters) -> Result<u64> {
        for (name, value) in updates.iter() {
            self.value(name)?.check_compatible(name, value)?;
        }
        for (name, value) in updates.iter() {
            self.values.insert(name.clone(), value.clone());
        }
        Ok(self.bump(updates))
    }

    /// Adds deltas to the named parameters and returns the new version.
    pub fn add(&mut self, updates: &Parameters) -> Result<u64> {
        for (name, delta) in updates.iter() {
            self.value(name)?.check_addable(name, delta)?;
        }
        for (name, delta) in updates.iter() {
            if let Some(value) = self.values.get_mut(name) {
                value.add_assign(name, delta)?;
            }
        }
        Ok(self.bump(updates))
    }

    /// Loads values from a snapshot.
    ///
    /// Registered names found in the snapshot with a compatible value are
    /// overwritten; everything else keeps its current value. The version is
    /// taken from the snapshot. Returns the number of restored parameters.
    pub fn restore(&mut self, snapshot: ParameterSnapshot) -> usize {
        let mut n = 0;
        for (name, value) in snapshot.values {
            match self.values.get_mut(&name) {
                Some(current) => match current.check_compatible(&name, &value) {
                    Ok(()) => {
                        *current = value;
                        n += 1;
                    }
                    Err(e) => log::warn!("Skip restoring {}: {}", name, e),
                },
                None => log::warn!("Skip restoring unregistered parameter {}", name),
            }
        }
        self.version = self.version.max(snapshot.version);
        n
    }

    fn bump(&mut self, updates: &Parameters) -> u64 {
        if !updates.is_empty() {
            self.version += 1;
        }
        self.version
    }
}
