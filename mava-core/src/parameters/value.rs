use crate::error::MavaError;
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

/// Value of a parameter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    /// Integer counter, e.g., the number of trainer steps.
    Counter(i64),

    /// Array of any shape, e.g., network weights.
    Array(ArrayD<f32>),
}

impl ParamValue {
    /// Zero-dimensional array holding `x`.
    pub fn scalar(x: f32) -> Self {
        Self::Array(ArrayD::from_elem(IxDyn(&[]), x))
    }

    /// Name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Counter(_) => "Counter",
            Self::Array(_) => "Array",
        }
    }

    /// Shape of the value, empty for counters.
    pub fn shape(&self) -> Vec<usize> {
        match self {
            Self::Counter(_) => vec![],
            Self::Array(a) => a.shape().to_vec(),
        }
    }

    /// Value of a counter.
    pub fn as_counter(&self) -> Option<i64> {
        match self {
            Self::Counter(c) => Some(*c),
            _ => None,
        }
    }

    /// Value of an array.
    pub fn as_array(&self) -> Option<&ArrayD<f32>> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Value of a zero-dimensional array.
    pub fn as_scalar(&self) -> Option<f32> {
        match self {
            Self::Array(a) if a.ndim() == 0 => a.first().copied(),
            _ => None,
        }
    }

    /// Checks that `other` can replace or be added to `self`.
    pub fn check_compatible(&self, name: &str, other: &ParamValue) -> Result<(), MavaError> {
        if self.kind() != other.kind() {
            return Err(MavaError::ParameterTypeMismatch {
                name: name.to_string(),
                expected: self.kind().to_string(),
                actual: other.kind().to_string(),
            });
        }
        if self.shape() != other.shape() {
            return Err(MavaError::ParameterShapeMismatch {
                name: name.to_string(),
                expected: self.shape(),
                actual: other.shape(),
            });
        }
        Ok(())
    }

    /// Checks that `delta` can be added to `self` without overflow.
    pub fn check_addable(&self, name: &str, delta: &ParamValue) -> Result<(), MavaError> {
        self.check_compatible(name, delta)?;
        if let (Self::Counter(c), Self::Counter(d)) = (self, delta) {
            c.checked_add(*d).ok_or_else(|| MavaError::CounterOverflow {
                name: name.to_string(),
                value: *c,
                delta: *d,
            })?;
        }
        Ok(())
    }

    /// Adds `delta` elementwise.
    ///
    /// On error `self` is left unchanged.
    pub fn add_assign(&mut self, name: &str, delta: &ParamValue) -> Result<(), MavaError> {
        self.check_addable(name, delta)?;
        match self {
            Self::Counter(c) => {
                if let Self::Counter(d) = delta {
                    *c = c.saturating_add(*d);
                }
            }
            Self::Array(a) => {
                if let Self::Array(d) = delta {
                    *a += d;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_add_assign() {
        let mut c = ParamValue::Counter(3);
        c.add_assign("c", &ParamValue::Counter(2)).unwrap();
        assert_eq!(c, ParamValue::Counter(5));

        let mut a = ParamValue::Array(array![1.0f32, 2.0].into_dyn());
        a.add_assign("a", &ParamValue::Array(array![0.5f32, -1.0].into_dyn()))
            .unwrap();
        assert_eq!(a, ParamValue::Array(array![1.5f32, 1.0].into_dyn()));

        let mut s = ParamValue::scalar(1.0);
        s.add_assign("s", &ParamValue::scalar(0.25)).unwrap();
        assert_eq!(s.as_scalar(), Some(1.25));
    }

    #[test]
    fn test_incompatible_values() {
        let mut a = ParamValue::Array(array![1.0f32, 2.0].into_dyn());
        let err = a
            .add_assign("a", &ParamValue::Array(array![1.0f32].into_dyn()))
            .unwrap_err();
        assert_eq!(
            err,
            MavaError::ParameterShapeMismatch {
                name: "a".to_string(),
                expected: vec![2],
                actual: vec![1],
            }
        );

        let err = a.add_assign("a", &ParamValue::Counter(1)).unwrap_err();
        assert!(matches!(err, MavaError::ParameterTypeMismatch { .. }));
        assert_eq!(a, ParamValue::Array(array![1.0f32, 2.0].into_dyn()));
    }

    #[test]
    fn test_counter_overflow() {
        let mut c = ParamValue::Counter(i64::MAX);
        let err = c.add_assign("c", &ParamValue::Counter(1)).unwrap_err();
        assert_eq!(
            err,
            MavaError::CounterOverflow {
                name: "c".to_string(),
                value: i64::MAX,
                delta: 1,
            }
        );
        assert_eq!(c, ParamValue::Counter(i64::MAX));

        let mut c = ParamValue::Counter(i64::MIN);
        assert!(c.add_assign("c", &ParamValue::Counter(-1)).is_err());
        c.add_assign("c", &ParamValue::Counter(1)).unwrap();
        assert_eq!(c, ParamValue::Counter(i64::MIN + 1));
    }
}
