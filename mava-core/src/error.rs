//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
///
/// Functions in this workspace return [`anyhow::Result`]; callers that need to
/// react to a specific failure use `err.downcast_ref::<MavaError>()`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MavaError {
    /// A parameter name was never registered in the parameter store.
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    /// The value given for a parameter has a different kind than the stored one.
    #[error("Type mismatch for parameter {name}: expected {expected}, got {actual}")]
    ParameterTypeMismatch {
        /// Parameter name.
        name: String,
        /// Kind of the stored value.
        expected: String,
        /// Kind of the given value.
        actual: String,
    },

    /// The array given for a parameter has a different shape than the stored one.
    #[error("Shape mismatch for parameter {name}: expected {expected:?}, got {actual:?}")]
    ParameterShapeMismatch {
        /// Parameter name.
        name: String,
        /// Shape of the stored array.
        expected: Vec<usize>,
        /// Shape of the given array.
        actual: Vec<usize>,
    },

    /// Adding to a counter would overflow it.
    #[error("Counter {name} overflows when adding {delta} to {value}")]
    CounterOverflow {
        /// Parameter name.
        name: String,
        /// Current value.
        value: i64,
        /// Delta to add.
        delta: i64,
    },

    /// No network is assigned to the agent.
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    /// A policy selected an action outside of the action space of the agent.
    #[error("Action {action} of agent {agent} is outside of its action space {spec}")]
    ActionOutOfSpace {
        /// Agent id.
        agent: String,
        /// Debug representation of the action.
        action: String,
        /// Debug representation of the action space.
        spec: String,
    },

    /// An executor operation was called in a state that does not allow it.
    #[error("Executor is in state {state}, cannot {operation}")]
    InvalidExecutorState {
        /// Current state.
        state: String,
        /// Requested operation.
        operation: String,
    },

    /// A record does not match the signature of the data server table.
    #[error("Record does not match adder signature: {0}")]
    SignatureMismatch(String),

    /// A request to the parameter server was not answered in time.
    #[error("Parameter server did not reply within {0} ms")]
    RpcTimeout(u64),

    /// The parameter server is not reachable anymore.
    #[error("Parameter server disconnected")]
    RpcDisconnected,

    /// Too many consecutive transient failures in a parameter client.
    #[error("Parameter client gave up after {0} consecutive failures")]
    RetriesExhausted(usize),

    /// The data server was closed.
    #[error("Data server closed")]
    DataServerClosed,

    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),
}

impl MavaError {
    /// Returns `true` if the error may disappear by retrying the same request.
    pub fn is_transient(&self) -> bool {
        matches!(self, MavaError::RpcTimeout(_) | MavaError::RpcDisconnected)
    }
}

/// Returns `true` if `err` wraps a transient [`MavaError`].
pub fn is_transient(err: &anyhow::Error) -> bool {
    err.downcast_ref::<MavaError>()
        .map(MavaError::is_transient)
        .unwrap_or(false)
}
