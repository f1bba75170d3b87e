//! Error taxonomy for tree construction, host mutation and reconciliation
use crate::types::{HostId, ListSide};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcilerError {
    #[error("Malformed node: {details}")]
    MalformedNode { details: String },

    #[error("Node is already bound to host node {existing}; build a fresh tree for every version")]
    AlreadyBound { existing: HostId },

    #[error("Node <{what}> has no host binding; only a previously reconciled tree can be patched")]
    UnboundNode { what: String },

    #[error("Unknown host node {0}")]
    UnknownHandle(HostId),

    #[error("Host node {0} is not an element")]
    NotAnElement(HostId),

    #[error("Host node {child} is not a child of {parent}")]
    NotAChild { parent: HostId, child: HostId },

    #[error("Cannot insert {child} into {parent}: {details}")]
    HierarchyViolation {
        parent: HostId,
        child: HostId,
        details: String,
    },

    #[error("Duplicate key '{key}' in the {list} sibling list")]
    DuplicateKey { key: String, list: ListSide },

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("Python call failed: {0}")]
    PythonError(String),
}

#[cfg(feature = "python")]
mod python_interop {
    use super::ReconcilerError;
    use pyo3::{PyErr, exceptions::PyValueError};

    impl From<ReconcilerError> for PyErr {
        fn from(err: ReconcilerError) -> Self {
            PyValueError::new_err(err.to_string())
        }
    }

    impl From<PyErr> for ReconcilerError {
        fn from(err: PyErr) -> Self {
            ReconcilerError::PythonError(err.to_string())
        }
    }
}
