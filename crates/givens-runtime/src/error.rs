//! Errors raised while executing a plan.
//!
//! These are distinct from resolution errors: a plan that resolved can still
//! fail at run time because a factory is missing, a factory fails, or a
//! value has an unexpected type.

use crate::factory::FactoryError;
use givens_solver::{FqName, NodeId};
use std::fmt;
use std::sync::Arc;

#[derive(Debug)]
pub enum RuntimeError {
    /// No factory is registered for a declaration the plan invokes.
    MissingFactory { origin: FqName },
    /// A registered factory returned an error.
    FactoryFailed { origin: FqName, source: FactoryError },
    /// A node, entry point, input or scope instance the plan refers to is not
    /// available.
    MissingBinding { what: String, scope: Arc<str> },
    /// A value did not have the type its consumer expected.
    TypeMismatch { expected: String, found: String },
    /// Initializing an eager node failed, so its scope instance was not built.
    EagerInit { node: NodeId, source: Box<RuntimeError> },
}

impl RuntimeError {
    pub(crate) fn mismatch<T: ?Sized>(found: impl Into<String>) -> Self {
        RuntimeError::TypeMismatch {
            expected: std::any::type_name::<T>().to_string(),
            found: found.into(),
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::MissingFactory { origin } => {
                write!(f, "No factory registered for '{origin}'.")
            }
            RuntimeError::FactoryFailed { origin, source } => {
                write!(f, "Factory '{origin}' failed: {source}")
            }
            RuntimeError::MissingBinding { what, scope } => {
                write!(f, "{what} is not available in scope '{scope}'.")
            }
            RuntimeError::TypeMismatch { expected, found } => {
                write!(f, "Expected a value of type '{expected}', found {found}.")
            }
            RuntimeError::EagerInit { node, source } => {
                write!(f, "Eager initialization of node #{} failed: {source}", node.0)
            }
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuntimeError::FactoryFailed { source, .. } => Some(source.as_ref()),
            RuntimeError::EagerInit { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
