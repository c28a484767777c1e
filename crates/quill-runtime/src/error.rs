//! Runtime error surface.
//!
//! The runtime folds engine failures into a small taxonomy callers can
//! match on: memory exhaustion surfaces as [`RuntimeError::Allocation`],
//! host type installation problems as [`RuntimeError::Registration`], and
//! script-visible exceptions pass through on the
//! [`Script`](RuntimeError::Script) channel with their class intact.

use quill_engine::{EngineError, ScriptError};
use thiserror::Error;

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Failures surfaced by the runtime.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// Memory could not be obtained for a runtime structure.
    #[error("allocation failed: {0}")]
    Allocation(String),

    /// A host-defined type could not be installed into a context.
    #[error("type registration failed: {0}")]
    Registration(String),

    /// A script-level exception crossed into the host.
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// An engine failure with no script-level meaning, such as operating
    /// on a closed engine.
    #[error(transparent)]
    Engine(EngineError),
}

impl RuntimeError {
    /// The script exception inside, if this is one.
    pub fn as_script(&self) -> Option<&ScriptError> {
        match self {
            RuntimeError::Script(e) => Some(e),
            _ => None,
        }
    }
}

impl From<EngineError> for RuntimeError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::OutOfMemory { .. } => RuntimeError::Allocation(err.to_string()),
            EngineError::Script(e) => RuntimeError::Script(e),
            other => RuntimeError::Engine(other),
        }
    }
}
