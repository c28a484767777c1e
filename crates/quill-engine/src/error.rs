//! Engine error surfaces.
//!
//! Failures travel on two channels. [`ScriptError`] is the script-visible
//! exception channel: type errors, unresolved references, conversion
//! failures, and anything a native function raises. [`EngineError`] is the
//! host-boundary channel for failures no script handler can observe, such
//! as allocation over the configured ceiling or operations on a closed
//! engine; it also carries script errors across host calls.

use crate::context::ContextId;
use crate::value::ObjectId;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Script-visible exception classes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    /// Wrong kind of value for the operation.
    #[error("TypeError: {0}")]
    Type(String),

    /// A name or module that does not resolve.
    #[error("ReferenceError: {0}")]
    Reference(String),

    /// A bound was exceeded, including call stack exhaustion.
    #[error("RangeError: {0}")]
    Range(String),

    /// A value could not be converted to the requested representation.
    #[error("ConversionError: {0}")]
    Conversion(String),

    /// An engine-internal failure surfaced to script, such as running out
    /// of memory mid-call.
    #[error("InternalError: {0}")]
    Internal(String),

    /// A native module function reported failure.
    #[error("Error: {0}")]
    Module(String),
}

impl ScriptError {
    /// Exception class name, as scripts would observe it.
    pub fn class_name(&self) -> &'static str {
        match self {
            ScriptError::Type(_) => "TypeError",
            ScriptError::Reference(_) => "ReferenceError",
            ScriptError::Range(_) => "RangeError",
            ScriptError::Conversion(_) => "ConversionError",
            ScriptError::Internal(_) => "InternalError",
            ScriptError::Module(_) => "Error",
        }
    }

    /// Message without the class prefix.
    pub fn message(&self) -> &str {
        match self {
            ScriptError::Type(m)
            | ScriptError::Reference(m)
            | ScriptError::Range(m)
            | ScriptError::Conversion(m)
            | ScriptError::Internal(m)
            | ScriptError::Module(m) => m,
        }
    }
}

/// Host-boundary failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// An allocation would exceed the configured heap ceiling, and a
    /// collection pass did not free enough to admit it.
    #[error("out of memory: requested {requested} bytes with {allocated} of {limit} in use")]
    OutOfMemory {
        /// Bytes the failing allocation asked for.
        requested: usize,
        /// Bytes in use after the last collection attempt.
        allocated: usize,
        /// Configured ceiling in bytes.
        limit: usize,
    },

    /// The engine has been closed; no further operations are possible.
    #[error("engine is closed")]
    Closed,

    /// The context id does not name a live context.
    #[error("unknown context {0}")]
    UnknownContext(ContextId),

    /// A value handle referred to a freed heap slot.
    #[error("invalid value handle {0}")]
    InvalidHandle(ObjectId),

    /// A worker context was requested before a factory was registered.
    #[error("no worker context factory is registered")]
    NoWorkerFactory,

    /// A worker thread could not be started.
    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(String),

    /// A script-level exception crossed the host boundary.
    #[error(transparent)]
    Script(#[from] ScriptError),
}

impl EngineError {
    /// Collapse onto the script channel, for use inside native functions.
    ///
    /// Script errors pass through; host-boundary failures become
    /// `InternalError` exceptions, which is how scripts observe conditions
    /// like memory exhaustion during a call.
    pub fn into_script(self) -> ScriptError {
        match self {
            EngineError::Script(e) => e,
            other => ScriptError::Internal(other.to_string()),
        }
    }

    /// The script error inside, if this is one.
    pub fn as_script(&self) -> Option<&ScriptError> {
        match self {
            EngineError::Script(e) => Some(e),
            _ => None,
        }
    }
}
