//! # Quill Engine
//!
//! The execution engine underneath the Quill runtime: a shared heap with
//! mark-and-sweep collection, isolated execution contexts, native function
//! dispatch, and the module boundary for SDK-defined capability modules.
//!
//! ## Architecture
//!
//! - [`Engine`] — shared heap, collector, and context table behind one lock
//! - [`Context`] — isolated global environment; all value operations
//! - [`Value`] / [`ObjectId`] — copyable value handles over heap slots
//! - [`Pinned`] — scoped ownership guard over one pin of a heap value
//! - [`spawn_worker`] — worker threads with factory-provisioned contexts
//! - [`value_to_native`] / [`native_to_value`] — SDK boundary conversion
//!
//! Ownership follows one rule throughout: operations that hand out heap
//! values hand out pins, and whoever holds the pin releases it exactly
//! once — usually by letting the [`Pinned`] guard drop.

#![warn(missing_docs)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::result_large_err)]

mod context;
mod engine;
mod error;
mod ffi;
mod gc;
mod heap;
mod pin;
mod value;
mod worker;

// ===== Values =====
pub use value::{ObjectId, Value};

// ===== Errors =====
pub use error::{EngineError, EngineResult, ScriptError};

// ===== Engine and contexts =====
pub use context::{
    CallArgs, Context, ContextId, NativeFunction, SandboxPolicy, FALLBACK_TIMESTAMP_MS,
};
pub use engine::{Engine, EngineConfig, ModuleLoader, WorkerContextFactory, DEFAULT_MAX_STACK_SIZE};

// ===== Memory =====
pub use gc::{GcStats, DEFAULT_GC_THRESHOLD};
pub use heap::HeapStats;
pub use pin::Pinned;

// ===== Workers =====
pub use worker::spawn_worker;

// ===== Module boundary =====
pub use ffi::{native_to_value, value_to_native};
pub use quill_sdk::ValueKind;
