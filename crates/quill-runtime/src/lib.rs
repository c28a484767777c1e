//! # Quill Runtime
//!
//! Binds the Quill engine with the standard library and manages runtime
//! lifecycle: configured construction, provisioned execution contexts,
//! the `PROXY_VALUE` wrapper type, and an optional process-wide default
//! runtime.
//!
//! The explicit API is [`Runtime`]; everything takes or returns real
//! handles and nothing is ambient. [`ensure_initialized`] layers a
//! process-wide default on top for hosts that want exactly one runtime.
//!
//! ```no_run
//! use quill_runtime::{new_proxy_value, describe, Runtime};
//!
//! let runtime = Runtime::new()?;
//! let instance = new_proxy_value(runtime.context(), 7)?;
//! assert_eq!(
//!     describe(runtime.context(), instance.value())?,
//!     "[object PROXY_VALUE(proxyId: 7)]"
//! );
//! drop(instance);
//! runtime.close()?;
//! # Ok::<(), quill_runtime::RuntimeError>(())
//! ```

#![warn(missing_docs)]

mod error;
mod global;
mod options;
mod proxy;
mod runtime;
mod setup;

// ===== Lifecycle =====
pub use global::{default_runtime, ensure_initialized, teardown_default};
pub use runtime::{Runtime, RuntimeId, RuntimeStats};

// ===== Configuration =====
pub use options::{RuntimeOptions, SandboxOptions};

// ===== Proxy wrapper type =====
pub use proxy::{
    describe, install_proxy_type, new_proxy_value, PROXY_GLOBAL_NAME, PROXY_ID_PROPERTY,
};

// ===== Errors =====
pub use error::{RuntimeError, RuntimeResult};

// ===== Engine surface =====
pub use quill_engine::{
    spawn_worker, Context, ContextId, EngineError, ModuleLoader, Pinned, ScriptError, Value,
    ValueKind,
};
pub use quill_sdk::{NativeCallResult, NativeModule};
