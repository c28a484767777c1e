//! # Quill SDK
//!
//! Types for writing native capability modules for the Quill runtime.
//!
//! A native module is a named bundle of host functions. The embedding
//! engine materializes each module into an execution context as a namespace
//! object whose properties dispatch back into the registered Rust closures.
//! The SDK deliberately knows nothing about the engine's heap or value
//! representation: values cross the boundary as [`NativeValue`] handles and
//! all heap access goes through the [`HostContext`] trait, so module crates
//! compile without linking the engine.
//!
//! ## Core types
//!
//! - [`NativeValue`] — FFI-safe tagged value handle (`#[repr(C)]`)
//! - [`NativeModule`] — a named, versioned bundle of host functions
//! - [`ModuleFn`] / [`NativeCallResult`] — the host function call contract
//! - [`HostContext`] — engine services available during a native call
//! - [`NativeError`] / [`AbiResult`] — boundary error reporting

#![warn(missing_docs)]

mod context;
mod error;
mod handler;
mod module;
mod value;

pub use context::HostContext;
pub use error::{AbiResult, NativeError};
pub use handler::{ModuleFn, NativeCallResult};
pub use module::NativeModule;
pub use value::{NativeValue, ValueKind};
