//! # Quill Standard Library
//!
//! The built-in native modules every default context receives:
//!
//! - `std` — printing, manual garbage collection, version
//! - `os` — clocks, platform name, sandbox-aware file reading
//! - `bjson` — compact binary serialization of script values
//!
//! Each module is a plain [`NativeModule`](quill_sdk::NativeModule)
//! definition; the runtime materializes them into contexts. Everything
//! here is written against the SDK's [`HostContext`](quill_sdk::HostContext)
//! only, so this crate never links the engine.

#![warn(missing_docs)]

mod bjson;
pub mod logger;
mod os;
mod std_mod;

#[cfg(test)]
pub(crate) mod testutil;

pub use bjson::{bjson_module, decode, encode};
pub use os::os_module;
pub use std_mod::std_module;

use quill_sdk::NativeModule;

/// The module set installed into every default context, in registration
/// order.
pub fn default_modules() -> Vec<NativeModule> {
    vec![std_module(), os_module(), bjson_module()]
}
