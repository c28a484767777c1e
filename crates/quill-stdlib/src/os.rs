//! The `os` module.
//!
//! Wall-clock and monotonic time, platform identification, and sandboxed
//! file reads. The wall clock defers to the host so that contexts with
//! system time disabled observe the fixed fallback timestamp instead of
//! the real clock; `readTextFile` refuses outright when filesystem access
//! is disabled.

use std::time::Instant;

use once_cell::sync::Lazy;
use quill_sdk::{HostContext, NativeCallResult, NativeModule, NativeValue};

/// Process-wide origin for the monotonic clock. First use sets the zero
/// point; all contexts share it.
static MONOTONIC_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Milliseconds elapsed since the first monotonic reading in this process.
pub fn monotonic_millis() -> f64 {
    MONOTONIC_EPOCH.elapsed().as_secs_f64() * 1000.0
}

/// Build the `os` module.
pub fn os_module() -> NativeModule {
    let mut module = NativeModule::new("os", env!("CARGO_PKG_VERSION"));

    module.register_function("now", |host, _args| {
        NativeCallResult::i64(host.wall_clock_millis())
    });

    module.register_function("monotonic", |_host, _args| {
        NativeCallResult::f64(monotonic_millis())
    });

    module.register_function("platform", |host, _args| {
        match host.create_string(std::env::consts::OS) {
            Ok(v) => NativeCallResult::Value(v),
            Err(e) => NativeCallResult::error(e.to_string()),
        }
    });

    module.register_function("readTextFile", |host, args| read_text_file(host, args));

    module
}

fn read_text_file(host: &dyn HostContext, args: &[NativeValue]) -> NativeCallResult {
    if !host.filesystem_allowed() {
        return NativeCallResult::error("filesystem access is disabled");
    }
    let path = match args.first() {
        Some(v) => match host.read_string(*v) {
            Ok(p) => p,
            Err(e) => return NativeCallResult::error(e.to_string()),
        },
        None => return NativeCallResult::error("expected a path string"),
    };
    match std::fs::read_to_string(&path) {
        Ok(contents) => match host.create_string(&contents) {
            Ok(v) => NativeCallResult::Value(v),
            Err(e) => NativeCallResult::error(e.to_string()),
        },
        Err(e) => NativeCallResult::error(format!("cannot read '{}': {}", path, e)),
    }
}
