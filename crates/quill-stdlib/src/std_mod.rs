//! The `std` core module.
//!
//! Provides `print` (writes its arguments to the log), `gc` (forces a
//! collection and reports how many values were freed), and `version`.

use quill_sdk::{HostContext, NativeCallResult, NativeModule, NativeValue};

use crate::logger;

/// Build the `std` module.
pub fn std_module() -> NativeModule {
    let mut module = NativeModule::new("std", env!("CARGO_PKG_VERSION"));

    module.register_function("print", |host, args| match render(host, args) {
        Ok(line) => {
            logger::info(&line);
            NativeCallResult::null()
        }
        Err(msg) => NativeCallResult::error(msg),
    });

    module.register_function("gc", |host, _args| {
        NativeCallResult::i64(host.collect_garbage() as i64)
    });

    module.register_function("version", |host, _args| {
        match host.create_string(env!("CARGO_PKG_VERSION")) {
            Ok(v) => NativeCallResult::Value(v),
            Err(e) => NativeCallResult::error(e.to_string()),
        }
    });

    module
}

/// Render the argument list the way `print` shows it.
fn render(host: &dyn HostContext, args: &[NativeValue]) -> Result<String, String> {
    let mut parts = Vec::with_capacity(args.len());
    for arg in args {
        parts.push(host.display(*arg).map_err(|e| e.to_string())?);
    }
    Ok(parts.join(" "))
}
