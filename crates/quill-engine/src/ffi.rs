//! The native module boundary.
//!
//! Module crates speak [`NativeValue`] and [`HostContext`]; the engine
//! speaks [`Value`] and [`Context`]. This module converts between the two
//! and adapts registered module functions into engine-native callables.
//!
//! Values a module creates during a call are tracked in a call scope and
//! released when the call returns, with one exception: the value the call
//! returns is re-pinned first, so ownership of exactly that value flows
//! back to the engine. A module can therefore allocate freely without
//! leaking and without manual release calls.

use std::cell::RefCell;

use quill_sdk::{
    AbiResult, HostContext, ModuleFn, NativeCallResult, NativeError, NativeValue, ValueKind,
};

use crate::context::{Context, NativeFunction, FALLBACK_TIMESTAMP_MS};
use crate::error::{EngineError, ScriptError};
use crate::value::{ObjectId, Value};

/// Engine value to boundary handle.
pub fn value_to_native(value: Value) -> NativeValue {
    match value {
        Value::Undefined => NativeValue::undefined(),
        Value::Null => NativeValue::null(),
        Value::Bool(b) => NativeValue::bool(b),
        Value::Int(i) => NativeValue::i64(i),
        Value::Float(f) => NativeValue::f64(f),
        Value::Ref(id) => NativeValue::heap_ref(id.index()),
    }
}

/// Boundary handle to engine value. Handles with an unknown tag collapse
/// to `Undefined`.
pub fn native_to_value(value: NativeValue) -> Value {
    if value.is_undefined() {
        Value::Undefined
    } else if value.is_null() {
        Value::Null
    } else if let Some(b) = value.as_bool() {
        Value::Bool(b)
    } else if let Some(i) = value.as_i64() {
        Value::Int(i)
    } else if let Some(f) = value.as_f64() {
        Value::Float(f)
    } else if let Some(slot) = value.heap_slot() {
        Value::Ref(ObjectId::from_index(slot))
    } else {
        Value::Undefined
    }
}

fn host_err(e: EngineError) -> NativeError {
    NativeError::HostError(e.to_string())
}

/// Adapter giving one native call access to its context, with a scope of
/// values to release when the call ends.
struct HostContextAdapter<'a> {
    ctx: &'a Context,
    scope: RefCell<Vec<Value>>,
}

impl<'a> HostContextAdapter<'a> {
    fn new(ctx: &'a Context) -> Self {
        HostContextAdapter {
            ctx,
            scope: RefCell::new(Vec::new()),
        }
    }

    /// Move a guard's pin into the call scope and hand out the raw handle.
    fn track(&self, pinned: crate::pin::Pinned) -> NativeValue {
        let value = pinned.take();
        self.scope.borrow_mut().push(value);
        value_to_native(value)
    }

    fn release_scope(&self) {
        for value in self.scope.borrow_mut().drain(..) {
            let _ = self.ctx.unpin_value(value);
        }
    }
}

impl HostContext for HostContextAdapter<'_> {
    fn create_string(&self, s: &str) -> AbiResult<NativeValue> {
        let pinned = self.ctx.new_string(s).map_err(host_err)?;
        Ok(self.track(pinned))
    }

    fn create_bytes(&self, data: &[u8]) -> AbiResult<NativeValue> {
        let pinned = self.ctx.new_bytes(data).map_err(host_err)?;
        Ok(self.track(pinned))
    }

    fn create_object(&self) -> AbiResult<NativeValue> {
        let pinned = self.ctx.new_object().map_err(host_err)?;
        Ok(self.track(pinned))
    }

    fn read_string(&self, value: NativeValue) -> AbiResult<String> {
        self.ctx.read_string(native_to_value(value)).map_err(host_err)
    }

    fn read_bytes(&self, value: NativeValue) -> AbiResult<Vec<u8>> {
        self.ctx.read_bytes(native_to_value(value)).map_err(host_err)
    }

    fn object_keys(&self, value: NativeValue) -> AbiResult<Vec<String>> {
        self.ctx.object_keys(native_to_value(value)).map_err(host_err)
    }

    fn object_get(&self, value: NativeValue, key: &str) -> AbiResult<NativeValue> {
        let pinned = self
            .ctx
            .get_property(native_to_value(value), key)
            .map_err(host_err)?;
        Ok(self.track(pinned))
    }

    fn object_set(&self, value: NativeValue, key: &str, item: NativeValue) -> AbiResult<()> {
        self.ctx
            .set_property(native_to_value(value), key, native_to_value(item))
            .map_err(host_err)
    }

    fn kind_of(&self, value: NativeValue) -> AbiResult<ValueKind> {
        self.ctx.kind_of(native_to_value(value)).map_err(host_err)
    }

    fn display(&self, value: NativeValue) -> AbiResult<String> {
        self.ctx
            .to_display_string(native_to_value(value))
            .map_err(host_err)
    }

    fn wall_clock_millis(&self) -> i64 {
        let allowed = self
            .ctx
            .sandbox_policy()
            .map(|p| p.allow_system_time)
            .unwrap_or(false);
        if !allowed {
            return FALLBACK_TIMESTAMP_MS;
        }
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(FALLBACK_TIMESTAMP_MS)
    }

    fn filesystem_allowed(&self) -> bool {
        self.ctx
            .sandbox_policy()
            .map(|p| p.allow_filesystem)
            .unwrap_or(false)
    }

    fn collect_garbage(&self) -> usize {
        self.ctx
            .engine()
            .collect_garbage()
            .map(|(values, _)| values)
            .unwrap_or(0)
    }
}

/// Adapt one registered module function into an engine callable.
pub(crate) fn wrap_module_fn(module: &str, name: &str, f: ModuleFn) -> NativeFunction {
    let qualified = format!("{}.{}", module, name);
    std::sync::Arc::new(move |ctx: &Context, call: &crate::context::CallArgs<'_>| {
        let native_args: Vec<NativeValue> =
            call.args.iter().copied().map(value_to_native).collect();
        let adapter = HostContextAdapter::new(ctx);
        let outcome = f(&adapter, &native_args);
        let result = match outcome {
            NativeCallResult::Value(nv) => {
                let value = native_to_value(nv);
                // Re-pin the result before the scope lets go of it.
                let owned = if value.is_ref() {
                    ctx.pin_value(value)
                } else {
                    Ok(())
                };
                match owned {
                    Ok(()) => Ok(value),
                    Err(e) => Err(e.into_script()),
                }
            }
            NativeCallResult::Error(msg) => {
                Err(ScriptError::Module(format!("{}: {}", qualified, msg)))
            }
        };
        adapter.release_scope();
        result
    })
}
