//! The host function call contract.

use std::sync::Arc;

use crate::context::HostContext;
use crate::value::NativeValue;

/// Result of a native function call.
///
/// `Value` completes the call with a result; `Error` makes the engine
/// raise a script-visible exception carrying the message.
#[derive(Debug, Clone)]
pub enum NativeCallResult {
    /// Successful call with a return value.
    Value(NativeValue),
    /// Failed call; the message becomes a script exception.
    Error(String),
}

impl NativeCallResult {
    /// Successful call returning `null`.
    pub fn null() -> Self {
        NativeCallResult::Value(NativeValue::null())
    }

    /// Successful call returning `undefined`.
    pub fn undefined() -> Self {
        NativeCallResult::Value(NativeValue::undefined())
    }

    /// Successful call returning a boolean.
    pub fn bool(b: bool) -> Self {
        NativeCallResult::Value(NativeValue::bool(b))
    }

    /// Successful call returning an i64.
    pub fn i64(v: i64) -> Self {
        NativeCallResult::Value(NativeValue::i64(v))
    }

    /// Successful call returning an f64.
    pub fn f64(v: f64) -> Self {
        NativeCallResult::Value(NativeValue::f64(v))
    }

    /// Failed call with an error message.
    pub fn error(msg: impl Into<String>) -> Self {
        NativeCallResult::Error(msg.into())
    }
}

/// Signature of a host function registered in a [`NativeModule`].
///
/// The function receives the services of the calling context and the
/// argument slice for this invocation. Heap values created through the
/// context remain alive at least until the call returns; a created value
/// that is returned stays owned by the caller afterwards.
///
/// [`NativeModule`]: crate::NativeModule
pub type ModuleFn =
    Arc<dyn Fn(&dyn HostContext, &[NativeValue]) -> NativeCallResult + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_helpers() {
        assert!(matches!(
            NativeCallResult::null(),
            NativeCallResult::Value(v) if v.is_null()
        ));
        assert!(matches!(
            NativeCallResult::i64(7),
            NativeCallResult::Value(v) if v.as_i64() == Some(7)
        ));
        assert!(matches!(
            NativeCallResult::f64(1.5),
            NativeCallResult::Value(v) if v.as_f64() == Some(1.5)
        ));
        assert!(matches!(
            NativeCallResult::bool(true),
            NativeCallResult::Value(v) if v.as_bool() == Some(true)
        ));
        assert!(matches!(
            NativeCallResult::error("boom"),
            NativeCallResult::Error(m) if m == "boom"
        ));
    }
}
