//! Engine services available to native functions.

use crate::error::AbiResult;
use crate::value::{NativeValue, ValueKind};

/// Services the engine provides to a native function for the duration of
/// one call.
///
/// All heap access from module code goes through this trait; module crates
/// never see the engine's internal types. Values created here are kept
/// alive until the call returns. The engine keeps the value that the call
/// returns alive beyond that, and lets everything else become garbage.
pub trait HostContext {
    // ===== Allocation =====

    /// Allocate a string in the calling context.
    fn create_string(&self, s: &str) -> AbiResult<NativeValue>;

    /// Allocate a byte buffer in the calling context.
    fn create_bytes(&self, data: &[u8]) -> AbiResult<NativeValue>;

    /// Allocate an empty object in the calling context.
    fn create_object(&self) -> AbiResult<NativeValue>;

    // ===== Reading =====

    /// Read a string value. Fails if `value` is not a string.
    fn read_string(&self, value: NativeValue) -> AbiResult<String>;

    /// Read a byte buffer value. Fails if `value` is not a buffer.
    fn read_bytes(&self, value: NativeValue) -> AbiResult<Vec<u8>>;

    // ===== Objects =====

    /// Own property names of an object, in unspecified order.
    fn object_keys(&self, value: NativeValue) -> AbiResult<Vec<String>>;

    /// Read a property. Missing properties read as `undefined`.
    fn object_get(&self, value: NativeValue, key: &str) -> AbiResult<NativeValue>;

    /// Write a property.
    fn object_set(&self, value: NativeValue, key: &str, item: NativeValue) -> AbiResult<()>;

    // ===== Conversion =====

    /// Precise kind of a value, looking through reference handles.
    fn kind_of(&self, value: NativeValue) -> AbiResult<ValueKind>;

    /// Display-format any value the way the engine prints it.
    fn display(&self, value: NativeValue) -> AbiResult<String>;

    // ===== Host environment =====

    /// Wall-clock time in milliseconds since the Unix epoch.
    ///
    /// Contexts sandboxed away from the system clock report a fixed
    /// fallback timestamp instead of the real time.
    fn wall_clock_millis(&self) -> i64;

    /// True if the calling context may touch the filesystem.
    fn filesystem_allowed(&self) -> bool;

    /// Force a garbage collection pass; returns the number of values freed.
    fn collect_garbage(&self) -> usize;
}
