//! FFI-safe value handles.
//!
//! `NativeValue` is the only value representation that crosses the
//! module boundary. It is a plain tag + payload pair with a stable C
//! layout, so it can be passed by value through any calling convention
//! without involving the engine's internal value types.

use std::fmt;

/// Tag for the `undefined` sentinel.
pub const TAG_UNDEFINED: u8 = 0;
/// Tag for `null`.
pub const TAG_NULL: u8 = 1;
/// Tag for booleans.
pub const TAG_BOOL: u8 = 2;
/// Tag for 64-bit signed integers.
pub const TAG_I64: u8 = 3;
/// Tag for 64-bit floats.
pub const TAG_F64: u8 = 4;
/// Tag for heap references (strings, objects, buffers, functions).
pub const TAG_REF: u8 = 5;

/// Precise kind of a value, resolved by the host.
///
/// `NativeValue` tags distinguish primitives but collapse every
/// heap-managed value into one reference tag; asking the host yields the
/// actual kind behind a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// The `undefined` sentinel.
    Undefined,
    /// Explicit null.
    Null,
    /// Boolean.
    Bool,
    /// 64-bit integer.
    Int,
    /// 64-bit float.
    Float,
    /// UTF-8 string.
    String,
    /// Raw byte buffer.
    Bytes,
    /// Plain object.
    Object,
    /// Callable function.
    Function,
}

/// A tagged value handle passed across the native module boundary.
///
/// Primitives are carried inline in `data`. Heap-managed values (strings,
/// byte buffers, objects, functions) are carried as an opaque slot index
/// and are only useful through the [`HostContext`](crate::HostContext)
/// that handed them out. A `NativeValue` confers no ownership: the engine
/// keeps values reachable for the duration of the native call.
#[repr(C)]
#[derive(Clone, Copy, PartialEq)]
pub struct NativeValue {
    /// Type tag (`TAG_*` constants).
    pub tag: u8,
    /// Payload, interpretation depends on `tag`.
    pub data: u64,
}

impl NativeValue {
    /// The `undefined` sentinel.
    pub fn undefined() -> Self {
        NativeValue {
            tag: TAG_UNDEFINED,
            data: 0,
        }
    }

    /// The `null` value.
    pub fn null() -> Self {
        NativeValue { tag: TAG_NULL, data: 0 }
    }

    /// A boolean value.
    pub fn bool(b: bool) -> Self {
        NativeValue {
            tag: TAG_BOOL,
            data: b as u64,
        }
    }

    /// A 64-bit integer value.
    pub fn i64(v: i64) -> Self {
        NativeValue {
            tag: TAG_I64,
            data: v as u64,
        }
    }

    /// A 64-bit float value.
    pub fn f64(v: f64) -> Self {
        NativeValue {
            tag: TAG_F64,
            data: v.to_bits(),
        }
    }

    /// A heap reference by opaque slot index.
    pub fn heap_ref(slot: u32) -> Self {
        NativeValue {
            tag: TAG_REF,
            data: slot as u64,
        }
    }

    /// True if this is the `undefined` sentinel.
    pub fn is_undefined(&self) -> bool {
        self.tag == TAG_UNDEFINED
    }

    /// True if this is `null`.
    pub fn is_null(&self) -> bool {
        self.tag == TAG_NULL
    }

    /// True if this is a heap reference.
    pub fn is_ref(&self) -> bool {
        self.tag == TAG_REF
    }

    /// Boolean payload, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        (self.tag == TAG_BOOL).then(|| self.data != 0)
    }

    /// Integer payload, if this is an i64.
    pub fn as_i64(&self) -> Option<i64> {
        (self.tag == TAG_I64).then(|| self.data as i64)
    }

    /// Float payload, if this is an f64.
    pub fn as_f64(&self) -> Option<f64> {
        (self.tag == TAG_F64).then(|| f64::from_bits(self.data))
    }

    /// Heap slot index, if this is a reference.
    pub fn heap_slot(&self) -> Option<u32> {
        (self.tag == TAG_REF).then(|| self.data as u32)
    }

    /// Human-readable tag name, for diagnostics.
    pub fn tag_name(&self) -> &'static str {
        match self.tag {
            TAG_UNDEFINED => "undefined",
            TAG_NULL => "null",
            TAG_BOOL => "bool",
            TAG_I64 => "i64",
            TAG_F64 => "f64",
            TAG_REF => "ref",
            _ => "invalid",
        }
    }
}

impl fmt::Debug for NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tag {
            TAG_UNDEFINED => write!(f, "NativeValue::Undefined"),
            TAG_NULL => write!(f, "NativeValue::Null"),
            TAG_BOOL => write!(f, "NativeValue::Bool({})", self.data != 0),
            TAG_I64 => write!(f, "NativeValue::I64({})", self.data as i64),
            TAG_F64 => write!(f, "NativeValue::F64({})", f64::from_bits(self.data)),
            TAG_REF => write!(f, "NativeValue::Ref({})", self.data as u32),
            t => write!(f, "NativeValue::Invalid(tag={})", t),
        }
    }
}
