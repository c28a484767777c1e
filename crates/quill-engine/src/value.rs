//! Script value representation.

use std::fmt;

/// Index of a heap slot holding managed data.
///
/// Slot indices are only meaningful against the heap of the engine that
/// issued them. A freed slot invalidates every outstanding `ObjectId`
/// pointing at it; engine operations report such handles as invalid
/// instead of resurrecting them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u32);

impl ObjectId {
    pub(crate) fn from_index(index: u32) -> Self {
        ObjectId(index)
    }

    /// Raw slot index.
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A script value.
///
/// Primitives are carried inline. Strings, byte buffers, objects, and
/// functions live on the engine heap and are referred to by slot id.
/// `Value` is `Copy` and carries no ownership: a heap value stays alive
/// only while it is reachable from a root — a global binding, a module
/// export, an object property, an extension slot, or a pin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// The "unset" sentinel.
    Undefined,
    /// Explicit null.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// Reference to heap-managed data.
    Ref(ObjectId),
}

impl Value {
    /// True if this is the `undefined` sentinel.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// True if this is `null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True if this is a heap reference.
    pub fn is_ref(&self) -> bool {
        matches!(self, Value::Ref(_))
    }

    /// Heap slot id, if this is a reference.
    pub fn heap_id(&self) -> Option<ObjectId> {
        match self {
            Value::Ref(id) => Some(*id),
            _ => None,
        }
    }

    /// Boolean payload, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer payload, if this is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Float payload, if this is a float.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Coarse type name, without consulting the heap.
    ///
    /// References report `"object"` regardless of what the slot holds;
    /// use a context for precise formatting.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) | Value::Float(_) => "number",
            Value::Ref(_) => "object",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Ref(id) => write!(f, "[object {}]", id),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}
