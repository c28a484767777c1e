//! In-memory `HostContext` for exercising module functions without an
//! engine.

use std::cell::RefCell;
use std::collections::BTreeMap;

use quill_sdk::{AbiResult, HostContext, NativeError, NativeValue, ValueKind};

pub(crate) enum MockData {
    Str(String),
    Bytes(Vec<u8>),
    Object(BTreeMap<String, NativeValue>),
    Function(String),
}

/// Host with a trivial slot heap and configurable environment.
pub(crate) struct MockHost {
    slots: RefCell<Vec<MockData>>,
    pub filesystem: bool,
    pub clock_millis: i64,
    pub gc_freed: usize,
}

impl MockHost {
    pub fn new() -> Self {
        MockHost {
            slots: RefCell::new(Vec::new()),
            filesystem: true,
            clock_millis: 1_700_000_000_000,
            gc_freed: 0,
        }
    }

    fn push(&self, data: MockData) -> NativeValue {
        let mut slots = self.slots.borrow_mut();
        slots.push(data);
        NativeValue::heap_ref((slots.len() - 1) as u32)
    }

    /// Allocate a function-kinded slot; the mock cannot call it.
    pub fn create_function(&self, name: &str) -> NativeValue {
        self.push(MockData::Function(name.to_string()))
    }

    fn slot(&self, value: NativeValue) -> AbiResult<usize> {
        let index = value.heap_slot().ok_or_else(|| NativeError::TypeMismatch {
            expected: "ref".to_string(),
            got: value.tag_name().to_string(),
        })? as usize;
        if index >= self.slots.borrow().len() {
            return Err(NativeError::HostError(format!("invalid slot {}", index)));
        }
        Ok(index)
    }
}

impl HostContext for MockHost {
    fn create_string(&self, s: &str) -> AbiResult<NativeValue> {
        Ok(self.push(MockData::Str(s.to_string())))
    }

    fn create_bytes(&self, data: &[u8]) -> AbiResult<NativeValue> {
        Ok(self.push(MockData::Bytes(data.to_vec())))
    }

    fn create_object(&self) -> AbiResult<NativeValue> {
        Ok(self.push(MockData::Object(BTreeMap::new())))
    }

    fn read_string(&self, value: NativeValue) -> AbiResult<String> {
        let index = self.slot(value)?;
        match &self.slots.borrow()[index] {
            MockData::Str(s) => Ok(s.clone()),
            _ => Err(NativeError::TypeMismatch {
                expected: "string".to_string(),
                got: "other".to_string(),
            }),
        }
    }

    fn read_bytes(&self, value: NativeValue) -> AbiResult<Vec<u8>> {
        let index = self.slot(value)?;
        match &self.slots.borrow()[index] {
            MockData::Bytes(b) => Ok(b.clone()),
            _ => Err(NativeError::TypeMismatch {
                expected: "bytes".to_string(),
                got: "other".to_string(),
            }),
        }
    }

    fn object_keys(&self, value: NativeValue) -> AbiResult<Vec<String>> {
        let index = self.slot(value)?;
        match &self.slots.borrow()[index] {
            MockData::Object(map) => Ok(map.keys().cloned().collect()),
            _ => Err(NativeError::TypeMismatch {
                expected: "object".to_string(),
                got: "other".to_string(),
            }),
        }
    }

    fn object_get(&self, value: NativeValue, key: &str) -> AbiResult<NativeValue> {
        let index = self.slot(value)?;
        match &self.slots.borrow()[index] {
            MockData::Object(map) => Ok(map.get(key).copied().unwrap_or(NativeValue::undefined())),
            _ => Err(NativeError::TypeMismatch {
                expected: "object".to_string(),
                got: "other".to_string(),
            }),
        }
    }

    fn object_set(&self, value: NativeValue, key: &str, item: NativeValue) -> AbiResult<()> {
        let index = self.slot(value)?;
        match &mut self.slots.borrow_mut()[index] {
            MockData::Object(map) => {
                map.insert(key.to_string(), item);
                Ok(())
            }
            _ => Err(NativeError::TypeMismatch {
                expected: "object".to_string(),
                got: "other".to_string(),
            }),
        }
    }

    fn kind_of(&self, value: NativeValue) -> AbiResult<ValueKind> {
        if value.is_undefined() {
            return Ok(ValueKind::Undefined);
        }
        if value.is_null() {
            return Ok(ValueKind::Null);
        }
        if value.as_bool().is_some() {
            return Ok(ValueKind::Bool);
        }
        if value.as_i64().is_some() {
            return Ok(ValueKind::Int);
        }
        if value.as_f64().is_some() {
            return Ok(ValueKind::Float);
        }
        let index = self.slot(value)?;
        Ok(match &self.slots.borrow()[index] {
            MockData::Str(_) => ValueKind::String,
            MockData::Bytes(_) => ValueKind::Bytes,
            MockData::Object(_) => ValueKind::Object,
            MockData::Function(_) => ValueKind::Function,
        })
    }

    fn display(&self, value: NativeValue) -> AbiResult<String> {
        if value.is_undefined() {
            return Ok("undefined".to_string());
        }
        if value.is_null() {
            return Ok("null".to_string());
        }
        if let Some(b) = value.as_bool() {
            return Ok(b.to_string());
        }
        if let Some(i) = value.as_i64() {
            return Ok(i.to_string());
        }
        if let Some(f) = value.as_f64() {
            return Ok(f.to_string());
        }
        let index = self.slot(value)?;
        Ok(match &self.slots.borrow()[index] {
            MockData::Str(s) => s.clone(),
            MockData::Bytes(b) => format!("[bytes {}]", b.len()),
            MockData::Object(_) => "[object Object]".to_string(),
            MockData::Function(name) => format!("function {}() {{ [native code] }}", name),
        })
    }

    fn wall_clock_millis(&self) -> i64 {
        self.clock_millis
    }

    fn filesystem_allowed(&self) -> bool {
        self.filesystem
    }

    fn collect_garbage(&self) -> usize {
        self.gc_freed
    }
}
