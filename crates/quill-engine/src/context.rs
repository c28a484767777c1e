//! Execution contexts.
//!
//! A [`Context`] is an isolated global environment inside a shared engine:
//! its own global bindings, module table, extension slots, pin table, and
//! exception latch. Contexts share the engine heap and collector, so a
//! value created in one context is physically addressable from another,
//! but nothing is reachable across contexts unless a host explicitly
//! carries it over.
//!
//! Ownership follows one rule: every operation that hands out a heap value
//! returns it pinned, wrapped in a [`Pinned`] guard. The caller keeps the
//! guard alive for as long as it needs the value and drops it (or calls
//! [`Pinned::take`] to pass ownership on) when done. Raw [`Value`] copies
//! are safe to hold only while something else — a guard, a global, a
//! property of a reachable object — keeps the slot alive.
//!
//! `Context` is a cheap clonable handle; all state lives behind the engine
//! lock. The lock is never held while a native function runs, so natives
//! are free to call back into the engine.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use quill_sdk::{NativeModule, ValueKind};
use rustc_hash::FxHashMap;

use crate::engine::{Engine, EngineState};
use crate::error::{EngineError, EngineResult, ScriptError};
use crate::ffi;
use crate::heap::{FunctionData, HeapData, ObjectData, PropertyMap};
use crate::pin::Pinned;
use crate::value::{ObjectId, Value};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for an execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    pub(crate) fn next() -> Self {
        ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Numeric form of the id.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// Arguments to one native function invocation.
pub struct CallArgs<'a> {
    /// Receiver; `Undefined` for plain calls without one.
    pub this: Value,
    /// The constructor being applied, or `Undefined` when the function was
    /// invoked as a plain call. Constructors use this to reject plain
    /// invocation and to read their `prototype` property.
    pub new_target: Value,
    /// Positional arguments. Kept alive by the caller for the duration of
    /// the call.
    pub args: &'a [Value],
}

impl CallArgs<'_> {
    /// Argument `index`, or `Undefined` when absent.
    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).copied().unwrap_or(Value::Undefined)
    }
}

/// Signature of a native function installed in a context.
///
/// A returned heap value must be owned by the return: create it through
/// context operations and pass it out with [`Pinned::take`], or pin it
/// explicitly first. The engine adopts that ownership and releases it
/// when the caller is done.
pub type NativeFunction =
    Arc<dyn Fn(&Context, &CallArgs<'_>) -> Result<Value, ScriptError> + Send + Sync>;

/// What a context is allowed to observe of the host environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxPolicy {
    /// Permit filesystem access from native modules.
    pub allow_filesystem: bool,
    /// Permit reading the real system clock. When denied, clock reads
    /// report [`FALLBACK_TIMESTAMP_MS`].
    pub allow_system_time: bool,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        SandboxPolicy {
            allow_filesystem: true,
            allow_system_time: true,
        }
    }
}

/// Fixed timestamp reported in contexts denied the system clock:
/// 2022-01-01T00:00:00Z in Unix milliseconds.
pub const FALLBACK_TIMESTAMP_MS: i64 = 1_640_995_200_000;

/// Per-context state. Lives in the engine's context table, behind the
/// engine lock.
pub(crate) struct ContextState {
    pub(crate) globals: PropertyMap,
    /// Module name to namespace object.
    pub(crate) modules: FxHashMap<String, Value>,
    /// Heap slot to pin count.
    pub(crate) pins: FxHashMap<ObjectId, u32>,
    /// Host-attached named values, invisible to property lookup.
    pub(crate) extensions: FxHashMap<String, Value>,
    pub(crate) exception: Option<ScriptError>,
    pub(crate) sandbox: SandboxPolicy,
}

impl ContextState {
    pub(crate) fn new(sandbox: SandboxPolicy) -> Self {
        ContextState {
            globals: PropertyMap::default(),
            modules: FxHashMap::default(),
            pins: FxHashMap::default(),
            extensions: FxHashMap::default(),
            exception: None,
            sandbox,
        }
    }

    pub(crate) fn pin(&mut self, id: ObjectId) {
        *self.pins.entry(id).or_insert(0) += 1;
    }

    /// Unpinning below zero is tolerated; the slot simply stays unpinned.
    pub(crate) fn unpin(&mut self, id: ObjectId) {
        if let Some(count) = self.pins.get_mut(&id) {
            if *count <= 1 {
                self.pins.remove(&id);
            } else {
                *count -= 1;
            }
        }
    }

    pub(crate) fn pin_count(&self, id: ObjectId) -> u32 {
        self.pins.get(&id).copied().unwrap_or(0)
    }

    /// Everything this context keeps alive.
    pub(crate) fn trace_roots(&self, out: &mut Vec<Value>) {
        out.extend(self.globals.values().copied());
        out.extend(self.modules.values().copied());
        out.extend(self.pins.keys().map(|id| Value::Ref(*id)));
        out.extend(self.extensions.values().copied());
    }
}

/// Handle to an execution context.
#[derive(Clone)]
pub struct Context {
    pub(crate) engine: Engine,
    pub(crate) id: ContextId,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("id", &self.id).finish()
    }
}

impl Context {
    /// This context's id.
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// The engine this context belongs to.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    // ===== Internal plumbing =====

    /// Run `f` under the engine lock. Script errors coming out of `f` are
    /// latched as this context's pending exception.
    fn enter<T>(
        &self,
        f: impl FnOnce(&mut EngineState, ContextId) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let out = {
            let mut guard = self.engine.lock()?;
            f(&mut guard, self.id)
        };
        if let Err(EngineError::Script(err)) = &out {
            self.latch(err.clone());
        }
        out
    }

    /// Like [`enter`](Self::enter), but pins the resulting value before the
    /// lock is released and wraps it in an owning guard.
    fn enter_owned(
        &self,
        f: impl FnOnce(&mut EngineState, ContextId) -> EngineResult<Value>,
    ) -> EngineResult<Pinned> {
        let value = self.enter(|state, id| {
            let value = f(state, id)?;
            if let Some(oid) = value.heap_id() {
                state.context_mut(id)?.pin(oid);
            }
            Ok(value)
        })?;
        Ok(Pinned::adopt(self.clone(), value))
    }

    /// Best-effort exception latch; a closed engine drops the error.
    fn latch(&self, err: ScriptError) {
        if let Ok(mut state) = self.engine.lock() {
            if let Ok(ctx) = state.context_mut(self.id) {
                ctx.exception = Some(err);
            }
        }
    }

    /// Raise a script error in this context: latch it and return it in
    /// host form, ready for `?`.
    pub fn throw(&self, err: ScriptError) -> EngineError {
        self.latch(err.clone());
        EngineError::Script(err)
    }

    // ===== Allocation =====

    /// Allocate an empty object.
    pub fn new_object(&self) -> EngineResult<Pinned> {
        self.enter_owned(|state, _| {
            let id = state.alloc(HeapData::Object(ObjectData::default()), &[])?;
            Ok(Value::Ref(id))
        })
    }

    /// Allocate an empty object with an explicit prototype. `Null` and
    /// `Undefined` select no prototype; any other non-object value is a
    /// type error.
    pub fn new_object_with_proto(&self, proto: Value) -> EngineResult<Pinned> {
        self.enter_owned(|state, _| {
            let prototype = match proto {
                Value::Ref(id) => {
                    if !state.heap.contains(id) {
                        return Err(EngineError::InvalidHandle(id));
                    }
                    Some(id)
                }
                Value::Null | Value::Undefined => None,
                other => {
                    return Err(ScriptError::Type(format!(
                        "prototype must be an object, got {}",
                        other.type_name()
                    ))
                    .into())
                }
            };
            let id = state.alloc(
                HeapData::Object(ObjectData {
                    properties: PropertyMap::default(),
                    prototype,
                }),
                &[proto],
            )?;
            Ok(Value::Ref(id))
        })
    }

    /// Allocate a string.
    pub fn new_string(&self, s: &str) -> EngineResult<Pinned> {
        self.enter_owned(|state, _| {
            let id = state.alloc(HeapData::Str(s.to_string()), &[])?;
            Ok(Value::Ref(id))
        })
    }

    /// Allocate a byte buffer.
    pub fn new_bytes(&self, data: &[u8]) -> EngineResult<Pinned> {
        self.enter_owned(|state, _| {
            let id = state.alloc(HeapData::Bytes(data.to_vec()), &[])?;
            Ok(Value::Ref(id))
        })
    }

    /// Allocate a plain native function.
    pub fn new_function(&self, name: &str, f: NativeFunction) -> EngineResult<Pinned> {
        self.new_callable(name, false, f)
    }

    /// Allocate a native function that may be invoked through
    /// [`construct`](Self::construct).
    pub fn new_constructor(&self, name: &str, f: NativeFunction) -> EngineResult<Pinned> {
        self.new_callable(name, true, f)
    }

    fn new_callable(&self, name: &str, constructor: bool, f: NativeFunction) -> EngineResult<Pinned> {
        let name = name.to_string();
        self.enter_owned(move |state, _| {
            let id = state.alloc(
                HeapData::Function(FunctionData {
                    name,
                    callable: f,
                    constructor,
                    properties: PropertyMap::default(),
                }),
                &[],
            )?;
            Ok(Value::Ref(id))
        })
    }

    // ===== Properties =====

    /// Read a property, walking the prototype chain. Missing properties
    /// read as `Undefined`; reading from `undefined` or `null` is a type
    /// error.
    pub fn get_property(&self, target: Value, key: &str) -> EngineResult<Pinned> {
        self.enter_owned(|state, _| {
            let id = match target {
                Value::Ref(id) => id,
                Value::Undefined | Value::Null => {
                    return Err(ScriptError::Type(format!(
                        "cannot read property '{}' of {}",
                        key,
                        target.type_name()
                    ))
                    .into())
                }
                // Primitives have no own properties.
                _ => return Ok(Value::Undefined),
            };
            let mut current = Some(id);
            while let Some(slot) = current {
                match state.heap.data(slot) {
                    Some(HeapData::Object(o)) => {
                        if let Some(v) = o.properties.get(key) {
                            return Ok(*v);
                        }
                        current = o.prototype;
                    }
                    Some(HeapData::Function(f)) => {
                        if let Some(v) = f.properties.get(key) {
                            return Ok(*v);
                        }
                        current = None;
                    }
                    Some(_) => return Ok(Value::Undefined),
                    None => return Err(EngineError::InvalidHandle(slot)),
                }
            }
            Ok(Value::Undefined)
        })
    }

    /// Write a property on an object or function.
    pub fn set_property(&self, target: Value, key: &str, value: Value) -> EngineResult<()> {
        self.enter(|state, _| {
            let id = match target.heap_id() {
                Some(id) => id,
                None => {
                    return Err(ScriptError::Type(format!(
                        "cannot set property '{}' on {}",
                        key,
                        target.type_name()
                    ))
                    .into())
                }
            };
            state.set_object_property(id, key, value, &[target, value])
        })
    }

    /// Own property names of an object or function, sorted.
    pub fn object_keys(&self, target: Value) -> EngineResult<Vec<String>> {
        self.enter(|state, _| {
            let id = match target.heap_id() {
                Some(id) => id,
                None => {
                    return Err(ScriptError::Type(format!(
                        "value is not an object, got {}",
                        target.type_name()
                    ))
                    .into())
                }
            };
            let properties = match state.heap.data(id) {
                Some(HeapData::Object(o)) => &o.properties,
                Some(HeapData::Function(f)) => &f.properties,
                Some(_) => {
                    return Err(ScriptError::Type("value is not an object".to_string()).into())
                }
                None => return Err(EngineError::InvalidHandle(id)),
            };
            let mut keys: Vec<String> = properties.keys().cloned().collect();
            keys.sort();
            Ok(keys)
        })
    }

    /// Prototype of an object: the prototype value, `Null` when the object
    /// has none, `Undefined` for values that are not plain objects.
    pub fn prototype_of(&self, target: Value) -> EngineResult<Pinned> {
        self.enter_owned(|state, _| {
            let id = match target.heap_id() {
                Some(id) => id,
                None => return Ok(Value::Undefined),
            };
            match state.heap.data(id) {
                Some(HeapData::Object(o)) => Ok(o.prototype.map(Value::Ref).unwrap_or(Value::Null)),
                Some(_) => Ok(Value::Undefined),
                None => Err(EngineError::InvalidHandle(id)),
            }
        })
    }

    // ===== Globals =====

    /// Bind a name in this context's global environment.
    pub fn define_global(&self, name: &str, value: Value) -> EngineResult<()> {
        self.enter(|state, id| {
            state.context_mut(id)?.globals.insert(name.to_string(), value);
            Ok(())
        })
    }

    /// Read a global binding; `Undefined` when the name is not bound.
    pub fn lookup_global(&self, name: &str) -> EngineResult<Pinned> {
        self.enter_owned(|state, id| {
            Ok(state
                .context(id)?
                .globals
                .get(name)
                .copied()
                .unwrap_or(Value::Undefined))
        })
    }

    /// All bound global names, sorted.
    pub fn global_names(&self) -> EngineResult<Vec<String>> {
        self.enter(|state, id| {
            let mut names: Vec<String> = state.context(id)?.globals.keys().cloned().collect();
            names.sort();
            Ok(names)
        })
    }

    // ===== Invocation =====

    /// Call a function value. Argument heap values must be kept alive by
    /// the caller across the call.
    pub fn call(&self, callee: Value, this: Value, args: &[Value]) -> EngineResult<Pinned> {
        self.invoke(callee, this, Value::Undefined, args)
    }

    /// Invoke a constructor. The callee's `new_target` is the constructor
    /// itself; non-constructor functions are rejected.
    pub fn construct(&self, ctor: Value, args: &[Value]) -> EngineResult<Pinned> {
        let (name, is_constructor) = self.enter(|state, _| {
            let id = match ctor.heap_id() {
                Some(id) => id,
                None => {
                    return Err(ScriptError::Type(format!(
                        "{} is not a constructor",
                        ctor.type_name()
                    ))
                    .into())
                }
            };
            match state.heap.data(id) {
                Some(HeapData::Function(f)) => Ok((f.name.clone(), f.constructor)),
                Some(_) => {
                    return Err(ScriptError::Type("value is not a constructor".to_string()).into())
                }
                None => Err(EngineError::InvalidHandle(id)),
            }
        })?;
        if !is_constructor {
            return Err(self.throw(ScriptError::Type(format!("{} is not a constructor", name))));
        }
        self.invoke(ctor, Value::Undefined, ctor, args)
    }

    /// Look up `name` on `target` and call it with `target` as receiver.
    pub fn call_method(&self, target: Value, name: &str, args: &[Value]) -> EngineResult<Pinned> {
        let method = self.get_property(target, name)?;
        if method.value().is_undefined() {
            return Err(self.throw(ScriptError::Type(format!("method '{}' is not defined", name))));
        }
        self.call(method.value(), target, args)
    }

    fn invoke(
        &self,
        callee: Value,
        this: Value,
        new_target: Value,
        args: &[Value],
    ) -> EngineResult<Pinned> {
        if let Err(err) = self.engine.check_stack() {
            return Err(self.throw(err));
        }
        let func = self.enter(|state, _| {
            let id = match callee.heap_id() {
                Some(id) => id,
                None => {
                    return Err(ScriptError::Type(format!(
                        "{} is not a function",
                        callee.type_name()
                    ))
                    .into())
                }
            };
            match state.heap.data(id) {
                Some(HeapData::Function(f)) => Ok(f.callable.clone()),
                Some(_) => Err(ScriptError::Type("value is not a function".to_string()).into()),
                None => Err(EngineError::InvalidHandle(id)),
            }
        })?;

        // The lock is not held here: the native is free to re-enter.
        let call = CallArgs {
            this,
            new_target,
            args,
        };
        match func(self, &call) {
            Ok(value) => Ok(Pinned::adopt(self.clone(), value)),
            Err(err) => Err(self.throw(err)),
        }
    }

    // ===== Conversion =====

    /// Precise kind of a value, looking through reference handles.
    pub fn kind_of(&self, value: Value) -> EngineResult<ValueKind> {
        self.enter(|state, _| match value {
            Value::Undefined => Ok(ValueKind::Undefined),
            Value::Null => Ok(ValueKind::Null),
            Value::Bool(_) => Ok(ValueKind::Bool),
            Value::Int(_) => Ok(ValueKind::Int),
            Value::Float(_) => Ok(ValueKind::Float),
            Value::Ref(id) => match state.heap.data(id) {
                Some(HeapData::Str(_)) => Ok(ValueKind::String),
                Some(HeapData::Bytes(_)) => Ok(ValueKind::Bytes),
                Some(HeapData::Object(_)) => Ok(ValueKind::Object),
                Some(HeapData::Function(_)) => Ok(ValueKind::Function),
                None => Err(EngineError::InvalidHandle(id)),
            },
        })
    }

    /// Display-format any value: `undefined`, `null`, booleans, numbers,
    /// string contents, `[object Object]`, or a function description.
    /// Fails with a conversion error on a stale handle.
    pub fn to_display_string(&self, value: Value) -> EngineResult<String> {
        self.enter(|state, _| match value {
            Value::Undefined => Ok("undefined".to_string()),
            Value::Null => Ok("null".to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Int(i) => Ok(i.to_string()),
            Value::Float(f) => Ok(format_float(f)),
            Value::Ref(id) => match state.heap.data(id) {
                Some(HeapData::Str(s)) => Ok(s.clone()),
                Some(HeapData::Bytes(b)) => Ok(format!("[bytes {}]", b.len())),
                Some(HeapData::Object(_)) => Ok("[object Object]".to_string()),
                Some(HeapData::Function(f)) => {
                    Ok(format!("function {}() {{ [native code] }}", f.name))
                }
                None => {
                    Err(ScriptError::Conversion("value handle is no longer valid".to_string())
                        .into())
                }
            },
        })
    }

    /// Read a string value's contents.
    pub fn read_string(&self, value: Value) -> EngineResult<String> {
        self.enter(|state, _| match value {
            Value::Ref(id) => match state.heap.data(id) {
                Some(HeapData::Str(s)) => Ok(s.clone()),
                Some(_) => Err(ScriptError::Type("value is not a string".to_string()).into()),
                None => Err(EngineError::InvalidHandle(id)),
            },
            other => Err(ScriptError::Type(format!(
                "value is not a string, got {}",
                other.type_name()
            ))
            .into()),
        })
    }

    /// Read a byte buffer's contents.
    pub fn read_bytes(&self, value: Value) -> EngineResult<Vec<u8>> {
        self.enter(|state, _| match value {
            Value::Ref(id) => match state.heap.data(id) {
                Some(HeapData::Bytes(b)) => Ok(b.clone()),
                Some(_) => Err(ScriptError::Type("value is not a byte buffer".to_string()).into()),
                None => Err(EngineError::InvalidHandle(id)),
            },
            other => Err(ScriptError::Type(format!(
                "value is not a byte buffer, got {}",
                other.type_name()
            ))
            .into()),
        })
    }

    // ===== Ownership =====

    /// Add a pin to a heap value, keeping it alive independently of other
    /// roots. No-op for primitives.
    pub fn pin_value(&self, value: Value) -> EngineResult<()> {
        self.enter(|state, id| {
            if let Some(oid) = value.heap_id() {
                state.context_mut(id)?.pin(oid);
            }
            Ok(())
        })
    }

    /// Remove one pin. No-op for primitives and unpinned values.
    pub fn unpin_value(&self, value: Value) -> EngineResult<()> {
        self.enter(|state, id| {
            if let Some(oid) = value.heap_id() {
                state.context_mut(id)?.unpin(oid);
            }
            Ok(())
        })
    }

    /// Take shared ownership of a value: adds a pin and returns the same
    /// handle. Release with [`release_value`](Self::release_value).
    pub fn clone_value(&self, value: Value) -> EngineResult<Value> {
        self.pin_value(value)?;
        Ok(value)
    }

    /// Release ownership previously taken with
    /// [`clone_value`](Self::clone_value).
    pub fn release_value(&self, value: Value) -> EngineResult<()> {
        self.unpin_value(value)
    }

    /// Current pin count of a value. Primitives report 0.
    pub fn pin_count(&self, value: Value) -> EngineResult<u32> {
        self.enter(|state, id| {
            let ctx = state.context(id)?;
            Ok(value.heap_id().map(|oid| ctx.pin_count(oid)).unwrap_or(0))
        })
    }

    // ===== Modules =====

    /// Materialize a module definition into this context: one namespace
    /// object whose properties dispatch into the module's functions.
    /// Registering the same name twice is an error.
    pub fn register_module(&self, module: &NativeModule) -> EngineResult<()> {
        // Wrap the functions outside the lock.
        let mut exports: Vec<(String, NativeFunction)> = module
            .iter()
            .map(|(name, f)| {
                (
                    name.to_string(),
                    ffi::wrap_module_fn(module.name(), name, f.clone()),
                )
            })
            .collect();
        exports.sort_by(|a, b| a.0.cmp(&b.0));

        let module_name = module.name().to_string();
        self.enter(move |state, id| {
            if state.context(id)?.modules.contains_key(&module_name) {
                return Err(ScriptError::Module(format!(
                    "module '{}' is already registered",
                    module_name
                ))
                .into());
            }
            let ns_id = state.alloc(HeapData::Object(ObjectData::default()), &[])?;
            let ns = Value::Ref(ns_id);
            for (name, callable) in exports {
                let f_id = state.alloc(
                    HeapData::Function(FunctionData {
                        name: format!("{}.{}", module_name, name),
                        callable,
                        constructor: false,
                        properties: PropertyMap::default(),
                    }),
                    &[ns],
                )?;
                state.set_object_property(ns_id, &name, Value::Ref(f_id), &[ns, Value::Ref(f_id)])?;
            }
            state.context_mut(id)?.modules.insert(module_name, ns);
            Ok(())
        })
    }

    /// Namespace object of a registered module. Unregistered names are
    /// offered to the engine's module loader before failing with a
    /// reference error.
    pub fn import_module(&self, name: &str) -> EngineResult<Pinned> {
        let found = self.enter(|state, id| {
            let ns = state.context(id)?.modules.get(name).copied();
            if let Some(ns) = ns {
                if let Some(oid) = ns.heap_id() {
                    state.context_mut(id)?.pin(oid);
                }
            }
            Ok(ns)
        })?;
        if let Some(ns) = found {
            return Ok(Pinned::adopt(self.clone(), ns));
        }

        // Loader runs without the lock; it may call back in to register.
        if let Some(loader) = self.engine.module_loader()? {
            if let Some(module) = loader(name) {
                self.register_module(&module)?;
                return self.import_module(name);
            }
        }
        Err(self.throw(ScriptError::Reference(format!(
            "module '{}' is not registered",
            name
        ))))
    }

    /// One export of a registered module.
    pub fn module_export(&self, module: &str, export: &str) -> EngineResult<Pinned> {
        let ns = self.import_module(module)?;
        self.get_property(ns.value(), export)
    }

    /// Names of registered modules, sorted.
    pub fn module_names(&self) -> EngineResult<Vec<String>> {
        self.enter(|state, id| {
            let mut names: Vec<String> = state.context(id)?.modules.keys().cloned().collect();
            names.sort();
            Ok(names)
        })
    }

    // ===== Extension slots =====

    /// Attach a named value to this context. Extension slots are host-only
    /// storage: they root their value like a global but are invisible to
    /// lookup from script-facing surfaces.
    pub fn set_extension(&self, key: &str, value: Value) -> EngineResult<()> {
        self.enter(|state, id| {
            state
                .context_mut(id)?
                .extensions
                .insert(key.to_string(), value);
            Ok(())
        })
    }

    /// Read an extension slot; `Undefined` when unset. The returned handle
    /// is rooted by the slot itself and stays valid while the slot holds it.
    pub fn extension(&self, key: &str) -> EngineResult<Value> {
        self.enter(|state, id| {
            Ok(state
                .context(id)?
                .extensions
                .get(key)
                .copied()
                .unwrap_or(Value::Undefined))
        })
    }

    // ===== Exceptions =====

    /// True if a script exception is pending in this context.
    pub fn has_exception(&self) -> EngineResult<bool> {
        self.enter(|state, id| Ok(state.context(id)?.exception.is_some()))
    }

    /// Take the pending exception, clearing it.
    pub fn take_exception(&self) -> EngineResult<Option<ScriptError>> {
        self.enter(|state, id| Ok(state.context_mut(id)?.exception.take()))
    }

    // ===== Environment =====

    /// The sandbox policy this context was created with.
    pub fn sandbox_policy(&self) -> EngineResult<SandboxPolicy> {
        self.enter(|state, id| Ok(state.context(id)?.sandbox))
    }
}

/// Script-style float formatting: `NaN`, signed `Infinity`, and integral
/// values without a trailing `.0`.
fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if f == f.trunc() && f.abs() < 9_007_199_254_740_992.0 {
        return format!("{}", f as i64);
    }
    format!("{}", f)
}
