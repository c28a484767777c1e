//! The engine: shared heap, collector, and context table behind one lock.
//!
//! [`Engine`] is a cheap clonable handle over shared state. Operations
//! take the state lock for their duration and release it before any
//! native function runs, so callbacks can re-enter freely. The allocation
//! path is the single place that enforces the collection threshold and
//! the heap ceiling: it collects when the threshold is crossed, and if an
//! allocation still does not fit under the ceiling after a full pass it
//! fails with an out-of-memory error instead of aborting the process.
//!
//! Stack discipline is cooperative and per thread, for hosts that
//! re-enter the engine from different native stacks:
//! [`Engine::update_stack_top`] records the calling thread's stack top,
//! and call dispatch measures depth against the top recorded on the same
//! thread, failing with a catchable range error once the configured span
//! is exceeded. Threads that never recorded a top are not measured.

use std::cell::Cell;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use quill_sdk::NativeModule;
use rustc_hash::FxHashMap;

use crate::context::{Context, ContextId, ContextState, SandboxPolicy};
use crate::error::{EngineError, EngineResult, ScriptError};
use crate::gc::{GarbageCollector, GcStats};
use crate::heap::{Heap, HeapData, HeapStats, PROPERTY_OVERHEAD};
use crate::value::{ObjectId, Value};

/// Default stack span in bytes allowed between the recorded stack top and
/// the deepest call dispatch.
pub const DEFAULT_MAX_STACK_SIZE: usize = 256 * 1024;

/// Engine construction parameters. A zero means "use the default":
/// unlimited heap, [`DEFAULT_MAX_STACK_SIZE`], and the collector's
/// default threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Heap ceiling in bytes; 0 means unlimited.
    pub max_heap_bytes: usize,
    /// Allowed stack span in bytes; 0 selects the default.
    pub max_stack_size: usize,
    /// Collection threshold in bytes; 0 selects the default.
    pub gc_threshold: usize,
}

/// Builds a fully provisioned context for a worker thread.
pub type WorkerContextFactory = Arc<dyn Fn(&Engine) -> EngineResult<Context> + Send + Sync>;

/// Resolves module names that are not yet registered in a context.
pub type ModuleLoader = Arc<dyn Fn(&str) -> Option<NativeModule> + Send + Sync>;

pub(crate) struct EngineState {
    pub(crate) heap: Heap,
    pub(crate) gc: GarbageCollector,
    pub(crate) contexts: FxHashMap<ContextId, ContextState>,
    pub(crate) module_loader: Option<ModuleLoader>,
    pub(crate) closed: bool,
}

impl EngineState {
    pub(crate) fn context(&self, id: ContextId) -> EngineResult<&ContextState> {
        self.contexts.get(&id).ok_or(EngineError::UnknownContext(id))
    }

    pub(crate) fn context_mut(&mut self, id: ContextId) -> EngineResult<&mut ContextState> {
        self.contexts
            .get_mut(&id)
            .ok_or(EngineError::UnknownContext(id))
    }

    /// Allocate a payload, collecting first when the threshold or the
    /// ceiling requires it. `protect` lists values that must survive a
    /// collection triggered here even if nothing else roots them yet.
    pub(crate) fn alloc(&mut self, data: HeapData, protect: &[Value]) -> EngineResult<ObjectId> {
        self.reserve(data.size_estimate(), protect)?;
        Ok(self.heap.insert(data))
    }

    /// Ensure `bytes` can be charged without crossing the ceiling.
    pub(crate) fn reserve(&mut self, bytes: usize, protect: &[Value]) -> EngineResult<()> {
        let mut collected = false;
        if self.gc.should_collect(self.heap.allocated_bytes() + bytes) {
            self.collect(protect);
            collected = true;
        }
        if self.heap.would_exceed(bytes) {
            if !collected {
                self.collect(protect);
            }
            if self.heap.would_exceed(bytes) {
                return Err(EngineError::OutOfMemory {
                    requested: bytes,
                    allocated: self.heap.allocated_bytes(),
                    limit: self.heap.max_heap_bytes(),
                });
            }
        }
        Ok(())
    }

    /// Run a full collection with every context's roots plus `protect`.
    pub(crate) fn collect(&mut self, protect: &[Value]) -> (usize, usize) {
        let mut roots: Vec<Value> = Vec::with_capacity(64);
        for ctx in self.contexts.values() {
            ctx.trace_roots(&mut roots);
        }
        roots.extend_from_slice(protect);
        self.gc.collect(&mut self.heap, &roots)
    }

    /// Write a property on a heap object or function, charging growth
    /// against the heap ceiling first.
    pub(crate) fn set_object_property(
        &mut self,
        id: ObjectId,
        key: &str,
        value: Value,
        protect: &[Value],
    ) -> EngineResult<()> {
        let delta = match self.heap.data(id) {
            Some(HeapData::Object(o)) => {
                if o.properties.contains_key(key) {
                    0
                } else {
                    PROPERTY_OVERHEAD + key.len()
                }
            }
            Some(HeapData::Function(f)) => {
                if f.properties.contains_key(key) {
                    0
                } else {
                    PROPERTY_OVERHEAD + key.len()
                }
            }
            Some(_) => {
                return Err(ScriptError::Type(format!(
                    "cannot set property '{}' on this value",
                    key
                ))
                .into())
            }
            None => return Err(EngineError::InvalidHandle(id)),
        };
        if delta > 0 {
            self.reserve(delta, protect)?;
        }
        match self.heap.data_mut(id) {
            Some(HeapData::Object(o)) => {
                o.properties.insert(key.to_string(), value);
            }
            Some(HeapData::Function(f)) => {
                f.properties.insert(key.to_string(), value);
            }
            _ => return Err(EngineError::InvalidHandle(id)),
        }
        if delta > 0 {
            self.heap.grow(id, delta);
        }
        Ok(())
    }
}

struct EngineShared {
    state: Mutex<EngineState>,
    max_stack_size: usize,
    /// Kept outside the state lock: the factory builds contexts through
    /// normal engine operations.
    worker_factory: Mutex<Option<WorkerContextFactory>>,
}

/// Handle to a shared engine. Clones are cheap and refer to the same
/// heap, collector, and context table.
#[derive(Clone)]
pub struct Engine {
    shared: Arc<EngineShared>,
}

impl Engine {
    /// Create an engine with the given limits and record the calling
    /// thread's stack top.
    pub fn new(config: EngineConfig) -> Self {
        let mut heap = Heap::new();
        heap.set_max_heap_bytes(config.max_heap_bytes);
        let max_stack_size = if config.max_stack_size == 0 {
            DEFAULT_MAX_STACK_SIZE
        } else {
            config.max_stack_size
        };
        let engine = Engine {
            shared: Arc::new(EngineShared {
                state: Mutex::new(EngineState {
                    heap,
                    gc: GarbageCollector::new(config.gc_threshold),
                    contexts: FxHashMap::default(),
                    module_loader: None,
                    closed: false,
                }),
                max_stack_size,
                worker_factory: Mutex::new(None),
            }),
        };
        engine.update_stack_top();
        engine
    }

    /// Take the state lock; fails once the engine is closed.
    pub(crate) fn lock(&self) -> EngineResult<MutexGuard<'_, EngineState>> {
        let guard = self.shared.state.lock();
        if guard.closed {
            return Err(EngineError::Closed);
        }
        Ok(guard)
    }

    // ===== Contexts =====

    /// Create an empty context with the given sandbox policy.
    pub fn new_context(&self, policy: SandboxPolicy) -> EngineResult<Context> {
        let id = ContextId::next();
        self.lock()?.contexts.insert(id, ContextState::new(policy));
        Ok(Context {
            engine: self.clone(),
            id,
        })
    }

    /// Tear down a context: its globals, modules, pins, and extension
    /// slots stop rooting values, and its id stops resolving. Sibling
    /// contexts and the shared heap are unaffected.
    pub fn destroy_context(&self, ctx: &Context) -> EngineResult<()> {
        let mut state = self.lock()?;
        state
            .contexts
            .remove(&ctx.id())
            .map(|_| ())
            .ok_or(EngineError::UnknownContext(ctx.id()))
    }

    /// Number of live contexts.
    pub fn context_count(&self) -> EngineResult<usize> {
        Ok(self.lock()?.contexts.len())
    }

    // ===== Worker contexts =====

    /// Install the factory used to provision worker contexts.
    pub fn set_worker_context_factory(&self, factory: WorkerContextFactory) {
        *self.shared.worker_factory.lock() = Some(factory);
    }

    /// Build a context through the registered worker factory.
    pub fn new_worker_context(&self) -> EngineResult<Context> {
        let factory = self.shared.worker_factory.lock().clone();
        match factory {
            Some(factory) => factory(self),
            None => Err(EngineError::NoWorkerFactory),
        }
    }

    // ===== Module loading =====

    /// Install a loader consulted when a context imports an unregistered
    /// module name.
    pub fn set_module_loader(&self, loader: ModuleLoader) -> EngineResult<()> {
        self.lock()?.module_loader = Some(loader);
        Ok(())
    }

    pub(crate) fn module_loader(&self) -> EngineResult<Option<ModuleLoader>> {
        Ok(self.lock()?.module_loader.clone())
    }

    // ===== Stack discipline =====

    /// Record the calling thread's stack top as the measuring origin for
    /// call depth on that thread. The constructing thread is recorded by
    /// [`Engine::new`]; hosts call this when they resume engine work on a
    /// new native stack, such as at worker thread entry.
    pub fn update_stack_top(&self) {
        STACK_TOP.with(|top| top.set(current_stack_position()));
    }

    /// Fail with a range error once the stack span from this thread's
    /// recorded top exceeds the configured size.
    pub(crate) fn check_stack(&self) -> Result<(), ScriptError> {
        let top = STACK_TOP.with(|top| top.get());
        let depth = top.saturating_sub(current_stack_position());
        if depth > self.shared.max_stack_size {
            return Err(ScriptError::Range(
                "maximum call stack size exceeded".to_string(),
            ));
        }
        Ok(())
    }

    // ===== Memory =====

    /// Force a full collection. Returns `(values freed, bytes freed)`.
    pub fn collect_garbage(&self) -> EngineResult<(usize, usize)> {
        let mut state = self.lock()?;
        Ok(state.collect(&[]))
    }

    /// Current heap usage.
    pub fn heap_stats(&self) -> EngineResult<HeapStats> {
        Ok(self.lock()?.heap.stats())
    }

    /// Accumulated collector counters.
    pub fn gc_stats(&self) -> EngineResult<GcStats> {
        Ok(self.lock()?.gc.stats())
    }

    // ===== Lifecycle =====

    /// Close the engine: drop every context and heap value. All further
    /// operations on any handle fail, and closing twice is an error.
    pub fn close(&self) -> EngineResult<()> {
        let mut state = self.shared.state.lock();
        if state.closed {
            return Err(EngineError::Closed);
        }
        state.closed = true;
        state.contexts.clear();
        state.heap.clear();
        Ok(())
    }

    /// True once [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }
}

thread_local! {
    /// Stack top last recorded on this thread; zero until recorded.
    static STACK_TOP: Cell<usize> = const { Cell::new(0) };
}

/// Address of a marker local, as a coarse stack position probe.
#[inline(never)]
fn current_stack_position() -> usize {
    let marker = 0u8;
    &marker as *const u8 as usize
}
