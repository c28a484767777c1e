//! Runtime lifecycle.
//!
//! A [`Runtime`] owns one engine and its fully provisioned default
//! context. Construction follows a fixed order: engine with limits,
//! worker-context factory, module-loader hook, default context through
//! the shared recipe, and finally the proxy wrapper type. Any failure
//! along the way closes the engine before surfacing, so a runtime either
//! exists completely or not at all.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use quill_engine::{
    Context, Engine, EngineConfig, GcStats, HeapStats, SandboxPolicy,
};

use crate::error::RuntimeResult;
use crate::options::RuntimeOptions;
use crate::proxy::install_proxy_type;
use crate::setup::build_context;

static NEXT_RUNTIME_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuntimeId(u64);

impl RuntimeId {
    fn next() -> Self {
        RuntimeId(NEXT_RUNTIME_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Numeric form of the id.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RuntimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "runtime-{}", self.0)
    }
}

/// Combined memory and collector snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeStats {
    /// Heap usage.
    pub heap: HeapStats,
    /// Collector counters.
    pub gc: GcStats,
}

struct RuntimeInner {
    id: RuntimeId,
    engine: Engine,
    default_context: Context,
    policy: SandboxPolicy,
    max_execution_time: Option<Duration>,
}

/// Handle to a configured runtime: an engine plus its default context.
///
/// Clones are cheap and refer to the same runtime. [`close`](Self::close)
/// consumes a handle and tears the runtime down; operations through
/// surviving clones fail with the closed-engine error afterwards.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    /// Build a runtime with default options.
    pub fn new() -> RuntimeResult<Self> {
        Self::with_options(RuntimeOptions::default())
    }

    /// Build a runtime from `options`.
    pub fn with_options(options: RuntimeOptions) -> RuntimeResult<Self> {
        let engine = Engine::new(EngineConfig {
            max_heap_bytes: options.memory_limit.unwrap_or(0),
            max_stack_size: options.max_stack_size.unwrap_or(0),
            gc_threshold: options.gc_threshold.unwrap_or(0),
        });
        let policy = SandboxPolicy {
            allow_filesystem: !options.sandbox.disable_filesystem,
            allow_system_time: !options.sandbox.disable_system_time,
        };

        // Worker contexts share the default context's recipe, but host
        // types are never part of it.
        engine.set_worker_context_factory(Arc::new(move |engine: &Engine| {
            build_context(engine, policy)
        }));

        if let Some(loader) = options.module_loader {
            engine.set_module_loader(loader)?;
        }

        let default_context = match build_context(&engine, policy) {
            Ok(ctx) => ctx,
            Err(err) => {
                let _ = engine.close();
                return Err(err.into());
            }
        };
        if let Err(err) = install_proxy_type(&default_context) {
            let _ = engine.close();
            return Err(err);
        }

        Ok(Runtime {
            inner: Arc::new(RuntimeInner {
                id: RuntimeId::next(),
                engine,
                default_context,
                policy,
                max_execution_time: options.max_execution_time,
            }),
        })
    }

    /// This runtime's id.
    pub fn id(&self) -> RuntimeId {
        self.inner.id
    }

    /// The default context, provisioned with the standard modules and the
    /// proxy wrapper type.
    pub fn context(&self) -> &Context {
        &self.inner.default_context
    }

    /// Create an additional context through the standard recipe. Host
    /// types are not installed; use
    /// [`install_proxy_type`](crate::install_proxy_type) where needed.
    pub fn new_context(&self) -> RuntimeResult<Context> {
        Ok(build_context(&self.inner.engine, self.inner.policy)?)
    }

    /// Create a context through the worker factory, as a worker thread
    /// would receive it.
    pub fn new_worker_context(&self) -> RuntimeResult<Context> {
        Ok(self.inner.engine.new_worker_context()?)
    }

    /// Tear down a context created by this runtime.
    pub fn destroy_context(&self, ctx: &Context) -> RuntimeResult<()> {
        Ok(self.inner.engine.destroy_context(ctx)?)
    }

    /// Record the calling thread's stack top as the origin for call-depth
    /// accounting. Call when resuming runtime work on a different native
    /// stack.
    pub fn notify_stack_top(&self) {
        self.inner.engine.update_stack_top();
    }

    /// Force a full collection. Returns `(values freed, bytes freed)`.
    pub fn collect_garbage(&self) -> RuntimeResult<(usize, usize)> {
        Ok(self.inner.engine.collect_garbage()?)
    }

    /// Memory and collector snapshot.
    pub fn stats(&self) -> RuntimeResult<RuntimeStats> {
        Ok(RuntimeStats {
            heap: self.inner.engine.heap_stats()?,
            gc: self.inner.engine.gc_stats()?,
        })
    }

    /// The configured execution time budget. Recorded from
    /// [`RuntimeOptions`] but not enforced.
    pub fn max_execution_time(&self) -> Option<Duration> {
        self.inner.max_execution_time
    }

    /// The underlying engine, for worker spawning and other engine-level
    /// operations.
    pub fn engine(&self) -> &Engine {
        &self.inner.engine
    }

    /// Tear the runtime down: every context and heap value is dropped and
    /// all surviving handles fail from here on. Consumes this handle, so a
    /// handle cannot close the same runtime twice; closing through a
    /// second clone reports the closed-engine error.
    pub fn close(self) -> RuntimeResult<()> {
        Ok(self.inner.engine.close()?)
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("id", &self.inner.id)
            .field("closed", &self.inner.engine.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuntimeError;
    use crate::options::SandboxOptions;
    use quill_engine::{EngineError, ValueKind};

    #[test]
    fn test_default_context_is_fully_provisioned() {
        let runtime = Runtime::new().unwrap();
        let ctx = runtime.context();
        assert_eq!(ctx.module_names().unwrap(), vec!["bjson", "os", "std"]);

        let proxy = ctx.lookup_global("PROXY_VALUE").unwrap();
        assert_eq!(ctx.kind_of(proxy.value()).unwrap(), ValueKind::Function);

        runtime.close().unwrap();
    }

    #[test]
    fn test_runtime_ids_are_process_unique() {
        let a = Runtime::new().unwrap();
        let b = Runtime::new().unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
        a.close().unwrap();
        b.close().unwrap();
    }

    #[test]
    fn test_additional_contexts_omit_the_proxy_type() {
        let runtime = Runtime::new().unwrap();
        let extra = runtime.new_context().unwrap();

        // Same module surface as the default context.
        assert_eq!(extra.module_names().unwrap(), vec!["bjson", "os", "std"]);
        // But no proxy constructor until it is installed explicitly.
        let proxy = extra.lookup_global("PROXY_VALUE").unwrap();
        assert!(proxy.value().is_undefined());

        runtime.destroy_context(&extra).unwrap();
        runtime.close().unwrap();
    }

    #[test]
    fn test_close_invalidates_surviving_clones() {
        let runtime = Runtime::new().unwrap();
        let survivor = runtime.clone();
        runtime.close().unwrap();

        let err = survivor.new_context().unwrap_err();
        assert!(matches!(err, RuntimeError::Engine(EngineError::Closed)));
        let err = survivor.close().unwrap_err();
        assert!(matches!(err, RuntimeError::Engine(EngineError::Closed)));
    }

    #[test]
    fn test_memory_limit_is_applied_only_when_configured() {
        // No limit: a large allocation succeeds.
        let unlimited = Runtime::new().unwrap();
        let big = vec![0u8; 1024 * 1024];
        assert!(unlimited.context().new_bytes(&big).is_ok());
        unlimited.close().unwrap();

        // Limited: the same allocation fails as an allocation error.
        let limited = Runtime::with_options(RuntimeOptions::new().with_memory_limit(64 * 1024))
            .unwrap();
        let err: RuntimeError = limited.context().new_bytes(&big).unwrap_err().into();
        assert!(matches!(err, RuntimeError::Allocation(_)));
        limited.close().unwrap();
    }

    #[test]
    fn test_execution_time_budget_is_recorded_not_enforced() {
        let runtime = Runtime::with_options(
            RuntimeOptions::new().with_max_execution_time(Duration::from_nanos(1)),
        )
        .unwrap();
        assert_eq!(
            runtime.max_execution_time(),
            Some(Duration::from_nanos(1))
        );

        // Far more than a nanosecond of work still completes.
        let ctx = runtime.context();
        for i in 0..100 {
            let s = ctx.new_string(&format!("tick {}", i)).unwrap();
            assert!(ctx.read_string(s.value()).is_ok());
        }
        runtime.close().unwrap();
    }

    #[test]
    fn test_sandbox_options_reach_every_context() {
        let runtime = Runtime::with_options(RuntimeOptions::new().with_sandbox(SandboxOptions {
            disable_filesystem: true,
            disable_system_time: true,
        }))
        .unwrap();

        let default_policy = runtime.context().sandbox_policy().unwrap();
        assert!(!default_policy.allow_filesystem);
        assert!(!default_policy.allow_system_time);

        let worker = runtime.new_worker_context().unwrap();
        let worker_policy = worker.sandbox_policy().unwrap();
        assert_eq!(worker_policy, default_policy);

        runtime.destroy_context(&worker).unwrap();
        runtime.close().unwrap();
    }

    #[test]
    fn test_stats_track_heap_growth() {
        let runtime = Runtime::new().unwrap();
        let before = runtime.stats().unwrap();
        let _blob = runtime.context().new_bytes(&[0u8; 4096]).unwrap();
        let after = runtime.stats().unwrap();
        assert!(after.heap.allocated_bytes > before.heap.allocated_bytes);
        runtime.close().unwrap();
    }
}
