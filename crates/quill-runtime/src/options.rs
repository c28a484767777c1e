//! Runtime construction options.

use std::fmt;
use std::time::Duration;

use quill_engine::ModuleLoader;

/// Host environment restrictions applied to every context a runtime
/// creates, workers included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SandboxOptions {
    /// Deny filesystem access to native modules.
    pub disable_filesystem: bool,
    /// Deny the real system clock; clock reads report a fixed timestamp.
    pub disable_system_time: bool,
}

/// Options for building a [`Runtime`](crate::Runtime).
///
/// All limits default to "engine default": unlimited heap, the engine's
/// stack span, and its collection threshold.
#[derive(Clone, Default)]
pub struct RuntimeOptions {
    pub(crate) memory_limit: Option<usize>,
    pub(crate) max_stack_size: Option<usize>,
    pub(crate) gc_threshold: Option<usize>,
    pub(crate) max_execution_time: Option<Duration>,
    pub(crate) sandbox: SandboxOptions,
    pub(crate) module_loader: Option<ModuleLoader>,
}

impl RuntimeOptions {
    /// Options with every limit at its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the shared heap at `bytes`.
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    /// Allowed stack span in bytes for call dispatch.
    pub fn with_max_stack_size(mut self, bytes: usize) -> Self {
        self.max_stack_size = Some(bytes);
        self
    }

    /// Heap growth in bytes that triggers an automatic collection.
    pub fn with_gc_threshold(mut self, bytes: usize) -> Self {
        self.gc_threshold = Some(bytes);
        self
    }

    /// Execution time budget. The runtime records the value and reports it
    /// back through [`Runtime::max_execution_time`], but nothing enforces
    /// it yet; enforcement is reserved for an interrupt hook.
    ///
    /// [`Runtime::max_execution_time`]: crate::Runtime::max_execution_time
    pub fn with_max_execution_time(mut self, limit: Duration) -> Self {
        self.max_execution_time = Some(limit);
        self
    }

    /// Apply sandbox restrictions.
    pub fn with_sandbox(mut self, sandbox: SandboxOptions) -> Self {
        self.sandbox = sandbox;
        self
    }

    /// Install a loader consulted when a context imports a module name
    /// that is not registered.
    pub fn with_module_loader(mut self, loader: ModuleLoader) -> Self {
        self.module_loader = Some(loader);
        self
    }
}

impl fmt::Debug for RuntimeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeOptions")
            .field("memory_limit", &self.memory_limit)
            .field("max_stack_size", &self.max_stack_size)
            .field("gc_threshold", &self.gc_threshold)
            .field("max_execution_time", &self.max_execution_time)
            .field("sandbox", &self.sandbox)
            .field("module_loader", &self.module_loader.is_some())
            .finish()
    }
}
