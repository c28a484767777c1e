//! Process-wide default runtime.
//!
//! A thin facade for hosts that want one implicit runtime instead of
//! passing [`Runtime`] handles around. The explicit API underneath stays
//! fully usable alongside it; the facade adds nothing but the static
//! slot.

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::error::RuntimeResult;
use crate::runtime::Runtime;
use quill_stdlib::logger;

static DEFAULT_RUNTIME: Lazy<Mutex<Option<Runtime>>> = Lazy::new(|| Mutex::new(None));

/// Get the process-wide default runtime, building it with default options
/// on first use. Every call returns a handle to the same runtime until
/// [`teardown_default`] runs. Concurrent first calls are serialized; only
/// one runtime is ever constructed.
pub fn ensure_initialized() -> RuntimeResult<Runtime> {
    let mut slot = DEFAULT_RUNTIME.lock();
    if let Some(runtime) = slot.as_ref() {
        return Ok(runtime.clone());
    }
    let runtime = Runtime::new()?;
    *slot = Some(runtime.clone());
    Ok(runtime)
}

/// The default runtime, if initialized and not torn down.
pub fn default_runtime() -> Option<Runtime> {
    DEFAULT_RUNTIME.lock().clone()
}

/// Tear down the default runtime. Call once, at process shutdown, after
/// all work against the default runtime is finished; handles obtained
/// earlier fail from here on. A later [`ensure_initialized`] would build
/// a fresh, unrelated runtime — tearing down and coming back is not a
/// supported pattern. Without a default runtime this is a no-op.
pub fn teardown_default() {
    let taken = DEFAULT_RUNTIME.lock().take();
    if let Some(runtime) = taken {
        if let Err(err) = runtime.close() {
            logger::warn(&format!("default runtime teardown failed: {}", err));
        }
    }
}
