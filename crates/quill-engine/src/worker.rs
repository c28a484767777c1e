//! Worker threads with engine-provisioned contexts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use crate::context::Context;
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};

static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

/// Run `work` on a fresh thread with a context built by the engine's
/// worker factory.
///
/// The thread records its own stack top before touching the engine and
/// destroys its context when `work` returns. Join the handle for the
/// result; factory failures surface there.
pub fn spawn_worker<T, F>(engine: &Engine, work: F) -> EngineResult<JoinHandle<EngineResult<T>>>
where
    T: Send + 'static,
    F: FnOnce(&Context) -> T + Send + 'static,
{
    let id = NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed);
    let engine = engine.clone();
    thread::Builder::new()
        .name(format!("quill-worker-{}", id))
        .spawn(move || -> EngineResult<T> {
            engine.update_stack_top();
            let ctx = engine.new_worker_context()?;
            let out = work(&ctx);
            engine.destroy_context(&ctx)?;
            Ok(out)
        })
        .map_err(|e| EngineError::WorkerSpawn(e.to_string()))
}
