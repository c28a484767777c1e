//! Scoped ownership of heap values.

use std::fmt;

use crate::context::Context;
use crate::error::EngineResult;
use crate::value::Value;

/// Owning guard over one pin of a heap value.
///
/// Every context operation that hands out a heap value returns it wrapped
/// in a `Pinned`; the guard releases the pin when dropped, including on
/// early error returns and panics. Ownership can be passed on with
/// [`take`](Self::take), which disarms the guard and leaves the pin to the
/// new owner. Guards over primitives are inert: there is nothing to pin.
pub struct Pinned {
    ctx: Context,
    value: Value,
    armed: bool,
}

impl Pinned {
    /// Wrap a value whose pin is already owned by the caller.
    pub(crate) fn adopt(ctx: Context, value: Value) -> Self {
        Pinned {
            ctx,
            value,
            armed: true,
        }
    }

    /// Pin `value` and wrap the new pin.
    pub fn pin(ctx: &Context, value: Value) -> EngineResult<Self> {
        ctx.pin_value(value)?;
        Ok(Pinned {
            ctx: ctx.clone(),
            value,
            armed: true,
        })
    }

    /// Add an independent pin over the same value.
    pub fn duplicate(&self) -> EngineResult<Self> {
        Pinned::pin(&self.ctx, self.value)
    }

    /// The guarded value. The copy is valid while the guard (or any other
    /// root) keeps it alive.
    pub fn value(&self) -> Value {
        self.value
    }

    /// The context holding the pin.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Transfer ownership of the pin to the caller and disarm the guard.
    pub fn take(mut self) -> Value {
        self.armed = false;
        self.value
    }
}

impl Drop for Pinned {
    fn drop(&mut self) {
        if self.armed {
            // A closed engine already dropped the pin table.
            let _ = self.ctx.unpin_value(self.value);
        }
    }
}

impl fmt::Debug for Pinned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pinned")
            .field("value", &self.value)
            .field("context", &self.ctx.id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SandboxPolicy;
    use crate::engine::{Engine, EngineConfig};

    fn setup() -> (Engine, Context) {
        let engine = Engine::new(EngineConfig::default());
        let ctx = engine.new_context(SandboxPolicy::default()).unwrap();
        (engine, ctx)
    }

    #[test]
    fn test_drop_releases_the_pin() {
        let (_engine, ctx) = setup();
        let s = ctx.new_string("guarded").unwrap();
        let raw = s.value();
        assert_eq!(ctx.pin_count(raw).unwrap(), 1);
        drop(s);
        assert_eq!(ctx.pin_count(raw).unwrap(), 0);
    }

    #[test]
    fn test_take_transfers_ownership() {
        let (_engine, ctx) = setup();
        let s = ctx.new_string("transferred").unwrap();
        let raw = s.take();
        // The guard is disarmed: the pin is still held.
        assert_eq!(ctx.pin_count(raw).unwrap(), 1);
        ctx.unpin_value(raw).unwrap();
        assert_eq!(ctx.pin_count(raw).unwrap(), 0);
    }

    #[test]
    fn test_duplicate_pins_independently() {
        let (engine, ctx) = setup();
        let s = ctx.new_string("shared").unwrap();
        let copy = s.duplicate().unwrap();
        assert_eq!(ctx.pin_count(s.value()).unwrap(), 2);

        drop(s);
        assert_eq!(ctx.pin_count(copy.value()).unwrap(), 1);

        // The surviving guard still protects the value from collection.
        engine.collect_garbage().unwrap();
        assert_eq!(ctx.read_string(copy.value()).unwrap(), "shared");
    }

    #[test]
    fn test_primitive_guards_are_inert() {
        let (_engine, ctx) = setup();
        let n = Pinned::pin(&ctx, Value::Int(5)).unwrap();
        assert_eq!(n.value(), Value::Int(5));
        assert_eq!(ctx.pin_count(n.value()).unwrap(), 0);
    }
}
