//! The proxy wrapper type.
//!
//! `PROXY_VALUE` is a host-installed constructor that wraps an opaque
//! identifier in a script object. Instances carry the identifier in their
//! `proxyId` property and render through `toString` as
//! `[object PROXY_VALUE(proxyId: <id>)]`, so scripts can pass host-owned
//! handles around and report them without ever seeing the host value
//! behind them.
//!
//! Installation is per context and explicit. The installed constructor is
//! cached in the context's extension slot, which gives the host-side
//! minting path [`new_proxy_value`] the constructor without a global
//! lookup per call and doubles as the installation marker.

use std::sync::Arc;

use quill_engine::{CallArgs, Context, EngineError, Pinned, ScriptError, Value};

use crate::error::{RuntimeError, RuntimeResult};

/// Global name the constructor is bound under.
pub const PROXY_GLOBAL_NAME: &str = "PROXY_VALUE";

/// Instance property holding the wrapped identifier.
pub const PROXY_ID_PROPERTY: &str = "proxyId";

/// Extension slot caching the installed constructor.
const PROXY_CTOR_SLOT: &str = "proxy.constructor";

/// Constructor body. Rejects plain calls before any allocation; in
/// construction mode it allocates the instance from `new_target`'s
/// prototype and stores the first argument, which is `Undefined` when the
/// caller passed none.
fn proxy_constructor(ctx: &Context, call: &CallArgs<'_>) -> Result<Value, ScriptError> {
    if call.new_target.is_undefined() {
        return Err(ScriptError::Type(format!(
            "{} must be called with new",
            PROXY_GLOBAL_NAME
        )));
    }
    let proto = ctx
        .get_property(call.new_target, "prototype")
        .map_err(EngineError::into_script)?;
    let instance = ctx
        .new_object_with_proto(proto.value())
        .map_err(EngineError::into_script)?;
    ctx.set_property(instance.value(), PROXY_ID_PROPERTY, call.arg(0))
        .map_err(EngineError::into_script)?;
    Ok(instance.take())
}

/// `toString` body: renders the receiver's `proxyId`. Conversion failures
/// on the stored identifier propagate unchanged.
fn proxy_to_string(ctx: &Context, call: &CallArgs<'_>) -> Result<Value, ScriptError> {
    let id = ctx
        .get_property(call.this, PROXY_ID_PROPERTY)
        .map_err(EngineError::into_script)?;
    let text = ctx
        .to_display_string(id.value())
        .map_err(EngineError::into_script)?;
    let rendered = ctx
        .new_string(&format!(
            "[object {}(proxyId: {})]",
            PROXY_GLOBAL_NAME, text
        ))
        .map_err(EngineError::into_script)?;
    Ok(rendered.take())
}

/// Install the proxy wrapper type into `ctx`.
///
/// Builds the prototype and constructor, links them, binds the
/// [`PROXY_GLOBAL_NAME`] global, and caches the constructor in the
/// context's extension slot. Installing twice into the same context is a
/// registration error. On failure nothing is bound: partially built
/// objects lose their pins and fall to the next collection.
pub fn install_proxy_type(ctx: &Context) -> RuntimeResult<()> {
    if !ctx.extension(PROXY_CTOR_SLOT)?.is_undefined() {
        return Err(RuntimeError::Registration(format!(
            "{} is already installed in this context",
            PROXY_GLOBAL_NAME
        )));
    }

    let proto = ctx.new_object()?;
    let to_string = ctx.new_function("toString", Arc::new(proxy_to_string))?;
    ctx.set_property(proto.value(), "toString", to_string.value())?;

    let ctor = ctx.new_constructor(PROXY_GLOBAL_NAME, Arc::new(proxy_constructor))?;
    ctx.set_property(ctor.value(), "prototype", proto.value())?;
    ctx.set_property(proto.value(), "constructor", ctor.value())?;

    ctx.define_global(PROXY_GLOBAL_NAME, ctor.value())?;
    // The slot is written last: it is the marker install checks against.
    ctx.set_extension(PROXY_CTOR_SLOT, ctor.value())?;
    Ok(())
}

/// Mint a proxy instance from the host side.
///
/// Resolves the constructor from the extension slot and invokes it
/// exactly as `new PROXY_VALUE(proxy_id)` would, so both paths produce
/// instances with the same prototype and rendering. Fails with a
/// reference error, without allocating, when the type is not installed
/// in `ctx`.
pub fn new_proxy_value(ctx: &Context, proxy_id: i64) -> RuntimeResult<Pinned> {
    let ctor = ctx.extension(PROXY_CTOR_SLOT)?;
    if ctor.is_undefined() {
        return Err(ctx
            .throw(ScriptError::Reference(format!(
                "{} is not defined",
                PROXY_GLOBAL_NAME
            )))
            .into());
    }
    Ok(ctx.construct(ctor, &[Value::Int(proxy_id)])?)
}

/// Render `instance` through its script-visible `toString`.
pub fn describe(ctx: &Context, instance: Value) -> RuntimeResult<String> {
    let rendered = ctx.call_method(instance, "toString", &[])?;
    Ok(ctx.read_string(rendered.value())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::build_context;
    use quill_engine::{Engine, EngineConfig, SandboxPolicy, ValueKind};

    fn proxied_context() -> (Engine, Context) {
        let engine = Engine::new(EngineConfig::default());
        let ctx = build_context(&engine, SandboxPolicy::default()).unwrap();
        install_proxy_type(&ctx).unwrap();
        (engine, ctx)
    }

    // ===== Installation =====

    #[test]
    fn test_install_binds_global_and_links_prototype() {
        let (_engine, ctx) = proxied_context();

        let ctor = ctx.lookup_global(PROXY_GLOBAL_NAME).unwrap();
        assert_eq!(ctx.kind_of(ctor.value()).unwrap(), ValueKind::Function);

        let proto = ctx.get_property(ctor.value(), "prototype").unwrap();
        assert_eq!(ctx.kind_of(proto.value()).unwrap(), ValueKind::Object);

        // proto.constructor leads back to the same function object.
        let back = ctx.get_property(proto.value(), "constructor").unwrap();
        assert_eq!(back.value().heap_id(), ctor.value().heap_id());
    }

    #[test]
    fn test_install_twice_is_a_registration_error() {
        let (_engine, ctx) = proxied_context();
        let err = install_proxy_type(&ctx).unwrap_err();
        match err {
            RuntimeError::Registration(msg) => {
                assert!(msg.contains("already installed"));
            }
            other => panic!("expected registration error, got {other:?}"),
        }
    }

    // ===== Constructor semantics =====

    #[test]
    fn test_plain_call_is_a_type_error() {
        let (_engine, ctx) = proxied_context();
        let ctor = ctx.lookup_global(PROXY_GLOBAL_NAME).unwrap();

        let err = ctx
            .call(ctor.value(), Value::Undefined, &[Value::Int(1)])
            .unwrap_err();
        let script = err.as_script().expect("script-level error");
        assert_eq!(
            script,
            &ScriptError::Type("PROXY_VALUE must be called with new".to_string())
        );

        // The failure is latched as a catchable pending exception.
        assert_eq!(ctx.take_exception().unwrap().as_ref(), Some(script));
    }

    #[test]
    fn test_construction_stores_the_identifier() {
        let (_engine, ctx) = proxied_context();
        let instance = new_proxy_value(&ctx, 42).unwrap();

        let id = ctx
            .get_property(instance.value(), PROXY_ID_PROPERTY)
            .unwrap();
        assert_eq!(id.value(), Value::Int(42));
    }

    #[test]
    fn test_construction_without_argument_leaves_identifier_undefined() {
        let (_engine, ctx) = proxied_context();
        let ctor = ctx.lookup_global(PROXY_GLOBAL_NAME).unwrap();
        let instance = ctx.construct(ctor.value(), &[]).unwrap();

        let id = ctx
            .get_property(instance.value(), PROXY_ID_PROPERTY)
            .unwrap();
        assert!(id.value().is_undefined());
        assert_eq!(
            describe(&ctx, instance.value()).unwrap(),
            "[object PROXY_VALUE(proxyId: undefined)]"
        );
    }

    // ===== Rendering =====

    #[test]
    fn test_describe_renders_the_identifier() {
        let (_engine, ctx) = proxied_context();
        let instance = new_proxy_value(&ctx, 7).unwrap();
        assert_eq!(
            describe(&ctx, instance.value()).unwrap(),
            "[object PROXY_VALUE(proxyId: 7)]"
        );
    }

    #[test]
    fn test_describe_propagates_conversion_failures() {
        let (engine, ctx) = proxied_context();
        let instance = new_proxy_value(&ctx, 0).unwrap();

        // Plant a handle, free its slot, and leave the dangling copy as
        // the identifier.
        let stale = {
            let s = ctx.new_string("gone").unwrap();
            s.value()
        };
        engine.collect_garbage().unwrap();
        ctx.set_property(instance.value(), PROXY_ID_PROPERTY, stale)
            .unwrap();

        let err = describe(&ctx, instance.value()).unwrap_err();
        match err.as_script() {
            Some(ScriptError::Conversion(msg)) => {
                assert!(msg.contains("no longer valid"));
            }
            other => panic!("expected conversion error, got {other:?}"),
        }
    }

    // ===== Host minting =====

    #[test]
    fn test_both_construction_paths_are_equivalent() {
        let (_engine, ctx) = proxied_context();

        let minted = new_proxy_value(&ctx, 99).unwrap();
        let ctor = ctx.lookup_global(PROXY_GLOBAL_NAME).unwrap();
        let scripted = ctx.construct(ctor.value(), &[Value::Int(99)]).unwrap();

        // Same prototype object, same rendering.
        let proto_a = ctx.prototype_of(minted.value()).unwrap();
        let proto_b = ctx.prototype_of(scripted.value()).unwrap();
        assert_eq!(proto_a.value().heap_id(), proto_b.value().heap_id());
        assert_eq!(
            describe(&ctx, minted.value()).unwrap(),
            describe(&ctx, scripted.value()).unwrap()
        );

        // Distinct instances all the same.
        assert_ne!(minted.value().heap_id(), scripted.value().heap_id());
    }

    #[test]
    fn test_minting_requires_installation() {
        let engine = Engine::new(EngineConfig::default());
        let ctx = build_context(&engine, SandboxPolicy::default()).unwrap();

        let before = engine.heap_stats().unwrap().allocation_count;
        let err = new_proxy_value(&ctx, 5).unwrap_err();
        match err.as_script() {
            Some(ScriptError::Reference(msg)) => {
                assert_eq!(msg, "PROXY_VALUE is not defined");
            }
            other => panic!("expected reference error, got {other:?}"),
        }
        // Nothing was allocated on the failure path.
        assert_eq!(engine.heap_stats().unwrap().allocation_count, before);
        assert!(ctx.has_exception().unwrap());
    }

    #[test]
    fn test_minted_instance_is_owned_by_the_guard() {
        let (engine, ctx) = proxied_context();
        let instance = new_proxy_value(&ctx, 11).unwrap();
        let raw = instance.value();
        assert_eq!(ctx.pin_count(raw).unwrap(), 1);

        // The pinned instance survives collection.
        engine.collect_garbage().unwrap();
        assert_eq!(
            describe(&ctx, raw).unwrap(),
            "[object PROXY_VALUE(proxyId: 11)]"
        );

        // Dropping the guard releases it to the collector.
        drop(instance);
        assert_eq!(ctx.pin_count(raw).unwrap(), 0);
        engine.collect_garbage().unwrap();
        assert!(ctx.to_display_string(raw).is_err());
    }
}
