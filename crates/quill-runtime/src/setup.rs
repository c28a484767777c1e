//! The context provisioning recipe.

use quill_engine::{Context, Engine, EngineResult, SandboxPolicy};
use quill_stdlib::default_modules;

/// Build a context provisioned with the standard modules and default
/// globals.
///
/// Every context a runtime hands out goes through this function, worker
/// contexts included, so their module and global surface is identical.
/// Host types such as the proxy wrapper are not part of the recipe; they
/// are installed per context by whoever needs them.
pub(crate) fn build_context(engine: &Engine, policy: SandboxPolicy) -> EngineResult<Context> {
    let ctx = engine.new_context(policy)?;
    for module in default_modules() {
        ctx.register_module(&module)?;
    }
    // `print` is reachable without importing std.
    let print = ctx.module_export("std", "print")?;
    ctx.define_global("print", print.value())?;
    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_engine::{EngineConfig, Value, ValueKind, FALLBACK_TIMESTAMP_MS};

    #[test]
    fn test_recipe_registers_the_standard_modules() {
        let engine = Engine::new(EngineConfig::default());
        let ctx = build_context(&engine, SandboxPolicy::default()).unwrap();
        assert_eq!(ctx.module_names().unwrap(), vec!["bjson", "os", "std"]);
    }

    #[test]
    fn test_recipe_binds_print_global() {
        let engine = Engine::new(EngineConfig::default());
        let ctx = build_context(&engine, SandboxPolicy::default()).unwrap();
        let print = ctx.lookup_global("print").unwrap();
        assert_eq!(ctx.kind_of(print.value()).unwrap(), ValueKind::Function);
    }

    #[test]
    fn test_denied_clock_reports_fallback_timestamp() {
        let engine = Engine::new(EngineConfig::default());
        let ctx = build_context(
            &engine,
            SandboxPolicy {
                allow_filesystem: true,
                allow_system_time: false,
            },
        )
        .unwrap();

        let now = ctx.module_export("os", "now").unwrap();
        let t = ctx.call(now.value(), Value::Undefined, &[]).unwrap();
        assert_eq!(t.value(), Value::Int(FALLBACK_TIMESTAMP_MS));
    }

    #[test]
    fn test_denied_filesystem_rejects_reads() {
        let engine = Engine::new(EngineConfig::default());
        let ctx = build_context(
            &engine,
            SandboxPolicy {
                allow_filesystem: false,
                allow_system_time: true,
            },
        )
        .unwrap();

        let read = ctx.module_export("os", "readTextFile").unwrap();
        let path = ctx.new_string("/etc/hostname").unwrap();
        let err = ctx
            .call(read.value(), Value::Undefined, &[path.value()])
            .unwrap_err();
        let script = err.as_script().expect("script-level error");
        assert!(script.message().contains("filesystem access is disabled"));
    }
}
