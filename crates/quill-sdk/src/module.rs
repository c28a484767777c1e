//! Native module definitions.

use std::collections::HashMap;
use std::sync::Arc;

use crate::context::HostContext;
use crate::handler::{ModuleFn, NativeCallResult};
use crate::value::NativeValue;

/// A named, versioned bundle of host functions.
///
/// A module is pure data until an engine materializes it into an execution
/// context; the same definition can be registered into any number of
/// contexts. Function names are unique within a module, later registrations
/// replace earlier ones.
#[derive(Clone)]
pub struct NativeModule {
    name: String,
    version: String,
    functions: HashMap<String, ModuleFn>,
}

impl NativeModule {
    /// Create an empty module.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        NativeModule {
            name: name.into(),
            version: version.into(),
            functions: HashMap::new(),
        }
    }

    /// Module name, used as the import specifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Module version string.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Register a host function under `name`.
    pub fn register_function<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&dyn HostContext, &[NativeValue]) -> NativeCallResult + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(f));
    }

    /// Look up a registered function.
    pub fn get(&self, name: &str) -> Option<&ModuleFn> {
        self.functions.get(name)
    }

    /// True if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Number of registered functions.
    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Names of all registered functions, in unspecified order.
    pub fn function_names(&self) -> Vec<&str> {
        self.functions.keys().map(String::as_str).collect()
    }

    /// Iterate over `(name, function)` pairs, in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModuleFn)> {
        self.functions.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl std::fmt::Debug for NativeModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeModule")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("functions", &self.function_count())
            .finish()
    }
}
