//! Mapping from embedder runtime handles to engines.
//!
//! Hook callbacks arrive from the embedder carrying only an opaque handle
//! to the runtime that fired them. The registry resolves that handle to the
//! engine driving it. Ownership is explicit: whoever creates the engines
//! owns a registry, registers each runtime, and unregisters it when the
//! runtime goes away. Dropping the last entry tears the engine down.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::Engine;

/// Opaque identity of one embedder runtime instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuntimeHandle(pub u64);

#[derive(Default)]
pub struct Registry {
    engines: Mutex<HashMap<RuntimeHandle, Engine>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handle: RuntimeHandle, engine: Engine) {
        tracing::debug!(?handle, "registering runtime");
        self.engines.lock().unwrap().insert(handle, engine);
    }

    pub fn unregister(&self, handle: RuntimeHandle) -> Option<Engine> {
        tracing::debug!(?handle, "unregistering runtime");
        self.engines.lock().unwrap().remove(&handle)
    }

    /// The engine driving this runtime, if it is registered.
    pub fn find(&self, handle: RuntimeHandle) -> Option<Engine> {
        self.engines.lock().unwrap().get(&handle).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::NullInterpreter;

    #[test]
    fn register_find_unregister() {
        let registry = Registry::new();
        assert!(registry.is_empty());

        let engine = Engine::detached(Box::new(NullInterpreter));
        registry.register(RuntimeHandle(1), engine);

        assert!(registry.find(RuntimeHandle(1)).is_some());
        assert!(registry.find(RuntimeHandle(2)).is_none());

        assert!(registry.unregister(RuntimeHandle(1)).is_some());
        assert!(registry.is_empty());
        assert!(registry.unregister(RuntimeHandle(1)).is_none());
    }
}
