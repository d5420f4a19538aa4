//! Static plugin registry (§4.8): a name→{create, destroy} table for
//! plugins linked into the host binary at build time, used by
//! precompiled deployments that can't (or don't want to) `dlopen` shared
//! libraries.
//!
//! A Rust binary has no mechanism to run arbitrary C++-style static
//! initializers before `main`, so there is no uniform
//! `DracRegisterPlugin_<Name>` entry point this module can call on its
//! own. Instead, the binary embedding a static plugin links against that
//! plugin's crate directly and passes its `(name, create, destroy)`
//! triple to [`init_static_plugins`] at startup; registration is
//! idempotent per name rather than a process-wide one-shot, so the call
//! can be repeated (by separate binaries, or by separate test modules
//! sharing this process's table) without losing an earlier registration.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::plugin::interfaces::{CreatePluginFn, DestroyPluginFn, PluginInstance};

#[derive(Clone, Copy)]
struct RegistryEntry {
    create: CreatePluginFn,
    destroy: DestroyPluginFn,
}

fn table() -> &'static RwLock<HashMap<String, RegistryEntry>> {
    static TABLE: std::sync::OnceLock<RwLock<HashMap<String, RegistryEntry>>> = std::sync::OnceLock::new();
    TABLE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Register one static plugin's factory/destructor pair under `name`.
/// Re-registering the same name replaces the entry — callers are
/// expected to do this only from [`init_static_plugins`].
fn register(name: &str, create: CreatePluginFn, destroy: DestroyPluginFn) {
    table()
        .write()
        .expect("static plugin registry lock poisoned")
        .insert(name.to_string(), RegistryEntry { create, destroy });
}

/// Register every `(name, create, destroy)` triple and return the number
/// of plugins now registered. Idempotent per name (`table()`'s map
/// dedups on insert), so calling this more than once — from separate
/// binaries linking their own static plugin, or from separate tests
/// sharing this process's table — only ever adds or replaces entries,
/// never loses one a prior call already registered.
pub fn init_static_plugins(plugins: &[(&str, CreatePluginFn, DestroyPluginFn)]) -> usize {
    for (name, create, destroy) in plugins {
        register(name, *create, *destroy);
    }
    table().read().expect("static plugin registry lock poisoned").len()
}

pub fn is_static_plugin(name: &str) -> bool {
    table().read().expect("static plugin registry lock poisoned").contains_key(name)
}

pub fn create_static_plugin(name: &str) -> Option<PluginInstance> {
    let entry = *table().read().expect("static plugin registry lock poisoned").get(name)?;
    Some((entry.create)())
}

/// Destroy an instance previously obtained from [`create_static_plugin`].
/// Returns `false` if `name` is not a registered static plugin (the
/// instance is dropped either way via Rust's ordinary `Drop`).
pub fn destroy_static_plugin(name: &str, instance: PluginInstance) -> bool {
    let entry = table().read().expect("static plugin registry lock poisoned").get(name).copied();
    match entry {
        Some(entry) => {
            (entry.destroy)(instance);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::interfaces::{InfoProvider, Lifecycle};
    use crate::plugin::plugin_cache::PluginCache;
    use draconis_common::types::{PluginContext, PluginDependencies, PluginMetadata, PluginType};
    use std::collections::HashMap as Map;

    struct Stub(PluginMetadata);

    impl Lifecycle for Stub {
        fn metadata(&self) -> &PluginMetadata {
            &self.0
        }
        fn initialize(&mut self, _: &PluginContext, _: &PluginCache) -> draconis_common::error::Result<()> {
            Ok(())
        }
        fn shutdown(&mut self) {}
        fn is_ready(&self) -> bool {
            true
        }
    }

    impl InfoProvider for Stub {
        fn provider_id(&self) -> &str {
            "stub"
        }
        fn collect_data(&mut self, _: &PluginCache) -> draconis_common::error::Result<()> {
            Ok(())
        }
        fn to_json(&self) -> draconis_common::error::Result<String> {
            Ok("{}".to_string())
        }
        fn fields(&self) -> Map<String, String> {
            Map::new()
        }
        fn display_value(&self) -> draconis_common::error::Result<String> {
            Ok(String::new())
        }
        fn display_icon(&self) -> String {
            String::new()
        }
        fn display_label(&self) -> String {
            String::new()
        }
        fn last_error(&self) -> Option<String> {
            None
        }
        fn is_enabled(&self) -> bool {
            true
        }
    }

    fn create() -> PluginInstance {
        PluginInstance::InfoProvider(Box::new(Stub(PluginMetadata {
            name: "stub".to_string(),
            version: "0.1.0".to_string(),
            author: "test".to_string(),
            description: "test stub".to_string(),
            plugin_type: PluginType::InfoProvider,
            dependencies: PluginDependencies::default(),
        })))
    }

    fn destroy(_instance: PluginInstance) {}

    #[test]
    fn registered_name_is_creatable_and_destroyable() {
        init_static_plugins(&[("registry_test_stub", create, destroy)]);
        assert!(is_static_plugin("registry_test_stub"));
        let instance = create_static_plugin("registry_test_stub").expect("should construct");
        assert_eq!(instance.provider_id(), Some("stub"));
        assert!(destroy_static_plugin("registry_test_stub", instance));
    }

    #[test]
    fn unknown_name_is_not_static() {
        assert!(!is_static_plugin("definitely_not_registered"));
        assert!(create_static_plugin("definitely_not_registered").is_none());
    }
}
