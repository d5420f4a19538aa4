//! Dynamic plugin manager (§4.7): discovery, load/unload, log-level
//! propagation, and the static/dynamic dedup rule, behind a single
//! process-wide singleton (§5 "Process-wide singletons").

use std::collections::HashMap;
use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::sync::{OnceLock, RwLock};

use libloading::{Library, Symbol};
use tracing::{debug, error, info, warn};

use draconis_common::error::{Error, ErrorKind, Result};
use draconis_common::types::{LoadedPlugin, PluginContext, PluginMetadata, PluginType};

use crate::plugin::interfaces::{abi, PluginInstance};
use crate::plugin::plugin_cache::PluginCache;
use crate::plugin::registry;

/// The shared-library extension this platform's dynamic plugins use.
#[cfg(target_os = "windows")]
pub const PLUGIN_EXTENSION: &str = "dll";
#[cfg(target_os = "macos")]
pub const PLUGIN_EXTENSION: &str = "dylib";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub const PLUGIN_EXTENSION: &str = "so";

/// Discovery search paths in priority order (first hit per name wins),
/// per §4.7.
pub fn default_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    #[cfg(target_os = "windows")]
    {
        if let Ok(local) = std::env::var("LOCALAPPDATA") {
            paths.push(PathBuf::from(local).join("draconis++").join("plugins"));
        }
        if let Ok(roaming) = std::env::var("APPDATA") {
            paths.push(PathBuf::from(roaming).join("draconis++").join("plugins"));
        }
        if let Ok(profile) = std::env::var("USERPROFILE") {
            paths.push(PathBuf::from(profile).join(".config").join("draconis++").join("plugins"));
        }
    }
    #[cfg(not(target_os = "windows"))]
    {
        paths.push(PathBuf::from("/usr/local/lib/draconis++/plugins"));
        paths.push(PathBuf::from("/usr/lib/draconis++/plugins"));
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".local/lib/draconis++/plugins"));
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join("plugins"));
    }

    paths
}

/// Config passed to [`PluginManager::initialize`].
#[derive(Debug, Clone, Default)]
pub struct PluginManagerConfig {
    pub extra_search_paths: Vec<PathBuf>,
    pub auto_load: Vec<String>,
}

/// Storage for one loaded instance, split by how it was obtained.
///
/// `Static` owns the instance directly — it lives in this process's own
/// allocator since no `dlopen` was involved. `Dynamic` holds the raw
/// pointer the plugin's `CreatePlugin` export returned and never
/// reconstructs a `Box` from it on this side of the boundary; only the
/// plugin's own `DestroyPlugin` export is allowed to do that (see
/// [`crate::plugin::interfaces`] module docs).
enum Instance {
    Static(Option<PluginInstance>),
    Dynamic { raw: *mut c_void, library: Library },
}

// SAFETY: the boxed `PluginInstance` behind `raw` is `Send + Sync` (its
// trait objects require `Lifecycle: Send + Sync`); all access is
// serialised by `PluginManager`'s `RwLock`.
unsafe impl Send for Instance {}
unsafe impl Sync for Instance {}

impl Instance {
    fn as_mut(&mut self) -> &mut PluginInstance {
        match self {
            Instance::Static(instance) => instance.as_mut().expect("static plugin instance already destroyed"),
            Instance::Dynamic { raw, .. } => unsafe { &mut *(*raw as *mut PluginInstance) },
        }
    }

    fn as_ref(&self) -> &PluginInstance {
        match self {
            Instance::Static(instance) => instance.as_ref().expect("static plugin instance already destroyed"),
            Instance::Dynamic { raw, .. } => unsafe { &*(*raw as *const PluginInstance) },
        }
    }
}

struct PluginRecord {
    path: Option<PathBuf>,
    instance: Instance,
}

#[derive(Default)]
struct ManagerState {
    search_paths: Vec<PathBuf>,
    discovered: HashMap<String, PathBuf>,
    loaded: HashMap<String, PluginRecord>,
    info_providers: Vec<String>,
    output_formats: Vec<String>,
    initialized: bool,
}

/// Discovery, lifecycle, and typed-cache host for dynamic and static
/// plugins. One process-wide instance is reachable via [`instance`]; a
/// manager can also be constructed directly for tests.
pub struct PluginManager {
    state: RwLock<ManagerState>,
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginManager {
    pub fn new() -> Self {
        PluginManager {
            state: RwLock::new(ManagerState::default()),
        }
    }

    /// The process-wide singleton (§5 "Process-wide singletons").
    pub fn instance() -> &'static PluginManager {
        static INSTANCE: OnceLock<PluginManager> = OnceLock::new();
        INSTANCE.get_or_init(PluginManager::new)
    }

    /// Idempotent: adds default search paths plus `config`'s extras,
    /// scans, and auto-loads the configured names. Individual auto-load
    /// failures are logged, never abort initialization.
    pub fn initialize(&self, config: &PluginManagerConfig, cache: &PluginCache) {
        {
            let mut state = self.state.write().expect("plugin manager lock poisoned");
            if state.initialized {
                return;
            }
            state.search_paths = default_search_paths();
            state.search_paths.extend(config.extra_search_paths.iter().cloned());
            state.initialized = true;
        }

        self.scan_for_plugins();

        for name in &config.auto_load {
            if let Err(err) = self.load_plugin(name, cache) {
                warn!(plugin = %name, error = %err, "auto-load failed during plugin manager initialization");
            }
        }
    }

    /// Populate the name→path map from the union of search paths,
    /// keeping the first path a name is found under.
    pub fn scan_for_plugins(&self) {
        let search_paths = self.state.read().expect("plugin manager lock poisoned").search_paths.clone();
        let mut discovered = HashMap::new();

        for dir in &search_paths {
            let entries = match std::fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(_) => continue,
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some(PLUGIN_EXTENSION) {
                    continue;
                }
                let Some(name) = path.file_stem().and_then(|n| n.to_str()) else {
                    continue;
                };
                discovered.entry(name.to_string()).or_insert(path);
            }
        }

        let count = discovered.len();
        self.state.write().expect("plugin manager lock poisoned").discovered = discovered;
        debug!(count, "plugin discovery complete");
    }

    pub fn is_plugin_loaded(&self, name: &str) -> bool {
        self.state.read().expect("plugin manager lock poisoned").loaded.contains_key(name)
    }

    /// Load `name`: no-op if already loaded, static registry first, then
    /// the discovered dynamic library (§4.7 "loadPlugin").
    pub fn load_plugin(&self, name: &str, cache: &PluginCache) -> Result<()> {
        if self.is_plugin_loaded(name) {
            return Ok(());
        }

        if registry::is_static_plugin(name) {
            return self.load_static(name, cache);
        }

        let path = {
            let state = self.state.read().expect("plugin manager lock poisoned");
            state.discovered.get(name).cloned()
        };
        let path = path.ok_or_else(|| Error::new(ErrorKind::NotFound, format!("plugin {name:?} not discovered")))?;
        self.load_dynamic(name, &path, cache)
    }

    fn load_static(&self, name: &str, cache: &PluginCache) -> Result<()> {
        let mut instance = registry::create_static_plugin(name)
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("static plugin {name:?} not registered")))?;

        let context = host_plugin_context(name)?;
        if let Err(err) = instance.initialize(&context, cache) {
            registry::destroy_static_plugin(name, instance);
            return Err(err);
        }

        self.insert_loaded(name, None, Instance::Static(Some(instance)));
        Ok(())
    }

    fn load_dynamic(&self, name: &str, path: &Path, cache: &PluginCache) -> Result<()> {
        let library = unsafe { Library::new(path) }
            .map_err(|e| Error::new(ErrorKind::ApiUnavailable, format!("{}: failed to load library: {e}", path.display())))?;

        let create: Symbol<abi::CreatePluginAbi> = unsafe { library.get(abi::CREATE_PLUGIN_SYMBOL) }
            .map_err(|e| Error::new(ErrorKind::ApiUnavailable, format!("{name}: missing CreatePlugin export: {e}")))?;
        unsafe { library.get::<abi::DestroyPluginAbi>(abi::DESTROY_PLUGIN_SYMBOL) }
            .map_err(|e| Error::new(ErrorKind::ApiUnavailable, format!("{name}: missing DestroyPlugin export: {e}")))?;

        if let Ok(set_log_level) = unsafe { library.get::<abi::SetPluginLogLevelAbi>(abi::SET_LOG_LEVEL_SYMBOL) } {
            unsafe { set_log_level(crate::logging::log_level_ptr()) };
        }

        let raw = unsafe { create() };
        if raw.is_null() {
            return Err(Error::new(ErrorKind::InternalError, format!("{name}: CreatePlugin returned a null instance")));
        }

        let provider_id = unsafe { &*(raw as *const PluginInstance) }.provider_id().map(str::to_string);
        if let Some(id) = &provider_id {
            let already_static = {
                let state = self.state.read().expect("plugin manager lock poisoned");
                state
                    .info_providers
                    .iter()
                    .filter_map(|loaded_name| state.loaded.get(loaded_name))
                    .any(|record| matches!(&record.instance, Instance::Static(_)) && record.instance.as_ref().provider_id() == Some(id.as_str()))
            };
            if already_static {
                debug!(plugin = %name, provider_id = %id, "skipping dynamic load: provider id already served by a static plugin");
                unsafe { destroy_dynamic(&library, raw) };
                return Ok(());
            }
        }

        let mut instance_box = Instance::Dynamic { raw, library };
        let context = host_plugin_context(name)?;
        if let Err(err) = instance_box.as_mut().initialize(&context, cache) {
            if let Instance::Dynamic { raw, library } = &instance_box {
                unsafe { destroy_dynamic(library, *raw) };
            }
            return Err(err);
        }

        self.insert_loaded(name, Some(path.to_path_buf()), instance_box);
        Ok(())
    }

    fn insert_loaded(&self, name: &str, path: Option<PathBuf>, instance: Instance) {
        let plugin_type = instance.as_ref().metadata().plugin_type;
        let mut state = self.state.write().expect("plugin manager lock poisoned");
        match plugin_type {
            PluginType::InfoProvider => state.info_providers.push(name.to_string()),
            PluginType::OutputFormat => state.output_formats.push(name.to_string()),
        }
        state.loaded.insert(name.to_string(), PluginRecord { path, instance });
        info!(plugin = name, "plugin loaded");
    }

    /// Shut down, remove from typed caches, and free `name`. No-op if
    /// not loaded.
    pub fn unload_plugin(&self, name: &str) -> Result<()> {
        let mut state = self.state.write().expect("plugin manager lock poisoned");
        let Some(mut record) = state.loaded.remove(name) else {
            return Ok(());
        };
        state.info_providers.retain(|n| n != name);
        state.output_formats.retain(|n| n != name);
        drop(state);

        record.instance.as_mut().shutdown();

        match record.instance {
            Instance::Static(instance) => {
                registry::destroy_static_plugin(name, instance.expect("instance present"));
            }
            Instance::Dynamic { raw, library } => unsafe {
                destroy_dynamic(&library, raw);
            },
        }

        info!(plugin = name, "plugin unloaded");
        Ok(())
    }

    /// Look up a loaded info-provider plugin by its `provider_id` (not
    /// its load name) and run `f` against it under the write lock.
    pub fn with_info_provider<R>(&self, provider_id: &str, f: impl FnOnce(&mut dyn crate::plugin::interfaces::InfoProvider) -> R) -> Option<R> {
        let mut state = self.state.write().expect("plugin manager lock poisoned");
        let names = state.info_providers.clone();
        for name in names {
            if let Some(record) = state.loaded.get_mut(&name) {
                if let PluginInstance::InfoProvider(provider) = record.instance.as_mut() {
                    if provider.provider_id() == provider_id {
                        return Some(f(provider.as_mut()));
                    }
                }
            }
        }
        None
    }

    pub fn list_loaded_plugins(&self) -> Vec<LoadedPlugin> {
        let state = self.state.read().expect("plugin manager lock poisoned");
        let mut out: Vec<LoadedPlugin> = state
            .loaded
            .values()
            .map(|record| {
                let metadata = record.instance.as_ref().metadata().clone();
                LoadedPlugin {
                    path: record.path.clone(),
                    has_library_handle: matches!(record.instance, Instance::Dynamic { .. }),
                    is_initialized: true,
                    is_ready: record.instance.as_ref().is_ready(),
                    is_loaded: true,
                    metadata,
                }
            })
            .collect();
        out.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        out
    }

    /// Metadata for every discovered plugin, loaded or not. Already-loaded
    /// plugins report their live metadata; a discovered-but-unloaded
    /// dynamic library is briefly `CreatePlugin`'d/`DestroyPlugin`'d just to
    /// read its metadata, without being registered as loaded. Entries whose
    /// library can't even be probed this way are skipped.
    pub fn list_discovered_plugins(&self) -> Vec<PluginMetadata> {
        let (discovered, loaded_static_or_dynamic): (Vec<(String, PathBuf)>, HashMap<String, PluginMetadata>) = {
            let state = self.state.read().expect("plugin manager lock poisoned");
            let discovered = state.discovered.iter().map(|(n, p)| (n.clone(), p.clone())).collect();
            let loaded = state
                .loaded
                .iter()
                .map(|(n, r)| (n.clone(), r.instance.as_ref().metadata().clone()))
                .collect();
            (discovered, loaded)
        };

        let mut names: Vec<String> = discovered.iter().map(|(n, _)| n.clone()).collect();
        names.sort();

        names
            .into_iter()
            .filter_map(|name| {
                if let Some(metadata) = loaded_static_or_dynamic.get(&name) {
                    return Some(metadata.clone());
                }
                let path = discovered.iter().find(|(n, _)| n == &name).map(|(_, p)| p)?;
                probe_metadata(path)
            })
            .collect()
    }
}

impl Drop for PluginManager {
    /// Mirrors the reference's singleton teardown: every still-loaded
    /// plugin is shut down before the manager itself goes away.
    fn drop(&mut self) {
        let names: Vec<String> = self.state.read().expect("plugin manager lock poisoned").loaded.keys().cloned().collect();
        for name in names {
            if let Err(err) = self.unload_plugin(&name) {
                error!(plugin = %name, error = %err, "error unloading plugin during manager teardown");
            }
        }
    }
}

/// Load `path`, construct an instance just long enough to clone its
/// metadata, then destroy it and drop the library. Used only by
/// [`PluginManager::list_discovered_plugins`] — never registers the
/// instance as loaded.
fn probe_metadata(path: &Path) -> Option<PluginMetadata> {
    let library = unsafe { Library::new(path) }.ok()?;
    let create: Symbol<abi::CreatePluginAbi> = unsafe { library.get(abi::CREATE_PLUGIN_SYMBOL) }.ok()?;
    let raw = unsafe { create() };
    if raw.is_null() {
        return None;
    }
    let metadata = unsafe { &*(raw as *const PluginInstance) }.metadata().clone();
    unsafe { destroy_dynamic(&library, raw) };
    Some(metadata)
}

unsafe fn destroy_dynamic(library: &Library, raw: *mut c_void) {
    if let Ok(destroy) = library.get::<abi::DestroyPluginAbi>(abi::DESTROY_PLUGIN_SYMBOL) {
        destroy(raw);
    }
}

/// Host-provided config/cache/data directories for plugin `name`, under
/// the platform's standard per-user locations (§4.7 step 4).
fn host_plugin_context(name: &str) -> Result<PluginContext> {
    let config_base = dirs::config_dir().ok_or_else(|| Error::new(ErrorKind::ApiUnavailable, "no platform config directory"))?;
    let cache_base = dirs::cache_dir().ok_or_else(|| Error::new(ErrorKind::ApiUnavailable, "no platform cache directory"))?;
    let data_base = dirs::data_dir().ok_or_else(|| Error::new(ErrorKind::ApiUnavailable, "no platform data directory"))?;

    let context = PluginContext {
        config_dir: config_base.join("draconis++").join("plugins").join(name),
        cache_dir: cache_base.join("draconis++").join("plugins").join(name),
        data_dir: data_base.join("draconis++").join("plugins").join(name),
    };
    std::fs::create_dir_all(&context.config_dir)?;
    std::fs::create_dir_all(&context.cache_dir)?;
    std::fs::create_dir_all(&context.data_dir)?;
    Ok(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::interfaces::{InfoProvider, Lifecycle};
    use draconis_common::types::{PluginDependencies, PluginMetadata, PluginType};
    use std::collections::HashMap as Map;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct RecordingPlugin {
        metadata: PluginMetadata,
        events: Arc<Mutex<Vec<&'static str>>>,
        ready: bool,
    }

    use std::sync::Mutex;

    impl Lifecycle for RecordingPlugin {
        fn metadata(&self) -> &PluginMetadata {
            &self.metadata
        }
        fn initialize(&mut self, _: &PluginContext, _: &PluginCache) -> Result<()> {
            self.events.lock().unwrap().push("initialize");
            self.ready = true;
            Ok(())
        }
        fn shutdown(&mut self) {
            self.events.lock().unwrap().push("shutdown");
        }
        fn is_ready(&self) -> bool {
            self.ready
        }
    }

    impl InfoProvider for RecordingPlugin {
        fn provider_id(&self) -> &str {
            "rec"
        }
        fn collect_data(&mut self, _: &PluginCache) -> Result<()> {
            Ok(())
        }
        fn to_json(&self) -> Result<String> {
            Ok("{}".to_string())
        }
        fn fields(&self) -> Map<String, String> {
            Map::new()
        }
        fn display_value(&self) -> Result<String> {
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

    static EVENTS: OnceLock<Arc<Mutex<Vec<&'static str>>>> = OnceLock::new();
    static CALL_COUNT: AtomicUsize = AtomicUsize::new(0);

    fn events() -> Arc<Mutex<Vec<&'static str>>> {
        EVENTS.get_or_init(|| Arc::new(Mutex::new(Vec::new()))).clone()
    }

    fn create_recording() -> PluginInstance {
        CALL_COUNT.fetch_add(1, Ordering::SeqCst);
        PluginInstance::InfoProvider(Box::new(RecordingPlugin {
            metadata: PluginMetadata {
                name: "recorder".to_string(),
                version: "0.1.0".to_string(),
                author: "test".to_string(),
                description: "records lifecycle events".to_string(),
                plugin_type: PluginType::InfoProvider,
                dependencies: PluginDependencies::default(),
            },
            events: events(),
            ready: false,
        }))
    }

    fn destroy_recording(_instance: PluginInstance) {}

    #[test]
    fn load_then_unload_produces_initialize_then_shutdown() {
        registry::init_static_plugins(&[("recorder-manager-test", create_recording, destroy_recording)]);
        let manager = PluginManager::new();
        let dir = tempfile::tempdir().unwrap();
        let cache = PluginCache::new(dir.path()).unwrap();

        manager.load_plugin("recorder-manager-test", &cache).unwrap();
        assert!(manager.is_plugin_loaded("recorder-manager-test"));
        manager.unload_plugin("recorder-manager-test").unwrap();
        assert!(!manager.is_plugin_loaded("recorder-manager-test"));

        let log = events().lock().unwrap().clone();
        assert_eq!(log, vec!["initialize", "shutdown"]);
    }

    #[test]
    fn loading_twice_yields_exactly_one_instance() {
        registry::init_static_plugins(&[("recorder-dedup-test", create_recording, destroy_recording)]);
        let manager = PluginManager::new();
        let dir = tempfile::tempdir().unwrap();
        let cache = PluginCache::new(dir.path()).unwrap();

        manager.load_plugin("recorder-dedup-test", &cache).unwrap();
        manager.load_plugin("recorder-dedup-test", &cache).unwrap();
        assert_eq!(manager.list_loaded_plugins().len(), 1);
    }
}
