//! Plugin discovery and loading.
//!
//! The plugin root holds one directory per plugin type, each holding one
//! directory per instance:
//!
//! ```text
//! <root>/chat_interfaces/matrix_messenger/plugin.toml   (optional)
//! ```
//!
//! Instances are built from a [`PluginCatalog`] of constructors compiled into
//! the binary. The directory layout decides which instances exist.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

use reverie_core::{
    capability::{CapabilityName, CapabilitySet},
    error::ReverieError,
    traits::{capabilities_of, Plugin},
};
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::context::HostContext;

/// Builds one plugin instance from the shared context and its instance name.
pub type PluginConstructor = fn(&HostContext, &str) -> Result<Arc<dyn Plugin>, ReverieError>;

/// Constructors keyed by entry point (`"<type>/<name>"` by convention).
#[derive(Default, Clone)]
pub struct PluginCatalog {
    entries: BTreeMap<String, PluginConstructor>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, entry: &str, constructor: PluginConstructor) -> Self {
        self.entries.insert(entry.to_string(), constructor);
        self
    }

    pub fn get(&self, entry: &str) -> Option<PluginConstructor> {
        self.entries.get(entry).copied()
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Optional `plugin.toml` in an instance directory.
#[derive(Debug, Deserialize)]
struct PluginManifest {
    entry: Option<String>,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// One loaded plugin and the capabilities it was found to implement.
#[derive(Clone)]
pub struct PluginDescriptor {
    /// `<type>_<name>`, unique within the registry.
    pub id: String,
    pub plugin_type: String,
    pub name: String,
    pub capabilities: CapabilitySet,
    pub instance: Arc<dyn Plugin>,
}

impl PluginDescriptor {
    pub fn has(&self, capability: CapabilityName) -> bool {
        self.capabilities.contains(capability)
    }
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("id", &self.id)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

/// Loaded plugins in registration order.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: Vec<PluginDescriptor>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plugin types under `root`, sorted.
    pub fn discover_types(root: &Path) -> Vec<String> {
        match list_dirs(root) {
            Ok(types) => types,
            Err(e) => {
                error!("Plugin root {} is unreadable: {e}", root.display());
                Vec::new()
            }
        }
    }

    /// Load every type under `root`. Returns the number of plugins loaded.
    pub fn load_root(&mut self, root: &Path, catalog: &PluginCatalog, ctx: &HostContext) -> usize {
        Self::discover_types(root)
            .iter()
            .map(|plugin_type| self.load_all(root, plugin_type, catalog, ctx))
            .sum()
    }

    /// Load every instance of one plugin type. Returns the number loaded.
    ///
    /// Failures are logged and the instance skipped.
    pub fn load_all(
        &mut self,
        root: &Path,
        plugin_type: &str,
        catalog: &PluginCatalog,
        ctx: &HostContext,
    ) -> usize {
        let type_dir = root.join(plugin_type);
        let names = match list_dirs(&type_dir) {
            Ok(names) => names,
            Err(e) => {
                error!("Cannot read plugin type dir {}: {e}", type_dir.display());
                return 0;
            }
        };

        let mut loaded = 0;
        for name in names {
            match self.load(&type_dir, plugin_type, &name, catalog, ctx) {
                Ok(true) => loaded += 1,
                Ok(false) => {}
                Err(e) => error!("Failed to load plugin {plugin_type}/{name}: {e}"),
            }
        }
        loaded
    }

    /// Load one instance. `Ok(false)` means it is disabled by its manifest.
    pub fn load(
        &mut self,
        type_dir: &Path,
        plugin_type: &str,
        name: &str,
        catalog: &PluginCatalog,
        ctx: &HostContext,
    ) -> Result<bool, ReverieError> {
        if !valid_name(name) {
            return Err(ReverieError::PluginLoad(format!(
                "invalid instance name '{name}'"
            )));
        }

        let manifest = read_manifest(&type_dir.join(name))?;
        if manifest.as_ref().is_some_and(|m| !m.enabled) {
            info!("Plugin {plugin_type}/{name} is disabled, skipping");
            return Ok(false);
        }
        let entry = manifest
            .and_then(|m| m.entry)
            .unwrap_or_else(|| format!("{plugin_type}/{name}"));

        let constructor = catalog
            .get(&entry)
            .ok_or_else(|| ReverieError::PluginLoad(format!("unknown entry point '{entry}'")))?;

        let instance = catch_unwind(AssertUnwindSafe(|| constructor(ctx, name)))
            .map_err(|_| ReverieError::PluginLoad(format!("constructor '{entry}' panicked")))??;

        self.register(plugin_type, name, instance)?;
        Ok(true)
    }

    /// Add an already-built plugin. Capabilities are computed here, once.
    pub fn register(
        &mut self,
        plugin_type: &str,
        name: &str,
        instance: Arc<dyn Plugin>,
    ) -> Result<&PluginDescriptor, ReverieError> {
        let id = format!("{plugin_type}_{name}");
        if self.get(&id).is_some() {
            return Err(ReverieError::PluginLoad(format!("duplicate plugin id '{id}'")));
        }

        let capabilities = capabilities_of(instance.as_ref());
        info!("Loaded plugin {id} with capabilities {capabilities:?}");
        self.plugins.push(PluginDescriptor {
            id,
            plugin_type: plugin_type.to_string(),
            name: name.to_string(),
            capabilities,
            instance,
        });
        Ok(&self.plugins[self.plugins.len() - 1])
    }

    pub fn iter(&self) -> impl Iterator<Item = &PluginDescriptor> {
        self.plugins.iter()
    }

    /// Plugins implementing `capability`, in registration order.
    pub fn with_capability(
        &self,
        capability: CapabilityName,
    ) -> impl Iterator<Item = &PluginDescriptor> {
        self.plugins.iter().filter(move |p| p.has(capability))
    }

    pub fn get(&self, id: &str) -> Option<&PluginDescriptor> {
        self.plugins.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

/// Sorted names of the visible subdirectories of `dir`.
fn list_dirs(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with('.') || name == "__pycache__" {
            debug!("Ignoring {}", path.display());
            continue;
        }
        names.push(name.to_string());
    }
    names.sort();
    Ok(names)
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn read_manifest(dir: &Path) -> Result<Option<PluginManifest>, ReverieError> {
    let path = dir.join("plugin.toml");
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)?;
    toml::from_str(&content)
        .map(Some)
        .map_err(|e| ReverieError::PluginLoad(format!("bad manifest {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::WakeScheduler;
    use async_trait::async_trait;
    use reverie_core::{config::Config, traits::OnStartup};
    use tempfile::TempDir;

    struct Quiet(String);

    impl Plugin for Quiet {
        fn name(&self) -> &str {
            &self.0
        }
    }

    struct Starter(String);

    #[async_trait]
    impl OnStartup for Starter {
        async fn on_startup(&self) -> Result<(), ReverieError> {
            Ok(())
        }
    }

    impl Plugin for Starter {
        fn name(&self) -> &str {
            &self.0
        }

        fn as_on_startup(&self) -> Option<&dyn OnStartup> {
            Some(self)
        }
    }

    fn quiet(_: &HostContext, name: &str) -> Result<Arc<dyn Plugin>, ReverieError> {
        Ok(Arc::new(Quiet(name.to_string())))
    }

    fn starter(_: &HostContext, name: &str) -> Result<Arc<dyn Plugin>, ReverieError> {
        Ok(Arc::new(Starter(name.to_string())))
    }

    fn failing(_: &HostContext, _: &str) -> Result<Arc<dyn Plugin>, ReverieError> {
        Err(ReverieError::PluginLoad("no credentials".to_string()))
    }

    fn panicking(_: &HostContext, _: &str) -> Result<Arc<dyn Plugin>, ReverieError> {
        panic!("boom");
    }

    fn ctx() -> HostContext {
        let config = Arc::new(Config::default());
        let scheduler = Arc::new(WakeScheduler::new(60, 60));
        HostContext::new(config, scheduler, true)
    }

    fn catalog() -> PluginCatalog {
        PluginCatalog::new()
            .with("bots/alpha", starter)
            .with("bots/beta", quiet)
            .with("bots/broken", failing)
            .with("bots/explodes", panicking)
            .with("shared/quiet", quiet)
    }

    fn mkdirs(root: &Path, dirs: &[&str]) {
        for d in dirs {
            std::fs::create_dir_all(root.join(d)).unwrap();
        }
    }

    #[test]
    fn test_discover_types_sorted() {
        let tmp = TempDir::new().unwrap();
        mkdirs(tmp.path(), &["user_interfaces", "bots", "chat_interfaces", ".git"]);
        std::fs::write(tmp.path().join("README"), "not a type").unwrap();

        assert_eq!(
            PluginRegistry::discover_types(tmp.path()),
            vec!["bots", "chat_interfaces", "user_interfaces"]
        );
    }

    #[test]
    fn test_discover_types_missing_root() {
        let types = PluginRegistry::discover_types(Path::new("/tmp/__reverie_no_such_root__"));
        assert!(types.is_empty());
    }

    #[test]
    fn test_load_all_skips_failures() {
        let tmp = TempDir::new().unwrap();
        mkdirs(
            tmp.path(),
            &[
                "bots/beta",
                "bots/alpha",
                "bots/broken",
                "bots/explodes",
                "bots/unknown",
                "bots/bad name",
            ],
        );

        let mut registry = PluginRegistry::new();
        let loaded = registry.load_all(tmp.path(), "bots", &catalog(), &ctx());

        assert_eq!(loaded, 2);
        let ids: Vec<&str> = registry.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["bots_alpha", "bots_beta"]);
        assert!(registry.get("bots_alpha").unwrap().has(CapabilityName::OnStartup));
        assert!(registry.get("bots_beta").unwrap().capabilities.is_empty());
    }

    #[test]
    fn test_manifest_entry_and_disabled() {
        let tmp = TempDir::new().unwrap();
        mkdirs(tmp.path(), &["bots/first", "bots/second", "bots/third"]);
        std::fs::write(
            tmp.path().join("bots/first/plugin.toml"),
            "entry = \"shared/quiet\"\n",
        )
        .unwrap();
        std::fs::write(
            tmp.path().join("bots/second/plugin.toml"),
            "entry = \"shared/quiet\"\nenabled = false\n",
        )
        .unwrap();
        std::fs::write(tmp.path().join("bots/third/plugin.toml"), "entry = [").unwrap();

        let mut registry = PluginRegistry::new();
        let loaded = registry.load_all(tmp.path(), "bots", &catalog(), &ctx());

        assert_eq!(loaded, 1);
        let first = registry.get("bots_first").unwrap();
        assert_eq!(first.instance.name(), "first");
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut registry = PluginRegistry::new();
        registry
            .register("bots", "alpha", Arc::new(Quiet("alpha".into())))
            .unwrap();
        let err = registry
            .register("bots", "alpha", Arc::new(Quiet("alpha".into())))
            .unwrap_err();
        assert!(matches!(err, ReverieError::PluginLoad(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_load_root_walks_every_type() {
        let tmp = TempDir::new().unwrap();
        mkdirs(tmp.path(), &["bots/alpha", "shared/quiet"]);

        let mut registry = PluginRegistry::new();
        assert_eq!(registry.load_root(tmp.path(), &catalog(), &ctx()), 2);
        assert_eq!(
            registry
                .with_capability(CapabilityName::OnStartup)
                .map(|p| p.id.as_str())
                .collect::<Vec<_>>(),
            vec!["bots_alpha"]
        );
    }
}
