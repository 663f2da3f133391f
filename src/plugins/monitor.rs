//! Process-wide plugin orchestration.
//!
//! The monitor owns discovery, activation, the shared registry's contents,
//! and the polling loop that drives manual-update plugins. One plugin's
//! failure — at discovery, load, initialize, or update — is logged and never
//! blocks the others.

use crate::config::HostConfig;
use crate::error::AppResult;
use crate::plugins::archive;
use crate::plugins::descriptor::{PackageMetadata, PluginDescriptor, PACKAGE_METADATA_FILE};
use crate::plugins::loader::load_plugin_library;
use crate::plugins::wrapper::PluginWrapper;
use crate::plugins::Plugin;
use crate::registry::SensorRegistry;
use crate::task::BackgroundTask;
use parking_lot::Mutex as SyncMutex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Discovers plugin packages, wraps their instances, starts and stops them,
/// and keeps the sensor registry in sync.
pub struct PluginMonitor {
    config: Arc<HostConfig>,
    registry: Arc<SensorRegistry>,
    descriptors: Vec<PluginDescriptor>,
    /// Binary paths the user has deactivated, loaded at startup.
    deactivated: HashSet<PathBuf>,
    poll_task: SyncMutex<Option<BackgroundTask>>,
}

impl PluginMonitor {
    pub fn new(config: Arc<HostConfig>, registry: Arc<SensorRegistry>) -> Self {
        let deactivated = load_deactivated(&config.plugins.deactivated_file);
        Self {
            config,
            registry,
            descriptors: Vec::new(),
            deactivated,
            poll_task: SyncMutex::new(None),
        }
    }

    pub fn registry(&self) -> &Arc<SensorRegistry> {
        &self.registry
    }

    pub fn descriptors(&self) -> &[PluginDescriptor] {
        &self.descriptors
    }

    /// Register a plugin compiled into the host.
    ///
    /// Bundled plugins go through the same wrapper, activation, and registry
    /// path as loaded ones; their descriptor carries a synthetic
    /// `builtin:` path so deactivation persistence applies to them too.
    pub fn register_builtin(&mut self, plugin: Box<dyn Plugin>) {
        let wrapper = Arc::new(self.wrap(plugin));
        let path = PathBuf::from(format!("builtin:{}", wrapper.plugin_id()));
        let folder = wrapper.plugin_id().to_string();
        self.descriptors
            .push(PluginDescriptor::new(path, folder, None, vec![wrapper]));
    }

    fn wrap(&self, plugin: Box<dyn Plugin>) -> PluginWrapper {
        PluginWrapper::new(plugin, self.config.settle_delay(), self.config.stop_timeout())
    }

    /// Run a full discovery scan.
    ///
    /// Pending installer archives are extracted first, then the bundled
    /// directory (filtered by the allow-list) and the external directory
    /// (unfiltered) are enumerated. Folders already represented in the
    /// descriptor list are skipped, so rescans are additive.
    pub fn discover(&mut self) -> AppResult<()> {
        let plugins_cfg = &self.config.plugins;
        archive::extract_pending_archives(&plugins_cfg.external_dir, &plugins_cfg.archive_prefix);

        let bundled: Vec<PathBuf> = list_subdirectories(&plugins_cfg.bundled_dir)
            .into_iter()
            .filter(|dir| {
                dir.file_name()
                    .and_then(|n| n.to_str())
                    .map(|name| plugins_cfg.bundled_allow.iter().any(|a| a.as_str() == name))
                    .unwrap_or(false)
            })
            .collect();
        let external = list_subdirectories(&plugins_cfg.external_dir);

        for folder in bundled.into_iter().chain(external) {
            match self.discover_package(&folder) {
                Ok(Some(descriptor)) => {
                    info!(
                        folder = %descriptor.folder_name(),
                        plugins = descriptor.wrappers().len(),
                        "Discovered plugin package"
                    );
                    self.descriptors.push(descriptor);
                }
                Ok(None) => {} // already known
                Err(e) => {
                    // Discovery failures are contained to their folder.
                    warn!(folder = %folder.display(), error = %e, "Skipping plugin folder");
                }
            }
        }

        Ok(())
    }

    /// Build a descriptor for one package folder, or `None` if its binary is
    /// already represented.
    fn discover_package(&self, folder: &Path) -> AppResult<Option<PluginDescriptor>> {
        let folder_name = folder
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        let binary = folder.join(format!(
            "{}.{}",
            folder_name,
            std::env::consts::DLL_EXTENSION
        ));
        if self
            .descriptors
            .iter()
            .any(|d| d.binary_path() == binary.as_path())
        {
            return Ok(None);
        }

        let metadata_path = folder.join(PACKAGE_METADATA_FILE);
        let metadata = if metadata_path.exists() {
            match PackageMetadata::from_ini_file(&metadata_path) {
                Ok(metadata) => Some(metadata),
                Err(e) => {
                    warn!(path = %metadata_path.display(), error = %e, "Ignoring unreadable PluginInfo.ini");
                    None
                }
            }
        } else {
            None
        };

        if !binary.exists() {
            return Err(crate::error::SensordError::Load {
                path: binary,
                reason: "plugin binary not found at expected path".to_string(),
            });
        }

        let plugins = load_plugin_library(&binary)?;
        let wrappers = plugins
            .into_iter()
            .map(|plugin| Arc::new(self.wrap(plugin)))
            .collect();

        Ok(Some(PluginDescriptor::new(
            binary,
            folder_name,
            metadata,
            wrappers,
        )))
    }

    /// True when a plugin's name or id matches the configured deny-list
    /// (substring, case-insensitive).
    fn is_denied(&self, wrapper: &PluginWrapper) -> bool {
        let name = wrapper.name().to_lowercase();
        let id = wrapper.plugin_id().to_lowercase();
        self.config
            .plugins
            .deny_list
            .iter()
            .map(|entry| entry.to_lowercase())
            .any(|entry| name.contains(&entry) || id.contains(&entry))
    }

    /// Initialize every eligible wrapper and register its entries.
    ///
    /// Returns how many wrappers started. Deny-listed and user-deactivated
    /// plugins are skipped but stay in the descriptor list for later
    /// reactivation.
    pub async fn start_all(&self) -> usize {
        let mut started = 0;

        for descriptor in &self.descriptors {
            if self.deactivated.contains(descriptor.binary_path()) {
                info!(
                    folder = %descriptor.folder_name(),
                    "Skipping deactivated plugin package"
                );
                continue;
            }

            for wrapper in descriptor.wrappers() {
                if self.is_denied(wrapper) {
                    info!(plugin = %wrapper.plugin_id(), "Skipping deny-listed plugin");
                    continue;
                }

                match wrapper.initialize().await {
                    Ok(()) => {
                        self.register_wrapper(wrapper);
                        started += 1;
                    }
                    Err(e) => {
                        error!(plugin = %wrapper.plugin_id(), error = %e, "Plugin failed to initialize");
                    }
                }
            }
        }

        started
    }

    fn register_wrapper(&self, wrapper: &PluginWrapper) {
        for container in wrapper.containers() {
            self.registry
                .register_container(wrapper.plugin_id(), wrapper.name(), &container);
        }
        debug!(plugin = %wrapper.plugin_id(), "Registered plugin entries");
    }

    /// Unregister, stop, re-initialize, and re-register one wrapper.
    ///
    /// Display order is preserved: the registry reuses the original
    /// `index_order` of every address that re-registers.
    pub async fn reload(&self, wrapper: &Arc<PluginWrapper>) -> AppResult<()> {
        self.registry.unregister_plugin(wrapper.plugin_id());
        wrapper.stop().await?;
        wrapper.initialize().await?;
        self.register_wrapper(wrapper);
        info!(plugin = %wrapper.plugin_id(), "Reloaded");
        Ok(())
    }

    fn all_wrappers(&self) -> Vec<Arc<PluginWrapper>> {
        self.descriptors
            .iter()
            .flat_map(|d| d.wrappers().iter().cloned())
            .collect()
    }

    /// Spawn the polling loop that drives manual-update plugins.
    pub fn start_polling(&self) {
        let wrappers = self.all_wrappers();
        let task = BackgroundTask::spawn(
            Duration::ZERO,
            self.config.poll_interval(),
            move |_token| {
                let wrappers = wrappers.clone();
                async move {
                    for wrapper in &wrappers {
                        if wrapper.wants_manual_update() {
                            // update() logs its own failures
                            let _ = wrapper.update().await;
                        }
                    }
                }
            },
        );
        *self.poll_task.lock() = Some(task);
    }

    /// Stop the polling loop and every wrapper.
    pub async fn shutdown(&self) {
        let task = self.poll_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.cancel_and_wait().await {
                if !e.is_cancelled() {
                    warn!(error = %e, "Polling loop ended abnormally");
                }
            }
        }

        for wrapper in self.all_wrappers() {
            if wrapper.is_loaded() || wrapper.is_running() {
                if let Err(e) = wrapper.stop().await {
                    warn!(plugin = %wrapper.plugin_id(), error = %e, "Stop failed");
                }
            }
        }
    }

    /// Write the deactivation file: the binary path of every descriptor all
    /// of whose wrappers are currently stopped.
    pub fn persist_deactivated(&self) -> AppResult<()> {
        let lines: Vec<String> = self
            .descriptors
            .iter()
            .filter(|d| d.all_stopped())
            .map(|d| d.binary_path().display().to_string())
            .collect();

        let path = &self.config.plugins.deactivated_file;
        let mut contents = lines.join("\n");
        if !contents.is_empty() {
            contents.push('\n');
        }
        fs::write(path, contents)?;
        debug!(path = %path.display(), entries = lines.len(), "Persisted deactivation state");
        Ok(())
    }
}

fn list_subdirectories(root: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(root) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    dirs
}

fn load_deactivated(path: &Path) -> HashSet<PathBuf> {
    match fs::read_to_string(path) {
        Ok(contents) => contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
            .collect(),
        Err(_) => HashSet::new(), // absent file: everything is eligible
    }
}
