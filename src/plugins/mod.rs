//! Plugin system for rust_sensord measurement modules.
//!
//! This module provides the contract every hosted plugin implements plus the
//! infrastructure around it:
//!
//! ```text
//! PluginMonitor (monitor.rs)
//! ├── discovery: folders + installer archives (archive.rs, descriptor.rs)
//! ├── loading: isolated cdylibs via sensord-plugin-api (loader.rs, adapter.rs)
//! ├── scheduling: one wrapper per instance (wrapper.rs)
//! └── bundled plugins compiled into the host (builtin.rs)
//! ```
//!
//! Plugins come from two sources: bundled implementations compiled into the
//! host, and out-of-tree cdylibs speaking the FFI contract, adapted into the
//! same [`Plugin`] trait. The rest of the runtime never distinguishes them.

pub mod adapter;
pub mod archive;
pub mod builtin;
pub mod descriptor;
pub mod loader;
pub mod monitor;
pub mod wrapper;

pub use adapter::FfiPluginAdapter;
pub use builtin::SystemMetricsPlugin;
pub use descriptor::{PackageMetadata, PluginDescriptor};
pub use loader::load_plugin_library;
pub use monitor::PluginMonitor;
pub use wrapper::PluginWrapper;

use crate::data::Container;
use crate::slug;
use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// The contract every hosted measurement plugin implements.
///
/// # Lifecycle
///
/// 1. `initialize()` - prepare internal state
/// 2. `register_containers()` - declare containers and entries
/// 3. `update()` / `update_async()` - refresh entry values, repeatedly
/// 4. `close()` - release resources
///
/// A plugin with a positive [`update_interval`](Plugin::update_interval) is
/// ticked on its own background loop via `update_async`; a plugin without
/// one is driven synchronously by the monitor's polling loop via `update`.
///
/// Hook failures are ordinary `Err` values. The wrapper logs them with the
/// plugin's identity and keeps going; they never crash the host or disturb
/// other plugins.
#[async_trait]
pub trait Plugin: Send {
    /// Human-readable plugin name
    fn name(&self) -> &str;

    /// Short description shown in listings
    fn description(&self) -> &str {
        ""
    }

    /// Stable plugin id, derived from the name unless overridden
    fn plugin_id(&self) -> String {
        slug::encode(self.name())
    }

    /// Path to the plugin's own config file, if any
    fn config_file(&self) -> Option<PathBuf> {
        None
    }

    /// Delay between scheduled ticks; `None` means manual updates only
    fn update_interval(&self) -> Option<Duration> {
        None
    }

    /// Prepare internal state before container registration
    fn initialize(&mut self) -> Result<()>;

    /// Declare the containers and entries this plugin publishes.
    ///
    /// Called after `initialize()`, and again on every reload. The plugin
    /// keeps its own handles onto the returned entries and mutates them
    /// during updates.
    fn register_containers(&mut self) -> Result<Vec<Container>>;

    /// Synchronous update, driven by the monitor for manual plugins
    fn update(&mut self) -> Result<()> {
        Ok(())
    }

    /// Asynchronous update, driven by the plugin's own background loop.
    ///
    /// Long-running work should observe `cancel`; it is not forcibly
    /// preempted. Defaults to the synchronous update.
    async fn update_async(&mut self, cancel: &CancellationToken) -> Result<()> {
        let _ = cancel;
        self.update()
    }

    /// Release resources; called once when the plugin is stopped
    fn close(&mut self) {}
}
