//! Cross-module orchestration tests: monitor + wrappers + registry.

use anyhow::anyhow;
use async_trait::async_trait;
use rust_sensord::config::HostConfig;
use rust_sensord::data::{Container, DataEntry};
use rust_sensord::plugins::{Plugin, PluginMonitor};
use rust_sensord::registry::SensorRegistry;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Test double publishing one sensor per declared entry id.
struct FakePlugin {
    name: &'static str,
    entry_ids: Vec<&'static str>,
    /// Extra entries appended from the second container registration on,
    /// to model a plugin that grows entries across reloads.
    extra_after_reload: Vec<&'static str>,
    interval: Option<Duration>,
    fail_initialize: bool,
    registrations: AtomicUsize,
    updates: Arc<AtomicUsize>,
}

impl FakePlugin {
    fn manual(name: &'static str, entry_ids: Vec<&'static str>) -> Self {
        Self {
            name,
            entry_ids,
            extra_after_reload: Vec::new(),
            interval: None,
            fail_initialize: false,
            registrations: AtomicUsize::new(0),
            updates: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Plugin for FakePlugin {
    fn name(&self) -> &str {
        self.name
    }

    fn update_interval(&self) -> Option<Duration> {
        self.interval
    }

    fn initialize(&mut self) -> anyhow::Result<()> {
        if self.fail_initialize {
            return Err(anyhow!("refusing to start"));
        }
        Ok(())
    }

    fn register_containers(&mut self) -> anyhow::Result<Vec<Container>> {
        let round = self.registrations.fetch_add(1, Ordering::SeqCst);

        let mut container = Container::new("c1", "Main");
        for id in &self.entry_ids {
            container.push_entry(DataEntry::sensor(*id, id.to_uppercase(), ""));
        }
        if round > 0 {
            for id in &self.extra_after_reload {
                container.push_entry(DataEntry::sensor(*id, id.to_uppercase(), ""));
            }
        }
        Ok(vec![container])
    }

    fn update(&mut self) -> anyhow::Result<()> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn test_config(dir: &TempDir) -> Arc<HostConfig> {
    let mut config = HostConfig::default();
    config.host.settle_delay_ms = 1;
    config.host.poll_interval_ms = 5;
    config.plugins.bundled_dir = dir.path().join("plugins");
    config.plugins.external_dir = dir.path().join("plugins-ext");
    config.plugins.deactivated_file = dir.path().join("plugins-disabled.txt");
    Arc::new(config)
}

#[tokio::test]
async fn test_one_failing_plugin_does_not_block_others() {
    let dir = TempDir::new().unwrap();
    let registry = Arc::new(SensorRegistry::new());
    let mut monitor = PluginMonitor::new(test_config(&dir), registry.clone());

    let mut broken = FakePlugin::manual("Broken Plugin", vec!["x"]);
    broken.fail_initialize = true;
    monitor.register_builtin(Box::new(broken));
    monitor.register_builtin(Box::new(FakePlugin::manual("Healthy Plugin", vec!["a", "b"])));

    let started = monitor.start_all().await;
    assert_eq!(started, 1);

    assert!(registry.get("/healthy-plugin/c1/a").is_some());
    assert!(registry.get("/healthy-plugin/c1/b").is_some());
    assert!(registry.get("/broken-plugin/c1/x").is_none());

    monitor.shutdown().await;
}

#[tokio::test]
async fn test_deny_list_skips_startup_but_keeps_descriptor() {
    let dir = TempDir::new().unwrap();
    let mut config = (*test_config(&dir)).clone();
    config.plugins.deny_list = vec!["LEGACY".to_string()];
    let registry = Arc::new(SensorRegistry::new());
    let mut monitor = PluginMonitor::new(Arc::new(config), registry.clone());

    monitor.register_builtin(Box::new(FakePlugin::manual("Legacy Probe", vec!["x"])));
    monitor.register_builtin(Box::new(FakePlugin::manual("Current Probe", vec!["y"])));

    let started = monitor.start_all().await;
    assert_eq!(started, 1);

    // Deny-listed plugin stays discoverable but produced no entries.
    assert_eq!(monitor.descriptors().len(), 2);
    assert!(registry.get("/legacy-probe/c1/x").is_none());
    assert!(registry.get("/current-probe/c1/y").is_some());

    monitor.shutdown().await;
}

#[tokio::test]
async fn test_deactivation_round_trip() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);

    // First run: stop one plugin, persist.
    {
        let registry = Arc::new(SensorRegistry::new());
        let mut monitor = PluginMonitor::new(config.clone(), registry.clone());
        monitor.register_builtin(Box::new(FakePlugin::manual("Muted Plugin", vec!["m"])));
        monitor.register_builtin(Box::new(FakePlugin::manual("Kept Plugin", vec!["k"])));
        monitor.start_all().await;

        let muted = monitor
            .descriptors()
            .iter()
            .find(|d| d.folder_name() == "muted-plugin")
            .unwrap()
            .wrappers()[0]
            .clone();
        muted.stop().await.unwrap();

        monitor.persist_deactivated().unwrap();

        let persisted = std::fs::read_to_string(&config.plugins.deactivated_file).unwrap();
        assert!(persisted.contains("builtin:muted-plugin"));
        // A plugin that is still active is never listed.
        assert!(!persisted.contains("kept-plugin"));

        monitor.shutdown().await;
    }

    // Second run: the persisted plugin is discovered but not started.
    {
        let registry = Arc::new(SensorRegistry::new());
        let mut monitor = PluginMonitor::new(config.clone(), registry.clone());
        monitor.register_builtin(Box::new(FakePlugin::manual("Muted Plugin", vec!["m"])));
        monitor.register_builtin(Box::new(FakePlugin::manual("Kept Plugin", vec!["k"])));

        let started = monitor.start_all().await;
        assert_eq!(started, 1);
        assert_eq!(monitor.descriptors().len(), 2);
        assert!(registry.get("/muted-plugin/c1/m").is_none());
        assert!(registry.get("/kept-plugin/c1/k").is_some());

        monitor.shutdown().await;
    }
}

#[tokio::test]
async fn test_reload_preserves_display_order() {
    let dir = TempDir::new().unwrap();
    let registry = Arc::new(SensorRegistry::new());
    let mut monitor = PluginMonitor::new(test_config(&dir), registry.clone());

    let mut growing = FakePlugin::manual("Alpha", vec!["a1", "a2"]);
    growing.extra_after_reload = vec!["a3"];
    monitor.register_builtin(Box::new(growing));
    monitor.register_builtin(Box::new(FakePlugin::manual("Beta", vec!["b1"])));

    monitor.start_all().await;

    let a1_before = registry.get("/alpha/c1/a1").unwrap().index_order;
    let a2_before = registry.get("/alpha/c1/a2").unwrap().index_order;
    let b1_before = registry.get("/beta/c1/b1").unwrap().index_order;

    let alpha = monitor.descriptors()[0].wrappers()[0].clone();
    monitor.reload(&alpha).await.unwrap();

    assert_eq!(registry.get("/alpha/c1/a1").unwrap().index_order, a1_before);
    assert_eq!(registry.get("/alpha/c1/a2").unwrap().index_order, a2_before);
    assert_eq!(registry.get("/beta/c1/b1").unwrap().index_order, b1_before);

    // The entry that appeared on reload sorts after everything older.
    let a3 = registry.get("/alpha/c1/a3").unwrap().index_order;
    assert!(a3 > b1_before);

    monitor.shutdown().await;
}

#[tokio::test]
async fn test_polling_loop_drives_manual_plugins() {
    let dir = TempDir::new().unwrap();
    let registry = Arc::new(SensorRegistry::new());
    let mut monitor = PluginMonitor::new(test_config(&dir), registry.clone());

    let plugin = FakePlugin::manual("Polled", vec!["p"]);
    let updates = plugin.updates.clone();
    monitor.register_builtin(Box::new(plugin));

    monitor.start_all().await;
    monitor.start_polling();

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(
        updates.load(Ordering::SeqCst) >= 2,
        "polling loop should tick manual plugins"
    );

    monitor.shutdown().await;
    let after = updates.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(updates.load(Ordering::SeqCst), after);
}
