//! Runtime state machine around one plugin instance.
//!
//! States: Unloaded → Loaded (idle) → Running (scheduled) → Stopped, with
//! reload returning to Loaded. Start/stop transitions serialize on a gate
//! owned by *this* wrapper — stopping one plugin never blocks starting an
//! unrelated one.
//!
//! The update loop tolerates everything a third-party plugin can do short of
//! taking the process down: hook errors are logged with the plugin's
//! identity and the loop keeps ticking; panics in close are contained; a
//! hung update can stall only its own stop (bounded by the optional stop
//! timeout from the host config).

use crate::data::Container;
use crate::error::{AppResult, SensordError};
use crate::plugins::Plugin;
use crate::task::BackgroundTask;
use parking_lot::{Mutex as SyncMutex, RwLock};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Wraps exactly one plugin instance and owns its scheduling state.
pub struct PluginWrapper {
    plugin: Arc<Mutex<Box<dyn Plugin>>>,
    plugin_id: String,
    name: String,
    description: String,
    interval: Option<Duration>,
    settle: Duration,
    stop_timeout: Option<Duration>,
    containers: Arc<RwLock<Vec<Container>>>,
    /// Serializes start/stop transitions of this wrapper only.
    gate: Mutex<()>,
    loop_task: SyncMutex<Option<BackgroundTask>>,
    last_update: Arc<SyncMutex<Option<Duration>>>,
    loaded: AtomicBool,
}

impl PluginWrapper {
    pub fn new(plugin: Box<dyn Plugin>, settle: Duration, stop_timeout: Option<Duration>) -> Self {
        Self {
            plugin_id: plugin.plugin_id(),
            name: plugin.name().to_string(),
            description: plugin.description().to_string(),
            interval: plugin.update_interval(),
            settle,
            stop_timeout,
            plugin: Arc::new(Mutex::new(plugin)),
            containers: Arc::new(RwLock::new(Vec::new())),
            gate: Mutex::new(()),
            loop_task: SyncMutex::new(None),
            last_update: Arc::new(SyncMutex::new(None)),
            loaded: AtomicBool::new(false),
        }
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn update_interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// True iff an update loop exists, has not exited, and has not been
    /// asked to cancel.
    pub fn is_running(&self) -> bool {
        self.loop_task
            .lock()
            .as_ref()
            .map(|task| !task.is_finished() && !task.is_cancelled())
            .unwrap_or(false)
    }

    /// True when the monitor's polling loop should drive this wrapper.
    pub fn wants_manual_update(&self) -> bool {
        self.is_loaded() && self.interval.is_none() && !self.is_running()
    }

    /// Wall-clock duration of the most recent update call.
    pub fn last_update_duration(&self) -> Option<Duration> {
        *self.last_update.lock()
    }

    /// Containers declared by the most recent initialization.
    pub fn containers(&self) -> Vec<Container> {
        self.containers.read().clone()
    }

    /// Initialize the plugin and, for auto-updating plugins, spawn its
    /// update loop.
    ///
    /// May be called again after [`stop`](Self::stop) to reload.
    pub async fn initialize(&self) -> AppResult<()> {
        let _gate = self.gate.lock().await;

        {
            let mut plugin = self.plugin.lock().await;
            plugin
                .initialize()
                .map_err(|e| SensordError::plugin(&self.name, e))?;
            let containers = plugin
                .register_containers()
                .map_err(|e| SensordError::plugin(&self.name, e))?;
            *self.containers.write() = containers;
        }
        self.loaded.store(true, Ordering::Release);

        // Manual plugins stop here; the caller drives update() explicitly.
        let Some(interval) = self.interval else {
            return Ok(());
        };
        if self.is_running() {
            return Ok(());
        }

        let plugin = Arc::clone(&self.plugin);
        let last_update = Arc::clone(&self.last_update);
        let name = self.name.clone();
        let task = BackgroundTask::spawn(self.settle, interval, move |token| {
            let plugin = Arc::clone(&plugin);
            let last_update = Arc::clone(&last_update);
            let name = name.clone();
            async move {
                let started = Instant::now();
                let result = plugin.lock().await.update_async(&token).await;
                *last_update.lock() = Some(started.elapsed());
                if let Err(e) = result {
                    warn!(plugin = %name, error = %e, "Scheduled update failed");
                }
            }
        });
        *self.loop_task.lock() = Some(task);

        debug!(plugin = %self.plugin_id, ?interval, "Update loop started");
        Ok(())
    }

    /// Manual synchronous update for plugins without an auto interval.
    ///
    /// Plugin failures are logged and swallowed; only misuse (calling this
    /// on a scheduled wrapper) is an error.
    pub async fn update(&self) -> AppResult<()> {
        if self.interval.is_some() || self.is_running() {
            return Err(SensordError::WrapperBusy);
        }

        let started = Instant::now();
        let result = self.plugin.lock().await.update();
        *self.last_update.lock() = Some(started.elapsed());

        if let Err(e) = result {
            warn!(plugin = %self.name, error = %e, "Manual update failed");
        }
        Ok(())
    }

    /// Cancel the update loop, wait for it to exit, and tear the plugin
    /// down. After this the wrapper can be re-initialized.
    pub async fn stop(&self) -> AppResult<()> {
        let _gate = self.gate.lock().await;

        let task = self.loop_task.lock().take();
        if let Some(task) = task {
            let wait = task.cancel_and_wait();
            match self.stop_timeout {
                None => {
                    if let Err(e) = wait.await {
                        if !e.is_cancelled() {
                            warn!(plugin = %self.plugin_id, error = %e, "Update loop ended abnormally");
                        }
                    }
                }
                Some(timeout) => match tokio::time::timeout(timeout, wait).await {
                    Ok(Err(e)) if !e.is_cancelled() => {
                        warn!(plugin = %self.plugin_id, error = %e, "Update loop ended abnormally");
                    }
                    Ok(_) => {}
                    Err(_) => {
                        warn!(
                            plugin = %self.plugin_id,
                            ?timeout,
                            "Update loop did not stop within timeout; detaching"
                        );
                    }
                },
            }
        }

        {
            let mut plugin = self.plugin.lock().await;
            let closed = std::panic::catch_unwind(AssertUnwindSafe(|| plugin.close()));
            if closed.is_err() {
                warn!(plugin = %self.plugin_id, "Plugin panicked in close");
            }
        }

        self.containers.write().clear();
        self.loaded.store(false, Ordering::Release);
        debug!(plugin = %self.plugin_id, "Stopped");
        Ok(())
    }
}

impl std::fmt::Debug for PluginWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginWrapper")
            .field("plugin_id", &self.plugin_id)
            .field("interval", &self.interval)
            .field("loaded", &self.is_loaded())
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataEntry;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tokio_util::sync::CancellationToken;

    #[derive(Default)]
    struct Counters {
        initialized: AtomicUsize,
        updated: AtomicUsize,
        closed: AtomicUsize,
    }

    struct MockPlugin {
        interval: Option<Duration>,
        fail_initialize: bool,
        fail_update: bool,
        counters: Arc<Counters>,
    }

    impl MockPlugin {
        fn manual(counters: Arc<Counters>) -> Self {
            Self {
                interval: None,
                fail_initialize: false,
                fail_update: false,
                counters,
            }
        }

        fn scheduled(counters: Arc<Counters>, interval: Duration) -> Self {
            Self {
                interval: Some(interval),
                ..Self::manual(counters)
            }
        }
    }

    #[async_trait]
    impl Plugin for MockPlugin {
        fn name(&self) -> &str {
            "Mock Plugin"
        }

        fn update_interval(&self) -> Option<Duration> {
            self.interval
        }

        fn initialize(&mut self) -> anyhow::Result<()> {
            if self.fail_initialize {
                return Err(anyhow!("init failed"));
            }
            self.counters.initialized.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn register_containers(&mut self) -> anyhow::Result<Vec<Container>> {
            Ok(vec![Container::new("c", "C")
                .with_entry(DataEntry::sensor("v", "Value", ""))])
        }

        fn update(&mut self) -> anyhow::Result<()> {
            self.counters.updated.fetch_add(1, Ordering::SeqCst);
            if self.fail_update {
                return Err(anyhow!("update failed"));
            }
            Ok(())
        }

        async fn update_async(&mut self, _cancel: &CancellationToken) -> anyhow::Result<()> {
            self.update()
        }

        fn close(&mut self) {
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn wrapper_for(plugin: MockPlugin) -> PluginWrapper {
        PluginWrapper::new(Box::new(plugin), Duration::from_millis(1), None)
    }

    #[tokio::test]
    async fn test_manual_lifecycle() {
        let counters = Arc::new(Counters::default());
        let wrapper = wrapper_for(MockPlugin::manual(counters.clone()));

        assert!(!wrapper.is_loaded());
        wrapper.initialize().await.unwrap();
        assert!(wrapper.is_loaded());
        assert!(!wrapper.is_running());
        assert!(wrapper.wants_manual_update());
        assert_eq!(wrapper.containers().len(), 1);

        wrapper.update().await.unwrap();
        wrapper.update().await.unwrap();
        assert_eq!(counters.updated.load(Ordering::SeqCst), 2);
        assert!(wrapper.last_update_duration().is_some());

        wrapper.stop().await.unwrap();
        assert!(!wrapper.is_loaded());
        assert!(wrapper.containers().is_empty());
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_scheduled_loop_ticks_and_stops() {
        let counters = Arc::new(Counters::default());
        let wrapper = wrapper_for(MockPlugin::scheduled(
            counters.clone(),
            Duration::from_millis(5),
        ));

        wrapper.initialize().await.unwrap();
        assert!(wrapper.is_running());
        assert!(!wrapper.wants_manual_update());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(counters.updated.load(Ordering::SeqCst) >= 2);

        wrapper.stop().await.unwrap();
        assert!(!wrapper.is_running());
        let after_stop = counters.updated.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(counters.updated.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test]
    async fn test_manual_update_rejected_for_scheduled_wrapper() {
        let counters = Arc::new(Counters::default());
        let wrapper = wrapper_for(MockPlugin::scheduled(
            counters.clone(),
            Duration::from_secs(60),
        ));
        wrapper.initialize().await.unwrap();

        assert!(matches!(
            wrapper.update().await,
            Err(SensordError::WrapperBusy)
        ));
        wrapper.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_initialize_leaves_wrapper_unloaded() {
        let counters = Arc::new(Counters::default());
        let mut plugin = MockPlugin::manual(counters.clone());
        plugin.fail_initialize = true;
        let wrapper = wrapper_for(plugin);

        let err = wrapper.initialize().await.unwrap_err();
        assert!(matches!(err, SensordError::Plugin { .. }));
        assert!(!wrapper.is_loaded());
        assert!(wrapper.containers().is_empty());
    }

    #[tokio::test]
    async fn test_update_errors_do_not_stop_the_loop() {
        let counters = Arc::new(Counters::default());
        let mut plugin = MockPlugin::scheduled(counters.clone(), Duration::from_millis(5));
        plugin.fail_update = true;
        let wrapper = wrapper_for(plugin);

        wrapper.initialize().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(
            counters.updated.load(Ordering::SeqCst) >= 2,
            "loop must keep ticking through failures"
        );
        wrapper.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_reload_returns_to_running() {
        let counters = Arc::new(Counters::default());
        let wrapper = wrapper_for(MockPlugin::scheduled(
            counters.clone(),
            Duration::from_millis(5),
        ));

        wrapper.initialize().await.unwrap();
        wrapper.stop().await.unwrap();
        wrapper.initialize().await.unwrap();

        assert!(wrapper.is_loaded());
        assert!(wrapper.is_running());
        assert_eq!(counters.initialized.load(Ordering::SeqCst), 2);
        wrapper.stop().await.unwrap();
    }
}
