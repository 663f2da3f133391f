//! Adapter that hosts an FFI plugin behind the internal [`Plugin`] trait.
//!
//! The FFI contract is declarative: the plugin declares containers and
//! entries once, then returns a batch of samples per update tick. The
//! adapter owns the host-side live entries, routes each sample onto the
//! matching entry, and exposes the whole thing as an ordinary [`Plugin`] so
//! the wrapper and monitor never special-case loaded plugins.
//!
//! FFI updates are blocking calls; `update_async` runs them on a blocking
//! worker, which also converts a panicking plugin into a reported error
//! instead of a host crash.

use crate::data::{Container, DataEntry, TableCell};
use crate::plugins::Plugin;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use sensord_plugin_api::{
    FfiCell, FfiContainerDecl, FfiEntryDecl, FfiEntryKind, FfiSample, FfiValue, SensorPluginBox,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Bridges one loaded FFI plugin instance into the [`Plugin`] trait.
pub struct FfiPluginAdapter {
    inner: Arc<Mutex<SensorPluginBox>>,
    name: String,
    description: String,
    config_file: Option<PathBuf>,
    interval: Option<Duration>,
    /// (container id, entry id) -> live host-side entry
    entries: HashMap<(String, String), DataEntry>,
}

impl FfiPluginAdapter {
    pub fn new(plugin: SensorPluginBox) -> Self {
        let info = plugin.info();
        Self {
            inner: Arc::new(Mutex::new(plugin)),
            name: info.name.to_string(),
            description: info.description.to_string(),
            config_file: info.config_file.into_option().map(|p| PathBuf::from(p.as_str())),
            interval: (info.update_interval_ms > 0)
                .then(|| Duration::from_millis(info.update_interval_ms as u64)),
            entries: HashMap::new(),
        }
    }

    fn build_container(&mut self, decl: &FfiContainerDecl) -> Container {
        let mut container = if decl.ephemeral {
            Container::ephemeral(decl.id.as_str(), decl.name.as_str())
        } else {
            Container::new(decl.id.as_str(), decl.name.as_str())
        };

        for entry_decl in decl.entries.iter() {
            let entry = build_entry(entry_decl);
            self.entries.insert(
                (decl.id.to_string(), entry_decl.id.to_string()),
                entry.clone(),
            );
            container.push_entry(entry);
        }

        container
    }

    fn apply_samples(&self, samples: impl IntoIterator<Item = FfiSample>) {
        for sample in samples {
            let key = (sample.container_id.to_string(), sample.entry_id.to_string());
            let Some(entry) = self.entries.get(&key) else {
                debug!(
                    plugin = %self.name,
                    container = %sample.container_id,
                    entry = %sample.entry_id,
                    "Sample for undeclared entry ignored"
                );
                continue;
            };

            match (entry, sample.value) {
                (DataEntry::Text(text), FfiValue::Text(value)) => text.set(value.to_string()),
                (DataEntry::Sensor(sensor), FfiValue::Sensor(value)) => sensor.set_value(value),
                (DataEntry::Table(table), FfiValue::Table(value)) => {
                    let columns = value.columns.iter().map(|c| c.to_string()).collect();
                    let rows = value
                        .rows
                        .iter()
                        .map(|row| row.cells.iter().map(cell_from_ffi).collect())
                        .collect();
                    table.set_rows(columns, rows);
                }
                _ => debug!(
                    plugin = %self.name,
                    entry = %key.1,
                    "Sample kind does not match declared entry kind"
                ),
            }
        }
    }
}

fn build_entry(decl: &FfiEntryDecl) -> DataEntry {
    match decl.kind {
        FfiEntryKind::Text => DataEntry::text(
            decl.id.as_str(),
            decl.name.as_str(),
            decl.initial_text.as_str(),
        ),
        FfiEntryKind::Sensor => {
            DataEntry::sensor(decl.id.as_str(), decl.name.as_str(), decl.unit.as_str())
        }
        FfiEntryKind::Table => DataEntry::table(
            decl.id.as_str(),
            decl.name.as_str(),
            decl.columns.iter().map(|c| c.to_string()).collect(),
        ),
    }
}

fn cell_from_ffi(cell: &FfiCell) -> TableCell {
    match cell {
        FfiCell::Text(text) => TableCell::Text {
            id: text.id.to_string(),
            name: text.name.to_string(),
            value: text.value.to_string(),
        },
        FfiCell::Sensor(sensor) => TableCell::Sensor {
            id: sensor.id.to_string(),
            name: sensor.name.to_string(),
            value: sensor.value,
            unit: sensor.unit.to_string(),
        },
    }
}

#[async_trait]
impl Plugin for FfiPluginAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn config_file(&self) -> Option<PathBuf> {
        self.config_file.clone()
    }

    fn update_interval(&self) -> Option<Duration> {
        self.interval
    }

    fn initialize(&mut self) -> Result<()> {
        self.inner
            .lock()
            .initialize()
            .into_result()
            .map_err(|e| anyhow!("{}", e))
    }

    fn register_containers(&mut self) -> Result<Vec<Container>> {
        self.entries.clear();
        let decls = self
            .inner
            .lock()
            .containers()
            .into_result()
            .map_err(|e| anyhow!("{}", e))?;

        Ok(decls.iter().map(|decl| self.build_container(decl)).collect())
    }

    fn update(&mut self) -> Result<()> {
        let samples = self
            .inner
            .lock()
            .update()
            .into_result()
            .map_err(|e| anyhow!("{}", e))?;
        self.apply_samples(samples);
        Ok(())
    }

    async fn update_async(&mut self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Ok(());
        }

        // The FFI call is blocking and cannot observe cancellation; run it
        // on a blocking worker so it cannot stall the runtime either way.
        let inner = Arc::clone(&self.inner);
        let outcome = tokio::task::spawn_blocking(move || {
            inner.lock().update().into_result().map_err(|e| e.to_string())
        })
        .await;

        let samples = match outcome {
            Ok(Ok(samples)) => samples,
            Ok(Err(e)) => return Err(anyhow!("{}", e)),
            Err(join_err) if join_err.is_panic() => {
                return Err(anyhow!("plugin panicked during update"));
            }
            Err(join_err) => return Err(anyhow!("update task failed: {}", join_err)),
        };

        self.apply_samples(samples);
        Ok(())
    }

    fn close(&mut self) {
        self.inner.lock().close();
    }
}
