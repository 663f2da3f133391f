//! Process-wide sensor registry.
//!
//! A single concurrent mapping from hierarchical address to the latest
//! published reading. One writer per auto-scheduled plugin loop and any
//! number of readers (display, export) operate on it without shared locks;
//! `dashmap` shards internally.
//!
//! Stored readings hold *live references* into producer state (`DataEntry`
//! is `Arc`-backed), so a reader always sees the producer's latest value
//! without re-registration. No cross-entry atomicity is provided: a snapshot
//! may mix entries from different ticks of different plugins.
//!
//! Display order is stable: each address gets a monotonically increasing
//! `index_order` the first time it is registered, and keeps that order across
//! unregister/re-register cycles (plugin reloads). Orders are never recycled
//! while the process runs.

use crate::data::{Container, DataEntry};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// One registered entry, immutable by replacement.
#[derive(Debug, Clone)]
pub struct Reading {
    /// Full registry address, e.g. `/cpu/load/core0`
    pub address: String,
    /// Display name of the entry
    pub name: String,
    /// Id of the owning plugin
    pub plugin_id: String,
    /// Display name of the owning plugin
    pub plugin_name: String,
    /// Id of the owning container (present even when ephemeral)
    pub container_id: String,
    /// Live handle onto the producer's entry
    pub entry: DataEntry,
    /// Stable display order assigned at first registration
    pub index_order: u64,
}

/// Concurrent address → [`Reading`] map with stable display ordering.
///
/// Created once at process start; entries are added and removed only by
/// plugin orchestration, never dropped implicitly mid-run.
#[derive(Debug, Default)]
pub struct SensorRegistry {
    readings: DashMap<String, Reading>,
    orders: DashMap<String, u64>,
    next_order: AtomicU64,
}

impl SensorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the address for an entry of `container` under `plugin_id`.
    ///
    /// Ephemeral containers drop their segment from the address.
    pub fn address_for(plugin_id: &str, container: &Container, entry_id: &str) -> String {
        if container.is_ephemeral() {
            format!("/{}/{}", plugin_id, entry_id)
        } else {
            format!("/{}/{}/{}", plugin_id, container.id(), entry_id)
        }
    }

    /// Register a single entry, returning its address.
    ///
    /// Re-registering an address replaces the stored reading but reuses the
    /// original `index_order`, so display order survives plugin reloads.
    pub fn register(
        &self,
        plugin_id: &str,
        plugin_name: &str,
        container: &Container,
        entry: &DataEntry,
    ) -> String {
        let address = Self::address_for(plugin_id, container, entry.id());

        let index_order = *self
            .orders
            .entry(address.clone())
            .or_insert_with(|| self.next_order.fetch_add(1, Ordering::Relaxed));

        self.readings.insert(
            address.clone(),
            Reading {
                address: address.clone(),
                name: entry.name().to_string(),
                plugin_id: plugin_id.to_string(),
                plugin_name: plugin_name.to_string(),
                container_id: container.id().to_string(),
                entry: entry.clone(),
                index_order,
            },
        );

        address
    }

    /// Register every entry of a container, preserving declaration order.
    pub fn register_container(&self, plugin_id: &str, plugin_name: &str, container: &Container) {
        for entry in container.entries() {
            self.register(plugin_id, plugin_name, container, entry);
        }
    }

    /// Remove one reading by address.
    pub fn unregister(&self, address: &str) -> Option<Reading> {
        self.readings.remove(address).map(|(_, reading)| reading)
    }

    /// Remove every reading owned by a plugin; returns how many were removed.
    pub fn unregister_plugin(&self, plugin_id: &str) -> usize {
        let addresses: Vec<String> = self
            .readings
            .iter()
            .filter(|r| r.plugin_id == plugin_id)
            .map(|r| r.address.clone())
            .collect();

        for address in &addresses {
            self.readings.remove(address);
        }
        addresses.len()
    }

    /// Look up one reading by address.
    pub fn get(&self, address: &str) -> Option<Reading> {
        self.readings.get(address).map(|r| r.value().clone())
    }

    /// All current readings ordered by `index_order`.
    pub fn snapshot(&self) -> Vec<Reading> {
        let mut readings: Vec<Reading> = self.readings.iter().map(|r| r.value().clone()).collect();
        readings.sort_by_key(|r| r.index_order);
        readings
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container_with(ids: &[&str], ephemeral: bool) -> Container {
        let mut container = if ephemeral {
            Container::ephemeral("c1", "C1")
        } else {
            Container::new("c1", "C1")
        };
        for id in ids {
            container.push_entry(DataEntry::sensor(*id, id.to_uppercase(), ""));
        }
        container
    }

    #[test]
    fn test_addressing() {
        let normal = container_with(&["e1"], false);
        let ephemeral = container_with(&["e1"], true);

        assert_eq!(SensorRegistry::address_for("p1", &normal, "e1"), "/p1/c1/e1");
        assert_eq!(SensorRegistry::address_for("p1", &ephemeral, "e1"), "/p1/e1");
    }

    #[test]
    fn test_snapshot_ordering() {
        let registry = SensorRegistry::new();
        let a = container_with(&["a1", "a2"], false);
        let b = container_with(&["b1"], false);

        registry.register_container("pa", "Plugin A", &a);
        registry.register_container("pb", "Plugin B", &b);

        let addresses: Vec<String> = registry
            .snapshot()
            .into_iter()
            .map(|r| r.address)
            .collect();
        assert_eq!(addresses, vec!["/pa/c1/a1", "/pa/c1/a2", "/pb/c1/b1"]);
    }

    #[test]
    fn test_order_survives_reload() {
        let registry = SensorRegistry::new();
        let a = container_with(&["a1", "a2"], false);
        let b = container_with(&["b1"], false);

        registry.register_container("pa", "Plugin A", &a);
        registry.register_container("pb", "Plugin B", &b);

        let before: Vec<u64> = registry.snapshot().iter().map(|r| r.index_order).collect();

        // Reload plugin A with one extra entry.
        registry.unregister_plugin("pa");
        let a2 = container_with(&["a1", "a2", "a3"], false);
        registry.register_container("pa", "Plugin A", &a2);

        let a1 = registry.get("/pa/c1/a1").unwrap();
        let a2_reading = registry.get("/pa/c1/a2").unwrap();
        let a3 = registry.get("/pa/c1/a3").unwrap();
        let b1 = registry.get("/pb/c1/b1").unwrap();

        assert_eq!(a1.index_order, before[0]);
        assert_eq!(a2_reading.index_order, before[1]);
        assert_eq!(b1.index_order, before[2]);
        // The new entry sorts after everything registered earlier.
        assert!(a3.index_order > b1.index_order);
    }

    #[test]
    fn test_unregister_plugin_scope() {
        let registry = SensorRegistry::new();
        registry.register_container("pa", "A", &container_with(&["x"], false));
        registry.register_container("pb", "B", &container_with(&["x"], false));

        assert_eq!(registry.unregister_plugin("pa"), 1);
        assert!(registry.get("/pa/c1/x").is_none());
        assert!(registry.get("/pb/c1/x").is_some());
    }

    #[test]
    fn test_live_reference_reads() {
        let registry = SensorRegistry::new();
        let entry = DataEntry::sensor("load", "Load", "%");
        let container = Container::new("cpu", "CPU").with_entry(entry.clone());
        registry.register_container("sys", "System", &container);

        if let DataEntry::Sensor(sensor) = &entry {
            sensor.set_value(42.0);
        }

        let reading = registry.get("/sys/cpu/load").unwrap();
        if let DataEntry::Sensor(sensor) = &reading.entry {
            assert_eq!(sensor.value(), 42.0);
        } else {
            panic!("expected sensor entry");
        }
    }
}
