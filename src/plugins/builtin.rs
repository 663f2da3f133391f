//! Bundled system-metrics plugin.
//!
//! Publishes host CPU and memory readings through the same contract as
//! loaded plugins, giving the host real data out of the box and keeping the
//! in-process path of the contract exercised.

use crate::data::{Container, DataEntry, SensorEntry, TableCell, TableEntry};
use crate::plugins::Plugin;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::System;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

struct Handles {
    cpu_total: Arc<SensorEntry>,
    cores: Arc<TableEntry>,
    mem_used: Arc<SensorEntry>,
    mem_total: Arc<SensorEntry>,
}

/// CPU and memory readings sourced from `sysinfo`.
pub struct SystemMetricsPlugin {
    sys: System,
    window: usize,
    handles: Option<Handles>,
}

impl SystemMetricsPlugin {
    pub fn new(window: usize) -> Self {
        Self {
            sys: System::new(),
            window,
            handles: None,
        }
    }

    fn refresh_readings(&mut self) {
        let Some(handles) = &self.handles else {
            return;
        };

        self.sys.refresh_cpu_usage();
        self.sys.refresh_memory();

        handles
            .cpu_total
            .set_value(self.sys.global_cpu_usage() as f64);

        let rows: Vec<Vec<TableCell>> = self
            .sys
            .cpus()
            .iter()
            .map(|cpu| {
                vec![
                    TableCell::Text {
                        id: cpu.name().to_string(),
                        name: cpu.name().to_string(),
                        value: cpu.name().to_string(),
                    },
                    TableCell::Sensor {
                        id: format!("{}-load", cpu.name()),
                        name: "Load".to_string(),
                        value: cpu.cpu_usage() as f64,
                        unit: "%".to_string(),
                    },
                ]
            })
            .collect();
        handles.cores.set_rows(handles.cores.columns(), rows);

        handles
            .mem_used
            .set_value(self.sys.used_memory() as f64 / BYTES_PER_MIB);
        handles
            .mem_total
            .set_value(self.sys.total_memory() as f64 / BYTES_PER_MIB);
    }
}

#[async_trait]
impl Plugin for SystemMetricsPlugin {
    fn name(&self) -> &str {
        "System Metrics"
    }

    fn description(&self) -> &str {
        "CPU and memory readings for the host machine"
    }

    fn update_interval(&self) -> Option<Duration> {
        Some(Duration::from_secs(1))
    }

    fn initialize(&mut self) -> Result<()> {
        self.sys = System::new();
        self.sys.refresh_cpu_usage();
        self.sys.refresh_memory();
        Ok(())
    }

    fn register_containers(&mut self) -> Result<Vec<Container>> {
        let cpu_total = Arc::new(SensorEntry::new("total", "CPU Usage", "%").with_window(self.window));
        let cores = Arc::new(TableEntry::new(
            "cores",
            "Core Load",
            vec!["Core".to_string(), "Load".to_string()],
        ));
        let mem_used =
            Arc::new(SensorEntry::new("used", "Memory Used", "MiB").with_window(self.window));
        let mem_total =
            Arc::new(SensorEntry::new("total", "Memory Total", "MiB").with_window(self.window));

        let cpu = Container::new("cpu", "CPU")
            .with_entry(DataEntry::Sensor(cpu_total.clone()))
            .with_entry(DataEntry::Table(cores.clone()));
        let memory = Container::new("memory", "Memory")
            .with_entry(DataEntry::Sensor(mem_used.clone()))
            .with_entry(DataEntry::Sensor(mem_total.clone()));

        self.handles = Some(Handles {
            cpu_total,
            cores,
            mem_used,
            mem_total,
        });

        Ok(vec![cpu, memory])
    }

    fn update(&mut self) -> Result<()> {
        self.refresh_readings();
        Ok(())
    }

    fn close(&mut self) {
        self.handles = None;
    }
}
