//! Example plugin demonstrating the sensord-plugin-api.
//!
//! This plugin publishes process uptime readings and demonstrates the full
//! lifecycle and FFI-safe trait implementation.

use sensord_plugin_api::prelude::*;
use std::time::Instant;

// =============================================================================
// Plugin Entry Point
// =============================================================================

/// Export the plugin root module.
///
/// This is the entry point the host calls when loading the library.
#[abi_stable::export_root_module]
fn get_root_module() -> PluginMod_Ref {
    PluginMod {
        abi_version,
        library_info,
        plugin_count,
        create_plugin,
    }
    .leak_into_prefix()
}

#[abi_stable::sabi_extern_fn]
fn abi_version() -> AbiVersion {
    AbiVersion::CURRENT
}

#[abi_stable::sabi_extern_fn]
fn library_info() -> PluginLibraryInfo {
    PluginLibraryInfo::new("Example Plugin", "0.1.0")
        .with_author("sensord team")
        .with_plugin_type("UptimePlugin")
}

#[abi_stable::sabi_extern_fn]
fn plugin_count() -> usize {
    1
}

#[abi_stable::sabi_extern_fn]
fn create_plugin(index: usize) -> RResult<SensorPluginBox, RString> {
    match index {
        0 => {
            let plugin = UptimePlugin::new();
            let boxed =
                SensorPluginFfi_TO::from_value(plugin, abi_stable::sabi_trait::TD_CanDowncast);
            RResult::ROk(boxed)
        }
        _ => RResult::RErr(RString::from(format!("No plugin at index {}", index))),
    }
}

// =============================================================================
// Uptime Plugin Implementation
// =============================================================================

/// Publishes how long the plugin has been running.
///
/// The container is ephemeral, so its entries are addressed directly under
/// the plugin id (`/uptime/seconds`, `/uptime/status`).
struct UptimePlugin {
    started: Option<Instant>,
    ticks: u64,
}

impl UptimePlugin {
    fn new() -> Self {
        Self {
            started: None,
            ticks: 0,
        }
    }
}

impl SensorPluginFfi for UptimePlugin {
    fn info(&self) -> FfiPluginInfo {
        FfiPluginInfo {
            name: RString::from("Uptime"),
            description: RString::from("Seconds elapsed since the plugin started"),
            config_file: ROption::RNone,
            update_interval_ms: 1000,
        }
    }

    fn initialize(&mut self) -> FfiPluginResult<()> {
        self.started = Some(Instant::now());
        self.ticks = 0;
        RResult::ROk(())
    }

    fn containers(&mut self) -> FfiPluginResult<RVec<FfiContainerDecl>> {
        let container = FfiContainerDecl::ephemeral("uptime", "Uptime")
            .with_entry(FfiEntryDecl::sensor("seconds", "Uptime", "s"))
            .with_entry(FfiEntryDecl::text("status", "Status", "starting"));

        let mut containers = RVec::new();
        containers.push(container);
        RResult::ROk(containers)
    }

    fn update(&mut self) -> FfiPluginResult<RVec<FfiSample>> {
        let started = match self.started {
            Some(instant) => instant,
            None => return RResult::RErr(RString::from("update called before initialize")),
        };

        self.ticks += 1;
        let elapsed = started.elapsed().as_secs_f64();

        let mut samples = RVec::new();
        samples.push(FfiSample::sensor("uptime", "seconds", elapsed));
        samples.push(FfiSample::text(
            "uptime",
            "status",
            &format!("alive ({} ticks)", self.ticks),
        ));
        RResult::ROk(samples)
    }

    fn close(&mut self) {
        self.started = None;
    }
}
