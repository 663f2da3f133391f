//! FFI-safe plugin interface using abi_stable's sabi_trait.
//!
//! This wraps the host's plugin contract for cross-dylib calls.

#![allow(non_local_definitions)] // abi_stable's sabi_trait generates these

use abi_stable::sabi_trait;
use abi_stable::std_types::{RBox, ROption, RResult, RString, RVec};
use abi_stable::StableAbi;

/// FFI-safe result type for plugin operations
pub type FfiPluginResult<T> = RResult<T, RString>;

/// FFI-safe plugin identity and scheduling info.
#[repr(C)]
#[derive(Debug, Clone, StableAbi)]
pub struct FfiPluginInfo {
    /// Human-readable plugin name (the host derives the plugin id from it)
    pub name: RString,

    /// Short description shown in listings
    pub description: RString,

    /// Path to the plugin's own config file, if it has one
    pub config_file: ROption<RString>,

    /// Delay between scheduled update ticks in milliseconds.
    ///
    /// A value <= 0 means the plugin is never auto-updated; the host drives
    /// its synchronous update explicitly instead.
    pub update_interval_ms: i64,
}

/// Kind tag for a declared data entry.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, StableAbi)]
pub enum FfiEntryKind {
    Text = 0,
    Sensor = 1,
    Table = 2,
}

/// Declaration of one data entry inside a container.
///
/// Only the fields relevant to `kind` are read by the host: `initial_text`
/// for text entries, `unit` for sensors, `columns` for tables.
#[repr(C)]
#[derive(Debug, Clone, StableAbi)]
pub struct FfiEntryDecl {
    pub id: RString,
    pub name: RString,
    pub kind: FfiEntryKind,
    pub unit: RString,
    pub initial_text: RString,
    pub columns: RVec<RString>,
}

impl FfiEntryDecl {
    pub fn text(id: &str, name: &str, initial: &str) -> Self {
        Self {
            id: RString::from(id),
            name: RString::from(name),
            kind: FfiEntryKind::Text,
            unit: RString::new(),
            initial_text: RString::from(initial),
            columns: RVec::new(),
        }
    }

    pub fn sensor(id: &str, name: &str, unit: &str) -> Self {
        Self {
            id: RString::from(id),
            name: RString::from(name),
            kind: FfiEntryKind::Sensor,
            unit: RString::from(unit),
            initial_text: RString::new(),
            columns: RVec::new(),
        }
    }

    pub fn table(id: &str, name: &str, columns: &[&str]) -> Self {
        Self {
            id: RString::from(id),
            name: RString::from(name),
            kind: FfiEntryKind::Table,
            unit: RString::new(),
            initial_text: RString::new(),
            columns: columns.iter().map(|c| RString::from(*c)).collect(),
        }
    }
}

/// Declaration of one container of entries.
#[repr(C)]
#[derive(Debug, Clone, StableAbi)]
pub struct FfiContainerDecl {
    pub id: RString,
    pub name: RString,
    /// When true, the container id is omitted from registry addresses.
    pub ephemeral: bool,
    pub entries: RVec<FfiEntryDecl>,
}

impl FfiContainerDecl {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: RString::from(id),
            name: RString::from(name),
            ephemeral: false,
            entries: RVec::new(),
        }
    }

    pub fn ephemeral(id: &str, name: &str) -> Self {
        Self {
            ephemeral: true,
            ..Self::new(id, name)
        }
    }

    pub fn with_entry(mut self, entry: FfiEntryDecl) -> Self {
        self.entries.push(entry);
        self
    }
}

/// One cell of a table value.
#[repr(u8)]
#[derive(Debug, Clone, StableAbi)]
pub enum FfiCell {
    Text(FfiTextCell),
    Sensor(FfiSensorCell),
}

#[repr(C)]
#[derive(Debug, Clone, StableAbi)]
pub struct FfiTextCell {
    pub id: RString,
    pub name: RString,
    pub value: RString,
}

#[repr(C)]
#[derive(Debug, Clone, StableAbi)]
pub struct FfiSensorCell {
    pub id: RString,
    pub name: RString,
    pub value: f64,
    pub unit: RString,
}

/// One row of a table value.
#[repr(C)]
#[derive(Debug, Clone, StableAbi)]
pub struct FfiRow {
    pub cells: RVec<FfiCell>,
}

/// A full replacement value for a table entry.
#[repr(C)]
#[derive(Debug, Clone, StableAbi)]
pub struct FfiTableValue {
    pub columns: RVec<RString>,
    pub rows: RVec<FfiRow>,
}

/// A new value for one declared entry.
#[repr(u8)]
#[derive(Debug, Clone, StableAbi)]
pub enum FfiValue {
    Text(RString),
    Sensor(f64),
    Table(FfiTableValue),
}

/// One published value update, addressed by container and entry id.
#[repr(C)]
#[derive(Debug, Clone, StableAbi)]
pub struct FfiSample {
    pub container_id: RString,
    pub entry_id: RString,
    pub value: FfiValue,
}

impl FfiSample {
    pub fn text(container_id: &str, entry_id: &str, value: &str) -> Self {
        Self {
            container_id: RString::from(container_id),
            entry_id: RString::from(entry_id),
            value: FfiValue::Text(RString::from(value)),
        }
    }

    pub fn sensor(container_id: &str, entry_id: &str, value: f64) -> Self {
        Self {
            container_id: RString::from(container_id),
            entry_id: RString::from(entry_id),
            value: FfiValue::Sensor(value),
        }
    }

    pub fn table(container_id: &str, entry_id: &str, value: FfiTableValue) -> Self {
        Self {
            container_id: RString::from(container_id),
            entry_id: RString::from(entry_id),
            value: FfiValue::Table(value),
        }
    }
}

/// The FFI-safe plugin trait.
///
/// This is the contract every out-of-tree plugin implements. It mirrors the
/// host's internal `Plugin` trait but uses FFI-safe types throughout.
///
/// # Lifecycle
///
/// 1. `initialize()` - prepare internal state
/// 2. `containers()` - declare the containers and entries to publish
/// 3. `update()` - produce one tick's worth of samples (repeatedly)
/// 4. `close()` - release resources
///
/// # Note on Async
///
/// The host schedules updates asynchronously, but FFI boundaries don't
/// support async directly. `update()` is a plain blocking call; the host
/// runs it on a blocking worker so a slow plugin cannot stall the runtime.
#[sabi_trait]
pub trait SensorPluginFfi: Send + 'static {
    /// Get identity and scheduling info for this plugin
    fn info(&self) -> FfiPluginInfo;

    /// Prepare internal state before the first container declaration
    fn initialize(&mut self) -> FfiPluginResult<()>;

    /// Declare the containers and entries this plugin publishes.
    ///
    /// Called after `initialize()`, and again on every reload.
    fn containers(&mut self) -> FfiPluginResult<RVec<FfiContainerDecl>>;

    /// Produce the value updates for one tick.
    ///
    /// Samples referring to unknown container/entry ids are ignored by the
    /// host.
    fn update(&mut self) -> FfiPluginResult<RVec<FfiSample>>;

    /// Release resources; called once when the plugin is stopped
    fn close(&mut self);
}

/// Type alias for an owned, boxed FFI plugin (like `Box<dyn SensorPluginFfi>`)
pub type SensorPluginBox = SensorPluginFfi_TO<RBox<()>>;
