//! FFI-stable plugin API for rust_sensord measurement modules.
//!
//! Plugins are cdylibs that export a single root module via
//! [`abi_stable::export_root_module`]. Each plugin library statically links
//! its own dependency graph, so two plugins bundling different versions of
//! the same crate never collide with each other or with the host.
//!
//! # Plugin side
//!
//! ```rust,ignore
//! use sensord_plugin_api::prelude::*;
//!
//! #[abi_stable::export_root_module]
//! fn get_root_module() -> PluginMod_Ref {
//!     PluginMod {
//!         abi_version,
//!         library_info,
//!         plugin_count,
//!         create_plugin,
//!     }
//!     .leak_into_prefix()
//! }
//! ```
//!
//! # Host side
//!
//! The host loads the library with `PluginMod_Ref::load_from_file`, checks
//! `abi_version()` against [`AbiVersion::CURRENT`], and instantiates every
//! plugin the library exposes via `create_plugin(0..plugin_count())`.

pub mod metadata;
pub mod plugin_ffi;

use abi_stable::library::RootModule;
use abi_stable::sabi_types::VersionStrings;
use abi_stable::std_types::{RResult, RString};
use abi_stable::{declare_root_module_statics, package_version_strings, StableAbi};

pub use metadata::{AbiVersion, PluginLibraryInfo};
pub use plugin_ffi::{
    FfiCell, FfiContainerDecl, FfiEntryDecl, FfiEntryKind, FfiPluginInfo, FfiPluginResult, FfiRow,
    FfiSample, FfiSensorCell, FfiTableValue, FfiTextCell, FfiValue, SensorPluginBox,
    SensorPluginFfi, SensorPluginFfi_TO,
};

/// The root module every plugin library exports.
///
/// `create_plugin` is called once per index in `0..plugin_count()`; a library
/// exposing zero plugins is reported by the host as a load failure.
#[repr(C)]
#[derive(StableAbi)]
#[sabi(kind(Prefix))]
#[sabi(missing_field(panic))]
pub struct PluginMod {
    /// ABI version the plugin was built against
    pub abi_version: extern "C" fn() -> AbiVersion,

    /// Library-level metadata
    pub library_info: extern "C" fn() -> PluginLibraryInfo,

    /// Number of plugin implementations this library exposes
    pub plugin_count: extern "C" fn() -> usize,

    /// Instantiate the plugin at the given index
    #[sabi(last_prefix_field)]
    pub create_plugin: extern "C" fn(usize) -> RResult<SensorPluginBox, RString>,
}

impl RootModule for PluginMod_Ref {
    declare_root_module_statics! {PluginMod_Ref}

    const BASE_NAME: &'static str = "sensord_plugin";
    const NAME: &'static str = "sensord_plugin";
    const VERSION_STRINGS: VersionStrings = package_version_strings!();
}

/// Everything a plugin implementation needs in one import.
pub mod prelude {
    pub use crate::metadata::{AbiVersion, PluginLibraryInfo};
    pub use crate::plugin_ffi::{
        FfiCell, FfiContainerDecl, FfiEntryDecl, FfiEntryKind, FfiPluginInfo, FfiPluginResult,
        FfiRow, FfiSample, FfiSensorCell, FfiTableValue, FfiTextCell, FfiValue, SensorPluginBox,
        SensorPluginFfi, SensorPluginFfi_TO,
    };
    pub use crate::{PluginMod, PluginMod_Ref};
    pub use abi_stable::prefix_type::PrefixTypeTrait;
    pub use abi_stable::std_types::{RBox, ROption, RResult, RString, RVec};
}
