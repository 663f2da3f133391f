//! Isolated loading of plugin libraries.
//!
//! Each plugin package ships one cdylib speaking the `sensord-plugin-api`
//! contract. A plugin library statically links its entire Rust dependency
//! graph, so its dependency resolution is scoped to that one binary: two
//! plugins bundling conflicting versions of the same crate cannot collide
//! with each other or with the host. Libraries are loaded by absolute path,
//! which also keeps a plugin's native companion libraries resolving relative
//! to its own folder rather than the host's.

use crate::error::{AppResult, SensordError};
use crate::plugins::adapter::FfiPluginAdapter;
use crate::plugins::Plugin;
use abi_stable::library::RootModule;
use sensord_plugin_api::{AbiVersion, PluginMod_Ref};
use std::path::Path;
use tracing::{debug, warn};

/// Load a plugin library and instantiate every plugin it exposes.
///
/// Fails with [`SensordError::NoImplementationFound`] — carrying the type
/// names the library declares, for diagnostics — when the library exposes no
/// usable plugin implementation.
pub fn load_plugin_library(path: &Path) -> AppResult<Vec<Box<dyn Plugin>>> {
    let load_err = |reason: String| SensordError::Load {
        path: path.to_path_buf(),
        reason,
    };

    // Absolute path: the dylib's own $ORIGIN-relative lookups must resolve
    // inside the plugin folder.
    let absolute = path
        .canonicalize()
        .map_err(|e| load_err(format!("cannot resolve path: {}", e)))?;

    let module =
        PluginMod_Ref::load_from_file(&absolute).map_err(|e| load_err(e.to_string()))?;

    let plugin_abi = (module.abi_version())();
    if !AbiVersion::CURRENT.is_compatible_with(&plugin_abi) {
        return Err(load_err(format!(
            "ABI mismatch: plugin built against {}, host speaks {}",
            plugin_abi,
            AbiVersion::CURRENT
        )));
    }

    let library_info = (module.library_info())();
    let declared_types: Vec<String> = library_info
        .plugin_types
        .iter()
        .map(|t| t.to_string())
        .collect();
    debug!(
        library = %library_info.name,
        version = %library_info.version,
        types = ?declared_types,
        "Loaded plugin library"
    );

    let count = (module.plugin_count())();
    let create = module.create_plugin();

    let mut plugins: Vec<Box<dyn Plugin>> = Vec::with_capacity(count);
    for index in 0..count {
        match create(index) {
            abi_stable::std_types::RResult::ROk(ffi_plugin) => {
                plugins.push(Box::new(FfiPluginAdapter::new(ffi_plugin)));
            }
            abi_stable::std_types::RResult::RErr(e) => {
                warn!(
                    library = %path.display(),
                    index,
                    error = %e,
                    "Plugin instantiation failed"
                );
            }
        }
    }

    if plugins.is_empty() {
        return Err(SensordError::NoImplementationFound {
            path: path.to_path_buf(),
            type_names: declared_types,
        });
    }

    Ok(plugins)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_library_is_load_error() {
        let err = match load_plugin_library(Path::new("/nonexistent/Plugin.so")) {
            Ok(_) => panic!("expected a load error for a nonexistent library"),
            Err(e) => e,
        };
        assert!(matches!(err, SensordError::Load { .. }));
    }
}
