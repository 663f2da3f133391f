//! Discovered plugin packages and their companion metadata.

use crate::error::{AppResult, SensordError};
use crate::plugins::wrapper::PluginWrapper;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Metadata read from a package's optional `PluginInfo.ini` companion.
///
/// ```ini
/// [PluginInfo]
/// Name=...
/// Description=...
/// Author=...
/// Version=...
/// Website=...
/// ```
#[derive(Debug, Clone, Default)]
pub struct PackageMetadata {
    pub name: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub version: Option<String>,
    pub website: Option<String>,
}

impl PackageMetadata {
    /// Parse a `PluginInfo.ini` file.
    ///
    /// Parsing is lenient: missing keys stay `None`. A file that cannot be
    /// parsed at all is a metadata error (the caller logs it and continues
    /// without metadata).
    pub fn from_ini_file(path: &Path) -> AppResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.to_path_buf()).format(config::FileFormat::Ini))
            .build()
            .map_err(|e| SensordError::Metadata {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let field = |key: &str| {
            settings
                .get_string(&format!("PluginInfo.{}", key))
                .or_else(|_| settings.get_string(&format!("plugininfo.{}", key.to_lowercase())))
                .ok()
        };

        Ok(Self {
            name: field("Name"),
            description: field("Description"),
            author: field("Author"),
            version: field("Version"),
            website: field("Website"),
        })
    }
}

/// The filename of the companion metadata file inside a package folder.
pub const PACKAGE_METADATA_FILE: &str = "PluginInfo.ini";

/// One discovered installable unit: the package folder, its binary, optional
/// metadata, and one wrapper per plugin implementation found in the binary.
///
/// Metadata is immutable after discovery; the wrapper set is populated once
/// at creation.
#[derive(Debug)]
pub struct PluginDescriptor {
    binary_path: PathBuf,
    folder_name: String,
    metadata: Option<PackageMetadata>,
    wrappers: Vec<Arc<PluginWrapper>>,
}

impl PluginDescriptor {
    pub fn new(
        binary_path: PathBuf,
        folder_name: impl Into<String>,
        metadata: Option<PackageMetadata>,
        wrappers: Vec<Arc<PluginWrapper>>,
    ) -> Self {
        let descriptor = Self {
            binary_path,
            folder_name: folder_name.into(),
            metadata,
            wrappers,
        };
        debug!(
            folder = %descriptor.folder_name,
            plugins = descriptor.wrappers.len(),
            "Built plugin descriptor"
        );
        descriptor
    }

    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    pub fn folder_name(&self) -> &str {
        &self.folder_name
    }

    pub fn metadata(&self) -> Option<&PackageMetadata> {
        self.metadata.as_ref()
    }

    pub fn wrappers(&self) -> &[Arc<PluginWrapper>] {
        &self.wrappers
    }

    /// True when every wrapper of this package has been torn down.
    ///
    /// A loaded manual-update wrapper counts as active even though it owns
    /// no update loop; only a stopped wrapper makes its package eligible for
    /// deactivation persistence.
    pub fn all_stopped(&self) -> bool {
        self.wrappers
            .iter()
            .all(|w| !w.is_running() && !w.is_loaded())
    }
}
