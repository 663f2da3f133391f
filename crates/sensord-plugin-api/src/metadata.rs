//! Library-level metadata with StableAbi derives.

use abi_stable::std_types::{RString, RVec};
use abi_stable::StableAbi;

/// ABI-stable description of a plugin library.
///
/// One library may expose several plugin implementations; `plugin_types`
/// lists their type names so the host can report what a library declares
/// even when instantiation fails.
#[repr(C)]
#[derive(Debug, Clone, StableAbi)]
pub struct PluginLibraryInfo {
    /// Human-readable library name
    pub name: RString,

    /// Library version (semver format)
    pub version: RString,

    /// Library author
    pub author: RString,

    /// Type names of the plugin implementations this library exposes
    pub plugin_types: RVec<RString>,
}

impl PluginLibraryInfo {
    /// Create new library info with required fields
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: RString::from(name),
            version: RString::from(version),
            author: RString::new(),
            plugin_types: RVec::new(),
        }
    }

    /// Builder method to set author
    pub fn with_author(mut self, author: &str) -> Self {
        self.author = RString::from(author);
        self
    }

    /// Builder method to add a plugin type name
    pub fn with_plugin_type(mut self, type_name: &str) -> Self {
        self.plugin_types.push(RString::from(type_name));
        self
    }
}

/// Version information for ABI compatibility checking
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, StableAbi)]
pub struct AbiVersion {
    /// Major version - breaking changes
    pub major: u32,
    /// Minor version - backwards-compatible additions
    pub minor: u32,
    /// Patch version - bug fixes
    pub patch: u32,
}

impl AbiVersion {
    /// Current ABI version
    pub const CURRENT: Self = Self {
        major: 0,
        minor: 1,
        patch: 0,
    };

    /// Check if this version is compatible with another
    pub fn is_compatible_with(&self, other: &Self) -> bool {
        // Major version must match, minor must be >= required
        self.major == other.major && self.minor >= other.minor
    }
}

impl std::fmt::Display for AbiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
