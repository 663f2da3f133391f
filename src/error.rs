//! Custom error types for the application.
//!
//! This module defines the primary error type, `SensordError`, for the entire
//! host. Using the `thiserror` crate, it provides a centralized and consistent
//! way to handle the different kinds of failures the plugin runtime produces,
//! from I/O and configuration issues to faults inside third-party plugin code.
//!
//! Plugin lifecycle failures deserve a note: they are *expected* inputs, not
//! exceptional conditions. A hook that fails is captured as
//! [`SensordError::Plugin`] with the plugin's identity attached, logged at the
//! wrapper boundary, and never propagated into the orchestration of other
//! plugins. Cancellation of an update loop is not represented here at all —
//! it is a normal outcome of stopping a plugin.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, SensordError>;

#[derive(Error, Debug)]
pub enum SensordError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("Plugin metadata error in {path}: {reason}")]
    Metadata { path: PathBuf, reason: String },

    #[error("Installer archive {path} rejected: {reason}")]
    Archive { path: PathBuf, reason: String },

    #[error("Failed to load plugin library {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("No plugin implementation found in {path} (declared types: {type_names:?})")]
    NoImplementationFound {
        path: PathBuf,
        type_names: Vec<String>,
    },

    #[error("Plugin '{plugin}' failed: {source}")]
    Plugin {
        plugin: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Update loop is active; manual update not available")]
    WrapperBusy,
}

impl SensordError {
    /// Wrap a plugin hook failure with the plugin's identity.
    pub fn plugin(plugin: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Plugin {
            plugin: plugin.into(),
            source,
        }
    }
}
