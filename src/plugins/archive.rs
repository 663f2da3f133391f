//! Installer archive intake.
//!
//! Users install plugins by dropping `<prefix>.*.zip` archives into the
//! external plugins directory. Before every discovery scan the monitor calls
//! [`extract_pending_archives`]: each archive is validated — its first entry
//! must live under a `<prefix>.<alphanumeric>/` folder, which both checks
//! provenance and names the folder discovery will find — then extracted in
//! place (overwriting) and deleted.
//!
//! Rejected or unreadable archives are *retained* on disk so the user can
//! inspect what went wrong; only successfully extracted archives are
//! removed.

use crate::error::{AppResult, SensordError};
use regex::Regex;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Extract every pending installer archive in `external_dir`.
///
/// Returns the folder names that were extracted. Invalid archives are logged
/// and left in place; they never abort the scan.
pub fn extract_pending_archives(external_dir: &Path, prefix: &str) -> Vec<String> {
    let mut extracted = Vec::new();

    let entries = match fs::read_dir(external_dir) {
        Ok(entries) => entries,
        Err(_) => return extracted, // no external dir yet
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !is_installer_archive(file_name, prefix) {
            continue;
        }

        match extract_archive(&path, external_dir, prefix) {
            Ok(folder) => {
                info!(archive = %path.display(), folder = %folder, "Extracted plugin archive");
                if let Err(e) = fs::remove_file(&path) {
                    warn!(archive = %path.display(), error = %e, "Failed to delete extracted archive");
                }
                extracted.push(folder);
            }
            Err(e) => {
                warn!(archive = %path.display(), error = %e, "Rejected plugin archive");
            }
        }
    }

    extracted
}

/// `<prefix>.*.zip`, case-sensitive, matching the installer naming scheme.
fn is_installer_archive(file_name: &str, prefix: &str) -> bool {
    file_name.starts_with(&format!("{}.", prefix)) && file_name.ends_with(".zip")
}

/// Validate and extract one archive into `dest_root`.
///
/// Returns the plugin folder name the archive unpacks into.
pub fn extract_archive(archive_path: &Path, dest_root: &Path, prefix: &str) -> AppResult<String> {
    let reject = |reason: String| SensordError::Archive {
        path: archive_path.to_path_buf(),
        reason,
    };

    let file = fs::File::open(archive_path)?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| reject(format!("unreadable archive: {}", e)))?;

    if archive.len() == 0 {
        return Err(reject("archive is empty".to_string()));
    }

    let first_entry = archive
        .by_index(0)
        .map_err(|e| reject(format!("unreadable first entry: {}", e)))?
        .name()
        .to_string();

    let folder = validate_first_entry(&first_entry, prefix).ok_or_else(|| {
        reject(format!(
            "first entry '{}' is not under a {}.<name>/ folder",
            first_entry, prefix
        ))
    })?;

    archive
        .extract(dest_root)
        .map_err(|e| reject(format!("extraction failed: {}", e)))?;

    Ok(folder)
}

/// Check the first entry path against `<prefix>.[A-Za-z0-9]+/` and return
/// the folder name it implies.
fn validate_first_entry(entry_name: &str, prefix: &str) -> Option<String> {
    let pattern = format!(r"^({}\.[A-Za-z0-9]+)/", regex::escape(prefix));
    #[allow(clippy::unwrap_used)] // pattern is built from an escaped literal
    let re = Regex::new(&pattern).unwrap();
    re.captures(entry_name)
        .map(|caps| caps[1].to_string())
}
