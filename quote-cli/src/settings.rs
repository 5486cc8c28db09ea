//! Company settings loaded from a TOML file.
//!
//! ```toml
//! default_tax_rate = 20
//! vat_exempt = false
//! default_validity_days = 45
//! default_deposit_percent = 30
//! retention_percent = 5
//! max_number_attempts = 5
//! ```
//!
//! Every key is optional; missing keys keep their default value.

use std::path::{Path, PathBuf};

use quote_core::CompanySettings;
use thiserror::Error;
use tracing::{debug, info};

/// File picked up from the working directory when no path is given.
pub const DEFAULT_SETTINGS_FILE: &str = "quotebook.toml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read settings file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid settings file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

pub fn parse_settings(
    contents: &str,
    path: &Path,
) -> Result<CompanySettings, SettingsError> {
    toml::from_str(contents).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads settings from `path`.
///
/// Without a path, [`DEFAULT_SETTINGS_FILE`] is read when it exists in the
/// working directory, and the built-in defaults are used otherwise. An
/// explicit path that cannot be read is an error.
pub fn load_settings(path: Option<&Path>) -> Result<CompanySettings, SettingsError> {
    let path = match path {
        Some(path) => path,
        None => {
            let fallback = Path::new(DEFAULT_SETTINGS_FILE);
            if !fallback.exists() {
                debug!("no settings file, using defaults");
                return Ok(CompanySettings::default());
            }
            fallback
        }
    };

    let contents = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let settings = parse_settings(&contents, path)?;
    info!(path = %path.display(), "settings loaded");
    Ok(settings)
}
