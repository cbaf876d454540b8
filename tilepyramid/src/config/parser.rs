//! `Ini` to [`BuildConfig`] conversion. Unknown keys are ignored.

use super::file::{BuildConfig, ConfigFileError};
use super::size::Size;
use ini::Ini;
use std::path::PathBuf;

/// Overlays the values found in `ini` on the defaults.
pub(super) fn parse_ini(ini: &Ini) -> Result<BuildConfig, ConfigFileError> {
    let mut config = BuildConfig::default();

    if let Some(section) = ini.section(Some("pyramid")) {
        if let Some(v) = non_empty(section.get("root")) {
            config.pyramid.root = Some(expand_tilde(v));
        }
        if let Some(v) = section.get("block_size") {
            let size: Size = v.parse().map_err(|_| {
                ConfigFileError::invalid(
                    "pyramid",
                    "block_size",
                    v,
                    "expected format like '64KB', '128MB' or '1GB'",
                )
            })?;
            if size.bytes() == 0 {
                return Err(ConfigFileError::invalid(
                    "pyramid",
                    "block_size",
                    v,
                    "must be greater than zero",
                ));
            }
            config.pyramid.block_size = size;
        }
        if let Some(v) = section.get("coverage") {
            config.pyramid.coverage = v.parse().map_err(|_| {
                ConfigFileError::invalid("pyramid", "coverage", v, "must be 'complete' or 'sparse'")
            })?;
        }
        if let Some(v) = section.get("compression") {
            config.pyramid.compression = v
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|level| *level <= 9)
                .ok_or_else(|| {
                    ConfigFileError::invalid(
                        "pyramid",
                        "compression",
                        v,
                        "must be an integer from 0 to 9",
                    )
                })?;
        }
    }

    if let Some(section) = ini.section(Some("execution")) {
        if let Some(v) = section.get("threads") {
            config.execution.threads = v.trim().parse().map_err(|_| {
                ConfigFileError::invalid(
                    "execution",
                    "threads",
                    v,
                    "must be a non-negative integer (0 = one per core)",
                )
            })?;
        }
    }

    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = non_empty(section.get("directory")) {
            config.logging.directory = expand_tilde(v);
        }
        if let Some(v) = non_empty(section.get("file")) {
            config.logging.file = v.to_string();
        }
    }

    Ok(config)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Expands a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
