//! Build configuration in `~/.tilepyramid/config.ini`.

use super::parser::parse_ini;
use super::size::Size;
use super::writer::to_config_string;
use crate::logging::{default_log_dir, default_log_file};
use crate::pipeline::BuildOptions;
use crate::stitch::CoveragePolicy;
use crate::storage::{LocalTileStore, DEFAULT_BLOCK_SIZE, DEFAULT_COMPRESSION};
use ini::Ini;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    #[error("Failed to write config file: {0}")]
    WriteError(String),

    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

impl ConfigFileError {
    pub(super) fn invalid(section: &str, key: &str, value: &str, reason: &str) -> Self {
        ConfigFileError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// `[pyramid]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PyramidSettings {
    /// Tile store root. Builds need it; other commands may not.
    pub root: Option<PathBuf>,
    /// Target partition size
    pub block_size: Size,
    pub coverage: CoveragePolicy,
    /// zlib level for tile records, 0-9
    pub compression: u32,
}

impl Default for PyramidSettings {
    fn default() -> Self {
        Self {
            root: None,
            block_size: Size(DEFAULT_BLOCK_SIZE),
            coverage: CoveragePolicy::default(),
            compression: DEFAULT_COMPRESSION,
        }
    }
}

/// `[execution]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionSettings {
    /// Worker threads, 0 for one per core
    pub threads: usize,
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub directory: PathBuf,
    pub file: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(default_log_dir()),
            file: default_log_file().to_string(),
        }
    }
}

/// Everything a build reads from the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildConfig {
    pub pyramid: PyramidSettings,
    pub execution: ExecutionSettings,
    pub logging: LoggingSettings,
}

impl BuildConfig {
    /// Loads `~/.tilepyramid/config.ini`, or defaults if it does not exist.
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Loads a config file, or defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path)?;
        parse_ini(&ini)
    }

    /// Writes the configuration as a commented INI file.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }
        std::fs::write(path, to_config_string(self))
            .map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Tile store for the configured root, block size and compression.
    pub fn tile_store(&self) -> Result<LocalTileStore, ConfigFileError> {
        let root = self.pyramid.root.as_ref().ok_or_else(|| {
            ConfigFileError::invalid("pyramid", "root", "", "a tile store root is required")
        })?;
        Ok(LocalTileStore::new(root)
            .with_block_size(self.pyramid.block_size.bytes())
            .with_compression(self.pyramid.compression))
    }

    /// Splits the configuration into driver options and the engine thread count.
    pub fn into_parts(self) -> (BuildOptions, usize) {
        (
            BuildOptions {
                coverage: self.pyramid.coverage,
            },
            self.execution.threads,
        )
    }
}

/// `~/.tilepyramid`, or `./.tilepyramid` without a home directory.
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tilepyramid")
}

pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}
