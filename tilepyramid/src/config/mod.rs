//! Build configuration.
//!
//! Settings are read from an INI file (`~/.tilepyramid/config.ini` by
//! default). A missing file means defaults; a present but invalid value is an
//! error naming its section and key.
//!
//! ```ini
//! [pyramid]
//! root = /data/pyramids/elevation
//! block_size = 128MB
//! coverage = complete
//! compression = 6
//!
//! [execution]
//! threads = 0
//!
//! [logging]
//! directory = logs
//! file = tilepyramid.log
//! ```

mod file;
mod parser;
mod size;
mod writer;

pub use file::{
    config_directory, config_file_path, BuildConfig, ConfigFileError, ExecutionSettings,
    LoggingSettings, PyramidSettings,
};
pub use size::{format_size, parse_size, Size, SizeParseError};
