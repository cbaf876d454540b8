//! tilepyramid - multi-resolution raster tile pyramids
//!
//! Builds every coarser zoom level of a geographic tile pyramid from the
//! tiles of its finest zoom. Each finest tile is downsampled once per coarser
//! zoom into a fragment, fragments are composited into full output tiles, and
//! output tiles are written in sorted, range-partitioned files.
//!
//! # Example
//!
//! ```no_run
//! use tilepyramid::engine::LocalEngine;
//! use tilepyramid::metadata::PyramidMetadata;
//! use tilepyramid::pipeline::{BuildOptions, PipelineDriver};
//! use tilepyramid::raster::PixelType;
//! use tilepyramid::storage::LocalTileStore;
//! use tilepyramid::tile::GeoExtent;
//!
//! # fn main() -> tilepyramid::Result<()> {
//! let metadata = PyramidMetadata::new(GeoExtent::world(), 256, 6, PixelType::F32)?;
//! let driver = PipelineDriver::new(
//!     LocalEngine::new(0)?,
//!     LocalTileStore::new("/data/pyramids/elevation"),
//!     BuildOptions::default(),
//! );
//! let report = driver.build(metadata)?;
//! println!("wrote {} tiles", report.total_tiles());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod partition;
pub mod pipeline;
pub mod raster;
pub mod stitch;
pub mod storage;
pub mod tile;
pub mod warp;

pub use error::{ConsistencyError, PyramidError, Result};

/// Crate version, injected from `Cargo.toml` at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
