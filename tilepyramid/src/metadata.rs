//! Pyramid metadata and its JSON descriptor.
//!
//! [`PyramidMetadata`] holds the dataset extent, tile size, maximum zoom and
//! pixel type, plus per-zoom pixel and tile bounds derived from them. The
//! derived levels are never edited in place: [`PyramidMetadata::with_levels`]
//! recomputes them into a fresh value.

use crate::error::{PyramidError, Result};
use crate::raster::PixelType;
use crate::tile::{
    extent_to_pixel_range, extent_to_tile_range, GeoExtent, PixelRect, TileBounds, MAX_ZOOM,
    MIN_ZOOM,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Name of the descriptor file inside a pyramid root.
pub const METADATA_FILE: &str = "metadata.json";

/// Derived extents of one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoomLevel {
    pub pixel_bounds: PixelRect,
    pub tile_bounds: TileBounds,
}

/// Description of a tiled raster pyramid.
#[derive(Debug, Clone, PartialEq)]
pub struct PyramidMetadata {
    extent: GeoExtent,
    tile_size: u32,
    max_zoom: u8,
    pixel_type: PixelType,
    nodata: f64,
    levels: BTreeMap<u8, ZoomLevel>,
}

impl PyramidMetadata {
    /// Creates validated metadata with levels computed for zooms `1..=max_zoom`.
    pub fn new(
        extent: GeoExtent,
        tile_size: u32,
        max_zoom: u8,
        pixel_type: PixelType,
    ) -> Result<Self> {
        Self {
            extent,
            tile_size,
            max_zoom,
            pixel_type,
            nodata: 0.0,
            levels: BTreeMap::new(),
        }
        .with_levels()
    }

    /// Returns a copy using `nodata` as the fill value.
    pub fn with_nodata(self, nodata: f64) -> Self {
        Self { nodata, ..self }
    }

    pub fn extent(&self) -> &GeoExtent {
        &self.extent
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    pub fn pixel_type(&self) -> PixelType {
        self.pixel_type
    }

    pub fn nodata(&self) -> f64 {
        self.nodata
    }

    /// Derived bounds for a zoom level.
    pub fn level(&self, zoom: u8) -> Result<&ZoomLevel> {
        self.levels
            .get(&zoom)
            .ok_or_else(|| PyramidError::Metadata(format!("no level recorded for zoom {}", zoom)))
    }

    pub fn levels(&self) -> &BTreeMap<u8, ZoomLevel> {
        &self.levels
    }

    /// Zoom levels produced by a pyramid build, coarsest first.
    pub fn output_zooms(&self) -> std::ops::Range<u8> {
        MIN_ZOOM..self.max_zoom
    }

    /// Checks that the geometry supports pixel-exact fragment alignment.
    ///
    /// `tile_size` must be a positive multiple of `2^(max_zoom - 1)`, so
    /// every fragment size is a whole number of pixels and fragments tile
    /// their output tile without fractional offsets.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_ZOOM..=MAX_ZOOM).contains(&self.max_zoom) {
            return Err(PyramidError::Metadata(format!(
                "max zoom {} outside {}..={}",
                self.max_zoom, MIN_ZOOM, MAX_ZOOM
            )));
        }
        if self.tile_size == 0 {
            return Err(PyramidError::Metadata("tile size must be positive".into()));
        }
        self.extent
            .validate()
            .map_err(|e| PyramidError::Metadata(e.to_string()))?;
        if self.nodata.is_infinite() || !self.pixel_type.can_represent(self.nodata) {
            return Err(PyramidError::Metadata(format!(
                "no-data value {} cannot be stored as {} pixels",
                self.nodata, self.pixel_type
            )));
        }

        let depth = (self.max_zoom - MIN_ZOOM) as u32;
        let divisor = 1u64 << depth;
        if (self.tile_size as u64) < divisor || self.tile_size as u64 % divisor != 0 {
            return Err(PyramidError::Metadata(format!(
                "tile size {} cannot be halved {} times without fractional fragments",
                self.tile_size, depth
            )));
        }
        Ok(())
    }

    /// Validates and recomputes the per-zoom levels from extent, tile size
    /// and max zoom.
    pub fn with_levels(self) -> Result<Self> {
        self.validate()?;
        let levels = (MIN_ZOOM..=self.max_zoom)
            .map(|zoom| {
                Ok((
                    zoom,
                    ZoomLevel {
                        pixel_bounds: extent_to_pixel_range(&self.extent, zoom, self.tile_size)?,
                        tile_bounds: extent_to_tile_range(&self.extent, zoom, self.tile_size)?,
                    },
                ))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Self { levels, ..self })
    }

    /// Loads a descriptor written by [`PyramidMetadata::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| {
            PyramidError::Metadata(format!("cannot read {}: {}", path.display(), e))
        })?;
        let descriptor: Descriptor = serde_json::from_slice(&bytes).map_err(|e| {
            PyramidError::Metadata(format!("malformed descriptor {}: {}", path.display(), e))
        })?;
        descriptor.into_metadata()
    }

    /// Writes the descriptor atomically (temp file, then rename).
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(&Descriptor::from(self))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// On-disk form of the metadata.
#[derive(Debug, Serialize, Deserialize)]
struct Descriptor {
    extent: GeoExtent,
    tile_size: u32,
    max_zoom: u8,
    pixel_type: String,
    #[serde(default)]
    nodata: Option<f64>,
    #[serde(default)]
    levels: Vec<LevelEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LevelEntry {
    zoom: u8,
    #[serde(flatten)]
    level: ZoomLevel,
}

impl From<&PyramidMetadata> for Descriptor {
    fn from(meta: &PyramidMetadata) -> Self {
        Self {
            extent: meta.extent,
            tile_size: meta.tile_size,
            max_zoom: meta.max_zoom,
            pixel_type: meta.pixel_type.name().to_string(),
            // JSON has no NaN, so a NaN sentinel is stored as absent
            nodata: Some(meta.nodata).filter(|v| !v.is_nan()),
            levels: meta
                .levels
                .iter()
                .map(|(&zoom, &level)| LevelEntry { zoom, level })
                .collect(),
        }
    }
}

impl Descriptor {
    fn into_metadata(self) -> Result<PyramidMetadata> {
        let pixel_type: PixelType = self.pixel_type.parse()?;
        let stored: BTreeMap<u8, ZoomLevel> = self
            .levels
            .into_iter()
            .map(|entry| (entry.zoom, entry.level))
            .collect();

        let nodata = match (self.nodata, pixel_type) {
            (Some(v), _) => v,
            (None, PixelType::F32 | PixelType::F64) => f64::NAN,
            (None, _) => 0.0,
        };
        let meta = PyramidMetadata {
            extent: self.extent,
            tile_size: self.tile_size,
            max_zoom: self.max_zoom,
            pixel_type,
            nodata,
            levels: BTreeMap::new(),
        }
        .with_levels()?;

        // Stored levels are derived data; they must agree with a recomputation.
        for (zoom, level) in &stored {
            if meta.levels.get(zoom) != Some(level) {
                return Err(PyramidError::Metadata(format!(
                    "stored bounds for zoom {} disagree with extent and tile size",
                    zoom
                )));
            }
        }
        Ok(meta)
    }
}
