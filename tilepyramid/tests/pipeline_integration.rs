//! Integration tests for complete pyramid builds.
//!
//! These tests run the pipeline driver with the local engine and store and
//! check:
//! - Placement of fragments inside coarse tiles
//! - Single-zoom pyramids
//! - Byte-identical output across repeated builds
//! - Partitioned output across many files
//! - Failed builds leaving no metadata behind
//! - No-data handling for sparse float pyramids

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tilepyramid::engine::LocalEngine;
use tilepyramid::error::{ConsistencyError, PyramidError};
use tilepyramid::metadata::PyramidMetadata;
use tilepyramid::partition::PartitionPlan;
use tilepyramid::pipeline::{BuildOptions, PipelineDriver};
use tilepyramid::raster::{PixelType, RasterPayload};
use tilepyramid::stitch::CoveragePolicy;
use tilepyramid::storage::{LocalTileStore, TileStore};
use tilepyramid::tile::{decode_tile_id, encode_tile_id, GeoExtent, TileId};

// =============================================================================
// Test Helpers
// =============================================================================

fn driver(
    store: LocalTileStore,
    coverage: CoveragePolicy,
) -> PipelineDriver<LocalEngine, LocalTileStore> {
    PipelineDriver::new(LocalEngine::new(4).unwrap(), store, BuildOptions { coverage })
}

/// Imports one constant tile per finest address, valued by `value(col, row)`.
fn import_constant_tiles(
    store: &LocalTileStore,
    metadata: &PyramidMetadata,
    value: impl Fn(u64, u64) -> f64,
) {
    let zoom = metadata.max_zoom();
    let bounds = metadata.level(zoom).unwrap().tile_bounds;
    let tiles = (0..bounds.count())
        .map(|n| {
            let addr = bounds.nth(n, zoom).unwrap();
            let id = encode_tile_id(addr.col, addr.row, zoom).unwrap();
            let payload = RasterPayload::filled(
                metadata.pixel_type(),
                metadata.tile_size(),
                value(addr.col, addr.row),
            );
            (id, payload)
        })
        .collect();
    store.import_level(zoom, tiles).unwrap();
}

/// Every file under the store root with its contents, keyed by relative path.
fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<PathBuf, Vec<u8>>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_path_buf();
                out.insert(rel, fs::read(&path).unwrap());
            }
        }
    }
    let mut out = BTreeMap::new();
    walk(root, root, &mut out);
    out
}

fn byte_value(col: u64, row: u64) -> f64 {
    ((row * 16 + col) % 200 + 1) as f64
}

// =============================================================================
// Placement
// =============================================================================

#[test]
fn test_quadrants_are_assembled_into_one_tile() {
    let temp = TempDir::new().unwrap();
    let store = LocalTileStore::new(temp.path());
    let metadata = PyramidMetadata::new(
        GeoExtent::new(-180.0, -90.0, 0.0, 90.0),
        4,
        2,
        PixelType::U8,
    )
    .unwrap();
    import_constant_tiles(&store, &metadata, |col, row| (row * 2 + col + 1) as f64);

    let driver = driver(store, CoveragePolicy::Complete);
    let report = driver.build(metadata).unwrap();
    assert_eq!(report.finest_tiles, 4);
    assert_eq!(report.fragments, 4);
    assert_eq!(report.total_tiles(), 1);

    let level = driver.store().read_level(1).unwrap();
    assert_eq!(level.len(), 1);
    assert_eq!(level[0].0, encode_tile_id(0, 0, 1).unwrap());
    #[rustfmt::skip]
    let expected = [
        1, 1, 2, 2,
        1, 1, 2, 2,
        3, 3, 4, 4,
        3, 3, 4, 4,
    ];
    assert_eq!(level[0].1.pixels::<u8>().unwrap(), &expected);
}

#[test]
fn test_every_zoom_places_every_finest_tile() {
    let temp = TempDir::new().unwrap();
    let store = LocalTileStore::new(temp.path()).with_block_size(300);
    let metadata = PyramidMetadata::new(GeoExtent::world(), 8, 4, PixelType::U8).unwrap();
    import_constant_tiles(&store, &metadata, byte_value);

    let driver = driver(store, CoveragePolicy::Complete);
    let report = driver.build(metadata.clone()).unwrap();
    assert_eq!(report.finest_tiles, 128);
    assert_eq!(report.fragments, 128 * 3);
    assert_eq!(report.levels[&3].tiles, 32);
    assert_eq!(report.levels[&2].tiles, 8);
    assert_eq!(report.levels[&1].tiles, 2);

    // Zoom 1 fragments are single pixels, one per finest tile
    for (id, payload) in driver.store().read_level(1).unwrap() {
        let addr = decode_tile_id(id).unwrap();
        for y in 0..8u64 {
            for x in 0..8u64 {
                let expected = byte_value(addr.col * 8 + x, y);
                assert_eq!(payload.get_f64(x as u32, y as u32), expected);
            }
        }
    }

    // Zoom 3 tiles hold 2x2 finest tiles as 4x4 blocks
    for (id, payload) in driver.store().read_level(3).unwrap() {
        let addr = decode_tile_id(id).unwrap();
        for (dx, dy) in [(0u64, 0u64), (1, 0), (0, 1), (1, 1)] {
            let expected = byte_value(addr.col * 2 + dx, addr.row * 2 + dy);
            let px = (dx * 4 + 1) as u32;
            let py = (dy * 4 + 2) as u32;
            assert_eq!(payload.get_f64(px, py), expected);
        }
    }
}

#[test]
fn test_single_zoom_pyramid_writes_only_metadata() {
    let temp = TempDir::new().unwrap();
    let store = LocalTileStore::new(temp.path());
    let metadata = PyramidMetadata::new(GeoExtent::world(), 4, 1, PixelType::I16).unwrap();
    import_constant_tiles(&store, &metadata, |_, _| 7.0);

    let driver = driver(store, CoveragePolicy::Complete);
    let report = driver.build(metadata.clone()).unwrap();
    assert_eq!(report.finest_tiles, 2);
    assert_eq!(report.fragments, 0);
    assert_eq!(report.total_tiles(), 0);
    assert_eq!(report.total_partitions(), 0);

    let saved = PyramidMetadata::load(&driver.store().metadata_path()).unwrap();
    assert_eq!(saved, metadata);
}

// =============================================================================
// Partitioning and Idempotence
// =============================================================================

#[test]
fn test_partitions_follow_the_plan() {
    let temp = TempDir::new().unwrap();
    let store = LocalTileStore::new(temp.path()).with_block_size(300);
    let metadata = PyramidMetadata::new(GeoExtent::world(), 8, 4, PixelType::U8).unwrap();
    import_constant_tiles(&store, &metadata, byte_value);

    let plan = PartitionPlan::build(&metadata, 300).unwrap();
    assert_eq!(plan.tiles_per_partition(), 3);

    let driver = driver(store, CoveragePolicy::Complete);
    let report = driver.build(metadata).unwrap();
    assert_eq!(report.total_partitions(), plan.partition_count());

    for (zoom, range) in plan.partitions() {
        let path = driver.store().partition_path(zoom, range.index);
        let reader = tilepyramid::storage::TileFileReader::open(&path).unwrap();
        let keys: Vec<TileId> = reader.keys().collect();
        assert!(!keys.is_empty(), "partition {} is empty", range.index);
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
        assert!(keys.iter().all(|k| range.contains(*k)));
    }
}

#[test]
fn test_rebuild_is_byte_identical() {
    let temp = TempDir::new().unwrap();
    let store = LocalTileStore::new(temp.path()).with_block_size(1000);
    let metadata = PyramidMetadata::new(GeoExtent::world(), 8, 4, PixelType::F32)
        .unwrap()
        .with_nodata(-9999.0);
    import_constant_tiles(&store, &metadata, |col, row| col as f64 * 0.25 - row as f64);

    let driver = driver(store, CoveragePolicy::Complete);
    driver.build(metadata.clone()).unwrap();
    let first = snapshot(temp.path());

    driver.build(metadata).unwrap();
    let second = snapshot(temp.path());

    assert!(first.keys().any(|p| p.ends_with("metadata.json")));
    assert!(first.keys().any(|p| p.starts_with("1")));
    assert_eq!(first, second);
}

#[test]
fn test_rebuild_removes_stale_partitions() {
    let temp = TempDir::new().unwrap();
    let metadata = PyramidMetadata::new(GeoExtent::world(), 8, 3, PixelType::U8).unwrap();

    let small = LocalTileStore::new(temp.path()).with_block_size(100);
    import_constant_tiles(&small, &metadata, byte_value);
    driver(small, CoveragePolicy::Complete)
        .build(metadata.clone())
        .unwrap();
    let many = LocalTileStore::new(temp.path()).partition_files(2).unwrap().len();
    assert!(many > 1);

    let large = LocalTileStore::new(temp.path());
    let driver = driver(large, CoveragePolicy::Complete);
    driver.build(metadata).unwrap();
    assert_eq!(driver.store().partition_files(2).unwrap().len(), 1);
    assert_eq!(driver.store().read_level(2).unwrap().len(), 8);
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn test_failed_build_writes_no_metadata() {
    let temp = TempDir::new().unwrap();
    let store = LocalTileStore::new(temp.path());
    let metadata = PyramidMetadata::new(GeoExtent::world(), 4, 2, PixelType::U8).unwrap();

    // One finest tile has the wrong side length
    let tiles = (0..4u64)
        .flat_map(|col| (0..2u64).map(move |row| (col, row)))
        .map(|(col, row)| {
            let size = if (col, row) == (2, 1) { 2 } else { 4 };
            (
                encode_tile_id(col, row, 2).unwrap(),
                RasterPayload::filled(PixelType::U8, size, 1.0),
            )
        })
        .collect();
    store.import_level(2, tiles).unwrap();

    let driver = driver(store, CoveragePolicy::Complete);
    let err = driver.build(metadata.clone()).unwrap_err();
    assert!(matches!(
        err,
        PyramidError::Consistency(ConsistencyError::SizeMismatch { .. })
    ));
    assert!(!driver.store().metadata_path().exists());
    assert!(driver.store().read_level(1).unwrap().is_empty());

    // Fixing the input and re-running succeeds
    import_constant_tiles(driver.store(), &metadata, |_, _| 1.0);
    driver.build(metadata).unwrap();
    assert!(driver.store().metadata_path().exists());
}

#[test]
fn test_missing_finest_tile_is_a_gap() {
    let temp = TempDir::new().unwrap();
    let store = LocalTileStore::new(temp.path());
    let metadata = PyramidMetadata::new(GeoExtent::world(), 4, 3, PixelType::U16).unwrap();
    let zoom = 3;
    let tiles = (0..8u64)
        .flat_map(|col| (0..4u64).map(move |row| (col, row)))
        .filter(|&(col, row)| (col, row) != (5, 2))
        .map(|(col, row)| {
            (
                encode_tile_id(col, row, zoom).unwrap(),
                RasterPayload::filled(PixelType::U16, 4, 300.0),
            )
        })
        .collect();
    store.import_level(zoom, tiles).unwrap();

    // Zoom 2 tile 2/1 and zoom 1 tile 1/0 both miss the tile. Zoom 1 is
    // partition 0, so its error is the one reported.
    let driver = driver(store, CoveragePolicy::Complete);
    match driver.build(metadata) {
        Err(PyramidError::Consistency(ConsistencyError::Gap {
            target, missing, x, y,
        })) => {
            let addr = decode_tile_id(target).unwrap();
            assert_eq!((addr.col, addr.row, addr.zoom), (1, 0, 1));
            assert_eq!((missing, x, y), (1, 1, 2));
        }
        other => panic!("expected a gap, got {:?}", other),
    }
    assert!(!driver.store().metadata_path().exists());
}

#[test]
fn test_output_tile_without_any_fragment_is_a_gap() {
    let temp = TempDir::new().unwrap();
    let store = LocalTileStore::new(temp.path());
    let metadata = PyramidMetadata::new(GeoExtent::world(), 4, 2, PixelType::U8).unwrap();

    // Only the western hemisphere: zoom 1 tile 1/0 receives nothing
    let tiles = (0..2u64)
        .flat_map(|col| (0..2u64).map(move |row| (col, row)))
        .map(|(col, row)| {
            (
                encode_tile_id(col, row, 2).unwrap(),
                RasterPayload::filled(PixelType::U8, 4, 3.0),
            )
        })
        .collect();
    store.import_level(2, tiles).unwrap();

    let driver = driver(store, CoveragePolicy::Complete);
    match driver.build(metadata.clone()) {
        Err(PyramidError::Consistency(ConsistencyError::Gap {
            target, missing, x, y,
        })) => {
            assert_eq!(target, encode_tile_id(1, 0, 1).unwrap());
            assert_eq!((missing, x, y), (16, 0, 0));
        }
        other => panic!("expected a gap, got {:?}", other),
    }
    assert!(!driver.store().metadata_path().exists());
    assert!(driver.store().read_level(1).unwrap().is_empty());

    // The same input is accepted as a sparse pyramid
    let sparse = PipelineDriver::new(
        LocalEngine::new(2).unwrap(),
        LocalTileStore::new(temp.path()),
        BuildOptions {
            coverage: CoveragePolicy::Sparse,
        },
    );
    let report = sparse.build(metadata).unwrap();
    assert_eq!(report.total_tiles(), 1);
}

// =============================================================================
// No-data
// =============================================================================

#[test]
fn test_sparse_float_pyramid_fills_nan() {
    let temp = TempDir::new().unwrap();
    let store = LocalTileStore::new(temp.path());
    let metadata = PyramidMetadata::new(GeoExtent::world(), 4, 2, PixelType::F64)
        .unwrap()
        .with_nodata(f64::NAN);
    let id = encode_tile_id(3, 1, 2).unwrap();
    store
        .import_level(2, vec![(id, RasterPayload::filled(PixelType::F64, 4, 2.5))])
        .unwrap();

    let driver = driver(store, CoveragePolicy::Sparse);
    driver.build(metadata).unwrap();

    let level = driver.store().read_level(1).unwrap();
    assert_eq!(level.len(), 1);
    assert_eq!(level[0].0, encode_tile_id(1, 0, 1).unwrap());
    let pixels = level[0].1.pixels::<f64>().unwrap();
    assert_eq!(pixels[2 * 4 + 2], 2.5);
    assert_eq!(pixels[3 * 4 + 3], 2.5);
    assert!(pixels[0].is_nan());
    assert_eq!(pixels.iter().filter(|p| p.is_nan()).count(), 12);

    let saved = PyramidMetadata::load(&driver.store().metadata_path()).unwrap();
    assert!(saved.nodata().is_nan());
}
