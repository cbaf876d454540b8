//! Integration tests for the on-disk layout of a built pyramid.
//!
//! These tests go through the public storage API and raw file bytes to check
//! that output written by the pipeline can be read back without the pipeline.

use std::fs;
use tempfile::TempDir;
use tilepyramid::engine::LocalEngine;
use tilepyramid::error::PyramidError;
use tilepyramid::metadata::PyramidMetadata;
use tilepyramid::pipeline::{BuildOptions, PipelineDriver};
use tilepyramid::raster::{PixelType, RasterPayload};
use tilepyramid::storage::tile_file::{index_path, DATA_MAGIC, FORMAT_VERSION, INDEX_MAGIC};
use tilepyramid::storage::{LocalTileStore, SortedAppendSink, TileFileReader, TileStore};
use tilepyramid::tile::{encode_tile_id, GeoExtent, TileId};

fn built_store(temp: &TempDir) -> (LocalTileStore, PyramidMetadata) {
    let store = LocalTileStore::new(temp.path()).with_compression(9);
    let metadata = PyramidMetadata::new(GeoExtent::world(), 4, 3, PixelType::I32)
        .unwrap()
        .with_nodata(-1.0);
    let tiles = (0..8u64)
        .flat_map(|col| (0..4u64).map(move |row| (col, row)))
        .map(|(col, row)| {
            let value = (col * 10 + row) as f64;
            (
                encode_tile_id(col, row, 3).unwrap(),
                RasterPayload::filled(PixelType::I32, 4, value),
            )
        })
        .collect();
    store.import_level(3, tiles).unwrap();

    let driver = PipelineDriver::new(LocalEngine::new(2).unwrap(), store, BuildOptions::default());
    driver.build(metadata.clone()).unwrap();
    let store = LocalTileStore::new(temp.path());
    (store, metadata)
}

/// Appends through the trait only, the way the pipeline does.
fn write_through<S: TileStore>(store: &S, zoom: u8, keys: &[u64]) -> tilepyramid::Result<()> {
    let mut sink = store.open_sink(zoom, 0)?;
    for &key in keys {
        let payload = RasterPayload::filled(PixelType::U8, 2, key as f64);
        if let Err(e) = sink.append(TileId(key), &payload) {
            sink.abort()?;
            return Err(e);
        }
    }
    sink.close().map(|_| ())
}

#[test]
fn test_output_files_start_with_headers() {
    let temp = TempDir::new().unwrap();
    let (store, _) = built_store(&temp);

    for zoom in 1..3 {
        let files = store.partition_files(zoom).unwrap();
        assert!(!files.is_empty());
        for path in files {
            let data = fs::read(&path).unwrap();
            assert_eq!(&data[..4], DATA_MAGIC);
            assert_eq!(data[4], FORMAT_VERSION);

            let index = fs::read(index_path(&path)).unwrap();
            assert_eq!(&index[..4], INDEX_MAGIC);
            assert_eq!(index[4], FORMAT_VERSION);
            assert_eq!((index.len() - 5) % 16, 0);
        }
    }
}

#[test]
fn test_no_staging_files_remain_after_build() {
    let temp = TempDir::new().unwrap();
    let (store, _) = built_store(&temp);

    for zoom in 1..=3 {
        for entry in fs::read_dir(store.level_dir(zoom)).unwrap() {
            let name = entry.unwrap().file_name();
            assert!(!name.to_string_lossy().ends_with(".tmp"), "{:?}", name);
        }
    }
}

#[test]
fn test_reader_random_access_matches_iteration() {
    let temp = TempDir::new().unwrap();
    let (store, _) = built_store(&temp);

    let path = store.partition_path(2, 1);
    let reader = TileFileReader::open(&path).unwrap();
    assert_eq!(reader.len(), 8);

    let keys: Vec<TileId> = reader.keys().collect();
    assert!(keys.windows(2).all(|w| w[0] < w[1]));
    for record in reader.iter() {
        let (id, payload) = record.unwrap();
        assert_eq!(reader.get(id).unwrap(), Some(payload));
    }
    assert_eq!(reader.get(TileId(0)).unwrap(), None);
}

#[test]
fn test_coarse_values_are_block_means() {
    let temp = TempDir::new().unwrap();
    let (store, _) = built_store(&temp);

    // Zoom 2 tile 1/0 covers finest columns 2-3 and rows 0-1
    let id = encode_tile_id(1, 0, 2).unwrap();
    let level = store.read_level(2).unwrap();
    let (_, payload) = level.iter().find(|(key, _)| *key == id).unwrap();
    assert_eq!(payload.pixel_type(), PixelType::I32);
    assert_eq!(payload.get_f64(0, 0), 20.0);
    assert_eq!(payload.get_f64(3, 0), 30.0);
    assert_eq!(payload.get_f64(0, 3), 21.0);
    assert_eq!(payload.get_f64(3, 3), 31.0);
}

#[test]
fn test_metadata_reloads_with_levels() {
    let temp = TempDir::new().unwrap();
    let (store, metadata) = built_store(&temp);

    let saved = PyramidMetadata::load(&store.metadata_path()).unwrap();
    assert_eq!(saved, metadata);
    assert_eq!(saved.nodata(), -1.0);
    assert_eq!(saved.levels().len(), 3);
    assert_eq!(saved.level(1).unwrap().tile_bounds.count(), 2);
}

#[test]
fn test_out_of_order_append_is_rejected() {
    let temp = TempDir::new().unwrap();
    let store = LocalTileStore::new(temp.path());

    match write_through(&store, 1, &[1, 2, 2]) {
        Err(PyramidError::OrderingViolation { previous, key, .. }) => {
            assert_eq!(previous, TileId(2));
            assert_eq!(key, TileId(2));
        }
        other => panic!("expected an ordering violation, got {:?}", other),
    }
    assert!(!store.partition_path(1, 0).exists());
    assert!(store.read_level(1).unwrap().is_empty());

    write_through(&store, 1, &[1, 2, 5]).unwrap();
    let keys: Vec<TileId> = store.read_level(1).unwrap().into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec![TileId(1), TileId(2), TileId(5)]);
}

#[test]
fn test_corrupt_index_is_invalid_data() {
    let temp = TempDir::new().unwrap();
    let store = LocalTileStore::new(temp.path());
    write_through(&store, 1, &[1, 2]).unwrap();

    let index = index_path(&store.partition_path(1, 0));
    let mut bytes = fs::read(&index).unwrap();
    bytes.truncate(bytes.len() - 3);
    fs::write(&index, bytes).unwrap();

    match store.read_level(1) {
        Err(PyramidError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::InvalidData),
        other => panic!("expected invalid data, got {:?}", other),
    }
}
