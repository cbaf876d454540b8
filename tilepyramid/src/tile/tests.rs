//! Tests for tile math

use super::*;

#[test]
fn test_zoom_one_grid() {
    assert_eq!(tiles_wide(1), 2);
    assert_eq!(tiles_high(1), 1);
    assert_eq!(tiles_wide(3), 8);
    assert_eq!(tiles_high(3), 4);
}

#[test]
fn test_resolution_halves_per_zoom() {
    let z1 = resolution(1, 256);
    let z2 = resolution(2, 256);
    assert!((z1 - 180.0 / 256.0).abs() < 1e-12);
    assert!((z1 / z2 - 2.0).abs() < 1e-12);
}

#[test]
fn test_encode_first_ids() {
    assert_eq!(encode_tile_id(0, 0, 1).unwrap(), TileId(0));
    assert_eq!(encode_tile_id(1, 0, 1).unwrap(), TileId(1));
    // Zoom 2 starts after the two zoom 1 tiles
    assert_eq!(encode_tile_id(0, 0, 2).unwrap(), TileId(2));
    assert_eq!(encode_tile_id(3, 1, 2).unwrap(), TileId(9));
    assert_eq!(encode_tile_id(0, 0, 3).unwrap(), TileId(10));
}

#[test]
fn test_encode_decode_roundtrip() {
    for zoom in [1u8, 2, 3, 7, 12] {
        let wide = tiles_wide(zoom);
        let high = tiles_high(zoom);
        let samples = [
            (0, 0),
            (wide - 1, 0),
            (0, high - 1),
            (wide - 1, high - 1),
            (wide / 2, high / 2),
        ];
        for (col, row) in samples {
            let id = encode_tile_id(col, row, zoom).unwrap();
            let addr = decode_tile_id(id).unwrap();
            assert_eq!(addr, TileAddress::new(col, row, zoom), "zoom {}", zoom);
        }
    }
}

#[test]
fn test_roundtrip_at_max_zoom() {
    let col = tiles_wide(MAX_ZOOM) - 1;
    let row = tiles_high(MAX_ZOOM) - 1;
    let id = encode_tile_id(col, row, MAX_ZOOM).unwrap();
    assert_eq!(
        decode_tile_id(id).unwrap(),
        TileAddress::new(col, row, MAX_ZOOM)
    );
    assert!(decode_tile_id(TileId(id.0 + 1)).is_err());
}

#[test]
fn test_ids_follow_scan_order_within_zoom() {
    let zoom = 4;
    let mut previous = None;
    for row in 0..tiles_high(zoom) {
        for col in 0..tiles_wide(zoom) {
            let id = encode_tile_id(col, row, zoom).unwrap();
            if let Some(prev) = previous {
                assert!(id > prev, "id {} should follow {}", id, prev);
            }
            previous = Some(id);
        }
    }
}

#[test]
fn test_ids_of_coarser_zoom_sort_first() {
    let last_z2 = encode_tile_id(3, 1, 2).unwrap();
    let first_z3 = encode_tile_id(0, 0, 3).unwrap();
    assert!(last_z2 < first_z3);
}

#[test]
fn test_encode_rejects_outside_grid() {
    assert!(matches!(
        encode_tile_id(2, 0, 1),
        Err(TileMathError::OutsideGrid { .. })
    ));
    assert!(matches!(
        encode_tile_id(0, 1, 1),
        Err(TileMathError::OutsideGrid { .. })
    ));
    assert!(matches!(
        encode_tile_id(0, 0, 0),
        Err(TileMathError::InvalidZoom(0))
    ));
    assert!(matches!(
        encode_tile_id(0, 0, 31),
        Err(TileMathError::InvalidZoom(31))
    ));
}

#[test]
fn test_tile_to_extent_zoom_one() {
    let west = tile_to_extent(TileId(0), 1, 256).unwrap();
    assert_eq!(west, GeoExtent::new(-180.0, -90.0, 0.0, 90.0));

    let east = tile_to_extent(TileId(1), 1, 256).unwrap();
    assert_eq!(east, GeoExtent::new(0.0, -90.0, 180.0, 90.0));
}

#[test]
fn test_tile_to_extent_rejects_wrong_zoom() {
    let id = encode_tile_id(1, 1, 3).unwrap();
    let result = tile_to_extent(id, 2, 256);
    assert!(matches!(
        result,
        Err(TileMathError::ZoomMismatch {
            expected: 2,
            actual: 3,
            ..
        })
    ));
}

#[test]
fn test_extent_roundtrip_returns_same_tile() {
    for tile_size in [4u32, 256, 512] {
        for zoom in [1u8, 2, 5, 10, 18] {
            let wide = tiles_wide(zoom);
            let high = tiles_high(zoom);
            for (col, row) in [(0, 0), (wide - 1, high - 1), (wide / 3, high / 3)] {
                let id = encode_tile_id(col, row, zoom).unwrap();
                let extent = tile_to_extent(id, zoom, tile_size).unwrap();
                let range = extent_to_tile_range(&extent, zoom, tile_size).unwrap();
                assert!(range.contains(col, row));
                assert_eq!(
                    range.count(),
                    1,
                    "tile {}/{}/{} size {} should map back to itself only",
                    zoom,
                    col,
                    row,
                    tile_size
                );
            }
        }
    }
}

#[test]
fn test_extent_to_pixel_range_whole_world() {
    let rect = extent_to_pixel_range(&GeoExtent::world(), 2, 4).unwrap();
    assert_eq!(
        rect,
        PixelRect {
            x: 0,
            y: 0,
            width: 16,
            height: 8
        }
    );
}

#[test]
fn test_extent_to_pixel_range_partial_pixels() {
    // 45° per pixel at zoom 1 with 4 pixel tiles
    let extent = GeoExtent::new(-170.0, 10.0, -100.0, 50.0);
    let rect = extent_to_pixel_range(&extent, 1, 4).unwrap();
    assert_eq!(rect.x, 0);
    assert_eq!(rect.y, 0);
    assert_eq!(rect.width, 2);
    assert_eq!(rect.height, 2);
}

#[test]
fn test_extent_to_tile_range_spans_tiles() {
    let extent = GeoExtent::new(-100.0, -10.0, 10.0, 40.0);
    let bounds = extent_to_tile_range(&extent, 2, 256).unwrap();
    assert_eq!(
        bounds,
        TileBounds {
            min_col: 0,
            min_row: 0,
            max_col: 2,
            max_row: 1
        }
    );
    assert_eq!(bounds.count(), 6);
}

#[test]
fn test_extent_rejects_malformed() {
    let inverted = GeoExtent::new(10.0, 0.0, -10.0, 5.0);
    assert!(matches!(
        extent_to_tile_range(&inverted, 3, 256),
        Err(TileMathError::InvalidExtent(_))
    ));

    let outside = GeoExtent::new(-190.0, 0.0, 10.0, 5.0);
    assert!(extent_to_pixel_range(&outside, 3, 256).is_err());
}

#[test]
fn test_lat_lon_to_tile_address() {
    let addr = lat_lon_to_tile_address(51.5074, -0.1278, 3, 256).unwrap();
    // 45° tiles: lon -0.13 is column 3, lat 51.5 is row 0
    assert_eq!(addr, TileAddress::new(3, 0, 3));
}

#[test]
fn test_lat_lon_invalid_inputs() {
    assert!(matches!(
        lat_lon_to_tile_address(90.5, 0.0, 3, 256),
        Err(TileMathError::InvalidLatitude(_))
    ));
    assert!(matches!(
        lat_lon_to_tile_address(0.0, -180.5, 3, 256),
        Err(TileMathError::InvalidLongitude(_))
    ));
    assert!(matches!(
        lat_lon_to_pixel_upper_left(0.0, 0.0, 3, 0),
        Err(TileMathError::InvalidTileSize(0))
    ));
}

#[test]
fn test_boundary_point_belongs_to_east_and_south_tile() {
    // lon -90 and lat 0 are tile boundaries at zoom 2 (90° tiles).
    // The half-open rule assigns the point to the tile whose min edge it is.
    let addr = lat_lon_to_tile_address(0.0, -90.0, 2, 4).unwrap();
    assert_eq!(addr, TileAddress::new(1, 1, 2));
}

#[test]
fn test_finest_corner_on_coarse_boundary_is_unambiguous() {
    // Zoom 3 tile 2/1 has its upper-left corner at (lat 45, lon -90).
    // At zoom 2 that corner lies on the boundary between columns 0 and 1
    // and must resolve to column 1, row 0.
    let finest = encode_tile_id(2, 1, 3).unwrap();
    let extent = tile_to_extent(finest, 3, 4).unwrap();
    let (lat, lon) = extent.upper_left();
    assert_eq!((lat, lon), (45.0, -90.0));

    let coarse = lat_lon_to_tile_address(lat, lon, 2, 4).unwrap();
    assert_eq!(coarse, TileAddress::new(1, 0, 2));

    // Repeated evaluation yields the same answer
    for _ in 0..10 {
        assert_eq!(lat_lon_to_tile_address(lat, lon, 2, 4).unwrap(), coarse);
    }
}

#[test]
fn test_world_edges_clamp_into_last_tile() {
    let addr = lat_lon_to_tile_address(-90.0, 180.0, 2, 4).unwrap();
    assert_eq!(addr, TileAddress::new(3, 1, 2));
}

#[test]
fn test_pixel_upper_left_of_tile_corner() {
    let zoom = 5;
    let tile_size = 256;
    let id = encode_tile_id(17, 9, zoom).unwrap();
    let extent = tile_to_extent(id, zoom, tile_size).unwrap();
    let (lat, lon) = extent.upper_left();
    let pixel = lat_lon_to_pixel_upper_left(lat, lon, zoom, tile_size).unwrap();
    assert_eq!(pixel, PixelCoord { x: 17 * 256, y: 9 * 256 });
}

#[test]
fn test_fragment_size_at_zoom() {
    assert_eq!(fragment_size_at_zoom(4, 2, 1), 2);
    assert_eq!(fragment_size_at_zoom(256, 10, 9), 128);
    assert_eq!(fragment_size_at_zoom(256, 10, 2), 1);
    assert_eq!(fragment_size_at_zoom(256, 10, 1), 1);
    assert_eq!(fragment_size_at_zoom(256, 10, 10), 256);
}

#[test]
fn test_fragment_size_non_increasing_and_floored() {
    for tile_size in [1u32, 3, 4, 256, 512, 1000] {
        let max_zoom = MAX_ZOOM;
        let mut previous = u32::MAX;
        for zoom in (MIN_ZOOM..=max_zoom).rev() {
            let size = fragment_size_at_zoom(tile_size, max_zoom, zoom);
            assert!(size >= 1);
            assert!(size <= previous);
            previous = size;
        }
    }
}
