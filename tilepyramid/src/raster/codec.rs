//! Record encoding for raster payloads.
//!
//! ```text
//! ┌─────────┬──────────────┬────────────────────────────────┐
//! │ tag: u8 │ size: u32 LE │ size × size pixels, LE, row-major │
//! └─────────┴──────────────┴────────────────────────────────┘
//! ```
//!
//! Records are zlib-compressed individually when written to a tile file.

use super::{Pixel, PixelType, RasterData, RasterPayload};
use crate::error::{PyramidError, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

const HEADER_LEN: usize = 5;

/// Encodes a payload into its uncompressed record form.
pub fn encode(payload: &RasterPayload) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.byte_len());
    out.push(payload.pixel_type().tag());
    out.extend_from_slice(&payload.size().to_le_bytes());
    match payload.data() {
        RasterData::U8(v) => out.extend_from_slice(v),
        RasterData::I16(v) => write_all(v, &mut out),
        RasterData::U16(v) => write_all(v, &mut out),
        RasterData::I32(v) => write_all(v, &mut out),
        RasterData::F32(v) => write_all(v, &mut out),
        RasterData::F64(v) => write_all(v, &mut out),
    }
    out
}

fn write_all<T: Pixel>(pixels: &[T], out: &mut Vec<u8>) {
    for &p in pixels {
        p.write_le(out);
    }
}

/// Decodes an uncompressed record.
///
/// An unknown tag is an unsupported pixel type; a truncated or oversized
/// body is a metadata error.
pub fn decode(bytes: &[u8]) -> Result<RasterPayload> {
    if bytes.len() < HEADER_LEN {
        return Err(PyramidError::Metadata(format!(
            "raster record too short: {} bytes",
            bytes.len()
        )));
    }
    let pixel_type = PixelType::from_tag(bytes[0])?;
    let mut size_bytes = [0u8; 4];
    size_bytes.copy_from_slice(&bytes[1..HEADER_LEN]);
    let size = u32::from_le_bytes(size_bytes);

    let body = &bytes[HEADER_LEN..];
    let expected = (size as usize)
        .checked_mul(size as usize)
        .and_then(|count| count.checked_mul(pixel_type.bytes_per_pixel()))
        .ok_or_else(|| {
            PyramidError::Metadata(format!("raster record side {} is too large", size))
        })?;
    if body.len() != expected {
        return Err(PyramidError::Metadata(format!(
            "raster record of side {} has {} body bytes, expected {}",
            size,
            body.len(),
            expected
        )));
    }

    let data = match pixel_type {
        PixelType::U8 => RasterData::U8(body.to_vec()),
        PixelType::I16 => RasterData::I16(read_all(body)),
        PixelType::U16 => RasterData::U16(read_all(body)),
        PixelType::I32 => RasterData::I32(read_all(body)),
        PixelType::F32 => RasterData::F32(read_all(body)),
        PixelType::F64 => RasterData::F64(read_all(body)),
    };
    RasterPayload::from_data(size, data)
}

fn read_all<T: Pixel>(body: &[u8]) -> Vec<T> {
    body.chunks_exact(std::mem::size_of::<T>())
        .map(T::read_le)
        .collect()
}

/// Encodes and zlib-compresses a payload at the given level (0-9).
pub fn compress(payload: &RasterPayload, level: u32) -> Result<Vec<u8>> {
    let raw = encode(payload);
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(raw.len() / 2), Compression::new(level));
    encoder.write_all(&raw)?;
    Ok(encoder.finish()?)
}

/// Inflates and decodes a compressed record.
pub fn decompress(bytes: &[u8]) -> Result<RasterPayload> {
    let mut raw = Vec::new();
    ZlibDecoder::new(bytes).read_to_end(&mut raw)?;
    decode(&raw)
}
