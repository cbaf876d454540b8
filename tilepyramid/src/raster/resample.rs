//! Box-filter downsampling.
//!
//! Each output pixel is the mean of the source pixels in its footprint,
//! ignoring no-data. The footprint of output pixel `i` on either axis is the
//! source interval `[floor(i * src / dst), floor((i + 1) * src / dst))`,
//! widened to one pixel when it would be empty. Sums are accumulated in `f64`
//! in row-major order, so the result is bit-for-bit reproducible.

use super::{Pixel, RasterData, RasterPayload};
use crate::error::{PyramidError, Result};

/// Downsamples a payload to a `dst_size` × `dst_size` grid covering the same
/// footprint. The pixel kind is preserved.
///
/// A block made only of no-data produces `nodata`. Requesting a larger grid
/// than the source is an error.
pub fn downsample(payload: &RasterPayload, dst_size: u32, nodata: f64) -> Result<RasterPayload> {
    let src_size = payload.size();
    if dst_size == 0 || dst_size > src_size {
        return Err(PyramidError::Metadata(format!(
            "cannot resample a {}px raster to {}px",
            src_size, dst_size
        )));
    }
    if dst_size == src_size {
        return Ok(payload.clone());
    }

    let (src, dst) = (src_size as usize, dst_size as usize);
    let data = match payload.data() {
        RasterData::U8(v) => RasterData::U8(box_average(v, src, dst, nodata)),
        RasterData::I16(v) => RasterData::I16(box_average(v, src, dst, nodata)),
        RasterData::U16(v) => RasterData::U16(box_average(v, src, dst, nodata)),
        RasterData::I32(v) => RasterData::I32(box_average(v, src, dst, nodata)),
        RasterData::F32(v) => RasterData::F32(box_average(v, src, dst, nodata)),
        RasterData::F64(v) => RasterData::F64(box_average(v, src, dst, nodata)),
    };
    RasterPayload::from_data(dst_size, data)
}

#[inline]
fn block(i: usize, src: usize, dst: usize) -> (usize, usize) {
    let start = i * src / dst;
    let end = ((i + 1) * src / dst).max(start + 1);
    (start, end)
}

fn box_average<T: Pixel>(pixels: &[T], src: usize, dst: usize, nodata: f64) -> Vec<T> {
    let mut out = Vec::with_capacity(dst * dst);
    for oy in 0..dst {
        let (y0, y1) = block(oy, src, dst);
        for ox in 0..dst {
            let (x0, x1) = block(ox, src, dst);
            let mut sum = 0.0f64;
            let mut count = 0u32;
            for y in y0..y1 {
                let row = &pixels[y * src..(y + 1) * src];
                for &p in &row[x0..x1] {
                    if !p.is_nodata(nodata) {
                        sum += p.to_f64();
                        count += 1;
                    }
                }
            }
            out.push(if count == 0 {
                T::from_f64(nodata)
            } else {
                T::from_f64(sum / count as f64)
            });
        }
    }
    out
}
