//! Raster payloads: square pixel grids of one numeric kind.
//!
//! A [`RasterPayload`] stores its pixels in a closed [`RasterData`] variant,
//! one `Vec` per supported kind. Code that reads, writes or resamples pixels
//! matches on the variant and hands the typed slice to a generic routine
//! bounded by [`Pixel`], so a kind mismatch is caught by the match rather
//! than by runtime type tests.

pub mod codec;
mod resample;

pub use resample::downsample;

use crate::error::{ConsistencyError, PyramidError, Result};
use std::fmt;
use std::str::FromStr;

/// Supported pixel kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelType {
    U8,
    I16,
    U16,
    I32,
    F32,
    F64,
}

impl PixelType {
    /// All supported kinds, in tag order.
    pub const ALL: [PixelType; 6] = [
        PixelType::U8,
        PixelType::I16,
        PixelType::U16,
        PixelType::I32,
        PixelType::F32,
        PixelType::F64,
    ];

    /// Canonical name used in metadata descriptors.
    pub fn name(self) -> &'static str {
        match self {
            PixelType::U8 => "byte",
            PixelType::I16 => "short",
            PixelType::U16 => "ushort",
            PixelType::I32 => "int",
            PixelType::F32 => "float",
            PixelType::F64 => "double",
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelType::U8 => 1,
            PixelType::I16 | PixelType::U16 => 2,
            PixelType::I32 | PixelType::F32 => 4,
            PixelType::F64 => 8,
        }
    }

    /// Tag byte used in the record encoding.
    pub fn tag(self) -> u8 {
        match self {
            PixelType::U8 => 1,
            PixelType::I16 => 2,
            PixelType::U16 => 3,
            PixelType::I32 => 4,
            PixelType::F32 => 5,
            PixelType::F64 => 6,
        }
    }

    /// True if pixels of this kind can hold `value` exactly. NaN fits only
    /// the float kinds.
    pub fn can_represent(self, value: f64) -> bool {
        fn exact<T: Pixel>(value: f64) -> bool {
            T::from_f64(value).to_f64() == value
        }
        match self {
            PixelType::F32 | PixelType::F64 if value.is_nan() => true,
            PixelType::U8 => exact::<u8>(value),
            PixelType::I16 => exact::<i16>(value),
            PixelType::U16 => exact::<u16>(value),
            PixelType::I32 => exact::<i32>(value),
            PixelType::F32 => exact::<f32>(value),
            PixelType::F64 => exact::<f64>(value),
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self> {
        PixelType::ALL
            .into_iter()
            .find(|t| t.tag() == tag)
            .ok_or_else(|| PyramidError::UnsupportedPixelType(format!("tag {}", tag)))
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PixelType {
    type Err = PyramidError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        PixelType::ALL
            .into_iter()
            .find(|t| t.name() == lower)
            .ok_or_else(|| PyramidError::UnsupportedPixelType(s.to_string()))
    }
}

/// Numeric pixel kinds that can be stored in a [`RasterPayload`].
pub trait Pixel: Copy + PartialEq + Send + Sync + 'static {
    const TYPE: PixelType;

    fn to_f64(self) -> f64;

    /// Converts back from `f64`. Integer kinds round half away from zero and
    /// saturate at their range.
    fn from_f64(value: f64) -> Self;

    fn write_le(self, out: &mut Vec<u8>);

    /// Reads one pixel from exactly `size_of::<Self>()` bytes.
    fn read_le(bytes: &[u8]) -> Self;

    fn wrap(values: Vec<Self>) -> RasterData;

    fn view(data: &RasterData) -> Option<&[Self]>;

    fn view_mut(data: &mut RasterData) -> Option<&mut [Self]>;

    /// True for the no-data sentinel and for NaN.
    #[inline]
    fn is_nodata(self, nodata: f64) -> bool {
        let v = self.to_f64();
        v.is_nan() || v == nodata
    }
}

macro_rules! impl_pixel {
    ($t:ty, $variant:ident, $round:expr) => {
        impl Pixel for $t {
            const TYPE: PixelType = PixelType::$variant;

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn from_f64(value: f64) -> Self {
                let round: fn(f64) -> f64 = $round;
                round(value) as $t
            }

            #[inline]
            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            #[inline]
            fn read_le(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(bytes);
                <$t>::from_le_bytes(buf)
            }

            fn wrap(values: Vec<Self>) -> RasterData {
                RasterData::$variant(values)
            }

            fn view(data: &RasterData) -> Option<&[Self]> {
                match data {
                    RasterData::$variant(values) => Some(values),
                    _ => None,
                }
            }

            fn view_mut(data: &mut RasterData) -> Option<&mut [Self]> {
                match data {
                    RasterData::$variant(values) => Some(values),
                    _ => None,
                }
            }
        }
    };
}

impl_pixel!(u8, U8, f64::round);
impl_pixel!(i16, I16, f64::round);
impl_pixel!(u16, U16, f64::round);
impl_pixel!(i32, I32, f64::round);
impl_pixel!(f32, F32, |v| v);
impl_pixel!(f64, F64, |v| v);

/// Pixel storage, one variant per supported kind.
#[derive(Debug, Clone, PartialEq)]
pub enum RasterData {
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl RasterData {
    pub fn pixel_type(&self) -> PixelType {
        match self {
            RasterData::U8(_) => PixelType::U8,
            RasterData::I16(_) => PixelType::I16,
            RasterData::U16(_) => PixelType::U16,
            RasterData::I32(_) => PixelType::I32,
            RasterData::F32(_) => PixelType::F32,
            RasterData::F64(_) => PixelType::F64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RasterData::U8(v) => v.len(),
            RasterData::I16(v) => v.len(),
            RasterData::U16(v) => v.len(),
            RasterData::I32(v) => v.len(),
            RasterData::F32(v) => v.len(),
            RasterData::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn filled(pixel_type: PixelType, len: usize, value: f64) -> Self {
        match pixel_type {
            PixelType::U8 => RasterData::U8(vec![u8::from_f64(value); len]),
            PixelType::I16 => RasterData::I16(vec![i16::from_f64(value); len]),
            PixelType::U16 => RasterData::U16(vec![u16::from_f64(value); len]),
            PixelType::I32 => RasterData::I32(vec![i32::from_f64(value); len]),
            PixelType::F32 => RasterData::F32(vec![f32::from_f64(value); len]),
            PixelType::F64 => RasterData::F64(vec![value; len]),
        }
    }
}

/// A square grid of pixels, `size` × `size`, stored row-major from the
/// north-west corner.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterPayload {
    size: u32,
    data: RasterData,
}

impl RasterPayload {
    /// Builds a payload from typed pixels.
    ///
    /// Fails with `PixelCount` if `values` does not hold `size * size`
    /// pixels.
    pub fn from_pixels<T: Pixel>(size: u32, values: Vec<T>) -> Result<Self> {
        Self::from_data(size, T::wrap(values))
    }

    pub fn from_data(size: u32, data: RasterData) -> Result<Self> {
        let expected = size as usize * size as usize;
        if size == 0 || data.len() != expected {
            return Err(ConsistencyError::PixelCount {
                size,
                expected,
                actual: data.len(),
            }
            .into());
        }
        Ok(Self { size, data })
    }

    /// A payload with every pixel set to `value`.
    pub fn filled(pixel_type: PixelType, size: u32, value: f64) -> Self {
        let len = size as usize * size as usize;
        Self {
            size,
            data: RasterData::filled(pixel_type, len, value),
        }
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    #[inline]
    pub fn pixel_type(&self) -> PixelType {
        self.data.pixel_type()
    }

    pub fn data(&self) -> &RasterData {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut RasterData {
        &mut self.data
    }

    pub fn into_data(self) -> RasterData {
        self.data
    }

    /// Typed view of the pixels, if the payload holds kind `T`.
    pub fn pixels<T: Pixel>(&self) -> Option<&[T]> {
        T::view(&self.data)
    }

    /// Pixel value widened to `f64`. Panics if `(x, y)` is outside the grid.
    pub fn get_f64(&self, x: u32, y: u32) -> f64 {
        assert!(x < self.size && y < self.size, "pixel ({}, {}) out of range", x, y);
        let i = y as usize * self.size as usize + x as usize;
        match &self.data {
            RasterData::U8(v) => v[i].to_f64(),
            RasterData::I16(v) => v[i].to_f64(),
            RasterData::U16(v) => v[i].to_f64(),
            RasterData::I32(v) => v[i].to_f64(),
            RasterData::F32(v) => v[i].to_f64(),
            RasterData::F64(v) => v[i],
        }
    }

    /// Serialized size estimate in bytes, before compression.
    pub fn byte_len(&self) -> usize {
        self.data.len() * self.pixel_type().bytes_per_pixel()
    }
}
