//! Pixel layouts and raw pixel access.
//!
//! A [`PixelFormat`] describes where each colour channel lives inside one
//! packed pixel value. Masks for the derived formats match the video
//! library's own surfaces for the same depth and host byte order, so buffers
//! can be exchanged with it directly.

use serde::{Deserialize, Serialize};

use crate::{MediaBindError, Result};

/// Byte order used to store multi-byte pixel values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// Byte order of the host the crate was compiled for.
    pub const NATIVE: ByteOrder = if cfg!(target_endian = "big") {
        ByteOrder::Big
    } else {
        ByteOrder::Little
    };
}

/// Placement of one colour channel inside a pixel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Channel {
    pub mask: u32,
    pub shift: u8,
    /// Number of low bits dropped when an 8-bit value is packed.
    pub loss: u8,
}

impl Channel {
    const ABSENT: Channel = Channel {
        mask: 0,
        shift: 0,
        loss: 8,
    };

    fn from_mask(mask: u32) -> Result<Self> {
        if mask == 0 {
            return Ok(Self::ABSENT);
        }

        let shift = mask.trailing_zeros();
        let bits = mask >> shift;
        let width = bits.count_ones();
        if width > 8 {
            return Err(MediaBindError::InvalidMasks(format!(
                "channel mask {mask:#010x} is wider than 8 bits"
            )));
        }
        if bits & (bits + 1) != 0 {
            return Err(MediaBindError::InvalidMasks(format!(
                "channel mask {mask:#010x} is not contiguous"
            )));
        }

        Ok(Self {
            mask,
            shift: shift as u8,
            loss: (8 - width) as u8,
        })
    }

    pub fn width(&self) -> u32 {
        self.mask.count_ones()
    }

    fn pack(&self, value: u8) -> u32 {
        ((u32::from(value) >> self.loss) << self.shift) & self.mask
    }

    fn unpack(&self, pixel: u32) -> u8 {
        expand_bits((pixel & self.mask) >> self.shift, self.width())
    }
}

/// Widens an `width`-bit channel value to 8 bits by repeating its bit
/// pattern downwards, so that all-ones maps to 0xff and zero to zero.
fn expand_bits(value: u32, width: u32) -> u8 {
    if width == 0 {
        return 0;
    }
    if width >= 8 {
        return (value >> (width - 8)) as u8;
    }

    let mut out = 0u32;
    let mut shift = 8 - width as i32;
    while shift > -(width as i32) {
        out |= if shift >= 0 {
            value << shift
        } else {
            value >> -shift
        };
        shift -= width as i32;
    }
    (out & 0xff) as u8
}

/// Channel layout of packed pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PixelFormat {
    bits_per_pixel: u8,
    bytes_per_pixel: u8,
    byte_order: ByteOrder,
    red: Channel,
    green: Channel,
    blue: Channel,
    alpha: Channel,
}

impl PixelFormat {
    /// Derives the layout for `depth` on the host byte order.
    pub fn derive(depth: u32) -> Result<Self> {
        Self::derive_for(depth, ByteOrder::NATIVE)
    }

    /// Derives the layout for `depth` as stored on a host with `order`.
    ///
    /// 32- and 24-bit layouts place red in the lowest addressed byte, which
    /// reverses the channel masks between byte orders. 16-bit (5-6-5) and
    /// 15-bit (5-5-5, reserved top bit) layouts are defined on the native
    /// 16-bit word and do not change.
    pub fn derive_for(depth: u32, order: ByteOrder) -> Result<Self> {
        let (r, g, b, a) = match (depth, order) {
            (32, ByteOrder::Little) => (0x0000_00ff, 0x0000_ff00, 0x00ff_0000, 0xff00_0000),
            (32, ByteOrder::Big) => (0xff00_0000, 0x00ff_0000, 0x0000_ff00, 0x0000_00ff),
            (24, ByteOrder::Little) => (0x0000_00ff, 0x0000_ff00, 0x00ff_0000, 0),
            (24, ByteOrder::Big) => (0x00ff_0000, 0x0000_ff00, 0x0000_00ff, 0),
            (16, _) => (0xf800, 0x07e0, 0x001f, 0),
            (15, _) => (0x7c00, 0x03e0, 0x001f, 0x8000),
            _ => return Err(MediaBindError::UnsupportedDepth(depth)),
        };

        let format = Self::from_masks(depth, [r, g, b, a], order)?;
        tracing::debug!(depth, ?order, masks = ?format.masks(), "derived pixel format");
        Ok(format)
    }

    /// Builds a format from masks supplied by the video layer, e.g. for a
    /// surface it created. Depth 8 with all-zero masks describes a paletted
    /// surface whose pixel values are palette indices.
    pub fn from_masks(bits_per_pixel: u32, masks: [u32; 4], order: ByteOrder) -> Result<Self> {
        if !(1..=32).contains(&bits_per_pixel) {
            return Err(MediaBindError::UnsupportedDepth(bits_per_pixel));
        }

        let mut seen = 0u32;
        for mask in masks {
            if seen & mask != 0 {
                return Err(MediaBindError::InvalidMasks(format!(
                    "mask {mask:#010x} overlaps another channel"
                )));
            }
            seen |= mask;
        }
        let bytes_per_pixel = bits_per_pixel.div_ceil(8);
        if bytes_per_pixel < 4 && seen >> (bytes_per_pixel * 8) != 0 {
            return Err(MediaBindError::InvalidMasks(format!(
                "masks {seen:#010x} do not fit in {bytes_per_pixel} bytes"
            )));
        }

        let [r, g, b, a] = masks;
        let format = Self {
            bits_per_pixel: bits_per_pixel as u8,
            bytes_per_pixel: bytes_per_pixel as u8,
            byte_order: order,
            red: Channel::from_mask(r)?,
            green: Channel::from_mask(g)?,
            blue: Channel::from_mask(b)?,
            alpha: Channel::from_mask(a)?,
        };

        if format.bytes_per_pixel == 3 {
            for channel in format.channels() {
                if channel.mask != 0 && (channel.shift % 8 != 0 || channel.width() != 8) {
                    return Err(MediaBindError::InvalidMasks(format!(
                        "3-byte pixels need byte-aligned 8-bit channels, got {:#010x}",
                        channel.mask
                    )));
                }
            }
        }

        Ok(format)
    }

    pub fn bits_per_pixel(&self) -> u8 {
        self.bits_per_pixel
    }

    pub fn bytes_per_pixel(&self) -> u8 {
        self.bytes_per_pixel
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn red(&self) -> Channel {
        self.red
    }

    pub fn green(&self) -> Channel {
        self.green
    }

    pub fn blue(&self) -> Channel {
        self.blue
    }

    pub fn alpha(&self) -> Channel {
        self.alpha
    }

    /// Red, green, blue and alpha masks in that order.
    pub fn masks(&self) -> [u32; 4] {
        [
            self.red.mask,
            self.green.mask,
            self.blue.mask,
            self.alpha.mask,
        ]
    }

    pub fn has_alpha(&self) -> bool {
        self.alpha.mask != 0
    }

    fn channels(&self) -> [Channel; 4] {
        [self.red, self.green, self.blue, self.alpha]
    }

    /// Packs a colour, leaving any alpha bits clear.
    pub fn map_rgb(&self, r: u8, g: u8, b: u8) -> u32 {
        self.red.pack(r) | self.green.pack(g) | self.blue.pack(b)
    }

    pub fn map_rgba(&self, r: u8, g: u8, b: u8, a: u8) -> u32 {
        self.map_rgb(r, g, b) | self.alpha.pack(a)
    }

    pub fn unmap_rgb(&self, pixel: u32) -> (u8, u8, u8) {
        (
            self.red.unpack(pixel),
            self.green.unpack(pixel),
            self.blue.unpack(pixel),
        )
    }

    /// Inverse of [`PixelFormat::map_rgba`]. Formats without an alpha
    /// channel report fully opaque pixels.
    pub fn unmap_rgba(&self, pixel: u32) -> (u8, u8, u8, u8) {
        let (r, g, b) = self.unmap_rgb(pixel);
        let a = if self.has_alpha() {
            self.alpha.unpack(pixel)
        } else {
            u8::MAX
        };
        (r, g, b, a)
    }

    /// Position of the byte holding bits `shift..shift + 8` of a 3-byte
    /// pixel.
    fn byte_index_24(&self, shift: u8) -> usize {
        let lane = usize::from(shift / 8);
        match self.byte_order {
            ByteOrder::Little => lane,
            ByteOrder::Big => 2 - lane,
        }
    }
}

fn pixel_offset(pitch: usize, format: &PixelFormat, x: u32, y: u32) -> usize {
    y as usize * pitch + x as usize * usize::from(format.bytes_per_pixel)
}

/// Reads the packed pixel at `(x, y)` of a raw pixel buffer.
///
/// # Panics
///
/// Panics if the pixel lies outside `pixels`.
pub fn read_pixel(pixels: &[u8], pitch: usize, format: &PixelFormat, x: u32, y: u32) -> u32 {
    let offset = pixel_offset(pitch, format, x, y);
    let bytes = &pixels[offset..offset + usize::from(format.bytes_per_pixel)];

    match (format.bytes_per_pixel, format.byte_order) {
        (1, _) => u32::from(bytes[0]),
        (2, ByteOrder::Little) => u32::from(u16::from_le_bytes([bytes[0], bytes[1]])),
        (2, ByteOrder::Big) => u32::from(u16::from_be_bytes([bytes[0], bytes[1]])),
        (3, _) => format
            .channels()
            .iter()
            .filter(|channel| channel.mask != 0)
            .fold(0, |pixel, channel| {
                pixel | u32::from(bytes[format.byte_index_24(channel.shift)]) << channel.shift
            }),
        (_, ByteOrder::Little) => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        (_, ByteOrder::Big) => u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
    }
}

/// Stores `value` as the packed pixel at `(x, y)` of a raw pixel buffer.
///
/// # Panics
///
/// Panics if the pixel lies outside `pixels`.
pub fn write_pixel(pixels: &mut [u8], pitch: usize, format: &PixelFormat, x: u32, y: u32, value: u32) {
    let offset = pixel_offset(pitch, format, x, y);
    let bytes = &mut pixels[offset..offset + usize::from(format.bytes_per_pixel)];

    match (format.bytes_per_pixel, format.byte_order) {
        (1, _) => bytes[0] = value as u8,
        (2, ByteOrder::Little) => bytes.copy_from_slice(&(value as u16).to_le_bytes()),
        (2, ByteOrder::Big) => bytes.copy_from_slice(&(value as u16).to_be_bytes()),
        (3, _) => {
            for channel in format.channels() {
                if channel.mask != 0 {
                    bytes[format.byte_index_24(channel.shift)] = (value >> channel.shift) as u8;
                }
            }
        }
        (_, ByteOrder::Little) => bytes.copy_from_slice(&value.to_le_bytes()),
        (_, ByteOrder::Big) => bytes.copy_from_slice(&value.to_be_bytes()),
    }
}

/// Caller-owned pixel storage with its geometry.
///
/// The buffer does no locking of its own. When the storage is shared between
/// threads the caller must hold the surface lock for the duration of any
/// access.
#[derive(Debug, Clone)]
pub struct PixelBuffer<B> {
    data: B,
    format: PixelFormat,
    width: u32,
    height: u32,
    pitch: usize,
}

impl<B: AsRef<[u8]>> PixelBuffer<B> {
    pub fn new(data: B, format: PixelFormat, width: u32, height: u32, pitch: usize) -> Result<Self> {
        let available = data.as_ref().len();
        let row_bytes = (width as usize)
            .checked_mul(usize::from(format.bytes_per_pixel))
            .ok_or(MediaBindError::BufferTooShort {
                needed: usize::MAX,
                available: pitch,
            })?;
        if pitch < row_bytes {
            return Err(MediaBindError::BufferTooShort {
                needed: row_bytes,
                available: pitch,
            });
        }

        let needed = pitch.checked_mul(height as usize).unwrap_or(usize::MAX);
        if available < needed {
            return Err(MediaBindError::BufferTooShort { needed, available });
        }

        Ok(Self {
            data,
            format,
            width,
            height,
            pitch,
        })
    }

    pub fn format(&self) -> &PixelFormat {
        &self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pitch(&self) -> usize {
        self.pitch
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    pub fn into_inner(self) -> B {
        self.data
    }

    pub fn read_pixel(&self, x: u32, y: u32) -> u32 {
        debug_assert!(x < self.width && y < self.height, "pixel ({x}, {y}) out of bounds");
        read_pixel(self.data.as_ref(), self.pitch, &self.format, x, y)
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> PixelBuffer<B> {
    pub fn write_pixel(&mut self, x: u32, y: u32, value: u32) {
        debug_assert!(x < self.width && y < self.height, "pixel ({x}, {y}) out of bounds");
        write_pixel(self.data.as_mut(), self.pitch, &self.format, x, y, value);
    }

    /// Fills every pixel with `value`, leaving row padding untouched.
    pub fn fill(&mut self, value: u32) {
        for y in 0..self.height {
            for x in 0..self.width {
                self.write_pixel(x, y, value);
            }
        }
    }
}
