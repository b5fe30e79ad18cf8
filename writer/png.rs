use std::io::{Error, Write};

use flate2::write::ZlibEncoder;
use flate2::Compression;

pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

pub const COLOR_GRAYSCALE: u8 = 0;
pub const COLOR_RGB: u8 = 2;
pub const COLOR_INDEXED: u8 = 3;
pub const COLOR_GRAYSCALE_ALPHA: u8 = 4;
pub const COLOR_RGBA: u8 = 6;

/// Which filter each scanline is written with
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterStrategy {
    /// Same filter type (0-4) on every row
    Fixed(u8),
    /// Row `i` uses filter `i % 5`
    Cycle,
}

impl FilterStrategy {
    fn filter_for_row(&self, row: usize) -> u8 {
        match self {
            FilterStrategy::Fixed(filter) => *filter,
            FilterStrategy::Cycle => (row % 5) as u8,
        }
    }
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();

    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// Applies a forward filter to one row. `prior` is the unfiltered row above, zeros for row 0.
pub fn filter_scanline(filter: u8, row: &[u8], prior: &[u8], bpp: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(row.len() + 1);
    out.push(filter);

    for i in 0..row.len() {
        let left = if i >= bpp { row[i - bpp] } else { 0 };
        let above = prior[i];
        let upper_left = if i >= bpp { prior[i - bpp] } else { 0 };

        let predicted = match filter {
            1 => left,
            2 => above,
            3 => ((left as u16 + above as u16) / 2) as u8,
            4 => paeth(left, above, upper_left),
            _ => 0,
        };

        out.push(row[i].wrapping_sub(predicted));
    }

    out
}

/// Filters a packed 8-bit pixel buffer into PNG scanlines
pub fn encode_scanlines(pixels: &[u8], width: u32, height: u32, bpp: usize, strategy: FilterStrategy) -> Vec<u8> {
    let row_bytes = width as usize * bpp;
    let zero_row = vec![0u8; row_bytes];
    let mut out = Vec::with_capacity((row_bytes + 1) * height as usize);

    for (y, row) in pixels.chunks_exact(row_bytes).take(height as usize).enumerate() {
        let prior = if y == 0 {
            &zero_row[..]
        } else {
            &pixels[(y - 1) * row_bytes..y * row_bytes]
        };

        out.extend(filter_scanline(strategy.filter_for_row(y), row, prior, bpp));
    }

    out
}

pub fn zlib_compress(data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Geometry and timing of one APNG frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRect {
    pub width: u32,
    pub height: u32,
    pub x_offset: u32,
    pub y_offset: u32,
    pub delay_num: u16,
    pub delay_den: u16,
    pub dispose_op: u8,
    pub blend_op: u8,
}

impl FrameRect {
    /// Rectangle at the origin, 1/10 s delay, no dispose, source blend
    pub fn new(width: u32, height: u32) -> FrameRect {
        FrameRect {
            width,
            height,
            x_offset: 0,
            y_offset: 0,
            delay_num: 1,
            delay_den: 10,
            dispose_op: 0,
            blend_op: 0,
        }
    }

    pub fn offset(mut self, x: u32, y: u32) -> FrameRect {
        self.x_offset = x;
        self.y_offset = y;
        self
    }

    pub fn delay(mut self, num: u16, den: u16) -> FrameRect {
        self.delay_num = num;
        self.delay_den = den;
        self
    }

    pub fn ops(mut self, dispose_op: u8, blend_op: u8) -> FrameRect {
        self.dispose_op = dispose_op;
        self.blend_op = blend_op;
        self
    }
}

/// Assembles a PNG byte stream chunk by chunk.
///
/// Animation chunks draw their sequence numbers from one shared counter unless
/// given explicitly.
#[derive(Debug, Clone)]
pub struct PngBuilder {
    data: Vec<u8>,
    sequence: u32,
}

impl Default for PngBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PngBuilder {
    pub fn new() -> PngBuilder {
        PngBuilder {
            data: PNG_SIGNATURE.to_vec(),
            sequence: 0,
        }
    }

    /// Builder with no signature, for raw chunk streams
    pub fn without_signature() -> PngBuilder {
        PngBuilder {
            data: Vec::new(),
            sequence: 0,
        }
    }

    pub fn chunk(self, chunk_type: &[u8; 4], payload: &[u8]) -> PngBuilder {
        let crc = chunk_crc(chunk_type, payload);
        self.chunk_with_crc(chunk_type, payload, crc)
    }

    pub fn chunk_with_crc(mut self, chunk_type: &[u8; 4], payload: &[u8], crc: u32) -> PngBuilder {
        self.data.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        self.data.extend_from_slice(chunk_type);
        self.data.extend_from_slice(payload);
        self.data.extend_from_slice(&crc.to_be_bytes());
        self
    }

    /// Writes a chunk whose stored CRC does not match its contents
    pub fn chunk_with_bad_crc(self, chunk_type: &[u8; 4], payload: &[u8]) -> PngBuilder {
        let crc = chunk_crc(chunk_type, payload) ^ 0xFFFF_FFFF;
        self.chunk_with_crc(chunk_type, payload, crc)
    }

    pub fn ihdr(self, width: u32, height: u32, bit_depth: u8, color_type: u8, interlace: u8) -> PngBuilder {
        self.chunk(b"IHDR", &ihdr_payload(width, height, bit_depth, color_type, interlace))
    }

    pub fn idat(self, compressed: &[u8]) -> PngBuilder {
        self.chunk(b"IDAT", compressed)
    }

    pub fn iend(self) -> PngBuilder {
        self.chunk(b"IEND", &[])
    }

    pub fn actl(self, num_frames: u32, num_plays: u32) -> PngBuilder {
        let mut payload = num_frames.to_be_bytes().to_vec();
        payload.extend_from_slice(&num_plays.to_be_bytes());
        self.chunk(b"acTL", &payload)
    }

    pub fn fctl(mut self, rect: FrameRect) -> PngBuilder {
        let sequence = self.next_sequence();
        self.fctl_with_sequence(sequence, rect)
    }

    pub fn fctl_with_sequence(self, sequence: u32, rect: FrameRect) -> PngBuilder {
        self.chunk(b"fcTL", &fctl_payload(sequence, &rect))
    }

    pub fn fdat(mut self, compressed: &[u8]) -> PngBuilder {
        let sequence = self.next_sequence();
        self.fdat_with_sequence(sequence, compressed)
    }

    pub fn fdat_with_sequence(self, sequence: u32, compressed: &[u8]) -> PngBuilder {
        let mut payload = sequence.to_be_bytes().to_vec();
        payload.extend_from_slice(compressed);
        self.chunk(b"fdAT", &payload)
    }

    /// Appends bytes verbatim
    pub fn raw(mut self, bytes: &[u8]) -> PngBuilder {
        self.data.extend_from_slice(bytes);
        self
    }

    fn next_sequence(&mut self) -> u32 {
        let sequence = self.sequence;
        self.sequence += 1;
        sequence
    }

    pub fn finish(self) -> Vec<u8> {
        self.data
    }
}

pub fn chunk_crc(chunk_type: &[u8; 4], payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(payload);
    hasher.finalize()
}

pub fn ihdr_payload(width: u32, height: u32, bit_depth: u8, color_type: u8, interlace: u8) -> Vec<u8> {
    let mut payload = Vec::with_capacity(13);
    payload.extend_from_slice(&width.to_be_bytes());
    payload.extend_from_slice(&height.to_be_bytes());
    payload.extend_from_slice(&[bit_depth, color_type, 0, 0, interlace]);
    payload
}

pub fn fctl_payload(sequence: u32, rect: &FrameRect) -> Vec<u8> {
    let mut payload = Vec::with_capacity(26);
    for value in [sequence, rect.width, rect.height, rect.x_offset, rect.y_offset] {
        payload.extend_from_slice(&value.to_be_bytes());
    }
    payload.extend_from_slice(&rect.delay_num.to_be_bytes());
    payload.extend_from_slice(&rect.delay_den.to_be_bytes());
    payload.push(rect.dispose_op);
    payload.push(rect.blend_op);
    payload
}

fn channels(color_type: u8) -> usize {
    match color_type {
        COLOR_GRAYSCALE | COLOR_INDEXED => 1,
        COLOR_GRAYSCALE_ALPHA => 2,
        COLOR_RGB => 3,
        _ => 4,
    }
}

/// Filters and compresses 8-bit pixels into an IDAT/fdAT payload
pub fn compress_pixels(
    pixels: &[u8],
    width: u32,
    height: u32,
    color_type: u8,
    strategy: FilterStrategy,
) -> Result<Vec<u8>, Error> {
    let scanlines = encode_scanlines(pixels, width, height, channels(color_type), strategy);
    zlib_compress(&scanlines)
}

/// Complete static 8-bit PNG
pub fn encode_png(
    pixels: &[u8],
    width: u32,
    height: u32,
    color_type: u8,
    strategy: FilterStrategy,
) -> Result<Vec<u8>, Error> {
    let compressed = compress_pixels(pixels, width, height, color_type, strategy)?;

    Ok(PngBuilder::new()
        .ihdr(width, height, 8, color_type, 0)
        .idat(&compressed)
        .iend()
        .finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iend_crc_is_well_known() {
        assert_eq!(chunk_crc(b"IEND", &[]), 0xAE42_6082);
    }

    #[test]
    fn filters_use_zero_outside_the_image() {
        let row = [10, 20, 30, 40];
        let zeros = [0; 4];

        assert_eq!(filter_scanline(1, &row, &zeros, 2), vec![1, 10, 20, 20, 20]);
        assert_eq!(filter_scanline(2, &row, &zeros, 2), vec![2, 10, 20, 30, 40]);
        assert_eq!(filter_scanline(3, &row, &zeros, 2), vec![3, 10, 20, 25, 30]);
        assert_eq!(filter_scanline(4, &row, &zeros, 2), vec![4, 10, 20, 20, 20]);
    }

    #[test]
    fn cycle_uses_every_filter() {
        let pixels = vec![1u8; 6];
        let scanlines = encode_scanlines(&pixels, 1, 6, 1, FilterStrategy::Cycle);
        let filters: Vec<u8> = scanlines.chunks(2).map(|s| s[0]).collect();
        assert_eq!(filters, vec![0, 1, 2, 3, 4, 0]);
    }

    #[test]
    fn builder_numbers_animation_chunks() {
        let bytes = PngBuilder::without_signature()
            .fctl(FrameRect::new(1, 1))
            .fdat(&[9])
            .finish();

        // fcTL: 12 + 26 bytes, then fdAT sequence at offset 38 + 8
        assert_eq!(&bytes[8..12], &0u32.to_be_bytes());
        assert_eq!(&bytes[46..50], &1u32.to_be_bytes());
        assert_eq!(bytes[50], 9);
    }
}
