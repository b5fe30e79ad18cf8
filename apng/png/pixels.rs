use crate::png::dispatcher::{ColorType, ImageHeader};
use crate::utils::error::{ApngError, ApngResult};
use crate::utils::image::{PixelData, PixelFormat};

/// Bytes per pixel at 8-bit depth
pub fn bytes_per_pixel(color_type: ColorType) -> usize {
    color_type.channels()
}

/// Turns reconstructed scanline bytes into typed pixel data.
///
/// Construction fails for layouts the decoder does not reconstruct, so
/// callers can reject a stream before inflating anything.
#[derive(Debug, Clone, Copy)]
pub struct PixelAssembler {
    pixel_format: PixelFormat,
    bpp: usize,
}

impl PixelAssembler {
    pub fn new(header: &ImageHeader) -> ApngResult<Self> {
        if header.interlace_method != 0 {
            return Err(ApngError::UnsupportedFormat("interlaced images are not supported".into()));
        }

        if header.bit_depth != 8 {
            return Err(ApngError::UnsupportedFormat(format!(
                "bit depth {} is not supported",
                header.bit_depth
            )));
        }

        let pixel_format = match header.color_type {
            ColorType::Grayscale => PixelFormat::L8,
            ColorType::GrayscaleAlpha => PixelFormat::LA8,
            ColorType::RGB => PixelFormat::RGB8,
            ColorType::RGBA => PixelFormat::RGBA8,
            ColorType::Indexed => {
                return Err(ApngError::UnsupportedFormat("indexed color is not supported".into()));
            }
        };

        Ok(PixelAssembler {
            pixel_format,
            bpp: bytes_per_pixel(header.color_type),
        })
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.bpp
    }

    pub fn assemble(&self, raw: Vec<u8>, width: u32, height: u32) -> ApngResult<PixelData> {
        let expected = width as usize * height as usize * self.bpp;
        if raw.len() != expected {
            return Err(ApngError::Format(format!(
                "{}x{} {:?} needs {} bytes, found {}",
                width,
                height,
                self.pixel_format,
                expected,
                raw.len()
            )));
        }

        Ok(match self.pixel_format {
            PixelFormat::L8 => PixelData::L8(raw),
            PixelFormat::LA8 => PixelData::LA8(raw),
            PixelFormat::RGB8 => PixelData::RGB8(raw),
            PixelFormat::RGBA8 => PixelData::RGBA8(raw),
        })
    }
}
