mod png;

pub use png::{
    chunk_crc, compress_pixels, encode_png, encode_scanlines, fctl_payload, filter_scanline, ihdr_payload,
    zlib_compress, FilterStrategy, FrameRect, PngBuilder, COLOR_GRAYSCALE, COLOR_GRAYSCALE_ALPHA, COLOR_INDEXED,
    COLOR_RGB, COLOR_RGBA, PNG_SIGNATURE,
};

use std::fs::File;
use std::io::{Error, ErrorKind, Write};
use std::path::{Path, PathBuf};

use image::ExtendedColorType;

pub struct Writer {}

#[derive(Debug, Clone, PartialEq)]
pub enum WriterPixelData {
    L8(Vec<u8>),
    LA8(Vec<u8>),
    RGB8(Vec<u8>),
    RGBA8(Vec<u8>),
}

impl WriterPixelData {
    pub fn channels(&self) -> usize {
        match self {
            WriterPixelData::L8(_) => 1,
            WriterPixelData::LA8(_) => 2,
            WriterPixelData::RGB8(_) => 3,
            WriterPixelData::RGBA8(_) => 4,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            WriterPixelData::L8(pixels)
            | WriterPixelData::LA8(pixels)
            | WriterPixelData::RGB8(pixels)
            | WriterPixelData::RGBA8(pixels) => pixels,
        }
    }

    fn color_type(&self) -> ExtendedColorType {
        match self {
            WriterPixelData::L8(_) => ExtendedColorType::L8,
            WriterPixelData::LA8(_) => ExtendedColorType::La8,
            WriterPixelData::RGB8(_) => ExtendedColorType::Rgb8,
            WriterPixelData::RGBA8(_) => ExtendedColorType::Rgba8,
        }
    }

    fn to_rgb8(&self) -> Vec<u8> {
        match self {
            WriterPixelData::L8(pixels) => pixels.iter().flat_map(|&v| [v, v, v]).collect(),
            WriterPixelData::LA8(pixels) => pixels.chunks_exact(2).flat_map(|p| [p[0], p[0], p[0]]).collect(),
            WriterPixelData::RGB8(pixels) => pixels.clone(),
            WriterPixelData::RGBA8(pixels) => pixels.chunks_exact(4).flat_map(|p| [p[0], p[1], p[2]]).collect(),
        }
    }
}

pub struct WriterImageFrame {
    pub width: u32,
    pub height: u32,
    /// Milliseconds, 0 for static images
    pub delay: u32,
    pub pixels: WriterPixelData,
}

pub struct WriterImage {
    pub width: u32,
    pub height: u32,
    pub frames: Vec<WriterImageFrame>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameFormat {
    Png,
    Pam,
    Ppm,
}

impl FrameFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            FrameFormat::Png => "png",
            FrameFormat::Pam => "pam",
            FrameFormat::Ppm => "ppm",
        }
    }
}

impl Writer {
    /// Writes one file per frame. A single frame goes to `output_path` itself,
    /// otherwise frames are numbered next to it.
    pub fn write_frames(output_path: &Path, image: &WriterImage, format: FrameFormat) -> Result<Vec<PathBuf>, Error> {
        if image.frames.is_empty() {
            return Err(Error::new(ErrorKind::InvalidInput, "image has no frames"));
        }

        let paths: Vec<PathBuf> = if image.frames.len() == 1 {
            vec![output_path.with_extension(format.extension())]
        } else {
            let output_dir = output_path.parent().unwrap_or_else(|| Path::new("."));
            let stem = output_path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .ok_or_else(|| Error::new(ErrorKind::InvalidInput, "output path has no file name"))?;

            (0..image.frames.len())
                .map(|i| output_dir.join(format!("{}_frame_{}.{}", stem, i, format.extension())))
                .collect()
        };

        for (frame, path) in image.frames.iter().zip(&paths) {
            match format {
                FrameFormat::Png => Writer::write_png(path, frame.width, frame.height, &frame.pixels)?,
                FrameFormat::Pam => Writer::write_pam(path, frame.width, frame.height, &frame.pixels)?,
                FrameFormat::Ppm => Writer::write_ppm(path, frame.width, frame.height, &frame.pixels)?,
            }
        }

        Ok(paths)
    }

    pub fn write_png(output_path: &Path, width: u32, height: u32, pixel_data: &WriterPixelData) -> Result<(), Error> {
        Writer::validate_pixel_count(width, height, pixel_data)?;

        image::save_buffer_with_format(
            output_path,
            pixel_data.as_bytes(),
            width,
            height,
            pixel_data.color_type(),
            image::ImageFormat::Png,
        )
        .map_err(|e| Error::new(ErrorKind::Other, e))
    }

    pub fn write_ppm(output_path: &Path, width: u32, height: u32, pixel_data: &WriterPixelData) -> Result<(), Error> {
        Writer::validate_pixel_count(width, height, pixel_data)?;

        let mut file = File::create(output_path)?;

        file.write_all(b"P6\n")?;
        file.write_all(format!("{} {}\n", width, height).as_bytes())?;
        file.write_all(b"255\n")?;
        file.write_all(&pixel_data.to_rgb8())?;

        Ok(())
    }

    pub fn write_pam(output_path: &Path, width: u32, height: u32, pixel_data: &WriterPixelData) -> Result<(), Error> {
        Writer::validate_pixel_count(width, height, pixel_data)?;

        let mut file = File::create(output_path)?;

        file.write_all(b"P7\n")?;
        file.write_all(format!("WIDTH {}\n", width).as_bytes())?;
        file.write_all(format!("HEIGHT {}\n", height).as_bytes())?;

        match pixel_data {
            WriterPixelData::L8(pixels) => {
                file.write_all(b"DEPTH 1\nMAXVAL 255\nTUPLTYPE GRAYSCALE\nENDHDR\n")?;
                file.write_all(pixels)?;
            }
            WriterPixelData::LA8(pixels) => {
                file.write_all(b"DEPTH 2\nMAXVAL 255\nTUPLTYPE GRAYSCALE_ALPHA\nENDHDR\n")?;
                file.write_all(pixels)?;
            }
            WriterPixelData::RGB8(pixels) => {
                file.write_all(b"DEPTH 3\nMAXVAL 255\nTUPLTYPE RGB\nENDHDR\n")?;
                file.write_all(pixels)?;
            }
            WriterPixelData::RGBA8(pixels) => {
                file.write_all(b"DEPTH 4\nMAXVAL 255\nTUPLTYPE RGB_ALPHA\nENDHDR\n")?;
                file.write_all(pixels)?;
            }
        }

        Ok(())
    }

    fn validate_pixel_count(width: u32, height: u32, pixel_data: &WriterPixelData) -> Result<(), Error> {
        let expected_size = width as usize * height as usize * pixel_data.channels();
        let actual_size = pixel_data.as_bytes().len();

        if expected_size != actual_size {
            let msg = format!(
                "Invalid pixel data size for {}x{} image with {} channels: expected {} bytes, got {}",
                width,
                height,
                pixel_data.channels(),
                expected_size,
                actual_size
            );

            return Err(Error::new(ErrorKind::InvalidData, msg));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("writer_{}_{}", std::process::id(), name))
    }

    #[test]
    fn rejects_mismatched_buffers() {
        let path = temp_path("bad.ppm");
        let err = Writer::write_ppm(&path, 2, 2, &WriterPixelData::RGB8(vec![0; 11])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn writes_ppm_from_rgba() -> Result<(), Error> {
        let path = temp_path("rgba.ppm");
        Writer::write_ppm(&path, 1, 1, &WriterPixelData::RGBA8(vec![1, 2, 3, 4]))?;

        let bytes = std::fs::read(&path)?;
        std::fs::remove_file(&path)?;
        assert_eq!(bytes, b"P6\n1 1\n255\n\x01\x02\x03".to_vec());

        Ok(())
    }

    #[test]
    fn numbers_animation_frames() -> Result<(), Error> {
        let frame = |v: u8| WriterImageFrame {
            width: 1,
            height: 1,
            delay: 100,
            pixels: WriterPixelData::L8(vec![v]),
        };
        let image = WriterImage {
            width: 1,
            height: 1,
            frames: vec![frame(1), frame(2)],
        };

        let paths = Writer::write_frames(&temp_path("anim.pam"), &image, FrameFormat::Pam)?;
        assert_eq!(paths.len(), 2);
        for path in &paths {
            assert!(path.to_string_lossy().contains("_frame_"));
            assert!(std::fs::read(path)?.starts_with(b"P7\n"));
            std::fs::remove_file(path)?;
        }

        Ok(())
    }
}
