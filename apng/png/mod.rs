pub mod chunks;
pub mod compose;
pub mod dispatcher;
pub mod filter;
pub mod inflate;
pub mod pixels;

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::png::chunks::ChunkReader;
use crate::png::compose::{check_bounds, compose_animation};
use crate::png::dispatcher::{AnimationControl, ChunkDispatcher, DecodedStream, PngFrame};
use crate::png::filter::unfilter_scanlines;
use crate::png::inflate::{filtered_len, inflate};
use crate::png::pixels::PixelAssembler;
use crate::utils::error::{ApngError, ApngResult};
use crate::utils::image::{Image, PixelData};
use crate::utils::info::PngInfo;
use crate::utils::logger::{LogLevel, Logger};
use crate::utils::options::DecodeOptions;
use crate::{log_debug, log_error, log_info, log_warn};

/// Inflate, defilter and assemble one compressed rectangle
fn decode_raster(data: &[u8], width: u32, height: u32, assembler: &PixelAssembler) -> ApngResult<PixelData> {
    let bpp = assembler.bytes_per_pixel();
    let filtered = inflate(data, filtered_len(width, height, bpp)?)?;
    let raw = unfilter_scanlines(&filtered, width, height, bpp)?;

    assembler.assemble(raw, width, height)
}

fn decode_frame(frame: &PngFrame, assembler: &PixelAssembler) -> ApngResult<PixelData> {
    decode_raster(&frame.data, frame.control.width, frame.control.height, assembler)
}

pub struct PngDecoder<R: Read + Seek> {
    reader: R,
    options: DecodeOptions,
    info: Option<PngInfo>,
}

impl PngDecoder<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> ApngResult<PngDecoder<BufReader<File>>> {
        let file = File::open(path)?;
        Ok(PngDecoder::new(BufReader::new(file)))
    }
}

impl<R: Read + Seek> PngDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self::with_options(reader, DecodeOptions::default())
    }

    pub fn with_options(reader: R, options: DecodeOptions) -> Self {
        Self {
            reader,
            options,
            info: None,
        }
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    /// Stream metadata, available once the chunk layer of `decode` succeeded
    pub fn get_info(&self) -> Option<PngInfo> {
        self.info.clone()
    }

    pub fn decode(&mut self) -> ApngResult<Image> {
        let result = self.decode_stream();

        if let Err(e) = &result {
            log_error!("PNG decode failed: {}", e);
        }

        result
    }

    fn read_stream(&mut self) -> ApngResult<(DecodedStream, Vec<String>)> {
        let mut chunks = ChunkReader::new(&mut self.reader, self.options)?;
        chunks.read_signature()?;

        let mut dispatcher = ChunkDispatcher::new(self.options);

        while let Some(chunk) = chunks.next_chunk()? {
            dispatcher.dispatch(chunk)?;

            if dispatcher.is_done() {
                break;
            }
        }

        if dispatcher.is_done() && chunks.bytes_left() > 0 {
            log_warn!("Ignoring {} bytes after IEND", chunks.bytes_left());
        }

        let corrupt = chunks.skipped().iter().map(|chunk_type| chunk_type.to_string()).collect();

        Ok((dispatcher.finish()?, corrupt))
    }

    fn decode_stream(&mut self) -> ApngResult<Image> {
        let (stream, corrupt) = self.read_stream()?;
        self.info = Some(PngInfo::from_stream(&stream, corrupt));

        let assembler = PixelAssembler::new(&stream.header)?;

        if Logger::enabled(LogLevel::Debug) {
            log_debug!(
                "Decoding {}x{} {:?}, {} frames, default image is first frame: {}",
                stream.header.width,
                stream.header.height,
                assembler.pixel_format(),
                stream.frames.len(),
                stream.default_image_is_first_frame
            );
        }

        match stream.animation {
            Some(animation) => self.decode_animation(&stream, &animation, &assembler),
            None => {
                let header = &stream.header;
                let pixels = decode_raster(&stream.image_data, header.width, header.height, &assembler)?;
                Ok(Image::from_pixels(header.width, header.height, pixels))
            }
        }
    }

    fn decode_animation(
        &self,
        stream: &DecodedStream,
        animation: &AnimationControl,
        assembler: &PixelAssembler,
    ) -> ApngResult<Image> {
        let (width, height) = (stream.header.width, stream.header.height);

        for frame in &stream.frames {
            check_bounds(&frame.control, width, height)?;

            if frame.data.is_empty() {
                return Err(ApngError::Composition(format!(
                    "frame {} has no image data",
                    frame.control.sequence_number
                )));
            }
        }

        if !stream.default_image_is_first_frame {
            log_debug!("Default image is not part of the animation, skipping it");
        }

        #[cfg(feature = "rayon")]
        let decoded: ApngResult<Vec<PixelData>> =
            stream.frames.par_iter().map(|frame| decode_frame(frame, assembler)).collect();

        #[cfg(not(feature = "rayon"))]
        let decoded: ApngResult<Vec<PixelData>> =
            stream.frames.iter().map(|frame| decode_frame(frame, assembler)).collect();

        let frames = stream
            .frames
            .iter()
            .map(|frame| frame.control)
            .zip(decoded?)
            .collect();

        let frames = compose_animation(width, height, animation, frames)?;
        log_info!("Decoded {} APNG frames, {} plays", frames.len(), animation.num_plays);

        Ok(Image::animated(width, height, frames, animation.num_plays))
    }
}
