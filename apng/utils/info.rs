use serde::Serialize;

use crate::png::dispatcher::{AnimationControl, ColorType, DecodedStream, FrameControl};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PngInfo {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub color_type: ColorType,
    pub compression_method: u8,
    pub filter_method: u8,
    pub interlace_method: u8,
    pub animation: Option<AnimationControl>,
    pub frame_controls: Vec<FrameControl>,
    pub default_image_is_first_frame: bool,
    /// Chunks dropped because of a CRC mismatch
    pub corrupt_chunks: Vec<String>,
    /// Chunks this decoder does not interpret
    pub ignored_chunks: Vec<String>,
}

impl PngInfo {
    pub(crate) fn from_stream(stream: &DecodedStream, corrupt_chunks: Vec<String>) -> PngInfo {
        let header = &stream.header;

        PngInfo {
            width: header.width,
            height: header.height,
            bit_depth: header.bit_depth,
            color_type: header.color_type,
            compression_method: header.compression_method,
            filter_method: header.filter_method,
            interlace_method: header.interlace_method,
            animation: stream.animation,
            frame_controls: stream.frames.iter().map(|frame| frame.control).collect(),
            default_image_is_first_frame: stream.default_image_is_first_frame,
            corrupt_chunks,
            ignored_chunks: stream.ignored_chunks.clone(),
        }
    }

    pub fn is_animated(&self) -> bool {
        self.animation.is_some()
    }
}
