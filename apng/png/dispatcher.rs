use std::collections::BTreeMap;
use std::ops::Bound;

use serde::Serialize;

use crate::png::chunks::{Chunk, ChunkType};
use crate::utils::error::{ApngError, ApngResult};
use crate::utils::options::DecodeOptions;
use crate::{log_debug, log_warn};

/// Standard chunks this decoder recognizes but does not interpret
const KNOWN_UNINTERPRETED: [&[u8; 4]; 15] = [
    b"PLTE", b"tRNS", b"cHRM", b"gAMA", b"iCCP", b"sBIT", b"sRGB", b"tEXt", b"zTXt", b"iTXt", b"bKGD", b"pHYs",
    b"tIME", b"sPLT", b"eXIf",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColorType {
    Grayscale = 0,
    RGB = 2,
    Indexed = 3,
    GrayscaleAlpha = 4,
    RGBA = 6,
}

impl ColorType {
    pub fn from_u8(value: u8) -> Option<ColorType> {
        match value {
            0 => Some(ColorType::Grayscale),
            2 => Some(ColorType::RGB),
            3 => Some(ColorType::Indexed),
            4 => Some(ColorType::GrayscaleAlpha),
            6 => Some(ColorType::RGBA),
            _ => None,
        }
    }

    /// Samples per pixel
    pub fn channels(&self) -> usize {
        match self {
            ColorType::Grayscale => 1,
            ColorType::RGB => 3,
            ColorType::Indexed => 1,
            ColorType::GrayscaleAlpha => 2,
            ColorType::RGBA => 4,
        }
    }

    fn allows_bit_depth(&self, bit_depth: u8) -> bool {
        match self {
            ColorType::Grayscale => matches!(bit_depth, 1 | 2 | 4 | 8 | 16),
            ColorType::Indexed => matches!(bit_depth, 1 | 2 | 4 | 8),
            ColorType::RGB | ColorType::GrayscaleAlpha | ColorType::RGBA => matches!(bit_depth, 8 | 16),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageHeader {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub color_type: ColorType,
    pub compression_method: u8,
    pub filter_method: u8,
    pub interlace_method: u8,
}

impl ImageHeader {
    pub const LENGTH: usize = 13;

    pub fn parse(data: &[u8], options: &DecodeOptions) -> ApngResult<ImageHeader> {
        if data.len() != Self::LENGTH {
            return Err(ApngError::Format(format!(
                "IHDR must be {} bytes, found {}",
                Self::LENGTH,
                data.len()
            )));
        }

        let width = read_u32(data, 0);
        let height = read_u32(data, 4);
        let bit_depth = data[8];
        let color_type = data[9];
        let compression_method = data[10];
        let filter_method = data[11];
        let interlace_method = data[12];

        if width == 0 || height == 0 {
            return Err(ApngError::InvalidDimensions { width, height });
        }

        if width > options.get_max_width() || height > options.get_max_height() {
            log_warn!(
                "Image {}x{} exceeds configured limit {}x{}",
                width,
                height,
                options.get_max_width(),
                options.get_max_height()
            );
            return Err(ApngError::InvalidDimensions { width, height });
        }

        let color_type = ColorType::from_u8(color_type)
            .ok_or_else(|| ApngError::Format(format!("invalid color type {}", color_type)))?;

        // Every color type accepts depth 8, so any rejected combination is a non-8 depth
        if !color_type.allows_bit_depth(bit_depth) {
            return Err(ApngError::UnsupportedFormat(format!(
                "bit depth {} is not valid for {:?}",
                bit_depth, color_type
            )));
        }

        if compression_method != 0 {
            return Err(ApngError::Format(format!("invalid compression method {}", compression_method)));
        }

        if filter_method != 0 {
            return Err(ApngError::Format(format!("invalid filter method {}", filter_method)));
        }

        if interlace_method > 1 {
            return Err(ApngError::Format(format!("invalid interlace method {}", interlace_method)));
        }

        Ok(ImageHeader {
            width,
            height,
            bit_depth,
            color_type,
            compression_method,
            filter_method,
            interlace_method,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnimationControl {
    pub num_frames: u32,
    /// 0 loops forever
    pub num_plays: u32,
}

impl AnimationControl {
    pub const LENGTH: usize = 8;

    pub fn parse(data: &[u8]) -> ApngResult<AnimationControl> {
        if data.len() != Self::LENGTH {
            return Err(ApngError::Format(format!(
                "acTL must be {} bytes, found {}",
                Self::LENGTH,
                data.len()
            )));
        }

        Ok(AnimationControl {
            num_frames: read_u32(data, 0),
            num_plays: read_u32(data, 4),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DisposeOp {
    None = 0,
    Background = 1,
    Previous = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BlendOp {
    Source = 0,
    Over = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameControl {
    pub sequence_number: u32,
    pub width: u32,
    pub height: u32,
    pub x_offset: u32,
    pub y_offset: u32,
    pub delay_num: u16,
    pub delay_den: u16,
    pub dispose_op: DisposeOp,
    pub blend_op: BlendOp,
}

impl FrameControl {
    pub const LENGTH: usize = 26;

    pub fn parse(data: &[u8]) -> ApngResult<FrameControl> {
        if data.len() != Self::LENGTH {
            return Err(ApngError::Format(format!(
                "fcTL must be {} bytes, found {}",
                Self::LENGTH,
                data.len()
            )));
        }

        let dispose_op = match data[24] {
            0 => DisposeOp::None,
            1 => DisposeOp::Background,
            2 => DisposeOp::Previous,
            other => return Err(ApngError::Format(format!("invalid fcTL dispose_op {}", other))),
        };

        let blend_op = match data[25] {
            0 => BlendOp::Source,
            1 => BlendOp::Over,
            other => return Err(ApngError::Format(format!("invalid fcTL blend_op {}", other))),
        };

        Ok(FrameControl {
            sequence_number: read_u32(data, 0),
            width: read_u32(data, 4),
            height: read_u32(data, 8),
            x_offset: read_u32(data, 12),
            y_offset: read_u32(data, 16),
            delay_num: u16::from_be_bytes([data[20], data[21]]),
            delay_den: u16::from_be_bytes([data[22], data[23]]),
            dispose_op,
            blend_op,
        })
    }
}

/// One animation frame: its control record and its merged compressed payload
#[derive(Debug, Clone, PartialEq)]
pub struct PngFrame {
    pub control: FrameControl,
    pub data: Vec<u8>,
}

/// Everything the chunk layer extracted from a complete stream
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedStream {
    pub header: ImageHeader,
    /// Concatenated IDAT payloads. Empty when the default image was moved into the first frame.
    pub image_data: Vec<u8>,
    pub animation: Option<AnimationControl>,
    pub frames: Vec<PngFrame>,
    pub default_image_is_first_frame: bool,
    pub ignored_chunks: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    Start,
    SawHeader,
    SawData,
    Done,
}

/// Routes chunks into structured records, enforcing chunk order.
#[derive(Debug)]
pub struct ChunkDispatcher {
    options: DecodeOptions,
    state: DecodeState,
    header: Option<ImageHeader>,
    image_data: Vec<u8>,
    animation: Option<AnimationControl>,
    frame_controls: Vec<FrameControl>,
    frame_data: BTreeMap<u32, Vec<u8>>,
    default_image_is_first_frame: bool,
    ignored_chunks: Vec<String>,
}

impl ChunkDispatcher {
    pub fn new(options: DecodeOptions) -> Self {
        ChunkDispatcher {
            options,
            state: DecodeState::Start,
            header: None,
            image_data: Vec::new(),
            animation: None,
            frame_controls: Vec::new(),
            frame_data: BTreeMap::new(),
            default_image_is_first_frame: false,
            ignored_chunks: Vec::new(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == DecodeState::Done
    }

    pub fn dispatch(&mut self, chunk: Chunk) -> ApngResult<()> {
        if self.state == DecodeState::Done {
            return Err(ApngError::Sequence(format!("{} chunk after IEND", chunk.chunk_type)));
        }

        match chunk.chunk_type {
            ChunkType::IHDR => self.read_ihdr(&chunk.data),
            ChunkType::IDAT => self.read_idat(chunk.data),
            ChunkType::IEND => self.read_iend(),
            ChunkType::ACTL => self.read_actl(&chunk.data),
            ChunkType::FCTL => self.read_fctl(&chunk.data),
            ChunkType::FDAT => self.read_fdat(chunk.data),
            ChunkType::Unknown(bytes) => {
                self.ignore_chunk(chunk.chunk_type, &bytes);
                Ok(())
            }
        }
    }

    fn require_header(&self, chunk_type: ChunkType) -> ApngResult<()> {
        if self.state == DecodeState::Start {
            return Err(ApngError::Sequence(format!("{} chunk before IHDR", chunk_type)));
        }

        Ok(())
    }

    fn read_ihdr(&mut self, data: &[u8]) -> ApngResult<()> {
        if self.state != DecodeState::Start {
            return Err(ApngError::Sequence("duplicate IHDR chunk".into()));
        }

        let header = ImageHeader::parse(data, &self.options)?;
        log_debug!(
            "IHDR {}x{}, bit depth {}, {:?}, interlace {}",
            header.width,
            header.height,
            header.bit_depth,
            header.color_type,
            header.interlace_method
        );

        self.header = Some(header);
        self.state = DecodeState::SawHeader;

        Ok(())
    }

    fn read_idat(&mut self, data: Vec<u8>) -> ApngResult<()> {
        self.require_header(ChunkType::IDAT)?;

        if self.image_data.is_empty() {
            self.image_data = data;
        } else {
            self.image_data.extend_from_slice(&data);
        }
        self.state = DecodeState::SawData;

        Ok(())
    }

    fn read_iend(&mut self) -> ApngResult<()> {
        match self.state {
            DecodeState::SawData => {
                self.state = DecodeState::Done;
                Ok(())
            }
            DecodeState::Start => Err(ApngError::IncompleteStream("IEND reached before IHDR".into())),
            _ => Err(ApngError::IncompleteStream("IEND reached before any IDAT".into())),
        }
    }

    fn read_actl(&mut self, data: &[u8]) -> ApngResult<()> {
        self.require_header(ChunkType::ACTL)?;

        if self.state == DecodeState::SawData {
            return Err(ApngError::Sequence("acTL chunk after IDAT".into()));
        }

        if self.animation.is_some() {
            return Err(ApngError::Sequence("duplicate acTL chunk".into()));
        }

        let animation = AnimationControl::parse(data)?;
        log_debug!("acTL: {} frames, {} plays", animation.num_frames, animation.num_plays);

        self.animation = Some(animation);

        Ok(())
    }

    fn read_fctl(&mut self, data: &[u8]) -> ApngResult<()> {
        self.require_header(ChunkType::FCTL)?;

        let control = FrameControl::parse(data)?;

        if let Some(previous) = self.frame_controls.last() {
            if control.sequence_number <= previous.sequence_number {
                return Err(ApngError::Sequence(format!(
                    "fcTL sequence number {} does not follow {}",
                    control.sequence_number, previous.sequence_number
                )));
            }
        } else if self.state == DecodeState::SawHeader {
            self.default_image_is_first_frame = true;
        }

        self.frame_controls.push(control);

        Ok(())
    }

    fn read_fdat(&mut self, data: Vec<u8>) -> ApngResult<()> {
        self.require_header(ChunkType::FDAT)?;

        if data.len() < 4 {
            return Err(ApngError::Format(format!(
                "fdAT must hold at least a sequence number, found {} bytes",
                data.len()
            )));
        }

        let sequence_number = read_u32(&data, 0);
        self.frame_data
            .entry(sequence_number)
            .or_default()
            .extend_from_slice(&data[4..]);

        Ok(())
    }

    fn ignore_chunk(&mut self, chunk_type: ChunkType, bytes: &[u8; 4]) {
        if KNOWN_UNINTERPRETED.contains(&bytes) {
            log_debug!("Ignoring {} chunk", chunk_type);
        } else {
            log_warn!("Ignoring unrecognized chunk {}", chunk_type);
        }

        self.ignored_chunks.push(chunk_type.to_string());
    }

    /// Checks that every mandatory chunk was seen and merges frame payloads
    pub fn finish(self) -> ApngResult<DecodedStream> {
        let header = match (self.state, self.header) {
            (DecodeState::Done, Some(header)) => header,
            (DecodeState::Start, _) | (_, None) => {
                return Err(ApngError::IncompleteStream("missing IHDR chunk".into()))
            }
            (DecodeState::SawHeader, _) => return Err(ApngError::IncompleteStream("missing IDAT chunk".into())),
            (DecodeState::SawData, _) => return Err(ApngError::IncompleteStream("missing IEND chunk".into())),
        };

        let mut image_data = self.image_data;

        if self.animation.is_none() {
            if !self.frame_controls.is_empty() || !self.frame_data.is_empty() {
                log_warn!("Animation chunks without acTL, decoding as a static image");
            }

            return Ok(DecodedStream {
                header,
                image_data,
                animation: None,
                frames: Vec::new(),
                default_image_is_first_frame: false,
                ignored_chunks: self.ignored_chunks,
            });
        }

        let controls = self.frame_controls;

        if let Some(first) = controls.first() {
            let orphans = self.frame_data.range(..=first.sequence_number).count();
            if orphans > 0 {
                log_warn!(
                    "Dropping {} fdAT segments preceding the first fcTL (sequence {})",
                    orphans,
                    first.sequence_number
                );
            }
        }

        let mut frames = Vec::with_capacity(controls.len());

        for (index, control) in controls.iter().enumerate() {
            let start = Bound::Excluded(control.sequence_number);
            let end = match controls.get(index + 1) {
                Some(next) => Bound::Excluded(next.sequence_number),
                None => Bound::Unbounded,
            };

            let mut segments = self.frame_data.range((start, end)).map(|(_, segment)| segment).peekable();

            let data = if index == 0 && self.default_image_is_first_frame {
                if segments.peek().is_some() {
                    log_warn!("Ignoring fdAT data attached to the default image frame");
                }
                std::mem::take(&mut image_data)
            } else {
                let mut data = Vec::with_capacity(segments.clone().map(|segment| segment.len()).sum());
                for segment in segments {
                    data.extend_from_slice(segment);
                }
                data
            };

            frames.push(PngFrame { control: *control, data });
        }

        Ok(DecodedStream {
            header,
            image_data,
            animation: self.animation,
            frames,
            default_image_is_first_frame: self.default_image_is_first_frame,
            ignored_chunks: self.ignored_chunks,
        })
    }
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}
