use serde::Serialize;

fn drop_transparency_channel(pixels: Vec<u8>) -> Vec<u8> {
    pixels.chunks_exact(4).flat_map(|chunk| [chunk[0], chunk[1], chunk[2]]).collect()
}

fn add_transparency_channel(pixels: Vec<u8>) -> Vec<u8> {
    pixels
        .chunks_exact(3)
        .flat_map(|chunk| [chunk[0], chunk[1], chunk[2], 255])
        .collect()
}

fn l8_to_rgb8(values: Vec<u8>) -> Vec<u8> {
    values.into_iter().flat_map(|v| [v, v, v]).collect()
}

fn l8_to_rgba8(values: Vec<u8>) -> Vec<u8> {
    values.into_iter().flat_map(|v| [v, v, v, 255]).collect()
}

fn la8_to_rgb8(values: Vec<u8>) -> Vec<u8> {
    values.chunks_exact(2).flat_map(|chunk| [chunk[0], chunk[0], chunk[0]]).collect()
}

fn la8_to_rgba8(values: Vec<u8>) -> Vec<u8> {
    values
        .chunks_exact(2)
        .flat_map(|chunk| [chunk[0], chunk[0], chunk[0], chunk[1]])
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PixelFormat {
    L8,
    LA8,
    RGB8,
    RGBA8,
}

impl PixelFormat {
    pub fn channels(&self) -> usize {
        match self {
            PixelFormat::L8 => 1,
            PixelFormat::LA8 => 2,
            PixelFormat::RGB8 => 3,
            PixelFormat::RGBA8 => 4,
        }
    }

    pub fn has_alpha(&self) -> bool {
        matches!(self, PixelFormat::LA8 | PixelFormat::RGBA8)
    }
}

/// Display timing of one animation frame, in seconds as `numerator / denominator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameDelay {
    numerator: u16,
    denominator: u16,
}

impl FrameDelay {
    /// A zero denominator means hundredths of a second.
    pub fn new(numerator: u16, denominator: u16) -> FrameDelay {
        FrameDelay {
            numerator,
            denominator: if denominator == 0 { 100 } else { denominator },
        }
    }

    pub fn numerator(&self) -> u16 {
        self.numerator
    }

    pub fn denominator(&self) -> u16 {
        self.denominator
    }

    pub fn as_secs_f32(&self) -> f32 {
        self.numerator as f32 / self.denominator as f32
    }

    /// Delay rounded to the nearest millisecond
    pub fn as_millis(&self) -> u32 {
        let num = self.numerator as u32 * 1000;
        let den = self.denominator as u32;
        (num + den / 2) / den
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
    frames: Vec<ImageFrame>,
    num_plays: Option<u32>,
}

impl Image {
    pub fn new(width: u32, height: u32, pixel_format: PixelFormat, frames: Vec<ImageFrame>) -> Image {
        Image {
            width,
            height,
            pixel_format,
            frames,
            num_plays: None,
        }
    }

    /// Creates an animated image. `num_plays` of 0 loops forever.
    pub fn animated(width: u32, height: u32, frames: Vec<ImageFrame>, num_plays: u32) -> Image {
        Image {
            width,
            height,
            pixel_format: PixelFormat::RGBA8,
            frames,
            num_plays: Some(num_plays),
        }
    }

    pub fn from_frame(frame: ImageFrame) -> Image {
        Image {
            width: frame.width(),
            height: frame.height(),
            pixel_format: frame.pixel_format(),
            frames: Vec::from([frame]),
            num_plays: None,
        }
    }

    pub fn from_pixels(width: u32, height: u32, pixels: PixelData) -> Image {
        let frame = ImageFrame::new(width, height, pixels, None);
        Image::from_frame(frame)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    /// First frame's pixels, the whole image for static inputs
    pub fn pixels(&self) -> Option<&PixelData> {
        self.frames.first().map(|frame| frame.pixels())
    }

    pub fn has_alpha(&self) -> bool {
        self.pixel_format.has_alpha()
    }

    pub fn frames(&self) -> &[ImageFrame] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<ImageFrame> {
        self.frames
    }

    pub fn is_animated(&self) -> bool {
        self.num_plays.is_some()
    }

    /// Loop count of an animated image, `Some(0)` loops forever
    pub fn num_plays(&self) -> Option<u32> {
        self.num_plays
    }

    /// Converts the image to RGBA8 format, consuming the original image.
    ///
    /// This method converts all frames to RGBA8 format, while `as_rgba8` returns
    /// vector of the first frame's pixels, converted to RGBA8 format without
    /// modifying the original image
    pub fn into_rgba8(self) -> Image {
        let frames = self.frames.into_iter().map(|frame| frame.into_rgba8()).collect();

        Image {
            width: self.width,
            height: self.height,
            pixel_format: PixelFormat::RGBA8,
            frames,
            num_plays: self.num_plays,
        }
    }

    /// Returns the first frame's pixels as a vector of RGB8 bytes
    pub fn as_rgb8(&self) -> Vec<u8> {
        self.frames.first().map(|frame| frame.as_rgb8()).unwrap_or_default()
    }

    /// Returns the first frame's pixels as a vector of RGBA8 bytes
    pub fn as_rgba8(&self) -> Vec<u8> {
        self.frames.first().map(|frame| frame.as_rgba8()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: PixelData,
    pub delay: Option<FrameDelay>,
}

impl ImageFrame {
    pub fn new(width: u32, height: u32, pixels: PixelData, delay: Option<FrameDelay>) -> ImageFrame {
        ImageFrame {
            width,
            height,
            pixels,
            delay,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &PixelData {
        &self.pixels
    }

    /// `None` for static images
    pub fn delay(&self) -> Option<FrameDelay> {
        self.delay
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixels.pixel_format()
    }

    pub fn has_alpha(&self) -> bool {
        self.pixel_format().has_alpha()
    }

    pub fn into_rgb8(self) -> ImageFrame {
        ImageFrame {
            pixels: self.pixels.into_rgb8(),
            ..self
        }
    }

    pub fn as_rgb8(&self) -> Vec<u8> {
        self.pixels.clone().into_rgb8().into_bytes()
    }

    pub fn into_rgba8(self) -> ImageFrame {
        ImageFrame {
            pixels: self.pixels.into_rgba8(),
            ..self
        }
    }

    pub fn as_rgba8(&self) -> Vec<u8> {
        self.pixels.clone().into_rgba8().into_bytes()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PixelData {
    L8(Vec<u8>),
    LA8(Vec<u8>),
    RGB8(Vec<u8>),
    RGBA8(Vec<u8>),
}

impl PixelData {
    pub fn pixel_format(&self) -> PixelFormat {
        match self {
            PixelData::L8(_) => PixelFormat::L8,
            PixelData::LA8(_) => PixelFormat::LA8,
            PixelData::RGB8(_) => PixelFormat::RGB8,
            PixelData::RGBA8(_) => PixelFormat::RGBA8,
        }
    }

    pub fn into_rgb8(self) -> PixelData {
        match self {
            PixelData::L8(pixels) => PixelData::RGB8(l8_to_rgb8(pixels)),
            PixelData::LA8(pixels) => PixelData::RGB8(la8_to_rgb8(pixels)),
            PixelData::RGB8(pixels) => PixelData::RGB8(pixels),
            PixelData::RGBA8(pixels) => PixelData::RGB8(drop_transparency_channel(pixels)),
        }
    }

    pub fn into_rgba8(self) -> PixelData {
        match self {
            PixelData::L8(pixels) => PixelData::RGBA8(l8_to_rgba8(pixels)),
            PixelData::LA8(pixels) => PixelData::RGBA8(la8_to_rgba8(pixels)),
            PixelData::RGB8(pixels) => PixelData::RGBA8(add_transparency_channel(pixels)),
            PixelData::RGBA8(pixels) => PixelData::RGBA8(pixels),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            PixelData::L8(pixels) | PixelData::LA8(pixels) | PixelData::RGB8(pixels) | PixelData::RGBA8(pixels) => {
                pixels
            }
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            PixelData::L8(pixels) | PixelData::LA8(pixels) | PixelData::RGB8(pixels) | PixelData::RGBA8(pixels) => {
                pixels
            }
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}
