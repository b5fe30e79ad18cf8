//! PNG and APNG decoding.
//!
//! ```no_run
//! use apng::PngDecoder;
//!
//! let mut decoder = PngDecoder::open("animation.png")?;
//! let image = decoder.decode()?;
//!
//! for frame in image.frames() {
//!     println!("{}x{} for {:?}", frame.width(), frame.height(), frame.delay());
//! }
//! # Ok::<(), apng::ApngError>(())
//! ```

mod png;
mod utils;

pub use png::dispatcher::{AnimationControl, BlendOp, ColorType, DisposeOp, FrameControl, ImageHeader};
pub use png::PngDecoder;
pub use utils::error::{ApngError, ApngResult, ErrorKind};
pub use utils::image::{FrameDelay, Image, ImageFrame, PixelData, PixelFormat};
pub use utils::info::PngInfo;
pub use utils::options::DecodeOptions;

use std::io::Cursor;

/// Decodes an in-memory PNG or APNG with default options
pub fn decode(data: &[u8]) -> ApngResult<Image> {
    decode_with_options(data, DecodeOptions::default())
}

pub fn decode_with_options(data: &[u8], options: DecodeOptions) -> ApngResult<Image> {
    PngDecoder::with_options(Cursor::new(data), options).decode()
}
