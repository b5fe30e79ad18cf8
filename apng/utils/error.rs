use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Format,
    Sequence,
    Checksum,
    Compression,
    Filter,
    UnsupportedFormat,
    IncompleteStream,
    Composition,
    InvalidDimensions,
}

#[derive(Debug)]
pub enum ApngError {
    IoError(io::Error),
    /// Bad signature, malformed chunk framing or malformed fixed-size payloads
    Format(String),
    /// Chunks out of the required order
    Sequence(String),
    Checksum {
        chunk: String,
        expected: u32,
        calculated: u32,
    },
    Compression(String),
    Filter {
        row: usize,
        filter_type: u8,
    },
    UnsupportedFormat(String),
    /// End of stream reached before all mandatory chunks were seen
    IncompleteStream(String),
    Composition(String),
    InvalidDimensions {
        width: u32,
        height: u32,
    },
}

impl ApngError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApngError::IoError(_) => ErrorKind::Io,
            ApngError::Format(_) => ErrorKind::Format,
            ApngError::Sequence(_) => ErrorKind::Sequence,
            ApngError::Checksum { .. } => ErrorKind::Checksum,
            ApngError::Compression(_) => ErrorKind::Compression,
            ApngError::Filter { .. } => ErrorKind::Filter,
            ApngError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            ApngError::IncompleteStream(_) => ErrorKind::IncompleteStream,
            ApngError::Composition(_) => ErrorKind::Composition,
            ApngError::InvalidDimensions { .. } => ErrorKind::InvalidDimensions,
        }
    }
}

impl Error for ApngError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ApngError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl Display for ApngError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ApngError::IoError(err) => write!(f, "I/O error: {}", err),
            ApngError::Format(msg) => write!(f, "Malformed PNG stream: {}", msg),
            ApngError::Sequence(msg) => write!(f, "Chunk out of order: {}", msg),
            ApngError::Checksum {
                chunk,
                expected,
                calculated,
            } => write!(
                f,
                "CRC mismatch for chunk {}: expected 0x{:08x}, calculated 0x{:08x}",
                chunk, expected, calculated
            ),
            ApngError::Compression(msg) => write!(f, "Compressed data error: {}", msg),
            ApngError::Filter { row, filter_type } => {
                write!(f, "Invalid filter type {} on scanline {}", filter_type, row)
            }
            ApngError::UnsupportedFormat(msg) => write!(f, "Unsupported PNG layout: {}", msg),
            ApngError::IncompleteStream(msg) => write!(f, "Incomplete PNG stream: {}", msg),
            ApngError::Composition(msg) => write!(f, "Animation composition error: {}", msg),
            ApngError::InvalidDimensions { width, height } => {
                write!(f, "Invalid image dimensions: {}x{}", width, height)
            }
        }
    }
}

impl From<io::Error> for ApngError {
    fn from(error: io::Error) -> Self {
        ApngError::IoError(error)
    }
}

// Result type alias for decoding operations
pub type ApngResult<T> = Result<T, ApngError>;
