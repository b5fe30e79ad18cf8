use std::fmt::{self, Display, Formatter};
use std::io::{Read, Seek};

use crate::utils::bytereader::ByteReader;
use crate::utils::error::{ApngError, ApngResult};
use crate::utils::options::DecodeOptions;
use crate::{log_debug, log_warn};

pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Chunk lengths are limited to 2^31 - 1 bytes
const MAX_CHUNK_LENGTH: u32 = 0x7FFF_FFFF;

/// Length + type + crc
const CHUNK_OVERHEAD: u64 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkType {
    // Critical chunks
    IHDR, // Image header
    IDAT, // Image data
    IEND, // End of image

    // Animation chunks
    ACTL, // Animation control
    FCTL, // Frame control
    FDAT, // Frame data

    Unknown([u8; 4]),
}

impl ChunkType {
    pub fn from_bytes(bytes: [u8; 4]) -> ChunkType {
        match &bytes {
            b"IHDR" => ChunkType::IHDR,
            b"IDAT" => ChunkType::IDAT,
            b"IEND" => ChunkType::IEND,
            b"acTL" => ChunkType::ACTL,
            b"fcTL" => ChunkType::FCTL,
            b"fdAT" => ChunkType::FDAT,
            _ => ChunkType::Unknown(bytes),
        }
    }

    pub fn to_bytes(self) -> [u8; 4] {
        match self {
            ChunkType::IHDR => *b"IHDR",
            ChunkType::IDAT => *b"IDAT",
            ChunkType::IEND => *b"IEND",
            ChunkType::ACTL => *b"acTL",
            ChunkType::FCTL => *b"fcTL",
            ChunkType::FDAT => *b"fdAT",
            ChunkType::Unknown(bytes) => bytes,
        }
    }

    /// Bit 5 of the first type byte is clear (uppercase letter) for critical chunks
    pub fn is_critical(self) -> bool {
        self.to_bytes()[0] & 0x20 == 0
    }
}

impl Display for ChunkType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.to_bytes()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub chunk_type: ChunkType,
    pub data: Vec<u8>,
}

pub fn chunk_crc(chunk_type: &[u8; 4], data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    hasher.finalize()
}

/// Splits a PNG byte stream into its signature and a sequence of verified chunks.
pub struct ChunkReader<R: Read + Seek> {
    reader: ByteReader<R>,
    options: DecodeOptions,
    skipped: Vec<ChunkType>,
}

impl<R: Read + Seek> ChunkReader<R> {
    pub fn new(reader: R, options: DecodeOptions) -> ApngResult<Self> {
        Ok(ChunkReader {
            reader: ByteReader::new(reader)?,
            options,
            skipped: Vec::new(),
        })
    }

    pub fn read_signature(&mut self) -> ApngResult<()> {
        if self.reader.bytes_left() < PNG_SIGNATURE.len() as u64 {
            return Err(ApngError::Format("stream too short for a PNG signature".into()));
        }

        let mut signature = [0u8; 8];
        self.reader.read_exact(&mut signature)?;

        if signature != PNG_SIGNATURE {
            return Err(ApngError::Format(format!("invalid PNG signature {:02x?}", signature)));
        }

        Ok(())
    }

    /// Chunks dropped because of a tolerated CRC mismatch
    pub fn skipped(&self) -> &[ChunkType] {
        &self.skipped
    }

    pub fn bytes_left(&self) -> u64 {
        self.reader.bytes_left()
    }

    /// Reads the next chunk whose CRC checks out.
    ///
    /// Returns `Ok(None)` once the source holds no further complete chunk header,
    /// so a stream cut between chunks surfaces later as `IncompleteStream` from the
    /// dispatcher. A chunk whose declared payload runs past the end of the source
    /// fails here with `Format`.
    pub fn next_chunk(&mut self) -> ApngResult<Option<Chunk>> {
        loop {
            let left = self.reader.bytes_left();
            if left == 0 {
                return Ok(None);
            }

            if left < CHUNK_OVERHEAD {
                log_warn!("Ignoring {} trailing bytes at offset {}", left, self.reader.position());
                return Ok(None);
            }

            let offset = self.reader.position();
            let length = self.reader.read_u32()?;

            let mut type_bytes = [0u8; 4];
            self.reader.read_exact(&mut type_bytes)?;
            let chunk_type = ChunkType::from_bytes(type_bytes);

            if length > MAX_CHUNK_LENGTH {
                return Err(ApngError::Format(format!(
                    "chunk {} at offset {} declares length {} above the 2^31-1 limit",
                    chunk_type, offset, length
                )));
            }

            // Payload plus trailing CRC must fit in what is left
            if length as u64 + 4 > self.reader.bytes_left() {
                return Err(ApngError::Format(format!(
                    "chunk {} at offset {} declares length {} but only {} bytes remain",
                    chunk_type,
                    offset,
                    length,
                    self.reader.bytes_left().saturating_sub(4)
                )));
            }

            let data = self.reader.read_bytes(length as usize)?;
            let crc = self.reader.read_u32()?;

            log_debug!("Chunk {} at offset {}, {} bytes", chunk_type, offset, length);

            if !self.options.get_confirm_crc() {
                return Ok(Some(Chunk { chunk_type, data }));
            }

            let calculated = chunk_crc(&type_bytes, &data);
            if calculated == crc {
                return Ok(Some(Chunk { chunk_type, data }));
            }

            if chunk_type.is_critical() || self.options.get_strict_crc() {
                return Err(ApngError::Checksum {
                    chunk: chunk_type.to_string(),
                    expected: crc,
                    calculated,
                });
            }

            log_warn!(
                "CRC mismatch for chunk {}: expected 0x{:08x}, calculated 0x{:08x}, skipping",
                chunk_type,
                crc,
                calculated
            );
            self.skipped.push(chunk_type);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::ErrorKind;
    use std::io::Cursor;

    fn raw_chunk(chunk_type: &[u8; 4], data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        out.extend_from_slice(chunk_type);
        out.extend_from_slice(data);
        out.extend_from_slice(&chunk_crc(chunk_type, data).to_be_bytes());
        out
    }

    fn reader(bytes: Vec<u8>, options: DecodeOptions) -> ChunkReader<Cursor<Vec<u8>>> {
        ChunkReader::new(Cursor::new(bytes), options).expect("cursor is seekable")
    }

    #[test]
    fn crc_matches_known_iend_value() {
        // Every PNG ends with AE 42 60 82
        assert_eq!(chunk_crc(b"IEND", &[]), 0xAE42_6082);
    }

    #[test]
    fn critical_bit_follows_case_of_first_letter() {
        assert!(ChunkType::IHDR.is_critical());
        assert!(ChunkType::IDAT.is_critical());
        assert!(ChunkType::IEND.is_critical());
        assert!(!ChunkType::ACTL.is_critical());
        assert!(!ChunkType::FCTL.is_critical());
        assert!(!ChunkType::FDAT.is_critical());
        assert!(!ChunkType::from_bytes(*b"tEXt").is_critical());
        assert!(ChunkType::from_bytes(*b"PLTE").is_critical());
    }

    #[test]
    fn rejects_bad_signature() {
        let mut bytes = PNG_SIGNATURE.to_vec();
        bytes[1] = b'X';

        let err = reader(bytes, DecodeOptions::default()).read_signature().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);

        let err = reader(vec![0x89, 0x50], DecodeOptions::default()).read_signature().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn reads_chunks_in_order() -> Result<(), Box<dyn std::error::Error>> {
        let mut bytes = PNG_SIGNATURE.to_vec();
        bytes.extend(raw_chunk(b"tEXt", b"hello"));
        bytes.extend(raw_chunk(b"IEND", &[]));

        let mut chunks = reader(bytes, DecodeOptions::default());
        chunks.read_signature()?;

        let first = chunks.next_chunk()?.expect("text chunk");
        assert_eq!(first.chunk_type, ChunkType::Unknown(*b"tEXt"));
        assert_eq!(first.data, b"hello");

        let second = chunks.next_chunk()?.expect("end chunk");
        assert_eq!(second.chunk_type, ChunkType::IEND);
        assert!(chunks.next_chunk()?.is_none());

        Ok(())
    }

    #[test]
    fn ancillary_crc_mismatch_is_skipped() -> Result<(), Box<dyn std::error::Error>> {
        let mut bad = raw_chunk(b"fcTL", &[0u8; 26]);
        let last = bad.len() - 1;
        bad[last] ^= 0xFF;

        let mut bytes = bad;
        bytes.extend(raw_chunk(b"IEND", &[]));

        let mut chunks = reader(bytes, DecodeOptions::default());
        let chunk = chunks.next_chunk()?.expect("end chunk");

        assert_eq!(chunk.chunk_type, ChunkType::IEND);
        assert_eq!(chunks.skipped(), &[ChunkType::FCTL]);

        Ok(())
    }

    #[test]
    fn ancillary_crc_mismatch_is_fatal_when_strict() {
        let mut bytes = raw_chunk(b"tEXt", b"abc");
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;

        let err = reader(bytes, DecodeOptions::new_strict()).next_chunk().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Checksum);
    }

    #[test]
    fn critical_crc_mismatch_is_fatal() {
        let mut bytes = raw_chunk(b"IDAT", &[1, 2, 3]);
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;

        let err = reader(bytes, DecodeOptions::default()).next_chunk().unwrap_err();
        match err {
            ApngError::Checksum { chunk, .. } => assert_eq!(chunk, "IDAT"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn crc_is_ignored_when_not_confirmed() -> Result<(), Box<dyn std::error::Error>> {
        let mut bytes = raw_chunk(b"IDAT", &[1, 2, 3]);
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;

        let chunk = reader(bytes, DecodeOptions::new_lenient()).next_chunk()?.expect("data chunk");
        assert_eq!(chunk.data, vec![1, 2, 3]);

        Ok(())
    }

    #[test]
    fn declared_length_is_bounded_by_remaining_bytes() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0x7000_0000u32.to_be_bytes());
        bytes.extend_from_slice(b"IDAT");
        bytes.extend_from_slice(&[0u8; 16]);

        let err = reader(bytes, DecodeOptions::default()).next_chunk().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn declared_length_above_format_limit_fails() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0xFFFF_FFFFu32.to_be_bytes());
        bytes.extend_from_slice(b"IDAT");
        bytes.extend_from_slice(&[0u8; 4]);

        let err = reader(bytes, DecodeOptions::default()).next_chunk().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn short_trailing_garbage_ends_the_stream() -> Result<(), Box<dyn std::error::Error>> {
        let mut chunks = reader(vec![0, 0, 0], DecodeOptions::default());
        assert!(chunks.next_chunk()?.is_none());

        Ok(())
    }
}
