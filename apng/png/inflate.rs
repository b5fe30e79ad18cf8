use std::io::Read;

use flate2::read::ZlibDecoder;

use crate::log_warn;
use crate::utils::error::{ApngError, ApngResult};

/// Size of the filtered scanline buffer for a `width x height` rectangle
pub fn filtered_len(width: u32, height: u32, bytes_per_pixel: usize) -> ApngResult<usize> {
    (width as usize)
        .checked_mul(bytes_per_pixel)
        .and_then(|row| row.checked_add(1))
        .and_then(|row| row.checked_mul(height as usize))
        .ok_or(ApngError::InvalidDimensions { width, height })
}

/// Inflates a zlib stream, reading at most `expected_len` bytes of output.
///
/// Output shorter than `expected_len` is an error, anything past it is dropped.
pub fn inflate(compressed: &[u8], expected_len: usize) -> ApngResult<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(compressed).take(expected_len as u64 + 1);
    let mut decompressed = Vec::with_capacity(expected_len + 1);

    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| ApngError::Compression(format!("corrupt zlib stream: {}", e)))?;

    if decompressed.len() < expected_len {
        return Err(ApngError::Compression(format!(
            "zlib stream ended after {} bytes, expected {}",
            decompressed.len(),
            expected_len
        )));
    }

    if decompressed.len() > expected_len {
        log_warn!("Ignoring inflated data past the expected {} bytes", expected_len);
        decompressed.truncate(expected_len);
    }

    Ok(decompressed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::ErrorKind;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn compress(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn inflates_exact_length() -> ApngResult<()> {
        let raw: Vec<u8> = (0..=255).collect();
        assert_eq!(inflate(&compress(&raw), raw.len())?, raw);
        Ok(())
    }

    #[test]
    fn short_output_is_a_compression_error() {
        let err = inflate(&compress(&[1, 2, 3]), 4).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Compression);
    }

    #[test]
    fn extra_output_is_dropped() -> ApngResult<()> {
        assert_eq!(inflate(&compress(&[1, 2, 3, 4, 5]), 3)?, vec![1, 2, 3]);
        Ok(())
    }

    #[test]
    fn garbage_is_a_compression_error() {
        let err = inflate(&[0x12, 0x34, 0x56, 0x78], 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Compression);

        let mut truncated = compress(&[7; 64]);
        truncated.truncate(truncated.len() / 2);
        let err = inflate(&truncated, 64).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Compression);
    }

    #[test]
    fn filtered_len_counts_filter_bytes() -> ApngResult<()> {
        assert_eq!(filtered_len(2, 2, 3)?, 14);
        assert_eq!(filtered_len(1, 5, 4)?, 25);
        Ok(())
    }
}
