use std::io::{Read, Seek, SeekFrom};

/// Big-endian byte reader over a seekable source.
///
/// Tracks the total source length once at construction so callers can bound
/// declared lengths against what is actually left.
#[derive(Debug)]
pub struct ByteReader<R: Read + Seek> {
    reader: R,
    position: u64,
    end: u64,
}

impl<R: Read + Seek> ByteReader<R> {
    pub fn new(mut reader: R) -> Result<Self, std::io::Error> {
        let position = reader.stream_position()?;
        let end = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(position))?;

        Ok(ByteReader { reader, position, end })
    }

    /// Reads a big-endian 32-bit value.
    ///
    /// # Returns
    /// - The value read
    /// - `std::io::Error` if an I/O error occurs
    pub fn read_u32(&mut self) -> Result<u32, std::io::Error> {
        let mut bytes = [0u8; 4];
        self.read_exact(&mut bytes)?;
        Ok(u32::from_be_bytes(bytes))
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), std::io::Error> {
        self.reader.read_exact(buf)?;
        self.position += buf.len() as u64;
        Ok(())
    }

    /// Reads specified number of bytes and returns them as a vector.
    ///
    /// Callers are expected to check `bytes_left` first, the buffer is
    /// allocated up front.
    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, std::io::Error> {
        let mut bytes = vec![0; n];
        self.read_exact(&mut bytes)?;
        Ok(bytes)
    }

    /// Returns number of bytes left in the source.
    pub fn bytes_left(&self) -> u64 {
        self.end.saturating_sub(self.position)
    }

    pub fn position(&self) -> u64 {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::ByteReader;
    use std::io::Cursor;

    #[test]
    fn reads_big_endian_values() -> Result<(), Box<dyn std::error::Error>> {
        let data = vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let mut reader = ByteReader::new(Cursor::new(data))?;

        assert_eq!(reader.bytes_left(), 7);
        assert_eq!(reader.read_u32()?, 0x0102_0304);
        assert_eq!(reader.read_bytes(3)?, vec![0x05, 0x06, 0x07]);
        assert_eq!(reader.bytes_left(), 0);
        assert_eq!(reader.position(), 7);

        assert!(reader.read_u32().is_err());

        Ok(())
    }

    #[test]
    fn starts_from_current_position() -> Result<(), Box<dyn std::error::Error>> {
        let mut cursor = Cursor::new(vec![9u8; 10]);
        cursor.set_position(4);

        let reader = ByteReader::new(cursor)?;
        assert_eq!(reader.bytes_left(), 6);

        Ok(())
    }
}
