/// Decoder options
///
/// All options have safe defaults, setters consume and return the options
/// so they can be chained:
///
/// ```
/// use apng::DecodeOptions;
///
/// let options = DecodeOptions::default().set_max_width(4096).set_strict_crc(true);
/// assert_eq!(options.get_max_width(), 4096);
/// ```
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DecodeOptions {
    /// Images wider than this are rejected before any pixel buffer is allocated.
    ///
    /// - Default value: 16384
    max_width: u32,
    /// Images taller than this are rejected before any pixel buffer is allocated.
    ///
    /// - Default value: 16384
    max_height: u32,
    /// Whether chunk CRCs are verified at all.
    ///
    /// - Default value: true
    confirm_crc: bool,
    /// Whether a CRC mismatch on an ancillary chunk is fatal.
    /// Critical chunks always fail on mismatch while `confirm_crc` is set.
    ///
    /// - Default value: false
    strict_crc: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions {
            max_width: 1 << 14,
            max_height: 1 << 14,
            confirm_crc: true,
            strict_crc: false,
        }
    }
}

impl DecodeOptions {
    /// Options for tooling that prefers getting pixels over rejecting damaged files
    pub fn new_lenient() -> DecodeOptions {
        DecodeOptions::default().set_confirm_crc(false)
    }

    /// Options that treat every checksum mismatch as fatal
    pub fn new_strict() -> DecodeOptions {
        DecodeOptions::default().set_strict_crc(true)
    }

    pub const fn get_max_width(&self) -> u32 {
        self.max_width
    }

    pub const fn get_max_height(&self) -> u32 {
        self.max_height
    }

    pub const fn get_confirm_crc(&self) -> bool {
        self.confirm_crc
    }

    pub const fn get_strict_crc(&self) -> bool {
        self.strict_crc
    }

    pub fn set_max_width(mut self, width: u32) -> Self {
        self.max_width = width;
        self
    }

    pub fn set_max_height(mut self, height: u32) -> Self {
        self.max_height = height;
        self
    }

    pub fn set_confirm_crc(mut self, yes: bool) -> Self {
        self.confirm_crc = yes;
        self
    }

    pub fn set_strict_crc(mut self, yes: bool) -> Self {
        self.strict_crc = yes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::DecodeOptions;

    #[test]
    fn defaults_verify_crc_leniently() {
        let options = DecodeOptions::default();

        assert!(options.get_confirm_crc());
        assert!(!options.get_strict_crc());
        assert_eq!(options.get_max_width(), 16384);
        assert_eq!(options.get_max_height(), 16384);
    }

    #[test]
    fn presets() {
        assert!(!DecodeOptions::new_lenient().get_confirm_crc());
        assert!(DecodeOptions::new_strict().get_strict_crc());
    }
}
