use crate::utils::error::{ApngError, ApngResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterType {
    None = 0,
    Sub = 1,
    Up = 2,
    Average = 3,
    Paeth = 4,
}

impl FilterType {
    pub fn from_u8(value: u8) -> Option<FilterType> {
        match value {
            0 => Some(FilterType::None),
            1 => Some(FilterType::Sub),
            2 => Some(FilterType::Up),
            3 => Some(FilterType::Average),
            4 => Some(FilterType::Paeth),
            _ => None,
        }
    }
}

pub fn paeth_predictor(a: u8, b: u8, c: u8) -> u8 {
    // a = left, b = above, c = upper left
    let a = a as i16;
    let b = b as i16;
    let c = c as i16;

    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();

    if pa <= pb && pa <= pc {
        a as u8
    } else if pb <= pc {
        b as u8
    } else {
        c as u8
    }
}

/// Streaming scanline reconstruction.
///
/// Keeps only the previous reconstructed row; the first row sees an all-zero
/// row above it.
#[derive(Debug)]
pub struct Defilterer {
    bpp: usize,
    prior: Vec<u8>,
    current: Vec<u8>,
    row: usize,
}

impl Defilterer {
    pub fn new(row_bytes: usize, bpp: usize) -> Self {
        Defilterer {
            bpp,
            prior: vec![0; row_bytes],
            current: vec![0; row_bytes],
            row: 0,
        }
    }

    /// Reconstructs one scanline (filter byte included) and returns the raw row
    pub fn unfilter_row(&mut self, scanline: &[u8]) -> ApngResult<&[u8]> {
        let row = self.row;
        let (&filter_byte, filtered) = scanline
            .split_first()
            .ok_or_else(|| ApngError::Format(format!("scanline {} is empty", row)))?;

        if filtered.len() != self.current.len() {
            return Err(ApngError::Format(format!(
                "scanline {} has {} bytes, expected {}",
                row,
                filtered.len(),
                self.current.len()
            )));
        }

        let filter_type = FilterType::from_u8(filter_byte).ok_or(ApngError::Filter {
            row,
            filter_type: filter_byte,
        })?;

        std::mem::swap(&mut self.prior, &mut self.current);

        let bpp = self.bpp;
        let prior = &self.prior;
        let current = &mut self.current;

        match filter_type {
            FilterType::None => current.copy_from_slice(filtered),
            FilterType::Sub => {
                for i in 0..filtered.len() {
                    let left = if i >= bpp { current[i - bpp] } else { 0 };
                    current[i] = filtered[i].wrapping_add(left);
                }
            }
            FilterType::Up => {
                for i in 0..filtered.len() {
                    current[i] = filtered[i].wrapping_add(prior[i]);
                }
            }
            FilterType::Average => {
                for i in 0..filtered.len() {
                    let left = if i >= bpp { current[i - bpp] as u16 } else { 0 };
                    let above = prior[i] as u16;
                    current[i] = filtered[i].wrapping_add(((left + above) / 2) as u8);
                }
            }
            FilterType::Paeth => {
                for i in 0..filtered.len() {
                    let (left, upper_left) = if i >= bpp { (current[i - bpp], prior[i - bpp]) } else { (0, 0) };
                    current[i] = filtered[i].wrapping_add(paeth_predictor(left, prior[i], upper_left));
                }
            }
        }

        self.row += 1;

        Ok(&self.current)
    }
}

/// Reverses the per-scanline filters of a `width x height` rectangle.
pub fn unfilter_scanlines(data: &[u8], width: u32, height: u32, bpp: usize) -> ApngResult<Vec<u8>> {
    let row_bytes = width as usize * bpp;
    let scanline_bytes = row_bytes + 1;
    let height = height as usize;

    if data.len() < scanline_bytes * height {
        return Err(ApngError::Compression(format!(
            "{} bytes of scanlines, expected {}",
            data.len(),
            scanline_bytes * height
        )));
    }

    let mut defilterer = Defilterer::new(row_bytes, bpp);
    let mut unfiltered = Vec::with_capacity(row_bytes * height);

    for scanline in data.chunks_exact(scanline_bytes).take(height) {
        unfiltered.extend_from_slice(defilterer.unfilter_row(scanline)?);
    }

    Ok(unfiltered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::ErrorKind;

    #[test]
    fn paeth_prefers_left_then_above_then_upper_left() {
        // p = 10 + 20 - 15 = 15, pa = 5, pb = 5, pc = 0
        assert_eq!(paeth_predictor(10, 20, 15), 15);
        // p = 30, pa = 10, pb = 0, pc = 10
        assert_eq!(paeth_predictor(20, 30, 20), 30);
        // p = 30, pa = 0, pb = 10
        assert_eq!(paeth_predictor(30, 20, 20), 30);
        // all equal
        assert_eq!(paeth_predictor(10, 10, 10), 10);
        // p = 5, left and upper left tie at 5, left wins
        assert_eq!(paeth_predictor(0, 15, 10), 0);
        // p = 5, above and upper left tie at 5, above wins
        assert_eq!(paeth_predictor(15, 0, 10), 0);
    }

    #[test]
    fn paeth_at_origin_contributes_nothing() -> ApngResult<()> {
        for value in 0..=255u8 {
            assert_eq!(paeth_predictor(0, 0, 0), 0);
            let mut defilterer = Defilterer::new(1, 1);
            assert_eq!(defilterer.unfilter_row(&[4, value])?, &[value]);
        }
        Ok(())
    }

    #[test]
    fn first_row_and_column_see_zero_neighbors() -> ApngResult<()> {
        // Average on row 0: only the left neighbor contributes, halved
        let mut defilterer = Defilterer::new(4, 2);
        assert_eq!(defilterer.unfilter_row(&[3, 10, 20, 10, 20])?, &[10, 20, 15, 30]);

        // Up on row 0 is a no-op
        let mut defilterer = Defilterer::new(3, 1);
        assert_eq!(defilterer.unfilter_row(&[2, 1, 2, 3])?, &[1, 2, 3]);

        Ok(())
    }

    #[test]
    fn reverses_every_filter() -> ApngResult<()> {
        // 2x2, 1 byte per pixel. Rows [1, 2] and [3, 5]
        let data = [
            1, 1, 1, // Sub
            4, 2, 2, // Paeth: above=[1,2]; lane0 pred=1, lane1 pred=left(3)
        ];
        assert_eq!(unfilter_scanlines(&data, 2, 2, 1)?, vec![1, 2, 3, 5]);

        let data = [
            0, 100, 200, // None
            2, 10, 250,  // Up: wraps 200 + 250
            3, 5, 0,     // Average
        ];
        let rows = unfilter_scanlines(&data, 2, 3, 1)?;
        assert_eq!(rows[..4], [100, 200, 110, 194]);
        // lane0: 5 + 110/2 = 60, lane1: 0 + (60 + 194)/2 = 127
        assert_eq!(rows[4..], [60, 127]);

        Ok(())
    }

    #[test]
    fn unknown_filter_reports_row() {
        let data = [0, 1, 5, 1];
        let err = unfilter_scanlines(&data, 1, 2, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Filter);
        assert!(matches!(err, ApngError::Filter { row: 1, filter_type: 5 }));
    }

    #[test]
    fn short_input_is_rejected() {
        let err = unfilter_scanlines(&[0, 1], 2, 1, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Compression);
    }
}
