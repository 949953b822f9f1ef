//! Output resolution table
//!
//! Translates between pixel sizes and the framework's single-bit
//! resolution values. Bit `i` of a [`Resolution`] selects row `i`.

use crate::error::{Error, Result};
use crate::framework::Dimension;

/// Known resolutions, in resolution-bit order
pub const MODE_TABLE: [(i32, i32); 23] = [
    (640, 480),
    (720, 480),
    (720, 576),
    (800, 600),
    (1024, 768),
    (1152, 864),
    (1280, 720),
    (1280, 768),
    (1280, 960),
    (1280, 1024),
    (1400, 1050),
    (1600, 1200),
    (1920, 1080),
    (960, 540),
    (1440, 540),
    (800, 480),
    (1024, 600),
    (1366, 768),
    (1920, 1200),
    (2560, 1440),
    (2560, 1600),
    (3840, 2160),
    (4096, 2160),
];

/// Output resolution as a bitmask; zero means unknown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Resolution(u32);

impl Resolution {
    pub const UNKNOWN: Resolution = Resolution(0);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Resolution value selecting table row `index`
    pub fn from_index(index: usize) -> Option<Self> {
        (index < MODE_TABLE.len()).then(|| Self(1 << index))
    }

    pub fn is_unknown(self) -> bool {
        self.0 == 0
    }
}

/// Table row matching the size exactly, if any
pub fn size_to_index(w: i32, h: i32) -> Option<usize> {
    MODE_TABLE.iter().position(|&(tw, th)| tw == w && th == h)
}

/// Resolution value for a size, `UNKNOWN` for custom sizes
pub fn resolution_for(size: Dimension) -> Resolution {
    size_to_index(size.w, size.h)
        .and_then(Resolution::from_index)
        .unwrap_or(Resolution::UNKNOWN)
}

/// Size selected by a resolution value.
///
/// Exactly one bit must be set and it must address a table row.
pub fn index_to_size(resolution: Resolution) -> Result<Dimension> {
    let bits = resolution.bits();
    if bits.count_ones() != 1 {
        return Err(Error::InvalidArgument("resolution must have exactly one bit set"));
    }

    let index = bits.trailing_zeros() as usize;
    let (w, h) = MODE_TABLE
        .get(index)
        .copied()
        .ok_or(Error::InvalidArgument("resolution outside of the mode table"))?;

    Ok(Dimension::new(w, h))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_entries_round_trip() {
        for &(w, h) in MODE_TABLE.iter() {
            let index = size_to_index(w, h).unwrap();
            let resolution = Resolution::from_index(index).unwrap();
            assert_eq!(index_to_size(resolution).unwrap(), Dimension::new(w, h));
        }
    }

    #[test]
    fn test_full_hd_lookup() {
        let index = size_to_index(1920, 1080).unwrap();
        assert_eq!(index, 12);
        let resolution = resolution_for(Dimension::new(1920, 1080));
        assert_eq!(resolution.bits(), 1 << 12);
        assert_eq!(index_to_size(resolution).unwrap(), Dimension::new(1920, 1080));
    }

    #[test]
    fn test_custom_size_is_unknown() {
        assert_eq!(size_to_index(1234, 567), None);
        assert!(resolution_for(Dimension::new(1234, 567)).is_unknown());
        // transposed sizes are not table entries either
        assert!(resolution_for(Dimension::new(1080, 1920)).is_unknown());
    }

    #[test]
    fn test_index_to_size_rejects_bad_masks() {
        assert!(matches!(
            index_to_size(Resolution::UNKNOWN),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            index_to_size(Resolution::from_bits(0b11)),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            index_to_size(Resolution::from_bits(1 << 23)),
            Err(Error::InvalidArgument(_))
        ));
        assert!(Resolution::from_index(MODE_TABLE.len()).is_none());
    }
}
