//! Access width tiers and byte-lane conversion helpers.

use core::fmt;

/// Number of supported power-of-two access width tiers.
pub const WIDTH_TIER_COUNT: usize = 4;

/// Power-of-two bus access widths supported by an address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum AccessWidth {
    /// 8-bit access.
    Byte,
    /// 16-bit access.
    Word,
    /// 32-bit access.
    Dword,
    /// 64-bit access.
    Qword,
}

/// All width tiers in ascending order, indexed by [`AccessWidth::tier`].
pub const WIDTH_TIERS: [AccessWidth; WIDTH_TIER_COUNT] = [
    AccessWidth::Byte,
    AccessWidth::Word,
    AccessWidth::Dword,
    AccessWidth::Qword,
];

impl AccessWidth {
    /// Returns the access size in bytes.
    #[must_use]
    pub const fn bytes(self) -> u64 {
        match self {
            Self::Byte => 1,
            Self::Word => 2,
            Self::Dword => 4,
            Self::Qword => 8,
        }
    }

    /// Returns the access size in bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        match self {
            Self::Byte => 8,
            Self::Word => 16,
            Self::Dword => 32,
            Self::Qword => 64,
        }
    }

    /// Returns the tier index into per-width range tables.
    #[must_use]
    pub const fn tier(self) -> usize {
        match self {
            Self::Byte => 0,
            Self::Word => 1,
            Self::Dword => 2,
            Self::Qword => 3,
        }
    }

    /// Returns the width holding `bytes`, when `bytes` is a supported tier.
    #[must_use]
    pub const fn from_bytes(bytes: u64) -> Option<Self> {
        match bytes {
            1 => Some(Self::Byte),
            2 => Some(Self::Word),
            4 => Some(Self::Dword),
            8 => Some(Self::Qword),
            _ => None,
        }
    }

    /// Returns the next narrower tier, or `None` for [`Self::Byte`].
    #[must_use]
    pub const fn half(self) -> Option<Self> {
        match self {
            Self::Byte => None,
            Self::Word => Some(Self::Byte),
            Self::Dword => Some(Self::Word),
            Self::Qword => Some(Self::Dword),
        }
    }

    /// Returns the value mask for this width (`0xFF` for bytes, and so on).
    #[must_use]
    pub const fn value_mask(self) -> u64 {
        match self {
            Self::Qword => u64::MAX,
            _ => (1_u64 << self.bits()) - 1,
        }
    }
}

impl fmt::Display for AccessWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.bits())
    }
}

/// Byte-lane convention of an address space.
///
/// This fixes which byte lanes a sub-native-width access touches inside a
/// wider cell; it is hardware-family-specific and therefore an explicit
/// configuration parameter rather than a global rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Endianness {
    /// Lower addresses hold the least significant lanes.
    #[default]
    Little,
    /// Lower addresses hold the most significant lanes.
    Big,
}

/// Returns the bit shift placing an `inner`-wide lane at byte offset
/// `lane_offset` inside an `outer`-wide value.
///
/// `lane_offset` is the byte distance from the aligned outer cell to the
/// accessed lane and must satisfy `lane_offset + inner.bytes() <= outer.bytes()`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn lane_shift(
    endianness: Endianness,
    outer: AccessWidth,
    inner: AccessWidth,
    lane_offset: u64,
) -> u32 {
    let byte_offset = match endianness {
        Endianness::Little => lane_offset,
        Endianness::Big => outer.bytes() - inner.bytes() - lane_offset,
    };
    (byte_offset as u32) * 8
}

/// Extracts an `inner`-wide lane from an `outer`-wide value.
#[must_use]
pub const fn extract_lanes(
    endianness: Endianness,
    outer: AccessWidth,
    inner: AccessWidth,
    lane_offset: u64,
    value: u64,
) -> u64 {
    (value >> lane_shift(endianness, outer, inner, lane_offset)) & inner.value_mask()
}

/// Replaces an `inner`-wide lane inside an `outer`-wide value, leaving the
/// remaining lanes untouched (the read-modify-write merge step).
#[must_use]
pub const fn merge_lanes(
    endianness: Endianness,
    outer: AccessWidth,
    inner: AccessWidth,
    lane_offset: u64,
    outer_value: u64,
    inner_value: u64,
) -> u64 {
    let shift = lane_shift(endianness, outer, inner, lane_offset);
    let mask = inner.value_mask() << shift;
    (outer_value & !mask) | ((inner_value & inner.value_mask()) << shift)
}

/// Composes a full value from two half-width values, where `low_addr` was
/// read at the lower address and `high_addr` at the higher one.
#[must_use]
pub const fn combine_halves(
    endianness: Endianness,
    half: AccessWidth,
    low_addr: u64,
    high_addr: u64,
) -> u64 {
    let bits = half.bits();
    let low_addr = low_addr & half.value_mask();
    let high_addr = high_addr & half.value_mask();
    match endianness {
        Endianness::Little => low_addr | (high_addr << bits),
        Endianness::Big => (low_addr << bits) | high_addr,
    }
}

/// Splits a full value into `(low_addr, high_addr)` half-width values, the
/// inverse of [`combine_halves`].
#[must_use]
pub const fn split_halves(endianness: Endianness, half: AccessWidth, value: u64) -> (u64, u64) {
    let bits = half.bits();
    let mask = half.value_mask();
    match endianness {
        Endianness::Little => (value & mask, (value >> bits) & mask),
        Endianness::Big => ((value >> bits) & mask, value & mask),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        combine_halves, extract_lanes, lane_shift, merge_lanes, split_halves, AccessWidth,
        Endianness, WIDTH_TIERS,
    };

    #[test]
    fn tiers_are_ascending_powers_of_two() {
        for (index, width) in WIDTH_TIERS.iter().enumerate() {
            assert_eq!(width.tier(), index);
            assert_eq!(width.bytes(), 1 << index);
            assert_eq!(AccessWidth::from_bytes(width.bytes()), Some(*width));
        }
        assert_eq!(AccessWidth::from_bytes(3), None);
        assert_eq!(AccessWidth::from_bytes(16), None);
    }

    #[test]
    fn value_masks_cover_exactly_the_width() {
        assert_eq!(AccessWidth::Byte.value_mask(), 0xFF);
        assert_eq!(AccessWidth::Word.value_mask(), 0xFFFF);
        assert_eq!(AccessWidth::Dword.value_mask(), 0xFFFF_FFFF);
        assert_eq!(AccessWidth::Qword.value_mask(), u64::MAX);
    }

    #[test]
    fn half_steps_down_one_tier() {
        assert_eq!(AccessWidth::Qword.half(), Some(AccessWidth::Dword));
        assert_eq!(AccessWidth::Word.half(), Some(AccessWidth::Byte));
        assert_eq!(AccessWidth::Byte.half(), None);
    }

    #[test]
    fn little_endian_lane_shift_grows_with_offset() {
        assert_eq!(
            lane_shift(Endianness::Little, AccessWidth::Dword, AccessWidth::Byte, 0),
            0
        );
        assert_eq!(
            lane_shift(Endianness::Little, AccessWidth::Dword, AccessWidth::Byte, 3),
            24
        );
        assert_eq!(
            lane_shift(Endianness::Little, AccessWidth::Dword, AccessWidth::Word, 2),
            16
        );
    }

    #[test]
    fn big_endian_lane_shift_is_mirrored() {
        assert_eq!(
            lane_shift(Endianness::Big, AccessWidth::Dword, AccessWidth::Byte, 0),
            24
        );
        assert_eq!(
            lane_shift(Endianness::Big, AccessWidth::Dword, AccessWidth::Byte, 3),
            0
        );
        assert_eq!(
            lane_shift(Endianness::Big, AccessWidth::Word, AccessWidth::Byte, 0),
            8
        );
    }

    #[test]
    fn extract_and_merge_are_inverse_on_every_lane() {
        let outer_value = 0x1122_3344_5566_7788_u64;
        for endianness in [Endianness::Little, Endianness::Big] {
            for lane_offset in 0..8 {
                let lane = extract_lanes(
                    endianness,
                    AccessWidth::Qword,
                    AccessWidth::Byte,
                    lane_offset,
                    outer_value,
                );
                let merged = merge_lanes(
                    endianness,
                    AccessWidth::Qword,
                    AccessWidth::Byte,
                    lane_offset,
                    outer_value,
                    lane,
                );
                assert_eq!(merged, outer_value);
            }
        }
    }

    #[test]
    fn merge_replaces_only_the_targeted_lane() {
        let merged = merge_lanes(
            Endianness::Little,
            AccessWidth::Word,
            AccessWidth::Byte,
            0,
            0x1234,
            0x56,
        );
        assert_eq!(merged, 0x1256);

        let merged = merge_lanes(
            Endianness::Big,
            AccessWidth::Word,
            AccessWidth::Byte,
            0,
            0x1234,
            0x56,
        );
        assert_eq!(merged, 0x5634);
    }

    #[test]
    fn combine_and_split_halves_round_trip() {
        for endianness in [Endianness::Little, Endianness::Big] {
            let value = 0xA1B2_C3D4_u64;
            let (low_addr, high_addr) = split_halves(endianness, AccessWidth::Word, value);
            assert_eq!(
                combine_halves(endianness, AccessWidth::Word, low_addr, high_addr),
                value
            );
        }

        assert_eq!(
            combine_halves(Endianness::Little, AccessWidth::Byte, 0x34, 0x12),
            0x1234
        );
        assert_eq!(
            combine_halves(Endianness::Big, AccessWidth::Byte, 0x12, 0x34),
            0x1234
        );
    }
}
