//! Anchor identifiers.
//!
//! The sensor service hands out one stable identifier per tracked mesh
//! fragment. They are opaque 128-bit values; the hyphenated text form is the
//! same one UUIDs use, so identifiers printed by sensor SDKs parse directly.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Stable, unique identifier of one spatial mesh fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnchorId(u128);

impl AnchorId {
    pub const fn from_u128(value: u128) -> Self {
        Self(value)
    }

    pub const fn as_u128(self) -> u128 {
        self.0
    }

    /// Build from the 16 raw bytes (big-endian, UUID byte order).
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(u128::from_be_bytes(bytes))
    }

    pub const fn to_bytes(self) -> [u8; 16] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
            (v >> 96) as u32,
            (v >> 80) as u16,
            (v >> 64) as u16,
            (v >> 48) as u16,
            v & 0xffff_ffff_ffff
        )
    }
}

/// Error returned when parsing an [`AnchorId`] from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid anchor id {input:?}: expected 32 hex digits (hyphens optional)")]
pub struct ParseAnchorIdError {
    input: String,
}

impl FromStr for AnchorId {
    type Err = ParseAnchorIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseAnchorIdError {
            input: s.to_string(),
        };

        let digits: String = s.chars().filter(|&c| c != '-').collect();
        if digits.len() != 32 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(err());
        }

        u128::from_str_radix(&digits, 16)
            .map(Self)
            .map_err(|_| err())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_uses_hyphenated_form() {
        let id = AnchorId::from_u128(0x0123_4567_89ab_cdef_0011_2233_4455_6677);
        assert_eq!(id.to_string(), "01234567-89ab-cdef-0011-223344556677");
    }

    #[test]
    fn test_parses_its_own_display() {
        let id = AnchorId::from_u128(0xdead_beef_0000_0000_0000_0000_0000_0042);
        let parsed: AnchorId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_parses_without_hyphens() {
        let parsed: AnchorId = "00000000000000000000000000000007".parse().unwrap();
        assert_eq!(parsed, AnchorId::from_u128(7));
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!("".parse::<AnchorId>().is_err());
        assert!("1234".parse::<AnchorId>().is_err());
        assert!("zz345678-89ab-cdef-0011-223344556677".parse::<AnchorId>().is_err());
        assert!("+1234567-89ab-cdef-0011-223344556677".parse::<AnchorId>().is_err());
    }

    #[test]
    fn test_bytes_roundtrip() {
        let id = AnchorId::from_u128(0x1122_3344_5566_7788_99aa_bbcc_ddee_ff00);
        assert_eq!(id.to_bytes()[0], 0x11);
        assert_eq!(AnchorId::from_bytes(id.to_bytes()), id);
    }
}
