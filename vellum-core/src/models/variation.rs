//! Variation flags for content types and property types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr};

/// Flag set ⊆ {Culture, Segment}. The empty set means invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ContentVariation(u8);

impl ContentVariation {
    pub const NOTHING: ContentVariation = ContentVariation(0);
    pub const CULTURE: ContentVariation = ContentVariation(1);
    pub const SEGMENT: ContentVariation = ContentVariation(2);
    pub const CULTURE_AND_SEGMENT: ContentVariation = ContentVariation(3);

    /// Build from the stored integer, dropping unknown bits.
    pub fn from_bits(bits: i64) -> Self {
        ContentVariation((bits & 3) as u8)
    }

    pub fn bits(self) -> i64 {
        self.0 as i64
    }

    pub fn varies_by_culture(self) -> bool {
        self.0 & Self::CULTURE.0 != 0
    }

    pub fn varies_by_segment(self) -> bool {
        self.0 & Self::SEGMENT.0 != 0
    }

    pub fn is_invariant(self) -> bool {
        self.0 == 0
    }

    /// Whether every flag of `self` is also set in `other`.
    pub fn is_subset_of(self, other: ContentVariation) -> bool {
        self.0 & !other.0 == 0
    }

    /// Flags of `self` with those of `other` cleared.
    pub fn without(self, other: ContentVariation) -> Self {
        ContentVariation(self.0 & !other.0)
    }

    /// Whether a value keyed by (culture, segment) is acceptable for this
    /// variation. Invariant/neutral keys are always accepted for segments,
    /// but a culture key requires culture variation and vice versa.
    pub fn accepts(self, culture: Option<&str>, segment: Option<&str>) -> bool {
        let culture_ok = culture.is_some() == self.varies_by_culture();
        let segment_ok = segment.is_none() || self.varies_by_segment();
        culture_ok && segment_ok
    }
}

impl BitAnd for ContentVariation {
    type Output = ContentVariation;

    fn bitand(self, rhs: Self) -> Self::Output {
        ContentVariation(self.0 & rhs.0)
    }
}

impl BitOr for ContentVariation {
    type Output = ContentVariation;

    fn bitor(self, rhs: Self) -> Self::Output {
        ContentVariation(self.0 | rhs.0)
    }
}

impl fmt::Display for ContentVariation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.0 {
            0 => "Nothing",
            1 => "Culture",
            2 => "Segment",
            _ => "CultureAndSegment",
        };
        f.write_str(name)
    }
}
