//! [`LayerMask`]: the 64-bit set of layers contributing to a texel or region.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Bit index reserved for the always-present base layer.
pub const BASE_LAYER_BIT: u32 = 63;

/// Maximum number of user layers (bits `0..63`).
pub const MAX_SOURCE_LAYERS: usize = BASE_LAYER_BIT as usize;

/// Set of source layers with non-zero weight at a location.
///
/// Bit `i` is set when source layer `i` contributes. Bit 63 is the base layer
/// selected by the color-coded subset-id map.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerMask(pub u64);

impl LayerMask {
    /// The empty set (background).
    pub const EMPTY: Self = Self(0);

    /// Mask containing only the base layer.
    pub const BASE: Self = Self(1 << BASE_LAYER_BIT);

    /// Mask containing only layer `index`.
    pub fn layer(index: u32) -> Self {
        debug_assert!(index < 64, "layer index {index} out of range");
        Self(1 << index)
    }

    /// Number of layers in the set.
    pub fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Returns `true` if no layer is set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if the mask is exactly the base layer.
    ///
    /// Such regions are compatible with every cluster and never get edges.
    pub fn is_base_only(self) -> bool {
        self == Self::BASE
    }

    /// Returns `true` if the base layer is part of the set.
    pub fn has_base(self) -> bool {
        self.contains(Self::BASE)
    }

    /// Returns `true` if every layer of `other` is also in `self`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if layer `index` is set.
    pub fn has_layer(self, index: u32) -> bool {
        index < 64 && self.0 & (1 << index) != 0
    }

    /// Iterates the set bit indices in ascending order.
    pub fn layers(self) -> impl Iterator<Item = u32> {
        let mut bits = self.0;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let index = bits.trailing_zeros();
            bits &= bits - 1;
            Some(index)
        })
    }
}

impl BitOr for LayerMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for LayerMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Formats the set bits separated by spaces, e.g. `"0 3 63"`.
impl fmt::Display for LayerMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, index) in self.layers().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{index}")?;
        }
        Ok(())
    }
}
