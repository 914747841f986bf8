//! Integer types used in blockchain models.

use std::num::NonZeroU8;
use std::str::FromStr;

use crate::cell::{CellBuilder, CellSlice, Load, Store};
use crate::error::Error;

/// Monetary amount, `VarUInteger 16`.
///
/// Serialized as a 4-bit byte length followed by that many payload
/// bytes, so the largest representable amount is `2^120 - 1`.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct Tokens(u128);

impl Tokens {
    /// The additive identity for this type, i.e. `0`.
    pub const ZERO: Self = Self(0);

    /// The largest value that fits into 15 payload bytes.
    pub const MAX: Self = Self((1 << 120) - 1);

    /// The number of bits in the length prefix.
    pub const LEN_BITS: u16 = 4;

    /// Wraps a raw amount.
    #[inline]
    pub const fn new(value: u128) -> Self {
        Self(value)
    }

    /// Returns the underlying amount.
    #[inline]
    pub const fn into_inner(self) -> u128 {
        self.0
    }

    /// Returns `true` if the amount fits into the serialized form.
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.0 <= Self::MAX.0
    }

    /// Returns `true` if the amount is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition, `None` when the result does not fit.
    pub const fn checked_add(self, rhs: Self) -> Option<Self> {
        let result = Self(self.0.wrapping_add(rhs.0));
        if self.0 > result.0 || !result.is_valid() {
            None
        } else {
            Some(result)
        }
    }

    /// Checked subtraction, `None` on underflow.
    pub const fn checked_sub(self, rhs: Self) -> Option<Self> {
        if self.0 < rhs.0 {
            None
        } else {
            Some(Self(self.0 - rhs.0))
        }
    }
}

impl From<u64> for Tokens {
    #[inline]
    fn from(value: u64) -> Self {
        Self(value as u128)
    }
}

impl TryFrom<u128> for Tokens {
    type Error = Error;

    fn try_from(value: u128) -> Result<Self, Self::Error> {
        let result = Self(value);
        if result.is_valid() {
            Ok(result)
        } else {
            Err(Error::IntOverflow)
        }
    }
}

impl std::fmt::Display for Tokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for Tokens {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u128::from_str(s).map(Self)
    }
}

impl Store for Tokens {
    fn store_into(&self, builder: &mut CellBuilder) -> Result<(), Error> {
        builder.store_var_uint(self.0, 16)
    }
}

impl Load for Tokens {
    fn load_from(slice: &mut CellSlice) -> Result<Self, Error> {
        Ok(Self(ok!(slice.load_var_uint(16))))
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Tokens {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde::Serialize::serialize(&self.0, serializer)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Tokens {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;
        use serde::Deserialize;

        let value = ok!(u128::deserialize(deserializer));
        Self::try_from(value).map_err(D::Error::custom)
    }
}

/// Storage statistics counter, `VarUInteger 7`.
///
/// Serialized as a 3-bit byte length followed by that many payload
/// bytes, so the largest representable value is `2^56 - 1`.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct VarUint56(u64);

impl VarUint56 {
    /// The additive identity for this type, i.e. `0`.
    pub const ZERO: Self = Self(0);

    /// The largest value that fits into 7 payload bytes.
    pub const MAX: Self = Self((1 << 56) - 1);

    /// The number of bits in the length prefix.
    pub const LEN_BITS: u16 = 3;

    /// Wraps a raw counter value.
    #[inline]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying value.
    #[inline]
    pub const fn into_inner(self) -> u64 {
        self.0
    }

    /// Returns `true` if the value fits into the serialized form.
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.0 <= Self::MAX.0
    }
}

impl From<u32> for VarUint56 {
    #[inline]
    fn from(value: u32) -> Self {
        Self(value as u64)
    }
}

impl std::fmt::Display for VarUint56 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl Store for VarUint56 {
    fn store_into(&self, builder: &mut CellBuilder) -> Result<(), Error> {
        builder.store_var_uint(self.0 as u128, 7)
    }
}

impl Load for VarUint56 {
    fn load_from(slice: &mut CellSlice) -> Result<Self, Error> {
        let value = ok!(slice.load_var_uint(7));
        Ok(Self(value as u64))
    }
}

/// Split depth of a large smart contract, a 5-bit value in `1..=30`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct SplitDepth(NonZeroU8);

impl SplitDepth {
    /// The minimum allowed split depth.
    pub const MIN: u8 = 1;

    /// The maximum allowed split depth.
    pub const MAX: u8 = 30;

    /// The number of data bits that this struct occupies.
    pub const BITS: u16 = 5;

    /// Creates a split depth from a raw value.
    pub const fn new(value: u8) -> Result<Self, Error> {
        match NonZeroU8::new(value) {
            Some(value) if value.get() <= Self::MAX => Ok(Self(value)),
            _ => Err(Error::IntOverflow),
        }
    }

    /// Returns the raw split depth value.
    #[inline]
    pub const fn into_inner(self) -> u8 {
        self.0.get()
    }
}

impl Store for SplitDepth {
    fn store_into(&self, builder: &mut CellBuilder) -> Result<(), Error> {
        builder.store_small_uint(self.0.get(), Self::BITS)
    }
}

impl Load for SplitDepth {
    fn load_from(slice: &mut CellSlice) -> Result<Self, Error> {
        let value = ok!(slice.load_uint(Self::BITS));
        Self::new(value as u8)
    }
}
