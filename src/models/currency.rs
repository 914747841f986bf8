//! Currency collection.

use crate::cell::{CellBuilder, CellSlice, Load, Store};
use crate::dict::Dict;
use crate::error::Error;
use crate::num::Tokens;

/// Amounts collection: the native currency amount plus an optional
/// extra-currency dictionary keyed by a 32-bit currency id.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CurrencyCollection {
    /// Amount in native currency.
    pub tokens: Tokens,
    /// Amounts in other currencies.
    pub other: Dict,
}

impl Default for CurrencyCollection {
    #[inline]
    fn default() -> Self {
        Self::ZERO
    }
}

impl CurrencyCollection {
    /// The key length of the extra-currency dictionary.
    pub const EXTRA_KEY_BITS: u16 = 32;

    /// The empty collection.
    pub const ZERO: Self = Self {
        tokens: Tokens::ZERO,
        other: Dict::new(Self::EXTRA_KEY_BITS, false),
    };

    /// Constructs a collection with only the native currency.
    pub const fn new(tokens: Tokens) -> Self {
        Self {
            tokens,
            other: Dict::new(Self::EXTRA_KEY_BITS, false),
        }
    }
}

impl Store for CurrencyCollection {
    fn store_into(&self, builder: &mut CellBuilder) -> Result<(), Error> {
        ok!(self.tokens.store_into(builder));
        self.other.store_into(builder)
    }
}

impl Load for CurrencyCollection {
    fn load_from(slice: &mut CellSlice) -> Result<Self, Error> {
        Ok(Self {
            tokens: ok!(Tokens::load_from(slice)),
            other: ok!(slice.load_dict(Self::EXTRA_KEY_BITS, false)),
        })
    }
}
