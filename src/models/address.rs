//! Account address.

use std::str::FromStr;

use crate::cell::{CellBuilder, CellSlice, HashBytes, Load, Store};
use crate::error::{Error, ParseAddrError};

/// Standard internal address: a workchain id and a 256-bit account id,
/// serialized in the `addr_std` layout without anycast info.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash)]
pub struct StdAddr {
    /// Workchain id.
    pub workchain: i8,
    /// Account id.
    pub address: HashBytes,
}

impl StdAddr {
    /// The number of data bits that this struct occupies:
    /// a 2-bit tag, an anycast presence bit, the workchain id
    /// and the account id.
    pub const BITS: u16 = 2 + 1 + 8 + 256;

    /// Constructs a new standard address.
    #[inline]
    pub const fn new(workchain: i8, address: HashBytes) -> Self {
        Self { workchain, address }
    }
}

impl Store for StdAddr {
    fn store_into(&self, builder: &mut CellBuilder) -> Result<(), Error> {
        // addr_std$10 with an empty anycast
        ok!(builder.store_small_uint(0b100, 3));
        ok!(builder.store_u8(self.workchain as u8));
        builder.store_u256(&self.address)
    }
}

impl Load for StdAddr {
    fn load_from(slice: &mut CellSlice) -> Result<Self, Error> {
        if ok!(slice.load_uint(2)) != 0b10 {
            return Err(Error::MalformedEncoding);
        }
        // Anycast addresses are not carried
        if ok!(slice.load_bit()) {
            return Err(Error::MalformedEncoding);
        }
        Ok(Self {
            workchain: ok!(slice.load_u8()) as i8,
            address: ok!(slice.load_u256()),
        })
    }
}

impl std::fmt::Display for StdAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.workchain, self.address)
    }
}

impl FromStr for StdAddr {
    type Err = ParseAddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseAddrError::Empty);
        }

        let mut result = Self::default();
        let mut parts = s.split(':');
        match parts.next() {
            Some(part) => match part.parse() {
                Ok(workchain) => result.workchain = workchain,
                Err(_) => return Err(ParseAddrError::InvalidWorkchain),
            },
            None => return Err(ParseAddrError::Empty),
        }

        match parts.next() {
            Some(part) => match hex::decode_to_slice(part, &mut result.address.0) {
                Ok(()) => {}
                Err(_) => return Err(ParseAddrError::InvalidAccountId),
            },
            None => return Err(ParseAddrError::InvalidAccountId),
        }

        if parts.next().is_none() {
            Ok(result)
        } else {
            Err(ParseAddrError::UnexpectedPart)
        }
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for StdAddr {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for StdAddr {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;
        use serde::Deserialize;

        let str = ok!(String::deserialize(deserializer));
        Self::from_str(&str).map_err(D::Error::custom)
    }
}

impl CellBuilder {
    /// Appends a workchain-qualified account address in the canonical
    /// `addr_std` bit layout.
    #[inline]
    pub fn store_address(&mut self, address: &StdAddr) -> Result<(), Error> {
        address.store_into(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_display_round_trip() {
        let s = "-1:34517c7bdf5187c55af4f8b61fdc321588c7ab768dee24b006df29106458d7cf";
        let addr = s.parse::<StdAddr>().unwrap();
        assert_eq!(addr.workchain, -1);
        assert_eq!(addr.to_string(), s);

        assert_eq!("".parse::<StdAddr>(), Err(ParseAddrError::Empty));
        assert_eq!(
            "0:12".parse::<StdAddr>(),
            Err(ParseAddrError::InvalidAccountId)
        );
        assert_eq!(
            "wc:34517c7bdf5187c55af4f8b61fdc321588c7ab768dee24b006df29106458d7cf"
                .parse::<StdAddr>(),
            Err(ParseAddrError::InvalidWorkchain)
        );
        assert_eq!(
            "0:34517c7bdf5187c55af4f8b61fdc321588c7ab768dee24b006df29106458d7cf:x"
                .parse::<StdAddr>(),
            Err(ParseAddrError::UnexpectedPart)
        );
    }

    #[test]
    fn store_load_layout() {
        let addr = "0:34517c7bdf5187c55af4f8b61fdc321588c7ab768dee24b006df29106458d7cf"
            .parse::<StdAddr>()
            .unwrap();

        let mut builder = CellBuilder::new();
        builder.store_address(&addr).unwrap();
        assert_eq!(builder.bit_len(), StdAddr::BITS);
        let cell = builder.build().unwrap();

        let mut slice = cell.as_slice();
        assert_eq!(slice.get_bit(0), Ok(true));
        assert_eq!(slice.get_bit(1), Ok(false));
        assert_eq!(slice.get_bit(2), Ok(false));
        let parsed = StdAddr::load_from(&mut slice).unwrap();
        assert_eq!(parsed, addr);
        assert!(slice.is_empty());
    }
}
