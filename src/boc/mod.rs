//! BOC (Bag Of Cells) implementation.

use crate::cell::Cell;
use crate::error::Error;

pub use self::ser::BocHeader;

mod de;
mod ser;

/// BOC tag bytes.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BocTag {
    /// Single root, no CRC.
    Indexed,
    /// Single root with CRC.
    IndexedCrc32,
    /// Multiple roots, flags byte.
    Generic,
}

impl BocTag {
    const BOC_INDEXED_TAG: [u8; 4] = [0x68, 0xff, 0x65, 0xf3];
    const BOC_INDEXED_CRC32_TAG: [u8; 4] = [0xac, 0xc3, 0xa7, 0x28];
    const BOC_GENERIC_TAG: [u8; 4] = [0xb5, 0xee, 0x9c, 0x72];

    /// Tries to match bytes with a known tag.
    pub const fn from_bytes(data: [u8; 4]) -> Option<Self> {
        match data {
            Self::BOC_GENERIC_TAG => Some(Self::Generic),
            Self::BOC_INDEXED_CRC32_TAG => Some(Self::IndexedCrc32),
            Self::BOC_INDEXED_TAG => Some(Self::Indexed),
            _ => None,
        }
    }

    /// Converts the tag to bytes.
    pub const fn to_bytes(self) -> [u8; 4] {
        match self {
            Self::Indexed => Self::BOC_INDEXED_TAG,
            Self::IndexedCrc32 => Self::BOC_INDEXED_CRC32_TAG,
            Self::Generic => Self::BOC_GENERIC_TAG,
        }
    }
}

/// BOC encoder and decoder.
pub struct Boc;

impl Boc {
    /// Encodes the cell tree into the canonical generic BOC layout.
    pub fn encode(cell: &Cell) -> Vec<u8> {
        let mut result = Vec::new();
        BocHeader::new(cell.clone()).encode(&mut result);
        result
    }

    /// Encodes the cell tree with a CRC32c trailer.
    pub fn encode_with_crc(cell: &Cell) -> Vec<u8> {
        let mut result = Vec::new();
        BocHeader::new(cell.clone()).with_crc(true).encode(&mut result);
        result
    }

    /// Decodes a single-root cell tree.
    pub fn decode<T: AsRef<[u8]>>(data: T) -> Result<Cell, Error> {
        de::decode(data.as_ref())
    }

    /// Encodes the cell tree as a base64 string.
    #[cfg(feature = "base64")]
    pub fn encode_base64(cell: &Cell) -> String {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(Self::encode(cell))
    }

    /// Decodes a single-root cell tree from a base64 string.
    #[cfg(feature = "base64")]
    pub fn decode_base64<T: AsRef<[u8]>>(data: T) -> Result<Cell, Error> {
        use base64::Engine;
        match base64::engine::general_purpose::STANDARD.decode(data.as_ref()) {
            Ok(data) => de::decode(&data),
            Err(_) => Err(Error::MalformedEncoding),
        }
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Cell {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let data = Boc::encode(self);
        if serializer.is_human_readable() {
            use base64::Engine;
            serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(data))
        } else {
            serializer.serialize_bytes(&data)
        }
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Cell {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;
        use serde::Deserialize;

        if deserializer.is_human_readable() {
            let data = ok!(String::deserialize(deserializer));
            Boc::decode_base64(data).map_err(D::Error::custom)
        } else {
            let data = ok!(Vec::<u8>::deserialize(deserializer));
            Boc::decode(data).map_err(D::Error::custom)
        }
    }
}
