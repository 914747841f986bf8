//! Cell tree implementation.

use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use sha2::{Digest, Sha256};
use smallvec::SmallVec;

pub use self::builder::CellBuilder;
pub use self::slice::CellSlice;
use crate::error::{Error, ParseHashBytesError};
use crate::util::unlikely;

mod builder;
mod slice;

/// Maximum number of data bits a cell can store.
pub const MAX_BIT_LEN: u16 = 1023;

/// Maximum number of child references a cell can have.
pub const MAX_REF_COUNT: usize = 4;

/// Inline storage for cell references.
pub(crate) type CellRefs = SmallVec<[Cell; MAX_REF_COUNT]>;

/// A 256-bit representation hash.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[repr(transparent)]
pub struct HashBytes(pub [u8; 32]);

impl HashBytes {
    /// A hash with all bytes set to zero.
    pub const ZERO: Self = Self([0; 32]);

    /// Returns a reference to the underlying bytes.
    #[inline]
    pub const fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for HashBytes {
    #[inline]
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for HashBytes {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Display for HashBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut output = [0u8; 64];
        hex::encode_to_slice(self.0, &mut output).ok();
        // SAFETY: output is guaranteed to contain only [0-9a-f]
        f.write_str(unsafe { std::str::from_utf8_unchecked(&output) })
    }
}

impl FromStr for HashBytes {
    type Err = ParseHashBytesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 64 {
            return Err(ParseHashBytesError::UnexpectedStringLength);
        }
        let mut result = Self::ZERO;
        hex::decode_to_slice(s, &mut result.0)?;
        Ok(result)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for HashBytes {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.collect_str(self)
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for HashBytes {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        if deserializer.is_human_readable() {
            let str = ok!(<&str as serde::Deserialize>::deserialize(deserializer));
            Self::from_str(str).map_err(D::Error::custom)
        } else {
            let bytes = ok!(<&[u8] as serde::Deserialize>::deserialize(deserializer));
            let bytes = ok!(<[u8; 32]>::try_from(bytes).map_err(D::Error::custom));
            Ok(Self(bytes))
        }
    }
}

/// An immutable node of the cell tree: up to 1023 data bits
/// and up to 4 references to child cells.
///
/// Cells are cheap to clone (shared ownership) and may be referenced
/// by multiple parents, so reused subtrees form a DAG. The identity of
/// a cell is its representation hash which depends only on the content,
/// never on the allocation.
#[derive(Clone)]
#[repr(transparent)]
pub struct Cell(Arc<CellInner>);

struct CellInner {
    bit_len: u16,
    depth: u16,
    // Data bytes with the completion tag already applied to
    // the last partial byte.
    data: Vec<u8>,
    references: CellRefs,
    repr_hash: HashBytes,
}

impl Cell {
    /// Creates a cell from its parts.
    ///
    /// `data` must be exactly `(bit_len + 7) / 8` bytes with the completion
    /// tag applied, which is upheld by the builder and the BOC decoder.
    pub(crate) fn new(data: Vec<u8>, bit_len: u16, references: CellRefs) -> Result<Self, Error> {
        if unlikely(bit_len > MAX_BIT_LEN || references.len() > MAX_REF_COUNT) {
            return Err(Error::CapacityExceeded);
        }
        debug_assert_eq!(data.len(), crate::util::byte_len(bit_len));

        let mut depth = 0;
        for child in &references {
            depth = depth.max(1 + child.depth());
        }

        let descriptor = compute_descriptor(bit_len, references.len() as u8);
        let mut hasher = Sha256::new();
        hasher.update(descriptor);
        hasher.update(&data);
        for child in &references {
            hasher.update(child.depth().to_be_bytes());
        }
        for child in &references {
            hasher.update(child.repr_hash());
        }
        let repr_hash = HashBytes(hasher.finalize().into());

        Ok(Self(Arc::new(CellInner {
            bit_len,
            depth,
            data,
            references,
            repr_hash,
        })))
    }

    /// Returns the cell with no data and no references.
    pub fn empty() -> Self {
        static EMPTY: OnceLock<Cell> = OnceLock::new();
        EMPTY
            .get_or_init(|| Cell::new(Vec::new(), 0, CellRefs::new()).unwrap())
            .clone()
    }

    /// Returns the data size of this cell in bits.
    #[inline]
    pub fn bit_len(&self) -> u16 {
        self.0.bit_len
    }

    /// Returns the underlying data bytes.
    ///
    /// The last byte carries the completion tag when `bit_len`
    /// is not a multiple of 8.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.0.data
    }

    /// Returns the number of child references.
    #[inline]
    pub fn reference_count(&self) -> u8 {
        self.0.references.len() as u8
    }

    /// Returns the child cell at the specified index.
    #[inline]
    pub fn reference(&self, index: u8) -> Option<&Cell> {
        self.0.references.get(index as usize)
    }

    /// Returns all child cells.
    #[inline]
    pub fn references(&self) -> &[Cell] {
        &self.0.references
    }

    /// Returns the depth of the cell tree: 0 for leaves,
    /// one more than the deepest child otherwise.
    #[inline]
    pub fn depth(&self) -> u16 {
        self.0.depth
    }

    /// Returns the representation hash of the cell.
    #[inline]
    pub fn repr_hash(&self) -> &HashBytes {
        &self.0.repr_hash
    }

    /// Returns `true` if the cell has no data bits and no references.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.bit_len == 0 && self.0.references.is_empty()
    }

    /// Begins reading the cell from the start.
    #[inline]
    pub fn as_slice(&self) -> CellSlice {
        CellSlice::new(self.clone())
    }

    /// Returns the pair of descriptor bytes used by the
    /// representation hash and the BOC layout.
    #[inline]
    pub fn descriptor(&self) -> [u8; 2] {
        compute_descriptor(self.0.bit_len, self.0.references.len() as u8)
    }
}

/// `d1` is the reference count (ordinary cells only, no exotic flag
/// and no level), `d2` encodes the data length with a parity marker
/// for a partially filled last byte.
#[inline]
const fn compute_descriptor(bit_len: u16, ref_count: u8) -> [u8; 2] {
    let d1 = ref_count;
    let d2 = ((bit_len / 8) + bit_len.div_ceil(8)) as u8;
    [d1, d2]
}

impl Eq for Cell {}

impl PartialEq for Cell {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.0.repr_hash == other.0.repr_hash
    }
}

impl std::hash::Hash for Cell {
    #[inline]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::hash::Hash::hash(&self.0.repr_hash, state)
    }
}

impl std::fmt::Debug for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cell")
            .field("bit_len", &self.0.bit_len)
            .field("references", &self.0.references.len())
            .field("repr_hash", &self.0.repr_hash)
            .finish()
    }
}

/// Types which can be appended to a cell builder.
pub trait Store {
    /// Tries to store itself into the specified builder.
    fn store_into(&self, builder: &mut CellBuilder) -> Result<(), Error>;
}

impl<T: Store + ?Sized> Store for &T {
    #[inline]
    fn store_into(&self, builder: &mut CellBuilder) -> Result<(), Error> {
        T::store_into(self, builder)
    }
}

/// Types which can be read from a cell slice.
pub trait Load: Sized {
    /// Tries to load itself from the specified slice.
    fn load_from(slice: &mut CellSlice) -> Result<Self, Error>;
}

impl Store for () {
    #[inline]
    fn store_into(&self, _: &mut CellBuilder) -> Result<(), Error> {
        Ok(())
    }
}

impl Load for () {
    #[inline]
    fn load_from(_: &mut CellSlice) -> Result<Self, Error> {
        Ok(())
    }
}

impl Store for bool {
    #[inline]
    fn store_into(&self, builder: &mut CellBuilder) -> Result<(), Error> {
        builder.store_bit(*self)
    }
}

impl Load for bool {
    #[inline]
    fn load_from(slice: &mut CellSlice) -> Result<Self, Error> {
        slice.load_bit()
    }
}

macro_rules! impl_primitive_store_load {
    ($($ty:ty => ($store_fn:ident, $load_fn:ident)),*$(,)?) => {
        $(impl Store for $ty {
            #[inline]
            fn store_into(&self, builder: &mut CellBuilder) -> Result<(), Error> {
                builder.$store_fn(*self)
            }
        }

        impl Load for $ty {
            #[inline]
            fn load_from(slice: &mut CellSlice) -> Result<Self, Error> {
                slice.$load_fn()
            }
        })*
    };
}

impl_primitive_store_load! {
    u8 => (store_u8, load_u8),
    u16 => (store_u16, load_u16),
    u32 => (store_u32, load_u32),
    u64 => (store_u64, load_u64),
}

impl Store for HashBytes {
    #[inline]
    fn store_into(&self, builder: &mut CellBuilder) -> Result<(), Error> {
        builder.store_u256(self)
    }
}

impl Load for HashBytes {
    #[inline]
    fn load_from(slice: &mut CellSlice) -> Result<Self, Error> {
        slice.load_u256()
    }
}

impl Store for Cell {
    #[inline]
    fn store_into(&self, builder: &mut CellBuilder) -> Result<(), Error> {
        builder.store_reference(self.clone())
    }
}

impl Load for Cell {
    #[inline]
    fn load_from(slice: &mut CellSlice) -> Result<Self, Error> {
        slice.load_reference()
    }
}

impl<T: Store> Store for Option<T> {
    fn store_into(&self, builder: &mut CellBuilder) -> Result<(), Error> {
        match self {
            Some(value) => {
                ok!(builder.store_bit_one());
                value.store_into(builder)
            }
            None => builder.store_bit_zero(),
        }
    }
}

impl<T: Load> Load for Option<T> {
    fn load_from(slice: &mut CellSlice) -> Result<Self, Error> {
        Ok(if ok!(slice.load_bit()) {
            Some(ok!(T::load_from(slice)))
        } else {
            None
        })
    }
}
