//! Dictionary implementation.
//!
//! A [`Dict`] maps fixed-length bit-string keys to cell slice values.
//! It is backed by a canonical Patricia trie of cells, so two
//! dictionaries with the same entries are always bit-identical and
//! hash-equal, no matter in which order the entries were inserted.

use self::ops::Branch;
use crate::cell::{Cell, CellBuilder, CellSlice, Store};
use crate::error::Error;
use crate::util::byte_len;

mod ops;

/// Dictionary insertion mode.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SetMode {
    /// Sets the value associated with the key in the dictionary.
    Set = 0b11,
    /// Sets the value associated with the key in the dictionary
    /// only if the key was already present in it.
    Replace = 0b01,
    /// Sets the value associated with key in dictionary,
    /// but only if it is not already present.
    Add = 0b10,
}

impl SetMode {
    /// Returns `true` if the new value can replace the old value for the same key.
    #[inline]
    pub const fn can_replace(self) -> bool {
        self as u8 & 0b01 != 0
    }

    /// Returns `true` if inserting a value can add a new key to the dictionary.
    #[inline]
    pub const fn can_add(self) -> bool {
        self as u8 & 0b10 != 0
    }
}

/// Dictionary bound or search direction.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DictBound {
    /// The lowest key.
    Min,
    /// The largest key.
    Max,
}

impl DictBound {
    pub(crate) fn into_branch(self) -> Branch {
        match self {
            Self::Min => Branch::Left,
            Self::Max => Branch::Right,
        }
    }
}

/// A map from fixed-length bit-string keys to cell slice values,
/// stored as a compressed binary trie of cells.
///
/// Keys are MSB-aligned byte strings of exactly `ceil(key_bit_len / 8)`
/// bytes. With `signed` set, the leading bit is treated as a sign bit
/// by every ordered operation (bounds, nearest-key search, iteration).
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Dict {
    key_bit_len: u16,
    signed: bool,
    root: Option<Cell>,
}

impl Dict {
    /// Creates an empty dictionary.
    pub const fn new(key_bit_len: u16, signed: bool) -> Self {
        Self {
            key_bit_len,
            signed,
            root: None,
        }
    }

    /// Creates a dictionary around an existing trie root.
    pub const fn from_root(root: Option<Cell>, key_bit_len: u16, signed: bool) -> Self {
        Self {
            key_bit_len,
            signed,
            root,
        }
    }

    /// Reads a dictionary: a presence bit, then the trie root
    /// as the next reference when the bit is set.
    pub fn load_from(slice: &mut CellSlice, key_bit_len: u16, signed: bool) -> Result<Self, Error> {
        let root = if ok!(slice.get_bit(0)) {
            if slice.remaining_refs() == 0 {
                return Err(Error::SliceUnderrun);
            }
            ok!(slice.skip_first(1, 0));
            Some(ok!(slice.load_reference()))
        } else {
            ok!(slice.skip_first(1, 0));
            None
        };
        Ok(Self {
            key_bit_len,
            signed,
            root,
        })
    }

    /// Returns the declared key length in bits.
    #[inline]
    pub const fn key_bit_len(&self) -> u16 {
        self.key_bit_len
    }

    /// Returns whether keys are ordered as signed integers.
    #[inline]
    pub const fn is_signed(&self) -> bool {
        self.signed
    }

    /// Returns `true` if the dictionary contains no entries.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Returns the underlying trie root, `None` for an empty dictionary.
    #[inline]
    pub const fn root(&self) -> &Option<Cell> {
        &self.root
    }

    /// Finalizes the dictionary into its trie root.
    #[inline]
    pub fn into_root(self) -> Option<Cell> {
        self.root
    }

    /// Sets the value associated with the key.
    pub fn set(&mut self, key: &[u8], value: &CellSlice) -> Result<(), Error> {
        self.insert_impl(key, value, SetMode::Set)
    }

    /// Sets the value associated with the key,
    /// fails with [`Error::KeyExists`] if the key is already present.
    pub fn add(&mut self, key: &[u8], value: &CellSlice) -> Result<(), Error> {
        self.insert_impl(key, value, SetMode::Add)
    }

    /// Sets the value associated with the key,
    /// fails with [`Error::KeyNotFound`] if the key is absent.
    pub fn replace(&mut self, key: &[u8], value: &CellSlice) -> Result<(), Error> {
        self.insert_impl(key, value, SetMode::Replace)
    }

    /// Sets a single reference as the value associated with the key.
    pub fn set_ref(&mut self, key: &[u8], value: Cell) -> Result<(), Error> {
        let mut builder = CellBuilder::new();
        ok!(builder.store_reference(value));
        self.set(key, &ok!(builder.build()).as_slice())
    }

    /// Sets the content of a builder as the value associated with the key.
    pub fn set_builder(&mut self, key: &[u8], value: &CellBuilder) -> Result<(), Error> {
        self.set(key, &ok!(value.clone().build()).as_slice())
    }

    /// Returns the value associated with the key,
    /// fails with [`Error::KeyNotFound`] if the key is absent.
    pub fn get(&self, key: &[u8]) -> Result<CellSlice, Error> {
        let key = ok!(self.make_key_slice(key));
        match ok!(ops::dict_get(&self.root, self.key_bit_len, key)) {
            Some(value) => Ok(value),
            None => Err(Error::KeyNotFound),
        }
    }

    /// Returns `true` if the dictionary contains the key.
    pub fn contains_key(&self, key: &[u8]) -> Result<bool, Error> {
        let key = ok!(self.make_key_slice(key));
        Ok(ok!(ops::dict_get(&self.root, self.key_bit_len, key)).is_some())
    }

    /// Removes the key, returning its value.
    /// Fails with [`Error::KeyNotFound`] if the key is absent.
    pub fn remove(&mut self, key: &[u8]) -> Result<CellSlice, Error> {
        let mut key = ok!(self.make_key_slice(key));
        let (root, removed) = ok!(ops::dict_remove(&self.root, &mut key, self.key_bit_len));
        self.root = root;
        Ok(removed)
    }

    /// Returns the entry with the lowest or the largest key,
    /// fails with [`Error::EmptyDictionary`] if there are no entries.
    pub fn get_bound(&self, bound: DictBound) -> Result<(Vec<u8>, CellSlice), Error> {
        match ok!(ops::dict_find_bound(
            &self.root,
            self.key_bit_len,
            bound,
            self.signed
        )) {
            Some((key, value)) => Ok((key.raw_data().to_vec(), value)),
            None => Err(Error::EmptyDictionary),
        }
    }

    /// Returns the entry nearest to the probe key: the smallest entry
    /// above it (`towards = Max`) or the largest entry below it
    /// (`towards = Min`). With `allow_equal` an exact match is returned
    /// as is. Fails with [`Error::KeyNotFound`] past the last entry in
    /// the requested direction.
    pub fn get_nearest(
        &self,
        key: &[u8],
        towards: DictBound,
        allow_equal: bool,
    ) -> Result<(Vec<u8>, CellSlice), Error> {
        let mut key = ok!(self.make_key_slice(key));
        match ok!(ops::dict_find_nearest(
            &self.root,
            &mut key,
            self.key_bit_len,
            towards,
            allow_equal,
            self.signed,
        )) {
            Some((key, value)) => Ok((key.raw_data().to_vec(), value)),
            None => Err(Error::KeyNotFound),
        }
    }

    /// Returns a lazy iterator over the entries in ascending key order.
    ///
    /// Iteration is finite and does not mutate the dictionary. A storage
    /// error is yielded once, after which the iterator is fused.
    pub fn iter(&self) -> DictIter {
        DictIter::new(&self.root, self.key_bit_len, self.signed)
    }

    fn insert_impl(&mut self, key: &[u8], value: &CellSlice, mode: SetMode) -> Result<(), Error> {
        let mut key = ok!(self.make_key_slice(key));
        self.root = ok!(ops::dict_insert(
            &self.root,
            &mut key,
            self.key_bit_len,
            value,
            mode
        ));
        Ok(())
    }

    fn make_key_slice(&self, key: &[u8]) -> Result<CellSlice, Error> {
        if key.len() != byte_len(self.key_bit_len) {
            return Err(Error::InvalidInput);
        }
        let mut builder = CellBuilder::new();
        ok!(builder.store_raw(key, self.key_bit_len));
        Ok(ok!(builder.build()).as_slice())
    }
}

impl Store for Dict {
    fn store_into(&self, builder: &mut CellBuilder) -> Result<(), Error> {
        match &self.root {
            Some(root) => {
                ok!(builder.store_bit_one());
                builder.store_reference(root.clone())
            }
            None => builder.store_bit_zero(),
        }
    }
}

impl CellSlice {
    /// Reads a dictionary: a presence bit, then the trie root
    /// as the next reference when the bit is set.
    #[inline]
    pub fn load_dict(&mut self, key_bit_len: u16, signed: bool) -> Result<Dict, Error> {
        Dict::load_from(self, key_bit_len, signed)
    }
}

/// A lazy forward-only iterator over dictionary entries.
///
/// Yields `(key bytes, value slice)` pairs in ascending key order,
/// or descending after [`reversed`].
///
/// [`reversed`]: DictIter::reversed
#[derive(Clone)]
pub struct DictIter {
    segments: Vec<IterSegment>,
    reversed: bool,
    signed: bool,
    broken: bool,
}

#[derive(Clone)]
struct IterSegment {
    data: CellSlice,
    remaining: u16,
    prefix: CellBuilder,
}

impl DictIter {
    fn new(root: &Option<Cell>, key_bit_len: u16, signed: bool) -> Self {
        let mut segments = Vec::new();
        if let Some(root) = root {
            segments.push(IterSegment {
                data: root.as_slice(),
                remaining: key_bit_len,
                prefix: CellBuilder::new(),
            });
        }
        Self {
            segments,
            reversed: false,
            signed,
            broken: false,
        }
    }

    /// Changes the direction of the iterator to descending.
    #[inline]
    pub fn reversed(mut self) -> Self {
        self.reversed = true;
        self
    }

    fn finish(&mut self, error: Error) -> Option<<Self as Iterator>::Item> {
        self.broken = true;
        Some(Err(error))
    }
}

impl Iterator for DictIter {
    type Item = Result<(Vec<u8>, CellSlice), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.broken {
            return None;
        }

        loop {
            let segment = self.segments.pop()?;
            let mut data = segment.data;
            let mut key = segment.prefix;

            let prefix = match ops::read_label(&mut data, segment.remaining) {
                Ok(prefix) => prefix,
                Err(e) => return self.finish(e),
            };
            if let Err(e) = key.store_slice_data(&prefix) {
                return self.finish(e);
            }

            let remaining = match segment.remaining.checked_sub(prefix.remaining_bits()) {
                Some(0) => return Some(Ok((key.raw_data().to_vec(), data))),
                Some(remaining) => remaining - 1,
                None => return self.finish(Error::MalformedEncoding),
            };
            if data.remaining_refs() != 2 {
                return self.finish(Error::MalformedEncoding);
            }

            let mut first = if self.reversed {
                Branch::Right
            } else {
                Branch::Left
            };
            // The sign bit reorders subtrees only at the very first fork
            if self.signed && key.bit_len() == 0 {
                first = first.reversed();
            }

            for branch in [first.reversed(), first] {
                let child = match data.reference(branch as u8) {
                    Some(child) => child.as_slice(),
                    None => return self.finish(Error::MalformedEncoding),
                };
                let mut prefix = key.clone();
                if let Err(e) = prefix.store_bit(branch.into_bit()) {
                    return self.finish(e);
                }
                self.segments.push(IterSegment {
                    data: child,
                    remaining,
                    prefix,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rand::{Rng, SeedableRng};

    use super::*;

    fn value_of(n: u64) -> CellSlice {
        let mut builder = CellBuilder::new();
        builder.store_u64(n).unwrap();
        builder.build().unwrap().as_slice()
    }

    fn read_value(mut slice: CellSlice) -> u64 {
        slice.load_u64().unwrap()
    }

    #[test]
    fn set_get_remove() {
        let mut dict = Dict::new(32, false);
        assert!(dict.is_empty());

        for i in [5u32, 1, 9, 7, 3] {
            dict.set(&i.to_be_bytes(), &value_of(i as u64 * 10)).unwrap();
        }
        assert!(!dict.is_empty());

        for i in [1u32, 3, 5, 7, 9] {
            assert_eq!(read_value(dict.get(&i.to_be_bytes()).unwrap()), i as u64 * 10);
        }
        assert_eq!(dict.get(&2u32.to_be_bytes()), Err(Error::KeyNotFound));

        let removed = dict.remove(&5u32.to_be_bytes()).unwrap();
        assert_eq!(read_value(removed), 50);
        assert_eq!(dict.get(&5u32.to_be_bytes()), Err(Error::KeyNotFound));
        assert!(dict.contains_key(&7u32.to_be_bytes()).unwrap());

        for i in [1u32, 3, 7, 9] {
            dict.remove(&i.to_be_bytes()).unwrap();
        }
        assert!(dict.is_empty());
        assert_eq!(dict.remove(&1u32.to_be_bytes()), Err(Error::KeyNotFound));
    }

    #[test]
    fn insert_modes() {
        let mut dict = Dict::new(16, false);

        assert_eq!(
            dict.replace(&7u16.to_be_bytes(), &value_of(1)),
            Err(Error::KeyNotFound)
        );
        dict.add(&7u16.to_be_bytes(), &value_of(1)).unwrap();
        assert_eq!(
            dict.add(&7u16.to_be_bytes(), &value_of(2)),
            Err(Error::KeyExists)
        );
        assert_eq!(read_value(dict.get(&7u16.to_be_bytes()).unwrap()), 1);

        dict.replace(&7u16.to_be_bytes(), &value_of(2)).unwrap();
        assert_eq!(read_value(dict.get(&7u16.to_be_bytes()).unwrap()), 2);

        dict.set(&7u16.to_be_bytes(), &value_of(3)).unwrap();
        assert_eq!(read_value(dict.get(&7u16.to_be_bytes()).unwrap()), 3);
    }

    #[test]
    fn canonical_shape() {
        let keys = [3u32, 17, 255, 256, 1024, u32::MAX];

        let mut forward = Dict::new(32, false);
        for key in keys {
            forward.set(&key.to_be_bytes(), &value_of(key as u64)).unwrap();
        }

        let mut backward = Dict::new(32, false);
        for key in keys.iter().rev() {
            backward.set(&key.to_be_bytes(), &value_of(*key as u64)).unwrap();
        }

        // Same entries in a different order, and with an overwrite on top
        let mut noisy = Dict::new(32, false);
        for key in [17u32, 3, 1024, 255, u32::MAX, 256] {
            noisy.set(&key.to_be_bytes(), &value_of(0)).unwrap();
        }
        for key in keys {
            noisy.set(&key.to_be_bytes(), &value_of(key as u64)).unwrap();
        }

        let root = forward.root().clone().unwrap();
        assert_eq!(backward.root().clone().unwrap(), root);
        assert_eq!(noisy.root().clone().unwrap(), root);
    }

    #[test]
    fn delete_restores_shape() {
        let mut dict = Dict::new(32, false);
        for key in [3u32, 17, 255] {
            dict.set(&key.to_be_bytes(), &value_of(key as u64)).unwrap();
        }
        let expected = dict.root().clone().unwrap();

        dict.set(&7u32.to_be_bytes(), &value_of(7)).unwrap();
        dict.set(&4096u32.to_be_bytes(), &value_of(4096)).unwrap();
        dict.remove(&7u32.to_be_bytes()).unwrap();
        dict.remove(&4096u32.to_be_bytes()).unwrap();

        assert_eq!(dict.root().clone().unwrap(), expected);
    }

    #[test]
    fn bounds() {
        let mut dict = Dict::new(8, false);
        assert_eq!(dict.get_bound(DictBound::Min), Err(Error::EmptyDictionary));

        for key in [4u8, 250, 17] {
            dict.set(&[key], &value_of(key as u64)).unwrap();
        }

        let (min, value) = dict.get_bound(DictBound::Min).unwrap();
        assert_eq!((min.as_slice(), read_value(value)), (&[4u8][..], 4));
        let (max, value) = dict.get_bound(DictBound::Max).unwrap();
        assert_eq!((max.as_slice(), read_value(value)), (&[250u8][..], 250));
    }

    #[test]
    fn signed_bounds() {
        let mut dict = Dict::new(8, true);
        for key in [-3i8, 5, -128, 127, 0] {
            dict.set(&[key as u8], &value_of(key as u64)).unwrap();
        }

        let (min, _) = dict.get_bound(DictBound::Min).unwrap();
        assert_eq!(min[0] as i8, -128);
        let (max, _) = dict.get_bound(DictBound::Max).unwrap();
        assert_eq!(max[0] as i8, 127);
    }

    #[test]
    fn nearest_key() {
        let mut dict = Dict::new(8, false);
        for key in [1u8, 5, 9] {
            dict.set(&[key], &value_of(key as u64)).unwrap();
        }

        let next = |key: u8, eq: bool| {
            dict.get_nearest(&[key], DictBound::Max, eq)
                .map(|(key, _)| key[0])
        };
        let prev = |key: u8, eq: bool| {
            dict.get_nearest(&[key], DictBound::Min, eq)
                .map(|(key, _)| key[0])
        };

        assert_eq!(next(5, false), Ok(9));
        assert_eq!(next(5, true), Ok(5));
        assert_eq!(next(0, false), Ok(1));
        assert_eq!(next(4, false), Ok(5));
        assert_eq!(next(9, false), Err(Error::KeyNotFound));
        assert_eq!(next(255, false), Err(Error::KeyNotFound));

        assert_eq!(prev(5, false), Ok(1));
        assert_eq!(prev(5, true), Ok(5));
        assert_eq!(prev(6, false), Ok(5));
        assert_eq!(prev(255, false), Ok(9));
        assert_eq!(prev(1, false), Err(Error::KeyNotFound));
        assert_eq!(prev(0, false), Err(Error::KeyNotFound));
    }

    #[test]
    fn nearest_key_signed() {
        let mut dict = Dict::new(8, true);
        for key in [-2i8, -1, 0, 1] {
            dict.set(&[key as u8], &value_of(0)).unwrap();
        }

        let next = |key: i8| {
            dict.get_nearest(&[key as u8], DictBound::Max, false)
                .map(|(key, _)| key[0] as i8)
        };
        // The walk crosses the sign boundary
        assert_eq!(next(-1), Ok(0));
        assert_eq!(next(-128), Ok(-2));
        assert_eq!(next(0), Ok(1));
        assert_eq!(next(1), Err(Error::KeyNotFound));

        let prev = |key: i8| {
            dict.get_nearest(&[key as u8], DictBound::Min, false)
                .map(|(key, _)| key[0] as i8)
        };
        assert_eq!(prev(0), Ok(-1));
        assert_eq!(prev(-2), Err(Error::KeyNotFound));
        assert_eq!(prev(127), Ok(1));
    }

    #[test]
    fn iteration_order() {
        let mut dict = Dict::new(16, false);
        let keys = [9u16, 32000, 3, 3000, 255, 256];
        for key in keys {
            dict.set(&key.to_be_bytes(), &value_of(key as u64)).unwrap();
        }

        let ascending = dict
            .iter()
            .map(|entry| {
                let (key, value) = entry.unwrap();
                let key = u16::from_be_bytes([key[0], key[1]]);
                assert_eq!(read_value(value), key as u64);
                key
            })
            .collect::<Vec<_>>();
        assert_eq!(ascending, [3, 9, 255, 256, 3000, 32000]);

        let descending = dict
            .iter()
            .reversed()
            .map(|entry| {
                let (key, _) = entry.unwrap();
                u16::from_be_bytes([key[0], key[1]])
            })
            .collect::<Vec<_>>();
        assert_eq!(descending, [32000, 3000, 256, 255, 9, 3]);

        assert_eq!(Dict::new(16, false).iter().count(), 0);
    }

    #[test]
    fn signed_iteration_order() {
        let mut dict = Dict::new(8, true);
        for key in [3i8, -3, 0, -128, 127] {
            dict.set(&[key as u8], &value_of(0)).unwrap();
        }

        let keys = dict
            .iter()
            .map(|entry| entry.unwrap().0[0] as i8)
            .collect::<Vec<_>>();
        assert_eq!(keys, [-128, -3, 0, 3, 127]);
    }

    #[test]
    fn values_with_references() {
        let mut dict = Dict::new(256, false);

        let mut lib = CellBuilder::new();
        lib.store_u32(0x11223344).unwrap();
        let lib = lib.build().unwrap();

        let key = *lib.repr_hash();
        dict.set_ref(key.as_ref(), lib.clone()).unwrap();

        let mut value = dict.get(key.as_ref()).unwrap();
        assert_eq!(value.remaining_bits(), 0);
        assert_eq!(value.remaining_refs(), 1);
        assert_eq!(value.load_reference().unwrap(), lib);
    }

    #[test]
    fn store_load_round_trip() -> anyhow::Result<()> {
        let mut dict = Dict::new(16, false);
        for key in [1u16, 2, 3] {
            dict.set(&key.to_be_bytes(), &value_of(key as u64))?;
        }

        let mut builder = CellBuilder::new();
        dict.store_into(&mut builder)?;
        let cell = builder.build()?;

        let mut slice = cell.as_slice();
        let parsed = slice.load_dict(16, false)?;
        assert_eq!(parsed.root(), dict.root());

        // An empty dictionary is a single zero bit
        let mut builder = CellBuilder::new();
        Dict::new(16, false).store_into(&mut builder)?;
        let cell = builder.build()?;
        assert_eq!(cell.bit_len(), 1);
        assert_eq!(cell.reference_count(), 0);
        let parsed = cell.as_slice().load_dict(16, false)?;
        assert!(parsed.is_empty());
        Ok(())
    }

    #[test]
    fn random_ops_match_btree() {
        let mut rng = rand_xorshift::XorShiftRng::seed_from_u64(42);
        let mut dict = Dict::new(16, false);
        let mut model = BTreeMap::new();

        for _ in 0..500 {
            let key: u16 = rng.gen_range(0..2048);
            if rng.gen_bool(0.25) && !model.is_empty() {
                let present = model.contains_key(&key);
                assert_eq!(dict.remove(&key.to_be_bytes()).is_ok(), present);
                model.remove(&key);
            } else {
                let value: u64 = rng.gen();
                dict.set(&key.to_be_bytes(), &value_of(value)).unwrap();
                model.insert(key, value);
            }
        }

        for (key, value) in &model {
            assert_eq!(read_value(dict.get(&key.to_be_bytes()).unwrap()), *value);
        }

        let entries = dict
            .iter()
            .map(|entry| {
                let (key, value) = entry.unwrap();
                (u16::from_be_bytes([key[0], key[1]]), read_value(value))
            })
            .collect::<Vec<_>>();
        let expected = model.into_iter().collect::<Vec<_>>();
        assert_eq!(entries, expected);
    }

    #[test]
    fn wrong_key_length() {
        let mut dict = Dict::new(32, false);
        assert_eq!(dict.set(&[1, 2], &value_of(0)), Err(Error::InvalidInput));
        assert_eq!(dict.get(&[1, 2, 3, 4, 5]), Err(Error::InvalidInput));
    }
}
