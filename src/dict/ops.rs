//! Patricia trie algorithms.
//!
//! A dictionary is stored as a binary trie with edge labels. Every node
//! cell starts with a label (`hml_short`, `hml_long` or `hml_same`
//! encoding, whichever is shortest); a node which does not yet exhaust
//! the key is a fork with exactly two references (`0` branch first),
//! a node which does is a leaf and the rest of the cell is the value.

use super::{DictBound, SetMode};
use crate::cell::{Cell, CellBuilder, CellSlice};
use crate::error::Error;

/// Branch taken at a fork.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum Branch {
    /// Key bit `0`.
    Left = 0,
    /// Key bit `1`.
    Right = 1,
}

impl Branch {
    #[inline]
    pub(crate) fn into_bit(self) -> bool {
        self == Self::Right
    }

    #[inline]
    pub(crate) fn reversed(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

impl From<bool> for Branch {
    #[inline]
    fn from(bit: bool) -> Self {
        if bit {
            Self::Right
        } else {
            Self::Left
        }
    }
}

/// An edge on the path from the root to the affected leaf.
struct Segment {
    /// Fork node with the label still unread.
    fork: CellSlice,
    /// Branch the key goes to.
    next_branch: Branch,
    /// Key bits below the branch bit.
    remaining_after: u16,
}

/// Reads an edge label, returning the key part it encodes.
pub(crate) fn read_label(label: &mut CellSlice, key_bit_len: u16) -> Result<CellSlice, Error> {
    let bits_for_len = (16 - key_bit_len.leading_zeros()) as u16;

    let prefix = if label.is_data_empty() && bits_for_len == 0 {
        label.get_prefix(0, 0)
    } else if !ok!(label.load_bit()) {
        // hml_short$0: unary length, then the key bits
        let mut len = 0;
        while ok!(label.load_bit()) {
            len += 1;
        }
        ok!(label.load_prefix(len, 0))
    } else if !ok!(label.load_bit()) {
        // hml_long$10: binary length, then the key bits
        let len = ok!(label.load_uint(bits_for_len)) as u16;
        ok!(label.load_prefix(len, 0))
    } else {
        // hml_same$11: a single repeated bit and a binary length
        let bit = ok!(label.load_bit());
        let len = ok!(label.load_uint(bits_for_len)) as u16;
        ok!(make_uniform_slice(bit, len))
    };

    if prefix.remaining_bits() > key_bit_len {
        return Err(Error::MalformedEncoding);
    }
    Ok(prefix)
}

/// Writes the shortest of the three label encodings.
pub(crate) fn write_label(
    key: &CellSlice,
    key_bit_len: u16,
    label: &mut CellBuilder,
) -> Result<(), Error> {
    if key_bit_len == 0 || key.is_data_empty() {
        return label.store_zeros(2);
    }

    let bits_for_len = (16 - key_bit_len.leading_zeros()) as u16;
    let remaining_bits = key.remaining_bits();

    let hml_short_len = 2 + 2 * remaining_bits;
    let hml_long_len = 2 + bits_for_len + remaining_bits;
    let hml_same_len = 3 + bits_for_len;

    if hml_same_len < hml_long_len && hml_same_len < hml_short_len {
        if let Some(bit) = key.test_uniform() {
            ok!(label.store_small_uint(0b110 | bit as u8, 3));
            return label.store_uint(remaining_bits as u64, bits_for_len);
        }
    }

    if hml_short_len <= hml_long_len {
        ok!(label.store_bit_zero());
        ok!(label.store_ones(remaining_bits));
        ok!(label.store_bit_zero());
    } else {
        ok!(label.store_bit_one());
        ok!(label.store_bit_zero());
        ok!(label.store_uint(remaining_bits as u64, bits_for_len));
    }
    label.store_slice_data(key)
}

/// Writes a label assembled from a prefix, a branch bit and a tail,
/// used when a removed leaf's sibling is merged into the parent edge.
fn write_label_parts(
    pfx: &CellSlice,
    bit: bool,
    rem: &CellSlice,
    key_bit_len: u16,
    label: &mut CellBuilder,
) -> Result<(), Error> {
    let bits_for_len = (16 - key_bit_len.leading_zeros()) as u16;
    let remaining_bits = pfx.remaining_bits() + 1 + rem.remaining_bits();

    let hml_short_len = 2 + 2 * remaining_bits;
    let hml_long_len = 2 + bits_for_len + remaining_bits;
    let hml_same_len = 3 + bits_for_len;

    if hml_same_len < hml_long_len && hml_same_len < hml_short_len {
        let pfx_uniform = pfx.is_data_empty() || pfx.test_uniform() == Some(bit);
        let rem_uniform = rem.is_data_empty() || rem.test_uniform() == Some(bit);
        if pfx_uniform && rem_uniform {
            ok!(label.store_small_uint(0b110 | bit as u8, 3));
            return label.store_uint(remaining_bits as u64, bits_for_len);
        }
    }

    if hml_short_len <= hml_long_len {
        ok!(label.store_bit_zero());
        ok!(label.store_ones(remaining_bits));
        ok!(label.store_bit_zero());
    } else {
        ok!(label.store_bit_one());
        ok!(label.store_bit_zero());
        ok!(label.store_uint(remaining_bits as u64, bits_for_len));
    }
    ok!(label.store_slice_data(pfx));
    ok!(label.store_bit(bit));
    label.store_slice_data(rem)
}

fn make_uniform_slice(bit: bool, len: u16) -> Result<CellSlice, Error> {
    let mut builder = CellBuilder::new();
    if bit {
        ok!(builder.store_ones(len));
    } else {
        ok!(builder.store_zeros(len));
    }
    Ok(ok!(builder.build()).as_slice())
}

fn make_leaf(key: &CellSlice, key_bit_len: u16, value: &CellSlice) -> Result<Cell, Error> {
    let mut builder = CellBuilder::new();
    ok!(write_label(key, key_bit_len, &mut builder));
    ok!(builder.store_slice(value));
    builder.build()
}

/// Rebuilds the path from the affected node back to the root.
/// Untouched sibling subtrees are shared, never copied.
fn rebuild_path(mut leaf: Cell, stack: Vec<Segment>) -> Result<Cell, Error> {
    for segment in stack.into_iter().rev() {
        let sibling = match segment.fork.reference(segment.next_branch.reversed() as u8) {
            Some(cell) => cell.clone(),
            None => return Err(Error::MalformedEncoding),
        };
        let (left, right) = match segment.next_branch {
            Branch::Left => (leaf, sibling),
            Branch::Right => (sibling, leaf),
        };

        let mut builder = CellBuilder::new();
        // The fork keeps its label, only one branch changes.
        ok!(builder.store_slice_data(&segment.fork));
        ok!(builder.store_reference(left));
        ok!(builder.store_reference(right));
        leaf = ok!(builder.build());
    }
    Ok(leaf)
}

/// Inserts a value in accordance with the logic of the specified
/// [`SetMode`], rebuilding only the affected path.
pub(crate) fn dict_insert(
    root: &Option<Cell>,
    key: &mut CellSlice,
    key_bit_len: u16,
    value: &CellSlice,
    mode: SetMode,
) -> Result<Option<Cell>, Error> {
    debug_assert_eq!(key.remaining_bits(), key_bit_len);

    let mut data = match root {
        Some(root) => root.as_slice(),
        None if mode.can_add() => {
            return Ok(Some(ok!(make_leaf(key, key_bit_len, value))));
        }
        None => return Err(Error::KeyNotFound),
    };

    let mut stack = Vec::<Segment>::new();

    let leaf = loop {
        let mut remaining_data = data.clone();
        let prefix = ok!(read_label(&mut remaining_data, key.remaining_bits()));
        let lcp_len = key.longest_common_prefix_len(&prefix);

        if lcp_len == key.remaining_bits() {
            // The whole key matched, the leaf holds the previous value
            if !mode.can_replace() {
                return Err(Error::KeyExists);
            }
            break ok!(make_leaf(key, key.remaining_bits(), value));
        } else if lcp_len < prefix.remaining_bits() {
            // The label diverges from the key, split the edge
            if !mode.can_add() {
                return Err(Error::KeyNotFound);
            }

            let prev_key_bit_len = key.remaining_bits();
            let lcp = prefix.get_prefix(lcp_len, 0);
            let old_to_right = ok!(prefix.get_bit(lcp_len));

            ok!(key.skip_first(lcp_len + 1, 0));
            let mut old_label = prefix.clone();
            ok!(old_label.skip_first(lcp_len + 1, 0));

            let old = ok!(make_leaf(&old_label, key.remaining_bits(), &remaining_data));
            let new = ok!(make_leaf(key, key.remaining_bits(), value));
            let (left, right) = if old_to_right { (new, old) } else { (old, new) };

            let mut builder = CellBuilder::new();
            ok!(write_label(&lcp, prev_key_bit_len, &mut builder));
            ok!(builder.store_reference(left));
            ok!(builder.store_reference(right));
            break ok!(builder.build());
        } else {
            // The label is fully matched but key bits remain
            if remaining_data.remaining_refs() != 2 {
                return Err(Error::MalformedEncoding);
            }

            ok!(key.skip_first(lcp_len, 0));
            let next_branch = Branch::from(ok!(key.load_bit()));
            let child = match remaining_data.reference(next_branch as u8) {
                Some(child) => child.as_slice(),
                None => return Err(Error::MalformedEncoding),
            };
            stack.push(Segment {
                fork: data.clone(),
                next_branch,
                remaining_after: key.remaining_bits(),
            });
            data = child;
        }
    };

    Ok(Some(ok!(rebuild_path(leaf, stack))))
}

/// Removes the value associated with the key, returning the new root
/// and the removed value.
pub(crate) fn dict_remove(
    root: &Option<Cell>,
    key: &mut CellSlice,
    key_bit_len: u16,
) -> Result<(Option<Cell>, CellSlice), Error> {
    debug_assert_eq!(key.remaining_bits(), key_bit_len);

    let Some(root) = root else {
        return Err(Error::KeyNotFound);
    };
    let mut data = root.as_slice();
    let mut stack = Vec::<Segment>::new();
    let mut prev_key_bit_len = key.remaining_bits();

    let removed = loop {
        let mut remaining_data = data.clone();
        let prefix = ok!(read_label(&mut remaining_data, key.remaining_bits()));
        let lcp_len = key.longest_common_prefix_len(&prefix);

        if lcp_len == key.remaining_bits() {
            break remaining_data;
        } else if lcp_len < prefix.remaining_bits() {
            return Err(Error::KeyNotFound);
        }

        if remaining_data.remaining_refs() != 2 {
            return Err(Error::MalformedEncoding);
        }

        prev_key_bit_len = key.remaining_bits();
        ok!(key.skip_first(lcp_len, 0));
        let next_branch = Branch::from(ok!(key.load_bit()));
        let child = match remaining_data.reference(next_branch as u8) {
            Some(child) => child.as_slice(),
            None => return Err(Error::MalformedEncoding),
        };
        stack.push(Segment {
            fork: data.clone(),
            next_branch,
            remaining_after: key.remaining_bits(),
        });
        data = child;
    };

    // Merge the sibling of the removed leaf into the parent edge
    let leaf = match stack.pop() {
        Some(last) => {
            let mut parent = last.fork.clone();
            let pfx = ok!(read_label(&mut parent, prev_key_bit_len));

            let mut opposite = match last.fork.reference(last.next_branch.reversed() as u8) {
                Some(cell) => cell.as_slice(),
                None => return Err(Error::MalformedEncoding),
            };
            let rem = ok!(read_label(&mut opposite, last.remaining_after));

            let mut builder = CellBuilder::new();
            ok!(write_label_parts(
                &pfx,
                !last.next_branch.into_bit(),
                &rem,
                prev_key_bit_len,
                &mut builder,
            ));
            ok!(builder.store_slice(&opposite));
            ok!(builder.build())
        }
        None => return Ok((None, removed)),
    };

    Ok((Some(ok!(rebuild_path(leaf, stack))), removed))
}

/// Returns the value corresponding to the key.
pub(crate) fn dict_get(
    root: &Option<Cell>,
    key_bit_len: u16,
    mut key: CellSlice,
) -> Result<Option<CellSlice>, Error> {
    debug_assert_eq!(key.remaining_bits(), key_bit_len);

    let Some(root) = root else {
        return Ok(None);
    };
    let mut data = root.as_slice();

    loop {
        let prefix = ok!(read_label(&mut data, key.remaining_bits()));
        let lcp_len = key.longest_common_prefix_len(&prefix);

        if lcp_len == key.remaining_bits() {
            return Ok(Some(data));
        } else if lcp_len < prefix.remaining_bits() {
            return Ok(None);
        }

        if data.remaining_refs() < 2 {
            return Ok(None);
        }
        ok!(key.skip_first(lcp_len, 0));
        let child_branch = Branch::from(ok!(key.load_bit()));
        data = match data.reference(child_branch as u8) {
            Some(child) => child.as_slice(),
            None => return Err(Error::MalformedEncoding),
        };
    }
}

/// Walks to the extremum of a subtree, appending the walked key bits.
/// The sign-bit reversal applies only when the very first key bit is
/// being decided, which is exactly when `key` is still empty.
fn walk_bound(
    mut data: CellSlice,
    mut key_bit_len: u16,
    bound: DictBound,
    signed: bool,
    key: &mut CellBuilder,
) -> Result<CellSlice, Error> {
    loop {
        let prefix = ok!(read_label(&mut data, key_bit_len));
        if !prefix.is_data_empty() {
            ok!(key.store_slice_data(&prefix));
        }

        match key_bit_len.checked_sub(prefix.remaining_bits()) {
            Some(0) => return Ok(data),
            Some(remaining) => {
                if data.remaining_refs() != 2 {
                    return Err(Error::MalformedEncoding);
                }
                key_bit_len = remaining - 1;
            }
            None => return Err(Error::MalformedEncoding),
        }

        let mut next = bound.into_branch();
        if signed && key.bit_len() == 0 {
            next = next.reversed();
        }
        ok!(key.store_bit(next.into_bit()));
        data = match data.reference(next as u8) {
            Some(child) => child.as_slice(),
            None => return Err(Error::MalformedEncoding),
        };
    }
}

/// Finds the minimum or maximum entry.
pub(crate) fn dict_find_bound(
    root: &Option<Cell>,
    key_bit_len: u16,
    bound: DictBound,
    signed: bool,
) -> Result<Option<(CellBuilder, CellSlice)>, Error> {
    let Some(root) = root else {
        return Ok(None);
    };
    let mut key = CellBuilder::new();
    let value = ok!(walk_bound(root.as_slice(), key_bit_len, bound, signed, &mut key));
    Ok(Some((key, value)))
}

/// Finds the entry nearest to the probe key: the smallest entry above
/// it (`towards = Max`) or the largest entry below it (`towards = Min`),
/// optionally accepting an exact match.
pub(crate) fn dict_find_nearest(
    root: &Option<Cell>,
    key: &mut CellSlice,
    key_bit_len: u16,
    towards: DictBound,
    allow_equal: bool,
    signed: bool,
) -> Result<Option<(CellBuilder, CellSlice)>, Error> {
    debug_assert_eq!(key.remaining_bits(), key_bit_len);

    let Some(root) = root else {
        return Ok(None);
    };

    let probe = key.clone();
    let mut data = root.as_slice();
    let mut key_so_far = CellBuilder::new();
    let mut stack = Vec::<Segment>::new();

    // Walk towards the probe key recording the taken branches
    enum Outcome {
        Exact(CellSlice),
        // The whole current subtree compares greater than the probe
        Diverged { subtree_greater: bool },
    }

    let outcome = loop {
        let mut remaining_data = data.clone();
        let prefix = ok!(read_label(&mut remaining_data, key.remaining_bits()));
        let lcp_len = key.longest_common_prefix_len(&prefix);

        if lcp_len == key.remaining_bits() {
            break Outcome::Exact(remaining_data);
        } else if lcp_len < prefix.remaining_bits() {
            let divergence_pos = key_bit_len - key.remaining_bits() + lcp_len;
            let subtree_bit = ok!(prefix.get_bit(lcp_len));
            break Outcome::Diverged {
                subtree_greater: subtree_bit != (signed && divergence_pos == 0),
            };
        }

        if remaining_data.remaining_refs() != 2 {
            return Err(Error::MalformedEncoding);
        }
        ok!(key_so_far.store_slice_data(&prefix));
        ok!(key.skip_first(lcp_len, 0));
        let next_branch = Branch::from(ok!(key.load_bit()));
        let child = match remaining_data.reference(next_branch as u8) {
            Some(child) => child.as_slice(),
            None => return Err(Error::MalformedEncoding),
        };
        stack.push(Segment {
            fork: data.clone(),
            next_branch,
            remaining_after: key.remaining_bits(),
        });
        ok!(key_so_far.store_bit(next_branch.into_bit()));
        data = child;
    };

    let towards_greater = towards == DictBound::Max;
    match outcome {
        Outcome::Exact(value) => {
            if allow_equal {
                let mut result_key = CellBuilder::new();
                ok!(result_key.store_slice_data(&probe));
                return Ok(Some((result_key, value)));
            }
        }
        Outcome::Diverged { subtree_greater } => {
            if subtree_greater == towards_greater {
                // The nearest entry is the extremum of this subtree
                let inner_bound = if towards_greater {
                    DictBound::Min
                } else {
                    DictBound::Max
                };
                let mut result_key = key_so_far;
                let value = ok!(walk_bound(
                    data,
                    key.remaining_bits(),
                    inner_bound,
                    false,
                    &mut result_key,
                ));
                return Ok(Some((result_key, value)));
            }
        }
    }

    // Rewind to the deepest fork whose untaken branch lies
    // on the required side of the probe
    while let Some(segment) = stack.pop() {
        let branch_bit_pos = key_bit_len - segment.remaining_after - 1;
        let sibling_branch = segment.next_branch.reversed();
        let sibling_greater = sibling_branch.into_bit() != (signed && branch_bit_pos == 0);

        if sibling_greater != towards_greater {
            continue;
        }

        let sibling = match segment.fork.reference(sibling_branch as u8) {
            Some(cell) => cell.as_slice(),
            None => return Err(Error::MalformedEncoding),
        };

        let mut result_key = CellBuilder::new();
        ok!(result_key.store_slice_data(&probe.get_prefix(branch_bit_pos, 0)));
        ok!(result_key.store_bit(sibling_branch.into_bit()));

        let inner_bound = if towards_greater {
            DictBound::Min
        } else {
            DictBound::Max
        };
        let value = ok!(walk_bound(
            sibling,
            segment.remaining_after,
            inner_bound,
            false,
            &mut result_key,
        ));
        return Ok(Some((result_key, value)));
    }

    Ok(None)
}
