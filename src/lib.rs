//! Cell, dictionary and account state primitives for TVM-compatible blockchains.
//!
//! The storage model is a DAG of bounded binary nodes ([`Cell`]s, at most
//! 1023 data bits and 4 references each), addressed by a SHA-256
//! representation hash. On top of it this crate provides read cursors
//! ([`CellSlice`]), write accumulators ([`CellBuilder`]), the canonical
//! Bag-of-Cells codec ([`Boc`]), a Patricia-trie dictionary keyed by
//! fixed-length bit strings ([`Dict`]), and — behind the `models` feature —
//! the account state grammar together with a deterministic record packer.
//!
//! [`Cell`]: cell::Cell
//! [`CellSlice`]: cell::CellSlice
//! [`CellBuilder`]: cell::CellBuilder
//! [`Boc`]: boc::Boc
//! [`Dict`]: dict::Dict

// Early return on `Err` without the implicit `From` conversion of `?`.
macro_rules! ok {
    ($e:expr $(,)?) => {
        match $e {
            core::result::Result::Ok(val) => val,
            core::result::Result::Err(err) => return core::result::Result::Err(err),
        }
    };
}

pub mod boc;
pub mod cell;
pub mod dict;
pub mod error;
#[cfg(feature = "models")]
pub mod models;
pub mod num;
pub mod prelude;

mod util;
