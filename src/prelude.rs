//! The crate prelude.

pub use crate::boc::Boc;
pub use crate::cell::{Cell, CellBuilder, CellSlice, HashBytes, Load, Store};
pub use crate::dict::{Dict, DictBound, DictIter, SetMode};
pub use crate::error::Error;
pub use crate::num::{SplitDepth, Tokens, VarUint56};
