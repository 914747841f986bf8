//! Common error types.

/// Error type for cell and dictionary related errors.
#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    /// There was not enough bits or refs capacity in the cell builder.
    #[error("cell capacity exceeded")]
    CapacityExceeded,
    /// The value does not fit into the declared bit width.
    #[error("integer does not fit into the declared width")]
    IntOverflow,
    /// There were not enough bits or refs in the cell slice.
    #[error("slice underrun")]
    SliceUnderrun,
    /// Invalid cell tree encoding.
    #[error("malformed encoding")]
    MalformedEncoding,
    /// Dictionary does not contain the requested key.
    #[error("key not found")]
    KeyNotFound,
    /// Dictionary already contains the key.
    #[error("key already exists")]
    KeyExists,
    /// Requested a bound of a dictionary without entries.
    #[error("dictionary is empty")]
    EmptyDictionary,
    /// Structurally inconsistent input record.
    #[error("invalid input")]
    InvalidInput,
}

/// Error type for address parsing related errors.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ParseAddrError {
    /// Tried to parse an empty string.
    #[error("cannot parse address from an empty string")]
    Empty,
    /// Workchain id is too large.
    #[error("workchain id is too large to fit in target type")]
    InvalidWorkchain,
    /// Invalid account id hex.
    #[error("cannot parse account id")]
    InvalidAccountId,
    /// Too many address parts.
    #[error("unexpected address part")]
    UnexpectedPart,
}

/// Error type for hash bytes parsing related errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseHashBytesError {
    /// Failed to parse hex encoded bytes.
    #[error("invalid hex string")]
    InvalidHex(#[from] hex::FromHexError),
    /// Error for an unexpected string length.
    #[error("expected a string of 64 hex chars")]
    UnexpectedStringLength,
}
