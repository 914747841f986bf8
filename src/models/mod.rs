//! Account state models and the record packer.

pub use self::account::{
    Account, AccountState, AccountStorage, OptionalAccount, ShardAccount, SimpleLib, SpecialFlags,
    StateInit, StorageInfo, StorageUsed,
};
pub use self::address::StdAddr;
pub use self::currency::CurrencyCollection;
pub use self::packer::{
    build_account_libraries, build_block_libraries, pack_account_state, pack_empty_shard_account,
    AccountStateInput, AccountStorageInput, LastTransaction, LibraryInput, StateDescr,
    StorageStatInput,
};

mod account;
mod address;
mod currency;
mod packer;
