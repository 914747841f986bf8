//! Schema-driven account state packer.
//!
//! Turns a plain, structured description of an account into the
//! canonical `ShardAccount` cell tree. The transformation is pure:
//! equal inputs produce bit-identical trees, and any field-level
//! failure aborts the whole record.

use crate::cell::{Cell, CellBuilder, HashBytes, Store};
use crate::dict::Dict;
use crate::error::Error;
use crate::models::account::{
    Account, AccountState, AccountStorage, OptionalAccount, ShardAccount, SimpleLib, SpecialFlags,
    StateInit, StorageInfo, StorageUsed,
};
use crate::models::address::StdAddr;
use crate::models::currency::CurrencyCollection;
use crate::num::{SplitDepth, Tokens, VarUint56};

/// Structured description of an account state record.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AccountStateInput {
    /// Workchain id of the account.
    pub workchain: i8,
    /// Account id within the workchain.
    pub address: HashBytes,
    /// Account state description.
    pub state: StateDescr,
    /// Storage-level transaction time and balance.
    pub storage: AccountStorageInput,
    /// Storage statistics.
    pub storage_stat: StorageStatInput,
    /// Last transaction of the shard-account wrapper.
    pub last_trans: LastTransaction,
}

/// Account state part of the packer input.
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "type", rename_all = "lowercase")
)]
pub enum StateDescr {
    /// Account is not deployed yet.
    Uninit,
    /// Account is frozen.
    Frozen {
        /// Hash of the last known state.
        state_hash: HashBytes,
    },
    /// Account is deployed.
    Active {
        /// Optional split depth.
        #[cfg_attr(feature = "serde", serde(default))]
        split_depth: Option<u8>,
        /// Tick execution flag; the flags field is emitted
        /// when either side is given.
        #[cfg_attr(feature = "serde", serde(default))]
        tick: Option<bool>,
        /// Tock execution flag.
        #[cfg_attr(feature = "serde", serde(default))]
        tock: Option<bool>,
        /// Contract code.
        #[cfg_attr(feature = "serde", serde(default))]
        code: Option<Cell>,
        /// Contract data.
        #[cfg_attr(feature = "serde", serde(default))]
        data: Option<Cell>,
        /// Contract libraries.
        #[cfg_attr(feature = "serde", serde(default))]
        libraries: Vec<LibraryInput>,
    },
}

/// A library carried by an account state.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LibraryInput {
    /// Library code; its hash is the dictionary key.
    pub root: Cell,
    /// Whether the library is visible to other accounts.
    pub public: bool,
}

/// Transaction time and balance of the account storage.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AccountStorageInput {
    /// Logical time after the last transaction execution.
    pub last_trans_lt: u64,
    /// Balance in native currency.
    pub balance: Tokens,
}

/// Storage statistics of the account.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StorageStatInput {
    /// Amount of unique cells.
    pub used_cells: u64,
    /// The total number of bits in unique cells.
    pub used_bits: u64,
    /// The number of public libraries in the state.
    pub used_public_cells: u64,
    /// Unix timestamp of the last storage phase.
    pub last_paid: u32,
    /// Storage debt; emitted only when strictly positive.
    #[cfg_attr(feature = "serde", serde(default))]
    pub due_payment: Option<Tokens>,
}

/// Last transaction of the shard-account wrapper.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LastTransaction {
    /// Hash of the last transaction.
    pub hash: HashBytes,
    /// Logical time of the last transaction.
    pub lt: u64,
}

/// Packs an account state description into the canonical
/// `ShardAccount` cell.
pub fn pack_account_state(input: &AccountStateInput) -> Result<Cell, Error> {
    let account = Account {
        address: StdAddr::new(input.workchain, input.address),
        storage_stat: build_storage_info(&input.storage_stat),
        storage: AccountStorage {
            last_trans_lt: input.storage.last_trans_lt,
            balance: CurrencyCollection::new(input.storage.balance),
            state: ok!(build_account_state(&input.state)),
        },
    };

    let mut builder = CellBuilder::new();
    ok!(OptionalAccount(Some(account)).store_into(&mut builder));
    let account = ok!(builder.build());

    let record = ShardAccount {
        account,
        last_trans_hash: input.last_trans.hash,
        last_trans_lt: input.last_trans.lt,
    };
    let mut builder = CellBuilder::new();
    ok!(record.store_into(&mut builder));
    builder.build()
}

/// Packs the canonical record of a shard account slot with no account.
pub fn pack_empty_shard_account() -> Result<Cell, Error> {
    let mut builder = CellBuilder::new();
    ok!(OptionalAccount::EMPTY.store_into(&mut builder));

    let record = ShardAccount {
        account: ok!(builder.build()),
        last_trans_hash: HashBytes::ZERO,
        last_trans_lt: 0,
    };
    let mut builder = CellBuilder::new();
    ok!(record.store_into(&mut builder));
    builder.build()
}

/// Builds the library dictionary of an account state: keyed by the
/// library code hash, each value a [`SimpleLib`].
pub fn build_account_libraries(libraries: &[LibraryInput]) -> Result<Dict, Error> {
    let mut dict = Dict::new(StateInit::LIBS_KEY_BITS, false);
    for library in libraries {
        let key = *library.root.repr_hash();
        let mut value = CellBuilder::new();
        ok!(SimpleLib {
            public: library.public,
            root: library.root.clone(),
        }
        .store_into(&mut value));
        ok!(dict.set_builder(key.as_ref(), &value));
    }
    Ok(dict)
}

/// Builds a block-level library table: keyed by the library code hash,
/// each value a single reference to the library cell.
pub fn build_block_libraries(libraries: &[Cell]) -> Result<Dict, Error> {
    let mut dict = Dict::new(StateInit::LIBS_KEY_BITS, false);
    for library in libraries {
        let key = *library.repr_hash();
        ok!(dict.set_ref(key.as_ref(), library.clone()));
    }
    Ok(dict)
}

fn build_storage_info(stat: &StorageStatInput) -> StorageInfo {
    StorageInfo {
        used: StorageUsed {
            cells: VarUint56::new(stat.used_cells),
            bits: VarUint56::new(stat.used_bits),
            public_cells: VarUint56::new(stat.used_public_cells),
        },
        last_paid: stat.last_paid,
        due_payment: match stat.due_payment {
            Some(due) if !due.is_zero() => Some(due),
            _ => None,
        },
    }
}

fn build_account_state(state: &StateDescr) -> Result<AccountState, Error> {
    Ok(match state {
        StateDescr::Uninit => AccountState::Uninit,
        StateDescr::Frozen { state_hash } => AccountState::Frozen(*state_hash),
        StateDescr::Active {
            split_depth,
            tick,
            tock,
            code,
            data,
            libraries,
        } => AccountState::Active(StateInit {
            split_depth: match split_depth {
                Some(depth) => Some(ok!(SplitDepth::new(*depth))),
                None => None,
            },
            special: if tick.is_some() || tock.is_some() {
                Some(SpecialFlags {
                    tick: tick.unwrap_or_default(),
                    tock: tock.unwrap_or_default(),
                })
            } else {
                None
            },
            code: code.clone(),
            data: data.clone(),
            libraries: ok!(build_account_libraries(libraries)),
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boc::Boc;
    use crate::cell::{CellSlice, Load};
    use crate::models::account::OptionalAccount;

    fn code_cell() -> Cell {
        let mut builder = CellBuilder::new();
        builder.store_u32(0xc0de).unwrap();
        builder.build().unwrap()
    }

    fn data_cell() -> Cell {
        let mut builder = CellBuilder::new();
        builder.store_u32(0xda7a).unwrap();
        builder.build().unwrap()
    }

    fn base_input(state: StateDescr) -> AccountStateInput {
        AccountStateInput {
            workchain: 0,
            address: HashBytes([0x11; 32]),
            state,
            storage: AccountStorageInput {
                last_trans_lt: 1000,
                balance: Tokens::new(5_000_000),
            },
            storage_stat: StorageStatInput {
                used_cells: 10,
                used_bits: 500,
                used_public_cells: 0,
                last_paid: 1_690_000_000,
                due_payment: None,
            },
            last_trans: LastTransaction {
                hash: HashBytes([0x42; 32]),
                lt: 999,
            },
        }
    }

    /// Reads the account cell up to the start of the account state.
    fn read_until_state(record: &Cell) -> CellSlice {
        let mut root = record.as_slice();
        let account = root.load_reference().unwrap();
        assert_eq!(root.load_u256().unwrap(), HashBytes([0x42; 32]));
        assert_eq!(root.load_u64().unwrap(), 999);
        assert!(root.is_empty());

        let mut slice = account.as_slice();
        // account$1 and the address
        assert!(slice.load_bit().unwrap());
        let address = StdAddr::load_from(&mut slice).unwrap();
        assert_eq!(address, StdAddr::new(0, HashBytes([0x11; 32])));
        // storage statistics
        let stat = StorageInfo::load_from(&mut slice).unwrap();
        assert_eq!(stat.used.cells.into_inner(), 10);
        assert_eq!(stat.used.bits.into_inner(), 500);
        assert_eq!(stat.last_paid, 1_690_000_000);
        assert_eq!(stat.due_payment, None);
        // storage preamble
        assert_eq!(slice.load_u64().unwrap(), 1000);
        let balance = CurrencyCollection::load_from(&mut slice).unwrap();
        assert_eq!(balance.tokens, Tokens::new(5_000_000));
        assert!(balance.other.is_empty());
        slice
    }

    #[test]
    fn uninit_account_layout() {
        let record = pack_account_state(&base_input(StateDescr::Uninit)).unwrap();
        let mut state = read_until_state(&record);

        // account_uninit$00, nothing else
        assert_eq!(state.load_uint(2).unwrap(), 0b00);
        assert!(state.is_empty());
    }

    #[test]
    fn frozen_account_layout() {
        let record = pack_account_state(&base_input(StateDescr::Frozen {
            state_hash: HashBytes([0x77; 32]),
        }))
        .unwrap();
        let mut state = read_until_state(&record);

        // account_frozen$01, then the state hash: 258 bits, no refs
        assert_eq!(state.remaining_bits(), 258);
        assert_eq!(state.remaining_refs(), 0);
        assert_eq!(state.load_uint(2).unwrap(), 0b01);
        assert_eq!(state.load_u256().unwrap(), HashBytes([0x77; 32]));
        assert!(state.is_empty());
    }

    #[test]
    fn active_account_layout() {
        let library = code_cell();
        let record = pack_account_state(&base_input(StateDescr::Active {
            split_depth: None,
            tick: None,
            tock: None,
            code: Some(code_cell()),
            data: Some(data_cell()),
            libraries: vec![LibraryInput {
                root: library.clone(),
                public: true,
            }],
        }))
        .unwrap();
        let mut state = read_until_state(&record);

        // account_active$1, absent split depth and flags, then three
        // presence bits each followed by its reference
        assert_eq!(state.load_uint(6).unwrap(), 0b100111);
        assert!(state.is_data_empty());
        assert_eq!(state.remaining_refs(), 3);
        assert_eq!(state.load_reference().unwrap(), code_cell());
        assert_eq!(state.load_reference().unwrap(), data_cell());

        let libs = state.load_reference().unwrap();
        let libs = Dict::from_root(Some(libs), 256, false);
        let mut value = libs.get(library.repr_hash().as_ref()).unwrap();
        let value = SimpleLib::load_from(&mut value).unwrap();
        assert!(value.public);
        assert_eq!(value.root, library);
    }

    #[test]
    fn active_account_without_libraries() {
        let record = pack_account_state(&base_input(StateDescr::Active {
            split_depth: None,
            tick: None,
            tock: None,
            code: Some(code_cell()),
            data: Some(data_cell()),
            libraries: Vec::new(),
        }))
        .unwrap();
        let mut state = read_until_state(&record);

        assert_eq!(state.load_uint(6).unwrap(), 0b100110);
        assert_eq!(state.remaining_refs(), 2);
    }

    #[test]
    fn active_account_with_special_fields() {
        let record = pack_account_state(&base_input(StateDescr::Active {
            split_depth: Some(5),
            tick: Some(true),
            tock: None,
            code: None,
            data: None,
            libraries: Vec::new(),
        }))
        .unwrap();
        let mut state = read_until_state(&record);

        // tag, then split depth with its presence bit
        assert!(state.load_bit().unwrap());
        assert!(state.load_bit().unwrap());
        assert_eq!(state.load_uint(5).unwrap(), 5);
        // one given flag emits the whole pair, the other side is false
        assert!(state.load_bit().unwrap());
        assert_eq!(state.load_uint(2).unwrap(), 0b10);
        // absent code, data and libraries
        assert_eq!(state.load_uint(3).unwrap(), 0b000);
        assert!(state.is_empty());
    }

    #[test]
    fn due_payment_presence() {
        let mut input = base_input(StateDescr::Uninit);
        let record = pack_account_state(&input).unwrap();
        let account = record.as_slice().load_reference().unwrap();
        let mut slice = account.as_slice();
        slice.load_bit().unwrap();
        StdAddr::load_from(&mut slice).unwrap();
        StorageUsed::load_from(&mut slice).unwrap();
        slice.load_u32().unwrap();
        // no debt, a single zero bit
        assert!(!slice.load_bit().unwrap());

        // An explicit zero is the same as no debt
        input.storage_stat.due_payment = Some(Tokens::ZERO);
        assert_eq!(pack_account_state(&input).unwrap(), record);

        input.storage_stat.due_payment = Some(Tokens::new(5));
        let record = pack_account_state(&input).unwrap();
        let account = record.as_slice().load_reference().unwrap();
        let mut slice = account.as_slice();
        slice.load_bit().unwrap();
        StdAddr::load_from(&mut slice).unwrap();
        StorageUsed::load_from(&mut slice).unwrap();
        slice.load_u32().unwrap();
        assert!(slice.load_bit().unwrap());
        assert_eq!(slice.load_var_uint(16).unwrap(), 5);
    }

    #[test]
    fn packing_is_deterministic() {
        let input = base_input(StateDescr::Active {
            split_depth: None,
            tick: None,
            tock: Some(true),
            code: Some(code_cell()),
            data: None,
            libraries: vec![
                LibraryInput {
                    root: code_cell(),
                    public: false,
                },
                LibraryInput {
                    root: data_cell(),
                    public: true,
                },
            ],
        });

        let a = pack_account_state(&input).unwrap();
        let b = pack_account_state(&input).unwrap();
        assert_eq!(a, b);
        assert_eq!(Boc::encode(&a), Boc::encode(&b));
    }

    #[test]
    fn invalid_split_depth_aborts() {
        let input = base_input(StateDescr::Active {
            split_depth: Some(31),
            tick: None,
            tock: None,
            code: None,
            data: None,
            libraries: Vec::new(),
        });
        assert_eq!(pack_account_state(&input), Err(Error::IntOverflow));
    }

    #[test]
    fn empty_shard_account_layout() {
        let record = pack_empty_shard_account().unwrap();
        let mut slice = record.as_slice();
        assert_eq!(slice.remaining_bits(), 320);

        let account = slice.load_reference().unwrap();
        assert_eq!(account.bit_len(), 1);
        assert_eq!(account.reference_count(), 0);
        let parsed = OptionalAccount::load_from(&mut account.as_slice()).unwrap();
        assert!(parsed.0.is_none());

        assert_eq!(slice.load_u256().unwrap(), HashBytes::ZERO);
        assert_eq!(slice.load_u64().unwrap(), 0);
    }

    #[test]
    fn block_libraries_are_wrapped() {
        let libs = [code_cell(), data_cell()];
        let dict = build_block_libraries(&libs).unwrap();

        for lib in &libs {
            let mut value = dict.get(lib.repr_hash().as_ref()).unwrap();
            assert_eq!(value.remaining_bits(), 0);
            assert_eq!(value.remaining_refs(), 1);
            assert_eq!(value.load_reference().unwrap(), *lib);
        }
    }

    #[test]
    #[cfg(feature = "serde")]
    fn input_from_json() {
        let json = r#"{
            "workchain": -1,
            "address": "34517c7bdf5187c55af4f8b61fdc321588c7ab768dee24b006df29106458d7cf",
            "state": {
                "type": "active",
                "tick": true,
                "tock": false,
                "code": "te6ccgEBAQEAAwAAAv8="
            },
            "storage": { "last_trans_lt": 12, "balance": 1000000000 },
            "storage_stat": {
                "used_cells": 1,
                "used_bits": 8,
                "used_public_cells": 0,
                "last_paid": 1690000000
            },
            "last_trans": {
                "hash": "0000000000000000000000000000000000000000000000000000000000000000",
                "lt": 11
            }
        }"#;

        let input: AccountStateInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.workchain, -1);
        assert_eq!(input.storage.balance, Tokens::new(1_000_000_000));

        let record = pack_account_state(&input).unwrap();
        let account = record.as_slice().load_reference().unwrap();
        let account = OptionalAccount::load_from(&mut account.as_slice())
            .unwrap()
            .0
            .unwrap();
        match account.storage.state {
            AccountState::Active(state) => {
                let code = state.code.unwrap();
                assert_eq!(code.bit_len(), 8);
                assert_eq!(state.special, Some(SpecialFlags { tick: true, tock: false }));
            }
            state => panic!("unexpected state: {state:?}"),
        }
    }
}
