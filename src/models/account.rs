//! Account state models.

use crate::cell::{Cell, CellBuilder, CellSlice, HashBytes, Load, Store};
use crate::dict::Dict;
use crate::error::Error;
use crate::models::address::StdAddr;
use crate::models::currency::CurrencyCollection;
use crate::num::{SplitDepth, Tokens, VarUint56};

/// Amount of unique cells and bits which an account state occupies.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub struct StorageUsed {
    /// Amount of unique cells.
    pub cells: VarUint56,
    /// The total number of bits in unique cells.
    pub bits: VarUint56,
    /// The number of public libraries in the state.
    pub public_cells: VarUint56,
}

impl StorageUsed {
    /// The additive identity for this type, i.e. `0`.
    pub const ZERO: Self = Self {
        cells: VarUint56::ZERO,
        bits: VarUint56::ZERO,
        public_cells: VarUint56::ZERO,
    };
}

impl Store for StorageUsed {
    fn store_into(&self, builder: &mut CellBuilder) -> Result<(), Error> {
        ok!(self.cells.store_into(builder));
        ok!(self.bits.store_into(builder));
        self.public_cells.store_into(builder)
    }
}

impl Load for StorageUsed {
    fn load_from(slice: &mut CellSlice) -> Result<Self, Error> {
        Ok(Self {
            cells: ok!(VarUint56::load_from(slice)),
            bits: ok!(VarUint56::load_from(slice)),
            public_cells: ok!(VarUint56::load_from(slice)),
        })
    }
}

/// Storage profile of an account.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub struct StorageInfo {
    /// Amount of unique cells and bits which the account state occupies.
    pub used: StorageUsed,
    /// Unix timestamp of the last storage phase.
    pub last_paid: u32,
    /// Account debt for storing its state.
    pub due_payment: Option<Tokens>,
}

impl Store for StorageInfo {
    fn store_into(&self, builder: &mut CellBuilder) -> Result<(), Error> {
        ok!(self.used.store_into(builder));
        ok!(builder.store_u32(self.last_paid));
        self.due_payment.store_into(builder)
    }
}

impl Load for StorageInfo {
    fn load_from(slice: &mut CellSlice) -> Result<Self, Error> {
        Ok(Self {
            used: ok!(StorageUsed::load_from(slice)),
            last_paid: ok!(slice.load_u32()),
            due_payment: ok!(Option::<Tokens>::load_from(slice)),
        })
    }
}

/// Special transactions execution flags.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub struct SpecialFlags {
    /// Account will be called at the beginning of each block.
    pub tick: bool,
    /// Account will be called at the end of each block.
    pub tock: bool,
}

impl SpecialFlags {
    /// The number of data bits that this struct occupies.
    pub const BITS: u16 = 2;
}

impl Store for SpecialFlags {
    fn store_into(&self, builder: &mut CellBuilder) -> Result<(), Error> {
        builder.store_small_uint(((self.tick as u8) << 1) | self.tock as u8, 2)
    }
}

impl Load for SpecialFlags {
    fn load_from(slice: &mut CellSlice) -> Result<Self, Error> {
        let data = ok!(slice.load_uint(2));
        Ok(Self {
            tick: data & 0b10 != 0,
            tock: data & 0b01 != 0,
        })
    }
}

/// Simple TVM library: a public flag and a reference to the library cell.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SimpleLib {
    /// Whether this library is accessible from other accounts.
    pub public: bool,
    /// Reference to the library code.
    pub root: Cell,
}

impl Store for SimpleLib {
    fn store_into(&self, builder: &mut CellBuilder) -> Result<(), Error> {
        ok!(builder.store_bit(self.public));
        builder.store_reference(self.root.clone())
    }
}

impl Load for SimpleLib {
    fn load_from(slice: &mut CellSlice) -> Result<Self, Error> {
        Ok(Self {
            public: ok!(slice.load_bit()),
            root: ok!(slice.load_reference()),
        })
    }
}

/// Deployed account state.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct StateInit {
    /// Optional split depth for large smart contracts.
    pub split_depth: Option<SplitDepth>,
    /// Optional special contract flags.
    pub special: Option<SpecialFlags>,
    /// Optional contract code.
    pub code: Option<Cell>,
    /// Optional contract data.
    pub data: Option<Cell>,
    /// Libraries used by the contract, keyed by the code hash.
    pub libraries: Dict,
}

impl Default for StateInit {
    fn default() -> Self {
        Self {
            split_depth: None,
            special: None,
            code: None,
            data: None,
            libraries: Dict::new(Self::LIBS_KEY_BITS, false),
        }
    }
}

impl StateInit {
    /// The key length of the library dictionary.
    pub const LIBS_KEY_BITS: u16 = 256;

    /// Returns the number of data bits that this struct occupies.
    pub const fn bit_len(&self) -> u16 {
        (1 + self.split_depth.is_some() as u16 * SplitDepth::BITS)
            + (1 + self.special.is_some() as u16 * SpecialFlags::BITS)
            + 3
    }

    /// Returns the number of references that this struct occupies.
    pub const fn reference_count(&self) -> u8 {
        self.code.is_some() as u8 + self.data.is_some() as u8 + !self.libraries.is_empty() as u8
    }
}

impl Store for StateInit {
    fn store_into(&self, builder: &mut CellBuilder) -> Result<(), Error> {
        ok!(self.split_depth.store_into(builder));
        ok!(self.special.store_into(builder));
        ok!(self.code.store_into(builder));
        ok!(self.data.store_into(builder));
        self.libraries.store_into(builder)
    }
}

impl Load for StateInit {
    fn load_from(slice: &mut CellSlice) -> Result<Self, Error> {
        Ok(Self {
            split_depth: ok!(Option::<SplitDepth>::load_from(slice)),
            special: ok!(Option::<SpecialFlags>::load_from(slice)),
            code: ok!(Option::<Cell>::load_from(slice)),
            data: ok!(Option::<Cell>::load_from(slice)),
            libraries: ok!(slice.load_dict(Self::LIBS_KEY_BITS, false)),
        })
    }
}

/// State of an existing account.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum AccountState {
    /// The account exists but has not yet been deployed,
    /// `account_uninit$00`.
    Uninit,
    /// The account is deployed, `account_active$1`.
    Active(StateInit),
    /// The account is frozen with the hash of its last state,
    /// `account_frozen$01`.
    Frozen(HashBytes),
}

impl Store for AccountState {
    fn store_into(&self, builder: &mut CellBuilder) -> Result<(), Error> {
        match self {
            Self::Uninit => builder.store_zeros(2),
            Self::Active(state) => {
                ok!(builder.store_bit_one());
                state.store_into(builder)
            }
            Self::Frozen(hash) => {
                ok!(builder.store_small_uint(0b01, 2));
                builder.store_u256(hash)
            }
        }
    }
}

impl Load for AccountState {
    fn load_from(slice: &mut CellSlice) -> Result<Self, Error> {
        Ok(if ok!(slice.load_bit()) {
            Self::Active(ok!(StateInit::load_from(slice)))
        } else if ok!(slice.load_bit()) {
            Self::Frozen(ok!(slice.load_u256()))
        } else {
            Self::Uninit
        })
    }
}

/// Account storage: the last transaction time, the balance
/// and the account state.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AccountStorage {
    /// Logical time after the last transaction execution.
    pub last_trans_lt: u64,
    /// Account balance for all currencies.
    pub balance: CurrencyCollection,
    /// Account state.
    pub state: AccountState,
}

impl Store for AccountStorage {
    fn store_into(&self, builder: &mut CellBuilder) -> Result<(), Error> {
        ok!(builder.store_u64(self.last_trans_lt));
        ok!(self.balance.store_into(builder));
        self.state.store_into(builder)
    }
}

impl Load for AccountStorage {
    fn load_from(slice: &mut CellSlice) -> Result<Self, Error> {
        Ok(Self {
            last_trans_lt: ok!(slice.load_u64()),
            balance: ok!(CurrencyCollection::load_from(slice)),
            state: ok!(AccountState::load_from(slice)),
        })
    }
}

/// An existing account.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Account {
    /// Account address.
    pub address: StdAddr,
    /// Storage statistics.
    pub storage_stat: StorageInfo,
    /// Logical time, balance and state.
    pub storage: AccountStorage,
}

/// `Account` with the `account_none$0` variant.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct OptionalAccount(pub Option<Account>);

impl OptionalAccount {
    /// The absent account, `account_none$0`.
    pub const EMPTY: Self = Self(None);
}

impl Store for OptionalAccount {
    fn store_into(&self, builder: &mut CellBuilder) -> Result<(), Error> {
        match &self.0 {
            Some(account) => {
                ok!(builder.store_bit_one());
                ok!(account.address.store_into(builder));
                ok!(account.storage_stat.store_into(builder));
                account.storage.store_into(builder)
            }
            None => builder.store_bit_zero(),
        }
    }
}

impl Load for OptionalAccount {
    fn load_from(slice: &mut CellSlice) -> Result<Self, Error> {
        Ok(Self(if ok!(slice.load_bit()) {
            Some(Account {
                address: ok!(StdAddr::load_from(slice)),
                storage_stat: ok!(StorageInfo::load_from(slice)),
                storage: ok!(AccountStorage::load_from(slice)),
            })
        } else {
            None
        }))
    }
}

/// Account record in the shard state: a reference to the account cell
/// together with the hash and logical time of its last transaction.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ShardAccount {
    /// Reference to the serialized [`OptionalAccount`].
    pub account: Cell,
    /// Hash of the last transaction.
    pub last_trans_hash: HashBytes,
    /// Logical time of the last transaction.
    pub last_trans_lt: u64,
}

impl Store for ShardAccount {
    fn store_into(&self, builder: &mut CellBuilder) -> Result<(), Error> {
        ok!(builder.store_reference(self.account.clone()));
        ok!(builder.store_u256(&self.last_trans_hash));
        builder.store_u64(self.last_trans_lt)
    }
}

impl Load for ShardAccount {
    fn load_from(slice: &mut CellSlice) -> Result<Self, Error> {
        Ok(Self {
            account: ok!(slice.load_reference()),
            last_trans_hash: ok!(slice.load_u256()),
            last_trans_lt: ok!(slice.load_u64()),
        })
    }
}
