//! Ledger records: the durable state every engine operation reads and
//! mutates transactionally.
//!
//! The ledger exclusively owns these records. The engine never caches them
//! across requests; each operation re-reads current state inside its
//! transaction (see [`memory`]).

mod memory;

pub use memory::{MemoryLedger, Txn};

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::Rarity;

/// External player identity, resolved and authenticated by the caller.
/// The engine trusts it as handed in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Catalog card identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Marketplace listing identifier.
    ListingId
);
uuid_id!(
    /// Trade identifier.
    TradeId
);
uuid_id!(
    /// Pack grant (provenance record) identifier.
    GrantId
);

/// A player's ledger row: balance plus the two time checkpoints.
///
/// The accrual checkpoint and the pack cooldown are independent fields;
/// opening a pack does not reset the income clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    /// Coin balance. Never negative by construction (u64 plus guarded debits).
    pub balance: u64,
    /// Epoch seconds from which the next passive-income computation starts.
    pub accrual_checkpoint: i64,
    /// Epoch seconds of the last pack grant; 0 means never granted.
    pub last_pack_at: i64,
    pub created_at: i64,
}

impl Player {
    /// A fresh player record, created on first interaction.
    pub fn new(id: PlayerId, now: i64) -> Self {
        Self {
            id,
            balance: 0,
            accrual_checkpoint: now,
            last_pack_at: 0,
            created_at: now,
        }
    }
}

/// Quantity of one card owned by one player. Zero-qty rows may persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub player: PlayerId,
    pub item: ItemId,
    pub qty: u64,
}

/// Key for the holdings map.
pub type HoldingKey = (PlayerId, ItemId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Open,
    Sold,
}

/// A marketplace offer. While `Open`, the listed quantity is escrowed here,
/// out of the seller's holdings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub seller: PlayerId,
    pub item: ItemId,
    pub qty: u64,
    pub price: u64,
    pub status: ListingStatus,
    pub buyer: Option<PlayerId>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Open,
    Accepted,
    Cancelled,
}

/// One side's line in a trade offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeLeg {
    pub item: ItemId,
    pub qty: u64,
}

impl TradeLeg {
    pub fn new(item: ItemId, qty: u64) -> Self {
        Self { item, qty }
    }
}

/// A bilateral swap proposal. No items move until acceptance; both sides'
/// holdings are validated at acceptance time, not at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub initiator: PlayerId,
    /// External identity of the designated acceptor; resolved to a player
    /// record when the trade is accepted (they may not exist before then).
    pub counterparty: PlayerId,
    pub offered: Vec<TradeLeg>,
    pub requested: Vec<TradeLeg>,
    pub status: TradeStatus,
    pub created_at: i64,
    pub resolved_at: Option<i64>,
}

/// A card handed out by a pack opening.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantedItem {
    pub item: ItemId,
    pub name: String,
    pub rarity: Rarity,
}

/// Provenance record of one pack opening, kept for audit and display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackGrant {
    pub id: GrantId,
    pub player: PlayerId,
    pub size: u32,
    pub items: Vec<GrantedItem>,
    pub created_at: i64,
}
