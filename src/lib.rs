//! cardbank - economy ledger and settlement engine for a collectible-card
//! game.
//!
//! Players accumulate passive income from owned cards, redeem timed reward
//! packs, list cards on a marketplace and swap cards peer to peer. This
//! crate is the settlement core: every operation is an atomic, idempotent
//! read-modify-write against the ledger, correct under concurrent
//! conflicting mutation of balances and holdings. Authentication, rendering
//! and catalog administration are external collaborators; the engine
//! consumes a resolved player identity and a read-only catalog.
//!
//! ## Concurrency
//!
//! The ledger uses optimistic, version-checked transactions (see
//! [`ledger::MemoryLedger`]): operations on the same record are linearized,
//! racing losers observe typed negative results (`ListingNotOpen`,
//! `CooldownActive`, `TradeNotOpen`), and a failed operation leaves no
//! partial effect.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use cardbank::{
//!     EconomyEngine, EngineConfig, ItemDefinition, ItemId, PlayerId, Rarity,
//!     StaticCatalog, SystemClock,
//! };
//!
//! let config = EngineConfig::default();
//! let catalog = StaticCatalog::with_items(
//!     config.income.clone(),
//!     vec![ItemDefinition {
//!         id: ItemId(1),
//!         name: "Sprout".into(),
//!         rarity: Rarity::Common,
//!     }],
//! );
//! let engine = EconomyEngine::new(config, catalog, Arc::new(SystemClock));
//!
//! let alice = PlayerId::from("alice");
//! let grant = engine.open_pack(&alice, None).unwrap();
//! assert_eq!(grant.items.len(), 5);
//! ```

pub mod catalog;
pub mod clock;
pub mod config;
pub mod engine;
pub mod errors;
pub mod ledger;
pub mod sweep;

pub use catalog::{Catalog, ItemDefinition, Rarity, StaticCatalog};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, ConfigLoader, EngineConfig, IncomeConfig, PackConfig, SweepConfig};
pub use engine::{
    AccrualOutcome, EconomyEngine, HoldingView, Profile, PurchaseOutcome, TradeOutcome,
};
pub use errors::{EngineError, EngineResult, LedgerError};
pub use ledger::{
    GrantId, GrantedItem, Holding, ItemId, Listing, ListingId, ListingStatus, MemoryLedger,
    PackGrant, Player, PlayerId, Trade, TradeId, TradeLeg, TradeStatus,
};
pub use sweep::{AccrualSweep, SweepReport};
