//! The economy engine facade.
//!
//! Owns the ledger, catalog, clock and configuration, and exposes the
//! settlement operations as short, atomic read-modify-write transactions.
//! Each operation runs inside [`MemoryLedger::begin`]/[`Txn::commit`] and is
//! retried on optimistic-commit conflict, so concurrent callers on the same
//! records are linearized and losers observe typed negative results.

mod accrual;
mod market;
mod packs;
mod trades;

pub use accrual::AccrualOutcome;
pub use market::PurchaseOutcome;
pub use trades::TradeOutcome;

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::Catalog;
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::errors::{EngineError, EngineResult, LedgerError};
use crate::ledger::{
    Holding, ItemId, Listing, MemoryLedger, PackGrant, Player, PlayerId, Trade, Txn,
};

/// How many times an operation re-runs its transaction after losing an
/// optimistic commit before giving up with `LedgerError::Contention`.
const MAX_TXN_ATTEMPTS: u32 = 8;

/// The settlement engine. Cheap to share behind an `Arc`; all operations
/// take `&self`.
pub struct EconomyEngine {
    ledger: Arc<MemoryLedger>,
    catalog: Arc<dyn Catalog>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    pub(crate) rng: Mutex<StdRng>,
}

impl EconomyEngine {
    pub fn new(config: EngineConfig, catalog: Arc<dyn Catalog>, clock: Arc<dyn Clock>) -> Self {
        Self {
            ledger: Arc::new(MemoryLedger::new()),
            catalog,
            clock,
            config,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Same engine, deterministic pack draws. Test and simulation use.
    pub fn with_rng_seed(
        config: EngineConfig,
        catalog: Arc<dyn Catalog>,
        clock: Arc<dyn Clock>,
        seed: u64,
    ) -> Self {
        let mut engine = Self::new(config, catalog, clock);
        engine.rng = Mutex::new(StdRng::seed_from_u64(seed));
        engine
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &dyn Catalog {
        self.catalog.as_ref()
    }

    /// The backing store. Exposed for read-only inspection; mutation goes
    /// through engine operations only.
    pub fn ledger(&self) -> &MemoryLedger {
        &self.ledger
    }

    pub(crate) fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Runs `op` in a fresh transaction, committing on success and retrying
    /// the whole closure on optimistic conflict. A typed failure from `op`
    /// aborts without committing, leaving no partial effect.
    pub(crate) fn with_txn<T>(
        &self,
        op: impl Fn(&mut Txn<'_>) -> EngineResult<T>,
    ) -> EngineResult<T> {
        for attempt in 1..=MAX_TXN_ATTEMPTS {
            let mut txn = self.ledger.begin();
            let out = op(&mut txn)?;
            match txn.commit() {
                Ok(()) => return Ok(out),
                Err(LedgerError::Conflict) => {
                    debug!(attempt, "ledger commit conflict, retrying");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(LedgerError::Contention {
            attempts: MAX_TXN_ATTEMPTS,
        }
        .into())
    }

    /// Reads the player record, creating it on first interaction. The
    /// creation is staged in the caller's transaction, so it lands (or not)
    /// atomically with the rest of the operation.
    pub(crate) fn ensure_player(&self, txn: &mut Txn<'_>, id: &PlayerId, now: i64) -> Player {
        match txn.player(id) {
            Some(player) => player,
            None => {
                debug!(player = %id, "creating player on first interaction");
                let player = Player::new(id.clone(), now);
                txn.put_player(player.clone());
                player
            }
        }
    }

    // ---- queries ----

    /// Balance-sensitive read: settles accrual, then reports balance and
    /// holdings. Creates the player on first interaction.
    ///
    /// Holdings are read after the settlement commit, so under concurrent
    /// mutation they are a snapshot taken slightly after the reported
    /// balance.
    pub fn profile(&self, id: &PlayerId) -> EngineResult<Profile> {
        let now = self.now();
        let outcome = self.with_txn(|txn| {
            let mut player = self.ensure_player(txn, id, now);
            let earned = self.accrue_in_txn(txn, &mut player, now);
            // ensure_player stages the creation; an existing player is only
            // rewritten when settlement actually changed the record.
            if earned > 0 {
                txn.put_player(player.clone());
            }
            Ok((earned, player.balance))
        })?;

        let holdings = self
            .ledger
            .holdings_of(id)
            .into_iter()
            .filter(|h| h.qty > 0)
            .map(|h| HoldingView::from_holding(&h, self.catalog.as_ref()))
            .collect();

        Ok(Profile {
            player: id.clone(),
            balance: outcome.1,
            accrued_now: outcome.0,
            holdings,
        })
    }

    pub fn open_listings(&self) -> Vec<Listing> {
        self.ledger.open_listings()
    }

    pub fn pack_history(&self, id: &PlayerId) -> Vec<PackGrant> {
        self.ledger.grants_for(id)
    }

    pub fn trades_for(&self, id: &PlayerId) -> Vec<Trade> {
        self.ledger.trades_for(id)
    }

    /// Every known player, for the periodic accrual sweep.
    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.ledger.player_ids()
    }
}

/// A player's inventory view: settled balance plus non-empty holdings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub player: PlayerId,
    pub balance: u64,
    /// Coins settled by this read (already included in `balance`).
    pub accrued_now: u64,
    pub holdings: Vec<HoldingView>,
}

/// One inventory line, enriched from the catalog where possible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldingView {
    pub item: ItemId,
    pub qty: u64,
    pub name: Option<String>,
}

impl HoldingView {
    fn from_holding(holding: &Holding, catalog: &dyn Catalog) -> Self {
        Self {
            item: holding.item,
            qty: holding.qty,
            name: catalog.item(holding.item).map(|i| i.name),
        }
    }
}

/// Shared guard: a player record must exist for settlement-side reads.
pub(crate) fn require_player(txn: &mut Txn<'_>, id: &PlayerId) -> EngineResult<Player> {
    txn.player(id)
        .ok_or_else(|| EngineError::PlayerNotFound(id.clone()))
}
