//! In-process ledger store with optimistic, version-checked transactions.
//!
//! Every record carries a version. A transaction remembers the version of
//! each record it read (including "absent"), stages its writes, and commits
//! under a single short critical section that re-validates every read
//! before applying anything. A failed validation surfaces as
//! [`LedgerError::Conflict`] and the caller retries from fresh state, so
//! read-then-write sequences on balances, holdings and status fields behave
//! as conditional updates rather than races.
//!
//! Commits are all-or-nothing: nothing is applied unless the whole read set
//! validates, so an operation that fails mid-flight leaves no partial effect.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;

use dashmap::DashMap;

use crate::errors::{LedgerError, LedgerResult};
use crate::ledger::{
    GrantId, Holding, HoldingKey, ItemId, Listing, ListingId, ListingStatus, PackGrant, Player,
    PlayerId, Trade, TradeId,
};

#[derive(Debug, Clone)]
struct Versioned<T> {
    version: u64,
    value: T,
}

/// One record family inside a transaction: observed read versions plus
/// staged writes. `None` in the read set means the record was absent.
struct TableTxn<K, V> {
    reads: HashMap<K, Option<u64>>,
    writes: HashMap<K, V>,
}

impl<K: Eq + Hash + Clone, V: Clone> TableTxn<K, V> {
    fn new() -> Self {
        Self {
            reads: HashMap::new(),
            writes: HashMap::new(),
        }
    }

    fn get(&mut self, map: &DashMap<K, Versioned<V>>, key: &K) -> Option<V> {
        if let Some(staged) = self.writes.get(key) {
            return Some(staged.clone());
        }
        let entry = map.get(key);
        let observed = entry.as_ref().map(|e| e.version);
        // Only the first read of a key pins its version; later reads within
        // the same transaction must not widen the validation window.
        self.reads.entry(key.clone()).or_insert(observed);
        entry.map(|e| e.value.clone())
    }

    fn put(&mut self, key: K, value: V) {
        self.writes.insert(key, value);
    }

    fn validate(&self, map: &DashMap<K, Versioned<V>>) -> bool {
        self.reads.iter().all(|(key, observed)| {
            let current = map.get(key).map(|e| e.version);
            current == *observed
        })
    }

    fn apply(self, map: &DashMap<K, Versioned<V>>) {
        for (key, value) in self.writes {
            match map.entry(key) {
                dashmap::mapref::entry::Entry::Occupied(mut slot) => {
                    let slot = slot.get_mut();
                    slot.version += 1;
                    slot.value = value;
                }
                dashmap::mapref::entry::Entry::Vacant(slot) => {
                    slot.insert(Versioned { version: 1, value });
                }
            }
        }
    }
}

/// The shared mutable ledger. All engine state lives here; the engine keeps
/// no copies across requests.
#[derive(Default)]
pub struct MemoryLedger {
    players: DashMap<PlayerId, Versioned<Player>>,
    holdings: DashMap<HoldingKey, Versioned<Holding>>,
    listings: DashMap<ListingId, Versioned<Listing>>,
    trades: DashMap<TradeId, Versioned<Trade>>,
    // Append-only provenance records; ids are fresh uuids, never contended.
    grants: DashMap<GrantId, PackGrant>,
    commit_gate: Mutex<()>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a transaction. Reads are taken against live state; writes are
    /// staged until [`Txn::commit`].
    pub fn begin(&self) -> Txn<'_> {
        Txn {
            ledger: self,
            players: TableTxn::new(),
            holdings: TableTxn::new(),
            listings: TableTxn::new(),
            trades: TableTxn::new(),
            grants: Vec::new(),
        }
    }

    // ---- read-only views (no transaction, snapshot semantics per record) ----

    pub fn get_player(&self, id: &PlayerId) -> Option<Player> {
        self.players.get(id).map(|e| e.value.clone())
    }

    /// Ids of every known player, for the accrual sweep.
    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(|e| e.key().clone()).collect()
    }

    pub fn get_listing(&self, id: ListingId) -> Option<Listing> {
        self.listings.get(&id).map(|e| e.value.clone())
    }

    pub fn open_listings(&self) -> Vec<Listing> {
        let mut open: Vec<_> = self
            .listings
            .iter()
            .filter(|e| e.value.status == ListingStatus::Open)
            .map(|e| e.value.clone())
            .collect();
        open.sort_by_key(|l| (l.created_at, l.id));
        open
    }

    pub fn get_trade(&self, id: TradeId) -> Option<Trade> {
        self.trades.get(&id).map(|e| e.value.clone())
    }

    pub fn trades_for(&self, player: &PlayerId) -> Vec<Trade> {
        let mut trades: Vec<_> = self
            .trades
            .iter()
            .filter(|e| &e.value.initiator == player || &e.value.counterparty == player)
            .map(|e| e.value.clone())
            .collect();
        trades.sort_by_key(|t| (t.created_at, t.id));
        trades
    }

    pub fn holdings_of(&self, player: &PlayerId) -> Vec<Holding> {
        let mut held: Vec<_> = self
            .holdings
            .iter()
            .filter(|e| &e.value.player == player)
            .map(|e| e.value.clone())
            .collect();
        held.sort_by_key(|h| h.item);
        held
    }

    pub fn grants_for(&self, player: &PlayerId) -> Vec<PackGrant> {
        let mut grants: Vec<_> = self
            .grants
            .iter()
            .filter(|e| &e.value().player == player)
            .map(|e| e.value().clone())
            .collect();
        grants.sort_by_key(|g| (g.created_at, g.id));
        grants
    }
}

/// An optimistic transaction over the ledger.
pub struct Txn<'a> {
    ledger: &'a MemoryLedger,
    players: TableTxn<PlayerId, Player>,
    holdings: TableTxn<HoldingKey, Holding>,
    listings: TableTxn<ListingId, Listing>,
    trades: TableTxn<TradeId, Trade>,
    grants: Vec<PackGrant>,
}

impl Txn<'_> {
    pub fn player(&mut self, id: &PlayerId) -> Option<Player> {
        self.players.get(&self.ledger.players, id)
    }

    pub fn put_player(&mut self, player: Player) {
        self.players.put(player.id.clone(), player);
    }

    pub fn holding(&mut self, player: &PlayerId, item: ItemId) -> Option<Holding> {
        self.holdings
            .get(&self.ledger.holdings, &(player.clone(), item))
    }

    /// Quantity held, treating an absent row as 0.
    pub fn holding_qty(&mut self, player: &PlayerId, item: ItemId) -> u64 {
        self.holding(player, item).map_or(0, |h| h.qty)
    }

    pub fn put_holding(&mut self, holding: Holding) {
        self.holdings
            .put((holding.player.clone(), holding.item), holding);
    }

    /// Stages `qty := current + delta` for a holding, creating the row if
    /// absent. Returns the new quantity.
    pub fn add_holding(&mut self, player: &PlayerId, item: ItemId, delta: u64) -> u64 {
        let qty = self.holding_qty(player, item) + delta;
        self.put_holding(Holding {
            player: player.clone(),
            item,
            qty,
        });
        qty
    }

    pub fn listing(&mut self, id: ListingId) -> Option<Listing> {
        self.listings.get(&self.ledger.listings, &id)
    }

    pub fn put_listing(&mut self, listing: Listing) {
        self.listings.put(listing.id, listing);
    }

    pub fn trade(&mut self, id: TradeId) -> Option<Trade> {
        self.trades.get(&self.ledger.trades, &id)
    }

    pub fn put_trade(&mut self, trade: Trade) {
        self.trades.put(trade.id, trade);
    }

    pub fn insert_grant(&mut self, grant: PackGrant) {
        self.grants.push(grant);
    }

    /// Validates every read against current versions and applies all staged
    /// writes, atomically with respect to other commits.
    pub fn commit(self) -> LedgerResult<()> {
        let ledger = self.ledger;
        let _gate = ledger
            .commit_gate
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let valid = self.players.validate(&ledger.players)
            && self.holdings.validate(&ledger.holdings)
            && self.listings.validate(&ledger.listings)
            && self.trades.validate(&ledger.trades);
        if !valid {
            return Err(LedgerError::Conflict);
        }

        self.players.apply(&ledger.players);
        self.holdings.apply(&ledger.holdings);
        self.listings.apply(&ledger.listings);
        self.trades.apply(&ledger.trades);
        for grant in self.grants {
            ledger.grants.insert(grant.id, grant);
        }
        Ok(())
    }
}
