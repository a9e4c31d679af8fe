//! Item catalog: read-only card definitions and their income rates.
//!
//! The catalog is supplied by an external administration surface; the
//! engine only reads it. `StaticCatalog` is the in-process implementation
//! used by the demo binary and the tests.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::config::IncomeConfig;
use crate::ledger::ItemId;

/// Rarity class of a card. Determines passive income.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Rarity::Common => "common",
            Rarity::Rare => "rare",
            Rarity::Epic => "epic",
            Rarity::Legendary => "legendary",
        };
        f.write_str(name)
    }
}

/// A card definition. Immutable from the engine's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDefinition {
    pub id: ItemId,
    pub name: String,
    pub rarity: Rarity,
}

/// Read-only catalog lookup used by pack drawing and income accrual.
pub trait Catalog: Send + Sync {
    /// Every card currently defined. Pack draws select uniformly from this.
    fn all_items(&self) -> Vec<ItemDefinition>;

    /// Single card lookup.
    fn item(&self, id: ItemId) -> Option<ItemDefinition>;

    /// Coins per hour earned by one unit of the given rarity.
    fn income_rate(&self, rarity: Rarity) -> u64;
}

/// In-process catalog backed by a concurrent map.
pub struct StaticCatalog {
    items: DashMap<ItemId, ItemDefinition>,
    income: IncomeConfig,
}

impl StaticCatalog {
    pub fn new(income: IncomeConfig) -> Self {
        Self {
            items: DashMap::new(),
            income,
        }
    }

    pub fn with_items(income: IncomeConfig, items: Vec<ItemDefinition>) -> Arc<Self> {
        let catalog = Self::new(income);
        for item in items {
            catalog.insert(item);
        }
        Arc::new(catalog)
    }

    pub fn insert(&self, item: ItemDefinition) {
        self.items.insert(item.id, item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Catalog for StaticCatalog {
    fn all_items(&self) -> Vec<ItemDefinition> {
        let mut items: Vec<_> = self.items.iter().map(|e| e.value().clone()).collect();
        // Stable order so a seeded draw sequence is reproducible.
        items.sort_by_key(|item| item.id);
        items
    }

    fn item(&self, id: ItemId) -> Option<ItemDefinition> {
        self.items.get(&id).map(|e| e.value().clone())
    }

    fn income_rate(&self, rarity: Rarity) -> u64 {
        self.income.rate(rarity)
    }
}
