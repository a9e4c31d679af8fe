//! Passive-income accrual.
//!
//! Income is computed in pure integer math: for each holding,
//! `rate(rarity) × qty` coins per hour, scaled by elapsed seconds and
//! floored once over the total. The checkpoint only advances when the
//! floored total is positive, so fractional accrual is never lost to
//! repeated calls.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::{require_player, EconomyEngine};
use crate::errors::EngineResult;
use crate::ledger::{Player, PlayerId, Txn};

/// Result of a settlement pass for one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualOutcome {
    pub player: PlayerId,
    /// Coins earned by this call (0 when nothing to settle).
    pub earned: u64,
    /// Balance after settlement.
    pub balance: u64,
    /// Checkpoint after settlement, epoch seconds.
    pub checkpoint: i64,
}

impl EconomyEngine {
    /// Settles passive income earned since the player's accrual checkpoint.
    ///
    /// Idempotent modulo the integer floor: an immediate second call sees
    /// the advanced checkpoint and earns 0. Unlike the acting operations,
    /// `settle` does not create players; unknown ids are `PlayerNotFound`.
    pub fn settle(&self, id: &PlayerId) -> EngineResult<AccrualOutcome> {
        let now = self.now();
        self.with_txn(|txn| {
            let mut player = require_player(txn, id)?;
            let earned = self.accrue_in_txn(txn, &mut player, now);
            let outcome = AccrualOutcome {
                player: id.clone(),
                earned,
                balance: player.balance,
                checkpoint: player.accrual_checkpoint,
            };
            if earned > 0 {
                txn.put_player(player);
            }
            Ok(outcome)
        })
    }

    /// Applies accrual to `player` in place, staging holding reads in `txn`
    /// so a concurrent inventory change invalidates the commit. Returns the
    /// earned amount; the caller stages the player write.
    ///
    /// Guards: non-positive elapsed time (clock skew, repeated calls within
    /// one second) earns 0 without touching the checkpoint.
    pub(crate) fn accrue_in_txn(&self, txn: &mut Txn<'_>, player: &mut Player, now: i64) -> u64 {
        let elapsed = now - player.accrual_checkpoint;
        if elapsed <= 0 {
            return 0;
        }

        let mut rate_per_hour: u64 = 0;
        for holding in self.ledger().holdings_of(&player.id) {
            // Re-read through the transaction to pin the version.
            let qty = txn.holding_qty(&player.id, holding.item);
            if qty == 0 {
                continue;
            }
            // Cards dropped from the catalog stop earning.
            if let Some(item) = self.catalog().item(holding.item) {
                rate_per_hour += self.catalog().income_rate(item.rarity) * qty;
            }
        }

        let earned = (u128::from(rate_per_hour) * elapsed as u128 / 3600) as u64;
        if earned > 0 {
            player.balance += earned;
            player.accrual_checkpoint = now;
            debug!(player = %player.id, earned, balance = player.balance, "accrual settled");
        }
        earned
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::catalog::{ItemDefinition, Rarity, StaticCatalog};
    use crate::clock::{Clock, ManualClock};
    use crate::config::{EngineConfig, IncomeConfig};
    use crate::errors::EngineError;
    use crate::ledger::ItemId;

    use super::*;

    const HOUR: i64 = 3600;

    fn engine_with_clock(start: i64) -> (EconomyEngine, Arc<ManualClock>) {
        let catalog = StaticCatalog::with_items(
            IncomeConfig::default(),
            vec![
                ItemDefinition {
                    id: ItemId(1),
                    name: "Sprout".into(),
                    rarity: Rarity::Common,
                },
                ItemDefinition {
                    id: ItemId(2),
                    name: "Dragon".into(),
                    rarity: Rarity::Legendary,
                },
            ],
        );
        let clock = Arc::new(ManualClock::new(start));
        let engine = EconomyEngine::with_rng_seed(
            EngineConfig::default(),
            catalog,
            clock.clone(),
            7,
        );
        (engine, clock)
    }

    fn give(engine: &EconomyEngine, player: &PlayerId, item: ItemId, qty: u64) {
        engine
            .with_txn(|txn| {
                engine.ensure_player(txn, player, engine.now());
                txn.add_holding(player, item, qty);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn ten_commons_two_hours_earn_twenty() {
        let (engine, clock) = engine_with_clock(100_000);
        let alice = PlayerId::from("alice");
        give(&engine, &alice, ItemId(1), 10);

        clock.advance(2 * HOUR);
        let outcome = engine.settle(&alice).unwrap();
        assert_eq!(outcome.earned, 20);
        assert_eq!(outcome.balance, 20);
        assert_eq!(outcome.checkpoint, clock.now());
    }

    #[test]
    fn second_immediate_settle_earns_zero() {
        let (engine, clock) = engine_with_clock(100_000);
        let alice = PlayerId::from("alice");
        give(&engine, &alice, ItemId(2), 1);

        clock.advance(HOUR);
        let first = engine.settle(&alice).unwrap();
        assert_eq!(first.earned, 25);

        let second = engine.settle(&alice).unwrap();
        assert_eq!(second.earned, 0);
        assert_eq!(second.balance, 25);
        // Checkpoint never regresses.
        assert_eq!(second.checkpoint, first.checkpoint);
    }

    #[test]
    fn zero_floor_keeps_checkpoint_for_fractional_accrual() {
        let (engine, clock) = engine_with_clock(100_000);
        let alice = PlayerId::from("alice");
        give(&engine, &alice, ItemId(1), 1); // 1 coin/hour

        // 30 minutes at 1/hour floors to 0; the checkpoint must hold.
        clock.advance(HOUR / 2);
        let outcome = engine.settle(&alice).unwrap();
        assert_eq!(outcome.earned, 0);
        assert_eq!(outcome.checkpoint, 100_000);

        // Another 30 minutes completes the hour: exactly 1 coin, not 0+0.
        clock.advance(HOUR / 2);
        let outcome = engine.settle(&alice).unwrap();
        assert_eq!(outcome.earned, 1);
    }

    #[test]
    fn clock_regression_is_a_noop() {
        let (engine, clock) = engine_with_clock(100_000);
        let alice = PlayerId::from("alice");
        give(&engine, &alice, ItemId(1), 10);

        clock.set(90_000);
        let outcome = engine.settle(&alice).unwrap();
        assert_eq!(outcome.earned, 0);
        assert_eq!(outcome.checkpoint, 100_000);
    }

    #[test]
    fn settle_requires_existing_player() {
        let (engine, _clock) = engine_with_clock(100_000);
        let ghost = PlayerId::from("ghost");
        assert_eq!(
            engine.settle(&ghost),
            Err(EngineError::PlayerNotFound(ghost.clone()))
        );
    }

    #[test]
    fn no_holdings_earn_nothing() {
        let (engine, clock) = engine_with_clock(100_000);
        let alice = PlayerId::from("alice");
        engine.profile(&alice).unwrap(); // creates the player
        clock.advance(10 * HOUR);
        assert_eq!(engine.settle(&alice).unwrap().earned, 0);
    }
}
