//! Peer-to-peer trade negotiation and settlement.
//!
//! Proposal records intent only; no items move and no holdings are checked
//! until acceptance, because inventories legitimately change in between and
//! the counterparty may not even exist yet. Acceptance re-validates both
//! legs against current holdings and settles all-or-nothing, with the
//! open→accepted transition guarded exactly like listing settlement.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::{require_player, EconomyEngine};
use crate::errors::{EngineError, EngineResult};
use crate::ledger::{
    Holding, ItemId, PlayerId, Trade, TradeId, TradeLeg, TradeStatus, Txn,
};

/// Settlement details of an accepted trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub trade: TradeId,
    pub initiator: PlayerId,
    pub acceptor: PlayerId,
    /// Items moved initiator → acceptor (aggregated per item).
    pub given: Vec<TradeLeg>,
    /// Items moved acceptor → initiator (aggregated per item).
    pub received: Vec<TradeLeg>,
}

/// Duplicate items within a leg list are aggregated before validation, so a
/// leg of [A×1, A×1] requires 2×A rather than passing two 1×A checks.
fn aggregate(legs: &[TradeLeg]) -> BTreeMap<ItemId, u64> {
    let mut totals = BTreeMap::new();
    for leg in legs {
        *totals.entry(leg.item).or_insert(0) += leg.qty;
    }
    totals
}

impl EconomyEngine {
    /// Records a trade offer from `initiator` to the player identified by
    /// `counterparty`. Holdings are deliberately not validated here.
    pub fn propose(
        &self,
        initiator: &PlayerId,
        counterparty: &PlayerId,
        offered: Vec<TradeLeg>,
        requested: Vec<TradeLeg>,
    ) -> EngineResult<Trade> {
        for leg in offered.iter().chain(requested.iter()) {
            if leg.qty == 0 {
                return Err(EngineError::InvalidQuantity(leg.qty));
            }
        }
        let now = self.now();

        let trade = self.with_txn(|txn| {
            self.ensure_player(txn, initiator, now);
            let trade = Trade {
                id: TradeId::generate(),
                initiator: initiator.clone(),
                counterparty: counterparty.clone(),
                offered: offered.clone(),
                requested: requested.clone(),
                status: TradeStatus::Open,
                created_at: now,
                resolved_at: None,
            };
            txn.put_trade(trade.clone());
            Ok(trade)
        })?;

        info!(trade = %trade.id, initiator = %initiator, counterparty = %counterparty, "trade proposed");
        Ok(trade)
    }

    /// Accepts an open trade. Only the designated counterparty may accept;
    /// both sides' holdings are re-validated now, and the exchange settles
    /// atomically or not at all.
    pub fn accept(&self, acceptor: &PlayerId, trade_id: TradeId) -> EngineResult<TradeOutcome> {
        let now = self.now();

        let outcome = self.with_txn(|txn| {
            let mut trade = txn
                .trade(trade_id)
                .ok_or(EngineError::TradeNotFound(trade_id))?;
            if trade.status != TradeStatus::Open {
                return Err(EngineError::TradeNotOpen(trade_id));
            }
            if acceptor != &trade.counterparty {
                return Err(EngineError::NotAuthorized {
                    player: acceptor.clone(),
                    subject: "trade",
                });
            }

            // The counterparty is resolved to a player record only now.
            self.ensure_player(txn, acceptor, now);
            require_player(txn, &trade.initiator)?;

            let given = aggregate(&trade.offered);
            let received = aggregate(&trade.requested);

            // Validate both legs in full before moving anything.
            check_side(txn, &trade.initiator, &given)?;
            check_side(txn, acceptor, &received)?;

            for (&item, &qty) in &given {
                transfer(txn, &trade.initiator, acceptor, item, qty);
            }
            for (&item, &qty) in &received {
                transfer(txn, acceptor, &trade.initiator, item, qty);
            }

            trade.status = TradeStatus::Accepted;
            trade.resolved_at = Some(now);
            txn.put_trade(trade.clone());

            Ok(TradeOutcome {
                trade: trade_id,
                initiator: trade.initiator.clone(),
                acceptor: acceptor.clone(),
                given: given
                    .into_iter()
                    .map(|(item, qty)| TradeLeg::new(item, qty))
                    .collect(),
                received: received
                    .into_iter()
                    .map(|(item, qty)| TradeLeg::new(item, qty))
                    .collect(),
            })
        })?;

        info!(trade = %trade_id, acceptor = %acceptor, "trade settled");
        Ok(outcome)
    }

    /// Retracts an open trade. Initiator-only; exactly-once against a
    /// concurrent acceptance.
    pub fn cancel(&self, player: &PlayerId, trade_id: TradeId) -> EngineResult<Trade> {
        let now = self.now();

        let trade = self.with_txn(|txn| {
            let mut trade = txn
                .trade(trade_id)
                .ok_or(EngineError::TradeNotFound(trade_id))?;
            if trade.status != TradeStatus::Open {
                return Err(EngineError::TradeNotOpen(trade_id));
            }
            if player != &trade.initiator {
                return Err(EngineError::NotAuthorized {
                    player: player.clone(),
                    subject: "trade",
                });
            }
            trade.status = TradeStatus::Cancelled;
            trade.resolved_at = Some(now);
            txn.put_trade(trade.clone());
            Ok(trade)
        })?;

        info!(trade = %trade_id, "trade cancelled");
        Ok(trade)
    }
}

/// Fails `InsufficientHolding` naming `owner` if any aggregated quantity
/// exceeds what they currently hold.
fn check_side(
    txn: &mut Txn<'_>,
    owner: &PlayerId,
    needs: &BTreeMap<ItemId, u64>,
) -> EngineResult<()> {
    for (&item, &needed) in needs {
        let held = txn.holding_qty(owner, item);
        if held < needed {
            return Err(EngineError::InsufficientHolding {
                owner: owner.clone(),
                item,
                held,
                needed,
            });
        }
    }
    Ok(())
}

fn transfer(txn: &mut Txn<'_>, from: &PlayerId, to: &PlayerId, item: ItemId, qty: u64) {
    let held = txn.holding_qty(from, item);
    txn.put_holding(Holding {
        player: from.clone(),
        item,
        // check_side ran against the same staged state; this cannot underflow.
        qty: held - qty,
    });
    txn.add_holding(to, item, qty);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::catalog::{ItemDefinition, Rarity, StaticCatalog};
    use crate::clock::ManualClock;
    use crate::config::{EngineConfig, IncomeConfig};

    use super::*;

    const CARD_A: ItemId = ItemId(1);
    const CARD_B: ItemId = ItemId(2);

    fn engine() -> (EconomyEngine, Arc<ManualClock>) {
        let catalog = StaticCatalog::with_items(
            IncomeConfig::default(),
            vec![
                ItemDefinition {
                    id: CARD_A,
                    name: "Sprout".into(),
                    rarity: Rarity::Common,
                },
                ItemDefinition {
                    id: CARD_B,
                    name: "Dragon".into(),
                    rarity: Rarity::Legendary,
                },
            ],
        );
        let clock = Arc::new(ManualClock::new(100_000));
        let engine =
            EconomyEngine::with_rng_seed(EngineConfig::default(), catalog, clock.clone(), 3);
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

    fn qty_of(engine: &EconomyEngine, player: &PlayerId, item: ItemId) -> u64 {
        engine
            .ledger()
            .holdings_of(player)
            .iter()
            .find(|h| h.item == item)
            .map_or(0, |h| h.qty)
    }

    #[test]
    fn full_trade_round_trip() {
        let (engine, _clock) = engine();
        let alice = PlayerId::from("alice");
        let bob = PlayerId::from("bob");
        give(&engine, &alice, CARD_A, 2);
        give(&engine, &bob, CARD_B, 1);

        let trade = engine
            .propose(
                &alice,
                &bob,
                vec![TradeLeg::new(CARD_A, 2)],
                vec![TradeLeg::new(CARD_B, 1)],
            )
            .unwrap();
        assert_eq!(trade.status, TradeStatus::Open);
        // Proposal moved nothing.
        assert_eq!(qty_of(&engine, &alice, CARD_A), 2);

        let outcome = engine.accept(&bob, trade.id).unwrap();
        assert_eq!(outcome.given, vec![TradeLeg::new(CARD_A, 2)]);
        assert_eq!(outcome.received, vec![TradeLeg::new(CARD_B, 1)]);

        assert_eq!(qty_of(&engine, &alice, CARD_A), 0);
        assert_eq!(qty_of(&engine, &alice, CARD_B), 1);
        assert_eq!(qty_of(&engine, &bob, CARD_A), 2);
        assert_eq!(qty_of(&engine, &bob, CARD_B), 0);

        let settled = engine.ledger().get_trade(trade.id).unwrap();
        assert_eq!(settled.status, TradeStatus::Accepted);
        assert_eq!(settled.resolved_at, Some(100_000));
    }

    #[test]
    fn acceptor_without_requested_items_fails_and_nothing_moves() {
        let (engine, _clock) = engine();
        let alice = PlayerId::from("alice");
        let bob = PlayerId::from("bob");
        give(&engine, &alice, CARD_A, 2);
        // Bob lacks CARD_B entirely.

        let trade = engine
            .propose(
                &alice,
                &bob,
                vec![TradeLeg::new(CARD_A, 2)],
                vec![TradeLeg::new(CARD_B, 1)],
            )
            .unwrap();

        let err = engine.accept(&bob, trade.id).unwrap_err();
        assert_eq!(
            err,
            EngineError::InsufficientHolding {
                owner: bob.clone(),
                item: CARD_B,
                held: 0,
                needed: 1,
            }
        );

        assert_eq!(qty_of(&engine, &alice, CARD_A), 2);
        assert_eq!(qty_of(&engine, &bob, CARD_A), 0);
        assert_eq!(
            engine.ledger().get_trade(trade.id).unwrap().status,
            TradeStatus::Open
        );
    }

    #[test]
    fn initiator_holdings_revalidated_at_acceptance() {
        let (engine, _clock) = engine();
        let alice = PlayerId::from("alice");
        let bob = PlayerId::from("bob");
        give(&engine, &alice, CARD_A, 2);
        give(&engine, &bob, CARD_B, 1);

        let trade = engine
            .propose(
                &alice,
                &bob,
                vec![TradeLeg::new(CARD_A, 2)],
                vec![TradeLeg::new(CARD_B, 1)],
            )
            .unwrap();

        // Alice lists one away in the meantime; her side no longer suffices.
        engine.list(&alice, CARD_A, 1, 10).unwrap();

        let err = engine.accept(&bob, trade.id).unwrap_err();
        assert_eq!(
            err,
            EngineError::InsufficientHolding {
                owner: alice.clone(),
                item: CARD_A,
                held: 1,
                needed: 2,
            }
        );
    }

    #[test]
    fn only_the_counterparty_may_accept() {
        let (engine, _clock) = engine();
        let alice = PlayerId::from("alice");
        let bob = PlayerId::from("bob");
        let mallory = PlayerId::from("mallory");
        give(&engine, &alice, CARD_A, 1);

        let trade = engine
            .propose(&alice, &bob, vec![TradeLeg::new(CARD_A, 1)], vec![])
            .unwrap();

        assert_eq!(
            engine.accept(&mallory, trade.id),
            Err(EngineError::NotAuthorized {
                player: mallory,
                subject: "trade",
            })
        );
        // Even the initiator cannot accept their own offer.
        assert!(matches!(
            engine.accept(&alice, trade.id),
            Err(EngineError::NotAuthorized { .. })
        ));
    }

    #[test]
    fn duplicate_leg_entries_are_aggregated() {
        let (engine, _clock) = engine();
        let alice = PlayerId::from("alice");
        let bob = PlayerId::from("bob");
        give(&engine, &alice, CARD_A, 1);
        give(&engine, &bob, CARD_B, 1);

        // [A×1, A×1] needs 2×A; Alice only has one.
        let trade = engine
            .propose(
                &alice,
                &bob,
                vec![TradeLeg::new(CARD_A, 1), TradeLeg::new(CARD_A, 1)],
                vec![TradeLeg::new(CARD_B, 1)],
            )
            .unwrap();

        let err = engine.accept(&bob, trade.id).unwrap_err();
        assert_eq!(
            err,
            EngineError::InsufficientHolding {
                owner: alice,
                item: CARD_A,
                held: 1,
                needed: 2,
            }
        );
    }

    #[test]
    fn one_sided_gift_trade_is_valid() {
        let (engine, _clock) = engine();
        let alice = PlayerId::from("alice");
        let bob = PlayerId::from("bob");
        give(&engine, &alice, CARD_A, 3);

        let trade = engine
            .propose(&alice, &bob, vec![TradeLeg::new(CARD_A, 3)], vec![])
            .unwrap();
        let outcome = engine.accept(&bob, trade.id).unwrap();
        assert!(outcome.received.is_empty());
        assert_eq!(qty_of(&engine, &bob, CARD_A), 3);
    }

    #[test]
    fn cancel_is_initiator_only_and_exactly_once() {
        let (engine, _clock) = engine();
        let alice = PlayerId::from("alice");
        let bob = PlayerId::from("bob");
        give(&engine, &alice, CARD_A, 1);

        let trade = engine
            .propose(&alice, &bob, vec![TradeLeg::new(CARD_A, 1)], vec![])
            .unwrap();

        assert!(matches!(
            engine.cancel(&bob, trade.id),
            Err(EngineError::NotAuthorized { .. })
        ));

        let cancelled = engine.cancel(&alice, trade.id).unwrap();
        assert_eq!(cancelled.status, TradeStatus::Cancelled);

        assert_eq!(
            engine.cancel(&alice, trade.id),
            Err(EngineError::TradeNotOpen(trade.id))
        );
        assert_eq!(
            engine.accept(&bob, trade.id),
            Err(EngineError::TradeNotOpen(trade.id))
        );
    }

    #[test]
    fn zero_quantity_leg_is_rejected_at_proposal() {
        let (engine, _clock) = engine();
        let alice = PlayerId::from("alice");
        let bob = PlayerId::from("bob");

        assert_eq!(
            engine.propose(&alice, &bob, vec![TradeLeg::new(CARD_A, 0)], vec![]),
            Err(EngineError::InvalidQuantity(0))
        );
    }
}
