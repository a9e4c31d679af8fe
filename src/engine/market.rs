//! Marketplace escrow: listing and purchase settlement.
//!
//! Listing moves the quantity out of the seller's holdings and into the
//! listing row (escrow). Purchase settles coins and the item in one commit,
//! conditional on the listing still being open, so exactly one of two
//! racing buyers wins and the loser observes `ListingNotOpen`.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::{require_player, EconomyEngine};
use crate::errors::{EngineError, EngineResult};
use crate::ledger::{Holding, ItemId, Listing, ListingId, ListingStatus, PlayerId};

/// Settlement details of a successful purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOutcome {
    pub listing: ListingId,
    pub item: ItemId,
    pub qty: u64,
    pub price: u64,
    pub seller: PlayerId,
    pub buyer: PlayerId,
    /// Buyer balance after the debit (accrual settled first).
    pub buyer_balance: u64,
}

impl EconomyEngine {
    /// Lists `qty` of the seller's item at `price` coins for the lot.
    ///
    /// The holding decrement and the listing creation are one atomic step;
    /// while the listing is open the quantity exists only in escrow.
    pub fn list(
        &self,
        seller: &PlayerId,
        item: ItemId,
        qty: u64,
        price: u64,
    ) -> EngineResult<Listing> {
        if price == 0 {
            return Err(EngineError::InvalidPrice(price));
        }
        if qty == 0 {
            return Err(EngineError::InvalidQuantity(qty));
        }
        let now = self.now();

        let listing = self.with_txn(|txn| {
            self.ensure_player(txn, seller, now);

            let held = txn.holding_qty(seller, item);
            if held < qty {
                return Err(EngineError::InsufficientHolding {
                    owner: seller.clone(),
                    item,
                    held,
                    needed: qty,
                });
            }
            txn.put_holding(Holding {
                player: seller.clone(),
                item,
                qty: held - qty,
            });

            let listing = Listing {
                id: ListingId::generate(),
                seller: seller.clone(),
                item,
                qty,
                price,
                status: ListingStatus::Open,
                buyer: None,
                created_at: now,
            };
            txn.put_listing(listing.clone());
            Ok(listing)
        })?;

        info!(listing = %listing.id, seller = %seller, item = %item, qty, price, "listing created");
        Ok(listing)
    }

    /// Buys an open listing. Settles the buyer's accrual first (the funds
    /// check is a balance-sensitive read), then debits the buyer, credits
    /// the seller, transfers the escrowed quantity and closes the listing —
    /// all or nothing.
    ///
    /// Self-purchase is permitted: the debit and credit are staged against
    /// the same record and cancel out.
    pub fn buy(&self, buyer: &PlayerId, listing_id: ListingId) -> EngineResult<PurchaseOutcome> {
        let now = self.now();

        let outcome = self.with_txn(|txn| {
            let mut listing = txn
                .listing(listing_id)
                .ok_or(EngineError::ListingNotFound(listing_id))?;
            if listing.status != ListingStatus::Open {
                return Err(EngineError::ListingNotOpen(listing_id));
            }

            let mut buying = self.ensure_player(txn, buyer, now);
            self.accrue_in_txn(txn, &mut buying, now);
            if buying.balance < listing.price {
                return Err(EngineError::InsufficientFunds {
                    balance: buying.balance,
                    required: listing.price,
                });
            }
            buying.balance -= listing.price;
            txn.put_player(buying);

            // Staged-write aware: for a self-purchase this reads the buyer's
            // already-debited record, so the credit restores it exactly.
            let mut selling = require_player(txn, &listing.seller)?;
            selling.balance += listing.price;
            txn.put_player(selling);

            txn.add_holding(buyer, listing.item, listing.qty);

            listing.status = ListingStatus::Sold;
            listing.buyer = Some(buyer.clone());
            txn.put_listing(listing.clone());

            let buyer_balance = txn
                .player(buyer)
                .map(|p| p.balance)
                .unwrap_or_default();
            Ok(PurchaseOutcome {
                listing: listing_id,
                item: listing.item,
                qty: listing.qty,
                price: listing.price,
                seller: listing.seller.clone(),
                buyer: buyer.clone(),
                buyer_balance,
            })
        })?;

        info!(
            listing = %listing_id,
            buyer = %buyer,
            seller = %outcome.seller,
            price = outcome.price,
            "listing settled"
        );
        Ok(outcome)
    }
}
