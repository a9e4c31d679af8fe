//! Reward-pack dispensing.
//!
//! A pack draws `size` cards independently and uniformly at random from the
//! catalog, with replacement. The cooldown check, the holding increments,
//! the cooldown advance and the provenance record all land in one commit,
//! so two concurrent opens inside the window cannot both succeed.

use rand::Rng;
use tracing::info;

use crate::engine::EconomyEngine;
use crate::errors::{EngineError, EngineResult};
use crate::ledger::{GrantId, GrantedItem, PackGrant, PlayerId};

impl EconomyEngine {
    /// Opens a reward pack for the player, who is created on first
    /// interaction. `size` defaults to the configured pack size.
    ///
    /// Fails `CooldownActive` (with the remaining seconds) until the
    /// cooldown window has elapsed since the player's last grant. An empty
    /// catalog yields an empty grant, not an error.
    pub fn open_pack(&self, id: &PlayerId, size: Option<u32>) -> EngineResult<PackGrant> {
        let size = size.unwrap_or(self.config().pack.default_size);
        let cooldown = self.config().pack.cooldown_secs as i64;
        let now = self.now();

        let grant = self.with_txn(|txn| {
            let mut player = self.ensure_player(txn, id, now);

            // last_pack_at == 0 means the player has never opened a pack.
            if player.last_pack_at > 0 {
                let since = now - player.last_pack_at;
                if since < cooldown {
                    return Err(EngineError::CooldownActive {
                        remaining_secs: (cooldown - since) as u64,
                    });
                }
            }

            let pool = self.catalog().all_items();
            let mut items = Vec::with_capacity(size as usize);
            if !pool.is_empty() {
                let mut rng = self
                    .rng
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                for _ in 0..size {
                    let drawn = &pool[rng.gen_range(0..pool.len())];
                    items.push(GrantedItem {
                        item: drawn.id,
                        name: drawn.name.clone(),
                        rarity: drawn.rarity,
                    });
                }
            }

            for granted in &items {
                txn.add_holding(id, granted.item, 1);
            }

            player.last_pack_at = now;
            txn.put_player(player);

            let grant = PackGrant {
                id: GrantId::generate(),
                player: id.clone(),
                size,
                items,
                created_at: now,
            };
            txn.insert_grant(grant.clone());
            Ok(grant)
        })?;

        info!(player = %id, grant = %grant.id, cards = grant.items.len(), "pack opened");
        Ok(grant)
    }
}
