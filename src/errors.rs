//! Typed failure taxonomy for engine operations.
//!
//! Every failure an operation can return is recoverable at the request
//! boundary and carries a message fit for direct display. Concurrency races
//! (`ListingNotOpen` on a losing buyer, `CooldownActive` on a clobbered
//! pack open, `TradeNotOpen` on a second acceptor) are routine negative
//! results, not exceptional conditions.

use crate::ledger::{ItemId, ListingId, PlayerId, TradeId};

pub type EngineResult<T> = Result<T, EngineError>;
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Request-boundary failures returned by engine operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("player not found: {0}")]
    PlayerNotFound(PlayerId),

    #[error("pack cooldown active, {remaining_secs}s remaining")]
    CooldownActive { remaining_secs: u64 },

    #[error("insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: u64, required: u64 },

    /// The owner identifies which side of a trade lacked the item.
    #[error("{owner} holds {held} of item {item}, needs {needed}")]
    InsufficientHolding {
        owner: PlayerId,
        item: ItemId,
        held: u64,
        needed: u64,
    },

    #[error("invalid price {0}, must be a positive integer")]
    InvalidPrice(u64),

    #[error("invalid quantity {0}, must be at least 1")]
    InvalidQuantity(u64),

    #[error("listing not found: {0}")]
    ListingNotFound(ListingId),

    #[error("listing {0} is no longer open")]
    ListingNotOpen(ListingId),

    #[error("trade not found: {0}")]
    TradeNotFound(TradeId),

    #[error("trade {0} is no longer open")]
    TradeNotOpen(TradeId),

    #[error("player {player} is not authorized to act on this {subject}")]
    NotAuthorized {
        player: PlayerId,
        subject: &'static str,
    },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Store-level conditions surfaced by the ledger's optimistic transactions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// A commit observed a record version other than the one it read.
    /// Callers retry the whole transaction from fresh state.
    #[error("ledger commit conflict")]
    Conflict,

    /// Retry budget exhausted while the record set stayed contended.
    #[error("ledger contention: transaction retried {attempts} times without committing")]
    Contention { attempts: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_display_ready() {
        let err = EngineError::CooldownActive {
            remaining_secs: 1200,
        };
        assert_eq!(err.to_string(), "pack cooldown active, 1200s remaining");

        let err = EngineError::InsufficientFunds {
            balance: 40,
            required: 100,
        };
        assert_eq!(
            err.to_string(),
            "insufficient funds: balance 40, required 100"
        );
    }

    #[test]
    fn ledger_errors_convert() {
        let err: EngineError = LedgerError::Conflict.into();
        assert_eq!(err, EngineError::Ledger(LedgerError::Conflict));
    }
}
