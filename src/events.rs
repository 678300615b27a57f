//! Notification events surfaced to the caller after successful state changes.
//!
//! The engine never pushes these anywhere; each mutating operation returns the
//! events its state change produced, and the surrounding request layer decides
//! how to broadcast them. The vocabulary mirrors the real-time feed a housie
//! client expects.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::patterns::PatternKey;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    GameScheduled {
        game_id: u64,
    },
    GameStarted {
        game_id: u64,
    },
    NumberCalled {
        game_id: u64,
        number: u8,
        total_called: usize,
    },
    /// Emitted alongside the final `NumberCalled` once all 90 are out.
    AllNumbersCalled {
        game_id: u64,
    },
    GameFinished {
        game_id: u64,
    },
    PrizePoolUpdated {
        game_id: u64,
        prize_pool: Decimal,
        tickets_sold: u64,
    },
    WinnerAnnounced {
        game_id: u64,
        user_id: u64,
        ticket_id: u64,
        pattern: PatternKey,
        amount_won: Decimal,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn events_serialize_with_snake_case_tags() {
        let event = GameEvent::PrizePoolUpdated {
            game_id: 3,
            prize_pool: dec!(90),
            tickets_sold: 1,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"prize_pool_updated\""));
    }
}
