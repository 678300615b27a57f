//! Error types for the housie settlement engine.
//!
//! Business-rule rejections (pattern not met, winner cap reached, wrong game
//! status on a claim) are *not* errors; they are modelled as outcome variants
//! in `ledger` and `lifecycle`. Everything here either aborts the operation
//! before a unit of work opens (validation) or rolls it back (storage /
//! invariant violations).

use crate::models::GameStatus;

/// Storage-layer failures, wrapped so callers never see raw RocksDB errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database open failed: {0}")]
    OpenFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Corrupted data: {0}")]
    CorruptedData(String),
}

/// Root error type for all engine operations.
#[derive(Debug, thiserror::Error)]
pub enum HousieError {
    /// Malformed input, rejected before any unit of work opens.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Game {0} not found")]
    GameNotFound(u64),

    #[error("Ticket {ticket_id} not found for user {user_id} in game {game_id}")]
    TicketNotFound {
        ticket_id: u64,
        user_id: u64,
        game_id: u64,
    },

    /// A state-machine guard failed. Distinguished from `GameNotFound` so
    /// callers can map the two to different transport responses.
    #[error("Game {game_id} is {actual}, expected {expected}")]
    WrongState {
        game_id: u64,
        expected: GameStatus,
        actual: GameStatus,
    },

    /// Corrupted persisted state, impossible numeric ranges, or exhausted
    /// retry bounds that should be unreachable by construction. Always rolled
    /// back and logged; surfaced to the caller as a generic internal failure.
    #[error("Invariant violation: {0}")]
    Invariant(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<rocksdb::Error> for HousieError {
    fn from(e: rocksdb::Error) -> Self {
        HousieError::Storage(StorageError::WriteFailed(e.to_string()))
    }
}

impl From<serde_json::Error> for HousieError {
    fn from(e: serde_json::Error) -> Self {
        HousieError::Storage(StorageError::CorruptedData(e.to_string()))
    }
}

pub type HousieResult<T> = Result<T, HousieError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_state_display_names_both_states() {
        let err = HousieError::WrongState {
            game_id: 7,
            expected: GameStatus::Scheduled,
            actual: GameStatus::Live,
        };
        let msg = err.to_string();
        assert!(msg.contains("live"));
        assert!(msg.contains("scheduled"));
    }

    #[test]
    fn storage_error_wraps_into_root() {
        let err: HousieError = StorageError::CorruptedData("bad json".to_string()).into();
        assert!(err.to_string().contains("bad json"));
    }
}
