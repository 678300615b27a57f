//! Housie - Settlement engine for a real-time 90-ball housie game.
//!
//! Players buy generated tickets against a shared prize pool, numbers are
//! drawn sequentially, and players claim prizes for matching patterns. The
//! engine guarantees financial correctness under concurrent access: no double
//! payout, no lost rake, no negative balances. Transport, push notifications
//! and actual fund transfer live outside this crate; the engine returns
//! observable events for the caller to broadcast.

pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod lifecycle;
pub mod models;
pub mod patterns;
pub mod store;
pub mod ticket;

pub use config::EngineConfig;
pub use engine::HousieEngine;
pub use errors::{HousieError, HousieResult};
pub use events::GameEvent;
pub use ledger::{ClaimOutcome, ClaimRejection, PrizeLedger, PurchaseReceipt};
pub use lifecycle::{DrawResult, GameLifecycle, GameTransition};
pub use models::{Game, GameStatus, GameSummary, NewGame, Ticket, TicketLayout, Winning};
pub use patterns::PatternKey;
pub use store::GameStore;
pub use ticket::TicketGenerator;

/// Installs a tracing subscriber driven by `RUST_LOG`, for binaries and
/// integration harnesses embedding the engine.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
