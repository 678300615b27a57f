//! Prize ledger: rake-adjusted pool accounting on ticket purchase, and
//! exactly-once settlement of win claims.
//!
//! Both paths hold the game's exclusive lock for their whole read-modify-write
//! sequence. Without it, two concurrent purchases reading the same pool value
//! would lose a contribution, and two concurrent claims could both take the
//! last slot of a capped pattern. Purchases and claims on the same game
//! serialize against each other; different games never contend.

use crate::errors::{HousieError, HousieResult};
use crate::events::GameEvent;
use crate::models::{Game, GameStatus, PayoutStatus, Ticket, Winning};
use crate::patterns::{self, pattern_config, PatternKey};
use crate::store::GameStore;
use crate::ticket::TicketGenerator;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::fmt;
use std::sync::Arc;

/// Successful purchase: the new ticket plus the game state it produced.
#[derive(Debug, Clone)]
pub struct PurchaseReceipt {
    pub ticket: Ticket,
    pub game: Game,
    pub tickets_sold: u64,
}

impl PurchaseReceipt {
    pub fn events(&self) -> Vec<GameEvent> {
        vec![GameEvent::PrizePoolUpdated {
            game_id: self.game.id,
            prize_pool: self.game.prize_pool,
            tickets_sold: self.tickets_sold,
        }]
    }
}

/// Business-rule reasons a claim is turned down. Rolled back cleanly and
/// never logged as server errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimRejection {
    GameNotLive { status: GameStatus },
    PatternNotMet { pattern: PatternKey },
    WinnerCapReached { pattern: PatternKey, max_winners: u32 },
    AlreadyClaimed { pattern: PatternKey },
}

impl fmt::Display for ClaimRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let display_name = |p: &PatternKey| {
            patterns::WINNING_PATTERNS
                .get(p)
                .map(|c| c.display_name)
                .unwrap_or("Unknown")
        };
        match self {
            ClaimRejection::GameNotLive { status } => {
                write!(f, "Game is {}, claims are only accepted while live", status)
            }
            ClaimRejection::PatternNotMet { pattern } => {
                write!(f, "Pattern '{}' not met on this ticket", display_name(pattern))
            }
            ClaimRejection::WinnerCapReached {
                pattern,
                max_winners,
            } => write!(
                f,
                "Pattern '{}' already claimed by the maximum {} winner(s)",
                display_name(pattern),
                max_winners
            ),
            ClaimRejection::AlreadyClaimed { pattern } => {
                write!(f, "This ticket already claimed '{}'", display_name(pattern))
            }
        }
    }
}

/// Outcome of a claim attempt. Rejections are ordinary outcomes, not errors;
/// system failures surface as `HousieError` instead.
#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    Settled { winning: Winning, ticket: Ticket },
    Rejected { reason: ClaimRejection },
}

impl ClaimOutcome {
    pub fn events(&self) -> Vec<GameEvent> {
        match self {
            ClaimOutcome::Settled { winning, .. } => vec![GameEvent::WinnerAnnounced {
                game_id: winning.game_id,
                user_id: winning.user_id,
                ticket_id: winning.ticket_id,
                pattern: winning.pattern,
                amount_won: winning.amount_won,
            }],
            ClaimOutcome::Rejected { .. } => vec![],
        }
    }
}

/// Ledger service over the shared store.
pub struct PrizeLedger {
    store: Arc<GameStore>,
    generator: TicketGenerator,
}

impl PrizeLedger {
    pub fn new(store: Arc<GameStore>) -> Self {
        Self {
            store,
            generator: TicketGenerator::new(),
        }
    }

    /// Sells one generated ticket for a scheduled game. The ticket insert and
    /// the pool update commit atomically under the game lock, so the pool
    /// always equals the sum of net contributions regardless of interleaving.
    pub async fn buy_ticket(&self, game_id: u64, user_id: u64) -> HousieResult<PurchaseReceipt> {
        // Pure work outside the lock; only the read-modify-write is serialized.
        let layout = self.generator.generate()?;

        let lock = self.store.game_lock(game_id);
        let _guard = lock.lock().await;

        let mut game = self.store.require_game(game_id)?;
        if game.status != GameStatus::Scheduled {
            return Err(HousieError::WrongState {
                game_id,
                expected: GameStatus::Scheduled,
                actual: game.status,
            });
        }

        let net = net_contribution(&game)?;
        let ticket = Ticket {
            id: self.store.next_ticket_id()?,
            user_id,
            game_id,
            layout,
            is_winner: false,
            winning_patterns: vec![],
            purchased_at: Utc::now(),
        };

        game.prize_pool += net;
        game.updated_at = ticket.purchased_at;

        let mut work = self.store.begin();
        work.put_ticket(&ticket)?;
        work.put_game(&game)?;
        self.store.commit(work)?;

        let tickets_sold = self.store.tickets_sold(game_id);
        tracing::info!(
            game_id,
            user_id,
            ticket_id = ticket.id,
            prize_pool = %game.prize_pool,
            "Ticket purchased"
        );

        Ok(PurchaseReceipt {
            ticket,
            game,
            tickets_sold,
        })
    }

    /// Settles a win claim exactly once per (ticket, pattern).
    ///
    /// The whole validation-and-write sequence runs under the game lock, which
    /// is what makes the winner cap and the pool-at-claim-time payout race-free
    /// against concurrent claims on the same game.
    pub async fn process_claim(
        &self,
        game_id: u64,
        user_id: u64,
        ticket_id: u64,
        pattern: PatternKey,
    ) -> HousieResult<ClaimOutcome> {
        let lock = self.store.game_lock(game_id);
        let _guard = lock.lock().await;

        let game = self.store.require_game(game_id)?;
        if game.status != GameStatus::Live {
            tracing::debug!(game_id, status = %game.status, "Claim on non-live game");
            return Ok(ClaimOutcome::Rejected {
                reason: ClaimRejection::GameNotLive {
                    status: game.status,
                },
            });
        }

        let mut ticket = self
            .store
            .load_ticket(ticket_id)?
            .filter(|t| t.game_id == game_id && t.user_id == user_id)
            .ok_or(HousieError::TicketNotFound {
                ticket_id,
                user_id,
                game_id,
            })?;

        if !patterns::matches(&ticket.layout, &game.numbers_called, pattern) {
            tracing::debug!(game_id, ticket_id, pattern = %pattern, "Pattern not met");
            return Ok(ClaimOutcome::Rejected {
                reason: ClaimRejection::PatternNotMet { pattern },
            });
        }

        // The table is static and startup-validated; a miss here is corruption.
        let config = pattern_config(pattern)?;

        if config.max_winners > 0 {
            let claimed = self.store.winning_count(game_id, pattern);
            if claimed >= u64::from(config.max_winners) {
                tracing::debug!(game_id, pattern = %pattern, claimed, "Winner cap reached");
                return Ok(ClaimOutcome::Rejected {
                    reason: ClaimRejection::WinnerCapReached {
                        pattern,
                        max_winners: config.max_winners,
                    },
                });
            }
        }

        if self.store.ticket_pattern_claimed(ticket_id, pattern)? {
            tracing::debug!(game_id, ticket_id, pattern = %pattern, "Duplicate claim");
            return Ok(ClaimOutcome::Rejected {
                reason: ClaimRejection::AlreadyClaimed { pattern },
            });
        }

        let amount = payout_amount(game.prize_pool, config.prize_share, config.max_winners)?;

        let winning = Winning {
            id: self.store.next_winning_id()?,
            user_id,
            game_id,
            ticket_id,
            amount_won: amount,
            token_currency: game.token_currency.clone(),
            pattern,
            payout_status: PayoutStatus::Pending,
            claimed_at: Utc::now(),
            payout_reference: None,
        };

        ticket.is_winner = true;
        if !ticket.winning_patterns.contains(&pattern) {
            ticket.winning_patterns.push(pattern);
        }

        let mut work = self.store.begin();
        work.put_winning(&winning)?;
        work.put_ticket(&ticket)?;
        self.store.commit(work)?;

        tracing::info!(
            game_id,
            user_id,
            ticket_id,
            pattern = %pattern,
            amount = %winning.amount_won,
            "Win claim settled"
        );

        Ok(ClaimOutcome::Settled { winning, ticket })
    }
}

/// Post-rake contribution of one ticket to the pool. An out-of-range rake or
/// a negative net is corrupted persisted state, never silently clamped.
fn net_contribution(game: &Game) -> HousieResult<Decimal> {
    if game.rake_percentage < Decimal::ZERO || game.rake_percentage > dec!(100) {
        return Err(HousieError::Invariant(format!(
            "Game {} has rake percentage {} outside [0, 100]",
            game.id, game.rake_percentage
        )));
    }
    let rake = game.ticket_price * game.rake_percentage / dec!(100);
    let net = game.ticket_price - rake;
    if net < Decimal::ZERO {
        return Err(HousieError::Invariant(format!(
            "Game {} net contribution {} is negative",
            game.id, net
        )));
    }
    Ok(net)
}

/// Per-winner payout from the pool at claim time. A capped pattern splits its
/// share evenly across the cap; an unbounded pattern pays the full share to
/// each claimant.
fn payout_amount(pool: Decimal, share: Decimal, max_winners: u32) -> HousieResult<Decimal> {
    let pattern_prize = pool * share;
    let amount = if max_winners > 0 {
        pattern_prize / Decimal::from(max_winners)
    } else {
        pattern_prize
    };
    if amount < Decimal::ZERO {
        return Err(HousieError::Invariant(format!(
            "Negative payout {} from pool {}",
            amount, pool
        )));
    }
    Ok(amount)
}
