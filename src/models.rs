//! Persisted data model: games, tickets, layouts and winning records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rows on a housie ticket.
pub const TICKET_ROWS: usize = 3;
/// Columns on a housie ticket.
pub const TICKET_COLS: usize = 9;
/// Numbers placed per row.
pub const NUMBERS_PER_ROW: usize = 5;
/// Total numbers on a ticket.
pub const NUMBERS_PER_TICKET: usize = TICKET_ROWS * NUMBERS_PER_ROW;
/// Highest drawable number.
pub const MAX_NUMBER: u8 = 90;

/// Game state machine: scheduled -> live -> finished. Cancelled is terminal
/// from scheduled and has no in-engine trigger.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Scheduled,
    Live,
    Finished,
    Cancelled,
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameStatus::Scheduled => write!(f, "scheduled"),
            GameStatus::Live => write!(f, "live"),
            GameStatus::Finished => write!(f, "finished"),
            GameStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A single game round. The prize pool is monotonically non-decreasing while
/// the game is scheduled or live and always equals the sum of post-rake ticket
/// contributions. `numbers_called` is append-only and only mutated while live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: u64,
    pub scheduled_at: DateTime<Utc>,
    pub status: GameStatus,
    pub ticket_price: Decimal,
    pub token_currency: String,
    pub rake_percentage: Decimal,
    pub prize_pool: Decimal,
    pub numbers_called: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Game {
    pub fn numbers_remaining(&self) -> usize {
        MAX_NUMBER as usize - self.numbers_called.len()
    }
}

/// Parameters for scheduling a new game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGame {
    pub scheduled_at: DateTime<Utc>,
    pub ticket_price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rake_percentage: Option<Decimal>,
}

/// Game plus the ticket count, for list/detail views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSummary {
    #[serde(flatten)]
    pub game: Game,
    pub tickets_sold: u64,
}

/// A 3x9 housie grid. Each cell is either empty or holds a number; structural
/// invariants (15 numbers, 5 per row, 1..=3 per column, column ranges, sorted
/// within columns) are produced by the generator and re-checked permissively
/// by the pattern matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketLayout {
    pub rows: [[Option<u8>; TICKET_COLS]; TICKET_ROWS],
}

impl TicketLayout {
    pub fn empty() -> Self {
        Self {
            rows: [[None; TICKET_COLS]; TICKET_ROWS],
        }
    }

    /// All numbers on the ticket, in row-major order.
    pub fn numbers(&self) -> Vec<u8> {
        self.rows
            .iter()
            .flat_map(|row| row.iter().flatten().copied())
            .collect()
    }

    /// Numbers in one row, left to right.
    pub fn row_numbers(&self, row: usize) -> Vec<u8> {
        self.rows
            .get(row)
            .map(|r| r.iter().flatten().copied().collect())
            .unwrap_or_default()
    }

    /// Inclusive number range allowed in a column: 1-9, 10-19, ..., 80-90.
    pub fn column_range(col: usize) -> (u8, u8) {
        let low = (col * 10 + usize::from(col == 0)) as u8;
        let high = (col * 10 + if col == TICKET_COLS - 1 { 10 } else { 9 }) as u8;
        (low, high)
    }

    /// Checks every structural invariant. Used by the pattern matcher's
    /// permissive fallback and by tests.
    pub fn is_structurally_valid(&self) -> bool {
        let mut seen = [false; MAX_NUMBER as usize + 1];
        let mut total = 0usize;

        for row in &self.rows {
            let filled = row.iter().flatten().count();
            if filled != NUMBERS_PER_ROW {
                return false;
            }
            total += filled;
        }
        if total != NUMBERS_PER_TICKET {
            return false;
        }

        for col in 0..TICKET_COLS {
            let (low, high) = Self::column_range(col);
            let mut prev: Option<u8> = None;
            let mut count = 0usize;
            for row in 0..TICKET_ROWS {
                let Some(n) = self.rows[row][col] else {
                    continue;
                };
                if n < low || n > high {
                    return false;
                }
                if seen[n as usize] {
                    return false;
                }
                seen[n as usize] = true;
                if let Some(p) = prev {
                    if n <= p {
                        return false;
                    }
                }
                prev = Some(n);
                count += 1;
            }
            if count == 0 || count > TICKET_ROWS {
                return false;
            }
        }

        true
    }
}

/// A purchased ticket. Immutable after purchase except for the winner flag and
/// the append-only set of awarded pattern keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: u64,
    pub user_id: u64,
    pub game_id: u64,
    pub layout: TicketLayout,
    pub is_winner: bool,
    /// Ordered, duplicate-free list of awarded pattern keys.
    pub winning_patterns: Vec<crate::patterns::PatternKey>,
    pub purchased_at: DateTime<Utc>,
}

/// Payout execution state, owned by the external value-transfer collaborator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    Pending,
    Paid,
    Failed,
}

/// A settled win claim: a payout obligation, never a fund transfer.
/// Created once at claim time; only `payout_status` and `payout_reference`
/// change afterwards, by the external payout collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Winning {
    pub id: u64,
    pub user_id: u64,
    pub game_id: u64,
    pub ticket_id: u64,
    pub amount_won: Decimal,
    pub token_currency: String,
    pub pattern: crate::patterns::PatternKey,
    pub payout_status: PayoutStatus,
    pub claimed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payout_reference: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_layout() -> TicketLayout {
        // One valid hand-built layout: column counts 2,2,2,1,2,1,2,1,2 = 15.
        let mut layout = TicketLayout::empty();
        let rows: [&[(usize, u8)]; 3] = [
            &[(0, 1), (1, 12), (2, 23), (4, 45), (6, 61)],
            &[(0, 5), (2, 27), (4, 49), (6, 68), (8, 80)],
            &[(1, 18), (3, 34), (5, 56), (7, 73), (8, 90)],
        ];
        for (r, cells) in rows.iter().enumerate() {
            for &(c, n) in cells.iter() {
                layout.rows[r][c] = Some(n);
            }
        }
        layout
    }

    #[test]
    fn column_ranges_cover_1_to_90() {
        assert_eq!(TicketLayout::column_range(0), (1, 9));
        assert_eq!(TicketLayout::column_range(4), (40, 49));
        assert_eq!(TicketLayout::column_range(8), (80, 90));
    }

    #[test]
    fn sample_layout_is_valid() {
        assert!(sample_layout().is_structurally_valid());
    }

    #[test]
    fn validation_rejects_row_imbalance() {
        let mut layout = sample_layout();
        layout.rows[0][8] = Some(85); // six in the top row
        assert!(!layout.is_structurally_valid());
    }

    #[test]
    fn validation_rejects_out_of_range_column_number() {
        let mut layout = sample_layout();
        layout.rows[0][0] = Some(42); // column 0 only covers 1-9
        assert!(!layout.is_structurally_valid());
    }

    #[test]
    fn validation_rejects_unsorted_column() {
        let mut layout = sample_layout();
        // Swap the two numbers in column 0 so they descend top to bottom.
        layout.rows[0][0] = Some(5);
        layout.rows[1][0] = Some(1);
        assert!(!layout.is_structurally_valid());
    }

    #[test]
    fn layout_round_trips_through_json() {
        let layout = sample_layout();
        let json = serde_json::to_string(&layout).unwrap();
        let back: TicketLayout = serde_json::from_str(&json).unwrap();
        assert_eq!(layout, back);
    }
}
