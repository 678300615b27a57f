//! Constrained random generation of housie ticket layouts.
//!
//! Column-first generation: pick per-column counts in [1,3] summing to 15,
//! draw that many distinct numbers from each column's range, then spread each
//! column's sorted numbers across rows without ever overfilling a row.
//!
//! Row placement is the one step that can paint itself into a corner if done
//! naively, so rows are chosen capacity-first with a random tie-break: rows
//! with the most free cells are preferred, which keeps row fills within one of
//! each other and makes the exact-cover goal (15 numbers, 5 per row) always
//! reachable. Retry-bound exhaustion anywhere is an invariant violation, not a
//! recoverable condition.

use crate::errors::{HousieError, HousieResult};
use crate::models::{
    TicketLayout, MAX_NUMBER, NUMBERS_PER_ROW, NUMBERS_PER_TICKET, TICKET_COLS, TICKET_ROWS,
};
use rand::seq::SliceRandom;
use rand::Rng;

/// Attempts at randomly distributing the surplus column counts before falling
/// back to deterministic left-to-right increments.
const COLUMN_DISTRIBUTION_ATTEMPTS: usize = 100;
/// Upper bound per column count.
const MAX_PER_COLUMN: usize = 3;

/// Produces valid ticket layouts from an entropy source.
#[derive(Debug, Default, Clone)]
pub struct TicketGenerator;

impl TicketGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Generates one layout satisfying every structural invariant.
    pub fn generate(&self) -> HousieResult<TicketLayout> {
        self.generate_with(&mut rand::thread_rng())
    }

    /// Generation against an explicit RNG, used by tests for volume runs.
    pub fn generate_with<R: Rng>(&self, rng: &mut R) -> HousieResult<TicketLayout> {
        let counts = column_counts(rng);
        let mut layout = TicketLayout::empty();
        let mut row_fill = [0usize; TICKET_ROWS];

        for (col, &count) in counts.iter().enumerate() {
            let numbers = draw_column_numbers(rng, col, count);
            let rows = choose_rows(rng, count, &row_fill)?;
            for (&row, &number) in rows.iter().zip(numbers.iter()) {
                layout.rows[row][col] = Some(number);
                row_fill[row] += 1;
            }
        }

        debug_assert!(layout.is_structurally_valid());
        Ok(layout)
    }
}

/// Assigns each column a count in [1,3] with counts summing to exactly 15.
///
/// Every column starts at one; the remaining six are distributed by random
/// increments below the cap, with a deterministic left-to-right sweep if the
/// random phase stalls. Termination and the sum invariant hold regardless of
/// random outcomes.
fn column_counts<R: Rng>(rng: &mut R) -> [usize; TICKET_COLS] {
    let mut counts = [1usize; TICKET_COLS];
    let mut remaining = NUMBERS_PER_TICKET - TICKET_COLS;

    let mut attempts = 0;
    while remaining > 0 && attempts < COLUMN_DISTRIBUTION_ATTEMPTS {
        let col = rng.gen_range(0..TICKET_COLS);
        if counts[col] < MAX_PER_COLUMN {
            counts[col] += 1;
            remaining -= 1;
        }
        attempts += 1;
    }

    // Forced placement if the random phase stalled against the per-column cap.
    for col in 0..TICKET_COLS {
        while remaining > 0 && counts[col] < MAX_PER_COLUMN {
            counts[col] += 1;
            remaining -= 1;
        }
    }

    counts
}

/// Draws `count` distinct numbers from the column's range, sorted ascending.
fn draw_column_numbers<R: Rng>(rng: &mut R, col: usize, count: usize) -> Vec<u8> {
    let (low, high) = TicketLayout::column_range(col);
    let mut numbers: Vec<u8> = Vec::with_capacity(count);
    while numbers.len() < count {
        let candidate = rng.gen_range(low..=high);
        if !numbers.contains(&candidate) {
            numbers.push(candidate);
        }
    }
    numbers.sort_unstable();
    numbers
}

/// Picks `count` distinct rows for a column: shuffle for randomness, then a
/// stable sort by remaining capacity so fuller rows are only used when the
/// emptier ones are taken. Rows already at capacity are never candidates.
fn choose_rows<R: Rng>(
    rng: &mut R,
    count: usize,
    row_fill: &[usize; TICKET_ROWS],
) -> HousieResult<Vec<usize>> {
    let mut candidates: Vec<usize> = (0..TICKET_ROWS)
        .filter(|&row| row_fill[row] < NUMBERS_PER_ROW)
        .collect();
    candidates.shuffle(rng);
    candidates.sort_by_key(|&row| row_fill[row]);

    if candidates.len() < count {
        // Unreachable while capacity-first selection keeps rows balanced.
        return Err(HousieError::Invariant(format!(
            "Only {} rows with capacity for a column needing {}",
            candidates.len(),
            count
        )));
    }

    let mut rows: Vec<usize> = candidates.into_iter().take(count).collect();
    rows.sort_unstable();
    Ok(rows)
}
