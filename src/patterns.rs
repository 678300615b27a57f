//! Winning patterns: the static pattern configuration table and the matcher.
//!
//! The matcher is pure and total: a layout failing structural invariants or an
//! unknown key degrades to `false`, so a malformed record becomes a rejected
//! claim instead of a crashed settlement.

use crate::errors::{HousieError, HousieResult};
use crate::models::TicketLayout;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Named winning conditions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatternKey {
    EarlyFive,
    TopLine,
    MiddleLine,
    BottomLine,
    FullHouse,
}

impl PatternKey {
    pub const ALL: [PatternKey; 5] = [
        PatternKey::EarlyFive,
        PatternKey::TopLine,
        PatternKey::MiddleLine,
        PatternKey::BottomLine,
        PatternKey::FullHouse,
    ];
}

impl fmt::Display for PatternKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PatternKey::EarlyFive => "EARLY_FIVE",
            PatternKey::TopLine => "TOP_LINE",
            PatternKey::MiddleLine => "MIDDLE_LINE",
            PatternKey::BottomLine => "BOTTOM_LINE",
            PatternKey::FullHouse => "FULL_HOUSE",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for PatternKey {
    type Err = HousieError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "EARLY_FIVE" => Ok(PatternKey::EarlyFive),
            "TOP_LINE" => Ok(PatternKey::TopLine),
            "MIDDLE_LINE" => Ok(PatternKey::MiddleLine),
            "BOTTOM_LINE" => Ok(PatternKey::BottomLine),
            "FULL_HOUSE" => Ok(PatternKey::FullHouse),
            other => Err(HousieError::Validation(format!(
                "Unknown pattern key: {}",
                other
            ))),
        }
    }
}

/// Prize configuration for one pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternConfig {
    /// Fraction of the prize pool allocated to this pattern, in (0, 1].
    pub prize_share: Decimal,
    /// Maximum winning records per game for this pattern; 0 means unbounded.
    pub max_winners: u32,
    pub display_name: &'static str,
    /// Minimum matched numbers anywhere on the ticket, where applicable.
    pub numbers_required: Option<usize>,
}

/// Process-wide, read-only pattern table. Shares deliberately sum to less than
/// one; the remainder is design slack. Validated once at engine startup via
/// [`validate_pattern_table`].
pub static WINNING_PATTERNS: Lazy<HashMap<PatternKey, PatternConfig>> = Lazy::new(|| {
    HashMap::from([
        (
            PatternKey::EarlyFive,
            PatternConfig {
                prize_share: dec!(0.05),
                max_winners: 5,
                display_name: "Early Five",
                numbers_required: Some(5),
            },
        ),
        (
            PatternKey::TopLine,
            PatternConfig {
                prize_share: dec!(0.10),
                max_winners: 3,
                display_name: "Top Line",
                numbers_required: None,
            },
        ),
        (
            PatternKey::MiddleLine,
            PatternConfig {
                prize_share: dec!(0.10),
                max_winners: 3,
                display_name: "Middle Line",
                numbers_required: None,
            },
        ),
        (
            PatternKey::BottomLine,
            PatternConfig {
                prize_share: dec!(0.10),
                max_winners: 3,
                display_name: "Bottom Line",
                numbers_required: None,
            },
        ),
        (
            PatternKey::FullHouse,
            PatternConfig {
                prize_share: dec!(0.40),
                max_winners: 1,
                display_name: "Full House",
                numbers_required: None,
            },
        ),
    ])
});

/// Looks up a pattern's configuration. A missing entry is a system error: the
/// table is static and validated at startup, so absence means corruption.
pub fn pattern_config(key: PatternKey) -> HousieResult<&'static PatternConfig> {
    WINNING_PATTERNS
        .get(&key)
        .ok_or_else(|| HousieError::Invariant(format!("Pattern {} missing from table", key)))
}

/// Validates the static table at startup: every key present, shares in (0, 1].
pub fn validate_pattern_table() -> HousieResult<()> {
    for key in PatternKey::ALL {
        let config = WINNING_PATTERNS.get(&key).ok_or_else(|| {
            HousieError::Invariant(format!("Pattern table is missing {}", key))
        })?;
        if config.prize_share <= Decimal::ZERO || config.prize_share > Decimal::ONE {
            return Err(HousieError::Invariant(format!(
                "Pattern {} has prize share {} outside (0, 1]",
                key, config.prize_share
            )));
        }
    }
    Ok(())
}

/// Evaluates whether `layout` satisfies `key` given the numbers drawn so far.
///
/// Pure and order-independent over `drawn`. Returns false for a structurally
/// invalid layout rather than erroring.
pub fn matches(layout: &TicketLayout, drawn: &[u8], key: PatternKey) -> bool {
    if !layout.is_structurally_valid() {
        tracing::warn!(pattern = %key, "Pattern check on structurally invalid layout");
        return false;
    }

    let hit = |n: &u8| drawn.contains(n);

    match key {
        PatternKey::EarlyFive => {
            let required = WINNING_PATTERNS
                .get(&key)
                .and_then(|c| c.numbers_required)
                .unwrap_or(5);
            layout.numbers().iter().filter(|n| hit(n)).count() >= required
        }
        PatternKey::TopLine => row_matched(layout, 0, &hit),
        PatternKey::MiddleLine => row_matched(layout, 1, &hit),
        PatternKey::BottomLine => row_matched(layout, 2, &hit),
        PatternKey::FullHouse => {
            let numbers = layout.numbers();
            !numbers.is_empty() && numbers.iter().all(hit)
        }
    }
}

fn row_matched(layout: &TicketLayout, row: usize, hit: &dyn Fn(&u8) -> bool) -> bool {
    let numbers = layout.row_numbers(row);
    !numbers.is_empty() && numbers.iter().all(hit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::TicketGenerator;

    fn generated_layout() -> TicketLayout {
        TicketGenerator::new().generate().unwrap()
    }

    #[test]
    fn table_validates() {
        validate_pattern_table().unwrap();
    }

    #[test]
    fn pattern_keys_round_trip_through_strings() {
        for key in PatternKey::ALL {
            assert_eq!(key.to_string().parse::<PatternKey>().unwrap(), key);
        }
        assert!("SNAKE_LINE".parse::<PatternKey>().is_err());
    }

    #[test]
    fn early_five_requires_five_hits() {
        let layout = generated_layout();
        let numbers = layout.numbers();
        assert!(!matches(&layout, &numbers[..4], PatternKey::EarlyFive));
        assert!(matches(&layout, &numbers[..5], PatternKey::EarlyFive));
    }

    #[test]
    fn line_patterns_require_their_full_row() {
        let layout = generated_layout();
        for (row, key) in [
            (0, PatternKey::TopLine),
            (1, PatternKey::MiddleLine),
            (2, PatternKey::BottomLine),
        ] {
            let row_numbers = layout.row_numbers(row);
            assert!(matches(&layout, &row_numbers, key));
            assert!(!matches(&layout, &row_numbers[1..], key));
        }
    }

    #[test]
    fn full_house_implies_every_other_pattern() {
        let layout = generated_layout();
        let all = layout.numbers();
        assert!(matches(&layout, &all, PatternKey::FullHouse));
        for key in PatternKey::ALL {
            assert!(matches(&layout, &all, key));
        }
    }

    #[test]
    fn matcher_ignores_drawn_order_and_is_deterministic() {
        let layout = generated_layout();
        let mut drawn = layout.row_numbers(0);
        drawn.extend_from_slice(&[88, 3]);
        let mut reversed = drawn.clone();
        reversed.reverse();
        for key in PatternKey::ALL {
            let a = matches(&layout, &drawn, key);
            let b = matches(&layout, &reversed, key);
            let c = matches(&layout, &drawn, key);
            assert_eq!(a, b);
            assert_eq!(a, c);
        }
    }

    #[test]
    fn malformed_layout_never_matches() {
        let layout = TicketLayout::empty();
        for key in PatternKey::ALL {
            assert!(!matches(&layout, &(1..=90).collect::<Vec<u8>>(), key));
        }
    }
}
