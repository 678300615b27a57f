//! Game lifecycle: scheduling, the scheduled -> live -> finished state
//! machine, and the number-draw sequence.
//!
//! Transitions are guarded compare-and-set operations executed under the
//! per-game lock, so two racing `start_game` calls resolve to exactly one
//! winner and one wrong-state conflict.

use crate::config::GameConfig;
use crate::errors::{HousieError, HousieResult};
use crate::events::GameEvent;
use crate::models::{Game, GameStatus, GameSummary, NewGame, Ticket, MAX_NUMBER};
use crate::store::GameStore;
use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

/// Result of a draw request on a live game.
#[derive(Debug, Clone)]
pub enum DrawResult {
    /// A fresh number was drawn and appended.
    Called { game: Game, number: u8 },
    /// All 90 numbers are already out; nothing was mutated.
    Exhausted { game: Game },
}

impl DrawResult {
    pub fn events(&self) -> Vec<GameEvent> {
        match self {
            DrawResult::Called { game, number } => {
                let mut events = vec![GameEvent::NumberCalled {
                    game_id: game.id,
                    number: *number,
                    total_called: game.numbers_called.len(),
                }];
                if game.numbers_called.len() == MAX_NUMBER as usize {
                    events.push(GameEvent::AllNumbersCalled { game_id: game.id });
                }
                events
            }
            DrawResult::Exhausted { game } => {
                vec![GameEvent::AllNumbersCalled { game_id: game.id }]
            }
        }
    }
}

/// Result of a lifecycle transition: the updated game plus the event the
/// transition produced, if it was a fresh state change.
#[derive(Debug, Clone)]
pub struct GameTransition {
    pub game: Game,
    event: Option<GameEvent>,
}

impl GameTransition {
    fn fresh(game: Game, event: GameEvent) -> Self {
        Self {
            game,
            event: Some(event),
        }
    }

    fn unchanged(game: Game) -> Self {
        Self { game, event: None }
    }

    pub fn events(&self) -> Vec<GameEvent> {
        self.event.iter().cloned().collect()
    }
}

/// Lifecycle service over the shared store.
pub struct GameLifecycle {
    store: Arc<GameStore>,
    config: GameConfig,
}

impl GameLifecycle {
    pub fn new(store: Arc<GameStore>, config: GameConfig) -> Self {
        Self { store, config }
    }

    /// Schedules a new game with a zero pool and an empty draw sequence.
    pub async fn create_game(&self, new_game: NewGame) -> HousieResult<GameTransition> {
        if new_game.ticket_price < Decimal::ZERO {
            return Err(HousieError::Validation(format!(
                "ticket_price {} must be non-negative",
                new_game.ticket_price
            )));
        }
        let rake = new_game
            .rake_percentage
            .unwrap_or(self.config.default_rake_percentage);
        if rake < Decimal::ZERO || rake > dec!(100) {
            return Err(HousieError::Validation(format!(
                "rake_percentage {} outside [0, 100]",
                rake
            )));
        }

        let now = Utc::now();
        let game = Game {
            id: self.store.next_game_id()?,
            scheduled_at: new_game.scheduled_at,
            status: GameStatus::Scheduled,
            ticket_price: new_game.ticket_price,
            token_currency: new_game
                .token_currency
                .unwrap_or_else(|| self.config.default_currency.clone()),
            rake_percentage: rake,
            prize_pool: Decimal::ZERO,
            numbers_called: vec![],
            created_at: now,
            updated_at: now,
        };

        let mut work = self.store.begin();
        work.put_game(&game)?;
        self.store.commit(work)?;

        tracing::info!(game_id = game.id, price = %game.ticket_price, "Game scheduled");
        let event = GameEvent::GameScheduled { game_id: game.id };
        Ok(GameTransition::fresh(game, event))
    }

    /// Moves a scheduled game live. Starting a game in any other state is a
    /// hard conflict.
    pub async fn start_game(&self, game_id: u64) -> HousieResult<GameTransition> {
        let lock = self.store.game_lock(game_id);
        let _guard = lock.lock().await;

        let mut game = self.store.require_game(game_id)?;
        match game.status {
            GameStatus::Scheduled => {
                game.status = GameStatus::Live;
                game.updated_at = Utc::now();
                let mut work = self.store.begin();
                work.put_game(&game)?;
                self.store.commit(work)?;
                tracing::info!(game_id, "Game started");
                Ok(GameTransition::fresh(
                    game,
                    GameEvent::GameStarted { game_id },
                ))
            }
            actual => Err(HousieError::WrongState {
                game_id,
                expected: GameStatus::Scheduled,
                actual,
            }),
        }
    }

    /// Moves a live game to finished. Finishing an already-finished game is a
    /// deliberate no-op success returning the existing record and no event.
    pub async fn finish_game(&self, game_id: u64) -> HousieResult<GameTransition> {
        let lock = self.store.game_lock(game_id);
        let _guard = lock.lock().await;

        let mut game = self.store.require_game(game_id)?;
        match game.status {
            GameStatus::Live => {
                game.status = GameStatus::Finished;
                game.updated_at = Utc::now();
                let mut work = self.store.begin();
                work.put_game(&game)?;
                self.store.commit(work)?;
                tracing::info!(game_id, "Game finished");
                Ok(GameTransition::fresh(
                    game,
                    GameEvent::GameFinished { game_id },
                ))
            }
            GameStatus::Finished => {
                tracing::debug!(game_id, "Finish requested on already-finished game");
                Ok(GameTransition::unchanged(game))
            }
            actual => Err(HousieError::WrongState {
                game_id,
                expected: GameStatus::Live,
                actual,
            }),
        }
    }

    /// Draws the next number for a live game: uniform over 1..=90, probed
    /// randomly within the configured bound and then chosen uniformly from
    /// the remaining complement. A full 90-number set yields
    /// [`DrawResult::Exhausted`] without mutating anything.
    pub async fn draw_next(&self, game_id: u64) -> HousieResult<DrawResult> {
        let lock = self.store.game_lock(game_id);
        let _guard = lock.lock().await;

        let mut game = self.store.require_game(game_id)?;
        if game.status != GameStatus::Live {
            return Err(HousieError::WrongState {
                game_id,
                expected: GameStatus::Live,
                actual: game.status,
            });
        }

        if game.numbers_called.len() >= MAX_NUMBER as usize {
            tracing::debug!(game_id, "All numbers already called");
            return Ok(DrawResult::Exhausted { game });
        }

        let number = self.draw_uncalled(&game)?;
        game.numbers_called.push(number);
        game.updated_at = Utc::now();

        let mut work = self.store.begin();
        work.put_game(&game)?;
        self.store.commit(work)?;

        tracing::info!(
            game_id,
            number,
            total_called = game.numbers_called.len(),
            "Number called"
        );
        Ok(DrawResult::Called { game, number })
    }

    fn draw_uncalled(&self, game: &Game) -> HousieResult<u8> {
        let mut rng = rand::thread_rng();
        for _ in 0..self.config.draw_max_attempts {
            let candidate = rng.gen_range(1..=MAX_NUMBER);
            if !game.numbers_called.contains(&candidate) {
                return Ok(candidate);
            }
        }
        // Dense call sets make random probing miss; with 89 of 90 called the
        // probe phase fails about one game in nine at the default bound. Fall
        // back to a uniform choice over the complement, which cannot fail
        // while any number remains.
        let uncalled: Vec<u8> = (1..=MAX_NUMBER)
            .filter(|n| !game.numbers_called.contains(n))
            .collect();
        uncalled.choose(&mut rng).copied().ok_or_else(|| {
            HousieError::Invariant(format!(
                "Game {} has every number called but was not reported exhausted",
                game.id
            ))
        })
    }

    // --- queries ------------------------------------------------------------

    /// One game with its ticket count.
    pub fn game_summary(&self, game_id: u64) -> HousieResult<GameSummary> {
        let game = self.store.require_game(game_id)?;
        let tickets_sold = self.store.tickets_sold(game_id);
        Ok(GameSummary { game, tickets_sold })
    }

    /// Scheduled games, soonest first.
    pub fn upcoming_games(&self) -> HousieResult<Vec<Game>> {
        let mut games: Vec<Game> = self
            .store
            .all_games()?
            .into_iter()
            .filter(|g| g.status == GameStatus::Scheduled)
            .collect();
        games.sort_by_key(|g| g.scheduled_at);
        Ok(games)
    }

    /// Live games, most recently created first.
    pub fn live_games(&self) -> HousieResult<Vec<Game>> {
        let mut games: Vec<Game> = self
            .store
            .all_games()?
            .into_iter()
            .filter(|g| g.status == GameStatus::Live)
            .collect();
        games.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(games)
    }

    /// A user's tickets for one game, newest purchase first.
    pub fn user_tickets(&self, game_id: u64, user_id: u64) -> HousieResult<Vec<Ticket>> {
        let mut tickets: Vec<Ticket> = self
            .store
            .tickets_for_game(game_id)?
            .into_iter()
            .filter(|t| t.user_id == user_id)
            .collect();
        tickets.sort_by(|a, b| b.purchased_at.cmp(&a.purchased_at));
        Ok(tickets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn lifecycle() -> (tempfile::TempDir, GameLifecycle) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(GameStore::open(dir.path()).unwrap());
        (dir, GameLifecycle::new(store, GameConfig::default()))
    }

    fn new_game() -> NewGame {
        NewGame {
            scheduled_at: Utc::now(),
            ticket_price: dec!(100),
            token_currency: None,
            rake_percentage: None,
        }
    }

    #[tokio::test]
    async fn create_applies_defaults_and_zero_pool() {
        let (_dir, lifecycle) = lifecycle();
        let game = lifecycle.create_game(new_game()).await.unwrap().game;
        assert_eq!(game.status, GameStatus::Scheduled);
        assert_eq!(game.prize_pool, Decimal::ZERO);
        assert_eq!(game.token_currency, "DEGEN");
        assert_eq!(game.rake_percentage, dec!(10.00));
        assert!(game.numbers_called.is_empty());
    }

    #[tokio::test]
    async fn create_rejects_bad_rake_and_price() {
        let (_dir, lifecycle) = lifecycle();
        let mut bad_price = new_game();
        bad_price.ticket_price = dec!(-1);
        assert!(matches!(
            lifecycle.create_game(bad_price).await,
            Err(HousieError::Validation(_))
        ));

        let mut bad_rake = new_game();
        bad_rake.rake_percentage = Some(dec!(120));
        assert!(matches!(
            lifecycle.create_game(bad_rake).await,
            Err(HousieError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn start_transitions_once_then_conflicts() {
        let (_dir, lifecycle) = lifecycle();
        let game = lifecycle.create_game(new_game()).await.unwrap().game;

        let started = lifecycle.start_game(game.id).await.unwrap().game;
        assert_eq!(started.status, GameStatus::Live);

        match lifecycle.start_game(game.id).await {
            Err(HousieError::WrongState { actual, .. }) => {
                assert_eq!(actual, GameStatus::Live)
            }
            other => panic!("expected wrong-state conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn start_distinguishes_missing_game() {
        let (_dir, lifecycle) = lifecycle();
        assert!(matches!(
            lifecycle.start_game(999).await,
            Err(HousieError::GameNotFound(999))
        ));
    }

    #[tokio::test]
    async fn finish_is_idempotent_but_guards_scheduled() {
        let (_dir, lifecycle) = lifecycle();
        let game = lifecycle.create_game(new_game()).await.unwrap().game;

        assert!(matches!(
            lifecycle.finish_game(game.id).await,
            Err(HousieError::WrongState { .. })
        ));

        lifecycle.start_game(game.id).await.unwrap();
        let finished = lifecycle.finish_game(game.id).await.unwrap();
        assert_eq!(finished.game.status, GameStatus::Finished);

        let again = lifecycle.finish_game(game.id).await.unwrap();
        assert_eq!(again.game.status, GameStatus::Finished);
        assert!(again.events().is_empty());
    }

    #[tokio::test]
    async fn fresh_transitions_surface_their_events() {
        let (_dir, lifecycle) = lifecycle();
        let created = lifecycle.create_game(new_game()).await.unwrap();
        let game_id = created.game.id;
        assert_eq!(
            created.events(),
            vec![GameEvent::GameScheduled { game_id }]
        );

        let started = lifecycle.start_game(game_id).await.unwrap();
        assert_eq!(started.events(), vec![GameEvent::GameStarted { game_id }]);

        let finished = lifecycle.finish_game(game_id).await.unwrap();
        assert_eq!(finished.events(), vec![GameEvent::GameFinished { game_id }]);
    }

    #[tokio::test]
    async fn draw_requires_live_game() {
        let (_dir, lifecycle) = lifecycle();
        let game = lifecycle.create_game(new_game()).await.unwrap().game;
        assert!(matches!(
            lifecycle.draw_next(game.id).await,
            Err(HousieError::WrongState { .. })
        ));
    }

    #[tokio::test]
    async fn ninety_draws_then_exhausted() {
        let (_dir, lifecycle) = lifecycle();
        let game = lifecycle.create_game(new_game()).await.unwrap().game;
        lifecycle.start_game(game.id).await.unwrap();

        let mut seen = HashSet::new();
        for _ in 0..90 {
            match lifecycle.draw_next(game.id).await.unwrap() {
                DrawResult::Called { number, .. } => {
                    assert!((1..=MAX_NUMBER).contains(&number));
                    assert!(seen.insert(number), "number {} drawn twice", number);
                }
                DrawResult::Exhausted { .. } => panic!("exhausted before 90 draws"),
            }
        }
        assert_eq!(seen.len(), 90);

        match lifecycle.draw_next(game.id).await.unwrap() {
            DrawResult::Exhausted { game } => {
                assert_eq!(game.numbers_called.len(), 90);
            }
            DrawResult::Called { .. } => panic!("91st draw produced a number"),
        }
    }

    #[test]
    fn draw_falls_back_to_the_complement_on_dense_call_sets() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(GameStore::open(dir.path()).unwrap());
        // A single probe attempt forces the fallback path on nearly every call.
        let config = GameConfig {
            draw_max_attempts: 1,
            ..GameConfig::default()
        };
        let lifecycle = GameLifecycle::new(store, config);

        let now = Utc::now();
        let mut game = Game {
            id: 1,
            scheduled_at: now,
            status: GameStatus::Live,
            ticket_price: dec!(100),
            token_currency: "DEGEN".to_string(),
            rake_percentage: dec!(10),
            prize_pool: Decimal::ZERO,
            numbers_called: (1..=MAX_NUMBER).filter(|&n| n != 42).collect(),
            created_at: now,
            updated_at: now,
        };

        // 89 of 90 called: the draw must find the lone remaining number,
        // every time.
        for _ in 0..1_000 {
            assert_eq!(lifecycle.draw_uncalled(&game).unwrap(), 42);
        }

        // An empty complement is unreachable through draw_next's exhaustion
        // guard and stays an invariant violation.
        game.numbers_called = (1..=MAX_NUMBER).collect();
        assert!(matches!(
            lifecycle.draw_uncalled(&game),
            Err(HousieError::Invariant(_))
        ));
    }

    #[tokio::test]
    async fn draw_events_flag_the_final_number() {
        let (_dir, lifecycle) = lifecycle();
        let game = lifecycle.create_game(new_game()).await.unwrap().game;
        lifecycle.start_game(game.id).await.unwrap();

        for i in 1..=90u32 {
            let result = lifecycle.draw_next(game.id).await.unwrap();
            let events = result.events();
            if i < 90 {
                assert_eq!(events.len(), 1);
            } else {
                assert!(events
                    .iter()
                    .any(|e| matches!(e, GameEvent::AllNumbersCalled { .. })));
            }
        }
    }

    #[tokio::test]
    async fn query_lists_filter_by_status() {
        let (_dir, lifecycle) = lifecycle();
        let a = lifecycle.create_game(new_game()).await.unwrap().game;
        let b = lifecycle.create_game(new_game()).await.unwrap().game;
        lifecycle.start_game(b.id).await.unwrap();

        let upcoming = lifecycle.upcoming_games().unwrap();
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].id, a.id);

        let live = lifecycle.live_games().unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, b.id);

        let summary = lifecycle.game_summary(a.id).unwrap();
        assert_eq!(summary.tickets_sold, 0);
    }
}
