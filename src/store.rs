//! RocksDB-backed persistence for games, tickets and winning records.
//!
//! Records are JSON values under prefixed string keys, with secondary index
//! keys for the queries the settlement paths need (tickets per game, winnings
//! per (game, pattern) and per (ticket, pattern)). Multi-record mutations are
//! staged into one `WriteBatch` and committed atomically, so an abandoned unit
//! of work leaves nothing behind.
//!
//! The store also owns the per-game exclusive lock that stands in for
//! `SELECT ... FOR UPDATE` row locking: any read-modify-write touching a
//! game's pool, status, drawn numbers or winning counts must hold that game's
//! lock for the full sequence. Locks are per game, so operations on different
//! games proceed fully in parallel.

use crate::errors::{HousieError, HousieResult, StorageError};
use crate::models::{Game, Ticket, Winning};
use crate::patterns::PatternKey;
use dashmap::DashMap;
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use tokio::sync::Mutex;

const GAME_PREFIX: &str = "game:record:";
const TICKET_PREFIX: &str = "ticket:record:";
const WINNING_PREFIX: &str = "winning:record:";
const GAME_TICKETS_PREFIX: &str = "game:tickets:";
const GAME_WINNINGS_PREFIX: &str = "winning:index:game:";
const TICKET_WINNINGS_PREFIX: &str = "winning:index:ticket:";

const SEQ_GAME_KEY: &[u8] = b"seq:game";
const SEQ_TICKET_KEY: &[u8] = b"seq:ticket";
const SEQ_WINNING_KEY: &[u8] = b"seq:winning";

fn game_key(id: u64) -> Vec<u8> {
    format!("{}{:020}", GAME_PREFIX, id).into_bytes()
}

fn ticket_key(id: u64) -> Vec<u8> {
    format!("{}{:020}", TICKET_PREFIX, id).into_bytes()
}

fn winning_key(id: u64) -> Vec<u8> {
    format!("{}{:020}", WINNING_PREFIX, id).into_bytes()
}

fn game_tickets_prefix(game_id: u64) -> Vec<u8> {
    format!("{}{:020}:", GAME_TICKETS_PREFIX, game_id).into_bytes()
}

fn game_ticket_index_key(game_id: u64, ticket_id: u64) -> Vec<u8> {
    format!("{}{:020}:{:020}", GAME_TICKETS_PREFIX, game_id, ticket_id).into_bytes()
}

fn game_winnings_prefix(game_id: u64, pattern: PatternKey) -> Vec<u8> {
    format!("{}{:020}:{}:", GAME_WINNINGS_PREFIX, game_id, pattern).into_bytes()
}

fn game_winning_index_key(game_id: u64, pattern: PatternKey, winning_id: u64) -> Vec<u8> {
    format!(
        "{}{:020}:{}:{:020}",
        GAME_WINNINGS_PREFIX, game_id, pattern, winning_id
    )
    .into_bytes()
}

fn ticket_winning_index_key(ticket_id: u64, pattern: PatternKey) -> Vec<u8> {
    format!("{}{:020}:{}", TICKET_WINNINGS_PREFIX, ticket_id, pattern).into_bytes()
}

/// Embedded store for all settlement state.
pub struct GameStore {
    db: Arc<DB>,
    locks: DashMap<u64, Arc<Mutex<()>>>,
    game_seq: AtomicU64,
    ticket_seq: AtomicU64,
    winning_seq: AtomicU64,
    seq_persist: StdMutex<()>,
}

impl GameStore {
    pub fn open<P: AsRef<Path>>(path: P) -> HousieResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let db = DB::open(&opts, path)
            .map_err(|e| HousieError::Storage(StorageError::OpenFailed(e.to_string())))?;
        let db = Arc::new(db);

        Ok(Self {
            game_seq: AtomicU64::new(load_sequence(&db, SEQ_GAME_KEY)?),
            ticket_seq: AtomicU64::new(load_sequence(&db, SEQ_TICKET_KEY)?),
            winning_seq: AtomicU64::new(load_sequence(&db, SEQ_WINNING_KEY)?),
            db,
            locks: DashMap::new(),
            seq_persist: StdMutex::new(()),
        })
    }

    /// Exclusive per-game ownership token. Hold the guard for the whole
    /// read-modify-write sequence; dropping it (commit or abort alike)
    /// releases the row.
    pub fn game_lock(&self, game_id: u64) -> Arc<Mutex<()>> {
        self.locks
            .entry(game_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // --- id sequences -------------------------------------------------------
    //
    // Like an SQL sequence: the counter advances even if the surrounding unit
    // of work aborts, leaving a gap rather than a duplicate.

    pub fn next_game_id(&self) -> HousieResult<u64> {
        self.next_id(&self.game_seq, SEQ_GAME_KEY)
    }

    pub fn next_ticket_id(&self) -> HousieResult<u64> {
        self.next_id(&self.ticket_seq, SEQ_TICKET_KEY)
    }

    pub fn next_winning_id(&self) -> HousieResult<u64> {
        self.next_id(&self.winning_seq, SEQ_WINNING_KEY)
    }

    fn next_id(&self, seq: &AtomicU64, key: &[u8]) -> HousieResult<u64> {
        let id = seq.fetch_add(1, Ordering::SeqCst) + 1;
        // Serialize the durable write and persist the counter's current high
        // water mark, not this allocation's id: two racing allocations would
        // otherwise land their puts out of order and a restart could hand
        // out an already-committed record's id again.
        let _guard = match self.seq_persist.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let highest = seq.load(Ordering::SeqCst);
        self.db
            .put(key, highest.to_le_bytes())
            .map_err(|e| HousieError::Storage(StorageError::WriteFailed(e.to_string())))?;
        Ok(id)
    }

    // --- raw access ---------------------------------------------------------

    fn get(&self, key: &[u8]) -> HousieResult<Option<Vec<u8>>> {
        self.db
            .get(key)
            .map_err(|e| HousieError::Storage(StorageError::ReadFailed(e.to_string())))
    }

    /// Commits a staged unit of work atomically.
    pub fn commit(&self, batch: UnitOfWork) -> HousieResult<()> {
        self.db
            .write(batch.inner)
            .map_err(|e| HousieError::Storage(StorageError::WriteFailed(e.to_string())))?;
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut rows = Vec::new();
        let iter = self
            .db
            .iterator(IteratorMode::From(prefix, Direction::Forward));
        for item in iter {
            let Ok((key, value)) = item else { break };
            if !key.starts_with(prefix) {
                break;
            }
            rows.push((key.to_vec(), value.to_vec()));
        }
        rows
    }

    fn count_prefix(&self, prefix: &[u8]) -> u64 {
        let iter = self
            .db
            .iterator(IteratorMode::From(prefix, Direction::Forward));
        let mut count = 0u64;
        for item in iter {
            let Ok((key, _)) = item else { break };
            if !key.starts_with(prefix) {
                break;
            }
            count += 1;
        }
        count
    }

    // --- games --------------------------------------------------------------

    pub fn load_game(&self, game_id: u64) -> HousieResult<Option<Game>> {
        let Some(bytes) = self.get(&game_key(game_id))? else {
            return Ok(None);
        };
        let game: Game = serde_json::from_slice(&bytes).map_err(|e| {
            HousieError::Storage(StorageError::CorruptedData(format!(
                "Failed to decode game {}: {}",
                game_id, e
            )))
        })?;
        Ok(Some(game))
    }

    /// Loads a game or reports the distinguished not-found outcome.
    pub fn require_game(&self, game_id: u64) -> HousieResult<Game> {
        self.load_game(game_id)?
            .ok_or(HousieError::GameNotFound(game_id))
    }

    /// All games, ascending by id. The game set is small (one record per
    /// round), so a prefix scan stands in for a status index.
    pub fn all_games(&self) -> HousieResult<Vec<Game>> {
        self.scan_prefix(GAME_PREFIX.as_bytes())
            .into_iter()
            .map(|(_, value)| {
                serde_json::from_slice(&value).map_err(|e| {
                    HousieError::Storage(StorageError::CorruptedData(format!(
                        "Failed to decode game record: {}",
                        e
                    )))
                })
            })
            .collect()
    }

    pub fn tickets_sold(&self, game_id: u64) -> u64 {
        self.count_prefix(&game_tickets_prefix(game_id))
    }

    // --- tickets ------------------------------------------------------------

    pub fn load_ticket(&self, ticket_id: u64) -> HousieResult<Option<Ticket>> {
        let Some(bytes) = self.get(&ticket_key(ticket_id))? else {
            return Ok(None);
        };
        let ticket: Ticket = serde_json::from_slice(&bytes).map_err(|e| {
            HousieError::Storage(StorageError::CorruptedData(format!(
                "Failed to decode ticket {}: {}",
                ticket_id, e
            )))
        })?;
        Ok(Some(ticket))
    }

    /// Tickets for one game, ascending by purchase order.
    pub fn tickets_for_game(&self, game_id: u64) -> HousieResult<Vec<Ticket>> {
        let mut tickets = Vec::new();
        for (key, _) in self.scan_prefix(&game_tickets_prefix(game_id)) {
            let ticket_id = parse_trailing_id(&key)?;
            let ticket = self.load_ticket(ticket_id)?.ok_or_else(|| {
                HousieError::Storage(StorageError::CorruptedData(format!(
                    "Ticket index for game {} points at missing ticket {}",
                    game_id, ticket_id
                )))
            })?;
            tickets.push(ticket);
        }
        Ok(tickets)
    }

    // --- winnings -----------------------------------------------------------

    pub fn load_winning(&self, winning_id: u64) -> HousieResult<Option<Winning>> {
        let Some(bytes) = self.get(&winning_key(winning_id))? else {
            return Ok(None);
        };
        let winning: Winning = serde_json::from_slice(&bytes).map_err(|e| {
            HousieError::Storage(StorageError::CorruptedData(format!(
                "Failed to decode winning {}: {}",
                winning_id, e
            )))
        })?;
        Ok(Some(winning))
    }

    /// Winning records so far for a (game, pattern) pair. Read under the game
    /// lock when enforcing the winner cap.
    pub fn winning_count(&self, game_id: u64, pattern: PatternKey) -> u64 {
        self.count_prefix(&game_winnings_prefix(game_id, pattern))
    }

    /// Whether this ticket already holds a winning record for this pattern.
    pub fn ticket_pattern_claimed(
        &self,
        ticket_id: u64,
        pattern: PatternKey,
    ) -> HousieResult<bool> {
        Ok(self
            .get(&ticket_winning_index_key(ticket_id, pattern))?
            .is_some())
    }

    // --- staged writes ------------------------------------------------------

    pub fn begin(&self) -> UnitOfWork {
        UnitOfWork::new()
    }
}

fn load_sequence(db: &DB, key: &[u8]) -> HousieResult<u64> {
    let Some(bytes) = db
        .get(key)
        .map_err(|e| HousieError::Storage(StorageError::ReadFailed(e.to_string())))?
    else {
        return Ok(0);
    };
    let arr: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
        HousieError::Storage(StorageError::CorruptedData(format!(
            "Sequence key {:?} holds {} bytes, expected 8",
            String::from_utf8_lossy(key),
            bytes.len()
        )))
    })?;
    Ok(u64::from_le_bytes(arr))
}

fn parse_trailing_id(key: &[u8]) -> HousieResult<u64> {
    let text = std::str::from_utf8(key).map_err(|e| {
        HousieError::Storage(StorageError::CorruptedData(format!(
            "Non-UTF8 index key: {}",
            e
        )))
    })?;
    let tail = text.rsplit(':').next().unwrap_or_default();
    tail.parse::<u64>().map_err(|e| {
        HousieError::Storage(StorageError::CorruptedData(format!(
            "Index key {} has no trailing id: {}",
            text, e
        )))
    })
}

/// Staged multi-record mutation. Nothing is visible until [`GameStore::commit`]
/// writes the whole batch; dropping an unfinished unit of work is a rollback.
pub struct UnitOfWork {
    inner: WriteBatch,
}

impl UnitOfWork {
    fn new() -> Self {
        Self {
            inner: WriteBatch::default(),
        }
    }

    pub fn put_game(&mut self, game: &Game) -> HousieResult<()> {
        let bytes = serde_json::to_vec(game)?;
        self.inner.put(game_key(game.id), bytes);
        Ok(())
    }

    pub fn put_ticket(&mut self, ticket: &Ticket) -> HousieResult<()> {
        let bytes = serde_json::to_vec(ticket)?;
        self.inner.put(ticket_key(ticket.id), bytes);
        self.inner
            .put(game_ticket_index_key(ticket.game_id, ticket.id), b"");
        Ok(())
    }

    pub fn put_winning(&mut self, winning: &Winning) -> HousieResult<()> {
        let bytes = serde_json::to_vec(winning)?;
        self.inner.put(winning_key(winning.id), bytes);
        self.inner.put(
            game_winning_index_key(winning.game_id, winning.pattern, winning.id),
            b"",
        );
        self.inner.put(
            ticket_winning_index_key(winning.ticket_id, winning.pattern),
            winning.id.to_string(),
        );
        Ok(())
    }
}
