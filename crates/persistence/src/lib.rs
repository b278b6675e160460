#![deny(warnings)]

//! Save/load of session progress.
//!
//! Progress is stored as two JSON documents, one for the cumulative
//! [`GameState`] and one for the [`TransactionHistory`]. Readers default
//! every missing field so that older saved shapes keep loading, and a save
//! that cannot be understood is replaced by a fresh session.

use chrono::Utc;
use gauntlet_core::{GameState, Outcome, TransactionHistory};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

pub const GAME_STATE_KEY: &str = "gameState";
pub const HISTORY_KEY: &str = "transactionHistory";

/// Returns the default SQLite URL used for local saves.
pub fn default_sqlite_url() -> &'static str {
    "sqlite://./saves/gauntlet.db"
}

/// Persistence failures.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Saved document is not valid JSON or violates state invariants.
    #[error("malformed persisted state: {0}")]
    Malformed(String),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// On-disk shape of [`GameState`]. `currentLevel` is written for readers
/// but ignored on load, since the level always follows from the score.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct GameStateRecord {
    score: Decimal,
    transactions_attempted: u64,
    transactions_successful: u64,
    total_cost: Decimal,
    current_level: u32,
}

impl From<&GameState> for GameStateRecord {
    fn from(s: &GameState) -> Self {
        Self {
            score: s.score,
            transactions_attempted: s.attempts,
            transactions_successful: s.successes,
            total_cost: s.total_cost,
            current_level: s.level(),
        }
    }
}

pub fn serialize_state(state: &GameState) -> Result<String, PersistError> {
    serde_json::to_string(&GameStateRecord::from(state))
        .map_err(|e| PersistError::Malformed(e.to_string()))
}

pub fn deserialize_state(json: &str) -> Result<GameState, PersistError> {
    let rec: GameStateRecord =
        serde_json::from_str(json).map_err(|e| PersistError::Malformed(e.to_string()))?;
    let state = GameState {
        score: rec.score,
        attempts: rec.transactions_attempted,
        successes: rec.transactions_successful,
        total_cost: rec.total_cost,
    };
    state
        .validate()
        .map_err(|e| PersistError::Malformed(e.to_string()))?;
    Ok(state)
}

pub fn serialize_history(history: &TransactionHistory) -> Result<String, PersistError> {
    let entries: Vec<&Outcome> = history.iter().collect();
    serde_json::to_string(&entries).map_err(|e| PersistError::Malformed(e.to_string()))
}

/// Entries are expected most-recent-first; extras beyond `capacity` are dropped.
pub fn deserialize_history(
    capacity: usize,
    json: &str,
) -> Result<TransactionHistory, PersistError> {
    let entries: Vec<Outcome> =
        serde_json::from_str(json).map_err(|e| PersistError::Malformed(e.to_string()))?;
    if entries
        .iter()
        .any(|o| o.cost < Decimal::ZERO || o.latency_ms < Decimal::ZERO)
    {
        return Err(PersistError::Malformed("negative cost or latency in history".into()));
    }
    Ok(TransactionHistory::from_entries(capacity, entries))
}

/// Both saved documents, decoded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SavedSession {
    pub state: GameState,
    pub history: TransactionHistory,
}

/// Decode whatever was saved, resetting any part that is malformed.
pub fn load_or_default(
    capacity: usize,
    state_json: Option<&str>,
    history_json: Option<&str>,
) -> SavedSession {
    let state = match state_json.map(deserialize_state) {
        Some(Ok(s)) => s,
        Some(Err(e)) => {
            warn!(error = %e, "discarding saved game state");
            GameState::new()
        }
        None => GameState::new(),
    };
    let history = match history_json.map(|j| deserialize_history(capacity, j)) {
        Some(Ok(h)) => h,
        Some(Err(e)) => {
            warn!(error = %e, "discarding saved history");
            TransactionHistory::with_capacity(capacity)
        }
        None => TransactionHistory::with_capacity(capacity),
    };
    SavedSession { state, history }
}

/// Key/value save store on SQLite.
#[derive(Clone, Debug)]
pub struct SaveStore {
    pool: SqlitePool,
}

impl SaveStore {
    /// Open (creating if needed) the database at `url` and ensure the schema.
    pub async fn open(url: &str) -> Result<Self, PersistError> {
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"));
        if let Some(path) = path.filter(|p| !p.starts_with(":memory:")) {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
        }
        let opts = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        // One connection so in-memory databases are shared.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;
        info!(url, "save store ready");
        Ok(Self { pool })
    }

    pub async fn put(&self, key: &str, value: &str) -> Result<(), PersistError> {
        sqlx::query(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, PersistError> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM kv WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    pub async fn remove(&self, key: &str) -> Result<(), PersistError> {
        sqlx::query("DELETE FROM kv WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn keys(&self) -> Result<Vec<String>, PersistError> {
        let keys = sqlx::query_scalar::<_, String>("SELECT key FROM kv ORDER BY key")
            .fetch_all(&self.pool)
            .await?;
        Ok(keys)
    }

    pub async fn save_session(
        &self,
        state: &GameState,
        history: &TransactionHistory,
    ) -> Result<(), PersistError> {
        self.put(GAME_STATE_KEY, &serialize_state(state)?).await?;
        self.put(HISTORY_KEY, &serialize_history(history)?).await?;
        Ok(())
    }

    /// Load both documents; malformed ones fall back to defaults.
    pub async fn load_session(&self, capacity: usize) -> Result<SavedSession, PersistError> {
        let state = self.get(GAME_STATE_KEY).await?;
        let history = self.get(HISTORY_KEY).await?;
        Ok(load_or_default(capacity, state.as_deref(), history.as_deref()))
    }

    pub async fn clear_session(&self) -> Result<(), PersistError> {
        self.remove(GAME_STATE_KEY).await?;
        self.remove(HISTORY_KEY).await
    }
}
