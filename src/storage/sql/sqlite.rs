//! SQLite backend, used for embedded deployments and in-process SQL tests.
//!
//! Mirrors the MySQL schema. Text columns use `COLLATE NOCASE` so equality
//! and uniqueness compare like MySQL's default collation, and `LIKE` is
//! ASCII case-insensitive out of the box. Foreign keys are enforced on every
//! connection.

use super::sql_store;
use anyhow::{Result, anyhow};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePoolOptions, SqliteRow};
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Schema management
// ---------------------------------------------------------------------------

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS teams (
        team_id INTEGER PRIMARY KEY AUTOINCREMENT,
        team_name TEXT NOT NULL COLLATE NOCASE UNIQUE,
        abbreviation TEXT NOT NULL COLLATE NOCASE UNIQUE,
        founding_year INTEGER NOT NULL,
        championships INTEGER NOT NULL DEFAULT 0,
        general_manager TEXT NOT NULL COLLATE NOCASE
    )",
    "CREATE TABLE IF NOT EXISTS arenas (
        arena_id INTEGER PRIMARY KEY AUTOINCREMENT,
        arena_name TEXT NOT NULL COLLATE NOCASE UNIQUE,
        city TEXT NOT NULL COLLATE NOCASE,
        province TEXT NOT NULL COLLATE NOCASE,
        capacity INTEGER NOT NULL,
        year_built INTEGER NOT NULL,
        team_id INTEGER NULL REFERENCES teams (team_id)
    )",
    "CREATE TABLE IF NOT EXISTS games (
        game_id INTEGER PRIMARY KEY AUTOINCREMENT,
        game_date TEXT NOT NULL,
        home_team_id INTEGER NOT NULL REFERENCES teams (team_id),
        away_team_id INTEGER NOT NULL REFERENCES teams (team_id),
        home_score INTEGER NOT NULL,
        away_score INTEGER NOT NULL,
        arena_id INTEGER NOT NULL REFERENCES arenas (arena_id),
        game_type TEXT NOT NULL COLLATE NOCASE,
        side_start TEXT NOT NULL COLLATE NOCASE
    )",
    "CREATE INDEX IF NOT EXISTS idx_game_date ON games (game_date)",
    "CREATE TABLE IF NOT EXISTS players (
        player_id INTEGER PRIMARY KEY AUTOINCREMENT,
        first_name TEXT NOT NULL COLLATE NOCASE,
        last_name TEXT NOT NULL COLLATE NOCASE,
        team_id INTEGER NOT NULL REFERENCES teams (team_id)
    )",
    "CREATE TABLE IF NOT EXISTS statistics (
        stat_id INTEGER PRIMARY KEY AUTOINCREMENT,
        game_id INTEGER NOT NULL REFERENCES games (game_id),
        player_id INTEGER NOT NULL REFERENCES players (player_id),
        goals_scored INTEGER NOT NULL DEFAULT 0,
        assists INTEGER NOT NULL DEFAULT 0,
        shot_on_target INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE INDEX IF NOT EXISTS idx_statistics_game ON statistics (game_id)",
];

/// Apply the required tables and indexes (idempotent).
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    for ddl in SCHEMA {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .map_err(|e| anyhow!("Failed to apply schema: {}", e))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// SqliteStore
// ---------------------------------------------------------------------------

/// Store backed by a SQLite pool
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database at `url`.
    ///
    /// An in-memory database lives on a single connection, so the pool is
    /// pinned to one connection that is never recycled.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| anyhow!("Invalid SQLite url '{}': {}", url, e))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool_options = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| anyhow!("Failed to open SQLite database: {}", e))?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

sql_store!(
    SqliteStore,
    sqlx::Sqlite,
    SqliteConnection,
    SqliteRow,
    |done| done.last_insert_rowid()
);
