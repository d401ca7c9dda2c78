use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::{normalize_pair, SizingPolicy, TradingMode};

const KEY_MODE: &str = "mode";
const KEY_PAIR: &str = "pair";
const KEY_SIZING: &str = "sizing";

/// Persisted bot settings
///
/// A single `settings(key, value)` table. Each get/set is one statement,
/// so individual fields are atomic at the storage layer; composite
/// read-then-act sequences are not (a concurrent toggle applies from the
/// next decision cycle).
#[derive(Clone)]
pub struct SettingsStore {
    pool: SqlitePool,
}

impl SettingsStore {
    /// Open (or create) the settings database at `path`
    pub async fn open(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        tracing::info!("Settings store ready at {}", path);
        Ok(store)
    }

    /// In-memory store for tests. One connection, so state is shared.
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query("CREATE TABLE IF NOT EXISTS settings (key TEXT PRIMARY KEY, value TEXT NOT NULL)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.0))
    }

    pub async fn get_or(&self, key: &str, default: &str) -> Result<String> {
        Ok(self.get(key).await?.unwrap_or_else(|| default.to_string()))
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query("REPLACE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Trading mode; defaults to Manual so an unconfigured deployment
    /// alerts instead of trading.
    pub async fn trading_mode(&self) -> Result<TradingMode> {
        let raw = self.get_or(KEY_MODE, TradingMode::Manual.as_str()).await?;
        Ok(raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Unreadable stored mode '{}', falling back to manual", raw);
            TradingMode::Manual
        }))
    }

    pub async fn set_trading_mode(&self, mode: TradingMode) -> Result<()> {
        self.set(KEY_MODE, mode.as_str()).await
    }

    /// Active pair; falls back to the configured default when unset
    pub async fn tracked_pair(&self, fallback: &str) -> Result<String> {
        self.get_or(KEY_PAIR, fallback).await
    }

    /// Validate and persist a new pair symbol
    pub async fn set_tracked_pair(&self, input: &str) -> Result<String> {
        let symbol = normalize_pair(input)?;
        self.set(KEY_PAIR, &symbol).await?;
        Ok(symbol)
    }

    /// Active sizing policy; defaults to a fixed 10-unit quote spend
    pub async fn sizing_policy(&self) -> Result<SizingPolicy> {
        let default = SizingPolicy::FixedQuote(10.0);
        match self.get(KEY_SIZING).await? {
            Some(raw) => Ok(raw.parse().unwrap_or_else(|_| {
                tracing::warn!("Unreadable stored sizing '{}', falling back to {}", raw, default);
                default
            })),
            None => Ok(default),
        }
    }

    /// Validate and persist a new sizing policy
    pub async fn set_sizing_policy(&self, policy: SizingPolicy) -> Result<()> {
        policy.validate()?;
        self.set(KEY_SIZING, &policy.to_string()).await
    }
}
