use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tokio::sync::Mutex;
use tracing::info;

use shared::domain::User;

/// What survives a restart: the bearer token and the signed-in user record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub token: String,
    pub user: User,
    pub saved_at: DateTime<Utc>,
}

impl PersistedSession {
    pub fn new(token: impl Into<String>, user: User) -> Self {
        Self {
            token: token.into(),
            user,
            saved_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait SessionVault: Send + Sync {
    async fn save_session(&self, session: &PersistedSession) -> Result<()>;
    async fn load_session(&self) -> Result<Option<PersistedSession>>;
    async fn clear_session(&self) -> Result<()>;
}

/// Session vault that forgets everything when dropped.
#[derive(Default)]
pub struct MemoryVault {
    session: Mutex<Option<PersistedSession>>,
}

#[async_trait]
impl SessionVault for MemoryVault {
    async fn save_session(&self, session: &PersistedSession) -> Result<()> {
        *self.session.lock().await = Some(session.clone());
        Ok(())
    }

    async fn load_session(&self) -> Result<Option<PersistedSession>> {
        Ok(self.session.lock().await.clone())
    }

    async fn clear_session(&self) -> Result<()> {
        self.session.lock().await.take();
        Ok(())
    }
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // One connection: the session table is a single row and an in-memory
        // database only exists on the connection that created it.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open session database '{database_url}'"))?;
        let storage = Self { pool };
        storage.ensure_session_table().await?;
        Ok(storage)
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    async fn ensure_session_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS client_session (
                slot       INTEGER PRIMARY KEY CHECK (slot = 1),
                token      TEXT NOT NULL,
                user_json  TEXT NOT NULL,
                saved_at   TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure client_session table exists")?;
        Ok(())
    }
}

#[async_trait]
impl SessionVault for Storage {
    async fn save_session(&self, session: &PersistedSession) -> Result<()> {
        let user_json =
            serde_json::to_string(&session.user).context("failed to serialize session user")?;
        sqlx::query(
            "INSERT INTO client_session (slot, token, user_json, saved_at) VALUES (1, ?, ?, ?)
             ON CONFLICT(slot) DO UPDATE SET token = excluded.token, user_json = excluded.user_json, saved_at = excluded.saved_at",
        )
        .bind(&session.token)
        .bind(user_json)
        .bind(session.saved_at)
        .execute(&self.pool)
        .await
        .context("failed to persist session")?;
        info!(user_id = %session.user.id, "session: persisted");
        Ok(())
    }

    async fn load_session(&self) -> Result<Option<PersistedSession>> {
        let row = sqlx::query("SELECT token, user_json, saved_at FROM client_session WHERE slot = 1")
            .fetch_optional(&self.pool)
            .await
            .context("failed to load session")?;
        let Some(row) = row else {
            return Ok(None);
        };

        let user_json: String = row.try_get("user_json")?;
        let user: User =
            serde_json::from_str(&user_json).context("stored session user is malformed")?;
        Ok(Some(PersistedSession {
            token: row.try_get("token")?,
            user,
            saved_at: row.try_get("saved_at")?,
        }))
    }

    async fn clear_session(&self) -> Result<()> {
        let removed = sqlx::query("DELETE FROM client_session")
            .execute(&self.pool)
            .await
            .context("failed to clear session")?
            .rows_affected();
        info!(removed, "session: cleared");
        Ok(())
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
