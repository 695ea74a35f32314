use catalog_admin_core::{TokenPair, TokenStore};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{migrate::MigrateError, sqlite::SqlitePoolOptions, Row, SqlitePool};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

const DEVICE_ID_KEY: &str = "device_id";

/// Top-level database handle that owns the SQLite connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Establishes a new SQLite connection pool for the provided connection string.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(StorageError::Connect)?;

        apply_pragmas(&pool).await?;

        Ok(Self { pool })
    }

    /// Applies migrations located under `migrations/`.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::Migration)?;
        Ok(())
    }

    /// Returns the persisted auth session, usable as the client's token store.
    pub fn sessions(&self) -> SessionRepository {
        SessionRepository {
            pool: self.pool.clone(),
        }
    }

    pub fn devices(&self) -> DeviceRepository {
        DeviceRepository {
            pool: self.pool.clone(),
        }
    }

    /// Exposes the inner pool when lower level access is required.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn apply_pragmas(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::query("PRAGMA foreign_keys = ON;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA journal_mode = WAL;")
        .fetch_one(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA synchronous = NORMAL;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA busy_timeout = 5000;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    Ok(())
}

/// General storage level errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to connect to sqlite: {0}")]
    Connect(sqlx::Error),
    #[error("failed to apply pragma: {0}")]
    Pragma(sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(MigrateError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Errors raised while reading or writing the auth session row.
#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid timestamp '{value}' in stored session")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Single-row store for the current admin session.
#[derive(Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl TokenStore for SessionRepository {
    type Error = SessionStoreError;

    async fn load(&self) -> Result<Option<TokenPair>, SessionStoreError> {
        let row = sqlx::query(
            "SELECT access_token, refresh_token, id_token, expires_at FROM auth_session WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let expires_at = row
            .try_get::<Option<String>, _>("expires_at")?
            .map(|value| parse_timestamp(&value))
            .transpose()?;

        Ok(Some(TokenPair {
            access_token: row.try_get("access_token")?,
            refresh_token: row.try_get("refresh_token")?,
            id_token: row.try_get("id_token")?,
            expires_at,
        }))
    }

    async fn save(&self, tokens: &TokenPair) -> Result<(), SessionStoreError> {
        sqlx::query(
            r#"
            INSERT INTO auth_session (id, access_token, refresh_token, id_token, expires_at, updated_at)
            VALUES (1, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                id_token = excluded.id_token,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&tokens.access_token)
        .bind(&tokens.refresh_token)
        .bind(tokens.id_token.as_deref())
        .bind(tokens.expires_at.map(to_rfc3339))
        .bind(to_rfc3339(Utc::now()))
        .execute(&self.pool)
        .await?;

        debug!(stage = "storage", "auth session saved");
        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionStoreError> {
        let result = sqlx::query("DELETE FROM auth_session WHERE id = 1")
            .execute(&self.pool)
            .await?;

        debug!(
            stage = "storage",
            removed = result.rows_affected(),
            "auth session cleared"
        );
        Ok(())
    }
}

/// Identity of this installation as reported to the auth backend.
#[derive(Clone)]
pub struct DeviceRepository {
    pool: SqlitePool,
}

impl DeviceRepository {
    /// Returns the stored device id, generating and persisting one on first use.
    pub async fn device_id(&self) -> Result<String, StorageError> {
        let candidate = Uuid::new_v4().to_string();
        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO install_metadata (key, value, created_at) VALUES (?, ?, ?)",
        )
        .bind(DEVICE_ID_KEY)
        .bind(&candidate)
        .bind(to_rfc3339(Utc::now()))
        .execute(&self.pool)
        .await?
        .rows_affected();

        let device_id: String =
            sqlx::query_scalar("SELECT value FROM install_metadata WHERE key = ?")
                .bind(DEVICE_ID_KEY)
                .fetch_one(&self.pool)
                .await?;

        if inserted > 0 {
            info!(stage = "storage", device_id = %device_id, "generated device id");
        }
        Ok(device_id)
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, SessionStoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| SessionStoreError::InvalidTimestamp {
            value: value.to_string(),
            source,
        })
}

fn to_rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}
