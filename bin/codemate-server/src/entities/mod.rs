//! SQLite persistence.
//!
//! [`SqliteStore`] implements the core [`codemate_core::ConversationStore`]
//! and the server-side [`UserStore`]. Migrations under `./migrations` are
//! embedded at compile time and run on [`SqliteStore::connect`].
//!
//! Queries use the runtime-checked `sqlx::query` form so no `DATABASE_URL`
//! is needed at compile time.

pub mod conversation;
pub mod user;

pub use user::UserStore;

use std::str::FromStr;

use codemate_core::StoreError;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the SQLite database at `url` and run pending migrations.
    ///
    /// `url` is a sqlx SQLite URL, e.g. `"sqlite://codemate.db"` or
    /// `"sqlite::memory:"` for tests.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let pool = if in_memory {
            // Every connection would get its own empty database.
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(8)
                .connect_with(options)
                .await?
        };
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

pub(crate) fn store_error(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.message().to_owned())
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(e.to_string())
        }
        _ => StoreError::Backend(e.to_string()),
    }
}

fn parse_timestamp(raw: &str) -> chrono::DateTime<chrono::Utc> {
    raw.parse().unwrap_or_else(|e: chrono::ParseError| {
        tracing::warn!(raw = %raw, error = %e, "failed to parse stored timestamp; using now");
        chrono::Utc::now()
    })
}
