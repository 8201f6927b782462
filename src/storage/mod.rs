pub mod event_store;

pub use event_store::EventStore;

use sqlx::{sqlite::SqliteConnectOptions, SqlitePool};
use std::{path::Path, str::FromStr};

use crate::board::BoardError;

/// Open (or create) the SQLite database at `{data_dir}/boardd.db` and run
/// the embedded migrations. WAL mode keeps appends crash-safe without
/// serializing readers behind writers.
pub async fn open_pool(data_dir: &Path) -> Result<SqlitePool, BoardError> {
    tokio::fs::create_dir_all(data_dir)
        .await
        .map_err(|e| BoardError::Storage(sqlx::Error::Io(e)))?;
    let db_path = data_dir.join("boardd.db");
    let opts = SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display()))?
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;
    migrate(&pool).await?;
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> Result<(), BoardError> {
    sqlx::migrate!("src/storage/migrations")
        .run(pool)
        .await
        .map_err(|e| BoardError::Storage(e.into()))
}
