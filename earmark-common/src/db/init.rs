//! Tag store connection and schema
//!
//! The tag side-store is a small SQLite file living next to the imported
//! data. Readers open it read-only and never create it; the tag writer opens it
//! read-write and creates file and table on first use.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{debug, info};

/// Name of the table holding tag entries
pub const TAG_TABLE: &str = "tagTable";

/// How a tag store is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Read-only, the file must already exist
    ReadOnly,
    /// Read-write, the file is created if missing
    ReadWrite,
}

/// Open a connection pool on a tag store
///
/// A single connection is used: all writes go through one worker, and reads
/// happen once per import.
pub async fn open_tag_store(path: &Path, mode: StoreMode) -> Result<SqlitePool> {
    let newly_created = !path.exists();

    let options = SqliteConnectOptions::new()
        .filename(path)
        .read_only(mode == StoreMode::ReadOnly)
        .create_if_missing(mode == StoreMode::ReadWrite);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    if mode == StoreMode::ReadWrite {
        sqlx::query("PRAGMA busy_timeout = 5000")
            .execute(&pool)
            .await?;
        create_tag_table(&pool).await?;
        if newly_created {
            info!("Initialized new tag store: {}", path.display());
        }
    } else {
        debug!("Opened tag store read-only: {}", path.display());
    }

    Ok(pool)
}

/// Create the tag table if it does not exist (idempotent)
pub async fn create_tag_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tagTable (
            tagType TEXT NOT NULL,
            audioFile TEXT NOT NULL,
            reason TEXT NULL,
            tagger TEXT NULL,
            comment TEXT NULL,
            timestamp TEXT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
