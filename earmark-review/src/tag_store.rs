//! Reading the tag side-store into an in-memory [`TagStore`]

use crate::error::{Error, Result};
use earmark_common::db::{open_tag_store, StoreMode, TAG_TABLE};
use earmark_table::{PathNormalizer, TagEntry, TagStore, TagType};
use sqlx::sqlite::SqliteRow;
use sqlx::Row as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{error, info, warn};

/// Tag store location for imported data living in `dir`
pub fn store_path_for(dir: &Path, store_file_name: &str) -> PathBuf {
    dir.join(store_file_name)
}

/// Load every entry from the tag store at `path`
///
/// A missing file or a store without the tag table yields an empty store.
/// A file that exists but is not a SQLite database is [`Error::TagStoreCorrupt`].
/// Entries with an unknown tag type are skipped.
pub async fn load_tag_store(path: &Path, normalizer: &PathNormalizer) -> Result<TagStore> {
    if !path.exists() {
        info!("No tag store at {}", path.display());
        return Ok(TagStore::new());
    }

    let pool = open_tag_store(path, StoreMode::ReadOnly)
        .await
        .map_err(|e| corrupt(path, e.to_string()))?;

    let query = format!(
        "SELECT tagType, audioFile, reason, tagger, comment, timestamp FROM {}",
        TAG_TABLE
    );
    let rows = match sqlx::query(&query).fetch_all(&pool).await {
        Ok(rows) => rows,
        Err(e) if e.to_string().contains("no such table") => {
            error!("Tag store {} has no {} table", path.display(), TAG_TABLE);
            pool.close().await;
            return Ok(TagStore::new());
        }
        Err(e) => {
            pool.close().await;
            return Err(corrupt(path, e.to_string()));
        }
    };
    pool.close().await;

    let mut store = TagStore::new();
    for row in &rows {
        match entry_from_row(row) {
            Ok(mut entry) => {
                entry.audio_file = normalizer.normalize(&entry.audio_file);
                store.insert(entry);
            }
            Err(reason) => warn!("Skipping tag entry in {}: {}", path.display(), reason),
        }
    }

    info!(
        "Loaded {} tag entries from {}",
        store.len(),
        path.display()
    );
    Ok(store)
}

fn corrupt(path: &Path, reason: String) -> Error {
    Error::TagStoreCorrupt {
        path: path.to_path_buf(),
        reason,
    }
}

fn entry_from_row(row: &SqliteRow) -> std::result::Result<TagEntry, String> {
    let tag_type: String = row.try_get("tagType").map_err(|e| e.to_string())?;
    let tag_type = TagType::from_str(&tag_type).map_err(|e| e.to_string())?;
    let audio_file: String = row.try_get("audioFile").map_err(|e| e.to_string())?;

    let text = |name: &str| -> String {
        row.try_get::<Option<String>, _>(name)
            .ok()
            .flatten()
            .unwrap_or_default()
    };

    Ok(TagEntry {
        tag_type,
        audio_file,
        reason: text("reason"),
        tagger: text("tagger"),
        comment: text("comment"),
        timestamp: timestamp(row),
    })
}

/// Timestamps were written both as text and as integers
fn timestamp(row: &SqliteRow) -> i64 {
    if let Ok(Some(text)) = row.try_get::<Option<String>, _>("timestamp") {
        if let Ok(value) = text.trim().parse::<i64>() {
            return value;
        }
        if let Ok(value) = text.trim().parse::<f64>() {
            return value as i64;
        }
    }
    row.try_get::<Option<i64>, _>("timestamp")
        .ok()
        .flatten()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_store_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = load_tag_store(&dir.path().join("audiotagdb3"), &PathNormalizer::default())
            .await
            .unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_not_a_database_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audiotagdb3");
        std::fs::write(&path, vec![b'x'; 4096]).unwrap();

        let result = load_tag_store(&path, &PathNormalizer::default()).await;
        assert!(matches!(result, Err(Error::TagStoreCorrupt { .. })));
    }

    #[tokio::test]
    async fn test_store_without_table_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audiotagdb3");
        let pool = open_tag_store(&path, StoreMode::ReadWrite).await.unwrap();
        sqlx::query("DROP TABLE tagTable").execute(&pool).await.unwrap();
        pool.close().await;

        let store = load_tag_store(&path, &PathNormalizer::default()).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_loads_and_normalizes_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audiotagdb3");
        let pool = open_tag_store(&path, StoreMode::ReadWrite).await.unwrap();
        for (tag_type, file, ts) in [
            ("skip", "/smb/dat/a.wav", "1700000000"),
            ("flag", "/smb/dat/a.wav", "12.5"),
            ("bogus", "/smb/dat/b.wav", "0"),
        ] {
            sqlx::query(
                "INSERT INTO tagTable (tagType, audioFile, reason, tagger, comment, timestamp) \
                 VALUES (?, ?, 'Other', 'me', NULL, ?)",
            )
            .bind(tag_type)
            .bind(file)
            .bind(ts)
            .execute(&pool)
            .await
            .unwrap();
        }
        pool.close().await;

        let store = load_tag_store(&path, &PathNormalizer::new("/smb/", "/home/me"))
            .await
            .unwrap();
        assert_eq!(store.len(), 2);
        let skip = store.get("//dat/a.wav", TagType::Skip).unwrap();
        assert_eq!(skip.timestamp, 1_700_000_000);
        assert_eq!(skip.comment, "");
        assert_eq!(skip.audio_file, "//dat/a.wav");
        assert_eq!(store.get("//dat/a.wav", TagType::Flag).unwrap().timestamp, 12);
        assert!(!store.has("//dat/b.wav", TagType::Skip));
    }
}
