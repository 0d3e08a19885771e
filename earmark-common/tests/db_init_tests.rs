//! Tests for tag store creation and read-only opening

use earmark_common::db::{open_tag_store, StoreMode};

#[tokio::test]
async fn test_read_write_creates_store_and_table() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("audiotagdb3");

    let pool = open_tag_store(&db_path, StoreMode::ReadWrite).await;
    assert!(pool.is_ok(), "Tag store creation failed: {:?}", pool.err());
    assert!(db_path.exists(), "Tag store file was not created");

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tagTable")
        .fetch_one(&pool.unwrap())
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_read_write_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("audiotagdb3");

    let pool1 = open_tag_store(&db_path, StoreMode::ReadWrite).await.unwrap();
    sqlx::query("INSERT INTO tagTable (tagType, audioFile) VALUES ('skip', '//dat/a.wav')")
        .execute(&pool1)
        .await
        .unwrap();
    drop(pool1);

    let pool2 = open_tag_store(&db_path, StoreMode::ReadWrite).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tagTable")
        .fetch_one(&pool2)
        .await
        .unwrap();
    assert_eq!(count, 1, "Existing rows must survive reopening");
}

#[tokio::test]
async fn test_read_only_does_not_create_missing_store() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("missing");

    let result = open_tag_store(&db_path, StoreMode::ReadOnly).await;
    assert!(result.is_err());
    assert!(!db_path.exists());
}
