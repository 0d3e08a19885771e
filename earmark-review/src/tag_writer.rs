//! Single-writer worker for the tag side-store
//!
//! Every write and removal goes through one tokio task that owns the only
//! read-write connection, so concurrent tag actions queue instead of racing.
//! Outcomes are posted back to the session; the session resyncs rows only
//! after a successful outcome arrives.

use crate::error::{Error, Result};
use earmark_common::db::{open_tag_store, StoreMode};
use earmark_common::time;
use earmark_table::{TagEntry, TagFields, TagType};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Work queued on the writer
#[derive(Debug)]
pub enum TagCommand {
    Write {
        store: PathBuf,
        paths: Vec<String>,
        fields: TagFields,
        tag_type: TagType,
        tagger: String,
    },
    Remove {
        store: PathBuf,
        paths: Vec<String>,
        tag_type: TagType,
    },
}

/// Result of one command, delivered after the transaction settled
#[derive(Debug, Clone)]
pub enum TagOutcome {
    Written {
        store: PathBuf,
        entries: Vec<TagEntry>,
    },
    Removed {
        store: PathBuf,
        paths: Vec<String>,
        tag_type: TagType,
    },
    Failed {
        store: PathBuf,
        reason: String,
    },
}

/// Refuse tag actions the process could not persist
///
/// Checks the store file when it exists, otherwise the directory it would be
/// created in.
pub fn check_write_permission(store: &Path) -> Result<()> {
    let target = if store.exists() {
        store.to_path_buf()
    } else {
        match store.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    };

    match std::fs::metadata(&target) {
        Ok(meta) if !meta.permissions().readonly() => Ok(()),
        Ok(_) => Err(Error::PermissionDenied(store.to_path_buf())),
        Err(e) => {
            warn!("Cannot inspect {}: {}", target.display(), e);
            Err(Error::PermissionDenied(store.to_path_buf()))
        }
    }
}

/// Handle to the writer task
pub struct TagWriter {
    tx: mpsc::UnboundedSender<TagCommand>,
    handle: JoinHandle<()>,
}

impl TagWriter {
    /// Start the writer; outcomes are sent on `reply`
    pub fn spawn<M>(reply: mpsc::UnboundedSender<M>) -> Self
    where
        M: From<TagOutcome> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_writer(rx, reply));
        Self { tx, handle }
    }

    /// Queue a write of `tag_type` for every path
    pub fn write(
        &self,
        store: &Path,
        paths: Vec<String>,
        fields: TagFields,
        tag_type: TagType,
        tagger: &str,
    ) -> Result<()> {
        check_write_permission(store)?;
        self.send(TagCommand::Write {
            store: store.to_path_buf(),
            paths,
            fields,
            tag_type,
            tagger: tagger.to_string(),
        })
    }

    /// Queue removal of `tag_type` for every path
    pub fn remove(&self, store: &Path, paths: Vec<String>, tag_type: TagType) -> Result<()> {
        check_write_permission(store)?;
        self.send(TagCommand::Remove {
            store: store.to_path_buf(),
            paths,
            tag_type,
        })
    }

    fn send(&self, command: TagCommand) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| Error::Worker("tag writer stopped".to_string()))
    }

    /// Drain queued commands and stop
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.handle.await {
            error!("Tag writer task failed: {}", e);
        }
    }
}

async fn run_writer<M>(mut rx: mpsc::UnboundedReceiver<TagCommand>, reply: mpsc::UnboundedSender<M>)
where
    M: From<TagOutcome> + Send + 'static,
{
    debug!("Tag writer started");
    let mut connection: Option<(PathBuf, SqlitePool)> = None;

    while let Some(command) = rx.recv().await {
        let store = match &command {
            TagCommand::Write { store, .. } | TagCommand::Remove { store, .. } => store.clone(),
        };

        let outcome = match pool_for(&mut connection, &store).await {
            Ok(pool) => execute(pool, command).await,
            Err(e) => Err(e),
        };

        let outcome = match outcome {
            Ok(outcome) => {
                restrict_permissions(&store);
                outcome
            }
            Err(e) => {
                error!("Tag store update failed for {}: {}", store.display(), e);
                TagOutcome::Failed {
                    store,
                    reason: e.to_string(),
                }
            }
        };

        if reply.send(M::from(outcome)).is_err() {
            debug!("Tag outcome dropped, session gone");
        }
    }

    if let Some((_, pool)) = connection {
        pool.close().await;
    }
    debug!("Tag writer stopped");
}

/// Reuse the open connection while commands target the same store
async fn pool_for<'a>(
    connection: &'a mut Option<(PathBuf, SqlitePool)>,
    store: &Path,
) -> Result<&'a SqlitePool> {
    let reuse = matches!(connection, Some((path, _)) if path.as_path() == store);
    if !reuse {
        if let Some((_, old)) = connection.take() {
            old.close().await;
        }
        let pool = open_tag_store(store, StoreMode::ReadWrite).await?;
        *connection = Some((store.to_path_buf(), pool));
    }
    match connection {
        Some((_, pool)) => Ok(&*pool),
        None => Err(Error::Worker("tag store connection missing".to_string())),
    }
}

async fn execute(pool: &SqlitePool, command: TagCommand) -> Result<TagOutcome> {
    match command {
        TagCommand::Write {
            store,
            paths,
            fields,
            tag_type,
            tagger,
        } => {
            let timestamp = time::unix_seconds();
            let entries: Vec<TagEntry> = paths
                .iter()
                .map(|path| TagEntry::new(path.as_str(), tag_type, &fields, tagger.as_str(), timestamp))
                .collect();

            let mut tx = pool.begin().await?;
            for entry in &entries {
                sqlx::query("DELETE FROM tagTable WHERE tagType = ? AND audioFile = ?")
                    .bind(entry.tag_type.as_str())
                    .bind(&entry.audio_file)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query(
                    "INSERT INTO tagTable (tagType, audioFile, reason, tagger, comment, timestamp) \
                     VALUES (?, ?, ?, ?, ?, ?)",
                )
                .bind(entry.tag_type.as_str())
                .bind(&entry.audio_file)
                .bind(&entry.reason)
                .bind(&entry.tagger)
                .bind(&entry.comment)
                .bind(entry.timestamp.to_string())
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;

            info!("Tagged {} files as {} in {}", entries.len(), tag_type, store.display());
            Ok(TagOutcome::Written { store, entries })
        }
        TagCommand::Remove {
            store,
            paths,
            tag_type,
        } => {
            let mut tx = pool.begin().await?;
            for path in &paths {
                sqlx::query("DELETE FROM tagTable WHERE tagType = ? AND audioFile = ?")
                    .bind(tag_type.as_str())
                    .bind(path)
                    .execute(&mut *tx)
                    .await?;
            }
            tx.commit().await?;

            info!("Removed {} tag from {} files in {}", tag_type, paths.len(), store.display());
            Ok(TagOutcome::Removed {
                store,
                paths,
                tag_type,
            })
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(store: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = std::fs::set_permissions(store, std::fs::Permissions::from_mode(0o664)) {
        warn!("Could not set permissions on {}: {}", store.display(), e);
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_store: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_check_uses_parent_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check_write_permission(&dir.path().join("audiotagdb3")).is_ok());
        assert!(matches!(
            check_write_permission(&dir.path().join("missing/audiotagdb3")),
            Err(Error::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_read_only_store_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("audiotagdb3");
        std::fs::write(&store, b"").unwrap();
        let mut perms = std::fs::metadata(&store).unwrap().permissions();
        perms.set_readonly(true);
        std::fs::set_permissions(&store, perms).unwrap();

        assert!(matches!(
            check_write_permission(&store),
            Err(Error::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_write_then_remove_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("audiotagdb3");
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<TagOutcome>();
        let writer = TagWriter::spawn(reply_tx);

        writer
            .write(
                &store,
                vec!["//dat/a.wav".to_string(), "//dat/b.wav".to_string()],
                TagFields::new("Other", "noisy"),
                TagType::Skip,
                "tester",
            )
            .unwrap();
        match reply_rx.recv().await.unwrap() {
            TagOutcome::Written { entries, .. } => {
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[0].tagger, "tester");
            }
            other => panic!("unexpected outcome {other:?}"),
        }

        writer
            .remove(&store, vec!["//dat/a.wav".to_string()], TagType::Skip)
            .unwrap();
        assert!(matches!(
            reply_rx.recv().await.unwrap(),
            TagOutcome::Removed { .. }
        ));
        writer.shutdown().await;

        let loaded = crate::tag_store::load_tag_store(&store, &earmark_table::PathNormalizer::default())
            .await
            .unwrap();
        assert!(!loaded.has("//dat/a.wav", TagType::Skip));
        assert_eq!(loaded.get("//dat/b.wav", TagType::Skip).unwrap().comment, "noisy");
    }
}
