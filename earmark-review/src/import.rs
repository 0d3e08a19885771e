//! Background import of directories, database files and single entries
//!
//! An import runs as one tokio task. Parsing and scanning happen on the
//! blocking pool; the result travels back to the session as plain data,
//! followed by the tag store found beside the imported data. The tag store
//! is read only after the rows have been sent, so it always joins onto a
//! settled listing.

use crate::scanner::FileScanner;
use crate::tag_store::{load_tag_store, store_path_for};
use earmark_table::parsers::{listing_records, parse_database_file, parse_phraselist_file};
use earmark_table::{Normalizer, PathResolver, Phraselist, RecordSet, Row, TagStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Suffixes treated as database files
pub const DATABASE_SUFFIXES: [&str; 4] = ["db", "alignments", "tas", "errors"];

/// What an input path is imported as
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportSource {
    /// Every audio file below the directory, appended
    Directory(PathBuf),
    /// A `key = value` database replacing the table
    Database(PathBuf),
    /// One audio file, appended
    Entry(PathBuf),
}

impl ImportSource {
    /// Classify `path`, honouring a forced interpretation
    ///
    /// `force` accepts `database` and `audio`; anything else is logged and
    /// ignored.
    pub fn classify(path: &Path, force: Option<&str>) -> Self {
        match force {
            Some("database") => return ImportSource::Database(path.to_path_buf()),
            Some("audio") => return ImportSource::Entry(path.to_path_buf()),
            Some(other) => warn!("Unknown import override '{}', classifying normally", other),
            None => {}
        }

        if path.is_dir() {
            return ImportSource::Directory(path.to_path_buf());
        }
        let is_database = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| DATABASE_SUFFIXES.contains(&ext))
            .unwrap_or(false)
            || path.file_name().and_then(|n| n.to_str()) == Some("forced");
        if is_database {
            ImportSource::Database(path.to_path_buf())
        } else {
            ImportSource::Entry(path.to_path_buf())
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            ImportSource::Directory(p) | ImportSource::Database(p) | ImportSource::Entry(p) => p,
        }
    }

    /// Directory whose tag store applies to this import
    pub fn data_dir(&self) -> PathBuf {
        match self {
            ImportSource::Directory(dir) => dir.clone(),
            ImportSource::Database(p) | ImportSource::Entry(p) => p
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        }
    }
}

/// Rows produced by an import
#[derive(Debug, Clone)]
pub enum ImportPayload {
    /// Replace the table wholesale
    Replace { rows: Vec<Row>, source: RecordSet },
    /// Extend the table
    Append { rows: Vec<Row>, source: RecordSet },
}

impl ImportPayload {
    pub fn len(&self) -> usize {
        match self {
            ImportPayload::Replace { rows, .. } | ImportPayload::Append { rows, .. } => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Messages an import posts back, in this order
#[derive(Debug, Clone)]
pub enum ImportOutcome {
    Rows {
        path: PathBuf,
        payload: ImportPayload,
    },
    Tags {
        path: PathBuf,
        store: PathBuf,
        result: Result<TagStore, String>,
    },
    Phraselist {
        path: PathBuf,
        result: Result<Phraselist, String>,
    },
    Failed {
        path: PathBuf,
        reason: String,
    },
}

/// Everything an import needs, shared across imports
#[derive(Clone)]
pub struct ImportContext {
    pub resolver: Arc<dyn PathResolver>,
    pub normalizer: Normalizer,
    pub store_file_name: String,
}

/// Start importing `source`; outcomes arrive on `reply`
pub fn spawn_import<M>(
    source: ImportSource,
    ctx: ImportContext,
    reply: mpsc::UnboundedSender<M>,
) -> JoinHandle<()>
where
    M: From<ImportOutcome> + Send + 'static,
{
    tokio::spawn(async move {
        let path = source.path().to_path_buf();
        info!("Importing {} as {:?}", path.display(), kind(&source));

        let parse_ctx = ctx.clone();
        let parse_source = source.clone();
        let parsed = tokio::task::spawn_blocking(move || build_payload(&parse_source, &parse_ctx)).await;

        let payload = match parsed {
            Ok(Ok(payload)) => payload,
            Ok(Err(reason)) => {
                send(&reply, ImportOutcome::Failed { path, reason });
                return;
            }
            Err(e) => {
                send(
                    &reply,
                    ImportOutcome::Failed {
                        path,
                        reason: format!("import task failed: {}", e),
                    },
                );
                return;
            }
        };
        send(
            &reply,
            ImportOutcome::Rows {
                path: path.clone(),
                payload,
            },
        );

        let store = store_path_for(&source.data_dir(), &ctx.store_file_name);
        let result = load_tag_store(&store, ctx.normalizer.path_normalizer())
            .await
            .map_err(|e| e.to_string());
        send(&reply, ImportOutcome::Tags { path, store, result });
    })
}

/// Parse a phraselist off the primary task
pub fn spawn_phraselist<M>(
    path: PathBuf,
    ctx: ImportContext,
    reply: mpsc::UnboundedSender<M>,
) -> JoinHandle<()>
where
    M: From<ImportOutcome> + Send + 'static,
{
    tokio::spawn(async move {
        let parse_path = path.clone();
        let parsed = tokio::task::spawn_blocking(move || {
            parse_phraselist_file(&parse_path, ctx.normalizer.path_normalizer())
        })
        .await;
        let result = match parsed {
            Ok(Ok(phraselist)) => Ok(phraselist),
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) => Err(format!("phraselist task failed: {}", e)),
        };
        send(&reply, ImportOutcome::Phraselist { path, result });
    })
}

fn send<M: From<ImportOutcome>>(reply: &mpsc::UnboundedSender<M>, outcome: ImportOutcome) {
    if reply.send(M::from(outcome)).is_err() {
        debug!("Import outcome dropped, session gone");
    }
}

fn kind(source: &ImportSource) -> &'static str {
    match source {
        ImportSource::Directory(_) => "directory",
        ImportSource::Database(_) => "database",
        ImportSource::Entry(_) => "entry",
    }
}

fn build_payload(source: &ImportSource, ctx: &ImportContext) -> Result<ImportPayload, String> {
    let start = Instant::now();
    let payload = match source {
        ImportSource::Database(path) => {
            let records =
                parse_database_file(path, ctx.resolver.as_ref()).map_err(|e| e.to_string())?;
            let rows = ctx.normalizer.normalize(&records, true);
            ImportPayload::Replace {
                rows,
                source: records,
            }
        }
        ImportSource::Directory(dir) => {
            let files = FileScanner::new().scan(dir).map_err(|e| e.to_string())?;
            listing_payload(files.iter().map(|p| p.to_string_lossy()), ctx)
        }
        ImportSource::Entry(path) => {
            if !path.is_file() {
                return Err(format!("No such file: {}", path.display()));
            }
            listing_payload([path.to_string_lossy()], ctx)
        }
    };
    info!(
        "Import of {} produced {} rows in {:.3} seconds",
        source.path().display(),
        payload.len(),
        start.elapsed().as_secs_f64()
    );
    Ok(payload)
}

fn listing_payload<I, S>(files: I, ctx: &ImportContext) -> ImportPayload
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let records = listing_records(files, ctx.resolver.as_ref());
    let rows = ctx.normalizer.normalize(&records, false);
    ImportPayload::Append {
        rows,
        source: records,
    }
}
