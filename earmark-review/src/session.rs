//! Review session: the single owner of the backing table
//!
//! The session lives on the primary task. Imports, decodes, spectrograms
//! and tag writes run elsewhere and report back as [`SessionMessage`]s; only
//! [`Session::handle`] applies them to the table. Every table mutation is
//! announced on the [`EventBus`].

use crate::decode::{CacheOutcome, DecodeCache, SymphoniaLoader, Track};
use crate::error::{Error, Result};
use crate::import::{spawn_import, spawn_phraselist, ImportContext, ImportOutcome, ImportPayload, ImportSource};
use crate::spectrogram::{LatestWins, Spectrogram, SpectrogramRequest, SpectrogramSettings, Submission};
use crate::tag_writer::{TagOutcome, TagWriter};
use earmark_common::config::ReviewConfig;
use earmark_common::events::{EventBus, ReviewEvent};
use earmark_common::time;
use earmark_table::{
    LineQuery, Normalizer, PathNormalizer, PathResolver, QueryEngine, RowRef, TableModel, TagFields,
    TagType,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

const EVENT_CAPACITY: usize = 1000;

/// Results posted back to the session by background work
#[derive(Debug)]
pub enum SessionMessage {
    Import(ImportOutcome),
    Tags(TagOutcome),
    Decoded {
        path: PathBuf,
        result: std::result::Result<(Arc<Track>, CacheOutcome), String>,
    },
    Spectrogram(Spectrogram),
}

impl From<ImportOutcome> for SessionMessage {
    fn from(outcome: ImportOutcome) -> Self {
        SessionMessage::Import(outcome)
    }
}

impl From<TagOutcome> for SessionMessage {
    fn from(outcome: TagOutcome) -> Self {
        SessionMessage::Tags(outcome)
    }
}

impl From<Spectrogram> for SessionMessage {
    fn from(spectrogram: Spectrogram) -> Self {
        SessionMessage::Spectrogram(spectrogram)
    }
}

/// A decoded track belonging to the current selection
#[derive(Debug, Clone)]
pub struct LoadedAudio {
    pub path: PathBuf,
    pub track: Arc<Track>,
    pub outcome: CacheOutcome,
}

pub struct Session {
    engine: QueryEngine,
    events: EventBus,
    tx: mpsc::UnboundedSender<SessionMessage>,
    rx: mpsc::UnboundedReceiver<SessionMessage>,
    ctx: ImportContext,
    tag_writer: TagWriter,
    tagger: String,
    tag_store: Option<PathBuf>,
    cache: Arc<DecodeCache<SymphoniaLoader>>,
    spectrograms: LatestWins<SpectrogramRequest, Spectrogram, SessionMessage>,
    spectrogram_generation: u64,
    pending_imports: usize,
    pending_tag_writes: usize,
    pending_decodes: usize,
    audio: Option<LoadedAudio>,
    spectrogram: Option<Spectrogram>,
}

impl Session {
    /// Build a session from configuration; must run inside a tokio runtime
    pub fn new(config: &ReviewConfig, resolver: Arc<dyn PathResolver>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let normalizer = Normalizer::new(PathNormalizer::new(
            config.paths.network_mount_alias.clone(),
            config.paths.home_prefix(),
        ));
        let ctx = ImportContext {
            resolver,
            normalizer,
            store_file_name: config.tags.store_file_name.clone(),
        };
        let engine = QueryEngine::new(TableModel::new()).with_page_size(config.table.page_size);

        Self {
            engine,
            events: EventBus::new(EVENT_CAPACITY),
            tag_writer: TagWriter::spawn(tx.clone()),
            spectrograms: LatestWins::new(SpectrogramRequest::compute, tx.clone()),
            tx,
            rx,
            ctx,
            tagger: config.tags.tagger(),
            tag_store: None,
            cache: Arc::new(DecodeCache::new(SymphoniaLoader, config.cache.capacity)),
            spectrogram_generation: 0,
            pending_imports: 0,
            pending_tag_writes: 0,
            pending_decodes: 0,
            audio: None,
            spectrogram: None,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn engine(&self) -> &QueryEngine {
        &self.engine
    }

    pub fn model(&self) -> &TableModel {
        self.engine.model()
    }

    /// Tag store that writes currently go to
    pub fn tag_store(&self) -> Option<&Path> {
        self.tag_store.as_deref()
    }

    pub fn decode_cache(&self) -> &DecodeCache<SymphoniaLoader> {
        &self.cache
    }

    /// Most recently decoded selection
    pub fn audio(&self) -> Option<&LoadedAudio> {
        self.audio.as_ref()
    }

    /// Most recently delivered spectrogram
    pub fn spectrogram(&self) -> Option<&Spectrogram> {
        self.spectrogram.as_ref()
    }

    /// True while any background work owes the session a message
    pub fn is_busy(&self) -> bool {
        self.pending_imports > 0
            || self.pending_tag_writes > 0
            || self.pending_decodes > 0
            || self.spectrograms.is_busy()
    }

    // --- imports ---

    /// Import `path` in the background, optionally forcing its interpretation
    pub fn import(&mut self, path: &Path, force: Option<&str>) -> ImportSource {
        let source = ImportSource::classify(path, force);
        self.pending_imports += 1;
        spawn_import(source.clone(), self.ctx.clone(), self.tx.clone());
        source
    }

    /// Merge a phraselist file into the table once parsed
    pub fn import_phraselist(&mut self, path: &Path) {
        self.pending_imports += 1;
        spawn_phraselist(path.to_path_buf(), self.ctx.clone(), self.tx.clone());
    }

    // --- queries ---

    /// Parse and apply a line query
    ///
    /// Malformed tokens and bad patterns never fail the call: each is
    /// announced as `QueryRejected` and the rest of the query still applies.
    /// Returns the rejection reasons.
    pub fn apply_query(&mut self, input: &str) -> Vec<String> {
        let query = LineQuery::parse(input);
        let mut rejected: Vec<String> = query.warnings().to_vec();

        if let Err(e) = self.engine.apply(&query) {
            warn!("Query '{}' partially applied: {}", input, e);
            rejected.push(e.to_string());
        }
        for reason in &rejected {
            self.events.emit_lossy(ReviewEvent::QueryRejected {
                input: input.to_string(),
                reason: reason.clone(),
                timestamp: time::now(),
            });
        }
        self.emit_layout();
        rejected
    }

    /// Drop all criteria and return to import order
    pub fn reset_query(&mut self) {
        self.engine.reset();
        self.emit_layout();
    }

    /// Expose up to `requested` more visible rows
    pub fn materialize_more(&mut self, requested: usize) -> usize {
        let first = self.model().materialized().len();
        let added = self.engine.model_mut().materialize_more(requested);
        if added > 0 {
            self.events.emit_lossy(ReviewEvent::RowsMaterialized {
                table_id: self.model().id().as_uuid(),
                first,
                last: first + added,
                timestamp: time::now(),
            });
        }
        added
    }

    /// Expose one configured page
    pub fn next_page(&mut self) -> usize {
        self.materialize_more(self.engine.page_size())
    }

    fn emit_layout(&self) {
        let model = self.model();
        self.events.emit_lossy(ReviewEvent::LayoutChanged {
            table_id: model.id().as_uuid(),
            visible: model.filter().visible_count(),
            timestamp: time::now(),
        });
        self.emit_materialized(0);
    }

    fn emit_materialized(&self, first: usize) {
        let model = self.model();
        let last = model.materialized().len();
        if last > first {
            self.events.emit_lossy(ReviewEvent::RowsMaterialized {
                table_id: model.id().as_uuid(),
                first,
                last,
                timestamp: time::now(),
            });
        }
    }

    // --- tagging ---

    /// Persist `tag_type` for the rows' `original` paths
    ///
    /// Rows are resynced only once the writer confirms the write. A row
    /// reference from another table is a hard error; nothing is queued.
    pub fn tag(&mut self, rows: &[RowRef], fields: TagFields, tag_type: TagType) -> Result<()> {
        let store = self.tag_store.clone().ok_or(Error::NoTagStore)?;
        let paths = self.tag_paths(rows)?;
        self.tag_writer
            .write(&store, paths, fields, tag_type, &self.tagger)?;
        self.pending_tag_writes += 1;
        Ok(())
    }

    /// Remove `tag_type` from the rows' `original` paths
    pub fn untag(&mut self, rows: &[RowRef], tag_type: TagType) -> Result<()> {
        let store = self.tag_store.clone().ok_or(Error::NoTagStore)?;
        let paths = self.tag_paths(rows)?;
        self.tag_writer.remove(&store, paths, tag_type)?;
        self.pending_tag_writes += 1;
        Ok(())
    }

    fn tag_paths(&self, rows: &[RowRef]) -> Result<Vec<String>> {
        let mut paths: Vec<String> = Vec::new();
        for row_ref in rows {
            let row = self.model().current_selection(row_ref)?;
            if !paths.contains(&row.original) {
                paths.push(row.original.clone());
            }
        }
        Ok(paths)
    }

    // --- audio ---

    /// Local path for a row's audio, via the resolver when it maps
    pub fn local_path(&self, row_ref: &RowRef) -> Result<PathBuf> {
        let row = self.model().current_selection(row_ref)?;
        let local = self
            .ctx
            .resolver
            .network_to_local(&row.filepath)
            .unwrap_or_else(|| {
                debug!("No local path for {}, using it as is", row.filepath);
                row.filepath.clone()
            });
        Ok(PathBuf::from(local))
    }

    /// Decode the row's audio in the background through the cache
    pub fn load_audio(&mut self, row_ref: &RowRef) -> Result<()> {
        let path = self.local_path(row_ref)?;
        let cache = Arc::clone(&self.cache);
        let tx = self.tx.clone();
        self.pending_decodes += 1;

        tokio::spawn(async move {
            let decode_path = path.clone();
            let result = tokio::task::spawn_blocking(move || cache.decode(&decode_path)).await;
            let result = match result {
                Ok(Ok(decoded)) => Ok(decoded),
                Ok(Err(e)) => Err(e.to_string()),
                Err(e) => Err(format!("decode task failed: {}", e)),
            };
            if tx.send(SessionMessage::Decoded { path, result }).is_err() {
                debug!("Decode result dropped, session gone");
            }
        });
        Ok(())
    }

    /// Always decode this row's audio fresh, or re-enable caching for it
    pub fn set_cache_bypass(&self, row_ref: &RowRef, bypass: bool) -> Result<()> {
        let path = self.local_path(row_ref)?;
        if bypass {
            self.cache.deny(&path);
        } else {
            self.cache.allow(&path);
        }
        Ok(())
    }

    /// Compute a spectrogram of the loaded audio; newer requests supersede
    /// any that have not started
    pub fn request_spectrogram(
        &mut self,
        centres: Vec<f64>,
        settings: SpectrogramSettings,
    ) -> Result<u64> {
        let audio = self
            .audio
            .as_ref()
            .ok_or_else(|| Error::Decode("no audio loaded".to_string()))?;
        self.spectrogram_generation += 1;
        let request = SpectrogramRequest {
            generation: self.spectrogram_generation,
            track: Arc::clone(&audio.track),
            centres,
            settings,
        };
        if self.spectrograms.submit(request) == Submission::Replaced {
            debug!("Spectrogram request replaced a pending one");
        }
        Ok(self.spectrogram_generation)
    }

    // --- message loop ---

    /// Wait for the next background message
    pub async fn next_message(&mut self) -> Option<SessionMessage> {
        self.rx.recv().await
    }

    /// Process messages until no background work is outstanding
    pub async fn settle(&mut self) {
        loop {
            // anything sent before idleness was observed is already queued
            let idle = !self.is_busy();
            while let Ok(message) = self.rx.try_recv() {
                self.handle(message);
            }
            if idle {
                break;
            }
            if !self.is_busy() {
                continue;
            }
            match self.rx.recv().await {
                Some(message) => self.handle(message),
                None => break,
            }
        }
    }

    /// Apply one background result to the table
    pub fn handle(&mut self, message: SessionMessage) {
        match message {
            SessionMessage::Import(outcome) => self.handle_import(outcome),
            SessionMessage::Tags(outcome) => self.handle_tags(outcome),
            SessionMessage::Decoded { path, result } => {
                self.pending_decodes = self.pending_decodes.saturating_sub(1);
                match result {
                    Ok((track, outcome)) => {
                        debug!("Decoded {} ({:?})", path.display(), outcome);
                        self.audio = Some(LoadedAudio {
                            path,
                            track,
                            outcome,
                        });
                    }
                    Err(reason) => error!("Failed to decode {}: {}", path.display(), reason),
                }
            }
            SessionMessage::Spectrogram(spectrogram) => {
                if spectrogram.generation == self.spectrogram_generation {
                    self.spectrogram = Some(spectrogram);
                } else {
                    debug!("Discarding stale spectrogram {}", spectrogram.generation);
                }
            }
        }
    }

    fn handle_import(&mut self, outcome: ImportOutcome) {
        match outcome {
            ImportOutcome::Rows { path, payload } => match payload {
                ImportPayload::Replace { rows, source } => {
                    let page_size = self.engine.page_size();
                    let model = self.engine.model_mut();
                    model.load_table(rows, source);
                    model.materialize_more(page_size);
                    let model = self.model();
                    info!("Loaded {} rows from {}", model.len(), path.display());
                    self.events.emit_lossy(ReviewEvent::TableReset {
                        table_id: model.id().as_uuid(),
                        row_count: model.len(),
                        timestamp: time::now(),
                    });
                    self.emit_materialized(0);
                }
                ImportPayload::Append { rows, source } => {
                    let range = self.engine.model_mut().append_rows(rows, source);
                    if !range.is_empty() {
                        self.events.emit_lossy(ReviewEvent::RowsAppended {
                            table_id: self.model().id().as_uuid(),
                            first: range.start,
                            last: range.end,
                            timestamp: time::now(),
                        });
                    }
                }
            },
            ImportOutcome::Tags {
                path,
                store,
                result,
            } => {
                self.pending_imports = self.pending_imports.saturating_sub(1);
                match result {
                    Ok(tags) => {
                        let changed = self.engine.model_mut().merge_tags(tags);
                        self.emit_rows_changed(changed);
                        self.tag_store = Some(store);
                    }
                    Err(reason) => {
                        error!("Tag store {} unusable: {}", store.display(), reason);
                        self.tag_store = None;
                    }
                }
                self.emit_import_finished(path);
            }
            ImportOutcome::Phraselist { path, result } => {
                self.pending_imports = self.pending_imports.saturating_sub(1);
                match result {
                    Ok(phraselist) => {
                        let merge = self.engine.model_mut().merge_phraselist(&phraselist);
                        info!(
                            "Phraselist {} updated {} rows and added {}",
                            path.display(),
                            merge.updated.len(),
                            merge.appended.len()
                        );
                        self.emit_rows_changed(merge.updated);
                        if !merge.appended.is_empty() {
                            self.events.emit_lossy(ReviewEvent::RowsAppended {
                                table_id: self.model().id().as_uuid(),
                                first: merge.appended.start,
                                last: merge.appended.end,
                                timestamp: time::now(),
                            });
                        }
                    }
                    Err(reason) => error!("Failed to read phraselist {}: {}", path.display(), reason),
                }
                self.emit_import_finished(path);
            }
            ImportOutcome::Failed { path, reason } => {
                self.pending_imports = self.pending_imports.saturating_sub(1);
                error!("Import of {} failed: {}", path.display(), reason);
                self.emit_import_finished(path);
            }
        }
    }

    fn handle_tags(&mut self, outcome: TagOutcome) {
        self.pending_tag_writes = self.pending_tag_writes.saturating_sub(1);
        let changed = match outcome {
            TagOutcome::Written { entries, .. } => self.engine.model_mut().record_tags(entries),
            TagOutcome::Removed {
                paths, tag_type, ..
            } => self.engine.model_mut().forget_tags(&paths, tag_type),
            TagOutcome::Failed { store, reason } => {
                self.events.emit_lossy(ReviewEvent::TagWriteFailed {
                    store,
                    reason,
                    timestamp: time::now(),
                });
                return;
            }
        };
        let positions = changed
            .iter()
            .filter_map(|row_ref| self.model().position(row_ref).ok())
            .collect();
        self.emit_rows_changed(positions);
    }

    fn emit_rows_changed(&self, rows: Vec<usize>) {
        if rows.is_empty() {
            return;
        }
        self.events.emit_lossy(ReviewEvent::RowsChanged {
            table_id: self.model().id().as_uuid(),
            rows,
            timestamp: time::now(),
        });
    }

    fn emit_import_finished(&self, path: PathBuf) {
        self.events.emit_lossy(ReviewEvent::ImportFinished {
            path,
            rows: self.model().len(),
            timestamp: time::now(),
        });
    }

    /// Stop background workers after draining queued tag writes
    pub async fn shutdown(mut self) {
        self.settle().await;
        self.tag_writer.shutdown().await;
    }
}
