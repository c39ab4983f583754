//! File-backed store: journal segments and snapshots in a directory.

use super::names::{JournalFileName, SnapshotFileName, JOURNAL_EXTENSION, SNAPSHOT_EXTENSION};
use super::{first_relevant_segment, RawEntries, SegmentSource, Store};
use crate::config::{EngineConfig, JournalMode};
use crate::error::{EngineError, EngineResult};
use crate::journal::{
    self, AsyncJournalWriter, CommittedEntries, JournalWriter, SegmentFactory,
    SegmentJournalWriter,
};
use crate::model::Model;
use crate::serializer::{CborSerializer, Serializer};
use crate::types::SequenceNumber;
use parking_lot::Mutex;
use prevaldb_storage::{FileBackend, StorageBackend};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Store over a directory of journal segments and snapshot files.
///
/// Bookkeeping (the ordered segment and snapshot lists) is rebuilt from
/// the directory listing on [`Store::load`]; nothing but the file names
/// themselves records it.
pub struct FileStore<S: Serializer = CborSerializer> {
    config: EngineConfig,
    serializer: Arc<S>,
    segments: Arc<Mutex<Vec<JournalFileName>>>,
    snapshots: Mutex<Vec<SnapshotFileName>>,
}

impl FileStore<CborSerializer> {
    /// Creates a CBOR-encoded file store for the given configuration.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self::with_serializer(config, CborSerializer::new())
    }
}

impl<S: Serializer> FileStore<S> {
    /// Creates a file store with an explicit serializer.
    pub fn with_serializer(config: EngineConfig, serializer: S) -> Self {
        Self {
            config,
            serializer: Arc::new(serializer),
            segments: Arc::new(Mutex::new(Vec::new())),
            snapshots: Mutex::new(Vec::new()),
        }
    }

    /// The configuration this store was created with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn scan_segments(&self) -> EngineResult<Vec<JournalFileName>> {
        let mut segments = Vec::new();
        for entry in fs::read_dir(&self.config.location)? {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.ends_with(JOURNAL_EXTENSION) {
                continue;
            }
            let parsed = JournalFileName::parse(name).ok_or_else(|| {
                EngineError::configuration(format!("unparseable journal file name: {name}"))
            })?;
            segments.push(parsed);
        }
        segments.sort_by_key(|segment| segment.file_sequence);
        Ok(segments)
    }

    fn scan_snapshots(&self) -> EngineResult<Vec<SnapshotFileName>> {
        let mut snapshots = Vec::new();
        for entry in fs::read_dir(self.config.effective_snapshot_location())? {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.ends_with(SNAPSHOT_EXTENSION) {
                continue;
            }
            let parsed = SnapshotFileName::parse(name).ok_or_else(|| {
                EngineError::configuration(format!("unparseable snapshot file name: {name}"))
            })?;
            snapshots.push(parsed);
        }
        snapshots.sort_by_key(|snapshot| snapshot.last_sequence);
        Ok(snapshots)
    }
}

/// Fsyncs a directory so renames within it are durable.
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    fs::File::open(dir)?.sync_all()?;
    #[cfg(not(unix))]
    let _ = dir;
    Ok(())
}

/// Opens the next journal segment and registers it in the segment list.
fn open_segment(
    dir: &Path,
    segments: &Mutex<Vec<JournalFileName>>,
    first_entry: SequenceNumber,
) -> EngineResult<Box<dyn StorageBackend>> {
    let mut segments = segments.lock();
    let next = segments
        .last()
        .copied()
        .unwrap_or(JournalFileName::new(0, SequenceNumber::ZERO))
        .successor(first_entry);
    let backend = FileBackend::open(&dir.join(next.name()))?;
    segments.push(next);
    debug!(segment = %next.name(), "opened journal segment");
    Ok(Box::new(backend))
}

impl<S: Serializer, M: Model> Store<M> for FileStore<S> {
    fn load(&self) -> EngineResult<()> {
        let segments = self.scan_segments()?;
        let snapshots = self.scan_snapshots()?;
        info!(
            location = %self.config.location.display(),
            segments = segments.len(),
            snapshots = snapshots.len(),
            "loaded store"
        );
        *self.segments.lock() = segments;
        *self.snapshots.lock() = snapshots;
        Ok(())
    }

    fn create(&self, initial: &M) -> EngineResult<()> {
        for dir in [
            Some(self.config.location.as_path()),
            self.config.snapshot_location.as_deref(),
        ]
        .into_iter()
        .flatten()
        {
            if dir.exists() && fs::read_dir(dir)?.next().is_some() {
                return Err(EngineError::configuration(format!(
                    "cannot create store: {} is not empty",
                    dir.display()
                )));
            }
        }

        fs::create_dir_all(&self.config.location)?;
        if let Some(snapshot_dir) = &self.config.snapshot_location {
            fs::create_dir_all(snapshot_dir)?;
        }

        self.segments.lock().clear();
        self.snapshots.lock().clear();
        self.write_snapshot(initial, SequenceNumber::ZERO)?;
        info!(location = %self.config.location.display(), "created store");
        Ok(())
    }

    fn verify_can_load(&self) -> EngineResult<()> {
        let mut violations = Vec::new();

        if !self.config.location.is_dir() {
            violations.push(format!(
                "store location {} does not exist",
                self.config.location.display()
            ));
        }
        if let Some(snapshot_dir) = &self.config.snapshot_location {
            if !snapshot_dir.is_dir() {
                violations.push(format!(
                    "snapshot location {} does not exist",
                    snapshot_dir.display()
                ));
            }
        }
        let initial = self
            .config
            .effective_snapshot_location()
            .join(SnapshotFileName::INITIAL.name());
        if !initial.is_file() {
            violations.push(format!(
                "initial snapshot {} is missing",
                initial.display()
            ));
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(EngineError::configuration(violations.join("; ")))
        }
    }

    fn load_most_recent_snapshot(&self) -> EngineResult<(M, SequenceNumber)> {
        let snapshot = self.snapshots.lock().last().copied().ok_or_else(|| {
            EngineError::configuration("no snapshot found; the store was never created")
        })?;
        let path = self
            .config
            .effective_snapshot_location()
            .join(snapshot.name());
        let mut file = fs::File::open(path)?;
        let model = self.serializer.read(&mut file)?;
        debug!(watermark = %snapshot.last_sequence, "loaded snapshot");
        Ok((model, snapshot.last_sequence))
    }

    fn committed_entries_from(
        &self,
        from: SequenceNumber,
    ) -> EngineResult<CommittedEntries<'_, M::Command>> {
        journal::committed(|| {
            let segments = self.segments.lock();
            let starts: Vec<SequenceNumber> =
                segments.iter().map(|s| s.starting_sequence).collect();
            let first = first_relevant_segment(&starts, from);
            let sources: VecDeque<SegmentSource> = segments[first..]
                .iter()
                .map(|segment| {
                    let name = segment.name();
                    let path = self.config.location.join(&name);
                    let open: Box<
                        dyn FnOnce() -> EngineResult<Box<dyn StorageBackend>> + Send,
                    > = Box::new(move || {
                        Ok(Box::new(FileBackend::open(&path)?) as Box<dyn StorageBackend>)
                    });
                    (name, open)
                })
                .collect();
            Ok(RawEntries::new(self.serializer.as_ref(), sources, from))
        })
    }

    fn create_journal_writer(
        &self,
        first_entry: SequenceNumber,
    ) -> EngineResult<Box<dyn JournalWriter<M::Command>>> {
        let backend = open_segment(&self.config.location, &self.segments, first_entry)?;

        let dir = self.config.location.clone();
        let segments = Arc::clone(&self.segments);
        let factory: SegmentFactory =
            Box::new(move |first_id| open_segment(&dir, &segments, first_id));

        let writer: Box<dyn JournalWriter<M::Command>> =
            Box::new(SegmentJournalWriter::new(
                Arc::clone(&self.serializer),
                backend,
                factory,
                self.config.sync_on_append,
                self.config.max_segment_entries,
                self.config.max_segment_bytes,
            ));

        match self.config.journal {
            JournalMode::Synchronous => Ok(writer),
            JournalMode::Asynchronous => Ok(Box::new(AsyncJournalWriter::new(writer)?)),
        }
    }

    fn write_snapshot(&self, model: &M, last_entry: SequenceNumber) -> EngineResult<()> {
        let snapshot = SnapshotFileName::new(last_entry);
        let dir = self.config.effective_snapshot_location();
        let final_path = dir.join(snapshot.name());
        let temp_path = dir.join(format!("{}.tmp", snapshot.name()));

        // Write to a temp file, fsync, then rename into place so a crash
        // mid-write never leaves a readable partial snapshot.
        let mut file = fs::File::create(&temp_path)?;
        self.serializer.write(model, &mut file)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&temp_path, &final_path)?;
        sync_dir(dir)?;

        let mut snapshots = self.snapshots.lock();
        snapshots.push(snapshot);
        snapshots.sort_by_key(|s| s.last_sequence);
        snapshots.dedup();

        info!(watermark = %last_entry, "wrote snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::JournalEntry;
    use crate::testing::{CounterCommand, CounterModel};
    use tempfile::tempdir;

    fn committed_ids(store: &dyn Store<CounterModel>, from: u64) -> Vec<u64> {
        store
            .committed_entries_from(SequenceNumber::new(from))
            .unwrap()
            .map(|e| e.unwrap().id.as_u64())
            .collect()
    }

    fn append_commands(
        writer: &mut dyn JournalWriter<CounterCommand>,
        ids: impl IntoIterator<Item = u64>,
    ) {
        for id in ids {
            writer
                .append(JournalEntry::command(
                    SequenceNumber::new(id),
                    CounterCommand::Add(id),
                ))
                .unwrap();
        }
    }

    #[test]
    fn create_writes_initial_snapshot() {
        let dir = tempdir().unwrap();
        let location = dir.path().join("db");
        let store = FileStore::new(EngineConfig::new(&location));
        let s: &dyn Store<CounterModel> = &store;

        s.create(&CounterModel::default()).unwrap();

        assert!(location.join("000000000.snapshot").is_file());
        s.verify_can_load().unwrap();
        let (model, watermark) = s.load_most_recent_snapshot().unwrap();
        assert_eq!(model, CounterModel::default());
        assert_eq!(watermark, SequenceNumber::ZERO);
    }

    #[test]
    fn create_on_non_empty_location_fails_without_writing() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("stray.txt"), b"x").unwrap();

        let store = FileStore::new(EngineConfig::new(dir.path()));
        let s: &dyn Store<CounterModel> = &store;

        let result = s.create(&CounterModel::default());
        assert!(matches!(result, Err(EngineError::Configuration { .. })));

        // Nothing was written besides the pre-existing file.
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn verify_can_load_aggregates_violations() {
        let dir = tempdir().unwrap();
        let config = EngineConfig::new(dir.path().join("missing"))
            .snapshot_location(dir.path().join("also-missing"));
        let store = FileStore::new(config);
        let s: &dyn Store<CounterModel> = &store;

        let Err(EngineError::Configuration { message }) = s.verify_can_load() else {
            panic!("expected a configuration error");
        };
        assert!(message.contains("store location"));
        assert!(message.contains("snapshot location"));
        assert!(message.contains("initial snapshot"));
    }

    #[test]
    fn verify_can_load_reports_missing_initial_snapshot() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(EngineConfig::new(dir.path()));
        let s: &dyn Store<CounterModel> = &store;

        let Err(EngineError::Configuration { message }) = s.verify_can_load() else {
            panic!("expected a configuration error");
        };
        assert!(message.contains("000000000.snapshot"));
    }

    #[test]
    fn snapshot_round_trip_through_reload() {
        let dir = tempdir().unwrap();
        let config = EngineConfig::new(dir.path().join("db"));
        let store = FileStore::new(config.clone());
        let s: &dyn Store<CounterModel> = &store;
        s.create(&CounterModel::default()).unwrap();

        let model = CounterModel {
            value: 7,
            history: vec![3, 4],
        };
        s.write_snapshot(&model, SequenceNumber::new(5)).unwrap();

        let reloaded = FileStore::new(config);
        let r: &dyn Store<CounterModel> = &reloaded;
        r.load().unwrap();
        let (restored, watermark) = r.load_most_recent_snapshot().unwrap();
        assert_eq!(restored, model);
        assert_eq!(watermark, SequenceNumber::new(5));
    }

    #[test]
    fn alternate_snapshot_location_is_used() {
        let dir = tempdir().unwrap();
        let config = EngineConfig::new(dir.path().join("journal"))
            .snapshot_location(dir.path().join("snapshots"));
        let store = FileStore::new(config);
        let s: &dyn Store<CounterModel> = &store;

        s.create(&CounterModel::default()).unwrap();

        assert!(dir.path().join("snapshots/000000000.snapshot").is_file());
        assert!(!dir.path().join("journal/000000000.snapshot").exists());
        s.verify_can_load().unwrap();
    }

    #[test]
    fn recovery_spans_multiple_segments() {
        let dir = tempdir().unwrap();
        let config = EngineConfig::new(dir.path().join("db"))
            .max_segment_entries(2)
            .sync_on_append(false);
        let store = FileStore::new(config.clone());
        let s: &dyn Store<CounterModel> = &store;
        s.create(&CounterModel::default()).unwrap();

        let mut writer = s.create_journal_writer(SequenceNumber::new(1)).unwrap();
        append_commands(writer.as_mut(), 1..=5);
        writer.close().unwrap();

        // Entries [1,2], [3,4], [5] across three segments.
        let segments = std::fs::read_dir(dir.path().join("db"))
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .ends_with(JOURNAL_EXTENSION)
            })
            .count();
        assert_eq!(segments, 3);

        let reloaded = FileStore::new(config);
        let r: &dyn Store<CounterModel> = &reloaded;
        r.load().unwrap();
        assert_eq!(committed_ids(r, 1), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn rolled_back_entries_are_filtered_after_reload() {
        let dir = tempdir().unwrap();
        let config = EngineConfig::new(dir.path().join("db")).sync_on_append(false);
        let store = FileStore::new(config.clone());
        let s: &dyn Store<CounterModel> = &store;
        s.create(&CounterModel::default()).unwrap();

        let mut writer = s.create_journal_writer(SequenceNumber::new(1)).unwrap();
        append_commands(writer.as_mut(), [1, 2]);
        writer
            .append(JournalEntry::rollback(SequenceNumber::new(2)))
            .unwrap();
        append_commands(writer.as_mut(), [3]);
        writer.close().unwrap();

        let reloaded = FileStore::new(config);
        let r: &dyn Store<CounterModel> = &reloaded;
        r.load().unwrap();

        let committed = r.committed_entries_from(SequenceNumber::new(1)).unwrap();
        assert_eq!(committed.last_sequence(), SequenceNumber::new(3));
        let ids: Vec<u64> = committed.map(|e| e.unwrap().id.as_u64()).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn committed_entries_respect_requested_start() {
        let dir = tempdir().unwrap();
        let config = EngineConfig::new(dir.path().join("db"))
            .max_segment_entries(2)
            .sync_on_append(false);
        let store = FileStore::new(config);
        let s: &dyn Store<CounterModel> = &store;
        s.create(&CounterModel::default()).unwrap();

        let mut writer = s.create_journal_writer(SequenceNumber::new(1)).unwrap();
        append_commands(writer.as_mut(), 1..=5);
        writer.close().unwrap();

        assert_eq!(committed_ids(s, 3), vec![3, 4, 5]);
        assert_eq!(committed_ids(s, 6), Vec::<u64>::new());
    }

    #[test]
    fn load_rejects_unparseable_journal_names() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("bogus.journal"), b"").unwrap();

        let store = FileStore::new(EngineConfig::new(dir.path()));
        let s: &dyn Store<CounterModel> = &store;
        assert!(matches!(
            s.load(),
            Err(EngineError::Configuration { .. })
        ));
    }

    #[test]
    fn truncated_segment_surfaces_as_corruption() {
        let dir = tempdir().unwrap();
        let config = EngineConfig::new(dir.path().join("db")).sync_on_append(false);
        let store = FileStore::new(config.clone());
        let s: &dyn Store<CounterModel> = &store;
        s.create(&CounterModel::default()).unwrap();

        let mut writer = s.create_journal_writer(SequenceNumber::new(1)).unwrap();
        append_commands(writer.as_mut(), [1]);
        writer.close().unwrap();

        // Chop the tail off the only segment.
        let path = dir.path().join("db").join(
            JournalFileName::new(1, SequenceNumber::new(1)).name(),
        );
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 1]).unwrap();

        let reloaded = FileStore::new(config);
        let r: &dyn Store<CounterModel> = &reloaded;
        r.load().unwrap();
        assert!(matches!(
            r.committed_entries_from(SequenceNumber::new(1)),
            Err(EngineError::JournalCorruption { .. })
        ));
    }
}
