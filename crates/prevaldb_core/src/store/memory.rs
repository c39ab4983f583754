//! In-memory store, primarily for tests.

use super::{first_relevant_segment, RawEntries, SegmentSource, Store};
use crate::error::{EngineError, EngineResult};
use crate::journal::{self, CommittedEntries, JournalWriter, SegmentFactory, SegmentJournalWriter};
use crate::model::Model;
use crate::serializer::{CborSerializer, Serializer};
use crate::types::SequenceNumber;
use parking_lot::Mutex;
use prevaldb_storage::{InMemoryBackend, StorageBackend};
use std::collections::VecDeque;
use std::sync::Arc;

/// Store whose segments and snapshots live in process memory.
///
/// Same semantics as [`super::FileStore`], including segment rotation and
/// the committed-entry filter, but nothing survives the process. Cloned
/// backends share their buffers, so entries appended through a writer are
/// visible to later reads.
pub struct InMemoryStore<S: Serializer = CborSerializer> {
    serializer: Arc<S>,
    segments: Arc<Mutex<Vec<(SequenceNumber, InMemoryBackend)>>>,
    snapshots: Mutex<Vec<(SequenceNumber, Vec<u8>)>>,
    max_segment_entries: u64,
}

impl InMemoryStore<CborSerializer> {
    /// Creates an empty CBOR-encoded in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_serializer(CborSerializer::new())
    }
}

impl Default for InMemoryStore<CborSerializer> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Serializer> InMemoryStore<S> {
    /// Creates an empty in-memory store with an explicit serializer.
    pub fn with_serializer(serializer: S) -> Self {
        Self {
            serializer: Arc::new(serializer),
            segments: Arc::new(Mutex::new(Vec::new())),
            snapshots: Mutex::new(Vec::new()),
            max_segment_entries: u64::MAX,
        }
    }

    /// Caps the number of entries per segment, forcing rotation in tests.
    #[must_use]
    pub fn max_segment_entries(mut self, entries: u64) -> Self {
        self.max_segment_entries = entries;
        self
    }

    /// Number of segments created so far.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.lock().len()
    }

    /// Number of snapshots written so far.
    #[must_use]
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.lock().len()
    }
}

impl<S: Serializer, M: Model> Store<M> for InMemoryStore<S> {
    fn load(&self) -> EngineResult<()> {
        // Bookkeeping lives in memory already.
        Ok(())
    }

    fn create(&self, initial: &M) -> EngineResult<()> {
        if !self.segments.lock().is_empty() || !self.snapshots.lock().is_empty() {
            return Err(EngineError::configuration(
                "cannot create store: in-memory store is not empty",
            ));
        }
        self.write_snapshot(initial, SequenceNumber::ZERO)
    }

    fn verify_can_load(&self) -> EngineResult<()> {
        if self.snapshots.lock().is_empty() {
            return Err(EngineError::configuration(
                "initial snapshot is missing: the store was never created",
            ));
        }
        Ok(())
    }

    fn load_most_recent_snapshot(&self) -> EngineResult<(M, SequenceNumber)> {
        let snapshots = self.snapshots.lock();
        let (watermark, bytes) = snapshots.last().ok_or_else(|| {
            EngineError::configuration("no snapshot found; the store was never created")
        })?;
        let model = self.serializer.read(&mut bytes.as_slice())?;
        Ok((model, *watermark))
    }

    fn committed_entries_from(
        &self,
        from: SequenceNumber,
    ) -> EngineResult<CommittedEntries<'_, M::Command>> {
        journal::committed(|| {
            let segments = self.segments.lock();
            let starts: Vec<SequenceNumber> = segments.iter().map(|(start, _)| *start).collect();
            let first = first_relevant_segment(&starts, from);
            let sources: VecDeque<SegmentSource> = segments[first..]
                .iter()
                .map(|(start, backend)| {
                    let backend = backend.clone();
                    let open: Box<
                        dyn FnOnce() -> EngineResult<Box<dyn StorageBackend>> + Send,
                    > = Box::new(move || Ok(Box::new(backend) as Box<dyn StorageBackend>));
                    (format!("memory:{start}"), open)
                })
                .collect();
            Ok(RawEntries::new(self.serializer.as_ref(), sources, from))
        })
    }

    fn create_journal_writer(
        &self,
        first_entry: SequenceNumber,
    ) -> EngineResult<Box<dyn JournalWriter<M::Command>>> {
        let backend = InMemoryBackend::new();
        self.segments.lock().push((first_entry, backend.clone()));

        let segments = Arc::clone(&self.segments);
        let factory: SegmentFactory = Box::new(move |first_id| {
            let backend = InMemoryBackend::new();
            segments.lock().push((first_id, backend.clone()));
            Ok(Box::new(backend))
        });

        Ok(Box::new(SegmentJournalWriter::new(
            Arc::clone(&self.serializer),
            Box::new(backend),
            factory,
            false,
            self.max_segment_entries,
            u64::MAX,
        )))
    }

    fn write_snapshot(&self, model: &M, last_entry: SequenceNumber) -> EngineResult<()> {
        let mut bytes = Vec::new();
        self.serializer.write(model, &mut bytes)?;
        let mut snapshots = self.snapshots.lock();
        snapshots.push((last_entry, bytes));
        snapshots.sort_by_key(|(watermark, _)| *watermark);
        Ok(())
    }
}
