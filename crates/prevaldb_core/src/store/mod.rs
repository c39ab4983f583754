//! Durable storage of snapshots and journal segments.
//!
//! A store owns the layout of a database location: ordered journal
//! segments, snapshot files, and the rules for recovering both from a
//! directory listing. The engine talks to it through the [`Store`] trait;
//! [`FileStore`] is the production implementation, [`InMemoryStore`]
//! backs tests.

mod file;
mod memory;
mod names;

pub use file::FileStore;
pub use memory::InMemoryStore;
pub use names::{JournalFileName, SnapshotFileName, JOURNAL_EXTENSION, SNAPSHOT_EXTENSION};

use crate::error::{EngineError, EngineResult};
use crate::journal::{CommittedEntries, JournalEntry, JournalWriter};
use crate::model::Model;
use crate::serializer::{Serializer, ValueSequence};
use crate::types::SequenceNumber;
use prevaldb_storage::{BackendReader, StorageBackend};
use serde::de::DeserializeOwned;
use std::collections::VecDeque;

/// Storage provider for one database location.
///
/// A valid store always contains at least the initial snapshot (watermark
/// zero); recovery is "load the most recent snapshot, then replay the
/// committed entries after its watermark".
pub trait Store<M: Model>: Send + Sync {
    /// Loads the store's bookkeeping from existing storage.
    ///
    /// # Errors
    ///
    /// Fails when the location cannot be listed or contains files that do
    /// not parse as segment or snapshot names.
    fn load(&self) -> EngineResult<()>;

    /// Initializes empty storage with the initial snapshot of `initial`.
    ///
    /// # Errors
    ///
    /// Fails without writing anything when the location already holds
    /// data.
    fn create(&self, initial: &M) -> EngineResult<()>;

    /// Checks that an existing store can be loaded.
    ///
    /// # Errors
    ///
    /// Returns a single [`EngineError::Configuration`] aggregating every
    /// violation found, so a misconfigured deployment surfaces all its
    /// problems at once.
    fn verify_can_load(&self) -> EngineResult<()>;

    /// Loads the most recent snapshot and returns it with its watermark.
    fn load_most_recent_snapshot(&self) -> EngineResult<(M, SequenceNumber)>;

    /// Streams the committed command entries with id greater than or equal
    /// to `from`, rollback spans already filtered out.
    fn committed_entries_from(
        &self,
        from: SequenceNumber,
    ) -> EngineResult<CommittedEntries<'_, M::Command>>;

    /// Opens a journal writer whose first appended entry will carry the
    /// given id.
    fn create_journal_writer(
        &self,
        first_entry: SequenceNumber,
    ) -> EngineResult<Box<dyn JournalWriter<M::Command>>>;

    /// Writes a snapshot of `model` at watermark `last_entry`.
    ///
    /// The snapshot becomes visible atomically; a crash mid-write leaves
    /// no partial snapshot behind.
    fn write_snapshot(&self, model: &M, last_entry: SequenceNumber) -> EngineResult<()>;
}

/// Index of the first segment that can contain entry `from`.
///
/// That is the last segment starting at or before `from`; earlier
/// segments hold only lower ids and are skipped entirely.
pub(crate) fn first_relevant_segment(starts: &[SequenceNumber], from: SequenceNumber) -> usize {
    starts.iter().rposition(|&start| start <= from).unwrap_or(0)
}

/// Deferred open of one journal segment, labelled for error reporting.
pub(crate) type SegmentSource = (
    String,
    Box<dyn FnOnce() -> EngineResult<Box<dyn StorageBackend>> + Send>,
);

/// Streams raw journal entries across a chain of segments.
///
/// Segments are opened lazily in order; entries with id below `from` are
/// skipped. A decode failure is reported as journal corruption naming the
/// offending segment.
pub(crate) struct RawEntries<'a, S: Serializer, C> {
    serializer: &'a S,
    sources: VecDeque<SegmentSource>,
    from: SequenceNumber,
    current: Option<(String, ValueSequence<'a, S, BackendReader, JournalEntry<C>>)>,
}

impl<'a, S: Serializer, C> RawEntries<'a, S, C> {
    pub(crate) fn new(
        serializer: &'a S,
        sources: VecDeque<SegmentSource>,
        from: SequenceNumber,
    ) -> Self {
        Self {
            serializer,
            sources,
            from,
            current: None,
        }
    }
}

impl<S, C> Iterator for RawEntries<'_, S, C>
where
    S: Serializer,
    C: DeserializeOwned,
{
    type Item = EngineResult<JournalEntry<C>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((label, sequence)) = &mut self.current {
                match sequence.next() {
                    Some(Ok(entry)) => {
                        if entry.id < self.from {
                            continue;
                        }
                        return Some(Ok(entry));
                    }
                    Some(Err(EngineError::Serialization { message })) => {
                        return Some(Err(EngineError::journal_corruption(format!(
                            "undecodable entry in segment {label}: {message}"
                        ))));
                    }
                    Some(Err(e)) => return Some(Err(e)),
                    None => self.current = None,
                }
            } else {
                let (label, open) = self.sources.pop_front()?;
                let backend = match open() {
                    Ok(backend) => backend,
                    Err(e) => return Some(Err(e)),
                };
                let sequence = self.serializer.read_sequence(BackendReader::new(backend));
                self.current = Some((label, sequence));
            }
        }
    }
}
