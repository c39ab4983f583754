//! Synchronous segment journal writer.

use super::{JournalEntry, JournalWriter};
use crate::error::EngineResult;
use crate::serializer::Serializer;
use crate::types::SequenceNumber;
use prevaldb_storage::StorageBackend;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Opens a fresh segment whose first entry will carry the given id.
///
/// The store supplies this; besides opening the backing file it registers
/// the new segment so recovery can find it.
pub type SegmentFactory =
    Box<dyn FnMut(SequenceNumber) -> EngineResult<Box<dyn StorageBackend>> + Send>;

/// Journal writer that serializes entries into rotating segment files.
///
/// `append` serializes the entry, writes it to the current segment, and
/// (by default) fsyncs before returning - an append never reports success
/// ahead of durability. When the current segment reaches the configured
/// entry or byte limit, the writer syncs it and asks the segment factory
/// for a successor; the new segment's starting sequence number is the id
/// of the entry that triggered the rollover.
pub struct SegmentJournalWriter<C, S: Serializer> {
    serializer: Arc<S>,
    backend: Box<dyn StorageBackend>,
    factory: SegmentFactory,
    sync_on_append: bool,
    max_entries: u64,
    max_bytes: u64,
    entries_in_segment: u64,
    bytes_in_segment: u64,
    _commands: PhantomData<fn(C)>,
}

impl<C, S: Serializer> SegmentJournalWriter<C, S> {
    /// Creates a writer over an already-open segment.
    pub fn new(
        serializer: Arc<S>,
        backend: Box<dyn StorageBackend>,
        factory: SegmentFactory,
        sync_on_append: bool,
        max_entries: u64,
        max_bytes: u64,
    ) -> Self {
        Self {
            serializer,
            backend,
            factory,
            sync_on_append,
            max_entries,
            max_bytes,
            entries_in_segment: 0,
            bytes_in_segment: 0,
            _commands: PhantomData,
        }
    }

    fn needs_rollover(&self, incoming_bytes: u64) -> bool {
        self.entries_in_segment > 0
            && (self.entries_in_segment >= self.max_entries
                || self.bytes_in_segment + incoming_bytes > self.max_bytes)
    }
}

impl<C, S> JournalWriter<C> for SegmentJournalWriter<C, S>
where
    C: Serialize + Send + 'static,
    S: Serializer,
{
    fn append(&mut self, entry: JournalEntry<C>) -> EngineResult<()> {
        let mut buf = Vec::new();
        self.serializer.write(&entry, &mut buf)?;

        if self.needs_rollover(buf.len() as u64) {
            self.backend.sync()?;
            self.backend = (self.factory)(entry.id)?;
            debug!(starting_sequence = %entry.id, "rolled over to new journal segment");
            self.entries_in_segment = 0;
            self.bytes_in_segment = 0;
        }

        self.backend.append(&buf)?;
        if self.sync_on_append {
            self.backend.sync()?;
        } else {
            self.backend.flush()?;
        }

        self.entries_in_segment += 1;
        self.bytes_in_segment += buf.len() as u64;
        Ok(())
    }

    fn close(&mut self) -> EngineResult<()> {
        self.backend.sync()?;
        Ok(())
    }
}
