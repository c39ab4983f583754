//! Command journal: entry types, writers, and the committed-entry filter.
//!
//! The journal is an append-only sequence of entries, each carrying a
//! monotonically increasing sequence number. Two kinds of entry exist:
//! executed commands, and rollback markers that retroactively cancel the
//! span of command entries belonging to a failed execution attempt.

mod appender;
mod async_writer;
mod filter;
mod writer;

pub use appender::JournalAppender;
pub use async_writer::AsyncJournalWriter;
pub use filter::{committed, CancelledSpans, CommittedEntries};
pub use writer::{SegmentFactory, SegmentJournalWriter};

use crate::error::EngineResult;
use crate::types::SequenceNumber;
use serde::{Deserialize, Serialize};

/// The payload of a journal entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JournalItem<C> {
    /// An executed command.
    Command(C),
    /// A rollback marker cancelling the command span that starts at this
    /// entry's id.
    Rollback,
}

/// One durable journal entry.
///
/// Entries are immutable once written and are owned by the segment they
/// were written to. A rollback marker's id equals the id of the *first*
/// command entry of the failed span it cancels - it is not a fresh id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry<C> {
    /// Sequence number of this entry.
    pub id: SequenceNumber,
    /// The entry payload.
    pub item: JournalItem<C>,
}

impl<C> JournalEntry<C> {
    /// Creates a command entry.
    pub fn command(id: SequenceNumber, command: C) -> Self {
        Self {
            id,
            item: JournalItem::Command(command),
        }
    }

    /// Creates a rollback marker cancelling the span that starts at `id`.
    pub fn rollback(id: SequenceNumber) -> Self {
        Self {
            id,
            item: JournalItem::Rollback,
        }
    }

    /// Whether this entry is a rollback marker.
    #[must_use]
    pub fn is_rollback(&self) -> bool {
        matches!(self.item, JournalItem::Rollback)
    }

    /// Returns the command payload, if this is a command entry.
    pub fn as_command(&self) -> Option<&C> {
        match &self.item {
            JournalItem::Command(c) => Some(c),
            JournalItem::Rollback => None,
        }
    }

    /// Consumes the entry, returning the command payload if present.
    pub fn into_command(self) -> Option<C> {
        match self.item {
            JournalItem::Command(c) => Some(c),
            JournalItem::Rollback => None,
        }
    }
}

/// Appends journal entries to durable storage.
///
/// Implementations differ in durability ordering: the synchronous
/// [`SegmentJournalWriter`] flushes before returning, while the
/// [`AsyncJournalWriter`] decorator queues entries for a background
/// thread.
pub trait JournalWriter<C>: Send {
    /// Appends one entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be made durable (synchronous
    /// writer) or accepted for writing (asynchronous writer after a
    /// background failure).
    fn append(&mut self, entry: JournalEntry<C>) -> EngineResult<()>;

    /// Flushes outstanding writes and releases the underlying storage.
    ///
    /// For the asynchronous writer this blocks until the queue has fully
    /// drained. Idempotent.
    fn close(&mut self) -> EngineResult<()>;
}
