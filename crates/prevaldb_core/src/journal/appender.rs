//! Sequence-number assignment over a journal writer.

use super::{JournalEntry, JournalWriter};
use crate::error::EngineResult;
use crate::types::SequenceNumber;

/// Assigns sequence numbers and appends entries through a writer.
///
/// The appender is the single owner of the "next id" counter: command
/// entries are numbered in the order they are appended, and a rollback
/// marker reuses the id of the command entry it cancels - so a failed
/// command still consumes its id and the next command continues after it.
pub struct JournalAppender<C> {
    next: SequenceNumber,
    writer: Box<dyn JournalWriter<C>>,
}

impl<C: Clone> JournalAppender<C> {
    /// Creates an appender whose first command entry gets id `next`.
    pub fn new(next: SequenceNumber, writer: Box<dyn JournalWriter<C>>) -> Self {
        Self { next, writer }
    }

    /// Appends a command entry and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Fails if the writer rejects the entry; the id is not consumed in
    /// that case.
    pub fn append_command(&mut self, command: &C) -> EngineResult<SequenceNumber> {
        let id = self.next;
        self.writer
            .append(JournalEntry::command(id, command.clone()))?;
        self.next = id.next();
        Ok(id)
    }

    /// Appends a rollback marker cancelling the span that starts at `id`.
    ///
    /// # Errors
    ///
    /// Fails if the writer rejects the entry.
    pub fn append_rollback(&mut self, id: SequenceNumber) -> EngineResult<()> {
        self.writer.append(JournalEntry::rollback(id))
    }

    /// The id of the most recently appended command entry.
    #[must_use]
    pub fn last_sequence(&self) -> SequenceNumber {
        SequenceNumber::new(self.next.as_u64().saturating_sub(1))
    }

    /// Closes the underlying writer.
    ///
    /// # Errors
    ///
    /// Propagates the writer's close failure.
    pub fn close(&mut self) -> EngineResult<()> {
        self.writer.close()
    }
}
