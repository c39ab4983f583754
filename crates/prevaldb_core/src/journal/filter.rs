//! Rollback-aware committed-entry filter.
//!
//! Given the raw, durable entry sequence (commands plus rollback markers),
//! produce the ordered sequence of entries that actually took effect:
//! every rolled-back attempt removed, relative order preserved, ids kept
//! as written (consumers must tolerate gaps).
//!
//! The raw journal is enumerated twice through a restartable source: a
//! first streaming pass locates the cancelled spans, a second lazy pass
//! yields the survivors. Neither pass materializes the log.

use super::{JournalEntry, JournalItem};
use crate::error::{EngineError, EngineResult};
use crate::types::SequenceNumber;

/// The cancelled id spans of a raw journal stream, as determined by its
/// rollback markers.
///
/// A marker with id `X` cancels every still-uncancelled command entry
/// from `X` up through the highest command id written before the marker -
/// a single entry when `X` is the latest id, a contiguous run otherwise.
/// Spans never overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelledSpans {
    /// Inclusive `(start, end)` id ranges, ascending and disjoint.
    spans: Vec<(SequenceNumber, SequenceNumber)>,
    /// Highest entry id seen in the scan (zero for an empty stream).
    last_sequence: SequenceNumber,
}

impl CancelledSpans {
    /// Scans a raw entry stream and records its cancelled spans.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::JournalCorruption`] when a marker cancels
    /// nothing: no preceding command entry, an id beyond the highest
    /// command id, or a span overlapping an earlier marker's. Errors from
    /// the source stream are passed through.
    pub fn scan<C, I>(raw: I) -> EngineResult<Self>
    where
        I: Iterator<Item = EngineResult<JournalEntry<C>>>,
    {
        let mut spans: Vec<(SequenceNumber, SequenceNumber)> = Vec::new();
        let mut last_command: Option<SequenceNumber> = None;
        let mut last_sequence = SequenceNumber::ZERO;

        for entry in raw {
            let entry = entry?;
            last_sequence = last_sequence.max(entry.id);
            match entry.item {
                JournalItem::Command(_) => last_command = Some(entry.id),
                JournalItem::Rollback => {
                    let start = entry.id;
                    let end = last_command.ok_or_else(|| {
                        EngineError::journal_corruption(format!(
                            "rollback marker {start} precedes any command entry"
                        ))
                    })?;
                    if start > end {
                        return Err(EngineError::journal_corruption(format!(
                            "rollback marker {start} cancels nothing: last command entry is {end}"
                        )));
                    }
                    if let Some(&(_, previous_end)) = spans.last() {
                        if start <= previous_end {
                            return Err(EngineError::journal_corruption(format!(
                                "rollback marker {start} overlaps span already cancelled \
                                 through {previous_end}"
                            )));
                        }
                    }
                    spans.push((start, end));
                }
            }
        }

        Ok(Self {
            spans,
            last_sequence,
        })
    }

    /// Whether the given entry id falls inside a cancelled span.
    #[must_use]
    pub fn contains(&self, id: SequenceNumber) -> bool {
        self.spans
            .binary_search_by(|&(start, end)| {
                if id < start {
                    std::cmp::Ordering::Greater
                } else if id > end {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    /// Number of cancelled spans (one per rollback marker).
    #[must_use]
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Whether no spans were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Highest entry id seen during the scan, including cancelled entries.
    ///
    /// Continuing the journal from `last_sequence() + 1` guarantees that
    /// cancelled ids are never reused.
    #[must_use]
    pub fn last_sequence(&self) -> SequenceNumber {
        self.last_sequence
    }
}

/// Lazy iterator over the committed command entries of a raw stream.
///
/// Yields command entries outside every cancelled span, in original
/// order; rollback markers are never yielded.
pub struct CommittedEntries<'a, C> {
    raw: Box<dyn Iterator<Item = EngineResult<JournalEntry<C>>> + 'a>,
    spans: CancelledSpans,
}

impl<'a, C> CommittedEntries<'a, C> {
    /// Wraps a raw stream with an already-computed span set.
    pub fn new(
        raw: Box<dyn Iterator<Item = EngineResult<JournalEntry<C>>> + 'a>,
        spans: CancelledSpans,
    ) -> Self {
        Self { raw, spans }
    }

    /// Highest raw entry id, including cancelled entries and markers.
    #[must_use]
    pub fn last_sequence(&self) -> SequenceNumber {
        self.spans.last_sequence()
    }
}

impl<C> Iterator for CommittedEntries<'_, C> {
    type Item = EngineResult<JournalEntry<C>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.raw.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e)),
            };
            if entry.is_rollback() || self.spans.contains(entry.id) {
                continue;
            }
            return Some(Ok(entry));
        }
    }
}

/// Produces the committed command entries of a restartable raw source.
///
/// The source is invoked twice: once for the marker scan, once for the
/// lazy survivor pass.
///
/// # Errors
///
/// Propagates scan errors, including the corrupt-marker conditions
/// described on [`CancelledSpans::scan`].
pub fn committed<'a, C, I, F>(source: F) -> EngineResult<CommittedEntries<'a, C>>
where
    C: 'a,
    I: Iterator<Item = EngineResult<JournalEntry<C>>> + 'a,
    F: Fn() -> EngineResult<I>,
{
    let spans = CancelledSpans::scan(source()?)?;
    Ok(CommittedEntries::new(Box::new(source()?), spans))
}
