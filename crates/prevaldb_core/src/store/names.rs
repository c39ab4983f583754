//! Segment and snapshot file naming.
//!
//! Names are the on-disk metadata: a segment file encodes its file
//! sequence number and the sequence number of its first entry, a snapshot
//! file encodes its watermark. Both must round-trip losslessly through
//! parse/format, since recovery reconstructs all bookkeeping from
//! directory listings alone.

use crate::types::SequenceNumber;

/// Extension of journal segment files.
pub const JOURNAL_EXTENSION: &str = "journal";

/// Extension of snapshot files.
pub const SNAPSHOT_EXTENSION: &str = "snapshot";

/// Identity of one journal segment file.
///
/// Segments are totally ordered by `file_sequence`; `starting_sequence`
/// is fixed at creation and never changes. Formats to
/// `{file_sequence:09}.{starting_sequence:09}.journal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JournalFileName {
    /// Position of this file in the segment chain.
    pub file_sequence: u64,
    /// Sequence number of the first entry written to this segment.
    pub starting_sequence: SequenceNumber,
}

impl JournalFileName {
    /// Creates a segment name.
    #[must_use]
    pub const fn new(file_sequence: u64, starting_sequence: SequenceNumber) -> Self {
        Self {
            file_sequence,
            starting_sequence,
        }
    }

    /// The successor segment, starting at the given entry id.
    #[must_use]
    pub const fn successor(self, first_entry: SequenceNumber) -> Self {
        Self {
            file_sequence: self.file_sequence + 1,
            starting_sequence: first_entry,
        }
    }

    /// Formats the on-disk file name.
    #[must_use]
    pub fn name(&self) -> String {
        format!(
            "{:09}.{:09}.{JOURNAL_EXTENSION}",
            self.file_sequence,
            self.starting_sequence.as_u64()
        )
    }

    /// Parses an on-disk file name.
    ///
    /// Returns `None` for anything that is not a well-formed segment name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let mut parts = name.split('.');
        let file_sequence = parts.next()?.parse().ok()?;
        let starting_sequence = parts.next()?.parse().ok()?;
        if parts.next()? != JOURNAL_EXTENSION || parts.next().is_some() {
            return None;
        }
        Some(Self {
            file_sequence,
            starting_sequence: SequenceNumber::new(starting_sequence),
        })
    }
}

/// Identity of one snapshot file.
///
/// `last_sequence` is the watermark: every journal entry with id at or
/// below it is represented in the snapshot. Formats to
/// `{last_sequence:09}.snapshot`; the id-0 initial snapshot
/// (`000000000.snapshot`) must exist in any valid store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotFileName {
    /// Watermark of the snapshot.
    pub last_sequence: SequenceNumber,
}

impl SnapshotFileName {
    /// The initial snapshot, at watermark zero.
    pub const INITIAL: Self = Self {
        last_sequence: SequenceNumber::ZERO,
    };

    /// Creates a snapshot name for the given watermark.
    #[must_use]
    pub const fn new(last_sequence: SequenceNumber) -> Self {
        Self { last_sequence }
    }

    /// Formats the on-disk file name.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{:09}.{SNAPSHOT_EXTENSION}", self.last_sequence.as_u64())
    }

    /// Parses an on-disk file name.
    ///
    /// Returns `None` for anything that is not a well-formed snapshot name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let mut parts = name.split('.');
        let last_sequence = parts.next()?.parse().ok()?;
        if parts.next()? != SNAPSHOT_EXTENSION || parts.next().is_some() {
            return None;
        }
        Some(Self {
            last_sequence: SequenceNumber::new(last_sequence),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn journal_name_round_trip() {
        let name = JournalFileName::new(3, SequenceNumber::new(1042));
        assert_eq!(name.name(), "000000003.000001042.journal");
        assert_eq!(JournalFileName::parse(&name.name()), Some(name));
    }

    #[test]
    fn journal_successor() {
        let name = JournalFileName::new(0, SequenceNumber::ZERO);
        let next = name.successor(SequenceNumber::new(17));
        assert_eq!(next.file_sequence, 1);
        assert_eq!(next.starting_sequence, SequenceNumber::new(17));
    }

    #[test]
    fn journal_parse_rejects_garbage() {
        assert!(JournalFileName::parse("journal").is_none());
        assert!(JournalFileName::parse("000000001.journal").is_none());
        assert!(JournalFileName::parse("a.b.journal").is_none());
        assert!(JournalFileName::parse("000000001.000000001.snapshot").is_none());
        assert!(JournalFileName::parse("000000001.000000001.journal.bak").is_none());
    }

    #[test]
    fn snapshot_name_round_trip() {
        let name = SnapshotFileName::new(SequenceNumber::new(500));
        assert_eq!(name.name(), "000000500.snapshot");
        assert_eq!(SnapshotFileName::parse(&name.name()), Some(name));
    }

    #[test]
    fn initial_snapshot_name() {
        assert_eq!(SnapshotFileName::INITIAL.name(), "000000000.snapshot");
    }

    #[test]
    fn snapshot_parse_rejects_garbage() {
        assert!(SnapshotFileName::parse("snapshot").is_none());
        assert!(SnapshotFileName::parse("x.snapshot").is_none());
        assert!(SnapshotFileName::parse("000000000.journal").is_none());
    }
}
