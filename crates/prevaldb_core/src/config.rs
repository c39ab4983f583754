//! Engine configuration.

use std::path::{Path, PathBuf};

/// Isolation strategy used by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KernelStrategy {
    /// A writer-exclusive, readers-shared lock guards the model for the
    /// full duration of command execution.
    #[default]
    Pessimistic,
    /// Commands execute against a working copy of the model and publish
    /// on success; queries keep reading the live model meanwhile.
    Optimistic,
}

/// Journal write mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JournalMode {
    /// Every append is written and flushed before the call returns.
    #[default]
    Synchronous,
    /// Appends are queued and drained by a background thread. Lower
    /// latency, with a window where acknowledged commands are not yet
    /// durable if the process crashes before the queue drains.
    Asynchronous,
}

/// Configuration for creating or loading an engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding journal segments (and snapshots, unless an
    /// alternate snapshot location is set).
    pub location: PathBuf,

    /// Optional alternate directory for snapshot files.
    pub snapshot_location: Option<PathBuf>,

    /// Kernel isolation strategy.
    pub kernel: KernelStrategy,

    /// Journal write mode.
    pub journal: JournalMode,

    /// Maximum number of entries per journal segment before rollover.
    pub max_segment_entries: u64,

    /// Maximum size in bytes of a journal segment before rollover.
    pub max_segment_bytes: u64,

    /// Whether to fsync the segment after every append (safer but slower).
    pub sync_on_append: bool,
}

impl EngineConfig {
    /// Creates a configuration for the given engine location with default
    /// values everywhere else.
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
            snapshot_location: None,
            kernel: KernelStrategy::default(),
            journal: JournalMode::default(),
            max_segment_entries: 1000,
            max_segment_bytes: 8 * 1024 * 1024, // 8 MiB
            sync_on_append: true,
        }
    }

    /// Sets an alternate snapshot directory.
    #[must_use]
    pub fn snapshot_location(mut self, location: impl Into<PathBuf>) -> Self {
        self.snapshot_location = Some(location.into());
        self
    }

    /// Sets the kernel isolation strategy.
    #[must_use]
    pub const fn kernel(mut self, strategy: KernelStrategy) -> Self {
        self.kernel = strategy;
        self
    }

    /// Sets the journal write mode.
    #[must_use]
    pub const fn journal(mut self, mode: JournalMode) -> Self {
        self.journal = mode;
        self
    }

    /// Sets the maximum number of entries per journal segment.
    #[must_use]
    pub const fn max_segment_entries(mut self, entries: u64) -> Self {
        self.max_segment_entries = entries;
        self
    }

    /// Sets the maximum journal segment size in bytes.
    #[must_use]
    pub const fn max_segment_bytes(mut self, bytes: u64) -> Self {
        self.max_segment_bytes = bytes;
        self
    }

    /// Sets whether to fsync the segment after every append.
    #[must_use]
    pub const fn sync_on_append(mut self, value: bool) -> Self {
        self.sync_on_append = value;
        self
    }

    /// Returns the directory snapshots are stored in.
    ///
    /// This is the alternate snapshot location when configured, otherwise
    /// the engine location itself.
    #[must_use]
    pub fn effective_snapshot_location(&self) -> &Path {
        self.snapshot_location.as_deref().unwrap_or(&self.location)
    }

    /// Whether an alternate snapshot location is configured.
    #[must_use]
    pub fn has_alternate_snapshot_location(&self) -> bool {
        self.snapshot_location.is_some()
    }
}
